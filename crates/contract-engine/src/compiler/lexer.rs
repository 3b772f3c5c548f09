//! Tokenizer for contract source.
//!
//! Words (keywords, type names and identifiers alike) come out as
//! `TokenKind::Word`; the parser decides what each word means. Line (`//`)
//! and block (`/* */`) comments are skipped.

use crate::domain::value_objects::U256;
use crate::errors::{CompileError, SourceLocation};

/// Token classification.
#[derive(Clone, Debug, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum TokenKind {
    /// Identifier, keyword or type name.
    Word(String),
    /// Decimal or hex integer literal.
    Number(U256),
    /// Double-quoted string literal (recognized only to be rejected).
    Str(String),
    LBrace,
    RBrace,
    LParen,
    RParen,
    LBracket,
    RBracket,
    Semi,
    Comma,
    Dot,
    Assign,
    PlusAssign,
    MinusAssign,
    StarAssign,
    SlashAssign,
    PercentAssign,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Lt,
    Le,
    Gt,
    Ge,
    EqEq,
    NotEq,
    AndAnd,
    OrOr,
    Bang,
    Increment,
    Decrement,
    /// Any other punctuation (`^`, `&`, `=>`, ...), kept for diagnostics.
    Other(String),
    Eof,
}

impl TokenKind {
    /// How the token reads in an error message.
    #[must_use]
    pub fn describe(&self) -> String {
        match self {
            Self::Word(w) => format!("`{w}`"),
            Self::Number(n) => format!("number {n}"),
            Self::Str(_) => "string literal".to_string(),
            Self::Eof => "end of input".to_string(),
            Self::Other(s) => format!("`{s}`"),
            other => format!("`{}`", punct_text(other)),
        }
    }
}

fn punct_text(kind: &TokenKind) -> &'static str {
    match kind {
        TokenKind::LBrace => "{",
        TokenKind::RBrace => "}",
        TokenKind::LParen => "(",
        TokenKind::RParen => ")",
        TokenKind::LBracket => "[",
        TokenKind::RBracket => "]",
        TokenKind::Semi => ";",
        TokenKind::Comma => ",",
        TokenKind::Dot => ".",
        TokenKind::Assign => "=",
        TokenKind::PlusAssign => "+=",
        TokenKind::MinusAssign => "-=",
        TokenKind::StarAssign => "*=",
        TokenKind::SlashAssign => "/=",
        TokenKind::PercentAssign => "%=",
        TokenKind::Plus => "+",
        TokenKind::Minus => "-",
        TokenKind::Star => "*",
        TokenKind::Slash => "/",
        TokenKind::Percent => "%",
        TokenKind::Lt => "<",
        TokenKind::Le => "<=",
        TokenKind::Gt => ">",
        TokenKind::Ge => ">=",
        TokenKind::EqEq => "==",
        TokenKind::NotEq => "!=",
        TokenKind::AndAnd => "&&",
        TokenKind::OrOr => "||",
        TokenKind::Bang => "!",
        TokenKind::Increment => "++",
        TokenKind::Decrement => "--",
        _ => "?",
    }
}

/// A token and where it starts.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Token {
    /// What was read.
    pub kind: TokenKind,
    /// Position of the first character.
    pub location: SourceLocation,
}

/// Splits `source` into tokens, ending with `Eof`.
///
/// # Errors
///
/// Returns a syntax error for unterminated comments or strings, malformed or
/// oversized number literals, and characters outside the language.
pub fn tokenize(source: &str) -> Result<Vec<Token>, CompileError> {
    Lexer::new(source).run()
}

struct Lexer<'a> {
    chars: std::iter::Peekable<std::str::Chars<'a>>,
    line: usize,
    column: usize,
    tokens: Vec<Token>,
}

impl<'a> Lexer<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            chars: source.chars().peekable(),
            line: 1,
            column: 1,
            tokens: Vec::new(),
        }
    }

    fn location(&self) -> SourceLocation {
        SourceLocation::new(self.line, self.column)
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.chars.next()?;
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn bump_if(&mut self, expected: char) -> bool {
        if self.chars.peek() == Some(&expected) {
            self.bump();
            true
        } else {
            false
        }
    }

    fn run(mut self) -> Result<Vec<Token>, CompileError> {
        while let Some(&c) = self.chars.peek() {
            let start = self.location();
            if c.is_whitespace() {
                self.bump();
                continue;
            }
            let kind = match c {
                '/' => {
                    self.bump();
                    if self.bump_if('/') {
                        self.skip_line();
                        continue;
                    }
                    if self.bump_if('*') {
                        self.skip_block(start)?;
                        continue;
                    }
                    if self.bump_if('=') {
                        TokenKind::SlashAssign
                    } else {
                        TokenKind::Slash
                    }
                }
                c if c.is_ascii_digit() => self.number(start)?,
                c if c.is_ascii_alphabetic() || c == '_' || c == '$' => self.word(),
                '"' | '\'' => self.string(start)?,
                _ => self.punct(start)?,
            };
            self.tokens.push(Token {
                kind,
                location: start,
            });
        }
        let eof = self.location();
        self.tokens.push(Token {
            kind: TokenKind::Eof,
            location: eof,
        });
        Ok(self.tokens)
    }

    fn skip_line(&mut self) {
        while let Some(c) = self.bump() {
            if c == '\n' {
                break;
            }
        }
    }

    fn skip_block(&mut self, start: SourceLocation) -> Result<(), CompileError> {
        loop {
            match self.bump() {
                Some('*') if self.bump_if('/') => return Ok(()),
                Some(_) => {}
                None => return Err(CompileError::syntax("unterminated block comment", start)),
            }
        }
    }

    fn take_while(&mut self, mut keep: impl FnMut(char) -> bool) -> String {
        let mut text = String::new();
        while let Some(&c) = self.chars.peek() {
            if !keep(c) {
                break;
            }
            text.push(c);
            self.bump();
        }
        text
    }

    fn word(&mut self) -> TokenKind {
        TokenKind::Word(self.take_while(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$'))
    }

    fn number(&mut self, start: SourceLocation) -> Result<TokenKind, CompileError> {
        let text = self.take_while(|c| c.is_ascii_alphanumeric() || c == '_');
        let digits: String = text.chars().filter(|c| *c != '_').collect();
        let parsed = match digits.strip_prefix("0x").or_else(|| digits.strip_prefix("0X")) {
            Some(hex) if !hex.is_empty() && hex.len() <= 64 => U256::from_str_radix(hex, 16).ok(),
            Some(_) => None,
            None if digits.chars().all(|c| c.is_ascii_digit()) => U256::from_dec_str(&digits).ok(),
            None => None,
        };
        parsed
            .map(TokenKind::Number)
            .ok_or_else(|| CompileError::syntax(format!("invalid number literal `{text}`"), start))
    }

    fn string(&mut self, start: SourceLocation) -> Result<TokenKind, CompileError> {
        let quote = self.bump();
        let mut text = String::new();
        loop {
            match self.bump() {
                Some('\\') => {
                    if let Some(c) = self.bump() {
                        text.push(c);
                    }
                }
                Some(c) if Some(c) == quote => return Ok(TokenKind::Str(text)),
                Some('\n') | None => {
                    return Err(CompileError::syntax("unterminated string literal", start))
                }
                Some(c) => text.push(c),
            }
        }
    }

    fn punct(&mut self, start: SourceLocation) -> Result<TokenKind, CompileError> {
        let Some(c) = self.bump() else {
            return Err(CompileError::syntax("unexpected end of input", start));
        };
        let kind = match c {
            '{' => TokenKind::LBrace,
            '}' => TokenKind::RBrace,
            '(' => TokenKind::LParen,
            ')' => TokenKind::RParen,
            '[' => TokenKind::LBracket,
            ']' => TokenKind::RBracket,
            ';' => TokenKind::Semi,
            ',' => TokenKind::Comma,
            '.' => TokenKind::Dot,
            '=' if self.bump_if('=') => TokenKind::EqEq,
            '=' if self.bump_if('>') => TokenKind::Other("=>".to_string()),
            '=' => TokenKind::Assign,
            '+' if self.bump_if('=') => TokenKind::PlusAssign,
            '+' if self.bump_if('+') => TokenKind::Increment,
            '+' => TokenKind::Plus,
            '-' if self.bump_if('=') => TokenKind::MinusAssign,
            '-' if self.bump_if('-') => TokenKind::Decrement,
            '-' => TokenKind::Minus,
            '*' if self.bump_if('=') => TokenKind::StarAssign,
            '*' => TokenKind::Star,
            '%' if self.bump_if('=') => TokenKind::PercentAssign,
            '%' => TokenKind::Percent,
            '<' if self.bump_if('=') => TokenKind::Le,
            '<' => TokenKind::Lt,
            '>' if self.bump_if('=') => TokenKind::Ge,
            '>' => TokenKind::Gt,
            '!' if self.bump_if('=') => TokenKind::NotEq,
            '!' => TokenKind::Bang,
            '&' if self.bump_if('&') => TokenKind::AndAnd,
            '|' if self.bump_if('|') => TokenKind::OrOr,
            '&' | '|' | '^' | '~' | '?' | ':' => TokenKind::Other(c.to_string()),
            other => {
                return Err(CompileError::syntax(
                    format!("unexpected character `{other}`"),
                    start,
                ))
            }
        };
        Ok(kind)
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::CompileErrorKind;

    fn kinds(source: &str) -> Vec<TokenKind> {
        tokenize(source)
            .unwrap()
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn test_words_numbers_punctuation() {
        assert_eq!(
            kinds("uint256 x = 0x2a + 7;"),
            vec![
                TokenKind::Word("uint256".into()),
                TokenKind::Word("x".into()),
                TokenKind::Assign,
                TokenKind::Number(U256::from(42)),
                TokenKind::Plus,
                TokenKind::Number(U256::from(7)),
                TokenKind::Semi,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_compound_operators() {
        assert_eq!(
            kinds("a += b <= c != d && !e || f %= 1_000"),
            vec![
                TokenKind::Word("a".into()),
                TokenKind::PlusAssign,
                TokenKind::Word("b".into()),
                TokenKind::Le,
                TokenKind::Word("c".into()),
                TokenKind::NotEq,
                TokenKind::Word("d".into()),
                TokenKind::AndAnd,
                TokenKind::Bang,
                TokenKind::Word("e".into()),
                TokenKind::OrOr,
                TokenKind::Word("f".into()),
                TokenKind::PercentAssign,
                TokenKind::Number(U256::from(1000)),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_comments_and_locations() {
        let tokens = tokenize("// header\n/* block\n comment */  x").unwrap();
        assert_eq!(tokens[0].kind, TokenKind::Word("x".into()));
        assert_eq!(tokens[0].location, SourceLocation::new(3, 13));
    }

    #[test]
    fn test_string_literal() {
        assert_eq!(
            kinds("\"too low\""),
            vec![TokenKind::Str("too low".into()), TokenKind::Eof]
        );
    }

    #[test]
    fn test_errors() {
        let err = tokenize("x = 12ab;").unwrap_err();
        assert_eq!(err.kind, CompileErrorKind::Syntax);
        assert_eq!(err.location, SourceLocation::new(1, 5));

        assert!(tokenize("/* open").is_err());
        assert!(tokenize("x @ y").is_err());
        // One more hex digit than a word can hold
        assert!(tokenize(&format!("0x1{}", "0".repeat(64))).is_err());
    }
}
