//! Recursive-descent parser from tokens to a [`ContractDef`].
//!
//! Precedence, loosest first: `||`, `&&`, `== !=`, `< <= > >=`, `+ -`,
//! `* / %`, unary `!`. Recognizable constructs outside the language subset
//! are reported as `UnsupportedFeature` rather than as syntax errors.

use crate::compiler::abi::StateMutability;
use crate::compiler::ast::{
    BinOp, Block, Constructor, ContractDef, EnvVar, Expr, ExprKind, FunctionDef, Param, StateVar,
    Stmt, StmtKind, Type,
};
use crate::compiler::lexer::{Token, TokenKind};
use crate::domain::value_objects::U256;
use crate::errors::{CompileError, CompileErrorKind, SourceLocation};

/// Words that may not name a variable, parameter, function or contract.
const RESERVED: &[&str] = &[
    "contract", "constructor", "function", "returns", "return", "if", "else", "while", "for",
    "do", "require", "true", "false", "public", "external", "internal", "private", "pure",
    "view", "payable", "msg", "block", "tx", "this", "uint", "uint256", "bool", "address",
    "mapping", "string", "bytes", "emit", "event", "modifier", "struct", "enum", "revert",
];

/// Solidity member declarations the language does not have.
const UNSUPPORTED_MEMBERS: &[&str] = &[
    "event", "modifier", "struct", "enum", "using", "error", "receive", "fallback",
];

/// Solidity statements the language does not have.
const UNSUPPORTED_STATEMENTS: &[&str] = &[
    "for", "do", "emit", "revert", "assert", "delete", "unchecked", "try", "assembly", "break",
    "continue",
];

/// Deepest nesting of statements and expressions the parser accepts.
///
/// Parsing and code generation both recurse over the tree, so this bounds
/// their stack use on hostile input.
pub const MAX_NESTING: usize = 64;

/// Parses a whole token stream (as produced by `tokenize`).
///
/// # Errors
///
/// Returns the first syntax or unsupported-feature error found.
pub fn parse(tokens: Vec<Token>) -> Result<ContractDef, CompileError> {
    Parser::new(tokens).source()
}

fn is_unsupported_type(word: &str) -> bool {
    let sized = |prefix: &str| {
        word.strip_prefix(prefix)
            .is_some_and(|rest| rest.chars().all(|c| c.is_ascii_digit()))
    };
    matches!(word, "mapping" | "string" | "int" | "byte" | "bytes" | "fixed" | "ufixed")
        || sized("uint")
        || sized("int")
        || sized("bytes")
}

fn is_reserved(word: &str) -> bool {
    RESERVED.contains(&word)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
}

impl Parser {
    fn new(tokens: Vec<Token>) -> Self {
        Self {
            tokens,
            pos: 0,
            depth: 0,
        }
    }

    // ===== NESTING =====

    /// Enters one nesting level. Callers restore `depth` on success; an
    /// error aborts the whole parse.
    fn descend(&mut self) -> Result<(), CompileError> {
        self.depth += 1;
        if self.depth > MAX_NESTING {
            return Err(CompileError::unsupported(
                format!("nesting too deep (limit {MAX_NESTING})"),
                self.location(),
            ));
        }
        Ok(())
    }

    fn ascend(&mut self) {
        self.depth -= 1;
    }

    // ===== TOKEN CURSOR =====

    fn peek(&self) -> &Token {
        // tokenize always terminates the stream with Eof
        let last = self.tokens.len().saturating_sub(1);
        &self.tokens[self.pos.min(last)]
    }

    fn peek_kind(&self) -> &TokenKind {
        &self.peek().kind
    }

    fn peek_nth_kind(&self, n: usize) -> Option<&TokenKind> {
        self.tokens.get(self.pos + n).map(|t| &t.kind)
    }

    fn location(&self) -> SourceLocation {
        self.peek().location
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
        token
    }

    fn at(&self, kind: &TokenKind) -> bool {
        self.peek_kind() == kind
    }

    fn at_word(&self, word: &str) -> bool {
        matches!(self.peek_kind(), TokenKind::Word(w) if w == word)
    }

    fn peek_word(&self) -> Option<&str> {
        match self.peek_kind() {
            TokenKind::Word(w) => Some(w.as_str()),
            _ => None,
        }
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.at(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn eat_word(&mut self, word: &str) -> bool {
        if self.at_word(word) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn unexpected(&self, expected: &str) -> CompileError {
        CompileError::syntax(
            format!("expected {expected}, found {}", self.peek_kind().describe()),
            self.location(),
        )
    }

    fn expect(&mut self, kind: &TokenKind) -> Result<SourceLocation, CompileError> {
        if self.at(kind) {
            Ok(self.advance().location)
        } else {
            Err(self.unexpected(&kind.describe()))
        }
    }

    fn identifier(&mut self, what: &str) -> Result<(String, SourceLocation), CompileError> {
        match self.peek_kind() {
            TokenKind::Word(w) if is_reserved(w) => Err(CompileError::syntax(
                format!("`{w}` is a reserved word and cannot be used as {what}"),
                self.location(),
            )),
            TokenKind::Word(w) => {
                let name = w.clone();
                let location = self.advance().location;
                Ok((name, location))
            }
            _ => Err(self.unexpected(what)),
        }
    }

    fn type_name(&mut self) -> Result<Type, CompileError> {
        let location = self.location();
        match self.peek_word() {
            Some(word) => match Type::from_keyword(word) {
                Some(ty) => {
                    self.advance();
                    Ok(ty)
                }
                None if is_unsupported_type(word) => Err(CompileError::unsupported(
                    format!("type `{word}` is not supported"),
                    location,
                )),
                None => Err(CompileError::syntax(format!("unknown type `{word}`"), location)),
            },
            None => Err(self.unexpected("a type")),
        }
    }

    // ===== DECLARATIONS =====

    fn source(&mut self) -> Result<ContractDef, CompileError> {
        let mut contract: Option<ContractDef> = None;
        loop {
            let location = self.location();
            match self.peek_word() {
                Some("pragma") => {
                    while !self.at(&TokenKind::Semi) && !self.at(&TokenKind::Eof) {
                        self.advance();
                    }
                    self.expect(&TokenKind::Semi)?;
                }
                Some("contract") if contract.is_some() => {
                    return Err(CompileError::unsupported(
                        "only one contract per source is supported",
                        location,
                    ))
                }
                Some("contract") => contract = Some(self.contract()?),
                Some(word @ ("import" | "interface" | "library" | "abstract")) => {
                    return Err(CompileError::unsupported(
                        format!("`{word}` is not supported"),
                        location,
                    ))
                }
                _ if self.at(&TokenKind::Eof) => break,
                _ => return Err(self.unexpected("`contract`")),
            }
        }
        contract.ok_or_else(|| CompileError::syntax("source contains no contract", self.location()))
    }

    fn contract(&mut self) -> Result<ContractDef, CompileError> {
        let location = self.advance().location;
        let (name, _) = self.identifier("a contract name")?;
        if self.at_word("is") {
            return Err(CompileError::unsupported("inheritance is not supported", self.location()));
        }
        self.expect(&TokenKind::LBrace)?;

        let mut def = ContractDef {
            name,
            state_vars: Vec::new(),
            constructor: None,
            functions: Vec::new(),
            location,
        };
        while !self.eat(&TokenKind::RBrace) {
            let member_location = self.location();
            match self.peek_word() {
                Some("constructor") => {
                    let ctor = self.constructor()?;
                    if def.constructor.is_some() {
                        return Err(CompileError::new(
                            CompileErrorKind::DuplicateDeclaration,
                            "constructor declared twice",
                            member_location,
                        ));
                    }
                    def.constructor = Some(ctor);
                }
                Some("function") => def.functions.push(self.function()?),
                Some(word) if UNSUPPORTED_MEMBERS.contains(&word) => {
                    return Err(CompileError::unsupported(
                        format!("`{word}` declarations are not supported"),
                        member_location,
                    ))
                }
                Some(_) => def.state_vars.push(self.state_var()?),
                None if self.at(&TokenKind::Eof) => {
                    return Err(CompileError::syntax("unterminated contract body", member_location))
                }
                None => return Err(self.unexpected("a contract member")),
            }
        }
        Ok(def)
    }

    fn state_var(&mut self) -> Result<StateVar, CompileError> {
        let location = self.location();
        let ty = self.type_name()?;
        if let Some(word @ ("public" | "private" | "internal" | "constant" | "immutable")) =
            self.peek_word()
        {
            return Err(CompileError::unsupported(
                format!("state variable modifier `{word}` is not supported"),
                self.location(),
            ));
        }
        let (name, _) = self.identifier("a variable name")?;
        let initializer = if self.eat(&TokenKind::Assign) {
            Some(self.expression()?)
        } else {
            None
        };
        self.expect(&TokenKind::Semi)?;
        Ok(StateVar {
            name,
            ty,
            initializer,
            location,
        })
    }

    fn params(&mut self) -> Result<Vec<Param>, CompileError> {
        self.expect(&TokenKind::LParen)?;
        let mut params = Vec::new();
        if self.eat(&TokenKind::RParen) {
            return Ok(params);
        }
        loop {
            let location = self.location();
            let ty = self.type_name()?;
            let (name, _) = self.identifier("a parameter name")?;
            params.push(Param { name, ty, location });
            if self.eat(&TokenKind::RParen) {
                return Ok(params);
            }
            self.expect(&TokenKind::Comma)?;
        }
    }

    fn constructor(&mut self) -> Result<Constructor, CompileError> {
        let location = self.advance().location;
        let params = self.params()?;
        let mut payable = false;
        while let Some(word) = self.peek_word() {
            match word {
                "public" => {}
                "payable" => payable = true,
                other => {
                    return Err(CompileError::unsupported(
                        format!("constructor attribute `{other}` is not supported"),
                        self.location(),
                    ))
                }
            }
            self.advance();
        }
        let body = self.block()?;
        Ok(Constructor {
            params,
            payable,
            body,
            location,
        })
    }

    fn function(&mut self) -> Result<FunctionDef, CompileError> {
        let location = self.advance().location;
        let (name, _) = self.identifier("a function name")?;
        let params = self.params()?;

        let mut visible = false;
        let mut mutability: Option<StateMutability> = None;
        let mut returns = None;
        loop {
            let attr_location = self.location();
            let Some(word) = self.peek_word() else { break };
            match word {
                "public" | "external" if !visible => visible = true,
                "pure" | "view" | "payable" if mutability.is_none() => {
                    mutability = Some(match word {
                        "pure" => StateMutability::Pure,
                        "view" => StateMutability::View,
                        _ => StateMutability::Payable,
                    });
                }
                "public" | "external" | "pure" | "view" | "payable" => {
                    return Err(CompileError::syntax(
                        format!("conflicting or repeated attribute `{word}`"),
                        attr_location,
                    ))
                }
                "returns" => {
                    self.advance();
                    returns = Some(self.return_type()?);
                    continue;
                }
                "internal" | "private" => {
                    return Err(CompileError::unsupported(
                        format!("`{word}` functions are not supported"),
                        attr_location,
                    ))
                }
                other => {
                    return Err(CompileError::unsupported(
                        format!("function modifier `{other}` is not supported"),
                        attr_location,
                    ))
                }
            }
            self.advance();
        }

        if !visible {
            return Err(CompileError::syntax(
                format!("function `{name}` must be declared `public` or `external`"),
                location,
            ));
        }
        if self.at(&TokenKind::Semi) {
            return Err(CompileError::unsupported(
                "functions without a body are not supported",
                self.location(),
            ));
        }
        let body = self.block()?;
        Ok(FunctionDef {
            name,
            params,
            returns,
            mutability: mutability.unwrap_or_default(),
            body,
            location,
        })
    }

    fn return_type(&mut self) -> Result<Type, CompileError> {
        self.expect(&TokenKind::LParen)?;
        let ty = self.type_name()?;
        if matches!(self.peek_kind(), TokenKind::Word(_)) {
            return Err(CompileError::unsupported(
                "named return values are not supported",
                self.location(),
            ));
        }
        if self.at(&TokenKind::Comma) {
            return Err(CompileError::unsupported(
                "multiple return values are not supported",
                self.location(),
            ));
        }
        self.expect(&TokenKind::RParen)?;
        Ok(ty)
    }

    // ===== STATEMENTS =====

    fn block(&mut self) -> Result<Block, CompileError> {
        self.expect(&TokenKind::LBrace)?;
        let mut stmts = Vec::new();
        while !self.eat(&TokenKind::RBrace) {
            if self.at(&TokenKind::Eof) {
                return Err(CompileError::syntax("unterminated block", self.location()));
            }
            stmts.push(self.statement()?);
        }
        Ok(stmts)
    }

    /// Body of `if`/`while`: a braced block or a single statement.
    fn body(&mut self) -> Result<Block, CompileError> {
        if self.at(&TokenKind::LBrace) {
            self.block()
        } else {
            Ok(vec![self.statement()?])
        }
    }

    fn statement(&mut self) -> Result<Stmt, CompileError> {
        self.descend()?;
        let location = self.location();
        let kind = match self.peek_kind().clone() {
            TokenKind::LBrace => StmtKind::Block(self.block()?),
            TokenKind::Word(word) => self.word_statement(&word, location)?,
            TokenKind::Increment | TokenKind::Decrement => {
                return Err(CompileError::unsupported(
                    "prefix increment and decrement are not supported",
                    location,
                ))
            }
            _ => return Err(self.unexpected("a statement")),
        };
        self.ascend();
        Ok(Stmt { kind, location })
    }

    fn word_statement(
        &mut self,
        word: &str,
        location: SourceLocation,
    ) -> Result<StmtKind, CompileError> {
        match word {
            "if" => {
                self.advance();
                let cond = self.condition()?;
                let then_branch = self.body()?;
                let else_branch = if self.eat_word("else") {
                    Some(self.body()?)
                } else {
                    None
                };
                Ok(StmtKind::If {
                    cond,
                    then_branch,
                    else_branch,
                })
            }
            "while" => {
                self.advance();
                let cond = self.condition()?;
                let body = self.body()?;
                Ok(StmtKind::While { cond, body })
            }
            "return" => {
                self.advance();
                let value = if self.at(&TokenKind::Semi) {
                    None
                } else {
                    Some(self.expression()?)
                };
                self.expect(&TokenKind::Semi)?;
                Ok(StmtKind::Return(value))
            }
            "require" => {
                self.advance();
                self.expect(&TokenKind::LParen)?;
                let cond = self.expression()?;
                if self.at(&TokenKind::Comma) {
                    return Err(CompileError::unsupported(
                        "revert reason strings are not supported",
                        self.location(),
                    ));
                }
                self.expect(&TokenKind::RParen)?;
                self.expect(&TokenKind::Semi)?;
                Ok(StmtKind::Require(cond))
            }
            w if UNSUPPORTED_STATEMENTS.contains(&w) => Err(CompileError::unsupported(
                format!("`{w}` statements are not supported"),
                location,
            )),
            w if Type::from_keyword(w).is_some() || is_unsupported_type(w) => {
                if self.peek_nth_kind(1) == Some(&TokenKind::LParen) {
                    return Err(CompileError::unsupported(
                        "type conversions are not supported",
                        location,
                    ));
                }
                let ty = self.type_name()?;
                let (name, _) = self.identifier("a variable name")?;
                let init = if self.eat(&TokenKind::Assign) {
                    Some(self.expression()?)
                } else {
                    None
                };
                self.expect(&TokenKind::Semi)?;
                Ok(StmtKind::Local { name, ty, init })
            }
            _ => self.assignment(location),
        }
    }

    fn condition(&mut self) -> Result<Expr, CompileError> {
        self.expect(&TokenKind::LParen)?;
        let cond = self.expression()?;
        self.expect(&TokenKind::RParen)?;
        Ok(cond)
    }

    fn assignment(&mut self, location: SourceLocation) -> Result<StmtKind, CompileError> {
        let compound = match self.peek_nth_kind(1) {
            Some(TokenKind::Assign) => None,
            Some(TokenKind::PlusAssign | TokenKind::Increment) => Some(BinOp::Add),
            Some(TokenKind::MinusAssign | TokenKind::Decrement) => Some(BinOp::Sub),
            Some(TokenKind::StarAssign) => Some(BinOp::Mul),
            Some(TokenKind::SlashAssign) => Some(BinOp::Div),
            Some(TokenKind::PercentAssign) => Some(BinOp::Mod),
            _ => {
                // Not an assignment. Parse the expression so unsupported
                // constructs inside it (calls, indexing) are named precisely.
                self.expression()?;
                return Err(CompileError::syntax(
                    "expected an assignment or declaration",
                    location,
                ));
            }
        };
        let (target, target_location) = self.identifier("an assignment target")?;
        let op_token = self.advance();

        let value = match (&op_token.kind, compound) {
            (TokenKind::Increment | TokenKind::Decrement, Some(op)) => Expr::new(
                ExprKind::Binary {
                    op,
                    lhs: Box::new(Expr::new(ExprKind::Ident(target.clone()), target_location)),
                    rhs: Box::new(Expr::new(ExprKind::Number(U256::one()), op_token.location)),
                },
                op_token.location,
            ),
            (_, Some(op)) => Expr::new(
                ExprKind::Binary {
                    op,
                    lhs: Box::new(Expr::new(ExprKind::Ident(target.clone()), target_location)),
                    rhs: Box::new(self.expression()?),
                },
                op_token.location,
            ),
            (_, None) => self.expression()?,
        };
        self.expect(&TokenKind::Semi)?;
        Ok(StmtKind::Assign { target, value })
    }

    // ===== EXPRESSIONS =====

    fn expression(&mut self) -> Result<Expr, CompileError> {
        self.descend()?;
        let expr = self.binary_level(0)?;
        if let TokenKind::Other(op) = self.peek_kind() {
            let message = if op == "?" {
                "conditional expressions are not supported".to_string()
            } else {
                format!("operator `{op}` is not supported")
            };
            return Err(CompileError::unsupported(message, self.location()));
        }
        self.ascend();
        Ok(expr)
    }

    /// Binary operators of precedence level `level`, 0 being loosest.
    fn binary_level(&mut self, level: usize) -> Result<Expr, CompileError> {
        const LEVELS: usize = 6;
        if level == LEVELS {
            return self.unary();
        }
        // Each link of a left-associative chain deepens the tree by one.
        let depth = self.depth;
        let mut lhs = self.binary_level(level + 1)?;
        while let Some(op) = Self::binary_op(level, self.peek_kind()) {
            self.descend()?;
            let location = self.advance().location;
            let rhs = self.binary_level(level + 1)?;
            lhs = Expr::new(
                ExprKind::Binary {
                    op,
                    lhs: Box::new(lhs),
                    rhs: Box::new(rhs),
                },
                location,
            );
        }
        self.depth = depth;
        Ok(lhs)
    }

    fn binary_op(level: usize, kind: &TokenKind) -> Option<BinOp> {
        let op = match (level, kind) {
            (0, TokenKind::OrOr) => BinOp::Or,
            (1, TokenKind::AndAnd) => BinOp::And,
            (2, TokenKind::EqEq) => BinOp::Eq,
            (2, TokenKind::NotEq) => BinOp::Ne,
            (3, TokenKind::Lt) => BinOp::Lt,
            (3, TokenKind::Le) => BinOp::Le,
            (3, TokenKind::Gt) => BinOp::Gt,
            (3, TokenKind::Ge) => BinOp::Ge,
            (4, TokenKind::Plus) => BinOp::Add,
            (4, TokenKind::Minus) => BinOp::Sub,
            (5, TokenKind::Star) => BinOp::Mul,
            (5, TokenKind::Slash) => BinOp::Div,
            (5, TokenKind::Percent) => BinOp::Mod,
            _ => return None,
        };
        Some(op)
    }

    fn unary(&mut self) -> Result<Expr, CompileError> {
        let location = self.location();
        match self.peek_kind() {
            TokenKind::Bang => {
                self.descend()?;
                self.advance();
                let operand = self.unary()?;
                self.ascend();
                Ok(Expr::new(ExprKind::Not(Box::new(operand)), location))
            }
            TokenKind::Minus => Err(CompileError::unsupported(
                "unary minus is not supported",
                location,
            )),
            TokenKind::Increment | TokenKind::Decrement => Err(CompileError::unsupported(
                "increment and decrement inside expressions are not supported",
                location,
            )),
            _ => self.primary(),
        }
    }

    fn primary(&mut self) -> Result<Expr, CompileError> {
        let location = self.location();
        let kind = match self.peek_kind().clone() {
            TokenKind::Number(n) => {
                self.advance();
                ExprKind::Number(n)
            }
            TokenKind::LParen => {
                self.advance();
                let inner = self.expression()?;
                self.expect(&TokenKind::RParen)?;
                return Ok(inner);
            }
            TokenKind::Str(_) => {
                return Err(CompileError::unsupported(
                    "string literals are not supported",
                    location,
                ))
            }
            TokenKind::Word(word) => match word.as_str() {
                "true" | "false" => {
                    self.advance();
                    ExprKind::Bool(word == "true")
                }
                "msg" | "block" | "tx" => self.environment(&word)?,
                "this" => {
                    return Err(CompileError::unsupported("`this` is not supported", location))
                }
                w if Type::from_keyword(w).is_some() || is_unsupported_type(w) => {
                    return Err(CompileError::unsupported(
                        "type conversions are not supported",
                        location,
                    ))
                }
                w if is_reserved(w) => {
                    return Err(CompileError::syntax(format!("unexpected keyword `{w}`"), location))
                }
                _ => {
                    self.advance();
                    self.reject_postfix()?;
                    ExprKind::Ident(word)
                }
            },
            _ => return Err(self.unexpected("an expression")),
        };
        Ok(Expr::new(kind, location))
    }

    fn environment(&mut self, object: &str) -> Result<ExprKind, CompileError> {
        let location = self.advance().location;
        self.expect(&TokenKind::Dot)?;
        let member = match self.peek_word() {
            Some(member) => member.to_string(),
            None => return Err(self.unexpected("a member name")),
        };
        self.advance();
        EnvVar::from_member(object, &member)
            .map(ExprKind::Env)
            .ok_or_else(|| {
                CompileError::unsupported(format!("`{object}.{member}` is not supported"), location)
            })
    }

    fn reject_postfix(&self) -> Result<(), CompileError> {
        let what = match self.peek_kind() {
            TokenKind::LParen => "function calls are not supported",
            TokenKind::LBracket => "index access is not supported",
            TokenKind::Dot => "member access is not supported",
            _ => return Ok(()),
        };
        Err(CompileError::unsupported(what, self.location()))
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::lexer::tokenize;

    fn parse_src(source: &str) -> Result<ContractDef, CompileError> {
        parse(tokenize(source)?)
    }

    fn body_of(source: &str) -> Block {
        let wrapped = format!("contract T {{ function f() public {{ {source} }} }}");
        parse_src(&wrapped).unwrap().functions.remove(0).body
    }

    fn error_kind(source: &str) -> CompileErrorKind {
        parse_src(source).unwrap_err().kind
    }

    #[test]
    fn test_parse_contract_shape() {
        let def = parse_src(
            "pragma solidity ^0.8.0;
             contract Counter {
                 uint256 count;
                 address owner;
                 constructor(uint256 start) payable { count = start; }
                 function get() public view returns (uint256) { return count; }
                 function add(uint256 a, uint256 b) external pure returns (uint) { return a + b; }
                 function bump() public { count += 1; }
             }",
        )
        .unwrap();

        assert_eq!(def.name, "Counter");
        assert_eq!(def.state_vars.len(), 2);
        assert_eq!(def.state_vars[1].ty, Type::Address);
        let ctor = def.constructor.as_ref().unwrap();
        assert!(ctor.payable);
        assert_eq!(ctor.params[0].name, "start");
        assert_eq!(def.functions.len(), 3);
        assert_eq!(def.functions[0].mutability, StateMutability::View);
        assert_eq!(def.functions[1].signature(), "add(uint256,uint256)");
        assert_eq!(def.functions[2].mutability, StateMutability::NonPayable);
        assert_eq!(def.functions[2].returns, None);
    }

    #[test]
    fn test_precedence() {
        let body = body_of("uint256 x = 1 + 2 * 3 < 10 && true;");
        let StmtKind::Local { init: Some(init), .. } = &body[0].kind else {
            panic!("expected local");
        };
        // ((1 + (2 * 3)) < 10) && true
        let ExprKind::Binary { op: BinOp::And, lhs, .. } = &init.kind else {
            panic!("expected &&");
        };
        let ExprKind::Binary { op: BinOp::Lt, lhs: sum, .. } = &lhs.kind else {
            panic!("expected <");
        };
        let ExprKind::Binary { op: BinOp::Add, rhs: product, .. } = &sum.kind else {
            panic!("expected +");
        };
        assert!(matches!(product.kind, ExprKind::Binary { op: BinOp::Mul, .. }));
    }

    #[test]
    fn test_compound_assignment_desugars() {
        let body = body_of("x -= 2; y++;");
        let StmtKind::Assign { target, value } = &body[0].kind else {
            panic!("expected assignment");
        };
        assert_eq!(target, "x");
        let ExprKind::Binary { op: BinOp::Sub, lhs, .. } = &value.kind else {
            panic!("expected -");
        };
        assert_eq!(lhs.kind, ExprKind::Ident("x".into()));

        let StmtKind::Assign { value, .. } = &body[1].kind else {
            panic!("expected assignment");
        };
        assert!(matches!(value.kind, ExprKind::Binary { op: BinOp::Add, .. }));
    }

    #[test]
    fn test_control_flow_and_environment() {
        let body = body_of(
            "if (msg.sender == tx.origin) { return; } else if (block.number > 5) x = 1;
             while (x < 10) { x += 1; }
             require(msg.value == 0);",
        );
        assert_eq!(body.len(), 3);
        let StmtKind::If { else_branch: Some(else_branch), .. } = &body[0].kind else {
            panic!("expected if/else");
        };
        assert!(matches!(else_branch[0].kind, StmtKind::If { .. }));
        assert!(matches!(body[1].kind, StmtKind::While { .. }));
        assert!(matches!(body[2].kind, StmtKind::Require(_)));
    }

    #[test]
    fn test_unsupported_constructs() {
        let cases = [
            "contract T { mapping(address => uint256) balances; }",
            "contract T { uint256 public x; }",
            "contract T { event Done(); }",
            "contract T { function f() internal {} }",
            "contract T { function f() public onlyOwner {} }",
            "contract T { function f() public returns (uint256, uint256) {} }",
            "contract T { function f() public { for (;;) {} } }",
            "contract T { function f() public { g(); } }",
            "contract T { function f() public { uint256 x = 0 - -1; } }",
            "contract T { function f() public { require(true, \"no\"); } }",
            "contract T { function f() public { uint8 x; } }",
            "contract T { function f() public view returns (uint256) { return msg.data; } }",
            "contract T is Base {}",
            "contract A {} contract B {}",
        ];
        for source in cases {
            assert_eq!(
                error_kind(source),
                CompileErrorKind::UnsupportedFeature,
                "source: {source}"
            );
        }
    }

    #[test]
    fn test_syntax_errors_have_locations() {
        let err = parse_src("contract T {\n  uint256 x\n}").unwrap_err();
        assert_eq!(err.kind, CompileErrorKind::Syntax);
        assert_eq!(err.location, SourceLocation::new(3, 1));

        assert_eq!(error_kind("contract T { function f() {} }"), CompileErrorKind::Syntax);
        assert_eq!(error_kind("contract T { uint256 while; }"), CompileErrorKind::Syntax);
        assert_eq!(error_kind(""), CompileErrorKind::Syntax);
        assert_eq!(error_kind("contract T { foo x; }"), CompileErrorKind::Syntax);
    }

    fn returning(expr: &str) -> String {
        format!("contract T {{ function f() public pure returns (uint256) {{ return {expr}; }} }}")
    }

    #[test]
    fn test_deep_nesting_is_rejected() {
        let parens = format!("{}1{}", "(".repeat(10_000), ")".repeat(10_000));
        let bangs = format!(
            "contract T {{ function f() public pure returns (bool) {{ return {}true; }} }}",
            "!".repeat(10_000)
        );
        let blocks = format!(
            "contract T {{ function f() public {{ {}{} }} }}",
            "{".repeat(10_000),
            "}".repeat(10_000)
        );
        let ifs = format!(
            "contract T {{ function f() public {{ {} return; }} }}",
            "if (true) ".repeat(10_000)
        );
        let chain = returning(&vec!["1"; 10_000].join(" + "));

        for source in [returning(&parens), bangs, blocks, ifs, chain] {
            let err = parse_src(&source).unwrap_err();
            assert_eq!(err.kind, CompileErrorKind::UnsupportedFeature);
            assert!(err.message.contains("nesting too deep"), "{}", err.message);
        }
    }

    #[test]
    fn test_moderate_nesting_is_accepted() {
        let parens = format!("{}1{}", "(".repeat(20), ")".repeat(20));
        assert!(parse_src(&returning(&parens)).is_ok());
        assert!(parse_src(&returning(&vec!["1"; 20].join(" * "))).is_ok());

        let depth_limit = format!(
            "{}1{}",
            "(".repeat(MAX_NESTING + 1),
            ")".repeat(MAX_NESTING + 1)
        );
        assert_eq!(
            error_kind(&returning(&depth_limit)),
            CompileErrorKind::UnsupportedFeature
        );
    }

    #[test]
    fn test_duplicate_constructor() {
        assert_eq!(
            error_kind("contract T { constructor() {} constructor() {} }"),
            CompileErrorKind::DuplicateDeclaration
        );
    }
}
