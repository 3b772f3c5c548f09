//! Syntax tree produced by the parser.

#![allow(missing_docs)]

use crate::compiler::abi::StateMutability;
use crate::domain::value_objects::U256;
use crate::errors::SourceLocation;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Value types of the language. Every value fits in one word.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Type {
    /// 256-bit unsigned integer (`uint256`, or the `uint` alias).
    Uint256,
    /// `true` / `false`, stored as 1 / 0.
    Bool,
    /// 20-byte account address, right-aligned in a word.
    Address,
}

impl Type {
    /// Resolves a type keyword.
    #[must_use]
    pub fn from_keyword(word: &str) -> Option<Self> {
        match word {
            "uint256" | "uint" => Some(Self::Uint256),
            "bool" => Some(Self::Bool),
            "address" => Some(Self::Address),
            _ => None,
        }
    }

    /// Name used in canonical function signatures.
    #[must_use]
    pub const fn canonical(self) -> &'static str {
        match self {
            Self::Uint256 => "uint256",
            Self::Bool => "bool",
            Self::Address => "address",
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.canonical())
    }
}

/// A whole source file: exactly one contract.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ContractDef {
    pub name: String,
    pub state_vars: Vec<StateVar>,
    pub constructor: Option<Constructor>,
    pub functions: Vec<FunctionDef>,
    pub location: SourceLocation,
}

/// Storage-backed variable. Its slot is its declaration index.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StateVar {
    pub name: String,
    pub ty: Type,
    pub initializer: Option<Expr>,
    pub location: SourceLocation,
}

/// Named, typed parameter.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Param {
    pub name: String,
    pub ty: Type,
    pub location: SourceLocation,
}

/// Deployment-time body.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Constructor {
    pub params: Vec<Param>,
    pub payable: bool,
    pub body: Block,
    pub location: SourceLocation,
}

/// Externally callable function.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FunctionDef {
    pub name: String,
    pub params: Vec<Param>,
    pub returns: Option<Type>,
    pub mutability: StateMutability,
    pub body: Block,
    pub location: SourceLocation,
}

impl FunctionDef {
    /// `name(type1,type2,...)`, the selector preimage.
    #[must_use]
    pub fn signature(&self) -> String {
        let types: Vec<&str> = self.params.iter().map(|p| p.ty.canonical()).collect();
        format!("{}({})", self.name, types.join(","))
    }
}

pub type Block = Vec<Stmt>;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Stmt {
    pub kind: StmtKind,
    pub location: SourceLocation,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StmtKind {
    /// `T name;` or `T name = init;`
    Local {
        name: String,
        ty: Type,
        init: Option<Expr>,
    },
    /// `target = value;` Compound forms are desugared into a binary value.
    Assign { target: String, value: Expr },
    Return(Option<Expr>),
    Require(Expr),
    If {
        cond: Expr,
        then_branch: Block,
        else_branch: Option<Block>,
    },
    While { cond: Expr, body: Block },
    Block(Block),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Expr {
    pub kind: ExprKind,
    pub location: SourceLocation,
}

impl Expr {
    #[must_use]
    pub fn new(kind: ExprKind, location: SourceLocation) -> Self {
        Self { kind, location }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ExprKind {
    Number(U256),
    Bool(bool),
    Ident(String),
    Env(EnvVar),
    Not(Box<Expr>),
    Binary {
        op: BinOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
}

/// Read-only transaction and block fields.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EnvVar {
    MsgSender,
    MsgValue,
    BlockTimestamp,
    BlockNumber,
    BlockChainId,
    TxGasPrice,
    TxOrigin,
}

impl EnvVar {
    /// Resolves `object.member`.
    #[must_use]
    pub fn from_member(object: &str, member: &str) -> Option<Self> {
        match (object, member) {
            ("msg", "sender") => Some(Self::MsgSender),
            ("msg", "value") => Some(Self::MsgValue),
            ("block", "timestamp") => Some(Self::BlockTimestamp),
            ("block", "number") => Some(Self::BlockNumber),
            ("block", "chainid") => Some(Self::BlockChainId),
            ("tx", "gasprice") => Some(Self::TxGasPrice),
            ("tx", "origin") => Some(Self::TxOrigin),
            _ => None,
        }
    }

    #[must_use]
    pub const fn ty(self) -> Type {
        match self {
            Self::MsgSender | Self::TxOrigin => Type::Address,
            _ => Type::Uint256,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BinOp {
    Mul,
    Div,
    Mod,
    Add,
    Sub,
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
    And,
    Or,
}

impl BinOp {
    #[must_use]
    pub const fn symbol(self) -> &'static str {
        match self {
            Self::Mul => "*",
            Self::Div => "/",
            Self::Mod => "%",
            Self::Add => "+",
            Self::Sub => "-",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
            Self::Eq => "==",
            Self::Ne => "!=",
            Self::And => "&&",
            Self::Or => "||",
        }
    }
}
