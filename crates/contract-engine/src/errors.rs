//! # Error Types
//!
//! All error types for contract compilation and execution.

use crate::domain::value_objects::Address;
use serde::Serialize;
use std::fmt;
use thiserror::Error;

// =============================================================================
// VM ERRORS
// =============================================================================

/// Reasons a call halts without success.
///
/// None of these escape the interpreter: they are folded into
/// `ExecutionResult::error`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum VmError {
    /// Execution ran out of gas.
    #[error("out of gas")]
    OutOfGas,

    /// Stack overflow (more than the configured maximum entries).
    #[error("stack overflow")]
    StackOverflow,

    /// An opcode needed more arguments than the stack held.
    #[error("stack underflow")]
    StackUnderflow,

    /// Undefined opcode byte, or the designated INVALID opcode.
    #[error("invalid opcode: 0x{0:02X}")]
    InvalidOpcode(u8),

    /// Jump target is not a JUMPDEST.
    #[error("invalid jump destination: {0}")]
    InvalidJump(usize),

    /// Memory access beyond the configured maximum.
    #[error("memory access out of bounds: offset {offset}, size {size}")]
    MemoryOutOfBounds { offset: usize, size: usize },

    /// Execution reverted explicitly.
    #[error("execution reverted")]
    Revert,
}

impl VmError {
    /// Short, machine-classifiable error string.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::OutOfGas => "OutOfGas",
            Self::StackOverflow | Self::StackUnderflow => "StackFault",
            Self::InvalidOpcode(_) => "InvalidOpcode",
            Self::InvalidJump(_) => "InvalidJumpTarget",
            Self::MemoryOutOfBounds { .. } => "MemoryOutOfBounds",
            Self::Revert => "Reverted",
        }
    }
}

// =============================================================================
// COMPILE ERRORS
// =============================================================================

/// Position in contract source (1-based).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct SourceLocation {
    /// Line number.
    pub line: usize,
    /// Column number.
    pub column: usize,
}

impl SourceLocation {
    /// Creates a location.
    #[must_use]
    pub const fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// Classification of compile errors.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum CompileErrorKind {
    /// Unknown or malformed syntax.
    Syntax,
    /// Reference to a name that was never declared.
    UndeclaredIdentifier,
    /// Operand, assignment or return types disagree.
    TypeMismatch,
    /// Construct outside the supported language subset.
    UnsupportedFeature,
    /// Name declared twice in the same scope.
    DuplicateDeclaration,
    /// `view`/`pure` function touches state it may not touch.
    MutabilityViolation,
}

impl CompileErrorKind {
    /// Short, machine-classifiable error string.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Syntax => "CompileSyntaxError",
            Self::UndeclaredIdentifier => "CompileUndeclaredIdentifier",
            Self::TypeMismatch => "CompileTypeMismatch",
            Self::UnsupportedFeature => "CompileUnsupportedFeature",
            Self::DuplicateDeclaration => "CompileDuplicateDeclaration",
            Self::MutabilityViolation => "CompileMutabilityViolation",
        }
    }
}

/// A recoverable compile failure, reported instead of bytecode.
#[derive(Debug, Error, Clone, PartialEq, Eq, Serialize)]
#[error("{}: {message} at {location}", .kind.as_str())]
pub struct CompileError {
    /// Error classification.
    pub kind: CompileErrorKind,
    /// Human-readable description.
    pub message: String,
    /// Where in the source the error was detected.
    pub location: SourceLocation,
}

impl CompileError {
    /// Creates a compile error.
    #[must_use]
    pub fn new(kind: CompileErrorKind, message: impl Into<String>, location: SourceLocation) -> Self {
        Self {
            kind,
            message: message.into(),
            location,
        }
    }

    /// Shorthand for a syntax error.
    #[must_use]
    pub fn syntax(message: impl Into<String>, location: SourceLocation) -> Self {
        Self::new(CompileErrorKind::Syntax, message, location)
    }

    /// Shorthand for an unsupported-feature error.
    #[must_use]
    pub fn unsupported(message: impl Into<String>, location: SourceLocation) -> Self {
        Self::new(CompileErrorKind::UnsupportedFeature, message, location)
    }

    /// Shorthand for a type mismatch.
    #[must_use]
    pub fn type_mismatch(message: impl Into<String>, location: SourceLocation) -> Self {
        Self::new(CompileErrorKind::TypeMismatch, message, location)
    }
}

// =============================================================================
// SERVICE ERRORS
// =============================================================================

/// Errors raised by the service façade before or around execution.
///
/// Execution failures themselves are never errors here; they are reported in
/// the receipt.
#[derive(Debug, Error, Clone)]
pub enum ServiceError {
    /// No contract code is installed at the target address.
    #[error("no contract at address: {0:?}")]
    UnknownContract(Address),

    /// A contract already exists at the derived deployment address.
    #[error("contract already exists at address: {0:?}")]
    ContractAlreadyExists(Address),

    /// Requested gas limit is above the configured cap.
    #[error("gas limit {requested} exceeds maximum {max}")]
    GasLimitTooHigh { requested: u64, max: u64 },

    /// Deployment payload could not be decoded.
    #[error("invalid deployment payload: {0}")]
    InvalidPayload(String),

    /// Deployment source failed to compile.
    #[error(transparent)]
    Compile(#[from] CompileError),

    /// Runtime code returned by a constructor is above the configured cap.
    #[error("contract code size {size} exceeds maximum {max}")]
    CodeTooLarge { size: usize, max: usize },
}

impl ServiceError {
    /// Short, machine-classifiable error string.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::UnknownContract(_) => "UnknownContract",
            Self::ContractAlreadyExists(_) => "ContractAlreadyExists",
            Self::GasLimitTooHigh { .. } => "GasLimitTooHigh",
            Self::InvalidPayload(_) => "InvalidPayload",
            Self::Compile(err) => err.kind.as_str(),
            Self::CodeTooLarge { .. } => "CodeTooLarge",
        }
    }
}

// =============================================================================
// CONFIG ERRORS
// =============================================================================

/// Errors while loading configuration.
#[derive(Debug, Error, Clone)]
pub enum ConfigError {
    /// TOML text could not be parsed.
    #[error("invalid config file: {0}")]
    Parse(String),

    /// An environment variable held an unusable value.
    #[error("invalid value for {key}: {value}")]
    InvalidEnv { key: String, value: String },

    /// Values are individually valid but inconsistent.
    #[error("inconsistent config: {0}")]
    Inconsistent(String),
}

// =============================================================================
// TESTS
// =============================================================================
