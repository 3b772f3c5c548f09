//! # Contract Compiler
//!
//! Source text to deployment bytecode plus ABI, in three passes:
//! `lexer` (tokens with positions), `parser` (syntax tree), and `codegen`
//! (type checking, storage layout, dispatcher and bytecode).
//!
//! The compiler never panics on user input and never returns bytecode for a
//! source that failed any check. Output is a pure function of the source:
//! compiling identical text twice yields identical bytes and ABI.

pub mod abi;
pub mod ast;
mod codegen;
pub mod lexer;
pub mod parser;

pub use abi::{AbiEntry, AbiParam, Selector, StateMutability};
pub use ast::Type;

use crate::domain::value_objects::{Bytes, Word};
use crate::errors::CompileError;
use serde::{Deserialize, Serialize};

/// Storage slot assigned to a state variable.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageSlot {
    /// Variable name.
    pub name: String,
    /// Slot index, equal to the declaration index.
    pub slot: u64,
    /// Value type.
    #[serde(rename = "type")]
    pub ty: Type,
}

/// Successful compilation output.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompiledContract {
    /// Contract name.
    pub name: String,
    /// Deployment code: runs the constructor and returns `runtime_bytecode`.
    pub bytecode: Bytes,
    /// Code installed at the contract address.
    pub runtime_bytecode: Bytes,
    /// One entry per public or external function, in declaration order.
    pub abi: Vec<AbiEntry>,
    /// Constructor parameters, encoded as 32-byte words without a selector.
    pub constructor_inputs: Vec<AbiParam>,
    /// State variables in slot order.
    pub storage_layout: Vec<StorageSlot>,
}

impl CompiledContract {
    /// ABI entry of the named function.
    #[must_use]
    pub fn function(&self, name: &str) -> Option<&AbiEntry> {
        abi::find(&self.abi, name)
    }

    /// Call data for `name(args...)`, if the function exists.
    #[must_use]
    pub fn encode_call(&self, name: &str, args: &[Word]) -> Option<Bytes> {
        self.function(name).map(|entry| entry.encode_call(args))
    }

    /// Slot of the named state variable.
    #[must_use]
    pub fn slot_of(&self, name: &str) -> Option<u64> {
        self.storage_layout
            .iter()
            .find(|s| s.name == name)
            .map(|s| s.slot)
    }
}

/// Serializable outcome of a compile request.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CompileReport {
    /// Whether compilation succeeded.
    pub success: bool,
    /// Deployment bytecode as hex; empty on failure.
    pub bytecode: String,
    /// ABI; empty on failure.
    pub abi: Vec<AbiEntry>,
    /// Classified error text on failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<&Result<CompiledContract, CompileError>> for CompileReport {
    fn from(result: &Result<CompiledContract, CompileError>) -> Self {
        match result {
            Ok(contract) => Self {
                success: true,
                bytecode: contract.bytecode.to_hex(),
                abi: contract.abi.clone(),
                error: None,
            },
            Err(err) => Self {
                success: false,
                bytecode: String::new(),
                abi: Vec::new(),
                error: Some(err.to_string()),
            },
        }
    }
}

/// Compiles contract source.
///
/// # Errors
///
/// Returns the first syntax, name, type, mutability or unsupported-feature
/// error with its source location.
pub fn compile(source: &str) -> Result<CompiledContract, CompileError> {
    let tokens = lexer::tokenize(source)?;
    let contract = parser::parse(tokens)?;
    let program = codegen::generate(&contract)?;

    let constructor_inputs = contract
        .constructor
        .as_ref()
        .map(|ctor| {
            ctor.params
                .iter()
                .map(|p| AbiParam {
                    name: p.name.clone(),
                    ty: p.ty,
                })
                .collect()
        })
        .unwrap_or_default();
    let storage_layout = contract
        .state_vars
        .iter()
        .zip(0u64..)
        .map(|(var, slot)| StorageSlot {
            name: var.name.clone(),
            slot,
            ty: var.ty,
        })
        .collect();

    Ok(CompiledContract {
        name: contract.name,
        bytecode: Bytes::from(program.deploy),
        runtime_bytecode: Bytes::from(program.runtime),
        abi: program.abi,
        constructor_inputs,
        storage_layout,
    })
}

/// `compile` flattened into its report form.
#[must_use]
pub fn compile_report(source: &str) -> CompileReport {
    CompileReport::from(&compile(source))
}

// =============================================================================
// TESTS
// =============================================================================
