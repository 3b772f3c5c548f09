//! # Contract Engine
//!
//! A deterministic, gas-metered stack machine and a compiler from a small
//! contract language to its bytecode.
//!
//! ## Purpose
//!
//! Contracts are written in a Solidity-flavoured subset, compiled to
//! deployment bytecode plus an ABI, installed by running the deployment code,
//! and invoked with 4-byte selector calldata. Every call runs against a
//! read-only view of committed storage; writes are staged and handed back as
//! a diff that the ledger commits only when the call succeeds.
//!
//! ## Properties
//!
//! | Property | Enforcement |
//! |----------|-------------|
//! | `gas_used <= gas_limit` | `evm/interpreter.rs`, `domain/invariants.rs` |
//! | Failed calls carry no state changes | `ExecutionResult::failure` |
//! | Same input, same output on every node | no clock, randomness or I/O in `evm/` |
//! | Compilation is a pure function of source | `compiler/` |
//!
//! ### Resource Limits
//!
//! | Limit | Default |
//! |-------|---------|
//! | `max_stack_size` | 1024 |
//! | `max_memory_size` | 16 MB |
//! | `max_code_size` | 24 KB |
//! | `max_call_depth` | 1024 |
//! | `max_gas_limit` | 30,000,000 |
//!
//! ## Components
//!
//! | Component | Location | Purpose |
//! |-----------|----------|---------|
//! | Opcode table | `evm/opcodes.rs` | Static byte to metadata table |
//! | Interpreter | `evm/interpreter.rs` | Decode-dispatch loop |
//! | Storage | `evm/storage.rs` | Committed view and staged diff |
//! | Compiler | `compiler/` | Lexer, parser, code generator, ABI |
//! | Service | `service.rs` | Deploy/call façade over a `ContractStore` |
//! | Events | `events.rs`, `adapters/event_handler.rs` | Transaction boundary |
//!
//! ## Usage Example
//!
//! ```ignore
//! use contract_engine::prelude::*;
//!
//! let service = ContractService::new(InMemoryLedger::new(), ServiceConfig::default());
//! let receipt = service
//!     .deploy(DeployRequest::new(sender, source, 1_000_000), &block)
//!     .await?;
//!
//! let calldata = encode_call(Selector::from_signature("get()").bytes(), &[]);
//! let call = service
//!     .call(CallRequest::new(sender, receipt.contract_address.unwrap(), calldata, 100_000), &block)
//!     .await?;
//! println!("Gas used: {}", call.result.gas_used);
//! ```

// Crate-level lints
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::similar_names)]

// =============================================================================
// MODULES
// =============================================================================

pub mod adapters;
pub mod compiler;
pub mod config;
pub mod domain;
pub mod errors;
pub mod events;
pub mod evm;
pub mod metrics;
pub mod ports;
pub mod service;

// =============================================================================
// PRELUDE
// =============================================================================

/// Convenient re-exports for common usage.
pub mod prelude {
    // Domain entities
    pub use crate::domain::entities::{
        BlockContext, ExecutionContext, ExecutionReport, ExecutionResult, HaltReason,
        StateChanges, VmConfig,
    };

    // Value objects
    pub use crate::domain::value_objects::{Address, Bytes, GasCounter, Hash, Word, U256};

    // Domain services
    pub use crate::domain::services::{
        compute_contract_address, decode_word, encode_call, encode_words, keccak256,
    };

    // Invariants
    pub use crate::domain::invariants::{
        check_all_invariants, InvariantCheckResult, InvariantViolation,
    };

    // Compiler
    pub use crate::compiler::{
        compile, compile_report, AbiEntry, AbiParam, CompileReport, CompiledContract, Selector,
        StateMutability, StorageSlot, Type,
    };

    // Ports
    pub use crate::ports::inbound::{
        CallReceipt, CallRequest, ContractEngineApi, DeployReceipt, DeployRequest,
    };
    pub use crate::ports::outbound::{ContractStore, DeployedContract, EmptyStorage, StorageView};

    // Events
    pub use crate::events::{
        topics, DeploymentPayload, TransactionRequestPayload, TransactionResponsePayload,
    };

    // Errors
    pub use crate::errors::{
        CompileError, CompileErrorKind, ConfigError, ServiceError, SourceLocation, VmError,
    };

    // VM components
    pub use crate::evm::{
        execute, execute_with_config, AccountStorage, Interpreter, Memory, Opcode, Stack,
        StorageOverlay,
    };

    // Adapters
    pub use crate::adapters::{InMemoryLedger, InboundMessage, TransactionEventHandler};

    // Service
    pub use crate::config::ServiceConfig;
    pub use crate::service::{ContractService, ServiceStats};
}

// =============================================================================
// CRATE INFO
// =============================================================================

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn test_prelude_exports() {
        use prelude::*;
        let _ = VmConfig::default();
        let _ = ServiceConfig::default();
        let _ = Address::ZERO;
        let _ = Selector::from_signature("get()");
    }
}
