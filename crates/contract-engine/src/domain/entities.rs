//! # Core Domain Entities
//!
//! The per-call environment handed to the VM and the structured result it
//! hands back.

use crate::domain::value_objects::{Address, Bytes, Word, U256};
use crate::errors::VmError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Storage writes of one call, keyed by slot. Ordered so that every node
/// iterates (and serializes) it identically.
pub type StateChanges = BTreeMap<Word, Word>;

// =============================================================================
// EXECUTION CONTEXT
// =============================================================================

/// Immutable environment of a single call.
///
/// Built by the caller (the transaction-processing layer) and never mutated
/// while the call runs.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ExecutionContext {
    /// Transaction sender (the account that signed the transaction).
    pub origin: Address,
    /// Immediate caller.
    pub caller: Address,
    /// Contract whose storage this call reads and stages writes for.
    pub address: Address,
    /// Value attached to the call.
    pub value: U256,
    /// Opaque input payload.
    pub calldata: Bytes,
    /// Gas price of the enclosing transaction.
    pub gas_price: U256,
    /// Block the call executes in.
    pub block: BlockContext,
    /// Nesting depth (0 for a top-level call).
    pub depth: u16,
}

impl ExecutionContext {
    /// Creates the context for a top-level transaction.
    #[must_use]
    pub fn new_transaction(
        caller: Address,
        to: Address,
        value: U256,
        calldata: Bytes,
        gas_price: U256,
        block: BlockContext,
    ) -> Self {
        Self {
            origin: caller,
            caller,
            address: to,
            value,
            calldata,
            gas_price,
            block,
            depth: 0,
        }
    }

    /// Derives the context and gas budget of a nested call.
    ///
    /// The nested contract becomes the storage target, the current contract
    /// becomes the caller, and the budget is `requested_gas` capped at
    /// `parent_remaining`. Returns `None` once `max_depth` would be exceeded.
    #[must_use]
    pub fn derive_nested(
        &self,
        target: Address,
        value: U256,
        calldata: Bytes,
        requested_gas: u64,
        parent_remaining: u64,
        max_depth: u16,
    ) -> Option<(Self, u64)> {
        let depth = self.depth.checked_add(1)?;
        if depth > max_depth {
            return None;
        }
        let child = Self {
            origin: self.origin,
            caller: self.address,
            address: target,
            value,
            calldata,
            gas_price: self.gas_price,
            block: self.block.clone(),
            depth,
        };
        Some((child, requested_gas.min(parent_remaining)))
    }
}

// =============================================================================
// BLOCK CONTEXT
// =============================================================================

/// Block-level information readable by contracts.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockContext {
    /// Block number.
    pub number: u64,
    /// Block timestamp (unix seconds).
    pub timestamp: u64,
    /// Chain identifier.
    pub chain_id: u64,
}

impl Default for BlockContext {
    fn default() -> Self {
        Self {
            number: 0,
            timestamp: 0,
            chain_id: 1,
        }
    }
}

// =============================================================================
// HALT REASON
// =============================================================================

/// Terminal interpreter state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum HaltReason {
    /// STOP, RETURN, or end of code.
    Success,
    /// REVERT.
    Reverted,
    /// Gas deduction would have gone negative.
    OutOfGas,
    /// Undefined opcode or INVALID.
    InvalidOpcode,
    /// Stack underflow or overflow.
    StackFault,
    /// JUMP/JUMPI to something other than a JUMPDEST.
    InvalidJumpTarget,
    /// Memory access beyond the configured bound.
    MemoryOutOfBounds,
}

impl From<&VmError> for HaltReason {
    fn from(err: &VmError) -> Self {
        match err {
            VmError::OutOfGas => Self::OutOfGas,
            VmError::StackOverflow | VmError::StackUnderflow => Self::StackFault,
            VmError::InvalidOpcode(_) => Self::InvalidOpcode,
            VmError::InvalidJump(_) => Self::InvalidJumpTarget,
            VmError::MemoryOutOfBounds { .. } => Self::MemoryOutOfBounds,
            VmError::Revert => Self::Reverted,
        }
    }
}

// =============================================================================
// EXECUTION RESULT
// =============================================================================

/// Outcome of one `execute` call.
///
/// `state_changes` is non-empty only when `success` is true.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExecutionResult {
    /// Whether the call halted with `HaltReason::Success`.
    pub success: bool,
    /// How the call halted.
    pub halt: HaltReason,
    /// `gas_limit - gas_remaining` at halt.
    pub gas_used: u64,
    /// Halt cause when not successful.
    pub error: Option<VmError>,
    /// Staged storage writes, committed by the ledger on success.
    pub state_changes: StateChanges,
    /// RETURN or REVERT payload.
    pub return_data: Bytes,
}

impl ExecutionResult {
    /// Creates a successful execution result.
    #[must_use]
    pub fn success(state_changes: StateChanges, return_data: Bytes, gas_used: u64) -> Self {
        Self {
            success: true,
            halt: HaltReason::Success,
            gas_used,
            error: None,
            state_changes,
            return_data,
        }
    }

    /// Creates a failed execution result. Any staged writes are dropped.
    #[must_use]
    pub fn failure(error: VmError, return_data: Bytes, gas_used: u64) -> Self {
        Self {
            success: false,
            halt: HaltReason::from(&error),
            gas_used,
            error: Some(error),
            state_changes: StateChanges::new(),
            return_data,
        }
    }

    /// Textual classification of the error, if any.
    #[must_use]
    pub fn error_kind(&self) -> Option<&'static str> {
        self.error.as_ref().map(VmError::kind)
    }

    /// Returns the first 32 bytes of `return_data` as a word.
    #[must_use]
    pub fn return_word(&self) -> Option<Word> {
        self.return_data
            .as_slice()
            .get(..32)
            .map(U256::from_big_endian)
    }

    /// Builds the serializable report handed to external callers.
    #[must_use]
    pub fn to_report(&self) -> ExecutionReport {
        ExecutionReport {
            success: self.success,
            gas_used: self.gas_used,
            error: self.error_kind().map(str::to_string),
            state_changes: self.state_changes.clone(),
            return_data: self.return_data.clone(),
        }
    }
}

/// Wire form of an `ExecutionResult`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionReport {
    /// Whether execution succeeded.
    pub success: bool,
    /// Gas consumed.
    pub gas_used: u64,
    /// Machine-classifiable error string.
    pub error: Option<String>,
    /// Slot to value writes (empty on failure).
    pub state_changes: StateChanges,
    /// Hex-encoded return data.
    pub return_data: Bytes,
}

// =============================================================================
// VM CONFIGURATION
// =============================================================================

/// Interpreter resource limits.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VmConfig {
    /// Maximum stack depth (default: 1024).
    pub max_stack_size: usize,
    /// Maximum memory size in bytes (default: 16MB).
    pub max_memory_size: usize,
    /// Maximum runtime code size in bytes (default: 24KB).
    pub max_code_size: usize,
    /// Maximum nesting depth for derived contexts (default: 1024).
    pub max_call_depth: u16,
}

impl Default for VmConfig {
    fn default() -> Self {
        Self {
            max_stack_size: 1024,
            max_memory_size: 16 * 1024 * 1024,
            max_code_size: 24_576,
            max_call_depth: 1024,
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn parent() -> ExecutionContext {
        ExecutionContext::new_transaction(
            Address::new([1u8; 20]),
            Address::new([2u8; 20]),
            U256::from(100),
            Bytes::from_slice(&[0x01, 0x02]),
            U256::from(1),
            BlockContext::default(),
        )
    }

    #[test]
    fn test_derive_nested_context() {
        let (child, budget) = parent()
            .derive_nested(
                Address::new([3u8; 20]),
                U256::zero(),
                Bytes::new(),
                500,
                10_000,
                1024,
            )
            .unwrap();

        assert_eq!(child.origin, Address::new([1u8; 20])); // Origin preserved
        assert_eq!(child.caller, Address::new([2u8; 20]));
        assert_eq!(child.address, Address::new([3u8; 20]));
        assert_eq!(child.depth, 1);
        assert_eq!(budget, 500);
    }

    #[test]
    fn test_derive_nested_budget_capped_by_parent() {
        let (_, budget) = parent()
            .derive_nested(Address::ZERO, U256::zero(), Bytes::new(), 50_000, 1_200, 1024)
            .unwrap();
        assert_eq!(budget, 1_200);
    }

    #[test]
    fn test_derive_nested_depth_limit() {
        let mut ctx = parent();
        ctx.depth = 4;
        assert!(ctx
            .derive_nested(Address::ZERO, U256::zero(), Bytes::new(), 1, 1, 4)
            .is_none());
    }

    #[test]
    fn test_failure_drops_state_changes() {
        let result = ExecutionResult::failure(VmError::OutOfGas, Bytes::new(), 10);
        assert!(!result.success);
        assert_eq!(result.halt, HaltReason::OutOfGas);
        assert!(result.state_changes.is_empty());
        assert_eq!(result.error_kind(), Some("OutOfGas"));
    }

    #[test]
    fn test_report_serialization() {
        let mut changes = StateChanges::new();
        changes.insert(U256::zero(), U256::from(42));
        let result = ExecutionResult::success(changes, Bytes::from_slice(&[0xAA]), 20_006);

        let json = serde_json::to_value(result.to_report()).unwrap();
        assert_eq!(json["success"], true);
        assert_eq!(json["gasUsed"], 20_006);
        assert!(json["error"].is_null());
        assert_eq!(json["returnData"], "aa");
        assert_eq!(json["stateChanges"]["0x0"], "0x2a");
    }

    #[test]
    fn test_vm_config_defaults() {
        let config = VmConfig::default();
        assert_eq!(config.max_call_depth, 1024);
        assert_eq!(config.max_code_size, 24_576);
        assert_eq!(config.max_stack_size, 1024);
        assert_eq!(config.max_memory_size, 16 * 1024 * 1024);
    }
}
