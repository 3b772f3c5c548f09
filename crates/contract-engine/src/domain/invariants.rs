//! # Domain Invariants
//!
//! Properties every `ExecutionResult` must satisfy. The service checks them
//! after each call; a violation indicates an engine defect, never bad input.
//!
//! - Gas bound: `gas_used <= gas_limit`.
//! - Rollback: a failed call carries no state changes.
//! - Well-formedness: `success`, `halt` and `error` agree with each other.
//! - Depth: a context never exceeds the configured call depth.

use crate::domain::entities::{ExecutionContext, ExecutionResult, HaltReason, VmConfig};
use std::fmt;

// =============================================================================
// INVARIANT CHECKS
// =============================================================================

/// Execution never uses more gas than it was given.
#[must_use]
pub fn check_gas_limit_invariant(result: &ExecutionResult, gas_limit: u64) -> bool {
    result.gas_used <= gas_limit
}

/// No storage effect survives a failed call.
#[must_use]
pub fn check_revert_rollback_invariant(result: &ExecutionResult) -> bool {
    result.success || result.state_changes.is_empty()
}

/// `success` holds exactly when the halt is `Success` and no error is set,
/// and the error's classification matches the halt reason.
#[must_use]
pub fn check_result_well_formed(result: &ExecutionResult) -> bool {
    match (&result.error, result.success) {
        (None, true) => result.halt == HaltReason::Success,
        (Some(err), false) => result.halt == HaltReason::from(err),
        _ => false,
    }
}

/// A context's depth is within the configured limit.
#[must_use]
pub fn check_call_depth_invariant(ctx: &ExecutionContext, config: &VmConfig) -> bool {
    ctx.depth <= config.max_call_depth
}

/// Checks every invariant at once.
#[must_use]
pub fn check_all_invariants(
    ctx: &ExecutionContext,
    result: &ExecutionResult,
    gas_limit: u64,
    config: &VmConfig,
) -> InvariantCheckResult {
    let mut violations = Vec::new();

    if !check_gas_limit_invariant(result, gas_limit) {
        violations.push(InvariantViolation::GasLimitExceeded {
            used: result.gas_used,
            limit: gas_limit,
        });
    }

    if !check_revert_rollback_invariant(result) {
        violations.push(InvariantViolation::StateNotRolledBack {
            changes: result.state_changes.len(),
        });
    }

    if !check_result_well_formed(result) {
        violations.push(InvariantViolation::MalformedResult);
    }

    if !check_call_depth_invariant(ctx, config) {
        violations.push(InvariantViolation::CallDepthExceeded {
            depth: ctx.depth,
            max: config.max_call_depth,
        });
    }

    if violations.is_empty() {
        InvariantCheckResult::Valid
    } else {
        InvariantCheckResult::Invalid(violations)
    }
}

// =============================================================================
// INVARIANT TYPES
// =============================================================================

/// Result of checking all invariants.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InvariantCheckResult {
    /// All invariants hold.
    Valid,
    /// One or more invariants violated.
    Invalid(Vec<InvariantViolation>),
}

impl InvariantCheckResult {
    /// Returns true if all invariants hold.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid)
    }
}

/// Specific invariant violation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InvariantViolation {
    /// More gas used than supplied.
    GasLimitExceeded { used: u64, limit: u64 },
    /// Failed call still carries staged writes.
    StateNotRolledBack { changes: usize },
    /// `success`, `halt` and `error` disagree.
    MalformedResult,
    /// Context nested deeper than allowed.
    CallDepthExceeded { depth: u16, max: u16 },
}

impl fmt::Display for InvariantViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::GasLimitExceeded { used, limit } => {
                write!(f, "gas limit exceeded: used {used} > limit {limit}")
            }
            Self::StateNotRolledBack { changes } => {
                write!(f, "state not rolled back on failure: {changes} changes")
            }
            Self::MalformedResult => write!(f, "success flag, halt reason and error disagree"),
            Self::CallDepthExceeded { depth, max } => {
                write!(f, "call depth exceeded: {depth} > {max}")
            }
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
