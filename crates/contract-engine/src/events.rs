//! # Event Schema
//!
//! Payloads exchanged with the transaction-processing layer. Every request
//! carries a correlation id in its envelope; the response echoes it.
//!
//! | Message | Direction |
//! |---------|-----------|
//! | `TransactionRequestPayload` | inbound |
//! | `TransactionResponsePayload` | outbound |
//!
//! A request with `to == None` is a deployment and its `data` is a JSON
//! `DeploymentPayload`; otherwise `data` is raw calldata.

use crate::domain::entities::{BlockContext, ExecutionResult, StateChanges};
use crate::domain::value_objects::{Address, Bytes, Word, U256};
use crate::errors::ServiceError;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// =============================================================================
// INBOUND EVENTS
// =============================================================================

/// A transaction that targets the contract engine.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TransactionRequestPayload {
    /// Transaction sender.
    pub from: Address,
    /// Called contract (None for deployment).
    pub to: Option<Address>,
    /// Attached value.
    pub value: U256,
    /// Gas price.
    pub gas_price: U256,
    /// Gas limit; zero means "use the configured default".
    pub gas_limit: u64,
    /// Calldata, or the JSON deployment payload.
    pub data: Bytes,
    /// Block the transaction executes in.
    pub block_context: BlockContext,
}

/// Contents of `data` for a deployment.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentPayload {
    /// Contract source text.
    pub source: String,
    /// Constructor arguments as hex words.
    #[serde(default)]
    pub constructor_args: Vec<Word>,
}

impl DeploymentPayload {
    /// Decodes a deployment payload from transaction data.
    ///
    /// # Errors
    ///
    /// `InvalidPayload` if `data` is not valid JSON of this shape.
    pub fn decode(data: &[u8]) -> Result<Self, ServiceError> {
        serde_json::from_slice(data).map_err(|e| ServiceError::InvalidPayload(e.to_string()))
    }

    /// Encodes the payload as transaction data.
    #[must_use]
    pub fn encode(&self) -> Bytes {
        // Serializing plain strings and words cannot fail.
        Bytes::from(serde_json::to_vec(self).unwrap_or_default())
    }
}

// =============================================================================
// OUTBOUND EVENTS
// =============================================================================

/// Outcome of a transaction, published back to the caller.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionResponsePayload {
    /// Correlation id of the request.
    pub correlation_id: Uuid,
    /// Whether execution succeeded.
    pub success: bool,
    /// Gas consumed (zero for requests rejected before execution).
    pub gas_used: u64,
    /// Machine-classifiable error string.
    pub error: Option<String>,
    /// Human-readable error detail.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    /// Committed storage writes.
    pub state_changes: StateChanges,
    /// RETURN or REVERT payload.
    pub return_data: Bytes,
    /// Address of a newly deployed contract.
    pub contract_address: Option<Address>,
}

impl TransactionResponsePayload {
    /// Response for a transaction that executed (successfully or not).
    #[must_use]
    pub fn executed(
        correlation_id: Uuid,
        result: &ExecutionResult,
        contract_address: Option<Address>,
    ) -> Self {
        Self {
            correlation_id,
            success: result.success,
            gas_used: result.gas_used,
            error: result.error_kind().map(str::to_string),
            detail: result.error.as_ref().map(ToString::to_string),
            state_changes: result.state_changes.clone(),
            return_data: result.return_data.clone(),
            contract_address,
        }
    }

    /// Response for a transaction rejected before execution.
    #[must_use]
    pub fn rejected(correlation_id: Uuid, error: &ServiceError) -> Self {
        Self {
            correlation_id,
            success: false,
            gas_used: 0,
            error: Some(error.kind().to_string()),
            detail: Some(error.to_string()),
            state_changes: StateChanges::new(),
            return_data: Bytes::new(),
            contract_address: None,
        }
    }
}

// =============================================================================
// EVENT BUS TOPICS
// =============================================================================

/// Topic names used by the contract engine.
pub mod topics {
    /// Incoming transactions.
    pub const TRANSACTION_REQUEST: &str = "contract_engine.transaction.request";

    /// Outcomes of incoming transactions.
    pub const TRANSACTION_RESPONSE: &str = "contract_engine.transaction.response";

    /// Requests that could not be decoded.
    pub const DLQ: &str = "dlq.contract_engine";
}

// =============================================================================
// TESTS
// =============================================================================
