//! # Driven Ports (SPI - Outbound)
//!
//! What the engine needs from the ledger that owns committed state.
//!
//! - `StorageView`: synchronous, read-only view of one account's committed
//!   storage, handed to the interpreter for the duration of a call.
//! - `ContractStore`: the ledger itself. Holds deployed code and committed
//!   storage, and is the only place a staged diff is ever merged.

use crate::compiler::abi::AbiEntry;
use crate::domain::entities::StateChanges;
use crate::domain::value_objects::{Address, Bytes, Hash, Word};
use crate::errors::ServiceError;
use crate::evm::storage::AccountStorage;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

// =============================================================================
// STORAGE VIEW
// =============================================================================

/// Read access to committed storage of the account a call targets.
///
/// Reads of a slot that was never written yield zero. Implementations must
/// not change between the start and end of a call.
pub trait StorageView {
    /// Committed value of `slot`.
    fn load(&self, slot: Word) -> Word;
}

impl<S: StorageView + ?Sized> StorageView for &S {
    fn load(&self, slot: Word) -> Word {
        (**self).load(slot)
    }
}

/// Storage of an account with nothing committed. Used for deployment.
#[derive(Clone, Copy, Debug, Default)]
pub struct EmptyStorage;

impl StorageView for EmptyStorage {
    fn load(&self, _slot: Word) -> Word {
        Word::zero()
    }
}

// =============================================================================
// CONTRACT STORE (Ledger)
// =============================================================================

/// Code and interface installed at a contract address.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeployedContract {
    /// Runtime bytecode (dispatcher and function bodies).
    pub code: Bytes,
    /// Keccak-256 of `code`.
    pub code_hash: Hash,
    /// Callable interface.
    pub abi: Vec<AbiEntry>,
}

/// Ledger boundary: persists code and committed storage per account.
///
/// The engine does no locking of its own: the ordering layer serializes
/// calls that touch the same account. Implementations only need to be safe
/// to share between tasks.
#[async_trait]
pub trait ContractStore: Send + Sync {
    /// Deployed contract at `address`, if any.
    async fn contract(&self, address: Address) -> Option<DeployedContract>;

    /// Point-in-time copy of the committed storage of `address`.
    async fn storage_snapshot(&self, address: Address) -> AccountStorage;

    /// Installs a contract at a fresh address.
    ///
    /// # Errors
    ///
    /// Returns `ContractAlreadyExists` if code is already installed there.
    async fn install(
        &self,
        address: Address,
        contract: DeployedContract,
    ) -> Result<(), ServiceError>;

    /// Merges a successful call's staged diff into committed storage.
    async fn commit(&self, address: Address, changes: &StateChanges);

    /// Returns the sender's current deployment nonce and increments it.
    async fn next_nonce(&self, sender: Address) -> u64;
}
