//! # State Adapter
//!
//! In-memory ledger: deployed code, committed storage and deployment nonces.
//! A durable ledger would implement the same `ContractStore` port.

use crate::domain::entities::StateChanges;
use crate::domain::value_objects::Address;
use crate::errors::ServiceError;
use crate::evm::storage::AccountStorage;
use crate::ports::outbound::{ContractStore, DeployedContract};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;

/// Ledger held entirely in memory.
#[derive(Debug, Default)]
pub struct InMemoryLedger {
    /// Installed contracts.
    contracts: RwLock<HashMap<Address, DeployedContract>>,
    /// Committed storage per contract.
    storage: RwLock<HashMap<Address, AccountStorage>>,
    /// Deployment nonce per sender.
    nonces: RwLock<HashMap<Address, u64>>,
}

impl InMemoryLedger {
    /// Create a new empty ledger.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of installed contracts.
    #[must_use]
    pub fn contract_count(&self) -> usize {
        self.contracts.read().len()
    }

    /// Replaces the committed storage of `address` (test setup, genesis).
    pub fn set_storage(&self, address: Address, storage: AccountStorage) {
        self.storage.write().insert(address, storage);
    }
}

#[async_trait]
impl ContractStore for InMemoryLedger {
    async fn contract(&self, address: Address) -> Option<DeployedContract> {
        self.contracts.read().get(&address).cloned()
    }

    async fn storage_snapshot(&self, address: Address) -> AccountStorage {
        self.storage.read().get(&address).cloned().unwrap_or_default()
    }

    async fn install(
        &self,
        address: Address,
        contract: DeployedContract,
    ) -> Result<(), ServiceError> {
        let mut contracts = self.contracts.write();
        if contracts.contains_key(&address) {
            return Err(ServiceError::ContractAlreadyExists(address));
        }
        contracts.insert(address, contract);
        Ok(())
    }

    async fn commit(&self, address: Address, changes: &StateChanges) {
        if changes.is_empty() {
            return;
        }
        self.storage.write().entry(address).or_default().apply(changes);
    }

    async fn next_nonce(&self, sender: Address) -> u64 {
        let mut nonces = self.nonces.write();
        let nonce = nonces.entry(sender).or_insert(0);
        let current = *nonce;
        *nonce += 1;
        current
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::services::keccak256;
    use crate::domain::value_objects::{Bytes, U256};

    fn contract(code: &[u8]) -> DeployedContract {
        DeployedContract {
            code: Bytes::from_slice(code),
            code_hash: keccak256(code),
            abi: Vec::new(),
        }
    }

    #[tokio::test]
    async fn test_install_and_lookup() {
        let ledger = InMemoryLedger::new();
        let addr = Address::new([1u8; 20]);

        assert!(ledger.contract(addr).await.is_none());
        ledger.install(addr, contract(&[0x00])).await.unwrap();

        let installed = ledger.contract(addr).await.unwrap();
        assert_eq!(installed.code.as_slice(), &[0x00]);
        assert_eq!(ledger.contract_count(), 1);
    }

    #[tokio::test]
    async fn test_install_twice_fails() {
        let ledger = InMemoryLedger::new();
        let addr = Address::new([1u8; 20]);
        ledger.install(addr, contract(&[0x00])).await.unwrap();

        let err = ledger.install(addr, contract(&[0x01])).await.unwrap_err();
        assert!(matches!(err, ServiceError::ContractAlreadyExists(a) if a == addr));
        // Original code kept
        assert_eq!(ledger.contract(addr).await.unwrap().code.as_slice(), &[0x00]);
    }

    #[tokio::test]
    async fn test_commit_merges_into_snapshot() {
        let ledger = InMemoryLedger::new();
        let addr = Address::new([1u8; 20]);

        let mut diff = StateChanges::new();
        diff.insert(U256::zero(), U256::from(42));
        ledger.commit(addr, &diff).await;

        let snapshot = ledger.storage_snapshot(addr).await;
        assert_eq!(snapshot.get(U256::zero()), U256::from(42));

        // Snapshot is a copy: later commits don't show through it
        let mut clear = StateChanges::new();
        clear.insert(U256::zero(), U256::zero());
        ledger.commit(addr, &clear).await;
        assert_eq!(snapshot.get(U256::zero()), U256::from(42));
        assert!(ledger.storage_snapshot(addr).await.is_empty());
    }

    #[tokio::test]
    async fn test_nonces_increment_per_sender() {
        let ledger = InMemoryLedger::new();
        let a = Address::new([1u8; 20]);
        let b = Address::new([2u8; 20]);

        assert_eq!(ledger.next_nonce(a).await, 0);
        assert_eq!(ledger.next_nonce(a).await, 1);
        assert_eq!(ledger.next_nonce(b).await, 0);
    }
}
