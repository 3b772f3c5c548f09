//! # Storage Overlay
//!
//! Per-call view of contract storage: committed values from the ledger,
//! shadowed by the call's own staged writes. SSTORE only ever touches the
//! staged diff; the ledger merges it after a successful halt.

use crate::domain::entities::StateChanges;
use crate::domain::value_objects::Word;
use crate::ports::outbound::StorageView;
use serde::{Deserialize, Serialize};

// =============================================================================
// COMMITTED ACCOUNT STORAGE
// =============================================================================

/// Committed slot values of one contract account.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountStorage {
    slots: StateChanges,
}

impl AccountStorage {
    /// Empty storage.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Value at `slot`, zero if never written.
    #[must_use]
    pub fn get(&self, slot: Word) -> Word {
        self.slots.get(&slot).copied().unwrap_or_default()
    }

    /// Merges a staged diff. Writing zero clears the slot.
    pub fn apply(&mut self, changes: &StateChanges) {
        for (slot, value) in changes {
            if value.is_zero() {
                self.slots.remove(slot);
            } else {
                self.slots.insert(*slot, *value);
            }
        }
    }

    /// Number of non-zero slots.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// True if every slot is zero.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Non-zero slots in ascending slot order.
    pub fn iter(&self) -> impl Iterator<Item = (&Word, &Word)> {
        self.slots.iter()
    }
}

impl StorageView for AccountStorage {
    fn load(&self, slot: Word) -> Word {
        self.get(slot)
    }
}

impl FromIterator<(Word, Word)> for AccountStorage {
    fn from_iter<I: IntoIterator<Item = (Word, Word)>>(iter: I) -> Self {
        let mut storage = Self::new();
        storage.apply(&iter.into_iter().collect());
        storage
    }
}

// =============================================================================
// STAGED DIFF OVERLAY
// =============================================================================

/// Committed view plus the writes staged by the running call.
#[derive(Debug)]
pub struct StorageOverlay<'a, S: StorageView + ?Sized> {
    committed: &'a S,
    staged: StateChanges,
}

impl<'a, S: StorageView + ?Sized> StorageOverlay<'a, S> {
    /// Starts a call with an empty diff.
    pub fn new(committed: &'a S) -> Self {
        Self {
            committed,
            staged: StateChanges::new(),
        }
    }

    /// Staged value if any, otherwise the committed one.
    pub fn load(&self, slot: Word) -> Word {
        match self.staged.get(&slot) {
            Some(value) => *value,
            None => self.committed.load(slot),
        }
    }

    /// Stages a write. Committed state is untouched.
    pub fn store(&mut self, slot: Word, value: Word) {
        self.staged.insert(slot, value);
    }

    /// Writes staged so far.
    pub fn staged(&self) -> &StateChanges {
        &self.staged
    }

    /// Hands the diff out, leaving the overlay empty.
    pub fn take_diff(&mut self) -> StateChanges {
        std::mem::take(&mut self.staged)
    }
}

// =============================================================================
// TESTS
// =============================================================================
