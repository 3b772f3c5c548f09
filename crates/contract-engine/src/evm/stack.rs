//! # Value Stack
//!
//! Bounded LIFO of words, created fresh for every call.

use crate::domain::value_objects::Word;
use crate::errors::VmError;

/// Default maximum stack depth.
pub const MAX_STACK_SIZE: usize = 1024;

/// Per-call operand stack.
#[derive(Clone, Debug)]
pub struct Stack {
    data: Vec<Word>,
    limit: usize,
}

impl Default for Stack {
    fn default() -> Self {
        Self::new()
    }
}

impl Stack {
    /// Creates an empty stack with the default depth limit.
    #[must_use]
    pub fn new() -> Self {
        Self::with_limit(MAX_STACK_SIZE)
    }

    /// Creates an empty stack holding at most `limit` entries.
    #[must_use]
    pub fn with_limit(limit: usize) -> Self {
        Self {
            data: Vec::with_capacity(limit.min(64)),
            limit,
        }
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// True if the stack holds nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Fails unless `pops` entries are present and, after removing them,
    /// `pushes` more still fit. Lets callers reject an opcode before it
    /// touches anything.
    ///
    /// # Errors
    ///
    /// `StackUnderflow` or `StackOverflow`.
    pub fn require(&self, needed: usize, pops: usize, pushes: usize) -> Result<(), VmError> {
        if self.data.len() < needed {
            return Err(VmError::StackUnderflow);
        }
        if self.data.len() - pops + pushes > self.limit {
            return Err(VmError::StackOverflow);
        }
        Ok(())
    }

    /// Pushes a word.
    ///
    /// # Errors
    ///
    /// Returns `StackOverflow` if the stack is full.
    pub fn push(&mut self, value: Word) -> Result<(), VmError> {
        if self.data.len() >= self.limit {
            return Err(VmError::StackOverflow);
        }
        self.data.push(value);
        Ok(())
    }

    /// Pops the top word.
    ///
    /// # Errors
    ///
    /// Returns `StackUnderflow` if the stack is empty.
    pub fn pop(&mut self) -> Result<Word, VmError> {
        self.data.pop().ok_or(VmError::StackUnderflow)
    }

    /// Reads the word `depth` entries below the top (0 = top).
    ///
    /// # Errors
    ///
    /// Returns `StackUnderflow` if the stack is too shallow.
    pub fn peek_at(&self, depth: usize) -> Result<Word, VmError> {
        self.data
            .len()
            .checked_sub(depth + 1)
            .map(|index| self.data[index])
            .ok_or(VmError::StackUnderflow)
    }

    /// `SWAPn`: exchanges the top with the entry `n` below it.
    ///
    /// # Errors
    ///
    /// Returns `StackUnderflow` if fewer than `n + 1` entries are present.
    pub fn swap(&mut self, n: usize) -> Result<(), VmError> {
        let len = self.data.len();
        if n == 0 || n >= len {
            return Err(VmError::StackUnderflow);
        }
        self.data.swap(len - 1, len - 1 - n);
        Ok(())
    }

    /// `DUPn`: pushes a copy of the `n`th entry (1 = top).
    ///
    /// # Errors
    ///
    /// `StackUnderflow` if fewer than `n` entries, `StackOverflow` if full.
    pub fn dup(&mut self, n: usize) -> Result<(), VmError> {
        let value = match n {
            0 => return Err(VmError::StackUnderflow),
            _ => self.peek_at(n - 1)?,
        };
        self.push(value)
    }

    /// Entries bottom-first.
    #[must_use]
    pub fn as_slice(&self) -> &[Word] {
        &self.data
    }
}

// =============================================================================
// TESTS
// =============================================================================
