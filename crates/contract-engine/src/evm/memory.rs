//! # Scratch Memory
//!
//! Byte-addressable, zero-initialized buffer that grows in 32-byte words.
//! The interpreter prices growth with `gas::memory_expansion_cost` and calls
//! `expand` only after that cost has been paid.

use crate::errors::VmError;

/// Default maximum memory size (16 MiB).
pub const MAX_MEMORY_SIZE: usize = 16 * 1024 * 1024;

/// Word size in bytes.
pub const WORD_SIZE: usize = 32;

/// Per-call linear memory.
#[derive(Clone, Debug)]
pub struct Memory {
    data: Vec<u8>,
    limit: usize,
}

impl Default for Memory {
    fn default() -> Self {
        Self::new()
    }
}

impl Memory {
    /// Creates an empty memory with the default size limit.
    #[must_use]
    pub fn new() -> Self {
        Self::with_limit(MAX_MEMORY_SIZE)
    }

    /// Creates an empty memory bounded at `limit` bytes.
    #[must_use]
    pub fn with_limit(limit: usize) -> Self {
        Self {
            data: Vec::new(),
            limit,
        }
    }

    /// Current size in bytes (always a multiple of 32).
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// True if nothing has been touched yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Current size in words.
    #[must_use]
    pub fn word_size(&self) -> usize {
        self.data.len().div_ceil(WORD_SIZE)
    }

    /// Word size memory must reach to cover `[offset, offset + size)`.
    ///
    /// A zero-length access never grows memory.
    ///
    /// # Errors
    ///
    /// Returns `MemoryOutOfBounds` if the range ends past the size limit.
    pub fn required_words(&self, offset: usize, size: usize) -> Result<usize, VmError> {
        if size == 0 {
            return Ok(self.word_size());
        }
        let end = offset
            .checked_add(size)
            .filter(|end| *end <= self.limit)
            .ok_or(VmError::MemoryOutOfBounds { offset, size })?;
        Ok(self.word_size().max(end.div_ceil(WORD_SIZE)))
    }

    /// Grows memory to `words` words (no-op if already that large).
    pub fn expand_to_words(&mut self, words: usize) {
        let bytes = words * WORD_SIZE;
        if bytes > self.data.len() {
            self.data.resize(bytes, 0);
        }
    }

    /// Reads a 32-byte word. Unallocated bytes read as zero.
    #[must_use]
    pub fn read_word(&self, offset: usize) -> [u8; 32] {
        let mut word = [0u8; 32];
        copy_padded(&mut word, &self.data, offset);
        word
    }

    /// Reads `size` bytes. Unallocated bytes read as zero.
    #[must_use]
    pub fn read_bytes(&self, offset: usize, size: usize) -> Vec<u8> {
        let mut out = vec![0u8; size];
        copy_padded(&mut out, &self.data, offset);
        out
    }

    /// Writes one byte.
    ///
    /// # Errors
    ///
    /// Returns `MemoryOutOfBounds` if the write would pass the limit.
    pub fn write_byte(&mut self, offset: usize, value: u8) -> Result<(), VmError> {
        let words = self.required_words(offset, 1)?;
        self.expand_to_words(words);
        self.data[offset] = value;
        Ok(())
    }

    /// Writes a 32-byte word.
    ///
    /// # Errors
    ///
    /// Returns `MemoryOutOfBounds` if the write would pass the limit.
    pub fn write_word(&mut self, offset: usize, value: &[u8; 32]) -> Result<(), VmError> {
        self.write_bytes(offset, value)
    }

    /// Writes `bytes` at `offset`.
    ///
    /// # Errors
    ///
    /// Returns `MemoryOutOfBounds` if the write would pass the limit.
    pub fn write_bytes(&mut self, offset: usize, bytes: &[u8]) -> Result<(), VmError> {
        if bytes.is_empty() {
            return Ok(());
        }
        let words = self.required_words(offset, bytes.len())?;
        self.expand_to_words(words);
        self.data[offset..offset + bytes.len()].copy_from_slice(bytes);
        Ok(())
    }

    /// Copies `size` bytes of `source` starting at `source_offset` into memory
    /// at `offset`, zero-filling past the end of `source`.
    ///
    /// # Errors
    ///
    /// Returns `MemoryOutOfBounds` if the write would pass the limit.
    pub fn copy_from(
        &mut self,
        offset: usize,
        source: &[u8],
        source_offset: usize,
        size: usize,
    ) -> Result<(), VmError> {
        if size == 0 {
            return Ok(());
        }
        let words = self.required_words(offset, size)?;
        self.expand_to_words(words);
        copy_padded(&mut self.data[offset..offset + size], source, source_offset);
        Ok(())
    }

    /// Whole buffer.
    #[must_use]
    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }
}

/// Fills `dest` from `source[offset..]`, zeroing whatever `source` cannot cover.
pub(crate) fn copy_padded(dest: &mut [u8], source: &[u8], offset: usize) {
    let available = source.get(offset..).unwrap_or(&[]);
    let n = available.len().min(dest.len());
    dest[..n].copy_from_slice(&available[..n]);
    dest[n..].fill(0);
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_required_words() {
        let mem = Memory::new();
        assert_eq!(mem.required_words(0, 0).unwrap(), 0);
        assert_eq!(mem.required_words(0, 1).unwrap(), 1);
        assert_eq!(mem.required_words(31, 2).unwrap(), 2);
        assert_eq!(mem.required_words(1000, 0).unwrap(), 0); // Zero size never grows
    }

    #[test]
    fn test_expand_rounds_to_words() {
        let mut mem = Memory::new();
        mem.write_byte(10, 0x42).unwrap();
        assert_eq!(mem.len(), 32);
        assert_eq!(mem.read_word(0)[10], 0x42);

        mem.write_word(40, &[0x11; 32]).unwrap();
        assert_eq!(mem.len(), 96);
        assert_eq!(mem.word_size(), 3);
    }

    #[test]
    fn test_read_word_zero_padding() {
        let mem = Memory::new();
        assert_eq!(mem.read_word(0), [0u8; 32]);
        assert!(mem.is_empty()); // Reads never allocate
    }

    #[test]
    fn test_copy_from_pads_with_zeros() {
        let mut mem = Memory::new();
        mem.copy_from(0, &[1, 2, 3], 1, 4).unwrap();
        assert_eq!(mem.read_bytes(0, 4), vec![2, 3, 0, 0]);

        mem.copy_from(4, &[9, 9], 10, 2).unwrap();
        assert_eq!(mem.read_bytes(4, 2), vec![0, 0]);
    }

    #[test]
    fn test_limit() {
        let mut mem = Memory::with_limit(64);
        assert!(mem.write_word(32, &[0u8; 32]).is_ok());
        assert_eq!(
            mem.write_byte(64, 1),
            Err(VmError::MemoryOutOfBounds { offset: 64, size: 1 })
        );
        assert!(mem.required_words(usize::MAX, 2).is_err());
    }
}
