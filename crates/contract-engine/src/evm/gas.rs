//! # Gas Schedule
//!
//! Fixed per-opcode costs live in the opcode table; this module holds the
//! named cost tiers the table is built from and the dynamic components
//! (exponent bytes, hashed words, copied words, memory growth).
//!
//! The whole schedule is deterministic: every node charges the same amount
//! for the same opcode, operands and memory size.

use crate::domain::value_objects::U256;

// =============================================================================
// BASE GAS COSTS
// =============================================================================

/// Cost tiers referenced by the opcode table.
pub mod costs {
    /// Halting opcodes.
    pub const ZERO: u64 = 0;
    /// Jump destination marker.
    pub const JUMPDEST: u64 = 1;
    /// Context reads, `POP`, `PUSH0`.
    pub const BASE: u64 = 2;
    /// Arithmetic, comparison, bitwise, stack shuffles, memory access.
    pub const VERY_LOW: u64 = 3;
    /// Multiplicative arithmetic.
    pub const LOW: u64 = 5;
    /// Modular arithmetic and `JUMP`.
    pub const MID: u64 = 8;
    /// `JUMPI`.
    pub const HIGH: u64 = 10;

    /// Extra cost per immediate byte of a PUSH (flat schedule).
    pub const PUSH_BYTE: u64 = 0;

    /// `EXP` base cost.
    pub const EXP: u64 = 10;
    /// `EXP` cost per significant exponent byte.
    pub const EXP_BYTE: u64 = 50;

    /// `KECCAK256` base cost.
    pub const KECCAK256: u64 = 30;
    /// `KECCAK256` cost per hashed word.
    pub const KECCAK256_WORD: u64 = 6;

    /// Cost per word copied by `CALLDATACOPY`/`CODECOPY`.
    pub const COPY: u64 = 3;

    /// Storage read.
    pub const SLOAD: u64 = 200;
    /// Storage write.
    pub const SSTORE: u64 = 20_000;

    /// Linear coefficient of the memory cost.
    pub const MEMORY_WORD: u64 = 3;
    /// Quadratic divisor of the memory cost.
    pub const MEMORY_QUAD_DIVISOR: u64 = 512;
}

// =============================================================================
// DYNAMIC COSTS
// =============================================================================

/// Dynamic part of `EXP`: 50 gas per significant byte of the exponent.
#[must_use]
pub fn exp_dynamic_cost(exponent: U256) -> u64 {
    let byte_size = (256 - u64::from(exponent.leading_zeros())).div_ceil(8);
    costs::EXP_BYTE * byte_size
}

/// Dynamic part of `KECCAK256`: 6 gas per 32-byte word hashed.
#[must_use]
pub fn keccak256_dynamic_cost(data_size: usize) -> u64 {
    costs::KECCAK256_WORD.saturating_mul(words(data_size))
}

/// Dynamic part of the copy opcodes: 3 gas per 32-byte word copied.
#[must_use]
pub fn copy_gas_cost(size: usize) -> u64 {
    costs::COPY.saturating_mul(words(size))
}

/// Total cost of a memory of `word_size` words.
///
/// Cost = 3 * `word_size` + `word_size^2` / 512
#[must_use]
pub fn memory_gas_cost(word_size: usize) -> u64 {
    let w = word_size as u64;
    costs::MEMORY_WORD
        .saturating_mul(w)
        .saturating_add(w.saturating_mul(w) / costs::MEMORY_QUAD_DIVISOR)
}

/// Incremental cost of growing memory from `old_word_size` to `new_word_size`.
#[must_use]
pub fn memory_expansion_cost(old_word_size: usize, new_word_size: usize) -> u64 {
    if new_word_size <= old_word_size {
        return 0;
    }
    memory_gas_cost(new_word_size) - memory_gas_cost(old_word_size)
}

fn words(size: usize) -> u64 {
    size.div_ceil(32) as u64
}

// =============================================================================
// TESTS
// =============================================================================
