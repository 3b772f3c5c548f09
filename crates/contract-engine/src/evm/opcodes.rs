//! # Opcode Table
//!
//! Static mapping from opcode byte to metadata and a tagged handler variant.
//!
//! The interpreter never matches on bytes or mnemonics: it looks up the
//! `OpcodeInfo` for the current byte and dispatches on its `operation`.
//! Adding an instruction means adding one table entry (and, for a genuinely
//! new kind of behaviour, one `Operation` variant).

use crate::errors::VmError;
use crate::evm::gas::costs;
use std::fmt;

// =============================================================================
// OPCODE BYTES
// =============================================================================

/// A single instruction byte.
///
/// The associated constants are the emission vocabulary of the compiler.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Opcode(pub u8);

#[allow(missing_docs)]
impl Opcode {
    // 0x00 - Stop and Arithmetic
    pub const STOP: Self = Self(0x00);
    pub const ADD: Self = Self(0x01);
    pub const MUL: Self = Self(0x02);
    pub const SUB: Self = Self(0x03);
    pub const DIV: Self = Self(0x04);
    pub const SDIV: Self = Self(0x05);
    pub const MOD: Self = Self(0x06);
    pub const SMOD: Self = Self(0x07);
    pub const ADDMOD: Self = Self(0x08);
    pub const MULMOD: Self = Self(0x09);
    pub const EXP: Self = Self(0x0A);
    pub const SIGNEXTEND: Self = Self(0x0B);

    // 0x10 - Comparison & Bitwise
    pub const LT: Self = Self(0x10);
    pub const GT: Self = Self(0x11);
    pub const SLT: Self = Self(0x12);
    pub const SGT: Self = Self(0x13);
    pub const EQ: Self = Self(0x14);
    pub const ISZERO: Self = Self(0x15);
    pub const AND: Self = Self(0x16);
    pub const OR: Self = Self(0x17);
    pub const XOR: Self = Self(0x18);
    pub const NOT: Self = Self(0x19);
    pub const BYTE: Self = Self(0x1A);
    pub const SHL: Self = Self(0x1B);
    pub const SHR: Self = Self(0x1C);
    pub const SAR: Self = Self(0x1D);

    pub const KECCAK256: Self = Self(0x20);

    // 0x30 - Call environment
    pub const ADDRESS: Self = Self(0x30);
    pub const ORIGIN: Self = Self(0x32);
    pub const CALLER: Self = Self(0x33);
    pub const CALLVALUE: Self = Self(0x34);
    pub const CALLDATALOAD: Self = Self(0x35);
    pub const CALLDATASIZE: Self = Self(0x36);
    pub const CALLDATACOPY: Self = Self(0x37);
    pub const CODESIZE: Self = Self(0x38);
    pub const CODECOPY: Self = Self(0x39);
    pub const GASPRICE: Self = Self(0x3A);

    // 0x40 - Block
    pub const TIMESTAMP: Self = Self(0x42);
    pub const NUMBER: Self = Self(0x43);
    pub const CHAINID: Self = Self(0x46);

    // 0x50 - Stack, Memory, Storage, Flow
    pub const POP: Self = Self(0x50);
    pub const MLOAD: Self = Self(0x51);
    pub const MSTORE: Self = Self(0x52);
    pub const MSTORE8: Self = Self(0x53);
    pub const SLOAD: Self = Self(0x54);
    pub const SSTORE: Self = Self(0x55);
    pub const JUMP: Self = Self(0x56);
    pub const JUMPI: Self = Self(0x57);
    pub const PC: Self = Self(0x58);
    pub const MSIZE: Self = Self(0x59);
    pub const GAS: Self = Self(0x5A);
    pub const JUMPDEST: Self = Self(0x5B);

    pub const PUSH0: Self = Self(0x5F);
    pub const PUSH1: Self = Self(0x60);
    pub const PUSH2: Self = Self(0x61);
    pub const PUSH4: Self = Self(0x63);
    pub const PUSH32: Self = Self(0x7F);
    pub const DUP1: Self = Self(0x80);
    pub const SWAP1: Self = Self(0x90);

    // 0xF0 - Halting
    pub const RETURN: Self = Self(0xF3);
    pub const REVERT: Self = Self(0xFD);
    pub const INVALID: Self = Self(0xFE);
}

impl Opcode {
    /// `PUSHn` for `n` in `0..=32`.
    ///
    /// # Panics
    ///
    /// Debug builds assert `n <= 32`.
    #[must_use]
    pub const fn push(n: u8) -> Self {
        debug_assert!(n <= 32);
        Self(0x5F + n)
    }

    /// `DUPn` for `n` in `1..=16`.
    #[must_use]
    pub const fn dup(n: u8) -> Self {
        debug_assert!(n >= 1 && n <= 16);
        Self(0x7F + n)
    }

    /// `SWAPn` for `n` in `1..=16`.
    #[must_use]
    pub const fn swap(n: u8) -> Self {
        debug_assert!(n >= 1 && n <= 16);
        Self(0x8F + n)
    }

    /// Raw byte value.
    #[must_use]
    pub const fn byte(self) -> u8 {
        self.0
    }

    /// Table entry for this byte, if defined.
    #[must_use]
    pub fn info(self) -> Option<&'static OpcodeInfo> {
        OPCODE_TABLE[self.0 as usize].as_ref()
    }
}

impl fmt::Debug for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.info() {
            Some(info) => f.write_str(info.mnemonic),
            None => write!(f, "UNDEFINED(0x{:02x})", self.0),
        }
    }
}

// =============================================================================
// HANDLER VARIANTS
// =============================================================================

/// Two-operand word operations. `a` is the top of the stack, `b` the next.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum BinaryOp {
    Add,
    Mul,
    Sub,
    Div,
    SDiv,
    Mod,
    SMod,
    SignExtend,
    Lt,
    Gt,
    SLt,
    SGt,
    Eq,
    And,
    Or,
    Xor,
    Byte,
    Shl,
    Shr,
    Sar,
}

/// Three-operand modular arithmetic.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum TernaryOp {
    AddMod,
    MulMod,
}

/// One-operand word operations.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum UnaryOp {
    IsZero,
    Not,
}

/// Execution-context field copied onto the stack.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum ContextField {
    Address,
    Origin,
    Caller,
    CallValue,
    CallDataSize,
    GasPrice,
    Timestamp,
    Number,
    ChainId,
}

/// Tagged handler the interpreter dispatches on.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum Operation {
    Stop,
    Binary(BinaryOp),
    Ternary(TernaryOp),
    Unary(UnaryOp),
    Exp,
    Keccak256,
    Context(ContextField),
    CallDataLoad,
    CallDataCopy,
    CodeSize,
    CodeCopy,
    Pop,
    MLoad,
    MStore,
    MStore8,
    SLoad,
    SStore,
    Jump,
    JumpI,
    Pc,
    MSize,
    Gas,
    JumpDest,
    /// Pushes the `n` immediate bytes that follow (0 for `PUSH0`).
    Push(u8),
    /// Duplicates the `n`th entry (1 = top).
    Dup(u8),
    /// Swaps the top with the entry `n` below it.
    Swap(u8),
    Return,
    Revert,
    Invalid,
}

// =============================================================================
// OPCODE METADATA
// =============================================================================

/// Immutable metadata for one defined opcode.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OpcodeInfo {
    /// Opcode byte; always equals the entry's table index.
    pub byte: u8,
    /// Mnemonic.
    pub mnemonic: &'static str,
    /// Fixed gas cost, charged before the operation runs.
    pub gas_cost: u64,
    /// Stack entries the operation needs to be present.
    pub min_stack_args: usize,
    /// Whether the operation pushes one result word.
    pub pushes_result: bool,
    /// Immediate operand bytes following the opcode.
    pub immediate_bytes: usize,
    /// Handler variant.
    pub operation: Operation,
}

impl OpcodeInfo {
    const fn new(
        byte: u8,
        mnemonic: &'static str,
        gas_cost: u64,
        min_stack_args: usize,
        pushes_result: bool,
        operation: Operation,
    ) -> Self {
        Self {
            byte,
            mnemonic,
            gas_cost,
            min_stack_args,
            pushes_result,
            immediate_bytes: 0,
            operation,
        }
    }

    /// Entries the operation removes from the stack.
    ///
    /// `DUPn`/`SWAPn` inspect `min_stack_args` entries but remove none.
    #[must_use]
    pub const fn stack_pops(&self) -> usize {
        match self.operation {
            Operation::Dup(_) | Operation::Swap(_) => 0,
            _ => self.min_stack_args,
        }
    }
}

/// Looks up the metadata for `byte`.
///
/// # Errors
///
/// Returns `InvalidOpcode` for bytes with no table entry.
pub fn lookup(byte: u8) -> Result<&'static OpcodeInfo, VmError> {
    OPCODE_TABLE[byte as usize]
        .as_ref()
        .ok_or(VmError::InvalidOpcode(byte))
}

// =============================================================================
// STATIC TABLE
// =============================================================================

const PUSH_NAMES: [&str; 33] = [
    "PUSH0", "PUSH1", "PUSH2", "PUSH3", "PUSH4", "PUSH5", "PUSH6", "PUSH7", "PUSH8", "PUSH9",
    "PUSH10", "PUSH11", "PUSH12", "PUSH13", "PUSH14", "PUSH15", "PUSH16", "PUSH17", "PUSH18",
    "PUSH19", "PUSH20", "PUSH21", "PUSH22", "PUSH23", "PUSH24", "PUSH25", "PUSH26", "PUSH27",
    "PUSH28", "PUSH29", "PUSH30", "PUSH31", "PUSH32",
];

const DUP_NAMES: [&str; 16] = [
    "DUP1", "DUP2", "DUP3", "DUP4", "DUP5", "DUP6", "DUP7", "DUP8", "DUP9", "DUP10", "DUP11",
    "DUP12", "DUP13", "DUP14", "DUP15", "DUP16",
];

const SWAP_NAMES: [&str; 16] = [
    "SWAP1", "SWAP2", "SWAP3", "SWAP4", "SWAP5", "SWAP6", "SWAP7", "SWAP8", "SWAP9", "SWAP10",
    "SWAP11", "SWAP12", "SWAP13", "SWAP14", "SWAP15", "SWAP16",
];

/// The instruction set, indexed by opcode byte.
pub static OPCODE_TABLE: [Option<OpcodeInfo>; 256] = build_table();

#[rustfmt::skip]
const fn build_table() -> [Option<OpcodeInfo>; 256] {
    use costs::{BASE, HIGH, JUMPDEST, LOW, MID, VERY_LOW, ZERO};
    use BinaryOp as B;
    use ContextField as C;
    use Operation as Op;

    let mut t: [Option<OpcodeInfo>; 256] = [None; 256];

    macro_rules! def {
        ($byte:expr, $name:expr, $gas:expr, $args:expr, $pushes:expr, $op:expr) => {
            t[$byte] = Some(OpcodeInfo::new($byte as u8, $name, $gas, $args, $pushes, $op));
        };
    }

    // Stop and arithmetic
    def!(0x00, "STOP",       ZERO,     0, false, Op::Stop);
    def!(0x01, "ADD",        VERY_LOW, 2, true,  Op::Binary(B::Add));
    def!(0x02, "MUL",        LOW,      2, true,  Op::Binary(B::Mul));
    def!(0x03, "SUB",        VERY_LOW, 2, true,  Op::Binary(B::Sub));
    def!(0x04, "DIV",        LOW,      2, true,  Op::Binary(B::Div));
    def!(0x05, "SDIV",       LOW,      2, true,  Op::Binary(B::SDiv));
    def!(0x06, "MOD",        LOW,      2, true,  Op::Binary(B::Mod));
    def!(0x07, "SMOD",       LOW,      2, true,  Op::Binary(B::SMod));
    def!(0x08, "ADDMOD",     MID,      3, true,  Op::Ternary(TernaryOp::AddMod));
    def!(0x09, "MULMOD",     MID,      3, true,  Op::Ternary(TernaryOp::MulMod));
    def!(0x0A, "EXP",        costs::EXP, 2, true, Op::Exp);
    def!(0x0B, "SIGNEXTEND", LOW,      2, true,  Op::Binary(B::SignExtend));

    // Comparison and bitwise
    def!(0x10, "LT",     VERY_LOW, 2, true, Op::Binary(B::Lt));
    def!(0x11, "GT",     VERY_LOW, 2, true, Op::Binary(B::Gt));
    def!(0x12, "SLT",    VERY_LOW, 2, true, Op::Binary(B::SLt));
    def!(0x13, "SGT",    VERY_LOW, 2, true, Op::Binary(B::SGt));
    def!(0x14, "EQ",     VERY_LOW, 2, true, Op::Binary(B::Eq));
    def!(0x15, "ISZERO", VERY_LOW, 1, true, Op::Unary(UnaryOp::IsZero));
    def!(0x16, "AND",    VERY_LOW, 2, true, Op::Binary(B::And));
    def!(0x17, "OR",     VERY_LOW, 2, true, Op::Binary(B::Or));
    def!(0x18, "XOR",    VERY_LOW, 2, true, Op::Binary(B::Xor));
    def!(0x19, "NOT",    VERY_LOW, 1, true, Op::Unary(UnaryOp::Not));
    def!(0x1A, "BYTE",   VERY_LOW, 2, true, Op::Binary(B::Byte));
    def!(0x1B, "SHL",    VERY_LOW, 2, true, Op::Binary(B::Shl));
    def!(0x1C, "SHR",    VERY_LOW, 2, true, Op::Binary(B::Shr));
    def!(0x1D, "SAR",    VERY_LOW, 2, true, Op::Binary(B::Sar));

    def!(0x20, "KECCAK256", costs::KECCAK256, 2, true, Op::Keccak256);

    // Call environment
    def!(0x30, "ADDRESS",      BASE,     0, true,  Op::Context(C::Address));
    def!(0x32, "ORIGIN",       BASE,     0, true,  Op::Context(C::Origin));
    def!(0x33, "CALLER",       BASE,     0, true,  Op::Context(C::Caller));
    def!(0x34, "CALLVALUE",    BASE,     0, true,  Op::Context(C::CallValue));
    def!(0x35, "CALLDATALOAD", VERY_LOW, 1, true,  Op::CallDataLoad);
    def!(0x36, "CALLDATASIZE", BASE,     0, true,  Op::Context(C::CallDataSize));
    def!(0x37, "CALLDATACOPY", VERY_LOW, 3, false, Op::CallDataCopy);
    def!(0x38, "CODESIZE",     BASE,     0, true,  Op::CodeSize);
    def!(0x39, "CODECOPY",     VERY_LOW, 3, false, Op::CodeCopy);
    def!(0x3A, "GASPRICE",     BASE,     0, true,  Op::Context(C::GasPrice));

    // Block
    def!(0x42, "TIMESTAMP", BASE, 0, true, Op::Context(C::Timestamp));
    def!(0x43, "NUMBER",    BASE, 0, true, Op::Context(C::Number));
    def!(0x46, "CHAINID",   BASE, 0, true, Op::Context(C::ChainId));

    // Stack, memory, storage and flow
    def!(0x50, "POP",      BASE,          1, false, Op::Pop);
    def!(0x51, "MLOAD",    VERY_LOW,      1, true,  Op::MLoad);
    def!(0x52, "MSTORE",   VERY_LOW,      2, false, Op::MStore);
    def!(0x53, "MSTORE8",  VERY_LOW,      2, false, Op::MStore8);
    def!(0x54, "SLOAD",    costs::SLOAD,  1, true,  Op::SLoad);
    def!(0x55, "SSTORE",   costs::SSTORE, 2, false, Op::SStore);
    def!(0x56, "JUMP",     MID,           1, false, Op::Jump);
    def!(0x57, "JUMPI",    HIGH,          2, false, Op::JumpI);
    def!(0x58, "PC",       BASE,          0, true,  Op::Pc);
    def!(0x59, "MSIZE",    BASE,          0, true,  Op::MSize);
    def!(0x5A, "GAS",      BASE,          0, true,  Op::Gas);
    def!(0x5B, "JUMPDEST", JUMPDEST,      0, false, Op::JumpDest);

    def!(0x5F, "PUSH0", BASE, 0, true, Op::Push(0));

    let mut n = 1;
    while n <= 32 {
        let byte = 0x5F + n;
        let mut info = OpcodeInfo::new(
            byte as u8,
            PUSH_NAMES[n],
            VERY_LOW + costs::PUSH_BYTE * n as u64,
            0,
            true,
            Op::Push(n as u8),
        );
        info.immediate_bytes = n;
        t[byte] = Some(info);
        n += 1;
    }

    let mut n = 1;
    while n <= 16 {
        def!(0x7F + n, DUP_NAMES[n - 1], VERY_LOW, n, true, Op::Dup(n as u8));
        def!(0x8F + n, SWAP_NAMES[n - 1], VERY_LOW, n + 1, false, Op::Swap(n as u8));
        n += 1;
    }

    // Halting
    def!(0xF3, "RETURN",  ZERO, 2, false, Op::Return);
    def!(0xFD, "REVERT",  ZERO, 2, false, Op::Revert);
    def!(0xFE, "INVALID", ZERO, 0, false, Op::Invalid);

    t
}

// =============================================================================
// TESTS
// =============================================================================
