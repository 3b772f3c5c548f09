//! # Interpreter
//!
//! The decode-dispatch loop. One `Interpreter` runs one call to completion:
//!
//! 1. Look up the opcode at `pc` (unknown byte: `InvalidOpcode`).
//! 2. Deduct its fixed gas cost (insufficient: `OutOfGas`, nothing applied).
//! 3. Check stack arity and headroom (`StackFault`).
//! 4. Charge dynamic costs (memory growth, exponent bytes, hashed/copied
//!    words), then apply the operation.
//! 5. Advance `pc` past the opcode and its immediates.
//!
//! The loop is synchronous and performs no I/O; gas is the only bound on
//! work. Storage writes go to a staged diff that is handed back only when the
//! call halts successfully.

use crate::domain::entities::{ExecutionContext, ExecutionResult, VmConfig};
use crate::domain::services::{keccak256, word_to_bytes};
use crate::domain::value_objects::{Bytes, GasCounter, Word, U256};
use crate::errors::VmError;
use crate::evm::gas;
use crate::evm::memory::{copy_padded, Memory};
use crate::evm::opcodes::{self, BinaryOp, ContextField, Operation, TernaryOp, UnaryOp};
use crate::evm::stack::Stack;
use crate::evm::storage::StorageOverlay;
use crate::ports::outbound::StorageView;
use primitive_types::U512;
use std::collections::HashSet;
use tracing::trace;

/// Opcode byte that marks a valid jump target.
const JUMPDEST: u8 = 0x5B;

/// Runs `code` against `storage` with the default resource limits.
///
/// Never fails: every outcome, including faults, is encoded in the result.
pub fn execute<S: StorageView + ?Sized>(
    code: &[u8],
    context: &ExecutionContext,
    gas_limit: u64,
    storage: &S,
) -> ExecutionResult {
    Interpreter::new(code, context, gas_limit, storage).run()
}

/// `execute` with explicit resource limits.
pub fn execute_with_config<S: StorageView + ?Sized>(
    code: &[u8],
    context: &ExecutionContext,
    gas_limit: u64,
    storage: &S,
    config: &VmConfig,
) -> ExecutionResult {
    Interpreter::with_config(code, context, gas_limit, storage, config).run()
}

/// What the loop does after a successfully applied opcode.
enum Control {
    Continue,
    Halt,
}

/// A priced memory range; `words` is the memory size after the access.
#[derive(Default)]
struct MemoryAccess {
    offset: usize,
    size: usize,
    words: usize,
    cost: u64,
}

/// State of one running call.
pub struct Interpreter<'a, S: StorageView + ?Sized> {
    code: &'a [u8],
    context: &'a ExecutionContext,
    pc: usize,
    gas: GasCounter,
    stack: Stack,
    memory: Memory,
    storage: StorageOverlay<'a, S>,
    jump_dests: HashSet<usize>,
    return_data: Bytes,
}

impl<'a, S: StorageView + ?Sized> Interpreter<'a, S> {
    /// Prepares a call with the default resource limits.
    pub fn new(
        code: &'a [u8],
        context: &'a ExecutionContext,
        gas_limit: u64,
        storage: &'a S,
    ) -> Self {
        Self::with_config(code, context, gas_limit, storage, &VmConfig::default())
    }

    /// Prepares a call with explicit resource limits.
    pub fn with_config(
        code: &'a [u8],
        context: &'a ExecutionContext,
        gas_limit: u64,
        storage: &'a S,
        config: &VmConfig,
    ) -> Self {
        Self {
            code,
            context,
            pc: 0,
            gas: GasCounter::new(gas_limit),
            stack: Stack::with_limit(config.max_stack_size),
            memory: Memory::with_limit(config.max_memory_size),
            storage: StorageOverlay::new(storage),
            jump_dests: analyze_jump_dests(code),
            return_data: Bytes::new(),
        }
    }

    /// Current stack (bottom first).
    pub fn stack(&self) -> &Stack {
        &self.stack
    }

    /// Current memory.
    pub fn memory(&self) -> &Memory {
        &self.memory
    }

    /// Gas not yet consumed.
    pub fn gas_remaining(&self) -> u64 {
        self.gas.remaining()
    }

    /// Runs until halt and returns the structured outcome.
    ///
    /// Intended to be called once; the stack and memory stay inspectable
    /// afterwards.
    pub fn run(&mut self) -> ExecutionResult {
        let outcome = loop {
            if self.pc >= self.code.len() {
                break Ok(());
            }
            match self.step() {
                Ok(Control::Continue) => {}
                Ok(Control::Halt) => break Ok(()),
                Err(err) => break Err(err),
            }
        };

        let gas_used = self.gas.used();
        match outcome {
            Ok(()) => {
                trace!(pc = self.pc, gas_used, "halted: success");
                ExecutionResult::success(
                    self.storage.take_diff(),
                    std::mem::take(&mut self.return_data),
                    gas_used,
                )
            }
            Err(err) => {
                trace!(pc = self.pc, gas_used, error = %err, "halted: failure");
                // Only REVERT carries a payload; staged writes are dropped.
                let data = match err {
                    VmError::Revert => std::mem::take(&mut self.return_data),
                    _ => Bytes::new(),
                };
                self.storage.take_diff();
                ExecutionResult::failure(err, data, gas_used)
            }
        }
    }

    /// Executes the opcode at `pc`.
    fn step(&mut self) -> Result<Control, VmError> {
        let info = opcodes::lookup(self.code[self.pc])?;
        debug_assert_eq!(usize::from(info.byte), usize::from(self.code[self.pc]));

        self.gas.consume(info.gas_cost)?;
        self.stack.require(
            info.min_stack_args,
            info.stack_pops(),
            usize::from(info.pushes_result),
        )?;

        let mut next_pc = self.pc + 1 + info.immediate_bytes;

        match info.operation {
            Operation::Stop => return Ok(Control::Halt),

            Operation::Binary(op) => {
                let a = self.stack.pop()?;
                let b = self.stack.pop()?;
                self.stack.push(binary(op, a, b))?;
            }
            Operation::Ternary(op) => {
                let a = self.stack.pop()?;
                let b = self.stack.pop()?;
                let n = self.stack.pop()?;
                self.stack.push(ternary(op, a, b, n))?;
            }
            Operation::Unary(op) => {
                let a = self.stack.pop()?;
                let result = match op {
                    UnaryOp::IsZero => bool_word(a.is_zero()),
                    UnaryOp::Not => !a,
                };
                self.stack.push(result)?;
            }

            Operation::Exp => {
                let exponent = self.stack.peek_at(1)?;
                self.gas.consume(gas::exp_dynamic_cost(exponent))?;
                let base = self.stack.pop()?;
                self.stack.pop()?;
                self.stack.push(base.overflowing_pow(exponent).0)?;
            }

            Operation::Keccak256 => {
                let access = self.peek_access(0, 1)?;
                self.charge(&access, gas::keccak256_dynamic_cost(access.size))?;
                self.pop_n(2)?;
                let data = self.memory.read_bytes(access.offset, access.size);
                self.stack.push(keccak256(&data).to_word())?;
            }

            Operation::Context(field) => {
                let value = self.context_value(field);
                self.stack.push(value)?;
            }

            Operation::CallDataLoad => {
                let index = self.stack.pop()?;
                let mut word = [0u8; 32];
                copy_padded(&mut word, self.context.calldata.as_slice(), clamp(index));
                self.stack.push(U256::from_big_endian(&word))?;
            }
            Operation::CallDataCopy => {
                let calldata = self.context.calldata.as_slice();
                self.copy_to_memory(calldata)?;
            }
            Operation::CodeSize => {
                self.stack.push(U256::from(self.code.len()))?;
            }
            Operation::CodeCopy => {
                let code = self.code;
                self.copy_to_memory(code)?;
            }

            Operation::Pop => {
                self.stack.pop()?;
            }
            Operation::MLoad => {
                let access = self.peek_fixed_access(0, 32)?;
                self.charge(&access, 0)?;
                self.stack.pop()?;
                let word = self.memory.read_word(access.offset);
                self.stack.push(U256::from_big_endian(&word))?;
            }
            Operation::MStore => {
                let access = self.peek_fixed_access(0, 32)?;
                self.charge(&access, 0)?;
                self.stack.pop()?;
                let value = self.stack.pop()?;
                self.memory.write_word(access.offset, &word_to_bytes(value))?;
            }
            Operation::MStore8 => {
                let access = self.peek_fixed_access(0, 1)?;
                self.charge(&access, 0)?;
                self.stack.pop()?;
                let value = self.stack.pop()?;
                self.memory.write_byte(access.offset, value.low_u32() as u8)?;
            }

            Operation::SLoad => {
                let slot = self.stack.pop()?;
                self.stack.push(self.storage.load(slot))?;
            }
            Operation::SStore => {
                let slot = self.stack.pop()?;
                let value = self.stack.pop()?;
                self.storage.store(slot, value);
            }

            Operation::Jump => {
                let dest = self.stack.pop()?;
                next_pc = self.jump_target(dest)?;
            }
            Operation::JumpI => {
                let dest = self.stack.pop()?;
                let condition = self.stack.pop()?;
                if !condition.is_zero() {
                    next_pc = self.jump_target(dest)?;
                }
            }
            Operation::Pc => {
                self.stack.push(U256::from(self.pc))?;
            }
            Operation::MSize => {
                self.stack.push(U256::from(self.memory.len()))?;
            }
            Operation::Gas => {
                self.stack.push(U256::from(self.gas.remaining()))?;
            }
            Operation::JumpDest => {}

            Operation::Push(n) => {
                // Immediates past the end of code read as zero.
                let mut buf = [0u8; 32];
                let n = usize::from(n);
                copy_padded(&mut buf[32 - n..], self.code, self.pc + 1);
                self.stack.push(U256::from_big_endian(&buf))?;
            }
            Operation::Dup(n) => self.stack.dup(usize::from(n))?,
            Operation::Swap(n) => self.stack.swap(usize::from(n))?,

            Operation::Return => {
                self.capture_return_data()?;
                return Ok(Control::Halt);
            }
            Operation::Revert => {
                self.capture_return_data()?;
                return Err(VmError::Revert);
            }
            Operation::Invalid => return Err(VmError::InvalidOpcode(info.byte)),
        }

        self.pc = next_pc;
        Ok(Control::Continue)
    }

    // =========================================================================
    // HELPERS
    // =========================================================================

    fn context_value(&self, field: ContextField) -> Word {
        let ctx = self.context;
        match field {
            ContextField::Address => ctx.address.to_word(),
            ContextField::Origin => ctx.origin.to_word(),
            ContextField::Caller => ctx.caller.to_word(),
            ContextField::CallValue => ctx.value,
            ContextField::CallDataSize => U256::from(ctx.calldata.len()),
            ContextField::GasPrice => ctx.gas_price,
            ContextField::Timestamp => U256::from(ctx.block.timestamp),
            ContextField::Number => U256::from(ctx.block.number),
            ContextField::ChainId => U256::from(ctx.block.chain_id),
        }
    }

    /// Prices the memory range described by the `(offset, size)` operands at
    /// stack depths `offset_at`/`size_at`. The stack is left untouched.
    fn peek_access(&self, offset_at: usize, size_at: usize) -> Result<MemoryAccess, VmError> {
        let offset = self.stack.peek_at(offset_at)?;
        let size = self.stack.peek_at(size_at)?;
        self.access(offset, size)
    }

    /// Like `peek_access` for opcodes with a fixed access width.
    fn peek_fixed_access(&self, offset_at: usize, size: usize) -> Result<MemoryAccess, VmError> {
        let offset = self.stack.peek_at(offset_at)?;
        self.access(offset, U256::from(size))
    }

    fn access(&self, offset: Word, size: Word) -> Result<MemoryAccess, VmError> {
        if size.is_zero() {
            return Ok(MemoryAccess::default());
        }
        let (Some(offset), Some(size)) = (to_usize(offset), to_usize(size)) else {
            return Err(VmError::MemoryOutOfBounds {
                offset: clamp(offset),
                size: clamp(size),
            });
        };
        let words = self.memory.required_words(offset, size)?;
        Ok(MemoryAccess {
            offset,
            size,
            words,
            cost: gas::memory_expansion_cost(self.memory.word_size(), words),
        })
    }

    /// Charges growth plus `extra` in one deduction, then grows memory.
    fn charge(&mut self, access: &MemoryAccess, extra: u64) -> Result<(), VmError> {
        self.gas.consume(access.cost.saturating_add(extra))?;
        self.memory.expand_to_words(access.words);
        Ok(())
    }

    /// Shared body of CALLDATACOPY/CODECOPY: `(dest, src, size)` on the stack.
    fn copy_to_memory(&mut self, source: &[u8]) -> Result<(), VmError> {
        let access = self.peek_access(0, 2)?;
        self.charge(&access, gas::copy_gas_cost(access.size))?;
        let src = clamp(self.stack.peek_at(1)?);
        self.pop_n(3)?;
        self.memory.copy_from(access.offset, source, src, access.size)
    }

    fn capture_return_data(&mut self) -> Result<(), VmError> {
        let access = self.peek_access(0, 1)?;
        self.charge(&access, 0)?;
        self.pop_n(2)?;
        self.return_data = Bytes::from(self.memory.read_bytes(access.offset, access.size));
        Ok(())
    }

    fn jump_target(&self, dest: Word) -> Result<usize, VmError> {
        to_usize(dest)
            .filter(|d| self.jump_dests.contains(d))
            .ok_or(VmError::InvalidJump(clamp(dest)))
    }

    fn pop_n(&mut self, n: usize) -> Result<(), VmError> {
        for _ in 0..n {
            self.stack.pop()?;
        }
        Ok(())
    }
}

// =============================================================================
// PURE HELPERS
// =============================================================================

/// Offsets of every JUMPDEST byte that is not inside PUSH immediate data.
fn analyze_jump_dests(code: &[u8]) -> HashSet<usize> {
    let mut dests = HashSet::new();
    let mut i = 0;
    while i < code.len() {
        match opcodes::lookup(code[i]) {
            Ok(info) => {
                if info.byte == JUMPDEST {
                    dests.insert(i);
                }
                i += 1 + info.immediate_bytes;
            }
            Err(_) => i += 1,
        }
    }
    dests
}

fn to_usize(value: Word) -> Option<usize> {
    (value <= U256::from(usize::MAX)).then(|| value.as_usize())
}

/// Saturating conversion, used where an oversized value simply means
/// "past the end".
fn clamp(value: Word) -> usize {
    to_usize(value).unwrap_or(usize::MAX)
}

fn bool_word(value: bool) -> Word {
    if value {
        U256::one()
    } else {
        U256::zero()
    }
}

/// Two-operand semantics; `a` was on top of the stack, `b` below it.
fn binary(op: BinaryOp, a: Word, b: Word) -> Word {
    match op {
        BinaryOp::Add => a.overflowing_add(b).0,
        BinaryOp::Mul => a.overflowing_mul(b).0,
        BinaryOp::Sub => a.overflowing_sub(b).0,
        BinaryOp::Div => a.checked_div(b).unwrap_or_default(),
        BinaryOp::Mod => a.checked_rem(b).unwrap_or_default(),
        BinaryOp::SDiv => signed_div(a, b),
        BinaryOp::SMod => signed_mod(a, b),
        BinaryOp::SignExtend => sign_extend(a, b),
        BinaryOp::Lt => bool_word(a < b),
        BinaryOp::Gt => bool_word(a > b),
        BinaryOp::SLt => bool_word(signed_lt(a, b)),
        BinaryOp::SGt => bool_word(signed_lt(b, a)),
        BinaryOp::Eq => bool_word(a == b),
        BinaryOp::And => a & b,
        BinaryOp::Or => a | b,
        BinaryOp::Xor => a ^ b,
        BinaryOp::Byte => match to_usize(a) {
            Some(i) if i < 32 => U256::from(word_to_bytes(b)[i]),
            _ => U256::zero(),
        },
        BinaryOp::Shl => match to_usize(a) {
            Some(shift) if shift < 256 => b << shift,
            _ => U256::zero(),
        },
        BinaryOp::Shr => match to_usize(a) {
            Some(shift) if shift < 256 => b >> shift,
            _ => U256::zero(),
        },
        BinaryOp::Sar => sar(b, a),
    }
}

/// ADDMOD/MULMOD in 512-bit precision; modulus zero yields zero.
fn ternary(op: TernaryOp, a: Word, b: Word, n: Word) -> Word {
    if n.is_zero() {
        return U256::zero();
    }
    let (a, b, n) = (to_u512(a), to_u512(b), to_u512(n));
    let wide = match op {
        TernaryOp::AddMod => (a + b) % n,
        TernaryOp::MulMod => (a * b) % n,
    };
    from_u512(wide)
}

fn to_u512(value: Word) -> U512 {
    let mut bytes = [0u8; 64];
    value.to_big_endian(&mut bytes[32..]);
    U512::from_big_endian(&bytes)
}

fn from_u512(value: U512) -> Word {
    let mut bytes = [0u8; 64];
    value.to_big_endian(&mut bytes);
    U256::from_big_endian(&bytes[32..])
}

fn is_negative(value: Word) -> bool {
    value.bit(255)
}

fn negate(value: Word) -> Word {
    (!value).overflowing_add(U256::one()).0
}

fn abs(value: Word) -> Word {
    if is_negative(value) {
        negate(value)
    } else {
        value
    }
}

fn signed_lt(a: Word, b: Word) -> bool {
    match (is_negative(a), is_negative(b)) {
        (true, false) => true,
        (false, true) => false,
        _ => a < b,
    }
}

/// Two's-complement division truncating toward zero; divisor zero yields zero.
fn signed_div(a: Word, b: Word) -> Word {
    if b.is_zero() {
        return U256::zero();
    }
    let quotient = abs(a) / abs(b);
    if is_negative(a) == is_negative(b) {
        quotient
    } else {
        negate(quotient)
    }
}

/// Two's-complement remainder taking the sign of the dividend.
fn signed_mod(a: Word, b: Word) -> Word {
    if b.is_zero() {
        return U256::zero();
    }
    let remainder = abs(a) % abs(b);
    if is_negative(a) {
        negate(remainder)
    } else {
        remainder
    }
}

/// Extends the sign bit of byte `byte_index` (0 = least significant).
fn sign_extend(byte_index: Word, value: Word) -> Word {
    if byte_index >= U256::from(31) {
        return value;
    }
    let bit = byte_index.as_usize() * 8 + 7;
    let mask = (U256::one() << (bit + 1)) - U256::one();
    if value.bit(bit) {
        value | !mask
    } else {
        value & mask
    }
}

fn sar(value: Word, shift: Word) -> Word {
    let negative = is_negative(value);
    match to_usize(shift) {
        Some(shift) if shift < 256 => {
            if negative {
                !((!value) >> shift)
            } else {
                value >> shift
            }
        }
        _ if negative => U256::MAX,
        _ => U256::zero(),
    }
}

// =============================================================================
// TESTS
// =============================================================================
