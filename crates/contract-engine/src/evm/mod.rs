//! # Virtual Machine
//!
//! Deterministic, gas-metered stack machine.
//!
//! ## Components
//!
//! - `opcodes.rs` - Static opcode table and tagged handler variants
//! - `gas.rs` - Cost tiers and dynamic cost functions
//! - `stack.rs` - Bounded value stack
//! - `memory.rs` - Linear scratch memory
//! - `storage.rs` - Committed storage and the per-call staged diff
//! - `interpreter.rs` - Decode-dispatch loop

pub mod gas;
pub mod interpreter;
pub mod memory;
pub mod opcodes;
pub mod stack;
pub mod storage;

pub use interpreter::{execute, execute_with_config, Interpreter};
pub use memory::Memory;
pub use opcodes::{lookup, Opcode, OpcodeInfo, Operation, OPCODE_TABLE};
pub use stack::Stack;
pub use storage::{AccountStorage, StorageOverlay};
