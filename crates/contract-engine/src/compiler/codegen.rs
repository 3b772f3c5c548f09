//! # Code Generation
//!
//! Lowers a checked [`ContractDef`] to bytecode, type-checking as it goes.
//!
//! ## Layout
//!
//! Deployment code:
//!
//! ```text
//! [value check] state initializers, constructor params, constructor body
//! ctor_end:  CODECOPY runtime into memory 0, RETURN it
//! revert:    REVERT(0, 0)
//! runtime code (appended verbatim)
//! ```
//!
//! Runtime code:
//!
//! ```text
//! CALLDATASIZE < 4 -> revert
//! selector = CALLDATALOAD(0) >> 224
//! for each function: DUP1 PUSH4 sel EQ PUSH2 body JUMPI
//! REVERT(0, 0)
//! bodies...
//! revert: REVERT(0, 0)
//! ```
//!
//! Locals and parameters live in memory words `32 * k`, allocated per
//! function in declaration order. A return value is written to memory word 0
//! and returned as 32 bytes.

use crate::compiler::abi::{AbiEntry, AbiParam, Selector, StateMutability};
use crate::compiler::ast::{
    BinOp, Block, ContractDef, EnvVar, Expr, ExprKind, FunctionDef, Param, Stmt, StmtKind, Type,
};
use crate::domain::services::word_to_bytes;
use crate::domain::value_objects::U256;
use crate::errors::{CompileError, CompileErrorKind, SourceLocation};
use crate::evm::opcodes::Opcode;
use std::collections::HashMap;

/// Bytecode and ABI for one contract.
#[derive(Debug)]
pub(crate) struct Program {
    pub deploy: Vec<u8>,
    pub runtime: Vec<u8>,
    pub abi: Vec<AbiEntry>,
}

/// Generates deployment code, runtime code and ABI.
pub(crate) fn generate(contract: &ContractDef) -> Result<Program, CompileError> {
    let state = state_slots(contract)?;
    let (runtime, abi) = runtime_code(contract, &state)?;
    let deploy = deploy_code(contract, &state, &runtime)?;
    Ok(Program {
        deploy,
        runtime,
        abi,
    })
}

// =============================================================================
// ASSEMBLER
// =============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Label(usize);

/// Byte emitter with forward-referencable labels.
///
/// Every jump target is pushed with a fixed-width `PUSH2` so code offsets
/// are known in a single pass; the immediates are patched in `finish`.
#[derive(Default)]
struct Assembler {
    code: Vec<u8>,
    labels: Vec<Option<usize>>,
    fixups: Vec<(usize, Label)>,
}

impl Assembler {
    fn new_label(&mut self) -> Label {
        self.labels.push(None);
        Label(self.labels.len() - 1)
    }

    /// Binds `label` to the current offset without emitting anything.
    fn define_label(&mut self, label: Label) {
        self.labels[label.0] = Some(self.code.len());
    }

    /// Binds `label` here and emits the JUMPDEST that makes it a valid target.
    fn place(&mut self, label: Label) {
        self.define_label(label);
        self.op(Opcode::JUMPDEST);
    }

    fn op(&mut self, op: Opcode) {
        self.code.push(op.byte());
    }

    fn ops(&mut self, ops: &[Opcode]) {
        for op in ops {
            self.op(*op);
        }
    }

    /// Pushes `value` with the narrowest PUSH that holds it.
    fn push(&mut self, value: U256) {
        if value.is_zero() {
            self.op(Opcode::PUSH0);
            return;
        }
        let bytes = word_to_bytes(value);
        let skip = bytes.iter().take_while(|b| **b == 0).count();
        // skip < 32 since value is non-zero
        self.op(Opcode::push((32 - skip) as u8));
        self.code.extend_from_slice(&bytes[skip..]);
    }

    fn push_usize(&mut self, value: usize) {
        self.push(U256::from(value));
    }

    fn push_selector(&mut self, selector: Selector) {
        self.op(Opcode::PUSH4);
        self.code.extend_from_slice(&selector.bytes());
    }

    fn push_label(&mut self, label: Label) {
        self.op(Opcode::PUSH2);
        self.fixups.push((self.code.len(), label));
        self.code.extend_from_slice(&[0, 0]);
    }

    fn jump(&mut self, label: Label) {
        self.push_label(label);
        self.op(Opcode::JUMP);
    }

    fn jump_if(&mut self, label: Label) {
        self.push_label(label);
        self.op(Opcode::JUMPI);
    }

    fn resolve_label(&self, label: Label, location: SourceLocation) -> Result<u16, CompileError> {
        let offset = self.labels[label.0].ok_or_else(|| {
            CompileError::syntax("internal error: unbound jump label", location)
        })?;
        u16::try_from(offset).map_err(|_| {
            CompileError::unsupported("code larger than 64 KiB cannot be addressed", location)
        })
    }

    /// Patches every label reference and returns the code.
    fn finish(mut self, location: SourceLocation) -> Result<Vec<u8>, CompileError> {
        for (at, label) in std::mem::take(&mut self.fixups) {
            let target = self.resolve_label(label, location)?;
            self.code[at..at + 2].copy_from_slice(&target.to_be_bytes());
        }
        Ok(self.code)
    }
}

// =============================================================================
// CONTRACT LEVEL
// =============================================================================

#[derive(Clone, Copy, Debug)]
struct StateSlot {
    slot: usize,
    ty: Type,
}

fn duplicate(what: &str, name: &str, location: SourceLocation) -> CompileError {
    CompileError::new(
        CompileErrorKind::DuplicateDeclaration,
        format!("{what} `{name}` is already declared"),
        location,
    )
}

fn state_slots(contract: &ContractDef) -> Result<HashMap<String, StateSlot>, CompileError> {
    let mut slots = HashMap::new();
    for (slot, var) in contract.state_vars.iter().enumerate() {
        let entry = StateSlot { slot, ty: var.ty };
        if slots.insert(var.name.clone(), entry).is_some() {
            return Err(duplicate("state variable", &var.name, var.location));
        }
    }
    Ok(slots)
}

fn abi_entry(function: &FunctionDef) -> AbiEntry {
    AbiEntry {
        name: function.name.clone(),
        inputs: function
            .params
            .iter()
            .map(|p| AbiParam {
                name: p.name.clone(),
                ty: p.ty,
            })
            .collect(),
        outputs: function
            .returns
            .map(|ty| AbiParam {
                name: String::new(),
                ty,
            })
            .into_iter()
            .collect(),
        state_mutability: function.mutability,
        selector: Selector::from_signature(&function.signature()),
    }
}

fn runtime_code(
    contract: &ContractDef,
    state: &HashMap<String, StateSlot>,
) -> Result<(Vec<u8>, Vec<AbiEntry>), CompileError> {
    let mut asm = Assembler::default();
    let revert = asm.new_label();

    let mut abi: Vec<AbiEntry> = Vec::with_capacity(contract.functions.len());
    for function in &contract.functions {
        let entry = abi_entry(function);
        if abi.iter().any(|e| e.name == entry.name) {
            return Err(duplicate("function", &function.name, function.location));
        }
        if abi.iter().any(|e| e.selector == entry.selector) {
            return Err(CompileError::new(
                CompileErrorKind::DuplicateDeclaration,
                format!("selector of `{}` collides with another function", entry.signature()),
                function.location,
            ));
        }
        abi.push(entry);
    }

    // Dispatcher prologue
    asm.push_usize(4);
    asm.ops(&[Opcode::CALLDATASIZE, Opcode::LT]);
    asm.jump_if(revert);
    asm.ops(&[Opcode::PUSH0, Opcode::CALLDATALOAD]);
    asm.push_usize(224);
    asm.op(Opcode::SHR);
    let bodies: Vec<Label> = abi
        .iter()
        .map(|entry| {
            let body = asm.new_label();
            asm.op(Opcode::DUP1);
            asm.push_selector(entry.selector);
            asm.op(Opcode::EQ);
            asm.jump_if(body);
            body
        })
        .collect();
    asm.ops(&[Opcode::PUSH0, Opcode::PUSH0, Opcode::REVERT]);

    for (function, body) in contract.functions.iter().zip(bodies) {
        asm.place(body);
        asm.op(Opcode::POP); // selector
        let mut gen = FunctionGen::new(&mut asm, state, Unit::Function(function), revert);
        gen.reject_value(function.mutability);
        gen.load_params(&function.params, 4)?;
        gen.block(&function.body)?;
        gen.implicit_return();
    }

    asm.place(revert);
    asm.ops(&[Opcode::PUSH0, Opcode::PUSH0, Opcode::REVERT]);
    Ok((asm.finish(contract.location)?, abi))
}

fn deploy_code(
    contract: &ContractDef,
    state: &HashMap<String, StateSlot>,
    runtime: &[u8],
) -> Result<Vec<u8>, CompileError> {
    let mut asm = Assembler::default();
    let revert = asm.new_label();
    let ctor_end = asm.new_label();
    let runtime_start = asm.new_label();

    {
        let mut gen = FunctionGen::new(&mut asm, state, Unit::Constructor(ctor_end), revert);
        let payable = contract.constructor.as_ref().is_some_and(|c| c.payable);
        gen.reject_value(if payable {
            StateMutability::Payable
        } else {
            StateMutability::NonPayable
        });

        for var in &contract.state_vars {
            if let Some(init) = &var.initializer {
                gen.expect_type(init, var.ty, "state variable initializer")?;
                gen.store_state(&var.name, var.location)?;
            }
        }
        if let Some(ctor) = &contract.constructor {
            gen.load_params(&ctor.params, 0)?;
            gen.block(&ctor.body)?;
        }
    }

    asm.place(ctor_end);
    asm.push_usize(runtime.len());
    asm.push_label(runtime_start);
    asm.ops(&[Opcode::PUSH0, Opcode::CODECOPY]);
    asm.push_usize(runtime.len());
    asm.ops(&[Opcode::PUSH0, Opcode::RETURN]);
    asm.place(revert);
    asm.ops(&[Opcode::PUSH0, Opcode::PUSH0, Opcode::REVERT]);
    asm.define_label(runtime_start);
    asm.code.extend_from_slice(runtime);

    asm.finish(contract.location)
}

// =============================================================================
// FUNCTION BODIES
// =============================================================================

/// What a body is compiled for; decides `return` and state-access rules.
#[derive(Clone, Copy)]
enum Unit<'c> {
    Function(&'c FunctionDef),
    /// Constructor code; `return;` jumps to the runtime-copy stub.
    Constructor(Label),
}

#[derive(Clone, Copy, Debug)]
struct Local {
    offset: usize,
    ty: Type,
}

struct FunctionGen<'a, 'c> {
    asm: &'a mut Assembler,
    state: &'a HashMap<String, StateSlot>,
    unit: Unit<'c>,
    revert: Label,
    scopes: Vec<HashMap<String, Local>>,
    next_word: usize,
}

impl<'a, 'c> FunctionGen<'a, 'c> {
    fn new(
        asm: &'a mut Assembler,
        state: &'a HashMap<String, StateSlot>,
        unit: Unit<'c>,
        revert: Label,
    ) -> Self {
        Self {
            asm,
            state,
            unit,
            revert,
            scopes: vec![HashMap::new()],
            next_word: 0,
        }
    }

    fn mutability(&self) -> StateMutability {
        match self.unit {
            Unit::Function(f) => f.mutability,
            Unit::Constructor(_) => StateMutability::Payable,
        }
    }

    fn unit_name(&self) -> &str {
        match self.unit {
            Unit::Function(f) => &f.name,
            Unit::Constructor(_) => "constructor",
        }
    }

    fn violation(&self, action: &str, location: SourceLocation) -> CompileError {
        let mutability = match self.mutability() {
            StateMutability::Pure => "pure",
            _ => "view",
        };
        CompileError::new(
            CompileErrorKind::MutabilityViolation,
            format!("{mutability} function `{}` {action}", self.unit_name()),
            location,
        )
    }

    // ===== ENTRY / EXIT =====

    /// Reverts when value is attached to a non-payable entry point.
    fn reject_value(&mut self, mutability: StateMutability) {
        if mutability != StateMutability::Payable {
            self.asm.op(Opcode::CALLVALUE);
            self.asm.jump_if(self.revert);
        }
    }

    /// Copies word-encoded arguments starting at calldata `base` into locals.
    fn load_params(&mut self, params: &[Param], base: usize) -> Result<(), CompileError> {
        for (index, param) in params.iter().enumerate() {
            let offset = self.declare(&param.name, param.ty, param.location)?;
            self.asm.push_usize(base + 32 * index);
            self.asm.op(Opcode::CALLDATALOAD);
            match param.ty {
                Type::Uint256 => {}
                Type::Bool => self.asm.ops(&[Opcode::ISZERO, Opcode::ISZERO]),
                Type::Address => {
                    self.asm.push((U256::one() << 160) - U256::one());
                    self.asm.op(Opcode::AND);
                }
            }
            self.asm.push_usize(offset);
            self.asm.op(Opcode::MSTORE);
        }
        Ok(())
    }

    /// Code for falling off the end of a function body.
    fn implicit_return(&mut self) {
        match self.unit {
            Unit::Function(FunctionDef {
                returns: Some(_), ..
            }) => {
                self.asm.ops(&[Opcode::PUSH0, Opcode::PUSH0, Opcode::MSTORE]);
                self.return_word();
            }
            _ => self.asm.op(Opcode::STOP),
        }
    }

    /// Returns memory word 0 as 32 bytes of return data.
    fn return_word(&mut self) {
        self.asm.push_usize(32);
        self.asm.ops(&[Opcode::PUSH0, Opcode::RETURN]);
    }

    // ===== NAMES =====

    fn declare(&mut self, name: &str, ty: Type, location: SourceLocation) -> Result<usize, CompileError> {
        let offset = self.next_word * 32;
        let scope = self
            .scopes
            .last_mut()
            .ok_or_else(|| CompileError::syntax("internal error: no open scope", location))?;
        if scope.contains_key(name) {
            return Err(duplicate("variable", name, location));
        }
        scope.insert(name.to_string(), Local { offset, ty });
        self.next_word += 1;
        Ok(offset)
    }

    fn local(&self, name: &str) -> Option<Local> {
        self.scopes.iter().rev().find_map(|s| s.get(name).copied())
    }

    fn undeclared(name: &str, location: SourceLocation) -> CompileError {
        CompileError::new(
            CompileErrorKind::UndeclaredIdentifier,
            format!("undeclared identifier `{name}`"),
            location,
        )
    }

    /// Loads a variable; returns its type.
    fn load(&mut self, name: &str, location: SourceLocation) -> Result<Type, CompileError> {
        if let Some(local) = self.local(name) {
            self.asm.push_usize(local.offset);
            self.asm.op(Opcode::MLOAD);
            return Ok(local.ty);
        }
        let Some(var) = self.state.get(name).copied() else {
            return Err(Self::undeclared(name, location));
        };
        if self.mutability() == StateMutability::Pure {
            return Err(self.violation(&format!("reads state variable `{name}`"), location));
        }
        self.asm.push_usize(var.slot);
        self.asm.op(Opcode::SLOAD);
        Ok(var.ty)
    }

    /// Type of an assignable name, checking write permission.
    fn target_type(&self, name: &str, location: SourceLocation) -> Result<Type, CompileError> {
        if let Some(local) = self.local(name) {
            return Ok(local.ty);
        }
        let Some(var) = self.state.get(name) else {
            return Err(Self::undeclared(name, location));
        };
        if self.mutability().is_read_only() {
            return Err(self.violation(&format!("writes state variable `{name}`"), location));
        }
        Ok(var.ty)
    }

    /// Stores the top of stack into `name`.
    fn store(&mut self, name: &str, location: SourceLocation) -> Result<(), CompileError> {
        if let Some(local) = self.local(name) {
            self.asm.push_usize(local.offset);
            self.asm.op(Opcode::MSTORE);
            return Ok(());
        }
        self.store_state(name, location)
    }

    fn store_state(&mut self, name: &str, location: SourceLocation) -> Result<(), CompileError> {
        let var = self
            .state
            .get(name)
            .copied()
            .ok_or_else(|| Self::undeclared(name, location))?;
        self.asm.push_usize(var.slot);
        self.asm.op(Opcode::SSTORE);
        Ok(())
    }

    // ===== STATEMENTS =====

    fn block(&mut self, block: &Block) -> Result<(), CompileError> {
        self.scopes.push(HashMap::new());
        let result = block.iter().try_for_each(|stmt| self.stmt(stmt));
        self.scopes.pop();
        result
    }

    fn stmt(&mut self, stmt: &Stmt) -> Result<(), CompileError> {
        match &stmt.kind {
            StmtKind::Local { name, ty, init } => {
                match init {
                    Some(init) => self.expect_type(init, *ty, "initializer")?,
                    None => self.asm.op(Opcode::PUSH0),
                }
                // Declared after its initializer so it cannot refer to itself.
                let offset = self.declare(name, *ty, stmt.location)?;
                self.asm.push_usize(offset);
                self.asm.op(Opcode::MSTORE);
            }
            StmtKind::Assign { target, value } => {
                let ty = self.target_type(target, stmt.location)?;
                self.expect_type(value, ty, "assignment")?;
                self.store(target, stmt.location)?;
            }
            StmtKind::Return(value) => self.return_stmt(value.as_ref(), stmt.location)?,
            StmtKind::Require(cond) => {
                self.expect_type(cond, Type::Bool, "require condition")?;
                self.asm.op(Opcode::ISZERO);
                self.asm.jump_if(self.revert);
            }
            StmtKind::If {
                cond,
                then_branch,
                else_branch,
            } => {
                let otherwise = self.asm.new_label();
                self.expect_type(cond, Type::Bool, "if condition")?;
                self.asm.op(Opcode::ISZERO);
                self.asm.jump_if(otherwise);
                self.block(then_branch)?;
                match else_branch {
                    Some(else_branch) => {
                        let end = self.asm.new_label();
                        self.asm.jump(end);
                        self.asm.place(otherwise);
                        self.block(else_branch)?;
                        self.asm.place(end);
                    }
                    None => self.asm.place(otherwise),
                }
            }
            StmtKind::While { cond, body } => {
                let start = self.asm.new_label();
                let end = self.asm.new_label();
                self.asm.place(start);
                self.expect_type(cond, Type::Bool, "while condition")?;
                self.asm.op(Opcode::ISZERO);
                self.asm.jump_if(end);
                self.block(body)?;
                self.asm.jump(start);
                self.asm.place(end);
            }
            StmtKind::Block(block) => self.block(block)?,
        }
        Ok(())
    }

    fn return_stmt(&mut self, value: Option<&Expr>, location: SourceLocation) -> Result<(), CompileError> {
        match (self.unit, value) {
            (Unit::Function(f), Some(value)) => {
                let Some(ty) = f.returns else {
                    return Err(CompileError::type_mismatch(
                        format!("function `{}` does not return a value", f.name),
                        location,
                    ));
                };
                self.expect_type(value, ty, "return value")?;
                self.asm.ops(&[Opcode::PUSH0, Opcode::MSTORE]);
                self.return_word();
            }
            (Unit::Function(f), None) => {
                if let Some(ty) = f.returns {
                    return Err(CompileError::type_mismatch(
                        format!("function `{}` must return a `{ty}` value", f.name),
                        location,
                    ));
                }
                self.asm.op(Opcode::STOP);
            }
            (Unit::Constructor(_), Some(_)) => {
                return Err(CompileError::type_mismatch(
                    "constructor cannot return a value",
                    location,
                ))
            }
            (Unit::Constructor(end), None) => self.asm.jump(end),
        }
        Ok(())
    }

    // ===== EXPRESSIONS =====

    fn expect_type(&mut self, expr: &Expr, expected: Type, context: &str) -> Result<(), CompileError> {
        let actual = self.expr(expr)?;
        if actual == expected {
            Ok(())
        } else {
            Err(CompileError::type_mismatch(
                format!("{context} expects `{expected}`, found `{actual}`"),
                expr.location,
            ))
        }
    }

    /// Emits code leaving the value of `expr` on the stack; returns its type.
    fn expr(&mut self, expr: &Expr) -> Result<Type, CompileError> {
        match &expr.kind {
            ExprKind::Number(n) => {
                self.asm.push(*n);
                Ok(Type::Uint256)
            }
            ExprKind::Bool(b) => {
                self.asm.push(U256::from(u8::from(*b)));
                Ok(Type::Bool)
            }
            ExprKind::Ident(name) => self.load(name, expr.location),
            ExprKind::Env(var) => {
                if self.mutability() == StateMutability::Pure {
                    return Err(self.violation("reads the environment", expr.location));
                }
                self.asm.op(match var {
                    EnvVar::MsgSender => Opcode::CALLER,
                    EnvVar::MsgValue => Opcode::CALLVALUE,
                    EnvVar::BlockTimestamp => Opcode::TIMESTAMP,
                    EnvVar::BlockNumber => Opcode::NUMBER,
                    EnvVar::BlockChainId => Opcode::CHAINID,
                    EnvVar::TxGasPrice => Opcode::GASPRICE,
                    EnvVar::TxOrigin => Opcode::ORIGIN,
                });
                Ok(var.ty())
            }
            ExprKind::Not(operand) => {
                self.expect_type(operand, Type::Bool, "operator `!`")?;
                self.asm.op(Opcode::ISZERO);
                Ok(Type::Bool)
            }
            ExprKind::Binary { op, lhs, rhs } => self.binary(*op, lhs, rhs, expr.location),
        }
    }

    fn binary(&mut self, op: BinOp, lhs: &Expr, rhs: &Expr, location: SourceLocation) -> Result<Type, CompileError> {
        // The VM computes `top OP next`, so non-commutative operators need
        // the left operand on top.
        let commutative = matches!(op, BinOp::Add | BinOp::Mul | BinOp::Eq | BinOp::Ne | BinOp::And | BinOp::Or);
        let (lhs_ty, rhs_ty) = if commutative {
            let l = self.expr(lhs)?;
            (l, self.expr(rhs)?)
        } else {
            let r = self.expr(rhs)?;
            (self.expr(lhs)?, r)
        };

        let operand = match op {
            BinOp::Eq | BinOp::Ne => lhs_ty,
            BinOp::And | BinOp::Or => Type::Bool,
            _ => Type::Uint256,
        };
        if lhs_ty != operand || rhs_ty != operand {
            return Err(CompileError::type_mismatch(
                format!(
                    "operator `{}` cannot be applied to `{lhs_ty}` and `{rhs_ty}`",
                    op.symbol()
                ),
                location,
            ));
        }

        let result = match op {
            BinOp::Add => self.emit(&[Opcode::ADD], Type::Uint256),
            BinOp::Sub => self.emit(&[Opcode::SUB], Type::Uint256),
            BinOp::Mul => self.emit(&[Opcode::MUL], Type::Uint256),
            BinOp::Div => self.emit(&[Opcode::DIV], Type::Uint256),
            BinOp::Mod => self.emit(&[Opcode::MOD], Type::Uint256),
            BinOp::Lt => self.emit(&[Opcode::LT], Type::Bool),
            BinOp::Gt => self.emit(&[Opcode::GT], Type::Bool),
            BinOp::Le => self.emit(&[Opcode::GT, Opcode::ISZERO], Type::Bool),
            BinOp::Ge => self.emit(&[Opcode::LT, Opcode::ISZERO], Type::Bool),
            BinOp::Eq => self.emit(&[Opcode::EQ], Type::Bool),
            BinOp::Ne => self.emit(&[Opcode::EQ, Opcode::ISZERO], Type::Bool),
            BinOp::And => self.emit(&[Opcode::AND], Type::Bool),
            BinOp::Or => self.emit(&[Opcode::OR], Type::Bool),
        };
        Ok(result)
    }

    fn emit(&mut self, ops: &[Opcode], result: Type) -> Type {
        self.asm.ops(ops);
        result
    }
}

// =============================================================================
// TESTS
// =============================================================================
