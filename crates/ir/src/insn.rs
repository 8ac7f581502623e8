//! This module contains Waypoint IR instruction definitions.
use std::fmt;

use cranelift_entity::entity_impl;
use smallvec::SmallVec;

use crate::{
    module::FuncRef,
    types::CompoundType,
    value::ValueData,
};

use super::{Block, DataFlowGraph, Type, Value};

/// An opaque reference to [`InsnData`].
#[derive(Clone, PartialEq, Eq, Copy, Hash, PartialOrd, Ord)]
pub struct Insn(pub u32);
entity_impl!(Insn, "insn");

/// An instruction data definition.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum InsnData {
    /// Unary instructions.
    Unary { code: UnaryOp, args: [Value; 1] },

    /// Binary instructions.
    Binary { code: BinaryOp, args: [Value; 2] },

    /// Cast operations.
    Cast {
        code: CastOp,
        args: [Value; 1],
        ty: Type,
    },

    /// Load a value of type `ty` from memory.
    Load { args: [Value; 1], ty: Type },

    /// Store a value to memory. `args` are `[value, addr]`.
    Store { args: [Value; 2] },

    /// Allocate a stack slot for the given type.
    Alloca { ty: Type },

    /// Pointer arithmetic. `args` are `[base, index, ..]`; the first index
    /// displaces the base pointer, the rest step into compound types.
    Gep { args: SmallVec<[Value; 8]> },

    /// Call a declared function.
    Call {
        func: FuncRef,
        args: SmallVec<[Value; 8]>,
        ret_ty: Type,
    },

    /// Unconditional jump instruction.
    Jump { dests: [Block; 1] },

    /// Conditional jump instruction.
    Branch { args: [Value; 1], dests: [Block; 2] },

    /// Indirect jump instruction. `args` are `[index, case_value, ..]`, with
    /// one case value per `table` entry.
    BrTable {
        args: SmallVec<[Value; 8]>,
        default: Option<Block>,
        table: SmallVec<[Block; 8]>,
    },

    /// Return.
    Return { args: Option<Value> },

    /// Phi function.
    Phi {
        values: SmallVec<[Value; 8]>,
        blocks: SmallVec<[Block; 8]>,
        ty: Type,
    },
}

impl InsnData {
    pub fn unary(code: UnaryOp, lhs: Value) -> Self {
        Self::Unary { code, args: [lhs] }
    }

    pub fn binary(code: BinaryOp, lhs: Value, rhs: Value) -> Self {
        Self::Binary {
            code,
            args: [lhs, rhs],
        }
    }

    pub fn cast(code: CastOp, arg: Value, ty: Type) -> Self {
        Self::Cast {
            code,
            args: [arg],
            ty,
        }
    }

    pub fn load(addr: Value, ty: Type) -> Self {
        Self::Load { args: [addr], ty }
    }

    pub fn store(value: Value, addr: Value) -> Self {
        Self::Store {
            args: [value, addr],
        }
    }

    pub fn alloca(ty: Type) -> Self {
        Self::Alloca { ty }
    }

    pub fn gep(args: impl Into<SmallVec<[Value; 8]>>) -> Self {
        Self::Gep { args: args.into() }
    }

    pub fn call(func: FuncRef, args: impl Into<SmallVec<[Value; 8]>>, ret_ty: Type) -> Self {
        Self::Call {
            func,
            args: args.into(),
            ret_ty,
        }
    }

    pub fn jump(dest: Block) -> Self {
        Self::Jump { dests: [dest] }
    }

    pub fn branch(cond: Value, then_dest: Block, else_dest: Block) -> Self {
        Self::Branch {
            args: [cond],
            dests: [then_dest, else_dest],
        }
    }

    pub fn br_table(index: Value, default: Option<Block>, cases: &[(Value, Block)]) -> Self {
        let mut args = SmallVec::new();
        args.push(index);
        let mut table = SmallVec::new();
        for (value, block) in cases {
            args.push(*value);
            table.push(*block);
        }

        Self::BrTable {
            args,
            default,
            table,
        }
    }

    pub fn ret(args: Option<Value>) -> Self {
        Self::Return { args }
    }

    pub fn phi(ty: Type) -> Self {
        Self::Phi {
            values: SmallVec::new(),
            blocks: SmallVec::new(),
            ty,
        }
    }

    pub fn analyze_branch(&self) -> BranchInfo {
        match self {
            Self::Jump { dests } => BranchInfo::Jump { dest: dests[0] },

            Self::Branch { args, dests } => BranchInfo::Br {
                cond: args[0],
                dests,
            },

            Self::BrTable {
                args,
                default,
                table,
            } => BranchInfo::BrTable {
                args,
                default: *default,
                table,
            },

            _ => BranchInfo::NotBranch,
        }
    }

    pub fn rewrite_branch_dest(&mut self, from: Block, to: Block) {
        match self {
            Self::Jump { dests } => {
                if dests[0] == from {
                    dests[0] = to
                }
            }

            Self::Branch { dests, .. } => {
                for block in dests.iter_mut() {
                    if *block == from {
                        *block = to;
                    }
                }
            }

            Self::BrTable { default, table, .. } => {
                match default {
                    Some(default_block) if *default_block == from => {
                        *default = Some(to);
                    }
                    _ => {}
                }

                for block in table.iter_mut() {
                    if *block == from {
                        *block = to
                    }
                }
            }

            _ => {}
        }
    }

    pub fn args(&self) -> &[Value] {
        match self {
            Self::Binary { args, .. } | Self::Store { args } => args,

            Self::Unary { args, .. }
            | Self::Cast { args, .. }
            | Self::Load { args, .. }
            | Self::Branch { args, .. } => args,

            Self::Call { args, .. }
            | Self::Gep { args }
            | Self::BrTable { args, .. }
            | Self::Phi { values: args, .. } => args,

            Self::Return { args } => args.as_ref().map(core::slice::from_ref).unwrap_or_default(),

            _ => &[],
        }
    }

    pub fn args_mut(&mut self) -> &mut [Value] {
        match self {
            Self::Binary { args, .. } | Self::Store { args } => args,

            Self::Unary { args, .. }
            | Self::Cast { args, .. }
            | Self::Load { args, .. }
            | Self::Branch { args, .. } => args,

            Self::Call { args, .. }
            | Self::Gep { args }
            | Self::BrTable { args, .. }
            | Self::Phi { values: args, .. } => args,

            Self::Return { args } => args.as_mut().map(core::slice::from_mut).unwrap_or_default(),

            _ => &mut [],
        }
    }

    pub fn append_phi_arg(&mut self, value: Value, block: Block) {
        match self {
            Self::Phi { values, blocks, .. } => {
                values.push(value);
                blocks.push(block)
            }
            _ => panic!("expects `InsnData::Phi` but got `{self:?}`"),
        }
    }

    /// Remove the phi arg that flows through `from`.
    ///
    /// # Panics
    /// Panics if the insn is not a phi, or no phi argument flows through the
    /// block.
    pub fn remove_phi_arg(&mut self, from: Block) -> Value {
        let (values, blocks) = match self {
            InsnData::Phi { values, blocks, .. } => (values, blocks),
            _ => panic!("insn is not a phi function"),
        };

        let mut index = None;
        for (i, block) in blocks.iter().enumerate() {
            if *block == from {
                index = Some(i);
                break;
            }
        }

        let index = index.unwrap();
        blocks.remove(index);
        values.remove(index)
    }

    pub fn phi_blocks(&self) -> &[Block] {
        match self {
            InsnData::Phi { blocks, .. } => blocks,
            _ => panic!("insn is not a phi function"),
        }
    }

    pub fn phi_blocks_mut(&mut self) -> &mut [Block] {
        match self {
            InsnData::Phi { blocks, .. } => blocks,
            _ => panic!("insn is not a phi function"),
        }
    }

    /// Iterate `(incoming value, incoming block)` pairs of a phi.
    pub fn phi_args(&self) -> impl Iterator<Item = (Value, Block)> + '_ {
        let (values, blocks) = match self {
            InsnData::Phi { values, blocks, .. } => (values, blocks),
            _ => panic!("insn is not a phi function"),
        };
        values.iter().copied().zip(blocks.iter().copied())
    }

    pub fn is_phi(&self) -> bool {
        matches!(self, InsnData::Phi { .. })
    }

    pub fn is_return(&self) -> bool {
        matches!(self, InsnData::Return { .. })
    }

    pub fn is_branch(&self) -> bool {
        matches!(
            self,
            InsnData::Jump { .. } | InsnData::Branch { .. } | InsnData::BrTable { .. }
        )
    }

    pub fn is_terminator(&self) -> bool {
        self.is_branch() || self.is_return()
    }

    pub fn has_side_effect(&self) -> bool {
        matches!(
            self,
            InsnData::Load { .. }
                | InsnData::Store { .. }
                | InsnData::Call { .. }
                | InsnData::Return { .. }
                | InsnData::Alloca { .. }
        )
    }

    pub fn result_type(&self, dfg: &DataFlowGraph) -> Option<Type> {
        match self {
            Self::Unary { args, .. } => Some(dfg.value_ty(args[0])),
            Self::Binary { code, args } => Some(code.result_type(dfg, args)),
            Self::Cast { ty, .. } | Self::Load { ty, .. } => Some(*ty),
            Self::Gep { args } => Some(gep_result_type(dfg, args[0], &args[1..])),
            Self::Call { ret_ty, .. } => {
                if ret_ty.is_unit() {
                    None
                } else {
                    Some(*ret_ty)
                }
            }
            Self::Phi { ty, .. } => Some(*ty),
            Self::Alloca { ty } => Some(dfg.ctx.with_ty_store_mut(|s| s.make_ptr(*ty))),
            _ => None,
        }
    }
}

/// Unary operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    Not,
    Neg,
}

impl UnaryOp {
    pub(super) fn as_str(self) -> &'static str {
        match self {
            Self::Not => "not",
            Self::Neg => "neg",
        }
    }
}

impl fmt::Display for UnaryOp {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Binary operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Udiv,
    Sdiv,
    Lt,
    Gt,
    Slt,
    Sgt,
    Le,
    Ge,
    Eq,
    Ne,
    And,
    Or,
    Xor,
}

impl BinaryOp {
    pub fn is_commutative(self) -> bool {
        matches!(
            self,
            Self::Add | Self::Mul | Self::And | Self::Or | Self::Xor
        )
    }

    pub(super) fn as_str(self) -> &'static str {
        match self {
            Self::Add => "add",
            Self::Sub => "sub",
            Self::Mul => "mul",
            Self::Udiv => "udiv",
            Self::Sdiv => "sdiv",
            Self::Lt => "lt",
            Self::Gt => "gt",
            Self::Slt => "slt",
            Self::Sgt => "sgt",
            Self::Le => "le",
            Self::Ge => "ge",
            Self::Eq => "eq",
            Self::Ne => "ne",
            Self::And => "and",
            Self::Or => "or",
            Self::Xor => "xor",
        }
    }

    fn result_type(self, dfg: &DataFlowGraph, args: &[Value; 2]) -> Type {
        if self.is_cmp() {
            Type::I1
        } else {
            dfg.value_ty(args[0])
        }
    }

    fn is_cmp(self) -> bool {
        matches!(
            self,
            Self::Eq
                | Self::Ne
                | Self::Lt
                | Self::Gt
                | Self::Slt
                | Self::Sgt
                | Self::Le
                | Self::Ge
        )
    }
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CastOp {
    Sext,
    Zext,
    Trunc,
    BitCast,
}

impl CastOp {
    pub(super) fn as_str(self) -> &'static str {
        match self {
            Self::Sext => "sext",
            Self::Zext => "zext",
            Self::Trunc => "trunc",
            Self::BitCast => "bitcast",
        }
    }
}

impl fmt::Display for CastOp {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy)]
pub enum BranchInfo<'a> {
    NotBranch,

    /// Unconditional jump.
    Jump { dest: Block },

    /// Conditional jump.
    Br { cond: Value, dests: &'a [Block] },

    /// Indirect jump.
    BrTable {
        args: &'a [Value],
        default: Option<Block>,
        table: &'a [Block],
    },
}

impl<'a> BranchInfo<'a> {
    pub fn iter_dests(self) -> BranchDestIter<'a> {
        BranchDestIter {
            branch_info: self,
            idx: 0,
        }
    }

    pub fn dests_num(self) -> usize {
        match self {
            Self::NotBranch => 0,
            Self::Jump { .. } => 1,
            Self::Br { dests, .. } => dests.len(),
            Self::BrTable { default, table, .. } => table.len() + usize::from(default.is_some()),
        }
    }
}

#[derive(Clone, Copy)]
pub struct BranchDestIter<'a> {
    branch_info: BranchInfo<'a>,
    idx: usize,
}

impl Iterator for BranchDestIter<'_> {
    type Item = Block;

    fn next(&mut self) -> Option<Self::Item> {
        if self.idx >= self.branch_info.dests_num() {
            return None;
        }

        match self.branch_info {
            BranchInfo::Jump { dest } => {
                self.idx += 1;
                Some(dest)
            }

            BranchInfo::Br { dests, .. } => {
                let dest = dests[self.idx];
                self.idx += 1;
                Some(dest)
            }

            BranchInfo::BrTable { default, table, .. } => {
                if let Some(default) = default {
                    let dest = if self.idx == 0 {
                        default
                    } else {
                        table[self.idx - 1]
                    };
                    self.idx += 1;
                    Some(dest)
                } else {
                    let dest = table[self.idx];
                    self.idx += 1;
                    Some(dest)
                }
            }

            BranchInfo::NotBranch => None,
        }
    }
}

fn gep_result_type(dfg: &DataFlowGraph, base: Value, indices: &[Value]) -> Type {
    let ctx = &dfg.ctx;
    let base_ty = dfg.value_ty(base);
    debug_assert!(ctx.with_ty_store(|s| s.is_ptr(base_ty)));

    // The first index is a displacement of the base pointer and doesn't change
    // the pointee type.
    let mut result_ty = ctx.with_ty_store(|s| s.deref(base_ty).unwrap());
    for &index in indices.iter().skip(1) {
        let Type::Compound(compound) = result_ty else {
            unreachable!()
        };

        result_ty = ctx.with_ty_store(|s| match s.resolve_compound(compound) {
            CompoundType::Array { elem, .. } | CompoundType::Ptr(elem) => *elem,
            CompoundType::Struct(s) => {
                let index = match dfg.value_data(index) {
                    ValueData::Immediate { imm, .. } => imm.as_usize(),
                    _ => unreachable!(),
                };
                s.fields[index]
            }
        });
    }

    ctx.with_ty_store_mut(|s| s.make_ptr(result_ty))
}
