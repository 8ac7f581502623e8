//! This module contains the Waypoint IR data flow graph.
use cranelift_entity::{entity_impl, packed_option::PackedOption, PrimaryMap, SecondaryMap};
use rustc_hash::FxHashMap;

use crate::{insn::BranchInfo, module::ModuleCtx};

use super::{Immediate, Insn, InsnData, Type, Value, ValueData};

#[derive(Debug, Clone)]
pub struct DataFlowGraph {
    pub ctx: ModuleCtx,
    #[doc(hidden)]
    pub blocks: PrimaryMap<Block, BlockData>,
    #[doc(hidden)]
    pub values: PrimaryMap<Value, ValueData>,
    insns: PrimaryMap<Insn, InsnData>,
    insn_results: SecondaryMap<Insn, PackedOption<Value>>,
    #[doc(hidden)]
    pub immediates: FxHashMap<Immediate, Value>,
}

impl DataFlowGraph {
    pub fn new(ctx: ModuleCtx) -> Self {
        Self {
            ctx,
            blocks: PrimaryMap::default(),
            values: PrimaryMap::default(),
            insns: PrimaryMap::default(),
            insn_results: SecondaryMap::default(),
            immediates: FxHashMap::default(),
        }
    }

    pub fn make_block(&mut self) -> Block {
        self.blocks.push(BlockData::new())
    }

    pub fn make_value(&mut self, value: ValueData) -> Value {
        self.values.push(value)
    }

    pub fn make_insn(&mut self, insn: InsnData) -> Insn {
        self.insns.push(insn)
    }

    pub fn make_imm_value<Imm>(&mut self, imm: Imm) -> Value
    where
        Imm: Into<Immediate>,
    {
        let imm: Immediate = imm.into();
        if let Some(&value) = self.immediates.get(&imm) {
            return value;
        }

        let ty = imm.ty();
        let value_data = ValueData::Immediate { imm, ty };
        let value = self.make_value(value_data);
        self.immediates.insert(imm, value);
        value
    }

    pub fn make_arg_value(&mut self, ty: Type, idx: usize) -> ValueData {
        ValueData::Arg { ty, idx }
    }

    /// Returns the result value data for the insn, if the insn produces one.
    pub fn make_result(&mut self, insn: Insn) -> Option<ValueData> {
        let ty = self.insns[insn].result_type(self)?;
        Some(ValueData::Insn { insn, ty })
    }

    pub fn attach_result(&mut self, insn: Insn, value: Value) {
        debug_assert!(self.insn_results[insn].is_none());
        self.insn_results[insn] = value.into();
    }

    pub fn replace_insn(&mut self, insn: Insn, data: InsnData) {
        self.insns[insn] = data;
    }

    pub fn insn_data(&self, insn: Insn) -> &InsnData {
        &self.insns[insn]
    }

    pub fn insn_data_mut(&mut self, insn: Insn) -> &mut InsnData {
        &mut self.insns[insn]
    }

    pub fn value_data(&self, value: Value) -> &ValueData {
        &self.values[value]
    }

    pub fn value_ty(&self, value: Value) -> Type {
        match &self.values[value] {
            ValueData::Insn { ty, .. }
            | ValueData::Arg { ty, .. }
            | ValueData::Immediate { ty, .. } => *ty,
        }
    }

    /// Returns the insn that defines the value, if any.
    pub fn value_insn(&self, value: Value) -> Option<Insn> {
        match self.values[value] {
            ValueData::Insn { insn, .. } => Some(insn),
            _ => None,
        }
    }

    pub fn value_is_imm(&self, value: Value) -> bool {
        matches!(self.values[value], ValueData::Immediate { .. })
    }

    pub fn insn_result(&self, insn: Insn) -> Option<Value> {
        self.insn_results[insn].expand()
    }

    pub fn insn_result_ty(&self, insn: Insn) -> Option<Type> {
        self.insn_result(insn).map(|value| self.value_ty(value))
    }

    pub fn insn_args(&self, insn: Insn) -> &[Value] {
        self.insns[insn].args()
    }

    /// Replace every operand of the insn that equals `from` with `to`.
    /// Returns `true` if any operand was rewritten.
    pub fn replace_insn_args(&mut self, insn: Insn, from: Value, to: Value) -> bool {
        let mut replaced = false;
        for arg in self.insns[insn].args_mut() {
            if *arg == from {
                *arg = to;
                replaced = true;
            }
        }
        replaced
    }

    pub fn branch_info(&self, insn: Insn) -> BranchInfo {
        self.insns[insn].analyze_branch()
    }

    pub fn is_phi(&self, insn: Insn) -> bool {
        self.insns[insn].is_phi()
    }

    pub fn is_branch(&self, insn: Insn) -> bool {
        self.insns[insn].is_branch()
    }

    pub fn is_terminator(&self, insn: Insn) -> bool {
        self.insns[insn].is_terminator()
    }

    pub fn is_exit(&self, insn: Insn) -> bool {
        self.insns[insn].is_return()
    }

    pub fn has_side_effect(&self, insn: Insn) -> bool {
        self.insns[insn].has_side_effect()
    }

    pub fn rewrite_branch_dest(&mut self, insn: Insn, from: Block, to: Block) {
        self.insns[insn].rewrite_branch_dest(from, to);
    }

    pub fn append_phi_arg(&mut self, insn: Insn, value: Value, block: Block) {
        self.insns[insn].append_phi_arg(value, block);
    }

    pub fn remove_phi_arg(&mut self, insn: Insn, from: Block) -> Value {
        self.insns[insn].remove_phi_arg(from)
    }

    pub fn phi_blocks(&self, insn: Insn) -> &[Block] {
        self.insns[insn].phi_blocks()
    }

    pub fn make_jump(&self, dest: Block) -> InsnData {
        InsnData::jump(dest)
    }
}

/// An opaque reference to [`BlockData`].
#[derive(Clone, PartialEq, Eq, Copy, Hash, PartialOrd, Ord)]
pub struct Block(pub u32);
entity_impl!(Block, "block");

/// A block data definition.
/// A block data doesn't hold any layout information. Layout is managed by
/// [`super::Layout`].
#[derive(Debug, Clone, Default)]
pub struct BlockData {}

impl BlockData {
    pub fn new() -> Self {
        Self::default()
    }
}
