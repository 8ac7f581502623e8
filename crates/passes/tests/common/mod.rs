#![allow(dead_code)]

use std::collections::BTreeSet;

use waypoint_ir::{
    builder::ModuleBuilder, Block, ControlFlowGraph, Function, Insn, InsnData, Linkage, Module,
    Signature, Type, Value, ValueData,
};
use waypoint_passes::checkpoint::{analysis::AnalysisInputs, NamedValueSets};

/// Build `{ function: { block: [value, ..] } }` maps from literals.
pub fn named_sets(entries: &[(&str, &[(&str, &[&str])])]) -> NamedValueSets {
    entries
        .iter()
        .map(|(func, blocks)| {
            let blocks = blocks
                .iter()
                .map(|(block, vals)| {
                    let vals = vals.iter().map(|v| v.to_string()).collect();
                    (block.to_string(), vals)
                })
                .collect();
            (func.to_string(), blocks)
        })
        .collect()
}

pub fn inputs(
    tracked: &[(&str, &[(&str, &[&str])])],
    live_out: &[(&str, &[(&str, &[&str])])],
) -> AnalysisInputs {
    AnalysisInputs::new(named_sets(tracked), named_sets(live_out))
}

/// Declare the checkpoint-directive intrinsic.
pub fn declare_checkpoint(mb: &mut ModuleBuilder) -> waypoint_ir::FuncRef {
    mb.declare_function(Signature::new(
        "checkpoint",
        Linkage::External,
        &[],
        Type::Unit,
    ))
}

pub fn find_block(func: &Function, name: &str) -> Block {
    func.layout
        .iter_block()
        .find(|block| func.block_name(*block) == name)
        .unwrap_or_else(|| panic!("no block named `{name}`"))
}

pub fn preds(func: &Function, block: Block) -> Vec<Block> {
    let mut cfg = ControlFlowGraph::new();
    cfg.compute(func);
    cfg.preds_of(block).copied().collect()
}

pub fn succs(func: &Function, block: Block) -> Vec<Block> {
    let mut cfg = ControlFlowGraph::new();
    cfg.compute(func);
    cfg.succs_of(block).copied().collect()
}

/// The phi insns at the top of the block.
pub fn phis_of(func: &Function, block: Block) -> Vec<Insn> {
    func.layout
        .iter_insn(block)
        .take_while(|insn| func.dfg.is_phi(*insn))
        .collect()
}

pub fn phi_incomings(func: &Function, phi: Insn) -> Vec<(Value, Block)> {
    func.dfg.insn_data(phi).phi_args().collect()
}

/// Slot indices of `store _, gep(ckpt_mem, k)` instructions in the block.
pub fn store_slots(func: &Function, block: Block) -> BTreeSet<usize> {
    func.layout
        .iter_insn(block)
        .filter_map(|insn| match func.dfg.insn_data(insn) {
            InsnData::Store { args } => gep_slot(func, args[1]),
            _ => None,
        })
        .collect()
}

/// Slot indices of `load gep(ckpt_mem, k)` instructions in the block.
pub fn load_slots(func: &Function, block: Block) -> BTreeSet<usize> {
    func.layout
        .iter_insn(block)
        .filter_map(|insn| match func.dfg.insn_data(insn) {
            InsnData::Load { args, .. } => gep_slot(func, args[0]),
            _ => None,
        })
        .collect()
}

/// The constant slot index the gep-defined address points at.
pub fn gep_slot(func: &Function, addr: Value) -> Option<usize> {
    let insn = func.dfg.value_insn(addr)?;
    let InsnData::Gep { args } = func.dfg.insn_data(insn) else {
        return None;
    };
    let index = *args.get(1)?;
    match func.dfg.value_data(index) {
        ValueData::Immediate { imm, .. } => Some(imm.as_usize()),
        _ => None,
    }
}

/// The dispatcher switch: `(default, [(case id, dest), ..])`.
pub fn dispatcher_switch(func: &Function, dispatcher: Block) -> (Block, Vec<(i64, Block)>) {
    let term = func.layout.last_insn_of(dispatcher).unwrap();
    let InsnData::BrTable {
        args,
        default,
        table,
    } = func.dfg.insn_data(term)
    else {
        panic!("dispatcher does not end in a switch");
    };

    let cases = args[1..]
        .iter()
        .zip(table.iter())
        .map(|(value, block)| match func.dfg.value_data(*value) {
            ValueData::Immediate { imm, .. } => (imm.as_i64(), *block),
            _ => panic!("switch case is not a constant"),
        })
        .collect();

    ((*default).expect("switch has a default"), cases)
}

pub fn single_func(module: &Module) -> &Function {
    let func_ref = module
        .iter_functions()
        .find(|f| !module.is_external(*f))
        .unwrap();
    &module.funcs[func_ref]
}
