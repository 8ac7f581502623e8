//! Post-pass structural and SSA checks.
//!
//! The checkpoint pass edits the CFG and the phi web aggressively; this module
//! is the safety net tests run over every transformed function. It checks:
//!
//! - every block ends in a terminator, and only the last insn is one,
//! - phis appear only in a leading run at the top of a block,
//! - each phi's incoming-block set equals the block's CFG predecessor set,
//! - every use of an insn-defined value is dominated by its definition,
//! - every phi incoming is available on its predecessor edge,
//! - every block in the layout is reachable from the entry block.

use std::collections::BTreeSet;

use rustc_hash::FxHashMap;
use waypoint_ir::{Block, ControlFlowGraph, Function, Insn, ValueData};

use crate::domtree::DomTree;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifyError {
    pub block: Block,
    pub message: String,
}

impl std::fmt::Display for VerifyError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}: {}", self.block, self.message)
    }
}

/// Run all checks over the function. An empty vec means the function is
/// well formed.
pub fn verify_func(func: &Function) -> Vec<VerifyError> {
    let mut cfg = ControlFlowGraph::new();
    cfg.compute(func);
    let mut domtree = DomTree::new();
    domtree.compute(&cfg);

    let mut errors = Vec::new();

    let mut insn_pos: FxHashMap<Insn, usize> = FxHashMap::default();
    for block in func.layout.iter_block() {
        for (idx, insn) in func.layout.iter_insn(block).enumerate() {
            insn_pos.insert(insn, idx);
        }
    }

    for block in func.layout.iter_block() {
        check_block_shape(func, block, &mut errors);
        check_phi_arity(func, &cfg, block, &mut errors);
        check_dominance(func, &domtree, &insn_pos, block, &mut errors);

        if !domtree.is_reachable(block) {
            errors.push(VerifyError {
                block,
                message: "block is unreachable from entry".to_string(),
            });
        }
    }

    errors
}

fn check_block_shape(func: &Function, block: Block, errors: &mut Vec<VerifyError>) {
    let Some(last) = func.layout.last_insn_of(block) else {
        errors.push(VerifyError {
            block,
            message: "empty block".to_string(),
        });
        return;
    };

    if !func.dfg.is_terminator(last) {
        errors.push(VerifyError {
            block,
            message: "block does not end with a terminator".to_string(),
        });
    }

    let mut seen_non_phi = false;
    for insn in func.layout.iter_insn(block) {
        if func.dfg.is_terminator(insn) && insn != last {
            errors.push(VerifyError {
                block,
                message: "terminator before the end of the block".to_string(),
            });
        }

        if func.dfg.is_phi(insn) {
            if seen_non_phi {
                errors.push(VerifyError {
                    block,
                    message: "phi is not at the top of the block".to_string(),
                });
            }
        } else {
            seen_non_phi = true;
        }
    }
}

fn check_phi_arity(
    func: &Function,
    cfg: &ControlFlowGraph,
    block: Block,
    errors: &mut Vec<VerifyError>,
) {
    let preds: BTreeSet<Block> = cfg.preds_of(block).copied().collect();

    for insn in func.layout.iter_insn(block) {
        if !func.dfg.is_phi(insn) {
            continue;
        }

        let mut incoming = BTreeSet::new();
        for &pred in func.dfg.phi_blocks(insn) {
            if !incoming.insert(pred) {
                errors.push(VerifyError {
                    block,
                    message: format!("phi has duplicate incoming from {pred}"),
                });
            }
        }

        if incoming != preds {
            errors.push(VerifyError {
                block,
                message: format!(
                    "phi incoming blocks {incoming:?} don't match predecessors {preds:?}"
                ),
            });
        }
    }
}

fn check_dominance(
    func: &Function,
    domtree: &DomTree,
    insn_pos: &FxHashMap<Insn, usize>,
    block: Block,
    errors: &mut Vec<VerifyError>,
) {
    if !domtree.is_reachable(block) {
        return;
    }

    for insn in func.layout.iter_insn(block) {
        if func.dfg.is_phi(insn) {
            check_phi_incoming_dominance(func, domtree, insn, block, errors);
            continue;
        }

        for &arg in func.dfg.insn_args(insn) {
            let Some(def_insn) = def_of(func, arg) else {
                continue;
            };
            let def_block = func.layout.insn_block(def_insn);

            if def_block == block {
                if insn_pos[&def_insn] >= insn_pos[&insn] {
                    errors.push(VerifyError {
                        block,
                        message: format!("{arg} is used before its local definition"),
                    });
                }
            } else if !domtree.dominates(def_block, block) {
                errors.push(VerifyError {
                    block,
                    message: format!("definition of {arg} does not dominate its use"),
                });
            }
        }
    }
}

fn check_phi_incoming_dominance(
    func: &Function,
    domtree: &DomTree,
    phi: Insn,
    block: Block,
    errors: &mut Vec<VerifyError>,
) {
    let incomings: Vec<_> = func.dfg.insn_data(phi).phi_args().collect();
    for (value, pred) in incomings {
        let Some(def_insn) = def_of(func, value) else {
            continue;
        };
        let def_block = func.layout.insn_block(def_insn);

        if def_insn == phi {
            // A self-referential phi is fine as long as the phi's block
            // dominates the incoming edge.
            if !domtree.dominates(block, pred) {
                errors.push(VerifyError {
                    block,
                    message: format!("self-referential phi incoming from {pred} is invalid"),
                });
            }
            continue;
        }

        if !domtree.dominates(def_block, pred) {
            errors.push(VerifyError {
                block,
                message: format!("phi incoming {value} is not available on edge from {pred}"),
            });
        }
    }
}

fn def_of(func: &Function, value: waypoint_ir::Value) -> Option<Insn> {
    match func.dfg.value_data(value) {
        ValueData::Insn { insn, .. } => Some(*insn),
        _ => None,
    }
}
