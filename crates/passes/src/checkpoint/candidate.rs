//! Checkpoint candidate selection.
//!
//! A block can host a checkpoint iff it has exactly one CFG successor and its
//! tracked set is non-empty once values the marshaller can't persist (pointers
//! to aggregates) are dropped. Among those, the documented mode picks blocks
//! holding a checkpoint directive: a call to a callee whose symbolic name
//! contains `checkpoint`.

use std::collections::BTreeSet;

use tracing::debug;
use waypoint_ir::{Block, ControlFlowGraph, Function, Insn, InsnData, Value};

use super::analysis::FuncAnalysis;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionMode {
    /// Pick blocks marked by a checkpoint directive call.
    Directive,

    /// Pick the blocks whose tracked set is the smallest one of size at least
    /// `min_vals`, for inputs that carry no directives.
    FewestTracked { min_vals: usize },
}

#[derive(Debug, Clone)]
pub struct Candidate {
    pub block: Block,
    pub tracked: BTreeSet<Value>,

    /// The directive call, erased when the checkpoint is committed.
    pub directive: Option<Insn>,
}

/// Returns candidates in layout order.
pub fn select_candidates(
    func: &Function,
    cfg: &ControlFlowGraph,
    analysis: &FuncAnalysis,
    mode: SelectionMode,
) -> Vec<Candidate> {
    let mut eligible = Vec::new();

    for block in func.layout.iter_block() {
        if cfg.succ_num_of(block) != 1 {
            continue;
        }

        let Some(tracked) = analysis.tracked.get(&block) else {
            continue;
        };

        let tracked = remove_aggregate_ptrs(func, block, tracked);
        if tracked.is_empty() {
            debug!(
                func = func.sig.name(),
                %block,
                "no persistable tracked values, block not considered for checkpointing"
            );
            continue;
        }

        eligible.push((block, tracked));
    }

    match mode {
        SelectionMode::Directive => eligible
            .into_iter()
            .filter_map(|(block, tracked)| {
                let directive = find_directive(func, block)?;
                Some(Candidate {
                    block,
                    tracked,
                    directive: Some(directive),
                })
            })
            .collect(),

        SelectionMode::FewestTracked { min_vals } => {
            let min_size = eligible
                .iter()
                .map(|(_, tracked)| tracked.len())
                .filter(|&size| size >= min_vals)
                .min();

            let Some(min_size) = min_size else {
                return Vec::new();
            };

            eligible
                .into_iter()
                .filter(|(_, tracked)| tracked.len() == min_size)
                .map(|(block, tracked)| Candidate {
                    block,
                    tracked,
                    directive: None,
                })
                .collect()
        }
    }
}

/// Drop tracked values whose type is a pointer to an aggregate: the
/// marshaller saves one machine word through one level of indirection only.
fn remove_aggregate_ptrs(
    func: &Function,
    block: Block,
    tracked: &BTreeSet<Value>,
) -> BTreeSet<Value> {
    let ctx = func.ctx();
    tracked
        .iter()
        .copied()
        .filter(|&value| {
            let ty = func.dfg.value_ty(value);
            let nested = ctx.with_ty_store(|s| {
                s.deref(ty).is_some_and(|pointee| pointee.is_compound())
            });
            if nested {
                debug!(
                    func = func.sig.name(),
                    %block,
                    value = %func.value_name(value),
                    "tracked value is a pointer to an aggregate, dropped"
                );
            }
            !nested
        })
        .collect()
}

/// The first call in the block whose callee name contains `checkpoint`.
fn find_directive(func: &Function, block: Block) -> Option<Insn> {
    for insn in func.layout.iter_insn(block) {
        if let InsnData::Call { func: callee, .. } = func.dfg.insn_data(insn) {
            let is_directive = func
                .callees
                .get(callee)
                .is_some_and(|sig| sig.name().contains("checkpoint"));
            if is_directive {
                return Some(insn);
            }
        }
    }
    None
}
