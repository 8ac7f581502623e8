//! SSA repair after marshalling.
//!
//! Once a checkpoint's blocks are populated, two definitions of every tracked
//! value coexist: the original one and the junction phi merging it with the
//! restored one. This module rewrites downstream uses so every use sees the
//! merged definition (or a phi derived from it) while preserving the
//! dominance and phi-arity invariants.
//!
//! The traversal is a breadth-first worklist of update requests. Each request
//! carries the set of SSA values currently standing for the same logical
//! variable (`value_versions`); each block accumulates the union of every
//! version set that has reached it. A request that revisits its start block,
//! reaches an exit, or brings no version the block hasn't seen performs its
//! rewrite but enqueues nothing further, which bounds the work on cyclic and
//! irreducible control flow.

use std::collections::{BTreeSet, VecDeque};

use rustc_hash::{FxHashMap, FxHashSet};
use tracing::trace;
use waypoint_ir::{Block, ControlFlowGraph, Function, InsnData, Value};

use super::topo::{iter_phis, prepend_phi};

/// Live-out lookup combining the analysis data with the synthetic sets
/// published for the blocks this pass created. The synthetic sets are keyed
/// on the original value, matching how the rest of the analysis data is
/// keyed.
pub struct LiveOutView<'a> {
    pub analysis: &'a FxHashMap<Block, BTreeSet<Value>>,
    pub save: &'a FxHashMap<Block, BTreeSet<Value>>,
    pub restore: &'a FxHashMap<Block, BTreeSet<Value>>,
    pub junction: &'a FxHashMap<Block, BTreeSet<Value>>,
}

impl LiveOutView<'_> {
    fn is_live_out(&self, block: Block, value: Value) -> bool {
        let set = self
            .junction
            .get(&block)
            .or_else(|| self.save.get(&block))
            .or_else(|| self.restore.get(&block))
            .or_else(|| self.analysis.get(&block));

        set.is_some_and(|set| set.contains(&value))
    }

    /// How many predecessors of `block` have `value` live on their outgoing
    /// edges.
    fn preds_with_live_out(&self, cfg: &ControlFlowGraph, block: Block, value: Value) -> usize {
        cfg.preds_of(block)
            .filter(|&&pred| self.is_live_out(pred, value))
            .count()
    }
}

struct UpdateRequest {
    curr: Block,
    prev: Block,
    new_val: Value,
    versions: BTreeSet<Value>,
}

/// Rewrite downstream uses of `old_val` so they see `new_val` (the junction's
/// merge phi) or a phi derived from it. `start` is the junction's successor.
pub fn propagate_restored_value(
    func: &mut Function,
    cfg: &ControlFlowGraph,
    live: &LiveOutView,
    new_blocks: &FxHashSet<Block>,
    start: Block,
    junction: Block,
    old_val: Value,
    new_val: Value,
) {
    let mut visited: FxHashMap<Block, BTreeSet<Value>> = FxHashMap::default();
    let mut queue = VecDeque::new();

    let mut versions = BTreeSet::new();
    versions.insert(old_val);
    versions.insert(new_val);

    queue.push_back(UpdateRequest {
        curr: start,
        prev: junction,
        new_val,
        versions,
    });

    while let Some(request) = queue.pop_front() {
        process_request(
            func, cfg, live, new_blocks, start, old_val, request, &mut visited, &mut queue,
        );
    }
}

#[allow(clippy::too_many_arguments)]
fn process_request(
    func: &mut Function,
    cfg: &ControlFlowGraph,
    live: &LiveOutView,
    new_blocks: &FxHashSet<Block>,
    start: Block,
    old_val: Value,
    request: UpdateRequest,
    visited: &mut FxHashMap<Block, BTreeSet<Value>>,
    queue: &mut VecDeque<UpdateRequest>,
) {
    let UpdateRequest {
        curr,
        prev,
        new_val,
        mut versions,
    } = request;

    trace!(
        curr = %func.block_name(curr),
        prev = %func.block_name(prev),
        old = %func.value_name(old_val),
        new = %func.value_name(new_val),
        "processing update request"
    );

    // Stop after looping back to (and re-processing) the start block.
    let mut stop = curr == start && visited.contains_key(&curr);

    // An exit block has nothing to enqueue.
    if cfg.succ_num_of(curr) == 0 {
        stop = true;
    }

    // Marks the block as visited if it wasn't already.
    let mut bb_versions = visited.entry(curr).or_default().clone();

    // No version the block hasn't already seen: the rewrite is idempotent
    // from here on.
    if bb_versions == versions {
        stop = true;
    }

    let is_join = !new_blocks.contains(&curr)
        && cfg.pred_num_of(curr) >= 2
        && live.preds_with_live_out(cfg, curr, old_val) > 1;

    if is_join {
        if phi_carries_version(func, curr, prev, &versions) {
            // A phi already merges a version of the variable on this edge;
            // rewrite the incoming. Its output is already known downstream,
            // so nothing is enqueued.
            rewrite_phi_incomings(func, curr, prev, new_val, &versions);

            bb_versions.extend(versions.iter().copied());
            visited.insert(curr, bb_versions);
        } else {
            // Reaching definitions converge here: place a new phi.
            let preds: Vec<Block> = cfg.preds_of(curr).copied().collect();
            let mut phi = InsnData::phi(func.dfg.value_ty(old_val));
            for &pred in &preds {
                let incoming = if pred == prev { new_val } else { old_val };
                phi.append_phi_arg(incoming, pred);
                versions.insert(incoming);
            }
            let (phi_insn, merged) = prepend_phi(func, curr, phi);

            for insn in func.layout.iter_insn(curr).collect::<Vec<_>>() {
                if insn != phi_insn {
                    func.dfg.replace_insn_args(insn, old_val, merged);
                }
                if defines_version(func, insn, &versions) {
                    stop = true;
                }
            }

            versions.insert(merged);
            bb_versions.extend(versions.iter().copied());
            visited.insert(curr, bb_versions);

            if !stop {
                enqueue_succs(cfg, curr, merged, &versions, queue);
            }
        }
    } else {
        for insn in func.layout.iter_insn(curr).collect::<Vec<_>>() {
            func.dfg.replace_insn_args(insn, old_val, new_val);
            if defines_version(func, insn, &versions) {
                // The block redefines the logical variable; the propagation
                // along this path ends at the definition.
                stop = true;
            }
        }

        versions.insert(new_val);
        bb_versions.extend(versions.iter().copied());
        visited.insert(curr, bb_versions);

        if !stop {
            enqueue_succs(cfg, curr, new_val, &versions, queue);
        }
    }
}

fn enqueue_succs(
    cfg: &ControlFlowGraph,
    curr: Block,
    new_val: Value,
    versions: &BTreeSet<Value>,
    queue: &mut VecDeque<UpdateRequest>,
) {
    for &succ in cfg.succs_of(curr) {
        if succ != curr {
            queue.push_back(UpdateRequest {
                curr: succ,
                prev: curr,
                new_val,
                versions: versions.clone(),
            });
        }
    }
}

/// Does some phi of `block` carry an incoming from `prev` whose value is a
/// known version of the variable?
fn phi_carries_version(
    func: &Function,
    block: Block,
    prev: Block,
    versions: &BTreeSet<Value>,
) -> bool {
    iter_phis(func, block).any(|insn| {
        func.dfg
            .insn_data(insn)
            .phi_args()
            .any(|(value, pred)| pred == prev && versions.contains(&value))
    })
}

/// Rewrite every phi incoming from `prev` whose value is a known version to
/// `new_val`.
fn rewrite_phi_incomings(
    func: &mut Function,
    block: Block,
    prev: Block,
    new_val: Value,
    versions: &BTreeSet<Value>,
) {
    for insn in iter_phis(func, block).collect::<Vec<_>>() {
        if let InsnData::Phi { values, blocks, .. } = func.dfg.insn_data_mut(insn) {
            for (value, pred) in values.iter_mut().zip(blocks.iter()) {
                if *pred == prev && versions.contains(value) && *value != new_val {
                    *value = new_val;
                }
            }
        }
    }
}

/// Is the insn itself a definition of one of the known versions?
fn defines_version(func: &Function, insn: waypoint_ir::Insn, versions: &BTreeSet<Value>) -> bool {
    func.dfg
        .insn_result(insn)
        .is_some_and(|result| versions.contains(&result))
}
