//! CFG surgery: edge splits and the per-checkpoint block topology.

use waypoint_ir::{
    func_cursor::{CursorLocation, FuncCursor, InsnInserter},
    Block, Function, Insn, InsnData, Value,
};

use crate::error::SkipReason;

/// The five blocks associated with one checkpoint. Immutable once built.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CheckpointTopo {
    /// The block holding the checkpoint directive.
    pub checkpoint: Block,

    /// Persists tracked values on the checkpoint's exit edge.
    pub save: Block,

    /// Rebuilds tracked values; reachable only from the dispatcher switch.
    pub restore: Block,

    /// Merges the original and restored definitions with phis.
    pub junction: Block,

    /// The checkpoint's original successor, where both paths resume.
    pub resume: Block,
}

/// Name of the dispatcher block inserted after the entry block.
pub const RESTORE_CONTROLLER: &str = "restoreControllerBB";

/// Split the edge `from -> to`, returning the inserted block.
///
/// The new block has exactly one predecessor and one successor. Phi incomings
/// of `to` that flowed through `from` are re-pointed at the new block. The
/// caller is responsible for recomputing the CFG.
pub fn split_edge(func: &mut Function, from: Block, to: Block) -> Result<Block, SkipReason> {
    let failed = SkipReason::SplitFailed { from, to };

    let term = func.layout.last_insn_of(from).ok_or(failed.clone())?;
    if !func.dfg.is_terminator(term) {
        return Err(failed);
    }
    if !func.dfg.branch_info(term).iter_dests().any(|dest| dest == to) {
        return Err(failed);
    }

    let mid = func.dfg.make_block();
    let mut cursor = InsnInserter::at_location(CursorLocation::BlockTop(to));
    cursor.insert_block_before(func, mid);
    cursor.set_location(CursorLocation::BlockTop(mid));
    cursor.append_insn_data(func, InsnData::jump(to));

    func.dfg.rewrite_branch_dest(term, to, mid);
    replace_phi_incoming_block(func, to, from, mid);

    Ok(mid)
}

/// Install the dispatcher block on the edge from the entry block to its first
/// successor. Returns `(dispatcher, original first successor)`.
pub fn install_dispatcher(func: &mut Function) -> Result<(Block, Block), SkipReason> {
    let entry = func
        .layout
        .entry_block()
        .ok_or(SkipReason::NoCandidates)?;
    let term = func
        .layout
        .last_insn_of(entry)
        .ok_or(SkipReason::NoCandidates)?;
    let first_succ = func
        .dfg
        .branch_info(term)
        .iter_dests()
        .next()
        .ok_or(SkipReason::NoCandidates)?;

    let controller = split_edge(func, entry, first_succ)?;
    func.dbg.set_block_name(controller, RESTORE_CONTROLLER);

    Ok((controller, first_succ))
}

/// Build the block topology for one checkpoint:
///
/// ```text
///   checkpoint -> save -> junction -> resume
///                            ^
///                 restore ---'        (no predecessors yet; the dispatcher
///                                      switch adds one at finalization)
/// ```
pub fn build_topology(func: &mut Function, checkpoint: Block) -> Result<CheckpointTopo, SkipReason> {
    let term = func
        .layout
        .last_insn_of(checkpoint)
        .ok_or(SkipReason::UnsupportedTerminator(checkpoint))?;

    // The candidate filter guarantees a single successor, but a degenerate
    // `br_table` also has one; only an unconditional jump is splittable here.
    let resume = match func.dfg.insn_data(term) {
        InsnData::Jump { dests } => dests[0],
        _ => return Err(SkipReason::UnsupportedTerminator(checkpoint)),
    };

    let base = func.block_name(checkpoint);

    let save = split_edge(func, checkpoint, resume)?;
    func.dbg.set_block_name(save, &format!("{base}.saveBB"));

    let junction = split_edge(func, save, resume)?;
    func.dbg
        .set_block_name(junction, &format!("{base}.junctionBB"));

    let restore = func.dfg.make_block();
    func.layout.append_block(restore);
    let mut cursor = InsnInserter::at_location(CursorLocation::BlockTop(restore));
    cursor.append_insn_data(func, InsnData::jump(junction));
    func.dbg
        .set_block_name(restore, &format!("{base}.restoreBB"));

    Ok(CheckpointTopo {
        checkpoint,
        save,
        restore,
        junction,
        resume,
    })
}

/// Re-point phi incomings of `block` that flowed through `old_pred` at
/// `new_pred`.
pub fn replace_phi_incoming_block(
    func: &mut Function,
    block: Block,
    old_pred: Block,
    new_pred: Block,
) {
    for insn in iter_phis(func, block).collect::<Vec<_>>() {
        for pred in func.dfg.insn_data_mut(insn).phi_blocks_mut() {
            if *pred == old_pred {
                *pred = new_pred;
            }
        }
    }
}

/// Iterate the leading phi run of the block.
pub fn iter_phis(func: &Function, block: Block) -> impl Iterator<Item = Insn> + '_ {
    func.layout
        .iter_insn(block)
        .take_while(|insn| func.dfg.is_phi(*insn))
}

/// Insert an instruction right before `before`, attaching a result value if
/// the instruction produces one.
pub(crate) fn insert_insn_before(
    func: &mut Function,
    before: Insn,
    data: InsnData,
) -> (Insn, Option<Value>) {
    let insn = func.dfg.make_insn(data);
    func.layout.insert_insn_before(insn, before);

    let result = func.dfg.make_result(insn).map(|data| {
        let value = func.dfg.make_value(data);
        func.dfg.attach_result(insn, value);
        value
    });

    (insn, result)
}

/// Prepend a phi to the block, attaching its result value.
pub(crate) fn prepend_phi(func: &mut Function, block: Block, data: InsnData) -> (Insn, Value) {
    debug_assert!(data.is_phi());

    let insn = func.dfg.make_insn(data);
    func.layout.prepend_insn(insn, block);

    let result_data = func.dfg.make_result(insn).expect("phi has a result");
    let value = func.dfg.make_value(result_data);
    func.dfg.attach_result(insn, value);

    (insn, value)
}

