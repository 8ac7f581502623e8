//! Dispatcher finalization: checkpoint ids, the heartbeat, and the restore
//! switch.

use waypoint_ir::{insn::BinaryOp, Block, Function, InsnData, Value};

use super::{
    marshal::{load_slot, store_slot, CKPT_ID, HEARTBEAT},
    topo::{insert_insn_before, CheckpointTopo},
};

/// Assign ids to the installed checkpoints and finish the instrumentation:
///
/// - rename save/restore/junction blocks to embed their id,
/// - store the id in each save block and bump the heartbeat in each save and
///   restore block,
/// - turn the dispatcher's terminator into a switch on the persisted id,
///   falling through to the original entry flow for id 0.
pub fn finalize(
    func: &mut Function,
    dispatcher: Block,
    default_dest: Block,
    topos: &[CheckpointTopo],
    ckpt_mem: Value,
) {
    let mut cases = Vec::with_capacity(topos.len());

    for (i, topo) in topos.iter().enumerate() {
        let id = i + 1;

        embed_id(func, topo.save, id);
        embed_id(func, topo.restore, id);
        embed_id(func, topo.junction, id);

        let save_term = func
            .layout
            .last_insn_of(topo.save)
            .expect("save block has a terminator");
        let id_val = func.dfg.make_imm_value(id as i32);
        store_slot(func, save_term, ckpt_mem, CKPT_ID, id_val);
        bump_heartbeat(func, save_term, ckpt_mem);

        let restore_term = func
            .layout
            .last_insn_of(topo.restore)
            .expect("restore block has a terminator");
        bump_heartbeat(func, restore_term, ckpt_mem);

        cases.push((id_val, topo.restore));
    }

    // id 0 is reserved for "no checkpoint saved" and falls through to the
    // normal entry flow.
    let term = func
        .layout
        .last_insn_of(dispatcher)
        .expect("dispatcher has a terminator");
    let id = load_slot(func, term, ckpt_mem, CKPT_ID);
    func.dfg
        .replace_insn(term, InsnData::br_table(id, Some(default_dest), &cases));
}

fn embed_id(func: &mut Function, block: Block, id: usize) {
    let name = format!("{}.id{id}", func.block_name(block));
    func.dbg.set_block_name(block, &name);
}

/// `mem[HEARTBEAT] += 1`, inserted before `before`.
fn bump_heartbeat(func: &mut Function, before: waypoint_ir::Insn, ckpt_mem: Value) {
    let loaded = load_slot(func, before, ckpt_mem, HEARTBEAT);
    let one = func.dfg.make_imm_value(1i32);
    let (_, bumped) = insert_insn_before(func, before, InsnData::binary(BinaryOp::Add, loaded, one));
    store_slot(func, before, ckpt_mem, HEARTBEAT, bumped.unwrap());
}
