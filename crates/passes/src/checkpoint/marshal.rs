//! Populates save and restore blocks with the load/store traffic that
//! persists tracked values into the checkpoint-memory region.

use std::collections::BTreeSet;

use rustc_hash::FxHashMap;
use waypoint_ir::{Function, InsnData, Type, Value};

use super::topo::{insert_insn_before, prepend_phi, CheckpointTopo};

/// Slot indices of the checkpoint-memory region, in machine words.
pub const HEARTBEAT: usize = 0;
pub const CKPT_ID: usize = 1;
pub const IS_COMPLETE: usize = 2;
pub const VALUES_START: usize = 3;

/// The machine-word type of a checkpoint-memory slot.
pub const WORD: Type = Type::I32;

/// Per-checkpoint marshalling results.
#[derive(Debug, Default)]
pub struct MarshalResult {
    /// Slot index assigned to each tracked value. Identical in the paired
    /// save and restore block.
    pub slots: FxHashMap<Value, usize>,

    /// The junction phi merging the original and restored definition, per
    /// tracked value. These are the values the propagator pushes downstream.
    pub merge_phis: FxHashMap<Value, Value>,
}

/// Populate the save, restore, and junction blocks of one checkpoint.
///
/// For a pointer-typed tracked value the save side stores the word behind the
/// pointer, and the restore side rebuilds a stack slot holding that word; one
/// level of indirection only.
pub fn populate(
    func: &mut Function,
    topo: &CheckpointTopo,
    tracked: &BTreeSet<Value>,
    ckpt_mem: Value,
) -> MarshalResult {
    let mut result = MarshalResult::default();

    let save_term = func.layout.last_insn_of(topo.save).expect("save block has a terminator");
    let restore_term = func
        .layout
        .last_insn_of(topo.restore)
        .expect("restore block has a terminator");

    for (i, &value) in tracked.iter().enumerate() {
        let slot = VALUES_START + i;
        let ty = func.dfg.value_ty(value);
        let pointee = func.ctx().with_ty_store(|s| s.deref(ty));

        // Save side: dereference pointers, then store the word into its slot.
        let save_val = match pointee {
            Some(_) => {
                let (_, loaded) = insert_insn_before(func, save_term, InsnData::load(value, WORD));
                loaded.unwrap()
            }
            None => value,
        };
        store_slot(func, save_term, ckpt_mem, slot, save_val);

        // Restore side: load the word back, and rebuild a stack slot for
        // pointer-typed values.
        let loaded = load_slot(func, restore_term, ckpt_mem, slot);
        let restored = match pointee {
            Some(pointee) => {
                let (_, slot_addr) =
                    insert_insn_before(func, restore_term, InsnData::alloca(pointee));
                let slot_addr = slot_addr.unwrap();
                insert_insn_before(func, restore_term, InsnData::store(loaded, slot_addr));
                slot_addr
            }
            None => loaded,
        };

        // Junction: merge the two definitions.
        let mut phi = InsnData::phi(ty);
        phi.append_phi_arg(value, topo.save);
        phi.append_phi_arg(restored, topo.restore);
        let (_, merged) = prepend_phi(func, topo.junction, phi);

        result.slots.insert(value, slot);
        result.merge_phis.insert(value, merged);
    }

    // Every executed save publishes completion.
    let one = func.dfg.make_imm_value(1i32);
    store_slot(func, save_term, ckpt_mem, IS_COMPLETE, one);

    result
}

/// `store value, gep(ckpt_mem, slot)` before `before`.
pub(crate) fn store_slot(
    func: &mut Function,
    before: waypoint_ir::Insn,
    ckpt_mem: Value,
    slot: usize,
    value: Value,
) {
    let index = func.dfg.make_imm_value(slot as i32);
    let (_, addr) = insert_insn_before(func, before, InsnData::gep(&[ckpt_mem, index][..]));
    insert_insn_before(func, before, InsnData::store(value, addr.unwrap()));
}

/// `load gep(ckpt_mem, slot)` before `before`.
pub(crate) fn load_slot(
    func: &mut Function,
    before: waypoint_ir::Insn,
    ckpt_mem: Value,
    slot: usize,
) -> Value {
    let index = func.dfg.make_imm_value(slot as i32);
    let (_, addr) = insert_insn_before(func, before, InsnData::gep(&[ckpt_mem, index][..]));
    let (_, loaded) = insert_insn_before(func, before, InsnData::load(addr.unwrap(), WORD));
    loaded.unwrap()
}
