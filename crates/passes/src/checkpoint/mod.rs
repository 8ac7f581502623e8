//! The checkpoint instrumentation pass.
//!
//! For each function carrying analysis data and a `ckpt_mem` pointer
//! argument, the pass rewrites the CFG so the function persists its tracked
//! values into the checkpoint-memory region at designated blocks, and on
//! re-entry resumes from the persisted state:
//!
//! 1. a dispatcher block after entry routes either to the normal flow or to a
//!    restore block, keyed on the persisted checkpoint id,
//! 2. each checkpoint block gets a save block on its exit edge, a restore
//!    block fed by the dispatcher, and a junction block merging the two
//!    definitions of every tracked value,
//! 3. the merged definitions are propagated through the CFG so SSA dominance
//!    holds at every downstream use.
//!
//! A function that can't be transformed is skipped untouched; per-checkpoint
//! failures skip only that checkpoint.

pub mod analysis;
pub mod candidate;
pub mod dispatch;
pub mod marshal;
pub mod propagate;
pub mod topo;

use std::collections::BTreeSet;

use rustc_hash::{FxHashMap, FxHashSet};
use tracing::{debug, warn};
use waypoint_ir::{Block, ControlFlowGraph, FuncRef, Function, Module, Value};

use crate::error::{AnalysisFileError, SkipReason};

use analysis::{AnalysisInputs, FuncAnalysis};
use candidate::{Candidate, SelectionMode};
use propagate::LiveOutView;
use topo::CheckpointTopo;

pub use analysis::{bind, NamedValueSets, CKPT_MEM_ARG};
pub use candidate::select_candidates;

pub struct CheckpointPass {
    inputs: AnalysisInputs,
    mode: SelectionMode,
}

impl CheckpointPass {
    pub fn new(inputs: AnalysisInputs) -> Self {
        Self {
            inputs,
            mode: SelectionMode::Directive,
        }
    }

    pub fn with_mode(inputs: AnalysisInputs, mode: SelectionMode) -> Self {
        Self { inputs, mode }
    }

    /// Construct the pass from the two analysis files. A missing file is
    /// fatal, unlike a missing per-function entry.
    pub fn from_files(
        tracked_path: impl AsRef<std::path::Path>,
        live_out_path: impl AsRef<std::path::Path>,
    ) -> Result<Self, AnalysisFileError> {
        Ok(Self::new(AnalysisInputs::from_files(
            tracked_path,
            live_out_path,
        )?))
    }

    /// Run the pass over the module. Returns whether the module was modified.
    pub fn run(&self, module: &mut Module) -> bool {
        let mut modified = false;

        let func_refs: Vec<FuncRef> = module.iter_functions().collect();
        for func_ref in func_refs {
            if module.is_external(func_ref) {
                continue;
            }

            let func = &module.funcs[func_ref];
            match self.run_on_function(func) {
                Ok(transformed) => {
                    debug!(func = transformed.sig.name(), "checkpoints installed");
                    module.funcs[func_ref] = transformed;
                    modified = true;
                }
                Err(reason) => {
                    warn!(func = func.sig.name(), %reason, "function skipped");
                }
            }
        }

        modified
    }

    /// Transform a clone of the function, committing it only on success: a
    /// skipped function must be byte-identical to its input.
    fn run_on_function(&self, func: &Function) -> Result<Function, SkipReason> {
        let mut func = func.clone();

        let mut cfg = ControlFlowGraph::new();
        cfg.compute(&func);

        let entry = func.layout.entry_block().ok_or(SkipReason::NoCandidates)?;
        if cfg.succ_num_of(entry) == 0 {
            // A single-block function has no exit edge to checkpoint.
            return Err(SkipReason::NoCandidates);
        }

        let analysis = bind(&func, &self.inputs)?;
        let candidates = select_candidates(&func, &cfg, &analysis, self.mode);
        if candidates.is_empty() {
            return Err(SkipReason::NoCandidates);
        }

        let (dispatcher, default_dest) = topo::install_dispatcher(&mut func)?;
        cfg.compute(&func);

        let mut transform = FuncTransform {
            func,
            cfg,
            analysis,
            dispatcher,
            save_live_out: FxHashMap::default(),
            restore_live_out: FxHashMap::default(),
            junction_live_out: FxHashMap::default(),
            installed: Vec::new(),
        };

        for cand in candidates {
            let block = cand.block;
            if let Err(reason) = transform.install_checkpoint(cand) {
                warn!(
                    func = transform.func.sig.name(),
                    block = %transform.func.block_name(block),
                    %reason,
                    "checkpoint skipped"
                );
            }
        }

        if transform.installed.is_empty() {
            return Err(SkipReason::NoCandidates);
        }

        let FuncTransform {
            mut func,
            analysis,
            installed,
            ..
        } = transform;

        dispatch::finalize(&mut func, dispatcher, default_dest, &installed, analysis.ckpt_mem);

        Ok(func)
    }
}

/// Working state for one function's transformation.
struct FuncTransform {
    func: Function,
    cfg: ControlFlowGraph,
    analysis: FuncAnalysis,
    dispatcher: Block,

    /// Synthetic live-out sets for the blocks this pass created, keyed on the
    /// original tracked values. The propagator consults these alongside the
    /// analysis data.
    save_live_out: FxHashMap<Block, BTreeSet<Value>>,
    restore_live_out: FxHashMap<Block, BTreeSet<Value>>,
    junction_live_out: FxHashMap<Block, BTreeSet<Value>>,

    installed: Vec<CheckpointTopo>,
}

impl FuncTransform {
    fn install_checkpoint(&mut self, cand: Candidate) -> Result<(), SkipReason> {
        let topo = topo::build_topology(&mut self.func, cand.block)?;

        // The topology is committed now; the directive has served its purpose.
        if let Some(directive) = cand.directive {
            self.func.layout.remove_insn(directive);
        }
        self.cfg.compute(&self.func);

        let marshal = marshal::populate(&mut self.func, &topo, &cand.tracked, self.analysis.ckpt_mem);

        self.save_live_out.insert(topo.save, cand.tracked.clone());
        self.restore_live_out
            .insert(topo.restore, cand.tracked.clone());
        self.junction_live_out
            .insert(topo.junction, cand.tracked.clone());

        let new_blocks: FxHashSet<Block> =
            [self.dispatcher, topo.save, topo.restore, topo.junction]
                .into_iter()
                .collect();

        for &value in &cand.tracked {
            let merged = marshal.merge_phis[&value];
            let live = LiveOutView {
                analysis: &self.analysis.live_out,
                save: &self.save_live_out,
                restore: &self.restore_live_out,
                junction: &self.junction_live_out,
            };
            propagate::propagate_restored_value(
                &mut self.func,
                &self.cfg,
                &live,
                &new_blocks,
                topo.resume,
                topo.junction,
                value,
                merged,
            );
        }

        self.installed.push(topo);
        Ok(())
    }
}
