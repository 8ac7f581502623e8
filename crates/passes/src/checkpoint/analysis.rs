//! Analysis-input maps and the per-function binder.
//!
//! The upstream live-value analyses hand their results over as JSON keyed on
//! textual identifiers: `{ function: { block: [value, ..] } }`. One file
//! carries the tracked-value sets, a second one of identical shape carries the
//! live-out sets. The binder resolves those names back to concrete IR handles
//! for one function at a time.

use std::{collections::BTreeSet, fs, path::Path};

use indexmap::IndexMap;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use tracing::debug;
use waypoint_ir::{Block, Function, Value};

use crate::error::{AnalysisFileError, SkipReason};

/// `function -> block -> [value name]`, as deserialized from an analysis file.
pub type NamedValueSets = IndexMap<String, IndexMap<String, Vec<String>>>;

/// Name of the checkpoint-memory pointer argument.
pub const CKPT_MEM_ARG: &str = "ckpt_mem";

/// The two analysis inputs the pass consumes.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnalysisInputs {
    pub tracked: NamedValueSets,
    pub live_out: NamedValueSets,
}

impl AnalysisInputs {
    pub fn new(tracked: NamedValueSets, live_out: NamedValueSets) -> Self {
        Self { tracked, live_out }
    }

    /// Load both analysis files. A missing or malformed file is fatal.
    pub fn from_files(
        tracked_path: impl AsRef<Path>,
        live_out_path: impl AsRef<Path>,
    ) -> Result<Self, AnalysisFileError> {
        let tracked = serde_json::from_str(&fs::read_to_string(tracked_path)?)?;
        let live_out = serde_json::from_str(&fs::read_to_string(live_out_path)?)?;
        Ok(Self { tracked, live_out })
    }
}

/// Analysis data bound to IR handles of one function.
#[derive(Debug)]
pub struct FuncAnalysis {
    /// Values that must survive across the block, per block.
    pub tracked: FxHashMap<Block, BTreeSet<Value>>,

    /// Values live on some outgoing edge of the block, per block.
    pub live_out: FxHashMap<Block, BTreeSet<Value>>,

    /// The checkpoint-memory pointer argument.
    pub ckpt_mem: Value,
}

/// Resolve the analysis maps against the function.
///
/// Value names are resolved by scanning every instruction operand in every
/// block; on a name collision the last scanned operand wins. Names may carry
/// a leading `%` sigil, which is stripped.
pub fn bind(func: &Function, inputs: &AnalysisInputs) -> Result<FuncAnalysis, SkipReason> {
    let func_name = func.sig.name();

    let tracked_by_name =
        lookup(&inputs.tracked, func_name).ok_or(SkipReason::MissingAnalysis)?;
    let live_out_by_name =
        lookup(&inputs.live_out, func_name).ok_or(SkipReason::MissingAnalysis)?;

    let ckpt_mem = func
        .arg_values
        .iter()
        .copied()
        .find(|arg| func.value_name(*arg) == CKPT_MEM_ARG)
        .ok_or(SkipReason::MissingArgument)?;

    let values = value_names(func);
    let blocks: FxHashMap<String, Block> = func
        .layout
        .iter_block()
        .map(|block| (func.block_name(block), block))
        .collect();

    let tracked = bind_sets(func, tracked_by_name, &values, &blocks);
    let live_out = bind_sets(func, live_out_by_name, &values, &blocks);

    Ok(FuncAnalysis {
        tracked,
        live_out,
        ckpt_mem,
    })
}

/// `name -> value` for every operand of every instruction in the function.
/// Arguments and immediates appear here too, since both occur as operands.
fn value_names(func: &Function) -> FxHashMap<String, Value> {
    let mut values = FxHashMap::default();
    for block in func.layout.iter_block() {
        for insn in func.layout.iter_insn(block) {
            for &arg in func.dfg.insn_args(insn) {
                values.insert(func.value_name(arg), arg);
            }
        }
    }
    // Results are operands of downstream users, but a value used nowhere would
    // never be scanned; arguments are the common case.
    for &arg in &func.arg_values {
        values.entry(func.value_name(arg)).or_insert(arg);
    }
    values
}

fn bind_sets(
    func: &Function,
    by_name: &IndexMap<String, Vec<String>>,
    values: &FxHashMap<String, Value>,
    blocks: &FxHashMap<String, Block>,
) -> FxHashMap<Block, BTreeSet<Value>> {
    let mut bound: FxHashMap<Block, BTreeSet<Value>> = FxHashMap::default();

    for (block_name, val_names) in by_name {
        let Some(&block) = blocks.get(strip_sigil(block_name)) else {
            debug!(
                func = func.sig.name(),
                block = block_name.as_str(),
                "analysis names a block the function doesn't have"
            );
            continue;
        };

        let set = bound.entry(block).or_default();
        for val_name in val_names {
            match values.get(strip_sigil(val_name)) {
                Some(&value) => {
                    set.insert(value);
                }
                None => debug!(
                    func = func.sig.name(),
                    value = val_name.as_str(),
                    "analysis names a value the function doesn't have"
                ),
            }
        }
    }

    bound
}

fn lookup<'a>(
    sets: &'a NamedValueSets,
    func_name: &str,
) -> Option<&'a IndexMap<String, Vec<String>>> {
    sets.iter()
        .find(|(name, _)| strip_sigil(name) == func_name)
        .map(|(_, map)| map)
}

fn strip_sigil(name: &str) -> &str {
    name.strip_prefix('%').unwrap_or(name)
}
