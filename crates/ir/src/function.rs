use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use crate::module::ModuleCtx;

use super::{module::FuncRef, Block, DataFlowGraph, Layout, Linkage, Type, Value};

#[derive(Debug, Clone)]
pub struct Function {
    /// Signature of the function.
    pub sig: Signature,
    pub arg_values: SmallVec<[Value; 8]>,

    pub dfg: DataFlowGraph,
    pub layout: Layout,

    /// Signatures of all functions called by this function.
    pub callees: FxHashMap<FuncRef, Signature>,

    /// Textual names for blocks and values, used by diagnostics and for
    /// resolving analysis data keyed on textual identifiers.
    pub dbg: DebugNames,
}

impl Function {
    pub fn new(ctx: &ModuleCtx, sig: Signature) -> Self {
        let mut dfg = DataFlowGraph::new(ctx.clone());
        let arg_values = sig
            .args()
            .iter()
            .enumerate()
            .map(|(idx, arg_ty)| {
                let value = dfg.make_arg_value(*arg_ty, idx);
                dfg.make_value(value)
            })
            .collect();

        Self {
            sig,
            arg_values,
            dfg,
            layout: Layout::default(),
            callees: FxHashMap::default(),
            dbg: DebugNames::default(),
        }
    }

    pub fn ctx(&self) -> &ModuleCtx {
        &self.dfg.ctx
    }

    /// The canonical textual identifier of the block, e.g. `block3` when no
    /// debug name is set.
    pub fn block_name(&self, block: Block) -> String {
        match self.dbg.block_name(block) {
            Some(name) => name.to_string(),
            None => format!("{block}"),
        }
    }

    /// The canonical textual identifier of the value, e.g. `v2` when no debug
    /// name is set.
    pub fn value_name(&self, value: Value) -> String {
        match self.dbg.value_name(value) {
            Some(name) => name.to_string(),
            None => format!("{value}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    /// Name of the function.
    name: String,

    /// Linkage of the function.
    linkage: Linkage,

    args: SmallVec<[Type; 8]>,
    ret_ty: Type,
}

impl Signature {
    pub fn new(name: &str, linkage: Linkage, args: &[Type], ret_ty: Type) -> Self {
        Self {
            name: name.to_string(),
            linkage,
            args: args.into(),
            ret_ty,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn linkage(&self) -> Linkage {
        self.linkage
    }

    pub fn append_arg(&mut self, arg: Type) {
        self.args.push(arg);
    }

    pub fn args(&self) -> &[Type] {
        &self.args
    }

    pub fn ret_ty(&self) -> Type {
        self.ret_ty
    }
}

/// Debug name side tables. An absent entry means the entity is only known by
/// its numbered identifier.
#[derive(Debug, Clone, Default)]
pub struct DebugNames {
    value_names: FxHashMap<Value, String>,
    block_names: FxHashMap<Block, String>,
}

impl DebugNames {
    pub fn set_value_name(&mut self, value: Value, name: &str) {
        self.value_names.insert(value, name.to_string());
    }

    pub fn value_name(&self, value: Value) -> Option<&str> {
        self.value_names.get(&value).map(String::as_str)
    }

    pub fn set_block_name(&mut self, block: Block, name: &str) {
        self.block_names.insert(block, name.to_string());
    }

    pub fn block_name(&self, block: Block) -> Option<&str> {
        self.block_names.get(&block).map(String::as_str)
    }
}
