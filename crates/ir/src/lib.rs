pub mod builder;
pub mod cfg;
pub mod dfg;
pub mod func_cursor;
pub mod function;
pub mod insn;
pub mod ir_writer;
pub mod layout;
pub mod linkage;
pub mod module;
pub mod types;
pub mod value;

pub use cfg::ControlFlowGraph;
pub use dfg::{Block, BlockData, DataFlowGraph};
pub use function::{DebugNames, Function, Signature};
pub use insn::{BranchInfo, Insn, InsnData};
pub use layout::Layout;
pub use linkage::Linkage;
pub use module::{FuncRef, Module, ModuleCtx};
pub use types::Type;
pub use value::{Immediate, Value, ValueData};
