pub mod func_builder;
pub mod module_builder;

pub use func_builder::FunctionBuilder;
pub use module_builder::ModuleBuilder;

pub mod test_util {
    use crate::{ir_writer, Function, Linkage, Signature, Type};

    use super::{FunctionBuilder, ModuleBuilder};

    pub fn test_module_builder() -> ModuleBuilder {
        ModuleBuilder::new()
    }

    /// Declares `%test_func` with the given signature and returns a builder
    /// positioned in it.
    pub fn test_func_builder<'a>(
        mb: &'a mut ModuleBuilder,
        args: &[Type],
        ret_ty: Type,
    ) -> FunctionBuilder<'a> {
        let sig = Signature::new("test_func", Linkage::Public, args, ret_ty);
        let func_ref = mb.declare_function(sig);
        mb.func_builder(func_ref)
    }

    pub fn dump_func(func: &Function) -> String {
        ir_writer::dump_func(func)
    }
}
