use crate::{
    module::{FuncRef, ModuleCtx},
    Function, Module, Signature, Type,
};

use super::FunctionBuilder;

pub struct ModuleBuilder {
    pub ctx: ModuleCtx,
    module: Module,
}

impl Default for ModuleBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ModuleBuilder {
    pub fn new() -> Self {
        let ctx = ModuleCtx::new();
        Self {
            module: Module::new(ctx.clone()),
            ctx,
        }
    }

    pub fn declare_function(&mut self, sig: Signature) -> FuncRef {
        let func = Function::new(&self.ctx, sig);
        self.module.funcs.push(func)
    }

    pub fn sig(&self, func: FuncRef) -> &Signature {
        &self.module.funcs[func].sig
    }

    pub fn func_builder(&mut self, func: FuncRef) -> FunctionBuilder<'_> {
        FunctionBuilder::new(self, func)
    }

    pub fn ptr_type(&mut self, ty: Type) -> Type {
        self.ctx.with_ty_store_mut(|s| s.make_ptr(ty))
    }

    pub fn declare_array_type(&mut self, elem: Type, len: usize) -> Type {
        self.ctx.with_ty_store_mut(|s| s.make_array(elem, len))
    }

    pub fn declare_struct_type(&mut self, name: &str, fields: &[Type], packed: bool) -> Type {
        self.ctx
            .with_ty_store_mut(|s| s.make_struct(name, fields, packed))
    }

    pub fn build(self) -> Module {
        self.module
    }

    pub(super) fn func(&self, func: FuncRef) -> &Function {
        &self.module.funcs[func]
    }

    pub(super) fn func_mut(&mut self, func: FuncRef) -> &mut Function {
        &mut self.module.funcs[func]
    }
}
