use std::{cell::RefCell, rc::Rc};

use cranelift_entity::{entity_impl, PrimaryMap};

use crate::{types::TypeStore, Function};

use super::Linkage;

#[derive(Debug)]
pub struct Module {
    /// Shared module context.
    pub ctx: ModuleCtx,

    /// Holds all functions declared in the module.
    pub funcs: PrimaryMap<FuncRef, Function>,
}

impl Module {
    pub fn new(ctx: ModuleCtx) -> Self {
        Self {
            ctx,
            funcs: PrimaryMap::default(),
        }
    }

    /// Returns all `func_ref`s in the module.
    pub fn iter_functions(&self) -> impl Iterator<Item = FuncRef> {
        self.funcs.keys()
    }

    /// Returns `true` if the function has external linkage.
    pub fn is_external(&self, func_ref: FuncRef) -> bool {
        self.funcs[func_ref].sig.linkage() == Linkage::External
    }
}

/// A module-wide context shared by all functions of the module.
#[derive(Debug, Clone, Default)]
pub struct ModuleCtx {
    ty_store: Rc<RefCell<TypeStore>>,
}

impl ModuleCtx {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ty_store<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&TypeStore) -> R,
    {
        f(&self.ty_store.borrow())
    }

    pub fn with_ty_store_mut<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&mut TypeStore) -> R,
    {
        f(&mut self.ty_store.borrow_mut())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FuncRef(u32);
entity_impl!(FuncRef);
