use smallvec::SmallVec;

use crate::{
    func_cursor::{CursorLocation, FuncCursor, InsnInserter},
    insn::{BinaryOp, CastOp, UnaryOp},
    module::FuncRef,
    Block, Function, Immediate, Insn, InsnData, Type, Value,
};

use super::ModuleBuilder;

pub struct FunctionBuilder<'a> {
    mb: &'a mut ModuleBuilder,
    func_ref: FuncRef,
    cursor: InsnInserter,
}

impl<'a> FunctionBuilder<'a> {
    pub(super) fn new(mb: &'a mut ModuleBuilder, func_ref: FuncRef) -> Self {
        Self {
            mb,
            func_ref,
            cursor: InsnInserter::at_location(CursorLocation::NoWhere),
        }
    }

    pub fn func(&self) -> &Function {
        self.mb.func(self.func_ref)
    }

    fn func_mut(&mut self) -> &mut Function {
        self.mb.func_mut(self.func_ref)
    }

    pub fn finish(self) -> FuncRef {
        self.func_ref
    }

    pub fn append_block(&mut self) -> Block {
        let func = self.func_mut();
        let block = func.dfg.make_block();
        func.layout.append_block(block);
        block
    }

    pub fn make_block(&mut self) -> Block {
        self.func_mut().dfg.make_block()
    }

    pub fn switch_to_block(&mut self, block: Block) {
        self.cursor.set_location(CursorLocation::BlockBottom(block));
    }

    pub fn current_block(&self) -> Option<Block> {
        self.cursor.block(self.func())
    }

    pub fn make_imm_value<Imm>(&mut self, imm: Imm) -> Value
    where
        Imm: Into<Immediate>,
    {
        self.func_mut().dfg.make_imm_value(imm)
    }

    pub fn args(&self) -> &[Value] {
        &self.func().arg_values
    }

    pub fn type_of(&self, value: Value) -> Type {
        self.func().dfg.value_ty(value)
    }

    pub fn ptr_type(&mut self, ty: Type) -> Type {
        self.mb.ptr_type(ty)
    }

    pub fn declare_array_type(&mut self, elem: Type, len: usize) -> Type {
        self.mb.declare_array_type(elem, len)
    }

    pub fn declare_struct_type(&mut self, name: &str, fields: &[Type], packed: bool) -> Type {
        self.mb.declare_struct_type(name, fields, packed)
    }

    pub fn name_value(&mut self, value: Value, name: &str) {
        self.func_mut().dbg.set_value_name(value, name);
    }

    pub fn name_block(&mut self, block: Block, name: &str) {
        self.func_mut().dbg.set_block_name(block, name);
    }

    /// Inserts an instruction at the current position. Returns the result
    /// value if the instruction produces one.
    pub fn insert_insn(&mut self, data: InsnData) -> Option<Value> {
        let func = self.mb.func_mut(self.func_ref);
        let insn = self.cursor.insert_insn_data(func, data);
        let result = self.cursor.make_result(func, insn);
        if let Some(result) = result {
            self.cursor.attach_result(func, insn, result);
        }
        self.cursor.set_location(CursorLocation::At(insn));
        result
    }

    pub fn unary(&mut self, code: UnaryOp, lhs: Value) -> Value {
        self.insert_insn(InsnData::unary(code, lhs)).unwrap()
    }

    pub fn binary(&mut self, code: BinaryOp, lhs: Value, rhs: Value) -> Value {
        self.insert_insn(InsnData::binary(code, lhs, rhs)).unwrap()
    }

    pub fn cast(&mut self, code: CastOp, value: Value, ty: Type) -> Value {
        self.insert_insn(InsnData::cast(code, value, ty)).unwrap()
    }

    pub fn load(&mut self, addr: Value, ty: Type) -> Value {
        self.insert_insn(InsnData::load(addr, ty)).unwrap()
    }

    pub fn store(&mut self, value: Value, addr: Value) {
        self.insert_insn(InsnData::store(value, addr));
    }

    pub fn alloca(&mut self, ty: Type) -> Value {
        self.insert_insn(InsnData::alloca(ty)).unwrap()
    }

    pub fn gep(&mut self, args: &[Value]) -> Value {
        let args: SmallVec<[Value; 8]> = args.into();
        self.insert_insn(InsnData::gep(args)).unwrap()
    }

    /// Inserts a call to the declared function `callee` and registers its
    /// signature in the caller's callee table.
    pub fn call(&mut self, callee: FuncRef, args: &[Value]) -> Option<Value> {
        let sig = self.mb.sig(callee).clone();
        let ret_ty = sig.ret_ty();
        self.func_mut().callees.insert(callee, sig);

        let args: SmallVec<[Value; 8]> = args.into();
        self.insert_insn(InsnData::call(callee, args, ret_ty))
    }

    pub fn jump(&mut self, dest: Block) {
        self.insert_insn(InsnData::jump(dest));
    }

    pub fn br(&mut self, cond: Value, then_dest: Block, else_dest: Block) {
        self.insert_insn(InsnData::branch(cond, then_dest, else_dest));
    }

    pub fn br_table(&mut self, index: Value, default: Option<Block>, cases: &[(Value, Block)]) {
        self.insert_insn(InsnData::br_table(index, default, cases));
    }

    pub fn ret(&mut self, args: Option<Value>) {
        self.insert_insn(InsnData::ret(args));
    }

    pub fn phi(&mut self, ty: Type, args: &[(Value, Block)]) -> Value {
        let mut data = InsnData::phi(ty);
        for (value, block) in args {
            data.append_phi_arg(*value, *block);
        }
        self.insert_insn(data).unwrap()
    }

    pub fn append_phi_arg(&mut self, phi_value: Value, value: Value, block: Block) {
        let func = self.func_mut();
        let insn = func
            .dfg
            .value_insn(phi_value)
            .expect("`phi_value` should be a result of a phi insn");
        func.dfg.append_phi_arg(insn, value, block);
    }

    pub fn last_insn(&self) -> Option<Insn> {
        let current_block = self.current_block()?;
        self.func().layout.last_insn_of(current_block)
    }

    pub fn is_terminator(&self, insn: Insn) -> bool {
        self.func().dfg.is_terminator(insn)
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_util::*;
    use crate::{insn::BinaryOp, insn::CastOp, Type};

    #[test]
    fn entry_block() {
        let mut mb = test_module_builder();
        let mut builder = test_func_builder(&mut mb, &[], Type::Unit);

        let b0 = builder.append_block();
        builder.switch_to_block(b0);
        let v0 = builder.make_imm_value(1i8);
        let v1 = builder.make_imm_value(2i8);
        let v2 = builder.binary(BinaryOp::Add, v0, v1);
        builder.binary(BinaryOp::Sub, v2, v0);
        builder.ret(None);

        let func_ref = builder.finish();
        let module = mb.build();
        assert_eq!(
            dump_func(&module.funcs[func_ref]),
            "func public %test_func() -> unit {
    block0:
        v2.i8 = add 1.i8 2.i8;
        v3.i8 = sub v2 1.i8;
        return;
}
"
        );
    }

    #[test]
    fn entry_block_with_args() {
        let mut mb = test_module_builder();
        let mut builder = test_func_builder(&mut mb, &[Type::I32, Type::I64], Type::Unit);

        let entry_block = builder.append_block();
        builder.switch_to_block(entry_block);
        let args = builder.args();
        assert_eq!(args.len(), 2);
        let (arg0, arg1) = (args[0], args[1]);
        let v3 = builder.cast(CastOp::Sext, arg0, Type::I64);
        builder.binary(BinaryOp::Mul, v3, arg1);
        builder.ret(None);

        let func_ref = builder.finish();
        let module = mb.build();
        assert_eq!(
            dump_func(&module.funcs[func_ref]),
            "func public %test_func(v0.i32, v1.i64) -> unit {
    block0:
        v2.i64 = sext v0 i64;
        v3.i64 = mul v2 v1;
        return;
}
"
        );
    }

    #[test]
    fn then_else_merge_block() {
        let mut mb = test_module_builder();
        let mut builder = test_func_builder(&mut mb, &[Type::I64], Type::Unit);

        let entry_block = builder.append_block();
        let then_block = builder.append_block();
        let else_block = builder.append_block();
        let merge_block = builder.append_block();

        let arg0 = builder.args()[0];

        builder.switch_to_block(entry_block);
        builder.br(arg0, then_block, else_block);

        builder.switch_to_block(then_block);
        let v1 = builder.make_imm_value(1i64);
        builder.jump(merge_block);

        builder.switch_to_block(else_block);
        let v2 = builder.make_imm_value(2i64);
        builder.jump(merge_block);

        builder.switch_to_block(merge_block);
        let v3 = builder.phi(Type::I64, &[(v1, then_block), (v2, else_block)]);
        builder.binary(BinaryOp::Add, v3, arg0);
        builder.ret(None);

        let func_ref = builder.finish();
        let module = mb.build();
        assert_eq!(
            dump_func(&module.funcs[func_ref]),
            "func public %test_func(v0.i64) -> unit {
    block0:
        br v0 block1 block2;

    block1:
        jump block3;

    block2:
        jump block3;

    block3:
        v3.i64 = phi (1.i64 block1) (2.i64 block2);
        v4.i64 = add v3 v0;
        return;
}
"
        );
    }
}
