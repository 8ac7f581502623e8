//! Textual dumps of functions, used by tests and diagnostics.
use std::io;

use crate::{types::DisplayType, value::ValueData, Block, Function, Insn, InsnData, Value};

pub struct FuncWriter<'a> {
    func: &'a Function,
}

impl<'a> FuncWriter<'a> {
    pub fn new(func: &'a Function) -> Self {
        Self { func }
    }

    pub fn write(&mut self, mut w: impl io::Write) -> io::Result<()> {
        let sig = &self.func.sig;
        write!(w, "func {} %{}(", sig.linkage(), sig.name())?;
        let mut args = self.func.arg_values.iter().peekable();
        while let Some(arg) = args.next() {
            self.write_value_with_ty(*arg, &mut w)?;
            if args.peek().is_some() {
                w.write_all(b", ")?;
            }
        }
        let ret_ty = DisplayType::new(sig.ret_ty(), self.func.ctx());
        writeln!(w, ") -> {ret_ty} {{")?;

        let mut blocks = self.func.layout.iter_block().peekable();
        while let Some(block) = blocks.next() {
            self.write_block_with_insn(block, &mut w)?;
            if blocks.peek().is_some() {
                writeln!(w)?;
            }
        }

        writeln!(w, "}}")
    }

    pub fn dump_string(&mut self) -> String {
        let mut s = Vec::new();
        self.write(&mut s).unwrap();
        String::from_utf8(s).unwrap()
    }

    fn write_block_with_insn(&mut self, block: Block, mut w: impl io::Write) -> io::Result<()> {
        writeln!(w, "    {}:", self.func.block_name(block))?;

        for insn in self.func.layout.iter_insn(block) {
            w.write_all(b"        ")?;
            self.write_insn(insn, &mut w)?;
            writeln!(w)?;
        }

        Ok(())
    }

    fn write_value(&self, value: Value, mut w: impl io::Write) -> io::Result<()> {
        match self.func.dfg.value_data(value) {
            ValueData::Immediate { imm, ty } => {
                write!(w, "{}.{}", imm, DisplayType::new(*ty, self.func.ctx()))
            }
            _ => write!(w, "{}", self.func.value_name(value)),
        }
    }

    fn write_value_with_ty(&self, value: Value, mut w: impl io::Write) -> io::Result<()> {
        let ty = self.func.dfg.value_ty(value);
        write!(
            w,
            "{}.{}",
            self.func.value_name(value),
            DisplayType::new(ty, self.func.ctx())
        )
    }

    fn write_insn(&self, insn: Insn, mut w: impl io::Write) -> io::Result<()> {
        use InsnData::*;

        if let Some(result) = self.func.dfg.insn_result(insn) {
            self.write_value_with_ty(result, &mut w)?;
            w.write_all(b" = ")?;
        }

        let ctx = self.func.ctx();
        match self.func.dfg.insn_data(insn) {
            Unary { code, args } => {
                write!(w, "{code} ")?;
                self.write_insn_args(args, &mut w)?;
            }
            Binary { code, args } => {
                write!(w, "{code} ")?;
                self.write_insn_args(args, &mut w)?;
            }
            Cast { code, args, ty } => {
                write!(w, "{code} ")?;
                self.write_value(args[0], &mut w)?;
                write!(w, " {}", DisplayType::new(*ty, ctx))?;
            }
            Load { args, .. } => {
                w.write_all(b"load ")?;
                self.write_insn_args(args, &mut w)?;
            }
            Store { args } => {
                w.write_all(b"store ")?;
                self.write_insn_args(args, &mut w)?;
            }
            Alloca { ty } => {
                write!(w, "alloca {}", DisplayType::new(*ty, ctx))?;
            }
            Gep { args } => {
                w.write_all(b"gep ")?;
                self.write_insn_args(args, &mut w)?;
            }
            Call { func, args, .. } => {
                let callee = &self.func.callees[func];
                write!(w, "call %{} ", callee.name())?;
                self.write_insn_args(args, &mut w)?;
            }
            Jump { dests } => {
                write!(w, "jump {}", self.func.block_name(dests[0]))?;
            }
            Branch { args, dests } => {
                w.write_all(b"br ")?;
                self.write_value(args[0], &mut w)?;
                write!(
                    w,
                    " {} {}",
                    self.func.block_name(dests[0]),
                    self.func.block_name(dests[1])
                )?;
            }
            BrTable {
                args,
                default,
                table,
            } => {
                w.write_all(b"br_table ")?;
                self.write_value(args[0], &mut w)?;
                if let Some(default) = default {
                    write!(w, " {}", self.func.block_name(*default))?;
                }
                for (value, block) in args[1..].iter().zip(table.iter()) {
                    w.write_all(b" (")?;
                    self.write_value(*value, &mut w)?;
                    write!(w, " {})", self.func.block_name(*block))?;
                }
            }
            Return { args } => {
                w.write_all(b"return")?;
                if let Some(arg) = args {
                    w.write_all(b" ")?;
                    self.write_value(*arg, &mut w)?;
                }
            }
            Phi { values, blocks, .. } => {
                w.write_all(b"phi")?;
                for (value, block) in values.iter().zip(blocks.iter()) {
                    w.write_all(b" (")?;
                    self.write_value(*value, &mut w)?;
                    write!(w, " {})", self.func.block_name(*block))?;
                }
            }
        }

        w.write_all(b";")
    }

    fn write_insn_args(&self, args: &[Value], mut w: impl io::Write) -> io::Result<()> {
        let mut args = args.iter().peekable();
        while let Some(arg) = args.next() {
            self.write_value(*arg, &mut w)?;
            if args.peek().is_some() {
                w.write_all(b" ")?;
            }
        }

        Ok(())
    }
}

/// Dump the function to a `String`.
pub fn dump_func(func: &Function) -> String {
    FuncWriter::new(func).dump_string()
}
