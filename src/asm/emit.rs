//! RTL → SPIM text (§4.6): one line (or a short fixed sequence) per
//! instruction, plus the whole-program data/text layout.

use crate::rtl::{self, ArithOp, CmpOp, FCmpOp, Inst, RValue, Reg};
use crate::symtab::SymbolTable;
use crate::types::{TacType, TypeRegistry};

/// Escapes a string literal's payload with the fixed set this target's
/// assembler understands (§4.6): `\n \r \t \a \" \\`.
fn escape_string(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\x07' => out.push_str("\\a"),
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            other => out.push(other),
        }
    }
    out
}

fn reg_name(r: Reg) -> String {
    match r {
        Reg::Int(n) => format!("${n}"),
        Reg::Float(n) => format!("${n}"),
    }
}

fn mem_operand(m: &RValue) -> String {
    match m {
        RValue::Mem { name, is_global, fp_offset } => {
            if *is_global {
                name.clone()
            } else {
                format!("{fp_offset}($fp)")
            }
        }
        _ => unreachable!("mem_operand called on a non-memory RValue"),
    }
}

/// Emits the full program: a `.data` segment (only if globals or pooled
/// strings exist), then one `.text` block per function.
pub fn emit_program(funcs: &[rtl::Func], symtab: &SymbolTable, reg: &TypeRegistry, strings: &[String]) -> String {
    let mut out = String::new();
    let globals = symtab.globals();
    if !globals.is_empty() || !strings.is_empty() {
        out.push_str(".data\n");
        for g in &globals {
            let tacty = reg.to_tac_type(g.semtype);
            let decl = if tacty == TacType::Float { ".double 0.0" } else { ".word 0" };
            out.push_str(&format!("{}: {}\n", g.name, decl));
        }
        for (i, s) in strings.iter().enumerate() {
            out.push_str(&format!("_str_{i}: .asciiz \"{}\"\n", escape_string(s)));
        }
        out.push('\n');
    }
    for f in funcs {
        out.push_str(&emit_func(f));
        out.push('\n');
    }
    out
}

fn emit_func(f: &rtl::Func) -> String {
    let mut out = String::new();
    out.push_str(".text\n");
    out.push_str(&format!(".globl {}\n", f.name));
    out.push_str(&format!("{}:\n", f.name));
    out.push_str("\tsw $ra, 0($sp)\n");
    out.push_str("\tsw $fp, -4($sp)\n");
    out.push_str("\tmove $fp, $sp\n");
    out.push_str("\taddi $fp, $fp, -4\n");
    out.push_str(&format!("\tsubi $sp, $sp, {}\n", f.stackframe_size + 4));

    for inst in &f.body {
        emit_inst(inst, &f.name, &mut out);
    }

    out.push_str(&format!("epilogue_{}:\n", f.name));
    out.push_str("\tmove $sp, $fp\n");
    out.push_str("\taddi $sp, $sp, 4\n");
    out.push_str("\tlw $fp, -4($sp)\n");
    out.push_str("\tlw $ra, 0($sp)\n");
    out.push_str("\tjr $ra\n");
    out
}

fn emit_inst(inst: &Inst, func: &str, out: &mut String) {
    match inst {
        Inst::Label(l) => out.push_str(&format!("L{}:\n", l.0)),
        Inst::Goto(l) => out.push_str(&format!("\tj L{}\n", l.0)),
        Inst::Bgtz(r, l) => out.push_str(&format!("\tbgtz {}, L{}\n", reg_name(*r), l.0)),
        Inst::Move(d, s) => out.push_str(&format!("\tmove {}, {}\n", reg_name(*d), reg_name(*s))),
        Inst::MoveD(d, s) => out.push_str(&format!("\tmov.d {}, {}\n", reg_name(*d), reg_name(*s))),
        Inst::Load(d, m) => out.push_str(&format!("\tlw {}, {}\n", reg_name(*d), mem_operand(m))),
        Inst::ILoad(d, RValue::IntLit(n)) => out.push_str(&format!("\tli {}, {n}\n", reg_name(*d))),
        Inst::ILoad(..) => unreachable!("ILoad always carries an integer immediate"),
        Inst::LoadD(d, m) => out.push_str(&format!("\tl.d {}, {}\n", reg_name(*d), mem_operand(m))),
        Inst::ILoadD(d, RValue::FloatLit(n)) => out.push_str(&format!("\tli.d {}, {n:.2}\n", reg_name(*d))),
        Inst::ILoadD(..) => unreachable!("ILoadD always carries a float immediate"),
        Inst::LoadAddr(d, RValue::Mem { name, .. }) => out.push_str(&format!("\tla {}, {name}\n", reg_name(*d))),
        Inst::LoadAddr(d, RValue::StrLit(id)) => out.push_str(&format!("\tla {}, {id}\n", reg_name(*d))),
        Inst::LoadAddr(..) => unreachable!("LoadAddr only carries a memory or string-literal operand"),
        Inst::Store(m, r) => out.push_str(&format!("\tsw {}, {}\n", reg_name(*r), mem_operand(m))),
        Inst::StoreD(m, r) => out.push_str(&format!("\ts.d {}, {}\n", reg_name(*r), mem_operand(m))),
        Inst::Arith(op, d, l, r) => out.push_str(&format!("\t{} {}, {}, {}\n", arith_mnem(*op), reg_name(*d), reg_name(*l), reg_name(*r))),
        Inst::ArithD(op, d, l, r) => out.push_str(&format!("\t{}.d {}, {}, {}\n", arith_mnem(*op), reg_name(*d), reg_name(*l), reg_name(*r))),
        Inst::Cmp(op, d, l, r) => out.push_str(&format!("\t{} {}, {}, {}\n", cmp_mnem(*op), reg_name(*d), reg_name(*l), reg_name(*r))),
        Inst::FCmp(op, l, r) => out.push_str(&format!("\t{} {}, {}\n", fcmp_mnem(*op), reg_name(*l), reg_name(*r))),
        Inst::And(d, l, r) => out.push_str(&format!("\tand {}, {}, {}\n", reg_name(*d), reg_name(*l), reg_name(*r))),
        Inst::Or(d, l, r) => out.push_str(&format!("\tor {}, {}, {}\n", reg_name(*d), reg_name(*l), reg_name(*r))),
        Inst::Not(d, s) => out.push_str(&format!("\txori {}, {}, 1\n", reg_name(*d), reg_name(*s))),
        Inst::MovT(d, s) => out.push_str(&format!("\tmovt {}, {}\n", reg_name(*d), reg_name(*s))),
        Inst::MovF(d, s) => out.push_str(&format!("\tmovf {}, {}\n", reg_name(*d), reg_name(*s))),
        Inst::UMinus(d, s) => out.push_str(&format!("\tneg {}, {}\n", reg_name(*d), reg_name(*s))),
        Inst::UMinusD(d, s) => out.push_str(&format!("\tneg.d {}, {}\n", reg_name(*d), reg_name(*s))),
        Inst::Push(v) => {
            let size = push_size(v);
            out.push_str(&format!("\tsubi $sp, $sp, {size}\n"));
            match v {
                RValue::Reg(Reg::Float(_)) => out.push_str(&format!("\ts.d {}, 0($sp)\n", operand(v))),
                RValue::Reg(Reg::Int(_)) => out.push_str(&format!("\tsw {}, 0($sp)\n", operand(v))),
                _ => out.push_str(&format!("\tsw {}, 0($sp)\n", operand(v))),
            }
        }
        Inst::Pop(r) => {
            let size = if matches!(r, Reg::Float(_)) { 8 } else { 4 };
            if matches!(r, Reg::Float(_)) {
                out.push_str(&format!("\tl.d {}, 0($sp)\n", reg_name(*r)));
            } else {
                out.push_str(&format!("\tlw {}, 0($sp)\n", reg_name(*r)));
            }
            out.push_str(&format!("\taddi $sp, $sp, {size}\n"));
        }
        Inst::Call(name) => out.push_str(&format!("\tjal {name}\n")),
        Inst::AssignCall(d, name) => {
            out.push_str(&format!("\tjal {name}\n"));
            if matches!(d, Reg::Float(_)) {
                out.push_str(&format!("\tmov.d {}, $f0\n", reg_name(*d)));
            } else {
                out.push_str(&format!("\tmove {}, $v1\n", reg_name(*d)));
            }
        }
        Inst::CallPtr(r) => out.push_str(&format!("\tjalr {}\n", reg_name(*r))),
        Inst::AssignCallPtr(d, r) => {
            out.push_str(&format!("\tjalr {}\n", reg_name(*r)));
            if matches!(d, Reg::Float(_)) {
                out.push_str(&format!("\tmov.d {}, $f0\n", reg_name(*d)));
            } else {
                out.push_str(&format!("\tmove {}, $v1\n", reg_name(*d)));
            }
        }
        Inst::Return(r) => {
            if let Some(r) = r {
                if matches!(r, Reg::Float(_)) {
                    out.push_str(&format!("\tmov.d $f0, {}\n", reg_name(*r)));
                } else {
                    out.push_str(&format!("\tmove $v1, {}\n", reg_name(*r)));
                }
            }
            out.push_str(&format!("\tj epilogue_{func}\n"));
        }
        Inst::GetAddr(d, m) => out.push_str(&format!("\tla {}, {}\n", reg_name(*d), mem_operand(m))),
        Inst::Deref(d, a) => out.push_str(&format!("\tlw {}, 0({})\n", reg_name(*d), reg_name(*a))),
        Inst::DerefD(d, a) => out.push_str(&format!("\tl.d {}, 0({})\n", reg_name(*d), reg_name(*a))),
        Inst::AddrAssign(a, v) => out.push_str(&format!("\tsw {}, 0({})\n", reg_name(*v), reg_name(*a))),
        Inst::AddrAssignD(a, v) => out.push_str(&format!("\ts.d {}, 0({})\n", reg_name(*v), reg_name(*a))),
        Inst::Write { code } => {
            out.push_str(&format!("\tli $v0, {code}\n"));
            out.push_str("\tsyscall\n");
        }
        Inst::Read { code } => {
            out.push_str(&format!("\tli $v0, {code}\n"));
            out.push_str("\tsyscall\n");
        }
    }
}

fn operand(v: &RValue) -> String {
    match v {
        RValue::Reg(r) => reg_name(*r),
        RValue::Mem { .. } => mem_operand(v),
        RValue::IntLit(n) => n.to_string(),
        RValue::FloatLit(n) => format!("{n:.2}"),
        RValue::StrLit(id) => id.clone(),
    }
}

fn push_size(v: &RValue) -> i32 {
    match v {
        RValue::Reg(Reg::Float(_)) | RValue::FloatLit(_) => 8,
        _ => 4,
    }
}

fn arith_mnem(op: ArithOp) -> &'static str {
    match op {
        ArithOp::Add => "add",
        ArithOp::Sub => "sub",
        ArithOp::Mul => "mul",
        ArithOp::Div => "div",
    }
}

fn cmp_mnem(op: CmpOp) -> &'static str {
    match op {
        CmpOp::Slt => "slt",
        CmpOp::Sle => "sle",
        CmpOp::Sgt => "sgt",
        CmpOp::Sge => "sge",
        CmpOp::Seq => "seq",
        CmpOp::Sne => "sne",
    }
}

fn fcmp_mnem(op: FCmpOp) -> &'static str {
    match op {
        FCmpOp::Clt => "c.lt.d",
        FCmpOp::Cle => "c.le.d",
        FCmpOp::Ceq => "c.eq.d",
    }
}
