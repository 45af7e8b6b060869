//! Deterministic, human-readable dumps of the AST/TAC/RTL stages (§6
//! Output Formats): each begins with `**PROCEDURE: <name>` framed by a
//! `**BEGIN:`/`**END:` block; floats always print with two decimals.

use crate::ast;
use crate::rtl;
use crate::tac;
use crate::types::TypeRegistry;

const INDENT: &str = "    ";

pub fn dump_ast(funcs: &[ast::FuncDefn], reg: &TypeRegistry) -> String {
    let mut out = String::new();
    for f in funcs {
        out.push_str(&format!("**PROCEDURE: {}\n**BEGIN:\n", f.sym.name));
        dump_stmt(&f.body, reg, 1, &mut out);
        out.push_str("**END:\n");
    }
    out
}

fn indent(n: usize, out: &mut String) {
    for _ in 0..n {
        out.push_str(INDENT);
    }
}

fn dump_stmt(s: &ast::Stmt, reg: &TypeRegistry, depth: usize, out: &mut String) {
    indent(depth, out);
    match s {
        ast::Stmt::Compound(stmts) => {
            out.push_str("Compound\n");
            for s in stmts {
                dump_stmt(s, reg, depth + 1, out);
            }
        }
        ast::Stmt::Assign(lv, e) => out.push_str(&format!("Assign {} = {}\n", dump_lvalue(lv, reg), dump_expr(e, reg))),
        ast::Stmt::Print(e) => out.push_str(&format!("Print {}\n", dump_expr(e, reg))),
        ast::Stmt::Read(lv) => out.push_str(&format!("Read {}\n", dump_lvalue(lv, reg))),
        ast::Stmt::If(c, t) => {
            out.push_str(&format!("If {}\n", dump_expr(c, reg)));
            dump_stmt(t, reg, depth + 1, out);
        }
        ast::Stmt::IfElse(c, t, f) => {
            out.push_str(&format!("If {}\n", dump_expr(c, reg)));
            dump_stmt(t, reg, depth + 1, out);
            indent(depth, out);
            out.push_str("Else\n");
            dump_stmt(f, reg, depth + 1, out);
        }
        ast::Stmt::While(c, body) => {
            out.push_str(&format!("While {}\n", dump_expr(c, reg)));
            dump_stmt(body, reg, depth + 1, out);
        }
        ast::Stmt::DoWhile(body, c) => {
            out.push_str("DoWhile\n");
            dump_stmt(body, reg, depth + 1, out);
            indent(depth, out);
            out.push_str(&format!("Until {}\n", dump_expr(c, reg)));
        }
        ast::Stmt::For(init, cond, inc, body) => {
            out.push_str("For\n");
            if let Some(init) = init {
                dump_stmt(init, reg, depth + 1, out);
            }
            if let Some(cond) = cond {
                indent(depth + 1, out);
                out.push_str(&format!("Cond {}\n", dump_expr(cond, reg)));
            }
            if let Some(inc) = inc {
                dump_stmt(inc, reg, depth + 1, out);
            }
            dump_stmt(body, reg, depth + 1, out);
        }
        ast::Stmt::Break => out.push_str("Break\n"),
        ast::Stmt::Continue => out.push_str("Continue\n"),
        ast::Stmt::Return(e) => match e {
            Some(e) => out.push_str(&format!("Return {}\n", dump_expr(e, reg))),
            None => out.push_str("Return\n"),
        },
        ast::Stmt::Call(e) => out.push_str(&format!("Call {}\n", dump_expr(e, reg))),
    }
}

fn dump_lvalue(lv: &ast::LValue, reg: &TypeRegistry) -> String {
    match lv {
        ast::LValue::Sym(s) => s.name.clone(),
        ast::LValue::Index { base, index, .. } => format!("{}[{}]", dump_expr(base, reg), dump_expr(index, reg)),
        ast::LValue::Deref { ptr, .. } => format!("*{}", dump_expr(ptr, reg)),
    }
}

fn dump_expr(e: &ast::Expr, reg: &TypeRegistry) -> String {
    match e {
        ast::Expr::IntLit(n) => n.to_string(),
        ast::Expr::FloatLit(n) => format!("{n:.2}"),
        ast::Expr::BoolLit(b) => b.to_string(),
        ast::Expr::StrLit(s) => format!("\"{s}\""),
        ast::Expr::LValue(lv) => dump_lvalue(lv, reg),
        ast::Expr::Addr(lv, _) => format!("&{}", dump_lvalue(lv, reg)),
        ast::Expr::Unary(op, inner, _) => format!("({} {})", unop_sym(*op), dump_expr(inner, reg)),
        ast::Expr::Binary(op, l, r, _) => format!("({} {} {})", dump_expr(l, reg), binop_sym(*op), dump_expr(r, reg)),
        ast::Expr::Ternary(c, t, f, _) => format!("({} ? {} : {})", dump_expr(c, reg), dump_expr(t, reg), dump_expr(f, reg)),
        ast::Expr::Call(sym, args, _) => format!("{}({})", sym.name, args.iter().map(|a| dump_expr(a, reg)).collect::<Vec<_>>().join(", ")),
        ast::Expr::CallPtr(callee, args, _) => {
            format!("(*{})({})", dump_expr(callee, reg), args.iter().map(|a| dump_expr(a, reg)).collect::<Vec<_>>().join(", "))
        }
    }
}

fn unop_sym(op: ast::UnOp) -> &'static str {
    match op {
        ast::UnOp::Neg => "-",
        ast::UnOp::Not => "!",
    }
}

fn binop_sym(op: ast::BinOp) -> &'static str {
    match op {
        ast::BinOp::Add => "+",
        ast::BinOp::Sub => "-",
        ast::BinOp::Mul => "*",
        ast::BinOp::Div => "/",
        ast::BinOp::Eq => "==",
        ast::BinOp::Ne => "!=",
        ast::BinOp::Lt => "<",
        ast::BinOp::Le => "<=",
        ast::BinOp::Gt => ">",
        ast::BinOp::Ge => ">=",
        ast::BinOp::And => "&&",
        ast::BinOp::Or => "||",
    }
}

pub fn dump_tac(funcs: &[tac::Func]) -> String {
    let mut out = String::new();
    for f in funcs {
        out.push_str(&format!("**PROCEDURE: {}\n**BEGIN:\n", f.name));
        for inst in &f.body {
            out.push_str(INDENT);
            out.push_str(&dump_tac_inst(inst));
            out.push('\n');
        }
        out.push_str("**END:\n");
    }
    out
}

fn dump_tac_inst(i: &tac::Inst) -> String {
    match i {
        tac::Inst::Assign(s, e) => format!("{} = {}", s.name, dump_tac_expr(e)),
        tac::Inst::AddrAssign(a, v) => format!("*{} = {}", dump_tac_expr(a), dump_tac_expr(v)),
        tac::Inst::Print(e) => format!("print {}", dump_tac_expr(e)),
        tac::Inst::ReadInt(a) => format!("read_int {}", dump_tac_expr(a)),
        tac::Inst::ReadFloat(a) => format!("read_float {}", dump_tac_expr(a)),
        tac::Inst::Label(l) => format!("L{}:", l.0),
        tac::Inst::Goto(l) => format!("goto L{}", l.0),
        tac::Inst::IfGoto(c, l) => format!("if {} goto L{}", dump_tac_expr(c), l.0),
        tac::Inst::Call(e) => format!("call {}", dump_tac_expr(e)),
        tac::Inst::Return(s) => match s {
            Some(s) => format!("return {}", s.name),
            None => "return".to_string(),
        },
    }
}

fn dump_tac_expr(e: &tac::Expr) -> String {
    match e {
        tac::Expr::Value(tac::Value::IntLit(n)) => n.to_string(),
        tac::Expr::Value(tac::Value::FloatLit(n)) => format!("{n:.2}"),
        tac::Expr::Value(tac::Value::StrLit(s)) => format!("\"{s}\""),
        tac::Expr::Value(tac::Value::Sym(s)) => s.name.clone(),
        tac::Expr::Unary(op, inner, _) => format!("({} {})", tac_unop_sym(*op), dump_tac_expr(inner)),
        tac::Expr::Binary(op, l, r, _) => format!("({} {} {})", dump_tac_expr(l), tac_binop_sym(*op), dump_tac_expr(r)),
        tac::Expr::Deref(inner, _) => format!("*{}", dump_tac_expr(inner)),
        tac::Expr::Addr(s) => format!("&{}", s.name),
        tac::Expr::FuncCall(name, args) => format!("{}({})", name, args.iter().map(dump_tac_expr).collect::<Vec<_>>().join(", ")),
        tac::Expr::FuncPtrCall(callee, args) => {
            format!("(*{})({})", dump_tac_expr(callee), args.iter().map(dump_tac_expr).collect::<Vec<_>>().join(", "))
        }
    }
}

fn tac_unop_sym(op: tac::UnOp) -> &'static str {
    match op {
        tac::UnOp::Neg => "-",
        tac::UnOp::Not => "!",
    }
}

fn tac_binop_sym(op: tac::BinOp) -> &'static str {
    match op {
        tac::BinOp::Add => "+",
        tac::BinOp::Sub => "-",
        tac::BinOp::Mul => "*",
        tac::BinOp::Div => "/",
        tac::BinOp::Eq => "==",
        tac::BinOp::Ne => "!=",
        tac::BinOp::Lt => "<",
        tac::BinOp::Le => "<=",
        tac::BinOp::Gt => ">",
        tac::BinOp::Ge => ">=",
        tac::BinOp::And => "&&",
        tac::BinOp::Or => "||",
    }
}

pub fn dump_rtl(funcs: &[rtl::Func]) -> String {
    let mut out = String::new();
    for f in funcs {
        out.push_str(&format!("**PROCEDURE: {}\n**BEGIN:\n", f.name));
        for inst in &f.body {
            out.push_str(INDENT);
            out.push_str(&format!("{inst:?}"));
            out.push('\n');
        }
        out.push_str("**END:\n");
    }
    out
}
