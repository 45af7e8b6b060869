//! TAC → RTL lowering (§4.5): picks concrete registers, materializes
//! syscalls for print/read, and expands the calling convention.

use std::collections::HashMap;

use smallvec::SmallVec;

use crate::diagnostics::RegAllocError;
use crate::rtl::{ArithOp, CmpOp, FCmpOp, Inst, RValue, Reg, RegPool, StringPool};
use crate::tac;
use crate::types::TacType;

/// Per-function lowering state. Register-only TAC temps (`fp_offset ==
/// None`) are tracked here by name until their single consuming
/// instruction reclaims them; everything else round-trips through memory.
struct Context<'a> {
    pool: &'a mut RegPool,
    strings: &'a mut StringPool,
    func: String,
    live_temps: HashMap<String, Reg>,
}

fn bank_alloc(ty: TacType, pool: &mut RegPool, func: &str) -> Result<Reg, RegAllocError> {
    if ty == TacType::Float {
        pool.alloc_float(func)
    } else {
        pool.alloc_int(func)
    }
}

pub fn lower_func(
    f: &tac::Func,
    pool: &mut RegPool,
    strings: &mut StringPool,
) -> Result<crate::rtl::Func, RegAllocError> {
    pool.reset();
    let mut cx = Context { pool, strings, func: f.name.clone(), live_temps: HashMap::new() };
    let mut out = Vec::new();
    for inst in &f.body {
        lower_inst(inst, &mut cx, &mut out)?;
    }
    Ok(crate::rtl::Func { name: f.name.clone(), body: out, stackframe_size: f.stackframe_size })
}

fn lower_inst(inst: &tac::Inst, cx: &mut Context, out: &mut Vec<Inst>) -> Result<(), RegAllocError> {
    match inst {
        tac::Inst::Assign(sym, expr) => {
            let r = lower_call_for_assign(expr, sym.ty, cx, out)?;
            store_to_sym(sym, r, cx, out);
        }
        tac::Inst::AddrAssign(addr, val) => {
            let ar = eval_expr(addr, cx, out)?;
            let vr = eval_expr(val, cx, out)?;
            if val_tactype(val) == TacType::Float {
                out.push(Inst::AddrAssignD(ar, vr));
            } else {
                out.push(Inst::AddrAssign(ar, vr));
            }
            cx.pool.free(ar);
            cx.pool.free(vr);
        }
        tac::Inst::Print(expr) => lower_print(expr, cx, out)?,
        tac::Inst::ReadInt(addr) => {
            out.push(Inst::Read { code: 5 });
            let r = cx.pool.alloc_int(&cx.func)?;
            out.push(Inst::Move(r, Reg::Int("v0")));
            store_read_result(addr, r, false, cx, out)?;
        }
        tac::Inst::ReadFloat(addr) => {
            out.push(Inst::Read { code: 7 });
            let r = cx.pool.alloc_float(&cx.func)?;
            out.push(Inst::MoveD(r, Reg::Float("f0")));
            store_read_result(addr, r, true, cx, out)?;
        }
        tac::Inst::Label(l) => out.push(Inst::Label(*l)),
        tac::Inst::Goto(l) => out.push(Inst::Goto(*l)),
        tac::Inst::IfGoto(cond, l) => {
            let r = eval_expr(cond, cx, out)?;
            out.push(Inst::Bgtz(r, *l));
            cx.pool.free(r);
        }
        tac::Inst::Call(expr) => {
            lower_call_stmt(expr, cx, out)?;
        }
        tac::Inst::Return(sym) => {
            let r = match sym {
                Some(s) => Some(load_sym(s, cx, out)?),
                None => None,
            };
            out.push(Inst::Return(r));
            if let Some(r) = r {
                cx.pool.free(r);
            }
        }
    }
    Ok(())
}

fn val_tactype(e: &tac::Expr) -> TacType {
    match e {
        tac::Expr::Value(tac::Value::IntLit(_)) => TacType::Int,
        tac::Expr::Value(tac::Value::FloatLit(_)) => TacType::Float,
        tac::Expr::Value(tac::Value::StrLit(_)) => TacType::String,
        tac::Expr::Value(tac::Value::Sym(s)) => s.ty,
        tac::Expr::Unary(_, _, t) | tac::Expr::Binary(_, _, _, t) | tac::Expr::Deref(_, t) => *t,
        tac::Expr::Addr(_) => TacType::Ptr,
        tac::Expr::FuncCall(..) | tac::Expr::FuncPtrCall(..) => TacType::Int,
    }
}

/// Stores a `Read` syscall's result (already in `v0`/`f0`) into its
/// destination: a plain variable's address (`Expr::Addr(sym)`) stores
/// directly, anything else (an `*p` or `arr[i]` target) evaluates the
/// computed address and stores through it.
fn store_read_result(addr: &tac::Expr, val: Reg, is_float: bool, cx: &mut Context, out: &mut Vec<Inst>) -> Result<(), RegAllocError> {
    match addr {
        tac::Expr::Addr(sym) => {
            store_to_sym(sym, val, cx, out);
        }
        other => {
            let ar = eval_expr(other, cx, out)?;
            if is_float {
                out.push(Inst::AddrAssignD(ar, val));
            } else {
                out.push(Inst::AddrAssign(ar, val));
            }
            cx.pool.free(ar);
        }
    }
    Ok(())
}

/// Stores a freshly computed value into a TAC symbol: memory via
/// `Store`/`StoreD` for frame-resident symbols, or a live register
/// binding (transferring ownership of `r`) for pure temps.
fn store_to_sym(sym: &tac::TacSymRef, r: Reg, cx: &mut Context, out: &mut Vec<Inst>) {
    match sym.fp_offset {
        Some(off) => {
            let m = RValue::Mem { name: sym.name.clone(), is_global: sym.is_global, fp_offset: off };
            if sym.ty == TacType::Float {
                out.push(Inst::StoreD(m, r));
            } else {
                out.push(Inst::Store(m, r));
            }
            cx.pool.free(r);
        }
        None if sym.is_global => {
            let m = RValue::Mem { name: sym.name.clone(), is_global: true, fp_offset: 0 };
            if sym.ty == TacType::Float {
                out.push(Inst::StoreD(m, r));
            } else {
                out.push(Inst::Store(m, r));
            }
            cx.pool.free(r);
        }
        None => {
            cx.live_temps.insert(sym.name.clone(), r);
        }
    }
}

/// Loads a TAC symbol's value into a (possibly freshly allocated)
/// register: a live register temp is handed back directly (single-use,
/// removed from the live set), everything else is loaded from memory.
fn load_sym(sym: &tac::TacSymRef, cx: &mut Context, out: &mut Vec<Inst>) -> Result<Reg, RegAllocError> {
    if sym.fp_offset.is_none() && !sym.is_global {
        if let Some(r) = cx.live_temps.remove(&sym.name) {
            return Ok(r);
        }
    }
    let r = bank_alloc(sym.ty, cx.pool, &cx.func)?;
    let m = match sym.fp_offset {
        Some(off) => RValue::Mem { name: sym.name.clone(), is_global: sym.is_global, fp_offset: off },
        None => RValue::Mem { name: sym.name.clone(), is_global: true, fp_offset: 0 },
    };
    if sym.ty == TacType::Float {
        out.push(Inst::LoadD(r, m));
    } else {
        out.push(Inst::Load(r, m));
    }
    Ok(r)
}

fn eval_expr(e: &tac::Expr, cx: &mut Context, out: &mut Vec<Inst>) -> Result<Reg, RegAllocError> {
    match e {
        tac::Expr::Value(tac::Value::IntLit(n)) => {
            let r = cx.pool.alloc_int(&cx.func)?;
            out.push(Inst::ILoad(r, RValue::IntLit(*n)));
            Ok(r)
        }
        tac::Expr::Value(tac::Value::FloatLit(n)) => {
            let r = cx.pool.alloc_float(&cx.func)?;
            out.push(Inst::ILoadD(r, RValue::FloatLit(*n)));
            Ok(r)
        }
        tac::Expr::Value(tac::Value::StrLit(s)) => {
            let id = cx.strings.get_string_id(s);
            let r = cx.pool.alloc_int(&cx.func)?;
            out.push(Inst::LoadAddr(r, RValue::StrLit(id)));
            Ok(r)
        }
        tac::Expr::Value(tac::Value::Sym(s)) => load_sym(s, cx, out),
        tac::Expr::Addr(sym) => {
            let r = cx.pool.alloc_int(&cx.func)?;
            let m = match sym.fp_offset {
                Some(off) => RValue::Mem { name: sym.name.clone(), is_global: sym.is_global, fp_offset: off },
                None => RValue::Mem { name: sym.name.clone(), is_global: true, fp_offset: 0 },
            };
            out.push(Inst::GetAddr(r, m));
            Ok(r)
        }
        tac::Expr::Deref(inner, ty) => {
            let ar = eval_expr(inner, cx, out)?;
            let dst = bank_alloc(*ty, cx.pool, &cx.func)?;
            if *ty == TacType::Float {
                out.push(Inst::DerefD(dst, ar));
            } else {
                out.push(Inst::Deref(dst, ar));
            }
            cx.pool.free(ar);
            Ok(dst)
        }
        tac::Expr::Unary(op, inner, ty) => lower_unary(*op, inner, *ty, cx, out),
        tac::Expr::Binary(op, l, r, ty) => lower_binary(*op, l, r, *ty, cx, out),
        tac::Expr::FuncCall(..) | tac::Expr::FuncPtrCall(..) => {
            unreachable!("a call only ever appears as an Assign rhs or a statement-level Inst::Call, both handled before eval_expr sees it")
        }
    }
}

/// A call used for its value: its `Assign` destination type picks
/// `v1`/`f0` as the source of the copied result (§4.5).
fn eval_call_into(name_or_ptr: CallTarget, args: &[tac::Expr], ret_ty: TacType, cx: &mut Context, out: &mut Vec<Inst>) -> Result<Reg, RegAllocError> {
    let argc = push_args(args, cx, out)?;
    let dst = bank_alloc(ret_ty, cx.pool, &cx.func)?;
    match name_or_ptr {
        CallTarget::Named(name) => out.push(Inst::AssignCall(dst, name)),
        CallTarget::Ptr(cr) => {
            out.push(Inst::AssignCallPtr(dst, cr));
            cx.pool.free(cr);
        }
    }
    pop_args(&argc, out);
    Ok(dst)
}

enum CallTarget {
    Named(String),
    Ptr(Reg),
}

/// Pushes arguments right-to-left, size-aware (8 bytes for a double, 4
/// otherwise), and returns each pushed argument's type in push order so
/// `pop_args` can restore the stack with matching widths. Call sites
/// almost never pass more than a handful of arguments, so this stays
/// inline rather than heap-allocating for the common case.
fn push_args(args: &[tac::Expr], cx: &mut Context, out: &mut Vec<Inst>) -> Result<SmallVec<[TacType; 4]>, RegAllocError> {
    let mut pushed = SmallVec::with_capacity(args.len());
    for a in args.iter().rev() {
        let ty = val_tactype(a);
        let r = eval_expr(a, cx, out)?;
        out.push(Inst::Push(RValue::Reg(r)));
        cx.pool.free(r);
        pushed.push(ty);
    }
    Ok(pushed)
}

/// Pops each previously pushed argument, widest-pushed-last order
/// (i.e. the same order they were pushed, since `Pop` undoes `Push` off
/// the same stack top). The popped value is scratch and discarded.
fn pop_args(pushed: &[TacType], out: &mut Vec<Inst>) {
    for ty in pushed {
        if *ty == TacType::Float {
            out.push(Inst::Pop(Reg::Float("f0")));
        } else {
            out.push(Inst::Pop(Reg::Int("t0")));
        }
    }
}

/// Lowers a call whose result is assigned, routing the true result
/// register selection through `eval_call_into` instead of the generic
/// `Call`/allocate-a-throwaway path `eval_expr` uses for void statement
/// calls.
fn lower_call_for_assign(expr: &tac::Expr, ret_ty: TacType, cx: &mut Context, out: &mut Vec<Inst>) -> Result<Reg, RegAllocError> {
    match expr {
        tac::Expr::FuncCall(name, args) => eval_call_into(CallTarget::Named(name.clone()), args, ret_ty, cx, out),
        tac::Expr::FuncPtrCall(callee, args) => {
            let cr = eval_expr(callee, cx, out)?;
            eval_call_into(CallTarget::Ptr(cr), args, ret_ty, cx, out)
        }
        other => eval_expr(other, cx, out),
    }
}

fn lower_call_stmt(expr: &tac::Expr, cx: &mut Context, out: &mut Vec<Inst>) -> Result<(), RegAllocError> {
    match expr {
        tac::Expr::FuncCall(name, args) => {
            let argc = push_args(args, cx, out)?;
            out.push(Inst::Call(name.clone()));
            pop_args(&argc, out);
        }
        tac::Expr::FuncPtrCall(callee, args) => {
            let cr = eval_expr(callee, cx, out)?;
            let argc = push_args(args, cx, out)?;
            out.push(Inst::CallPtr(cr));
            pop_args(&argc, out);
            cx.pool.free(cr);
        }
        other => {
            let r = eval_expr(other, cx, out)?;
            cx.pool.free(r);
        }
    }
    Ok(())
}

fn lower_print(expr: &tac::Expr, cx: &mut Context, out: &mut Vec<Inst>) -> Result<(), RegAllocError> {
    let ty = val_tactype(expr);
    match ty {
        TacType::String => {
            let r = eval_expr(expr, cx, out)?;
            emit_syscall_arg(r, Reg::Int("a0"), false, cx, out);
            out.push(Inst::Write { code: 4 });
            cx.pool.free(r);
        }
        TacType::Float => {
            let r = eval_expr(expr, cx, out)?;
            emit_syscall_arg(r, Reg::Float("f12"), true, cx, out);
            out.push(Inst::Write { code: 3 });
            cx.pool.free(r);
        }
        _ => {
            let r = eval_expr(expr, cx, out)?;
            emit_syscall_arg(r, Reg::Int("a0"), false, cx, out);
            out.push(Inst::Write { code: 1 });
            cx.pool.free(r);
        }
    }
    Ok(())
}

/// Moves a value into the fixed syscall argument register. If the value
/// already sits in that very register (the allocator handed it out),
/// route through a fresh one first, since `a0`/`f12` stay reserved and
/// are never themselves allocator-managed, so this is a straight move.
fn emit_syscall_arg(src: Reg, target: Reg, is_float: bool, _cx: &mut Context, out: &mut Vec<Inst>) {
    if is_float {
        out.push(Inst::MoveD(target, src));
    } else {
        out.push(Inst::Move(target, src));
    }
}

fn lower_unary(op: tac::UnOp, inner: &tac::Expr, ty: TacType, cx: &mut Context, out: &mut Vec<Inst>) -> Result<Reg, RegAllocError> {
    let r = eval_expr(inner, cx, out)?;
    match op {
        tac::UnOp::Not => {
            let dst = cx.pool.alloc_int(&cx.func)?;
            out.push(Inst::Not(dst, r));
            cx.pool.free(r);
            Ok(dst)
        }
        tac::UnOp::Neg => {
            let dst = bank_alloc(ty, cx.pool, &cx.func)?;
            if ty == TacType::Float {
                out.push(Inst::UMinusD(dst, r));
            } else {
                out.push(Inst::UMinus(dst, r));
            }
            cx.pool.free(r);
            Ok(dst)
        }
    }
}

fn lower_binary(
    op: tac::BinOp,
    l: &tac::Expr,
    r: &tac::Expr,
    ty: TacType,
    cx: &mut Context,
    out: &mut Vec<Inst>,
) -> Result<Reg, RegAllocError> {
    let operand_ty = val_tactype(l);
    let lr = eval_expr(l, cx, out)?;
    let rr = eval_expr(r, cx, out)?;

    let result = match op {
        tac::BinOp::Add | tac::BinOp::Sub | tac::BinOp::Mul | tac::BinOp::Div => {
            let aop = match op {
                tac::BinOp::Add => ArithOp::Add,
                tac::BinOp::Sub => ArithOp::Sub,
                tac::BinOp::Mul => ArithOp::Mul,
                _ => ArithOp::Div,
            };
            let dst = bank_alloc(ty, cx.pool, &cx.func)?;
            if ty == TacType::Float {
                out.push(Inst::ArithD(aop, dst, lr, rr));
            } else {
                out.push(Inst::Arith(aop, dst, lr, rr));
            }
            dst
        }
        tac::BinOp::And => {
            let dst = cx.pool.alloc_int(&cx.func)?;
            out.push(Inst::And(dst, lr, rr));
            dst
        }
        tac::BinOp::Or => {
            let dst = cx.pool.alloc_int(&cx.func)?;
            out.push(Inst::Or(dst, lr, rr));
            dst
        }
        tac::BinOp::Eq | tac::BinOp::Ne | tac::BinOp::Lt | tac::BinOp::Le | tac::BinOp::Gt | tac::BinOp::Ge => {
            if operand_ty == TacType::Float {
                lower_float_cmp(op, lr, rr, cx, out)?
            } else {
                let cop = match op {
                    tac::BinOp::Eq => CmpOp::Seq,
                    tac::BinOp::Ne => CmpOp::Sne,
                    tac::BinOp::Lt => CmpOp::Slt,
                    tac::BinOp::Le => CmpOp::Sle,
                    tac::BinOp::Gt => CmpOp::Sgt,
                    _ => CmpOp::Sge,
                };
                let dst = cx.pool.alloc_int(&cx.func)?;
                out.push(Inst::Cmp(cop, dst, lr, rr));
                dst
            }
        }
    };
    cx.pool.free(lr);
    cx.pool.free(rr);
    // The comparison/arithmetic destination is distinct from its
    // operands, so freeing the operands after computing `result` is
    // always safe even when `result == lr` would otherwise alias (it
    // never does: every arm above allocates a fresh register).
    Ok(result)
}

/// Materializes a float comparison's condition flag into an integer
/// 0/1 register: load 1, then conditionally zero it via `MovT`/`MovF`
/// depending on the sense required (§4.5). Strictly-greater lowers as
/// "not less-or-equal", greater-or-equal as "not less-than".
fn lower_float_cmp(op: tac::BinOp, lr: Reg, rr: Reg, cx: &mut Context, out: &mut Vec<Inst>) -> Result<Reg, RegAllocError> {
    let dst = cx.pool.alloc_int(&cx.func)?;
    let zero = cx.pool.alloc_int(&cx.func)?;
    out.push(Inst::ILoad(dst, RValue::IntLit(1)));
    out.push(Inst::ILoad(zero, RValue::IntLit(0)));
    match op {
        tac::BinOp::Lt => {
            out.push(Inst::FCmp(FCmpOp::Clt, lr, rr));
            out.push(Inst::MovF(dst, zero));
        }
        tac::BinOp::Le => {
            out.push(Inst::FCmp(FCmpOp::Cle, lr, rr));
            out.push(Inst::MovF(dst, zero));
        }
        tac::BinOp::Eq => {
            out.push(Inst::FCmp(FCmpOp::Ceq, lr, rr));
            out.push(Inst::MovF(dst, zero));
        }
        tac::BinOp::Ne => {
            out.push(Inst::FCmp(FCmpOp::Ceq, lr, rr));
            out.push(Inst::MovT(dst, zero));
        }
        // gt := !(le), ge := !(lt)
        tac::BinOp::Gt => {
            out.push(Inst::FCmp(FCmpOp::Cle, lr, rr));
            out.push(Inst::MovT(dst, zero));
        }
        tac::BinOp::Ge => {
            out.push(Inst::FCmp(FCmpOp::Clt, lr, rr));
            out.push(Inst::MovT(dst, zero));
        }
        _ => unreachable!("lower_float_cmp only called for comparison operators"),
    }
    cx.pool.free(zero);
    Ok(dst)
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::*;
    use crate::ast::elaborate::Elaborator;
    use crate::frontend::parse_program;
    use crate::symtab::SymbolTable;
    use crate::tac::LabelCounter;
    use crate::types::TypeRegistry;

    fn lower_rtl(src: &str) -> (Vec<crate::rtl::Func>, RegPool) {
        let mut types = TypeRegistry::new();
        let mut symtab = SymbolTable::new();
        let parse_tree = parse_program(src, &mut |_| {}).expect("parses");
        let mut elaborator = Elaborator::new(&mut types, &mut symtab, Path::new("t.sclp"));
        let ast_funcs = elaborator.program(&parse_tree).expect("elaborates");
        let mut labels = LabelCounter::default();
        let tac_funcs = crate::tac::lower::lower_program(&ast_funcs, &types, &mut labels);
        let mut pool = RegPool::new();
        let mut strings = StringPool::new();
        let rtl_funcs =
            tac_funcs.iter().map(|f| lower_func(f, &mut pool, &mut strings).expect("lowers")).collect();
        (rtl_funcs, pool)
    }

    /// Testable Property #8: by the end of lowering every function, every
    /// register the pool handed out has been returned.
    #[test]
    fn register_pool_is_fully_reclaimed_after_each_function() {
        let (funcs, pool) = lower_rtl(
            "int f(int n) { if (n <= 1) return 1; return n * f(n - 1); } \
             void main() { int r; float y; r = f(5); y = 1.5 + 2.5; print r; print y; }",
        );
        assert_eq!(funcs.len(), 2);
        assert!(pool.all_free(), "register pool leaked an allocation across function lowering");
    }

    /// Testable Property #10: the same string literal pools to the same
    /// id on a second appearance.
    #[test]
    fn string_pool_dedups_repeated_literals() {
        let mut strings = StringPool::new();
        let a = strings.get_string_id("hello");
        let b = strings.get_string_id("world");
        let c = strings.get_string_id("hello");
        assert_eq!(a, c);
        assert_ne!(a, b);
        assert_eq!(strings.entries().len(), 2);
    }

    /// A deep arithmetic expression frees every temporary register it
    /// allocates along the way, not just at the end of the function.
    #[test]
    fn nested_arithmetic_frees_intermediate_registers() {
        let (_funcs, pool) = lower_rtl("void main() { int a; int b; int c; a = (b + c) * (b - c) + b; }");
        assert!(pool.all_free());
    }
}
