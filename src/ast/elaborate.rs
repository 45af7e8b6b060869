//! Turns a `parse_tree::Program` into typed `ast::FuncDefn`s, enforcing
//! every static rule in §4.3.

use std::path::Path;

use crate::ast::{check_return, BinOp as ABinOp, Expr as AExpr, FuncDefn, LValue, Stmt as AStmt, UnOp as AUnOp};
use crate::diagnostics::{CompileError, FileSpan, SemanticErrorKind, SymbolError, TypeError};
use crate::parse_tree as pt;
use crate::symtab::SymbolTable;
use crate::types::{SemType, TypeId, TypeRegistry};

pub struct Elaborator<'a> {
    pub reg: &'a mut TypeRegistry,
    pub symtab: &'a mut SymbolTable,
    pub file: &'a Path,
    current_func: String,
    /// Nesting depth of enclosing loops; `break`/`continue` are rejected
    /// outside a loop here, at the AST boundary, since TAC-level `Stmt`
    /// nodes carry no line number to diagnose against (§7).
    loop_depth: u32,
}

impl<'a> Elaborator<'a> {
    #[must_use]
    pub fn new(reg: &'a mut TypeRegistry, symtab: &'a mut SymbolTable, file: &'a Path) -> Self {
        Elaborator { reg, symtab, file, current_func: String::new(), loop_depth: 0 }
    }

    fn span(&self, line: usize) -> FileSpan {
        FileSpan::new(self.file.to_path_buf(), line)
    }

    fn err(&self, line: usize, kind: SemanticErrorKind) -> CompileError {
        CompileError::semantic(self.span(line), kind)
    }

    fn prim_type_id(&self, base: &pt::PrimType) -> TypeId {
        match base {
            pt::PrimType::Void => self.reg.void(),
            pt::PrimType::Bool => self.reg.bool_(),
            pt::PrimType::Int => self.reg.int(),
            pt::PrimType::Float => self.reg.float(),
            pt::PrimType::String => self.reg.string(),
        }
    }

    /// Builds the semantic type named by a primitive base plus a modifier
    /// chain. Modifiers are already recorded innermost-first (see the
    /// doc comment on `parse_tree::Modifier`), so this is a plain forward
    /// fold; a multi-dimensional `Array` modifier still wraps its own
    /// dimensions innermost-first internally (the last-written `[n]` is
    /// closest to the element type).
    fn build_type(&mut self, base: &pt::PrimType, modifiers: &[pt::Modifier], line: usize) -> Result<TypeId, CompileError> {
        let mut ty = self.prim_type_id(base);
        for m in modifiers {
            match m {
                pt::Modifier::Ptr { is_const } => ty = self.reg.make_ptr(ty, *is_const),
                pt::Modifier::Array(dims) => {
                    for &d in dims.iter().rev() {
                        ty = self
                            .reg
                            .make_array(ty, d)
                            .map_err(|e| self.err(line, SemanticErrorKind::BadDeclaration(e)))?;
                    }
                }
                pt::Modifier::Func(_) => {
                    return Err(self.err(line, SemanticErrorKind::BadDeclaration(TypeError::FuncParamIsFunc)))
                }
            }
        }
        Ok(ty)
    }

    /// `Modifier::Ptr { is_const }` marks the pointer's *target* const
    /// (feeding `SemType::Ptr::target_is_const`, checked on `Deref`); this
    /// language has no binding-level const, so the variable itself is
    /// always reassignable.
    fn declare_var(&mut self, base: &pt::PrimType, d: &pt::Declarator) -> Result<(), CompileError> {
        let ty = self.build_type(base, &d.modifiers, d.line)?;
        if self.reg.is_void(ty) {
            return Err(self.err(d.line, SemanticErrorKind::BadDeclaration(TypeError::VoidVariable)));
        }
        self.symtab
            .put_var(d.name.clone(), ty, false)
            .map_err(|e| self.err(d.line, SemanticErrorKind::Symbol(e)))?;
        Ok(())
    }

    pub fn program(&mut self, prog: &pt::Program) -> Result<Vec<FuncDefn>, CompileError> {
        let mut out = Vec::new();
        for item in &prog.items {
            match item {
                pt::TopLevel::VarDecl { base, declarators } => {
                    for d in declarators {
                        self.declare_var(base, d)?;
                    }
                }
                pt::TopLevel::FuncDefn(fd) => out.push(self.func_defn(fd)?),
            }
        }
        Ok(out)
    }

    fn func_defn(&mut self, fd: &pt::FuncDefn) -> Result<FuncDefn, CompileError> {
        let ret_ty = self.build_type(&fd.ret, &fd.ret_modifiers, fd.line)?;
        if self.reg.is_func(ret_ty) {
            return Err(self.err(fd.line, SemanticErrorKind::BadDeclaration(TypeError::FuncReturningFunc)));
        }
        if self.reg.is_array(ret_ty) {
            return Err(self.err(fd.line, SemanticErrorKind::BadDeclaration(TypeError::FuncReturningArray)));
        }

        self.symtab.begin_scope();
        let mut param_tys = Vec::new();
        for (i, p) in fd.params.iter().enumerate() {
            let pty = self.build_type(&p.base, &p.modifiers, p.line)?;
            if self.reg.is_void(pty) {
                return Err(self.err(p.line, SemanticErrorKind::BadDeclaration(TypeError::VoidVariable)));
            }
            let name = p.name.clone().unwrap_or_else(|| format!("_unnamed_{i}"));
            self.symtab
                .put_var(name, pty, false)
                .map_err(|e| self.err(p.line, SemanticErrorKind::Symbol(e)))?;
            param_tys.push(pty);
        }
        self.symtab.end_scope();

        let func_ty = self
            .reg
            .make_func(ret_ty, param_tys)
            .map_err(|e| self.err(fd.line, SemanticErrorKind::BadDeclaration(e)))?;
        let types_equal = |a: TypeId, b: TypeId| a == b;
        let sym = self
            .symtab
            .put_func(fd.name.clone(), func_ty, types_equal)
            .map_err(|e| self.err(fd.line, SemanticErrorKind::Symbol(e)))?;

        self.symtab.begin_scope();
        let mut params = Vec::new();
        for (i, p) in fd.params.iter().enumerate() {
            let pty = self.build_type(&p.base, &p.modifiers, p.line)?;
            let name = p.name.clone().unwrap_or_else(|| format!("_unnamed_{i}"));
            let psym = self
                .symtab
                .put_var(name, pty, false)
                .map_err(|e| self.err(p.line, SemanticErrorKind::Symbol(e)))?;
            params.push(psym);
        }

        let is_void = self.reg.is_void(ret_ty);
        self.current_func = fd.name.clone();
        let body_stmts = match &fd.body.node {
            pt::Stmt::Compound(stmts) => stmts,
            _ => unreachable!("function body is always a Compound per the grammar"),
        };
        let mut elaborated = Vec::with_capacity(body_stmts.len());
        for s in body_stmts {
            elaborated.push(self.stmt(s, ret_ty)?);
        }
        let body = AStmt::Compound(elaborated);
        self.symtab.end_scope();

        let ok = check_return(&body, is_void);
        if !is_void && !ok {
            return Err(self.err(fd.line, SemanticErrorKind::IncompleteReturn { func: fd.name.clone() }));
        }
        let has_return = if is_void { ok } else { true };

        Ok(FuncDefn { sym, params, ret_ty, body, has_return, line: fd.line })
    }

    fn stmt(&mut self, s: &pt::Spanned<pt::Stmt>, ret_ty: TypeId) -> Result<AStmt, CompileError> {
        let line = s.line;
        match &s.node {
            pt::Stmt::Decl { base, declarators } => {
                for d in declarators {
                    self.declare_var(base, d)?;
                }
                // Declarations don't lower to an executable statement on
                // their own; represent as an empty compound.
                Ok(AStmt::Compound(Vec::new()))
            }
            pt::Stmt::Assign(lhs, rhs) => {
                let lhs_e = self.expr(lhs)?;
                let lv = match lhs_e {
                    AExpr::LValue(lv) => lv,
                    _ => {
                        return Err(self.err(
                            line,
                            SemanticErrorKind::TypeMismatch {
                                context: "assignment".into(),
                                reason: "left-hand side is not an l-value".into(),
                            },
                        ))
                    }
                };
                if lv.is_const() {
                    return Err(self.err(line, SemanticErrorKind::ConstViolation { what: "assignment target".into() }));
                }
                let rhs_e = self.expr(rhs)?;
                if !self.reg.assignable(lv.ty(), rhs_e.ty(self.reg)) {
                    return Err(self.err(
                        line,
                        SemanticErrorKind::TypeMismatch { context: "assignment".into(), reason: "incompatible types".into() },
                    ));
                }
                Ok(AStmt::Assign(lv, rhs_e))
            }
            pt::Stmt::Print(e) => {
                let e = self.expr(e)?;
                let t = e.ty(self.reg);
                if !(self.reg.is_int_or_float(t) || t == self.reg.string()) {
                    return Err(self.err(
                        line,
                        SemanticErrorKind::TypeMismatch { context: "print".into(), reason: "expected int, float or string".into() },
                    ));
                }
                Ok(AStmt::Print(e))
            }
            pt::Stmt::Read(e) => {
                let e = self.expr(e)?;
                let lv = match e {
                    AExpr::LValue(lv) => lv,
                    _ => {
                        return Err(self.err(
                            line,
                            SemanticErrorKind::TypeMismatch { context: "read".into(), reason: "target is not an l-value".into() },
                        ))
                    }
                };
                if lv.is_const() {
                    return Err(self.err(line, SemanticErrorKind::ConstViolation { what: "read target".into() }));
                }
                if !self.reg.is_int_or_float(lv.ty()) {
                    return Err(self.err(
                        line,
                        SemanticErrorKind::TypeMismatch { context: "read".into(), reason: "expected int or float".into() },
                    ));
                }
                Ok(AStmt::Read(lv))
            }
            pt::Stmt::Compound(stmts) => {
                self.symtab.begin_scope();
                let mut out = Vec::with_capacity(stmts.len());
                for s in stmts {
                    out.push(self.stmt(s, ret_ty)?);
                }
                self.symtab.end_scope();
                Ok(AStmt::Compound(out))
            }
            pt::Stmt::If(c, t) => {
                let c = self.cond(c)?;
                let t = Box::new(self.stmt(t, ret_ty)?);
                Ok(AStmt::If(c, t))
            }
            pt::Stmt::IfElse(c, t, f) => {
                let c = self.cond(c)?;
                let t = Box::new(self.stmt(t, ret_ty)?);
                let f = Box::new(self.stmt(f, ret_ty)?);
                Ok(AStmt::IfElse(c, t, f))
            }
            pt::Stmt::While(c, body) => {
                let c = self.cond(c)?;
                self.loop_depth += 1;
                let body = self.stmt(body, ret_ty);
                self.loop_depth -= 1;
                Ok(AStmt::While(c, Box::new(body?)))
            }
            pt::Stmt::DoWhile(body, c) => {
                self.loop_depth += 1;
                let body = self.stmt(body, ret_ty);
                self.loop_depth -= 1;
                let body = body?;
                let c = self.cond(c)?;
                Ok(AStmt::DoWhile(Box::new(body), c))
            }
            pt::Stmt::For(init, cond, inc, body) => {
                let init = init.as_ref().map(|s| self.stmt(s, ret_ty)).transpose()?.map(Box::new);
                let cond = cond.as_ref().map(|c| self.cond(c)).transpose()?;
                let inc = inc.as_ref().map(|s| self.stmt(s, ret_ty)).transpose()?.map(Box::new);
                self.loop_depth += 1;
                let body = self.stmt(body, ret_ty);
                self.loop_depth -= 1;
                Ok(AStmt::For(init, cond, inc, Box::new(body?)))
            }
            pt::Stmt::Break => {
                if self.loop_depth == 0 {
                    return Err(self.err(line, SemanticErrorKind::BreakOutsideLoop));
                }
                Ok(AStmt::Break)
            }
            pt::Stmt::Continue => {
                if self.loop_depth == 0 {
                    return Err(self.err(line, SemanticErrorKind::ContinueOutsideLoop));
                }
                Ok(AStmt::Continue)
            }
            pt::Stmt::Return(e) => {
                let is_void = self.reg.is_void(ret_ty);
                match e {
                    None => {
                        if !is_void {
                            return Err(self.err(line, SemanticErrorKind::VoidReturnMismatch { func: self.current_func.clone() }));
                        }
                        Ok(AStmt::Return(None))
                    }
                    Some(e) => {
                        if is_void {
                            return Err(self.err(line, SemanticErrorKind::VoidReturnMismatch { func: self.current_func.clone() }));
                        }
                        let e = self.expr(e)?;
                        if !self.reg.assignable(ret_ty, e.ty(self.reg)) {
                            return Err(self.err(
                                line,
                                SemanticErrorKind::TypeMismatch { context: "return".into(), reason: "incompatible with declared return type".into() },
                            ));
                        }
                        Ok(AStmt::Return(Some(e)))
                    }
                }
            }
            pt::Stmt::Call(name, args) => {
                let call = self.call(name, args, line)?;
                let t = call.ty(self.reg);
                if !self.reg.is_void(t) {
                    return Err(self.err(line, SemanticErrorKind::IgnoredResult { func: name.clone() }));
                }
                Ok(AStmt::Call(call))
            }
        }
    }

    fn cond(&mut self, e: &pt::Spanned<pt::Expr>) -> Result<AExpr, CompileError> {
        let line = e.line;
        let e = self.expr(e)?;
        if !self.reg.is_bool(e.ty(self.reg)) {
            return Err(self.err(
                line,
                SemanticErrorKind::TypeMismatch { context: "condition".into(), reason: "expected bool".into() },
            ));
        }
        Ok(e)
    }

    fn call(&mut self, name: &str, args: &[pt::Spanned<pt::Expr>], line: usize) -> Result<AExpr, CompileError> {
        let sym = self
            .symtab
            .get_func(name)
            .ok_or_else(|| self.err(line, SemanticErrorKind::Symbol(SymbolError::Undeclared(name.to_string()))))?;
        let param_tys: Vec<TypeId> = match self.reg.get(sym.semtype) {
            SemType::Func { params, .. } => params.clone(),
            _ => unreachable!("function symbol always carries a Func type"),
        };
        if args.len() != param_tys.len() {
            return Err(self.err(
                line,
                SemanticErrorKind::ArityMismatch { func: name.to_string(), expected: param_tys.len(), found: args.len() },
            ));
        }
        let mut out = Vec::with_capacity(args.len());
        for (a, &pty) in args.iter().zip(&param_tys) {
            let ae = self.expr(a)?;
            if !self.reg.assignable(pty, ae.ty(self.reg)) {
                return Err(self.err(
                    a.line,
                    SemanticErrorKind::TypeMismatch { context: format!("argument to {name}"), reason: "incompatible types".into() },
                ));
            }
            out.push(ae);
        }
        let ret = self.reg.func_ret(sym.semtype);
        Ok(AExpr::Call(sym, out, ret))
    }

    fn expr(&mut self, e: &pt::Spanned<pt::Expr>) -> Result<AExpr, CompileError> {
        let line = e.line;
        match &e.node {
            pt::Expr::IntLit(n) => Ok(AExpr::IntLit(*n)),
            pt::Expr::FloatLit(n) => Ok(AExpr::FloatLit(*n)),
            pt::Expr::BoolLit(b) => Ok(AExpr::BoolLit(*b)),
            pt::Expr::StrLit(s) => Ok(AExpr::StrLit(s.clone())),
            pt::Expr::Ident(name) => {
                let sym = self
                    .symtab
                    .get_var(name)
                    .ok_or_else(|| self.err(line, SemanticErrorKind::Symbol(SymbolError::Undeclared(name.clone()))))?;
                Ok(AExpr::LValue(LValue::Sym(sym)))
            }
            pt::Expr::Unary(op, inner) => match op {
                pt::UnOp::Neg => {
                    let inner = self.expr(inner)?;
                    let t = inner.ty(self.reg);
                    if !self.reg.is_int_or_float(t) {
                        return Err(self.err(
                            line,
                            SemanticErrorKind::TypeMismatch { context: "unary -".into(), reason: "expected int or float".into() },
                        ));
                    }
                    Ok(AExpr::Unary(AUnOp::Neg, Box::new(inner), t))
                }
                pt::UnOp::Not => {
                    let inner = self.expr(inner)?;
                    let t = inner.ty(self.reg);
                    if !self.reg.is_bool(t) {
                        return Err(self.err(
                            line,
                            SemanticErrorKind::TypeMismatch { context: "unary !".into(), reason: "expected bool".into() },
                        ));
                    }
                    Ok(AExpr::Unary(AUnOp::Not, Box::new(inner), t))
                }
                pt::UnOp::Deref => {
                    let inner = self.expr(inner)?;
                    let t = inner.ty(self.reg);
                    let (pointee, is_const) = match self.reg.get(t) {
                        SemType::Ptr { target, target_is_const } => (*target, *target_is_const),
                        _ => {
                            return Err(self.err(
                                line,
                                SemanticErrorKind::TypeMismatch { context: "dereference".into(), reason: "expected pointer".into() },
                            ))
                        }
                    };
                    Ok(AExpr::LValue(LValue::Deref { ptr: Box::new(inner), pointee_ty: pointee, is_const }))
                }
                pt::UnOp::Addr => {
                    let inner = self.expr(inner)?;
                    let lv = match inner {
                        AExpr::LValue(lv) => lv,
                        _ => {
                            return Err(self.err(
                                line,
                                SemanticErrorKind::TypeMismatch { context: "address-of".into(), reason: "operand is not an l-value".into() },
                            ))
                        }
                    };
                    let ty = self.reg.make_ptr(lv.ty(), lv.is_const());
                    Ok(AExpr::Addr(Box::new(lv), ty))
                }
            },
            pt::Expr::Binary(op, l, r) => self.binary(*op, l, r, line),
            pt::Expr::Ternary(c, t, f) => {
                let c = self.cond(c)?;
                let t = self.expr(t)?;
                let f = self.expr(f)?;
                let tt = t.ty(self.reg);
                let ft = f.ty(self.reg);
                if tt != ft {
                    return Err(self.err(
                        line,
                        SemanticErrorKind::TypeMismatch { context: "ternary".into(), reason: "branches have different types".into() },
                    ));
                }
                Ok(AExpr::Ternary(Box::new(c), Box::new(t), Box::new(f), tt))
            }
            pt::Expr::Index(base, idx) => {
                let base_e = self.expr(base)?;
                let idx_e = self.expr(idx)?;
                if self.reg.get(idx_e.ty(self.reg)) != &SemType::Int {
                    return Err(self.err(
                        line,
                        SemanticErrorKind::TypeMismatch { context: "array index".into(), reason: "expected int".into() },
                    ));
                }
                let base_ty = base_e.ty(self.reg);
                let (elem_ty, is_const) = match self.reg.get(base_ty) {
                    // Arrays carry no const modifier in this language; only
                    // a pointer's target can be const.
                    SemType::Array { element, .. } => (*element, false),
                    SemType::Ptr { target, target_is_const } => (*target, *target_is_const),
                    _ => {
                        return Err(self.err(
                            line,
                            SemanticErrorKind::TypeMismatch { context: "array index".into(), reason: "expected array or pointer".into() },
                        ))
                    }
                };
                Ok(AExpr::LValue(LValue::Index { base: Box::new(base_e), index: Box::new(idx_e), elem_ty, is_const }))
            }
            pt::Expr::Call(name, args) => self.call(name, args, line),
            pt::Expr::CallPtr(callee, args) => {
                let callee_e = self.expr(callee)?;
                let ct = callee_e.ty(self.reg);
                let target = match self.reg.get(ct) {
                    SemType::Ptr { target, .. } if self.reg.is_func(*target) => *target,
                    _ => {
                        return Err(self.err(
                            line,
                            SemanticErrorKind::TypeMismatch { context: "indirect call".into(), reason: "expected function pointer".into() },
                        ))
                    }
                };
                let param_tys = self.reg.func_params(target).to_vec();
                if args.len() != param_tys.len() {
                    return Err(self.err(
                        line,
                        SemanticErrorKind::ArityMismatch { func: "<indirect>".into(), expected: param_tys.len(), found: args.len() },
                    ));
                }
                let mut out = Vec::with_capacity(args.len());
                for (a, &pty) in args.iter().zip(&param_tys) {
                    let ae = self.expr(a)?;
                    if !self.reg.assignable(pty, ae.ty(self.reg)) {
                        return Err(self.err(
                            a.line,
                            SemanticErrorKind::TypeMismatch { context: "indirect call argument".into(), reason: "incompatible types".into() },
                        ));
                    }
                    out.push(ae);
                }
                let ret = self.reg.func_ret(target);
                Ok(AExpr::CallPtr(Box::new(callee_e), out, ret))
            }
        }
    }

    fn binary(&mut self, op: pt::BinOp, l: &pt::Spanned<pt::Expr>, r: &pt::Spanned<pt::Expr>, line: usize) -> Result<AExpr, CompileError> {
        let le = self.expr(l)?;
        let re = self.expr(r)?;
        let lt = le.ty(self.reg);
        let rt = re.ty(self.reg);
        let mismatch = |ctx: &str| {
            self.err(line, SemanticErrorKind::TypeMismatch { context: ctx.to_string(), reason: "incompatible operand types".into() })
        };
        use pt::BinOp::*;
        match op {
            Add | Sub => {
                if matches!(self.reg.get(lt), SemType::Ptr { .. }) && self.reg.get(rt) == &SemType::Int {
                    Ok(AExpr::Binary(to_abinop(op), Box::new(le), Box::new(re), lt))
                } else if lt == rt && self.reg.is_int_or_float(lt) {
                    Ok(AExpr::Binary(to_abinop(op), Box::new(le), Box::new(re), lt))
                } else {
                    Err(mismatch("+/-"))
                }
            }
            Mul | Div => {
                if lt == rt && self.reg.is_int_or_float(lt) {
                    Ok(AExpr::Binary(to_abinop(op), Box::new(le), Box::new(re), lt))
                } else {
                    Err(mismatch("*//"))
                }
            }
            Eq | Ne | Lt | Le | Gt | Ge => {
                if lt == rt && self.reg.is_int_or_float(lt) {
                    Ok(AExpr::Binary(to_abinop(op), Box::new(le), Box::new(re), self.reg.bool_()))
                } else {
                    Err(mismatch("comparison"))
                }
            }
            And | Or => {
                if self.reg.is_bool(lt) && self.reg.is_bool(rt) {
                    Ok(AExpr::Binary(to_abinop(op), Box::new(le), Box::new(re), self.reg.bool_()))
                } else {
                    Err(mismatch("logical and/or"))
                }
            }
        }
    }
}

fn to_abinop(op: pt::BinOp) -> ABinOp {
    match op {
        pt::BinOp::Add => ABinOp::Add,
        pt::BinOp::Sub => ABinOp::Sub,
        pt::BinOp::Mul => ABinOp::Mul,
        pt::BinOp::Div => ABinOp::Div,
        pt::BinOp::Eq => ABinOp::Eq,
        pt::BinOp::Ne => ABinOp::Ne,
        pt::BinOp::Lt => ABinOp::Lt,
        pt::BinOp::Le => ABinOp::Le,
        pt::BinOp::Gt => ABinOp::Gt,
        pt::BinOp::Ge => ABinOp::Ge,
        pt::BinOp::And => ABinOp::And,
        pt::BinOp::Or => ABinOp::Or,
    }
}
