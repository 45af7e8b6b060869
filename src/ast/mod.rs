//! Typed AST nodes (§3.4). Every expression carries its semantic type,
//! computed once at construction by the elaborator.

pub mod elaborate;

use crate::symtab::SymbolRef;
use crate::types::{TypeId, TypeRegistry};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnOp {
    Neg,
    Not,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
}

/// An l-value: symbol reference, array index, or dereference (§3.4).
/// Each tracks `is_const`, computed once at construction.
#[derive(Debug)]
pub enum LValue {
    Sym(SymbolRef),
    Index { base: Box<Expr>, index: Box<Expr>, elem_ty: TypeId, is_const: bool },
    Deref { ptr: Box<Expr>, pointee_ty: TypeId, is_const: bool },
}

impl LValue {
    #[must_use]
    pub fn ty(&self) -> TypeId {
        match self {
            LValue::Sym(s) => s.semtype,
            LValue::Index { elem_ty, .. } => *elem_ty,
            LValue::Deref { pointee_ty, .. } => *pointee_ty,
        }
    }

    #[must_use]
    pub fn is_const(&self) -> bool {
        match self {
            LValue::Sym(s) => s.is_const,
            LValue::Index { is_const, .. } | LValue::Deref { is_const, .. } => *is_const,
        }
    }
}

#[derive(Debug)]
pub enum Expr {
    IntLit(i64),
    FloatLit(f64),
    BoolLit(bool),
    StrLit(String),
    LValue(LValue),
    /// Address-of an l-value: `&lv`.
    Addr(Box<LValue>, TypeId),
    Unary(UnOp, Box<Expr>, TypeId),
    Binary(BinOp, Box<Expr>, Box<Expr>, TypeId),
    Ternary(Box<Expr>, Box<Expr>, Box<Expr>, TypeId),
    /// Direct call through a named function symbol.
    Call(SymbolRef, Vec<Expr>, TypeId),
    /// Indirect call through a function-pointer-valued expression.
    CallPtr(Box<Expr>, Vec<Expr>, TypeId),
}

impl Expr {
    #[must_use]
    pub fn ty(&self, reg: &TypeRegistry) -> TypeId {
        match self {
            Expr::IntLit(_) => reg.int(),
            Expr::FloatLit(_) => reg.float(),
            Expr::BoolLit(_) => reg.bool_(),
            Expr::StrLit(_) => reg.string(),
            Expr::LValue(lv) => lv.ty(),
            Expr::Addr(_, t)
            | Expr::Unary(_, _, t)
            | Expr::Binary(_, _, _, t)
            | Expr::Ternary(_, _, _, t)
            | Expr::Call(_, _, t)
            | Expr::CallPtr(_, _, t) => *t,
        }
    }
}

#[derive(Debug)]
pub enum Stmt {
    Assign(LValue, Expr),
    Print(Expr),
    Read(LValue),
    Compound(Vec<Stmt>),
    If(Expr, Box<Stmt>),
    IfElse(Expr, Box<Stmt>, Box<Stmt>),
    While(Expr, Box<Stmt>),
    DoWhile(Box<Stmt>, Expr),
    For(Option<Box<Stmt>>, Option<Expr>, Option<Box<Stmt>>, Box<Stmt>),
    Break,
    Continue,
    Return(Option<Expr>),
    /// A call used as a statement; the callee must return void (§4.3, §7).
    Call(Expr),
}

/// `check_return(body, ret_ty_is_void)` — §4.3. The `Compound` arm
/// deliberately preserves the source's "any sub-statement returns" rule,
/// which is unsound for non-void functions when a return precedes a
/// non-terminating branch (open question, §9: preserved rather than
/// silently corrected).
#[must_use]
pub fn check_return(stmt: &Stmt, is_void: bool) -> bool {
    match stmt {
        Stmt::Return(_) => true,
        Stmt::IfElse(_, t, f) => {
            if is_void {
                check_return(t, is_void) || check_return(f, is_void)
            } else {
                check_return(t, is_void) && check_return(f, is_void)
            }
        }
        Stmt::If(_, t) => {
            if is_void {
                check_return(t, is_void)
            } else {
                false
            }
        }
        Stmt::While(_, body) | Stmt::For(_, _, _, body) => {
            if is_void {
                check_return(body, is_void)
            } else {
                false
            }
        }
        Stmt::DoWhile(body, _) => check_return(body, is_void),
        Stmt::Compound(stmts) => stmts.iter().any(|s| check_return(s, is_void)),
        _ => false,
    }
}

#[derive(Debug)]
pub struct FuncDefn {
    pub sym: SymbolRef,
    pub params: Vec<SymbolRef>,
    pub ret_ty: TypeId,
    pub body: Stmt,
    /// Whether the body contains a reachable `return` (used to decide
    /// whether a void function needs a synthetic return label, §3.5).
    pub has_return: bool,
    pub line: usize,
}
