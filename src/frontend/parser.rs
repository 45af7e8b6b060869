//! Recursive-descent parser from tokens to the typed parse tree (§6a).
//! Precedence, lowest to highest: `?:` (right), `||`, `&&`, equality,
//! relational, additive, multiplicative, unary, postfix, primary.

use crate::diagnostics::ParseError;
use crate::frontend::lexer::{lex, Tok, Token};
use crate::parse_tree::*;

pub struct Parser<'a> {
    toks: Vec<Token>,
    pos: usize,
    on_strlit: &'a mut dyn FnMut(&str),
}

pub fn parse_program(src: &str, on_strlit: &mut dyn FnMut(&str)) -> Result<Program, ParseError> {
    let toks = lex(src)?;
    let mut p = Parser { toks, pos: 0, on_strlit };
    p.program()
}

impl<'a> Parser<'a> {
    fn peek(&self) -> &Tok {
        &self.toks[self.pos].tok
    }
    fn line(&self) -> usize {
        self.toks[self.pos].line
    }
    fn advance(&mut self) -> Token {
        let t = self.toks[self.pos].clone();
        if self.pos + 1 < self.toks.len() {
            self.pos += 1;
        }
        t
    }
    fn err(&self, msg: impl Into<String>) -> ParseError {
        ParseError { line: self.line(), message: msg.into() }
    }
    fn expect_punct(&mut self, p: &'static str) -> Result<(), ParseError> {
        if self.peek() == &Tok::Punct(p) {
            self.advance();
            Ok(())
        } else {
            Err(self.err(format!("expected '{p}'")))
        }
    }
    fn expect_kw(&mut self, k: &'static str) -> Result<(), ParseError> {
        if self.peek() == &Tok::Kw(k) {
            self.advance();
            Ok(())
        } else {
            Err(self.err(format!("expected '{k}'")))
        }
    }
    fn eat_punct(&mut self, p: &'static str) -> bool {
        if self.peek() == &Tok::Punct(p) {
            self.advance();
            true
        } else {
            false
        }
    }
    fn eat_kw(&mut self, k: &'static str) -> bool {
        if self.peek() == &Tok::Kw(k) {
            self.advance();
            true
        } else {
            false
        }
    }
    fn ident(&mut self) -> Result<String, ParseError> {
        match self.peek().clone() {
            Tok::Ident(s) => {
                self.advance();
                Ok(s)
            }
            _ => Err(self.err("expected identifier")),
        }
    }

    fn prim_type(&mut self) -> Option<PrimType> {
        let t = match self.peek() {
            Tok::Kw("void") => PrimType::Void,
            Tok::Kw("bool") => PrimType::Bool,
            Tok::Kw("int") => PrimType::Int,
            Tok::Kw("float") => PrimType::Float,
            Tok::Kw("string") => PrimType::String,
            _ => return None,
        };
        self.advance();
        Some(t)
    }

    fn program(&mut self) -> Result<Program, ParseError> {
        let mut items = Vec::new();
        while self.peek() != &Tok::Eof {
            items.push(self.top_level()?);
        }
        Ok(Program { items })
    }

    fn top_level(&mut self) -> Result<TopLevel, ParseError> {
        let line = self.line();
        let base = self.prim_type().ok_or_else(|| self.err("expected a type"))?;
        let (modifiers, name) = self.declarator()?;
        if self.eat_punct("(") {
            let params = self.param_list()?;
            self.expect_punct(")")?;
            let body = self.stmt()?;
            return Ok(TopLevel::FuncDefn(FuncDefn { ret: base, ret_modifiers: modifiers, name, params, body, line }));
        }
        let mut declarators = vec![Declarator { modifiers, name, line }];
        while self.eat_punct(",") {
            let dline = self.line();
            let (m, n) = self.declarator()?;
            declarators.push(Declarator { modifiers: m, name: n, line: dline });
        }
        self.expect_punct(";")?;
        Ok(TopLevel::VarDecl { base, declarators })
    }

    /// Parses `*const* ... name [N][M]`, returning the modifier chain
    /// outermost-last (pointers first, then array dims) and the bound name.
    fn declarator(&mut self) -> Result<(Vec<Modifier>, String), ParseError> {
        let mut mods = Vec::new();
        while self.eat_punct("*") {
            let is_const = self.eat_kw("const");
            mods.push(Modifier::Ptr { is_const });
        }
        let name = self.ident()?;
        let mut dims = Vec::new();
        while self.eat_punct("[") {
            match self.peek().clone() {
                Tok::IntLit(n) => {
                    self.advance();
                    dims.push(n as usize);
                }
                _ => return Err(self.err("expected array length")),
            }
            self.expect_punct("]")?;
        }
        if !dims.is_empty() {
            mods.push(Modifier::Array(dims));
        }
        Ok((mods, name))
    }

    fn param_list(&mut self) -> Result<Vec<Param>, ParseError> {
        let mut params = Vec::new();
        if self.peek() == &Tok::Punct(")") {
            return Ok(params);
        }
        loop {
            let line = self.line();
            let base = self.prim_type().ok_or_else(|| self.err("expected a parameter type"))?;
            let mut modifiers = Vec::new();
            while self.eat_punct("*") {
                let is_const = self.eat_kw("const");
                modifiers.push(Modifier::Ptr { is_const });
            }
            let name = if let Tok::Ident(_) = self.peek() {
                Some(self.ident()?)
            } else {
                None
            };
            let mut dims = Vec::new();
            while self.eat_punct("[") {
                match self.peek().clone() {
                    Tok::IntLit(n) => {
                        self.advance();
                        dims.push(n as usize);
                    }
                    _ => return Err(self.err("expected array length")),
                }
                self.expect_punct("]")?;
            }
            if !dims.is_empty() {
                modifiers.push(Modifier::Array(dims));
            }
            params.push(Param { base, modifiers, name, line });
            if !self.eat_punct(",") {
                break;
            }
        }
        Ok(params)
    }

    fn stmt(&mut self) -> Result<Spanned<Stmt>, ParseError> {
        let line = self.line();
        if self.eat_punct("{") {
            let mut stmts = Vec::new();
            while self.peek() != &Tok::Punct("}") {
                stmts.push(self.stmt()?);
            }
            self.expect_punct("}")?;
            return Ok(Spanned::new(line, Stmt::Compound(stmts)));
        }
        if let Some(base) = self.prim_type() {
            let (m, n) = self.declarator()?;
            let mut declarators = vec![Declarator { modifiers: m, name: n, line }];
            while self.eat_punct(",") {
                let dline = self.line();
                let (m, n) = self.declarator()?;
                declarators.push(Declarator { modifiers: m, name: n, line: dline });
            }
            self.expect_punct(";")?;
            return Ok(Spanned::new(line, Stmt::Decl { base, declarators }));
        }
        if self.eat_kw("print") {
            let e = self.expr()?;
            self.expect_punct(";")?;
            return Ok(Spanned::new(line, Stmt::Print(e)));
        }
        if self.eat_kw("read") {
            let e = self.expr()?;
            self.expect_punct(";")?;
            return Ok(Spanned::new(line, Stmt::Read(e)));
        }
        if self.eat_kw("if") {
            self.expect_punct("(")?;
            let cond = self.expr()?;
            self.expect_punct(")")?;
            let then = Box::new(self.stmt()?);
            if self.eat_kw("else") {
                let els = Box::new(self.stmt()?);
                return Ok(Spanned::new(line, Stmt::IfElse(cond, then, els)));
            }
            return Ok(Spanned::new(line, Stmt::If(cond, then)));
        }
        if self.eat_kw("while") {
            self.expect_punct("(")?;
            let cond = self.expr()?;
            self.expect_punct(")")?;
            let body = Box::new(self.stmt()?);
            return Ok(Spanned::new(line, Stmt::While(cond, body)));
        }
        if self.eat_kw("do") {
            let body = Box::new(self.stmt()?);
            self.expect_kw("while")?;
            self.expect_punct("(")?;
            let cond = self.expr()?;
            self.expect_punct(")")?;
            self.expect_punct(";")?;
            return Ok(Spanned::new(line, Stmt::DoWhile(body, cond)));
        }
        if self.eat_kw("for") {
            self.expect_punct("(")?;
            let init = if self.peek() == &Tok::Punct(";") {
                None
            } else {
                Some(Box::new(self.simple_stmt_no_semi()?))
            };
            self.expect_punct(";")?;
            let cond = if self.peek() == &Tok::Punct(";") { None } else { Some(self.expr()?) };
            self.expect_punct(";")?;
            let inc = if self.peek() == &Tok::Punct(")") {
                None
            } else {
                Some(Box::new(self.simple_stmt_no_semi()?))
            };
            self.expect_punct(")")?;
            let body = Box::new(self.stmt()?);
            return Ok(Spanned::new(line, Stmt::For(init, cond, inc, body)));
        }
        if self.eat_kw("break") {
            self.expect_punct(";")?;
            return Ok(Spanned::new(line, Stmt::Break));
        }
        if self.eat_kw("continue") {
            self.expect_punct(";")?;
            return Ok(Spanned::new(line, Stmt::Continue));
        }
        if self.eat_kw("return") {
            let e = if self.peek() == &Tok::Punct(";") { None } else { Some(self.expr()?) };
            self.expect_punct(";")?;
            return Ok(Spanned::new(line, Stmt::Return(e)));
        }
        let s = self.simple_stmt_no_semi()?;
        self.expect_punct(";")?;
        Ok(s)
    }

    /// An assignment or a bare call, without the trailing `;` — shared by
    /// ordinary statements and `for`'s init/increment clauses.
    fn simple_stmt_no_semi(&mut self) -> Result<Spanned<Stmt>, ParseError> {
        let line = self.line();
        let e = self.expr()?;
        if self.eat_punct("=") {
            let rhs = self.expr()?;
            return Ok(Spanned::new(line, Stmt::Assign(e, rhs)));
        }
        if let Expr::Call(name, args) = e.node {
            return Ok(Spanned::new(line, Stmt::Call(name, args)));
        }
        Err(self.err("expected assignment or call statement"))
    }

    fn expr(&mut self) -> Result<Spanned<Expr>, ParseError> {
        self.ternary()
    }

    fn ternary(&mut self) -> Result<Spanned<Expr>, ParseError> {
        let line = self.line();
        let cond = self.logic_or()?;
        if self.eat_punct("?") {
            let t = self.expr()?;
            self.expect_punct(":")?;
            let f = self.ternary()?;
            return Ok(Spanned::new(line, Expr::Ternary(Box::new(cond), Box::new(t), Box::new(f))));
        }
        Ok(cond)
    }

    fn logic_or(&mut self) -> Result<Spanned<Expr>, ParseError> {
        let mut lhs = self.logic_and()?;
        while self.eat_punct("||") {
            let line = self.line();
            let rhs = self.logic_and()?;
            lhs = Spanned::new(line, Expr::Binary(BinOp::Or, Box::new(lhs), Box::new(rhs)));
        }
        Ok(lhs)
    }

    fn logic_and(&mut self) -> Result<Spanned<Expr>, ParseError> {
        let mut lhs = self.equality()?;
        while self.eat_punct("&&") {
            let line = self.line();
            let rhs = self.equality()?;
            lhs = Spanned::new(line, Expr::Binary(BinOp::And, Box::new(lhs), Box::new(rhs)));
        }
        Ok(lhs)
    }

    fn equality(&mut self) -> Result<Spanned<Expr>, ParseError> {
        let mut lhs = self.relational()?;
        loop {
            let op = if self.eat_punct("==") {
                BinOp::Eq
            } else if self.eat_punct("!=") {
                BinOp::Ne
            } else {
                break;
            };
            let line = self.line();
            let rhs = self.relational()?;
            lhs = Spanned::new(line, Expr::Binary(op, Box::new(lhs), Box::new(rhs)));
        }
        Ok(lhs)
    }

    fn relational(&mut self) -> Result<Spanned<Expr>, ParseError> {
        let mut lhs = self.additive()?;
        loop {
            let op = if self.eat_punct("<=") {
                BinOp::Le
            } else if self.eat_punct(">=") {
                BinOp::Ge
            } else if self.eat_punct("<") {
                BinOp::Lt
            } else if self.eat_punct(">") {
                BinOp::Gt
            } else {
                break;
            };
            let line = self.line();
            let rhs = self.additive()?;
            lhs = Spanned::new(line, Expr::Binary(op, Box::new(lhs), Box::new(rhs)));
        }
        Ok(lhs)
    }

    fn additive(&mut self) -> Result<Spanned<Expr>, ParseError> {
        let mut lhs = self.multiplicative()?;
        loop {
            let op = if self.eat_punct("+") {
                BinOp::Add
            } else if self.eat_punct("-") {
                BinOp::Sub
            } else {
                break;
            };
            let line = self.line();
            let rhs = self.multiplicative()?;
            lhs = Spanned::new(line, Expr::Binary(op, Box::new(lhs), Box::new(rhs)));
        }
        Ok(lhs)
    }

    fn multiplicative(&mut self) -> Result<Spanned<Expr>, ParseError> {
        let mut lhs = self.unary()?;
        loop {
            let op = if self.eat_punct("*") {
                BinOp::Mul
            } else if self.eat_punct("/") {
                BinOp::Div
            } else {
                break;
            };
            let line = self.line();
            let rhs = self.unary()?;
            lhs = Spanned::new(line, Expr::Binary(op, Box::new(lhs), Box::new(rhs)));
        }
        Ok(lhs)
    }

    fn unary(&mut self) -> Result<Spanned<Expr>, ParseError> {
        let line = self.line();
        if self.eat_punct("-") {
            let e = self.unary()?;
            return Ok(Spanned::new(line, Expr::Unary(UnOp::Neg, Box::new(e))));
        }
        if self.eat_punct("!") {
            let e = self.unary()?;
            return Ok(Spanned::new(line, Expr::Unary(UnOp::Not, Box::new(e))));
        }
        if self.eat_punct("*") {
            let e = self.unary()?;
            return Ok(Spanned::new(line, Expr::Unary(UnOp::Deref, Box::new(e))));
        }
        if self.eat_punct("&") {
            let e = self.unary()?;
            return Ok(Spanned::new(line, Expr::Unary(UnOp::Addr, Box::new(e))));
        }
        self.postfix()
    }

    fn postfix(&mut self) -> Result<Spanned<Expr>, ParseError> {
        let mut e = self.primary()?;
        loop {
            let line = self.line();
            if self.eat_punct("[") {
                let idx = self.expr()?;
                self.expect_punct("]")?;
                e = Spanned::new(line, Expr::Index(Box::new(e), Box::new(idx)));
            } else if self.eat_punct("(") {
                let args = self.arg_list()?;
                self.expect_punct(")")?;
                e = match e.node {
                    Expr::Ident(name) => Spanned::new(line, Expr::Call(name, args)),
                    other => Spanned::new(line, Expr::CallPtr(Box::new(Spanned::new(e.line, other)), args)),
                };
            } else {
                break;
            }
        }
        Ok(e)
    }

    fn arg_list(&mut self) -> Result<Vec<Spanned<Expr>>, ParseError> {
        let mut args = Vec::new();
        if self.peek() == &Tok::Punct(")") {
            return Ok(args);
        }
        loop {
            args.push(self.expr()?);
            if !self.eat_punct(",") {
                break;
            }
        }
        Ok(args)
    }

    fn primary(&mut self) -> Result<Spanned<Expr>, ParseError> {
        let line = self.line();
        match self.peek().clone() {
            Tok::IntLit(n) => {
                self.advance();
                Ok(Spanned::new(line, Expr::IntLit(n)))
            }
            Tok::FloatLit(n) => {
                self.advance();
                Ok(Spanned::new(line, Expr::FloatLit(n)))
            }
            Tok::StrLit(s) => {
                self.advance();
                (self.on_strlit)(&s);
                Ok(Spanned::new(line, Expr::StrLit(s)))
            }
            Tok::Kw("true") => {
                self.advance();
                Ok(Spanned::new(line, Expr::BoolLit(true)))
            }
            Tok::Kw("false") => {
                self.advance();
                Ok(Spanned::new(line, Expr::BoolLit(false)))
            }
            Tok::Ident(name) => {
                self.advance();
                Ok(Spanned::new(line, Expr::Ident(name)))
            }
            Tok::Punct("(") => {
                self.advance();
                let e = self.expr()?;
                self.expect_punct(")")?;
                Ok(e)
            }
            _ => Err(self.err("expected an expression")),
        }
    }
}
