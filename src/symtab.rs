//! Lexically scoped bindings from identifiers to typed symbols (§3.3, §4.2).

use std::rc::Rc;

use hashbrown::HashMap;

use crate::diagnostics::SymbolError;
use crate::types::TypeId;

/// `{name, semtype, is_const, is_global}` — shared by handle across the
/// symbol table, the AST and every IR context.
#[derive(Debug)]
pub struct Symbol {
    pub name: String,
    pub semtype: TypeId,
    pub is_const: bool,
    pub is_global: bool,
}

pub type SymbolRef = Rc<Symbol>;

struct Scope {
    vars: HashMap<String, SymbolRef>,
    funcs: HashMap<String, SymbolRef>,
}

impl Scope {
    fn new() -> Self {
        Scope { vars: HashMap::new(), funcs: HashMap::new() }
    }
}

/// A stack of scope nodes rooted at the global scope.
pub struct SymbolTable {
    scopes: Vec<Scope>,
}

impl SymbolTable {
    #[must_use]
    pub fn new() -> Self {
        SymbolTable { scopes: vec![Scope::new()] }
    }

    pub fn begin_scope(&mut self) {
        self.scopes.push(Scope::new());
    }

    pub fn end_scope(&mut self) {
        assert!(self.scopes.len() > 1, "cannot pop the global scope");
        self.scopes.pop();
    }

    #[must_use]
    pub fn is_global_scope(&self) -> bool {
        self.scopes.len() == 1
    }

    /// Lexical lookup of a variable, walking parents.
    #[must_use]
    pub fn get_var(&self, name: &str) -> Option<SymbolRef> {
        self.scopes.iter().rev().find_map(|s| s.vars.get(name).cloned())
    }

    /// Lexical lookup of a function, walking parents.
    #[must_use]
    pub fn get_func(&self, name: &str) -> Option<SymbolRef> {
        self.scopes.iter().rev().find_map(|s| s.funcs.get(name).cloned())
    }

    /// Either namespace, variable first then function, matching the
    /// original's per-scope-level lookup order.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<SymbolRef> {
        for scope in self.scopes.iter().rev() {
            if let Some(s) = scope.vars.get(name) {
                return Some(s.clone());
            }
            if let Some(s) = scope.funcs.get(name) {
                return Some(s.clone());
            }
        }
        None
    }

    /// Insert a variable into the current scope.
    pub fn put_var(&mut self, name: String, semtype: TypeId, is_const: bool) -> Result<SymbolRef, SymbolError> {
        let is_global = self.is_global_scope();
        let cur = self.scopes.last_mut().expect("at least one scope");
        if cur.vars.contains_key(&name) {
            return Err(SymbolError::VarRedeclared(name));
        }
        if cur.funcs.contains_key(&name) {
            return Err(SymbolError::VarShadowsFunc(name));
        }
        let sym = Rc::new(Symbol { name: name.clone(), semtype, is_const, is_global });
        cur.vars.insert(name, sym.clone());
        Ok(sym)
    }

    /// Insert a function into the current scope. Re-declaration with an
    /// identical signature returns the existing handle (§3.3).
    pub fn put_func(&mut self, name: String, semtype: TypeId, types_equal: impl Fn(TypeId, TypeId) -> bool) -> Result<SymbolRef, SymbolError> {
        let is_global = self.is_global_scope();
        let cur = self.scopes.last_mut().expect("at least one scope");
        if let Some(existing) = cur.funcs.get(&name) {
            return if types_equal(existing.semtype, semtype) {
                Ok(existing.clone())
            } else {
                Err(SymbolError::FuncRedeclaredDifferentSignature(name))
            };
        }
        if cur.vars.contains_key(&name) {
            return Err(SymbolError::FuncShadowsVar(name));
        }
        let sym = Rc::new(Symbol { name: name.clone(), semtype, is_const: true, is_global });
        cur.funcs.insert(name, sym.clone());
        Ok(sym)
    }

    /// The root scope's variable list, used to emit the data segment (§4.6).
    #[must_use]
    pub fn globals(&self) -> Vec<SymbolRef> {
        self.scopes[0].vars.values().cloned().collect()
    }
}

impl Default for SymbolTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TypeRegistry;

    #[test]
    fn scope_layering_hides_inner_bindings() {
        let reg = TypeRegistry::new();
        let mut tab = SymbolTable::new();
        tab.begin_scope();
        tab.put_var("x".into(), reg.int(), false).unwrap();
        assert!(tab.get_var("x").is_some());
        tab.end_scope();
        assert!(tab.get_var("x").is_none());
    }

    #[test]
    fn function_redeclaration_same_signature_returns_existing() {
        let mut reg = TypeRegistry::new();
        let mut tab = SymbolTable::new();
        let sig = reg.make_func(reg.void(), vec![]).unwrap();
        let f1 = tab.put_func("f".into(), sig, |a, b| a == b).unwrap();
        let f2 = tab.put_func("f".into(), sig, |a, b| a == b).unwrap();
        assert!(Rc::ptr_eq(&f1, &f2));
    }

    #[test]
    fn function_redeclaration_different_signature_fails() {
        let mut reg = TypeRegistry::new();
        let mut tab = SymbolTable::new();
        let sig1 = reg.make_func(reg.void(), vec![]).unwrap();
        let sig2 = reg.make_func(reg.int(), vec![]).unwrap();
        tab.put_func("f".into(), sig1, |a, b| a == b).unwrap();
        assert!(tab.put_func("f".into(), sig2, |a, b| a == b).is_err());
    }

    #[test]
    fn var_collides_with_func_in_same_scope() {
        let mut reg = TypeRegistry::new();
        let mut tab = SymbolTable::new();
        let sig = reg.make_func(reg.void(), vec![]).unwrap();
        tab.put_func("f".into(), sig, |a, b| a == b).unwrap();
        assert!(tab.put_var("f".into(), reg.int(), false).is_err());
    }

    #[test]
    fn globals_reflects_root_scope_only() {
        let reg = TypeRegistry::new();
        let mut tab = SymbolTable::new();
        tab.put_var("g".into(), reg.int(), false).unwrap();
        tab.begin_scope();
        tab.put_var("local".into(), reg.int(), false).unwrap();
        assert_eq!(tab.globals().len(), 1);
    }
}
