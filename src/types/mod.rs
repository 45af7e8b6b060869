//! The hash-consed catalogue of semantic types (§4.1).
//!
//! Types are stored in a flat, append-only `Vec` and deduplicated by a
//! linear-scan cache per constructor kind, mirroring the original's
//! `make_ptr`/`make_array`/`make_func` caches: the cache sizes in practice
//! never justify a hash map, so identity comparison of the interned
//! `TypeId` is cheap and exact. Slots are addressed by index, not by
//! reference, so the registry never needs to pin storage addresses.

use crate::diagnostics::TypeError;

/// An index into the registry. Two `TypeId`s are equal iff the types they
/// name were built from equal components (hash-consing).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TypeId(u32);

/// A TAC-level type tag: the coarser classification that scalars lower to.
/// Array and Func both lower to `Ptr`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TacType {
    Bool,
    Int,
    Float,
    String,
    Ptr,
}

impl TacType {
    #[must_use]
    pub fn size(self) -> usize {
        match self {
            TacType::Bool | TacType::Int | TacType::String | TacType::Ptr => 4,
            TacType::Float => 8,
        }
    }
}

/// A semantic type. `Func`/`Array` store `TypeId`s, so the whole catalogue
/// is one self-referential, append-only structure.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SemType {
    Void,
    Bool,
    Int,
    Float,
    String,
    Ptr { target: TypeId, target_is_const: bool },
    Array { element: TypeId, length: usize },
    Func { ret: TypeId, params: Vec<TypeId> },
}

pub struct TypeRegistry {
    slots: Vec<SemType>,
    void: TypeId,
    bool_: TypeId,
    int: TypeId,
    float: TypeId,
    string: TypeId,
    ptr_cache: Vec<TypeId>,
    array_cache: Vec<TypeId>,
    func_cache: Vec<TypeId>,
}

impl TypeRegistry {
    #[must_use]
    pub fn new() -> Self {
        let mut reg = TypeRegistry {
            slots: Vec::new(),
            void: TypeId(0),
            bool_: TypeId(0),
            int: TypeId(0),
            float: TypeId(0),
            string: TypeId(0),
            ptr_cache: Vec::new(),
            array_cache: Vec::new(),
            func_cache: Vec::new(),
        };
        reg.void = reg.push(SemType::Void);
        reg.bool_ = reg.push(SemType::Bool);
        reg.int = reg.push(SemType::Int);
        reg.float = reg.push(SemType::Float);
        reg.string = reg.push(SemType::String);
        reg
    }

    fn push(&mut self, t: SemType) -> TypeId {
        self.slots.push(t);
        TypeId(self.slots.len() as u32 - 1)
    }

    #[must_use]
    pub fn get(&self, id: TypeId) -> &SemType {
        &self.slots[id.0 as usize]
    }

    #[must_use]
    pub fn void(&self) -> TypeId {
        self.void
    }
    #[must_use]
    pub fn bool_(&self) -> TypeId {
        self.bool_
    }
    #[must_use]
    pub fn int(&self) -> TypeId {
        self.int
    }
    #[must_use]
    pub fn float(&self) -> TypeId {
        self.float
    }
    #[must_use]
    pub fn string(&self) -> TypeId {
        self.string
    }

    #[must_use]
    pub fn is_void(&self, id: TypeId) -> bool {
        matches!(self.get(id), SemType::Void)
    }
    #[must_use]
    pub fn is_func(&self, id: TypeId) -> bool {
        matches!(self.get(id), SemType::Func { .. })
    }
    #[must_use]
    pub fn is_array(&self, id: TypeId) -> bool {
        matches!(self.get(id), SemType::Array { .. })
    }

    pub fn make_ptr(&mut self, target: TypeId, target_is_const: bool) -> TypeId {
        for &id in &self.ptr_cache {
            if let SemType::Ptr { target: t, target_is_const: c } = self.get(id) {
                if *t == target && *c == target_is_const {
                    return id;
                }
            }
        }
        let id = self.push(SemType::Ptr { target, target_is_const });
        self.ptr_cache.push(id);
        id
    }

    pub fn make_array(&mut self, element: TypeId, length: usize) -> Result<TypeId, TypeError> {
        if self.is_void(element) {
            return Err(TypeError::VoidArrayElement);
        }
        if self.is_func(element) {
            return Err(TypeError::FuncArrayElement);
        }
        if length == 0 {
            return Err(TypeError::ZeroLengthArray);
        }
        for &id in &self.array_cache {
            if let SemType::Array { element: e, length: n } = self.get(id) {
                if *e == element && *n == length {
                    return Ok(id);
                }
            }
        }
        let id = self.push(SemType::Array { element, length });
        self.array_cache.push(id);
        Ok(id)
    }

    pub fn make_func(&mut self, ret: TypeId, params: Vec<TypeId>) -> Result<TypeId, TypeError> {
        if self.is_func(ret) {
            return Err(TypeError::FuncReturningFunc);
        }
        if self.is_array(ret) {
            return Err(TypeError::FuncReturningArray);
        }
        if params.iter().any(|&p| self.is_func(p)) {
            return Err(TypeError::FuncParamIsFunc);
        }
        for &id in &self.func_cache {
            if let SemType::Func { ret: r, params: ps } = self.get(id) {
                if *r == ret && *ps == params {
                    return Ok(id);
                }
            }
        }
        let id = self.push(SemType::Func { ret, params });
        self.func_cache.push(id);
        Ok(id)
    }

    /// Size in bytes; `Void`/`Func` are never measured (§3.1).
    #[must_use]
    pub fn size(&self, id: TypeId) -> usize {
        match self.get(id) {
            SemType::Void | SemType::Func { .. } => unreachable!("size of void/func is undefined"),
            SemType::Bool | SemType::Int | SemType::String | SemType::Ptr { .. } => 4,
            SemType::Float => 8,
            SemType::Array { element, length } => self.size(*element) * *length,
        }
    }

    #[must_use]
    pub fn to_tac_type(&self, id: TypeId) -> TacType {
        match self.get(id) {
            SemType::Bool => TacType::Bool,
            SemType::Int => TacType::Int,
            SemType::Float => TacType::Float,
            SemType::String => TacType::String,
            SemType::Ptr { .. } | SemType::Array { .. } | SemType::Func { .. } => TacType::Ptr,
            SemType::Void => unreachable!("void has no TAC type"),
        }
    }

    /// `assign(lhs, rhs)` — §4.1.
    #[must_use]
    pub fn assignable(&self, lhs: TypeId, rhs: TypeId) -> bool {
        if self.is_void(lhs) || self.is_void(rhs) {
            return false;
        }
        if self.is_array(lhs) || self.is_func(lhs) {
            return false;
        }
        if let SemType::Ptr { target: lt, target_is_const: lc } = self.get(lhs) {
            return if let SemType::Ptr { target: rt, target_is_const: rc } = self.get(rhs) {
                lt == rt && (*lc || !*rc)
            } else {
                false
            };
        }
        lhs == rhs
    }

    /// Element type of an array-or-pointer indexing expression (§4.1, `Array` row).
    #[must_use]
    pub fn index_result(&self, base: TypeId) -> Option<TypeId> {
        match self.get(base) {
            SemType::Array { element, .. } => Some(*element),
            SemType::Ptr { target, .. } => Some(*target),
            _ => None,
        }
    }

    /// Pointee type of a pointer, for `Deref`.
    #[must_use]
    pub fn deref_result(&self, ptr: TypeId) -> Option<TypeId> {
        match self.get(ptr) {
            SemType::Ptr { target, .. } => Some(*target),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_int_or_float(&self, id: TypeId) -> bool {
        matches!(self.get(id), SemType::Int | SemType::Float)
    }
    #[must_use]
    pub fn is_bool(&self, id: TypeId) -> bool {
        matches!(self.get(id), SemType::Bool)
    }

    #[must_use]
    pub fn func_params(&self, id: TypeId) -> &[TypeId] {
        match self.get(id) {
            SemType::Func { params, .. } => params,
            _ => &[],
        }
    }
    #[must_use]
    pub fn func_ret(&self, id: TypeId) -> TypeId {
        match self.get(id) {
            SemType::Func { ret, .. } => *ret,
            _ => unreachable!("func_ret on non-function type"),
        }
    }
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pointers_with_equal_components_are_interned() {
        let mut reg = TypeRegistry::new();
        let p1 = reg.make_ptr(reg.int(), false);
        let p2 = reg.make_ptr(reg.int(), false);
        assert_eq!(p1, p2);
        let p3 = reg.make_ptr(reg.int(), true);
        assert_ne!(p1, p3);
    }

    #[test]
    fn assignability_asymmetry() {
        let mut reg = TypeRegistry::new();
        let const_ptr = reg.make_ptr(reg.int(), true);
        let mut_ptr = reg.make_ptr(reg.int(), false);
        assert!(reg.assignable(const_ptr, mut_ptr));
        assert!(!reg.assignable(mut_ptr, const_ptr));
    }

    #[test]
    fn zero_length_array_rejected() {
        let mut reg = TypeRegistry::new();
        let int = reg.int();
        assert_eq!(reg.make_array(int, 0), Err(TypeError::ZeroLengthArray));
        assert!(reg.make_array(int, 10).is_ok());
    }

    #[test]
    fn array_of_function_rejected() {
        let mut reg = TypeRegistry::new();
        let f = reg.make_func(reg.void(), vec![]).unwrap();
        assert_eq!(reg.make_array(f, 4), Err(TypeError::FuncArrayElement));
    }

    #[test]
    fn function_returning_function_rejected() {
        let mut reg = TypeRegistry::new();
        let f = reg.make_func(reg.void(), vec![]).unwrap();
        assert_eq!(reg.make_func(f, vec![]), Err(TypeError::FuncReturningFunc));
    }
}
