//! Component A — the constant pool (spec.md §4.A).

use std::collections::HashMap;
use std::rc::Rc;

use crate::diagnostic::CompileError;
use crate::linker::LinkedCode;

/// An immutable scalar or aggregate value interned by a [`ConstantPool`].
///
/// The enum variant itself is the "runtime-type-tag" spec.md requires: a
/// `Constant::Int(1)` and a `Constant::Float(1.0)` never collide because
/// they are different variants, regardless of numeric value.
#[derive(Clone, Debug)]
pub enum Constant {
    Int(i64),
    Float(f64),
    Bool(bool),
    None,
    Bytes(Vec<u8>),
    Str(String),
    /// A fully linked nested function or class body, embedded by value.
    Code(Rc<LinkedCode>),
}

impl PartialEq for Constant {
    fn eq(&self, other: &Self) -> bool {
        use Constant::*;
        match (self, other) {
            (Int(a), Int(b)) => a == b,
            // Compare by bit pattern, not numeric value: interning must be
            // a pure function of (type-tag, value), and NaN/−0.0 payloads
            // should round-trip exactly through the pool.
            (Float(a), Float(b)) => a.to_bits() == b.to_bits(),
            (Bool(a), Bool(b)) => a == b,
            (None, None) => true,
            (Bytes(a), Bytes(b)) => a == b,
            (Str(a), Str(b)) => a == b,
            (Code(a), Code(b)) => a == b,
            _ => false,
        }
    }
}
impl Eq for Constant {}

impl std::hash::Hash for Constant {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Constant::Int(v) => v.hash(state),
            Constant::Float(v) => v.to_bits().hash(state),
            Constant::Bool(v) => v.hash(state),
            Constant::None => {}
            Constant::Bytes(v) => v.hash(state),
            Constant::Str(v) => v.hash(state),
            Constant::Code(v) => v.hash(state),
        }
    }
}

/// An ordered, append-only sequence of [`Constant`]s plus a reverse map from
/// interning key to index (spec.md §3 "Constant Pool").
#[derive(Clone, Debug, Default)]
pub struct ConstantPool {
    values: Vec<Constant>,
    index: HashMap<Constant, u32>,
}

impl ConstantPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Intern `value`, returning its dense index. Idempotent: interning an
    /// equal key twice returns the same index without growing the pool.
    pub fn intern(&mut self, value: Constant) -> Result<u32, CompileError> {
        if let Some(&id) = self.index.get(&value) {
            return Ok(id);
        }
        let next = self.values.len();
        let id = u32::try_from(next)
            .map_err(|_| CompileError::encoding("constant pool exceeds representable indices"))?;
        self.index.insert(value.clone(), id);
        self.values.push(value);
        Ok(id)
    }

    pub fn get(&self, id: u32) -> Option<&Constant> {
        self.values.get(id as usize)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn values(&self) -> &[Constant] {
        &self.values
    }

    pub fn into_values(self) -> Vec<Constant> {
        self.values
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interning_is_idempotent() {
        let mut pool = ConstantPool::new();
        let a = pool.intern(Constant::Int(42)).unwrap();
        let b = pool.intern(Constant::Int(42)).unwrap();
        assert_eq!(a, b);
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn distinct_types_with_equal_payload_do_not_collide() {
        let mut pool = ConstantPool::new();
        let int_id = pool.intern(Constant::Int(1)).unwrap();
        let float_id = pool.intern(Constant::Float(1.0)).unwrap();
        assert_ne!(int_id, float_id);
        assert_eq!(pool.len(), 2);
    }

    #[test]
    fn indices_are_dense_and_assigned_in_first_insertion_order() {
        let mut pool = ConstantPool::new();
        let a = pool.intern(Constant::Str("a".into())).unwrap();
        let b = pool.intern(Constant::Str("b".into())).unwrap();
        let a_again = pool.intern(Constant::Str("a".into())).unwrap();
        assert_eq!((a, b, a_again), (0, 1, 0));
    }

    #[test]
    fn bool_and_none_are_distinct_from_int() {
        let mut pool = ConstantPool::new();
        let zero = pool.intern(Constant::Int(0)).unwrap();
        let false_id = pool.intern(Constant::Bool(false)).unwrap();
        let none_id = pool.intern(Constant::None).unwrap();
        assert_ne!(zero, false_id);
        assert_ne!(zero, none_id);
        assert_ne!(false_id, none_id);
    }
}
