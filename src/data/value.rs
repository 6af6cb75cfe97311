use super::Tag;

/// A NaN-boxed Lisp value.
///
/// Every value is the bit pattern of an `f64`. Ordinary numbers are stored as
/// themselves; everything else is a reserved NaN whose top 16 bits are a
/// [`Tag`] and whose low 32 bits are an ordinal:
/// - a cell index into the pool, for cons, closure and macro values;
/// - a byte offset into the heap, for symbols and strings;
/// - an index into the primitive table, for primitives.
///
/// Equality is bit equality. Symbols are interned, so two symbols are equal
/// exactly when they name the same heap record.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Value(u64);

/// The decoded form of a [`Value`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Object {
    Number(f64),
    Primitive(u32),
    Symbol(u32),
    String(u32),
    Pair(u32),
    Closure(u32),
    Macro(u32),
    Nil,
}

impl Value {
    const TAG_SHIFT: u32 = 48;

    /// The empty list.
    pub const NIL: Value = Value::boxed(Tag::Nil, 0);

    /// Builds a tagged value. `tag` must not be [`Tag::Number`].
    pub const fn boxed(tag: Tag, ordinal: u32) -> Self {
        Value(((tag.bits() as u64) << Self::TAG_SHIFT) | ordinal as u64)
    }

    /// Builds a number.
    ///
    /// NaN results of arithmetic may carry an arbitrary payload, which could
    /// collide with a reserved tag; they are replaced by the canonical NaN.
    pub fn number(n: f64) -> Self {
        if n.is_nan() {
            Value(f64::NAN.to_bits())
        } else {
            Value(n.to_bits())
        }
    }

    pub const fn from_bits(bits: u64) -> Self {
        Value(bits)
    }

    pub const fn bits(self) -> u64 {
        self.0
    }

    pub fn tag(self) -> Tag {
        Tag::from((self.0 >> Self::TAG_SHIFT) as u16)
    }

    pub const fn ordinal(self) -> u32 {
        self.0 as u32
    }

    /// Replaces the ordinal, keeping the tag.
    pub(crate) fn with_ordinal(self, ordinal: u32) -> Self {
        Value((self.0 & !(u32::MAX as u64)) | ordinal as u64)
    }

    pub fn is_nil(self) -> bool {
        self.tag() == Tag::Nil
    }

    /// True only for cons cells; closures and macros are not lists.
    pub fn is_cons(self) -> bool {
        self.tag() == Tag::Cons
    }

    pub fn is_symbol(self) -> bool {
        self.tag() == Tag::Symbol
    }

    pub fn is_string(self) -> bool {
        self.tag() == Tag::String
    }

    pub fn is_number(self) -> bool {
        self.tag() == Tag::Number
    }

    pub fn as_number(self) -> Option<f64> {
        match self.tag() {
            Tag::Number => Some(f64::from_bits(self.0)),
            _ => None,
        }
    }

    pub fn decode(self) -> Object {
        let ordinal = self.ordinal();
        match self.tag() {
            Tag::Number => Object::Number(f64::from_bits(self.0)),
            Tag::Primitive => Object::Primitive(ordinal),
            Tag::Symbol => Object::Symbol(ordinal),
            Tag::String => Object::String(ordinal),
            Tag::Cons => Object::Pair(ordinal),
            Tag::Closure => Object::Closure(ordinal),
            Tag::Macro => Object::Macro(ordinal),
            Tag::Nil => Object::Nil,
        }
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::number(value)
    }
}

impl From<Object> for Value {
    fn from(value: Object) -> Self {
        match value {
            Object::Number(n) => Value::number(n),
            Object::Primitive(i) => Value::boxed(Tag::Primitive, i),
            Object::Symbol(i) => Value::boxed(Tag::Symbol, i),
            Object::String(i) => Value::boxed(Tag::String, i),
            Object::Pair(i) => Value::boxed(Tag::Cons, i),
            Object::Closure(i) => Value::boxed(Tag::Closure, i),
            Object::Macro(i) => Value::boxed(Tag::Macro, i),
            Object::Nil => Value::NIL,
        }
    }
}

impl std::fmt::Debug for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.decode() {
            Object::Number(n) => write!(f, "{n}"),
            Object::Primitive(i) => write!(f, "prim#{i}"),
            Object::Symbol(i) => write!(f, "sym#{i}"),
            Object::String(i) => write!(f, "str#{i}"),
            Object::Pair(i) => write!(f, "cons#{i}"),
            Object::Closure(i) => write!(f, "clos#{i}"),
            Object::Macro(i) => write!(f, "macr#{i}"),
            Object::Nil => write!(f, "nil"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn boxed_values_decode() {
        for (object, tag) in [
            (Object::Primitive(3), Tag::Primitive),
            (Object::Symbol(65540), Tag::Symbol),
            (Object::String(u32::MAX), Tag::String),
            (Object::Pair(0), Tag::Cons),
            (Object::Closure(8190), Tag::Closure),
            (Object::Macro(2), Tag::Macro),
            (Object::Nil, Tag::Nil),
        ] {
            let v = Value::from(object);
            assert_eq!(v.tag(), tag);
            assert_eq!(v.decode(), object);
        }
    }

    #[test]
    fn numbers_pass_through() {
        for n in [0.0, -0.0, 1.5, -1e300, f64::INFINITY, f64::NEG_INFINITY] {
            let v = Value::number(n);
            assert!(v.is_number());
            assert_eq!(v.as_number().map(f64::to_bits), Some(n.to_bits()));
        }
    }

    #[test]
    fn nan_payloads_cannot_forge_tags() {
        // A NaN whose payload looks like a symbol reference.
        let forged = f64::from_bits(Value::boxed(Tag::Symbol, 12).bits());
        assert!(forged.is_nan());
        let v = Value::number(forged + 1.0);
        assert_eq!(v.tag(), Tag::Number);
        assert!(v.as_number().is_some_and(f64::is_nan));
    }

    #[test]
    fn equality_is_bitwise() {
        assert_eq!(Value::number(2.0), Value::number(2.0));
        assert_ne!(Value::number(0.0), Value::number(-0.0));
        assert_eq!(Value::number(f64::NAN), Value::number(f64::NAN));
        assert_ne!(
            Value::boxed(Tag::Symbol, 8),
            Value::boxed(Tag::String, 8)
        );
    }

    #[test]
    fn with_ordinal_keeps_tag() {
        let v = Value::boxed(Tag::Closure, 10).with_ordinal(42);
        assert_eq!(v.decode(), Object::Closure(42));
    }
}
