//! Tags for NaN-boxed values.
//!
//! A tag lives in the top 16 bits of a value. The reserved patterns all have
//! the exponent saturated, so they only ever overlay a NaN; any other pattern
//! is an ordinary number.

/// Placeholder discriminant; numbers have no reserved bit pattern.
const NUMBER: u16 = 0;

const PRIMITIVE: u16 = 0x7ff9;
const SYMBOL: u16 = 0x7ffa;
const STRING: u16 = 0x7ffb;
const CONS: u16 = 0x7ffc;
const CLOSURE: u16 = 0x7ffe;
const MACRO: u16 = 0x7fff;
const NIL: u16 = 0xffff;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u16)]
pub enum Tag {
    Number = NUMBER,
    Primitive = PRIMITIVE,
    Symbol = SYMBOL,
    String = STRING,
    Cons = CONS,
    Closure = CLOSURE,
    Macro = MACRO,
    Nil = NIL,
}

impl Tag {
    /// The raw 16-bit pattern for this tag.
    pub const fn bits(self) -> u16 {
        self as u16
    }

    /// Tags whose ordinal is a pool index: cons, closure, macro.
    pub fn is_pool_ref(self) -> bool {
        matches!(self, Tag::Cons | Tag::Closure | Tag::Macro)
    }

    /// Tags whose ordinal is a heap offset: symbol, string.
    pub fn is_heap_ref(self) -> bool {
        matches!(self, Tag::Symbol | Tag::String)
    }
}

impl From<u16> for Tag {
    fn from(value: u16) -> Self {
        match value {
            PRIMITIVE => Tag::Primitive,
            SYMBOL => Tag::Symbol,
            STRING => Tag::String,
            CONS => Tag::Cons,
            CLOSURE => Tag::Closure,
            MACRO => Tag::Macro,
            NIL => Tag::Nil,
            _ => Tag::Number,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Tag;

    #[test]
    fn reserved_patterns_round_trip() {
        for tag in [
            Tag::Primitive,
            Tag::Symbol,
            Tag::String,
            Tag::Cons,
            Tag::Closure,
            Tag::Macro,
            Tag::Nil,
        ] {
            assert_eq!(Tag::from(tag.bits()), tag);
        }
    }

    #[test]
    fn unreserved_patterns_are_numbers() {
        // The canonical quiet NaN, infinity, and the unused slot between cons and closure.
        for bits in [0x7ff8, 0x7ff0, 0xfff8, 0x7ffd, 0x4000, 0] {
            assert_eq!(Tag::from(bits), Tag::Number, "pattern {bits:#x}");
        }
    }
}
