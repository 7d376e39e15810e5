//! Built-in type enumeration.
//!
//! The enumeration order *is* the promotion rank: inference's
//! `common_type` picks the type with the larger discriminant, and the
//! `UInt8..UInt64 <-> Int8..Int64` pairing used for signed/unsigned
//! conversion relies on the two blocks being the same length and
//! adjacent, in this order.

use std::cmp::Ordering;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum TypeKind {
    Unknown,
    Void,
    Bool,
    UInt8,
    UInt16,
    UInt32,
    UInt64,
    Int8,
    Int16,
    Int32,
    Int64,
    Float32,
    Float64,
    SoftFloat64,
}

/// Offset between the start of the unsigned int block (`UInt8`) and the
/// start of the signed int block (`Int8`) in `TypeKind`'s declaration
/// order. Every `UInt*` kind maps to its signed sibling by this fixed
/// offset.
const SIGNED_UNSIGNED_OFFSET: u8 = TypeKind::Int8 as u8 - TypeKind::UInt8 as u8;

impl TypeKind {
    pub fn is_int(self) -> bool {
        matches!(
            self,
            TypeKind::UInt8
                | TypeKind::UInt16
                | TypeKind::UInt32
                | TypeKind::UInt64
                | TypeKind::Int8
                | TypeKind::Int16
                | TypeKind::Int32
                | TypeKind::Int64
        )
    }

    pub fn is_unsigned(self) -> bool {
        matches!(
            self,
            TypeKind::UInt8 | TypeKind::UInt16 | TypeKind::UInt32 | TypeKind::UInt64
        )
    }

    pub fn is_float(self) -> bool {
        matches!(
            self,
            TypeKind::Float32 | TypeKind::Float64 | TypeKind::SoftFloat64
        )
    }

    pub fn is_bool(self) -> bool {
        matches!(self, TypeKind::Bool)
    }

    pub fn size_bytes(self) -> u32 {
        match self {
            TypeKind::Unknown | TypeKind::Void => 0,
            TypeKind::Bool | TypeKind::UInt8 | TypeKind::Int8 => 1,
            TypeKind::UInt16 | TypeKind::Int16 => 2,
            TypeKind::UInt32 | TypeKind::Int32 | TypeKind::Float32 => 4,
            TypeKind::UInt64 | TypeKind::Int64 | TypeKind::Float64 | TypeKind::SoftFloat64 => 8,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            TypeKind::Unknown => "Unknown",
            TypeKind::Void => "Void",
            TypeKind::Bool => "Bool",
            TypeKind::UInt8 => "UInt8",
            TypeKind::UInt16 => "UInt16",
            TypeKind::UInt32 => "UInt32",
            TypeKind::UInt64 => "UInt64",
            TypeKind::Int8 => "Int8",
            TypeKind::Int16 => "Int16",
            TypeKind::Int32 => "Int32",
            TypeKind::Int64 => "Int64",
            TypeKind::Float32 => "Float32",
            TypeKind::Float64 => "Float64",
            TypeKind::SoftFloat64 => "SoftFloat64",
        }
    }

    /// The signed sibling of an unsigned int kind (`UInt32` -> `Int32`).
    /// Panics if `self` is not an unsigned int kind.
    pub fn to_signed(self) -> TypeKind {
        assert!(self.is_unsigned(), "{self:?} has no signed sibling");
        let idx = self as u8 + SIGNED_UNSIGNED_OFFSET;
        // Safety net: these are the only values `idx` can land on given
        // the assert above, so a match is clearer than transmute.
        match idx {
            x if x == TypeKind::Int8 as u8 => TypeKind::Int8,
            x if x == TypeKind::Int16 as u8 => TypeKind::Int16,
            x if x == TypeKind::Int32 as u8 => TypeKind::Int32,
            x if x == TypeKind::Int64 as u8 => TypeKind::Int64,
            _ => unreachable!(),
        }
    }

    /// The unsigned sibling of a signed int kind (`Int32` -> `UInt32`).
    pub fn to_unsigned(self) -> TypeKind {
        assert!(
            self.is_int() && !self.is_unsigned(),
            "{self:?} has no unsigned sibling"
        );
        let idx = self as u8 - SIGNED_UNSIGNED_OFFSET;
        match idx {
            x if x == TypeKind::UInt8 as u8 => TypeKind::UInt8,
            x if x == TypeKind::UInt16 as u8 => TypeKind::UInt16,
            x if x == TypeKind::UInt32 as u8 => TypeKind::UInt32,
            x if x == TypeKind::UInt64 as u8 => TypeKind::UInt64,
            _ => unreachable!(),
        }
    }

    /// Smallest unsigned int kind that can hold `value` (lexer integer
    /// literals).
    pub fn smallest_fitting_uint(value: u64) -> TypeKind {
        if value <= u8::MAX as u64 {
            TypeKind::UInt8
        } else if value <= u16::MAX as u64 {
            TypeKind::UInt16
        } else if value <= u32::MAX as u64 {
            TypeKind::UInt32
        } else {
            TypeKind::UInt64
        }
    }
}

/// A concrete type value. Cheap to copy; nodes hold these by value in
/// a `Cell<Type>` rather than an arena pointer (see `ast` module doc).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Type {
    pub kind: TypeKind,
}

impl Type {
    pub const fn new(kind: TypeKind) -> Self {
        Type { kind }
    }

    pub const UNKNOWN: Type = Type::new(TypeKind::Unknown);
    pub const VOID: Type = Type::new(TypeKind::Void);
    pub const BOOL: Type = Type::new(TypeKind::Bool);

    pub fn size_bytes(self) -> u32 {
        self.kind.size_bytes()
    }

    pub fn name(self) -> &'static str {
        self.kind.name()
    }

    pub fn is_int(self) -> bool {
        self.kind.is_int()
    }

    pub fn is_unsigned(self) -> bool {
        self.kind.is_unsigned()
    }

    pub fn is_float(self) -> bool {
        self.kind.is_float()
    }

    pub fn is_bool(self) -> bool {
        self.kind.is_bool()
    }

    pub fn is_unknown(self) -> bool {
        self.kind == TypeKind::Unknown
    }

    pub fn is_void(self) -> bool {
        self.kind == TypeKind::Void
    }

    /// Ordering by promotion rank (the declaration order of `TypeKind`).
    pub fn rank_cmp(self, other: Type) -> Ordering {
        self.kind.cmp(&other.kind)
    }
}

impl std::fmt::Display for Type {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unsigned_signed_pairing_round_trips() {
        for (u, s) in [
            (TypeKind::UInt8, TypeKind::Int8),
            (TypeKind::UInt16, TypeKind::Int16),
            (TypeKind::UInt32, TypeKind::Int32),
            (TypeKind::UInt64, TypeKind::Int64),
        ] {
            assert_eq!(u.to_signed(), s);
            assert_eq!(s.to_unsigned(), u);
        }
    }

    #[test]
    fn promotion_rank_matches_declaration_order() {
        assert!(TypeKind::UInt8 < TypeKind::UInt64);
        assert!(TypeKind::UInt64 < TypeKind::Int8);
        assert!(TypeKind::Int64 < TypeKind::Float32);
        assert!(TypeKind::Float64 < TypeKind::SoftFloat64);
    }

    #[test]
    fn predicates_partition_the_enum() {
        for kind in [
            TypeKind::Unknown,
            TypeKind::Void,
            TypeKind::Bool,
            TypeKind::UInt8,
            TypeKind::Int32,
            TypeKind::Float64,
            TypeKind::SoftFloat64,
        ] {
            let flags = [kind.is_int(), kind.is_float(), kind.is_bool()];
            assert!(flags.iter().filter(|b| **b).count() <= 1, "{kind:?}");
        }
    }

    #[test]
    fn smallest_fitting_uint_picks_tightest_kind() {
        assert_eq!(TypeKind::smallest_fitting_uint(0), TypeKind::UInt8);
        assert_eq!(TypeKind::smallest_fitting_uint(255), TypeKind::UInt8);
        assert_eq!(TypeKind::smallest_fitting_uint(256), TypeKind::UInt16);
        assert_eq!(TypeKind::smallest_fitting_uint(70_000), TypeKind::UInt32);
        assert_eq!(
            TypeKind::smallest_fitting_uint(u64::MAX),
            TypeKind::UInt64
        );
    }

    #[test]
    fn size_bytes_matches_width() {
        assert_eq!(TypeKind::UInt8.size_bytes(), 1);
        assert_eq!(TypeKind::Int64.size_bytes(), 8);
        assert_eq!(TypeKind::Float32.size_bytes(), 4);
        assert_eq!(TypeKind::Void.size_bytes(), 0);
    }
}
