//! Value types of the IR.
//!
//! Integer values are stored as raw bits masked to their width. All integer
//! arithmetic wraps modulo `2^width`, matching two's-complement hardware.

use derive_more::Display;
use serde::{Deserialize, Serialize};

/// Bit width of an integer type.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum IntWidth {
    W8,
    W16,
    W32,
    W64,
}

impl IntWidth {
    pub const ALL: [IntWidth; 4] = [IntWidth::W8, IntWidth::W16, IntWidth::W32, IntWidth::W64];

    /// Number of bits.
    pub const fn bits(self) -> u32 {
        match self {
            IntWidth::W8 => 8,
            IntWidth::W16 => 16,
            IntWidth::W32 => 32,
            IntWidth::W64 => 64,
        }
    }

    /// All-ones mask for this width.
    pub const fn mask(self) -> u64 {
        match self {
            IntWidth::W64 => u64::MAX,
            w => (1u64 << w.bits()) - 1,
        }
    }

    /// Truncate raw bits to this width.
    pub const fn wrap(self, bits: u64) -> u64 {
        bits & self.mask()
    }

    /// Reinterpret masked bits as a signed integer.
    pub const fn sign_extend(self, bits: u64) -> i64 {
        let shift = 64 - self.bits();
        ((bits << shift) as i64) >> shift
    }

    /// Encode a signed integer as masked bits of this width.
    pub const fn from_i64(self, value: i64) -> u64 {
        self.wrap(value as u64)
    }
}

/// Type of an SSA value.
#[derive(
    Clone, Copy, Debug, Display, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub enum Type {
    #[display("i8")]
    I8,
    #[display("i16")]
    I16,
    #[display("i32")]
    I32,
    #[display("i64")]
    I64,
    #[display("f64")]
    F64,
    #[display("bool")]
    Bool,
}

impl Type {
    /// Integer width, if this is an integer type.
    pub const fn int_width(self) -> Option<IntWidth> {
        match self {
            Type::I8 => Some(IntWidth::W8),
            Type::I16 => Some(IntWidth::W16),
            Type::I32 => Some(IntWidth::W32),
            Type::I64 => Some(IntWidth::W64),
            Type::F64 | Type::Bool => None,
        }
    }

    pub const fn is_int(self) -> bool {
        self.int_width().is_some()
    }

    /// The integer type of the given width.
    pub const fn int(width: IntWidth) -> Type {
        match width {
            IntWidth::W8 => Type::I8,
            IntWidth::W16 => Type::I16,
            IntWidth::W32 => Type::I32,
            IntWidth::W64 => Type::I64,
        }
    }

    /// Parse a type from its textual name (`i32`, `f64`, `bool`, ...).
    pub fn from_name(name: &str) -> Option<Type> {
        Some(match name {
            "i8" => Type::I8,
            "i16" => Type::I16,
            "i32" => Type::I32,
            "i64" => Type::I64,
            "f64" => Type::F64,
            "bool" => Type::Bool,
            _ => return None,
        })
    }
}
