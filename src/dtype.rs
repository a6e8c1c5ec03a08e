use crate::error::UfuncError;
use std::fmt;
use std::str::FromStr;

/// Element types a specialization can be compiled for.
///
/// Variants are declared in NumPy's type-character order (`?bBhHiIlLfd`), so the
/// derived `Ord` ranks a type by how "promoted" it is. Loop matching and type
/// promotion both rely on that ordering.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DType {
    Bool,
    Int8,
    UInt8,
    Int16,
    UInt16,
    Int32,
    UInt32,
    Int64,
    UInt64,
    Float32,
    Float64,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum Kind {
    Bool,
    Signed,
    Unsigned,
    Float,
}

impl DType {
    pub const ALL: [DType; 11] = [
        DType::Bool,
        DType::Int8,
        DType::UInt8,
        DType::Int16,
        DType::UInt16,
        DType::Int32,
        DType::UInt32,
        DType::Int64,
        DType::UInt64,
        DType::Float32,
        DType::Float64,
    ];

    pub(crate) fn kind(self) -> Kind {
        use DType::*;
        match self {
            Bool => Kind::Bool,
            Int8 | Int16 | Int32 | Int64 => Kind::Signed,
            UInt8 | UInt16 | UInt32 | UInt64 => Kind::Unsigned,
            Float32 | Float64 => Kind::Float,
        }
    }

    pub fn itemsize(self) -> usize {
        use DType::*;
        match self {
            Bool | Int8 | UInt8 => 1,
            Int16 | UInt16 => 2,
            Int32 | UInt32 | Float32 => 4,
            Int64 | UInt64 | Float64 => 8,
        }
    }

    pub fn bits(self) -> u32 {
        (self.itemsize() * 8) as u32
    }

    pub fn is_bool(self) -> bool {
        self.kind() == Kind::Bool
    }

    pub fn is_signed(self) -> bool {
        self.kind() == Kind::Signed
    }

    pub fn is_unsigned(self) -> bool {
        self.kind() == Kind::Unsigned
    }

    pub fn is_integer(self) -> bool {
        matches!(self.kind(), Kind::Signed | Kind::Unsigned)
    }

    pub fn is_float(self) -> bool {
        self.kind() == Kind::Float
    }

    /// Position in NumPy's type order; smaller means less promoted.
    pub fn type_order(self) -> usize {
        self as usize
    }

    /// NumPy type character, as used in loop strings such as `"ii->d"`.
    pub fn char_code(self) -> char {
        use DType::*;
        match self {
            Bool => '?',
            Int8 => 'b',
            UInt8 => 'B',
            Int16 => 'h',
            UInt16 => 'H',
            Int32 => 'i',
            UInt32 => 'I',
            Int64 => 'l',
            UInt64 => 'L',
            Float32 => 'f',
            Float64 => 'd',
        }
    }

    pub fn from_char_code(c: char) -> Option<DType> {
        use DType::*;
        Some(match c {
            '?' => Bool,
            'b' => Int8,
            'B' => UInt8,
            'h' => Int16,
            'H' => UInt16,
            'i' => Int32,
            'I' => UInt32,
            'l' | 'q' => Int64,
            'L' | 'Q' => UInt64,
            'f' => Float32,
            'd' => Float64,
            _ => return None,
        })
    }

    pub fn name(self) -> &'static str {
        use DType::*;
        match self {
            Bool => "bool",
            Int8 => "int8",
            UInt8 => "uint8",
            Int16 => "int16",
            UInt16 => "uint16",
            Int32 => "int32",
            UInt32 => "uint32",
            Int64 => "int64",
            UInt64 => "uint64",
            Float32 => "float32",
            Float64 => "float64",
        }
    }

    /// NumPy "safe" casting: the conversion never loses information.
    pub fn can_cast_safe(self, to: DType) -> bool {
        if self == to {
            return true;
        }
        match (self.kind(), to.kind()) {
            (Kind::Bool, _) => true,
            (_, Kind::Bool) => false,
            (Kind::Signed, Kind::Signed) | (Kind::Unsigned, Kind::Unsigned) => {
                to.bits() >= self.bits()
            }
            (Kind::Unsigned, Kind::Signed) => to.bits() > self.bits(),
            (Kind::Signed, Kind::Unsigned) => false,
            (Kind::Signed | Kind::Unsigned, Kind::Float) => {
                to == DType::Float64 || self.bits() <= 16
            }
            (Kind::Float, Kind::Float) => to.bits() >= self.bits(),
            (Kind::Float, _) => false,
        }
    }

    /// Smallest type both operands safely cast to (NumPy `promote_types`).
    pub fn promote(self, other: DType) -> DType {
        DType::ALL
            .iter()
            .copied()
            .find(|t| self.can_cast_safe(*t) && other.can_cast_safe(*t))
            .unwrap_or(DType::Float64)
    }
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for DType {
    type Err = UfuncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        use DType::*;
        let t = s.trim();
        let dt = match t {
            "bool" | "b1" | "boolean" => Bool,
            "int8" | "i1" => Int8,
            "uint8" | "u1" => UInt8,
            "int16" | "i2" => Int16,
            "uint16" | "u2" => UInt16,
            "int32" | "i4" => Int32,
            "uint32" | "u4" => UInt32,
            "int64" | "i8" | "intp" => Int64,
            "uint64" | "u8" | "uintp" => UInt64,
            "float32" | "f4" => Float32,
            "float64" | "f8" | "double" => Float64,
            _ => {
                let mut chars = t.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) => {
                        return DType::from_char_code(c)
                            .ok_or_else(|| UfuncError::InvalidSignature(format!("unknown type '{}'", t)));
                    }
                    _ => return Err(UfuncError::InvalidSignature(format!("unknown type '{}'", t))),
                }
            }
        };
        Ok(dt)
    }
}
