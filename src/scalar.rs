use crate::dtype::DType;
use crate::error::UfuncError;
use std::fmt;

/// A single typed element value.
///
/// `cast` defines the conversion semantics used everywhere a value crosses a
/// type boundary: the kernel adapter, array stores, reduction seeds, the boxed
/// evaluator and the native casts emitted by the Cranelift backend.
///
/// - integer → integer wraps (two's complement truncation / extension)
/// - float → integer saturates, NaN becomes 0
/// - integer → float and float → narrower float round to nearest
/// - anything → bool is `value != 0` (NaN is true)
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Scalar {
    Bool(bool),
    Int8(i8),
    UInt8(u8),
    Int16(i16),
    UInt16(u16),
    Int32(i32),
    UInt32(u32),
    Int64(i64),
    UInt64(u64),
    Float32(f32),
    Float64(f64),
}

macro_rules! cast_num {
    ($v:expr, $to:expr) => {
        match $to {
            DType::Bool => Scalar::Bool(($v as f64) != 0.0),
            DType::Int8 => Scalar::Int8($v as i8),
            DType::UInt8 => Scalar::UInt8($v as u8),
            DType::Int16 => Scalar::Int16($v as i16),
            DType::UInt16 => Scalar::UInt16($v as u16),
            DType::Int32 => Scalar::Int32($v as i32),
            DType::UInt32 => Scalar::UInt32($v as u32),
            DType::Int64 => Scalar::Int64($v as i64),
            DType::UInt64 => Scalar::UInt64($v as u64),
            DType::Float32 => Scalar::Float32($v as f32),
            DType::Float64 => Scalar::Float64($v as f64),
        }
    };
}

macro_rules! int_binop {
    ($a:expr, $b:expr, $op:expr, $name:literal, $($var:ident),*) => {
        match ($a, $b) {
            $(
                (Scalar::$var(x), Scalar::$var(y)) => Ok(Scalar::$var(match $op {
                    BinOp::Add => x.wrapping_add(y),
                    BinOp::Sub => x.wrapping_sub(y),
                    BinOp::Mul => x.wrapping_mul(y),
                    BinOp::Max => x.max(y),
                    BinOp::Min => x.min(y),
                    BinOp::Div => {
                        return Err(UfuncError::Typing(format!(
                            "integer operands for true division must be promoted ({})",
                            $name
                        )))
                    }
                })),
            )*
            (Scalar::Float32(x), Scalar::Float32(y)) => Ok(Scalar::Float32(float_op($op, x as f64, y as f64) as f32)),
            (Scalar::Float64(x), Scalar::Float64(y)) => Ok(Scalar::Float64(float_op($op, x, y))),
            (Scalar::Bool(x), Scalar::Bool(y)) => match $op {
                BinOp::Max => Ok(Scalar::Bool(x || y)),
                BinOp::Min => Ok(Scalar::Bool(x && y)),
                _ => Err(UfuncError::Typing(format!("arithmetic on bool operands ({})", $name))),
            },
            (x, y) => Err(UfuncError::Typing(format!(
                "mismatched operand types {} and {} ({})",
                x.dtype(),
                y.dtype(),
                $name
            ))),
        }
    };
}

macro_rules! same_type_cmp {
    ($a:expr, $b:expr, $op:expr, $($var:ident),*) => {
        match ($a, $b) {
            $(
                (Scalar::$var(x), Scalar::$var(y)) => Ok(match $op {
                    CmpOp::Eq => x == y,
                    CmpOp::Ne => x != y,
                    CmpOp::Lt => x < y,
                    CmpOp::Le => x <= y,
                    CmpOp::Gt => x > y,
                    CmpOp::Ge => x >= y,
                }),
            )*
            (x, y) => Err(UfuncError::Typing(format!(
                "cannot compare {} with {}",
                x.dtype(),
                y.dtype()
            ))),
        }
    };
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Max,
    Min,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

// Max/min propagate NaN, matching Cranelift's fmax/fmin.
fn float_op(op: BinOp, x: f64, y: f64) -> f64 {
    match op {
        BinOp::Add => x + y,
        BinOp::Sub => x - y,
        BinOp::Mul => x * y,
        BinOp::Div => x / y,
        BinOp::Max => {
            if x.is_nan() || y.is_nan() {
                f64::NAN
            } else if x > y {
                x
            } else {
                y
            }
        }
        BinOp::Min => {
            if x.is_nan() || y.is_nan() {
                f64::NAN
            } else if x < y {
                x
            } else {
                y
            }
        }
    }
}

impl Scalar {
    pub fn dtype(&self) -> DType {
        match self {
            Scalar::Bool(_) => DType::Bool,
            Scalar::Int8(_) => DType::Int8,
            Scalar::UInt8(_) => DType::UInt8,
            Scalar::Int16(_) => DType::Int16,
            Scalar::UInt16(_) => DType::UInt16,
            Scalar::Int32(_) => DType::Int32,
            Scalar::UInt32(_) => DType::UInt32,
            Scalar::Int64(_) => DType::Int64,
            Scalar::UInt64(_) => DType::UInt64,
            Scalar::Float32(_) => DType::Float32,
            Scalar::Float64(_) => DType::Float64,
        }
    }

    pub fn zero(dtype: DType) -> Scalar {
        Scalar::Int64(0).cast(dtype)
    }

    pub fn cast(self, to: DType) -> Scalar {
        if self.dtype() == to {
            return self;
        }
        match self {
            Scalar::Bool(b) => cast_num!(b as u8, to),
            Scalar::Int8(v) => cast_num!(v, to),
            Scalar::UInt8(v) => cast_num!(v, to),
            Scalar::Int16(v) => cast_num!(v, to),
            Scalar::UInt16(v) => cast_num!(v, to),
            Scalar::Int32(v) => cast_num!(v, to),
            Scalar::UInt32(v) => cast_num!(v, to),
            Scalar::Int64(v) => cast_num!(v, to),
            Scalar::UInt64(v) => cast_num!(v, to),
            Scalar::Float32(v) => cast_num!(v, to),
            Scalar::Float64(v) => cast_num!(v, to),
        }
    }

    pub fn is_truthy(&self) -> bool {
        match self.cast(DType::Bool) {
            Scalar::Bool(b) => b,
            _ => false,
        }
    }

    pub fn as_f64(&self) -> f64 {
        match self.cast(DType::Float64) {
            Scalar::Float64(v) => v,
            _ => f64::NAN,
        }
    }

    /// Raw value bits, zero-extended into a 64-bit slot.
    ///
    /// This is the argument encoding of the native kernel ABI: the kernel loads
    /// each argument from the low bytes of its slot with the argument's
    /// machine type.
    pub fn to_bits(self) -> u64 {
        match self {
            Scalar::Bool(b) => b as u64,
            Scalar::Int8(v) => v as u8 as u64,
            Scalar::UInt8(v) => v as u64,
            Scalar::Int16(v) => v as u16 as u64,
            Scalar::UInt16(v) => v as u64,
            Scalar::Int32(v) => v as u32 as u64,
            Scalar::UInt32(v) => v as u64,
            Scalar::Int64(v) => v as u64,
            Scalar::UInt64(v) => v,
            Scalar::Float32(v) => v.to_bits() as u64,
            Scalar::Float64(v) => v.to_bits(),
        }
    }

    /// Inverse of [`to_bits`](Self::to_bits); bits above the type width are ignored.
    pub fn from_bits(dtype: DType, bits: u64) -> Scalar {
        match dtype {
            DType::Bool => Scalar::Bool(bits as u8 != 0),
            DType::Int8 => Scalar::Int8(bits as u8 as i8),
            DType::UInt8 => Scalar::UInt8(bits as u8),
            DType::Int16 => Scalar::Int16(bits as u16 as i16),
            DType::UInt16 => Scalar::UInt16(bits as u16),
            DType::Int32 => Scalar::Int32(bits as u32 as i32),
            DType::UInt32 => Scalar::UInt32(bits as u32),
            DType::Int64 => Scalar::Int64(bits as i64),
            DType::UInt64 => Scalar::UInt64(bits),
            DType::Float32 => Scalar::Float32(f32::from_bits(bits as u32)),
            DType::Float64 => Scalar::Float64(f64::from_bits(bits)),
        }
    }

    pub(crate) fn write_ne(self, buf: &mut [u8]) {
        match self {
            Scalar::Bool(b) => buf[0] = b as u8,
            Scalar::Int8(v) => buf.copy_from_slice(&v.to_ne_bytes()),
            Scalar::UInt8(v) => buf.copy_from_slice(&v.to_ne_bytes()),
            Scalar::Int16(v) => buf.copy_from_slice(&v.to_ne_bytes()),
            Scalar::UInt16(v) => buf.copy_from_slice(&v.to_ne_bytes()),
            Scalar::Int32(v) => buf.copy_from_slice(&v.to_ne_bytes()),
            Scalar::UInt32(v) => buf.copy_from_slice(&v.to_ne_bytes()),
            Scalar::Int64(v) => buf.copy_from_slice(&v.to_ne_bytes()),
            Scalar::UInt64(v) => buf.copy_from_slice(&v.to_ne_bytes()),
            Scalar::Float32(v) => buf.copy_from_slice(&v.to_ne_bytes()),
            Scalar::Float64(v) => buf.copy_from_slice(&v.to_ne_bytes()),
        }
    }

    pub(crate) fn read_ne(dtype: DType, buf: &[u8]) -> Scalar {
        let mut raw = [0u8; 8];
        raw[..buf.len()].copy_from_slice(buf);
        match dtype {
            DType::Bool => Scalar::Bool(raw[0] != 0),
            DType::Int8 => Scalar::Int8(i8::from_ne_bytes([raw[0]])),
            DType::UInt8 => Scalar::UInt8(raw[0]),
            DType::Int16 => Scalar::Int16(i16::from_ne_bytes([raw[0], raw[1]])),
            DType::UInt16 => Scalar::UInt16(u16::from_ne_bytes([raw[0], raw[1]])),
            DType::Int32 => Scalar::Int32(i32::from_ne_bytes([raw[0], raw[1], raw[2], raw[3]])),
            DType::UInt32 => Scalar::UInt32(u32::from_ne_bytes([raw[0], raw[1], raw[2], raw[3]])),
            DType::Int64 => Scalar::Int64(i64::from_ne_bytes(raw)),
            DType::UInt64 => Scalar::UInt64(u64::from_ne_bytes(raw)),
            DType::Float32 => Scalar::Float32(f32::from_ne_bytes([raw[0], raw[1], raw[2], raw[3]])),
            DType::Float64 => Scalar::Float64(f64::from_ne_bytes(raw)),
        }
    }

    pub(crate) fn binary(op: BinOp, a: Scalar, b: Scalar) -> Result<Scalar, UfuncError> {
        int_binop!(a, b, op, "binary", Int8, UInt8, Int16, UInt16, Int32, UInt32, Int64, UInt64)
    }

    pub(crate) fn compare(op: CmpOp, a: Scalar, b: Scalar) -> Result<bool, UfuncError> {
        same_type_cmp!(a, b, op, Bool, Int8, UInt8, Int16, UInt16, Int32, UInt32, Int64, UInt64, Float32, Float64)
    }

    pub(crate) fn neg(self) -> Result<Scalar, UfuncError> {
        Ok(match self {
            Scalar::Int8(v) => Scalar::Int8(v.wrapping_neg()),
            Scalar::UInt8(v) => Scalar::UInt8(v.wrapping_neg()),
            Scalar::Int16(v) => Scalar::Int16(v.wrapping_neg()),
            Scalar::UInt16(v) => Scalar::UInt16(v.wrapping_neg()),
            Scalar::Int32(v) => Scalar::Int32(v.wrapping_neg()),
            Scalar::UInt32(v) => Scalar::UInt32(v.wrapping_neg()),
            Scalar::Int64(v) => Scalar::Int64(v.wrapping_neg()),
            Scalar::UInt64(v) => Scalar::UInt64(v.wrapping_neg()),
            Scalar::Float32(v) => Scalar::Float32(-v),
            Scalar::Float64(v) => Scalar::Float64(-v),
            Scalar::Bool(_) => return Err(UfuncError::Typing("negation of a bool operand".into())),
        })
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Bool(v) => write!(f, "{}", v),
            Scalar::Int8(v) => write!(f, "{}", v),
            Scalar::UInt8(v) => write!(f, "{}", v),
            Scalar::Int16(v) => write!(f, "{}", v),
            Scalar::UInt16(v) => write!(f, "{}", v),
            Scalar::Int32(v) => write!(f, "{}", v),
            Scalar::UInt32(v) => write!(f, "{}", v),
            Scalar::Int64(v) => write!(f, "{}", v),
            Scalar::UInt64(v) => write!(f, "{}", v),
            Scalar::Float32(v) => write!(f, "{}", v),
            Scalar::Float64(v) => write!(f, "{}", v),
        }
    }
}

/// An untyped host value, as a dynamic caller would pass a plain number.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Literal {
    Bool(bool),
    Int(i64),
    Float(f64),
}

impl Literal {
    /// The type the value would get if first wrapped in a 0-d array.
    ///
    /// Plain integers type as int64 here even when they fit in 32 bits; this
    /// is the convention call sites use to pick a specialization.
    pub fn array_scalar_type(&self) -> DType {
        match self {
            Literal::Bool(_) => DType::Bool,
            Literal::Int(_) => DType::Int64,
            Literal::Float(_) => DType::Float64,
        }
    }

    /// Generic literal typing: the smallest of int32/int64 that holds the value.
    pub fn literal_type(&self) -> DType {
        match self {
            Literal::Bool(_) => DType::Bool,
            Literal::Int(v) if i32::try_from(*v).is_ok() => DType::Int32,
            Literal::Int(_) => DType::Int64,
            Literal::Float(_) => DType::Float64,
        }
    }

    pub fn to_scalar(&self) -> Scalar {
        match self {
            Literal::Bool(b) => Scalar::Bool(*b),
            Literal::Int(v) => Scalar::Int64(*v),
            Literal::Float(v) => Scalar::Float64(*v),
        }
    }
}

/// Rust element types that map one-to-one onto a [`DType`].
pub trait Element: Copy + 'static {
    const DTYPE: DType;
    fn into_scalar(self) -> Scalar;
    /// Converts with [`Scalar::cast`] semantics.
    fn cast_from(s: Scalar) -> Self;
}

macro_rules! numeric_element {
    ($t:ty, $var:ident, $dt:ident) => {
        impl Element for $t {
            const DTYPE: DType = DType::$dt;
            fn into_scalar(self) -> Scalar {
                Scalar::$var(self)
            }
            fn cast_from(s: Scalar) -> Self {
                match s {
                    Scalar::Bool(b) => b as u8 as $t,
                    Scalar::Int8(v) => v as $t,
                    Scalar::UInt8(v) => v as $t,
                    Scalar::Int16(v) => v as $t,
                    Scalar::UInt16(v) => v as $t,
                    Scalar::Int32(v) => v as $t,
                    Scalar::UInt32(v) => v as $t,
                    Scalar::Int64(v) => v as $t,
                    Scalar::UInt64(v) => v as $t,
                    Scalar::Float32(v) => v as $t,
                    Scalar::Float64(v) => v as $t,
                }
            }
        }

        impl From<$t> for Scalar {
            fn from(v: $t) -> Scalar {
                Scalar::$var(v)
            }
        }
    };
}

numeric_element!(i8, Int8, Int8);
numeric_element!(u8, UInt8, UInt8);
numeric_element!(i16, Int16, Int16);
numeric_element!(u16, UInt16, UInt16);
numeric_element!(i32, Int32, Int32);
numeric_element!(u32, UInt32, UInt32);
numeric_element!(i64, Int64, Int64);
numeric_element!(u64, UInt64, UInt64);
numeric_element!(f32, Float32, Float32);
numeric_element!(f64, Float64, Float64);

impl Element for bool {
    const DTYPE: DType = DType::Bool;
    fn into_scalar(self) -> Scalar {
        Scalar::Bool(self)
    }
    fn cast_from(s: Scalar) -> Self {
        s.is_truthy()
    }
}

impl From<bool> for Scalar {
    fn from(v: bool) -> Scalar {
        Scalar::Bool(v)
    }
}
