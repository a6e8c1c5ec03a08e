use crate::dtype::DType;
use crate::error::UfuncError;
use crate::scalar::Scalar;
use std::sync::Arc;

/// Native kernel ABI: `args` points at one 8-byte slot per input, `out` at
/// the result slot. A value occupies the first `itemsize` bytes of its slot,
/// in native byte order.
pub type KernelFn = unsafe extern "C" fn(*const u64, *mut u64);

pub type Fn1 = extern "C" fn(f64) -> f64;
pub type Fn2 = extern "C" fn(f64, f64) -> f64;
pub type Fn3 = extern "C" fn(f64, f64, f64) -> f64;

/// A host function callable from native kernels with float64 arguments.
#[derive(Clone, Copy)]
pub enum NativeFn {
    Unary(Fn1),
    Binary(Fn2),
    Ternary(Fn3),
}

impl NativeFn {
    pub fn arity(&self) -> u8 {
        match self {
            NativeFn::Unary(_) => 1,
            NativeFn::Binary(_) => 2,
            NativeFn::Ternary(_) => 3,
        }
    }

    pub(crate) fn addr(&self) -> *const u8 {
        match self {
            NativeFn::Unary(f) => *f as *const u8,
            NativeFn::Binary(f) => *f as *const u8,
            NativeFn::Ternary(f) => *f as *const u8,
        }
    }

    pub(crate) fn call(&self, args: &[f64]) -> Result<f64, UfuncError> {
        match (self, args) {
            (NativeFn::Unary(f), [a]) => Ok(f(*a)),
            (NativeFn::Binary(f), [a, b]) => Ok(f(*a, *b)),
            (NativeFn::Ternary(f), [a, b, c]) => Ok(f(*a, *b, *c)),
            _ => Err(UfuncError::Internal(format!(
                "host function of arity {} called with {} arguments",
                self.arity(),
                args.len()
            ))),
        }
    }
}

/// A host function over boxed values. Calling one requires the object-mode
/// calling convention.
pub type DynamicFn = Arc<dyn Fn(&[Scalar]) -> Result<Scalar, UfuncError> + Send + Sync>;

#[derive(Clone)]
pub enum HostFn {
    Native(NativeFn),
    Dynamic { arity: u8, ret: DType, f: DynamicFn },
}

impl HostFn {
    pub fn arity(&self) -> u8 {
        match self {
            HostFn::Native(f) => f.arity(),
            HostFn::Dynamic { arity, .. } => *arity,
        }
    }

    pub fn is_native(&self) -> bool {
        matches!(self, HostFn::Native(_))
    }
}
