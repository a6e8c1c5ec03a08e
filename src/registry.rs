use crate::dtype::DType;
use crate::error::UfuncError;
use crate::rt_types::{DynamicFn, Fn1, Fn2, Fn3, HostFn, NativeFn};
use crate::scalar::Scalar;
use foldhash::{HashMap, HashMapExt};
use std::sync::Arc;

/// Host functions that elementwise definitions may call, keyed by (name, arity).
#[derive(Clone, Default)]
pub struct HostFunctions {
    funcs: HashMap<(String, u8), HostFn>,
}

impl HostFunctions {
    pub fn new() -> Self {
        Self { funcs: HashMap::new() }
    }

    fn insert(&mut self, name: &str, f: HostFn) -> Result<(), UfuncError> {
        let key = (name.to_string(), f.arity());
        if self.funcs.contains_key(&key) {
            return Err(UfuncError::FunctionExists {
                name: name.to_string(),
                arity: key.1,
            });
        }
        self.funcs.insert(key, f);
        Ok(())
    }

    pub fn register_unary(&mut self, name: &str, f: Fn1) -> Result<(), UfuncError> {
        self.insert(name, HostFn::Native(NativeFn::Unary(f)))
    }

    pub fn register_binary(&mut self, name: &str, f: Fn2) -> Result<(), UfuncError> {
        self.insert(name, HostFn::Native(NativeFn::Binary(f)))
    }

    pub fn register_ternary(&mut self, name: &str, f: Fn3) -> Result<(), UfuncError> {
        self.insert(name, HostFn::Native(NativeFn::Ternary(f)))
    }

    /// Registers a boxed host function returning `ret`. Definitions that call
    /// it can only be compiled in object mode.
    pub fn register_dynamic<F>(&mut self, name: &str, arity: u8, ret: DType, f: F) -> Result<(), UfuncError>
    where
        F: Fn(&[Scalar]) -> Result<Scalar, UfuncError> + Send + Sync + 'static,
    {
        let f: DynamicFn = Arc::new(f);
        self.insert(name, HostFn::Dynamic { arity, ret, f })
    }

    pub fn get(&self, name: &str, arity: u8) -> Option<&HostFn> {
        self.funcs.get(&(name.to_string(), arity))
    }

    pub(crate) fn native(&self) -> impl Iterator<Item = (&(String, u8), &NativeFn)> {
        self.funcs.iter().filter_map(|(k, f)| match f {
            HostFn::Native(n) => Some((k, n)),
            HostFn::Dynamic { .. } => None,
        })
    }

    pub fn len(&self) -> usize {
        self.funcs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.funcs.is_empty()
    }

    pub fn clear(&mut self) {
        self.funcs.clear();
    }
}

pub(crate) fn symbol_name(name: &str, arity: u8) -> String {
    format!("{}#{}", name, arity)
}
