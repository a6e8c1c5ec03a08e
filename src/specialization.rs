use crate::definition::MAX_ARGS;
use crate::dtype::DType;
use crate::error::UfuncError;
use crate::objmode::ObjectModeKernel;
use crate::rt_types::KernelFn;
use crate::scalar::Scalar;
use crate::signature::Signature;
use cranelift_jit::JITModule;
use foldhash::{HashMap, HashMapExt};
use std::fmt;
use std::sync::Arc;

/// How a specialization is invoked.
#[derive(Clone)]
pub enum EntryPoint {
    /// Native kernel taking raw values through 8-byte slots.
    Native(KernelFn),
    /// Boxed evaluator over [`Scalar`] values (object mode).
    Boxed(Arc<dyn Fn(&[Scalar]) -> Result<Scalar, UfuncError> + Send + Sync>),
}

impl EntryPoint {
    pub(crate) fn boxed(kernel: ObjectModeKernel) -> EntryPoint {
        EntryPoint::Boxed(Arc::new(move |args: &[Scalar]| kernel.call(args)))
    }

    pub fn is_native(&self) -> bool {
        matches!(self, EntryPoint::Native(_))
    }
}

impl fmt::Debug for EntryPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntryPoint::Native(p) => write!(f, "Native({:p})", *p as *const u8),
            EntryPoint::Boxed(_) => f.write_str("Boxed"),
        }
    }
}

/// Owns the machine code of one specialization.
///
/// The JIT memory is released when the last reference is dropped, so an
/// [`EntryPoint::Native`] stays callable for as long as its library is alive.
pub struct CodeLibrary {
    module: Option<JITModule>,
    symbol: String,
}

// Safety: code pages are immutable after finalization and only freed on drop,
// when no other reference to the library exists.
unsafe impl Send for CodeLibrary {}
unsafe impl Sync for CodeLibrary {}

impl CodeLibrary {
    pub(crate) fn new(module: JITModule, symbol: String) -> Self {
        Self { module: Some(module), symbol }
    }

    /// A library with no machine code, for object-mode specializations.
    pub(crate) fn empty(symbol: String) -> Self {
        Self { module: None, symbol }
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn has_code(&self) -> bool {
        self.module.is_some()
    }
}

impl Drop for CodeLibrary {
    fn drop(&mut self) {
        if let Some(module) = self.module.take() {
            unsafe {
                module.free_memory();
            }
        }
    }
}

impl fmt::Debug for CodeLibrary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CodeLibrary")
            .field("symbol", &self.symbol)
            .field("has_code", &self.has_code())
            .finish()
    }
}

/// Link-time context of a specialization: the host functions it imports.
#[derive(Debug, Clone, Default)]
pub struct Environment {
    imports: Vec<(String, u8)>,
}

impl Environment {
    pub(crate) fn new(imports: Vec<(String, u8)>) -> Self {
        Self { imports }
    }

    pub fn imports(&self) -> &[(String, u8)] {
        &self.imports
    }
}

/// One compiled version of a dynamic ufunc for a concrete signature.
#[derive(Debug)]
pub struct Specialization {
    signature: Signature,
    ret: DType,
    entry: EntryPoint,
    library: Arc<CodeLibrary>,
    env: Arc<Environment>,
    objectmode: bool,
}

impl Specialization {
    pub(crate) fn new(
        args: Vec<DType>,
        ret: DType,
        entry: EntryPoint,
        library: Arc<CodeLibrary>,
        env: Arc<Environment>,
        objectmode: bool,
    ) -> Self {
        Self {
            signature: Signature::new(args).with_return(ret),
            ret,
            entry,
            library,
            env,
            objectmode,
        }
    }

    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    pub fn args(&self) -> &[DType] {
        &self.signature.args
    }

    pub fn return_type(&self) -> DType {
        self.ret
    }

    pub fn entry(&self) -> &EntryPoint {
        &self.entry
    }

    pub fn library(&self) -> &Arc<CodeLibrary> {
        &self.library
    }

    pub fn environment(&self) -> &Arc<Environment> {
        &self.env
    }

    pub fn is_objectmode(&self) -> bool {
        self.objectmode
    }

    /// Calls the kernel with values already in its input types.
    pub fn invoke(&self, args: &[Scalar]) -> Result<Scalar, UfuncError> {
        let params = self.args();
        if args.len() != params.len() {
            return Err(UfuncError::ArityMismatch {
                name: self.library.symbol().to_string(),
                expected: params.len().to_string(),
                got: args.len(),
            });
        }
        if let Some((a, t)) = args.iter().zip(params).find(|(a, t)| a.dtype() != **t) {
            return Err(UfuncError::Internal(format!(
                "kernel argument of type {} where {} was expected",
                a.dtype(),
                t
            )));
        }
        match &self.entry {
            EntryPoint::Native(f) => {
                let mut slots = [0u64; MAX_ARGS];
                for (slot, a) in slots.iter_mut().zip(args) {
                    let mut bytes = [0u8; 8];
                    a.write_ne(&mut bytes[..a.dtype().itemsize()]);
                    *slot = u64::from_ne_bytes(bytes);
                }
                let mut out = 0u64;
                // Safety: the library owning `f` is kept alive by `self`, and
                // the kernel reads exactly `params.len()` slots.
                unsafe { f(slots.as_ptr(), &mut out) };
                let bytes = out.to_ne_bytes();
                Ok(Scalar::read_ne(self.ret, &bytes[..self.ret.itemsize()]))
            }
            EntryPoint::Boxed(f) => Ok(f(args)?.cast(self.ret)),
        }
    }
}

/// Append-only store of the specializations of one dynamic ufunc, keyed by
/// input types.
#[derive(Default)]
pub struct SpecializationTable {
    entries: HashMap<Vec<DType>, Arc<Specialization>>,
    order: Vec<Vec<DType>>,
    keepalive: Vec<(Arc<CodeLibrary>, Arc<Environment>)>,
}

impl SpecializationTable {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
            order: Vec::new(),
            keepalive: Vec::new(),
        }
    }

    pub fn get(&self, args: &[DType]) -> Option<&Arc<Specialization>> {
        self.entries.get(args)
    }

    /// Inserts `spec` unless its input types are already present, in which
    /// case the existing entry is returned.
    pub(crate) fn insert(&mut self, spec: Specialization) -> Arc<Specialization> {
        if let Some(existing) = self.entries.get(spec.args()) {
            return existing.clone();
        }
        let key = spec.args().to_vec();
        self.keepalive.push((spec.library.clone(), spec.env.clone()));
        let spec = Arc::new(spec);
        self.order.push(key.clone());
        self.entries.insert(key, spec.clone());
        spec
    }

    /// Specializations in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<Specialization>> {
        self.order.iter().filter_map(|k| self.entries.get(k))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn keepalive_len(&self) -> usize {
        self.keepalive.len()
    }
}
