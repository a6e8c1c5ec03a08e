use crate::adapter::KernelAdapter;
use crate::array::NdArray;
use crate::backend::{CompilerBackend, CraneliftBackend, TargetOptions};
use crate::broadcast;
use crate::definition::ElementwiseDef;
use crate::dtype::DType;
use crate::error::UfuncError;
use crate::reduce::{ReduceOptions, Reduced, Reducer};
use crate::resolver::find_matching_loop;
use crate::scalar::Scalar;
use crate::signature::Signature;
use crate::specialization::{Specialization, SpecializationTable};
use crate::typing::{BroadcastTyping, CallSignature, NumpyRules, Operand, OperandType, UfuncInfo};
use foldhash::{HashMap, HashMapExt};
use log::{debug, trace};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

type AdapterKey = (Vec<DType>, DType, Vec<DType>);

/// A dynamic universal function: an elementwise definition compiled lazily
/// for every new combination of input types it is called with.
///
/// Once [`disable_compile`](Self::disable_compile) has been called the set of
/// loops is fixed and calls with unregistered types are served by the best
/// loop their inputs can be safely cast to.
pub struct DUFunc<B = CraneliftBackend, T = NumpyRules> {
    name: String,
    def: Arc<ElementwiseDef>,
    identity: Option<Scalar>,
    options: TargetOptions,
    typing: T,
    /// Held for the whole compile-and-insert sequence and while freezing.
    backend: Mutex<B>,
    table: RwLock<SpecializationTable>,
    frozen: AtomicBool,
    adapters: RwLock<HashMap<AdapterKey, Arc<KernelAdapter>>>,
}

/// Everything needed to recreate a [`DUFunc`]; compiled code is not part of it.
#[derive(Clone, Debug, PartialEq)]
pub struct DUFuncState {
    pub definition: String,
    pub identity: Option<Scalar>,
    pub frozen: bool,
    pub signatures: Vec<Signature>,
    pub options: TargetOptions,
}

impl DUFunc<CraneliftBackend, NumpyRules> {
    pub fn new(source: &str) -> Result<Self, UfuncError> {
        Self::with_backend(source, CraneliftBackend::new()?)
    }

    /// Recreates a function from a [`snapshot`](Self::snapshot), recompiling
    /// every recorded signature.
    pub fn rebuild(state: &DUFuncState) -> Result<Self, UfuncError> {
        Self::rebuild_with(state, CraneliftBackend::new()?)
    }
}

impl<B: CompilerBackend> DUFunc<B, NumpyRules> {
    pub fn with_backend(source: &str, backend: B) -> Result<Self, UfuncError> {
        let def = ElementwiseDef::parse(source)?;
        Ok(DUFunc {
            name: def.name().to_string(),
            def: Arc::new(def),
            identity: None,
            options: TargetOptions::default(),
            typing: NumpyRules,
            backend: Mutex::new(backend),
            table: RwLock::new(SpecializationTable::new()),
            frozen: AtomicBool::new(false),
            adapters: RwLock::new(HashMap::new()),
        })
    }

    pub fn rebuild_with(state: &DUFuncState, backend: B) -> Result<Self, UfuncError> {
        let mut f = Self::with_backend(&state.definition, backend)?.with_options(state.options);
        f.identity = state.identity;
        for sig in &state.signatures {
            f.add_signature(sig)?;
        }
        if state.frozen {
            f.disable_compile()?;
        }
        Ok(f)
    }
}

impl<B: CompilerBackend, T: BroadcastTyping> DUFunc<B, T> {
    pub fn with_identity(mut self, identity: impl Into<Scalar>) -> Self {
        self.identity = Some(identity.into());
        self
    }

    pub fn with_options(mut self, options: TargetOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_typing<T2: BroadcastTyping>(self, typing: T2) -> DUFunc<B, T2> {
        DUFunc {
            name: self.name,
            def: self.def,
            identity: self.identity,
            options: self.options,
            typing,
            backend: self.backend,
            table: self.table,
            frozen: self.frozen,
            adapters: self.adapters,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn definition(&self) -> &ElementwiseDef {
        &self.def
    }

    pub fn nin(&self) -> usize {
        self.def.nin()
    }

    pub fn nout(&self) -> usize {
        self.def.nout()
    }

    pub fn nargs(&self) -> usize {
        self.nin() + self.nout()
    }

    pub fn ntypes(&self) -> usize {
        self.table().len()
    }

    /// Registered loops as NumPy type strings, e.g. `"ii->i"`.
    pub fn types(&self) -> Vec<String> {
        self.table().iter().map(|s| s.signature().type_string()).collect()
    }

    pub fn identity(&self) -> Option<Scalar> {
        self.identity
    }

    /// Core signature of a generalized ufunc. Always `None`: only scalar
    /// elementwise functions are supported.
    pub fn signature(&self) -> Option<&str> {
        None
    }

    pub fn target_options(&self) -> &TargetOptions {
        &self.options
    }

    pub fn specializations(&self) -> Vec<Arc<Specialization>> {
        self.table().iter().cloned().collect()
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen.load(Ordering::Acquire)
    }

    /// Freezes the loop set. Fails when nothing has been compiled yet.
    pub fn disable_compile(&self) -> Result<(), UfuncError> {
        let _backend = self.lock_backend();
        if self.table().is_empty() {
            return Err(UfuncError::FreezeEmpty(self.name.clone()));
        }
        self.frozen.store(true, Ordering::Release);
        debug!("{}: compilation disabled with {} loops", self.name, self.ntypes());
        Ok(())
    }

    /// Compiles for an explicit signature such as `"float64(int32, int32)"`
    /// or `"ii->d"`.
    pub fn add(&self, sig: &str) -> Result<Arc<Specialization>, UfuncError> {
        let sig: Signature = sig.parse()?;
        self.add_signature(&sig)
    }

    pub fn add_signature(&self, sig: &Signature) -> Result<Arc<Specialization>, UfuncError> {
        self.compile_for_argtys(&sig.args, sig.ret)
    }

    /// Compiles for the element types of concrete call operands. `out` is the
    /// only keyword accepted.
    pub fn compile_for_args(
        &self,
        args: &[Operand],
        kwargs: &[(&str, Operand)],
    ) -> Result<Arc<Specialization>, UfuncError> {
        let args = self.merge_kwargs(args, kwargs)?;
        if args.len() != self.nin() && args.len() != self.nargs() {
            return Err(self.arity_error(args.len()));
        }
        let argtys: Vec<DType> = args[..self.nin()].iter().map(Operand::element_type).collect();
        self.compile_for_argtys(&argtys, None)
    }

    /// Compiles and registers a loop for `args`, unless one is registered
    /// already.
    pub fn compile_for_argtys(&self, args: &[DType], ret: Option<DType>) -> Result<Arc<Specialization>, UfuncError> {
        if self.is_frozen() {
            return Err(UfuncError::CompilationDisabled(self.name.clone()));
        }
        if args.len() != self.nin() {
            return Err(self.arity_error(args.len()));
        }
        if let Some(existing) = self.lookup_exact(args, ret)? {
            return Ok(existing);
        }
        let mut backend = self.lock_backend();
        // Another thread may have frozen the table or compiled the same loop.
        if self.is_frozen() {
            return Err(UfuncError::CompilationDisabled(self.name.clone()));
        }
        if let Some(existing) = self.lookup_exact(args, ret)? {
            return Ok(existing);
        }
        let cres = backend.compile(&self.def, args, ret, &self.options)?;
        let spec = Specialization::new(
            args.to_vec(),
            cres.return_type,
            cres.entry,
            cres.library,
            cres.environment,
            cres.objectmode,
        );
        let spec = self.table_mut().insert(spec);
        debug!(
            "{}: registered loop {} ({})",
            self.name,
            spec.signature(),
            if spec.is_objectmode() { "object mode" } else { "native" }
        );
        Ok(spec)
    }

    /// The registered loop serving `types`: an exact match, or when frozen
    /// the best loop `types` can be safely cast to.
    pub fn find_ewise_function(&self, types: &[DType]) -> Option<Arc<Specialization>> {
        let table = self.table();
        if let Some(spec) = table.get(types) {
            return Some(spec.clone());
        }
        if !self.is_frozen() {
            return None;
        }
        let found = find_matching_loop(types, table.iter()).cloned();
        if let Some(spec) = &found {
            trace!("{}: {:?} served by loop {}", self.name, types, spec.signature());
        }
        found
    }

    /// Types a call with the given operands, compiling a loop if needed.
    pub fn type_call(&self, args: &[OperandType]) -> Result<CallSignature, UfuncError> {
        self.resolve_call(args).map(|(sig, _)| sig)
    }

    pub fn call(&self, args: &[Operand]) -> Result<Operand, UfuncError> {
        self.call_with(args, &[])
    }

    /// Calls the function: scalar operands give a scalar, otherwise the
    /// operands are broadcast and a new array (or the given `out`) is filled.
    pub fn call_with(&self, args: &[Operand], kwargs: &[(&str, Operand)]) -> Result<Operand, UfuncError> {
        let args = self.merge_kwargs(args, kwargs)?;
        let optypes: Vec<OperandType> = args.iter().map(Operand::operand_type).collect();
        let (sig, spec) = self.resolve_call(&optypes)?;
        let out_type = *sig
            .return_type()
            .ok_or_else(|| UfuncError::Internal(format!("{} resolved without an output", self.name)))?;

        let nin = self.nin();
        let outer = Signature::new(optypes[..nin].iter().map(OperandType::dtype).collect())
            .with_return(out_type.dtype());
        let adapter = self.adapter(&outer, spec)?;
        let (inputs, outputs) = args.split_at(nin);

        match outputs.first() {
            Some(Operand::Array(out)) => {
                let mut out = out.clone();
                broadcast::execute(inputs, &mut out, |v| adapter.call(v))?;
                Ok(Operand::Array(out))
            }
            Some(_) => Err(UfuncError::InvalidOperand(format!("output of {} must be an array", self.name))),
            None if !out_type.is_array() => {
                let values: Vec<Scalar> = inputs.iter().map(scalar_value).collect();
                Ok(Operand::Scalar(adapter.call(&values)?))
            }
            None => {
                let shape = broadcast::broadcast_operands(inputs)?;
                let mut out = NdArray::zeros(out_type.dtype(), &shape);
                broadcast::execute(inputs, &mut out, |v| adapter.call(v))?;
                Ok(Operand::Array(out))
            }
        }
    }

    /// Reduces along axis 0.
    pub fn reduce(&self, array: &NdArray) -> Result<Reduced, UfuncError> {
        self.reduce_with(array, &ReduceOptions::default())
    }

    pub fn reduce_with(&self, array: &NdArray, opts: &ReduceOptions) -> Result<Reduced, UfuncError> {
        if self.nout() != 1 {
            return Err(UfuncError::UnsupportedOutputArity {
                name: self.name.clone(),
                nout: self.nout(),
            });
        }
        if self.nin() != 2 {
            return Err(UfuncError::ArityMismatch {
                name: format!("{}.reduce", self.name),
                expected: "a binary function".into(),
                got: self.nin(),
            });
        }
        let mut last: Option<((DType, DType), Arc<KernelAdapter>)> = None;
        let fold = |acc: Scalar, elem: Scalar| -> Result<Scalar, UfuncError> {
            let key = (acc.dtype(), elem.dtype());
            let adapter = match &last {
                Some((k, a)) if *k == key => a.clone(),
                _ => {
                    let a = self.fold_adapter(key.0, key.1)?;
                    last = Some((key, a.clone()));
                    a
                }
            };
            adapter.call(&[acc, elem])
        };
        let mut reducer = Reducer {
            name: &self.name,
            identity: self.identity,
            fold,
        };
        reducer.run(array, opts)
    }

    pub fn snapshot(&self) -> DUFuncState {
        DUFuncState {
            definition: self.def.source().to_string(),
            identity: self.identity,
            frozen: self.is_frozen(),
            signatures: self.table().iter().map(|s| s.signature().clone()).collect(),
            options: self.options,
        }
    }

    fn info(&self) -> UfuncInfo {
        UfuncInfo {
            name: self.name.clone(),
            nin: self.nin(),
            nout: self.nout(),
        }
    }

    fn resolve_call(&self, args: &[OperandType]) -> Result<(CallSignature, Arc<Specialization>), UfuncError> {
        let typing = self.typing.resolve_call_types(&self.info(), args)?;
        let n_inputs = typing.base_types.len() - typing.explicit_outputs.len();
        let ewise = &typing.base_types[..n_inputs];
        let spec = match self.find_ewise_function(ewise) {
            Some(spec) => spec,
            None => {
                if self.is_frozen() {
                    return Err(UfuncError::NoMatchingOverload {
                        name: self.name.clone(),
                        types: args.iter().map(|t| t.to_string()).collect::<Vec<_>>().join(", "),
                    });
                }
                self.compile_for_argtys(ewise, None)?
            }
        };
        let outputs = if !typing.explicit_outputs.is_empty() {
            typing.explicit_outputs
        } else if self.nout() == 1 {
            let ret = spec.return_type();
            if typing.ndim > 0 {
                vec![OperandType::Array {
                    dtype: ret,
                    ndim: typing.ndim,
                    layout: typing.layout,
                }]
            } else {
                vec![OperandType::Scalar(ret)]
            }
        } else {
            return Err(UfuncError::UnsupportedOutputArity {
                name: self.name.clone(),
                nout: self.nout(),
            });
        };
        Ok((
            CallSignature {
                outputs,
                args: args.to_vec(),
            },
            spec,
        ))
    }

    fn fold_adapter(&self, acc: DType, elem: DType) -> Result<Arc<KernelAdapter>, UfuncError> {
        let (_, spec) = self.resolve_call(&[OperandType::Scalar(acc), OperandType::Scalar(elem)])?;
        self.adapter(&Signature::new(vec![acc, elem]).with_return(acc), spec)
    }

    fn adapter(&self, outer: &Signature, spec: Arc<Specialization>) -> Result<Arc<KernelAdapter>, UfuncError> {
        let ret = outer.ret.unwrap_or(spec.return_type());
        let key: AdapterKey = (outer.args.clone(), ret, spec.args().to_vec());
        if let Some(a) = self.adapters.read().unwrap_or_else(PoisonError::into_inner).get(&key) {
            return Ok(a.clone());
        }
        let adapter = Arc::new(KernelAdapter::new(outer, spec)?);
        let mut cache = self.adapters.write().unwrap_or_else(PoisonError::into_inner);
        Ok(cache.entry(key).or_insert(adapter).clone())
    }

    fn lookup_exact(&self, args: &[DType], ret: Option<DType>) -> Result<Option<Arc<Specialization>>, UfuncError> {
        let table = self.table();
        let Some(existing) = table.get(args) else {
            return Ok(None);
        };
        match ret {
            Some(r) if r != existing.return_type() => Err(UfuncError::ConflictingSignature {
                name: self.name.clone(),
                existing: existing.signature().to_string(),
                requested: Signature::new(args.to_vec()).with_return(r).to_string(),
            }),
            _ => Ok(Some(existing.clone())),
        }
    }

    fn merge_kwargs(&self, args: &[Operand], kwargs: &[(&str, Operand)]) -> Result<Vec<Operand>, UfuncError> {
        let mut merged = args.to_vec();
        let mut unexpected: Vec<&str> = Vec::new();
        for (k, v) in kwargs {
            if *k == "out" {
                merged.push(v.clone());
            } else {
                unexpected.push(*k);
            }
        }
        if !unexpected.is_empty() {
            unexpected.sort_unstable();
            let names: Vec<String> = unexpected.iter().map(|k| format!("'{}'", k)).collect();
            return Err(UfuncError::UnexpectedArgument(names.join(", ")));
        }
        Ok(merged)
    }

    fn arity_error(&self, got: usize) -> UfuncError {
        UfuncError::ArityMismatch {
            name: self.name.clone(),
            expected: format!("{} or {}", self.nin(), self.nargs()),
            got,
        }
    }

    // The table is append-only, so a panic in another thread cannot leave it
    // half-updated; poisoned locks are recovered.
    fn table(&self) -> RwLockReadGuard<'_, SpecializationTable> {
        self.table.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn table_mut(&self) -> RwLockWriteGuard<'_, SpecializationTable> {
        self.table.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_backend(&self) -> MutexGuard<'_, B> {
        self.backend.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn scalar_value(op: &Operand) -> Scalar {
    match op {
        Operand::Scalar(s) => *s,
        Operand::Literal(l) => l.to_scalar(),
        Operand::Array(a) => a.get_unchecked(&[]),
    }
}

impl<B, T> fmt::Debug for DUFunc<B, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DUFunc")
            .field("name", &self.name)
            .field("nin", &self.def.nin())
            .field("nout", &self.def.nout())
            .field("identity", &self.identity)
            .field("frozen", &self.frozen.load(Ordering::Relaxed))
            .finish()
    }
}

impl<B, T> fmt::Display for DUFunc<B, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<dufunc '{}'>", self.name)
    }
}
