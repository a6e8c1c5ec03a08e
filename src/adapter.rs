use crate::dtype::DType;
use crate::error::UfuncError;
use crate::scalar::Scalar;
use crate::signature::Signature;
use crate::specialization::Specialization;
use std::sync::Arc;

/// Runs a cached specialization inside a loop whose element types differ
/// from the kernel's own.
///
/// Inputs are cast from the outer types to the kernel's input types, the
/// kernel is invoked through its entry point and the result is cast to the
/// outer return type.
#[derive(Debug, Clone)]
pub struct KernelAdapter {
    outer_args: Vec<DType>,
    outer_ret: DType,
    spec: Arc<Specialization>,
}

impl KernelAdapter {
    /// `outer` must have as many inputs as the specialization; a missing
    /// outer return type means the kernel's own.
    pub fn new(outer: &Signature, spec: Arc<Specialization>) -> Result<KernelAdapter, UfuncError> {
        if outer.args.len() != spec.args().len() {
            return Err(UfuncError::ArityMismatch {
                name: spec.library().symbol().to_string(),
                expected: spec.args().len().to_string(),
                got: outer.args.len(),
            });
        }
        Ok(KernelAdapter {
            outer_args: outer.args.clone(),
            outer_ret: outer.ret.unwrap_or(spec.return_type()),
            spec,
        })
    }

    pub fn outer_signature(&self) -> Signature {
        Signature::new(self.outer_args.clone()).with_return(self.outer_ret)
    }

    pub fn inner(&self) -> &Arc<Specialization> {
        &self.spec
    }

    /// Values are cast to the outer argument types first, so callers may pass
    /// anything castable.
    pub fn call(&self, values: &[Scalar]) -> Result<Scalar, UfuncError> {
        if values.len() != self.outer_args.len() {
            return Err(UfuncError::ArityMismatch {
                name: self.spec.library().symbol().to_string(),
                expected: self.outer_args.len().to_string(),
                got: values.len(),
            });
        }
        let inner: Vec<Scalar> = values
            .iter()
            .zip(&self.outer_args)
            .zip(self.spec.args())
            .map(|((v, outer), inner)| v.cast(*outer).cast(*inner))
            .collect();
        Ok(self.spec.invoke(&inner)?.cast(self.outer_ret))
    }
}
