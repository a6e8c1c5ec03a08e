use crate::ast::Ast;
use crate::definition::ElementwiseDef;
use crate::dtype::DType;
use crate::error::UfuncError;
use crate::registry::HostFunctions;
use crate::rt_types::HostFn;
use crate::scalar::{BinOp, CmpOp, Literal, Scalar};
use crate::typeck::TypeMap;
use std::sync::Arc;

/// Evaluates a typed definition body over boxed values.
///
/// Used for specializations that call dynamic host functions or were
/// compiled with `forceobj`. Every conversion goes through [`Scalar::cast`],
/// so results agree with the native kernels.
pub(crate) struct ObjectModeKernel {
    def: Arc<ElementwiseDef>,
    types: TypeMap,
    hosts: HostFunctions,
    args: Vec<DType>,
    ret: DType,
}

impl ObjectModeKernel {
    /// `types` must have been computed from this same `def`.
    pub(crate) fn new(
        def: Arc<ElementwiseDef>,
        types: TypeMap,
        hosts: HostFunctions,
        args: Vec<DType>,
        ret: DType,
    ) -> Self {
        Self { def, types, hosts, args, ret }
    }

    pub(crate) fn call(&self, args: &[Scalar]) -> Result<Scalar, UfuncError> {
        if args.len() != self.args.len() {
            return Err(UfuncError::ArityMismatch {
                name: self.def.name().to_string(),
                expected: self.args.len().to_string(),
                got: args.len(),
            });
        }
        let params: Vec<Scalar> = args.iter().zip(&self.args).map(|(a, t)| a.cast(*t)).collect();
        let body = self.def.body()?;
        let frame = Frame { kernel: self, params: &params };
        frame.eval_as(body, self.ret)
    }
}

struct Frame<'a> {
    kernel: &'a ObjectModeKernel,
    params: &'a [Scalar],
}

impl Frame<'_> {
    fn eval_as(&self, node: &Ast, to: DType) -> Result<Scalar, UfuncError> {
        match node {
            Ast::Int(v) => Ok(Literal::Int(*v).to_scalar().cast(to)),
            Ast::Float(v) => Ok(Scalar::Float64(*v).cast(to)),
            Ast::Bool(b) => Ok(Scalar::Bool(*b).cast(to)),
            _ => Ok(self.eval(node)?.cast(to)),
        }
    }

    fn truthy(&self, node: &Ast) -> Result<bool, UfuncError> {
        Ok(self.eval_as(node, DType::Bool)?.is_truthy())
    }

    fn eval(&self, node: &Ast) -> Result<Scalar, UfuncError> {
        let types = &self.kernel.types;
        let ty = types.dtype(node)?;
        match node {
            Ast::Int(_) | Ast::Float(_) | Ast::Bool(_) => self.eval_as(node, ty),
            Ast::Var(name) => {
                let idx = *self
                    .kernel
                    .def
                    .param_index
                    .get(name)
                    .ok_or_else(|| UfuncError::UnknownIdent(name.clone()))?;
                Ok(self.params[idx])
            }
            Ast::Neg(x) => self.eval_as(x, ty)?.neg(),
            Ast::Not(x) => Ok(Scalar::Bool(!self.truthy(x)?)),
            Ast::Add(a, b) => Scalar::binary(BinOp::Add, self.eval_as(a, ty)?, self.eval_as(b, ty)?),
            Ast::Sub(a, b) => Scalar::binary(BinOp::Sub, self.eval_as(a, ty)?, self.eval_as(b, ty)?),
            Ast::Mul(a, b) => Scalar::binary(BinOp::Mul, self.eval_as(a, ty)?, self.eval_as(b, ty)?),
            Ast::Div(a, b) => Scalar::binary(BinOp::Div, self.eval_as(a, ty)?, self.eval_as(b, ty)?),
            Ast::Max(a, b) => Scalar::binary(BinOp::Max, self.eval_as(a, ty)?, self.eval_as(b, ty)?),
            Ast::Min(a, b) => Scalar::binary(BinOp::Min, self.eval_as(a, ty)?, self.eval_as(b, ty)?),
            Ast::Eq(a, b) => self.compare(CmpOp::Eq, a, b),
            Ast::Ne(a, b) => self.compare(CmpOp::Ne, a, b),
            Ast::Lt(a, b) => self.compare(CmpOp::Lt, a, b),
            Ast::Le(a, b) => self.compare(CmpOp::Le, a, b),
            Ast::Gt(a, b) => self.compare(CmpOp::Gt, a, b),
            Ast::Ge(a, b) => self.compare(CmpOp::Ge, a, b),
            Ast::And(a, b) => Ok(Scalar::Bool(self.truthy(a)? && self.truthy(b)?)),
            Ast::Or(a, b) => Ok(Scalar::Bool(self.truthy(a)? || self.truthy(b)?)),
            Ast::If(c, t, e) => {
                if self.truthy(c)? {
                    self.eval_as(t, ty)
                } else {
                    self.eval_as(e, ty)
                }
            }
            Ast::Call { name, args } => {
                let arity = args.len() as u8;
                match self.kernel.hosts.get(name, arity) {
                    Some(HostFn::Native(f)) => {
                        let mut argv = Vec::with_capacity(args.len());
                        for a in args {
                            argv.push(self.eval_as(a, DType::Float64)?.as_f64());
                        }
                        Ok(Scalar::Float64(f.call(&argv)?))
                    }
                    Some(HostFn::Dynamic { ret, f, .. }) => {
                        let mut argv = Vec::with_capacity(args.len());
                        for a in args {
                            argv.push(self.eval(a)?);
                        }
                        Ok(f(&argv)?.cast(*ret))
                    }
                    None => Err(UfuncError::UnknownFunction {
                        name: name.clone(),
                        arity,
                    }),
                }
            }
        }
    }

    fn compare(&self, op: CmpOp, a: &Ast, b: &Ast) -> Result<Scalar, UfuncError> {
        let common = self.kernel.types.common(a, b)?;
        let va = self.eval_as(a, common)?;
        let vb = self.eval_as(b, common)?;
        Ok(Scalar::Bool(Scalar::compare(op, va, vb)?))
    }
}
