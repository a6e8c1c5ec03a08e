use crate::ast::Ast;
use crate::definition::ElementwiseDef;
use crate::dtype::DType;
use crate::error::UfuncError;
use crate::registry::HostFunctions;
use crate::rt_types::HostFn;
use std::collections::HashMap;

/// Type of an expression node before literal materialization.
///
/// Literals are weak: they take the type of the concrete operand they meet,
/// and only fall back to int64/float64 when both sides are literals.
#[derive(Copy, Clone, Debug, PartialEq)]
pub(crate) enum Ty {
    Concrete(DType),
    WeakInt,
    WeakFloat,
}

impl Ty {
    pub(crate) fn concrete(self) -> DType {
        match self {
            Ty::Concrete(t) => t,
            Ty::WeakInt => DType::Int64,
            Ty::WeakFloat => DType::Float64,
        }
    }

    pub(crate) fn combine(self, other: Ty) -> Ty {
        use Ty::*;
        match (self, other) {
            (Concrete(a), Concrete(b)) => Concrete(a.promote(b)),
            (Concrete(t), WeakInt) | (WeakInt, Concrete(t)) => {
                if t.is_bool() { Concrete(DType::Int64) } else { Concrete(t) }
            }
            (Concrete(t), WeakFloat) | (WeakFloat, Concrete(t)) => {
                if t.is_float() { Concrete(t) } else { Concrete(DType::Float64) }
            }
            (WeakInt, WeakInt) => WeakInt,
            _ => WeakFloat,
        }
    }

    /// Operand type of `+ - *`: like `combine`, with bool-only arithmetic
    /// promoted to int64.
    fn arith(self, other: Ty) -> Ty {
        match self.combine(other) {
            Ty::Concrete(DType::Bool) => Ty::Concrete(DType::Int64),
            t => t,
        }
    }

    fn true_div(self, other: Ty) -> Ty {
        match self.combine(other) {
            Ty::Concrete(t) if t.is_float() => Ty::Concrete(t),
            Ty::WeakFloat | Ty::WeakInt => Ty::WeakFloat,
            Ty::Concrete(_) => Ty::Concrete(DType::Float64),
        }
    }
}

#[inline]
fn node_key(n: &Ast) -> usize {
    n as *const Ast as usize
}

/// Element types of every node of one definition body for one argument
/// signature.
///
/// Keys are node addresses, valid for the lifetime of the definition the map
/// was computed from.
#[derive(Debug, Default, Clone)]
pub(crate) struct TypeMap {
    types: HashMap<usize, Ty>,
    /// The body calls at least one boxed host function.
    pub uses_dynamic: bool,
}

impl TypeMap {
    pub(crate) fn compute(
        def: &ElementwiseDef,
        args: &[DType],
        hosts: &HostFunctions,
    ) -> Result<TypeMap, UfuncError> {
        if args.len() != def.nin() {
            return Err(UfuncError::ArityMismatch {
                name: def.name().to_string(),
                expected: def.nin().to_string(),
                got: args.len(),
            });
        }
        let body = def.body()?;
        let mut map = TypeMap::default();
        map.visit(body, def, args, hosts)?;
        Ok(map)
    }

    pub(crate) fn ty(&self, node: &Ast) -> Result<Ty, UfuncError> {
        self.types
            .get(&node_key(node))
            .copied()
            .ok_or_else(|| UfuncError::Internal("untyped expression node".into()))
    }

    pub(crate) fn dtype(&self, node: &Ast) -> Result<DType, UfuncError> {
        Ok(self.ty(node)?.concrete())
    }

    /// Common type both operands of a comparison, `max`, `min` or `if` are cast to.
    pub(crate) fn common(&self, a: &Ast, b: &Ast) -> Result<DType, UfuncError> {
        Ok(self.ty(a)?.combine(self.ty(b)?).concrete())
    }

    fn visit(
        &mut self,
        node: &Ast,
        def: &ElementwiseDef,
        args: &[DType],
        hosts: &HostFunctions,
    ) -> Result<Ty, UfuncError> {
        use Ast::*;
        let ty = match node {
            Int(_) => Ty::WeakInt,
            Float(_) => Ty::WeakFloat,
            Bool(_) => Ty::Concrete(DType::Bool),
            Var(name) => {
                let idx = *def
                    .param_index
                    .get(name)
                    .ok_or_else(|| UfuncError::UnknownIdent(name.clone()))?;
                Ty::Concrete(args[idx])
            }
            Neg(x) => {
                let t = self.visit(x, def, args, hosts)?;
                if t == Ty::Concrete(DType::Bool) {
                    return Err(UfuncError::Typing(format!("negation of a bool operand in {}", def.name())));
                }
                t
            }
            Not(x) => {
                self.visit(x, def, args, hosts)?;
                Ty::Concrete(DType::Bool)
            }
            Add(a, b) | Sub(a, b) | Mul(a, b) => {
                let ta = self.visit(a, def, args, hosts)?;
                let tb = self.visit(b, def, args, hosts)?;
                ta.arith(tb)
            }
            Div(a, b) => {
                let ta = self.visit(a, def, args, hosts)?;
                let tb = self.visit(b, def, args, hosts)?;
                ta.true_div(tb)
            }
            Eq(a, b) | Ne(a, b) | Lt(a, b) | Le(a, b) | Gt(a, b) | Ge(a, b) | And(a, b) | Or(a, b) => {
                self.visit(a, def, args, hosts)?;
                self.visit(b, def, args, hosts)?;
                Ty::Concrete(DType::Bool)
            }
            Max(a, b) | Min(a, b) => {
                let ta = self.visit(a, def, args, hosts)?;
                let tb = self.visit(b, def, args, hosts)?;
                ta.combine(tb)
            }
            If(c, t, e) => {
                self.visit(c, def, args, hosts)?;
                let tt = self.visit(t, def, args, hosts)?;
                let te = self.visit(e, def, args, hosts)?;
                tt.combine(te)
            }
            Call { name, args: call_args } => {
                for a in call_args {
                    self.visit(a, def, args, hosts)?;
                }
                let arity = call_args.len() as u8;
                match hosts.get(name, arity) {
                    Some(HostFn::Native(_)) => Ty::Concrete(DType::Float64),
                    Some(HostFn::Dynamic { ret, .. }) => {
                        self.uses_dynamic = true;
                        Ty::Concrete(*ret)
                    }
                    None => {
                        return Err(UfuncError::UnknownFunction {
                            name: name.clone(),
                            arity,
                        });
                    }
                }
            }
        };
        self.types.insert(node_key(node), ty);
        Ok(ty)
    }
}
