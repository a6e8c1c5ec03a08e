use crate::ast::Ast;
use crate::definition::ElementwiseDef;
use crate::dtype::{DType, Kind};
use crate::error::UfuncError;
use crate::registry::{symbol_name, HostFunctions};
use crate::rt_types::HostFn;
use crate::scalar::{Literal, Scalar};
use crate::typeck::TypeMap;
use cranelift::codegen::ir::instructions::BlockArg;
use cranelift::prelude::*;
use cranelift_jit::JITModule;
use cranelift_module::{Linkage, Module};

/// Cranelift machine type of an element. Bools are `i8` holding 0 or 1.
pub(crate) fn clif_type(t: DType) -> Type {
    match t {
        DType::Bool | DType::Int8 | DType::UInt8 => types::I8,
        DType::Int16 | DType::UInt16 => types::I16,
        DType::Int32 | DType::UInt32 => types::I32,
        DType::Int64 | DType::UInt64 => types::I64,
        DType::Float32 => types::F32,
        DType::Float64 => types::F64,
    }
}

/// Lowers one typed definition body into the current function.
///
/// Parameters are loaded once in the entry block, so branches created for
/// `if`, `&&` and `||` can use them freely.
pub(crate) struct KernelCodegen<'a, 'b> {
    pub module: &'a mut JITModule,
    pub builder: &'a mut FunctionBuilder<'b>,
    pub def: &'a ElementwiseDef,
    pub types: &'a TypeMap,
    pub hosts: &'a HostFunctions,
    /// Loaded parameter values, already in their argument types.
    pub params: Vec<(Value, DType)>,
}

impl<'a, 'b> KernelCodegen<'a, 'b> {
    /// Emits `node`, converted to `to`.
    pub fn expr_as(&mut self, node: &Ast, to: DType) -> Result<Value, UfuncError> {
        // Literals are materialized directly in the requested type.
        match node {
            Ast::Int(v) => return Ok(self.const_scalar(Literal::Int(*v).to_scalar().cast(to))),
            Ast::Float(v) => return Ok(self.const_scalar(Scalar::Float64(*v).cast(to))),
            Ast::Bool(b) => return Ok(self.const_scalar(Scalar::Bool(*b).cast(to))),
            _ => {}
        }
        let from = self.types.dtype(node)?;
        let v = self.expr(node)?;
        Ok(self.cast(v, from, to))
    }

    pub fn expr(&mut self, node: &Ast) -> Result<Value, UfuncError> {
        let ty = self.types.dtype(node)?;
        match node {
            Ast::Int(_) | Ast::Float(_) | Ast::Bool(_) => self.expr_as(node, ty),
            Ast::Var(name) => {
                let idx = *self
                    .def
                    .param_index
                    .get(name)
                    .ok_or_else(|| UfuncError::UnknownIdent(name.clone()))?;
                Ok(self.params[idx].0)
            }
            Ast::Neg(x) => {
                if ty.is_bool() {
                    return Err(UfuncError::Typing("negation of a bool operand".into()));
                }
                let v = self.expr_as(x, ty)?;
                Ok(if ty.is_float() { self.builder.ins().fneg(v) } else { self.builder.ins().ineg(v) })
            }
            Ast::Not(x) => {
                let v = self.truthy(x)?;
                Ok(self.builder.ins().bxor_imm(v, 1))
            }
            Ast::Add(a, b) | Ast::Sub(a, b) | Ast::Mul(a, b) | Ast::Div(a, b) => {
                let va = self.expr_as(a, ty)?;
                let vb = self.expr_as(b, ty)?;
                let ins = self.builder.ins();
                Ok(match (node, ty.is_float()) {
                    (Ast::Add(..), true) => ins.fadd(va, vb),
                    (Ast::Add(..), false) => ins.iadd(va, vb),
                    (Ast::Sub(..), true) => ins.fsub(va, vb),
                    (Ast::Sub(..), false) => ins.isub(va, vb),
                    (Ast::Mul(..), true) => ins.fmul(va, vb),
                    (Ast::Mul(..), false) => ins.imul(va, vb),
                    (Ast::Div(..), true) => ins.fdiv(va, vb),
                    _ => return Err(UfuncError::Lowering(format!("integer true division in {}", self.def.name()))),
                })
            }
            Ast::Max(a, b) | Ast::Min(a, b) => {
                let va = self.expr_as(a, ty)?;
                let vb = self.expr_as(b, ty)?;
                let is_max = matches!(node, Ast::Max(..));
                let ins = self.builder.ins();
                Ok(match (ty.kind(), is_max) {
                    (Kind::Float, true) => ins.fmax(va, vb),
                    (Kind::Float, false) => ins.fmin(va, vb),
                    (Kind::Signed, true) => ins.smax(va, vb),
                    (Kind::Signed, false) => ins.smin(va, vb),
                    (Kind::Unsigned | Kind::Bool, true) => ins.umax(va, vb),
                    (Kind::Unsigned | Kind::Bool, false) => ins.umin(va, vb),
                })
            }
            Ast::Eq(a, b) | Ast::Ne(a, b) | Ast::Lt(a, b) | Ast::Le(a, b) | Ast::Gt(a, b) | Ast::Ge(a, b) => {
                let common = self.types.common(a, b)?;
                let va = self.expr_as(a, common)?;
                let vb = self.expr_as(b, common)?;
                Ok(self.compare(node, common, va, vb))
            }
            Ast::And(a, b) => self.short_circuit(a, b, false),
            Ast::Or(a, b) => self.short_circuit(a, b, true),
            Ast::If(c, t, e) => {
                let then_block = self.builder.create_block();
                let else_block = self.builder.create_block();
                let merge_block = self.builder.create_block();
                let res = self.builder.append_block_param(merge_block, clif_type(ty));

                let cond = self.truthy(c)?;
                self.builder.ins().brif(cond, then_block, &[], else_block, &[]);
                self.builder.seal_block(then_block);
                self.builder.seal_block(else_block);

                self.builder.switch_to_block(then_block);
                let vt = self.expr_as(t, ty)?;
                self.builder.ins().jump(merge_block, &[BlockArg::Value(vt)]);

                self.builder.switch_to_block(else_block);
                let ve = self.expr_as(e, ty)?;
                self.builder.ins().jump(merge_block, &[BlockArg::Value(ve)]);

                self.builder.seal_block(merge_block);
                self.builder.switch_to_block(merge_block);
                Ok(res)
            }
            Ast::Call { name, args } => self.host_call(name, args),
        }
    }

    fn compare(&mut self, node: &Ast, common: DType, va: Value, vb: Value) -> Value {
        if common.is_float() {
            let cc = match node {
                Ast::Eq(..) => FloatCC::Equal,
                Ast::Ne(..) => FloatCC::NotEqual,
                Ast::Lt(..) => FloatCC::LessThan,
                Ast::Le(..) => FloatCC::LessThanOrEqual,
                Ast::Gt(..) => FloatCC::GreaterThan,
                _ => FloatCC::GreaterThanOrEqual,
            };
            return self.builder.ins().fcmp(cc, va, vb);
        }
        let signed = common.is_signed();
        let cc = match (node, signed) {
            (Ast::Eq(..), _) => IntCC::Equal,
            (Ast::Ne(..), _) => IntCC::NotEqual,
            (Ast::Lt(..), true) => IntCC::SignedLessThan,
            (Ast::Lt(..), false) => IntCC::UnsignedLessThan,
            (Ast::Le(..), true) => IntCC::SignedLessThanOrEqual,
            (Ast::Le(..), false) => IntCC::UnsignedLessThanOrEqual,
            (Ast::Gt(..), true) => IntCC::SignedGreaterThan,
            (Ast::Gt(..), false) => IntCC::UnsignedGreaterThan,
            (_, true) => IntCC::SignedGreaterThanOrEqual,
            (_, false) => IntCC::UnsignedGreaterThanOrEqual,
        };
        self.builder.ins().icmp(cc, va, vb)
    }

    /// `a && b` (or `a || b` when `is_or`): the right operand only runs when
    /// the left one does not decide the result.
    fn short_circuit(&mut self, a: &Ast, b: &Ast, is_or: bool) -> Result<Value, UfuncError> {
        let rhs_block = self.builder.create_block();
        let done_block = self.builder.create_block();
        let merge_block = self.builder.create_block();
        let res = self.builder.append_block_param(merge_block, types::I8);

        let va = self.truthy(a)?;
        if is_or {
            self.builder.ins().brif(va, done_block, &[], rhs_block, &[]);
        } else {
            self.builder.ins().brif(va, rhs_block, &[], done_block, &[]);
        }
        self.builder.seal_block(rhs_block);
        self.builder.seal_block(done_block);

        self.builder.switch_to_block(rhs_block);
        let vb = self.truthy(b)?;
        self.builder.ins().jump(merge_block, &[BlockArg::Value(vb)]);

        self.builder.switch_to_block(done_block);
        let decided = self.builder.ins().iconst(types::I8, is_or as i64);
        self.builder.ins().jump(merge_block, &[BlockArg::Value(decided)]);

        self.builder.seal_block(merge_block);
        self.builder.switch_to_block(merge_block);
        Ok(res)
    }

    /// `node != 0` as an `i8` 0/1.
    pub fn truthy(&mut self, node: &Ast) -> Result<Value, UfuncError> {
        self.expr_as(node, DType::Bool)
    }

    fn host_call(&mut self, name: &str, args: &[Ast]) -> Result<Value, UfuncError> {
        let arity = args.len() as u8;
        match self.hosts.get(name, arity) {
            Some(HostFn::Native(_)) => {}
            Some(HostFn::Dynamic { .. }) => {
                return Err(UfuncError::Lowering(format!(
                    "{}/{} is a dynamic host function and needs object mode",
                    name, arity
                )));
            }
            None => {
                return Err(UfuncError::UnknownFunction {
                    name: name.to_string(),
                    arity,
                });
            }
        }
        // Native host functions take and return f64.
        let mut ext_sig = self.module.make_signature();
        for _ in 0..arity {
            ext_sig.params.push(AbiParam::new(types::F64));
        }
        ext_sig.returns.push(AbiParam::new(types::F64));
        let callee_id = self
            .module
            .declare_function(&symbol_name(name, arity), Linkage::Import, &ext_sig)
            .map_err(|e| UfuncError::Internal(e.to_string()))?;
        let callee_ref = self.module.declare_func_in_func(callee_id, self.builder.func);
        let mut argv = Vec::with_capacity(args.len());
        for a in args {
            argv.push(self.expr_as(a, DType::Float64)?);
        }
        let call = self.builder.ins().call(callee_ref, &argv);
        Ok(self.builder.inst_results(call)[0])
    }

    pub fn const_scalar(&mut self, s: Scalar) -> Value {
        match s {
            Scalar::Float32(v) => self.builder.ins().f32const(v),
            Scalar::Float64(v) => self.builder.ins().f64const(v),
            other => {
                // Narrow integer immediates must be zero-extended.
                self.builder.ins().iconst(clif_type(other.dtype()), other.to_bits() as i64)
            }
        }
    }

    /// Converts `v` from `from` to `to` with [`Scalar::cast`] semantics.
    pub fn cast(&mut self, v: Value, from: DType, to: DType) -> Value {
        if from == to {
            return v;
        }
        let to_ty = clif_type(to);
        let ins = self.builder.ins();
        match (from.kind(), to.kind()) {
            (Kind::Float, Kind::Bool) => {
                let zero = if from == DType::Float32 { ins.f32const(0.0) } else { ins.f64const(0.0) };
                self.builder.ins().fcmp(FloatCC::NotEqual, v, zero)
            }
            (_, Kind::Bool) => ins.icmp_imm(IntCC::NotEqual, v, 0),
            (Kind::Float, Kind::Float) => {
                if to.bits() > from.bits() { ins.fpromote(to_ty, v) } else { ins.fdemote(to_ty, v) }
            }
            (Kind::Float, to_kind) => {
                let signed = to_kind == Kind::Signed;
                if to.bits() >= 32 {
                    return if signed { ins.fcvt_to_sint_sat(to_ty, v) } else { ins.fcvt_to_uint_sat(to_ty, v) };
                }
                // Saturate through i32, then clamp to the narrow range.
                let wide = if signed {
                    let w = ins.fcvt_to_sint_sat(types::I32, v);
                    let (lo, hi) = if to.bits() == 8 { (i8::MIN as i64, i8::MAX as i64) } else { (i16::MIN as i64, i16::MAX as i64) };
                    let lo = self.builder.ins().iconst(types::I32, lo & 0xffff_ffff);
                    let hi = self.builder.ins().iconst(types::I32, hi);
                    let w = self.builder.ins().smax(w, lo);
                    self.builder.ins().smin(w, hi)
                } else {
                    let w = ins.fcvt_to_uint_sat(types::I32, v);
                    let hi = if to.bits() == 8 { u8::MAX as i64 } else { u16::MAX as i64 };
                    let hi = self.builder.ins().iconst(types::I32, hi);
                    self.builder.ins().umin(w, hi)
                };
                self.builder.ins().ireduce(to_ty, wide)
            }
            (from_kind, Kind::Float) => {
                let signed = from_kind == Kind::Signed;
                let wide = if from.bits() < 64 {
                    if signed { ins.sextend(types::I64, v) } else { ins.uextend(types::I64, v) }
                } else {
                    v
                };
                if signed {
                    self.builder.ins().fcvt_from_sint(to_ty, wide)
                } else {
                    self.builder.ins().fcvt_from_uint(to_ty, wide)
                }
            }
            (from_kind, _) => {
                let (fb, tb) = (from.bits(), to.bits());
                if tb > fb {
                    if from_kind == Kind::Signed { ins.sextend(to_ty, v) } else { ins.uextend(to_ty, v) }
                } else if tb < fb {
                    ins.ireduce(to_ty, v)
                } else {
                    v
                }
            }
        }
    }
}
