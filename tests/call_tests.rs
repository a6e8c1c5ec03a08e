use dufunc::{
    DType, DUFunc, KernelAdapter, Layout, NdArray, Operand, OperandType, Scalar, Signature, UfuncError,
};

fn array(op: Operand) -> NdArray {
    match op.into_array() {
        Some(a) => a,
        None => panic!("expected an array result"),
    }
}

fn scalar(op: Operand) -> Scalar {
    match op.as_scalar() {
        Some(s) => s,
        None => panic!("expected a scalar result, got {:?}", op),
    }
}

#[test]
fn attributes() -> Result<(), UfuncError> {
    let f = DUFunc::new("add(a, b) = a + b")?.with_identity(0i32);
    assert_eq!(f.name(), "add");
    assert_eq!(f.nin(), 2);
    assert_eq!(f.nout(), 1);
    assert_eq!(f.nargs(), 3);
    assert_eq!(f.ntypes(), 0);
    assert_eq!(f.identity(), Some(Scalar::Int32(0)));
    assert_eq!(f.signature(), None);
    assert!(!f.is_frozen());
    assert_eq!(f.to_string(), "<dufunc 'add'>");
    Ok(())
}

#[test]
fn scalar_call_compiles_on_demand() -> Result<(), UfuncError> {
    let f = DUFunc::new("add(a, b) = a + b")?;
    let r = f.call(&[Scalar::Int32(2).into(), Scalar::Int32(3).into()])?;
    assert_eq!(scalar(r), Scalar::Int32(5));
    assert_eq!(f.types(), vec!["ii->i"]);

    // same types reuse the loop
    f.call(&[Scalar::Int32(7).into(), Scalar::Int32(1).into()])?;
    assert_eq!(f.ntypes(), 1);

    let r = f.call(&[Scalar::Float32(0.5).into(), Scalar::Float32(0.25).into()])?;
    assert_eq!(scalar(r), Scalar::Float32(0.75));
    assert_eq!(f.types(), vec!["ii->i", "ff->f"]);
    Ok(())
}

#[test]
fn add_is_idempotent_and_rejects_conflicts() -> Result<(), UfuncError> {
    let f = DUFunc::new("add(a, b) = a + b")?;
    let first = f.add("f8(f8, f8)")?;
    let again = f.add("dd->d")?;
    assert!(std::sync::Arc::ptr_eq(&first, &again));
    assert_eq!(f.ntypes(), 1);
    match f.add("float32(float64, float64)") {
        Err(UfuncError::ConflictingSignature { existing, .. }) => {
            assert_eq!(existing, "float64(float64, float64)");
        }
        other => panic!("unexpected: {:?}", other),
    }
    assert!(matches!(f.add("(f8)"), Err(UfuncError::ArityMismatch { .. })));
    Ok(())
}

#[test]
fn frozen_function_promotes_arrays() -> Result<(), UfuncError> {
    let f = DUFunc::new("add(a, b) = a + b")?;
    f.add("f8(f8, f8)")?;
    f.disable_compile()?;
    assert!(f.is_frozen());

    let a = NdArray::from_vec(&[3], vec![1i32, 2, 3])?;
    let b = NdArray::from_vec(&[3], vec![10i32, 20, 30])?;
    let r = array(f.call(&[a.into(), b.into()])?);
    assert_eq!(r.dtype(), DType::Float64);
    assert_eq!(r.to_vec::<f64>(), vec![11.0, 22.0, 33.0]);
    assert_eq!(f.ntypes(), 1);
    Ok(())
}

#[test]
fn frozen_function_rejects_unsafe_casts() -> Result<(), UfuncError> {
    let f = DUFunc::new("add(a, b) = a + b")?;
    f.add("(i4, i4)")?;
    f.disable_compile()?;
    match f.call(&[Scalar::Float64(1.0).into(), Scalar::Float64(2.0).into()]) {
        Err(UfuncError::NoMatchingOverload { name, .. }) => assert_eq!(name, "add"),
        other => panic!("unexpected: {:?}", other),
    }
    assert!(matches!(f.add("(f8, f8)"), Err(UfuncError::CompilationDisabled(_))));
    assert_eq!(f.ntypes(), 1);
    Ok(())
}

#[test]
fn freezing_requires_a_loop() -> Result<(), UfuncError> {
    let f = DUFunc::new("add(a, b) = a + b")?;
    assert!(matches!(f.disable_compile(), Err(UfuncError::FreezeEmpty(_))));
    assert!(!f.is_frozen());
    Ok(())
}

#[test]
fn promotion_prefers_least_promoted_loop() -> Result<(), UfuncError> {
    let f = DUFunc::new("mul(a, b) = a * b")?;
    f.add("(f8, f8)")?;
    f.add("(i8, i8)")?;
    f.add("(f8, f4)")?;
    f.add("(f4, f8)")?;
    // before freezing only exact matches count
    assert!(f.find_ewise_function(&[DType::Int32, DType::Int32]).is_none());
    f.disable_compile()?;

    let int_loop = f.find_ewise_function(&[DType::Int32, DType::Int32]).map(|s| s.args().to_vec());
    assert_eq!(int_loop, Some(vec![DType::Int64, DType::Int64]));

    let short_loop = f.find_ewise_function(&[DType::Int16, DType::Int16]).map(|s| s.args().to_vec());
    assert_eq!(short_loop, Some(vec![DType::Int64, DType::Int64]));

    let float_loop = f.find_ewise_function(&[DType::Float32, DType::Float32]).map(|s| s.args().to_vec());
    assert_eq!(float_loop, Some(vec![DType::Float32, DType::Float64]));

    let r = f.call(&[Scalar::Int16(6).into(), Scalar::Int16(7).into()])?;
    assert_eq!(scalar(r), Scalar::Int64(42));
    Ok(())
}

#[test]
fn broadcasting() -> Result<(), UfuncError> {
    let f = DUFunc::new("add(a, b) = a + b")?;
    let a = NdArray::from_vec(&[2, 3], vec![1i32, 2, 3, 4, 5, 6])?;
    let b = NdArray::from_vec(&[3], vec![10i32, 20, 30])?;
    let r = array(f.call(&[a.into(), b.into()])?);
    assert_eq!(r.shape(), &[2, 3]);
    assert_eq!(r.to_vec::<i32>(), vec![11, 22, 33, 14, 25, 36]);

    let col = NdArray::from_vec(&[2, 1], vec![100i64, 200])?;
    let row = NdArray::from_vec(&[3], vec![1i64, 2, 3])?;
    let r = array(f.call(&[col.into(), row.into()])?);
    assert_eq!(r.shape(), &[2, 3]);
    assert_eq!(r.to_vec::<i64>(), vec![101, 102, 103, 201, 202, 203]);

    let bad = f.call(&[
        NdArray::from_vec(&[2], vec![1i32, 2])?.into(),
        NdArray::from_vec(&[3], vec![1i32, 2, 3])?.into(),
    ]);
    assert!(matches!(bad, Err(UfuncError::Broadcast(_))));
    Ok(())
}

#[test]
fn untyped_literals_follow_array_scalar_convention() -> Result<(), UfuncError> {
    let f = DUFunc::new("add(a, b) = a + b")?;
    let a = NdArray::from_vec(&[3], vec![1i32, 2, 3])?;
    let r = array(f.call(&[a.into(), Operand::from(1i64)])?);
    assert_eq!(r.dtype(), DType::Int64);
    assert_eq!(r.to_vec::<i64>(), vec![2, 3, 4]);
    assert_eq!(f.types(), vec!["il->l"]);

    let r = f.call(&[Operand::from(1.5), Operand::from(true)])?;
    assert_eq!(scalar(r), Scalar::Float64(2.5));
    Ok(())
}

#[test]
fn explicit_output_array() -> Result<(), UfuncError> {
    let f = DUFunc::new("add(a, b) = a + b")?;
    let a = NdArray::from_vec(&[3], vec![1i32, 2, 3])?;
    let out = NdArray::zeros(DType::Float32, &[2, 3]);
    let r = array(f.call_with(&[a.clone().into(), Operand::from(Scalar::Int32(1))], &[("out", out.into())])?);
    assert_eq!(r.dtype(), DType::Float32);
    assert_eq!(r.shape(), &[2, 3]);
    assert_eq!(r.to_vec::<f32>(), vec![2.0, 3.0, 4.0, 2.0, 3.0, 4.0]);

    // positional output
    let out = NdArray::zeros(DType::Int64, &[3]);
    let r = array(f.call(&[a.clone().into(), a.clone().into(), out.into()])?);
    assert_eq!(r.to_vec::<i64>(), vec![2, 4, 6]);

    let small = NdArray::zeros(DType::Int64, &[1]);
    assert!(matches!(
        f.call(&[a.clone().into(), a.clone().into(), small.into()]),
        Err(UfuncError::Broadcast(_))
    ));
    assert!(matches!(
        f.call(&[a.clone().into(), a.into(), Operand::from(0i64)]),
        Err(UfuncError::InvalidOperand(_))
    ));
    Ok(())
}

#[test]
fn rejects_unknown_keywords_and_bad_arity() -> Result<(), UfuncError> {
    let f = DUFunc::new("add(a, b) = a + b")?;
    let args = [Operand::from(1i64), Operand::from(2i64)];
    match f.call_with(&args, &[("where", Operand::from(true)), ("casting", Operand::from(0i64))]) {
        Err(UfuncError::UnexpectedArgument(names)) => assert_eq!(names, "'casting', 'where'"),
        other => panic!("unexpected: {:?}", other),
    }
    match f.call(&[Operand::from(1i64)]) {
        Err(UfuncError::ArityMismatch { got, .. }) => assert_eq!(got, 1),
        other => panic!("unexpected: {:?}", other),
    }
    assert_eq!(f.ntypes(), 0);
    Ok(())
}

#[test]
fn compile_for_args_uses_element_types() -> Result<(), UfuncError> {
    let f = DUFunc::new("add(a, b) = a + b")?;
    let a = NdArray::from_vec(&[2], vec![1u8, 2])?;
    let spec = f.compile_for_args(&[a.into(), Scalar::Int8(1).into()], &[])?;
    assert_eq!(spec.signature().to_string(), "int16(uint8, int8)");
    assert!(matches!(
        f.compile_for_args(&[Operand::from(1i64)], &[("dtype", Operand::from(1i64))]),
        Err(UfuncError::UnexpectedArgument(_))
    ));
    Ok(())
}

#[test]
fn call_site_typing() -> Result<(), UfuncError> {
    let f = DUFunc::new("add(a, b) = a + b")?;
    let sig = f.type_call(&[
        OperandType::Array { dtype: DType::Int32, ndim: 2, layout: Layout::C },
        OperandType::Scalar(DType::Float64),
    ])?;
    assert_eq!(
        sig.return_type(),
        Some(&OperandType::Array { dtype: DType::Float64, ndim: 2, layout: Layout::C })
    );
    assert_eq!(sig.to_string(), "(array(int32, 2d, C), float64) -> array(float64, 2d, C)");

    let sig = f.type_call(&[OperandType::Scalar(DType::Int8), OperandType::Scalar(DType::Int8)])?;
    assert_eq!(sig.return_type(), Some(&OperandType::Scalar(DType::Int8)));

    let c = NdArray::zeros(DType::Float64, &[2, 3]);
    let t = c.transpose();
    assert_eq!(t.layout(), Layout::F);
    let sig = f.type_call(&[
        Operand::from(c.clone()).operand_type(),
        Operand::from(c).operand_type(),
    ])?;
    assert_eq!(sig.outputs[0], OperandType::Array { dtype: DType::Float64, ndim: 2, layout: Layout::C });
    let sig = f.type_call(&[
        OperandType::Array { dtype: DType::Float64, ndim: 2, layout: Layout::C },
        Operand::from(t).operand_type(),
    ])?;
    assert_eq!(sig.outputs[0], OperandType::Array { dtype: DType::Float64, ndim: 2, layout: Layout::A });
    Ok(())
}

#[test]
fn transposed_inputs() -> Result<(), UfuncError> {
    let f = DUFunc::new("sub(a, b) = a - b")?;
    let a = NdArray::from_vec(&[2, 3], vec![1i64, 2, 3, 4, 5, 6])?;
    let t = a.transpose();
    let z = NdArray::zeros(DType::Int64, &[3, 2]);
    let r = array(f.call(&[t.into(), z.into()])?);
    assert_eq!(r.shape(), &[3, 2]);
    assert_eq!(r.to_vec::<i64>(), vec![1, 4, 2, 5, 3, 6]);
    Ok(())
}

#[test]
fn kernel_adapter_casts_around_the_kernel() -> Result<(), UfuncError> {
    let f = DUFunc::new("div(a, b) = a / b")?;
    let spec = f.add("f8(f8, f8)")?;
    let outer = Signature::new(vec![DType::Int32, DType::Int32]).with_return(DType::Int16);
    let adapter = KernelAdapter::new(&outer, spec.clone())?;
    assert_eq!(adapter.outer_signature(), outer);
    assert_eq!(adapter.call(&[Scalar::Int32(7), Scalar::Int32(2)])?, Scalar::Int16(3));
    // inputs are first cast to the outer types
    assert_eq!(adapter.call(&[Scalar::Float64(7.9), Scalar::Int64(2)])?, Scalar::Int16(3));

    let inferred = KernelAdapter::new(&Signature::new(vec![DType::UInt8, DType::UInt8]), spec.clone())?;
    assert_eq!(inferred.outer_signature().ret, Some(DType::Float64));
    assert!(std::sync::Arc::ptr_eq(inferred.inner(), &spec));

    assert!(matches!(
        KernelAdapter::new(&Signature::new(vec![DType::Int32]), spec),
        Err(UfuncError::ArityMismatch { .. })
    ));
    Ok(())
}

#[test]
fn invoke_checks_kernel_types() -> Result<(), UfuncError> {
    let f = DUFunc::new("add(a, b) = a + b")?;
    let spec = f.add("(i4, i4)")?;
    assert!(matches!(spec.invoke(&[Scalar::Int32(1)]), Err(UfuncError::ArityMismatch { .. })));
    assert!(matches!(
        spec.invoke(&[Scalar::Int32(1), Scalar::Int64(1)]),
        Err(UfuncError::Internal(_))
    ));
    Ok(())
}
