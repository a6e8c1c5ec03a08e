use dufunc::{CraneliftBackend, DType, DUFunc, OptLevel, Scalar, Signature, UfuncError};

fn same_value(a: Scalar, b: Scalar) -> bool {
    match (a, b) {
        (Scalar::Float32(x), Scalar::Float32(y)) if x.is_nan() && y.is_nan() => true,
        (Scalar::Float64(x), Scalar::Float64(y)) if x.is_nan() && y.is_nan() => true,
        _ => a == b,
    }
}

fn samples(from: DType) -> Vec<Scalar> {
    let seeds = [
        Scalar::Int64(0),
        Scalar::Int64(1),
        Scalar::Int64(-1),
        Scalar::Int64(127),
        Scalar::Int64(128),
        Scalar::Int64(-129),
        Scalar::Int64(255),
        Scalar::Int64(300),
        Scalar::Int64(70_000),
        Scalar::Int64(i64::MIN),
        Scalar::UInt64(u64::MAX),
        Scalar::Float64(0.5),
        Scalar::Float64(-2.7),
        Scalar::Float64(1e10),
        Scalar::Float64(-1e10),
        Scalar::Float64(f64::NAN),
        Scalar::Float64(f64::INFINITY),
    ];
    seeds.iter().map(|s| s.cast(from)).collect()
}

#[test]
fn native_casts_agree_with_scalar_cast() -> Result<(), UfuncError> {
    for from in DType::ALL {
        for to in DType::ALL {
            let f = DUFunc::new("conv(x) = x")?;
            let spec = f.add_signature(&Signature::new(vec![from]).with_return(to))?;
            assert!(spec.entry().is_native());
            for v in samples(from) {
                let got = spec.invoke(&[v])?;
                let want = v.cast(to);
                assert!(same_value(got, want), "{:?} -> {}: got {:?}, want {:?}", v, to, got, want);
            }
        }
    }
    Ok(())
}

#[test]
fn infers_return_type() -> Result<(), UfuncError> {
    let f = DUFunc::new("add(a, b) = a + b")?;
    assert_eq!(f.compile_for_argtys(&[DType::Int32, DType::Int32], None)?.return_type(), DType::Int32);
    assert_eq!(f.compile_for_argtys(&[DType::Int8, DType::UInt8], None)?.return_type(), DType::Int16);
    assert_eq!(f.compile_for_argtys(&[DType::Int32, DType::Float32], None)?.return_type(), DType::Float64);
    assert_eq!(f.types(), vec!["ii->i", "bB->h", "if->d"]);
    Ok(())
}

#[test]
fn true_division_of_integers_is_float64() -> Result<(), UfuncError> {
    let f = DUFunc::new("div(a, b) = a / b")?;
    let spec = f.compile_for_argtys(&[DType::Int32, DType::Int32], None)?;
    assert_eq!(spec.return_type(), DType::Float64);
    assert_eq!(spec.invoke(&[Scalar::Int32(7), Scalar::Int32(2)])?, Scalar::Float64(3.5));
    Ok(())
}

#[test]
fn literals_adopt_operand_type() -> Result<(), UfuncError> {
    let f = DUFunc::new("axpb(a, b) = a * 2 + b")?;
    let spec = f.compile_for_argtys(&[DType::Int8, DType::Int8], None)?;
    assert_eq!(spec.return_type(), DType::Int8);
    // 100 * 2 wraps in int8
    assert_eq!(spec.invoke(&[Scalar::Int8(100), Scalar::Int8(0)])?, Scalar::Int8(-56));

    let g = DUFunc::new("half(x) = x * 0.5")?;
    let spec = g.compile_for_argtys(&[DType::Float32], None)?;
    assert_eq!(spec.return_type(), DType::Float32);
    let spec = g.compile_for_argtys(&[DType::Int16], None)?;
    assert_eq!(spec.return_type(), DType::Float64);
    assert_eq!(spec.invoke(&[Scalar::Int16(5)])?, Scalar::Float64(2.5));
    Ok(())
}

#[test]
fn bool_arithmetic_promotes_to_int64() -> Result<(), UfuncError> {
    let f = DUFunc::new("add(a, b) = a + b")?;
    let spec = f.compile_for_argtys(&[DType::Bool, DType::Bool], None)?;
    assert_eq!(spec.return_type(), DType::Int64);
    assert_eq!(spec.invoke(&[Scalar::Bool(true), Scalar::Bool(true)])?, Scalar::Int64(2));
    Ok(())
}

#[test]
fn negating_bool_is_a_typing_error() -> Result<(), UfuncError> {
    let f = DUFunc::new("neg(x) = -x")?;
    assert!(matches!(f.add("(bool)"), Err(UfuncError::Typing(_))));
    assert_eq!(f.add("(int16)")?.invoke(&[Scalar::Int16(4)])?, Scalar::Int16(-4));
    Ok(())
}

#[test]
fn mixed_sign_comparison_uses_common_type() -> Result<(), UfuncError> {
    let f = DUFunc::new("lt(a, b) = a < b")?;
    let spec = f.compile_for_argtys(&[DType::UInt8, DType::Int8], None)?;
    assert_eq!(spec.return_type(), DType::Bool);
    assert_eq!(spec.invoke(&[Scalar::UInt8(200), Scalar::Int8(-1)])?, Scalar::Bool(false));
    assert_eq!(spec.invoke(&[Scalar::UInt8(1), Scalar::Int8(2)])?, Scalar::Bool(true));

    let spec = f.compile_for_argtys(&[DType::UInt64, DType::UInt64], None)?;
    assert_eq!(spec.invoke(&[Scalar::UInt64(u64::MAX), Scalar::UInt64(1)])?, Scalar::Bool(false));
    Ok(())
}

#[test]
fn conditionals_and_logic() -> Result<(), UfuncError> {
    let clamp = DUFunc::new("clamp(x, lo, hi) = if(x < lo, lo, if(x > hi, hi, x))")?;
    let spec = clamp.add("f8(f8, f8, f8)")?;
    let call = |x: f64| spec.invoke(&[Scalar::Float64(x), Scalar::Float64(0.0), Scalar::Float64(1.0)]);
    assert_eq!(call(-3.0)?, Scalar::Float64(0.0));
    assert_eq!(call(0.25)?, Scalar::Float64(0.25));
    assert_eq!(call(9.0)?, Scalar::Float64(1.0));

    let between = DUFunc::new("between(x) = x > 0 && x < 10 || x == -1")?;
    let spec = between.add("(i4)")?;
    assert_eq!(spec.return_type(), DType::Bool);
    for (x, want) in [(5, true), (0, false), (10, false), (-1, true)] {
        assert_eq!(spec.invoke(&[Scalar::Int32(x)])?, Scalar::Bool(want), "x = {}", x);
    }

    let spread = DUFunc::new("spread(a, b) = max(a, b) - min(a, b)")?;
    let spec = spread.add("(u2, u2)")?;
    assert_eq!(spec.invoke(&[Scalar::UInt16(3), Scalar::UInt16(10)])?, Scalar::UInt16(7));
    let nf = DUFunc::new("notf(x) = !x")?;
    assert_eq!(nf.add("(f8)")?.invoke(&[Scalar::Float64(0.0)])?, Scalar::Bool(true));
    Ok(())
}

extern "C" fn twice(x: f64) -> f64 {
    x * 2.0
}

extern "C" fn hypot(x: f64, y: f64) -> f64 {
    x.hypot(y)
}

#[test]
fn native_host_functions() -> Result<(), UfuncError> {
    let mut backend = CraneliftBackend::new()?;
    backend.register_unary("twice", twice)?;
    backend.register_binary("hypot", hypot)?;
    let f = DUFunc::with_backend("f(x, y) = twice(x) + hypot(x, y) + 1", backend)?;
    let spec = f.compile_for_argtys(&[DType::Int32, DType::Int32], None)?;
    assert!(spec.entry().is_native());
    assert_eq!(spec.return_type(), DType::Float64);
    assert_eq!(spec.invoke(&[Scalar::Int32(3), Scalar::Int32(4)])?, Scalar::Float64(12.0));
    assert_eq!(
        spec.environment().imports(),
        &[("twice".to_string(), 1), ("hypot".to_string(), 2)]
    );
    Ok(())
}

#[test]
fn duplicate_host_registration_fails() -> Result<(), UfuncError> {
    let mut backend = CraneliftBackend::new()?;
    backend.register_unary("twice", twice)?;
    assert!(matches!(
        backend.register_unary("twice", twice),
        Err(UfuncError::FunctionExists { .. })
    ));
    Ok(())
}

#[test]
fn unknown_host_function_fails_at_compile() -> Result<(), UfuncError> {
    let f = DUFunc::new("f(x) = nope(x)")?;
    match f.add("(f8)") {
        Err(UfuncError::UnknownFunction { name, arity }) => {
            assert_eq!(name, "nope");
            assert_eq!(arity, 1);
        }
        other => panic!("unexpected: {:?}", other),
    }
    assert_eq!(f.ntypes(), 0);
    Ok(())
}

#[test]
fn every_opt_level_compiles() -> Result<(), UfuncError> {
    for level in [OptLevel::None, OptLevel::Speed, OptLevel::SpeedAndSize] {
        let backend = CraneliftBackend::with_opt_level(level)?;
        assert_eq!(backend.opt_level(), level);
        let f = DUFunc::with_backend("sub(a, b) = a - b", backend)?;
        assert_eq!(f.add("(i8, i8)")?.invoke(&[Scalar::Int64(5), Scalar::Int64(9)])?, Scalar::Int64(-4));
    }
    Ok(())
}

#[test]
fn multi_output_definitions_do_not_compile() -> Result<(), UfuncError> {
    let f = DUFunc::new("two(a, b) = a + b, a - b")?;
    assert_eq!(f.nout(), 2);
    assert!(matches!(f.add("(f8, f8)"), Err(UfuncError::UnsupportedOutputArity { .. })));
    Ok(())
}

#[test]
fn each_specialization_has_its_own_library() -> Result<(), UfuncError> {
    let f = DUFunc::new("sq(x) = x * x")?;
    let a = f.add("(i4)")?;
    let b = f.add("(f8)")?;
    assert!(a.library().has_code());
    assert_ne!(a.library().symbol(), b.library().symbol());
    assert!(a.library().symbol().starts_with("sq_"));
    Ok(())
}
