use dufunc::{CraneliftBackend, DType, DUFunc, Scalar, TargetOptions, UfuncError};

const SOURCES: [&str; 3] = [
    "f(a, b) = if(a > b, a * 2 - b, b / (a + 1))",
    "g(a, b) = max(a, b) + min(a, 3) * 0.5",
    "h(a, b) = !(a == b) || a <= 0 && b >= 1",
];

const SIGNATURES: [(DType, DType); 4] = [
    (DType::Int32, DType::Int32),
    (DType::Float64, DType::Float32),
    (DType::UInt8, DType::Int16),
    (DType::Int64, DType::UInt64),
];

fn same_value(a: Scalar, b: Scalar) -> bool {
    match (a, b) {
        (Scalar::Float32(x), Scalar::Float32(y)) if x.is_nan() && y.is_nan() => true,
        (Scalar::Float64(x), Scalar::Float64(y)) if x.is_nan() && y.is_nan() => true,
        _ => a == b,
    }
}

fn forceobj() -> TargetOptions {
    TargetOptions {
        forceobj: true,
        ..TargetOptions::default()
    }
}

#[test]
fn object_mode_agrees_with_native_code() -> Result<(), UfuncError> {
    let pairs = [(3i64, 5i64), (0, 0), (-7, 2), (100, -100), (-1, 4)];
    for src in SOURCES {
        let native = DUFunc::new(src)?;
        let boxed = DUFunc::new(src)?.with_options(forceobj());
        for (ta, tb) in SIGNATURES {
            let n = native.compile_for_argtys(&[ta, tb], None)?;
            let b = boxed.compile_for_argtys(&[ta, tb], None)?;
            assert!(n.entry().is_native());
            assert!(b.is_objectmode());
            assert!(!b.entry().is_native());
            assert!(!b.library().has_code());
            assert_eq!(n.return_type(), b.return_type(), "{} ({}, {})", src, ta, tb);
            for (x, y) in pairs {
                let args = [Scalar::Int64(x).cast(ta), Scalar::Int64(y).cast(tb)];
                let want = n.invoke(&args)?;
                let got = b.invoke(&args)?;
                assert!(same_value(want, got), "{} {:?}: native {:?}, boxed {:?}", src, args, want, got);
            }
        }
    }
    Ok(())
}

#[test]
fn object_mode_calls_through_dufunc() -> Result<(), UfuncError> {
    let f = DUFunc::new("add(a, b) = a + b")?.with_identity(0i32).with_options(forceobj());
    let r = f.call(&[Scalar::Int32(2).into(), Scalar::Int32(3).into()])?;
    assert_eq!(r.as_scalar(), Some(Scalar::Int32(5)));
    let a = dufunc::NdArray::from_vec(&[4], vec![1i32, 2, 3, 4])?;
    assert_eq!(f.reduce(&a)?.as_scalar(), Some(Scalar::Int32(10)));
    assert!(f.specializations().iter().all(|s| s.is_objectmode()));
    Ok(())
}

fn clip_backend() -> Result<CraneliftBackend, UfuncError> {
    let mut backend = CraneliftBackend::new()?;
    backend.register_dynamic("clip01", 1, DType::Float64, |args: &[Scalar]| match args {
        [x] => Ok(Scalar::Float64(x.as_f64().clamp(0.0, 1.0))),
        _ => Err(UfuncError::Internal("clip01 takes one argument".into())),
    })?;
    Ok(backend)
}

#[test]
fn dynamic_host_calls_fall_back_to_object_mode() -> Result<(), UfuncError> {
    let f = DUFunc::with_backend("f(x) = clip01(x) * 2", clip_backend()?)?;
    let spec = f.add("(f8)")?;
    assert!(spec.is_objectmode());
    assert_eq!(spec.return_type(), DType::Float64);
    assert_eq!(spec.invoke(&[Scalar::Float64(0.25)])?, Scalar::Float64(0.5));
    assert_eq!(spec.invoke(&[Scalar::Float64(7.0)])?, Scalar::Float64(2.0));
    assert_eq!(spec.environment().imports(), &[("clip01".to_string(), 1)]);

    let spec = f.add("(i4)")?;
    assert_eq!(spec.invoke(&[Scalar::Int32(-3)])?, Scalar::Float64(0.0));
    Ok(())
}

#[test]
fn nopython_refuses_object_mode() -> Result<(), UfuncError> {
    let nopython = TargetOptions {
        nopython: true,
        ..TargetOptions::default()
    };
    let f = DUFunc::with_backend("f(x) = clip01(x)", clip_backend()?)?.with_options(nopython);
    assert!(matches!(f.add("(f8)"), Err(UfuncError::Lowering(_))));
    assert_eq!(f.ntypes(), 0);

    // plain arithmetic is fine
    let g = DUFunc::new("g(x) = x + 1")?.with_options(nopython);
    assert!(g.add("(f8)")?.entry().is_native());
    Ok(())
}

#[test]
fn conflicting_target_options() -> Result<(), UfuncError> {
    let both = TargetOptions {
        nopython: true,
        forceobj: true,
    };
    let f = DUFunc::new("g(x) = x + 1")?.with_options(both);
    assert_eq!(f.target_options(), &both);
    assert!(matches!(f.add("(f8)"), Err(UfuncError::Lowering(_))));
    Ok(())
}
