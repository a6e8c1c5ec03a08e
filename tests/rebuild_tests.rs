use dufunc::{DType, DUFunc, DUFuncState, Scalar, Signature, TargetOptions, UfuncError};

#[test]
fn snapshot_round_trips_through_rebuild() -> Result<(), UfuncError> {
    let f = DUFunc::new("add(a, b) = a + b")?.with_identity(0i32);
    f.add("(i4, i4)")?;
    f.add("f8(f8, f8)")?;
    f.disable_compile()?;

    let state = f.snapshot();
    assert_eq!(state.definition, "add(a, b) = a + b");
    assert_eq!(state.identity, Some(Scalar::Int32(0)));
    assert!(state.frozen);
    assert_eq!(state.signatures.len(), 2);

    let g = DUFunc::rebuild(&state)?;
    assert_eq!(g.name(), "add");
    assert_eq!(g.types(), f.types());
    assert_eq!(g.identity(), f.identity());
    assert!(g.is_frozen());
    assert_eq!(g.snapshot(), state);

    // frozen promotion behaves the same on the copy
    let r = g.call(&[Scalar::Int16(2).into(), Scalar::Int16(3).into()])?;
    assert_eq!(r.as_scalar(), Some(Scalar::Int32(5)));
    assert!(matches!(g.add("(i8, i8)"), Err(UfuncError::CompilationDisabled(_))));
    Ok(())
}

#[test]
fn rebuild_keeps_compiling_when_not_frozen() -> Result<(), UfuncError> {
    let state = DUFuncState {
        definition: "scale(x) = x * 3".to_string(),
        identity: None,
        frozen: false,
        signatures: vec![Signature::new(vec![DType::Int64])],
        options: TargetOptions {
            forceobj: true,
            ..TargetOptions::default()
        },
    };
    let f = DUFunc::rebuild(&state)?;
    assert_eq!(f.types(), vec!["l->l"]);
    assert!(f.target_options().forceobj);
    assert!(f.specializations()[0].is_objectmode());
    let r = f.call(&[Scalar::Float32(1.5).into()])?;
    assert_eq!(r.as_scalar(), Some(Scalar::Float32(4.5)));
    assert_eq!(f.ntypes(), 2);
    Ok(())
}

#[test]
fn rebuilding_a_frozen_empty_state_fails() {
    let state = DUFuncState {
        definition: "neg(x) = -x".to_string(),
        identity: None,
        frozen: true,
        signatures: Vec::new(),
        options: TargetOptions::default(),
    };
    assert!(matches!(DUFunc::rebuild(&state), Err(UfuncError::FreezeEmpty(_))));
}

#[test]
fn rebuild_reports_bad_definitions() {
    let state = DUFuncState {
        definition: "neg(x) = -y".to_string(),
        identity: None,
        frozen: false,
        signatures: Vec::new(),
        options: TargetOptions::default(),
    };
    assert!(matches!(DUFunc::rebuild(&state), Err(UfuncError::UnknownIdent(_))));
}
