use dufunc::{
    CompileResult, CompilerBackend, CraneliftBackend, DType, DUFunc, ElementwiseDef, Scalar, TargetOptions,
    UfuncError,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

/// Cranelift backend that counts compilations and widens the race window.
struct CountingBackend {
    inner: CraneliftBackend,
    compiles: Arc<AtomicUsize>,
}

impl CompilerBackend for CountingBackend {
    fn compile(
        &mut self,
        def: &Arc<ElementwiseDef>,
        args: &[DType],
        ret: Option<DType>,
        options: &TargetOptions,
    ) -> Result<CompileResult, UfuncError> {
        self.compiles.fetch_add(1, Ordering::SeqCst);
        thread::sleep(Duration::from_millis(20));
        self.inner.compile(def, args, ret, options)
    }
}

fn counting(src: &str) -> Result<(DUFunc<CountingBackend>, Arc<AtomicUsize>), UfuncError> {
    let compiles = Arc::new(AtomicUsize::new(0));
    let backend = CountingBackend {
        inner: CraneliftBackend::new()?,
        compiles: compiles.clone(),
    };
    Ok((DUFunc::with_backend(src, backend)?, compiles))
}

#[test]
fn concurrent_first_calls_compile_once() -> Result<(), UfuncError> {
    const THREADS: usize = 8;
    let (f, compiles) = counting("add(a, b) = a + b")?;
    let barrier = Barrier::new(THREADS);
    let results: Vec<Result<Option<Scalar>, UfuncError>> = thread::scope(|s| {
        let handles: Vec<_> = (0..THREADS)
            .map(|i| {
                let f = &f;
                let barrier = &barrier;
                s.spawn(move || -> Result<Option<Scalar>, UfuncError> {
                    barrier.wait();
                    let r = f.call(&[Scalar::Int32(i as i32).into(), Scalar::Int32(1).into()])?;
                    Ok(r.as_scalar())
                })
            })
            .collect();
        handles
            .into_iter()
            .map(|h| match h.join() {
                Ok(r) => r,
                Err(_) => Err(UfuncError::Internal("worker panicked".into())),
            })
            .collect()
    });
    for (i, r) in results.into_iter().enumerate() {
        assert_eq!(r?, Some(Scalar::Int32(i as i32 + 1)));
    }
    assert_eq!(compiles.load(Ordering::SeqCst), 1);
    assert_eq!(f.ntypes(), 1);
    Ok(())
}

#[test]
fn concurrent_distinct_signatures() -> Result<(), UfuncError> {
    let (f, compiles) = counting("mul(a, b) = a * b")?;
    let sigs = ["(i1, i1)", "(i2, i2)", "(i4, i4)", "(f4, f4)", "(f8, f8)"];
    let barrier = Barrier::new(sigs.len() * 2);
    thread::scope(|s| -> Result<(), UfuncError> {
        let handles: Vec<_> = sigs
            .iter()
            .chain(sigs.iter())
            .map(|sig| {
                let f = &f;
                let barrier = &barrier;
                s.spawn(move || -> Result<(), UfuncError> {
                    barrier.wait();
                    f.add(sig).map(|_| ())
                })
            })
            .collect();
        for h in handles {
            match h.join() {
                Ok(r) => r?,
                Err(_) => return Err(UfuncError::Internal("worker panicked".into())),
            }
        }
        Ok(())
    })?;
    assert_eq!(compiles.load(Ordering::SeqCst), sigs.len());
    assert_eq!(f.ntypes(), sigs.len());
    let mut types = f.types();
    types.sort();
    assert_eq!(types, vec!["bb->b", "dd->d", "ff->f", "hh->h", "ii->i"]);
    Ok(())
}

#[test]
fn readers_see_frozen_table() -> Result<(), UfuncError> {
    let (f, compiles) = counting("add(a, b) = a + b")?;
    f.add("(f8, f8)")?;
    f.disable_compile()?;
    thread::scope(|s| {
        for i in 0..4 {
            let f = &f;
            s.spawn(move || {
                for j in 0..50 {
                    let r = f.call(&[Scalar::Int32(i).into(), Scalar::Int16(j).into()]);
                    assert_eq!(r.ok().and_then(|r| r.as_scalar()), Some(Scalar::Float64((i + j as i32) as f64)));
                }
            });
        }
    });
    assert_eq!(compiles.load(Ordering::SeqCst), 1);
    assert_eq!(f.ntypes(), 1);
    Ok(())
}
