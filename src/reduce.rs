use crate::array::{NdArray, NdIndex};
use crate::dtype::DType;
use crate::error::UfuncError;
use crate::scalar::Scalar;
use std::fmt;

/// Axis selection of a reduction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Axis {
    Index(isize),
    Tuple(Vec<isize>),
    /// Every axis.
    All,
    /// No axis given. Only valid for one-dimensional arrays.
    None,
}

impl Default for Axis {
    fn default() -> Self {
        Axis::Index(0)
    }
}

impl From<isize> for Axis {
    fn from(a: isize) -> Self {
        Axis::Index(a)
    }
}

impl From<Vec<isize>> for Axis {
    fn from(a: Vec<isize>) -> Self {
        Axis::Tuple(a)
    }
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Axis::Index(a) => write!(f, "{}", a),
            Axis::Tuple(t) => write!(f, "{:?}", t),
            Axis::All => f.write_str("all"),
            Axis::None => f.write_str("None"),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ReduceOptions {
    pub axis: Axis,
    /// Accumulator type; the array's dtype when unset.
    pub dtype: Option<DType>,
    /// Seed of the fold; the ufunc identity when unset.
    pub initial: Option<Scalar>,
}

impl ReduceOptions {
    pub fn axis(axis: impl Into<Axis>) -> Self {
        Self {
            axis: axis.into(),
            ..Self::default()
        }
    }

    pub fn with_dtype(mut self, dtype: DType) -> Self {
        self.dtype = Some(dtype);
        self
    }

    pub fn with_initial(mut self, initial: impl Into<Scalar>) -> Self {
        self.initial = Some(initial.into());
        self
    }
}

/// Output of a reduction: a scalar when the input was one-dimensional (or
/// every axis was reduced), an array otherwise.
#[derive(Clone, Debug)]
pub enum Reduced {
    Scalar(Scalar),
    Array(NdArray),
}

impl Reduced {
    pub fn as_scalar(&self) -> Option<Scalar> {
        match self {
            Reduced::Scalar(s) => Some(*s),
            Reduced::Array(_) => None,
        }
    }

    pub fn into_array(self) -> Option<NdArray> {
        match self {
            Reduced::Array(a) => Some(a),
            Reduced::Scalar(_) => None,
        }
    }

    pub fn dtype(&self) -> DType {
        match self {
            Reduced::Scalar(s) => s.dtype(),
            Reduced::Array(a) => a.dtype(),
        }
    }
}

/// Flat element offset, in the result buffer, of input coordinate `idx`
/// when `axis` is reduced away: `Σ_{a≠axis} idx[a] · strides[pos(a)] / itemsize`.
///
/// `strides` are the result's byte strides (one fewer than `idx`).
pub fn compute_flat_idx(strides: &[isize], itemsize: usize, idx: &[usize], axis: usize) -> isize {
    let itemsize = itemsize as isize;
    let mut flat = 0isize;
    for (a, &i) in idx.iter().enumerate() {
        if a == axis {
            continue;
        }
        let pos = if a < axis { a } else { a - 1 };
        flat += i as isize * strides[pos] / itemsize;
    }
    flat
}

fn flat_idx_first(strides: &[isize], itemsize: isize, idx: &[usize], _axis: usize) -> isize {
    idx[1..].iter().zip(strides).map(|(&i, s)| i as isize * s / itemsize).sum()
}

fn flat_idx_last(strides: &[isize], itemsize: isize, idx: &[usize], _axis: usize) -> isize {
    idx[..idx.len() - 1].iter().zip(strides).map(|(&i, s)| i as isize * s / itemsize).sum()
}

fn flat_idx_middle(strides: &[isize], itemsize: isize, idx: &[usize], axis: usize) -> isize {
    let head: isize = idx[..axis].iter().zip(&strides[..axis]).map(|(&i, s)| i as isize * s / itemsize).sum();
    let tail: isize = idx[axis + 1..].iter().zip(&strides[axis..]).map(|(&i, s)| i as isize * s / itemsize).sum();
    head + tail
}

type FlatIdxFn = fn(&[isize], isize, &[usize], usize) -> isize;

/// [`compute_flat_idx`] with the axis test hoisted out of the loop: one of
/// three offset functions is picked per call shape.
#[derive(Copy, Clone)]
pub struct FlatIndexer {
    axis: usize,
    itemsize: isize,
    f: FlatIdxFn,
}

impl FlatIndexer {
    /// `ndim` is the rank of the input; `axis < ndim`.
    pub fn new(ndim: usize, axis: usize, itemsize: usize) -> FlatIndexer {
        let f: FlatIdxFn = if axis == 0 {
            flat_idx_first
        } else if axis + 1 == ndim {
            flat_idx_last
        } else {
            flat_idx_middle
        };
        FlatIndexer {
            axis,
            itemsize: itemsize as isize,
            f,
        }
    }

    #[inline]
    pub fn offset(&self, strides: &[isize], idx: &[usize]) -> isize {
        (self.f)(strides, self.itemsize, idx, self.axis)
    }
}

fn check_axis(axis: isize, ndim: usize) -> Result<usize, UfuncError> {
    if axis < 0 || axis as usize >= ndim {
        return Err(UfuncError::InvalidAxis(format!(
            "Invalid axis {} for array of dimension {}",
            axis, ndim
        )));
    }
    Ok(axis as usize)
}

fn check_axes(axes: &[isize], ndim: usize) -> Result<Vec<usize>, UfuncError> {
    if axes.is_empty() {
        return Err(UfuncError::InvalidAxis("empty axis tuple".into()));
    }
    let mut out: Vec<usize> = Vec::with_capacity(axes.len());
    for &a in axes {
        let a = check_axis(a, ndim)?;
        if out.contains(&a) {
            return Err(UfuncError::InvalidAxis(format!("duplicate value in 'axis': {:?}", axes)));
        }
        out.push(a);
    }
    Ok(out)
}

/// Generic axis reduction over a binary fold.
///
/// `fold(acc, elem)` is called in C order of the input coordinates; its
/// result is stored back with the accumulator type.
pub(crate) struct Reducer<'a, F> {
    pub name: &'a str,
    pub identity: Option<Scalar>,
    pub fold: F,
}

impl<F> Reducer<'_, F>
where
    F: FnMut(Scalar, Scalar) -> Result<Scalar, UfuncError>,
{
    pub fn run(&mut self, array: &NdArray, opts: &ReduceOptions) -> Result<Reduced, UfuncError> {
        let ndim = array.ndim();
        if ndim == 0 {
            return Err(UfuncError::InvalidAxis(format!(
                "cannot reduce a 0-d array with {}",
                self.name
            )));
        }
        self.check_reorderable(&opts.axis)?;
        let acc = opts.dtype.unwrap_or(array.dtype());
        if ndim == 1 {
            match &opts.axis {
                Axis::Index(a) => {
                    check_axis(*a, 1)?;
                }
                Axis::Tuple(t) => {
                    check_axes(t, 1)?;
                }
                Axis::All | Axis::None => {}
            }
            return self.reduce_1d(array, acc, opts.initial).map(Reduced::Scalar);
        }
        match &opts.axis {
            Axis::None => Err(UfuncError::InvalidAxis("'axis' must be specified".into())),
            Axis::Index(a) => {
                let a = check_axis(*a, ndim)?;
                self.reduce_axis(array, a, acc, opts.initial).map(Reduced::Array)
            }
            Axis::Tuple(t) => {
                let axes = check_axes(t, ndim)?;
                self.reduce_axes(array, axes, acc, opts.initial)
            }
            Axis::All => self.reduce_axes(array, (0..ndim).collect(), acc, opts.initial),
        }
    }

    fn check_reorderable(&self, axis: &Axis) -> Result<(), UfuncError> {
        if self.identity.is_some() {
            return Ok(());
        }
        match axis {
            Axis::Index(_) => Ok(()),
            Axis::Tuple(t) if t.len() == 1 => Ok(()),
            _ => Err(UfuncError::InvalidAxis(format!(
                "reduction operation '{}' is not reorderable, so at most one axis may be specified",
                self.name
            ))),
        }
    }

    fn seed(&self, initial: Option<Scalar>, acc: DType) -> Option<Scalar> {
        initial.or(self.identity).map(|s| s.cast(acc))
    }

    fn reduce_1d(&mut self, array: &NdArray, acc: DType, initial: Option<Scalar>) -> Result<Scalar, UfuncError> {
        let n = array.shape()[0];
        let (mut r, start) = match self.seed(initial, acc) {
            Some(s) => (s, 0),
            None if n == 0 => return Err(UfuncError::EmptyReduction(self.name.to_string())),
            None => (array.get_unchecked(&[0]).cast(acc), 1),
        };
        for i in start..n {
            r = (self.fold)(r, array.get_unchecked(&[i]))?.cast(acc);
        }
        Ok(r)
    }

    fn reduce_axis(
        &mut self,
        array: &NdArray,
        axis: usize,
        acc: DType,
        initial: Option<Scalar>,
    ) -> Result<NdArray, UfuncError> {
        let mut shape = array.shape().to_vec();
        let len = shape.remove(axis);
        let seed = self.seed(initial, acc);
        let copy_seed = seed.is_none();

        let mut r = match seed {
            Some(s) => NdArray::full(acc, &shape, s),
            None => {
                let mut r = NdArray::zeros(acc, &shape);
                if r.is_empty() {
                    return Ok(r);
                }
                if len == 0 {
                    return Err(UfuncError::EmptyReduction(self.name.to_string()));
                }
                let mut src = Vec::with_capacity(array.ndim());
                let mut it = NdIndex::new(&shape);
                while let Some(idx) = it.next_index() {
                    src.clear();
                    src.extend_from_slice(&idx[..axis]);
                    src.push(0);
                    src.extend_from_slice(&idx[axis..]);
                    r.set_unchecked(idx, array.get_unchecked(&src));
                }
                r
            }
        };

        let strides = r.strides().to_vec();
        let indexer = FlatIndexer::new(array.ndim(), axis, r.itemsize());
        let mut it = NdIndex::new(array.shape());
        while let Some(idx) = it.next_index() {
            if copy_seed && idx[axis] == 0 {
                continue;
            }
            let pos = indexer.offset(&strides, idx);
            let lhs = r.get_flat(pos);
            let v = (self.fold)(lhs, array.get_unchecked(idx))?;
            r.set_flat(pos, v);
        }
        Ok(r)
    }

    /// Reduces the smallest axis first, then recurses on the remaining ones
    /// shifted down by one. `initial` only seeds the first step.
    fn reduce_axes(
        &mut self,
        array: &NdArray,
        axes: Vec<usize>,
        acc: DType,
        initial: Option<Scalar>,
    ) -> Result<Reduced, UfuncError> {
        let Some(&min) = axes.iter().min() else {
            return Err(UfuncError::InvalidAxis("empty axis tuple".into()));
        };
        let r = self.reduce_axis(array, min, acc, initial)?;
        if axes.len() == 1 {
            return Ok(Reduced::Array(r));
        }
        let rest: Vec<usize> = axes.iter().filter(|&&a| a != min).map(|&a| a - 1).collect();
        if r.ndim() == 1 {
            return self.reduce_1d(&r, acc, None).map(Reduced::Scalar);
        }
        self.reduce_axes(&r, rest, acc, None)
    }
}
