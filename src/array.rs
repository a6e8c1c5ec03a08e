use crate::dtype::DType;
use crate::error::UfuncError;
use crate::scalar::{Element, Scalar};

/// Memory layout of an array operand, as seen by call-site typing.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Layout {
    /// Row-major contiguous.
    C,
    /// Column-major contiguous.
    F,
    /// Anything else.
    A,
}

/// A typed N-dimensional array with byte strides.
///
/// Strides may describe any view of the buffer (transposed, permuted, or
/// broadcast with zero strides). Freshly allocated arrays are C-contiguous.
#[derive(Clone, Debug)]
pub struct NdArray {
    dtype: DType,
    shape: Vec<usize>,
    strides: Vec<isize>,
    offset: usize,
    data: Vec<u8>,
}

pub(crate) fn c_strides(shape: &[usize], itemsize: usize) -> Vec<isize> {
    let mut strides = vec![0isize; shape.len()];
    let mut acc = itemsize as isize;
    for (s, &dim) in strides.iter_mut().zip(shape).rev() {
        *s = acc;
        acc *= dim.max(1) as isize;
    }
    strides
}

impl NdArray {
    pub fn zeros(dtype: DType, shape: &[usize]) -> NdArray {
        let len: usize = shape.iter().product();
        NdArray {
            dtype,
            shape: shape.to_vec(),
            strides: c_strides(shape, dtype.itemsize()),
            offset: 0,
            data: vec![0u8; len * dtype.itemsize()],
        }
    }

    pub fn full(dtype: DType, shape: &[usize], value: Scalar) -> NdArray {
        let mut arr = NdArray::zeros(dtype, shape);
        let value = value.cast(dtype);
        let size = dtype.itemsize();
        for chunk in arr.data.chunks_exact_mut(size) {
            value.write_ne(chunk);
        }
        arr
    }

    pub fn from_vec<T: Element>(shape: &[usize], values: Vec<T>) -> Result<NdArray, UfuncError> {
        let scalars: Vec<Scalar> = values.into_iter().map(Element::into_scalar).collect();
        NdArray::from_scalars(T::DTYPE, shape, &scalars)
    }

    /// Builds a C-contiguous array, casting every value to `dtype`.
    pub fn from_scalars(dtype: DType, shape: &[usize], values: &[Scalar]) -> Result<NdArray, UfuncError> {
        let len: usize = shape.iter().product();
        if len != values.len() {
            return Err(UfuncError::InvalidOperand(format!(
                "cannot build array of shape {:?} from {} values",
                shape,
                values.len()
            )));
        }
        let mut arr = NdArray::zeros(dtype, shape);
        let size = dtype.itemsize();
        for (chunk, v) in arr.data.chunks_exact_mut(size).zip(values) {
            v.cast(dtype).write_ne(chunk);
        }
        Ok(arr)
    }

    pub fn dtype(&self) -> DType {
        self.dtype
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// Strides in bytes.
    pub fn strides(&self) -> &[isize] {
        &self.strides
    }

    pub fn ndim(&self) -> usize {
        self.shape.len()
    }

    pub fn itemsize(&self) -> usize {
        self.dtype.itemsize()
    }

    pub fn len(&self) -> usize {
        self.shape.iter().product()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn layout(&self) -> Layout {
        let itemsize = self.itemsize();
        if self.strides == c_strides(&self.shape, itemsize) {
            return Layout::C;
        }
        let mut rev: Vec<usize> = self.shape.clone();
        rev.reverse();
        let mut f = c_strides(&rev, itemsize);
        f.reverse();
        if self.strides == f {
            Layout::F
        } else {
            Layout::A
        }
    }

    fn byte_offset(&self, index: &[usize]) -> usize {
        let mut off = self.offset as isize;
        for (i, s) in index.iter().zip(&self.strides) {
            off += *i as isize * s;
        }
        off as usize
    }

    fn check_index(&self, index: &[usize]) -> Result<(), UfuncError> {
        if index.len() != self.ndim() || index.iter().zip(&self.shape).any(|(i, d)| i >= d) {
            return Err(UfuncError::InvalidOperand(format!(
                "index {:?} out of bounds for shape {:?}",
                index, self.shape
            )));
        }
        Ok(())
    }

    pub fn get(&self, index: &[usize]) -> Result<Scalar, UfuncError> {
        self.check_index(index)?;
        Ok(self.get_unchecked(index))
    }

    /// Stores `value` cast to the array's dtype.
    pub fn set(&mut self, index: &[usize], value: Scalar) -> Result<(), UfuncError> {
        self.check_index(index)?;
        self.set_unchecked(index, value);
        Ok(())
    }

    pub(crate) fn get_unchecked(&self, index: &[usize]) -> Scalar {
        let off = self.byte_offset(index);
        Scalar::read_ne(self.dtype, &self.data[off..off + self.itemsize()])
    }

    pub(crate) fn set_unchecked(&mut self, index: &[usize], value: Scalar) {
        let off = self.byte_offset(index);
        let size = self.itemsize();
        value.cast(self.dtype).write_ne(&mut self.data[off..off + size]);
    }

    /// Element at position `pos` of the raveled buffer. Only meaningful for
    /// C-contiguous arrays.
    pub(crate) fn get_flat(&self, pos: isize) -> Scalar {
        let off = self.offset + pos as usize * self.itemsize();
        Scalar::read_ne(self.dtype, &self.data[off..off + self.itemsize()])
    }

    pub(crate) fn set_flat(&mut self, pos: isize, value: Scalar) {
        let size = self.itemsize();
        let off = self.offset + pos as usize * size;
        value.cast(self.dtype).write_ne(&mut self.data[off..off + size]);
    }

    /// A view with axes reordered; `axes` must be a permutation of `0..ndim`.
    pub fn permute_axes(&self, axes: &[usize]) -> Result<NdArray, UfuncError> {
        let mut seen = vec![false; self.ndim()];
        if axes.len() != self.ndim() {
            return Err(UfuncError::InvalidOperand(format!("axes {:?} don't match array", axes)));
        }
        for &a in axes {
            if a >= self.ndim() || seen[a] {
                return Err(UfuncError::InvalidOperand(format!("axes {:?} don't match array", axes)));
            }
            seen[a] = true;
        }
        let mut out = self.clone();
        out.shape = axes.iter().map(|&a| self.shape[a]).collect();
        out.strides = axes.iter().map(|&a| self.strides[a]).collect();
        Ok(out)
    }

    pub fn transpose(&self) -> NdArray {
        let mut out = self.clone();
        out.shape.reverse();
        out.strides.reverse();
        out
    }

    /// Copy into a fresh C-contiguous array of another dtype.
    pub fn astype(&self, dtype: DType) -> NdArray {
        let mut out = NdArray::zeros(dtype, &self.shape);
        let mut it = NdIndex::new(&self.shape);
        while let Some(idx) = it.next_index() {
            let v = self.get_unchecked(idx);
            out.set_unchecked(idx, v);
        }
        out
    }

    /// Elements in C order.
    pub fn to_scalars(&self) -> Vec<Scalar> {
        let mut out = Vec::with_capacity(self.len());
        let mut it = NdIndex::new(&self.shape);
        while let Some(idx) = it.next_index() {
            out.push(self.get_unchecked(idx));
        }
        out
    }

    pub fn to_vec<T: Element>(&self) -> Vec<T> {
        self.to_scalars().into_iter().map(T::cast_from).collect()
    }
}

/// C-order odometer over every coordinate of a shape.
///
/// A rank-0 shape yields the single empty index; any zero-length dimension
/// yields nothing.
pub struct NdIndex {
    shape: Vec<usize>,
    index: Vec<usize>,
    started: bool,
    done: bool,
}

impl NdIndex {
    pub fn new(shape: &[usize]) -> NdIndex {
        NdIndex {
            shape: shape.to_vec(),
            index: vec![0; shape.len()],
            started: false,
            done: shape.iter().any(|&d| d == 0),
        }
    }

    pub fn next_index(&mut self) -> Option<&[usize]> {
        if self.done {
            return None;
        }
        if !self.started {
            self.started = true;
            return Some(&self.index);
        }
        let mut axis = self.shape.len();
        loop {
            if axis == 0 {
                self.done = true;
                return None;
            }
            axis -= 1;
            self.index[axis] += 1;
            if self.index[axis] < self.shape[axis] {
                return Some(&self.index);
            }
            self.index[axis] = 0;
        }
    }
}
