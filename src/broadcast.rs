//! Reference N-dimensional broadcasting loop.

use crate::array::{NdArray, NdIndex};
use crate::error::UfuncError;
use crate::scalar::Scalar;
use crate::typing::Operand;

/// NumPy broadcasting of several shapes into one.
pub fn broadcast_shapes(shapes: &[&[usize]]) -> Result<Vec<usize>, UfuncError> {
    let ndim = shapes.iter().map(|s| s.len()).max().unwrap_or(0);
    let mut out = vec![1usize; ndim];
    for shape in shapes {
        let pad = ndim - shape.len();
        for (j, &d) in shape.iter().enumerate() {
            let cur = &mut out[pad + j];
            if *cur == 1 {
                *cur = d;
            } else if d != 1 && d != *cur {
                return Err(UfuncError::Broadcast(
                    shapes.iter().map(|s| format!("{:?}", s)).collect::<Vec<_>>().join(" "),
                ));
            }
        }
    }
    Ok(out)
}

/// Result shape of broadcasting all array operands (scalars are rank 0).
pub fn broadcast_operands(inputs: &[Operand]) -> Result<Vec<usize>, UfuncError> {
    let shapes: Vec<&[usize]> = inputs
        .iter()
        .map(|op| op.as_array().map(|a| a.shape()).unwrap_or(&[]))
        .collect();
    broadcast_shapes(&shapes)
}

fn source_index(out_idx: &[usize], shape: &[usize], buf: &mut Vec<usize>) {
    buf.clear();
    let pad = out_idx.len() - shape.len();
    for (j, &d) in shape.iter().enumerate() {
        buf.push(if d == 1 { 0 } else { out_idx[pad + j] });
    }
}

/// Calls `body` once per element of `out`, in C order, with the broadcast
/// input values, and stores the result (cast to `out`'s dtype).
///
/// `out` must already have the broadcast shape of `inputs`.
pub fn execute<F>(inputs: &[Operand], out: &mut NdArray, mut body: F) -> Result<(), UfuncError>
where
    F: FnMut(&[Scalar]) -> Result<Scalar, UfuncError>,
{
    let shape = broadcast_operands(inputs)?;
    if broadcast_shapes(&[shape.as_slice(), out.shape()])? != out.shape() {
        return Err(UfuncError::Broadcast(format!(
            "{:?} (output) {:?} (inputs)",
            out.shape(),
            shape
        )));
    }
    let mut values: Vec<Scalar> = inputs
        .iter()
        .map(|op| match op {
            Operand::Array(a) => Scalar::zero(a.dtype()),
            Operand::Scalar(s) => *s,
            Operand::Literal(l) => l.to_scalar(),
        })
        .collect();
    let mut src = Vec::new();
    let out_shape = out.shape().to_vec();
    let mut it = NdIndex::new(&out_shape);
    while let Some(idx) = it.next_index() {
        for (slot, op) in values.iter_mut().zip(inputs) {
            if let Operand::Array(a) = op {
                source_index(idx, a.shape(), &mut src);
                *slot = a.get_unchecked(&src);
            }
        }
        let r = body(&values)?;
        out.set_unchecked(idx, r);
    }
    Ok(())
}
