use crate::array::{Layout, NdArray};
use crate::dtype::DType;
use crate::error::UfuncError;
use crate::scalar::{Literal, Scalar};
use std::fmt;

/// Static type of one call operand.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum OperandType {
    Scalar(DType),
    Array { dtype: DType, ndim: usize, layout: Layout },
}

impl OperandType {
    pub fn dtype(&self) -> DType {
        match self {
            OperandType::Scalar(t) => *t,
            OperandType::Array { dtype, .. } => *dtype,
        }
    }

    pub fn ndim(&self) -> usize {
        match self {
            OperandType::Scalar(_) => 0,
            OperandType::Array { ndim, .. } => *ndim,
        }
    }

    pub fn is_array(&self) -> bool {
        matches!(self, OperandType::Array { .. })
    }
}

impl fmt::Display for OperandType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperandType::Scalar(t) => write!(f, "{}", t),
            OperandType::Array { dtype, ndim, layout } => {
                write!(f, "array({}, {}d, {:?})", dtype, ndim, layout)
            }
        }
    }
}

/// A runtime call operand.
#[derive(Clone, Debug)]
pub enum Operand {
    Array(NdArray),
    /// A value with a fixed element type.
    Scalar(Scalar),
    /// An untyped host number.
    Literal(Literal),
}

impl Operand {
    /// Element type used to pick a specialization. Untyped literals follow
    /// the array-scalar convention (plain integers are int64).
    pub fn element_type(&self) -> DType {
        match self {
            Operand::Array(a) => a.dtype(),
            Operand::Scalar(s) => s.dtype(),
            Operand::Literal(l) => l.array_scalar_type(),
        }
    }

    pub fn operand_type(&self) -> OperandType {
        match self {
            Operand::Array(a) => OperandType::Array {
                dtype: a.dtype(),
                ndim: a.ndim(),
                layout: a.layout(),
            },
            _ => OperandType::Scalar(self.element_type()),
        }
    }

    pub fn as_array(&self) -> Option<&NdArray> {
        match self {
            Operand::Array(a) => Some(a),
            _ => None,
        }
    }

    pub fn into_array(self) -> Option<NdArray> {
        match self {
            Operand::Array(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_scalar(&self) -> Option<Scalar> {
        match self {
            Operand::Scalar(s) => Some(*s),
            _ => None,
        }
    }
}

impl From<NdArray> for Operand {
    fn from(a: NdArray) -> Self {
        Operand::Array(a)
    }
}

impl From<Scalar> for Operand {
    fn from(s: Scalar) -> Self {
        Operand::Scalar(s)
    }
}

impl From<Literal> for Operand {
    fn from(l: Literal) -> Self {
        Operand::Literal(l)
    }
}

impl From<i64> for Operand {
    fn from(v: i64) -> Self {
        Operand::Literal(Literal::Int(v))
    }
}

impl From<f64> for Operand {
    fn from(v: f64) -> Self {
        Operand::Literal(Literal::Float(v))
    }
}

impl From<bool> for Operand {
    fn from(v: bool) -> Self {
        Operand::Literal(Literal::Bool(v))
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UfuncInfo {
    pub name: String,
    pub nin: usize,
    pub nout: usize,
}

/// Result of classifying the operands of a call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InputTyping {
    /// Element types of every operand, outputs included.
    pub base_types: Vec<DType>,
    pub explicit_outputs: Vec<OperandType>,
    /// Rank of the broadcast result.
    pub ndim: usize,
    pub layout: Layout,
}

/// Broadcast typing rules consulted at call sites.
pub trait BroadcastTyping: Send + Sync {
    fn resolve_call_types(&self, info: &UfuncInfo, args: &[OperandType]) -> Result<InputTyping, UfuncError>;
}

/// NumPy operand rules: `nin` inputs optionally followed by `nout` output
/// arrays.
#[derive(Copy, Clone, Debug, Default)]
pub struct NumpyRules;

impl BroadcastTyping for NumpyRules {
    fn resolve_call_types(&self, info: &UfuncInfo, args: &[OperandType]) -> Result<InputTyping, UfuncError> {
        if args.len() != info.nin && args.len() != info.nin + info.nout {
            return Err(UfuncError::ArityMismatch {
                name: info.name.clone(),
                expected: format!("{} or {}", info.nin, info.nin + info.nout),
                got: args.len(),
            });
        }
        let explicit_outputs = args[info.nin..].to_vec();
        if let Some(bad) = explicit_outputs.iter().find(|t| !t.is_array()) {
            return Err(UfuncError::InvalidOperand(format!(
                "output operand of {} must be an array, got {}",
                info.name, bad
            )));
        }
        let ndim = args.iter().map(|t| t.ndim()).max().unwrap_or(0);
        let mut layouts = args.iter().filter_map(|t| match t {
            OperandType::Array { layout, .. } => Some(*layout),
            OperandType::Scalar(_) => None,
        });
        let layout = match layouts.next() {
            None => Layout::C,
            Some(first) if first != Layout::A && layouts.all(|l| l == first) => first,
            Some(_) => Layout::A,
        };
        Ok(InputTyping {
            base_types: args.iter().map(|t| t.dtype()).collect(),
            explicit_outputs,
            ndim,
            layout,
        })
    }
}

/// Resolved call-site signature: outputs first, then the operands as given.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CallSignature {
    pub outputs: Vec<OperandType>,
    pub args: Vec<OperandType>,
}

impl CallSignature {
    pub fn return_type(&self) -> Option<&OperandType> {
        self.outputs.first()
    }
}

impl fmt::Display for CallSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let args: Vec<String> = self.args.iter().map(|t| t.to_string()).collect();
        let outs: Vec<String> = self.outputs.iter().map(|t| t.to_string()).collect();
        write!(f, "({}) -> {}", args.join(", "), outs.join(", "))
    }
}
