mod adapter;
mod array;
mod ast;
mod backend;
pub mod broadcast;
mod codegen;
mod collect;
mod definition;
mod dtype;
mod dufunc;
mod error;
mod lexer;
mod objmode;
mod parser;
mod reduce;
mod registry;
mod resolver;
mod rt_types;
mod scalar;
mod signature;
mod specialization;
mod typeck;
mod typing;

pub use adapter::KernelAdapter;
pub use array::{Layout, NdArray, NdIndex};
pub use backend::{CompileResult, CompilerBackend, CraneliftBackend, OptLevel, TargetOptions};
pub use definition::{ElementwiseDef, MAX_ARGS};
pub use dtype::DType;
pub use dufunc::{DUFunc, DUFuncState};
pub use error::UfuncError;
pub use reduce::{compute_flat_idx, Axis, FlatIndexer, ReduceOptions, Reduced};
pub use registry::HostFunctions;
pub use rt_types::{DynamicFn, Fn1, Fn2, Fn3, HostFn, KernelFn, NativeFn};
pub use scalar::{Element, Literal, Scalar};
pub use signature::Signature;
pub use specialization::{CodeLibrary, EntryPoint, Environment, Specialization, SpecializationTable};
pub use typing::{BroadcastTyping, CallSignature, InputTyping, NumpyRules, Operand, OperandType, UfuncInfo};
