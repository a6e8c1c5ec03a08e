use thiserror::Error;

#[derive(Debug, Error)]
pub enum UfuncError {
    #[error("parse error: {0}")]
    Parse(String),
    #[error("unknown identifier: {0}")]
    UnknownIdent(String),
    #[error("unknown function: {name}/{arity}")]
    UnknownFunction { name: String, arity: u8 },
    #[error("function already exists: {name}/{arity}")]
    FunctionExists { name: String, arity: u8 },
    #[error("invalid signature: {0}")]
    InvalidSignature(String),
    #[error("compilation disabled for {0}")]
    CompilationDisabled(String),
    #[error("cannot call {name} with types ({types})")]
    NoMatchingOverload { name: String, types: String },
    #[error("typing gufuncs (nout > 1) is not implemented: {name} has {nout} outputs")]
    UnsupportedOutputArity { name: String, nout: usize },
    #[error("{0}")]
    InvalidAxis(String),
    #[error("unexpected keyword arguments to ufunc: {0}")]
    UnexpectedArgument(String),
    #[error("signature {requested} conflicts with registered {existing} for {name}")]
    ConflictingSignature {
        name: String,
        existing: String,
        requested: String,
    },
    #[error("{name} takes {expected} arguments, got {got}")]
    ArityMismatch {
        name: String,
        expected: String,
        got: usize,
    },
    #[error("operands could not be broadcast together with shapes {0}")]
    Broadcast(String),
    #[error("invalid operand: {0}")]
    InvalidOperand(String),
    #[error("zero-size array to reduction operation {0} which has no identity")]
    EmptyReduction(String),
    #[error("cannot disable compilation of {0}: no signatures have been compiled")]
    FreezeEmpty(String),
    #[error("typing error: {0}")]
    Typing(String),
    #[error("nopython lowering failed: {0}")]
    Lowering(String),
    #[error("jit internal error: {0}")]
    Internal(String),
}
