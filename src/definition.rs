use crate::ast::Ast;
use crate::collect::{collect_calls, collect_vars};
use crate::error::UfuncError;
use crate::parser::Parser;
use std::collections::HashMap;

/// Upper bound on the number of parameters of an elementwise definition.
/// The native kernel ABI passes arguments in a fixed array of slots.
pub const MAX_ARGS: usize = 16;

/// The base definition a dynamic ufunc is specialized from:
/// `name(p1, p2, ..) = expr[, expr..]`.
///
/// Each comma-separated output expression is one ufunc output; only
/// single-output definitions can be compiled.
#[derive(Clone, Debug)]
pub struct ElementwiseDef {
    name: String,
    params: Vec<String>,
    pub(crate) outputs: Vec<Ast>,
    /// Map from parameter name to its position.
    pub(crate) param_index: HashMap<String, usize>,
    source: String,
}

impl ElementwiseDef {
    pub fn parse(source: &str) -> Result<ElementwiseDef, UfuncError> {
        let parsed = Parser::new(source)?.parse_definition()?;
        if parsed.params.is_empty() {
            return Err(UfuncError::Parse(format!("{} takes no parameters", parsed.name)));
        }
        if parsed.params.len() > MAX_ARGS {
            return Err(UfuncError::Parse(format!(
                "{} has {} parameters; at most {} are supported",
                parsed.name,
                parsed.params.len(),
                MAX_ARGS
            )));
        }
        let mut param_index = HashMap::new();
        for (i, p) in parsed.params.iter().enumerate() {
            if param_index.insert(p.clone(), i).is_some() {
                return Err(UfuncError::Parse(format!("duplicate parameter '{}'", p)));
            }
        }
        for out in &parsed.outputs {
            for name in collect_vars(out) {
                if !param_index.contains_key(&name) {
                    return Err(UfuncError::UnknownIdent(name));
                }
            }
        }
        Ok(ElementwiseDef {
            name: parsed.name,
            params: parsed.params,
            outputs: parsed.outputs,
            param_index,
            source: source.trim().to_string(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn params(&self) -> &[String] {
        &self.params
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn nin(&self) -> usize {
        self.params.len()
    }

    pub fn nout(&self) -> usize {
        self.outputs.len()
    }

    /// Host functions the definition calls, as (name, arity).
    pub fn host_calls(&self) -> Vec<(String, u8)> {
        let mut out = Vec::new();
        for o in &self.outputs {
            for c in collect_calls(o) {
                if !out.contains(&c) {
                    out.push(c);
                }
            }
        }
        out
    }

    pub(crate) fn body(&self) -> Result<&Ast, UfuncError> {
        match self.outputs.as_slice() {
            [single] => Ok(single),
            _ => Err(UfuncError::UnsupportedOutputArity {
                name: self.name.clone(),
                nout: self.outputs.len(),
            }),
        }
    }
}
