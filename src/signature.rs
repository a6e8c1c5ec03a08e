use crate::dtype::DType;
use crate::error::UfuncError;
use std::fmt;
use std::str::FromStr;

/// Input element types plus an optional return type.
///
/// Equality is structural and order-sensitive. Accepted textual forms:
///
/// - `"float64(int32, int32)"` / `"f8(i4, i4)"`
/// - `"(int32, int32)"` (return type inferred at compile time)
/// - `"ii->d"` (NumPy loop string)
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Signature {
    pub args: Vec<DType>,
    pub ret: Option<DType>,
}

impl Signature {
    pub fn new(args: Vec<DType>) -> Signature {
        Signature { args, ret: None }
    }

    pub fn with_return(mut self, ret: DType) -> Signature {
        self.ret = Some(ret);
        self
    }

    /// NumPy loop string such as `"ii->i"`; `?` stands in for an unknown return type.
    pub fn type_string(&self) -> String {
        let mut s: String = self.args.iter().map(|t| t.char_code()).collect();
        s.push_str("->");
        s.push(self.ret.map(DType::char_code).unwrap_or('?'));
        s
    }

    fn parse_loop_string(s: &str) -> Result<Signature, UfuncError> {
        let (ins, out) = s
            .split_once("->")
            .ok_or_else(|| UfuncError::InvalidSignature(s.to_string()))?;
        let mut args = Vec::new();
        for c in ins.trim().chars() {
            args.push(DType::from_char_code(c).ok_or_else(|| UfuncError::InvalidSignature(s.to_string()))?);
        }
        let mut outs = out.trim().chars();
        let ret = match (outs.next(), outs.next()) {
            (Some(c), None) => DType::from_char_code(c).ok_or_else(|| UfuncError::InvalidSignature(s.to_string()))?,
            _ => {
                return Err(UfuncError::InvalidSignature(format!(
                    "{}: exactly one output type is supported",
                    s
                )));
            }
        };
        Ok(Signature { args, ret: Some(ret) })
    }
}

impl FromStr for Signature {
    type Err = UfuncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let src = s.trim();
        if src.contains("->") {
            return Signature::parse_loop_string(src);
        }
        let open = src
            .find('(')
            .ok_or_else(|| UfuncError::InvalidSignature(src.to_string()))?;
        if !src.ends_with(')') {
            return Err(UfuncError::InvalidSignature(src.to_string()));
        }
        let head = src[..open].trim();
        let body = &src[open + 1..src.len() - 1];
        let ret = if head.is_empty() { None } else { Some(head.parse::<DType>()?) };
        let mut args = Vec::new();
        if !body.trim().is_empty() {
            for part in body.split(',') {
                args.push(part.parse::<DType>()?);
            }
        }
        Ok(Signature { args, ret })
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(ret) = self.ret {
            write!(f, "{}", ret)?;
        }
        f.write_str("(")?;
        for (i, t) in self.args.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}", t)?;
        }
        f.write_str(")")
    }
}

impl From<&[DType]> for Signature {
    fn from(args: &[DType]) -> Signature {
        Signature::new(args.to_vec())
    }
}
