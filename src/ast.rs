/// Nodes of an elementwise definition body.
///
/// Every node has an element type assigned by `typeck`; comparisons and logic
/// produce `bool`, arithmetic follows NumPy promotion.
#[derive(Clone, Debug, PartialEq)]
pub(crate) enum Ast {
    /// Integer literal (e.g. 1, 42). Weakly typed: adopts the other operand's type.
    Int(i64),
    /// Float literal (e.g. 0.5, 1e3). Weakly typed within the float kind.
    Float(f64),
    /// `true` / `false`
    Bool(bool),
    /// Parameter reference
    Var(String),
    /// Unary negation (-x)
    Neg(Box<Ast>),
    /// Logical not (!x)
    Not(Box<Ast>),
    /// a + b
    Add(Box<Ast>, Box<Ast>),
    /// a - b
    Sub(Box<Ast>, Box<Ast>),
    /// a * b
    Mul(Box<Ast>, Box<Ast>),
    /// True division a / b; integer operands produce float64.
    Div(Box<Ast>, Box<Ast>),
    /// a == b
    Eq(Box<Ast>, Box<Ast>),
    /// a != b
    Ne(Box<Ast>, Box<Ast>),
    /// a < b
    Lt(Box<Ast>, Box<Ast>),
    /// a <= b
    Le(Box<Ast>, Box<Ast>),
    /// a > b
    Gt(Box<Ast>, Box<Ast>),
    /// a >= b
    Ge(Box<Ast>, Box<Ast>),
    /// Short-circuit a && b on truthiness (nonzero).
    And(Box<Ast>, Box<Ast>),
    /// Short-circuit a || b on truthiness (nonzero).
    Or(Box<Ast>, Box<Ast>),
    /// if(cond, then, else); cond is tested for truthiness.
    If(Box<Ast>, Box<Ast>, Box<Ast>),
    /// max(a, b); NaN-propagating for floats.
    Max(Box<Ast>, Box<Ast>),
    /// min(a, b); NaN-propagating for floats.
    Min(Box<Ast>, Box<Ast>),
    /// Host function call name(args..).
    Call { name: String, args: Vec<Ast> },
}

impl Ast {
    /// Direct subexpressions, left to right.
    pub(crate) fn children(&self) -> Vec<&Ast> {
        match self {
            Ast::Int(_) | Ast::Float(_) | Ast::Bool(_) | Ast::Var(_) => Vec::new(),
            Ast::Neg(a) | Ast::Not(a) => vec![&**a],
            Ast::Add(a, b)
            | Ast::Sub(a, b)
            | Ast::Mul(a, b)
            | Ast::Div(a, b)
            | Ast::Eq(a, b)
            | Ast::Ne(a, b)
            | Ast::Lt(a, b)
            | Ast::Le(a, b)
            | Ast::Gt(a, b)
            | Ast::Ge(a, b)
            | Ast::And(a, b)
            | Ast::Or(a, b)
            | Ast::Max(a, b)
            | Ast::Min(a, b) => vec![&**a, &**b],
            Ast::If(c, t, e) => vec![&**c, &**t, &**e],
            Ast::Call { args, .. } => args.iter().collect(),
        }
    }

    /// Pre-order traversal.
    pub(crate) fn visit<'a>(&'a self, f: &mut impl FnMut(&'a Ast)) {
        f(self);
        for child in self.children() {
            child.visit(f);
        }
    }
}
