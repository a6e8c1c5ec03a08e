use crate::ast::Ast;
use crate::error::UfuncError;
use crate::lexer::{tokenize, Spanned, Token};

/// Parsed `name(params..) = output[, output..]`.
pub(crate) struct ParsedDef {
    pub name: String,
    pub params: Vec<String>,
    pub outputs: Vec<Ast>,
}

type BinCtor = fn(Box<Ast>, Box<Ast>) -> Ast;

/// Binding power and constructor of a binary operator; all are left-associative.
fn binary_op(tok: &Token) -> Option<(u8, BinCtor)> {
    Some(match tok {
        Token::OrOr => (1, Ast::Or),
        Token::AndAnd => (2, Ast::And),
        Token::EqEq => (3, Ast::Eq),
        Token::NotEq => (3, Ast::Ne),
        Token::Lt => (4, Ast::Lt),
        Token::Le => (4, Ast::Le),
        Token::Gt => (4, Ast::Gt),
        Token::Ge => (4, Ast::Ge),
        Token::Plus => (5, Ast::Add),
        Token::Minus => (5, Ast::Sub),
        Token::Star => (6, Ast::Mul),
        Token::Slash => (6, Ast::Div),
        _ => return None,
    })
}

/// Precedence-climbing parser over a pre-tokenized definition.
pub(crate) struct Parser {
    tokens: Vec<Spanned>,
    pos: usize,
}

impl Parser {
    pub(crate) fn new(src: &str) -> Result<Self, UfuncError> {
        Ok(Self {
            tokens: tokenize(src)?,
            pos: 0,
        })
    }

    fn peek(&self) -> &Token {
        self.tokens.get(self.pos).map(|(t, _)| t).unwrap_or(&Token::Eof)
    }

    fn offset(&self) -> usize {
        self.tokens.get(self.pos).map(|&(_, p)| p).unwrap_or(0)
    }

    fn advance(&mut self) -> Token {
        let tok = self.peek().clone();
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
        tok
    }

    fn error(&self, what: &str) -> UfuncError {
        UfuncError::Parse(format!("expected {}, found {:?} at offset {}", what, self.peek(), self.offset()))
    }

    fn eat(&mut self, tok: &Token) -> bool {
        if self.peek() == tok {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, tok: &Token, what: &str) -> Result<(), UfuncError> {
        if self.eat(tok) { Ok(()) } else { Err(self.error(what)) }
    }

    fn ident(&mut self) -> Result<String, UfuncError> {
        if let Token::Ident(s) = self.peek().clone() {
            self.pos += 1;
            Ok(s)
        } else {
            Err(self.error("identifier"))
        }
    }

    /// Comma-separated items up to the closing parenthesis (the opening one
    /// is already consumed).
    fn list<T>(&mut self, mut item: impl FnMut(&mut Self) -> Result<T, UfuncError>) -> Result<Vec<T>, UfuncError> {
        let mut out = Vec::new();
        if self.eat(&Token::RParen) {
            return Ok(out);
        }
        loop {
            out.push(item(self)?);
            if self.eat(&Token::RParen) {
                return Ok(out);
            }
            self.expect(&Token::Comma, "',' or ')'")?;
        }
    }

    pub(crate) fn parse_definition(mut self) -> Result<ParsedDef, UfuncError> {
        let name = self.ident()?;
        self.expect(&Token::LParen, "'('")?;
        let params = self.list(Self::ident)?;
        self.expect(&Token::Assign, "'='")?;
        let mut outputs = vec![self.expr(0)?];
        while self.eat(&Token::Comma) {
            outputs.push(self.expr(0)?);
        }
        if *self.peek() != Token::Eof {
            return Err(self.error("end of definition"));
        }
        Ok(ParsedDef { name, params, outputs })
    }

    /// Parses operators binding tighter than `min_bp`.
    fn expr(&mut self, min_bp: u8) -> Result<Ast, UfuncError> {
        let mut lhs = self.unary()?;
        while let Some((bp, ctor)) = binary_op(self.peek()) {
            if bp <= min_bp {
                break;
            }
            self.advance();
            let rhs = self.expr(bp)?;
            lhs = ctor(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn unary(&mut self) -> Result<Ast, UfuncError> {
        if self.eat(&Token::Minus) {
            return Ok(Ast::Neg(Box::new(self.unary()?)));
        }
        if self.eat(&Token::Not) {
            return Ok(Ast::Not(Box::new(self.unary()?)));
        }
        self.primary()
    }

    fn primary(&mut self) -> Result<Ast, UfuncError> {
        match self.advance() {
            Token::Int(v) => Ok(Ast::Int(v)),
            Token::Float(v) => Ok(Ast::Float(v)),
            Token::LParen => {
                let e = self.expr(0)?;
                self.expect(&Token::RParen, "')'")?;
                Ok(e)
            }
            Token::Ident(s) if s == "true" => Ok(Ast::Bool(true)),
            Token::Ident(s) if s == "false" => Ok(Ast::Bool(false)),
            Token::Ident(s) => {
                if !self.eat(&Token::LParen) {
                    return Ok(Ast::Var(s));
                }
                let args = self.list(|p| p.expr(0))?;
                call(s, args)
            }
            _ => {
                self.pos = self.pos.saturating_sub(1);
                Err(self.error("number, identifier or '('"))
            }
        }
    }
}

/// Builtins become dedicated nodes; every other call is a host function.
fn call(name: String, args: Vec<Ast>) -> Result<Ast, UfuncError> {
    match (name.as_str(), args.len()) {
        ("if", 3) => {
            let mut it = args.into_iter().map(Box::new);
            match (it.next(), it.next(), it.next()) {
                (Some(c), Some(t), Some(e)) => Ok(Ast::If(c, t, e)),
                _ => Err(UfuncError::Parse("if() requires 3 arguments".into())),
            }
        }
        ("if", _) => Err(UfuncError::Parse("if() requires 3 arguments".into())),
        ("max" | "min", 2) => {
            let mut it = args.into_iter().map(Box::new);
            match (it.next(), it.next()) {
                (Some(a), Some(b)) if name == "max" => Ok(Ast::Max(a, b)),
                (Some(a), Some(b)) => Ok(Ast::Min(a, b)),
                _ => Err(UfuncError::Parse(format!("{}() requires 2 arguments", name))),
            }
        }
        _ => Ok(Ast::Call { name, args }),
    }
}
