use crate::error::UfuncError;
use std::iter::Peekable;
use std::str::CharIndices;

#[derive(Clone, Debug, PartialEq)]
pub(crate) enum Token {
    Ident(String),
    Int(i64),
    Float(f64),
    Plus,
    Minus,
    Star,
    Slash,
    Assign,
    EqEq,
    NotEq,
    Not,
    Lt,
    Le,
    Gt,
    Ge,
    AndAnd,
    OrOr,
    LParen,
    RParen,
    Comma,
    Eof,
}

/// A token and the byte offset it starts at.
pub(crate) type Spanned = (Token, usize);

/// Splits a definition into tokens, ending with `Token::Eof`.
pub(crate) fn tokenize(src: &str) -> Result<Vec<Spanned>, UfuncError> {
    let mut chars = src.char_indices().peekable();
    let mut out = Vec::new();
    while let Some(&(pos, c)) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
            continue;
        }
        let tok = if c.is_ascii_digit() || c == '.' {
            number(src, &mut chars)?
        } else if c.is_alphabetic() || c == '_' {
            let end = take_while(&mut chars, src.len(), |c| c.is_alphanumeric() || c == '_');
            Token::Ident(src[pos..end].to_string())
        } else {
            chars.next();
            let second = chars.peek().map(|&(_, c)| c);
            let mut pair = |tok: Token| {
                chars.next();
                tok
            };
            match (c, second) {
                ('=', Some('=')) => pair(Token::EqEq),
                ('!', Some('=')) => pair(Token::NotEq),
                ('<', Some('=')) => pair(Token::Le),
                ('>', Some('=')) => pair(Token::Ge),
                ('&', Some('&')) => pair(Token::AndAnd),
                ('|', Some('|')) => pair(Token::OrOr),
                ('=', _) => Token::Assign,
                ('!', _) => Token::Not,
                ('<', _) => Token::Lt,
                ('>', _) => Token::Gt,
                ('+', _) => Token::Plus,
                ('-', _) => Token::Minus,
                ('*', _) => Token::Star,
                ('/', _) => Token::Slash,
                ('(', _) => Token::LParen,
                (')', _) => Token::RParen,
                (',', _) => Token::Comma,
                _ => {
                    return Err(UfuncError::Parse(format!(
                        "unexpected character '{}' at offset {}",
                        c, pos
                    )));
                }
            }
        };
        out.push((tok, pos));
    }
    out.push((Token::Eof, src.len()));
    Ok(out)
}

/// Consumes characters matching `pred`; returns the offset just past them.
fn take_while(chars: &mut Peekable<CharIndices<'_>>, len: usize, pred: impl Fn(char) -> bool) -> usize {
    while let Some(&(pos, c)) = chars.peek() {
        if !pred(c) {
            return pos;
        }
        chars.next();
    }
    len
}

/// `123` is an integer; a `.` or an exponent makes a float (`1.5`, `.5`, `2e-3`).
fn number(src: &str, chars: &mut Peekable<CharIndices<'_>>) -> Result<Token, UfuncError> {
    let start = chars.peek().map(|&(p, _)| p).unwrap_or(src.len());
    let mut end = src.len();
    let mut is_float = false;
    let mut seen_exp = false;
    let mut prev = '\0';
    while let Some(&(pos, c)) = chars.peek() {
        let accept = match c {
            '0'..='9' => true,
            '.' if !is_float => {
                is_float = true;
                true
            }
            'e' | 'E' if !seen_exp => {
                seen_exp = true;
                is_float = true;
                true
            }
            '+' | '-' => prev == 'e' || prev == 'E',
            _ => false,
        };
        if !accept {
            end = pos;
            break;
        }
        prev = c;
        chars.next();
    }
    let text = &src[start..end];
    if is_float {
        text.parse()
            .map(Token::Float)
            .map_err(|e| UfuncError::Parse(format!("invalid number '{}' at offset {}: {}", text, start, e)))
    } else {
        text.parse()
            .map(Token::Int)
            .map_err(|e| UfuncError::Parse(format!("invalid integer '{}' at offset {}: {}", text, start, e)))
    }
}
