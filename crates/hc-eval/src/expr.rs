//! Objective expressions.
//!
//! A small arithmetic language over named per-station metric values, e.g.
//! `-1 * (0.7 * upper + 0.3 * lower)` or `sqrt(a ** 2 + b ** 2)`.
//!
//! Grammar, loosest binding first:
//!
//! ```text
//! expr   := term (('+' | '-') term)*
//! term   := unary (('*' | '/') unary)*
//! unary  := ('+' | '-') unary | power
//! power  := atom (('**' | '^') unary)?
//! atom   := number | ident | ident '(' expr (',' expr)* ')' | '(' expr ')'
//! ```

use std::collections::{BTreeMap, BTreeSet};

use hc_core::Real;

use crate::{EvalError, EvalResult};

#[derive(Clone, Debug, PartialEq)]
pub enum Expr {
    Num(Real),
    Var(String),
    Neg(Box<Expr>),
    Bin(BinOp, Box<Expr>, Box<Expr>),
    Call(Func, Vec<Expr>),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Pow,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Func {
    Abs,
    Sqrt,
    Exp,
    Log,
    Log10,
    Min,
    Max,
}

impl Func {
    fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "abs" => Self::Abs,
            "sqrt" => Self::Sqrt,
            "exp" => Self::Exp,
            "log" => Self::Log,
            "log10" => Self::Log10,
            "min" => Self::Min,
            "max" => Self::Max,
            _ => return None,
        })
    }

    fn arity_ok(self, n: usize) -> bool {
        match self {
            Self::Min | Self::Max => n >= 1,
            _ => n == 1,
        }
    }

    fn apply(self, args: &[Real]) -> Real {
        match self {
            Self::Abs => args[0].abs(),
            Self::Sqrt => args[0].sqrt(),
            Self::Exp => args[0].exp(),
            Self::Log => args[0].ln(),
            Self::Log10 => args[0].log10(),
            Self::Min => args.iter().copied().fold(Real::INFINITY, Real::min),
            Self::Max => args.iter().copied().fold(Real::NEG_INFINITY, Real::max),
        }
    }
}

impl Expr {
    /// Evaluate with identifiers bound from `vars`.
    pub fn eval(&self, vars: &BTreeMap<String, Real>) -> Result<Real, String> {
        Ok(match self {
            Self::Num(v) => *v,
            Self::Var(name) => *vars.get(name).ok_or_else(|| name.clone())?,
            Self::Neg(inner) => -inner.eval(vars)?,
            Self::Bin(op, a, b) => {
                let (a, b) = (a.eval(vars)?, b.eval(vars)?);
                match op {
                    BinOp::Add => a + b,
                    BinOp::Sub => a - b,
                    BinOp::Mul => a * b,
                    BinOp::Div => a / b,
                    BinOp::Pow => a.powf(b),
                }
            }
            Self::Call(func, args) => {
                let values = args
                    .iter()
                    .map(|a| a.eval(vars))
                    .collect::<Result<Vec<_>, _>>()?;
                func.apply(&values)
            }
        })
    }

    /// Every identifier the expression reads.
    pub fn identifiers(&self) -> BTreeSet<String> {
        let mut out = BTreeSet::new();
        self.collect_identifiers(&mut out);
        out
    }

    fn collect_identifiers(&self, out: &mut BTreeSet<String>) {
        match self {
            Self::Num(_) => {}
            Self::Var(name) => {
                out.insert(name.clone());
            }
            Self::Neg(inner) => inner.collect_identifiers(out),
            Self::Bin(_, a, b) => {
                a.collect_identifiers(out);
                b.collect_identifiers(out);
            }
            Self::Call(_, args) => args.iter().for_each(|a| a.collect_identifiers(out)),
        }
    }
}

/// Parse and evaluate `src` in one step.
pub fn evaluate(src: &str, vars: &BTreeMap<String, Real>) -> EvalResult<Real> {
    parse_expression(src)?
        .eval(vars)
        .map_err(|name| EvalError::UnknownIdentifier {
            name,
            expr: src.to_string(),
        })
}

pub fn parse_expression(src: &str) -> EvalResult<Expr> {
    let fail = |reason: String| EvalError::Expr {
        expr: src.to_string(),
        reason,
    };
    let tokens = tokenize(src).map_err(fail)?;
    let mut parser = Parser { tokens, pos: 0 };
    let expr = parser.expr().map_err(fail)?;
    if let Some(tok) = parser.peek() {
        return Err(fail(format!("unexpected {tok:?} after expression")));
    }
    Ok(expr)
}

#[derive(Clone, Debug, PartialEq)]
enum Token {
    Num(Real),
    Ident(String),
    Plus,
    Minus,
    Star,
    Slash,
    Pow,
    LParen,
    RParen,
    Comma,
}

fn tokenize(src: &str) -> Result<Vec<Token>, String> {
    let chars: Vec<char> = src.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        match c {
            c if c.is_whitespace() => i += 1,
            '+' => {
                tokens.push(Token::Plus);
                i += 1;
            }
            '-' => {
                tokens.push(Token::Minus);
                i += 1;
            }
            '*' if chars.get(i + 1) == Some(&'*') => {
                tokens.push(Token::Pow);
                i += 2;
            }
            '*' => {
                tokens.push(Token::Star);
                i += 1;
            }
            '/' => {
                tokens.push(Token::Slash);
                i += 1;
            }
            '^' => {
                tokens.push(Token::Pow);
                i += 1;
            }
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            ',' => {
                tokens.push(Token::Comma);
                i += 1;
            }
            c if c.is_ascii_digit() || c == '.' => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                    i += 1;
                }
                // Exponent, only when digits follow.
                if i < chars.len() && matches!(chars[i], 'e' | 'E') {
                    let mut j = i + 1;
                    if j < chars.len() && matches!(chars[j], '+' | '-') {
                        j += 1;
                    }
                    if j < chars.len() && chars[j].is_ascii_digit() {
                        i = j;
                        while i < chars.len() && chars[i].is_ascii_digit() {
                            i += 1;
                        }
                    }
                }
                let text: String = chars[start..i].iter().collect();
                let value = text
                    .parse::<Real>()
                    .map_err(|_| format!("bad number `{text}`"))?;
                tokens.push(Token::Num(value));
            }
            c if c.is_alphabetic() || c == '_' => {
                let start = i;
                while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
                    i += 1;
                }
                tokens.push(Token::Ident(chars[start..i].iter().collect()));
            }
            other => return Err(format!("unexpected character `{other}`")),
        }
    }
    Ok(tokens)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let tok = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        tok
    }

    fn eat(&mut self, tok: &Token) -> bool {
        if self.peek() == Some(tok) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expr(&mut self) -> Result<Expr, String> {
        let mut lhs = self.term()?;
        loop {
            let op = match self.peek() {
                Some(Token::Plus) => BinOp::Add,
                Some(Token::Minus) => BinOp::Sub,
                _ => return Ok(lhs),
            };
            self.pos += 1;
            lhs = Expr::Bin(op, Box::new(lhs), Box::new(self.term()?));
        }
    }

    fn term(&mut self) -> Result<Expr, String> {
        let mut lhs = self.unary()?;
        loop {
            let op = match self.peek() {
                Some(Token::Star) => BinOp::Mul,
                Some(Token::Slash) => BinOp::Div,
                _ => return Ok(lhs),
            };
            self.pos += 1;
            lhs = Expr::Bin(op, Box::new(lhs), Box::new(self.unary()?));
        }
    }

    fn unary(&mut self) -> Result<Expr, String> {
        if self.eat(&Token::Minus) {
            return Ok(Expr::Neg(Box::new(self.unary()?)));
        }
        if self.eat(&Token::Plus) {
            return self.unary();
        }
        self.power()
    }

    fn power(&mut self) -> Result<Expr, String> {
        let base = self.atom()?;
        if self.eat(&Token::Pow) {
            let exp = self.unary()?;
            return Ok(Expr::Bin(BinOp::Pow, Box::new(base), Box::new(exp)));
        }
        Ok(base)
    }

    fn atom(&mut self) -> Result<Expr, String> {
        match self.next() {
            Some(Token::Num(v)) => Ok(Expr::Num(v)),
            Some(Token::Ident(name)) => {
                if !self.eat(&Token::LParen) {
                    return Ok(Expr::Var(name));
                }
                let func = Func::from_name(&name).ok_or_else(|| format!("unknown function `{name}`"))?;
                let mut args = vec![self.expr()?];
                while self.eat(&Token::Comma) {
                    args.push(self.expr()?);
                }
                if !self.eat(&Token::RParen) {
                    return Err(format!("missing `)` after arguments of `{name}`"));
                }
                if !func.arity_ok(args.len()) {
                    return Err(format!("wrong number of arguments for `{name}`"));
                }
                Ok(Expr::Call(func, args))
            }
            Some(Token::LParen) => {
                let inner = self.expr()?;
                if !self.eat(&Token::RParen) {
                    return Err("missing `)`".to_string());
                }
                Ok(inner)
            }
            Some(tok) => Err(format!("unexpected {tok:?}")),
            None => Err("unexpected end of expression".to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, Real)]) -> BTreeMap<String, Real> {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    fn eval(src: &str, v: &BTreeMap<String, Real>) -> Real {
        evaluate(src, v).unwrap()
    }

    #[test]
    fn precedence_and_associativity() {
        let v = vars(&[]);
        assert_eq!(eval("1 + 2 * 3", &v), 7.0);
        assert_eq!(eval("(1 + 2) * 3", &v), 9.0);
        assert_eq!(eval("8 / 4 / 2", &v), 1.0);
        assert_eq!(eval("2 ** 3 ** 2", &v), 512.0);
        assert_eq!(eval("-2 ** 2", &v), -4.0);
        assert_eq!(eval("2 ^ -1", &v), 0.5);
        assert!((eval("1.5e2 + 1E-1", &v) - 150.1).abs() < 1e-12);
    }

    #[test]
    fn station_identifiers() {
        let v = vars(&[("upper", 0.8), ("subbasin_12", 0.4)]);
        let r = eval("-1 * (0.5 * upper + 0.5 * subbasin_12)", &v);
        assert!((r + 0.6).abs() < 1e-12);
    }

    #[test]
    fn functions() {
        let v = vars(&[("a", -4.0), ("b", 9.0)]);
        assert_eq!(eval("abs(a)", &v), 4.0);
        assert_eq!(eval("sqrt(b)", &v), 3.0);
        assert_eq!(eval("min(a, b, 0)", &v), -4.0);
        assert_eq!(eval("max(a, b)", &v), 9.0);
        assert_eq!(eval("log10(100)", &v), 2.0);
        assert!((eval("log(exp(1))", &v) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn unknown_identifier_is_reported() {
        let err = evaluate("a + missing", &vars(&[("a", 1.0)])).unwrap_err();
        match err {
            EvalError::UnknownIdentifier { name, .. } => assert_eq!(name, "missing"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn syntax_errors() {
        for src in ["", "1 +", "(1", "1 2", "foo(1)", "sqrt(1, 2)", "a $ b"] {
            assert!(
                matches!(parse_expression(src), Err(EvalError::Expr { .. })),
                "{src}"
            );
        }
    }

    #[test]
    fn lists_identifiers() {
        let e = parse_expression("x + max(y, x) * 2").unwrap();
        let ids: Vec<String> = e.identifiers().into_iter().collect();
        assert_eq!(ids, vec!["x", "y"]);
    }
}
