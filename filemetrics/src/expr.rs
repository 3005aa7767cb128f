//! A small reverse-polish calculator over comma separated tokens.
//!
//! ```text
//! {a},2.0,:add,{b},:mul      =>  ({a} + 2.0) * {b}
//! ```
//!
//! Tokens are `:add`, `:sub`, `:mul` and `:div`, variable references written as `{name}`, and
//! literals.  Literals go through [`parse_value`] so `42` is a number and `foo` a string.

#[allow(unused)]
use tracing::{debug, error, info, span, trace, warn, Instrument, Level};

use std::{collections::HashMap, fmt, hash::BuildHasher};

use itertools::Itertools;

use crate::value::{parse_value, Value};

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum EvalError {
    #[error("need at least two arguments on the stack: {0}")]
    StackUnderflow(String),

    #[error("not a number: '{value}' {kind}")]
    NotANumber { value: String, kind: &'static str },

    #[error("unknown variable: '{0}'")]
    UnknownVariable(String),

    #[error("stack should have single item, found: {0}")]
    ResidualStack(String),
}

pub type Result<T> = std::result::Result<T, EvalError>;

/// Something variables can be looked up in.
pub trait Variables {
    fn lookup(&self, name: &str) -> Option<&Value>;
}

impl<S: BuildHasher> Variables for HashMap<String, Value, S> {
    fn lookup(&self, name: &str) -> Option<&Value> {
        self.get(name)
    }
}

/// Two layers of variables, names in `upper` shadow those in `lower`.
#[derive(Debug)]
pub struct Overlay<'a, U: ?Sized, L: ?Sized> {
    pub upper: &'a U,
    pub lower: &'a L,
}

impl<'a, U, L> Variables for Overlay<'a, U, L>
where
    U: Variables + ?Sized,
    L: Variables + ?Sized,
{
    fn lookup(&self, name: &str) -> Option<&Value> {
        self.upper.lookup(name).or_else(|| self.lower.lookup(name))
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Op {
    Add,
    Sub,
    Mul,
    Div,
}

impl Op {
    fn from_token(token: &str) -> Option<Self> {
        match token {
            ":add" => Some(Self::Add),
            ":sub" => Some(Self::Sub),
            ":mul" => Some(Self::Mul),
            ":div" => Some(Self::Div),
            _ => None,
        }
    }

    /// Division by zero follows IEEE 754, yielding an infinity or NaN.
    fn apply(self, v1: f64, v2: f64) -> f64 {
        match self {
            Self::Add => v1 + v2,
            Self::Sub => v1 - v2,
            Self::Mul => v1 * v2,
            Self::Div => v1 / v2,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Token {
    Op(Op),
    Variable(String),
    Literal(Value),
}

impl Token {
    fn parse(part: &str) -> Self {
        let part = part.trim();
        if let Some(op) = Op::from_token(part) {
            return Self::Op(op);
        }

        if part.len() > 2 && part.starts_with('{') && part.ends_with('}') {
            Self::Variable(part[1..part.len() - 1].to_string())
        } else {
            Self::Literal(parse_value(part))
        }
    }
}

/// A tokenized expression, ready to be evaluated any number of times.
#[derive(Clone, Debug, PartialEq)]
pub struct Expression {
    source: String,
    tokens: Vec<Token>,
}

impl Expression {
    pub fn parse(source: &str) -> Self {
        Self {
            source: source.to_string(),
            tokens: source.split(',').map(Token::parse).collect(),
        }
    }

    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }

    pub fn evaluate<V: Variables + ?Sized>(&self, vars: &V) -> Result<Value> {
        let mut stack: Vec<Value> = Vec::with_capacity(self.tokens.len());
        for token in self.tokens.iter() {
            match token {
                Token::Op(op) => binary_op(&mut stack, *op)?,
                Token::Variable(name) => {
                    let value = vars
                        .lookup(name)
                        .ok_or_else(|| EvalError::UnknownVariable(name.clone()))?;
                    stack.push(value.clone());
                }
                Token::Literal(value) => stack.push(value.clone()),
            }
            trace!(?token, depth = stack.len());
        }

        if stack.len() != 1 {
            Err(EvalError::ResidualStack(show_stack(&stack)))?
        }

        Ok(stack.remove(0))
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

/// Tokenizes and evaluates `expr` in one go.
pub fn evaluate<V: Variables + ?Sized>(vars: &V, expr: &str) -> Result<Value> {
    Expression::parse(expr).evaluate(vars)
}

fn show_stack(stack: &[Value]) -> String {
    format!("[{}]", stack.iter().join(" "))
}

fn to_number(value: &Value) -> Result<f64> {
    value.as_number().ok_or_else(|| EvalError::NotANumber {
        value: value.to_string(),
        kind: value.kind(),
    })
}

fn binary_op(stack: &mut Vec<Value>, op: Op) -> Result<()> {
    let result = match stack.as_slice() {
        [.., v1, v2] => {
            let v2 = to_number(v2)?;
            let v1 = to_number(v1)?;
            op.apply(v1, v2)
        }
        _ => Err(EvalError::StackUnderflow(show_stack(stack)))?,
    };

    stack.truncate(stack.len() - 2);
    stack.push(Value::Number(result));
    Ok(())
}
