//! Binding Expression Module
//!
//! Parses and evaluates binding declarations (`text: model.title, css: {a: model.on}`).
//!
//! - `lexer`: tokenizer with byte positions
//! - `parser`: recursive descent into [`Expr`]
//! - `eval`: JavaScript-flavoured evaluation against an [`Environment`]

mod eval;
mod lexer;
mod parser;

use thiserror::Error;

use crate::value::BindingValue;

pub use eval::{evaluate, Environment, Operand};
pub use parser::{parse_declaration, parse_expression, BinaryOp, Expr, LogicalOp, UnaryOp};

/// Parse or evaluation failure inside a declaration
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message} (at {position})")]
pub struct ExprError {
    pub message: String,
    /// Byte offset into the declaration text
    pub position: usize,
}

impl ExprError {
    pub fn new(message: impl Into<String>, position: usize) -> Self {
        Self {
            message: message.into(),
            position,
        }
    }
}

/// Parse a declaration and evaluate every entry, preserving declaration order
pub fn evaluate_declaration(
    source: &str,
    env: &dyn Environment,
) -> Result<Vec<(String, BindingValue)>, ExprError> {
    parse_declaration(source)?
        .into_iter()
        .map(|(name, expr)| Ok((name, eval::evaluate_binding(&expr, env)?)))
        .collect()
}
