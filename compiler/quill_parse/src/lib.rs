//! Quill Parse - text to syntax tree.
//!
//! ```text
//! source ──► lex() ──► Vec<Token> ──► Parser ──► quill_ir::Program
//! ```
//!
//! Parsing stops at the first error; there is no recovery since a module
//! with a syntax error never runs.

mod lexer;
mod parser;

use quill_ir::{Program, Span};

pub use lexer::{lex, Token, TokenKind};

/// A syntax error with the location it was detected at.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct ParseError {
    pub message: String,
    pub span: Span,
}

impl ParseError {
    #[cold]
    pub fn new(message: impl Into<String>, span: Span) -> Self {
        ParseError {
            message: message.into(),
            span,
        }
    }
}

/// Parse a whole module.
#[tracing::instrument(level = "debug", skip_all, fields(len = source.len()))]
pub fn parse(source: &str) -> Result<Program, ParseError> {
    let tokens = lex(source)?;
    parser::Parser::new(tokens).parse_program()
}
