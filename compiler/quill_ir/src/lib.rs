//! Quill IR - spans and syntax tree shared by every Quill crate.
//!
//! The parser produces these types, the graph stores them per module, and
//! runners ship them (serialized) to workers for compilation.

mod ast;
mod operators;
mod span;

pub use ast::{
    Domain, Expr, ExprKind, ImportBinding, ImportStmt, Param, Program, Stmt, StmtKind,
};
pub use operators::{BinaryOp, UnaryOp};
pub use span::{Span, SpanError};
