//! Binary and unary operators.
//!
//! Arithmetic and comparison operators have no evaluator-level semantics of
//! their own: each one names the builtin overload set it dispatches to, so
//! `a + b` and `add(a, b)` go through the same signatures. `&&` and `||`
//! short-circuit and are the only operators the evaluator handles directly.

use serde::{Deserialize, Serialize};

/// Binary operators.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Serialize, Deserialize)]
pub enum BinaryOp {
    // Arithmetic
    Add,
    Sub,
    Mul,
    Div,
    Pow,

    // Comparison
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,

    // Logical
    And,
    Or,
}

impl BinaryOp {
    /// Source-level symbol, used in error messages.
    pub const fn as_symbol(self) -> &'static str {
        match self {
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mul => "*",
            Self::Div => "/",
            Self::Pow => "^",
            Self::Eq => "==",
            Self::NotEq => "!=",
            Self::Lt => "<",
            Self::LtEq => "<=",
            Self::Gt => ">",
            Self::GtEq => ">=",
            Self::And => "&&",
            Self::Or => "||",
        }
    }

    /// Name of the builtin overload set this operator dispatches to.
    ///
    /// `None` for the short-circuiting logical operators.
    pub const fn builtin_name(self) -> Option<&'static str> {
        match self {
            Self::Add => Some("add"),
            Self::Sub => Some("subtract"),
            Self::Mul => Some("multiply"),
            Self::Div => Some("divide"),
            Self::Pow => Some("pow"),
            Self::Eq => Some("equal"),
            Self::NotEq => Some("unequal"),
            Self::Lt => Some("smaller"),
            Self::LtEq => Some("smallerEq"),
            Self::Gt => Some("larger"),
            Self::GtEq => Some("largerEq"),
            Self::And | Self::Or => None,
        }
    }

    /// Binding power; higher binds tighter.
    pub const fn precedence(self) -> u8 {
        match self {
            Self::Or => 1,
            Self::And => 2,
            Self::Eq | Self::NotEq => 3,
            Self::Lt | Self::LtEq | Self::Gt | Self::GtEq => 4,
            Self::Add | Self::Sub => 5,
            Self::Mul | Self::Div => 6,
            Self::Pow => 7,
        }
    }
}

/// Unary operators.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Serialize, Deserialize)]
pub enum UnaryOp {
    Neg,
    Not,
}

impl UnaryOp {
    pub const fn as_symbol(self) -> &'static str {
        match self {
            Self::Neg => "-",
            Self::Not => "!",
        }
    }

    pub const fn builtin_name(self) -> &'static str {
        match self {
            Self::Neg => "negate",
            Self::Not => "not",
        }
    }
}
