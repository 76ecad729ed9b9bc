//! Syntax tree produced by the parser and shipped to runners.
//!
//! The tree is plain owned data with serde derives: an isolated worker
//! receives it as bytes and compiles it on its own side of the boundary.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{BinaryOp, Span, UnaryOp};

/// A parsed module: top-level statements in source order.
#[derive(Clone, Debug, PartialEq, Default, Serialize, Deserialize)]
pub struct Program {
    pub statements: Vec<Stmt>,
}

impl Program {
    /// Import statements in declaration order.
    pub fn import_statements(&self) -> impl Iterator<Item = ImportStmt<'_>> + '_ {
        self.statements.iter().filter_map(|stmt| match &stmt.kind {
            StmtKind::Import { path, binding } => Some(ImportStmt {
                path,
                binding,
                span: stmt.span,
            }),
            StmtKind::Let { .. } | StmtKind::Expr(_) => None,
        })
    }

    /// Whether any top-level binding carries an `export` marker.
    pub fn has_export_markers(&self) -> bool {
        self.statements
            .iter()
            .any(|stmt| matches!(stmt.kind, StmtKind::Let { exported: true, .. }))
    }
}

/// Borrowed view of one import statement.
#[derive(Copy, Clone, Debug)]
pub struct ImportStmt<'a> {
    pub path: &'a str,
    pub binding: &'a ImportBinding,
    pub span: Span,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Stmt {
    pub kind: StmtKind,
    pub span: Span,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum StmtKind {
    /// `import "path" as Name` or `import "path"`.
    Import {
        path: String,
        binding: ImportBinding,
    },
    /// `name = value`, optionally prefixed with `export`.
    Let {
        name: String,
        exported: bool,
        value: Expr,
    },
    Expr(Expr),
}

/// How an import's exports enter the importing module's scope.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ImportBinding {
    /// All exports as one dict under the given variable.
    Named(String),
    /// Each export as its own top-level name.
    Flat,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Expr {
    pub kind: ExprKind,
    pub span: Span,
}

impl Expr {
    pub fn new(kind: ExprKind, span: Span) -> Self {
        Expr { kind, span }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum ExprKind {
    Number(f64),
    Str(String),
    Bool(bool),
    Ident(String),
    List(Vec<Expr>),
    Dict(Vec<(String, Expr)>),
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Call {
        callee: Box<Expr>,
        args: Vec<Expr>,
    },
    /// `{|x, y| body}` or the right-hand side of `f(x, y) = body`, in which
    /// case `name` is the defined name and the body may call itself.
    Lambda {
        name: Option<String>,
        params: Vec<Param>,
        body: Box<Expr>,
    },
    /// `{ a = 1; a + 1 }`: local bindings followed by a result expression.
    Block {
        statements: Vec<Stmt>,
        result: Box<Expr>,
    },
    If {
        condition: Box<Expr>,
        then_branch: Box<Expr>,
        else_branch: Box<Expr>,
    },
    Field {
        object: Box<Expr>,
        field: String,
    },
    Index {
        object: Box<Expr>,
        index: Box<Expr>,
    },
}

/// A lambda parameter with an optional declared domain.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Param {
    pub name: String,
    pub domain: Option<Domain>,
    pub span: Span,
}

/// Declared valid range of a parameter, checked before the body runs.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Domain {
    /// Closed numeric interval.
    Range { min: f64, max: f64 },
}

impl Domain {
    pub fn contains(&self, x: f64) -> bool {
        match *self {
            Domain::Range { min, max } => x >= min && x <= max,
        }
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Domain::Range { min, max } => write!(f, "[{min}, {max}]"),
        }
    }
}
