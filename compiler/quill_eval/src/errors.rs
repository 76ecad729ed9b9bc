//! Error types for evaluation and everything that feeds it.
//!
//! One `EvalError` type flows from the parser boundary through compilation,
//! evaluation, runners and the module graph. It is serializable so workers
//! can ship failures back, and comparable so tests can assert that two runs
//! failed identically.
//!
//! Factory functions are the canonical way to build errors; they are
//! `#[cold]` since they sit on failure paths.

use std::fmt;
use std::time::Duration;

use quill_ir::{Domain, Span};
use serde::{Deserialize, Serialize};

use crate::Value;

/// Result of evaluation.
pub type EvalResult<T = Value> = Result<T, EvalError>;

/// Whether a caller may retry.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Deterministic failure of the program itself; retrying reproduces it.
    Program,
    /// Transport, crash, timeout or cancellation; retrying may succeed.
    Infrastructure,
}

/// What went wrong.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, thiserror::Error)]
pub enum EvalErrorKind {
    // Front end
    #[error("syntax error: {message}")]
    Syntax { message: String },
    #[error("unbound variable `{name}`")]
    UnboundVariable { name: String },
    #[error("compile error: {message}")]
    Compile { message: String },

    // Imports
    #[error("cyclic import: {}", join_cycle(.cycle))]
    CyclicImport { cycle: Vec<String> },
    #[error("failed to load import `{target}`: {reason}")]
    ImportLoad { target: String, reason: String },
    #[error("import of `{path}` is not allowed: no linker is configured")]
    ImportsForbidden { path: String },
    #[error("import depth limit of {limit} exceeded")]
    ImportDepthExceeded { limit: usize },

    // Calls
    #[error("`{callee}` expects {expected} argument{}, got {got}", plural(.expected))]
    Arity {
        callee: String,
        expected: usize,
        got: usize,
    },
    #[error("{}", render_mismatch(.callee, .given, .candidates))]
    ArgumentMismatch {
        callee: String,
        given: Vec<String>,
        candidates: Vec<String>,
    },
    #[error("parameter `{param}` of `{callee}` must be in {declared}, got {value}")]
    Domain {
        callee: String,
        param: String,
        value: String,
        declared: String,
    },
    #[error("`{type_name}` value is not callable")]
    NotCallable { type_name: String },

    // Values
    #[error("type mismatch: expected {expected}, found {found}")]
    TypeMismatch { expected: String, found: String },
    #[error("key `{key}` not found")]
    KeyNotFound { key: String },
    #[error("index {index} out of bounds for list of length {len}")]
    IndexOutOfBounds { index: String, len: usize },
    #[error("{message}")]
    Runtime { message: String },

    // Budgets
    #[error("maximum call depth of {limit} exceeded")]
    StackOverflow { limit: usize },
    #[error("evaluation exceeded the budget of {limit} steps")]
    StepBudgetExceeded { limit: u64 },
    #[error("evaluation timed out after {millis} ms")]
    Timeout { millis: u64 },
    #[error("evaluation was cancelled")]
    Cancelled,

    // Infrastructure
    #[error("internal runner error: {message}")]
    InternalRunner { message: String },
}

fn join_cycle(cycle: &[String]) -> String {
    cycle.join(" -> ")
}

fn plural(n: &usize) -> &'static str {
    if *n == 1 {
        ""
    } else {
        "s"
    }
}

fn render_mismatch(callee: &str, given: &[String], candidates: &[String]) -> String {
    let mut out = format!(
        "no signature of `{callee}` accepts ({}) [{} argument{}]; candidates:",
        given.join(", "),
        given.len(),
        plural(&given.len()),
    );
    for candidate in candidates {
        out.push_str("\n    ");
        out.push_str(candidate);
    }
    out
}

impl EvalErrorKind {
    pub fn category(&self) -> ErrorCategory {
        match self {
            EvalErrorKind::Timeout { .. }
            | EvalErrorKind::Cancelled
            | EvalErrorKind::InternalRunner { .. } => ErrorCategory::Infrastructure,
            EvalErrorKind::Syntax { .. }
            | EvalErrorKind::UnboundVariable { .. }
            | EvalErrorKind::Compile { .. }
            | EvalErrorKind::CyclicImport { .. }
            | EvalErrorKind::ImportLoad { .. }
            | EvalErrorKind::ImportsForbidden { .. }
            | EvalErrorKind::ImportDepthExceeded { .. }
            | EvalErrorKind::Arity { .. }
            | EvalErrorKind::ArgumentMismatch { .. }
            | EvalErrorKind::Domain { .. }
            | EvalErrorKind::NotCallable { .. }
            | EvalErrorKind::TypeMismatch { .. }
            | EvalErrorKind::KeyNotFound { .. }
            | EvalErrorKind::IndexOutOfBounds { .. }
            | EvalErrorKind::Runtime { .. }
            | EvalErrorKind::StackOverflow { .. }
            | EvalErrorKind::StepBudgetExceeded { .. } => ErrorCategory::Program,
        }
    }
}

/// One frame of a captured call chain.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceFrame {
    pub callee: String,
    pub call_span: Option<Span>,
}

/// Snapshot of the call stack taken where an error was raised.
///
/// Frames are ordered most recent call first.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallTrace {
    frames: Vec<TraceFrame>,
}

impl CallTrace {
    pub fn new(frames: Vec<TraceFrame>) -> Self {
        CallTrace { frames }
    }

    pub fn frames(&self) -> &[TraceFrame] {
        &self.frames
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }
}

impl fmt::Display for CallTrace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "call stack:")?;
        for (i, frame) in self.frames.iter().enumerate() {
            match frame.call_span {
                Some(span) => writeln!(f, "  {i}: {} at {span}", frame.callee)?,
                None => writeln!(f, "  {i}: {}", frame.callee)?,
            }
        }
        Ok(())
    }
}

/// An import edge an error propagated across.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportEdge {
    /// Importing module id.
    pub from: String,
    /// Imported (or continued) module id.
    pub target: String,
    /// Location of the import statement in `from`; `None` for continues edges.
    pub span: Option<Span>,
}

impl fmt::Display for ImportEdge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.span {
            Some(span) => write!(f, "`{}` imports `{}` at {span}", self.from, self.target),
            None => write!(f, "`{}` continues `{}`", self.from, self.target),
        }
    }
}

/// An error with its location, call chain and import chain.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, thiserror::Error)]
#[error("{kind}")]
pub struct EvalError {
    pub kind: EvalErrorKind,
    /// Innermost source location the error was attributed to.
    pub span: Option<Span>,
    pub call_trace: Option<CallTrace>,
    /// Import edges crossed on the way out, innermost first.
    pub import_trace: Vec<ImportEdge>,
}

impl EvalError {
    pub fn new(kind: EvalErrorKind) -> Self {
        EvalError {
            kind,
            span: None,
            call_trace: None,
            import_trace: Vec::new(),
        }
    }

    pub fn category(&self) -> ErrorCategory {
        self.kind.category()
    }

    /// Infrastructure failures are worth retrying; program errors are not.
    pub fn is_transient(&self) -> bool {
        self.category() == ErrorCategory::Infrastructure
    }

    #[must_use]
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = Some(span);
        self
    }

    /// Attach `span` unless a more precise one is already present.
    #[must_use]
    pub fn or_span(mut self, span: Span) -> Self {
        self.span.get_or_insert(span);
        self
    }

    /// Attach a call trace unless one was captured closer to the failure.
    #[must_use]
    pub fn with_call_trace(mut self, trace: CallTrace) -> Self {
        if self.call_trace.is_none() && !trace.is_empty() {
            self.call_trace = Some(trace);
        }
        self
    }

    /// Record that the error crossed `edge` while propagating to an importer.
    #[must_use]
    pub fn through_import(mut self, edge: ImportEdge) -> Self {
        self.import_trace.push(edge);
        self
    }
}

impl From<EvalErrorKind> for EvalError {
    fn from(kind: EvalErrorKind) -> Self {
        EvalError::new(kind)
    }
}

// === Front end ===

#[cold]
pub fn syntax_error(message: impl Into<String>, span: Span) -> EvalError {
    EvalError::new(EvalErrorKind::Syntax {
        message: message.into(),
    })
    .with_span(span)
}

#[cold]
pub fn unbound_variable(name: &str, span: Span) -> EvalError {
    EvalError::new(EvalErrorKind::UnboundVariable {
        name: name.to_string(),
    })
    .with_span(span)
}

#[cold]
pub fn compile_error(message: impl Into<String>, span: Span) -> EvalError {
    EvalError::new(EvalErrorKind::Compile {
        message: message.into(),
    })
    .with_span(span)
}

// === Imports ===

#[cold]
pub fn cyclic_import(cycle: Vec<String>) -> EvalError {
    EvalError::new(EvalErrorKind::CyclicImport { cycle })
}

#[cold]
pub fn import_load_failed(target: &str, reason: impl fmt::Display) -> EvalError {
    EvalError::new(EvalErrorKind::ImportLoad {
        target: target.to_string(),
        reason: reason.to_string(),
    })
}

#[cold]
pub fn imports_forbidden(path: &str, span: Span) -> EvalError {
    EvalError::new(EvalErrorKind::ImportsForbidden {
        path: path.to_string(),
    })
    .with_span(span)
}

#[cold]
pub fn import_depth_exceeded(limit: usize) -> EvalError {
    EvalError::new(EvalErrorKind::ImportDepthExceeded { limit })
}

// === Calls ===

#[cold]
pub fn arity_mismatch(callee: &str, expected: usize, got: usize) -> EvalError {
    EvalError::new(EvalErrorKind::Arity {
        callee: callee.to_string(),
        expected,
        got,
    })
}

#[cold]
pub fn argument_mismatch(callee: &str, args: &[Value], candidates: Vec<String>) -> EvalError {
    EvalError::new(EvalErrorKind::ArgumentMismatch {
        callee: callee.to_string(),
        given: args.iter().map(|a| a.type_name().to_string()).collect(),
        candidates,
    })
}

#[cold]
pub fn domain_violation(callee: &str, param: &str, value: &Value, domain: &Domain) -> EvalError {
    EvalError::new(EvalErrorKind::Domain {
        callee: callee.to_string(),
        param: param.to_string(),
        value: value.to_string(),
        declared: domain.to_string(),
    })
}

#[cold]
pub fn not_callable(value: &Value) -> EvalError {
    EvalError::new(EvalErrorKind::NotCallable {
        type_name: value.type_name().to_string(),
    })
}

// === Values ===

#[cold]
pub fn type_mismatch(expected: &str, found: &Value) -> EvalError {
    EvalError::new(EvalErrorKind::TypeMismatch {
        expected: expected.to_string(),
        found: found.type_name().to_string(),
    })
}

#[cold]
pub fn key_not_found(key: &str) -> EvalError {
    EvalError::new(EvalErrorKind::KeyNotFound {
        key: key.to_string(),
    })
}

#[cold]
pub fn index_out_of_bounds(index: f64, len: usize) -> EvalError {
    EvalError::new(EvalErrorKind::IndexOutOfBounds {
        index: index.to_string(),
        len,
    })
}

#[cold]
pub fn runtime_error(message: impl Into<String>) -> EvalError {
    EvalError::new(EvalErrorKind::Runtime {
        message: message.into(),
    })
}

// === Budgets ===

#[cold]
pub fn stack_overflow(limit: usize) -> EvalError {
    EvalError::new(EvalErrorKind::StackOverflow { limit })
}

#[cold]
pub fn step_budget_exceeded(limit: u64) -> EvalError {
    EvalError::new(EvalErrorKind::StepBudgetExceeded { limit })
}

#[cold]
pub fn timed_out(after: Duration) -> EvalError {
    EvalError::new(EvalErrorKind::Timeout {
        millis: u64::try_from(after.as_millis()).unwrap_or(u64::MAX),
    })
}

#[cold]
pub fn cancelled() -> EvalError {
    EvalError::new(EvalErrorKind::Cancelled)
}

// === Infrastructure ===

#[cold]
pub fn internal_runner(message: impl Into<String>) -> EvalError {
    EvalError::new(EvalErrorKind::InternalRunner {
        message: message.into(),
    })
}
