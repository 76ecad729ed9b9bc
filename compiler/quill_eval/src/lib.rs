//! Quill Eval - compiler and interpreter for Quill programs.
//!
//! ```text
//! Program ──► compile() ──► CompiledProgram ──► Interpreter ──► ProgramOutput
//!               ▲                                   │
//!               └──────── Registry (builtins) ──────┘
//! ```
//!
//! # Architecture
//!
//! - `compile`: resolves every identifier to a slot, capture, self reference
//!   or builtin; unbound names fail here
//! - `interpreter`: walks the IR over a slot stack with a `CallStack`
//! - `registry`: overload sets; dispatch picks the first accepting signature
//! - `stdlib`: the standard overload sets, operators included
//! - `value`: runtime values, all serializable
//!
//! Evaluation is a pure function of (program, environment, externals);
//! randomness comes from an `Rng` seeded by `Environment::seed`.

mod compile;
pub mod diagnostics;
mod environment;
pub mod errors;
mod evaluator;
mod interpreter;
pub mod ir;
pub mod registry;
mod rng;
mod stdlib;
pub mod value;

pub use compile::compile;
pub use diagnostics::{CallFrame, CallStack};
pub use environment::{AbortFlag, EvalLimits, Environment};
pub use errors::{
    CallTrace, ErrorCategory, EvalError, EvalErrorKind, EvalResult, ImportEdge, TraceFrame,
};
pub use evaluator::{Evaluator, Externals};
pub use interpreter::ProgramOutput;
pub use ir::CompiledProgram;
pub use registry::{CallContext, OverloadSet, ParamType, Registry, RegistryBuilder, Signature};
pub use rng::Rng;
pub use value::{Bindings, Heap, LambdaValue, SampleSet, Value};

