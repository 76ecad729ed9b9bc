//! Quill Runner - where a compiled program actually executes.
//!
//! Three interchangeable `Runner`s:
//!
//! ```text
//! InProcessRunner       caller's thread, synchronous
//! IsolatedWorkerRunner  one worker thread, bincode bytes over a channel
//! WorkerPoolRunner      N worker threads sharing one FIFO queue
//! ```
//!
//! Outputs are value-equal across runners; only `execution_time` differs.
//! Worker runners catch panics in a job, answer it with `InternalRunner`,
//! and replace the worker.

mod in_process;
mod isolated;
mod pool;
pub mod protocol;
mod ticket;
mod worker;

use std::sync::Arc;
use std::time::Duration;

use quill_eval::{Bindings, Environment, EvalError, Externals, Value};
use quill_ir::Program;

pub use in_process::InProcessRunner;
pub use isolated::IsolatedWorkerRunner;
pub use pool::{PoolStats, WorkerPoolRunner};
pub use ticket::RunTicket;

/// One module run: the parsed program and everything it is evaluated against.
#[derive(Clone, Debug)]
pub struct RunRequest {
    pub program: Arc<Program>,
    pub environment: Environment,
    pub externals: Externals,
}

/// A completed run.
#[derive(Clone, Debug)]
pub struct RunSuccess {
    pub result: Value,
    pub bindings: Bindings,
    pub exports: Bindings,
    pub execution_time: Duration,
}

impl RunSuccess {
    /// Equality ignoring `execution_time`.
    pub fn same_values(&self, other: &RunSuccess) -> bool {
        self.result == other.result
            && self.bindings == other.bindings
            && self.exports == other.exports
    }
}

pub type RunResult = Result<RunSuccess, EvalError>;

/// Executes one compiled program and returns a typed result.
pub trait Runner: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    /// How many runs can make progress at once.
    fn parallelism(&self) -> usize {
        1
    }

    /// Start a run; the result is collected from the ticket.
    fn submit(&self, request: RunRequest) -> RunTicket;

    fn run(&self, request: RunRequest) -> RunResult {
        self.submit(request).wait()
    }
}

impl<R: Runner + ?Sized> Runner for Arc<R> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn parallelism(&self) -> usize {
        (**self).parallelism()
    }

    fn submit(&self, request: RunRequest) -> RunTicket {
        (**self).submit(request)
    }
}
