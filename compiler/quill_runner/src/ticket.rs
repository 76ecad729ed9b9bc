//! Handle to a submitted run.

use std::time::Duration;

use crossbeam::channel::{Receiver, RecvTimeoutError};
use quill_eval::errors::{internal_runner, timed_out};
use quill_eval::AbortFlag;

use crate::protocol::decode_response;
use crate::RunResult;

/// A run that has been submitted to a runner.
///
/// Dropping a pending ticket does not stop the run; call `cancel` for that.
pub struct RunTicket {
    state: TicketState,
}

enum TicketState {
    Ready(RunResult),
    Pending {
        response: Receiver<Vec<u8>>,
        abort: AbortFlag,
    },
}

impl RunTicket {
    /// A ticket whose result is already known.
    pub fn ready(result: RunResult) -> Self {
        RunTicket {
            state: TicketState::Ready(result),
        }
    }

    /// A ticket answered by an encoded `WireResponse` on `response`.
    pub(crate) fn pending(response: Receiver<Vec<u8>>, abort: AbortFlag) -> Self {
        RunTicket {
            state: TicketState::Pending { response, abort },
        }
    }

    pub fn is_ready(&self) -> bool {
        match &self.state {
            TicketState::Ready(_) => true,
            TicketState::Pending { response, .. } => !response.is_empty(),
        }
    }

    /// Block until the run finishes.
    pub fn wait(self) -> RunResult {
        match self.state {
            TicketState::Ready(result) => result,
            TicketState::Pending { response, .. } => match response.recv() {
                Ok(bytes) => decode_response(&bytes),
                Err(_) => Err(disconnected()),
            },
        }
    }

    /// Block for at most `timeout`; past it the run is aborted and the
    /// ticket resolves to `Timeout`.
    pub fn wait_timeout(self, timeout: Duration) -> RunResult {
        match self.state {
            TicketState::Ready(result) => result,
            TicketState::Pending { response, abort } => match response.recv_timeout(timeout) {
                Ok(bytes) => decode_response(&bytes),
                Err(RecvTimeoutError::Timeout) => {
                    abort.abort();
                    Err(timed_out(timeout))
                }
                Err(RecvTimeoutError::Disconnected) => Err(disconnected()),
            },
        }
    }

    /// Ask the run to stop at its next interrupt check. It then resolves to
    /// `Cancelled` unless it already finished.
    pub fn cancel(&self) {
        if let TicketState::Pending { abort, .. } = &self.state {
            abort.abort();
        }
    }

    /// The run's abort flag, for cancelling from another thread.
    pub fn abort_handle(&self) -> Option<AbortFlag> {
        match &self.state {
            TicketState::Ready(_) => None,
            TicketState::Pending { abort, .. } => Some(abort.clone()),
        }
    }
}

#[cold]
fn disconnected() -> quill_eval::EvalError {
    internal_runner("worker went away before answering")
}
