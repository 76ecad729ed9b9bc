//! Live call stack for the interpreter.
//!
//! Every call (builtin or lambda) pushes a `CallFrame`; return or failure
//! pops it. When an error is raised the stack is snapshotted into a
//! `CallTrace` that travels with the error, so a diagnostic can be rendered
//! without re-running anything.

use quill_ir::Span;

use crate::errors::{stack_overflow, CallTrace, EvalError, TraceFrame};

/// A single frame in the live call stack.
#[derive(Clone, Debug)]
pub struct CallFrame {
    /// Function name, or `<lambda>` for anonymous closures.
    pub callee: String,
    /// Where the call was made, not where the callee was defined.
    pub call_span: Option<Span>,
}

/// Call stack with an optional depth limit.
///
/// ```ignore
/// let mut stack = CallStack::new(Some(1000));
/// stack.push(CallFrame { callee: "f".into(), call_span: Some(span) })?;
/// // ... evaluate body ...
/// stack.pop();
/// ```
#[derive(Clone, Debug, Default)]
pub struct CallStack {
    frames: Vec<CallFrame>,
    max_depth: Option<usize>,
}

impl CallStack {
    pub fn new(max_depth: Option<usize>) -> Self {
        CallStack {
            frames: Vec::new(),
            max_depth,
        }
    }

    /// Push a frame, failing with `StackOverflow` at the depth limit.
    ///
    /// On overflow the frame is not pushed, so the caller must not pop.
    pub fn push(&mut self, frame: CallFrame) -> Result<(), EvalError> {
        if let Some(max) = self.max_depth {
            if self.frames.len() >= max {
                return Err(stack_overflow(max).with_call_trace(self.capture()));
            }
        }
        self.frames.push(frame);
        Ok(())
    }

    pub fn pop(&mut self) {
        debug_assert!(!self.frames.is_empty(), "CallStack::pop() on empty stack");
        self.frames.pop();
    }

    #[inline]
    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Snapshot, most recent call first.
    pub fn capture(&self) -> CallTrace {
        CallTrace::new(
            self.frames
                .iter()
                .rev()
                .map(|f| TraceFrame {
                    callee: f.callee.clone(),
                    call_span: f.call_span,
                })
                .collect(),
        )
    }

    /// Attach a snapshot to `err` unless it already carries one.
    pub fn attach_trace(&self, err: EvalError) -> EvalError {
        if self.frames.is_empty() || err.call_trace.is_some() {
            return err;
        }
        err.with_call_trace(self.capture())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::{runtime_error, EvalErrorKind};

    fn frame(name: &str, start: u32) -> CallFrame {
        CallFrame {
            callee: name.to_string(),
            call_span: Some(Span::new(start, start + 1)),
        }
    }

    #[test]
    fn capture_is_most_recent_first() {
        let mut stack = CallStack::new(None);
        assert!(stack.push(frame("<module>", 0)).is_ok());
        assert!(stack.push(frame("outer", 5)).is_ok());
        assert!(stack.push(frame("inner", 9)).is_ok());

        let trace = stack.capture();
        let names: Vec<_> = trace.frames().iter().map(|f| f.callee.as_str()).collect();
        assert_eq!(names, ["inner", "outer", "<module>"]);
        assert_eq!(stack.depth(), 3);
    }

    #[test]
    fn push_enforces_limit() {
        let mut stack = CallStack::new(Some(2));
        assert!(stack.push(frame("a", 0)).is_ok());
        assert!(stack.push(frame("b", 1)).is_ok());
        let err = stack.push(frame("c", 2)).err();
        assert_eq!(
            err.as_ref().map(|e| &e.kind),
            Some(&EvalErrorKind::StackOverflow { limit: 2 })
        );
        assert_eq!(stack.depth(), 2);
        assert_eq!(err.and_then(|e| e.call_trace).map(|t| t.len()), Some(2));
    }

    #[test]
    fn attach_keeps_innermost_trace() {
        let mut stack = CallStack::new(None);
        assert!(stack.push(frame("f", 0)).is_ok());
        assert!(stack.push(frame("g", 3)).is_ok());
        let err = stack.attach_trace(runtime_error("boom"));
        stack.pop();
        let err = stack.attach_trace(err);
        assert_eq!(err.call_trace.map(|t| t.len()), Some(2));
    }

    #[test]
    fn empty_stack_attaches_nothing() {
        let stack = CallStack::default();
        assert!(stack.is_empty());
        assert!(stack.attach_trace(runtime_error("x")).call_trace.is_none());
    }
}
