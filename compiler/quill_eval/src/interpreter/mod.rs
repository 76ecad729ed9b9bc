//! Slot-IR interpreter.
//!
//! Values live on one slot-indexed stack. A call reserves `frame_size`
//! slots above the caller's frame and releases them on return, so slot
//! access is a single index off the frame base.
//!
//! Every node counts as one reduction step. The step budget is checked on
//! every step; the abort flag and the deadline every `INTERRUPT_INTERVAL`
//! steps.
//!
//! Call handling lives in `call.rs`.

mod call;

use std::time::Instant;

use quill_stack::ensure_sufficient_stack;
use smallvec::SmallVec;

use crate::diagnostics::{CallFrame, CallStack};
use crate::environment::{AbortFlag, EvalLimits, Environment};
use crate::errors::{
    cancelled, index_out_of_bounds, key_not_found, runtime_error, step_budget_exceeded,
    timed_out, type_mismatch, EvalResult,
};
use crate::ir::{CaptureSource, CompiledProgram, IrKind, IrNode, IrStatement, Slot};
use crate::registry::Registry;
use crate::rng::Rng;
use crate::value::{Bindings, Heap, LambdaValue};
use crate::Value;

/// Steps between abort/deadline checks.
const INTERRUPT_INTERVAL: u64 = 256;

/// Arguments to one call; most calls have few.
type Args = SmallVec<[Value; 4]>;

/// The frame of the function currently executing.
#[derive(Clone, Default)]
struct Frame {
    base: usize,
    /// `None` for the module body.
    lambda: Option<Heap<LambdaValue>>,
}

/// Final state of a module run.
#[derive(Clone, Debug, PartialEq)]
pub struct ProgramOutput {
    /// Value of the last statement, if it is an expression.
    pub result: Value,
    pub bindings: Bindings,
    pub exports: Bindings,
}

pub(crate) struct Interpreter<'a> {
    registry: &'a Registry,
    environment: &'a Environment,
    limits: &'a EvalLimits,
    abort: Option<&'a AbortFlag>,
    rng: Rng,
    stack: Vec<Value>,
    frame: Frame,
    call_stack: CallStack,
    steps: u64,
    deadline: Option<Instant>,
}

impl<'a> Interpreter<'a> {
    pub(crate) fn new(
        registry: &'a Registry,
        environment: &'a Environment,
        limits: &'a EvalLimits,
        abort: Option<&'a AbortFlag>,
    ) -> Self {
        Interpreter {
            registry,
            environment,
            limits,
            abort,
            rng: Rng::from_seed(&environment.seed),
            stack: Vec::new(),
            frame: Frame::default(),
            call_stack: CallStack::new(limits.max_call_depth),
            steps: 0,
            deadline: limits.timeout.map(|timeout| Instant::now() + timeout),
        }
    }

    /// Run a module body with its externals bound.
    pub(crate) fn run_program(
        &mut self,
        program: &CompiledProgram,
        externals: &Bindings,
    ) -> EvalResult<ProgramOutput> {
        self.check_interrupts()?;
        self.call_stack.push(CallFrame {
            callee: "<module>".to_string(),
            call_span: None,
        })?;

        self.stack = program
            .external_names
            .iter()
            .map(|name| externals.get(name).cloned().unwrap_or(Value::Void))
            .collect();
        self.stack.resize(program.frame_size as usize, Value::Void);
        self.frame = Frame::default();

        let outcome = self.exec_statements(&program.statements);
        let outcome = outcome.map_err(|e| self.call_stack.attach_trace(e));
        self.call_stack.pop();
        let last = outcome?;

        let mut bindings = Bindings::new();
        for (name, slot) in &program.bindings {
            bindings.insert(name.clone(), self.local(*slot)?);
        }
        let exports = program
            .exports
            .iter()
            .filter_map(|name| bindings.get(name).map(|v| (name.clone(), v.clone())))
            .collect();
        tracing::debug!(steps = self.steps, "module evaluated");

        Ok(ProgramOutput {
            result: if program.has_result { last } else { Value::Void },
            bindings,
            exports,
        })
    }

    /// Value of the last statement.
    fn exec_statements(&mut self, statements: &[IrStatement]) -> EvalResult {
        let mut last = Value::Void;
        for statement in statements {
            match statement {
                IrStatement::Bind(binding) => {
                    let value = self.eval(&binding.value)?;
                    self.store(binding.slot, value)?;
                    last = Value::Void;
                }
                IrStatement::Expr(node) => last = self.eval(node)?,
            }
        }
        Ok(last)
    }

    fn eval(&mut self, node: &IrNode) -> EvalResult {
        ensure_sufficient_stack(|| self.eval_node(node))
    }

    fn eval_node(&mut self, node: &IrNode) -> EvalResult {
        self.tick().map_err(|e| e.or_span(node.span))?;
        match &node.kind {
            IrKind::Literal(value) => Ok(value.clone()),
            IrKind::Local(slot) => self.local(*slot),
            IrKind::Capture(index) => self.capture(*index),
            IrKind::SelfRef => self.self_ref(),
            IrKind::Builtin(name) => Ok(Value::builtin(name.as_str())),
            IrKind::List(items) => {
                let values = items
                    .iter()
                    .map(|item| self.eval(item))
                    .collect::<EvalResult<Vec<_>>>()?;
                Ok(Value::list(values))
            }
            IrKind::Dict(entries) => {
                let mut dict = Bindings::new();
                for (key, value) in entries {
                    let value = self.eval(value)?;
                    dict.insert(key.clone(), value);
                }
                Ok(Value::dict(dict))
            }
            IrKind::Call { callee, args } => {
                let function = self.eval(callee)?;
                let args = args
                    .iter()
                    .map(|arg| self.eval(arg))
                    .collect::<EvalResult<Args>>()?;
                self.call_value(&function, &args, Some(node.span))
                    .map_err(|e| e.or_span(node.span))
            }
            IrKind::Lambda(ir) => {
                let captures = ir
                    .captures
                    .iter()
                    .map(|source| match *source {
                        CaptureSource::Local(slot) => self.local(slot),
                        CaptureSource::Capture(index) => self.capture(index),
                        CaptureSource::SelfRef => self.self_ref(),
                    })
                    .collect::<EvalResult<Vec<_>>>()?;
                Ok(Value::lambda(LambdaValue {
                    ir: ir.clone(),
                    captures,
                }))
            }
            IrKind::Block { bindings, result } => {
                for binding in bindings {
                    let value = self.eval(&binding.value)?;
                    self.store(binding.slot, value)?;
                }
                self.eval(result)
            }
            IrKind::If {
                condition,
                then_branch,
                else_branch,
            } => {
                if self.eval_condition(condition)? {
                    self.eval(then_branch)
                } else {
                    self.eval(else_branch)
                }
            }
            IrKind::And(left, right) => {
                if self.eval_condition(left)? {
                    Ok(Value::Bool(self.eval_condition(right)?))
                } else {
                    Ok(Value::Bool(false))
                }
            }
            IrKind::Or(left, right) => {
                if self.eval_condition(left)? {
                    Ok(Value::Bool(true))
                } else {
                    Ok(Value::Bool(self.eval_condition(right)?))
                }
            }
            IrKind::Field { object, field } => {
                let object = self.eval(object)?;
                let result = match &object {
                    Value::Dict(entries) => entries.get(field).cloned().ok_or_else(|| key_not_found(field)),
                    other => Err(type_mismatch("Dict", other)),
                };
                result.map_err(|e| e.or_span(node.span))
            }
            IrKind::Index { object, index } => {
                let object = self.eval(object)?;
                let index = self.eval(index)?;
                index_value(&object, &index).map_err(|e| e.or_span(node.span))
            }
        }
    }

    fn eval_condition(&mut self, node: &IrNode) -> EvalResult<bool> {
        let value = self.eval(node)?;
        value
            .as_bool()
            .ok_or_else(|| type_mismatch("Bool", &value).or_span(node.span))
    }

    fn tick(&mut self) -> EvalResult<()> {
        self.steps = self.steps.saturating_add(1);
        if let Some(limit) = self.limits.max_steps {
            if self.steps > limit {
                return Err(step_budget_exceeded(limit));
            }
        }
        if self.steps % INTERRUPT_INTERVAL == 0 {
            self.check_interrupts()?;
        }
        Ok(())
    }

    fn check_interrupts(&self) -> EvalResult<()> {
        if self.abort.is_some_and(AbortFlag::is_aborted) {
            return Err(cancelled());
        }
        if let (Some(deadline), Some(timeout)) = (self.deadline, self.limits.timeout) {
            if Instant::now() >= deadline {
                return Err(timed_out(timeout));
            }
        }
        Ok(())
    }

    fn local(&self, slot: Slot) -> EvalResult {
        self.stack
            .get(self.frame.base + slot as usize)
            .cloned()
            .ok_or_else(|| runtime_error(format!("slot {slot} is outside the current frame")))
    }

    fn store(&mut self, slot: Slot, value: Value) -> EvalResult<()> {
        match self.stack.get_mut(self.frame.base + slot as usize) {
            Some(cell) => {
                *cell = value;
                Ok(())
            }
            None => Err(runtime_error(format!(
                "slot {slot} is outside the current frame"
            ))),
        }
    }

    fn capture(&self, index: u32) -> EvalResult {
        self.frame
            .lambda
            .as_ref()
            .and_then(|lambda| lambda.captures.get(index as usize))
            .cloned()
            .ok_or_else(|| runtime_error(format!("capture {index} is not available")))
    }

    fn self_ref(&self) -> EvalResult {
        self.frame
            .lambda
            .clone()
            .map(Value::Lambda)
            .ok_or_else(|| runtime_error("self reference outside a function"))
    }
}

#[expect(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    reason = "checked integral and non-negative before casting"
)]
fn index_value(object: &Value, index: &Value) -> EvalResult {
    match (object, index) {
        (Value::List(items), Value::Number(i)) => {
            if i.fract() != 0.0 || *i < 0.0 {
                return Err(index_out_of_bounds(*i, items.len()));
            }
            items
                .get(*i as usize)
                .cloned()
                .ok_or_else(|| index_out_of_bounds(*i, items.len()))
        }
        (Value::List(_), other) => Err(type_mismatch("Number", other)),
        (Value::Dict(entries), Value::Str(key)) => {
            entries.get(key.as_str()).cloned().ok_or_else(|| key_not_found(key))
        }
        (Value::Dict(_), other) => Err(type_mismatch("String", other)),
        (other, _) => Err(type_mismatch("List or Dict", other)),
    }
}
