//! Calls: builtin dispatch, user lambdas, and the `CallContext` builtins see.

use quill_ir::Span;

use super::{Frame, Interpreter};
use crate::diagnostics::CallFrame;
use crate::environment::Environment;
use crate::errors::{
    arity_mismatch, domain_violation, not_callable, runtime_error, EvalResult,
};
use crate::registry::CallContext;
use crate::rng::Rng;
use crate::value::{Heap, LambdaValue};
use crate::Value;

impl Interpreter<'_> {
    /// Call any function value. `call_span` is the call site, if the call
    /// comes from source rather than from a builtin.
    pub(super) fn call_value(
        &mut self,
        callee: &Value,
        args: &[Value],
        call_span: Option<Span>,
    ) -> EvalResult {
        match callee {
            Value::Builtin(name) => self.call_builtin(name, args, call_span),
            Value::Lambda(lambda) => self.call_lambda(lambda, args, call_span),
            other => Err(not_callable(other)),
        }
    }

    fn call_builtin(&mut self, name: &str, args: &[Value], call_span: Option<Span>) -> EvalResult {
        let registry = self.registry;
        let set = registry
            .get(name)
            .ok_or_else(|| runtime_error(format!("`{name}` is not a registered builtin")))?;
        self.call_stack.push(CallFrame {
            callee: name.to_string(),
            call_span,
        })?;
        let result = set.dispatch(self, args);
        let result = result.map_err(|e| self.call_stack.attach_trace(e));
        self.call_stack.pop();
        result
    }

    fn call_lambda(
        &mut self,
        lambda: &Heap<LambdaValue>,
        args: &[Value],
        call_span: Option<Span>,
    ) -> EvalResult {
        let name = lambda.display_name();
        if args.len() != lambda.arity() {
            return Err(self
                .call_stack
                .attach_trace(arity_mismatch(name, lambda.arity(), args.len())));
        }
        for (param, arg) in lambda.ir.params.iter().zip(args) {
            let Some(domain) = &param.domain else {
                continue;
            };
            if !arg.as_number().is_some_and(|x| domain.contains(x)) {
                let err = domain_violation(name, &param.name, arg, domain);
                return Err(self.call_stack.attach_trace(err));
            }
        }

        self.call_stack.push(CallFrame {
            callee: name.to_string(),
            call_span,
        })?;
        let base = self.stack.len();
        self.stack.extend_from_slice(args);
        self.stack
            .resize(base + lambda.ir.frame_size as usize, Value::Void);
        let caller = std::mem::replace(
            &mut self.frame,
            Frame {
                base,
                lambda: Some(lambda.clone()),
            },
        );

        let result = self.eval(&lambda.ir.body);

        self.frame = caller;
        self.stack.truncate(base);
        let result = result.map_err(|e| self.call_stack.attach_trace(e));
        self.call_stack.pop();
        result
    }
}

impl CallContext for Interpreter<'_> {
    fn call(&mut self, callee: &Value, args: &[Value]) -> EvalResult {
        self.call_value(callee, args, None)
    }

    fn rng(&mut self) -> &mut Rng {
        &mut self.rng
    }

    fn environment(&self) -> &Environment {
        self.environment
    }
}
