//! Entry point: AST + environment + externals to a `ProgramOutput`.

use quill_ir::Program;
use serde::{Deserialize, Serialize};

use crate::compile::compile;
use crate::environment::{AbortFlag, EvalLimits, Environment};
use crate::errors::EvalResult;
use crate::interpreter::{Interpreter, ProgramOutput};
use crate::ir::CompiledProgram;
use crate::registry::Registry;
use crate::value::Bindings;

/// Names bound before a module's first statement.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Externals {
    /// Full bindings of the modules this one continues.
    pub continued: Bindings,
    /// Import exports, already merged in declaration order.
    pub imported: Bindings,
}

impl Externals {
    /// One scope, imports shadowing continued names.
    pub fn merged(&self) -> Bindings {
        let mut merged = self.continued.clone();
        merged.extend(
            self.imported
                .iter()
                .map(|(name, value)| (name.clone(), value.clone())),
        );
        merged
    }

    pub fn is_empty(&self) -> bool {
        self.continued.is_empty() && self.imported.is_empty()
    }
}

/// Compiles and runs programs against one registry.
///
/// ```ignore
/// let registry = Registry::standard();
/// let output = Evaluator::new(&registry)
///     .limits(EvalLimits::default())
///     .evaluate(&program, &Environment::default(), &Externals::default())?;
/// ```
pub struct Evaluator<'r> {
    registry: &'r Registry,
    limits: EvalLimits,
    abort: Option<AbortFlag>,
}

impl<'r> Evaluator<'r> {
    pub fn new(registry: &'r Registry) -> Self {
        Evaluator {
            registry,
            limits: EvalLimits::default(),
            abort: None,
        }
    }

    #[must_use]
    pub fn limits(mut self, limits: EvalLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Flag checked between reduction steps; setting it fails the run with `Cancelled`.
    #[must_use]
    pub fn abort(mut self, flag: AbortFlag) -> Self {
        self.abort = Some(flag);
        self
    }

    pub fn compile(&self, program: &Program, externals: &Externals) -> EvalResult<CompiledProgram> {
        let names: Vec<String> = externals.merged().into_keys().collect();
        compile(program, self.registry, &names)
    }

    #[tracing::instrument(level = "debug", skip_all, fields(seed = %environment.seed))]
    pub fn evaluate(
        &self,
        program: &Program,
        environment: &Environment,
        externals: &Externals,
    ) -> EvalResult<ProgramOutput> {
        let scope = externals.merged();
        let names: Vec<String> = scope.keys().cloned().collect();
        let compiled = compile(program, self.registry, &names)?;
        Interpreter::new(self.registry, environment, &self.limits, self.abort.as_ref())
            .run_program(&compiled, &scope)
    }
}
