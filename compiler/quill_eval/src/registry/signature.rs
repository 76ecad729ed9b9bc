//! Typed signatures for builtin functions.

use std::fmt::Write;

use crate::errors::EvalResult;
use crate::registry::CallContext;
use crate::Value;

/// Predicate on one argument.
#[derive(Clone, Debug, PartialEq)]
pub enum ParamType {
    Any,
    Number,
    /// A number within a closed interval.
    NumberIn(f64, f64),
    Bool,
    String,
    List,
    Dict,
    Dist,
    /// A lambda or a builtin.
    Function,
}

impl ParamType {
    pub fn matches(&self, value: &Value) -> bool {
        match (self, value) {
            (ParamType::Any, _)
            | (ParamType::Number, Value::Number(_))
            | (ParamType::Bool, Value::Bool(_))
            | (ParamType::String, Value::Str(_))
            | (ParamType::List, Value::List(_))
            | (ParamType::Dict, Value::Dict(_))
            | (ParamType::Dist, Value::Dist(_))
            | (ParamType::Function, Value::Lambda(_) | Value::Builtin(_)) => true,
            (ParamType::NumberIn(min, max), Value::Number(n)) => n >= min && n <= max,
            _ => false,
        }
    }

    /// Human-readable description, used in candidate listings.
    pub fn description(&self) -> String {
        match self {
            ParamType::Any => "Any".to_string(),
            ParamType::Number => "Number".to_string(),
            ParamType::NumberIn(min, max) => format!("Number in [{min}, {max}]"),
            ParamType::Bool => "Bool".to_string(),
            ParamType::String => "String".to_string(),
            ParamType::List => "List".to_string(),
            ParamType::Dict => "Dict".to_string(),
            ParamType::Dist => "Dist".to_string(),
            ParamType::Function => "Function".to_string(),
        }
    }
}

/// Implementation of one builtin signature.
///
/// Only called once every argument has matched the signature's predicates.
pub type BuiltinFn = fn(&mut dyn CallContext, &[Value]) -> EvalResult;

/// One typed variant of a builtin.
#[derive(Clone)]
pub struct Signature {
    params: Vec<ParamType>,
    /// Predicate for any number of trailing arguments.
    rest: Option<ParamType>,
    returns: &'static str,
    implementation: BuiltinFn,
}

impl Signature {
    pub fn new(params: Vec<ParamType>, returns: &'static str, implementation: BuiltinFn) -> Self {
        Signature {
            params,
            rest: None,
            returns,
            implementation,
        }
    }

    /// `params` followed by zero or more `rest` arguments.
    pub fn variadic(
        params: Vec<ParamType>,
        rest: ParamType,
        returns: &'static str,
        implementation: BuiltinFn,
    ) -> Self {
        Signature {
            params,
            rest: Some(rest),
            returns,
            implementation,
        }
    }

    pub fn arity(&self) -> usize {
        self.params.len()
    }

    pub fn is_variadic(&self) -> bool {
        self.rest.is_some()
    }

    /// Arity first, then every per-argument predicate.
    pub fn accepts(&self, args: &[Value]) -> bool {
        let arity_ok = match self.rest {
            Some(_) => args.len() >= self.params.len(),
            None => args.len() == self.params.len(),
        };
        if !arity_ok {
            return false;
        }
        args.iter().enumerate().all(|(i, arg)| {
            self.params
                .get(i)
                .or(self.rest.as_ref())
                .is_some_and(|p| p.matches(arg))
        })
    }

    pub(crate) fn call(&self, ctx: &mut dyn CallContext, args: &[Value]) -> EvalResult {
        (self.implementation)(ctx, args)
    }

    /// `name(Number, Number) => Number`
    pub fn render(&self, name: &str) -> String {
        let mut out = format!("{name}(");
        let mut rendered: Vec<String> = self.params.iter().map(ParamType::description).collect();
        if let Some(rest) = &self.rest {
            rendered.push(format!("...{}", rest.description()));
        }
        out.push_str(&rendered.join(", "));
        let _ = write!(out, ") => {}", self.returns);
        out
    }
}

impl std::fmt::Debug for Signature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Signature")
            .field("params", &self.params)
            .field("rest", &self.rest)
            .field("returns", &self.returns)
            .finish_non_exhaustive()
    }
}
