//! Runtime values.
//!
//! Heap payloads are wrapped in `Heap<T>`, whose constructor is
//! crate-private, so values are built through the factory methods here:
//!
//! ```text
//! let s = Value::string("hello");   // OK
//! let l = Value::list(vec![]);      // OK
//! let s = Value::Str(Heap::new(..)) // ERROR outside this crate
//! ```
//!
//! Every value kind, closures included, has a canonical serde encoding,
//! which is what lets runners move values across a worker boundary.

mod heap;
mod sample_set;

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

pub use heap::Heap;
pub use sample_set::SampleSet;

use crate::ir::LambdaIr;

/// Name-ordered bindings, as produced by a module run.
pub type Bindings = BTreeMap<String, Value>;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum Value {
    Void,
    Number(f64),
    Bool(bool),
    Str(Heap<String>),
    List(Heap<Vec<Value>>),
    Dict(Heap<Bindings>),
    Dist(Heap<SampleSet>),
    /// User-defined closure: compiled IR plus captured values.
    Lambda(Heap<LambdaValue>),
    /// Builtin overload set, by registered name.
    Builtin(Heap<String>),
}

/// A user closure.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LambdaValue {
    pub ir: Heap<LambdaIr>,
    pub captures: Vec<Value>,
}

impl LambdaValue {
    /// Name used in call frames and diagnostics.
    pub fn display_name(&self) -> &str {
        self.ir.name.as_deref().unwrap_or("<lambda>")
    }

    pub fn arity(&self) -> usize {
        self.ir.params.len()
    }
}

impl Value {
    // === Factories ===

    #[inline]
    pub fn number(n: f64) -> Self {
        Value::Number(n)
    }

    pub fn string(s: impl Into<String>) -> Self {
        Value::Str(Heap::new(s.into()))
    }

    pub fn list(items: Vec<Value>) -> Self {
        Value::List(Heap::new(items))
    }

    pub fn dict(entries: Bindings) -> Self {
        Value::Dict(Heap::new(entries))
    }

    pub fn dist(samples: SampleSet) -> Self {
        Value::Dist(Heap::new(samples))
    }

    pub fn lambda(lambda: LambdaValue) -> Self {
        Value::Lambda(Heap::new(lambda))
    }

    pub fn builtin(name: impl Into<String>) -> Self {
        Value::Builtin(Heap::new(name.into()))
    }

    // === Accessors ===

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items.as_slice()),
            _ => None,
        }
    }

    pub fn as_dict(&self) -> Option<&Bindings> {
        match self {
            Value::Dict(entries) => Some(entries),
            _ => None,
        }
    }

    pub fn as_dist(&self) -> Option<&SampleSet> {
        match self {
            Value::Dist(set) => Some(set),
            _ => None,
        }
    }

    pub fn is_callable(&self) -> bool {
        matches!(self, Value::Lambda(_) | Value::Builtin(_))
    }

    /// Type name as shown in signatures and mismatch errors.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Void => "Void",
            Value::Number(_) => "Number",
            Value::Bool(_) => "Bool",
            Value::Str(_) => "String",
            Value::List(_) => "List",
            Value::Dict(_) => "Dict",
            Value::Dist(_) => "Dist",
            Value::Lambda(_) | Value::Builtin(_) => "Function",
        }
    }

    /// Text form used by `toString`: strings unquoted, everything else as displayed.
    pub fn to_text(&self) -> String {
        match self {
            Value::Str(s) => s.to_string(),
            other => other.to_string(),
        }
    }
}

impl PartialEq for Value {
    /// Structural equality; numbers compare by bit pattern so that
    /// "identical result" means identical down to NaN payloads and signed zero.
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Void, Value::Void) => true,
            (Value::Number(a), Value::Number(b)) => a.to_bits() == b.to_bits(),
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Str(a), Value::Str(b)) | (Value::Builtin(a), Value::Builtin(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            (Value::Dict(a), Value::Dict(b)) => a == b,
            (Value::Dist(a), Value::Dist(b)) => a == b,
            (Value::Lambda(a), Value::Lambda(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Void => write!(f, "()"),
            Value::Number(n) => write!(f, "{n}"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Str(s) => write!(f, "{:?}", s.as_str()),
            Value::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
            Value::Dict(entries) => {
                write!(f, "{{")?;
                for (i, (key, value)) in entries.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{key}: {value}")?;
                }
                write!(f, "}}")
            }
            Value::Dist(set) => write!(
                f,
                "SampleSet(n={}, mean={:.4})",
                set.len(),
                set.mean()
            ),
            Value::Lambda(lambda) => {
                let params: Vec<&str> = lambda.ir.params.iter().map(|p| p.name.as_str()).collect();
                write!(f, "<lambda {}({})>", lambda.display_name(), params.join(", "))
            }
            Value::Builtin(name) => write!(f, "<builtin {name}>"),
        }
    }
}
