//! Standard library overload sets.
//!
//! Operators dispatch through the sets registered in `arith`, so `a + b`
//! and `add(a, b)` share signatures. Namespaced functions use dotted names
//! (`List.map`); the compiler resolves `List.map` to the builtin when
//! `List` is not a bound variable.

mod arith;
mod collections;
mod dist;
mod math;

use crate::errors::{type_mismatch, EvalResult};
use crate::registry::RegistryBuilder;
use crate::value::{Bindings, SampleSet};
use crate::Value;

pub(crate) fn register(builder: &mut RegistryBuilder) {
    arith::register(builder);
    math::register(builder);
    collections::register(builder);
    dist::register(builder);
}

// Argument accessors. Signatures have already checked the types, so the
// error arms only fire if a signature and its implementation disagree.

fn arg(args: &[Value], i: usize) -> EvalResult<&Value> {
    args.get(i).ok_or_else(|| type_mismatch("an argument", &Value::Void))
}

fn number(args: &[Value], i: usize) -> EvalResult<f64> {
    let value = arg(args, i)?;
    value.as_number().ok_or_else(|| type_mismatch("Number", value))
}

fn boolean(args: &[Value], i: usize) -> EvalResult<bool> {
    let value = arg(args, i)?;
    value.as_bool().ok_or_else(|| type_mismatch("Bool", value))
}

fn string(args: &[Value], i: usize) -> EvalResult<&str> {
    let value = arg(args, i)?;
    value.as_str().ok_or_else(|| type_mismatch("String", value))
}

fn list(args: &[Value], i: usize) -> EvalResult<&[Value]> {
    let value = arg(args, i)?;
    value.as_list().ok_or_else(|| type_mismatch("List", value))
}

fn dict(args: &[Value], i: usize) -> EvalResult<&Bindings> {
    let value = arg(args, i)?;
    value.as_dict().ok_or_else(|| type_mismatch("Dict", value))
}

fn sample_set(args: &[Value], i: usize) -> EvalResult<&SampleSet> {
    let value = arg(args, i)?;
    value.as_dist().ok_or_else(|| type_mismatch("Dist", value))
}

/// Every element of `items` as a number.
fn numbers(items: &[Value]) -> EvalResult<Vec<f64>> {
    items
        .iter()
        .map(|item| item.as_number().ok_or_else(|| type_mismatch("Number", item)))
        .collect()
}
