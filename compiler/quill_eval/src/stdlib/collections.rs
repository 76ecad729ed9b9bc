//! List and dict functions.

use crate::errors::{key_not_found, runtime_error, EvalResult};
use crate::registry::{CallContext, ParamType as P, RegistryBuilder};
use crate::Value;

use super::{arg, dict, list, number, numbers, string};

/// Upper bound on `List.upTo` results.
const MAX_RANGE_LEN: i64 = 10_000_000;

/// 2^53 - 1. Every integer up to it and its successor are exact in an `f64`.
const MAX_EXACT_INTEGER: f64 = 9_007_199_254_740_991.0;

pub(super) fn register(b: &mut RegistryBuilder) {
    b.function("List.length", vec![P::List], "Number", length)
        .function("List.map", vec![P::List, P::Function], "List", map)
        .function("List.reduce", vec![P::List, P::Any, P::Function], "Any", reduce)
        .function("List.upTo", vec![P::Number, P::Number], "List", up_to)
        .function("List.sum", vec![P::List], "Number", sum)
        .function("Dict.keys", vec![P::Dict], "List", keys)
        .function("Dict.get", vec![P::Dict, P::String], "Any", get)
        .function("Dict.has", vec![P::Dict, P::String], "Bool", has)
        .function("toString", vec![P::Any], "String", to_string);
}

#[expect(clippy::cast_precision_loss, reason = "list lengths fit in f64")]
fn length(_: &mut dyn CallContext, args: &[Value]) -> EvalResult {
    Ok(Value::number(list(args, 0)?.len() as f64))
}

fn map(ctx: &mut dyn CallContext, args: &[Value]) -> EvalResult {
    let f = arg(args, 1)?;
    let mapped = list(args, 0)?
        .iter()
        .map(|item| ctx.call(f, std::slice::from_ref(item)))
        .collect::<EvalResult<Vec<_>>>()?;
    Ok(Value::list(mapped))
}

fn reduce(ctx: &mut dyn CallContext, args: &[Value]) -> EvalResult {
    let f = arg(args, 2)?;
    let mut acc = arg(args, 1)?.clone();
    for item in list(args, 0)? {
        acc = ctx.call(f, &[acc, item.clone()])?;
    }
    Ok(acc)
}

fn up_to(_: &mut dyn CallContext, args: &[Value]) -> EvalResult {
    let (low, high) = (number(args, 0)?, number(args, 1)?);
    let (Some(start), Some(end)) = (exact_integer(low), exact_integer(high)) else {
        return Err(runtime_error(format!(
            "List.upTo({low}, {high}) needs integer bounds within ±2^53"
        )));
    };
    if end.saturating_sub(start) >= MAX_RANGE_LEN {
        return Err(runtime_error(format!(
            "List.upTo({low}, {high}) would produce more than {MAX_RANGE_LEN} elements"
        )));
    }
    Ok(Value::list((start..=end).map(integer_value).collect()))
}

/// `x` as an integer, if it is one within `±MAX_EXACT_INTEGER`.
#[expect(clippy::cast_possible_truncation, reason = "range checked above")]
fn exact_integer(x: f64) -> Option<i64> {
    (x.fract() == 0.0 && x.abs() <= MAX_EXACT_INTEGER).then(|| x as i64)
}

#[expect(clippy::cast_precision_loss, reason = "bounded by MAX_EXACT_INTEGER")]
fn integer_value(i: i64) -> Value {
    Value::number(i as f64)
}

fn sum(_: &mut dyn CallContext, args: &[Value]) -> EvalResult {
    Ok(Value::number(numbers(list(args, 0)?)?.into_iter().sum()))
}

fn keys(_: &mut dyn CallContext, args: &[Value]) -> EvalResult {
    Ok(Value::list(
        dict(args, 0)?.keys().map(|k| Value::string(k.as_str())).collect(),
    ))
}

fn get(_: &mut dyn CallContext, args: &[Value]) -> EvalResult {
    let key = string(args, 1)?;
    dict(args, 0)?
        .get(key)
        .cloned()
        .ok_or_else(|| key_not_found(key))
}

fn has(_: &mut dyn CallContext, args: &[Value]) -> EvalResult {
    Ok(Value::Bool(dict(args, 0)?.contains_key(string(args, 1)?)))
}

fn to_string(_: &mut dyn CallContext, args: &[Value]) -> EvalResult {
    Ok(Value::string(arg(args, 0)?.to_text()))
}
