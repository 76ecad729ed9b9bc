//! Scalar math, lifted pointwise over sample sets.

use crate::errors::{runtime_error, EvalResult};
use crate::registry::{CallContext, ParamType as P, RegistryBuilder};
use crate::Value;

use super::{list, number, numbers, sample_set};

macro_rules! unary_math {
    ($builder:expr, $name:literal, $op:expr) => {{
        fn n(_: &mut dyn CallContext, args: &[Value]) -> EvalResult {
            let op: fn(f64) -> f64 = $op;
            Ok(Value::number(op(number(args, 0)?)))
        }
        fn d(_: &mut dyn CallContext, args: &[Value]) -> EvalResult {
            let op: fn(f64) -> f64 = $op;
            Ok(Value::dist(sample_set(args, 0)?.map(op)))
        }
        $builder
            .function($name, vec![P::Number], "Number", n)
            .function($name, vec![P::Dist], "Dist", d);
    }};
}

pub(super) fn register(b: &mut RegistryBuilder) {
    unary_math!(b, "abs", f64::abs);
    unary_math!(b, "sqrt", f64::sqrt);
    unary_math!(b, "exp", f64::exp);
    unary_math!(b, "log", f64::ln);

    b.function("round", vec![P::Number], "Number", round)
        .function("min", vec![P::Number, P::Number], "Number", min_pair)
        .function("min", vec![P::List], "Number", min_list)
        .function("max", vec![P::Number, P::Number], "Number", max_pair)
        .function("max", vec![P::List], "Number", max_list);
}

fn round(_: &mut dyn CallContext, args: &[Value]) -> EvalResult {
    Ok(Value::number(number(args, 0)?.round()))
}

fn min_pair(_: &mut dyn CallContext, args: &[Value]) -> EvalResult {
    Ok(Value::number(number(args, 0)?.min(number(args, 1)?)))
}

fn max_pair(_: &mut dyn CallContext, args: &[Value]) -> EvalResult {
    Ok(Value::number(number(args, 0)?.max(number(args, 1)?)))
}

fn min_list(_: &mut dyn CallContext, args: &[Value]) -> EvalResult {
    numbers(list(args, 0)?)?
        .into_iter()
        .reduce(f64::min)
        .map(Value::number)
        .ok_or_else(|| runtime_error("min of an empty list"))
}

fn max_list(_: &mut dyn CallContext, args: &[Value]) -> EvalResult {
    numbers(list(args, 0)?)?
        .into_iter()
        .reduce(f64::max)
        .map(Value::number)
        .ok_or_else(|| runtime_error("max of an empty list"))
}
