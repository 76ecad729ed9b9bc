//! Arithmetic, comparison and logical operator sets.

use crate::errors::EvalResult;
use crate::registry::{CallContext, ParamType as P, RegistryBuilder};
use crate::Value;

use super::{boolean, list, number, sample_set, string};

/// Registers `name` for number/number plus the three sample-set pairings.
macro_rules! numeric_binary {
    ($builder:expr, $name:literal, $op:expr) => {{
        fn nn(_: &mut dyn CallContext, args: &[Value]) -> EvalResult {
            let op: fn(f64, f64) -> f64 = $op;
            Ok(Value::number(op(number(args, 0)?, number(args, 1)?)))
        }
        fn dd(_: &mut dyn CallContext, args: &[Value]) -> EvalResult {
            let op: fn(f64, f64) -> f64 = $op;
            Ok(Value::dist(sample_set(args, 0)?.zip_with(sample_set(args, 1)?, op)?))
        }
        fn dn(_: &mut dyn CallContext, args: &[Value]) -> EvalResult {
            let op: fn(f64, f64) -> f64 = $op;
            let rhs = number(args, 1)?;
            Ok(Value::dist(sample_set(args, 0)?.map(|x| op(x, rhs))))
        }
        fn nd(_: &mut dyn CallContext, args: &[Value]) -> EvalResult {
            let op: fn(f64, f64) -> f64 = $op;
            let lhs = number(args, 0)?;
            Ok(Value::dist(sample_set(args, 1)?.map(|x| op(lhs, x))))
        }
        $builder
            .function($name, vec![P::Number, P::Number], "Number", nn)
            .function($name, vec![P::Dist, P::Dist], "Dist", dd)
            .function($name, vec![P::Dist, P::Number], "Dist", dn)
            .function($name, vec![P::Number, P::Dist], "Dist", nd);
    }};
}

/// Registers an ordering comparison for numbers and strings.
macro_rules! ordering {
    ($builder:expr, $name:literal, $op:tt) => {{
        fn nn(_: &mut dyn CallContext, args: &[Value]) -> EvalResult {
            Ok(Value::Bool(number(args, 0)? $op number(args, 1)?))
        }
        fn ss(_: &mut dyn CallContext, args: &[Value]) -> EvalResult {
            Ok(Value::Bool(string(args, 0)? $op string(args, 1)?))
        }
        $builder
            .function($name, vec![P::Number, P::Number], "Bool", nn)
            .function($name, vec![P::String, P::String], "Bool", ss);
    }};
}

pub(super) fn register(b: &mut RegistryBuilder) {
    numeric_binary!(b, "add", |a, b| a + b);
    b.function("add", vec![P::String, P::String], "String", add_strings)
        .function("add", vec![P::List, P::List], "List", add_lists);
    numeric_binary!(b, "subtract", |a, b| a - b);
    numeric_binary!(b, "multiply", |a, b| a * b);
    numeric_binary!(b, "divide", |a, b| a / b);
    numeric_binary!(b, "pow", f64::powf);

    b.function("negate", vec![P::Number], "Number", negate_number)
        .function("negate", vec![P::Dist], "Dist", negate_dist)
        .function("not", vec![P::Bool], "Bool", not)
        .function("equal", vec![P::Any, P::Any], "Bool", equal)
        .function("unequal", vec![P::Any, P::Any], "Bool", unequal);

    ordering!(b, "smaller", <);
    ordering!(b, "smallerEq", <=);
    ordering!(b, "larger", >);
    ordering!(b, "largerEq", >=);
}

fn add_strings(_: &mut dyn CallContext, args: &[Value]) -> EvalResult {
    let mut out = string(args, 0)?.to_string();
    out.push_str(string(args, 1)?);
    Ok(Value::string(out))
}

fn add_lists(_: &mut dyn CallContext, args: &[Value]) -> EvalResult {
    let mut out = list(args, 0)?.to_vec();
    out.extend_from_slice(list(args, 1)?);
    Ok(Value::list(out))
}

fn negate_number(_: &mut dyn CallContext, args: &[Value]) -> EvalResult {
    Ok(Value::number(-number(args, 0)?))
}

fn negate_dist(_: &mut dyn CallContext, args: &[Value]) -> EvalResult {
    Ok(Value::dist(sample_set(args, 0)?.map(|x| -x)))
}

fn not(_: &mut dyn CallContext, args: &[Value]) -> EvalResult {
    Ok(Value::Bool(!boolean(args, 0)?))
}

fn equal(_: &mut dyn CallContext, args: &[Value]) -> EvalResult {
    Ok(Value::Bool(args.first() == args.get(1)))
}

fn unequal(_: &mut dyn CallContext, args: &[Value]) -> EvalResult {
    Ok(Value::Bool(args.first() != args.get(1)))
}
