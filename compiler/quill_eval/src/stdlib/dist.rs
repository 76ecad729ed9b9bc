//! Sample-set constructors and summaries.

use crate::errors::EvalResult;
use crate::registry::{CallContext, ParamType as P, RegistryBuilder};
use crate::value::{Bindings, SampleSet};
use crate::Value;

use super::{list, number, numbers, sample_set};

pub(super) fn register(b: &mut RegistryBuilder) {
    b.function("normal", vec![P::Number, P::Number], "Dist", normal)
        .function("uniform", vec![P::Number, P::Number], "Dist", uniform)
        .function("pointMass", vec![P::Number], "Dist", point_mass)
        .function("mean", vec![P::Dist], "Number", mean_dist)
        .function("mean", vec![P::List], "Number", mean_list)
        .function("stdev", vec![P::Dist], "Number", stdev)
        .function("sample", vec![P::Dist], "Number", sample)
        .function("Dist.quantile", vec![P::Dist, P::NumberIn(0.0, 1.0)], "Number", quantile)
        .function("Dist.histogram", vec![P::Dist], "List", histogram)
        .function("Dist.fromSamples", vec![P::List], "Dist", from_samples);
}

fn normal(ctx: &mut dyn CallContext, args: &[Value]) -> EvalResult {
    let count = ctx.environment().sample_count;
    let set = SampleSet::normal(number(args, 0)?, number(args, 1)?, count, ctx.rng())?;
    Ok(Value::dist(set))
}

fn uniform(ctx: &mut dyn CallContext, args: &[Value]) -> EvalResult {
    let count = ctx.environment().sample_count;
    let set = SampleSet::uniform(number(args, 0)?, number(args, 1)?, count, ctx.rng())?;
    Ok(Value::dist(set))
}

fn point_mass(ctx: &mut dyn CallContext, args: &[Value]) -> EvalResult {
    let count = ctx.environment().sample_count;
    Ok(Value::dist(SampleSet::point_mass(number(args, 0)?, count)?))
}

fn mean_dist(_: &mut dyn CallContext, args: &[Value]) -> EvalResult {
    Ok(Value::number(sample_set(args, 0)?.mean()))
}

fn mean_list(_: &mut dyn CallContext, args: &[Value]) -> EvalResult {
    let set = SampleSet::from_samples(numbers(list(args, 0)?)?)?;
    Ok(Value::number(set.mean()))
}

fn stdev(_: &mut dyn CallContext, args: &[Value]) -> EvalResult {
    Ok(Value::number(sample_set(args, 0)?.stdev()))
}

fn sample(ctx: &mut dyn CallContext, args: &[Value]) -> EvalResult {
    Ok(Value::number(sample_set(args, 0)?.draw(ctx.rng())))
}

fn quantile(_: &mut dyn CallContext, args: &[Value]) -> EvalResult {
    Ok(Value::number(sample_set(args, 0)?.quantile(number(args, 1)?)?))
}

#[expect(clippy::cast_precision_loss, reason = "bucket counts fit in f64")]
fn histogram(ctx: &mut dyn CallContext, args: &[Value]) -> EvalResult {
    let buckets = ctx.environment().precision;
    let rows = sample_set(args, 0)?
        .histogram(buckets)
        .into_iter()
        .map(|(start, count)| {
            let mut row = Bindings::new();
            row.insert("start".to_string(), Value::number(start));
            row.insert("count".to_string(), Value::number(count as f64));
            Value::dict(row)
        })
        .collect();
    Ok(Value::list(rows))
}

fn from_samples(_: &mut dyn CallContext, args: &[Value]) -> EvalResult {
    Ok(Value::dist(SampleSet::from_samples(numbers(list(args, 0)?)?)?))
}
