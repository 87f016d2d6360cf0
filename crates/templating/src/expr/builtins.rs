//! Builtin function allow-list.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};

use crate::error::ExpressionError;
use crate::value::Value;

/// Upper bound on the number of items `range` may produce.
pub const MAX_RANGE: i64 = 100_000;

pub(crate) fn call(name: &str, args: &[Value]) -> Option<Result<Value, ExpressionError>> {
    let result = match name {
        "len" => len(args),
        "str" => arity(name, args, 1).map(|_| Value::Text(args[0].to_string())),
        "enumerate" => enumerate(args),
        "range" => range(args),
        "round" => round(args),
        "abs" => number_arg(name, args).map(|n| Value::Number(n.abs())),
        "upper" => text_arg(name, args).map(|s| Value::Text(s.to_uppercase())),
        "lower" => text_arg(name, args).map(|s| Value::Text(s.to_lowercase())),
        "default" => arity(name, args, 2).map(|_| match &args[0] {
            Value::None => args[1].clone(),
            other => other.clone(),
        }),
        _ => return None,
    };
    Some(result)
}

fn arity(name: &str, args: &[Value], expected: usize) -> Result<(), ExpressionError> {
    if args.len() == expected {
        Ok(())
    } else {
        Err(ExpressionError::call(
            name,
            format!("takes {expected} argument(s), got {}", args.len()),
        ))
    }
}

fn number_arg(name: &str, args: &[Value]) -> Result<Decimal, ExpressionError> {
    arity(name, args, 1)?;
    args[0]
        .as_number()
        .ok_or_else(|| ExpressionError::call(name, "expects a number"))
}

fn text_arg<'a>(name: &str, args: &'a [Value]) -> Result<&'a str, ExpressionError> {
    arity(name, args, 1)?;
    args[0]
        .as_text()
        .ok_or_else(|| ExpressionError::call(name, "expects text"))
}

fn integer(name: &str, value: &Value) -> Result<i64, ExpressionError> {
    value
        .as_number()
        .filter(|n| n.fract().is_zero())
        .and_then(|n| n.to_i64())
        .ok_or_else(|| ExpressionError::call(name, format!("expects an integer, got {value}")))
}

/// Items a `for` loop or `enumerate` walks over.
pub(crate) fn iterate(value: &Value) -> Result<Vec<Value>, ExpressionError> {
    match value {
        Value::List(items) => Ok(items.clone()),
        Value::Text(s) => Ok(s.chars().map(|c| Value::Text(c.to_string())).collect()),
        Value::Record(fields) => Ok(fields.keys().map(|k| Value::Text(k.clone())).collect()),
        other => Err(ExpressionError::type_error(format!(
            "{} is not iterable",
            other.kind()
        ))),
    }
}

fn len(args: &[Value]) -> Result<Value, ExpressionError> {
    arity("len", args, 1)?;
    let n = match &args[0] {
        Value::List(items) => items.len(),
        Value::Text(s) => s.chars().count(),
        Value::Record(fields) => fields.len(),
        other => {
            return Err(ExpressionError::call(
                "len",
                format!("{} has no length", other.kind()),
            ));
        }
    };
    Ok(Value::from(n))
}

fn enumerate(args: &[Value]) -> Result<Value, ExpressionError> {
    arity("enumerate", args, 1)?;
    let items = iterate(&args[0])?;
    Ok(Value::List(
        items
            .into_iter()
            .enumerate()
            .map(|(i, item)| Value::List(vec![Value::from(i), item]))
            .collect(),
    ))
}

fn range(args: &[Value]) -> Result<Value, ExpressionError> {
    let (start, stop) = match args {
        [stop] => (0, integer("range", stop)?),
        [start, stop] => (integer("range", start)?, integer("range", stop)?),
        _ => return Err(ExpressionError::call("range", "takes 1 or 2 arguments")),
    };
    if stop.saturating_sub(start) > MAX_RANGE {
        return Err(ExpressionError::call(
            "range",
            format!("more than {MAX_RANGE} items"),
        ));
    }
    Ok(Value::List((start..stop).map(Value::from).collect()))
}

fn round(args: &[Value]) -> Result<Value, ExpressionError> {
    let (value, places) = match args {
        [value] => (value, 0),
        [value, places] => (value, integer("round", places)?),
        _ => return Err(ExpressionError::call("round", "takes 1 or 2 arguments")),
    };
    let places = u32::try_from(places)
        .map_err(|_| ExpressionError::call("round", "places must not be negative"))?;
    let n = value
        .as_number()
        .ok_or_else(|| ExpressionError::call("round", "expects a number"))?;
    Ok(Value::Number(
        n.round_dp_with_strategy(places, RoundingStrategy::MidpointNearestEven),
    ))
}
