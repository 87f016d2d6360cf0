// Tree-walking evaluation of parsed expressions.
// Recursion depth is bounded by the parser, which caps the depth of the tree.

use std::cmp::Ordering;

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;

use crate::context::RenderContext;
use crate::error::ExpressionError;
use crate::value::Value;

use super::builtins;
use super::parser::{Expr, Op};

pub(crate) fn eval(expr: &Expr, ctx: &RenderContext) -> Result<Value, ExpressionError> {
    match expr {
        Expr::Literal(value) => Ok(value.clone()),
        Expr::Name(name) => ctx
            .get(name)
            .cloned()
            .ok_or_else(|| ExpressionError::UnknownName(name.clone())),
        Expr::Field { target, name } => {
            let target = eval(target, ctx)?;
            field(&target, name)
        }
        Expr::Index { target, index } => {
            let target = eval(target, ctx)?;
            let index = eval(index, ctx)?;
            index_into(&target, &index)
        }
        Expr::Call { name, args } => {
            let args = args
                .iter()
                .map(|arg| eval(arg, ctx))
                .collect::<Result<Vec<_>, _>>()?;
            if let Some(function) = ctx.function(name) {
                return function(&args);
            }
            builtins::call(name, &args)
                .unwrap_or_else(|| Err(ExpressionError::UnknownFunction(name.clone())))
        }
        Expr::List(items) => items
            .iter()
            .map(|item| eval(item, ctx))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::List),
        Expr::Neg(operand) => match eval(operand, ctx)? {
            Value::Number(n) => Ok(Value::Number(-n)),
            other => Err(ExpressionError::type_error(format!(
                "cannot negate {}",
                other.kind()
            ))),
        },
        Expr::Not(operand) => Ok(Value::Bool(!eval(operand, ctx)?.is_truthy())),
        // `and` / `or` return an operand, not a bool, and skip the right side
        // when the left one decides.
        Expr::BinaryOp {
            op: Op::And,
            left,
            right,
        } => {
            let left = eval(left, ctx)?;
            if left.is_truthy() { eval(right, ctx) } else { Ok(left) }
        }
        Expr::BinaryOp {
            op: Op::Or,
            left,
            right,
        } => {
            let left = eval(left, ctx)?;
            if left.is_truthy() { Ok(left) } else { eval(right, ctx) }
        }
        Expr::BinaryOp { op, left, right } => {
            let left = eval(left, ctx)?;
            let right = eval(right, ctx)?;
            binary(*op, left, right)
        }
    }
}

fn field(target: &Value, name: &str) -> Result<Value, ExpressionError> {
    target
        .field(name)
        .cloned()
        .ok_or_else(|| ExpressionError::MissingField {
            field: name.to_string(),
            kind: target.kind(),
        })
}

fn index_into(target: &Value, index: &Value) -> Result<Value, ExpressionError> {
    match (target, index) {
        (Value::Record(_), Value::Text(key)) => field(target, key),
        (Value::List(items), Value::Number(n)) => {
            let i = position(*n, items.len())?;
            Ok(items[i].clone())
        }
        (Value::Text(s), Value::Number(n)) => {
            let chars: Vec<char> = s.chars().collect();
            let i = position(*n, chars.len())?;
            Ok(Value::Text(chars[i].to_string()))
        }
        (target, index) => Err(ExpressionError::type_error(format!(
            "cannot index {} with {}",
            target.kind(),
            index.kind()
        ))),
    }
}

/// Resolve a possibly negative index against `len`.
fn position(n: Decimal, len: usize) -> Result<usize, ExpressionError> {
    let index = n
        .fract()
        .is_zero()
        .then(|| n.to_i64())
        .flatten()
        .ok_or_else(|| ExpressionError::type_error(format!("index {n} is not an integer")))?;
    let resolved = if index < 0 {
        i64::try_from(len).ok().map(|len| len + index)
    } else {
        Some(index)
    };
    resolved
        .and_then(|i| usize::try_from(i).ok())
        .filter(|i| *i < len)
        .ok_or(ExpressionError::IndexOutOfRange { index, len })
}

fn binary(op: Op, left: Value, right: Value) -> Result<Value, ExpressionError> {
    match op {
        Op::Add => match (left, right) {
            (Value::Number(a), Value::Number(b)) => checked(a.checked_add(b)),
            (Value::Text(a), Value::Text(b)) => Ok(Value::Text(a + &b)),
            (Value::List(mut a), Value::List(b)) => {
                a.extend(b);
                Ok(Value::List(a))
            }
            (a, b) => Err(operand_error("+", &a, &b)),
        },
        Op::Sub => numeric(op, &left, &right, |a, b| checked(a.checked_sub(b))),
        Op::Mul => numeric(op, &left, &right, |a, b| checked(a.checked_mul(b))),
        Op::Div => numeric(op, &left, &right, |a, b| {
            if b.is_zero() {
                Err(ExpressionError::DivisionByZero)
            } else {
                checked(a.checked_div(b))
            }
        }),
        Op::Rem => numeric(op, &left, &right, |a, b| {
            if b.is_zero() {
                Err(ExpressionError::DivisionByZero)
            } else {
                checked(a.checked_rem(b))
            }
        }),
        Op::Eq => Ok(Value::Bool(left == right)),
        Op::NotEq => Ok(Value::Bool(left != right)),
        Op::Lt | Op::LtEq | Op::Gt | Op::GtEq => {
            let ordering = compare(&left, &right)
                .ok_or_else(|| operand_error(symbol(op), &left, &right))?;
            Ok(Value::Bool(match op {
                Op::Lt => ordering == Ordering::Less,
                Op::LtEq => ordering != Ordering::Greater,
                Op::Gt => ordering == Ordering::Greater,
                _ => ordering != Ordering::Less,
            }))
        }
        Op::In => contains(&right, &left).map(Value::Bool),
        // Short-circuit operators never reach here.
        Op::And | Op::Or => Ok(Value::Bool(left.is_truthy() && right.is_truthy())),
    }
}

fn numeric<F>(op: Op, left: &Value, right: &Value, apply: F) -> Result<Value, ExpressionError>
where
    F: FnOnce(Decimal, Decimal) -> Result<Value, ExpressionError>,
{
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => apply(*a, *b),
        _ => Err(operand_error(symbol(op), left, right)),
    }
}

fn checked(result: Option<Decimal>) -> Result<Value, ExpressionError> {
    result.map(Value::Number).ok_or(ExpressionError::Overflow)
}

fn compare(left: &Value, right: &Value) -> Option<Ordering> {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => Some(a.cmp(b)),
        (Value::Text(a), Value::Text(b)) => Some(a.cmp(b)),
        (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

fn contains(haystack: &Value, needle: &Value) -> Result<bool, ExpressionError> {
    match (haystack, needle) {
        (Value::List(items), needle) => Ok(items.contains(needle)),
        (Value::Text(s), Value::Text(sub)) => Ok(s.contains(sub.as_str())),
        (Value::Record(fields), Value::Text(key)) => Ok(fields.contains_key(key)),
        (haystack, needle) => Err(operand_error("in", needle, haystack)),
    }
}

fn operand_error(symbol: &str, left: &Value, right: &Value) -> ExpressionError {
    ExpressionError::type_error(format!(
        "unsupported operands for {symbol}: {} and {}",
        left.kind(),
        right.kind()
    ))
}

fn symbol(op: Op) -> &'static str {
    match op {
        Op::Add => "+",
        Op::Sub => "-",
        Op::Mul => "*",
        Op::Div => "/",
        Op::Rem => "%",
        Op::Eq => "==",
        Op::NotEq => "!=",
        Op::Lt => "<",
        Op::LtEq => "<=",
        Op::Gt => ">",
        Op::GtEq => ">=",
        Op::In => "in",
        Op::And => "and",
        Op::Or => "or",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::parse;
    use proptest::prelude::*;
    use rust_decimal_macros::dec;

    fn run(source: &str) -> Result<Value, ExpressionError> {
        let mut ctx = RenderContext::new();
        ctx.insert("li", Value::List(vec![Value::from(5i64), Value::from(4i64)]));
        ctx.insert("name", "Ģirts");
        eval(&parse(source)?, &ctx)
    }

    #[test]
    fn negative_indices_count_from_the_end() {
        assert_eq!(run("li[-1]"), Ok(Value::from(4i64)));
        assert_eq!(run("name[0]"), Ok(Value::from("Ģ")));
        assert_eq!(
            run("li[2]"),
            Err(ExpressionError::IndexOutOfRange { index: 2, len: 2 })
        );
        assert_eq!(
            run("li[-3]"),
            Err(ExpressionError::IndexOutOfRange { index: -3, len: 2 })
        );
    }

    #[test]
    fn plus_concatenates_text_and_lists() {
        assert_eq!(run("'a' + 'b'"), Ok(Value::from("ab")));
        assert_eq!(run("len(li + [1])"), Ok(Value::from(3usize)));
        match run("'a' + 1") {
            Err(ExpressionError::Type(msg)) if msg.contains("text and number") => {}
            other => panic!("Expected type error, got {other:?}"),
        }
    }

    #[test]
    fn short_circuit_skips_the_failing_side() {
        assert_eq!(run("False and missing"), Ok(Value::Bool(false)));
        assert_eq!(run("li or missing").map(|v| v.kind()), Ok("list"));
        assert_eq!(
            run("True and missing"),
            Err(ExpressionError::UnknownName("missing".into()))
        );
    }

    #[test]
    fn overflow_is_reported() {
        let source = format!("{} * 10", Decimal::MAX);
        assert_eq!(run(&source), Err(ExpressionError::Overflow));
    }

    #[test]
    fn field_on_non_record_is_missing() {
        assert_eq!(
            run("li.size"),
            Err(ExpressionError::MissingField {
                field: "size".into(),
                kind: "list"
            })
        );
    }

    proptest! {
        #![proptest_config(ProptestConfig { cases: 64, ..ProptestConfig::default() })]

        #[test]
        fn integer_arithmetic_matches_decimal(a in -10_000i64..10_000, b in 1i64..10_000) {
            let source = format!("({a} + {b}) * {b} - {a} % {b}");
            let expected = (Decimal::from(a) + Decimal::from(b)) * Decimal::from(b)
                - Decimal::from(a) % Decimal::from(b);
            prop_assert_eq!(run(&source), Ok(Value::Number(expected)));
        }
    }

    #[test]
    fn decimal_literals_keep_their_scale() {
        assert_eq!(run("1.20 + 0.05").map(|v| v.to_string()), Ok("1.25".into()));
        assert_eq!(run("0.1 * 3"), Ok(Value::from(dec!(0.3))));
    }
}
