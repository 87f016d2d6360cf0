//! Expression evaluation for placeholders and block headers.

mod builtins;
mod eval;
mod lexer;
mod parser;

pub use builtins::MAX_RANGE;
pub use parser::{Expr, MAX_DEPTH, MAX_LENGTH, Op, parse};

pub(crate) use builtins::iterate;

use crate::context::RenderContext;
use crate::error::ExpressionError;
use crate::value::Value;

/// Evaluates one expression against a render context.
///
/// Implementations must be side-effect free with respect to the context; the
/// interpreter owns all mutation (loop bindings, scopes).
pub trait ExpressionEvaluator {
    fn evaluate(&self, expression: &str, context: &RenderContext) -> Result<Value, ExpressionError>;

    /// Evaluate and convert to the text written into the output.
    fn render(&self, expression: &str, context: &RenderContext) -> Result<String, ExpressionError> {
        self.evaluate(expression, context).map(|value| value.to_string())
    }
}

/// Default evaluator: the restricted grammar in [`parse`], names from the
/// context, functions from the context first and then the builtin allow-list.
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardEvaluator;

impl StandardEvaluator {
    pub fn new() -> Self {
        Self
    }
}

impl ExpressionEvaluator for StandardEvaluator {
    fn evaluate(&self, expression: &str, context: &RenderContext) -> Result<Value, ExpressionError> {
        let expr = parse(expression)?;
        eval::eval(&expr, context)
    }
}
