//! Template error model.

use thiserror::Error;

/// Result type used by the interpreter.
pub type RenderResult<T> = Result<T, RenderError>;

/// Failure to evaluate a single expression.
///
/// Inline placeholders recover from these with a fallback value; block header
/// statements turn them into [`RenderError::Statement`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ExpressionError {
    #[error("syntax error at offset {offset}: {message}")]
    Syntax { offset: usize, message: String },

    #[error("unknown name [{0}]")]
    UnknownName(String),

    #[error("unknown function [{0}]")]
    UnknownFunction(String),

    #[error("no field [{field}] on {kind}")]
    MissingField { field: String, kind: &'static str },

    #[error("index {index} out of range for length {len}")]
    IndexOutOfRange { index: i64, len: usize },

    #[error("type error: {0}")]
    Type(String),

    #[error("function [{name}] failed: {message}")]
    Call { name: String, message: String },

    #[error("division by zero")]
    DivisionByZero,

    #[error("arithmetic overflow")]
    Overflow,

    #[error("expression is {len} bytes long, limit is {limit}")]
    TooLong { len: usize, limit: usize },

    #[error("expression nests deeper than {0} levels")]
    TooDeep(usize),
}

impl ExpressionError {
    pub fn syntax(offset: usize, message: impl Into<String>) -> Self {
        Self::Syntax {
            offset,
            message: message.into(),
        }
    }

    pub fn type_error(message: impl Into<String>) -> Self {
        Self::Type(message.into())
    }

    pub fn call(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Call {
            name: name.into(),
            message: message.into(),
        }
    }
}

/// Fatal rendering failure. Line numbers are 1-based.
#[derive(Debug, Error)]
pub enum RenderError {
    /// A block-begin line has no matching block-end line.
    #[error("block opened at line {line} is never closed")]
    UnterminatedBlock { line: usize },

    /// A block header or continuation is not a statement the interpreter runs.
    #[error("invalid statement at line {line}: {message}")]
    InvalidStatement { line: usize, message: String },

    /// A block header expression failed to evaluate.
    #[error("statement at line {line} failed: {source}")]
    Statement {
        line: usize,
        #[source]
        source: ExpressionError,
    },

    /// The template needed more work than the configured step budget.
    #[error("render exceeded the budget of {limit} steps")]
    RenderLimitExceeded { limit: usize },

    /// A configured delimiter is not a usable regex.
    #[error("invalid {which} delimiter: {message}")]
    InvalidDelimiter { which: &'static str, message: String },

    #[error("failed to write output: {0}")]
    Io(#[from] std::io::Error),
}

impl RenderError {
    pub fn invalid_statement(line: usize, message: impl Into<String>) -> Self {
        Self::InvalidStatement {
            line,
            message: message.into(),
        }
    }

    /// Line the error points at, when it has one.
    pub fn line(&self) -> Option<usize> {
        match self {
            RenderError::UnterminatedBlock { line }
            | RenderError::InvalidStatement { line, .. }
            | RenderError::Statement { line, .. } => Some(*line),
            _ => None,
        }
    }
}
