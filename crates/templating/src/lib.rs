//! `ledgerprint-templating`: line-oriented template interpreter.
//!
//! Templates are plain text. Three kinds of lines carry meaning:
//!
//! - `%+ <statement>` opens a block (`if …`, `for … in …`),
//! - `%= <statement>` continues the innermost open block (`elif …`, `else`),
//! - `%-` closes it.
//!
//! Every other line is copied to the output after replacing each `@{ expr }`
//! placeholder with the evaluated expression. Delimiters are configurable
//! regexes (see [`Delimiters`]).
//!
//! Expressions are evaluated by a pluggable [`ExpressionEvaluator`]; the
//! default [`StandardEvaluator`] understands a small, side-effect free grammar
//! (arithmetic, comparisons, field access, calls into an allow-list of
//! functions).

pub mod context;
pub mod error;
pub mod expr;
pub mod interpreter;
pub mod scanner;
pub mod statement;
pub mod syntax;
pub mod template;
pub mod value;

pub use context::{NativeFunction, RenderContext};
pub use error::{ExpressionError, RenderError, RenderResult};
pub use expr::{ExpressionEvaluator, StandardEvaluator};
pub use interpreter::{Fallback, InterpreterConfig, RenderStats, TemplateInterpreter};
pub use scanner::{BlockExtent, Segment, StatementBlockScanner};
pub use statement::Header;
pub use syntax::{Delimiters, Syntax};
pub use template::Template;
pub use value::Value;
