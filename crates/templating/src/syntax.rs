//! Delimiter configuration and the compiled line matchers.

use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};

use crate::error::{RenderError, RenderResult};

/// Regex sources for the four template markers.
///
/// The block patterns are matched at the start of a line; whatever follows the
/// match (trimmed) is the statement text. The expression pattern must have a
/// capture group holding the expression.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Delimiters {
    pub expression: String,
    pub block_begin: String,
    pub block_continue: String,
    pub block_end: String,
}

impl Default for Delimiters {
    fn default() -> Self {
        Self {
            expression: r"@\{([^}]+)\}".to_string(),
            block_begin: r"%\+ ".to_string(),
            block_continue: r"%= ".to_string(),
            block_end: r"%-".to_string(),
        }
    }
}

impl Delimiters {
    pub fn with_expression(mut self, pattern: impl Into<String>) -> Self {
        self.expression = pattern.into();
        self
    }

    pub fn with_blocks(
        mut self,
        begin: impl Into<String>,
        cont: impl Into<String>,
        end: impl Into<String>,
    ) -> Self {
        self.block_begin = begin.into();
        self.block_continue = cont.into();
        self.block_end = end.into();
        self
    }
}

/// Compiled [`Delimiters`].
#[derive(Debug, Clone)]
pub struct Syntax {
    expression: Regex,
    begin: Regex,
    cont: Regex,
    end: Regex,
}

impl Syntax {
    pub fn compile(delimiters: &Delimiters) -> RenderResult<Self> {
        let expression = compile("expression", &delimiters.expression, false)?;
        if expression.captures_len() < 2 {
            return Err(RenderError::InvalidDelimiter {
                which: "expression",
                message: "pattern needs a capture group for the expression".to_string(),
            });
        }
        Ok(Self {
            expression,
            begin: compile("block begin", &delimiters.block_begin, true)?,
            cont: compile("block continuation", &delimiters.block_continue, true)?,
            end: compile("block end", &delimiters.block_end, true)?,
        })
    }

    /// Statement text of a block-begin line.
    pub fn begin_statement<'l>(&self, line: &'l str) -> Option<&'l str> {
        statement_after(&self.begin, line)
    }

    /// Statement text of a continuation line.
    pub fn continuation_statement<'l>(&self, line: &'l str) -> Option<&'l str> {
        statement_after(&self.cont, line)
    }

    pub fn is_begin(&self, line: &str) -> bool {
        self.begin.is_match(line)
    }

    pub fn is_end(&self, line: &str) -> bool {
        self.end.is_match(line)
    }

    /// Replace every expression placeholder in `line` with `replace(expr)`.
    pub fn substitute<F>(&self, line: &str, mut replace: F) -> String
    where
        F: FnMut(&str) -> String,
    {
        self.expression
            .replace_all(line, |caps: &Captures<'_>| {
                replace(caps.get(1).map_or("", |m| m.as_str()))
            })
            .into_owned()
    }
}

fn compile(which: &'static str, pattern: &str, anchored: bool) -> RenderResult<Regex> {
    let source = if anchored {
        format!("^(?:{pattern})")
    } else {
        pattern.to_string()
    };
    Regex::new(&source).map_err(|e| RenderError::InvalidDelimiter {
        which,
        message: e.to_string(),
    })
}

fn statement_after<'l>(re: &Regex, line: &'l str) -> Option<&'l str> {
    re.find(line).map(|m| line[m.end()..].trim())
}
