//! Block header statements.

use crate::error::{RenderError, RenderResult};

/// A parsed block header or continuation statement.
///
/// Expressions stay as source text; they are handed to the evaluator when the
/// block runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Header {
    If(String),
    Elif(String),
    Else,
    For {
        targets: Vec<String>,
        iterable: String,
    },
}

impl Header {
    /// Parse statement text. A trailing `:` is optional. `line` is 1-based and
    /// only used for the error.
    pub fn parse(text: &str, line: usize) -> RenderResult<Self> {
        let text = text.trim();
        let text = text.strip_suffix(':').unwrap_or(text).trim_end();
        let (keyword, rest) = match text.split_once(char::is_whitespace) {
            Some((keyword, rest)) => (keyword, rest.trim()),
            None => (text, ""),
        };

        match keyword {
            "if" | "elif" => {
                if rest.is_empty() {
                    return Err(RenderError::invalid_statement(
                        line,
                        format!("`{keyword}` needs a condition"),
                    ));
                }
                Ok(if keyword == "if" {
                    Header::If(rest.to_string())
                } else {
                    Header::Elif(rest.to_string())
                })
            }
            "else" if rest.is_empty() => Ok(Header::Else),
            "for" => parse_for(rest, line),
            _ => Err(RenderError::invalid_statement(
                line,
                format!("unsupported statement [{text}]"),
            )),
        }
    }

    pub fn keyword(&self) -> &'static str {
        match self {
            Header::If(_) => "if",
            Header::Elif(_) => "elif",
            Header::Else => "else",
            Header::For { .. } => "for",
        }
    }
}

fn parse_for(rest: &str, line: usize) -> RenderResult<Header> {
    let Some((targets, iterable)) = rest.split_once(" in ") else {
        return Err(RenderError::invalid_statement(
            line,
            "`for` needs the form `for <names> in <expression>`",
        ));
    };
    let iterable = iterable.trim();
    if iterable.is_empty() {
        return Err(RenderError::invalid_statement(line, "`for` needs an iterable"));
    }

    let targets = targets.trim();
    let targets = targets
        .strip_prefix('(')
        .and_then(|t| t.strip_suffix(')'))
        .unwrap_or(targets);
    let targets: Vec<String> = targets
        .split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect();
    if targets.is_empty() {
        return Err(RenderError::invalid_statement(line, "`for` needs a loop variable"));
    }
    if let Some(bad) = targets.iter().find(|t| !is_identifier(t)) {
        return Err(RenderError::invalid_statement(
            line,
            format!("[{bad}] is not a valid loop variable"),
        ));
    }

    Ok(Header::For {
        targets,
        iterable: iterable.to_string(),
    })
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    chars
        .next()
        .is_some_and(|c| c.is_alphabetic() || c == '_')
        && chars.all(|c| c.is_alphanumeric() || c == '_')
}
