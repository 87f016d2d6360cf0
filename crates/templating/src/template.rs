//! Template source as a fixed, indexable line sequence.

/// An immutable sequence of template lines.
///
/// Line endings are kept so the output reproduces the input layout exactly.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Template {
    lines: Vec<String>,
}

impl Template {
    pub fn from_text(text: &str) -> Self {
        Self {
            lines: text.split_inclusive('\n').map(str::to_string).collect(),
        }
    }

    pub fn from_lines(lines: Vec<String>) -> Self {
        Self { lines }
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

impl From<&str> for Template {
    fn from(text: &str) -> Self {
        Template::from_text(text)
    }
}
