//! Template interpreter with an explicit work stack.

use std::collections::HashMap;
use std::io::Write;
use std::ops::Range;
use std::rc::Rc;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::context::RenderContext;
use crate::error::{ExpressionError, RenderError, RenderResult};
use crate::expr::{ExpressionEvaluator, StandardEvaluator, iterate};
use crate::scanner::{BlockExtent, StatementBlockScanner};
use crate::statement::Header;
use crate::syntax::{Delimiters, Syntax};
use crate::template::Template;
use crate::value::Value;

/// What a placeholder renders as when its expression fails.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Fallback {
    /// The expression text itself, as captured by the placeholder pattern.
    #[default]
    ExpressionText,
    /// A fixed replacement.
    Literal(String),
}

/// Interpreter configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InterpreterConfig {
    /// Marker and placeholder patterns
    pub delimiters: Delimiters,
    /// Placeholder failure policy
    pub fallback: Fallback,
    /// Upper bound on lines visited plus loop iterations for one render
    pub max_steps: usize,
}

impl Default for InterpreterConfig {
    fn default() -> Self {
        Self {
            delimiters: Delimiters::default(),
            fallback: Fallback::default(),
            max_steps: 1_000_000,
        }
    }
}

impl InterpreterConfig {
    pub fn with_delimiters(mut self, delimiters: Delimiters) -> Self {
        self.delimiters = delimiters;
        self
    }

    pub fn with_fallback(mut self, fallback: Fallback) -> Self {
        self.fallback = fallback;
        self
    }

    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps;
        self
    }
}

/// Counters for one render.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RenderStats {
    pub lines_written: usize,
    pub fallbacks: usize,
    pub steps: usize,
}

/// A validated block, cached by begin line for the rest of the render.
#[derive(Debug)]
struct Planned {
    /// Index of the closing end line.
    end: usize,
    block: Block,
}

#[derive(Debug)]
enum Block {
    /// `(condition, header line, body)`; a `None` condition is the `else` branch.
    Conditional(Vec<(Option<String>, usize, Range<usize>)>),
    Loop(Rc<LoopBlock>),
}

#[derive(Debug)]
struct LoopBlock {
    targets: Vec<String>,
    iterable: String,
    header_line: usize,
    body: Range<usize>,
    otherwise: Option<Range<usize>>,
}

enum Task {
    Lines(Range<usize>),
    Iterate {
        block: Rc<LoopBlock>,
        items: Vec<Value>,
        next: usize,
    },
    PopScope,
}

/// Renders templates against a [`RenderContext`].
///
/// One interpreter can render any number of templates; all per-render state
/// lives on the stack of [`render`](Self::render).
#[derive(Debug, Clone)]
pub struct TemplateInterpreter<E = StandardEvaluator> {
    syntax: Syntax,
    evaluator: E,
    fallback: Fallback,
    max_steps: usize,
}

impl TemplateInterpreter<StandardEvaluator> {
    pub fn new(config: &InterpreterConfig) -> RenderResult<Self> {
        Self::with_evaluator(config, StandardEvaluator::new())
    }
}

impl<E: ExpressionEvaluator> TemplateInterpreter<E> {
    pub fn with_evaluator(config: &InterpreterConfig, evaluator: E) -> RenderResult<Self> {
        Ok(Self {
            syntax: Syntax::compile(&config.delimiters)?,
            evaluator,
            fallback: config.fallback.clone(),
            max_steps: config.max_steps,
        })
    }

    pub fn syntax(&self) -> &Syntax {
        &self.syntax
    }

    /// Render `template` into `out`, line by line.
    ///
    /// On error, everything rendered before the failing line has already been
    /// written; nothing after it is.
    pub fn render(
        &self,
        template: &Template,
        context: &mut RenderContext,
        out: &mut dyn Write,
    ) -> RenderResult<RenderStats> {
        let mut stats = RenderStats::default();
        let base_depth = context.depth();
        let result = self.execute(template.lines(), context, out, &mut stats);
        // Leave the caller's context as it was handed in, even on failure.
        while context.depth() > base_depth {
            context.pop_scope();
        }
        result.map(|()| stats)
    }

    /// Render into a string.
    pub fn render_to_string(
        &self,
        template: &Template,
        context: &mut RenderContext,
    ) -> RenderResult<String> {
        let mut buf = Vec::new();
        self.render(template, context, &mut buf)?;
        Ok(String::from_utf8_lossy(&buf).into_owned())
    }

    fn execute(
        &self,
        lines: &[String],
        context: &mut RenderContext,
        out: &mut dyn Write,
        stats: &mut RenderStats,
    ) -> RenderResult<()> {
        let scanner = StatementBlockScanner::new(&self.syntax);
        let mut planned: HashMap<usize, Rc<Planned>> = HashMap::new();
        let mut stack = vec![Task::Lines(0..lines.len())];

        while let Some(task) = stack.pop() {
            match task {
                Task::Lines(range) => {
                    let mut i = range.start;
                    while i < range.end {
                        self.step(stats)?;
                        let line = &lines[i];
                        if !self.syntax.is_begin(line) {
                            self.write_line(line, i, context, out, stats)?;
                            i += 1;
                            continue;
                        }

                        let block = match planned.get(&i) {
                            Some(block) => Rc::clone(block),
                            None => {
                                let extent = scanner.scan(lines, i, range.end)?;
                                let block = Rc::new(plan(&extent)?);
                                planned.insert(i, Rc::clone(&block));
                                block
                            }
                        };
                        // Resume after the block once it has run.
                        stack.push(Task::Lines(block.end + 1..range.end));
                        self.enter(&block.block, context, &mut stack)?;
                        break;
                    }
                }
                Task::Iterate { block, items, next } => {
                    self.step(stats)?;
                    if let Some(item) = items.get(next) {
                        bind(&block.targets, item, context).map_err(|source| {
                            RenderError::Statement {
                                line: block.header_line + 1,
                                source,
                            }
                        })?;
                        let body = block.body.clone();
                        stack.push(Task::Iterate {
                            block,
                            items,
                            next: next + 1,
                        });
                        stack.push(Task::Lines(body));
                    }
                }
                Task::PopScope => context.pop_scope(),
            }
        }
        Ok(())
    }

    fn step(&self, stats: &mut RenderStats) -> RenderResult<()> {
        stats.steps += 1;
        if stats.steps > self.max_steps {
            return Err(RenderError::RenderLimitExceeded {
                limit: self.max_steps,
            });
        }
        Ok(())
    }

    fn write_line(
        &self,
        line: &str,
        index: usize,
        context: &RenderContext,
        out: &mut dyn Write,
        stats: &mut RenderStats,
    ) -> RenderResult<()> {
        let rendered = self.syntax.substitute(line, |expression| {
            match self.evaluator.render(expression, context) {
                Ok(text) => text,
                Err(e) => {
                    stats.fallbacks += 1;
                    warn!(line = index + 1, expression, error = %e, "placeholder fell back");
                    match &self.fallback {
                        Fallback::ExpressionText => expression.to_string(),
                        Fallback::Literal(text) => text.clone(),
                    }
                }
            }
        });
        out.write_all(rendered.as_bytes())?;
        stats.lines_written += 1;
        Ok(())
    }

    /// Evaluate a block header and push the work it selects.
    fn enter(
        &self,
        block: &Block,
        context: &mut RenderContext,
        stack: &mut Vec<Task>,
    ) -> RenderResult<()> {
        match block {
            Block::Conditional(branches) => {
                for (condition, header_line, body) in branches {
                    let taken = match condition {
                        None => true,
                        Some(expression) => self
                            .evaluate(expression, *header_line, context)?
                            .is_truthy(),
                    };
                    if taken {
                        debug!(line = header_line + 1, "branch taken");
                        stack.push(Task::Lines(body.clone()));
                        break;
                    }
                }
            }
            Block::Loop(lp) => {
                let value = self.evaluate(&lp.iterable, lp.header_line, context)?;
                let items = iterate(&value).map_err(|source| RenderError::Statement {
                    line: lp.header_line + 1,
                    source,
                })?;
                debug!(line = lp.header_line + 1, items = items.len(), "loop entered");
                context.push_scope();
                stack.push(Task::PopScope);
                if let Some(otherwise) = &lp.otherwise {
                    stack.push(Task::Lines(otherwise.clone()));
                }
                stack.push(Task::Iterate {
                    block: Rc::clone(lp),
                    items,
                    next: 0,
                });
            }
        }
        Ok(())
    }

    fn evaluate(
        &self,
        expression: &str,
        header_line: usize,
        context: &RenderContext,
    ) -> RenderResult<Value> {
        self.evaluator
            .evaluate(expression, context)
            .map_err(|source| RenderError::Statement {
                line: header_line + 1,
                source,
            })
    }
}

/// Check the segment sequence and turn it into an executable block.
fn plan(extent: &BlockExtent) -> RenderResult<Planned> {
    let mut segments = extent.segments.iter();
    let Some(first) = segments.next() else {
        return Err(RenderError::invalid_statement(1, "empty block"));
    };
    let header = Header::parse(&first.statement, first.header_line + 1)?;

    match header {
        Header::If(condition) => {
            let mut branches = vec![(Some(condition), first.header_line, first.body.clone())];
            let mut seen_else = false;
            for segment in segments {
                let line = segment.header_line + 1;
                if seen_else {
                    return Err(RenderError::invalid_statement(
                        line,
                        "nothing may follow `else` in an `if` block",
                    ));
                }
                match Header::parse(&segment.statement, line)? {
                    Header::Elif(condition) => {
                        branches.push((Some(condition), segment.header_line, segment.body.clone()))
                    }
                    Header::Else => {
                        seen_else = true;
                        branches.push((None, segment.header_line, segment.body.clone()));
                    }
                    other => {
                        return Err(RenderError::invalid_statement(
                            line,
                            format!("`{}` cannot continue an `if` block", other.keyword()),
                        ));
                    }
                }
            }
            Ok(Planned {
                end: extent.end,
                block: Block::Conditional(branches),
            })
        }
        Header::For { targets, iterable } => {
            let mut otherwise = None;
            for segment in segments {
                let line = segment.header_line + 1;
                match Header::parse(&segment.statement, line)? {
                    Header::Else if otherwise.is_none() => otherwise = Some(segment.body.clone()),
                    other => {
                        return Err(RenderError::invalid_statement(
                            line,
                            format!("`{}` cannot continue a `for` block", other.keyword()),
                        ));
                    }
                }
            }
            Ok(Planned {
                end: extent.end,
                block: Block::Loop(Rc::new(LoopBlock {
                    targets,
                    iterable,
                    header_line: first.header_line,
                    body: first.body.clone(),
                    otherwise,
                })),
            })
        }
        other => Err(RenderError::invalid_statement(
            first.header_line + 1,
            format!("`{}` cannot open a block", other.keyword()),
        )),
    }
}

/// Bind one loop item to the loop variables, destructuring when there are
/// several.
fn bind(targets: &[String], item: &Value, context: &mut RenderContext) -> Result<(), ExpressionError> {
    if let [name] = targets {
        context.insert(name.clone(), item.clone());
        return Ok(());
    }
    let parts = match item {
        Value::List(parts) if parts.len() == targets.len() => parts,
        other => {
            return Err(ExpressionError::type_error(format!(
                "cannot unpack {other} into {} names",
                targets.len()
            )));
        }
    };
    for (name, part) in targets.iter().zip(parts) {
        context.insert(name.clone(), part.clone());
    }
    Ok(())
}
