//! End-to-end invoice rendering: select a template, resolve, assemble,
//! interpret.

use std::collections::BTreeMap;
use std::io::Write;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use ledgerprint_core::{DomainError, InvoiceId};
use ledgerprint_templating::{
    InterpreterConfig, RenderError, RenderStats, Template, TemplateInterpreter,
};

use crate::assembler::InvoiceAssembler;
use crate::format::FormatConfig;
use crate::invoice::Invoice;
use crate::resolver::SkipRecord;
use crate::tax::TaxTables;

/// Key of the template used when no owner-specific one exists.
pub const DEFAULT_TEMPLATE: &str = "default";

/// Rendering configuration.
///
/// Templates are chosen per owner, but output is not: the caller always passes
/// the sink to [`InvoiceRenderer::render`]. Template keys are plain owner
/// names and are not themselves expanded as templates.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderOptions {
    pub interpreter: InterpreterConfig,
    pub format: FormatConfig,
    /// Template text by owner name, plus an optional `default` entry.
    pub templates: BTreeMap<String, String>,
}

impl RenderOptions {
    pub fn with_interpreter(mut self, interpreter: InterpreterConfig) -> Self {
        self.interpreter = interpreter;
        self
    }

    pub fn with_format(mut self, format: FormatConfig) -> Self {
        self.format = format;
        self
    }

    /// Template for invoices whose owner is named `owner`.
    pub fn with_template(mut self, owner: impl Into<String>, text: impl Into<String>) -> Self {
        self.templates.insert(owner.into(), text.into());
        self
    }

    pub fn with_default_template(self, text: impl Into<String>) -> Self {
        self.with_template(DEFAULT_TEMPLATE, text)
    }
}

#[derive(Debug, Error)]
pub enum InvoiceRenderError {
    #[error("no template for invoice [{invoice}]")]
    MissingTemplate { invoice: InvoiceId },

    #[error("no output given for invoice [{invoice}]")]
    MissingOutput { invoice: InvoiceId },

    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    Render(#[from] RenderError),
}

/// What happened while rendering one invoice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderReport {
    pub invoice: InvoiceId,
    /// Line items dropped during resolution.
    pub skipped: Vec<SkipRecord>,
    pub warn_discount: bool,
    pub stats: RenderStats,
}

/// Renders invoices with a fixed set of options.
#[derive(Debug)]
pub struct InvoiceRenderer {
    interpreter: TemplateInterpreter,
    assembler: InvoiceAssembler,
    templates: BTreeMap<String, Template>,
}

impl InvoiceRenderer {
    pub fn new(options: &RenderOptions) -> Result<Self, InvoiceRenderError> {
        Ok(Self {
            interpreter: TemplateInterpreter::new(&options.interpreter)?,
            assembler: InvoiceAssembler::new(&options.format),
            templates: options
                .templates
                .iter()
                .map(|(key, text)| (key.clone(), Template::from_text(text)))
                .collect(),
        })
    }

    /// Use a custom assembler, e.g. one with replaced formatters.
    pub fn with_assembler(mut self, assembler: InvoiceAssembler) -> Self {
        self.assembler = assembler;
        self
    }

    /// The explicit template if given, else the owner's, else the default.
    pub fn select_template<'a>(
        &'a self,
        invoice: &Invoice,
        explicit: Option<&'a Template>,
    ) -> Option<&'a Template> {
        explicit
            .or_else(|| invoice.owner_name().and_then(|name| self.templates.get(name)))
            .or_else(|| self.templates.get(DEFAULT_TEMPLATE))
    }

    /// Render `invoice` into `out`.
    ///
    /// Template and output are checked before any work is done.
    pub fn render(
        &self,
        invoice: &Invoice,
        tables: &TaxTables,
        template: Option<&Template>,
        out: Option<&mut dyn Write>,
    ) -> Result<RenderReport, InvoiceRenderError> {
        let template = self.select_template(invoice, template).ok_or_else(|| {
            InvoiceRenderError::MissingTemplate {
                invoice: invoice.id.clone(),
            }
        })?;
        let out = out.ok_or_else(|| InvoiceRenderError::MissingOutput {
            invoice: invoice.id.clone(),
        })?;

        let resolved = invoice.resolve(tables)?;
        let mut context = self.assembler.assemble(&resolved);
        let stats = self.interpreter.render(template, &mut context, out)?;

        info!(
            invoice = %invoice.id,
            lines = stats.lines_written,
            skipped = resolved.skipped().len(),
            fallbacks = stats.fallbacks,
            "invoice rendered"
        );
        Ok(RenderReport {
            invoice: invoice.id.clone(),
            skipped: resolved.skipped().to_vec(),
            warn_discount: resolved.warn_discount(),
            stats,
        })
    }

    /// Render into a string.
    pub fn render_to_string(
        &self,
        invoice: &Invoice,
        tables: &TaxTables,
        template: Option<&Template>,
    ) -> Result<(String, RenderReport), InvoiceRenderError> {
        let mut buf = Vec::new();
        let report = self.render(invoice, tables, template, Some(&mut buf))?;
        Ok((String::from_utf8_lossy(&buf).into_owned(), report))
    }
}
