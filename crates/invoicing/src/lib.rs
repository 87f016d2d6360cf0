//! Invoicing: tax/discount resolution and invoice rendering.
//!
//! The flow for one invoice is
//! [`Invoice::resolve`] (per-line amounts via [`TaxDiscountResolver`]) →
//! [`InvoiceAssembler::assemble`] (template context) →
//! `TemplateInterpreter::render`. [`InvoiceRenderer`] wires the three together
//! and picks the template.
//!
//! Everything here is deterministic domain logic; the only IO is the output
//! sink handed to the renderer.

pub mod assembler;
pub mod format;
pub mod invoice;
pub mod line;
pub mod render;
pub mod resolver;
pub mod tax;

pub use assembler::{Formatter, InvoiceAssembler};
pub use format::{FormatConfig, NumberFormat};
pub use invoice::{Invoice, Job, Owner, ResolvedInvoice, Terms, Totals};
pub use line::{DiscountKind, DiscountTiming, LineItem};
pub use render::{DEFAULT_TEMPLATE, InvoiceRenderError, InvoiceRenderer, RenderOptions, RenderReport};
pub use resolver::{
    DiscountPolicy, LineAmounts, Resolution, ResolvedLine, SkipRecord, TaxBasis,
    TaxDiscountResolver, compute,
};
pub use tax::{TaxTableAggregate, TaxTableEntry, TaxTables};
