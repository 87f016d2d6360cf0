//! Builds the template context for one invoice.
//!
//! Monetary and quantity fields appear twice: formatted under their plain name
//! and as raw decimals under the name with a trailing `_` (`amount_net` vs.
//! `amount_net_`), so templates can print or compute.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use tracing::{debug, warn};

use ledgerprint_templating::{ExpressionError, RenderContext, Value};

use crate::format::FormatConfig;
use crate::invoice::{Job, Owner, ResolvedInvoice, Terms};
use crate::line::DiscountKind;
use crate::resolver::ResolvedLine;

/// Decimal → text conversion used for currency or quantity values.
pub type Formatter = Arc<dyn Fn(Decimal) -> String + Send + Sync>;

/// Composes resolved invoices into [`RenderContext`]s.
#[derive(Clone)]
pub struct InvoiceAssembler {
    currency: Formatter,
    quantity: Formatter,
}

impl InvoiceAssembler {
    pub fn new(config: &FormatConfig) -> Self {
        let currency = config.currency.clone();
        let quantity = config.quantity.clone();
        Self {
            currency: Arc::new(move |value| currency.format(value)),
            quantity: Arc::new(move |value| quantity.format(value)),
        }
    }

    /// Replace the currency formatter (`cformat`).
    pub fn with_currency_formatter<F>(mut self, format: F) -> Self
    where
        F: Fn(Decimal) -> String + Send + Sync + 'static,
    {
        self.currency = Arc::new(format);
        self
    }

    /// Replace the quantity formatter (`qformat`).
    pub fn with_quantity_formatter<F>(mut self, format: F) -> Self
    where
        F: Fn(Decimal) -> String + Send + Sync + 'static,
    {
        self.quantity = Arc::new(format);
        self
    }

    pub fn assemble(&self, resolved: &ResolvedInvoice<'_>) -> RenderContext {
        let invoice = resolved.invoice;
        if resolved.warn_discount() {
            warn!(
                invoice = %invoice.id,
                "invoice contains POSTTAX discounts, which accounting software may compute differently"
            );
        }

        let mut ctx = RenderContext::new();
        ctx.insert("id", invoice.id.as_str());
        ctx.insert("billing_id", invoice.billing_id.clone());
        ctx.insert("owner", invoice.owner.as_ref().map(owner_record));
        ctx.insert("job", invoice.job.as_ref().map(job_record));
        ctx.insert("terms", invoice.terms.as_ref().map(terms_record));
        ctx.insert("date_opened", iso(invoice.date_opened));
        ctx.insert("date_posted", iso(invoice.date_posted));
        ctx.insert("notes", invoice.notes.clone());
        ctx.insert("currency", invoice.currency.clone());
        ctx.insert("warn_discount", resolved.warn_discount());

        let totals = resolved.totals;
        for (name, amount) in [
            ("amount_net", totals.net),
            ("amount_gross", totals.gross),
            ("amount_taxes", totals.taxes),
        ] {
            ctx.insert(name, (self.currency)(amount));
            ctx.insert(format!("{name}_"), amount);
        }

        let entries: Vec<Value> = resolved.lines().iter().map(|line| self.entry_record(line)).collect();
        debug!(invoice = %invoice.id, entries = entries.len(), "invoice context assembled");
        ctx.insert("entries", entries);

        ctx.register_function("cformat", formatting_function("cformat", Arc::clone(&self.currency)));
        ctx.register_function("qformat", formatting_function("qformat", Arc::clone(&self.quantity)));
        ctx
    }

    fn entry_record(&self, line: &ResolvedLine) -> Value {
        let item = &line.item;
        let amounts = &line.amounts;
        let mut record = Value::record()
            .with("id", item.id.to_string())
            .with("date", iso(item.date))
            .with("description", item.description.clone())
            .with("action", item.action.clone())
            .with("taxable", item.taxable)
            .with("taxincluded", item.tax_included)
            .with("qty", (self.quantity)(item.quantity))
            .with("qty_", item.quantity);

        for (name, amount) in [
            ("price", item.price),
            ("amount_raw", amounts.raw),
            ("amount_discount", amounts.discount),
            ("amount_net", amounts.net),
            ("amount_gross", amounts.gross),
            ("amount_taxes", amounts.taxes),
        ] {
            record = record
                .with(name, (self.currency)(amount))
                .with(format!("{name}_"), amount);
        }

        record = match item.discount {
            Some(discount) => {
                let percent = item.discount_kind.as_deref() == Some(DiscountKind::Percent.code());
                let formatted = if percent {
                    (self.currency)(discount)
                } else {
                    (self.quantity)(discount)
                };
                record
                    .with("discount", formatted)
                    .with("discount_", discount)
                    .with("discount_type", item.discount_kind.clone())
                    .with("discount_how", item.discount_timing.clone())
            }
            None => record
                .with("discount", Value::None)
                .with("discount_", Value::None)
                .with("discount_type", Value::None)
                .with("discount_how", Value::None),
        };

        let taxtable = line.tax_table.as_deref().map(|table| {
            Value::record()
                .with("name", table.name())
                .with("percent_sum", table.percent_sum())
                .with("value_sum", table.value_sum())
        });
        record.with("taxtable", taxtable)
    }
}

impl Default for InvoiceAssembler {
    fn default() -> Self {
        Self::new(&FormatConfig::default())
    }
}

impl fmt::Debug for InvoiceAssembler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InvoiceAssembler").finish_non_exhaustive()
    }
}

fn owner_record(owner: &Owner) -> Value {
    Value::record()
        .with("name", owner.name.as_str())
        .with("full_name", owner.full_name.clone())
        .with(
            "address",
            owner.address.iter().map(|l| Value::from(l.as_str())).collect::<Vec<_>>(),
        )
        .with("email", owner.email.clone())
}

fn job_record(job: &Job) -> Value {
    Value::record()
        .with("id", job.id.clone())
        .with("name", job.name.as_str())
        .with("reference", job.reference.clone())
}

fn terms_record(terms: &Terms) -> Value {
    Value::record()
        .with("name", terms.name.as_str())
        .with("desc", terms.description.clone())
        .with("due_days", terms.due_days.map(i64::from))
        .with("disc_days", terms.discount_days.map(i64::from))
        .with("discount", terms.discount)
}

fn iso(date: Option<NaiveDate>) -> Option<String> {
    date.map(|d| d.format("%Y-%m-%d").to_string())
}

/// Wrap a formatter as a template function taking one number (or numeric
/// text).
fn formatting_function(
    name: &'static str,
    format: Formatter,
) -> impl Fn(&[Value]) -> Result<Value, ExpressionError> + Send + Sync + 'static {
    move |args: &[Value]| {
        let value = match args {
            [Value::Number(n)] => *n,
            [Value::Text(s)] => Decimal::from_str(s.trim())
                .map_err(|e| ExpressionError::call(name, format!("[{s}] is not a number: {e}")))?,
            _ => return Err(ExpressionError::call(name, "takes one number")),
        };
        Ok(Value::Text(format(value)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::NumberFormat;
    use crate::invoice::Invoice;
    use crate::line::LineItem;
    use crate::tax::{TaxTableAggregate, TaxTableEntry, TaxTables};
    use ledgerprint_core::{EntryId, InvoiceId, TaxTableId};
    use ledgerprint_templating::{ExpressionEvaluator, StandardEvaluator};
    use rust_decimal_macros::dec;

    fn eval(ctx: &RenderContext, expr: &str) -> String {
        StandardEvaluator::new().render(expr, ctx).unwrap()
    }

    fn sample() -> (Invoice, TaxTables) {
        let table_id = TaxTableId::new();
        let tables: TaxTables = [TaxTableAggregate::from_entries(
            table_id,
            "VAT 20%",
            vec![TaxTableEntry::percent(dec!(20))],
        )
        .unwrap()]
        .into_iter()
        .collect();
        let mut owner = Owner::new("ACME");
        owner.address = vec!["Main St 1".into(), "Springfield".into()];
        let invoice = Invoice::new(InvoiceId::new("000042"))
            .with_owner(owner)
            .with_entry(
                LineItem::new(EntryId::new(), dec!(1500), dec!(2.5))
                    .with_description("Consulting")
                    .with_tax(table_id, false)
                    .with_discount(dec!(10), "PERCENT", "PRETAX"),
            );
        (invoice, tables)
    }

    #[test]
    fn exposes_formatted_and_raw_amounts() {
        let (invoice, tables) = sample();
        let resolved = invoice.resolve(&tables).unwrap();
        let ctx = InvoiceAssembler::default().assemble(&resolved);

        assert_eq!(eval(&ctx, "id"), "000042");
        assert_eq!(eval(&ctx, "owner.address[1]"), "Springfield");
        assert_eq!(eval(&ctx, "amount_net"), "3,375.00");
        assert_eq!(eval(&ctx, "amount_net_ == 3375"), "True");
        assert_eq!(eval(&ctx, "amount_gross"), "4,050.00");
        assert_eq!(eval(&ctx, "entries[0].qty"), "1,500");
        assert_eq!(eval(&ctx, "entries[0].discount"), "10.00");
        assert_eq!(eval(&ctx, "entries[0].discount_type"), "PERCENT");
        assert_eq!(eval(&ctx, "entries[0].taxtable.name"), "VAT 20%");
        assert_eq!(eval(&ctx, "warn_discount"), "False");
        assert_eq!(eval(&ctx, "date_posted"), "None");
    }

    #[test]
    fn discount_format_follows_the_raw_kind_code() {
        let invoice = Invoice::new(InvoiceId::new("000043"))
            .with_entry(
                LineItem::new(EntryId::new(), dec!(1), dec!(10)).with_discount(dec!(0), "VALUE", "PRETAX"),
            )
            .with_entry(
                LineItem::new(EntryId::new(), dec!(1), dec!(10)).with_discount(dec!(0), "PERCENT", "PRETAX"),
            )
            .with_entry(
                LineItem::new(EntryId::new(), dec!(1), dec!(10)).with_discount(dec!(2.5), "VALUE", "PRETAX"),
            );
        let resolved = invoice.resolve(&TaxTables::new()).unwrap();
        let ctx = InvoiceAssembler::default().assemble(&resolved);

        assert_eq!(eval(&ctx, "entries[0].discount"), "0");
        assert_eq!(eval(&ctx, "entries[1].discount"), "0.00");
        assert_eq!(eval(&ctx, "entries[2].discount"), "2.5");
    }

    #[test]
    fn format_functions_are_injected_and_replaceable() {
        let (invoice, tables) = sample();
        let resolved = invoice.resolve(&tables).unwrap();
        let assembler = InvoiceAssembler::new(
            &FormatConfig::default().with_currency(NumberFormat::plain().with_precision(1)),
        )
        .with_quantity_formatter(|q| format!("{q} pcs"));
        let ctx = assembler.assemble(&resolved);

        assert_eq!(eval(&ctx, "cformat(amount_taxes_)"), "675.0");
        assert_eq!(eval(&ctx, "cformat('1.25')"), "1.2");
        assert_eq!(eval(&ctx, "qformat(entries[0].qty_)"), "1500 pcs");
        assert!(StandardEvaluator::new().evaluate("cformat(owner)", &ctx).is_err());
    }
}
