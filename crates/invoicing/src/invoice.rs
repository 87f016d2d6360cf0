//! Invoices, their parties and terms, and resolved totals.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use ledgerprint_core::{DomainError, DomainResult, Entity, InvoiceId, OwnerId};

use crate::line::LineItem;
use crate::resolver::{Resolution, ResolvedLine, SkipRecord, TaxDiscountResolver};
use crate::tax::TaxTables;

/// Customer or vendor the invoice is addressed to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Owner {
    #[serde(default)]
    pub id: Option<OwnerId>,
    pub name: String,
    #[serde(default)]
    pub full_name: Option<String>,
    /// Address lines in print order.
    #[serde(default)]
    pub address: Vec<String>,
    #[serde(default)]
    pub email: Option<String>,
}

impl Owner {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: None,
            name: name.into(),
            full_name: None,
            address: Vec::new(),
            email: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub reference: Option<String>,
}

/// Billing terms.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Terms {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub due_days: Option<u32>,
    #[serde(default)]
    pub discount_days: Option<u32>,
    #[serde(default)]
    pub discount: Option<Decimal>,
}

/// An invoice as handed over by the upstream extractor, before any amounts
/// are computed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invoice {
    pub id: InvoiceId,
    #[serde(default)]
    pub billing_id: Option<String>,
    #[serde(default)]
    pub owner: Option<Owner>,
    #[serde(default)]
    pub job: Option<Job>,
    #[serde(default)]
    pub terms: Option<Terms>,
    #[serde(default)]
    pub date_opened: Option<NaiveDate>,
    #[serde(default)]
    pub date_posted: Option<NaiveDate>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub entries: Vec<LineItem>,
}

impl Invoice {
    pub fn new(id: InvoiceId) -> Self {
        Self {
            id,
            billing_id: None,
            owner: None,
            job: None,
            terms: None,
            date_opened: None,
            date_posted: None,
            notes: None,
            currency: None,
            entries: Vec::new(),
        }
    }

    pub fn with_owner(mut self, owner: Owner) -> Self {
        self.owner = Some(owner);
        self
    }

    pub fn with_entry(mut self, entry: LineItem) -> Self {
        self.entries.push(entry);
        self
    }

    /// Name used to pick an owner-specific template.
    pub fn owner_name(&self) -> Option<&str> {
        self.owner.as_ref().map(|owner| owner.name.as_str())
    }

    /// Resolve all entries and sum them up. Entries that fail are skipped and
    /// reported in the result.
    pub fn resolve(&self, tables: &TaxTables) -> DomainResult<ResolvedInvoice<'_>> {
        let resolution = TaxDiscountResolver::new(tables).resolve_all(&self.entries);
        let totals = Totals::from_lines(&self.id, &resolution.items)?;
        Ok(ResolvedInvoice {
            invoice: self,
            resolution,
            totals,
        })
    }
}

impl Entity for Invoice {
    type Id = InvoiceId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

/// Invoice-level sums of the resolved lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Totals {
    pub net: Decimal,
    pub gross: Decimal,
    pub taxes: Decimal,
}

impl Totals {
    pub fn from_lines(invoice: &InvoiceId, lines: &[ResolvedLine]) -> DomainResult<Self> {
        let overflow = || DomainError::validation(format!("totals of invoice [{invoice}] overflow"));
        lines.iter().try_fold(Self::default(), |acc, line| {
            Ok(Self {
                net: acc.net.checked_add(line.amounts.net).ok_or_else(overflow)?,
                gross: acc.gross.checked_add(line.amounts.gross).ok_or_else(overflow)?,
                taxes: acc.taxes.checked_add(line.amounts.taxes).ok_or_else(overflow)?,
            })
        })
    }
}

/// An invoice with every entry resolved.
#[derive(Debug, Clone)]
pub struct ResolvedInvoice<'i> {
    pub invoice: &'i Invoice,
    pub resolution: Resolution,
    pub totals: Totals,
}

impl ResolvedInvoice<'_> {
    /// Resolved lines in entered order.
    pub fn lines(&self) -> &[ResolvedLine] {
        &self.resolution.items
    }

    pub fn skipped(&self) -> &[SkipRecord] {
        &self.resolution.skipped
    }

    /// Some line carries a post-tax discount.
    pub fn warn_discount(&self) -> bool {
        self.resolution.warn_discount()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tax::{TaxTableAggregate, TaxTableEntry};
    use chrono::NaiveDateTime;
    use ledgerprint_core::{EntryId, TaxTableId};
    use proptest::prelude::*;
    use rust_decimal_macros::dec;

    fn at(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").unwrap()
    }

    #[test]
    fn entries_are_ordered_by_entered_timestamp() {
        let late = LineItem::new(EntryId::new(), dec!(1), dec!(2)).with_entered(at("2009-03-01 10:00:00"));
        let early = LineItem::new(EntryId::new(), dec!(1), dec!(3)).with_entered(at("2009-01-01 10:00:00"));
        let invoice = Invoice::new(InvoiceId::new("000001"))
            .with_entry(late.clone())
            .with_entry(early.clone());

        let resolved = invoice.resolve(&TaxTables::new()).unwrap();
        let ids: Vec<_> = resolved.lines().iter().map(|l| l.item.id).collect();
        assert_eq!(ids, vec![early.id, late.id]);
        assert_eq!(resolved.totals.net, dec!(5));
    }

    #[test]
    fn posttax_line_flags_the_invoice_and_bad_lines_are_skipped() {
        let table_id = TaxTableId::new();
        let tables: TaxTables = [TaxTableAggregate::from_entries(
            table_id,
            "VAT",
            vec![TaxTableEntry::percent(dec!(10))],
        )
        .unwrap()]
        .into_iter()
        .collect();
        let invoice = Invoice::new(InvoiceId::new("7"))
            .with_entry(
                LineItem::new(EntryId::new(), dec!(1), dec!(100))
                    .with_tax(table_id, false)
                    .with_discount(dec!(10), "VALUE", "POSTTAX"),
            )
            .with_entry(LineItem::new(EntryId::new(), dec!(1), dec!(1)).with_discount(dec!(1), "VALUE", "?"));

        let resolved = invoice.resolve(&tables).unwrap();
        assert!(resolved.warn_discount());
        assert_eq!(resolved.lines().len(), 1);
        assert_eq!(resolved.skipped().len(), 1);
        assert_eq!(resolved.totals.gross, dec!(100));
    }

    proptest! {
        #![proptest_config(ProptestConfig { cases: 64, ..ProptestConfig::default() })]

        #[test]
        fn totals_are_sums_of_lines(prices in prop::collection::vec(0i64..1_000_000, 0..20)) {
            let invoice = prices.iter().fold(Invoice::new(InvoiceId::new("1")), |inv, p| {
                inv.with_entry(LineItem::new(EntryId::new(), dec!(1), Decimal::new(*p, 2)))
            });
            let resolved = invoice.resolve(&TaxTables::new()).unwrap();
            let expected: Decimal = prices.iter().map(|p| Decimal::new(*p, 2)).sum();
            prop_assert_eq!(resolved.totals.net, expected);
            prop_assert_eq!(resolved.totals.gross - resolved.totals.net, resolved.totals.taxes);
        }
    }
}
