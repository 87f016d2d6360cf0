//! Tax and discount resolution for single line items.
//!
//! Every line is reduced to five amounts: raw (`qty × price`), discount, net,
//! gross and taxes. Which formulas apply depends on whether the price already
//! includes tax, when the discount is applied and how it is expressed. Taxes
//! are always `gross − net`, never computed on their own, so the two can never
//! drift apart.

use std::sync::Arc;

use rust_decimal::Decimal;
use serde::Serialize;
use tracing::warn;

use ledgerprint_core::{DomainError, DomainResult, Entity, EntryId, ONE_HUNDRED, percent_factor};

use crate::line::{DiscountKind, DiscountTiming, LineItem};
use crate::tax::{TaxTableAggregate, TaxTables};

/// Amounts computed for one line item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct LineAmounts {
    pub raw: Decimal,
    pub discount: Decimal,
    pub net: Decimal,
    pub gross: Decimal,
    pub taxes: Decimal,
}

/// Tax sums in effect for one line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TaxBasis {
    pub percent_sum: Decimal,
    pub value_sum: Decimal,
    pub included: bool,
}

impl TaxBasis {
    /// No tax at all.
    pub fn none() -> Self {
        Self::default()
    }

    pub fn from_table(table: &TaxTableAggregate, included: bool) -> Self {
        Self {
            percent_sum: table.percent_sum(),
            value_sum: table.value_sum(),
            included,
        }
    }
}

/// A validated discount.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiscountPolicy {
    pub amount: Decimal,
    pub kind: DiscountKind,
    pub timing: DiscountTiming,
}

impl DiscountPolicy {
    /// No discount: zero percent, before tax.
    pub fn none() -> Self {
        Self {
            amount: Decimal::ZERO,
            kind: DiscountKind::Percent,
            timing: DiscountTiming::PreTax,
        }
    }

    /// Read the policy of `item`. The codes are only looked at when the item
    /// carries a non-zero discount.
    pub fn from_item(item: &LineItem) -> DomainResult<Self> {
        let amount = match item.discount {
            Some(amount) if !amount.is_zero() => amount,
            _ => return Ok(Self::none()),
        };
        let timing = DiscountTiming::parse(item.discount_timing.as_deref().unwrap_or(""), &item.id)?;
        let kind = DiscountKind::parse(item.discount_kind.as_deref().unwrap_or(""), &item.id)?;
        Ok(Self {
            amount,
            kind,
            timing,
        })
    }
}

/// A line item together with its computed amounts.
#[derive(Debug, Clone)]
pub struct ResolvedLine {
    pub item: LineItem,
    pub amounts: LineAmounts,
    pub policy: DiscountPolicy,
    /// The table the amounts were computed with, shared with every other line
    /// using it.
    pub tax_table: Option<Arc<TaxTableAggregate>>,
    /// A post-tax discount was applied; accounting software computes those
    /// differently, so the invoice should say so.
    pub warn_discount: bool,
}

/// A line item that could not be resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkipRecord {
    pub entry: EntryId,
    pub reason: DomainError,
}

/// Outcome of resolving a batch of line items.
#[derive(Debug, Clone, Default)]
pub struct Resolution {
    /// Resolved lines, ordered by entered timestamp.
    pub items: Vec<ResolvedLine>,
    pub skipped: Vec<SkipRecord>,
}

impl Resolution {
    pub fn warn_discount(&self) -> bool {
        self.items.iter().any(|line| line.warn_discount)
    }
}

/// Resolves line items against a set of tax tables.
#[derive(Debug, Clone, Copy)]
pub struct TaxDiscountResolver<'t> {
    tables: &'t TaxTables,
}

impl<'t> TaxDiscountResolver<'t> {
    pub fn new(tables: &'t TaxTables) -> Self {
        Self { tables }
    }

    pub fn resolve(&self, item: &LineItem) -> DomainResult<ResolvedLine> {
        let tax_table = match (item.taxable, item.tax_table) {
            (true, Some(id)) => Some(Arc::clone(self.tables.get(&id).ok_or_else(|| {
                DomainError::unknown_tax_table(item.id.to_string(), id.to_string())
            })?)),
            _ => None,
        };
        let basis = tax_table
            .as_deref()
            .map_or_else(TaxBasis::none, |table| TaxBasis::from_table(table, item.tax_included));
        let policy = DiscountPolicy::from_item(item)?;
        let (amounts, warn_discount) =
            compute(&item.id, item.quantity, item.price, basis, policy)?;

        Ok(ResolvedLine {
            item: item.clone(),
            amounts,
            policy,
            tax_table,
            warn_discount,
        })
    }

    /// Resolve every item, dropping (and recording) the ones that fail.
    pub fn resolve_all<'i, I>(&self, items: I) -> Resolution
    where
        I: IntoIterator<Item = &'i LineItem>,
    {
        let mut resolution = Resolution::default();
        for item in items {
            match self.resolve(item) {
                Ok(line) => resolution.items.push(line),
                Err(e) => {
                    warn!(entry = %item.id(), error = %e, "dropping line item");
                    resolution.skipped.push(SkipRecord {
                        entry: item.id,
                        reason: e,
                    });
                }
            }
        }
        resolution.items.sort_by_key(|line| line.item.entered);
        resolution
    }
}

/// Compute the amounts of one line. Returns the amounts and whether a
/// post-tax discount was applied.
pub fn compute(
    entry: &EntryId,
    quantity: Decimal,
    price: Decimal,
    basis: TaxBasis,
    policy: DiscountPolicy,
) -> DomainResult<(LineAmounts, bool)> {
    let calc = Checked { entry };
    let raw = calc.mul(quantity, price)?;
    let factor = percent_factor(basis.percent_sum)
        .ok_or_else(|| calc.fail("tax percentage overflows"))?;
    let value_sum = basis.value_sum;
    let discount_on = |base: Decimal| -> DomainResult<Decimal> {
        match policy.kind {
            DiscountKind::Percent => calc.div(calc.mul(policy.amount, base)?, ONE_HUNDRED),
            DiscountKind::Value => Ok(policy.amount),
        }
    };

    let (discount, net, gross) = match (basis.included, policy.timing) {
        (false, DiscountTiming::PostTax) => {
            let raw_gross = calc.add(calc.mul(raw, factor)?, value_sum)?;
            let discount = discount_on(raw_gross)?;
            let gross = calc.sub(raw_gross, discount)?;
            let net = calc.div(calc.sub(gross, value_sum)?, factor)?;
            (discount, net, gross)
        }
        (false, timing) => {
            let discount = discount_on(raw)?;
            let net = calc.sub(raw, discount)?;
            let gross = if timing == DiscountTiming::PreTax {
                calc.add(calc.mul(net, factor)?, value_sum)?
            } else {
                let raw_gross = calc.add(calc.mul(raw, factor)?, value_sum)?;
                calc.sub(raw_gross, discount)?
            };
            (discount, net, gross)
        }
        (true, DiscountTiming::PostTax) => {
            let discount = discount_on(raw)?;
            let gross = calc.sub(raw, discount)?;
            let net = calc.div(calc.sub(gross, value_sum)?, factor)?;
            (discount, net, gross)
        }
        (true, timing) => {
            let raw_net = calc.div(calc.sub(raw, value_sum)?, factor)?;
            let discount = discount_on(raw_net)?;
            let net = calc.sub(raw_net, discount)?;
            let gross = if timing == DiscountTiming::PreTax {
                calc.add(calc.mul(net, factor)?, value_sum)?
            } else {
                calc.sub(raw, discount)?
            };
            (discount, net, gross)
        }
    };

    let warn_discount = policy.timing == DiscountTiming::PostTax && !discount.is_zero();
    let taxes = calc.sub(gross, net)?;
    Ok((
        LineAmounts {
            raw,
            discount,
            net,
            gross,
            taxes,
        },
        warn_discount,
    ))
}

/// Checked decimal operations that name the entry on failure.
struct Checked<'e> {
    entry: &'e EntryId,
}

impl Checked<'_> {
    fn fail(&self, message: &str) -> DomainError {
        DomainError::arithmetic(self.entry.to_string(), message)
    }

    fn add(&self, a: Decimal, b: Decimal) -> DomainResult<Decimal> {
        a.checked_add(b).ok_or_else(|| self.fail("addition overflows"))
    }

    fn sub(&self, a: Decimal, b: Decimal) -> DomainResult<Decimal> {
        a.checked_sub(b).ok_or_else(|| self.fail("subtraction overflows"))
    }

    fn mul(&self, a: Decimal, b: Decimal) -> DomainResult<Decimal> {
        a.checked_mul(b).ok_or_else(|| self.fail("multiplication overflows"))
    }

    fn div(&self, a: Decimal, b: Decimal) -> DomainResult<Decimal> {
        if b.is_zero() {
            return Err(self.fail("division by zero"));
        }
        a.checked_div(b).ok_or_else(|| self.fail("division overflows"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tax::TaxTableEntry;
    use ledgerprint_core::{PolicyField, TaxTableId};
    use proptest::prelude::*;
    use rust_decimal_macros::dec;

    fn tables() -> (TaxTables, TaxTableId) {
        let id = TaxTableId::new();
        let table = TaxTableAggregate::from_entries(
            id,
            "test",
            vec![TaxTableEntry::percent(dec!(30)), TaxTableEntry::value(dec!(50))],
        )
        .unwrap();
        (std::iter::once(table).collect(), id)
    }

    fn item() -> LineItem {
        LineItem::new(EntryId::new(), dec!(10), dec!(100))
    }

    fn approx(value: Decimal) -> Decimal {
        value.round_dp(10)
    }

    #[test]
    fn percent_pretax_without_tax() {
        let entry = EntryId::new();
        let policy = DiscountPolicy {
            amount: dec!(10),
            kind: DiscountKind::Percent,
            timing: DiscountTiming::PreTax,
        };
        let (a, warn) = compute(&entry, dec!(3), dec!(0.4), TaxBasis::none(), policy).unwrap();
        assert_eq!(a.raw, dec!(1.2));
        assert_eq!(a.discount, dec!(0.12));
        assert_eq!(a.net, dec!(1.08));
        assert_eq!(a.gross, dec!(1.08));
        assert_eq!(a.taxes, dec!(0.00));
        assert!(!warn);
    }

    #[test]
    fn excluded_pretax_value() {
        let (tables, id) = tables();
        let line = TaxDiscountResolver::new(&tables)
            .resolve(&item().with_tax(id, false).with_discount(dec!(5), "VALUE", "PRETAX"))
            .unwrap();
        assert_eq!(line.amounts.net, dec!(995));
        assert_eq!(line.amounts.gross, dec!(1343.5));
        assert_eq!(line.amounts.taxes, dec!(348.5));
        assert!(!line.warn_discount);
    }

    #[test]
    fn included_without_discount() {
        let (tables, id) = tables();
        let line = TaxDiscountResolver::new(&tables)
            .resolve(&item().with_tax(id, true))
            .unwrap();
        assert_eq!(approx(line.amounts.gross), dec!(1000));
        assert_eq!(approx(line.amounts.net), dec!(730.7692307692));
        assert_eq!(approx(line.amounts.taxes), dec!(269.2307692308));
        assert_eq!(line.amounts.discount, Decimal::ZERO);
    }

    #[test]
    fn included_posttax_percent_warns() {
        let (tables, id) = tables();
        let line = TaxDiscountResolver::new(&tables)
            .resolve(&item().with_tax(id, true).with_discount(dec!(5), "PERCENT", "POSTTAX"))
            .unwrap();
        assert_eq!(line.amounts.discount, dec!(50));
        assert_eq!(line.amounts.gross, dec!(950));
        assert_eq!(approx(line.amounts.net), dec!(692.3076923077));
        assert!(line.warn_discount);
    }

    #[test]
    fn excluded_posttax_value_warns() {
        let (tables, id) = tables();
        let line = TaxDiscountResolver::new(&tables)
            .resolve(&item().with_tax(id, false).with_discount(dec!(5), "VALUE", "POSTTAX"))
            .unwrap();
        assert_eq!(line.amounts.gross, dec!(1345));
        assert_eq!(approx(line.amounts.net), dec!(996.1538461538));
        assert!(line.warn_discount);
    }

    #[test]
    fn included_pretax_value() {
        let (tables, id) = tables();
        let line = TaxDiscountResolver::new(&tables)
            .resolve(&item().with_tax(id, true).with_discount(dec!(5), "VALUE", "PRETAX"))
            .unwrap();
        assert_eq!(approx(line.amounts.net), dec!(725.7692307692));
        assert_eq!(approx(line.amounts.gross), dec!(993.5));
    }

    #[test]
    fn sametime_discounts_both_sides() {
        let (tables, id) = tables();
        let resolver = TaxDiscountResolver::new(&tables);
        let excluded = resolver
            .resolve(&item().with_tax(id, false).with_discount(dec!(5), "VALUE", "SAMETIME"))
            .unwrap();
        assert_eq!(excluded.amounts.net, dec!(995));
        assert_eq!(excluded.amounts.gross, dec!(1345));

        let included = resolver
            .resolve(&item().with_tax(id, true).with_discount(dec!(5), "VALUE", "SAMETIME"))
            .unwrap();
        assert_eq!(included.amounts.gross, dec!(995));
        assert_eq!(approx(included.amounts.net), dec!(725.7692307692));
    }

    #[test]
    fn taxable_without_table_is_untaxed_and_exclusive() {
        let mut line = item();
        line.taxable = true;
        line.tax_included = true;
        let resolved = TaxDiscountResolver::new(&TaxTables::new()).resolve(&line).unwrap();
        assert_eq!(resolved.amounts.net, dec!(1000));
        assert_eq!(resolved.amounts.gross, dec!(1000));
        assert!(resolved.tax_table.is_none());
    }

    #[test]
    fn zero_discount_ignores_policy_codes() {
        let line = item().with_discount(Decimal::ZERO, "BOGUS", "NEVER");
        let resolved = TaxDiscountResolver::new(&TaxTables::new()).resolve(&line).unwrap();
        assert_eq!(resolved.policy, DiscountPolicy::none());
    }

    #[test]
    fn bad_policy_codes_are_item_errors() {
        let line = item().with_discount(dec!(1), "PERCENT", "LATER");
        match TaxDiscountResolver::new(&TaxTables::new()).resolve(&line) {
            Err(DomainError::InvalidPolicy { field, entry, .. }) => {
                assert_eq!(field, PolicyField::DiscountTiming);
                assert_eq!(entry, line.id.to_string());
            }
            other => panic!("Expected InvalidPolicy, got {other:?}"),
        }
    }

    #[test]
    fn unknown_tax_table_is_an_item_error() {
        let line = item().with_tax(TaxTableId::new(), false);
        assert!(matches!(
            TaxDiscountResolver::new(&TaxTables::new()).resolve(&line),
            Err(DomainError::UnknownTaxTable { .. })
        ));
    }

    #[test]
    fn zero_tax_factor_is_reported_not_panicking() {
        let policy = DiscountPolicy::none();
        let basis = TaxBasis {
            percent_sum: dec!(-100),
            value_sum: Decimal::ZERO,
            included: true,
        };
        match compute(&EntryId::new(), dec!(1), dec!(1), basis, policy) {
            Err(DomainError::Arithmetic { message, .. }) => assert!(message.contains("zero")),
            other => panic!("Expected arithmetic error, got {other:?}"),
        }
    }

    #[test]
    fn lines_share_the_table_and_batch_skips_bad_items() {
        let (tables, id) = tables();
        let first = item().with_tax(id, false);
        let second = item().with_tax(id, true).with_discount(dec!(2), "VALUE", "SAMETIME");
        let broken = item().with_discount(dec!(1), "HALF", "PRETAX");
        let resolution =
            TaxDiscountResolver::new(&tables).resolve_all([&first, &broken, &second]);

        assert_eq!(resolution.items.len(), 2);
        let (a, b) = (&resolution.items[0], &resolution.items[1]);
        assert!(Arc::ptr_eq(a.tax_table.as_ref().unwrap(), b.tax_table.as_ref().unwrap()));
        assert_eq!(a.amounts.net, dec!(1000));
        assert_eq!(resolution.skipped.len(), 1);
        assert_eq!(resolution.skipped[0].entry, broken.id);
        assert!(!resolution.warn_discount());
    }

    fn kind() -> impl Strategy<Value = DiscountKind> {
        prop_oneof![Just(DiscountKind::Percent), Just(DiscountKind::Value)]
    }

    fn timing() -> impl Strategy<Value = DiscountTiming> {
        prop_oneof![
            Just(DiscountTiming::PreTax),
            Just(DiscountTiming::SameTime),
            Just(DiscountTiming::PostTax),
        ]
    }

    proptest! {
        #![proptest_config(ProptestConfig { cases: 256, ..ProptestConfig::default() })]

        #[test]
        fn taxes_are_exactly_gross_minus_net(
            qty in 0i64..100_000,
            price in -1_000_000i64..1_000_000,
            discount in 0i64..10_000,
            kind in kind(),
            timing in timing(),
            included in any::<bool>(),
            percent in 0i64..5_000,
            value in 0i64..100_000,
        ) {
            let basis = TaxBasis {
                percent_sum: Decimal::new(percent, 2),
                value_sum: Decimal::new(value, 2),
                included,
            };
            let policy = DiscountPolicy { amount: Decimal::new(discount, 2), kind, timing };
            let (a, _) = compute(&EntryId::new(), Decimal::new(qty, 3), Decimal::new(price, 2), basis, policy).unwrap();
            prop_assert_eq!(a.gross - a.net, a.taxes);
            prop_assert_eq!(a.raw, Decimal::new(qty, 3) * Decimal::new(price, 2));
        }

        #[test]
        fn untaxed_undiscounted_lines_are_raw(qty in 0i64..100_000, price in 0i64..1_000_000) {
            let (a, warn) = compute(
                &EntryId::new(),
                Decimal::new(qty, 2),
                Decimal::new(price, 2),
                TaxBasis::none(),
                DiscountPolicy::none(),
            ).unwrap();
            prop_assert_eq!(a.net, a.raw);
            prop_assert_eq!(a.gross, a.raw);
            prop_assert!(a.taxes.is_zero());
            prop_assert!(!warn);
        }

        #[test]
        fn only_posttax_discounts_warn(
            discount in 1i64..10_000,
            kind in kind(),
            timing in timing(),
            included in any::<bool>(),
        ) {
            let basis = TaxBasis { percent_sum: dec!(19), value_sum: dec!(1), included };
            let policy = DiscountPolicy { amount: Decimal::new(discount, 2), kind, timing };
            let (_, warn) = compute(&EntryId::new(), dec!(2), dec!(50), basis, policy).unwrap();
            prop_assert_eq!(warn, timing == DiscountTiming::PostTax);
        }
    }
}
