//! Invoice line items and discount policy codes.

use core::fmt;

use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use ledgerprint_core::{
    DomainError, DomainResult, Entity, EntryId, PolicyField, TaxTableId, fraction,
};

/// How a discount is expressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DiscountKind {
    /// A percentage of the discount base.
    Percent,
    /// An absolute amount.
    Value,
}

impl DiscountKind {
    pub fn code(self) -> &'static str {
        match self {
            DiscountKind::Percent => "PERCENT",
            DiscountKind::Value => "VALUE",
        }
    }

    /// Parse an upstream code, attributing failures to `entry`.
    pub fn parse(code: &str, entry: &EntryId) -> DomainResult<Self> {
        match code {
            "PERCENT" => Ok(DiscountKind::Percent),
            "VALUE" => Ok(DiscountKind::Value),
            other => Err(DomainError::invalid_policy(
                entry.to_string(),
                PolicyField::DiscountKind,
                other,
            )),
        }
    }
}

/// When a discount is applied relative to the tax computation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DiscountTiming {
    PreTax,
    SameTime,
    PostTax,
}

impl DiscountTiming {
    pub fn code(self) -> &'static str {
        match self {
            DiscountTiming::PreTax => "PRETAX",
            DiscountTiming::SameTime => "SAMETIME",
            DiscountTiming::PostTax => "POSTTAX",
        }
    }

    pub fn parse(code: &str, entry: &EntryId) -> DomainResult<Self> {
        match code {
            "PRETAX" => Ok(DiscountTiming::PreTax),
            "SAMETIME" => Ok(DiscountTiming::SameTime),
            "POSTTAX" => Ok(DiscountTiming::PostTax),
            other => Err(DomainError::invalid_policy(
                entry.to_string(),
                PolicyField::DiscountTiming,
                other,
            )),
        }
    }
}

impl fmt::Display for DiscountKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl fmt::Display for DiscountTiming {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// One billable row as handed over by the upstream extractor.
///
/// Discount kind and timing stay raw codes here; the resolver validates them
/// and only when a discount is actually present.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    pub id: EntryId,
    #[serde(default)]
    pub date: Option<NaiveDate>,
    /// When the entry was recorded; invoices list entries in this order.
    #[serde(default)]
    pub entered: Option<NaiveDateTime>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub action: Option<String>,
    #[serde(deserialize_with = "fraction::deserialize")]
    pub quantity: Decimal,
    #[serde(deserialize_with = "fraction::deserialize")]
    pub price: Decimal,
    #[serde(default)]
    pub taxable: bool,
    #[serde(default)]
    pub tax_included: bool,
    #[serde(default)]
    pub tax_table: Option<TaxTableId>,
    #[serde(default, deserialize_with = "fraction::deserialize_option")]
    pub discount: Option<Decimal>,
    #[serde(default)]
    pub discount_kind: Option<String>,
    #[serde(default)]
    pub discount_timing: Option<String>,
}

impl LineItem {
    pub fn new(id: EntryId, quantity: Decimal, price: Decimal) -> Self {
        Self {
            id,
            date: None,
            entered: None,
            description: None,
            action: None,
            quantity,
            price,
            taxable: false,
            tax_included: false,
            tax_table: None,
            discount: None,
            discount_kind: None,
            discount_timing: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_action(mut self, action: impl Into<String>) -> Self {
        self.action = Some(action.into());
        self
    }

    pub fn with_date(mut self, date: NaiveDate) -> Self {
        self.date = Some(date);
        self
    }

    pub fn with_entered(mut self, entered: NaiveDateTime) -> Self {
        self.entered = Some(entered);
        self
    }

    /// Make the item taxable under `table`.
    pub fn with_tax(mut self, table: TaxTableId, included: bool) -> Self {
        self.taxable = true;
        self.tax_table = Some(table);
        self.tax_included = included;
        self
    }

    /// Attach a discount with raw policy codes.
    pub fn with_discount(
        mut self,
        amount: Decimal,
        kind: impl Into<String>,
        timing: impl Into<String>,
    ) -> Self {
        self.discount = Some(amount);
        self.discount_kind = Some(kind.into());
        self.discount_timing = Some(timing.into());
        self
    }
}

impl Entity for LineItem {
    type Id = EntryId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn policy_codes_round_trip_through_parse() {
        let entry = EntryId::new();
        for kind in [DiscountKind::Percent, DiscountKind::Value] {
            assert_eq!(DiscountKind::parse(kind.code(), &entry).unwrap(), kind);
        }
        for timing in [DiscountTiming::PreTax, DiscountTiming::SameTime, DiscountTiming::PostTax] {
            assert_eq!(DiscountTiming::parse(timing.code(), &entry).unwrap(), timing);
        }
    }

    #[test]
    fn unknown_codes_name_the_field() {
        let entry = EntryId::new();
        match DiscountTiming::parse("LATER", &entry) {
            Err(DomainError::InvalidPolicy { field, value, .. }) => {
                assert_eq!(field, PolicyField::DiscountTiming);
                assert_eq!(value, "LATER");
            }
            other => panic!("Expected InvalidPolicy, got {other:?}"),
        }
        assert!(matches!(
            DiscountKind::parse("percent", &entry),
            Err(DomainError::InvalidPolicy {
                field: PolicyField::DiscountKind,
                ..
            })
        ));
    }

    #[test]
    fn line_item_deserializes_with_defaults() {
        let json = r#"{
            "id": "ee4c70d967b0f91f49ded26d578ab6eb",
            "quantity": "3",
            "price": "0.4",
            "entered": "2009-01-02T10:00:00"
        }"#;
        let item: LineItem = serde_json::from_str(json).unwrap();
        assert!(!item.taxable);
        assert_eq!(item.discount, None);
        assert_eq!(item.id().to_string(), "ee4c70d967b0f91f49ded26d578ab6eb");
    }

    #[test]
    fn amounts_accept_ledger_fractions_and_plain_numbers() {
        let json = r#"{
            "id": "ee4c70d967b0f91f49ded26d578ab6eb",
            "quantity": "1000/100",
            "price": 2.5,
            "discount": "15/2"
        }"#;
        let item: LineItem = serde_json::from_str(json).unwrap();
        assert_eq!(item.quantity, Decimal::TEN);
        assert_eq!(item.price, Decimal::new(25, 1));
        assert_eq!(item.discount, Some(Decimal::new(75, 1)));

        let bad = json.replace("1000/100", "1/0");
        assert!(serde_json::from_str::<LineItem>(&bad).is_err());
    }
}
