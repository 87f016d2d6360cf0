//! Tax tables and their precomputed sums.

use std::collections::HashMap;
use std::sync::Arc;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use ledgerprint_core::{DomainError, DomainResult, Entity, TaxTableId, fraction};

/// One component of a tax table, as read from the accounting file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxTableEntry {
    /// `PERCENT` or `VALUE`.
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(deserialize_with = "fraction::deserialize")]
    pub amount: Decimal,
    #[serde(default)]
    pub account: Option<String>,
}

impl TaxTableEntry {
    pub fn percent(amount: Decimal) -> Self {
        Self {
            kind: "PERCENT".to_string(),
            amount,
            account: None,
        }
    }

    pub fn value(amount: Decimal) -> Self {
        Self {
            kind: "VALUE".to_string(),
            amount,
            account: None,
        }
    }
}

/// A tax table reduced to the two sums the resolver needs.
///
/// Immutable once built; line items share it through an `Arc`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "TaxTableRecord")]
pub struct TaxTableAggregate {
    id: TaxTableId,
    name: String,
    percent_sum: Decimal,
    value_sum: Decimal,
    entries: Vec<TaxTableEntry>,
}

#[derive(Deserialize)]
struct TaxTableRecord {
    id: TaxTableId,
    name: String,
    #[serde(default)]
    entries: Vec<TaxTableEntry>,
}

impl TryFrom<TaxTableRecord> for TaxTableAggregate {
    type Error = DomainError;

    fn try_from(record: TaxTableRecord) -> Result<Self, Self::Error> {
        Self::from_entries(record.id, record.name, record.entries)
    }
}

impl TaxTableAggregate {
    /// Sum PERCENT and VALUE entries separately. Any other entry type is an
    /// error.
    pub fn from_entries(
        id: TaxTableId,
        name: impl Into<String>,
        entries: Vec<TaxTableEntry>,
    ) -> DomainResult<Self> {
        let mut percent_sum = Decimal::ZERO;
        let mut value_sum = Decimal::ZERO;
        for entry in &entries {
            let sum = match entry.kind.as_str() {
                "PERCENT" => &mut percent_sum,
                "VALUE" => &mut value_sum,
                other => return Err(DomainError::InvalidTaxEntry(other.to_string())),
            };
            *sum = sum.checked_add(entry.amount).ok_or_else(|| {
                DomainError::validation(format!("tax table [{id}] sum overflows"))
            })?;
        }
        Ok(Self {
            id,
            name: name.into(),
            percent_sum,
            value_sum,
            entries,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn percent_sum(&self) -> Decimal {
        self.percent_sum
    }

    pub fn value_sum(&self) -> Decimal {
        self.value_sum
    }

    pub fn entries(&self) -> &[TaxTableEntry] {
        &self.entries
    }
}

impl Entity for TaxTableAggregate {
    type Id = TaxTableId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

/// Lookup from tax table id to the shared aggregate.
#[derive(Debug, Clone, Default)]
pub struct TaxTables {
    tables: HashMap<TaxTableId, Arc<TaxTableAggregate>>,
}

impl TaxTables {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a table, replacing any table with the same id. Returns the shared
    /// handle.
    pub fn insert(&mut self, table: TaxTableAggregate) -> Arc<TaxTableAggregate> {
        let table = Arc::new(table);
        self.tables.insert(*table.id(), Arc::clone(&table));
        table
    }

    pub fn get(&self, id: &TaxTableId) -> Option<&Arc<TaxTableAggregate>> {
        self.tables.get(id)
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}

impl FromIterator<TaxTableAggregate> for TaxTables {
    fn from_iter<I: IntoIterator<Item = TaxTableAggregate>>(iter: I) -> Self {
        let mut tables = Self::new();
        for table in iter {
            tables.insert(table);
        }
        tables
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn sums_entries_by_kind() {
        let table = TaxTableAggregate::from_entries(
            TaxTableId::new(),
            "VAT + fee",
            vec![
                TaxTableEntry::percent(dec!(20)),
                TaxTableEntry::value(dec!(50)),
                TaxTableEntry::percent(dec!(10)),
            ],
        )
        .unwrap();
        assert_eq!(table.percent_sum(), dec!(30));
        assert_eq!(table.value_sum(), dec!(50));
        assert_eq!(table.entries().len(), 3);
    }

    #[test]
    fn unknown_entry_kind_is_rejected() {
        let entry = TaxTableEntry {
            kind: "PER_MILLE".to_string(),
            amount: dec!(1),
            account: None,
        };
        let err = TaxTableAggregate::from_entries(TaxTableId::new(), "odd", vec![entry]).unwrap_err();
        assert_eq!(err, DomainError::InvalidTaxEntry("PER_MILLE".into()));
    }

    #[test]
    fn deserializing_computes_the_sums() {
        let json = r#"{
            "id": "0a1b2c3d4e5f60718293a4b5c6d7e8f9",
            "name": "VAT",
            "entries": [{"type": "PERCENT", "amount": "19"}, {"type": "VALUE", "amount": "50/100"}]
        }"#;
        let table: TaxTableAggregate = serde_json::from_str(json).unwrap();
        assert_eq!(table.percent_sum(), dec!(19));
        assert_eq!(table.value_sum(), dec!(0.5));

        let bad = json.replace("\"VALUE\"", "\"BOGUS\"");
        assert!(serde_json::from_str::<TaxTableAggregate>(&bad).is_err());
    }

    #[test]
    fn lookup_hands_out_the_same_arc() {
        let mut tables = TaxTables::new();
        let id = TaxTableId::new();
        let inserted = tables.insert(
            TaxTableAggregate::from_entries(id, "t", vec![TaxTableEntry::percent(dec!(7))]).unwrap(),
        );
        assert!(Arc::ptr_eq(&inserted, tables.get(&id).unwrap()));
    }
}
