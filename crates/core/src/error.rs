//! Domain error model.

use thiserror::Error;

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// Which discount policy code failed validation.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum PolicyField {
    /// When the discount is applied (PRETAX / SAMETIME / POSTTAX).
    DiscountTiming,
    /// How the discount is expressed (PERCENT / VALUE).
    DiscountKind,
}

impl core::fmt::Display for PolicyField {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            PolicyField::DiscountTiming => f.write_str("discount timing"),
            PolicyField::DiscountKind => f.write_str("discount kind"),
        }
    }
}

/// Domain-level error.
///
/// Every variant describes a problem with a single record. Callers resolving a
/// whole invoice drop the offending record and keep going.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// A value failed validation (e.g. malformed input).
    #[error("validation failed: {0}")]
    Validation(String),

    /// A discount policy code is not one of the known values.
    #[error("unknown {field} [{value}] in entry [{entry}]")]
    InvalidPolicy {
        entry: String,
        field: PolicyField,
        value: String,
    },

    /// A line item refers to a tax table that is not in the lookup.
    #[error("unknown tax table [{table}] referenced in entry [{entry}]")]
    UnknownTaxTable { entry: String, table: String },

    /// A tax table entry has a type other than PERCENT or VALUE.
    #[error("invalid tax table entry type [{0}]")]
    InvalidTaxEntry(String),

    /// Decimal arithmetic overflowed or divided by zero.
    #[error("arithmetic failure in entry [{entry}]: {message}")]
    Arithmetic { entry: String, message: String },

    /// An identifier was invalid (e.g. parse failure).
    #[error("invalid identifier: {0}")]
    InvalidId(String),
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn invalid_policy(
        entry: impl Into<String>,
        field: PolicyField,
        value: impl Into<String>,
    ) -> Self {
        Self::InvalidPolicy {
            entry: entry.into(),
            field,
            value: value.into(),
        }
    }

    pub fn unknown_tax_table(entry: impl Into<String>, table: impl Into<String>) -> Self {
        Self::UnknownTaxTable {
            entry: entry.into(),
            table: table.into(),
        }
    }

    pub fn arithmetic(entry: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Arithmetic {
            entry: entry.into(),
            message: message.into(),
        }
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }
}
