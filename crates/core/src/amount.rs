//! Decimal helpers shared by the tax engine and the upstream extractors.

use core::str::FromStr;

use rust_decimal::Decimal;

use crate::error::{DomainError, DomainResult};

pub const ONE_HUNDRED: Decimal = Decimal::ONE_HUNDRED;

/// Parse an accounting-file number of the form `numerator/denominator`.
///
/// A bare number without a denominator is accepted as well.
pub fn parse_fraction(value: &str) -> DomainResult<Decimal> {
    let value = value.trim();
    let (num, den) = match value.split_once('/') {
        Some((n, d)) => (n.trim(), d.trim()),
        None => (value, "1"),
    };
    let num = Decimal::from_str(num)
        .map_err(|e| DomainError::validation(format!("invalid numerator in [{value}]: {e}")))?;
    let den = Decimal::from_str(den)
        .map_err(|e| DomainError::validation(format!("invalid denominator in [{value}]: {e}")))?;
    num.checked_div(den)
        .ok_or_else(|| DomainError::validation(format!("cannot divide [{value}]")))
}

/// Serde adapters for amounts that may arrive as `"num/den"` text or as plain
/// numbers.
///
/// Use with `#[serde(deserialize_with = "fraction::deserialize")]`.
pub mod fraction {
    use rust_decimal::Decimal;
    use serde::{Deserialize, Deserializer, de::Error};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawAmount {
        Text(String),
        Number(Decimal),
    }

    impl RawAmount {
        fn into_decimal<E: Error>(self) -> Result<Decimal, E> {
            match self {
                RawAmount::Text(text) => super::parse_fraction(&text).map_err(E::custom),
                RawAmount::Number(n) => Ok(n),
            }
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Decimal, D::Error>
    where
        D: Deserializer<'de>,
    {
        RawAmount::deserialize(deserializer)?.into_decimal()
    }

    pub fn deserialize_option<'de, D>(deserializer: D) -> Result<Option<Decimal>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Option::<RawAmount>::deserialize(deserializer)?
            .map(RawAmount::into_decimal)
            .transpose()
    }
}

/// `1 + percent / 100`, the multiplier that adds a percentage tax.
pub fn percent_factor(percent: Decimal) -> Option<Decimal> {
    percent
        .checked_div(ONE_HUNDRED)
        .and_then(|p| Decimal::ONE.checked_add(p))
}
