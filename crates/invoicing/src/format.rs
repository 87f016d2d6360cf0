//! Number formatting for currency and quantity values.
//!
//! There is no global locale: separators, grouping and the dash symbol are
//! plain configuration.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// How one class of numbers (currency or quantity) is printed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NumberFormat {
    /// Quantize to this many decimal places first (half-even).
    pub precision: Option<u32>,
    /// Apply separators, grouping, fixed fraction digits and the dash symbol.
    /// When off, the (quantized) number is printed as is.
    pub localized: bool,
    /// Fraction digits when localized; `None` drops trailing zeros.
    pub fraction_digits: Option<u32>,
    pub decimal_point: String,
    pub thousands_sep: String,
    /// Digits per group in the integer part; 0 disables grouping.
    pub grouping: usize,
    /// Replaces a zero fractional part when localized (`12.00` → `12.-`).
    pub dash: Option<String>,
}

impl Default for NumberFormat {
    fn default() -> Self {
        Self::currency()
    }
}

impl NumberFormat {
    /// Two fraction digits, `,` thousands separator.
    pub fn currency() -> Self {
        Self {
            precision: None,
            localized: true,
            fraction_digits: Some(2),
            decimal_point: ".".to_string(),
            thousands_sep: ",".to_string(),
            grouping: 3,
            dash: None,
        }
    }

    /// Like [`currency`](Self::currency) but without trailing zeros.
    pub fn quantity() -> Self {
        Self {
            fraction_digits: None,
            ..Self::currency()
        }
    }

    /// The decimal's own string form.
    pub fn plain() -> Self {
        Self {
            localized: false,
            ..Self::currency()
        }
    }

    pub fn with_precision(mut self, precision: u32) -> Self {
        self.precision = Some(precision);
        self
    }

    pub fn with_separators(
        mut self,
        decimal_point: impl Into<String>,
        thousands_sep: impl Into<String>,
    ) -> Self {
        self.decimal_point = decimal_point.into();
        self.thousands_sep = thousands_sep.into();
        self
    }

    pub fn with_dash(mut self, dash: impl Into<String>) -> Self {
        self.dash = Some(dash.into());
        self
    }

    pub fn format(&self, value: Decimal) -> String {
        let value = match self.precision {
            Some(places) => quantize(value, places),
            None => value,
        };
        if !self.localized {
            return value.to_string();
        }

        let value = match self.fraction_digits {
            Some(places) => quantize(value, places),
            None => value.normalize(),
        };
        let digits = value.abs().to_string();
        let (int_part, frac_part) = digits.split_once('.').unwrap_or((digits.as_str(), ""));

        let mut out = String::with_capacity(digits.len() + 8);
        if value.is_sign_negative() && !value.is_zero() {
            out.push('-');
        }
        out.push_str(&self.group(int_part));
        match &self.dash {
            Some(dash) if frac_part.bytes().all(|b| b == b'0') => {
                out.push_str(&self.decimal_point);
                out.push_str(dash);
            }
            _ if !frac_part.is_empty() => {
                out.push_str(&self.decimal_point);
                out.push_str(frac_part);
            }
            _ => {}
        }
        out
    }

    fn group(&self, int_part: &str) -> String {
        if self.grouping == 0 || int_part.len() <= self.grouping {
            return int_part.to_string();
        }
        let mut out = String::with_capacity(int_part.len() * 2);
        let lead = int_part.len() % self.grouping;
        for (i, c) in int_part.chars().enumerate() {
            if i > 0 && (i + self.grouping - lead) % self.grouping == 0 {
                out.push_str(&self.thousands_sep);
            }
            out.push(c);
        }
        out
    }
}

/// Round half-even to `places` and pad to exactly that scale.
fn quantize(value: Decimal, places: u32) -> Decimal {
    let mut value = value.round_dp_with_strategy(places, RoundingStrategy::MidpointNearestEven);
    if value.scale() < places {
        value.rescale(places);
    }
    value
}

/// Formats used for an invoice's currency and quantity values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FormatConfig {
    pub currency: NumberFormat,
    pub quantity: NumberFormat,
}

impl Default for FormatConfig {
    fn default() -> Self {
        Self {
            currency: NumberFormat::currency(),
            quantity: NumberFormat::quantity(),
        }
    }
}

impl FormatConfig {
    pub fn with_currency(mut self, format: NumberFormat) -> Self {
        self.currency = format;
        self
    }

    pub fn with_quantity(mut self, format: NumberFormat) -> Self {
        self.quantity = format;
        self
    }
}
