//! Geographic codes, the state code table, and region filtering.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Region filter sets derived from state abbreviations.
pub mod filter;
/// Static state abbreviation to IBGE prefix table.
pub mod table;

pub use filter::RegionFilterSet;
pub use table::{state_abbreviation, state_abbreviations, state_prefix};

/// Canonical municipality or region identifier: a non-empty ASCII digit string.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct GeographicCode(String);

impl GeographicCode {
    /// Validate and canonicalize a textual code.
    ///
    /// Surrounding whitespace and a trailing `.0`/`.00…` float artifact are
    /// removed first. Returns `None` for anything that is not all digits.
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = strip_float_artifact(raw.trim());
        if trimmed.is_empty() || !trimmed.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        Some(Self(trimmed.to_string()))
    }

    /// Borrow the digit string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The six-digit form used by DATASUS registries.
    ///
    /// IBGE publishes seven-digit codes whose last digit is a check digit;
    /// those are truncated. Shorter codes are returned unchanged.
    pub fn six_digit(&self) -> GeographicCode {
        if self.0.len() == 7 {
            GeographicCode(self.0[..6].to_string())
        } else {
            self.clone()
        }
    }
}

impl fmt::Display for GeographicCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for GeographicCode {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        GeographicCode::parse(&value).ok_or_else(|| format!("invalid geographic code '{value}'"))
    }
}

impl From<GeographicCode> for String {
    fn from(value: GeographicCode) -> Self {
        value.0
    }
}

/// Strip a trailing `.` followed only by zeros (`"260010.0"`, `"12.000"`).
pub(crate) fn strip_float_artifact(value: &str) -> &str {
    match value.split_once('.') {
        Some((whole, fraction)) if !fraction.is_empty() && fraction.bytes().all(|b| b == b'0') => {
            whole
        }
        _ => value,
    }
}
