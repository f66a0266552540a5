//! Occupation codes

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{DaioeError, Result};
use crate::taxonomy::Level;

/// A 1-4 digit SSYK code, zero-padded to the length of its level.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct OccupationCode(String);

impl OccupationCode {
    /// Parse a code whose digit-length defines its level.
    pub fn parse(raw: &str) -> Result<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed.len() > 4 || !trimmed.bytes().all(|b| b.is_ascii_digit()) {
            return Err(DaioeError::aggregation_data(
                format!("code '{raw}'"),
                "occupation codes must be 1-4 digits",
            ));
        }
        Ok(Self(trimmed.to_string()))
    }

    /// Parse a code known to belong to `level`, restoring leading zeros that
    /// spreadsheet round-trips tend to strip (`"110"` at level 4 is `"0110"`).
    pub fn at_level(raw: &str, level: Level) -> Result<Self> {
        let code = Self::parse(raw)?;
        let digits = level.digits();
        if code.0.len() > digits {
            return Err(DaioeError::aggregation_data(
                format!("code '{raw}'"),
                format!("too long for level {level}"),
            ));
        }
        Ok(Self(format!("{:0>digits$}", code.0)))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Level implied by the digit-length
    #[must_use]
    pub fn level(&self) -> Level {
        match self.0.len() {
            1 => Level::One,
            2 => Level::Two,
            3 => Level::Three,
            _ => Level::Four,
        }
    }

    /// Ancestor by truncation; `None` if `level` is finer than this code.
    #[must_use]
    pub fn truncate(&self, level: Level) -> Option<Self> {
        let digits = level.digits();
        (digits <= self.0.len()).then(|| Self(self.0[..digits].to_string()))
    }
}

impl fmt::Display for OccupationCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for OccupationCode {
    type Error = DaioeError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<OccupationCode> for String {
    fn from(value: OccupationCode) -> Self {
        value.0
    }
}
