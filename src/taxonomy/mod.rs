//! SSYK taxonomy model
//!
//! Taxonomy versions, aggregation levels, occupation codes and the hierarchy
//! that rolls every 4-digit occupation up to its 3-, 2- and 1-digit groups.

mod code;
mod hierarchy;

pub use code::OccupationCode;
pub use hierarchy::{Lineage, TaxonomyMap, TaxonomyMapBuilder};

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{DaioeError, Result};

/// A version of the Swedish occupational classification.
///
/// The two versions have different code sets and are never converted into
/// one another.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Taxonomy {
    /// SSYK 2012
    Ssyk2012,
    /// SSYK 1996
    Ssyk96,
}

/// Location of an SCB PxWeb table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScbTable {
    /// Subject path below the database root
    pub path: &'static [&'static str],
    /// Table identifier
    pub table: &'static str,
}

impl Taxonomy {
    /// Every supported taxonomy, in refresh order
    pub const ALL: [Self; 2] = [Self::Ssyk2012, Self::Ssyk96];

    /// Canonical identifier used in file names and artifacts
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ssyk2012 => "ssyk2012",
            Self::Ssyk96 => "ssyk96",
        }
    }

    /// Human readable name
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Ssyk2012 => "SSYK 2012",
            Self::Ssyk96 => "SSYK 1996",
        }
    }

    /// SCB table publishing employment counts for this taxonomy
    #[must_use]
    pub const fn scb_table(self) -> ScbTable {
        const PATH: &[&str] = &["AM", "AM0208", "AM0208E"];
        match self {
            Self::Ssyk2012 => ScbTable {
                path: PATH,
                table: "YREG51BAS",
            },
            Self::Ssyk96 => ScbTable {
                path: PATH,
                table: "YREG33",
            },
        }
    }

    /// File name of the raw DAIOE scores for this taxonomy
    #[must_use]
    pub fn raw_file_name(self) -> String {
        format!("daioe_{}.csv", self.as_str())
    }

    /// Column holding `"<code> <label>"` at the given level in the raw file
    #[must_use]
    pub fn level_column(self, level: Level) -> String {
        format!("{}_{}", self.as_str(), level.digits())
    }
}

impl fmt::Display for Taxonomy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Taxonomy {
    type Err = DaioeError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ssyk2012" | "ssyk12" | "ssyk_2012" => Ok(Self::Ssyk2012),
            "ssyk96" | "ssyk1996" | "ssyk_96" => Ok(Self::Ssyk96),
            _ => Err(DaioeError::UnknownTaxonomy(s.to_string())),
        }
    }
}

impl TryFrom<String> for Taxonomy {
    type Error = DaioeError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<Taxonomy> for String {
    fn from(value: Taxonomy) -> Self {
        value.as_str().to_string()
    }
}

/// Aggregation level: the digit-length of a code grouping
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Level {
    One,
    Two,
    Three,
    /// Finest level; aggregation is the identity here
    Four,
}

impl Level {
    /// All levels, coarsest first
    pub const ALL: [Self; 4] = [Self::One, Self::Two, Self::Three, Self::Four];

    #[must_use]
    pub const fn digits(self) -> usize {
        match self {
            Self::One => 1,
            Self::Two => 2,
            Self::Three => 3,
            Self::Four => 4,
        }
    }

    /// The next finer level, `None` at level 4
    #[must_use]
    pub const fn finer(self) -> Option<Self> {
        match self {
            Self::One => Some(Self::Two),
            Self::Two => Some(Self::Three),
            Self::Three => Some(Self::Four),
            Self::Four => None,
        }
    }

    /// Level for a code of `digits` characters
    pub fn from_digits(digits: usize) -> Result<Self> {
        match digits {
            1 => Ok(Self::One),
            2 => Ok(Self::Two),
            3 => Ok(Self::Three),
            4 => Ok(Self::Four),
            other => Err(DaioeError::Config(format!(
                "level must be between 1 and 4, got {other}"
            ))),
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.digits())
    }
}

impl TryFrom<u8> for Level {
    type Error = DaioeError;

    fn try_from(value: u8) -> Result<Self> {
        Self::from_digits(usize::from(value))
    }
}

impl From<Level> for u8 {
    fn from(value: Level) -> Self {
        // digits() is at most 4
        value.digits() as Self
    }
}

impl FromStr for Level {
    type Err = DaioeError;

    fn from_str(s: &str) -> Result<Self> {
        let digits: usize = s
            .trim()
            .parse()
            .map_err(|_| DaioeError::Config(format!("invalid level '{s}'")))?;
        Self::from_digits(digits)
    }
}
