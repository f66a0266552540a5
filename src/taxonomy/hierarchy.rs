//! Taxonomy hierarchy: 4-digit occupations and their groups

use std::collections::BTreeMap;

use itertools::Itertools;
use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use crate::error::{DaioeError, Result};
use crate::taxonomy::{Level, OccupationCode, Taxonomy};

/// The chain of group codes above one 4-digit occupation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lineage {
    /// Indexed by `level.digits() - 1`
    codes: [OccupationCode; 4],
}

impl Lineage {
    /// Build a lineage from explicit codes, coarsest first.
    pub fn new(codes: [OccupationCode; 4]) -> Result<Self> {
        for (level, code) in Level::ALL.iter().zip(&codes) {
            if code.level() != *level {
                return Err(DaioeError::aggregation_data(
                    format!("code {code}"),
                    format!("expected a level {level} code"),
                ));
            }
        }
        Ok(Self { codes })
    }

    /// Lineage derived by truncating a 4-digit code
    pub fn from_truncation(leaf: &OccupationCode) -> Result<Self> {
        if leaf.level() != Level::Four {
            return Err(DaioeError::aggregation_data(
                format!("code {leaf}"),
                "only 4-digit codes have a lineage",
            ));
        }
        let group = |level| leaf.truncate(level).unwrap_or_else(|| leaf.clone());
        Ok(Self {
            codes: [
                group(Level::One),
                group(Level::Two),
                group(Level::Three),
                leaf.clone(),
            ],
        })
    }

    #[must_use]
    pub fn leaf(&self) -> &OccupationCode {
        &self.codes[3]
    }

    /// Group code at `level`; the leaf itself at level 4
    #[must_use]
    pub fn group(&self, level: Level) -> &OccupationCode {
        &self.codes[level.digits() - 1]
    }

    /// Groups above the leaf, finest first
    #[must_use]
    pub fn ancestors(&self) -> SmallVec<[&OccupationCode; 3]> {
        self.codes[..3].iter().rev().collect()
    }
}

/// Total mapping from each known 4-digit code to its groups, with labels.
#[derive(Debug, Clone)]
pub struct TaxonomyMap {
    taxonomy: Taxonomy,
    lineages: BTreeMap<OccupationCode, Lineage>,
    /// Group code (levels 1-3) to its 4-digit members
    members: BTreeMap<OccupationCode, Vec<OccupationCode>>,
    /// Codes of different levels never collide since their lengths differ
    labels: FxHashMap<OccupationCode, String>,
}

impl TaxonomyMap {
    #[must_use]
    pub fn builder(taxonomy: Taxonomy) -> TaxonomyMapBuilder {
        TaxonomyMapBuilder::new(taxonomy)
    }

    #[must_use]
    pub const fn taxonomy(&self) -> Taxonomy {
        self.taxonomy
    }

    /// Number of 4-digit occupations
    #[must_use]
    pub fn len(&self) -> usize {
        self.lineages.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lineages.is_empty()
    }

    #[must_use]
    pub fn lineage(&self, leaf: &OccupationCode) -> Option<&Lineage> {
        self.lineages.get(leaf)
    }

    #[must_use]
    pub fn contains(&self, code: &OccupationCode) -> bool {
        self.lineages.contains_key(code) || self.members.contains_key(code)
    }

    /// All 4-digit codes, sorted
    pub fn leaves(&self) -> impl Iterator<Item = &OccupationCode> {
        self.lineages.keys()
    }

    /// Distinct group codes at `level`, sorted
    #[must_use]
    pub fn groups(&self, level: Level) -> Vec<&OccupationCode> {
        if level == Level::Four {
            return self.lineages.keys().collect();
        }
        self.members
            .keys()
            .filter(|code| code.level() == level)
            .collect()
    }

    /// 4-digit members of `group`; a 4-digit code is its own sole member.
    #[must_use]
    pub fn members(&self, group: &OccupationCode) -> &[OccupationCode] {
        if let Some((leaf, _)) = self.lineages.get_key_value(group) {
            return std::slice::from_ref(leaf);
        }
        self.members.get(group).map_or(&[], Vec::as_slice)
    }

    /// Distinct codes one level below `group`
    #[must_use]
    pub fn children_of(&self, group: &OccupationCode) -> Vec<&OccupationCode> {
        let Some(finer) = group.level().finer() else {
            return Vec::new();
        };
        self.members(group)
            .iter()
            .filter_map(|leaf| self.lineages.get(leaf))
            .map(|lineage| lineage.group(finer))
            .unique()
            .collect()
    }

    /// Label for a code at any level, empty if unknown
    #[must_use]
    pub fn label(&self, code: &OccupationCode) -> &str {
        self.labels.get(code).map_or("", String::as_str)
    }

    /// Replace labels for known codes; returns how many were replaced.
    pub fn apply_labels<I>(&mut self, labels: I) -> usize
    where
        I: IntoIterator<Item = (OccupationCode, String)>,
    {
        let mut replaced = 0;
        for (code, label) in labels {
            if self.contains(&code) && !label.trim().is_empty() {
                self.labels.insert(code, label.trim().to_string());
                replaced += 1;
            }
        }
        replaced
    }
}

/// Incremental construction of a [`TaxonomyMap`] from rows carrying the
/// full lineage of one occupation.
#[derive(Debug)]
pub struct TaxonomyMapBuilder {
    taxonomy: Taxonomy,
    lineages: BTreeMap<OccupationCode, Lineage>,
    labels: FxHashMap<OccupationCode, String>,
}

impl TaxonomyMapBuilder {
    #[must_use]
    pub fn new(taxonomy: Taxonomy) -> Self {
        Self {
            taxonomy,
            lineages: BTreeMap::new(),
            labels: FxHashMap::default(),
        }
    }

    /// Record a lineage; repeating an identical lineage is a no-op.
    ///
    /// `labels` are indexed like the lineage (coarsest first). The first
    /// non-empty label seen for a code is kept.
    pub fn insert_lineage(&mut self, lineage: Lineage, labels: [&str; 4]) -> Result<()> {
        if let Some(existing) = self.lineages.get(lineage.leaf()) {
            if existing != &lineage {
                return Err(DaioeError::aggregation_data(
                    format!("{} code {}", self.taxonomy, lineage.leaf()),
                    "occupation is assigned to more than one parent group",
                ));
            }
        }

        // A group code must have the same parent wherever it appears
        for level in [Level::Two, Level::Three] {
            let group = lineage.group(level);
            let clash = self.lineages.values().find(|other| {
                other.group(level) == group && other.codes[..level.digits()] != lineage.codes[..level.digits()]
            });
            if clash.is_some() {
                return Err(DaioeError::aggregation_data(
                    format!("{} code {group}", self.taxonomy),
                    "group is assigned to more than one parent group",
                ));
            }
        }

        for (code, label) in lineage.codes.iter().zip(labels) {
            let label = label.trim();
            if !label.is_empty() {
                self.labels.entry(code.clone()).or_insert_with(|| label.to_string());
            }
        }
        self.lineages.insert(lineage.leaf().clone(), lineage);
        Ok(())
    }

    #[must_use]
    pub fn build(self) -> TaxonomyMap {
        let mut members: BTreeMap<OccupationCode, Vec<OccupationCode>> = BTreeMap::new();
        for lineage in self.lineages.values() {
            for group in lineage.ancestors() {
                members.entry(group.clone()).or_default().push(lineage.leaf().clone());
            }
        }

        TaxonomyMap {
            taxonomy: self.taxonomy,
            lineages: self.lineages,
            members,
            labels: self.labels,
        }
    }
}
