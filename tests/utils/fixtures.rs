//! In-memory employment provider and seeded synthetic inputs

use std::fmt::Write as _;
use std::path::Path;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rustc_hash::FxHashMap;

use daioe_explorer::employment::{EmploymentProvider, EmploymentTable, FetchFuture, YearSelection};
use daioe_explorer::{DaioeError, Level, OccupationCode, Result, Taxonomy};

/// Provider serving fixed tables; taxonomies marked as failing report a
/// data source error.
#[derive(Debug, Clone, Default)]
pub struct InMemoryProvider {
    tables: FxHashMap<Taxonomy, EmploymentTable>,
    failing: Vec<Taxonomy>,
}

impl InMemoryProvider {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_table(mut self, table: EmploymentTable) -> Self {
        self.tables.insert(table.taxonomy(), table);
        self
    }

    #[must_use]
    pub fn failing(mut self, taxonomy: Taxonomy) -> Self {
        self.failing.push(taxonomy);
        self
    }

    fn load(&self, taxonomy: Taxonomy, years: &YearSelection) -> Result<EmploymentTable> {
        if self.failing.contains(&taxonomy) {
            return Err(DaioeError::data_source(format!("{taxonomy} provider unavailable")));
        }
        let mut table = self
            .tables
            .get(&taxonomy)
            .cloned()
            .ok_or_else(|| DaioeError::data_source(format!("no employment for {taxonomy}")))?;
        let selected = years.select(&table.years());
        if selected.is_empty() {
            return Err(DaioeError::data_source(format!("no requested employment years for {taxonomy}")));
        }
        table.retain_years(&selected);
        Ok(table)
    }
}

impl EmploymentProvider for InMemoryProvider {
    fn name(&self) -> &str {
        "in-memory"
    }

    fn fetch<'a>(&'a self, taxonomy: Taxonomy, years: &'a YearSelection) -> FetchFuture<'a> {
        Box::pin(async move { self.load(taxonomy, years) })
    }
}

/// Seeded generator of raw score files and employment tables
#[derive(Debug)]
pub struct SyntheticData {
    pub taxonomy: Taxonomy,
    pub leaves: Vec<OccupationCode>,
    pub years: Vec<i32>,
    pub metrics: Vec<String>,
    /// Share of score cells written as `NA`
    pub null_rate: f64,
    rng: StdRng,
}

impl SyntheticData {
    /// Pick up to `leaves` distinct 4-digit codes spread over a few groups
    pub fn new(taxonomy: Taxonomy, seed: u64, leaves: usize, years: Vec<i32>, metrics: &[&str]) -> Result<Self> {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut pool = Vec::new();
        for a in 1..=3 {
            for b in 1..=2 {
                for c in 1..=2 {
                    for d in 1..=3 {
                        pool.push(OccupationCode::parse(&format!("{a}{b}{c}{d}"))?);
                    }
                }
            }
        }
        pool.shuffle(&mut rng);
        pool.truncate(leaves);
        pool.sort();

        Ok(Self {
            taxonomy,
            leaves: pool,
            years,
            metrics: metrics.iter().map(|m| (*m).to_string()).collect(),
            null_rate: 0.1,
            rng,
        })
    }

    /// Tab-separated raw file content with a leading unnamed index column
    pub fn raw_file_content(&mut self) -> Result<String> {
        let mut out = String::from("\tyear");
        for level in Level::ALL {
            let _ = write!(out, "\t{}", self.taxonomy.level_column(level));
        }
        for metric in &self.metrics {
            let _ = write!(out, "\tdaioe_{metric}");
        }
        out.push('\n');

        let mut index = 0;
        for &year in &self.years {
            for leaf in &self.leaves {
                let _ = write!(out, "{index}\t{year}");
                index += 1;
                for level in Level::ALL {
                    let code = leaf
                        .truncate(level)
                        .ok_or_else(|| DaioeError::aggregation_data(format!("code {leaf}"), "cannot truncate"))?;
                    let _ = write!(out, "\t{code} Group {code}");
                }
                for _ in &self.metrics {
                    if self.rng.random_bool(self.null_rate) {
                        out.push_str("\tNA");
                    } else {
                        let score: f64 = self.rng.random_range(0.0..100.0);
                        let _ = write!(out, "\t{score:.4}");
                    }
                }
                out.push('\n');
            }
        }
        Ok(out)
    }

    /// Write the raw file under `raw_dir` with the taxonomy's file name
    pub fn write_raw_file(&mut self, raw_dir: &Path) -> Result<()> {
        let content = self.raw_file_content()?;
        std::fs::create_dir_all(raw_dir)
            .map_err(|e| DaioeError::io("Failed to create raw directory", e).with_path(raw_dir))?;
        let path = raw_dir.join(self.taxonomy.raw_file_name());
        std::fs::write(&path, content).map_err(|e| DaioeError::io("Failed to write raw file", e).with_path(&path))
    }

    /// Employment for every leaf in `year`; about one in twenty is unreported
    pub fn employment(&mut self, year: i32) -> Result<EmploymentTable> {
        let mut table = EmploymentTable::new(self.taxonomy);
        for leaf in &self.leaves {
            let count = (!self.rng.random_bool(0.05)).then(|| self.rng.random_range(10..5_000));
            table.insert(leaf.clone(), year, count)?;
        }
        Ok(table)
    }
}

#[test]
fn test_same_seed_same_data() {
    let mut a = SyntheticData::new(Taxonomy::Ssyk96, 7, 10, vec![2020], &["genai"]).unwrap();
    let mut b = SyntheticData::new(Taxonomy::Ssyk96, 7, 10, vec![2020], &["genai"]).unwrap();
    assert_eq!(a.leaves, b.leaves);
    assert_eq!(a.raw_file_content().unwrap(), b.raw_file_content().unwrap());
    assert_eq!(a.leaves.len(), 10);
}
