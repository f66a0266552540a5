//! Command line interface of the `daioe` binary

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use log::{info, warn};

use crate::aggregate::Weighting;
use crate::artifact::{export_csv, load_table};
use crate::config::PipelineConfig;
use crate::employment::{ScbClient, SnapshotProvider};
use crate::pipeline::Pipeline;
use crate::query::{QueryParams, run_query};
use crate::taxonomy::{Level, Taxonomy};
use crate::utils::logging::console::{print_pull_summary, print_query_outcome, print_refresh_summary};
use crate::utils::logging::{create_spinner, finish_progress_bar};

/// Aggregate DAIOE AI-exposure scores over the SSYK hierarchy
#[derive(Parser, Debug)]
#[command(name = "daioe")]
#[command(version)]
pub struct Cli {
    /// JSON configuration file
    #[arg(long, global = true, env = "DAIOE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Root of the data directory tree
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    /// Worker threads for aggregation
    #[arg(long, global = true)]
    pub threads: Option<usize>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Pull employment (or reuse the last snapshot), aggregate and write artifacts
    Refresh {
        #[command(flatten)]
        taxonomies: TaxonomyArgs,

        /// Use the last employment snapshot instead of calling SCB
        #[arg(long)]
        offline: bool,
    },
    /// Fetch employment from SCB and write snapshots only
    Pull {
        #[command(flatten)]
        taxonomies: TaxonomyArgs,
    },
    /// Print a filtered series from an aggregated table
    Query(QueryArgs),
    /// Export an aggregated table as CSV
    Export {
        #[arg(long, short)]
        taxonomy: Taxonomy,

        /// Destination CSV file
        #[arg(long, short)]
        output: PathBuf,
    },
}

#[derive(Args, Debug)]
pub struct TaxonomyArgs {
    /// Taxonomy to process; repeat for several, defaults to all
    #[arg(long = "taxonomy", short = 't')]
    pub taxonomies: Vec<Taxonomy>,
}

impl TaxonomyArgs {
    /// Selected taxonomies without repeats, all when none were given
    #[must_use]
    pub fn selected(&self) -> Vec<Taxonomy> {
        if self.taxonomies.is_empty() {
            return Taxonomy::ALL.to_vec();
        }
        let mut selected = Vec::new();
        for taxonomy in &self.taxonomies {
            if !selected.contains(taxonomy) {
                selected.push(*taxonomy);
            }
        }
        selected
    }
}

#[derive(Args, Debug)]
pub struct QueryArgs {
    #[arg(long, short)]
    pub taxonomy: Taxonomy,

    /// Aggregation level (1-4)
    #[arg(long, short, default_value = "4")]
    pub level: Level,

    /// Metric name, with or without the `daioe_` prefix
    #[arg(long, short)]
    pub metric: String,

    #[arg(long, short, default_value = "emp_weighted")]
    pub weighting: Weighting,

    /// First year to show
    #[arg(long)]
    pub from: Option<i32>,

    /// Last year to show
    #[arg(long)]
    pub to: Option<i32>,

    /// Number of occupations to show, 0 for all
    #[arg(long, default_value_t = 10)]
    pub top: usize,

    /// Show the highest values first
    #[arg(long)]
    pub desc: bool,

    /// Case-insensitive label search
    #[arg(long, short)]
    pub search: Option<String>,
}

impl QueryArgs {
    #[must_use]
    pub fn to_params(&self) -> QueryParams {
        let metric = self.metric.trim_start_matches(crate::daioe::METRIC_PREFIX);
        let mut params = QueryParams::new(self.taxonomy, self.level, metric, self.weighting);
        params.years = match (self.from, self.to) {
            (None, None) => None,
            (from, to) => Some((from.unwrap_or(i32::MIN), to.unwrap_or(i32::MAX))),
        };
        params.top_n = self.top;
        params.descending = self.desc;
        params.search = self.search.clone();
        params
    }
}

impl Cli {
    /// Configuration file, then environment, then flags
    pub fn resolve_config(&self) -> Result<PipelineConfig> {
        let config = match &self.config {
            Some(path) => PipelineConfig::from_json_file(path)
                .with_context(|| format!("loading configuration {}", path.display()))?,
            None => PipelineConfig::default(),
        };
        let mut config = config.with_env_overrides();
        if let Some(dir) = &self.data_dir {
            config.data_dir.clone_from(dir);
        }
        if let Some(threads) = self.threads {
            config.threads = Some(threads);
        }
        config.validate()?;
        Ok(config)
    }
}

fn init_thread_pool(config: &PipelineConfig) {
    let threads = config.effective_threads();
    match rayon::ThreadPoolBuilder::new().num_threads(threads).build_global() {
        Ok(()) => info!("Using {threads} aggregation threads"),
        Err(e) => warn!("Could not size the aggregation thread pool: {e}"),
    }
}

/// Run a parsed command line; returns whether every step succeeded.
pub async fn run(cli: Cli) -> Result<bool> {
    let config = cli.resolve_config()?;

    match &cli.command {
        Command::Refresh { taxonomies, offline } => {
            init_thread_pool(&config);
            let pipeline = Pipeline::new(config.clone())?;
            let selected = taxonomies.selected();
            let summaries = if *offline {
                let provider = SnapshotProvider::new(config.scb_dir()).with_language(config.language.as_str());
                pipeline.refresh(&provider, &selected, false).await
            } else {
                let provider = ScbClient::new(&config).context("creating SCB client")?;
                pipeline.refresh(&provider, &selected, true).await
            };
            print_refresh_summary(&summaries);
            Ok(summaries.iter().all(|s| s.is_success()))
        }
        Command::Pull { taxonomies } => {
            let pipeline = Pipeline::new(config.clone())?;
            let provider = ScbClient::new(&config).context("creating SCB client")?;
            let spinner = create_spinner(Some("Pulling employment from SCB"));
            let summaries = pipeline.pull(&provider, &taxonomies.selected()).await;
            finish_progress_bar(&spinner, Some("Pull complete"));
            print_pull_summary(&summaries);
            Ok(summaries.iter().all(|s| s.result.is_ok()))
        }
        Command::Query(args) => {
            let outcome = run_query(&config.aggregated_dir(), &args.to_params())
                .with_context(|| format!("querying {}", args.taxonomy))?;
            print_query_outcome(&outcome);
            Ok(true)
        }
        Command::Export { taxonomy, output } => {
            let Some(table) = load_table(&config.aggregated_dir(), *taxonomy)? else {
                println!("No aggregated data yet for {taxonomy}. Run `daioe refresh` first.");
                return Ok(false);
            };
            export_csv(&table, output).with_context(|| format!("exporting {taxonomy}"))?;
            println!("Exported {} records to {}", table.len(), output.display());
            Ok(true)
        }
    }
}
