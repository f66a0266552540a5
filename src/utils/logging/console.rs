//! Console output utilities
//!
//! Plain-text rendering of query results and run summaries for the command
//! line. Logs go through `log`; these functions write the user-facing report
//! to stdout.

use std::fmt::Write as _;

use crate::pipeline::{PullSummary, RefreshStatus, RefreshSummary};
use crate::query::{QueryOutcome, QueryResult};

/// Width of the label column in query tables
const LABEL_WIDTH: usize = 40;

fn truncate_label(label: &str) -> String {
    if label.chars().count() <= LABEL_WIDTH {
        return label.to_string();
    }
    let mut short: String = label.chars().take(LABEL_WIDTH - 1).collect();
    short.push('…');
    short
}

/// Render a query result as a code × year table
#[must_use]
pub fn render_query_result(result: &QueryResult) -> String {
    let years = result.years();
    let params = &result.params;
    let mut out = String::new();

    let _ = writeln!(
        out,
        "{} level {} | {} ({}) | latest year {}",
        params.taxonomy.label(),
        params.level,
        params.metric,
        params.weighting,
        result.latest_year
    );

    let _ = write!(out, "{:<6} {:<width$}", "code", "label", width = LABEL_WIDTH);
    for year in &years {
        let _ = write!(out, " {year:>8}");
    }
    out.push('\n');

    for series in &result.series {
        let _ = write!(
            out,
            "{:<6} {:<width$}",
            series.code.as_str(),
            truncate_label(&series.label),
            width = LABEL_WIDTH
        );
        for &year in &years {
            match series.value_in(year) {
                Some(value) => {
                    let _ = write!(out, " {value:>8.3}");
                }
                None => {
                    let _ = write!(out, " {:>8}", "-");
                }
            }
        }
        out.push('\n');
    }
    out
}

/// Render a query outcome, including its "no data" states
#[must_use]
pub fn render_query_outcome(outcome: &QueryOutcome) -> String {
    match outcome {
        QueryOutcome::NoArtifact => {
            "No aggregated data yet for this taxonomy. Run `daioe refresh` first.\n".to_string()
        }
        QueryOutcome::NoMatchingRows => "No data matches the selected filters.\n".to_string(),
        QueryOutcome::Series(result) => render_query_result(result),
    }
}

/// Print a query outcome to stdout
pub fn print_query_outcome(outcome: &QueryOutcome) {
    print!("{}", render_query_outcome(outcome));
}

/// Print one line per refreshed taxonomy
pub fn print_refresh_summary(summaries: &[RefreshSummary]) {
    println!("Refresh summary:");
    for summary in summaries {
        match &summary.status {
            RefreshStatus::Written {
                path,
                records,
                non_null,
            } => println!(
                "  {}: wrote {records} records ({non_null} with values) to {}",
                summary.taxonomy,
                path.display()
            ),
            RefreshStatus::KeptPrevious { error, artifact } => match artifact {
                Some(path) => println!(
                    "  {}: {error}; kept previous artifact {}",
                    summary.taxonomy,
                    path.display()
                ),
                None => println!("  {}: {error}; no previous artifact", summary.taxonomy),
            },
            RefreshStatus::Failed(error) => println!("  {}: failed: {error}", summary.taxonomy),
        }
        if let Some(snapshot) = &summary.snapshot {
            println!("    employment snapshot: {}", snapshot.display());
        }
    }
}

/// Print one line per pulled taxonomy
pub fn print_pull_summary(summaries: &[PullSummary]) {
    println!("Pull summary:");
    for summary in summaries {
        match &summary.result {
            Ok(path) => println!("  {}: wrote {}", summary.taxonomy, path.display()),
            Err(error) => println!("  {}: failed: {error}", summary.taxonomy),
        }
    }
}
