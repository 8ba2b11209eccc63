//! Rendering of per-iteration statistics
//!
//! JSON is the machine format consumed downstream. Text and CSV add the
//! derived quantities used when comparing runs: overhead, average cost of a
//! result per layer, the share of each result type served by reweighting,
//! and cumulative time.

use crate::error::Result;
use crate::interval::Layer;
use crate::time_attribution::IterationStatistics;
use clap::ValueEnum;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Write as _;

/// Output format for the statistics report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// Array of per-iteration statistics (default)
    #[default]
    Json,
    /// Human-readable aligned table
    Text,
    /// CSV for spreadsheet analysis
    Csv,
}

/// Quantities derived from one iteration's statistics
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IterationSummary {
    pub iteration: usize,

    /// Time not attributed to any layer (seconds)
    pub overhead_time: f64,

    /// Attributed time divided by the number of results, per layer
    pub average_time_per_result: BTreeMap<Layer, f64>,

    /// Percentage of each result type estimated by reweighting
    pub reweighted_percentage: BTreeMap<String, f64>,

    /// Total time of this and all earlier iterations (seconds)
    pub cumulative_time: f64,
}

fn reweighted_percentage(stats: &IterationStatistics) -> BTreeMap<String, f64> {
    let result_types: BTreeSet<&String> = stats
        .approach_counts_per_property
        .values()
        .flat_map(|counts| counts.keys())
        .collect();

    result_types
        .into_iter()
        .map(|result_type| {
            let reweighted = stats.count_for_type(Layer::ReweightingLayer, result_type);
            let total: usize = Layer::ALL
                .iter()
                .map(|layer| stats.count_for_type(*layer, result_type))
                .sum();
            let percentage = if total == 0 {
                0.0
            } else {
                100.0 * reweighted as f64 / total as f64
            };
            (result_type.clone(), percentage)
        })
        .collect()
}

/// Derive the summary quantities for every iteration
pub fn summarize(stats: &[IterationStatistics]) -> Vec<IterationSummary> {
    let mut cumulative_time = 0.0;
    stats
        .iter()
        .enumerate()
        .map(|(iteration, stats)| {
            cumulative_time += stats.total_time;
            IterationSummary {
                iteration,
                overhead_time: stats.total_time - stats.attributed_time(),
                average_time_per_result: Layer::ALL
                    .iter()
                    .map(|layer| {
                        let count = stats.count(*layer).max(1);
                        (*layer, stats.time(*layer) / count as f64)
                    })
                    .collect(),
                reweighted_percentage: reweighted_percentage(stats),
                cumulative_time,
            }
        })
        .collect()
}

/// Render statistics in the requested format
pub fn render(stats: &[IterationStatistics], format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Json => {
            let mut json = serde_json::to_string_pretty(stats)?;
            json.push('\n');
            Ok(json)
        }
        OutputFormat::Text => Ok(render_text(stats)),
        OutputFormat::Csv => Ok(render_csv(stats)),
    }
}

fn render_text(stats: &[IterationStatistics]) -> String {
    let summaries = summarize(stats);
    let mut out = String::new();

    let _ = write!(out, "{:>5}", "iter");
    for layer in Layer::ALL {
        let _ = write!(
            out,
            " {:>20} {:>12} {:>12}",
            format!("{} results", layer),
            "time (s)",
            "s/result"
        );
    }
    let _ = writeln!(out, " {:>12} {:>12} {:>14}", "overhead (s)", "total (s)", "cumulative (s)");

    for (stats, summary) in stats.iter().zip(&summaries) {
        let _ = write!(out, "{:>5}", summary.iteration);
        for layer in Layer::ALL {
            let _ = write!(
                out,
                " {:>20} {:>12.1} {:>12.1}",
                stats.count(layer),
                stats.time(layer),
                summary.average_time_per_result[&layer]
            );
        }
        let _ = writeln!(
            out,
            " {:>12.1} {:>12.1} {:>14.1}",
            summary.overhead_time, stats.total_time, summary.cumulative_time
        );
    }

    let reweighting: Vec<&IterationSummary> = summaries
        .iter()
        .filter(|summary| !summary.reweighted_percentage.is_empty())
        .collect();
    if !reweighting.is_empty() {
        let _ = writeln!(out, "\nreweighted results by type:");
        for summary in reweighting {
            let shares: Vec<String> = summary
                .reweighted_percentage
                .iter()
                .map(|(result_type, pct)| format!("{} {:.1}%", result_type, pct))
                .collect();
            let _ = writeln!(out, "{:>5}  {}", summary.iteration, shares.join(", "));
        }
    }

    out
}

fn render_csv(stats: &[IterationStatistics]) -> String {
    let summaries = summarize(stats);
    let mut header = vec!["iteration".to_string()];
    for layer in Layer::ALL {
        header.push(format!("{}_count", layer));
        header.push(format!("{}_time", layer));
        header.push(format!("{}_time_per_result", layer));
    }
    header.extend(
        ["unused_time", "total_time", "cumulative_time"]
            .iter()
            .map(|s| s.to_string()),
    );

    let mut out = header.join(",");
    out.push('\n');

    for (stats, summary) in stats.iter().zip(&summaries) {
        let mut fields = vec![summary.iteration.to_string()];
        for layer in Layer::ALL {
            fields.push(stats.count(layer).to_string());
            fields.push(format!("{:.3}", stats.time(layer)));
            fields.push(format!("{:.3}", summary.average_time_per_result[&layer]));
        }
        fields.push(format!("{:.3}", stats.unused_time));
        fields.push(format!("{:.3}", stats.total_time));
        fields.push(format!("{:.3}", summary.cumulative_time));
        out.push_str(&fields.join(","));
        out.push('\n');
    }

    out
}
