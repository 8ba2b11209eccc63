// Per-iteration statistics emitted by the attribution engine

use crate::interval::Layer;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Counts and attributed time for one iteration
///
/// Serializes to the object consumed by downstream reporting: counts and
/// times are keyed by layer name, times are in seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IterationStatistics {
    /// Number of properties estimated by each layer
    pub approach_counts: BTreeMap<Layer, usize>,

    /// Number of properties per layer, broken out by result type
    pub approach_counts_per_property: BTreeMap<Layer, BTreeMap<String, usize>>,

    /// Protocol time attributed to each layer (seconds)
    pub time_per_approach: BTreeMap<Layer, f64>,

    /// Protocol time inside the iteration that backs no reported property (seconds)
    #[serde(default)]
    pub unused_time: f64,

    /// `unused_time` plus all attributed time (seconds)
    pub total_time: f64,
}

impl Default for IterationStatistics {
    fn default() -> Self {
        Self {
            approach_counts: Layer::ALL.iter().map(|layer| (*layer, 0)).collect(),
            approach_counts_per_property: Layer::ALL
                .iter()
                .map(|layer| (*layer, BTreeMap::new()))
                .collect(),
            time_per_approach: Layer::ALL.iter().map(|layer| (*layer, 0.0)).collect(),
            unused_time: 0.0,
            total_time: 0.0,
        }
    }
}

impl IterationStatistics {
    /// Tally one estimated property
    pub fn record_property(&mut self, layer: Layer, result_type: &str) {
        *self.approach_counts.entry(layer).or_default() += 1;
        *self
            .approach_counts_per_property
            .entry(layer)
            .or_default()
            .entry(result_type.to_string())
            .or_default() += 1;
    }

    pub fn add_time(&mut self, layer: Layer, seconds: f64) {
        *self.time_per_approach.entry(layer).or_default() += seconds;
    }

    /// Sum of time attributed to any layer
    pub fn attributed_time(&self) -> f64 {
        self.time_per_approach.values().fold(0.0, |total, secs| total + secs)
    }

    /// Set the unused time and derive the total from it
    pub fn finalize(&mut self, unused_time: f64) {
        self.unused_time = unused_time;
        self.total_time = unused_time + self.attributed_time();
    }

    pub fn count(&self, layer: Layer) -> usize {
        self.approach_counts.get(&layer).copied().unwrap_or(0)
    }

    pub fn time(&self, layer: Layer) -> f64 {
        self.time_per_approach.get(&layer).copied().unwrap_or(0.0)
    }

    pub fn count_for_type(&self, layer: Layer, result_type: &str) -> usize {
        self.approach_counts_per_property
            .get(&layer)
            .and_then(|counts| counts.get(result_type))
            .copied()
            .unwrap_or(0)
    }
}

impl fmt::Display for IterationStatistics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for layer in Layer::ALL {
            write!(
                f,
                "{}: {} properties, {:.1}s; ",
                layer,
                self.count(layer),
                self.time(layer)
            )?;
        }
        write!(
            f,
            "unused {:.1}s, total {:.1}s",
            self.unused_time, self.total_time
        )
    }
}
