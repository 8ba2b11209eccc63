// Consolidated batch intervals per iteration and layer

use crate::interval::{Layer, TimeInterval};
use std::collections::BTreeMap;

/// Padded batch intervals of one iteration, keyed by layer then batch id
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IterationBatches {
    layers: BTreeMap<Layer, BTreeMap<String, TimeInterval>>,
}

impl IterationBatches {
    pub(crate) fn insert(&mut self, layer: Layer, batch_id: String, interval: TimeInterval) {
        self.layers.entry(layer).or_default().insert(batch_id, interval);
    }

    /// Padded interval of a batch run by `layer`
    pub fn get(&self, layer: Layer, batch_id: &str) -> Option<&TimeInterval> {
        self.layers.get(&layer).and_then(|batches| batches.get(batch_id))
    }

    /// Layers that ran at least one batch this iteration
    pub fn layers(&self) -> impl Iterator<Item = Layer> + '_ {
        self.layers.keys().copied()
    }

    /// All `(layer, batch id, interval)` triples
    pub fn iter(&self) -> impl Iterator<Item = (Layer, &str, &TimeInterval)> {
        self.layers.iter().flat_map(|(layer, batches)| {
            batches
                .iter()
                .map(move |(id, interval)| (*layer, id.as_str(), interval))
        })
    }

    pub fn batch_count(&self) -> usize {
        self.layers.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.batch_count() == 0
    }

    /// Earliest batch start to latest batch end, `None` when no batch ran
    pub fn span(&self) -> Option<TimeInterval> {
        let start = self.iter().map(|(_, _, i)| i.start()).min()?;
        let end = self.iter().map(|(_, _, i)| i.end()).max()?;
        TimeInterval::new(start, end).ok()
    }
}

/// Batch intervals for every iteration of a run, indexed by iteration
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchTimings {
    iterations: Vec<IterationBatches>,
}

impl BatchTimings {
    pub(crate) fn from_iterations(iterations: Vec<IterationBatches>) -> Self {
        Self { iterations }
    }

    /// Number of estimation requests seen in the driver log
    pub fn iteration_count(&self) -> usize {
        self.iterations.len()
    }

    pub fn iteration(&self, iteration: usize) -> Option<&IterationBatches> {
        self.iterations.get(iteration)
    }

    pub fn iter(&self) -> impl Iterator<Item = &IterationBatches> {
        self.iterations.iter()
    }
}
