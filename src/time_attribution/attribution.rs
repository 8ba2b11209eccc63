// Matching of protocol executions to the batches that produced results
//
// Key insight: a property's provenance names its protocols and, through its
// input paths, its batch. Only executions of those protocols that fall
// inside that batch's (padded) interval are charged to the property's layer.

use super::statistics::IterationStatistics;
use crate::batch_timing::BatchTimings;
use crate::config::TimingConfig;
use crate::error::{Result, TimingError};
use crate::interval::Layer;
use crate::protocol_timing::ProtocolTimings;
use crate::provenance::{extract_batch_id, RequestResult};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info};

/// Protocol ids referenced by the properties of one `(layer, batch id)` group
type BatchProtocols = BTreeMap<(Layer, String), BTreeSet<String>>;

/// Stateful attribution over the iterations of one run
///
/// Owns the protocol table: matched executions are removed from it, so an
/// execution is charged to at most one batch across the whole run.
#[derive(Debug)]
pub struct TimeAttributionEngine<'a> {
    batches: &'a BatchTimings,
    protocols: ProtocolTimings,
    config: &'a TimingConfig,
}

impl<'a> TimeAttributionEngine<'a> {
    pub fn new(
        batches: &'a BatchTimings,
        protocols: ProtocolTimings,
        config: &'a TimingConfig,
    ) -> Self {
        Self {
            batches,
            protocols,
            config,
        }
    }

    /// Executions not yet charged to any batch
    pub fn remaining_protocols(&self) -> &ProtocolTimings {
        &self.protocols
    }

    fn group_by_batch(
        &self,
        result: &RequestResult,
        stats: &mut IterationStatistics,
    ) -> Result<BatchProtocols> {
        let mut groups = BatchProtocols::new();

        for property in result.properties() {
            let layer = property.fidelity()?;
            stats.record_property(layer, property.result_type());

            let schemas = property.provenance()?.protocol_schemas;
            let batch_id = extract_batch_id(layer, &schemas, self.config)?;

            groups
                .entry((layer, batch_id))
                .or_default()
                .extend(schemas.into_iter().map(|schema| schema.id));
        }

        Ok(groups)
    }

    /// Attribute protocol time for one iteration
    pub fn attribute_iteration(
        &mut self,
        iteration: usize,
        result: &RequestResult,
    ) -> Result<IterationStatistics> {
        let timings: &'a BatchTimings = self.batches;
        let batches = timings.iteration(iteration).ok_or_else(|| {
            TimingError::consistency(format!(
                "no estimation request logged for iteration {}",
                iteration
            ))
        })?;

        let mut stats = IterationStatistics::default();
        let groups = self.group_by_batch(result, &mut stats)?;

        for ((layer, batch_id), protocol_ids) in &groups {
            let window = batches.get(*layer, batch_id).ok_or_else(|| {
                TimingError::consistency(format!(
                    "iteration {}: results reference {} batch {} which the driver never ran",
                    iteration, layer, batch_id
                ))
            })?;

            let mut batch_time = 0.0;
            let mut matched = 0usize;
            for protocol_id in protocol_ids {
                match self.protocols.take_within(protocol_id, window) {
                    Some(executions) => {
                        matched += executions.len();
                        batch_time = executions
                            .iter()
                            .map(|e| e.duration_secs())
                            .fold(batch_time, |total, secs| total + secs);
                    }
                    None => debug!(
                        iteration,
                        protocol_id = %protocol_id,
                        "protocol absent from every worker log"
                    ),
                }
            }

            debug!(
                iteration,
                %layer,
                batch_id = %batch_id,
                protocols = protocol_ids.len(),
                matched,
                seconds = batch_time,
                "batch attributed"
            );
            stats.add_time(*layer, batch_time);
        }

        let unused = batches
            .span()
            .map_or(0.0, |span| self.protocols.remaining_secs_within(&span));
        stats.finalize(unused);

        info!(iteration, %stats, "iteration attributed");
        Ok(stats)
    }
}

/// Attribute protocol time for every iteration of a run
///
/// `results[i]` holds the properties reported for iteration `i`; there must
/// be exactly one entry per estimation request in the driver log.
pub fn attribute_time(
    batches: &BatchTimings,
    protocols: ProtocolTimings,
    results: &[RequestResult],
    config: &TimingConfig,
) -> Result<Vec<IterationStatistics>> {
    if results.len() != batches.iteration_count() {
        return Err(TimingError::consistency(format!(
            "driver log has {} iterations but {} result sets were supplied",
            batches.iteration_count(),
            results.len()
        )));
    }

    let mut engine = TimeAttributionEngine::new(batches, protocols, config);
    results
        .iter()
        .enumerate()
        .map(|(iteration, result)| engine.attribute_iteration(iteration, result))
        .collect()
}
