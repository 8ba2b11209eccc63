// Single-pass scan of the driver log into raw launch/finish times

use super::table::{BatchTimings, IterationBatches};
use crate::config::TimingConfig;
use crate::error::{Result, TimingError};
use crate::interval::{Layer, TimeInterval};
use crate::log_events::{driver_events, DriverEvent, DriverEventKind};
use crate::timestamp::{parse_started_at, DriverClock};
use chrono::{Duration, NaiveDateTime};
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Launch or finish times of one iteration, keyed by layer then batch id
pub type RawLayerTimes = BTreeMap<Layer, BTreeMap<String, NaiveDateTime>>;

/// Scan state and raw tables produced by [`scan_driver_log`]
#[derive(Debug, Clone, Default)]
pub struct BatchScan {
    clock: DriverClock,
    iteration: Option<usize>,
    starts: Vec<RawLayerTimes>,
    ends: Vec<RawLayerTimes>,
}

impl BatchScan {
    /// Index of the iteration currently being logged
    pub fn current_iteration(&self) -> Option<usize> {
        self.iteration
    }

    /// Launch times, one table per iteration
    pub fn starts(&self) -> &[RawLayerTimes] {
        &self.starts
    }

    /// Finish times, one table per iteration
    pub fn ends(&self) -> &[RawLayerTimes] {
        &self.ends
    }

    fn begin_iteration(&mut self) {
        let next = self.iteration.map_or(0, |i| i + 1);
        self.iteration = Some(next);
        self.starts.push(RawLayerTimes::new());
        self.ends.push(RawLayerTimes::new());
        debug!(iteration = next, "estimation request received");
    }

    fn require_iteration(&self, batch_id: &str) -> Result<usize> {
        self.iteration.ok_or_else(|| {
            TimingError::consistency(format!(
                "batch {} logged before any estimation request",
                batch_id
            ))
        })
    }

    fn launch(&mut self, batch_id: &str, layer: Layer, time: NaiveDateTime) -> Result<()> {
        let iteration = self.require_iteration(batch_id)?;
        let starts = &mut self.starts[iteration];
        let ends = &mut self.ends[iteration];

        // The same id still open under another layer: that layer is done with it.
        let shared: Vec<Layer> = starts
            .iter()
            .filter(|(other, ids)| {
                **other != layer
                    && ids.contains_key(batch_id)
                    && !ends.get(*other).is_some_and(|e| e.contains_key(batch_id))
            })
            .map(|(other, _)| *other)
            .collect();

        for other in shared {
            debug!(iteration, batch_id, from = %other, to = %layer, "batch id handed between layers");
            ends.entry(other)
                .or_default()
                .insert(batch_id.to_string(), time);
        }

        debug!(iteration, batch_id, %layer, %time, "batch launched");
        starts
            .entry(layer)
            .or_default()
            .insert(batch_id.to_string(), time);
        Ok(())
    }

    fn finish(&mut self, batch_id: &str, time: NaiveDateTime) -> Result<()> {
        let iteration = self.require_iteration(batch_id)?;
        let starts = &self.starts[iteration];
        let ends = &mut self.ends[iteration];

        let candidates: Vec<Layer> = starts
            .iter()
            .filter(|(layer, ids)| {
                ids.contains_key(batch_id)
                    && !ends.get(*layer).is_some_and(|e| e.contains_key(batch_id))
            })
            .map(|(layer, _)| *layer)
            .collect();

        // Two open layers can only be the simulation/reweighting id sharing;
        // this assumes a two-layer deployment.
        let layer = match candidates.as_slice() {
            [] => {
                return Err(TimingError::consistency(format!(
                    "iteration {}: batch {} finished without an open launch",
                    iteration, batch_id
                )))
            }
            [only] => *only,
            [_, _] => Layer::ReweightingLayer,
            more => {
                return Err(TimingError::consistency(format!(
                    "iteration {}: batch {} is open under {} layers",
                    iteration,
                    batch_id,
                    more.len()
                )))
            }
        };

        debug!(iteration, batch_id, %layer, %time, "batch finished");
        ends.entry(layer)
            .or_default()
            .insert(batch_id.to_string(), time);
        Ok(())
    }

    /// Check launch/finish bookkeeping and build padded batch intervals
    pub fn consolidate(&self, padding: Duration) -> Result<BatchTimings> {
        let mut iterations = Vec::with_capacity(self.starts.len());

        for (iteration, (starts, ends)) in self.starts.iter().zip(&self.ends).enumerate() {
            if !starts.keys().eq(ends.keys()) {
                return Err(TimingError::consistency(format!(
                    "iteration {}: layers launched {:?} differ from layers finished {:?}",
                    iteration,
                    starts.keys().collect::<Vec<_>>(),
                    ends.keys().collect::<Vec<_>>()
                )));
            }

            let mut batches = IterationBatches::default();
            for (layer, layer_starts) in starts {
                let layer_ends = &ends[layer];
                if !layer_starts.keys().eq(layer_ends.keys()) {
                    let unfinished: Vec<&String> = layer_starts
                        .keys()
                        .filter(|id| !layer_ends.contains_key(*id))
                        .collect();
                    return Err(TimingError::consistency(format!(
                        "iteration {}: {} batches launched and finished differ (unfinished: {:?})",
                        iteration, layer, unfinished
                    )));
                }

                for (batch_id, start) in layer_starts {
                    let interval = TimeInterval::new(*start, layer_ends[batch_id]).map_err(|_| {
                        TimingError::consistency(format!(
                            "iteration {}: {} batch {} does not finish after it starts",
                            iteration, layer, batch_id
                        ))
                    })?;
                    batches.insert(*layer, batch_id.clone(), interval.padded(padding));
                }
            }

            info!(iteration, batches = batches.batch_count(), "batch intervals consolidated");
            iterations.push(batches);
        }

        Ok(BatchTimings::from_iterations(iterations))
    }
}

/// Scan a driver log into raw launch/finish tables
///
/// `source_name` only labels error messages.
pub fn scan_driver_log(text: &str, source_name: &str) -> Result<BatchScan> {
    let mut scan = BatchScan::default();

    for (line, event) in driver_events(text) {
        match event {
            DriverEvent::StartedAt(raw) => {
                let started = parse_started_at(raw).ok_or_else(|| {
                    TimingError::malformed(
                        source_name,
                        line,
                        format!("unparsable start time '{}'", raw),
                    )
                })?;
                scan.clock.set_started_at(started);
            }
            DriverEvent::Timed { stamp, kind } => {
                let time = scan
                    .clock
                    .resolve(stamp)
                    .map_err(|reason| TimingError::malformed(source_name, line, reason))?;

                match kind {
                    DriverEventKind::RequestReceived => scan.begin_iteration(),
                    DriverEventKind::BatchLaunched { batch_id, layer } => {
                        let layer: Layer = layer
                            .parse()
                            .map_err(|reason| TimingError::malformed(source_name, line, reason))?;
                        scan.launch(batch_id, layer, time)?;
                    }
                    DriverEventKind::BatchFinished { batch_id } => scan.finish(batch_id, time)?,
                    DriverEventKind::Other => {}
                }
            }
        }
    }

    Ok(scan)
}

/// Extract padded batch intervals for every iteration of a driver log
///
/// # Example
/// ```
/// use evaltime::batch_timing::extract_batch_timings;
/// use evaltime::config::TimingConfig;
/// use evaltime::interval::Layer;
///
/// let log = "Started at 2020-06-01 00:00:00\n\
///            00:00:00.000 INFO Received estimation request\n\
///            00:00:00.000 INFO Launching batch b1 using the SimulationLayer\n\
///            00:00:10.000 INFO Finished server request b1\n";
///
/// let timings = extract_batch_timings(log, "driver.o", &TimingConfig::default()).unwrap();
/// let interval = timings.iteration(0).unwrap().get(Layer::SimulationLayer, "b1").unwrap();
/// assert_eq!(interval.duration_secs(), 12.0);
/// ```
pub fn extract_batch_timings(
    text: &str,
    source_name: &str,
    config: &TimingConfig,
) -> Result<BatchTimings> {
    let scan = scan_driver_log(text, source_name)?;
    let timings = scan.consolidate(config.batch_padding())?;
    info!(
        source = source_name,
        iterations = timings.iteration_count(),
        "driver log parsed"
    );
    Ok(timings)
}
