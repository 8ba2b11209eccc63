// Time attribution per calculation layer
//
// Objective: Attribute wall-clock protocol time to the layer whose batch
// produced each reported property, per iteration.
//
// Protocol executions are matched to the padded interval of the batch that
// scheduled them and consumed on match, so overlapping batches never count
// the same execution twice. Executions inside the iteration that back no
// reported property are tallied as unused time.

mod attribution;
mod statistics;

pub use attribution::{attribute_time, TimeAttributionEngine};
pub use statistics::IterationStatistics;
