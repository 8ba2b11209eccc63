// Batch interval extraction from the driver log
//
// The driver prints when each batch is handed to a calculation layer and
// when the server reports it finished, stamped only with the time of day.
// A single left-to-right scan rebuilds per-iteration, per-layer batch
// intervals and checks that every launch has exactly one finish.
//
// Quirk: the reweighting layer reuses the id of a batch the simulation
// layer already launched. A launch of an id that is still open under the
// other layer closes that layer's use of the id.

mod extractor;
mod table;

pub use extractor::{extract_batch_timings, scan_driver_log, BatchScan, RawLayerTimes};
pub use table::{BatchTimings, IterationBatches};
