//! evaltime - compute-time attribution for property-estimation runs
//!
//! Reconstructs, from the logs of a finished run, how much wall-clock time
//! each calculation layer spent producing the results reported per
//! iteration. Batch intervals come from the driver log, protocol execution
//! intervals from the worker logs, and each result's provenance ties the two
//! together.

pub mod batch_timing;
pub mod cli;
pub mod config;
pub mod error;
pub mod interval;
pub mod log_events;
pub mod protocol_timing;
pub mod provenance;
pub mod report;
pub mod run_dir;
pub mod time_attribution;
pub mod timestamp;

pub use config::TimingConfig;
pub use error::{Result, TimingError};
pub use interval::{Layer, TimeInterval};
