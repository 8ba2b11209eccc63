//! Wall-clock intervals and the calculation layers that own them

use crate::error::{Result, TimingError};
use chrono::{Duration, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Calculation layer ("approach") used to estimate a property
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Layer {
    /// Direct molecular simulation
    SimulationLayer,
    /// Reweighting of previously cached simulation data
    ReweightingLayer,
}

impl Layer {
    /// All layers, in report order
    pub const ALL: [Layer; 2] = [Layer::SimulationLayer, Layer::ReweightingLayer];

    /// Name as it appears in logs and provenance paths
    pub fn as_str(&self) -> &'static str {
        match self {
            Layer::SimulationLayer => "SimulationLayer",
            Layer::ReweightingLayer => "ReweightingLayer",
        }
    }
}

impl fmt::Display for Layer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Layer {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "SimulationLayer" => Ok(Layer::SimulationLayer),
            "ReweightingLayer" => Ok(Layer::ReweightingLayer),
            other => Err(format!("unknown calculation layer '{}'", other)),
        }
    }
}

/// Closed wall-clock interval with `end > start`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimeInterval {
    start: NaiveDateTime,
    end: NaiveDateTime,
}

impl TimeInterval {
    /// Create an interval, rejecting `end <= start`
    pub fn new(start: NaiveDateTime, end: NaiveDateTime) -> Result<Self> {
        if end <= start {
            return Err(TimingError::consistency(format!(
                "interval end {} is not after start {}",
                end, start
            )));
        }
        Ok(Self { start, end })
    }

    pub fn start(&self) -> NaiveDateTime {
        self.start
    }

    pub fn end(&self) -> NaiveDateTime {
        self.end
    }

    /// Widen both ends by `margin`
    pub fn padded(&self, margin: Duration) -> Self {
        Self {
            start: self.start - margin,
            end: self.end + margin,
        }
    }

    /// True when `other` lies entirely within this interval (inclusive bounds)
    pub fn contains(&self, other: &TimeInterval) -> bool {
        other.start >= self.start && other.end <= self.end
    }

    /// Duration in seconds (millisecond precision)
    pub fn duration_secs(&self) -> f64 {
        (self.end - self.start).num_milliseconds() as f64 / 1000.0
    }
}

impl fmt::Display for TimeInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{} .. {}]", self.start, self.end)
    }
}
