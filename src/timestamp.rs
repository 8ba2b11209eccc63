//! Reconstruction of absolute timestamps from partial log stamps
//!
//! Neither the driver nor the worker logs carry a fully qualified clock
//! reading on every line. The driver prints only the time of day; workers
//! print a date but run on unsynchronized hosts. Both are resolved against
//! an anchor:
//!
//! - [`DriverClock`] anchors on the driver's "Started at" line and then on
//!   the previously resolved line, adding a day whenever the time of day
//!   goes backwards (midnight rollover).
//! - [`WorkerClock`] anchors on the log file's modification time plus a
//!   fixed skew correction, shifting the anchor back a day when the first
//!   line would otherwise lie in the future.

use crate::config::TimingConfig;
use chrono::{DateTime, Datelike, Duration, Local, NaiveDate, NaiveDateTime, NaiveTime};
use regex::Regex;
use std::sync::LazyLock;
use std::time::SystemTime;

static STAMP_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^\s*(?:(?:(\d{4})-)?(\d{1,2})-(\d{1,2})\s+)?(\d{1,2}):(\d{2}):(\d{2})(?:\.(\d{1,9}))?\s*$",
    )
    .expect("timestamp pattern is valid")
});

/// Formats accepted on the driver's "Started at" line
const STARTED_AT_FORMATS: &[&str] = &[
    "%a %b %d %H:%M:%S %Y",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%d/%m/%Y %H:%M:%S",
];

/// Parse a partial stamp (`[[YYYY-]MM-DD ]HH:MM:SS[.fff]`), taking any
/// missing calendar fields from `default`
///
/// # Example
/// ```
/// use chrono::NaiveDate;
/// use evaltime::timestamp::parse_stamp;
///
/// let default = NaiveDate::from_ymd_opt(2020, 6, 1).unwrap().and_hms_opt(0, 0, 0).unwrap();
/// let resolved = parse_stamp("13:05:09.250", default).unwrap();
/// assert_eq!(resolved.to_string(), "2020-06-01 13:05:09.250");
/// ```
pub fn parse_stamp(text: &str, default: NaiveDateTime) -> Option<NaiveDateTime> {
    let caps = STAMP_RE.captures(text)?;
    let field = |i: usize| caps.get(i).and_then(|m| m.as_str().parse::<u32>().ok());

    let year = caps
        .get(1)
        .and_then(|m| m.as_str().parse::<i32>().ok())
        .unwrap_or_else(|| default.year());
    let month = field(2).unwrap_or_else(|| default.month());
    let day = field(3).unwrap_or_else(|| default.day());

    let nanos = match caps.get(7) {
        Some(m) => {
            let digits = m.as_str();
            digits.parse::<u32>().ok()? * 10u32.pow(9 - digits.len() as u32)
        }
        None => 0,
    };

    let date = NaiveDate::from_ymd_opt(year, month, day)?;
    let time = NaiveTime::from_hms_nano_opt(field(4)?, field(5)?, field(6)?, nanos)?;
    Some(date.and_time(time))
}

/// Parse the datetime printed on the driver's "Started at" line
pub fn parse_started_at(text: &str) -> Option<NaiveDateTime> {
    let text = text.split_whitespace().collect::<Vec<_>>().join(" ");

    if let Ok(dt) = DateTime::parse_from_rfc3339(&text) {
        return Some(dt.naive_local());
    }
    for format in STARTED_AT_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(&text, format) {
            return Some(dt);
        }
    }

    // Scheduler banners may carry a zone abbreviation before the year
    // ("Mon Jun 8 10:01:02 EDT 2020"); local wall-clock time is what we want.
    let tokens: Vec<&str> = text.split(' ').collect();
    if tokens.len() == 6 && tokens[4].chars().all(|c| c.is_ascii_alphabetic()) {
        let without_zone = [&tokens[..4], &tokens[5..]].concat().join(" ");
        if let Ok(dt) = NaiveDateTime::parse_from_str(&without_zone, STARTED_AT_FORMATS[0]) {
            return Some(dt);
        }
    }

    NaiveDate::parse_from_str(&text, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

/// Scan-local clock for the driver log
#[derive(Debug, Clone, Default)]
pub struct DriverClock {
    started_at: Option<NaiveDateTime>,
    previous: Option<NaiveDateTime>,
}

impl DriverClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the run's start time from a "Started at" line
    pub fn set_started_at(&mut self, started_at: NaiveDateTime) {
        self.started_at = Some(started_at);
    }

    /// Most recently resolved timestamp
    pub fn previous(&self) -> Option<NaiveDateTime> {
        self.previous
    }

    /// Resolve a time-of-day stamp against the previous line (or the start
    /// time for the first line), correcting midnight rollovers
    pub fn resolve(&mut self, stamp: &str) -> Result<NaiveDateTime, String> {
        let anchor = self
            .previous
            .or(self.started_at)
            .ok_or_else(|| format!("no start time known before timestamp '{}'", stamp))?;

        let mut resolved = parse_stamp(stamp, anchor)
            .ok_or_else(|| format!("unparsable timestamp '{}'", stamp))?;

        if let Some(previous) = self.previous {
            if resolved < previous {
                resolved += Duration::days(1);
            }
        }

        self.previous = Some(resolved);
        Ok(resolved)
    }
}

/// Per-file clock for a worker log
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerClock {
    anchor: NaiveDateTime,
    shutdown: NaiveDateTime,
}

impl WorkerClock {
    /// Establish the anchor from the file's first stamp and its (local)
    /// modification time
    pub fn establish(
        first_stamp: &str,
        modified: NaiveDateTime,
        config: &TimingConfig,
    ) -> Result<Self, String> {
        let corrected = modified + config.worker_clock_skew();

        let mut anchor = parse_stamp(first_stamp, corrected)
            .ok_or_else(|| format!("unparsable timestamp '{}'", first_stamp))?;

        if anchor > corrected && anchor - corrected > config.worker_anchor_tolerance() {
            anchor -= Duration::days(1);
        }

        Ok(Self {
            anchor,
            shutdown: anchor + config.worker_lifetime(),
        })
    }

    /// Time at which the first line of the log was written
    pub fn anchor(&self) -> NaiveDateTime {
        self.anchor
    }

    /// Estimated time at which the worker was shut down
    pub fn shutdown(&self) -> NaiveDateTime {
        self.shutdown
    }

    /// Resolve a stamp from this file; anything earlier than the anchor
    /// belongs to the following day
    pub fn resolve(&self, stamp: &str) -> Result<NaiveDateTime, String> {
        let mut resolved = parse_stamp(stamp, self.anchor)
            .ok_or_else(|| format!("unparsable timestamp '{}'", stamp))?;
        if resolved < self.anchor {
            resolved += Duration::days(1);
        }
        Ok(resolved)
    }
}

/// Convert a filesystem modification time to local wall-clock time
pub fn local_wall_clock(time: SystemTime) -> NaiveDateTime {
    DateTime::<Local>::from(time).naive_local()
}
