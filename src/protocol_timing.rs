//! Protocol execution intervals from worker logs
//!
//! Each worker log is scanned on its own: its clock is anchored on the
//! file's modification time, and at most one protocol is tracked as
//! executing at a time. Intervals from every worker are pooled per
//! protocol id, since the same protocol can run on several workers or in
//! several iterations.

use crate::config::TimingConfig;
use crate::error::{Result, TimingError};
use crate::interval::TimeInterval;
use crate::log_events::{parse_worker_line, worker_events, WorkerEvent};
use crate::timestamp::WorkerClock;
use chrono::NaiveDateTime;
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

/// One worker's log text together with its file modification time
#[derive(Debug, Clone)]
pub struct WorkerLog {
    /// Name used in diagnostics (usually the file path)
    pub name: String,
    /// Modification time of the file, as local wall-clock time
    pub modified: NaiveDateTime,
    pub text: String,
}

/// Protocol id → every recorded execution interval
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProtocolTimings {
    intervals: BTreeMap<String, Vec<TimeInterval>>,
}

impl ProtocolTimings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one execution of `protocol_id`
    pub fn add(&mut self, protocol_id: impl Into<String>, interval: TimeInterval) {
        self.intervals
            .entry(protocol_id.into())
            .or_default()
            .push(interval);
    }

    /// Scan one worker log and pool its intervals into this table
    pub fn add_worker_log(&mut self, log: &WorkerLog, config: &TimingConfig) -> Result<()> {
        let executions = extract_worker_intervals(log, config)?;
        info!(
            source = %log.name,
            executions = executions.len(),
            "worker log parsed"
        );
        for (protocol_id, interval) in executions {
            self.add(protocol_id, interval);
        }
        Ok(())
    }

    /// Remaining (unconsumed) intervals of a protocol
    pub fn intervals(&self, protocol_id: &str) -> &[TimeInterval] {
        self.intervals
            .get(protocol_id)
            .map_or(&[][..], |list| list.as_slice())
    }

    pub fn protocol_count(&self) -> usize {
        self.intervals.len()
    }

    pub fn interval_count(&self) -> usize {
        self.intervals.values().map(Vec::len).sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[TimeInterval])> {
        self.intervals
            .iter()
            .map(|(id, list)| (id.as_str(), list.as_slice()))
    }

    /// Remove and return every interval of `protocol_id` lying inside `window`
    ///
    /// Returns `None` when the protocol never appeared in any worker log.
    pub fn take_within(
        &mut self,
        protocol_id: &str,
        window: &TimeInterval,
    ) -> Option<Vec<TimeInterval>> {
        let list = self.intervals.get_mut(protocol_id)?;
        let (taken, kept): (Vec<TimeInterval>, Vec<TimeInterval>) =
            list.drain(..).partition(|interval| window.contains(interval));
        *list = kept;
        Some(taken)
    }

    /// Total seconds of remaining intervals lying inside `span`
    pub fn remaining_secs_within(&self, span: &TimeInterval) -> f64 {
        self.intervals
            .values()
            .flatten()
            .filter(|interval| span.contains(interval))
            .map(TimeInterval::duration_secs)
            .fold(0.0, |total, secs| total + secs)
    }
}

/// Build a table from many worker logs
pub fn extract_protocol_timings<'a>(
    logs: impl IntoIterator<Item = &'a WorkerLog>,
    config: &TimingConfig,
) -> Result<ProtocolTimings> {
    let mut timings = ProtocolTimings::new();
    for log in logs {
        timings.add_worker_log(log, config)?;
    }
    Ok(timings)
}

fn close(
    log: &WorkerLog,
    line: usize,
    protocol_id: String,
    start: NaiveDateTime,
    end: NaiveDateTime,
    out: &mut Vec<(String, TimeInterval)>,
) -> Result<()> {
    if end == start {
        warn!(source = %log.name, line, protocol_id = %protocol_id, "dropping zero-length protocol execution");
        return Ok(());
    }
    let interval = TimeInterval::new(start, end).map_err(|_| {
        TimingError::consistency(format!(
            "{} (line {}): protocol {} ends at {} before it starts at {}",
            log.name, line, protocol_id, end, start
        ))
    })?;
    out.push((protocol_id, interval));
    Ok(())
}

/// Scan a single worker log into `(protocol id, interval)` pairs
///
/// A protocol still executing when the log ends is closed at the worker's
/// estimated shutdown time.
pub fn extract_worker_intervals(
    log: &WorkerLog,
    config: &TimingConfig,
) -> Result<Vec<(String, TimeInterval)>> {
    let first_stamp = log
        .text
        .lines()
        .next()
        .and_then(parse_worker_line)
        .map(|(stamp, _)| stamp)
        .ok_or_else(|| {
            TimingError::malformed(&log.name, 1, "first line carries no timestamp")
        })?;

    let clock = WorkerClock::establish(first_stamp, log.modified, config)
        .map_err(|reason| TimingError::malformed(&log.name, 1, reason))?;
    debug!(source = %log.name, anchor = %clock.anchor(), shutdown = %clock.shutdown(), "worker clock anchored");

    let mut executions = Vec::new();
    let mut open: Option<(String, NaiveDateTime, usize)> = None;
    let mut last_seen = clock.anchor();

    for (line, stamp, event) in worker_events(&log.text) {
        let Some(protocol_id) = event.protocol_id() else {
            if let Ok(time) = clock.resolve(stamp) {
                last_seen = last_seen.max(time);
            }
            continue;
        };
        let time = clock
            .resolve(stamp)
            .map_err(|reason| TimingError::malformed(&log.name, line, reason))?;
        last_seen = last_seen.max(time);

        match event {
            WorkerEvent::ProtocolStarted { .. } => {
                if let Some((current, _, _)) = &open {
                    debug!(source = %log.name, line, protocol_id, current = %current, "ignoring start while another protocol is open");
                    continue;
                }
                open = Some((protocol_id.to_string(), time, line));
            }
            WorkerEvent::ProtocolFinished { .. } | WorkerEvent::ProtocolFailed { .. } => {
                match open.take() {
                    Some((current, start, _)) if current == protocol_id => {
                        close(log, line, current, start, time, &mut executions)?;
                    }
                    Some(other) => {
                        warn!(source = %log.name, line, protocol_id, open = %other.0, "ignoring close of a protocol that is not open");
                        open = Some(other);
                    }
                    None => {
                        debug!(source = %log.name, line, protocol_id, "ignoring close with no open protocol");
                    }
                }
            }
            WorkerEvent::Other => {}
        }
    }

    // A worker may outlive the estimated shutdown; never close before its last line.
    if let Some((protocol_id, start, line)) = open {
        let end = clock.shutdown().max(last_seen);
        debug!(source = %log.name, protocol_id = %protocol_id, %end, "closing unterminated protocol at worker shutdown");
        close(log, line, protocol_id, start, end, &mut executions)?;
    }

    Ok(executions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate};

    fn at(h: u32, m: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2020, 6, 1)
            .unwrap()
            .and_hms_opt(h, m, s)
            .unwrap()
    }

    fn worker_log(lines: &[&str]) -> WorkerLog {
        WorkerLog {
            name: "worker-0.log".to_string(),
            // mtime 08:00 local + 2h skew anchors the day at 2020-06-01
            modified: at(8, 0, 0),
            text: lines.join("\n"),
        }
    }

    fn extract(lines: &[&str]) -> Result<ProtocolTimings> {
        extract_protocol_timings([&worker_log(lines)], &TimingConfig::default())
    }

    #[test]
    fn test_completed_and_failed_protocols() {
        let timings = extract(&[
            "2020-06-01 09:00:00.000 INFO Worker started",
            "2020-06-01 09:00:01.000 INFO Executing p1",
            "2020-06-01 09:00:05.000 INFO p1 finished executing after 4000.0 ms",
            "2020-06-01 09:00:06.000 INFO Executing p2",
            "2020-06-01 09:00:09.500 INFO Protocol failed to execute: p2",
        ])
        .unwrap();

        assert_eq!(timings.intervals("p1").len(), 1);
        assert_eq!(timings.intervals("p1")[0].duration_secs(), 4.0);
        assert_eq!(timings.intervals("p2")[0].duration_secs(), 3.5);
    }

    #[test]
    fn test_open_protocol_closed_at_shutdown() {
        let timings = extract(&[
            "2020-06-01 09:00:00.000 INFO Worker started",
            "2020-06-01 09:00:01.000 INFO Executing p1",
        ])
        .unwrap();

        let intervals = timings.intervals("p1");
        assert_eq!(intervals.len(), 1);
        assert_eq!(intervals[0].start(), at(9, 0, 1));
        assert_eq!(
            intervals[0].end(),
            at(9, 0, 0) + Duration::hours(5) + Duration::minutes(59)
        );
    }

    #[test]
    fn test_open_protocol_started_after_estimated_shutdown() {
        // Anchor 09:00 puts the estimated shutdown at 14:59; the worker ran longer
        let timings = extract(&[
            "2020-06-01 09:00:00.000 INFO Worker started",
            "2020-06-01 14:59:30.000 INFO Executing p1",
            "2020-06-01 15:10:00.000 INFO heartbeat",
        ])
        .unwrap();

        let intervals = timings.intervals("p1");
        assert_eq!(intervals.len(), 1);
        assert_eq!(intervals[0].start(), at(14, 59, 30));
        assert_eq!(intervals[0].end(), at(15, 10, 0));
    }

    #[test]
    fn test_open_protocol_on_last_line_past_shutdown_is_dropped() {
        let timings = extract(&[
            "2020-06-01 09:00:00.000 INFO Worker started",
            "2020-06-01 14:59:30.000 INFO Executing p1",
        ])
        .unwrap();

        assert!(timings.intervals("p1").is_empty());
    }

    #[test]
    fn test_nested_start_and_mismatched_close_ignored() {
        let timings = extract(&[
            "2020-06-01 09:00:00.000 INFO Worker started",
            "2020-06-01 09:00:01.000 INFO Executing p1",
            "2020-06-01 09:00:02.000 INFO Executing p2",
            "2020-06-01 09:00:03.000 INFO p2 finished executing after 1000.0 ms",
            "2020-06-01 09:00:04.000 INFO p1 finished executing after 3000.0 ms",
        ])
        .unwrap();

        assert_eq!(timings.intervals("p1")[0].duration_secs(), 3.0);
        assert!(timings.intervals("p2").is_empty());
    }

    #[test]
    fn test_repeated_protocol_in_one_log_keeps_each_run() {
        let timings = extract(&[
            "2020-06-01 09:00:00.000 INFO Worker started",
            "2020-06-01 09:00:01.000 INFO Executing p1",
            "2020-06-01 09:00:02.000 INFO p1 finished executing after 1000.0 ms",
            "2020-06-01 09:00:10.000 INFO Executing p1",
            "2020-06-01 09:00:13.000 INFO p1 finished executing after 3000.0 ms",
        ])
        .unwrap();

        let durations: Vec<f64> = timings
            .intervals("p1")
            .iter()
            .map(TimeInterval::duration_secs)
            .collect();
        assert_eq!(durations, vec![1.0, 3.0]);
    }

    #[test]
    fn test_intervals_pool_across_workers() {
        let a = worker_log(&[
            "2020-06-01 09:00:00.000 INFO Worker started",
            "2020-06-01 09:00:01.000 INFO Executing p1",
            "2020-06-01 09:00:02.000 INFO p1 finished executing after 1000.0 ms",
        ]);
        let b = WorkerLog {
            name: "worker-1.log".to_string(),
            ..worker_log(&[
                "2020-06-01 09:30:00.000 INFO Worker started",
                "2020-06-01 09:30:01.000 INFO Executing p1",
                "2020-06-01 09:30:03.000 INFO p1 finished executing after 2000.0 ms",
            ])
        };

        let timings = extract_protocol_timings([&a, &b], &TimingConfig::default()).unwrap();
        assert_eq!(timings.protocol_count(), 1);
        assert_eq!(timings.interval_count(), 2);
    }

    #[test]
    fn test_unstamped_first_line_is_malformed() {
        let err = extract(&["Traceback (most recent call last):"]).unwrap_err();
        assert!(matches!(err, TimingError::MalformedLog { line: 1, .. }));

        let err = extract(&[]).unwrap_err();
        assert!(matches!(err, TimingError::MalformedLog { .. }));
    }

    #[test]
    fn test_take_within_consumes_once() {
        let mut timings = ProtocolTimings::new();
        timings.add("p1", TimeInterval::new(at(9, 0, 1), at(9, 0, 5)).unwrap());
        timings.add("p1", TimeInterval::new(at(9, 1, 0), at(9, 1, 5)).unwrap());

        let window = TimeInterval::new(at(9, 0, 0), at(9, 0, 10)).unwrap();
        let taken = timings.take_within("p1", &window).unwrap();
        assert_eq!(taken.len(), 1);
        assert_eq!(timings.intervals("p1").len(), 1);

        assert!(timings.take_within("p1", &window).unwrap().is_empty());
        assert!(timings.take_within("missing", &window).is_none());
    }

    #[test]
    fn test_remaining_secs_within_span() {
        let mut timings = ProtocolTimings::new();
        timings.add("p1", TimeInterval::new(at(9, 0, 1), at(9, 0, 5)).unwrap());
        timings.add("p2", TimeInterval::new(at(9, 0, 8), at(9, 0, 12)).unwrap());

        let span = TimeInterval::new(at(9, 0, 0), at(9, 0, 10)).unwrap();
        assert_eq!(timings.remaining_secs_within(&span), 4.0);

        let empty = TimeInterval::new(at(10, 0, 0), at(10, 0, 10)).unwrap();
        let secs = timings.remaining_secs_within(&empty);
        assert_eq!(secs, 0.0);
        assert!(secs.is_sign_positive());
    }
}
