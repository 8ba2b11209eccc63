//! Typed events recognized in driver and worker logs
//!
//! Each log line is split into a leading stamp and a message, and the
//! message is run through an ordered table of matchers. The first matcher
//! that fires decides the event; lines no matcher recognizes still carry
//! their stamp so clocks can advance over them. Only `INFO` messages are
//! classified; other levels and bare stamps are `Other`.

use regex::{Captures, Regex};
use std::sync::LazyLock;

static DRIVER_LINE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d{2}:\d{2}:\d{2}\.\d{3})(?:\s+([A-Z]+)(?:\s+(.*?))?)?\s*$")
        .expect("driver line pattern")
});

static STARTED_AT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^Started at (.*?)\s*$").expect("started-at pattern"));

static WORKER_LINE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^((?:\d{4}-)?\d{1,2}-\d{1,2}\s+\d{2}:\d{2}:\d{2}\.\d{3})(?:\s+([A-Z]+)(?:\s+(.*?))?)?\s*$",
    )
    .expect("worker line pattern")
});

#[derive(Debug, Clone, Copy)]
enum DriverPattern {
    RequestReceived,
    BatchLaunched,
    BatchFinished,
}

#[derive(Debug, Clone, Copy)]
enum WorkerPattern {
    ProtocolStarted,
    ProtocolFinished,
    ProtocolFailed,
}

static DRIVER_MATCHERS: LazyLock<Vec<(DriverPattern, Regex)>> = LazyLock::new(|| {
    vec![
        (
            DriverPattern::RequestReceived,
            Regex::new(r"^Received estimation request").expect("request pattern"),
        ),
        (
            DriverPattern::BatchLaunched,
            Regex::new(r"^Launching batch ([0-9A-Za-z]+) using the ([A-Za-z]+)\b")
                .expect("launch pattern"),
        ),
        (
            DriverPattern::BatchFinished,
            Regex::new(r"^Finished server request ([0-9A-Za-z]+)$").expect("finish pattern"),
        ),
    ]
});

static WORKER_MATCHERS: LazyLock<Vec<(WorkerPattern, Regex)>> = LazyLock::new(|| {
    vec![
        (
            WorkerPattern::ProtocolStarted,
            Regex::new(r"^Executing\s+([0-9A-Za-z|_\-]+)").expect("executing pattern"),
        ),
        (
            WorkerPattern::ProtocolFinished,
            Regex::new(r"^([0-9A-Za-z|_\-]+)\s+finished executing after\s+([\d.]+)\s*ms")
                .expect("finished pattern"),
        ),
        (
            WorkerPattern::ProtocolFailed,
            Regex::new(r"^Protocol failed to execute:\s*([0-9A-Za-z|_\-]+)$")
                .expect("failed pattern"),
        ),
    ]
});

fn group<'a>(caps: &Captures<'a>, index: usize) -> &'a str {
    caps.get(index).map_or("", |m| m.as_str())
}

/// Event recognized in the driver log
#[derive(Debug, Clone, PartialEq)]
pub enum DriverEvent<'a> {
    /// "Started at <datetime>" banner; carries the raw datetime text
    StartedAt(&'a str),
    /// Any line prefixed with a time-of-day stamp
    Timed {
        stamp: &'a str,
        kind: DriverEventKind<'a>,
    },
}

/// Message carried by a timed driver line
#[derive(Debug, Clone, PartialEq)]
pub enum DriverEventKind<'a> {
    /// A new estimation request (optimization iteration) arrived
    RequestReceived,
    /// A batch was handed to a calculation layer
    BatchLaunched { batch_id: &'a str, layer: &'a str },
    /// The server finished a batch
    BatchFinished { batch_id: &'a str },
    Other,
}

/// Event recognized in a worker log
#[derive(Debug, Clone, PartialEq)]
pub enum WorkerEvent<'a> {
    ProtocolStarted { protocol_id: &'a str },
    ProtocolFinished { protocol_id: &'a str, reported_ms: f64 },
    ProtocolFailed { protocol_id: &'a str },
    Other,
}

impl<'a> WorkerEvent<'a> {
    /// Protocol id for start/finish/failure events
    pub fn protocol_id(&self) -> Option<&'a str> {
        match self {
            WorkerEvent::ProtocolStarted { protocol_id }
            | WorkerEvent::ProtocolFinished { protocol_id, .. }
            | WorkerEvent::ProtocolFailed { protocol_id } => Some(*protocol_id),
            WorkerEvent::Other => None,
        }
    }
}

const EVENT_LEVEL: &str = "INFO";

fn classify_driver_message<'a>(level: &str, message: &'a str) -> DriverEventKind<'a> {
    if level != EVENT_LEVEL {
        return DriverEventKind::Other;
    }
    for (pattern, re) in DRIVER_MATCHERS.iter() {
        if let Some(caps) = re.captures(message) {
            return match pattern {
                DriverPattern::RequestReceived => DriverEventKind::RequestReceived,
                DriverPattern::BatchLaunched => DriverEventKind::BatchLaunched {
                    batch_id: group(&caps, 1),
                    layer: group(&caps, 2),
                },
                DriverPattern::BatchFinished => DriverEventKind::BatchFinished {
                    batch_id: group(&caps, 1),
                },
            };
        }
    }
    DriverEventKind::Other
}

fn classify_worker_message<'a>(level: &str, message: &'a str) -> WorkerEvent<'a> {
    if level != EVENT_LEVEL {
        return WorkerEvent::Other;
    }
    for (pattern, re) in WORKER_MATCHERS.iter() {
        if let Some(caps) = re.captures(message) {
            return match pattern {
                WorkerPattern::ProtocolStarted => WorkerEvent::ProtocolStarted {
                    protocol_id: group(&caps, 1),
                },
                WorkerPattern::ProtocolFinished => WorkerEvent::ProtocolFinished {
                    protocol_id: group(&caps, 1),
                    reported_ms: group(&caps, 2).parse().unwrap_or(0.0),
                },
                WorkerPattern::ProtocolFailed => WorkerEvent::ProtocolFailed {
                    protocol_id: group(&caps, 1),
                },
            };
        }
    }
    WorkerEvent::Other
}

/// Classify a single driver log line; `None` for lines with neither a
/// stamp nor a "Started at" banner
pub fn parse_driver_line(line: &str) -> Option<DriverEvent<'_>> {
    if let Some(caps) = STARTED_AT_RE.captures(line) {
        return Some(DriverEvent::StartedAt(group(&caps, 1)));
    }
    let caps = DRIVER_LINE_RE.captures(line)?;
    Some(DriverEvent::Timed {
        stamp: group(&caps, 1),
        kind: classify_driver_message(group(&caps, 2), group(&caps, 3)),
    })
}

/// Classify a single worker log line into its stamp and event
pub fn parse_worker_line(line: &str) -> Option<(&str, WorkerEvent<'_>)> {
    let caps = WORKER_LINE_RE.captures(line)?;
    Some((
        group(&caps, 1),
        classify_worker_message(group(&caps, 2), group(&caps, 3)),
    ))
}

/// Lazily classify every line of a driver log, paired with 1-based line numbers
pub fn driver_events(text: &str) -> impl Iterator<Item = (usize, DriverEvent<'_>)> {
    text.lines()
        .enumerate()
        .filter_map(|(i, line)| parse_driver_line(line).map(|event| (i + 1, event)))
}

/// Lazily classify every stamped line of a worker log, paired with 1-based line numbers
pub fn worker_events(text: &str) -> impl Iterator<Item = (usize, &str, WorkerEvent<'_>)> {
    text.lines().enumerate().filter_map(|(i, line)| {
        parse_worker_line(line).map(|(stamp, event)| (i + 1, stamp, event))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_driver_launch_line() {
        let event =
            parse_driver_line("10:00:00.000 INFO     Launching batch b1 using the SimulationLayer (3 properties)")
                .unwrap();
        assert_eq!(
            event,
            DriverEvent::Timed {
                stamp: "10:00:00.000",
                kind: DriverEventKind::BatchLaunched {
                    batch_id: "b1",
                    layer: "SimulationLayer"
                }
            }
        );
    }

    #[test]
    fn test_driver_request_and_finish_lines() {
        assert_eq!(
            parse_driver_line("10:00:00.000 INFO Received estimation request"),
            Some(DriverEvent::Timed {
                stamp: "10:00:00.000",
                kind: DriverEventKind::RequestReceived
            })
        );
        assert_eq!(
            parse_driver_line("10:00:05.000 INFO Finished server request b1"),
            Some(DriverEvent::Timed {
                stamp: "10:00:05.000",
                kind: DriverEventKind::BatchFinished { batch_id: "b1" }
            })
        );
    }

    #[test]
    fn test_driver_started_at_and_noise() {
        assert_eq!(
            parse_driver_line("Started at Mon Jun  1 10:00:00 2020"),
            Some(DriverEvent::StartedAt("Mon Jun  1 10:00:00 2020"))
        );
        assert_eq!(parse_driver_line("Sender: LSF System"), None);
        assert_eq!(
            parse_driver_line("10:00:01.000 DEBUG heartbeat"),
            Some(DriverEvent::Timed {
                stamp: "10:00:01.000",
                kind: DriverEventKind::Other
            })
        );
    }

    #[test]
    fn test_worker_lines() {
        let (stamp, event) =
            parse_worker_line("2020-06-01 10:00:01.000 INFO     Executing conditional_group|production_0")
                .unwrap();
        assert_eq!(stamp, "2020-06-01 10:00:01.000");
        assert_eq!(
            event,
            WorkerEvent::ProtocolStarted {
                protocol_id: "conditional_group|production_0"
            }
        );

        let (_, event) =
            parse_worker_line("2020-06-01 10:00:05.000 INFO p1 finished executing after 4000.5 ms")
                .unwrap();
        assert_eq!(
            event,
            WorkerEvent::ProtocolFinished {
                protocol_id: "p1",
                reported_ms: 4000.5
            }
        );

        let (_, event) =
            parse_worker_line("2020-06-01 10:00:05.000 INFO Protocol failed to execute: p2")
                .unwrap();
        assert_eq!(event.protocol_id(), Some("p2"));
    }

    #[test]
    fn test_event_iterators_skip_unstamped_lines() {
        let text = "Started at 2020-06-01 10:00:00\nbanner\n10:00:00.000 INFO Received estimation request\n";
        let lines: Vec<usize> = driver_events(text).map(|(n, _)| n).collect();
        assert_eq!(lines, vec![1, 3]);

        let text = "traceback\n2020-06-01 10:00:01.000 INFO Executing p1\n";
        let lines: Vec<usize> = worker_events(text).map(|(n, _, _)| n).collect();
        assert_eq!(lines, vec![2]);
    }

    #[test]
    fn test_bare_stamp_lines_keep_their_stamp() {
        assert_eq!(
            parse_driver_line("10:00:00.000 INFO"),
            Some(DriverEvent::Timed {
                stamp: "10:00:00.000",
                kind: DriverEventKind::Other
            })
        );
        assert_eq!(
            parse_worker_line("2020-06-01 09:00:00.000 INFO"),
            Some(("2020-06-01 09:00:00.000", WorkerEvent::Other))
        );
        assert_eq!(
            parse_worker_line("2020-06-01 09:00:00.000"),
            Some(("2020-06-01 09:00:00.000", WorkerEvent::Other))
        );
    }

    #[test]
    fn test_events_only_recognized_at_info_level() {
        assert_eq!(
            parse_driver_line("10:00:00.000 DEBUG Received estimation request"),
            Some(DriverEvent::Timed {
                stamp: "10:00:00.000",
                kind: DriverEventKind::Other
            })
        );
        assert_eq!(
            parse_worker_line("2020-06-01 09:00:01.000 WARNING Executing p1"),
            Some(("2020-06-01 09:00:01.000", WorkerEvent::Other))
        );
    }
}
