#![no_main]

use chrono::NaiveDate;
use evaltime::batch_timing::scan_driver_log;
use evaltime::protocol_timing::{extract_worker_intervals, WorkerLog};
use evaltime::TimingConfig;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Arbitrary log text must produce a value or an error, never a panic
    if let Ok(text) = std::str::from_utf8(data) {
        let _ = scan_driver_log(text, "fuzz.o");

        if let Some(modified) = NaiveDate::from_ymd_opt(2020, 6, 1).and_then(|d| d.and_hms_opt(0, 0, 0)) {
            let log = WorkerLog {
                name: "fuzz.log".to_string(),
                modified,
                text: text.to_string(),
            };
            let _ = extract_worker_intervals(&log, &TimingConfig::default());
        }
    }
});
