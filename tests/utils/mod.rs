// Synthetic run directories for integration tests
//
// Worker log modification times are pinned so that the worker clock anchor
// lands on the dates written in the logs.
#![allow(dead_code)]

use chrono::{Duration, Local, NaiveDate, NaiveDateTime, TimeZone};
use serde_json::{json, Value};
use std::fs::{self, File};
use std::path::Path;
use std::time::SystemTime;
use tempfile::TempDir;

pub fn at(h: u32, m: u32, s: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2020, 6, 1)
        .unwrap()
        .and_hms_opt(h, m, s)
        .unwrap()
}

/// Builder for a run directory on disk
pub struct RunFixture {
    dir: TempDir,
}

impl RunFixture {
    pub fn new() -> Self {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("worker-logs")).unwrap();
        Self { dir }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Driver log anchored at 2020-06-01 00:00:00
    pub fn driver_log(self, lines: &[&str]) -> Self {
        let text = format!("Started at 2020-06-01 00:00:00\n{}\n", lines.join("\n"));
        fs::write(self.path().join("job.o"), text).unwrap();
        self
    }

    /// Worker log whose corrected mtime is 30 seconds past midnight
    pub fn worker_log(self, name: &str, lines: &[&str]) -> Self {
        let path = self.path().join("worker-logs").join(name);
        fs::write(&path, lines.join("\n")).unwrap();

        let local = at(0, 0, 30) - Duration::hours(2);
        let modified: SystemTime = Local
            .from_local_datetime(&local)
            .earliest()
            .unwrap()
            .into();
        File::options()
            .write(true)
            .open(&path)
            .unwrap()
            .set_modified(modified)
            .unwrap();
        self
    }

    pub fn results(self, iteration: usize, properties: Vec<Value>) -> Self {
        let dir = self
            .path()
            .join("optimize.tmp/phys-prop")
            .join(format!("iter_{:04}", iteration));
        fs::create_dir_all(&dir).unwrap();
        let document = json!({ "estimated_properties": { "properties": properties } });
        fs::write(dir.join("results.json"), document.to_string()).unwrap();
        self
    }
}

/// Simulated property whose provenance is stored as an encoded JSON string
pub fn simulation_property(result_type: &str, batch_id: &str, protocols: &[&str]) -> Value {
    let mut schemas = vec![json!({
        "id": "assign_parameters",
        "type": "BuildSmirnoffSystem",
        "inputs": {
            ".force_field_path": format!("working-data/SimulationLayer/{}/ff.json", batch_id)
        }
    })];
    schemas.extend(protocols.iter().map(|id| json!({ "id": id, "inputs": {} })));
    property(result_type, "SimulationLayer", schemas)
}

pub fn reweighting_property(result_type: &str, batch_id: &str, protocols: &[&str]) -> Value {
    let mut schemas = vec![json!({
        "id": "unpack_data_0",
        "inputs": {
            ".simulation_data_path": [
                format!("stored_data/ReweightingLayer/{}/data.json", batch_id),
                "stored_data/dir",
                "ff.json"
            ]
        }
    })];
    schemas.extend(protocols.iter().map(|id| json!({ "id": id, "inputs": {} })));
    property(result_type, "ReweightingLayer", schemas)
}

fn property(result_type: &str, fidelity: &str, schemas: Vec<Value>) -> Value {
    let provenance = json!({ "protocol_schemas": schemas }).to_string();
    json!({
        "@type": format!("openff.evaluator.properties.{}", result_type),
        "value": 1.0,
        "source": { "fidelity": fidelity, "provenance": provenance }
    })
}
