//! Discovery and loading of a finished run's directory
//!
//! Layout (directory names configurable through [`TimingConfig`]):
//!
//! ```text
//! <run>/
//! ├── <job>.o                          driver log (exactly one)
//! ├── worker-logs/*.log                one log per worker
//! └── optimize.tmp/phys-prop/
//!     ├── iter_0000/results.json       results of the first request
//!     └── iter_0001/results.json       ...
//! ```

use crate::batch_timing::extract_batch_timings;
use crate::config::TimingConfig;
use crate::error::{Result, TimingError};
use crate::protocol_timing::{extract_protocol_timings, WorkerLog};
use crate::provenance::RequestResult;
use crate::time_attribution::{attribute_time, IterationStatistics};
use crate::timestamp::local_wall_clock;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use walkdir::WalkDir;

/// Files making up one run
#[derive(Debug, Clone)]
pub struct RunDirectory {
    root: PathBuf,
    driver_log: PathBuf,
    worker_logs: Vec<PathBuf>,
    results_dir: PathBuf,
}

fn files_with_extension(dir: &Path, extension: &str) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(dir).min_depth(1).max_depth(1) {
        let entry = entry.map_err(std::io::Error::from)?;
        if entry.file_type().is_file()
            && entry.path().extension().is_some_and(|ext| ext == extension)
        {
            files.push(entry.into_path());
        }
    }
    files.sort();
    Ok(files)
}

impl RunDirectory {
    /// Locate the driver log, worker logs and results of a run
    pub fn open<P: AsRef<Path>>(root: P, config: &TimingConfig) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        if !root.is_dir() {
            return Err(TimingError::RunLayout(format!(
                "{} is not a directory",
                root.display()
            )));
        }

        let mut drivers = files_with_extension(&root, &config.driver_log_extension)?;
        if drivers.len() != 1 {
            return Err(TimingError::RunLayout(format!(
                "expected exactly one *.{} driver log in {}, found {}",
                config.driver_log_extension,
                root.display(),
                drivers.len()
            )));
        }
        let driver_log = drivers.remove(0);

        let worker_dir = root.join(&config.worker_log_dir);
        let worker_logs = if worker_dir.is_dir() {
            files_with_extension(&worker_dir, "log")?
        } else {
            warn!(dir = %worker_dir.display(), "no worker log directory");
            Vec::new()
        };

        info!(
            root = %root.display(),
            driver = %driver_log.display(),
            workers = worker_logs.len(),
            "run directory opened"
        );

        Ok(Self {
            results_dir: root.join(&config.results_dir),
            root,
            driver_log,
            worker_logs,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn driver_log_path(&self) -> &Path {
        &self.driver_log
    }

    pub fn worker_log_paths(&self) -> &[PathBuf] {
        &self.worker_logs
    }

    /// Path of the results file for `iteration` (`iter_NNNN/results.json`)
    pub fn results_path(&self, iteration: usize) -> PathBuf {
        self.results_dir
            .join(format!("iter_{:04}", iteration))
            .join("results.json")
    }

    pub fn read_driver_log(&self) -> Result<String> {
        Ok(fs::read_to_string(&self.driver_log)?)
    }

    /// Read every worker log with its modification time as local wall-clock time
    pub fn read_worker_logs(&self) -> Result<Vec<WorkerLog>> {
        self.worker_logs
            .iter()
            .map(|path| {
                let modified = fs::metadata(path)?.modified()?;
                Ok(WorkerLog {
                    name: path.display().to_string(),
                    modified: local_wall_clock(modified),
                    text: fs::read_to_string(path)?,
                })
            })
            .collect()
    }

    /// Load the results of the first `iterations` iterations
    pub fn load_results(&self, iterations: usize) -> Result<Vec<RequestResult>> {
        (0..iterations)
            .map(|iteration| {
                let path = self.results_path(iteration);
                if !path.is_file() {
                    return Err(TimingError::RunLayout(format!(
                        "missing results for iteration {}: {}",
                        iteration,
                        path.display()
                    )));
                }
                RequestResult::from_file(&path)
            })
            .collect()
    }

    /// Run the full analysis: driver log, worker logs, then attribution
    pub fn analyze(&self, config: &TimingConfig) -> Result<Vec<IterationStatistics>> {
        let driver_name = self.driver_log.display().to_string();
        let batches = extract_batch_timings(&self.read_driver_log()?, &driver_name, config)?;
        let workers = self.read_worker_logs()?;
        let protocols = extract_protocol_timings(&workers, config)?;
        let results = self.load_results(batches.iteration_count())?;

        attribute_time(&batches, protocols, &results, config)
    }
}
