//! Durable run artifacts: the raw log and the results file.
//!
//! The raw log is opened in append mode when the run starts and receives one
//! JSON line per observed response, from any execution slot. The results file
//! is only touched at flush time, also in append mode, so consecutive runs
//! accumulate rather than overwrite.

use crate::config::OutputConfig;
use crate::error::Result;
use crate::types::{ProbeResponse, WorkItem};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

/// One raw-log line
#[derive(Debug, Serialize)]
pub struct RawLogRecord<'a> {
    /// When the response was observed
    pub timestamp: DateTime<Utc>,
    /// Item the response belongs to
    pub item: &'a WorkItem,
    /// Response status
    pub status: u16,
    /// Response headers
    pub headers: &'a BTreeMap<String, String>,
}

impl<'a> RawLogRecord<'a> {
    /// Build a record stamped with the current time
    pub fn new(item: &'a WorkItem, response: &'a ProbeResponse) -> Self {
        Self {
            timestamp: Utc::now(),
            item,
            status: response.status,
            headers: &response.headers,
        }
    }
}

/// Owner of the run's output files
#[derive(Debug)]
pub struct OutputSink {
    output_dir: PathBuf,
    raw_log_path: PathBuf,
    results_path: PathBuf,
    raw_log: Mutex<Option<BufWriter<File>>>,
}

impl OutputSink {
    /// Create the output directory if needed and open the raw log for appending
    pub fn open(config: &OutputConfig) -> Result<Self> {
        std::fs::create_dir_all(&config.output_dir)?;

        let raw_log_path = config.raw_log_path();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&raw_log_path)?;

        Ok(Self {
            output_dir: config.output_dir.clone(),
            raw_log_path,
            results_path: config.results_path(),
            raw_log: Mutex::new(Some(BufWriter::new(file))),
        })
    }

    /// Output directory
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Raw-log file path
    pub fn raw_log_path(&self) -> &Path {
        &self.raw_log_path
    }

    /// Results file path
    pub fn results_path(&self) -> &Path {
        &self.results_path
    }

    /// Whether the raw log is still accepting records
    pub fn is_raw_log_open(&self) -> bool {
        self.raw_log().is_some()
    }

    /// Append one record to the raw log
    ///
    /// Returns `Ok(false)` without writing once the log has been closed, which
    /// is what abandoned invocations see if they finish after shutdown.
    pub fn write_raw(&self, record: &RawLogRecord<'_>) -> std::io::Result<bool> {
        let mut guard = self.raw_log();
        let Some(writer) = guard.as_mut() else {
            return Ok(false);
        };

        serde_json::to_writer(&mut *writer, record)?;
        writer.write_all(b"\n")?;
        writer.flush()?;
        Ok(true)
    }

    /// Append every item to the results file, one per line
    ///
    /// The file is not created when `results` is empty. Returns the number of
    /// lines written.
    pub fn write_results(&self, results: &[WorkItem]) -> Result<usize> {
        if results.is_empty() {
            return Ok(0);
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.results_path)?;
        let mut writer = BufWriter::new(file);
        for item in results {
            writeln!(writer, "{item}")?;
        }
        writer.flush()?;
        Ok(results.len())
    }

    /// Flush and close the raw log; later calls are no-ops
    pub fn close_raw_log(&self) -> Result<()> {
        if let Some(mut writer) = self.raw_log().take() {
            writer.flush()?;
        }
        Ok(())
    }

    fn raw_log(&self) -> MutexGuard<'_, Option<BufWriter<File>>> {
        self.raw_log
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn output_config(dir: &Path) -> OutputConfig {
        OutputConfig {
            output_dir: dir.join("nested").join("results"),
            ..Default::default()
        }
    }

    #[test]
    fn open_creates_directory_and_raw_log() {
        let dir = tempdir().unwrap();
        let sink = OutputSink::open(&output_config(dir.path())).unwrap();
        assert!(sink.output_dir().is_dir());
        assert!(sink.raw_log_path().is_file());
        assert!(!sink.results_path().exists());
    }

    #[test]
    fn raw_records_are_json_lines() {
        let dir = tempdir().unwrap();
        let sink = OutputSink::open(&output_config(dir.path())).unwrap();

        let item = WorkItem::from("a");
        let response = ProbeResponse::new(200).with_header("Target_Header", "yes");
        assert!(sink.write_raw(&RawLogRecord::new(&item, &response)).unwrap());
        sink.close_raw_log().unwrap();

        let content = std::fs::read_to_string(sink.raw_log_path()).unwrap();
        let lines: Vec<_> = content.lines().collect();
        assert_eq!(lines.len(), 1);
        let value: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(value["item"], "a");
        assert_eq!(value["status"], 200);
        assert_eq!(value["headers"]["target_header"], "yes");
    }

    #[test]
    fn writes_after_close_are_dropped() {
        let dir = tempdir().unwrap();
        let sink = OutputSink::open(&output_config(dir.path())).unwrap();
        sink.close_raw_log().unwrap();
        sink.close_raw_log().unwrap();
        assert!(!sink.is_raw_log_open());

        let item = WorkItem::from("late");
        let response = ProbeResponse::new(200);
        assert!(!sink.write_raw(&RawLogRecord::new(&item, &response)).unwrap());
        assert_eq!(std::fs::read_to_string(sink.raw_log_path()).unwrap(), "");
    }

    #[test]
    fn empty_results_do_not_create_file() {
        let dir = tempdir().unwrap();
        let sink = OutputSink::open(&output_config(dir.path())).unwrap();
        assert_eq!(sink.write_results(&[]).unwrap(), 0);
        assert!(!sink.results_path().exists());
    }

    #[test]
    fn results_append_across_runs() {
        let dir = tempdir().unwrap();
        let config = output_config(dir.path());

        let first = OutputSink::open(&config).unwrap();
        first.write_results(&[WorkItem::from("b")]).unwrap();
        first.close_raw_log().unwrap();

        let second = OutputSink::open(&config).unwrap();
        second
            .write_results(&[WorkItem::from("d"), WorkItem::from("d")])
            .unwrap();

        let content = std::fs::read_to_string(config.results_path()).unwrap();
        assert_eq!(content, "b\nd\nd\n");
    }
}
