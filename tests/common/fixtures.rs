//! Config and output-file helpers

use probe_runner::{ExecutionConfig, OutputConfig, WorkItem};
use std::path::Path;
use std::time::{Duration, Instant};

/// Config writing into `dir` with no pacing or grace delay
pub fn test_config(dir: &Path, concurrency_limit: usize) -> ExecutionConfig {
    ExecutionConfig {
        concurrency_limit,
        timeout: Duration::from_secs(5),
        pacing_delay: Duration::ZERO,
        grace_delay: Duration::ZERO,
        output: OutputConfig {
            output_dir: dir.to_path_buf(),
            ..Default::default()
        },
        ..Default::default()
    }
}

/// Build work items from string literals
pub fn items(ids: &[&str]) -> Vec<WorkItem> {
    ids.iter().copied().map(WorkItem::from).collect()
}

/// Non-empty lines of the results file, or `None` if it does not exist
pub fn read_results(config: &ExecutionConfig) -> Option<Vec<String>> {
    let content = std::fs::read_to_string(config.output.results_path()).ok()?;
    Some(content.lines().map(str::to_string).collect())
}

/// Parsed raw-log records
pub fn read_raw_log(config: &ExecutionConfig) -> Vec<serde_json::Value> {
    std::fs::read_to_string(config.output.raw_log_path())
        .unwrap_or_default()
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| serde_json::from_str(line).unwrap())
        .collect()
}

/// Sort a list so results can be compared independently of completion order
pub fn sorted<T: Ord>(mut values: Vec<T>) -> Vec<T> {
    values.sort();
    values
}

/// Poll `condition` every 5ms until it holds or `timeout` elapses
pub async fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    condition()
}
