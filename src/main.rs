use clap::{ArgGroup, Parser};
use probe_runner::{
    Error, ExecutionConfig, HeaderPresent, HttpProbe, ItemSource, Runner, init_tracing,
    run_with_signals,
};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(name = "probe-runner")]
#[command(about = "Run a bounded pool of HTTP probes and collect the items that pass")]
#[command(version)]
#[command(group(ArgGroup::new("input").required(true).args(["item", "items", "file"])))]
struct Cli {
    /// Probe a single item
    #[arg(short = 'a', long = "item")]
    item: Option<String>,

    /// Probe several items
    #[arg(short = 'b', long = "items", num_args = 1..)]
    items: Option<Vec<String>>,

    /// Read items from a file, one per line
    #[arg(short = 'c', long = "file")]
    file: Option<PathBuf>,

    /// Per-request timeout in seconds [default: 25]
    #[arg(long)]
    timeout: Option<u64>,

    /// Proxy URI used for every request
    #[arg(long)]
    proxy: Option<String>,

    /// Number of execution slots [default: 10]
    #[arg(long)]
    rate: Option<usize>,

    /// URL template; `{ITEM}` is replaced with the item
    #[arg(long)]
    url: Option<String>,

    /// Response header whose presence marks a success
    #[arg(long)]
    header: Option<String>,

    /// Directory for the raw log and results file, relative to the working directory [default: ./results]
    #[arg(long)]
    out_dir: Option<PathBuf>,

    /// JSON configuration file; flags override its values
    #[arg(long)]
    config: Option<PathBuf>,

    /// Verbose logging
    #[arg(long)]
    debug: bool,
}

impl Cli {
    fn execution_config(&self) -> probe_runner::Result<ExecutionConfig> {
        let mut config = match &self.config {
            Some(path) => ExecutionConfig::from_json_file(path)?,
            None => ExecutionConfig::default(),
        };

        if let Some(rate) = self.rate {
            config.concurrency_limit = rate;
        }
        if let Some(timeout) = self.timeout {
            config.timeout = Duration::from_secs(timeout);
        }
        if let Some(proxy) = &self.proxy {
            config.proxy = Some(proxy.clone());
        }
        if let Some(url) = &self.url {
            config.http.url_template = url.clone();
        }
        if let Some(header) = &self.header {
            config.http.target_header = header.clone();
        }
        if let Some(dir) = &self.out_dir {
            config.output.output_dir = dir.clone();
        }

        config.validate()?;
        Ok(config)
    }

    fn item_source(&self) -> probe_runner::Result<ItemSource> {
        ItemSource::from_selection(self.item.clone(), self.items.clone(), self.file.clone())
    }
}

/// 1 for configuration and input errors, 2 for anything that failed later
fn exit_code(err: &Error) -> u8 {
    if err.is_configuration() { 1 } else { 2 }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.debug);

    let config = match cli.execution_config() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "invalid configuration");
            return ExitCode::from(exit_code(&e));
        }
    };

    let items = match cli.item_source().and_then(|source| source.load()) {
        Ok(items) => items,
        Err(e) => {
            tracing::error!(error = %e, "could not load work items");
            return ExitCode::from(exit_code(&e));
        }
    };

    let probe = HttpProbe::new(config.http.clone());
    let predicate = HeaderPresent::new(config.http.target_header.clone());
    let runner = match Runner::new(config, probe, predicate) {
        Ok(runner) => runner,
        Err(e) => {
            tracing::error!(error = %e, "failed to start run");
            return ExitCode::from(exit_code(&e));
        }
    };

    tracing::info!(items = items.len(), "starting run");
    match run_with_signals(runner, items).await {
        Ok(summary) if summary.was_interrupted() => {
            // Detached slots may still be parked in network calls
            std::process::exit(0);
        }
        Ok(summary) => {
            if let Some(batch) = summary.batch {
                tracing::info!(
                    succeeded = batch.succeeded,
                    rejected = batch.rejected,
                    failed = batch.failed,
                    "batch complete"
                );
            }
            tracing::info!(
                successes = summary.successes.len(),
                "executed in {:.2} seconds",
                summary.elapsed.as_secs_f64()
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(error = %e, "run failed");
            ExitCode::from(exit_code(&e))
        }
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn configuration_errors_exit_with_one() {
        let cli = Cli::parse_from(["probe-runner", "-a", "x", "--rate", "0"]);
        let err = cli.execution_config().unwrap_err();
        assert_eq!(exit_code(&err), 1);

        let missing = Cli::parse_from(["probe-runner", "-c", "/definitely/not/here.txt"]);
        let err = missing.item_source().unwrap().load().unwrap_err();
        assert_eq!(exit_code(&err), 1);
    }

    #[test]
    fn later_failures_exit_with_two() {
        let err = Error::Io(std::io::Error::other("disk full"));
        assert_eq!(exit_code(&err), 2);
    }

    #[test]
    fn flags_override_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"concurrency_limit": 4, "timeout": 7}"#).unwrap();

        let cli = Cli::parse_from([
            "probe-runner",
            "-b",
            "a",
            "b",
            "--config",
            path.to_str().unwrap(),
            "--rate",
            "2",
        ]);
        let config = cli.execution_config().unwrap();
        assert_eq!(config.concurrency_limit, 2);
        assert_eq!(config.timeout, Duration::from_secs(7));
    }
}
