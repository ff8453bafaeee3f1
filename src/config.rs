//! Configuration types for probe-runner

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, path::Path, path::PathBuf, time::Duration};

/// Placeholder substituted with the work item inside [`HttpConfig::url_template`]
pub const ITEM_PLACEHOLDER: &str = "{ITEM}";

/// Execution parameters for one run
///
/// Immutable once the run starts. The runner moves it into an `Arc`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ExecutionConfig {
    /// Number of execution slots (default: 10)
    #[serde(default = "default_concurrency_limit")]
    pub concurrency_limit: usize,

    /// Per-call timeout handed to the worker function (default: 25s)
    #[serde(default = "default_timeout", with = "duration_serde")]
    pub timeout: Duration,

    /// Outbound proxy URI applied to http and https traffic
    #[serde(default)]
    pub proxy: Option<String>,

    /// Delay each invocation sleeps before its blocking call (default: 250ms)
    #[serde(default = "default_pacing_delay", with = "millis_serde")]
    pub pacing_delay: Duration,

    /// Delay after the Draining flush before the run reports termination (default: 250ms)
    #[serde(default = "default_grace_delay", with = "millis_serde")]
    pub grace_delay: Duration,

    /// Durable output locations
    #[serde(default)]
    pub output: OutputConfig,

    /// Reference HTTP probe settings
    #[serde(default)]
    pub http: HttpConfig,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            concurrency_limit: default_concurrency_limit(),
            timeout: default_timeout(),
            proxy: None,
            pacing_delay: default_pacing_delay(),
            grace_delay: default_grace_delay(),
            output: OutputConfig::default(),
            http: HttpConfig::default(),
        }
    }
}

impl ExecutionConfig {
    /// Load a configuration from a JSON file
    ///
    /// Missing fields take their defaults. The result is validated before it is returned.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            Error::config("config", format!("cannot read {}: {e}", path.display()))
        })?;
        let config: ExecutionConfig = serde_json::from_str(&raw).map_err(|e| {
            Error::config("config", format!("invalid JSON in {}: {e}", path.display()))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Check invariants that cannot be expressed in the type system
    pub fn validate(&self) -> Result<()> {
        if self.concurrency_limit == 0 {
            return Err(Error::config(
                "concurrency_limit",
                "concurrency limit must be a positive integer",
            ));
        }

        if self.timeout.is_zero() {
            return Err(Error::config("timeout", "timeout must be greater than zero"));
        }

        if let Some(proxy) = &self.proxy {
            url::Url::parse(proxy).map_err(|e| {
                Error::config("proxy", format!("invalid proxy URI '{proxy}': {e}"))
            })?;
        }

        if !self.http.url_template.contains(ITEM_PLACEHOLDER) {
            return Err(Error::config(
                "http.url_template",
                format!("URL template must contain {ITEM_PLACEHOLDER}"),
            ));
        }

        if self.output.raw_log_file.as_os_str().is_empty()
            || self.output.results_file.as_os_str().is_empty()
        {
            return Err(Error::config(
                "output",
                "raw log and results file names must not be empty",
            ));
        }

        Ok(())
    }
}

/// Where durable artifacts are written
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Output directory, created if missing (default: "./results")
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Raw-log file name inside `output_dir` (default: "raw.log")
    #[serde(default = "default_raw_log_file")]
    pub raw_log_file: PathBuf,

    /// Results file name inside `output_dir` (default: "successful_results.txt")
    #[serde(default = "default_results_file")]
    pub results_file: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            raw_log_file: default_raw_log_file(),
            results_file: default_results_file(),
        }
    }
}

impl OutputConfig {
    /// Full path of the raw-log file
    pub fn raw_log_path(&self) -> PathBuf {
        self.output_dir.join(&self.raw_log_file)
    }

    /// Full path of the results file
    pub fn results_path(&self) -> PathBuf {
        self.output_dir.join(&self.results_file)
    }
}

/// Reference HTTP probe configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HttpConfig {
    /// Request URL with `{ITEM}` placeholder
    #[serde(default = "default_url_template")]
    pub url_template: String,

    /// Header whose presence marks a response as successful
    #[serde(default = "default_target_header")]
    pub target_header: String,

    /// Headers sent with every request
    #[serde(default = "default_headers")]
    pub headers: BTreeMap<String, String>,

    /// Skip TLS certificate verification (default: true)
    #[serde(default = "default_true")]
    pub accept_invalid_certs: bool,

    /// Follow redirects (default: false)
    #[serde(default)]
    pub follow_redirects: bool,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            url_template: default_url_template(),
            target_header: default_target_header(),
            headers: default_headers(),
            accept_invalid_certs: true,
            follow_redirects: false,
        }
    }
}

impl HttpConfig {
    /// Substitute the item into the URL template
    pub fn url_for(&self, item: &str) -> String {
        self.url_template.replace(ITEM_PLACEHOLDER, item)
    }
}

fn default_concurrency_limit() -> usize {
    10
}

fn default_timeout() -> Duration {
    Duration::from_secs(25)
}

fn default_pacing_delay() -> Duration {
    Duration::from_millis(250)
}

fn default_grace_delay() -> Duration {
    Duration::from_millis(250)
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("./results")
}

fn default_raw_log_file() -> PathBuf {
    PathBuf::from("raw.log")
}

fn default_results_file() -> PathBuf {
    PathBuf::from("successful_results.txt")
}

fn default_url_template() -> String {
    "https://api.localhost?item={ITEM}".to_string()
}

fn default_target_header() -> String {
    "target_header".to_string()
}

fn default_true() -> bool {
    true
}

fn default_headers() -> BTreeMap<String, String> {
    [
        (
            "User-Agent",
            "Mozilla/5.0 (Macintosh; Intel Mac OS X 10.14; rv:69.0) Gecko/20100101 Firefox/69.0",
        ),
        (
            "Accept",
            "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
        ),
        ("Accept-Language", "en-US,en;q=0.5"),
        ("Accept-Encoding", "gzip, deflate"),
        ("DNT", "1"),
        ("Connection", "keep-alive"),
        ("Upgrade-Insecure-Requests", "1"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

// Duration serialization helper (whole seconds)
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

// Duration serialization helper (milliseconds)
mod millis_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(u64::try_from(duration.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}
