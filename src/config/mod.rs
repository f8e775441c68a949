use crate::error::{ErrorCode, Result, WordTallyError};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::warn;

pub mod loader;

pub use loader::{default_config_path, load_config, load_config_file};

pub const ENV_WORKERS: &str = "WORDTALLY_WORKERS";
pub const ENV_TOP_N: &str = "WORDTALLY_TOP_N";
pub const ENV_KEEP_NUMERIC: &str = "WORDTALLY_KEEP_NUMERIC";
pub const ENV_FAIL_FAST: &str = "WORDTALLY_FAIL_FAST";
pub const ENV_TIMEOUT: &str = "WORDTALLY_TIMEOUT";

/// When local counts are merged into the global count
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum ReduceStrategy {
    /// Merge each chunk as soon as its worker finishes
    #[default]
    Streaming,
    /// Collect every chunk, then merge after the barrier
    Batch,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    /// Horizontal bar chart
    #[default]
    Bar,
    /// Full run report as JSON
    Json,
    /// Tab separated rank, token, count
    Tsv,
}

/// Options for one pipeline run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RunConfig {
    /// Number of concurrent map workers (and upper bound on chunk count)
    pub worker_count: usize,
    /// Number of ranked entries to return
    pub top_n: usize,
    /// Count tokens without alphabetic characters
    pub keep_numeric: bool,
    /// Abort the whole run on the first chunk failure
    pub fail_fast: bool,
    /// Overall deadline before the run is cancelled
    pub timeout_seconds: Option<u64>,
    pub reduce_strategy: ReduceStrategy,
    /// Per-request timeout when fetching over HTTP
    pub http_timeout_seconds: u64,
    pub output_format: OutputFormat,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            worker_count: default_worker_count(),
            top_n: 10,
            keep_numeric: false,
            fail_fast: false,
            timeout_seconds: None,
            reduce_strategy: ReduceStrategy::default(),
            http_timeout_seconds: 10,
            output_format: OutputFormat::default(),
        }
    }
}

/// Number of available processing units, falling back to one
pub fn default_worker_count() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

impl RunConfig {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_seconds.map(Duration::from_secs)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_seconds)
    }

    /// Reject values the pipeline cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.worker_count == 0 {
            return Err(WordTallyError::invalid_argument(
                ErrorCode::INVALID_WORKER_COUNT,
                "worker_count",
                "must be at least 1",
            ));
        }
        if self.top_n == 0 {
            return Err(WordTallyError::invalid_argument(
                ErrorCode::INVALID_TOP_N,
                "top_n",
                "must be at least 1",
            ));
        }
        if self.timeout_seconds == Some(0) {
            return Err(WordTallyError::invalid_argument(
                ErrorCode::INVALID_TIMEOUT,
                "timeout_seconds",
                "must be at least 1 second",
            ));
        }
        if self.http_timeout_seconds == 0 {
            return Err(WordTallyError::invalid_argument(
                ErrorCode::INVALID_TIMEOUT,
                "http_timeout_seconds",
                "must be at least 1 second",
            ));
        }
        Ok(())
    }

    /// Apply overrides from the process environment
    pub fn merge_env_vars(&mut self) {
        self.merge_env_with(|key| std::env::var(key).ok());
    }

    /// Apply overrides from an arbitrary variable lookup
    pub fn merge_env_with<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = parse_env(&lookup, ENV_WORKERS) {
            self.worker_count = value;
        }
        if let Some(value) = parse_env(&lookup, ENV_TOP_N) {
            self.top_n = value;
        }
        if let Some(value) = parse_env(&lookup, ENV_KEEP_NUMERIC) {
            self.keep_numeric = value;
        }
        if let Some(value) = parse_env(&lookup, ENV_FAIL_FAST) {
            self.fail_fast = value;
        }
        if let Some(value) = parse_env(&lookup, ENV_TIMEOUT) {
            self.timeout_seconds = Some(value);
        }
    }
}

fn parse_env<F, T>(lookup: &F, key: &str) -> Option<T>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    let raw = lookup(key)?;
    match raw.trim().parse::<T>() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!("Ignoring malformed value for {}: {:?}", key, raw);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = RunConfig::default();
        assert!(config.worker_count >= 1);
        assert_eq!(config.top_n, 10);
        assert!(!config.keep_numeric);
        assert!(!config.fail_fast);
        assert_eq!(config.timeout(), None);
        assert_eq!(config.http_timeout(), Duration::from_secs(10));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_values() {
        let cases = [
            (
                RunConfig {
                    top_n: 0,
                    ..RunConfig::default()
                },
                "top_n",
            ),
            (
                RunConfig {
                    worker_count: 0,
                    ..RunConfig::default()
                },
                "worker_count",
            ),
            (
                RunConfig {
                    timeout_seconds: Some(0),
                    ..RunConfig::default()
                },
                "timeout_seconds",
            ),
        ];

        for (config, expected_field) in cases {
            match config.validate() {
                Err(WordTallyError::InvalidArgument { field, .. }) => {
                    assert_eq!(field, expected_field)
                }
                other => panic!("expected invalid argument, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_env_overrides() {
        let mut config = RunConfig::default();
        config.merge_env_with(lookup(&[
            (ENV_WORKERS, "3"),
            (ENV_TOP_N, " 25 "),
            (ENV_FAIL_FAST, "true"),
            (ENV_TIMEOUT, "30"),
        ]));

        assert_eq!(config.worker_count, 3);
        assert_eq!(config.top_n, 25);
        assert!(config.fail_fast);
        assert!(!config.keep_numeric);
        assert_eq!(config.timeout(), Some(Duration::from_secs(30)));
    }

    #[test]
    fn test_malformed_env_is_ignored() {
        let mut config = RunConfig::default();
        let before = config.top_n;
        config.merge_env_with(lookup(&[(ENV_TOP_N, "lots"), (ENV_KEEP_NUMERIC, "yes")]));
        assert_eq!(config.top_n, before);
        assert!(!config.keep_numeric);
    }

    #[test]
    fn test_partial_toml_file() {
        let config: RunConfig = toml::from_str(
            r#"
worker_count = 2
reduce_strategy = "batch"
output_format = "json"
"#,
        )
        .unwrap();

        assert_eq!(config.worker_count, 2);
        assert_eq!(config.reduce_strategy, ReduceStrategy::Batch);
        assert_eq!(config.output_format, OutputFormat::Json);
        assert_eq!(config.top_n, 10);
    }

    #[test]
    fn test_unknown_keys_rejected() {
        let parsed = toml::from_str::<RunConfig>("workers = 2");
        assert!(parsed.is_err());
    }
}
