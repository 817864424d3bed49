use std::path::PathBuf;
use std::time::Duration;

/// Runtime settings, read from `CAGEBNB_*` environment variables.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Directory holding the WAL.
    pub data_dir: PathBuf,
    /// WAL appends since the last compaction before the log is rewritten.
    pub compact_threshold: u64,
    /// How often the compactor checks the threshold.
    pub compact_interval: Duration,
    /// Prometheus listener port; metrics are off when unset.
    pub metrics_port: Option<u16>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            compact_threshold: 1000,
            compact_interval: Duration::from_secs(30),
            metrics_port: None,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key → value source. Unset or unparsable values fall back
    /// to the defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let data_dir = lookup("CAGEBNB_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or(defaults.data_dir);
        let compact_threshold = lookup("CAGEBNB_COMPACT_THRESHOLD")
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.compact_threshold);
        let compact_interval = lookup("CAGEBNB_COMPACT_INTERVAL_SECS")
            .and_then(|s| s.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(defaults.compact_interval);
        let metrics_port = lookup("CAGEBNB_METRICS_PORT").and_then(|s| s.parse().ok());
        Self {
            data_dir,
            compact_threshold,
            compact_interval,
            metrics_port,
        }
    }
}
