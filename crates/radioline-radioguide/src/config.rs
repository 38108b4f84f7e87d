//! Runtime configuration for the radioguide stages.

use std::path::PathBuf;
use std::time::Duration;

/// Settings shared by the harvest and enrich runs.
#[derive(Debug, Clone)]
pub struct Config {
    /// Site root, no trailing slash.
    pub root_url: String,
    /// Raw station list (harvest output, enrich input).
    pub source_file: PathBuf,
    /// Enriched station list (enrich output).
    pub output_file: PathBuf,
    /// Worker pool size per stage.
    pub workers: usize,
    /// Maximum buffered tasks.
    pub queue_capacity: usize,
    /// Worker safety-net timeout while the queue is open.
    pub idle_timeout: Duration,
    /// Per-client request pacing.
    pub requests_per_second: f64,
    /// Total per-fetch timeout budget.
    pub http_timeout: Duration,
    /// Reject document bodies larger than this.
    pub max_body_size: Option<usize>,
    /// Optional upstream proxy, `host:port`.
    pub proxy: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            root_url: "http://www.radioguide.fm".to_string(),
            source_file: PathBuf::from("radio_guide_source.json"),
            output_file: PathBuf::from("radio_guide.json"),
            workers: 8,
            queue_capacity: 2048,
            idle_timeout: Duration::from_secs(30),
            requests_per_second: 5.0,
            http_timeout: Duration::from_secs(60),
            max_body_size: Some(8 * 1024 * 1024),
            proxy: None,
        }
    }
}

impl Config {
    pub(crate) fn client_config(&self) -> radioline_core::ClientConfig {
        radioline_core::ClientConfig {
            requests_per_second: Some(self.requests_per_second),
            http_timeout: self.http_timeout,
            proxy: self.proxy.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = Config::default();
        assert_eq!(config.workers, 8);
        assert_eq!(config.queue_capacity, 2048);
        assert!(config.root_url.starts_with("http://"));
        assert!(!config.root_url.ends_with('/'));
    }
}
