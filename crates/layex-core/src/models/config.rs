//! Configuration structures for the extraction pipeline.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::LayexError;
use crate::geometry::DEFAULT_FUZZ;

/// Main configuration for layex.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LayexConfig {
    /// File locations.
    pub paths: PathsConfig,

    /// Parsing and pipeline configuration.
    pub parse: ParseConfig,
}

/// Where documents, records and the layout live.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Directory holding the source documents.
    pub document_dir: PathBuf,

    /// Directory holding the record store shards.
    pub store_dir: PathBuf,

    /// Layout file (YAML).
    pub layout: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            document_dir: PathBuf::from("pdfs"),
            store_dir: PathBuf::from("data"),
            layout: PathBuf::from("layout.yaml"),
        }
    }
}

/// Parser and pipeline tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ParseConfig {
    /// Containment tolerance. Must match the value the layout was authored with.
    pub fuzz: f64,

    /// Number of parallel workers (0 = available parallelism).
    pub workers: usize,

    /// Maximum records per store batch.
    pub batch_size: usize,

    /// Maximum seconds a store batch stays open.
    pub batch_interval_secs: u64,

    /// How long the orchestrator waits for a single result.
    pub recv_timeout_ms: u64,

    /// Result queue ceiling as a multiple of the worker count.
    pub result_queue_factor: usize,

    /// How long a worker pauses when the result queue is full.
    pub backpressure_poll_ms: u64,

    /// Record field that marks a document for `--reparse-flagged`.
    pub flag_field: String,
}

impl Default for ParseConfig {
    fn default() -> Self {
        Self {
            fuzz: DEFAULT_FUZZ,
            workers: 0,
            batch_size: 30,
            batch_interval_secs: 15,
            recv_timeout_ms: 1000,
            result_queue_factor: 2,
            backpressure_poll_ms: 5000,
            flag_field: "curated".to_string(),
        }
    }
}

impl ParseConfig {
    /// Worker count with `0` resolved to the machine's available parallelism.
    pub fn effective_workers(&self) -> usize {
        if self.workers > 0 {
            self.workers
        } else {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        }
    }
}

impl LayexConfig {
    /// Load configuration from a JSON file.
    pub fn from_file(path: &std::path::Path) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content)
            .map_err(|e| LayexError::Config(format!("{}: {}", path.display(), e)))
    }

    /// Save configuration to a JSON file.
    pub fn save(&self, path: &std::path::Path) -> Result<(), std::io::Error> {
        let content = serde_json::to_string_pretty(self).map_err(|e| {
            std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string())
        })?;
        std::fs::write(path, content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: LayexConfig =
            serde_json::from_str(r#"{"parse": {"workers": 3}}"#).unwrap();
        assert_eq!(config.parse.workers, 3);
        assert_eq!(config.parse.batch_size, 30);
        assert_eq!(config.parse.fuzz, DEFAULT_FUZZ);
        assert_eq!(config.paths.layout, PathBuf::from("layout.yaml"));
    }

    #[test]
    fn test_effective_workers() {
        let mut parse = ParseConfig::default();
        assert!(parse.effective_workers() >= 1);
        parse.workers = 6;
        assert_eq!(parse.effective_workers(), 6);
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        let mut config = LayexConfig::default();
        config.parse.flag_field = "reviewed".to_string();
        config.save(&path).unwrap();

        let loaded = LayexConfig::from_file(&path).unwrap();
        assert_eq!(loaded.parse.flag_field, "reviewed");
    }

    #[test]
    fn test_malformed_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"parse": {"workers": "many"}}"#).unwrap();
        assert!(matches!(
            LayexConfig::from_file(&path),
            Err(LayexError::Config(_))
        ));
    }
}
