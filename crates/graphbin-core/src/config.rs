//! Ingestion configuration

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tempfile::NamedTempFile;

/// Default buffered reader/writer capacity (1 MiB)
pub const DEFAULT_BUFFER_CAPACITY: usize = 1 << 20;

/// Default number of cached label/property-name ids
pub const DEFAULT_LOOKUP_CACHE_CAPACITY: usize = 4096;

/// Tunables of the ingestion pipeline
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    /// Directory for staging files; the system temp dir when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temp_dir: Option<PathBuf>,
    /// Capacity of every buffered reader and writer
    pub buffer_capacity: usize,
    /// Maximum entries of the dictionary id cache; 0 disables it
    pub lookup_cache_capacity: usize,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            temp_dir: None,
            buffer_capacity: DEFAULT_BUFFER_CAPACITY,
            lookup_cache_capacity: DEFAULT_LOOKUP_CACHE_CAPACITY,
        }
    }
}

impl IngestConfig {
    /// Create a staging file named after `purpose`, removed when dropped
    pub fn staging_file(&self, purpose: &str) -> std::io::Result<NamedTempFile> {
        let suffix = format!("_{purpose}.tmp");
        let mut builder = tempfile::Builder::new();
        builder.prefix("graphbin_").suffix(&suffix);
        match &self.temp_dir {
            Some(dir) => builder.tempfile_in(dir),
            None => builder.tempfile(),
        }
    }

    /// Buffer capacity, never zero
    pub(crate) fn buffer(&self) -> usize {
        self.buffer_capacity.max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = IngestConfig::default();
        assert_eq!(config.temp_dir, None);
        assert_eq!(config.buffer_capacity, 1024 * 1024);
        assert_eq!(config.lookup_cache_capacity, 4096);
    }

    #[test]
    fn test_partial_document_fills_defaults() {
        let config: IngestConfig = serde_json::from_str(r#"{"lookup_cache_capacity": 0}"#).unwrap();
        assert_eq!(config.lookup_cache_capacity, 0);
        assert_eq!(config.buffer_capacity, DEFAULT_BUFFER_CAPACITY);
    }

    #[test]
    fn test_staging_file_in_configured_dir() {
        let dir = TempDir::new().unwrap();
        let config = IngestConfig {
            temp_dir: Some(dir.path().to_path_buf()),
            ..Default::default()
        };
        let file = config.staging_file("nodes").unwrap();
        assert!(file.path().starts_with(dir.path()));
        let name = file.path().file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("graphbin_"));
        assert!(name.ends_with("_nodes.tmp"));

        let path = file.path().to_path_buf();
        drop(file);
        assert!(!path.exists());
    }

    #[test]
    fn test_zero_buffer_is_clamped() {
        let config = IngestConfig {
            buffer_capacity: 0,
            ..Default::default()
        };
        assert_eq!(config.buffer(), 1);
    }
}
