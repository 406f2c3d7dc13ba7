use anyhow::{Context, Result};
use graphbin_core::IngestConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Contents of a `graphbin.toml`
///
/// ```toml
/// [ingest]
/// temp_dir = "/var/tmp/graphbin"
/// buffer_capacity = 1048576
/// lookup_cache_capacity = 4096
/// ```
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub ingest: IngestConfig,
}

impl Config {
    /// Load `path`; no path or a missing file yields defaults
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Config::default());
        };

        if path.exists() {
            let content = fs::read_to_string(path)
                .with_context(|| format!("failed to read config {}", path.display()))?;
            let config: Config = toml::from_str(&content)
                .with_context(|| format!("invalid config {}", path.display()))?;
            Ok(config)
        } else {
            tracing::debug!("Config {} not found, using defaults", path.display());
            Ok(Config::default())
        }
    }
}
