//! Configuration file loading.

use anyhow::{Context, Result};
use ducat_lib::{BreakerConfig, ClientConfig, JobConfig};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Everything a configuration file may set. Missing sections use defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct Config {
    pub(crate) client: ClientConfig,
    pub(crate) breaker: BreakerConfig,
    pub(crate) job: JobConfig,
    /// Checkpoint directory. Defaults to the platform data directory.
    pub(crate) checkpoint_dir: Option<std::path::PathBuf>,
}

impl Config {
    /// Loads `path`, or the defaults when no file is given.
    pub(crate) fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        serde_json::from_str(&json)
            .with_context(|| format!("Invalid config file {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_argument_gives_defaults() {
        assert_eq!(Config::load(None).unwrap(), Config::default());
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ducat.json");
        std::fs::write(
            &path,
            r#"{"breaker": {"failure_threshold": 3}, "job": {"workers": 2}}"#,
        )
        .unwrap();

        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.breaker.failure_threshold, 3);
        assert_eq!(config.job.workers, 2);
        assert_eq!(config.client, ClientConfig::default());
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ducat.json");
        std::fs::write(&path, "{").unwrap();
        assert!(Config::load(Some(&path)).is_err());
    }
}
