//! Configuration for training and serving
//!
//! Layering, lowest precedence first: built-in defaults, an optional TOML
//! file, then `VITALRISK_*` environment variables. The resolved value is
//! passed explicitly to the loader, trainer, artifact store and scorer.

use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::age::is_valid_threshold;
use crate::errors::{Result, RiskError};

pub const ENV_ARTIFACTS_DIR: &str = "VITALRISK_ARTIFACTS_DIR";
pub const ENV_DEFAULT_THRESHOLD: &str = "VITALRISK_DEFAULT_THRESHOLD";
pub const ENV_HOST: &str = "VITALRISK_HOST";
pub const ENV_PORT: &str = "VITALRISK_PORT";

/// Top-level configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskConfig {
    pub artifacts: ArtifactPaths,
    /// Cutoff used when the metrics report has no usable threshold
    pub default_threshold: f64,
    pub service: ServiceConfig,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            artifacts: ArtifactPaths::default(),
            default_threshold: 0.5,
            service: ServiceConfig::default(),
        }
    }
}

/// Where training writes and scoring reads artifacts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArtifactPaths {
    pub dir: PathBuf,
    pub model_file: String,
    pub hash_file: String,
    pub metrics_file: String,
    pub report_file: String,
}

impl Default for ArtifactPaths {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("artifacts"),
            model_file: "model.json".into(),
            hash_file: "model.hash".into(),
            metrics_file: "metrics.json".into(),
            report_file: "eval_report.json".into(),
        }
    }
}

impl ArtifactPaths {
    pub fn in_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            ..Self::default()
        }
    }

    pub fn model_path(&self) -> PathBuf {
        self.dir.join(&self.model_file)
    }

    pub fn hash_path(&self) -> PathBuf {
        self.dir.join(&self.hash_file)
    }

    pub fn metrics_path(&self) -> PathBuf {
        self.dir.join(&self.metrics_file)
    }

    pub fn report_path(&self) -> PathBuf {
        self.dir.join(&self.report_file)
    }
}

/// HTTP bind settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 8004,
        }
    }
}

impl ServiceConfig {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl RiskConfig {
    /// Defaults, then `path` if given, then process environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_overrides(|key| env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            RiskError::Config(format!("failed to read config file {}: {e}", path.display()))
        })?;
        let config: RiskConfig = toml::from_str(&content)?;
        info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Apply `VITALRISK_*` overrides using `lookup` to read variables.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(dir) = lookup(ENV_ARTIFACTS_DIR) {
            self.artifacts.dir = PathBuf::from(dir);
        }
        if let Some(raw) = lookup(ENV_DEFAULT_THRESHOLD) {
            self.default_threshold = raw.trim().parse().map_err(|_| {
                RiskError::Config(format!("{ENV_DEFAULT_THRESHOLD} must be a number, got '{raw}'"))
            })?;
        }
        if let Some(host) = lookup(ENV_HOST) {
            self.service.host = host;
        }
        if let Some(raw) = lookup(ENV_PORT) {
            match raw.trim().parse() {
                Ok(port) => self.service.port = port,
                Err(_) => warn!("Ignoring invalid {ENV_PORT} value '{raw}'"),
            }
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if !is_valid_threshold(self.default_threshold) {
            return Err(RiskError::Config(format!(
                "default_threshold must lie strictly between 0 and 1, got {}",
                self.default_threshold
            )));
        }
        Ok(())
    }
}
