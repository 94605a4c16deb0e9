//! TOML configuration
//!
//! Loaded from `--config-file`, or from `<config dir>/Repoharvest/repoharvest.toml`
//! when that exists. A missing default file means built-in defaults.

use super::args::Args;
use crate::core::error_handling::ContextualError;
use crate::core::keys::KeyScheme;
use crate::core::retry::RetryPolicy;
use crate::scanner::context::ScanSettings;
use crate::scanner::types::SourceDescriptor;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{message}")]
    NotFound { path: PathBuf, message: String },

    #[error("Error reading configuration file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Error parsing configuration file {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("Invalid configuration: {message}")]
    Invalid { message: String },
}

impl ContextualError for ConfigError {
    fn is_user_actionable(&self) -> bool {
        !matches!(self, ConfigError::Read { .. })
    }

    fn user_message(&self) -> Option<&str> {
        match self {
            ConfigError::NotFound { message, .. }
            | ConfigError::Invalid { message }
            | ConfigError::Parse { message, .. } => Some(message),
            ConfigError::Read { .. } => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScannerSection {
    pub scratch_dir: Option<PathBuf>,
    pub workers: usize,
    pub poison_threshold: usize,
    /// Per-task limit in seconds, 0 for none
    pub task_timeout_secs: u64,
    pub request_timeout_secs: u64,
    pub default_branch: String,
    pub key_scheme: KeyScheme,
    pub retry_attempts: usize,
}

impl Default for ScannerSection {
    fn default() -> Self {
        Self {
            scratch_dir: None,
            workers: 4,
            poison_threshold: 100,
            task_timeout_secs: 120,
            request_timeout_secs: 30,
            default_branch: "master".to_string(),
            key_scheme: KeyScheme::default(),
            retry_attempts: 2,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreSection {
    /// Directory of the JSON document store; in-memory when absent
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MeasureSection {
    pub command: String,
    pub cost_per_year: f64,
}

impl Default for MeasureSection {
    fn default() -> Self {
        Self {
            command: "cloc".to_string(),
            cost_per_year: 70_000.0,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogSection {
    pub level: Option<String>,
    pub format: Option<String>,
    pub file: Option<String>,
    pub color: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub scanner: ScannerSection,
    pub store: StoreSection,
    pub measure: MeasureSection,
    pub log: LogSection,
    #[serde(rename = "source")]
    pub sources: Vec<SourceDescriptor>,
}

impl Config {
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("Repoharvest").join("repoharvest.toml"))
    }

    /// Load the given file, or the default file when it exists
    pub async fn load(config_file: Option<&Path>) -> Result<Self, ConfigError> {
        let path = match config_file {
            Some(path) if !path.exists() => {
                return Err(ConfigError::NotFound {
                    path: path.to_path_buf(),
                    message: format!(
                        "The specified configuration file does not exist: {}",
                        path.display()
                    ),
                })
            }
            Some(path) => path.to_path_buf(),
            None => match Self::default_path() {
                Some(path) if path.exists() => path,
                _ => return Ok(Self::default()),
            },
        };

        let contents = tokio::fs::read_to_string(&path)
            .await
            .map_err(|source| ConfigError::Read {
                path: path.clone(),
                source,
            })?;
        log::debug!("Loaded configuration from {}", path.display());
        Self::parse(&contents, &path)
    }

    pub fn parse(contents: &str, path: &Path) -> Result<Self, ConfigError> {
        toml::from_str(contents).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Apply command line overrides
    pub fn apply_args(&mut self, args: &Args) -> Result<(), ConfigError> {
        if let Some(workers) = args.workers {
            self.scanner.workers = workers;
        }
        if let Some(threshold) = args.poison_threshold {
            self.scanner.poison_threshold = threshold;
        }
        if let Some(scheme) = &args.key_scheme {
            self.scanner.key_scheme = scheme.parse().map_err(|_| ConfigError::Invalid {
                message: format!("Unknown key scheme '{}'", scheme),
            })?;
        }
        if let Some(dir) = &args.scratch_dir {
            self.scanner.scratch_dir = Some(dir.clone());
        }
        if let Some(store) = &args.store {
            self.store.path = Some(store.clone());
        }
        if let Some(level) = &args.log_level {
            self.log.level = Some(level.clone());
        }
        if let Some(format) = &args.log_format {
            self.log.format = Some(format.clone());
        }
        if let Some(file) = &args.log_file {
            self.log.file = Some(file.to_string_lossy().to_string());
        }
        if let Some(color) = args.color_choice() {
            self.log.color = Some(color);
        }
        Ok(())
    }

    /// Reject settings no scan could run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.scanner.workers == 0 {
            return Err(ConfigError::Invalid {
                message: "workers must be at least 1".to_string(),
            });
        }
        if self.measure.command.trim().is_empty() {
            return Err(ConfigError::Invalid {
                message: "measure.command must not be empty".to_string(),
            });
        }

        let mut seen = HashSet::new();
        for (index, source) in self.sources.iter().enumerate() {
            for (field, value) in [
                ("source_id", &source.source_id),
                ("organisation", &source.organisation),
                ("url", &source.url),
            ] {
                if value.trim().is_empty() {
                    return Err(ConfigError::Invalid {
                        message: format!("source #{} is missing '{}'", index + 1, field),
                    });
                }
            }
            if !is_plain_id(&source.source_id) {
                return Err(ConfigError::Invalid {
                    message: format!(
                        "source id '{}' may only contain letters, digits, '-', '_' and '.'",
                        source.source_id
                    ),
                });
            }
            if !seen.insert(source.source_id.as_str()) {
                return Err(ConfigError::Invalid {
                    message: format!("duplicate source id '{}'", source.source_id),
                });
            }
        }
        Ok(())
    }

    /// Sources to scan: all of them, or those named by the filter
    pub fn selected_sources(&self, filter: &[String]) -> Result<Vec<SourceDescriptor>, ConfigError> {
        if filter.is_empty() {
            return Ok(self.sources.clone());
        }
        if let Some(unknown) = filter
            .iter()
            .find(|id| !self.sources.iter().any(|source| &source.source_id == *id))
        {
            return Err(ConfigError::Invalid {
                message: format!("no source with id '{}' is configured", unknown),
            });
        }
        Ok(self
            .sources
            .iter()
            .filter(|source| filter.contains(&source.source_id))
            .cloned()
            .collect())
    }

    pub fn settings(&self) -> ScanSettings {
        let defaults = ScanSettings::default();
        ScanSettings {
            scratch_dir: self
                .scanner
                .scratch_dir
                .clone()
                .unwrap_or(defaults.scratch_dir),
            workers: self.scanner.workers,
            poison_threshold: self.scanner.poison_threshold,
            task_timeout: (self.scanner.task_timeout_secs > 0)
                .then(|| Duration::from_secs(self.scanner.task_timeout_secs)),
            default_branch: self.scanner.default_branch.clone(),
            key_scheme: self.scanner.key_scheme,
            retry: match self.scanner.retry_attempts {
                0 | 1 => RetryPolicy::once(),
                attempts => RetryPolicy {
                    max_attempts: attempts,
                    ..RetryPolicy::default()
                },
            },
        }
    }
}

// Same character set the file store keeps unencoded
fn is_plain_id(id: &str) -> bool {
    !id.starts_with('.')
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
}
