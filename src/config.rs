//! Run configuration, persisted as TOML.
//!
//! Every field has a default, so an empty file (or no file at all) yields a
//! working configuration. `cheese-trace config` prints the defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Top-level configuration for a trace run.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TraceConfig {
    #[serde(default)]
    pub listener: ListenerConfig,
    #[serde(default)]
    pub rules: RulesConfig,
    #[serde(default)]
    pub checks: ChecksConfig,
}

/// Change-notification listener settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListenerConfig {
    /// Only notifications for this table are translated.
    #[serde(default = "default_source_table")]
    pub source_table: String,
    /// How long one wait for a notification may block.
    #[serde(default = "default_poll_timeout_ms")]
    pub poll_timeout_ms: u64,
    /// Stop after this many consecutive empty polls (0 = never).
    #[serde(default = "default_max_idle_polls")]
    pub max_idle_polls: u32,
    /// Stop after this many notifications have been received.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_events: Option<u64>,
}

/// Materializer settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RulesConfig {
    /// Upper bound on forward-chaining rounds.
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,
    /// Risk levels that trigger quarantine of derived products.
    #[serde(default = "default_quarantine_levels")]
    pub quarantine_levels: Vec<String>,
    /// Extra rules in the `@rule` text format, applied after the built-in ones.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rules_file: Option<PathBuf>,
}

/// Compliance check settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChecksConfig {
    /// If set, the gap check passes only when exactly this many gaps exist.
    /// Otherwise it passes only when there are none.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_compliance_gaps: Option<usize>,
    /// How many rows each check prints.
    #[serde(default = "default_report_limit")]
    pub report_limit: usize,
}

fn default_source_table() -> String {
    "lots".into()
}
fn default_poll_timeout_ms() -> u64 {
    1000
}
fn default_max_idle_polls() -> u32 {
    5
}
fn default_max_iterations() -> usize {
    16
}
fn default_quarantine_levels() -> Vec<String> {
    vec!["High".into(), "Critical".into()]
}
fn default_report_limit() -> usize {
    5
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            source_table: default_source_table(),
            poll_timeout_ms: default_poll_timeout_ms(),
            max_idle_polls: default_max_idle_polls(),
            max_events: None,
        }
    }
}

impl ListenerConfig {
    pub fn poll_timeout(&self) -> Duration {
        Duration::from_millis(self.poll_timeout_ms)
    }
}

impl Default for RulesConfig {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            quarantine_levels: default_quarantine_levels(),
            rules_file: None,
        }
    }
}

impl Default for ChecksConfig {
    fn default() -> Self {
        Self {
            expected_compliance_gaps: None,
            report_limit: default_report_limit(),
        }
    }
}

impl TraceConfig {
    /// Load from a TOML file and validate.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            source: e,
        })?;
        let config = Self::from_toml(&content).map_err(|e| match e {
            ConfigError::Parse { message, .. } => ConfigError::Parse {
                path: path.display().to_string(),
                message,
            },
            other => other,
        })?;
        tracing::debug!(path = %path.display(), "configuration loaded");
        Ok(config)
    }

    /// Parse and validate TOML text.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content).map_err(|e| ConfigError::Parse {
            path: "<inline>".into(),
            message: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Render as pretty TOML.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Invalid {
            message: e.to_string(),
        })
    }

    /// Save to a TOML file, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content = self.to_toml()?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::Write {
                path: parent.display().to_string(),
                source: e,
            })?;
        }
        std::fs::write(path, content).map_err(|e| ConfigError::Write {
            path: path.display().to_string(),
            source: e,
        })
    }

    /// Reject settings the pipeline cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.listener.source_table.is_empty() {
            return Err(ConfigError::Invalid {
                message: "listener.source_table must not be empty".into(),
            });
        }
        if self.rules.max_iterations == 0 {
            return Err(ConfigError::Invalid {
                message: "rules.max_iterations must be greater than 0".into(),
            });
        }
        if self.rules.quarantine_levels.is_empty() {
            return Err(ConfigError::Invalid {
                message: "rules.quarantine_levels must name at least one level".into(),
            });
        }
        Ok(())
    }
}
