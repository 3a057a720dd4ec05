//! Configuration for Roundtable runs.
//!
//! Loaded from YAML. Every field has a default, so an empty or missing file
//! yields a working setup against a local Ollama server.

use crate::watchdog::WatchdogKind;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

/// Default configuration file name, looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "roundtable.yml";

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RoundtableConfig {
    /// Model-serving endpoint shared by all model participants.
    #[serde(default)]
    pub endpoint: EndpointConfig,

    /// Turn sequencing and wall-clock bound.
    #[serde(default)]
    pub conversation: ConversationConfig,

    /// Where artifacts, transcripts and reports go.
    #[serde(default)]
    pub output: OutputConfig,

    /// Per-agent model overrides, keyed by participant name.
    #[serde(default)]
    pub models: BTreeMap<String, String>,

    /// Suppress all validation warnings.
    #[serde(default, rename = "_suppress_warnings")]
    pub suppress_warnings: bool,
}

/// Endpoint configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Placeholder credential; local servers ignore it.
    #[serde(default = "default_api_key")]
    pub api_key: String,

    /// Per-request timeout in seconds.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_seconds: u64,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key: default_api_key(),
            request_timeout_seconds: default_request_timeout(),
        }
    }
}

/// Conversation configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationConfig {
    /// Wall-clock bound for the whole conversation.
    #[serde(default = "default_max_runtime")]
    pub max_runtime_seconds: u64,

    /// Overrides each scenario's own round bound.
    #[serde(default)]
    pub max_rounds: Option<u32>,

    /// Timeout backend: auto, signal or thread.
    #[serde(default)]
    pub watchdog: WatchdogKind,
}

impl Default for ConversationConfig {
    fn default() -> Self {
        Self {
            max_runtime_seconds: default_max_runtime(),
            max_rounds: None,
            watchdog: WatchdogKind::default(),
        }
    }
}

/// Output configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Root output directory; each scenario writes to a subdirectory.
    #[serde(default = "default_output_dir")]
    pub dir: PathBuf,

    /// Record every message to `transcript.jsonl`.
    #[serde(default = "default_true")]
    pub record_transcript: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: default_output_dir(),
            record_transcript: true,
        }
    }
}

fn default_base_url() -> String {
    "http://localhost:11434/v1".to_string()
}

fn default_api_key() -> String {
    "fake-key".to_string()
}

fn default_request_timeout() -> u64 {
    300
}

fn default_max_runtime() -> u64 {
    600
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("output")
}

fn default_true() -> bool {
    true
}

impl RoundtableConfig {
    /// Loads configuration from a YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path_ref = path.as_ref();
        debug!(path = %path_ref.display(), "Loading configuration from file");
        let content = std::fs::read_to_string(path_ref)?;
        let config: Self = serde_yaml::from_str(&content)?;
        debug!(
            base_url = %config.endpoint.base_url,
            max_runtime_seconds = config.conversation.max_runtime_seconds,
            model_overrides = config.models.len(),
            "Configuration loaded"
        );
        Ok(config)
    }

    /// Loads the file if it exists, otherwise falls back to defaults.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path_ref = path.as_ref();
        if path_ref.exists() {
            Self::from_file(path_ref)
        } else {
            warn!(path = %path_ref.display(), "Config file not found, using defaults");
            Ok(Self::default())
        }
    }

    /// Model for an agent: the override if configured, else the default.
    pub fn model_for<'a>(&'a self, agent: &str, default: &'a str) -> &'a str {
        self.models.get(agent).map_or(default, String::as_str)
    }

    pub fn max_runtime(&self) -> Duration {
        Duration::from_secs(self.conversation.max_runtime_seconds)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.endpoint.request_timeout_seconds)
    }

    /// Round bound: the override if positive, else the scenario default.
    pub fn max_rounds_or(&self, scenario_default: u32) -> u32 {
        match self.conversation.max_rounds {
            Some(rounds) if rounds > 0 => rounds,
            _ => scenario_default,
        }
    }

    /// Output directory for one scenario.
    pub fn scenario_dir(&self, scenario: &str) -> PathBuf {
        self.output.dir.join(scenario)
    }

    /// Validates the configuration.
    ///
    /// Fatal problems (zero runtime bound, empty base URL) are errors; the
    /// rest come back as warnings unless `_suppress_warnings` is set.
    pub fn validate(&self) -> Result<Vec<ConfigWarning>, ConfigError> {
        if self.conversation.max_runtime_seconds == 0 {
            return Err(ConfigError::InvalidValue {
                field: "conversation.max_runtime_seconds".to_string(),
                message: "must be greater than zero".to_string(),
            });
        }
        if self.endpoint.base_url.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "endpoint.base_url".to_string(),
                message: "must not be empty".to_string(),
            });
        }

        let mut warnings = Vec::new();
        if self.suppress_warnings {
            return Ok(warnings);
        }

        if !self.endpoint.base_url.starts_with("http://")
            && !self.endpoint.base_url.starts_with("https://")
        {
            warnings.push(ConfigWarning::InvalidValue {
                field: "endpoint.base_url".to_string(),
                message: format!("'{}' is not an http(s) URL", self.endpoint.base_url),
            });
        }

        if self.endpoint.api_key.is_empty() {
            warnings.push(ConfigWarning::InvalidValue {
                field: "endpoint.api_key".to_string(),
                message: "empty credential; some servers reject requests without one".to_string(),
            });
        }

        if self.endpoint.request_timeout_seconds == 0 {
            warnings.push(ConfigWarning::InvalidValue {
                field: "endpoint.request_timeout_seconds".to_string(),
                message: "zero disables the per-request timeout".to_string(),
            });
        }

        if self.conversation.max_rounds == Some(0) {
            warnings.push(ConfigWarning::InvalidValue {
                field: "conversation.max_rounds".to_string(),
                message: "zero ignored, scenario default applies".to_string(),
            });
        }

        let known = crate::scenario::known_agents();
        for agent in self.models.keys() {
            if !known.contains(&agent.as_str()) {
                warnings.push(ConfigWarning::UnknownAgent {
                    agent: agent.clone(),
                });
            }
        }

        Ok(warnings)
    }
}

/// Configuration warnings emitted during validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigWarning {
    /// Field has a suspicious value.
    InvalidValue { field: String, message: String },
    /// A model override names no known participant.
    UnknownAgent { agent: String },
}

impl std::fmt::Display for ConfigWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigWarning::InvalidValue { field, message } => {
                write!(f, "Warning [{field}]: {message}")
            }
            ConfigWarning::UnknownAgent { agent } => {
                write!(f, "Warning [models.{agent}]: no participant named '{agent}'")
            }
        }
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = RoundtableConfig::default();
        assert_eq!(config.endpoint.base_url, "http://localhost:11434/v1");
        assert_eq!(config.endpoint.api_key, "fake-key");
        assert_eq!(config.conversation.max_runtime_seconds, 600);
        assert_eq!(config.conversation.watchdog, WatchdogKind::Auto);
        assert_eq!(config.output.dir, PathBuf::from("output"));
        assert!(config.output.record_transcript);
        assert!(config.validate().unwrap().is_empty());
    }

    #[test]
    fn test_empty_yaml_uses_defaults() {
        let config: RoundtableConfig = serde_yaml::from_str("{}").unwrap();
        assert_eq!(config.endpoint.request_timeout_seconds, 300);
        assert_eq!(config.max_rounds_or(30), 30);
    }

    #[test]
    fn test_parse_full_yaml() {
        let yaml = r#"
endpoint:
  base_url: "http://gpu-box:11434/v1"
  api_key: "secret"
conversation:
  max_runtime_seconds: 120
  max_rounds: 8
  watchdog: thread
output:
  dir: "/tmp/roundtable"
  record_transcript: false
models:
  Respondedor: "llama3.1"
unknown_section:
  ignored: true
"#;
        let config: RoundtableConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.endpoint.base_url, "http://gpu-box:11434/v1");
        assert_eq!(config.max_runtime(), Duration::from_secs(120));
        assert_eq!(config.max_rounds_or(30), 8);
        assert_eq!(config.conversation.watchdog, WatchdogKind::Thread);
        assert!(!config.output.record_transcript);
        assert_eq!(config.model_for("Respondedor", "llama3"), "llama3.1");
        assert_eq!(config.model_for("GeneradorPreguntas", "mistral"), "mistral");
        assert_eq!(
            config.scenario_dir("bias"),
            PathBuf::from("/tmp/roundtable/bias")
        );
    }

    #[test]
    fn test_zero_runtime_is_fatal() {
        let config: RoundtableConfig =
            serde_yaml::from_str("conversation:\n  max_runtime_seconds: 0\n").unwrap();
        let err = config.validate().unwrap_err();
        assert!(matches!(
            &err,
            ConfigError::InvalidValue { field, .. } if field == "conversation.max_runtime_seconds"
        ));
    }

    #[test]
    fn test_empty_base_url_is_fatal() {
        let config: RoundtableConfig =
            serde_yaml::from_str("endpoint:\n  base_url: \"\"\n").unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_warnings() {
        let yaml = r#"
endpoint:
  base_url: "localhost:11434"
  api_key: ""
conversation:
  max_rounds: 0
models:
  Nobody: "llama3"
"#;
        let config: RoundtableConfig = serde_yaml::from_str(yaml).unwrap();
        let warnings = config.validate().unwrap();
        assert_eq!(warnings.len(), 4);
        assert!(warnings.contains(&ConfigWarning::UnknownAgent {
            agent: "Nobody".to_string()
        }));
        assert!(warnings.iter().any(
            |w| matches!(w, ConfigWarning::InvalidValue { field, .. } if field == "endpoint.api_key")
        ));
        assert_eq!(config.max_rounds_or(12), 12);

        let rendered = warnings
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("\n");
        assert!(rendered.contains("Warning [models.Nobody]"));
    }

    #[test]
    fn test_suppress_warnings() {
        let yaml = "_suppress_warnings: true\nendpoint:\n  api_key: \"\"\n";
        let config: RoundtableConfig = serde_yaml::from_str(yaml).unwrap();
        assert!(config.validate().unwrap().is_empty());
    }

    #[test]
    fn test_load_or_default() {
        let temp = tempfile::TempDir::new().unwrap();
        let missing = temp.path().join("absent.yml");
        let config = RoundtableConfig::load_or_default(&missing).unwrap();
        assert_eq!(config.conversation.max_runtime_seconds, 600);

        let present = temp.path().join("roundtable.yml");
        std::fs::write(&present, "conversation:\n  max_runtime_seconds: 30\n").unwrap();
        let config = RoundtableConfig::load_or_default(&present).unwrap();
        assert_eq!(config.conversation.max_runtime_seconds, 30);

        std::fs::write(&present, "conversation: [unclosed").unwrap();
        assert!(matches!(
            RoundtableConfig::load_or_default(&present),
            Err(ConfigError::Yaml(_))
        ));
    }
}
