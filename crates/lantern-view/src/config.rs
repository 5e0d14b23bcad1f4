use std::path::{Path, PathBuf};
use std::time::Duration;

use lantern_protocol::message::PROTOCOL_VERSION;
use serde::Deserialize;

use crate::error::ViewError;

pub const CONFIG_FILE_NAME: &str = "lantern.toml";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LanternConfig {
    #[serde(default)]
    pub protocol: ProtocolConfig,
    #[serde(default)]
    pub view: ViewConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProtocolConfig {
    #[serde(default = "default_version")]
    pub version: String,
    /// Origins inbound messages are accepted from. `"*"` accepts any.
    #[serde(default = "default_allowed_origins")]
    pub allowed_origins: Vec<String>,
    /// Origin stamped on outbound frames.
    #[serde(default = "default_target_origin")]
    pub target_origin: String,
    #[serde(default = "default_tool_timeout_secs")]
    pub tool_timeout_secs: u64,
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            version: default_version(),
            allowed_origins: default_allowed_origins(),
            target_origin: default_target_origin(),
            tool_timeout_secs: default_tool_timeout_secs(),
        }
    }
}

fn default_version() -> String {
    PROTOCOL_VERSION.into()
}
fn default_allowed_origins() -> Vec<String> {
    vec!["stdio".into()]
}
fn default_target_origin() -> String {
    "stdio".into()
}
fn default_tool_timeout_secs() -> u64 {
    30
}

impl ProtocolConfig {
    pub fn tool_timeout(&self) -> Duration {
        Duration::from_secs(self.tool_timeout_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ViewConfig {
    /// Ceiling for the height reported to the host, in pixels.
    #[serde(default = "default_max_height")]
    pub max_height: u32,
    /// Width the headless surface lays out against, in pixels.
    #[serde(default = "default_viewport_width")]
    pub viewport_width: u32,
    #[serde(default = "default_status_dismiss_ms")]
    pub status_dismiss_ms: u64,
    /// Move a card back when the host rejects a drag-move.
    #[serde(default = "default_true")]
    pub rollback_on_failure: bool,
    /// Whether a parent context is present. `--standalone` turns this off.
    #[serde(default = "default_true")]
    pub embedded: bool,
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self {
            max_height: default_max_height(),
            viewport_width: default_viewport_width(),
            status_dismiss_ms: default_status_dismiss_ms(),
            rollback_on_failure: true,
            embedded: true,
        }
    }
}

fn default_max_height() -> u32 {
    600
}
fn default_viewport_width() -> u32 {
    480
}
fn default_status_dismiss_ms() -> u64 {
    3000
}
fn default_true() -> bool {
    true
}

impl ViewConfig {
    pub fn status_dismiss(&self) -> Duration {
        Duration::from_millis(self.status_dismiss_ms)
    }
}

impl LanternConfig {
    pub fn from_file(path: &Path) -> Result<Self, ViewError> {
        let content = std::fs::read_to_string(path).map_err(ViewError::IoError)?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self, ViewError> {
        toml::from_str(content)
            .map_err(|e| ViewError::ConfigError(format!("Failed to parse config: {e}")))
    }

    /// Resolve the configuration file.
    ///
    /// An explicit path must exist. Otherwise `./lantern.toml`, then
    /// `<config_dir>/lantern/lantern.toml`, then built-in defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ViewError> {
        if let Some(path) = explicit {
            tracing::info!(path = %path.display(), "Loading config");
            return Self::from_file(path);
        }

        for candidate in default_locations() {
            if candidate.is_file() {
                tracing::info!(path = %candidate.display(), "Loading config");
                return Self::from_file(&candidate);
            }
        }

        tracing::debug!("No config file found, using defaults");
        Ok(Self::default())
    }
}

fn default_locations() -> Vec<PathBuf> {
    let mut locations = vec![PathBuf::from(CONFIG_FILE_NAME)];
    if let Some(dir) = dirs::config_dir() {
        locations.push(dir.join("lantern").join(CONFIG_FILE_NAME));
    }
    locations
}
