//! Runtime settings (TOML)
//!
//! The tap map itself is a separate YAML document; these settings only
//! cover timing, map location and the output backend.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::engine::EngineConfig;

/// Where physical key events go.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OutputBackend {
    /// Virtual keyboard through /dev/uinput
    #[default]
    Uinput,
    /// Log events instead of sending them
    DryRun,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    /// Multitap window in milliseconds
    #[serde(default = "default_multitap_timeout_ms")]
    pub multitap_timeout_ms: u64,
    /// Output drain period in milliseconds
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
    /// Explicit tap map path, bypassing discovery
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub map: Option<PathBuf>,
    #[serde(default)]
    pub output: OutputBackend,
    /// Name of the virtual keyboard device
    #[serde(default = "default_device_name")]
    pub device_name: String,
}

fn default_multitap_timeout_ms() -> u64 {
    300
}

fn default_tick_interval_ms() -> u64 {
    10
}

fn default_device_name() -> String {
    "tapkey virtual keyboard".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            multitap_timeout_ms: default_multitap_timeout_ms(),
            tick_interval_ms: default_tick_interval_ms(),
            map: None,
            output: OutputBackend::default(),
            device_name: default_device_name(),
        }
    }
}

impl Settings {
    /// Get the default settings file path
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("tapkey")
            .join("settings.toml")
    }

    /// Load settings from a file, or return defaults if not found
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let settings: Settings = toml::from_str(&content)?;
            Ok(settings)
        } else {
            Ok(Self::default())
        }
    }

    /// Save settings to a file
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            multitap_timeout: Duration::from_millis(self.multitap_timeout_ms),
            // A zero period would make the drain interval panic
            tick_interval: Duration::from_millis(self.tick_interval_ms.max(1)),
        }
    }
}
