//! Core `BridgeConfig` struct, persistence and validation.
//!
//! Covers:
//! - `load` / `save` (YAML file I/O with atomic write)
//! - XDG-style path helpers (`config_path`, `config_dir`)
//! - Field validation (`validate`)

use crate::error::ConfigError;
use crate::types::{LogLevel, ProfileSort, UnknownOpPolicy};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Settings for a bridge instance.
///
/// Every field has a serde default, so a partial (or empty) YAML file is a
/// valid configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// Write an `attached` line to the operator output when the first redraw
    /// notification is applied.
    #[serde(default = "crate::defaults::bool_false")]
    pub notify_on_attach: bool,

    /// Collect a profile report while the UI runs, sorted by this key.
    #[serde(default)]
    pub profile: Option<ProfileSort>,

    /// Bounded wait for the dispatcher thread during teardown, in milliseconds.
    #[serde(default = "crate::defaults::join_timeout_ms")]
    pub join_timeout_ms: u64,

    /// Register the preview-toggle mapping and font forwarding functions in
    /// the editor on connect.
    #[serde(default = "crate::defaults::bool_true")]
    pub install_helpers: bool,

    /// Normal-mode key sequence bound to the preview toggle.
    #[serde(default = "crate::defaults::preview_toggle_mapping")]
    pub preview_toggle_mapping: String,

    /// Handling of redraw operations without a registered UI handler.
    #[serde(default)]
    pub unknown_redraw_op: UnknownOpPolicy,

    /// Debug log file verbosity.
    #[serde(default)]
    pub log_level: LogLevel,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            notify_on_attach: crate::defaults::bool_false(),
            profile: None,
            join_timeout_ms: crate::defaults::join_timeout_ms(),
            install_helpers: crate::defaults::bool_true(),
            preview_toggle_mapping: crate::defaults::preview_toggle_mapping(),
            unknown_redraw_op: UnknownOpPolicy::default(),
            log_level: LogLevel::default(),
        }
    }
}

impl BridgeConfig {
    /// Dispatcher join timeout as a [`Duration`].
    pub fn join_timeout(&self) -> Duration {
        Duration::from_millis(self.join_timeout_ms)
    }

    /// Check field values that serde cannot express as types.
    ///
    /// # Errors
    /// Returns [`ConfigError::Validation`] naming the offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.join_timeout_ms == 0 {
            return Err(ConfigError::Validation(
                "join_timeout_ms must be greater than zero".to_string(),
            ));
        }
        let mapping = self.preview_toggle_mapping.trim();
        if mapping.is_empty() {
            return Err(ConfigError::Validation(
                "preview_toggle_mapping must not be empty".to_string(),
            ));
        }
        // The mapping is spliced into an `nnoremap` line.
        if mapping.contains(['\n', '\r', '|']) || mapping.contains(char::is_whitespace) {
            return Err(ConfigError::Validation(format!(
                "preview_toggle_mapping {:?} must be a single key sequence",
                self.preview_toggle_mapping
            )));
        }
        Ok(())
    }

    /// Load configuration from the user config file, or create the default.
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path();
        log::info!("Config path: {:?}", config_path);

        if config_path.exists() {
            log::info!("Loading existing config from {:?}", config_path);
            Ok(Self::load_from(&config_path)?)
        } else {
            log::info!(
                "Config file not found, creating default at {:?}",
                config_path
            );
            let config = Self::default();
            if let Err(e) = config.save() {
                log::error!("Failed to save default config: {}", e);
                return Err(e);
            }
            Ok(config)
        }
    }

    /// Parse and validate the YAML file at `path`.
    ///
    /// # Errors
    /// Returns [`ConfigError`] if the file cannot be read, parsed or validated.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;
        let config: Self = if contents.trim().is_empty() {
            Self::default()
        } else {
            serde_yaml_ng::from_str(&contents)?
        };
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to the user config file.
    pub fn save(&self) -> Result<()> {
        Ok(self.save_to(&Self::config_path())?)
    }

    /// Atomically write this configuration to `path` as YAML.
    ///
    /// # Errors
    /// Returns [`ConfigError`] if the directory cannot be created or the file
    /// cannot be written.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let yaml = serde_yaml_ng::to_string(self)?;

        // Write to a sibling temp file then rename so a crash never leaves a
        // truncated config behind.
        let temp_path = path.with_extension("yaml.tmp");
        fs::write(&temp_path, &yaml)?;
        fs::rename(&temp_path, path)?;
        Ok(())
    }

    /// Directory holding the bridge configuration (`~/.config/nvim-bridge`).
    pub fn config_dir() -> PathBuf {
        #[cfg(target_os = "windows")]
        {
            dirs::config_dir()
                .map(|dir| dir.join("nvim-bridge"))
                .unwrap_or_else(|| PathBuf::from("."))
        }
        #[cfg(not(target_os = "windows"))]
        {
            dirs::home_dir()
                .map(|home| home.join(".config").join("nvim-bridge"))
                .unwrap_or_else(|| PathBuf::from("."))
        }
    }

    /// Get the configuration file path.
    pub fn config_path() -> PathBuf {
        Self::config_dir().join("config.yaml")
    }
}
