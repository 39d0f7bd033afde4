//! Configuration system for the nvim-bridge UI/editor bridge.
//!
//! This crate provides configuration loading, saving, validation and default
//! values for the bridge. It includes:
//!
//! - [`BridgeConfig`], the YAML-backed settings struct
//! - Bridge option types ([`LogLevel`], [`ProfileSort`], [`UnknownOpPolicy`])
//! - [`ConfigError`] for callers that want to match on failure modes

pub mod config;
pub mod defaults;
pub mod error;
mod types;

pub use config::BridgeConfig;
pub use error::ConfigError;
pub use types::{LogLevel, ProfileSort, UnknownOpPolicy};
