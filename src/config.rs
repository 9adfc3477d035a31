//! Agent configuration: the TOML device roster and per-device settings.
//!
//! Raw settings are validated field by field. An invalid field falls
//! back to its documented default without invalidating the others, so
//! one bad value never takes a whole device out of the roster. The same
//! rules apply to live settings patches.

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;
use tracing::{error, info, warn};

pub const MIN_CHECK_INTERVAL_SECONDS: u64 = 5;
pub const DEFAULT_CHECK_INTERVAL_SECONDS: u64 = 15;
pub const MIN_PROBE_TIMEOUT_SECONDS: u64 = 2;
pub const DEFAULT_PROBE_TIMEOUT_SECONDS: u64 = 10;
pub const DEFAULT_FAILURE_THRESHOLD: u32 = 1;
pub const DEFAULT_LOG_LEVEL: u8 = 1;

/// Host value that disables probing. Used as the fallback when the
/// configured host is missing or blank.
pub const INVALID_HOST_SENTINEL: &str = "0.0.0.0";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },
}

#[derive(Debug, Clone, Deserialize)]
pub struct AgentConfig {
    #[serde(default = "default_log_level")]
    pub log_level: u8,
    #[serde(default)]
    pub devices: Vec<RawDeviceSettings>,
}

fn default_log_level() -> u8 {
    DEFAULT_LOG_LEVEL
}

/// Settings exactly as they arrive from the roster file, unvalidated.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawDeviceSettings {
    pub name: String,
    pub host: Option<String>,
    pub port: Option<u32>,
    pub check_interval_seconds: Option<i64>,
    pub probe_timeout_seconds: Option<i64>,
    pub failure_threshold: Option<i64>,
}

/// Validated per-device operating parameters. Fields never hold raw
/// user input once this exists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceConfig {
    pub name: String,
    pub host: String,
    pub port: Option<u16>,
    pub check_interval_seconds: u64,
    pub probe_timeout_seconds: u64,
    pub failure_threshold: u32,
}

impl RawDeviceSettings {
    pub fn validate(&self) -> DeviceConfig {
        DeviceConfig {
            name: self.name.clone(),
            host: validate_host(&self.name, self.host.as_deref()),
            port: validate_port(&self.name, self.port),
            check_interval_seconds: validate_seconds(
                &self.name,
                "check_interval_seconds",
                self.check_interval_seconds,
                MIN_CHECK_INTERVAL_SECONDS,
                DEFAULT_CHECK_INTERVAL_SECONDS,
            ),
            probe_timeout_seconds: validate_seconds(
                &self.name,
                "probe_timeout_seconds",
                self.probe_timeout_seconds,
                MIN_PROBE_TIMEOUT_SECONDS,
                DEFAULT_PROBE_TIMEOUT_SECONDS,
            ),
            failure_threshold: validate_threshold(&self.name, self.failure_threshold),
        }
    }
}

fn validate_host(device: &str, host: Option<&str>) -> String {
    match host {
        Some(h) if !h.trim().is_empty() => h.trim().to_string(),
        _ => {
            warn!(device, "Invalid host setting, probing disabled.");
            INVALID_HOST_SENTINEL.to_string()
        }
    }
}

fn validate_port(device: &str, port: Option<u32>) -> Option<u16> {
    match port {
        None => None,
        Some(p) if (1..=65535).contains(&p) => Some(p as u16),
        Some(p) => {
            warn!(device, port = p, "Invalid port setting, treating device as portless.");
            None
        }
    }
}

fn validate_seconds(device: &str, field: &str, value: Option<i64>, floor: u64, default: u64) -> u64 {
    match value {
        Some(v) if v >= floor as i64 => v as u64,
        Some(v) => {
            warn!(device, field, value = v, fallback = default, "Setting below minimum, using default.");
            default
        }
        None => default,
    }
}

fn validate_threshold(device: &str, value: Option<i64>) -> u32 {
    match value {
        Some(v) if v >= 1 && v <= u32::MAX as i64 => v as u32,
        Some(v) => {
            warn!(
                device,
                value = v,
                fallback = DEFAULT_FAILURE_THRESHOLD,
                "Invalid failure threshold, using default."
            );
            DEFAULT_FAILURE_THRESHOLD
        }
        None => DEFAULT_FAILURE_THRESHOLD,
    }
}

impl DeviceConfig {
    pub fn has_defined_port(&self) -> bool {
        self.port.is_some()
    }

    pub fn host_is_valid(&self) -> bool {
        self.host != INVALID_HOST_SENTINEL
    }

    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(self.check_interval_seconds)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_seconds)
    }

    /// Log-friendly identity: `name - host` plus the port when one is
    /// defined.
    pub fn display_name(&self) -> String {
        match self.port {
            Some(port) => format!("{} - {}: {}", self.name, self.host, port),
            None => format!("{} - {}", self.name, self.host),
        }
    }

    /// Apply a live settings patch, re-validating only the changed
    /// fields. Returns the names of the fields that were updated.
    pub fn apply_patch(&mut self, patch: &SettingsPatch) -> Vec<&'static str> {
        let mut changed = Vec::new();
        if let Some(host) = &patch.host {
            self.host = validate_host(&self.name, Some(host));
            info!(device = %self.name, host = %self.host, "Host setting changed.");
            changed.push("host");
        }
        if let Some(port) = patch.port {
            self.port = validate_port(&self.name, port);
            info!(device = %self.name, port = ?self.port, "Port setting changed.");
            changed.push("port");
        }
        if let Some(interval) = patch.check_interval_seconds {
            self.check_interval_seconds = validate_seconds(
                &self.name,
                "check_interval_seconds",
                Some(interval),
                MIN_CHECK_INTERVAL_SECONDS,
                DEFAULT_CHECK_INTERVAL_SECONDS,
            );
            info!(device = %self.name, seconds = self.check_interval_seconds, "Check interval changed.");
            changed.push("check_interval_seconds");
        }
        if let Some(timeout) = patch.probe_timeout_seconds {
            self.probe_timeout_seconds = validate_seconds(
                &self.name,
                "probe_timeout_seconds",
                Some(timeout),
                MIN_PROBE_TIMEOUT_SECONDS,
                DEFAULT_PROBE_TIMEOUT_SECONDS,
            );
            info!(device = %self.name, seconds = self.probe_timeout_seconds, "Probe timeout changed.");
            changed.push("probe_timeout_seconds");
        }
        if let Some(threshold) = patch.failure_threshold {
            self.failure_threshold = validate_threshold(&self.name, Some(threshold));
            info!(device = %self.name, threshold = self.failure_threshold, "Failure threshold changed.");
            changed.push("failure_threshold");
        }
        changed
    }
}

/// A settings update from outside: only the populated fields changed.
/// `port: Some(None)` clears the port, turning the device portless.
#[derive(Debug, Clone, Default)]
pub struct SettingsPatch {
    pub host: Option<String>,
    pub port: Option<Option<u32>>,
    pub check_interval_seconds: Option<i64>,
    pub probe_timeout_seconds: Option<i64>,
    pub failure_threshold: Option<i64>,
}

pub fn load_config(path_str: &str) -> Result<AgentConfig, ConfigError> {
    let path = Path::new(path_str);
    let absolute = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
    info!(path = ?absolute, "Attempting to load config.");

    let contents = fs::read_to_string(path).map_err(|e| {
        error!(path = %path_str, error = %e, "Failed to read config file.");
        ConfigError::Read {
            path: path_str.to_string(),
            source: e,
        }
    })?;

    let config: AgentConfig = toml::from_str(&contents).map_err(|e| {
        error!(path = %path_str, error = %e, "Failed to parse config file.");
        ConfigError::Parse {
            path: path_str.to_string(),
            source: e,
        }
    })?;

    info!(devices = config.devices.len(), log_level = config.log_level, "Loaded config successfully.");
    Ok(config)
}
