//! Sendloom configuration system.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::Result;

/// Root configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendloomConfig {
    #[serde(default)]
    pub rate: RateConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub transport: TransportConfig,
    #[serde(default)]
    pub ledger: LedgerConfig,
}

impl Default for SendloomConfig {
    fn default() -> Self {
        Self {
            rate: RateConfig::default(),
            retry: RetryConfig::default(),
            transport: TransportConfig::default(),
            ledger: LedgerConfig::default(),
        }
    }
}

impl SendloomConfig {
    /// Load config from the default path (~/.sendloom/config.toml).
    pub fn load() -> Result<Self> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load config from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            crate::error::SendloomError::Config(format!("Failed to read config: {e}"))
        })?;
        let config: Self = toml::from_str(&content).map_err(|e| {
            crate::error::SendloomError::Config(format!("Failed to parse config: {e}"))
        })?;
        Ok(config)
    }

    /// Save config to the default path.
    pub fn save(&self) -> Result<()> {
        let path = Self::default_path();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self).map_err(|e| {
            crate::error::SendloomError::Config(format!("Failed to serialize config: {e}"))
        })?;
        std::fs::write(&path, content)?;
        Ok(())
    }

    /// Get the default config path.
    pub fn default_path() -> PathBuf {
        Self::home_dir().join("config.toml")
    }

    /// Get the sendloom home directory.
    pub fn home_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".sendloom")
    }
}

/// Send pacing configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateConfig {
    /// Target outbound rate; the gate enforces the derived minimum interval.
    #[serde(default = "default_messages_per_minute")]
    pub messages_per_minute: u32,
}

fn default_messages_per_minute() -> u32 {
    6
}

impl Default for RateConfig {
    fn default() -> Self {
        Self {
            messages_per_minute: default_messages_per_minute(),
        }
    }
}

/// Retry policy applied around each delivery attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_initial_delay")]
    pub initial_delay_ms: u64,
    #[serde(default = "default_max_delay")]
    pub max_delay_ms: u64,
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,
}

fn default_max_attempts() -> u32 {
    3
}
fn default_initial_delay() -> u64 {
    1000
}
fn default_max_delay() -> u64 {
    10000
}
fn default_backoff_multiplier() -> f64 {
    2.0
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay_ms: default_initial_delay(),
            max_delay_ms: default_max_delay(),
            backoff_multiplier: default_backoff_multiplier(),
        }
    }
}

/// Browser transport configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransportConfig {
    /// WebDriver endpoint (chromedriver).
    #[serde(default = "default_webdriver_url")]
    pub webdriver_url: String,
    /// Browser profile directory, keeps the WhatsApp Web login across runs.
    #[serde(default = "default_profile_dir")]
    pub profile_dir: String,
    /// Seconds to wait for WhatsApp Web to reach a logged-in state.
    #[serde(default = "default_login_timeout")]
    pub login_timeout_secs: u64,
    /// Seconds to wait for a delivery marker after pressing send.
    #[serde(default = "default_send_timeout")]
    pub send_timeout_secs: u64,
    /// Directory for diagnostic screenshots.
    #[serde(default = "default_screenshot_dir")]
    pub screenshot_dir: String,
    /// Run the browser headless.
    #[serde(default)]
    pub headless: bool,
}

fn default_webdriver_url() -> String {
    "http://127.0.0.1:9515".into()
}
fn default_profile_dir() -> String {
    "~/.sendloom/browser-profile".into()
}
fn default_login_timeout() -> u64 {
    120
}
fn default_send_timeout() -> u64 {
    30
}
fn default_screenshot_dir() -> String {
    "~/.sendloom/screenshots".into()
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            webdriver_url: default_webdriver_url(),
            profile_dir: default_profile_dir(),
            login_timeout_secs: default_login_timeout(),
            send_timeout_secs: default_send_timeout(),
            screenshot_dir: default_screenshot_dir(),
            headless: false,
        }
    }
}

/// Duplicate-ledger configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerConfig {
    #[serde(default = "default_ledger_path")]
    pub path: String,
    /// Entries older than this are eligible for `ledger cleanup`.
    #[serde(default = "default_retention_days")]
    pub retention_days: i64,
}

fn default_ledger_path() -> String {
    "~/.sendloom/sent.json".into()
}
fn default_retention_days() -> i64 {
    365
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            path: default_ledger_path(),
            retention_days: default_retention_days(),
        }
    }
}
