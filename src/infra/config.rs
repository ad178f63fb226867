//! Configuration loading from TOML files
//!
//! Config file is selected via:
//! 1. --config <path> command line argument
//! 2. CONFIG_FILE environment variable
//! 3. Default: config/dev.toml
//!
//! Environment variables are applied on top of the file (see
//! `apply_env_overrides`).

use crate::domain::types::Mode;
use anyhow::Context;
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScannerSource {
    /// Linux evdev keyboard device
    Hid,
    /// Serial port (SPP scanners)
    Serial,
    /// Barcodes typed from a text file
    Replay,
    /// No physical input; only the control surface submits scans
    None,
}

impl ScannerSource {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "hid" => Some(ScannerSource::Hid),
            "serial" => Some(ScannerSource::Serial),
            "replay" => Some(ScannerSource::Replay),
            "none" => Some(ScannerSource::None),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScannerConfig {
    #[serde(default = "default_scanner_source")]
    pub source: ScannerSource,
    /// Empty means auto-detect (hid only)
    #[serde(default)]
    pub device: String,
    #[serde(default = "default_baud")]
    pub baud: u32,
    #[serde(default = "default_scanner_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default)]
    pub test_mode: bool,
    #[serde(default = "default_mode")]
    pub default_mode: Mode,
    #[serde(default)]
    pub replay_file: Option<String>,
}

fn default_scanner_source() -> ScannerSource {
    ScannerSource::Hid
}

fn default_baud() -> u32 {
    9600
}

fn default_scanner_timeout_ms() -> u64 {
    500
}

fn default_mode() -> Mode {
    Mode::Consume
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            source: default_scanner_source(),
            device: String::new(),
            baud: default_baud(),
            timeout_ms: default_scanner_timeout_ms(),
            test_mode: false,
            default_mode: default_mode(),
            replay_file: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct InventoryConfig {
    #[serde(default)]
    pub api_url: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_inventory_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_shopping_list_id")]
    pub shopping_list_id: i64,
    #[serde(default)]
    pub prepend_new_text: String,
    #[serde(default)]
    pub append_new_text: String,
    #[serde(default)]
    pub default_best_before_days: Option<i64>,
}

fn default_inventory_timeout_ms() -> u64 {
    5000
}

fn default_shopping_list_id() -> i64 {
    1
}

impl Default for InventoryConfig {
    fn default() -> Self {
        Self {
            api_url: String::new(),
            api_key: String::new(),
            timeout_ms: default_inventory_timeout_ms(),
            shopping_list_id: default_shopping_list_id(),
            prepend_new_text: String::new(),
            append_new_text: String::new(),
            default_best_before_days: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ControlConfig {
    /// HTTP control port (0 to disable)
    #[serde(default = "default_control_port")]
    pub port: u16,
}

fn default_control_port() -> u16 {
    8080
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self { port: default_control_port() }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    #[serde(default = "default_metrics_interval")]
    pub interval_secs: u64,
}

fn default_metrics_interval() -> u64 {
    60
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self { interval_secs: default_metrics_interval() }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: LogFormat,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> LogFormat {
    LogFormat::Text
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: default_log_level(), format: default_log_format() }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TomlConfig {
    #[serde(default)]
    pub scanner: ScannerConfig,
    #[serde(default)]
    pub inventory: InventoryConfig,
    #[serde(default)]
    pub control: ControlConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Main configuration struct used throughout the application
#[derive(Debug, Clone)]
pub struct Config {
    scanner_source: ScannerSource,
    scanner_device: String,
    scanner_baud: u32,
    scanner_timeout_ms: u64,
    test_mode: bool,
    default_mode: Mode,
    replay_file: Option<String>,
    api_url: String,
    api_key: String,
    inventory_timeout_ms: u64,
    shopping_list_id: i64,
    prepend_new_text: String,
    append_new_text: String,
    default_best_before_days: Option<i64>,
    control_port: u16,
    metrics_interval_secs: u64,
    log_level: String,
    log_format: LogFormat,
    config_file: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            scanner_source: ScannerSource::Hid,
            scanner_device: String::new(),
            scanner_baud: 9600,
            scanner_timeout_ms: 500,
            test_mode: false,
            default_mode: Mode::Consume,
            replay_file: None,
            api_url: String::new(),
            api_key: String::new(),
            inventory_timeout_ms: 5000,
            shopping_list_id: 1,
            prepend_new_text: String::new(),
            append_new_text: String::new(),
            default_best_before_days: None,
            control_port: 8080,
            metrics_interval_secs: 60,
            log_level: "info".to_string(),
            log_format: LogFormat::Text,
            config_file: "default".to_string(),
        }
    }
}

impl Config {
    /// Determine config file path from the CLI value or environment
    pub fn resolve_config_path(cli_path: Option<&str>) -> String {
        if let Some(path) = cli_path {
            return path.to_string();
        }

        if let Ok(path) = env::var("CONFIG_FILE") {
            return path;
        }

        "config/dev.toml".to_string()
    }

    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;

        let toml_config: TomlConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;

        Ok(Self {
            scanner_source: toml_config.scanner.source,
            scanner_device: toml_config.scanner.device,
            scanner_baud: toml_config.scanner.baud,
            scanner_timeout_ms: toml_config.scanner.timeout_ms,
            test_mode: toml_config.scanner.test_mode,
            default_mode: toml_config.scanner.default_mode,
            replay_file: toml_config.scanner.replay_file,
            api_url: toml_config.inventory.api_url,
            api_key: toml_config.inventory.api_key,
            inventory_timeout_ms: toml_config.inventory.timeout_ms,
            shopping_list_id: toml_config.inventory.shopping_list_id,
            prepend_new_text: toml_config.inventory.prepend_new_text,
            append_new_text: toml_config.inventory.append_new_text,
            default_best_before_days: toml_config.inventory.default_best_before_days,
            control_port: toml_config.control.port,
            metrics_interval_secs: toml_config.metrics.interval_secs,
            log_level: toml_config.logging.level,
            log_format: toml_config.logging.format,
            config_file: path.display().to_string(),
        })
    }

    /// Load configuration from a specific path, falls back to defaults
    pub fn load_from_path(path: &str) -> Self {
        match Self::from_file(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Warning: {:#}. Using defaults.", e);
                Self::default()
            }
        }
    }

    /// Resolve, load and overlay the process environment
    pub fn load(cli_path: Option<&str>) -> Self {
        let path = Self::resolve_config_path(cli_path);
        let mut config = Self::load_from_path(&path);
        config.apply_env_overrides(|key| env::var(key).ok());
        config
    }

    /// Overlay environment values; `lookup` is injectable for tests
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("GROCY_API_URL") {
            self.api_url = v;
        }
        if let Some(v) = lookup("GROCY_API_KEY") {
            self.api_key = v;
        }
        if let Some(v) = lookup("APPEND_NEW_PRODUCT_TEXT") {
            self.append_new_text = v;
        }
        if let Some(v) = lookup("PREPEND_NEW_PRODUCT_TEXT") {
            self.prepend_new_text = v;
        }
        if let Some(v) = lookup("DEFAULT_BEST_BEFORE_DAYS") {
            match v.trim().parse::<i64>() {
                Ok(days) => self.default_best_before_days = Some(days),
                Err(_) => eprintln!("Warning: ignoring invalid DEFAULT_BEST_BEFORE_DAYS={}", v),
            }
        }
        if let Some(v) = lookup("SCANNER_SOURCE") {
            match ScannerSource::parse(&v) {
                Some(source) => self.scanner_source = source,
                None => eprintln!("Warning: ignoring invalid SCANNER_SOURCE={}", v),
            }
        }
        if let Some(v) = lookup("SCANNER_DEVICE") {
            self.scanner_device = v;
        }
        if let Some(v) = lookup("LOG_LEVEL") {
            self.log_level = v;
        }
        if let Some(v) = lookup("TEST_MODE") {
            self.test_mode = v.trim().eq_ignore_ascii_case("true");
        }
    }

    /// Reject configurations the inventory client cannot work with
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.api_url.trim().is_empty() {
            anyhow::bail!("inventory api_url is not set (GROCY_API_URL)");
        }
        if self.api_key.trim().is_empty() {
            anyhow::bail!("inventory api_key is not set (GROCY_API_KEY)");
        }
        Ok(())
    }

    pub fn scanner_source(&self) -> ScannerSource {
        self.scanner_source
    }

    pub fn scanner_device(&self) -> &str {
        &self.scanner_device
    }

    pub fn scanner_baud(&self) -> u32 {
        self.scanner_baud
    }

    pub fn scanner_timeout_ms(&self) -> u64 {
        self.scanner_timeout_ms
    }

    pub fn test_mode(&self) -> bool {
        self.test_mode
    }

    pub fn default_mode(&self) -> Mode {
        self.default_mode
    }

    pub fn replay_file(&self) -> Option<&str> {
        self.replay_file.as_deref()
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    pub fn inventory_timeout_ms(&self) -> u64 {
        self.inventory_timeout_ms
    }

    pub fn shopping_list_id(&self) -> i64 {
        self.shopping_list_id
    }

    pub fn prepend_new_text(&self) -> &str {
        &self.prepend_new_text
    }

    pub fn append_new_text(&self) -> &str {
        &self.append_new_text
    }

    pub fn default_best_before_days(&self) -> Option<i64> {
        self.default_best_before_days
    }

    pub fn control_port(&self) -> u16 {
        self.control_port
    }

    pub fn metrics_interval_secs(&self) -> u64 {
        self.metrics_interval_secs
    }

    pub fn log_level(&self) -> &str {
        &self.log_level
    }

    pub fn log_format(&self) -> LogFormat {
        self.log_format
    }

    pub fn config_file(&self) -> &str {
        &self.config_file
    }

    /// Builder method for tests
    pub fn with_test_mode(mut self, enabled: bool) -> Self {
        self.test_mode = enabled;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.scanner_source(), ScannerSource::Hid);
        assert_eq!(config.scanner_timeout_ms(), 500);
        assert_eq!(config.default_mode(), Mode::Consume);
        assert_eq!(config.inventory_timeout_ms(), 5000);
        assert_eq!(config.shopping_list_id(), 1);
        assert_eq!(config.control_port(), 8080);
        assert!(!config.test_mode());
        assert!(config.with_test_mode(true).test_mode());
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("GROCY_API_URL", "http://grocy.local/api"),
            ("GROCY_API_KEY", "secret"),
            ("DEFAULT_BEST_BEFORE_DAYS", "7"),
            ("SCANNER_SOURCE", "Serial"),
            ("TEST_MODE", "TRUE"),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config.apply_env_overrides(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.api_url(), "http://grocy.local/api");
        assert_eq!(config.api_key(), "secret");
        assert_eq!(config.default_best_before_days(), Some(7));
        assert_eq!(config.scanner_source(), ScannerSource::Serial);
        assert!(config.test_mode());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_env_values_ignored() {
        let mut config = Config::default();
        config.apply_env_overrides(|key| match key {
            "SCANNER_SOURCE" => Some("bluetooth".to_string()),
            "DEFAULT_BEST_BEFORE_DAYS" => Some("soon".to_string()),
            "TEST_MODE" => Some("yes".to_string()),
            _ => None,
        });
        assert_eq!(config.scanner_source(), ScannerSource::Hid);
        assert_eq!(config.default_best_before_days(), None);
        assert!(!config.test_mode());
    }

    #[test]
    fn test_validate_requires_credentials() {
        let config = Config::default();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.apply_env_overrides(|key| match key {
            "GROCY_API_URL" => Some("http://grocy/api".to_string()),
            _ => None,
        });
        assert!(config.validate().is_err());
    }
}
