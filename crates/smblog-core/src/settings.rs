use chrono::{DateTime, Duration, Utc};
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::error::{Result, SmbLogError};

// ── Settings (CLI) ─────────────────────────────────────────────────────────────

/// Turn Samba audit logs into per-user file operation metrics
#[derive(Parser, Debug, Clone)]
#[command(
    name = "smblogparser",
    about = "Turn Samba audit logs into per-user file operation metrics",
    version
)]
pub struct Settings {
    /// Path to the YAML config file
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Read logs from a file or directory instead of the query backend
    #[arg(long, conflicts_with = "query_result")]
    pub file: Option<PathBuf>,

    /// Read a saved log-query JSON response
    #[arg(long)]
    pub query_result: Option<PathBuf>,

    /// Device label attached to every event (overrides query.device)
    #[arg(long)]
    pub device: Option<String>,

    /// Timezone the log timestamps were written in ("auto" for system)
    #[arg(long, default_value = "UTC")]
    pub timezone: String,

    /// Seconds between passes; 0 runs a single pass
    #[arg(long, default_value = "0")]
    pub interval: u64,

    /// Append gauge samples as JSON lines to this file
    #[arg(long)]
    pub metrics_out: Option<PathBuf>,

    /// Logging level
    #[arg(long, default_value = "INFO", value_parser = ["DEBUG", "INFO", "WARNING", "ERROR"])]
    pub log_level: String,

    /// Enable debug logging
    #[arg(long)]
    pub debug: bool,
}

impl Settings {
    /// Parse CLI arguments from the process environment.
    pub fn load() -> Self {
        Self::load_from_args(std::env::args_os())
    }

    /// Parse an explicit argument list and apply the `--debug` override.
    pub fn load_from_args<I, T>(args: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        let mut settings = Settings::parse_from(args);
        if settings.debug {
            settings.log_level = "DEBUG".to_string();
        }
        settings
    }

    /// Device identity for this run: `--device` wins over the config file.
    pub fn effective_device(&self, config: &AppConfig) -> String {
        self.device
            .clone()
            .unwrap_or_else(|| config.query.device.clone())
    }
}

// ── AppConfig (YAML) ───────────────────────────────────────────────────────────

pub const DEFAULT_LOOKBACK_MS: i64 = 5 * 60 * 1000;
pub const DEFAULT_QUERY_LIMIT: u32 = 5000;
pub const DEFAULT_JOB_NAME: &str = "smblogparser";

/// Configuration file contents.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub loki: LokiConfig,
    #[serde(default)]
    pub prometheus: PrometheusConfig,
    #[serde(default)]
    pub query: QueryConfig,
}

/// Log-query backend location.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LokiConfig {
    #[serde(default)]
    pub url: String,
}

/// Metrics collector location.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PrometheusConfig {
    #[serde(default)]
    pub pushgateway_url: String,
    #[serde(default)]
    pub job_name: String,
}

/// What to fetch and how to label it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryConfig {
    #[serde(default)]
    pub query: String,
    /// How far back to query, in milliseconds.
    #[serde(default)]
    pub lookback_ms: i64,
    #[serde(default)]
    pub limit: u32,
    #[serde(default)]
    pub device: String,
}

impl QueryConfig {
    /// `(now - lookback, now)`. A look-back reaching past the representable
    /// range starts at the earliest representable instant.
    pub fn time_range(&self, now: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
        let start = Duration::try_milliseconds(self.lookback_ms)
            .and_then(|lookback| now.checked_sub_signed(lookback))
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        (start, now)
    }
}

impl AppConfig {
    /// Read and parse a config file, then fill zero-valued fields with
    /// defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let content =
            std::fs::read_to_string(path).map_err(|source| SmbLogError::ConfigRead {
                path: path.to_path_buf(),
                source,
            })?;
        Self::from_yaml_str(&content)
    }

    /// Like [`load`](Self::load), but a missing file yields the defaults.
    /// Any other read or parse failure is still an error.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if !path.exists() {
            warn!(
                "Config file {} not found; using defaults",
                path.display()
            );
            return Ok(Self::default().with_defaults());
        }
        Self::load(path)
    }

    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        // An empty document deserialises to `()`, not a mapping.
        if yaml.trim().is_empty() {
            return Ok(Self::default().with_defaults());
        }
        let config: AppConfig = serde_yaml::from_str(yaml)?;
        Ok(config.with_defaults())
    }

    fn with_defaults(mut self) -> Self {
        if self.query.lookback_ms == 0 {
            self.query.lookback_ms = DEFAULT_LOOKBACK_MS;
        }
        if self.query.limit == 0 {
            self.query.limit = DEFAULT_QUERY_LIMIT;
        }
        if self.prometheus.job_name.is_empty() {
            self.prometheus.job_name = DEFAULT_JOB_NAME.to_string();
        }
        self
    }
}

// ── Tests ──────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::TempDir;

    const FULL_YAML: &str = r#"
loki:
  url: http://loki:3100
prometheus:
  pushgateway_url: http://pushgateway:9091
  job_name: samba-audit
query:
  query: '{job="samba"}'
  lookback_ms: 60000
  limit: 100
  device: nas01
"#;

    // ── Settings ──────────────────────────────────────────────────────────────

    #[test]
    fn test_settings_default_values() {
        let settings = Settings::load_from_args(["smblogparser"]);

        assert!(settings.config.is_none());
        assert!(settings.file.is_none());
        assert!(settings.query_result.is_none());
        assert!(settings.device.is_none());
        assert_eq!(settings.timezone, "UTC");
        assert_eq!(settings.interval, 0);
        assert!(settings.metrics_out.is_none());
        assert_eq!(settings.log_level, "INFO");
        assert!(!settings.debug);
    }

    #[test]
    fn test_settings_debug_overrides_log_level() {
        let settings = Settings::load_from_args(["smblogparser", "--log-level", "ERROR", "--debug"]);
        assert_eq!(settings.log_level, "DEBUG");
    }

    #[test]
    fn test_settings_file_conflicts_with_query_result() {
        let result = Settings::try_parse_from([
            "smblogparser",
            "--file",
            "a.log",
            "--query-result",
            "b.json",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_settings_rejects_unknown_log_level() {
        let result = Settings::try_parse_from(["smblogparser", "--log-level", "TRACE"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_effective_device_prefers_cli() {
        let config = AppConfig::from_yaml_str(FULL_YAML).unwrap();

        let settings = Settings::load_from_args(["smblogparser", "--device", "nas99"]);
        assert_eq!(settings.effective_device(&config), "nas99");

        let settings = Settings::load_from_args(["smblogparser"]);
        assert_eq!(settings.effective_device(&config), "nas01");
    }

    // ── AppConfig ─────────────────────────────────────────────────────────────

    #[test]
    fn test_app_config_full_yaml() {
        let config = AppConfig::from_yaml_str(FULL_YAML).unwrap();
        assert_eq!(config.loki.url, "http://loki:3100");
        assert_eq!(config.prometheus.pushgateway_url, "http://pushgateway:9091");
        assert_eq!(config.prometheus.job_name, "samba-audit");
        assert_eq!(config.query.query, r#"{job="samba"}"#);
        assert_eq!(config.query.lookback_ms, 60_000);
        assert_eq!(config.query.limit, 100);
        assert_eq!(config.query.device, "nas01");
    }

    #[test]
    fn test_app_config_defaults_applied() {
        let config = AppConfig::from_yaml_str("query:\n  device: nas01\n").unwrap();
        assert_eq!(config.query.lookback_ms, DEFAULT_LOOKBACK_MS);
        assert_eq!(config.query.limit, DEFAULT_QUERY_LIMIT);
        assert_eq!(config.prometheus.job_name, DEFAULT_JOB_NAME);
        assert_eq!(config.query.device, "nas01");
    }

    #[test]
    fn test_app_config_empty_document() {
        let config = AppConfig::from_yaml_str("").unwrap();
        assert_eq!(config.query.limit, DEFAULT_QUERY_LIMIT);
    }

    #[test]
    fn test_app_config_invalid_yaml() {
        let err = AppConfig::from_yaml_str("query: [unclosed").unwrap_err();
        assert!(matches!(err, SmbLogError::ConfigParse(_)));
    }

    #[test]
    fn test_app_config_load_from_file() {
        let tmp = TempDir::new().expect("tempdir");
        let path = tmp.path().join("config.yaml");
        std::fs::write(&path, FULL_YAML).expect("write");

        let config = AppConfig::load(&path).expect("load");
        assert_eq!(config.query.device, "nas01");
    }

    #[test]
    fn test_app_config_load_missing_is_error() {
        let tmp = TempDir::new().expect("tempdir");
        let err = AppConfig::load(&tmp.path().join("absent.yaml")).unwrap_err();
        assert!(matches!(err, SmbLogError::ConfigRead { .. }));
    }

    #[test]
    fn test_app_config_load_or_default_missing() {
        let tmp = TempDir::new().expect("tempdir");
        let config = AppConfig::load_or_default(&tmp.path().join("absent.yaml")).unwrap();
        assert_eq!(config.prometheus.job_name, DEFAULT_JOB_NAME);
        assert!(config.query.device.is_empty());
    }

    #[test]
    fn test_query_time_range_huge_lookback_saturates() {
        let config = AppConfig::from_yaml_str("query:\n  lookback_ms: 9223372036854775807\n").unwrap();
        let now = Utc.with_ymd_and_hms(2025, 9, 9, 13, 0, 0).unwrap();
        let (start, end) = config.query.time_range(now);
        assert_eq!(end, now);
        assert_eq!(start, DateTime::<Utc>::MIN_UTC);
    }

    #[test]
    fn test_query_time_range() {
        let config = AppConfig::from_yaml_str(FULL_YAML).unwrap();
        let now = Utc.with_ymd_and_hms(2025, 9, 9, 13, 0, 0).unwrap();
        let (start, end) = config.query.time_range(now);
        assert_eq!(end, now);
        assert_eq!(start, Utc.with_ymd_and_hms(2025, 9, 9, 12, 59, 0).unwrap());
    }
}
