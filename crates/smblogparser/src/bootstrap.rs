use std::path::{Path, PathBuf};
use std::sync::Arc;

use smblog_core::settings::{AppConfig, Settings};
use smblog_runtime::source::{FileSource, LineSource, QueryResultSource};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// File name looked up by [`discover_config_path`].
const CONFIG_FILE_NAME: &str = "config.yaml";

// ── Logging bootstrap ──────────────────────────────────────────────────────────

/// Initialise the global `tracing` subscriber.
///
/// `log_level` is one of `DEBUG`, `INFO`, `WARNING`, `ERROR` and is mapped to
/// a [`tracing_subscriber::EnvFilter`] directive. `RUST_LOG` wins when set.
pub fn setup_logging(log_level: &str) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter_directive(log_level)));

    let subscriber = fmt::layer().with_target(false).with_thread_ids(false);

    tracing_subscriber::registry()
        .with(filter)
        .with(subscriber)
        .try_init()?;

    Ok(())
}

/// `tracing` directive for a CLI log level name.
fn filter_directive(log_level: &str) -> &'static str {
    match log_level.to_uppercase().as_str() {
        "DEBUG" => "debug",
        "WARNING" | "WARN" => "warn",
        "ERROR" => "error",
        _ => "info",
    }
}

// ── Config discovery ───────────────────────────────────────────────────────────

/// Locate the config file when none was given on the command line.
///
/// Checks in order and returns the first that exists:
/// 1. `./config.yaml`
/// 2. `~/.config/smblogparser/config.yaml`
pub fn discover_config_path() -> Option<PathBuf> {
    let cwd = std::env::current_dir().ok()?;
    find_config_in(&cwd, dirs::home_dir().as_deref())
}

fn find_config_in(cwd: &Path, home: Option<&Path>) -> Option<PathBuf> {
    let mut candidates = vec![cwd.join(CONFIG_FILE_NAME)];
    if let Some(home) = home {
        candidates.push(home.join(".config").join("smblogparser").join(CONFIG_FILE_NAME));
    }
    candidates.into_iter().find(|p| p.is_file())
}

/// Load the configuration for this run.
///
/// A missing explicit path falls back to the defaults with a warning.
/// Without one, the discovered file is used or, failing that, the defaults.
pub fn load_config(explicit: Option<&Path>) -> anyhow::Result<AppConfig> {
    if let Some(path) = explicit {
        tracing::debug!("Loading config from {}", path.display());
        return Ok(AppConfig::load_or_default(path)?);
    }

    match discover_config_path() {
        Some(path) => {
            tracing::debug!("Loading config from {}", path.display());
            Ok(AppConfig::load(&path)?)
        }
        None => {
            tracing::debug!("No config file found; using defaults");
            Ok(AppConfig::from_yaml_str("")?)
        }
    }
}

// ── Source selection ───────────────────────────────────────────────────────────

/// Pick the line source requested on the command line.
pub fn build_source(settings: &Settings) -> anyhow::Result<Arc<dyn LineSource>> {
    if let Some(path) = &settings.file {
        return Ok(Arc::new(FileSource::new(path)));
    }
    if let Some(path) = &settings.query_result {
        return Ok(Arc::new(QueryResultSource::new(path)));
    }
    anyhow::bail!("no log source given: pass --file <PATH> or --query-result <PATH>")
}

// ── Tests ──────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use smblog_data::reconstruct::Framing;
    use tempfile::TempDir;

    // ── filter_directive ──────────────────────────────────────────────────────

    #[test]
    fn test_filter_directive() {
        assert_eq!(filter_directive("DEBUG"), "debug");
        assert_eq!(filter_directive("INFO"), "info");
        assert_eq!(filter_directive("WARNING"), "warn");
        assert_eq!(filter_directive("error"), "error");
        assert_eq!(filter_directive("bogus"), "info");
    }

    // ── find_config_in ────────────────────────────────────────────────────────

    #[test]
    fn test_find_config_returns_none_when_absent() {
        let cwd = TempDir::new().expect("tempdir");
        let home = TempDir::new().expect("tempdir");
        assert!(find_config_in(cwd.path(), Some(home.path())).is_none());
        assert!(find_config_in(cwd.path(), None).is_none());
    }

    #[test]
    fn test_find_config_prefers_working_directory() {
        let cwd = TempDir::new().expect("tempdir");
        let home = TempDir::new().expect("tempdir");
        let local = cwd.path().join("config.yaml");
        std::fs::write(&local, "query:\n  device: nas01\n").expect("write config");
        let user_dir = home.path().join(".config").join("smblogparser");
        std::fs::create_dir_all(&user_dir).expect("create config dir");
        std::fs::write(user_dir.join("config.yaml"), "").expect("write config");

        assert_eq!(find_config_in(cwd.path(), Some(home.path())), Some(local));
    }

    #[test]
    fn test_find_config_falls_back_to_home() {
        let cwd = TempDir::new().expect("tempdir");
        let home = TempDir::new().expect("tempdir");
        let user_dir = home.path().join(".config").join("smblogparser");
        std::fs::create_dir_all(&user_dir).expect("create config dir");
        let path = user_dir.join("config.yaml");
        std::fs::write(&path, "").expect("write config");

        assert_eq!(find_config_in(cwd.path(), Some(home.path())), Some(path));
    }

    // ── load_config ───────────────────────────────────────────────────────────

    #[test]
    fn test_load_config_explicit_path() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("smb.yaml");
        std::fs::write(&path, "query:\n  device: nas07\n").expect("write config");

        let config = load_config(Some(path.as_path())).expect("config loads");
        assert_eq!(config.query.device, "nas07");
        assert_eq!(config.query.limit, 5000);
    }

    #[test]
    fn test_load_config_explicit_missing_uses_defaults() {
        let dir = TempDir::new().expect("tempdir");
        let config = load_config(Some(dir.path().join("missing.yaml").as_path())).expect("defaults");
        assert_eq!(config.prometheus.job_name, "smblogparser");
        assert!(config.query.device.is_empty());
    }

    #[test]
    fn test_load_config_explicit_invalid_is_error() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("bad.yaml");
        std::fs::write(&path, "query: [unclosed").expect("write config");
        assert!(load_config(Some(path.as_path())).is_err());
    }

    // ── build_source ──────────────────────────────────────────────────────────

    #[test]
    fn test_build_source_file() {
        let settings = Settings::load_from_args(["smblogparser", "--file", "/var/log/samba"]);
        let source = build_source(&settings).expect("source");
        assert_eq!(source.framing(), Framing::DirectRead);
        assert_eq!(source.name(), "file:/var/log/samba");
    }

    #[test]
    fn test_build_source_query_result() {
        let settings = Settings::load_from_args(["smblogparser", "--query-result", "q.json"]);
        let source = build_source(&settings).expect("source");
        assert_eq!(source.framing(), Framing::Reassembly);
    }

    #[test]
    fn test_build_source_requires_a_source() {
        let settings = Settings::load_from_args(["smblogparser"]);
        assert!(build_source(&settings).is_err());
    }
}
