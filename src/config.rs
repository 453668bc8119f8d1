//! Application settings (`~/.config/calcron/config.toml` plus `CALCRON_*`).
//!
//! These tune how a pass runs. What to schedule lives in the per-instance
//! settings file instead (see `calcron_core::state`).

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Duration;
use config::{Config, Environment, File};
use serde::Deserialize;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// How far ahead to fetch events, e.g. "7d".
    pub horizon: String,
    /// How far back the relay flavor re-reads, e.g. "1h".
    pub relay_lookback: String,
    pub at_binary: String,
    pub relay_command: String,
    /// Optional debug-level log file, relative to the home directory.
    pub log_file: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            horizon: "7d".to_string(),
            relay_lookback: "1h".to_string(),
            at_binary: "at".to_string(),
            relay_command: "relay".to_string(),
            log_file: None,
        }
    }
}

impl AppConfig {
    pub fn load() -> Result<Self> {
        let path = config_path()?;
        Self::load_from(&path)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        Config::builder()
            .add_source(File::from(path).required(false))
            .add_source(Environment::with_prefix("CALCRON"))
            .build()
            .context("Failed to read calcron config")?
            .try_deserialize()
            .context("Invalid calcron config")
    }

    pub fn horizon(&self) -> Result<Duration> {
        parse_duration(&self.horizon).context("Invalid horizon")
    }

    pub fn relay_lookback(&self) -> Result<Duration> {
        parse_duration(&self.relay_lookback).context("Invalid relay_lookback")
    }

    pub fn log_path(&self) -> Result<Option<PathBuf>> {
        self.log_file.as_deref().map(home_path).transpose()
    }
}

/// Parse a humantime duration ("7d", "90min", "1h 30m").
pub fn parse_duration(input: &str) -> Result<Duration> {
    let std_dur = humantime::parse_duration(input.trim()).map_err(|e| anyhow::anyhow!("{}", e))?;
    Ok(Duration::from_std(std_dur)?)
}

/// Get the config file path (~/.config/calcron/config.toml)
pub fn config_path() -> Result<PathBuf> {
    let config_dir = dirs::config_dir()
        .context("Could not determine config directory")?
        .join("calcron");
    Ok(config_dir.join("config.toml"))
}

/// Expand `~` and take relative paths from the home directory.
pub fn home_path(arg: &Path) -> Result<PathBuf> {
    let expanded = PathBuf::from(shellexpand::tilde(&arg.to_string_lossy()).into_owned());
    if expanded.is_absolute() {
        return Ok(expanded);
    }

    let home = dirs::home_dir().context("Could not determine home directory")?;
    Ok(home.join(expanded))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_without_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let app = AppConfig::load_from(&dir.path().join("missing.toml")).unwrap();

        assert_eq!(app.at_binary, "at");
        assert_eq!(app.horizon().unwrap(), Duration::days(7));
        assert_eq!(app.relay_lookback().unwrap(), Duration::hours(1));
    }

    #[test]
    fn test_config_file_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "horizon = \"2d\"\nrelay_command = \"/usr/local/bin/gpio\"\n")
            .unwrap();

        let app = AppConfig::load_from(&path).unwrap();

        assert_eq!(app.horizon().unwrap(), Duration::days(2));
        assert_eq!(app.relay_command, "/usr/local/bin/gpio");
        assert_eq!(app.relay_lookback, "1h");
        assert_eq!(app.log_path().unwrap(), None);
    }

    #[test]
    fn test_log_file_is_taken_from_home() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "log_file = \"logs/calcron.log\"\n").unwrap();

        let app = AppConfig::load_from(&path).unwrap();

        assert_eq!(
            app.log_path().unwrap(),
            Some(dirs::home_dir().unwrap().join("logs/calcron.log"))
        );
    }

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration("90min").unwrap(), Duration::minutes(90));
        assert_eq!(parse_duration(" 1h 30m ").unwrap(), Duration::minutes(90));
        assert!(parse_duration("soon").is_err());
    }

    #[test]
    fn test_home_path() {
        let home = dirs::home_dir().unwrap();

        assert_eq!(home_path(Path::new(".calcron")).unwrap(), home.join(".calcron"));
        assert_eq!(home_path(Path::new("~/x/.calcron")).unwrap(), home.join("x/.calcron"));
        assert_eq!(
            home_path(Path::new("/etc/calcron.json")).unwrap(),
            PathBuf::from("/etc/calcron.json")
        );
    }
}
