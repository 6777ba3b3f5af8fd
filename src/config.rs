use crate::cadence::DEFAULT_PERIOD;
use crate::logger::DEFAULT_FLUSH_THRESHOLD;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
    #[serde(default = "default_flush_threshold")]
    pub flush_threshold: usize,
    #[serde(default)]
    pub display: DisplayMode,
    #[serde(default = "default_chart_history")]
    pub chart_history: usize,
    #[serde(default = "default_chart_height")]
    pub chart_height: usize,
    #[serde(default = "default_shutdown_grace_ms")]
    pub shutdown_grace_ms: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DisplayMode {
    #[default]
    Dashboard,
    Charts,
    Off,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_dir: default_log_dir(),
            interval_ms: default_interval_ms(),
            flush_threshold: default_flush_threshold(),
            display: DisplayMode::default(),
            chart_history: default_chart_history(),
            chart_height: default_chart_height(),
            shutdown_grace_ms: default_shutdown_grace_ms(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("не удалось прочитать файл конфигурации {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("не удалось разобрать YAML в {path}: {source}")]
    Parse {
        path: String,
        source: serde_yaml::Error,
    },
    #[error("ошибка валидации конфигурации: {0}")]
    Validation(String),
}

impl Config {
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path_ref = path.as_ref();
        let path_display = path_ref.display().to_string();
        let text = fs::read_to_string(path_ref).map_err(|source| ConfigError::Read {
            path: path_display.clone(),
            source,
        })?;

        let cfg = Self::from_yaml(&text).map_err(|err| match err {
            ConfigError::Parse { source, .. } => ConfigError::Parse {
                path: path_display,
                source,
            },
            other => other,
        })?;
        Ok(cfg)
    }

    pub fn from_yaml(text: &str) -> Result<Self, ConfigError> {
        let cfg: Config = serde_yaml::from_str(text).map_err(|source| ConfigError::Parse {
            path: "<inline>".to_string(),
            source,
        })?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.log_dir.as_os_str().is_empty() {
            return Err(ConfigError::Validation(
                "поле log_dir не должно быть пустым".to_string(),
            ));
        }
        if self.interval_ms < 100 {
            return Err(ConfigError::Validation(
                "interval_ms должно быть >= 100".to_string(),
            ));
        }
        if self.flush_threshold < 1 {
            return Err(ConfigError::Validation(
                "flush_threshold должно быть >= 1".to_string(),
            ));
        }
        if self.chart_history < 2 {
            return Err(ConfigError::Validation(
                "chart_history должно быть >= 2".to_string(),
            ));
        }
        if self.chart_height < 2 {
            return Err(ConfigError::Validation(
                "chart_height должно быть >= 2".to_string(),
            ));
        }

        Ok(())
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }

    pub fn example_yaml() -> &'static str {
        include_str!("../config.yaml.example")
    }
}

fn default_log_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_interval_ms() -> u64 {
    DEFAULT_PERIOD.as_millis() as u64
}

const fn default_flush_threshold() -> usize {
    DEFAULT_FLUSH_THRESHOLD
}

const fn default_chart_history() -> usize {
    60
}

const fn default_chart_height() -> usize {
    8
}

const fn default_shutdown_grace_ms() -> u64 {
    1000
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_fixed_constants() {
        let cfg = Config::default();
        cfg.validate().expect("defaults must be valid");
        assert_eq!(cfg.interval(), Duration::from_secs(1));
        assert_eq!(cfg.flush_threshold, 60);
        assert_eq!(cfg.log_dir, PathBuf::from("."));
        assert_eq!(cfg.display, DisplayMode::Dashboard);
    }

    #[test]
    fn example_yaml_parses_to_defaults() {
        let cfg = Config::from_yaml(Config::example_yaml()).expect("example must parse");
        let defaults = Config::default();
        assert_eq!(cfg.interval_ms, defaults.interval_ms);
        assert_eq!(cfg.flush_threshold, defaults.flush_threshold);
        assert_eq!(cfg.display, defaults.display);
        assert_eq!(cfg.chart_history, defaults.chart_history);
    }

    #[test]
    fn partial_yaml_fills_defaults() {
        let cfg = Config::from_yaml("display: charts\nlog_dir: /var/log/hostlog\n")
            .expect("partial config");
        assert_eq!(cfg.display, DisplayMode::Charts);
        assert_eq!(cfg.log_dir, PathBuf::from("/var/log/hostlog"));
        assert_eq!(cfg.flush_threshold, 60);
    }

    #[test]
    fn too_short_interval_is_rejected() {
        let err = Config::from_yaml("interval_ms: 10\n").expect_err("must fail");
        assert!(matches!(err, ConfigError::Validation(_)));
    }

    #[test]
    fn zero_threshold_is_rejected() {
        let mut cfg = Config::default();
        cfg.flush_threshold = 0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn unknown_display_mode_is_a_parse_error() {
        let err = Config::from_yaml("display: fancy\n").expect_err("must fail");
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn missing_file_is_a_read_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let err = Config::load_from_file(dir.path().join("absent.yaml")).expect_err("must fail");
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
