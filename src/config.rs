//! Runtime configuration.
//!
//! Values come from built-in defaults, then an optional `.env`-style file,
//! then `AUTOLOAD_*` environment variables.

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::ConfigError;

/// Default interpreter used by the host and the installer.
pub const DEFAULT_PYTHON: &str = "python3";

/// Default bound on an external install process (seconds).
pub const DEFAULT_INSTALL_TIMEOUT: u64 = 60;

/// Default bound on a single download (seconds).
pub const DEFAULT_DOWNLOAD_TIMEOUT: u64 = 30;

/// Default auto-print truncation threshold (characters).
pub const DEFAULT_PRINT_LIMIT: usize = 1000;

/// Environment variable holding the default private-registry token.
pub const DEFAULT_TOKEN_ENV: &str = "GITLAB_TOKEN";

/// Resolver configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Interpreter program (name on PATH or absolute path)
    pub python: String,
    /// State directory (credentials file, installed scripts)
    pub home: PathBuf,
    pub install_timeout: Duration,
    pub download_timeout: Duration,
    pub auto_print: bool,
    pub print_limit: usize,
    /// Name of the environment variable read for the private GitLab token
    pub token_env: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            python: DEFAULT_PYTHON.to_string(),
            home: default_home(),
            install_timeout: Duration::from_secs(DEFAULT_INSTALL_TIMEOUT),
            download_timeout: Duration::from_secs(DEFAULT_DOWNLOAD_TIMEOUT),
            auto_print: true,
            print_limit: DEFAULT_PRINT_LIMIT,
            token_env: DEFAULT_TOKEN_ENV.to_string(),
        }
    }
}

/// State directory (~/.autoload).
pub fn default_home() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".autoload")
}

impl Config {
    /// Defaults overridden by `AUTOLOAD_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Config::default();
        for (key, value) in std::env::vars() {
            if key.starts_with("AUTOLOAD_") {
                config.set(&key, &value)?;
            }
        }
        Ok(config)
    }

    /// Directory where downloaded scripts and flat archives are installed.
    pub fn script_dir(&self) -> PathBuf {
        self.home.join("scripts")
    }

    /// Path to the private-registry credentials file.
    pub fn credentials_path(&self) -> PathBuf {
        self.home.join("credentials")
    }

    /// Apply `KEY=value` lines from a `.env`-style file.
    ///
    /// A missing file is not an error. Unknown keys are ignored.
    pub fn apply_env_file(&mut self, path: &Path) -> Result<(), ConfigError> {
        if !path.exists() {
            return Ok(());
        }

        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let Some((key, value)) = line.split_once('=') else {
                continue;
            };

            let key = key.trim();
            let value = value.trim().trim_matches('"').trim_matches('\'');
            self.set(key, value)?;
        }

        Ok(())
    }

    /// Set one configuration key by its environment-variable name.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        match key {
            "AUTOLOAD_PYTHON" => self.python = value.to_string(),
            "AUTOLOAD_HOME" => self.home = PathBuf::from(value),
            "AUTOLOAD_INSTALL_TIMEOUT" => {
                self.install_timeout = Duration::from_secs(parse_number(key, value)?)
            }
            "AUTOLOAD_DOWNLOAD_TIMEOUT" => {
                self.download_timeout = Duration::from_secs(parse_number(key, value)?)
            }
            "AUTOLOAD_AUTO_PRINT" => self.auto_print = parse_bool(key, value)?,
            "AUTOLOAD_PRINT_LIMIT" => self.print_limit = parse_number(key, value)? as usize,
            "AUTOLOAD_TOKEN_ENV" => self.token_env = value.to_string(),
            _ => {}
        }
        Ok(())
    }
}

fn parse_number(key: &str, value: &str) -> Result<u64, ConfigError> {
    value
        .parse::<u64>()
        .map_err(|_| ConfigError::invalid(key, value))
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::invalid(key, value)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.python, "python3");
        assert_eq!(config.install_timeout, Duration::from_secs(60));
        assert_eq!(config.print_limit, 1000);
        assert!(config.auto_print);
        assert!(config.home.to_string_lossy().contains(".autoload"));
        assert!(config.script_dir().ends_with("scripts"));
    }

    #[test]
    fn test_env_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".env");
        std::fs::write(
            &path,
            "# comment\nAUTOLOAD_PYTHON=\"/usr/bin/python3.12\"\nAUTOLOAD_PRINT_LIMIT=80\nAUTOLOAD_AUTO_PRINT=off\nOTHER=1\n",
        )
        .unwrap();

        let mut config = Config::default();
        config.apply_env_file(&path).unwrap();
        assert_eq!(config.python, "/usr/bin/python3.12");
        assert_eq!(config.print_limit, 80);
        assert!(!config.auto_print);
    }

    #[test]
    fn test_missing_env_file_is_ignored() {
        let mut config = Config::default();
        assert!(config
            .apply_env_file(Path::new("/nonexistent/autoload/.env"))
            .is_ok());
    }

    #[test]
    fn test_invalid_value() {
        let mut config = Config::default();
        let err = config.set("AUTOLOAD_INSTALL_TIMEOUT", "soon").unwrap_err();
        assert!(err.to_string().contains("AUTOLOAD_INSTALL_TIMEOUT"));
    }
}
