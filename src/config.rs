//! Configuration file support.
//!
//! Values come from, in increasing priority: built-in defaults, a TOML file,
//! command-line flags. The file is looked up at `--config <path>` if given,
//! otherwise `<config dir>/vipsync/config.toml` when it exists.
//!
//! ```toml
//! servers_file = "servers.json"
//! vip_file = "vips.csv"
//! idle_timeout_ms = 6000
//! quiescence_ms = 400
//! match_mode = "substring"   # or "exact"
//! interval_minutes = 15
//! ```

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Result, SyncError};
use crate::rcon::session::{SessionTimings, READ_BUFFER_SIZE};
use crate::sync::reconcile::MatchMode;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub servers_file: PathBuf,
    pub vip_file: PathBuf,
    pub connect_timeout_ms: u64,
    pub idle_timeout_ms: u64,
    pub quiescence_ms: u64,
    pub read_buffer_size: usize,
    pub match_mode: MatchMode,
    pub interval_minutes: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            servers_file: PathBuf::from("servers.json"),
            vip_file: PathBuf::from("vips.csv"),
            connect_timeout_ms: 6000,
            idle_timeout_ms: 6000,
            quiescence_ms: 400,
            read_buffer_size: READ_BUFFER_SIZE,
            match_mode: MatchMode::Substring,
            interval_minutes: 15,
        }
    }
}

impl Config {
    /// Default location of the config file, if a config dir exists.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("vipsync").join("config.toml"))
    }

    /// Load from an explicit path (must exist), else the default path if
    /// present, else defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        match explicit {
            Some(path) => Self::from_file(path),
            None => match Self::default_path() {
                Some(path) if path.exists() => Self::from_file(&path),
                _ => Ok(Self::default()),
            },
        }
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| SyncError::Config(format!("{}: {}", path.display(), e)))?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| SyncError::Config(format!("{}: {}", path.display(), e)))?;
        config.validate()?;
        tracing::debug!(file = %path.display(), "loaded config");
        Ok(config)
    }

    pub fn parse(content: &str) -> Result<Self> {
        let config: Config =
            toml::from_str(content).map_err(|e| SyncError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.read_buffer_size == 0 {
            return Err(SyncError::Config(
                "read_buffer_size must be greater than 0".to_string(),
            ));
        }
        if self.interval_minutes == 0 {
            return Err(SyncError::Config(
                "interval_minutes must be greater than 0".to_string(),
            ));
        }
        if self.idle_timeout_ms == 0 {
            return Err(SyncError::Config(
                "idle_timeout_ms must be greater than 0".to_string(),
            ));
        }
        if self.connect_timeout_ms == 0 {
            return Err(SyncError::Config(
                "connect_timeout_ms must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }

    pub fn session_timings(&self) -> SessionTimings {
        SessionTimings {
            connect_timeout: Duration::from_millis(self.connect_timeout_ms),
            idle_timeout: Duration::from_millis(self.idle_timeout_ms),
            quiescence: Duration::from_millis(self.quiescence_ms),
            read_buffer_size: self.read_buffer_size,
        }
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_minutes.saturating_mul(60))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults_match_protocol_constants() {
        let timings = Config::default().session_timings();
        assert_eq!(timings, SessionTimings::default());
        assert_eq!(Config::default().interval(), Duration::from_secs(15 * 60));
    }

    #[test]
    fn test_parse_partial_file() {
        let config = Config::parse("quiescence_ms = 50\nmatch_mode = \"exact\"\n").unwrap();
        assert_eq!(config.quiescence_ms, 50);
        assert_eq!(config.match_mode, MatchMode::Exact);
        assert_eq!(config.vip_file, PathBuf::from("vips.csv"));
    }

    #[test]
    fn test_parse_rejects_unknown_keys() {
        assert!(Config::parse("quiesence_ms = 50").is_err());
    }

    #[test]
    fn test_validate_zero_interval() {
        let err = Config::parse("interval_minutes = 0").unwrap_err();
        assert!(err.to_string().contains("interval_minutes"));
    }

    #[test]
    fn test_validate_zero_connect_timeout() {
        let err = Config::parse("connect_timeout_ms = 0").unwrap_err();
        assert!(err.to_string().contains("connect_timeout_ms"));
    }

    #[test]
    fn test_huge_interval_saturates() {
        let config = Config {
            interval_minutes: u64::MAX,
            ..Config::default()
        };
        assert_eq!(config.interval(), Duration::from_secs(u64::MAX));
    }

    #[test]
    fn test_load_explicit_missing_file() {
        let dir = TempDir::new().unwrap();
        let err = Config::load(Some(&dir.path().join("nope.toml"))).unwrap_err();
        assert!(matches!(err, SyncError::Config(_)));
    }

    #[test]
    fn test_load_explicit_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "servers_file = \"/etc/vipsync/servers.json\"\n").unwrap();

        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(
            config.servers_file,
            PathBuf::from("/etc/vipsync/servers.json")
        );
    }
}
