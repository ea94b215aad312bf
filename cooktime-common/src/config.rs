//! Configuration loading and root folder resolution
//!
//! Bootstrap configuration is a small TOML file (`~/.config/cooktime/config.toml`
//! on Linux). A missing or unreadable file is never fatal: Cooktime logs a
//! warning and continues with built-in defaults.
//!
//! Root folder priority:
//! 1. Command-line argument (highest priority)
//! 2. `COOKTIME_ROOT_FOLDER` environment variable
//! 3. `root_folder` in the TOML config file
//! 4. OS-dependent default data directory

use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::{debug, warn};

use crate::time;
use crate::{Error, Result};

/// Environment variable overriding the root folder
pub const ROOT_FOLDER_ENV: &str = "COOKTIME_ROOT_FOLDER";

/// Bootstrap configuration loaded from TOML
#[derive(Debug, Clone, Deserialize)]
pub struct TomlConfig {
    /// Root folder for the database (optional)
    #[serde(default)]
    pub root_folder: Option<PathBuf>,

    /// HTTP server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// SQLite file name, relative to the root folder unless absolute
    #[serde(default = "default_database_file")]
    pub database_file: PathBuf,

    /// Serve time (`HH:MM`) given to meals that have none
    #[serde(default = "default_serve_time")]
    pub default_serve_time: String,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub sound: SoundConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

/// Audio cue configuration
#[derive(Debug, Clone, Deserialize)]
pub struct SoundConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Output volume, 0.0 - 1.0
    #[serde(default = "default_volume")]
    pub volume: f32,
}

fn default_port() -> u16 {
    5780
}

fn default_database_file() -> PathBuf {
    PathBuf::from("cooktime.db")
}

fn default_serve_time() -> String {
    time::DEFAULT_SERVE_TIME.to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_true() -> bool {
    true
}

fn default_volume() -> f32 {
    1.0
}

impl Default for TomlConfig {
    fn default() -> Self {
        Self {
            root_folder: None,
            port: default_port(),
            database_file: default_database_file(),
            default_serve_time: default_serve_time(),
            logging: LoggingConfig::default(),
            sound: SoundConfig::default(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Default for SoundConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            volume: default_volume(),
        }
    }
}

impl SoundConfig {
    /// Volume clamped into `0.0..=1.0` (NaN reads as silent)
    pub fn effective_volume(&self) -> f32 {
        if self.volume.is_nan() {
            0.0
        } else {
            self.volume.clamp(0.0, 1.0)
        }
    }
}

impl TomlConfig {
    /// Parse configuration text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(format!("Invalid config file: {}", e)))
    }

    /// Load configuration from `path`
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Load from `path` (or the platform default location), falling back to
    /// defaults with a warning when the file is missing or invalid
    pub fn load_or_default(path: Option<&Path>) -> Self {
        let path = match path.map(Path::to_path_buf).or_else(default_config_path) {
            Some(path) => path,
            None => {
                debug!("No config directory on this platform, using defaults");
                return Self::default();
            }
        };

        if !path.exists() {
            debug!("Config file {:?} not found, using defaults", path);
            return Self::default();
        }

        match Self::load(&path) {
            Ok(config) => {
                debug!("Loaded config from {:?}", path);
                config
            }
            Err(e) => {
                warn!("Ignoring config file {:?}: {}", path, e);
                Self::default()
            }
        }
    }

    /// Default serve time, falling back to 18:30 when the configured one is invalid
    pub fn default_serve_time(&self) -> chrono::NaiveTime {
        time::parse_serve_time(&self.default_serve_time)
            .or_else(|| time::parse_serve_time(time::DEFAULT_SERVE_TIME))
            .unwrap_or(chrono::NaiveTime::MIN)
    }

    /// Database location under the given root folder
    pub fn database_path(&self, root_folder: &Path) -> PathBuf {
        if self.database_file.is_absolute() {
            self.database_file.clone()
        } else {
            root_folder.join(&self.database_file)
        }
    }
}

/// Platform default config file path (`<config dir>/cooktime/config.toml`)
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("cooktime").join("config.toml"))
}

/// Resolve the root folder following the priority order above
pub fn resolve_root_folder(cli_arg: Option<&str>, config: &TomlConfig) -> PathBuf {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg.filter(|p| !p.trim().is_empty()) {
        return PathBuf::from(path);
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(ROOT_FOLDER_ENV) {
        if !path.trim().is_empty() {
            return PathBuf::from(path);
        }
    }

    // Priority 3: TOML config file
    if let Some(path) = &config.root_folder {
        return path.clone();
    }

    // Priority 4: OS-dependent default
    default_root_folder()
}

/// OS-dependent default root folder
///
/// `~/.local/share/cooktime` on Linux, the platform data directory elsewhere.
pub fn default_root_folder() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("cooktime"))
        .unwrap_or_else(|| PathBuf::from("./cooktime_data"))
}

/// Create the root folder if it does not exist yet
pub fn ensure_root_folder(path: &Path) -> Result<()> {
    if !path.exists() {
        std::fs::create_dir_all(path)?;
        debug!("Created root folder {:?}", path);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = TomlConfig::default();
        assert_eq!(config.port, 5780);
        assert_eq!(config.database_file, PathBuf::from("cooktime.db"));
        assert_eq!(config.default_serve_time, "18:30");
        assert_eq!(config.logging.level, "info");
        assert!(config.sound.enabled);
        assert_eq!(config.sound.effective_volume(), 1.0);
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let config = TomlConfig::from_toml_str(
            r#"
            port = 6000

            [sound]
            volume = 3.5
            "#,
        )
        .unwrap();

        assert_eq!(config.port, 6000);
        assert_eq!(config.database_file, PathBuf::from("cooktime.db"));
        assert!(config.sound.enabled);
        assert_eq!(config.sound.effective_volume(), 1.0);
    }

    #[test]
    fn test_invalid_toml_is_config_error() {
        let err = TomlConfig::from_toml_str("port = \"high\"").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_invalid_default_serve_time_falls_back() {
        let config = TomlConfig {
            default_serve_time: "supper".to_string(),
            ..Default::default()
        };
        assert_eq!(
            config.default_serve_time(),
            chrono::NaiveTime::from_hms_opt(18, 30, 0).unwrap()
        );
    }

    #[test]
    fn test_database_path() {
        let config = TomlConfig::default();
        assert_eq!(
            config.database_path(Path::new("/data/cooktime")),
            PathBuf::from("/data/cooktime/cooktime.db")
        );

        let absolute = TomlConfig {
            database_file: PathBuf::from("/tmp/other.db"),
            ..Default::default()
        };
        assert_eq!(absolute.database_path(Path::new("/ignored")), PathBuf::from("/tmp/other.db"));
    }
}
