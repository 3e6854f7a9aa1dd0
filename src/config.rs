use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Source of a configuration value
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfigSource {
    Default,
    File,
    Environment,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigSource::Default => write!(f, "default"),
            ConfigSource::File => write!(f, "file"),
            ConfigSource::Environment => write!(f, "environment"),
        }
    }
}

/// A configuration value with its source
#[derive(Debug, Clone, Serialize)]
pub struct ConfigValue<T> {
    pub value: T,
    pub source: ConfigSource,
}

impl<T> ConfigValue<T> {
    pub fn new(value: T, source: ConfigSource) -> Self {
        Self { value, source }
    }
}

fn default_interval_minutes() -> u64 {
    5
}

/// Sync configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncOptions {
    /// Spreadsheet to mirror entries into. Usually set by `sync setup` and
    /// stored as a setting; this is the config-file fallback.
    pub spreadsheet_id: Option<String>,
    /// Auto-sync cadence in minutes
    pub interval_minutes: u64,
    /// Enable automatic sync around commands (default: false)
    pub auto_sync: bool,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            spreadsheet_id: None,
            interval_minutes: default_interval_minutes(),
            auto_sync: false,
        }
    }
}

/// Application configuration with source tracking
#[derive(Debug, Clone, Serialize)]
pub struct Config {
    /// Directory holding the database (or its flat-file fallback)
    pub data_dir: ConfigValue<PathBuf>,
    /// Default operator name for new entries
    pub operator: ConfigValue<String>,
    /// Config file path used (if any)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config_file: Option<PathBuf>,
    /// Sync configuration
    pub sync: SyncOptions,
}

/// Internal struct for deserializing config file
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct ConfigFile {
    data_dir: Option<PathBuf>,
    operator: Option<String>,
    sync: Option<SyncOptions>,
}

impl Config {
    /// Load configuration with priority: env vars > config file > defaults
    pub fn load(config_path: Option<PathBuf>) -> Result<Self, ConfigError> {
        let mut data_dir = ConfigValue::new(Self::default_data_dir(), ConfigSource::Default);
        let mut operator = ConfigValue::new("default".to_string(), ConfigSource::Default);
        let mut config_file = None;
        let mut sync = SyncOptions::default();

        let path = config_path.unwrap_or_else(Self::default_config_path);
        if path.exists() {
            let contents = std::fs::read_to_string(&path)
                .map_err(|e| ConfigError::ReadError(path.clone(), e))?;
            let file_config: ConfigFile = serde_yaml::from_str(&contents)
                .map_err(|e| ConfigError::ParseError(path.clone(), e))?;

            config_file = Some(path.clone());

            if let Some(dir) = file_config.data_dir {
                // Resolve relative paths against config file's directory
                let resolved = if dir.is_relative() {
                    path.parent().map(|p| p.join(&dir)).unwrap_or(dir)
                } else {
                    dir
                };
                data_dir = ConfigValue::new(resolved, ConfigSource::File);
            }
            if let Some(name) = file_config.operator {
                operator = ConfigValue::new(name, ConfigSource::File);
            }
            if let Some(sync_options) = file_config.sync {
                sync = sync_options;
            }
        }

        // Apply environment variable overrides
        if let Ok(dir) = std::env::var("FLEETFUEL_DATA_DIR") {
            data_dir = ConfigValue::new(PathBuf::from(dir), ConfigSource::Environment);
        }
        if let Ok(name) = std::env::var("FLEETFUEL_OPERATOR") {
            operator = ConfigValue::new(name, ConfigSource::Environment);
        }
        if let Ok(id) = std::env::var("FLEETFUEL_SPREADSHEET_ID") {
            sync.spreadsheet_id = Some(id);
        }
        if let Ok(minutes) = std::env::var("FLEETFUEL_SYNC_INTERVAL") {
            if let Ok(minutes) = minutes.parse() {
                sync.interval_minutes = minutes;
            }
        }

        Ok(Self {
            data_dir,
            operator,
            config_file,
            sync,
        })
    }

    /// Default data directory: platform data dir + fleetfuel
    pub fn default_data_dir() -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("fleetfuel")
    }

    /// Default config file path: platform config dir + fleetfuel/config.yaml
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("fleetfuel")
            .join("config.yaml")
    }
}

#[derive(Debug)]
pub enum ConfigError {
    ReadError(PathBuf, std::io::Error),
    ParseError(PathBuf, serde_yaml::Error),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::ReadError(path, e) => {
                write!(f, "Failed to read config file '{}': {}", path.display(), e)
            }
            ConfigError::ParseError(path, e) => {
                write!(f, "Failed to parse config file '{}': {}", path.display(), e)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::tempdir;

    #[test]
    fn test_default_config() {
        let config = Config::load(Some(PathBuf::from("/nonexistent/config.yaml"))).unwrap();
        assert_eq!(config.operator.value, "default");
        assert_eq!(config.operator.source, ConfigSource::Default);
        assert_eq!(config.sync.interval_minutes, 5);
        assert!(!config.sync.auto_sync);
        assert!(config.config_file.is_none());
    }

    #[test]
    fn test_load_from_file() {
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("config.yaml");

        let mut file = std::fs::File::create(&config_path).unwrap();
        writeln!(file, "data_dir: /custom/fleet").unwrap();
        writeln!(file, "operator: Amadou").unwrap();
        writeln!(file, "sync:").unwrap();
        writeln!(file, "  spreadsheet_id: sheet-abc").unwrap();
        writeln!(file, "  interval_minutes: 15").unwrap();
        writeln!(file, "  auto_sync: true").unwrap();

        let config = Config::load(Some(config_path)).unwrap();
        assert_eq!(config.data_dir.value, PathBuf::from("/custom/fleet"));
        assert_eq!(config.data_dir.source, ConfigSource::File);
        assert_eq!(config.operator.value, "Amadou");
        assert_eq!(config.sync.spreadsheet_id.as_deref(), Some("sheet-abc"));
        assert_eq!(config.sync.interval_minutes, 15);
        assert!(config.sync.auto_sync);
    }

    #[test]
    fn test_relative_data_dir_resolves_against_config_dir() {
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("config.yaml");

        let mut file = std::fs::File::create(&config_path).unwrap();
        writeln!(file, "data_dir: data").unwrap();

        let config = Config::load(Some(config_path)).unwrap();
        assert_eq!(config.data_dir.value, temp_dir.path().join("data"));
    }

    #[test]
    fn test_env_var_overrides_file() {
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("config.yaml");

        let mut file = std::fs::File::create(&config_path).unwrap();
        writeln!(file, "operator: fromfile").unwrap();

        std::env::set_var("FLEETFUEL_OPERATOR", "fromenv");
        let config = Config::load(Some(config_path)).unwrap();
        std::env::remove_var("FLEETFUEL_OPERATOR");

        assert_eq!(config.operator.value, "fromenv");
        assert_eq!(config.operator.source, ConfigSource::Environment);
    }

    #[test]
    fn test_invalid_yaml_error() {
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("config.yaml");

        let mut file = std::fs::File::create(&config_path).unwrap();
        writeln!(file, "invalid: yaml: content: [").unwrap();

        let result = Config::load(Some(config_path));
        assert!(result.is_err());
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("Failed to parse config file"));
    }
}
