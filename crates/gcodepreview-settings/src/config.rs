//! Preview engine configuration
//!
//! Provides configuration file handling and validation. Supports JSON and
//! TOML file formats stored in platform-specific directories.
//!
//! Configuration is organized into sections:
//! - Cache settings (directory, size budget)
//! - Download settings (large file gate)
//! - Parser settings (arc linearisation)

use crate::error::{ConfigError, ConfigResult, SettingsError, SettingsResult};
use gcodepreview_core::constants::{
    CACHE_DIR_NAME, DEFAULT_ARC_SEGMENT_LENGTH, DEFAULT_LARGE_FILE_THRESHOLD,
    DEFAULT_MAX_ARC_SEGMENTS, DEFAULT_MAX_CACHE_SIZE,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const CONFIG_FILE_NAME: &str = "config.toml";
const MAX_ARC_SEGMENTS_LIMIT: usize = 4096;

/// Layer model cache settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    /// Directory holding the index and blobs
    pub directory: PathBuf,
    /// Upper bound of the summed blob sizes in bytes
    pub max_size_bytes: u64,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            directory: PreviewConfig::default_cache_directory(),
            max_size_bytes: DEFAULT_MAX_CACHE_SIZE,
        }
    }
}

/// Download settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DownloadSettings {
    /// Files larger than this need explicit consent to download.
    /// `0` disables the gate.
    pub large_file_threshold: u64,
}

impl DownloadSettings {
    /// Threshold of the large file gate, `None` when disabled
    pub fn threshold(&self) -> Option<u64> {
        (self.large_file_threshold > 0).then_some(self.large_file_threshold)
    }
}

impl Default for DownloadSettings {
    fn default() -> Self {
        Self {
            large_file_threshold: DEFAULT_LARGE_FILE_THRESHOLD,
        }
    }
}

/// Parser settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParserSettings {
    /// Maximum chord length when linearising arcs (mm)
    pub arc_segment_length: f32,
    /// Maximum chords per arc
    pub max_arc_segments: usize,
}

impl Default for ParserSettings {
    fn default() -> Self {
        Self {
            arc_segment_length: DEFAULT_ARC_SEGMENT_LENGTH,
            max_arc_segments: DEFAULT_MAX_ARC_SEGMENTS,
        }
    }
}

/// Complete preview engine configuration
///
/// Aggregates all settings sections and provides file I/O operations.
/// Missing sections and keys fall back to their defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct PreviewConfig {
    /// Cache settings
    pub cache: CacheSettings,
    /// Download settings
    pub download: DownloadSettings,
    /// Parser settings
    pub parser: ParserSettings,
}

impl PreviewConfig {
    /// Create new config with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Default cache directory, `<platform cache dir>/gcodepreview`
    ///
    /// Falls back to the system temp directory on platforms without a
    /// cache directory.
    pub fn default_cache_directory() -> PathBuf {
        dirs::cache_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join(CACHE_DIR_NAME)
    }

    /// Default config file path, `<platform config dir>/gcodepreview/config.toml`
    pub fn default_config_path() -> ConfigResult<PathBuf> {
        dirs::config_dir()
            .map(|dir| dir.join(CACHE_DIR_NAME).join(CONFIG_FILE_NAME))
            .ok_or_else(|| ConfigError::UnsupportedPlatform(std::env::consts::OS.to_string()))
    }

    /// Load config from file (JSON or TOML)
    pub fn load_from_file(path: &Path) -> SettingsResult<Self> {
        let format = ConfigFormat::from_path(path)?;
        let content = std::fs::read_to_string(path).map_err(|e| {
            SettingsError::LoadError(format!("{}: {}", path.display(), e))
        })?;

        let config: Self = match format {
            ConfigFormat::Json => serde_json::from_str(&content)?,
            ConfigFormat::Toml => toml::from_str(&content)?,
        };

        config.validate()?;
        tracing::debug!(path = %path.display(), "Loaded preview config");
        Ok(config)
    }

    /// Load config from file, or defaults when the file does not exist
    pub fn load_or_default(path: &Path) -> SettingsResult<Self> {
        if !path.exists() {
            tracing::info!(path = %path.display(), "No config file, using defaults");
            return Ok(Self::default());
        }
        Self::load_from_file(path)
    }

    /// Save config to file (JSON or TOML)
    ///
    /// Parent directories are created as needed.
    pub fn save_to_file(&self, path: &Path) -> SettingsResult<()> {
        self.validate()?;

        let content = match ConfigFormat::from_path(path)? {
            ConfigFormat::Json => serde_json::to_string_pretty(self)?,
            ConfigFormat::Toml => toml::to_string_pretty(self)?,
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                SettingsError::SaveError(format!("{}: {}", parent.display(), e))
            })?;
        }
        std::fs::write(path, content)
            .map_err(|e| SettingsError::SaveError(format!("{}: {}", path.display(), e)))?;

        tracing::debug!(path = %path.display(), "Saved preview config");
        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> ConfigResult<()> {
        if self.cache.directory.as_os_str().is_empty() {
            return Err(ConfigError::out_of_range("cache.directory", "\"\""));
        }

        if self.cache.max_size_bytes == 0 {
            return Err(ConfigError::out_of_range(
                "cache.max_size_bytes",
                self.cache.max_size_bytes,
            ));
        }

        let segment_length = self.parser.arc_segment_length;
        if !segment_length.is_finite() || segment_length <= 0.0 {
            return Err(ConfigError::out_of_range(
                "parser.arc_segment_length",
                segment_length,
            ));
        }

        if !(2..=MAX_ARC_SEGMENTS_LIMIT).contains(&self.parser.max_arc_segments) {
            return Err(ConfigError::out_of_range(
                "parser.max_arc_segments",
                self.parser.max_arc_segments,
            ));
        }

        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConfigFormat {
    Json,
    Toml,
}

impl ConfigFormat {
    fn from_path(path: &Path) -> ConfigResult<Self> {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => Ok(ConfigFormat::Json),
            Some("toml") => Ok(ConfigFormat::Toml),
            other => Err(ConfigError::UnsupportedFormat(
                other.unwrap_or("<none>").to_string(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = PreviewConfig::new();
        assert_eq!(config.cache.max_size_bytes, 16 * 1024 * 1024);
        assert_eq!(config.download.threshold(), Some(10 * 1024 * 1024));
        assert_eq!(config.parser.arc_segment_length, 1.0);
        assert!(config.cache.directory.ends_with("gcodepreview"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_threshold_disables_gate() {
        let download = DownloadSettings {
            large_file_threshold: 0,
        };
        assert_eq!(download.threshold(), None);
    }

    #[test]
    fn test_toml_round_trip() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("nested").join("config.toml");

        let mut config = PreviewConfig::new();
        config.cache.directory = temp.path().join("cache");
        config.cache.max_size_bytes = 1024;
        config.download.large_file_threshold = 0;
        config.parser.max_arc_segments = 32;
        config.save_to_file(&path).unwrap();

        let loaded = PreviewConfig::load_from_file(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_json_round_trip() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.json");

        let mut config = PreviewConfig::new();
        config.parser.arc_segment_length = 0.25;
        config.save_to_file(&path).unwrap();

        let loaded = PreviewConfig::load_from_file(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.toml");
        std::fs::write(&path, "[cache]\nmax_size_bytes = 2048\n").unwrap();

        let loaded = PreviewConfig::load_from_file(&path).unwrap();
        assert_eq!(loaded.cache.max_size_bytes, 2048);
        assert_eq!(loaded.download, DownloadSettings::default());
        assert_eq!(loaded.parser, ParserSettings::default());
    }

    #[test]
    fn test_unsupported_extension() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.yaml");
        let err = PreviewConfig::new().save_to_file(&path).unwrap_err();
        assert!(matches!(
            err,
            SettingsError::Config(ConfigError::UnsupportedFormat(ref ext)) if ext == "yaml"
        ));
        assert!(!path.exists());
    }

    #[test]
    fn test_invalid_values_rejected_on_load() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.json");
        std::fs::write(&path, r#"{"parser": {"arc_segment_length": 0.0}}"#).unwrap();

        let err = PreviewConfig::load_from_file(&path).unwrap_err();
        assert!(matches!(
            err,
            SettingsError::Config(ConfigError::ValueOutOfRange { ref key, .. })
                if key == "parser.arc_segment_length"
        ));
    }

    #[test]
    fn test_validate() {
        let mut config = PreviewConfig::new();
        config.cache.max_size_bytes = 0;
        assert!(config.validate().is_err());

        let mut config = PreviewConfig::new();
        config.parser.max_arc_segments = 1;
        assert!(config.validate().is_err());

        let mut config = PreviewConfig::new();
        config.parser.arc_segment_length = f32::NAN;
        assert!(config.validate().is_err());

        let mut config = PreviewConfig::new();
        config.cache.directory = PathBuf::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_malformed_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.toml");
        std::fs::write(&path, "[cache\nmax_size_bytes = ").unwrap();
        assert!(matches!(
            PreviewConfig::load_from_file(&path),
            Err(SettingsError::TomlError(_))
        ));
    }

    #[test]
    fn test_load_or_default_missing_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("absent.toml");
        let config = PreviewConfig::load_or_default(&path).unwrap();
        assert_eq!(config, PreviewConfig::default());

        assert!(matches!(
            PreviewConfig::load_from_file(&path),
            Err(SettingsError::LoadError(_))
        ));
    }
}
