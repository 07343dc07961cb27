//! GCodePreview Settings Crate
//!
//! Loads, validates and saves the preview engine configuration.

pub mod config;
pub mod error;

pub use config::{CacheSettings, DownloadSettings, ParserSettings, PreviewConfig};
pub use error::{ConfigError, ConfigResult, SettingsError, SettingsResult};
