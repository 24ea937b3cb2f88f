//! Configuration system using TOML files.
//!
//! Config is stored in the OS-standard config directory:
//! - Windows: %APPDATA%\jukebox\config.toml
//! - macOS: ~/Library/Application Support/jukebox/config.toml
//! - Linux: ~/.config/jukebox/config.toml
//!
//! The file is optional. Command-line flags override what it says.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::audio::{BLOCK_FRAMES, DEFAULT_FADE_IN, SAMPLE_RATE};

/// Longest accepted fade-in (one hour).
const MAX_FADE_IN_SECS: f64 = 3600.0;

/// Largest accepted staging buffer.
const MAX_BUFFER_SECS: f64 = 60.0;

/// Application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Audio settings
    pub audio: AudioConfig,

    /// Library settings
    pub library: LibraryConfig,
}

/// Audio playback settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Selected output device name (empty = system default)
    pub output_device: String,

    /// Fade-in length at startup, in seconds
    pub fade_in_secs: f64,

    /// Staging queue size, in seconds of audio
    pub buffer_secs: f64,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            output_device: String::new(),
            fade_in_secs: 10.0,
            buffer_secs: 1.0,
        }
    }
}

/// Library settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LibraryConfig {
    /// Library manifest (default: `library.toml` next to the config file)
    pub manifest: Option<PathBuf>,
}

impl Config {
    /// Staging queue capacity in whole blocks (at least one).
    pub fn queue_capacity(&self) -> usize {
        let blocks = self.audio.buffer_secs * SAMPLE_RATE as f64 / BLOCK_FRAMES as f64;
        (blocks.floor() as usize).max(1)
    }

    pub fn fade_in(&self) -> Duration {
        Duration::try_from_secs_f64(self.audio.fade_in_secs).unwrap_or(DEFAULT_FADE_IN)
    }

    /// Library manifest to serve, if one is configured or can be defaulted.
    pub fn manifest_path(&self) -> Option<PathBuf> {
        self.library
            .manifest
            .clone()
            .or_else(|| config_dir().map(|d| d.join("library.toml")))
    }

    /// Reject values that cannot be used.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let audio = &self.audio;
        if !(0.0..=MAX_FADE_IN_SECS).contains(&audio.fade_in_secs) {
            return Err(ConfigError::Invalid(format!(
                "audio.fade_in_secs must be between 0 and {}, got {}",
                MAX_FADE_IN_SECS, audio.fade_in_secs
            )));
        }
        if !(audio.buffer_secs > 0.0 && audio.buffer_secs <= MAX_BUFFER_SECS) {
            return Err(ConfigError::Invalid(format!(
                "audio.buffer_secs must be above 0 and at most {}, got {}",
                MAX_BUFFER_SECS, audio.buffer_secs
            )));
        }
        Ok(())
    }
}

// ============================================================================
// Config File Operations
// ============================================================================

/// Get the config directory path
pub fn config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("jukebox"))
}

/// Get the full path to the config file
pub fn config_path() -> Option<PathBuf> {
    config_dir().map(|d| d.join("config.toml"))
}

/// Load configuration from `path`, or from the default location.
///
/// Returns default config if the file doesn't exist or can't be used.
/// Logs warnings but doesn't fail - we always return a usable config.
pub fn load(path: Option<&Path>) -> Config {
    let Some(path) = path.map(Path::to_path_buf).or_else(config_path) else {
        tracing::warn!("Could not determine config directory, using defaults");
        return Config::default();
    };

    if !path.exists() {
        tracing::debug!("No config file found at {:?}, using defaults", path);
        return Config::default();
    }

    match read(&path) {
        Ok(config) => {
            tracing::info!("Loaded config from {:?}", path);
            config
        }
        Err(e) => {
            tracing::warn!("{}; using default configuration", e);
            Config::default()
        }
    }
}

fn read(path: &Path) -> Result<Config, ConfigError> {
    let contents =
        std::fs::read_to_string(path).map_err(|e| ConfigError::Read(path.to_path_buf(), e))?;
    let config: Config =
        toml::from_str(&contents).map_err(|e| ConfigError::Parse(path.to_path_buf(), e))?;
    config.validate()?;
    Ok(config)
}

// ============================================================================
// Error Types
// ============================================================================

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {0}: {1}")]
    Read(PathBuf, std::io::Error),

    #[error("Failed to parse config file {0}: {1}")]
    Parse(PathBuf, toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config_serializes() {
        let config = Config::default();
        let toml = toml::to_string_pretty(&config).unwrap();
        assert!(toml.contains("[audio]"));
        assert!(toml.contains("[library]"));
    }

    #[test]
    fn test_defaults_match_playback_constants() {
        let config = Config::default();
        assert_eq!(config.queue_capacity(), crate::audio::DEFAULT_QUEUE_BLOCKS);
        assert_eq!(config.fade_in(), crate::audio::DEFAULT_FADE_IN);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let toml = r#"
[audio]
output_device = "USB DAC"
"#;
        let config: Config = toml::from_str(toml).unwrap();

        assert_eq!(config.audio.output_device, "USB DAC");
        assert_eq!(config.audio.fade_in_secs, 10.0);
        assert_eq!(config.library.manifest, None);
    }

    #[test]
    fn test_tiny_buffer_still_holds_one_block() {
        let mut config = Config::default();
        config.audio.buffer_secs = 0.001;
        assert_eq!(config.queue_capacity(), 1);
        config.audio.buffer_secs = 2.0;
        assert_eq!(config.queue_capacity(), 43);
    }

    #[test]
    fn test_explicit_manifest_wins() {
        let mut config = Config::default();
        config.library.manifest = Some(PathBuf::from("/srv/library.toml"));
        assert_eq!(
            config.manifest_path(),
            Some(PathBuf::from("/srv/library.toml"))
        );
    }

    #[test]
    fn test_load_reads_given_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[audio]\nfade_in_secs = 2.5\n").unwrap();

        let config = load(Some(&path));
        assert_eq!(config.fade_in(), Duration::from_millis(2500));
    }

    #[test]
    fn test_load_falls_back_on_bad_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[audio\nfade_in_secs = ").unwrap();
        assert_eq!(load(Some(&path)), Config::default());

        std::fs::write(&path, "[audio]\nbuffer_secs = -1.0\n").unwrap();
        assert_eq!(load(Some(&path)), Config::default());
    }

    #[test]
    fn test_huge_fade_in_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[audio]\nfade_in_secs = 1e30\n").unwrap();
        assert_eq!(load(Some(&path)), Config::default());

        // Values that bypass validation still yield a usable duration
        let mut config = Config::default();
        config.audio.fade_in_secs = 1e30;
        assert_eq!(config.fade_in(), DEFAULT_FADE_IN);
    }

    #[test]
    fn test_load_missing_file_is_default() {
        let dir = TempDir::new().unwrap();
        assert_eq!(load(Some(&dir.path().join("absent.toml"))), Config::default());
    }
}
