//! Application configuration.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Global application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Directory where rendered videos land when no output is given.
    pub output_dir: PathBuf,

    /// Camera decoding defaults.
    pub decode: DecodeDefaults,

    /// Logging configuration.
    pub logging: LoggingConfig,
}

/// How auxiliary camera footage is decoded.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DecodeDefaults {
    /// `ffmpeg` executable used for decoding and encoding.
    pub ffmpeg_binary: String,

    /// `ffprobe` executable used to read stream dimensions.
    pub ffprobe_binary: String,

    /// Decode camera frames on background threads.
    pub prefetch: bool,

    /// Bounded queue capacity per camera source (frames).
    pub queue_capacity: usize,

    /// How long the render thread waits per poll of an empty queue.
    pub poll_interval_ms: u64,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "heatreel=debug,warn").
    pub level: String,

    /// Whether to output structured JSON logs.
    pub json: bool,

    /// Optional log file path.
    pub file: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            decode: DecodeDefaults::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for DecodeDefaults {
    fn default() -> Self {
        Self {
            ffmpeg_binary: "ffmpeg".to_string(),
            ffprobe_binary: "ffprobe".to_string(),
            prefetch: true,
            queue_capacity: 32,
            poll_interval_ms: 10,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            file: None,
        }
    }
}

impl AppConfig {
    /// Load config from the standard location, falling back to defaults.
    pub fn load() -> Self {
        Self::load_from(&config_file_path())
    }

    /// Load config from `path`. A missing file yields defaults silently;
    /// an unreadable or malformed one yields defaults with a warning.
    pub fn load_from(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }
        let parsed = std::fs::read_to_string(path)
            .map_err(|e| e.to_string())
            .and_then(|content| serde_json::from_str(&content).map_err(|e| e.to_string()));
        match parsed {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Ignoring heatreel config");
                Self::default()
            }
        }
    }
}

/// Standard config file location.
fn config_file_path() -> PathBuf {
    let base = std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".config")
        });
    base.join("heatreel").join("config.json")
}

/// Default output directory.
fn default_output_dir() -> PathBuf {
    let base = std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".local").join("share")
        });
    base.join("heatreel").join("renders")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_defaults_prefetch_with_bounded_queue() {
        let config = AppConfig::default();
        assert!(config.decode.prefetch);
        assert_eq!(config.decode.queue_capacity, 32);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn partial_config_fills_missing_sections() {
        let parsed: AppConfig =
            serde_json::from_str(r#"{"decode": {"prefetch": false}}"#).unwrap();
        assert!(!parsed.decode.prefetch);
        assert_eq!(parsed.decode.ffmpeg_binary, "ffmpeg");
        assert!(!parsed.logging.json);
    }

    #[test]
    fn malformed_config_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{ not json").unwrap();
        let config = AppConfig::load_from(&path);
        assert_eq!(config.decode.queue_capacity, 32);

        std::fs::write(&path, r#"{"decode": {"queue_capacity": 4}}"#).unwrap();
        assert_eq!(AppConfig::load_from(&path).decode.queue_capacity, 4);

        assert!(AppConfig::load_from(&dir.path().join("missing.json")).decode.prefetch);
    }
}
