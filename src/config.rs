// Global configuration management

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub run: RunConfig,

    #[serde(default)]
    pub paths: PathsConfig,

    #[serde(default)]
    pub metrics: MetricsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    /// GPU vendor to benchmark against ("nvidia" or "intel")
    #[serde(default)]
    pub gpu: Option<String>,

    /// Number of parallel probe streams per matrix cell
    #[serde(default = "default_streams")]
    pub streams: usize,

    /// GPU device index
    #[serde(default)]
    pub device: u32,

    /// Restrict the mode axis to software decoding/encoding
    #[serde(default)]
    pub software_only: bool,

    /// Per-cell wall-clock cap in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    /// FFmpeg binary to invoke
    #[serde(default = "default_ffmpeg")]
    pub ffmpeg: String,

    /// Where the JSONL result records go
    #[serde(default = "default_output")]
    pub output: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// CPU counter settle time in milliseconds
    #[serde(default = "default_settle_ms")]
    pub settle_ms: u64,

    /// Idle wait between samples in milliseconds
    #[serde(default = "default_poll_ms")]
    pub poll_interval_ms: u64,

    /// Whether the copy engine joins the overall-GPU maximum
    #[serde(default)]
    pub include_copy_in_overall: bool,
}

fn default_streams() -> usize {
    1
}

fn default_timeout_secs() -> u64 {
    300
}

fn default_ffmpeg() -> String {
    "ffmpeg".to_string()
}

fn default_output() -> PathBuf {
    PathBuf::from("results.jsonl")
}

fn default_settle_ms() -> u64 {
    200
}

fn default_poll_ms() -> u64 {
    250
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            gpu: None,
            streams: default_streams(),
            device: 0,
            software_only: false,
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            ffmpeg: default_ffmpeg(),
            output: default_output(),
        }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            settle_ms: default_settle_ms(),
            poll_interval_ms: default_poll_ms(),
            include_copy_in_overall: false,
        }
    }
}

impl Config {
    /// Get the path to the config file
    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Could not determine config directory")?
            .join("ffbench");
        Ok(config_dir.join("config.toml"))
    }

    /// Load config from disk, or fall back to built-in defaults
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;
        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            Ok(Config::default())
        }
    }

    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        Ok(config)
    }

    /// Save config to disk
    pub fn save(&self) -> Result<()> {
        let config_path = Self::config_path()?;
        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }
        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(&config_path, contents)
            .with_context(|| format!("Failed to write config file: {}", config_path.display()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.run.streams, 1);
        assert_eq!(config.run.timeout_secs, 300);
        assert_eq!(config.paths.ffmpeg, "ffmpeg");
        assert_eq!(config.metrics.settle_ms, 200);
        assert!(!config.metrics.include_copy_in_overall);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[run]\nstreams = 4\ngpu = \"intel\"\n").unwrap();
        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.run.streams, 4);
        assert_eq!(config.run.gpu.as_deref(), Some("intel"));
        assert_eq!(config.run.timeout_secs, 300);
        assert_eq!(config.metrics.poll_interval_ms, 250);
    }

    #[test]
    fn test_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let mut config = Config::default();
        config.run.software_only = true;
        config.metrics.include_copy_in_overall = true;
        fs::write(&path, toml::to_string_pretty(&config).unwrap()).unwrap();
        let loaded = Config::load_from(&path).unwrap();
        assert!(loaded.run.software_only);
        assert!(loaded.metrics.include_copy_in_overall);
    }

    #[test]
    fn test_malformed_file_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "not toml {{{{").unwrap();
        assert!(Config::load_from(&path).is_err());
    }
}
