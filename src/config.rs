use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::cli::Cli;
use crate::error::{MonitorError, Result};

pub const DEFAULT_COMMAND: &str = "/usr/bin/arecord -r 8000 -f S16_LE -D hw:1,0";

/// Optional on-disk settings. Command-line values override these.
#[derive(Debug, Deserialize, PartialEq)]
pub struct Config {
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    #[serde(default = "default_max_freq")]
    pub max_freq: u32,
    #[serde(default = "default_avg_interval")]
    pub avg_interval: u32,
    #[serde(default = "default_command")]
    pub command: String,
    #[serde(default)]
    pub db: bool,
    #[serde(default)]
    pub wav: bool,
    #[serde(default = "default_retry_delay_secs")]
    pub retry_delay_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            max_freq: default_max_freq(),
            avg_interval: default_avg_interval(),
            command: default_command(),
            db: false,
            wav: false,
            retry_delay_secs: default_retry_delay_secs(),
        }
    }
}

fn default_output_dir() -> PathBuf { PathBuf::from(".") }
fn default_max_freq() -> u32 { 100 }
fn default_avg_interval() -> u32 { 60 }
fn default_command() -> String { DEFAULT_COMMAND.into() }
fn default_retry_delay_secs() -> u64 { 5 }

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        MonitorError::Config(format!("cannot read {}: {}", path.display(), e))
    })?;
    toml::from_str(&content)
        .map_err(|e| MonitorError::Config(format!("cannot parse {}: {}", path.display(), e)))
}

/// `noiselog.toml` in the working directory, then the per-user config dir.
pub fn discover_config_path() -> Option<PathBuf> {
    let local = PathBuf::from("noiselog.toml");
    if local.exists() {
        return Some(local);
    }
    let user = dirs::config_dir()?.join("noiselog").join("config.toml");
    user.exists().then_some(user)
}

/// Settings for every run, fixed at startup.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamConfig {
    pub output_dir: PathBuf,
    pub max_freq: u32,
    pub avg_interval: u32,
    pub in_db: bool,
    pub wav: bool,
    pub command: String,
    pub retry_delay: Duration,
}

impl StreamConfig {
    pub fn resolve(cli: &Cli, file: Config) -> Result<Self> {
        let config = Self {
            output_dir: cli.output_dir.clone().unwrap_or(file.output_dir),
            max_freq: cli.max_freq.unwrap_or(file.max_freq),
            avg_interval: cli.avg_interval.unwrap_or(file.avg_interval),
            in_db: cli.db || file.db,
            wav: cli.wav || file.wav,
            command: cli.command.clone().unwrap_or(file.command),
            retry_delay: Duration::from_secs(cli.retry_delay.unwrap_or(file.retry_delay_secs)),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.avg_interval < 1 {
            return Err(MonitorError::Config(
                "averaging interval must be at least 1 second".into(),
            ));
        }
        if self.max_freq < 2 {
            return Err(MonitorError::Config(
                "max. frequency must be at least 2 Hz".into(),
            ));
        }
        if self.command.trim().is_empty() {
            return Err(MonitorError::Config("source command is empty".into()));
        }
        Ok(())
    }

    /// Creates the output directory if needed.
    pub fn prepare_output_dir(&self) -> Result<()> {
        std::fs::create_dir_all(&self.output_dir).map_err(|e| {
            MonitorError::Config(format!(
                "cannot create output dir {}: {}",
                self.output_dir.display(),
                e
            ))
        })?;
        if !self.output_dir.is_dir() {
            return Err(MonitorError::Config(format!(
                "{} is not a directory",
                self.output_dir.display()
            )));
        }
        Ok(())
    }
}

impl Default for StreamConfig {
    fn default() -> Self {
        let file = Config::default();
        Self {
            output_dir: file.output_dir,
            max_freq: file.max_freq,
            avg_interval: file.avg_interval,
            in_db: file.db,
            wav: file.wav,
            command: file.command,
            retry_delay: Duration::from_secs(file.retry_delay_secs),
        }
    }
}
