/// Application configuration management
/// Stores user preferences in ~/.config/receiving-dash/config.toml

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::utils::constants::{DEFAULT_DAY_SIZE, DEFAULT_FACILITY, DEFAULT_SEED, FACILITY_POOL};

const APP_DIR: &str = "receiving-dash";

pub const DATA_DIR_ENV: &str = "RECEIVING_DASH_DATA_DIR";
pub const FACILITY_ENV: &str = "RECEIVING_DASH_FACILITY";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Where the snapshot, event log and TUI logs live
    pub data_dir: Option<String>,
    /// Receiving facility this desk works for
    pub facility: String,
    /// Name recorded on published events
    pub actor: String,
    /// Referrals generated for a fresh day
    pub seed_count: usize,
    pub seed: u64,
    /// Event log poll interval, e.g. "2s"
    pub refresh_interval: String,
    pub web_host: String,
    pub web_port: u16,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_dir: None,
            facility: DEFAULT_FACILITY.to_string(),
            actor: default_actor(),
            seed_count: DEFAULT_DAY_SIZE,
            seed: DEFAULT_SEED,
            refresh_interval: "2s".to_string(),
            web_host: "127.0.0.1".to_string(),
            web_port: 8088,
        }
    }
}

fn default_actor() -> String {
    let user = std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .unwrap_or_else(|_| "desk".to_string());
    format!("{}@{}", user, std::process::id())
}

impl AppConfig {
    /// Get config file path
    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Could not determine the user config directory")?
            .join(APP_DIR);
        Ok(config_dir.join("config.toml"))
    }

    /// Load configuration from `path`; a missing file gives the defaults
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;

        let config: Self = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;

        Ok(config)
    }

    /// Save configuration to file
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).context("Failed to create config directory")?;
        }
        let contents = toml::to_string_pretty(self)
            .context("Failed to serialize config")?;

        fs::write(path, contents)
            .context("Failed to write config file")?;

        Ok(())
    }

    /// Environment variables win over the file
    pub fn apply_env(&mut self) {
        if let Ok(dir) = std::env::var(DATA_DIR_ENV) {
            if !dir.trim().is_empty() {
                self.data_dir = Some(dir);
            }
        }
        if let Ok(facility) = std::env::var(FACILITY_ENV) {
            if !facility.trim().is_empty() {
                self.facility = facility;
            }
        }
    }

    /// Everything wrong with the current settings; empty when valid
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.facility.trim().is_empty() {
            errors.push("facility must not be empty".to_string());
        } else if !FACILITY_POOL.contains(&self.facility.as_str()) {
            errors.push(format!(
                "facility '{}' is not in the network (known: {})",
                self.facility,
                FACILITY_POOL.join(", ")
            ));
        }
        if self.actor.trim().is_empty() {
            errors.push("actor must not be empty".to_string());
        }
        if self.seed_count == 0 {
            errors.push("seed_count must be at least 1".to_string());
        }
        match humantime::parse_duration(&self.refresh_interval) {
            Ok(d) if d.is_zero() => errors.push("refresh_interval must be greater than zero".to_string()),
            Ok(_) => {}
            Err(e) => errors.push(format!("refresh_interval '{}': {}", self.refresh_interval, e)),
        }
        if self.web_host.trim().is_empty() {
            errors.push("web_host must not be empty".to_string());
        }
        if self.web_port == 0 {
            errors.push("web_port must not be 0".to_string());
        }

        errors
    }

    /// Poll interval, falling back to two seconds when unparseable
    pub fn refresh(&self) -> Duration {
        humantime::parse_duration(&self.refresh_interval)
            .ok()
            .filter(|d| !d.is_zero())
            .unwrap_or(Duration::from_secs(2))
    }

    /// Effective poll interval as shown by `config view`
    pub fn refresh_label(&self) -> String {
        humantime::format_duration(self.refresh()).to_string()
    }

    pub fn data_dir(&self) -> PathBuf {
        match &self.data_dir {
            Some(dir) => PathBuf::from(dir),
            None => dirs::data_local_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(APP_DIR),
        }
    }

    pub fn snapshot_path(&self) -> PathBuf {
        self.data_dir().join("data.json")
    }

    pub fn events_path(&self) -> PathBuf {
        self.data_dir().join("events.db")
    }

    pub fn log_dir(&self) -> PathBuf {
        self.data_dir().join("logs")
    }
}
