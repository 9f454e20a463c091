//! Configuration loader and validator for the MEP outreach tool.
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML parse error: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(&'static str),
}

/// Root configuration struct mirroring the YAML schema exactly.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Config {
    pub app: App,
    #[serde(default)]
    pub storage: Storage,
    #[serde(default)]
    pub draft: DraftTimings,
}

/// App-level settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct App {
    pub data_dir: String,
    /// Dataset file; the bundled dataset is used when unset.
    #[serde(default)]
    pub directory_file: Option<String>,
    /// Extra campaign definitions (YAML); the built-in campaigns are always available.
    #[serde(default)]
    pub campaign_file: Option<String>,
    pub default_campaign: String,
}

/// Local cache settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Storage {
    pub cache_ttl_hours: u64,
}

impl Default for Storage {
    fn default() -> Self {
        Self { cache_ttl_hours: 24 }
    }
}

/// Draft lifecycle timers, in seconds.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DraftTimings {
    pub autosave_interval_secs: u64,
    pub inactivity_timeout_secs: u64,
    pub toast_secs: u64,
}

impl Default for DraftTimings {
    fn default() -> Self {
        Self {
            autosave_interval_secs: 30,
            inactivity_timeout_secs: 5 * 60,
            toast_secs: 3,
        }
    }
}

impl DraftTimings {
    pub fn autosave_interval(&self) -> Duration {
        Duration::from_secs(self.autosave_interval_secs)
    }

    pub fn inactivity_timeout(&self) -> Duration {
        Duration::from_secs(self.inactivity_timeout_secs)
    }

    pub fn toast(&self) -> Duration {
        Duration::from_secs(self.toast_secs)
    }
}

impl App {
    /// `data_dir` with a leading `~/` expanded.
    pub fn resolved_data_dir(&self) -> PathBuf {
        match self.data_dir.strip_prefix("~/") {
            Some(rest) => match std::env::var("HOME") {
                Ok(home) => Path::new(&home).join(rest),
                Err(_) => PathBuf::from(&self.data_dir),
            },
            None => PathBuf::from(&self.data_dir),
        }
    }
}

impl Config {
    /// Ensure required directories exist (creates `app.data_dir` if missing).
    pub fn ensure_dirs(&self) -> Result<(), std::io::Error> {
        if self.app.data_dir.trim().is_empty() {
            return Ok(());
        }
        fs::create_dir_all(self.app.resolved_data_dir())
    }

    pub fn database_url(&self) -> String {
        format!(
            "sqlite://{}/outreach.db",
            self.app.resolved_data_dir().display()
        )
    }

    pub fn cache_ttl(&self) -> chrono::Duration {
        chrono::Duration::hours(self.storage.cache_ttl_hours as i64)
    }
}

/// Upper bound for `storage.cache_ttl_hours` (one year).
pub const MAX_CACHE_TTL_HOURS: u64 = 24 * 365;

/// Load configuration from a YAML file and validate it.
/// - If `path` is None, uses `config.yaml` in the current working directory.
pub fn load(path: Option<&Path>) -> Result<Config, ConfigError> {
    let path = path.unwrap_or_else(|| Path::new("config.yaml"));
    let content = fs::read_to_string(path)?;
    let cfg: Config = serde_yaml::from_str(&content)?;
    validate(&cfg)?;
    Ok(cfg)
}

/// Load `path` if it exists, otherwise fall back to the built-in example.
pub fn load_or_default(path: &Path) -> Result<Config, ConfigError> {
    if path.exists() {
        return load(Some(path));
    }
    let cfg: Config = serde_yaml::from_str(example())?;
    validate(&cfg)?;
    Ok(cfg)
}

/// Validate a configuration instance.
fn validate(cfg: &Config) -> Result<(), ConfigError> {
    if cfg.app.data_dir.trim().is_empty() {
        return Err(ConfigError::Invalid("app.data_dir must be non-empty"));
    }
    if cfg.app.default_campaign.trim().is_empty() {
        return Err(ConfigError::Invalid("app.default_campaign must be non-empty"));
    }
    if matches!(&cfg.app.directory_file, Some(p) if p.trim().is_empty()) {
        return Err(ConfigError::Invalid("app.directory_file must be non-empty when set"));
    }
    if matches!(&cfg.app.campaign_file, Some(p) if p.trim().is_empty()) {
        return Err(ConfigError::Invalid("app.campaign_file must be non-empty when set"));
    }

    if cfg.storage.cache_ttl_hours == 0 {
        return Err(ConfigError::Invalid("storage.cache_ttl_hours must be > 0"));
    }
    if cfg.storage.cache_ttl_hours > MAX_CACHE_TTL_HOURS {
        return Err(ConfigError::Invalid(
            "storage.cache_ttl_hours must be at most one year",
        ));
    }

    let d = &cfg.draft;
    if d.autosave_interval_secs == 0 {
        return Err(ConfigError::Invalid("draft.autosave_interval_secs must be > 0"));
    }
    if d.inactivity_timeout_secs == 0 {
        return Err(ConfigError::Invalid("draft.inactivity_timeout_secs must be > 0"));
    }
    if d.toast_secs == 0 {
        return Err(ConfigError::Invalid("draft.toast_secs must be > 0"));
    }

    Ok(())
}

/// Returns the example YAML shipped with the tool.
pub fn example() -> &'static str {
    r#"app:
  data_dir: "./data"
  # directory_file: "./data/meps.json"
  # campaign_file: "./campaigns/extra.yaml"
  default_campaign: "iran"

storage:
  cache_ttl_hours: 24

draft:
  autosave_interval_secs: 30
  inactivity_timeout_secs: 300
  toast_secs: 3
"#
}
