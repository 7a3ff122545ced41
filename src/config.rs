use std::ffi::OsString;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;
pub const DEFAULT_BACKEND_URL: &str = "http://127.0.0.1:8080";
pub const DEFAULT_COMMAND_PATH: &str = "/command";

pub const ENV_BACKEND_URL: &str = "DASHBOARD_BACKEND_URL";
pub const ENV_TIMEOUT_MS: &str = "DASHBOARD_TIMEOUT_MS";

const SETTINGS_VERSION: u32 = 1;

fn default_timeout_ms() -> u64 {
    DEFAULT_TIMEOUT_MS
}

fn default_backend_url() -> String {
    DEFAULT_BACKEND_URL.to_string()
}

fn default_command_path() -> String {
    DEFAULT_COMMAND_PATH.to_string()
}

// ── Dispatch client config ──────────────────────────────────────

/// Settings recognized by the dispatch client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchConfig {
    /// Deadline for every request unless overridden per send.
    #[serde(default = "default_timeout_ms", alias = "timeoutMs")]
    pub timeout_ms: u64,
    /// Upper bound on requests in flight at once. `None` = unbounded.
    #[serde(default, alias = "maxConcurrentRequests")]
    pub max_concurrent_requests: Option<usize>,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            timeout_ms: DEFAULT_TIMEOUT_MS,
            max_concurrent_requests: None,
        }
    }
}

impl DispatchConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    pub fn with_max_concurrent(mut self, cap: usize) -> Self {
        self.max_concurrent_requests = Some(cap);
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.timeout_ms == 0 {
            return Err(ConfigError::Invalid("timeout_ms must be positive".into()));
        }
        if self.max_concurrent_requests == Some(0) {
            return Err(ConfigError::Invalid(
                "max_concurrent_requests must be positive when set".into(),
            ));
        }
        Ok(())
    }
}

// ── Settings file ────────────────────────────────────────────────

/// Client settings stored in the OS config directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    pub version: u32,
    #[serde(default = "default_backend_url")]
    pub backend_url: String,
    /// Path appended to `backend_url` for command POSTs.
    #[serde(default = "default_command_path")]
    pub command_path: String,
    #[serde(default)]
    pub dispatch: DispatchConfig,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            version: SETTINGS_VERSION,
            backend_url: default_backend_url(),
            command_path: default_command_path(),
            dispatch: DispatchConfig::default(),
        }
    }
}

impl Settings {
    /// Full URL commands are posted to.
    pub fn command_url(&self) -> String {
        format!(
            "{}/{}",
            self.backend_url.trim_end_matches('/'),
            self.command_path.trim_start_matches('/')
        )
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.backend_url.starts_with("http://") || self.backend_url.starts_with("https://")) {
            return Err(ConfigError::Invalid(format!(
                "backend_url must be an http(s) URL, got '{}'",
                self.backend_url
            )));
        }
        self.dispatch.validate()
    }

    /// Apply `DASHBOARD_*` environment overrides.
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        self.apply_overrides(
            std::env::var(ENV_BACKEND_URL).ok(),
            std::env::var(ENV_TIMEOUT_MS).ok(),
        )
    }

    fn apply_overrides(
        &mut self,
        backend_url: Option<String>,
        timeout_ms: Option<String>,
    ) -> Result<(), ConfigError> {
        if let Some(url) = backend_url.filter(|u| !u.trim().is_empty()) {
            self.backend_url = url.trim().to_string();
        }
        if let Some(raw) = timeout_ms {
            self.dispatch.timeout_ms = raw.trim().parse().map_err(|_| {
                ConfigError::Invalid(format!("{ENV_TIMEOUT_MS} is not a number: '{raw}'"))
            })?;
        }
        Ok(())
    }
}

/// Load settings from `path`. A missing file yields the defaults.
pub fn load_settings(path: &Path) -> Result<Settings, ConfigError> {
    if !path.exists() {
        return Ok(Settings::default());
    }
    let data = std::fs::read_to_string(path)?;
    let settings: Settings = serde_json::from_str(&data)?;
    settings.validate()?;
    Ok(settings)
}

/// Save settings to `path`, creating the parent directory if needed.
pub fn save_settings(path: &Path, settings: &Settings) -> Result<(), ConfigError> {
    settings.validate()?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(settings)?;
    atomic_write(path, json.as_bytes())
}

/// Write to a sibling `.tmp` file and rename over the target.
fn atomic_write(path: &Path, data: &[u8]) -> Result<(), ConfigError> {
    let mut tmp_name = OsString::from(path.file_name().unwrap_or_default());
    tmp_name.push(".tmp");
    let tmp_path = path.with_file_name(&tmp_name);
    std::fs::write(&tmp_path, data)?;
    std::fs::rename(&tmp_path, path)?;
    Ok(())
}
