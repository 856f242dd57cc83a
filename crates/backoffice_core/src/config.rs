use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::Context;
use serde::Deserialize;
use tracing::debug;

use crate::pagination::{PageSize, DEFAULT_PAGE_SIZE};

pub const DEFAULT_SETTINGS_FILE: &str = "backoffice.toml";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsoleSettings {
    pub api_base_url: String,
    pub api_token: Option<String>,
    pub debounce_ms: u64,
    pub default_page_size: u32,
    pub cache_stale_ms: u64,
    pub request_timeout_secs: u64,
}

impl Default for ConsoleSettings {
    fn default() -> Self {
        Self {
            api_base_url: "http://127.0.0.1:8000/api".into(),
            api_token: None,
            debounce_ms: 500,
            default_page_size: DEFAULT_PAGE_SIZE,
            cache_stale_ms: 0,
            request_timeout_secs: 30,
        }
    }
}

impl ConsoleSettings {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn cache_stale_after(&self) -> Duration {
        Duration::from_millis(self.cache_stale_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Falls back to the built-in default when the configured size is 0.
    pub fn page_size(&self) -> PageSize {
        PageSize::fixed(self.default_page_size).unwrap_or_default()
    }
}

/// Keys accepted in `backoffice.toml`; all optional.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct SettingsFile {
    api_base_url: Option<String>,
    api_token: Option<String>,
    debounce_ms: Option<u64>,
    default_page_size: Option<u32>,
    cache_stale_ms: Option<u64>,
    request_timeout_secs: Option<u64>,
}

/// Defaults, then `backoffice.toml` in the working directory if present,
/// then environment overrides.
pub fn load_settings() -> anyhow::Result<ConsoleSettings> {
    let default_file = PathBuf::from(DEFAULT_SETTINGS_FILE);
    let file = default_file.exists().then_some(default_file.as_path());
    load_settings_from(file, |name| std::env::var(name).ok())
}

/// Like [`load_settings`] with an explicit file (which must exist) and an
/// injectable environment lookup.
pub fn load_settings_from(
    file: Option<&Path>,
    env: impl Fn(&str) -> Option<String>,
) -> anyhow::Result<ConsoleSettings> {
    let mut settings = ConsoleSettings::default();

    if let Some(path) = file {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read settings file '{}'", path.display()))?;
        let file_cfg: SettingsFile = toml::from_str(&raw)
            .with_context(|| format!("invalid settings file '{}'", path.display()))?;
        apply_file(&mut settings, file_cfg);
        debug!(path = %path.display(), "loaded settings file");
    }

    apply_env_overrides(&mut settings, env);
    Ok(settings)
}

fn apply_file(settings: &mut ConsoleSettings, file_cfg: SettingsFile) {
    if let Some(v) = file_cfg.api_base_url {
        settings.api_base_url = v;
    }
    if let Some(v) = file_cfg.api_token {
        settings.api_token = Some(v);
    }
    if let Some(v) = file_cfg.debounce_ms {
        settings.debounce_ms = v;
    }
    if let Some(v) = file_cfg.default_page_size {
        settings.default_page_size = v;
    }
    if let Some(v) = file_cfg.cache_stale_ms {
        settings.cache_stale_ms = v;
    }
    if let Some(v) = file_cfg.request_timeout_secs {
        settings.request_timeout_secs = v;
    }
}

/// `BACKOFFICE__*` variables win over the file. Unparseable numbers are
/// ignored.
pub fn apply_env_overrides(settings: &mut ConsoleSettings, env: impl Fn(&str) -> Option<String>) {
    if let Some(v) = env("BACKOFFICE__API_BASE_URL") {
        settings.api_base_url = v;
    }
    if let Some(v) = env("BACKOFFICE__API_TOKEN") {
        settings.api_token = (!v.trim().is_empty()).then_some(v);
    }
    if let Some(v) = env("BACKOFFICE__DEBOUNCE_MS").and_then(|v| v.parse().ok()) {
        settings.debounce_ms = v;
    }
    if let Some(v) = env("BACKOFFICE__DEFAULT_PAGE_SIZE").and_then(|v| v.parse().ok()) {
        settings.default_page_size = v;
    }
    if let Some(v) = env("BACKOFFICE__CACHE_STALE_MS").and_then(|v| v.parse().ok()) {
        settings.cache_stale_ms = v;
    }
    if let Some(v) = env("BACKOFFICE__REQUEST_TIMEOUT_SECS").and_then(|v| v.parse().ok()) {
        settings.request_timeout_secs = v;
    }
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
