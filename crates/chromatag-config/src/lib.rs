// SPDX-License-Identifier: GPL-3.0-or-later
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Result;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use tracing::info;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AcoustidConfig {
    /// Application API key.
    pub api_key: Option<String>,
    /// User API key, needed only for submissions.
    pub user_key: Option<String>,
    pub base_url: String,
    pub timeout_secs: u64,
    pub requests_per_window: usize,
    pub window_ms: u64,
}

impl AcoustidConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn window(&self) -> Duration {
        Duration::from_millis(self.window_ms)
    }
}

impl Default for AcoustidConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            user_key: None,
            base_url: "https://api.acoustid.org/v2".to_string(),
            timeout_secs: 30,
            requests_per_window: 3,
            window_ms: 1000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FingerprintConfig {
    /// `auto`, `native`, or `fpcalc`.
    pub backend: String,
    pub fpcalc_path: Option<PathBuf>,
    pub max_length_secs: u32,
}

impl Default for FingerprintConfig {
    fn default() -> Self {
        Self {
            backend: "auto".to_string(),
            fpcalc_path: None,
            max_length_secs: 120,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    pub log_level: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    pub acoustid: AcoustidConfig,
    pub fingerprint: FingerprintConfig,
    pub telemetry: TelemetryConfig,
}

/// Load configuration from defaults, optional TOML file, and environment overrides (prefix: CHROMATAG_).
pub fn load(config_path: Option<&Path>) -> Result<AppConfig> {
    let mut figment = Figment::from(Serialized::defaults(AppConfig::default()));

    if let Some(path) = config_path {
        figment = figment.merge(Toml::file(path));
    }

    figment = figment.merge(Env::prefixed("CHROMATAG_").split("__"));

    let config: AppConfig = figment.extract()?;
    info!(target: "config", "configuration loaded");
    Ok(config)
}
