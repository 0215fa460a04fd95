use crate::application::sync_loop::DEFAULT_POLL_INTERVAL;
use anyhow::Context;
use config::builder::DefaultState;
use config::{ConfigBuilder, ConfigError};
use serde::Deserialize;
use std::time::Duration;

pub const DEFAULT_API_BASE_URL: &str = "http://localhost:8000/api";

/// Environment variable that points the client at a backend.
pub const API_URL_ENV: &str = "RECTIFIER_API_URL";

#[derive(Debug, Deserialize, Clone)]
pub struct DashboardConfig {
    pub api: ApiSettings,
    pub sync: SyncSettings,
    pub server: ServerSettings,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ApiSettings {
    pub base_url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SyncSettings {
    pub interval_ms: u64,
}

impl SyncSettings {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerSettings {
    pub bind: String,
}

fn defaults() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    config::Config::builder()
        .set_default("api.base_url", DEFAULT_API_BASE_URL)?
        .set_default("sync.interval_ms", DEFAULT_POLL_INTERVAL.as_millis() as u64)?
        .set_default("server.bind", "0.0.0.0:8080")
}

fn finish(builder: ConfigBuilder<DefaultState>) -> anyhow::Result<DashboardConfig> {
    let settings: DashboardConfig = builder
        .build()?
        .try_deserialize()
        .context("Invalid dashboard configuration")?;

    if settings.sync.interval_ms == 0 {
        anyhow::bail!("sync.interval_ms must be greater than zero");
    }

    Ok(settings)
}

/// Defaults, then `config/dashboard.*` if present, then `DASHBOARD__*`
/// variables, then `RECTIFIER_API_URL`.
pub fn load_dashboard_config() -> anyhow::Result<DashboardConfig> {
    let builder = defaults()?
        .add_source(config::File::with_name("config/dashboard").required(false))
        .add_source(config::Environment::with_prefix("DASHBOARD").separator("__"))
        .set_override_option("api.base_url", std::env::var(API_URL_ENV).ok())?;

    finish(builder)
}
