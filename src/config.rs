use std::fs;
use std::time::Duration;

use anyhow::{Context, bail};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AppConfig {
    pub log_level: String,
    pub log_dir: String,
    pub log_file: String,
    pub use_json: bool,
    pub rotation: String,
    /// Separate JSON file for lifecycle event records
    #[serde(default)]
    pub event_log_file: Option<String>,
    /// PostgreSQL connection URL; in-memory store when absent
    #[serde(default)]
    pub postgres_url: Option<String>,
    #[serde(default = "default_max_connections")]
    pub postgres_max_connections: u32,
    #[serde(default)]
    pub event_sink: EventSinkConfig,
}

fn default_max_connections() -> u32 {
    10
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum EventSinkKind {
    #[default]
    Log,
    Webhook,
    None,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct EventSinkConfig {
    pub kind: EventSinkKind,
    #[serde(default)]
    pub webhook_url: Option<String>,
    pub timeout_ms: u64,
}

impl Default for EventSinkConfig {
    fn default() -> Self {
        Self {
            kind: EventSinkKind::Log,
            webhook_url: None,
            timeout_ms: 2000,
        }
    }
}

impl EventSinkConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl AppConfig {
    pub fn load(env: &str) -> anyhow::Result<Self> {
        let config_path = format!("config/{}.yaml", env);
        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path))?;
        Self::from_yaml(&content).with_context(|| format!("Invalid config file: {}", config_path))
    }

    pub fn from_yaml(content: &str) -> anyhow::Result<Self> {
        let config: AppConfig =
            serde_yaml::from_str(content).context("Failed to parse config yaml")?;
        config.check()?;
        Ok(config)
    }

    fn check(&self) -> anyhow::Result<()> {
        if self.event_sink.kind == EventSinkKind::Webhook
            && self
                .event_sink
                .webhook_url
                .as_deref()
                .is_none_or(|url| url.trim().is_empty())
        {
            bail!("event_sink.webhook_url is required when kind is webhook");
        }
        if !matches!(self.rotation.as_str(), "hourly" | "daily" | "never") {
            bail!("rotation must be hourly, daily or never (got {})", self.rotation);
        }
        if let Some(file) = self.event_log_file.as_deref()
            && (file.trim().is_empty() || file == self.log_file)
        {
            bail!("event_log_file must be a non-empty name different from log_file");
        }
        Ok(())
    }
}
