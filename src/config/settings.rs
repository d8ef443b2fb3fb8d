use crate::error::ConfigError;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Settings {
    pub config_path: PathBuf,
    pub slack: SlackConfig,
    pub refresh_interval: Duration,
}

/// The Slack workspace, presented to the bot as its single guild
#[derive(Debug, Clone)]
pub struct SlackConfig {
    pub team_id: String,
    pub team_name: String,
}

pub fn load_settings() -> Result<Settings, ConfigError> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    settings_from(|name| std::env::var(name).ok())
}

/// Build settings from a variable lookup
pub fn settings_from(var: impl Fn(&str) -> Option<String>) -> Result<Settings, ConfigError> {
    let config_path = var("ARCHIVE_BOT_CONFIG")
        .unwrap_or_else(|| "config.json".to_string())
        .into();

    let slack = SlackConfig {
        team_id: var("SLACK_TEAM_ID")
            .ok_or_else(|| ConfigError::Invalid("SLACK_TEAM_ID not set".to_string()))?,
        team_name: var("SLACK_TEAM_NAME").unwrap_or_else(|| "workspace".to_string()),
    };

    let refresh_secs: u64 = var("REFRESH_INTERVAL_SECS")
        .unwrap_or_else(|| "300".to_string())
        .parse()
        .map_err(|_| ConfigError::Invalid("Invalid REFRESH_INTERVAL_SECS".to_string()))?;

    Ok(Settings {
        config_path,
        slack,
        refresh_interval: Duration::from_secs(refresh_secs),
    })
}
