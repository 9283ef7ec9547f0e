use std::time::Duration;

use anyhow::anyhow;
use anyhow::Result;

use crate::configuration::Config;
use crate::configuration::ConfigKey;

/// Characters of each code block that take part in the completion signature.
pub const SIGNATURE_PREFIX_LEN: usize = 200;

#[derive(Clone, Debug)]
pub struct AgentSettings {
    pub server_url: String,
    pub session_id: String,
    pub enabled: bool,
    pub poll_interval: Duration,
    pub stability_threshold: u32,
    pub prompt_timeout: Duration,
    pub reconnect_delay: Duration,
    pub settle_delay: Duration,
}

fn parse_millis(key: ConfigKey) -> Result<Duration> {
    let val = Config::get(key);
    let millis = val
        .parse::<u64>()
        .map_err(|_| return anyhow!("Config value for '{key}' must be milliseconds, got '{val}'"))?;

    return Ok(Duration::from_millis(millis));
}

impl AgentSettings {
    pub fn from_config() -> Result<AgentSettings> {
        let threshold = Config::get(ConfigKey::StabilityThreshold);
        let stability_threshold = threshold.parse::<u32>().map_err(|_| {
            return anyhow!("Config value for 'stability-threshold' must be a positive number, got '{threshold}'");
        })?;

        return Ok(AgentSettings {
            server_url: Config::get(ConfigKey::ServerURL),
            session_id: Config::get(ConfigKey::SessionID),
            enabled: Config::get(ConfigKey::Enabled) != "false",
            poll_interval: parse_millis(ConfigKey::PollInterval)?,
            stability_threshold: stability_threshold.max(1),
            prompt_timeout: parse_millis(ConfigKey::PromptTimeout)?,
            reconnect_delay: parse_millis(ConfigKey::ReconnectDelay)?,
            settle_delay: parse_millis(ConfigKey::SettleDelay)?,
        });
    }
}

impl Default for AgentSettings {
    fn default() -> AgentSettings {
        return AgentSettings {
            server_url: "ws://localhost:8000".to_string(),
            session_id: "cursor-desktop-session".to_string(),
            enabled: true,
            poll_interval: Duration::from_millis(2000),
            stability_threshold: 1,
            prompt_timeout: Duration::from_millis(120000),
            reconnect_delay: Duration::from_millis(5000),
            settle_delay: Duration::from_millis(500),
        };
    }
}
