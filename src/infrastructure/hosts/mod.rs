pub mod chrome;
pub mod echo;
pub mod memory;

use std::time::Duration;

use anyhow::anyhow;
use anyhow::bail;
use anyhow::Result;

use crate::configuration::Config;
use crate::configuration::ConfigKey;
use crate::domain::models::Host;
use crate::domain::models::HostMarkup;
use crate::domain::models::HostName;

pub struct HostManager {}

impl HostManager {
    pub async fn get(name: HostName, markup: HostMarkup) -> Result<Host> {
        if name == HostName::Echo {
            return echo::build(markup);
        }

        if name == HostName::Chrome {
            let interval = Config::get(ConfigKey::MirrorInterval);
            let mirror_interval = interval.parse::<u64>().map_err(|_| {
                return anyhow!("Config value for 'mirror-interval' must be milliseconds, got '{interval}'");
            })?;

            let options = chrome::ChromeOptions {
                devtools_url: Config::get(ConfigKey::DevtoolsURL),
                page_match: Config::get(ConfigKey::PageMatch),
                mirror_interval: Duration::from_millis(mirror_interval),
            };
            return chrome::build(options, markup).await;
        }

        bail!(format!("No host implemented for {name}"))
    }
}
