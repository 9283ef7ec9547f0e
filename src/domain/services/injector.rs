#[cfg(test)]
#[path = "injector_test.rs"]
mod tests;

use std::time::Duration;

use anyhow::Result;
use tokio::time;

use crate::domain::models::SurfaceDriverBox;

/// Submits prompts through the host's own input surface.
#[derive(Clone)]
pub struct PromptInjector {
    driver: SurfaceDriverBox,
    settle_delay: Duration,
}

impl PromptInjector {
    pub fn new(driver: SurfaceDriverBox, settle_delay: Duration) -> PromptInjector {
        return PromptInjector {
            driver,
            settle_delay,
        };
    }

    /// Replaces the input content with `text` and submits it. The host only enables its
    /// submit control once it processed the edit, hence the settle delay in between.
    pub async fn inject(&self, text: &str) -> Result<()> {
        self.driver.focus().await?;
        self.driver.replace_content(text).await?;
        time::sleep(self.settle_delay).await;
        self.driver.submit().await?;

        return Ok(());
    }
}
