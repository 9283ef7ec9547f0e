use tokio::task::JoinHandle;
use tokio::time::Instant;

/// A prompt submitted to the host that is still waiting for its response.
pub struct PendingPrompt {
    pub client_msg_id: String,
    pub prompt_text: String,
    pub start_time: Instant,
    pub timeout_at: Instant,
    /// Sequence key of the container that claimed this prompt when it first appeared.
    pub claimed_by: Option<String>,
    timer: Option<JoinHandle<()>>,
}

impl PendingPrompt {
    pub fn new(client_msg_id: &str, prompt_text: &str, timeout: std::time::Duration) -> PendingPrompt {
        let start_time = Instant::now();
        return PendingPrompt {
            client_msg_id: client_msg_id.to_string(),
            prompt_text: prompt_text.to_string(),
            start_time,
            timeout_at: start_time + timeout,
            claimed_by: None,
            timer: None,
        };
    }

    /// Starts the response deadline now, replacing any timer armed before.
    pub fn arm(&mut self, timeout: std::time::Duration, timer: JoinHandle<()>) {
        self.cancel_timer();
        self.timeout_at = Instant::now() + timeout;
        self.timer = Some(timer);
    }

    pub fn cancel_timer(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
    }
}

impl Drop for PendingPrompt {
    fn drop(&mut self) {
        self.cancel_timer();
    }
}
