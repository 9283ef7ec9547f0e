#[cfg(test)]
#[path = "completion_test.rs"]
mod tests;

use std::collections::HashMap;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time;

use crate::domain::models::Event;
use crate::domain::models::Message;
use crate::domain::models::SIGNATURE_PREFIX_LEN;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PollOutcome {
    /// The key is not being polled, the sample was dropped.
    Untracked,
    Waiting,
    /// Content held still long enough. Polling for the key has stopped.
    Settled,
}

struct Tracked {
    last_signature: Option<String>,
    stable_count: u32,
    code_container_count: usize,
    timer: JoinHandle<()>,
}

/// Decides when a streaming message stopped changing. Each tracked key gets its own
/// timer, which only asks the agent for a fresh sample through `Event::CompletionPoll`.
pub struct CompletionDetector {
    interval: Duration,
    threshold: u32,
    tx: mpsc::UnboundedSender<Event>,
    tracked: HashMap<String, Tracked>,
}

impl CompletionDetector {
    pub fn new(
        interval: Duration,
        threshold: u32,
        tx: mpsc::UnboundedSender<Event>,
    ) -> CompletionDetector {
        return CompletionDetector {
            interval,
            threshold: threshold.max(1),
            tx,
            tracked: HashMap::new(),
        };
    }

    /// Starts polling `key`, replacing any timer it already had.
    pub fn track(&mut self, key: &str) {
        self.untrack(key);

        let tx = self.tx.clone();
        let interval = self.interval;
        let poll_key = key.to_string();
        let timer = tokio::spawn(async move {
            let mut ticker = time::interval_at(time::Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if tx.send(Event::CompletionPoll(poll_key.to_string())).is_err() {
                    return;
                }
            }
        });

        self.tracked.insert(
            key.to_string(),
            Tracked {
                last_signature: None,
                stable_count: 0,
                code_container_count: 0,
                timer,
            },
        );
    }

    pub fn is_tracking(&self, key: &str) -> bool {
        return self.tracked.contains_key(key);
    }

    pub fn untrack(&mut self, key: &str) {
        if let Some(state) = self.tracked.remove(key) {
            state.timer.abort();
        }
    }

    pub fn clear(&mut self) {
        for (_, state) in self.tracked.drain() {
            state.timer.abort();
        }
    }

    pub fn len(&self) -> usize {
        return self.tracked.len();
    }

    pub fn stable_count(&self, key: &str) -> Option<u32> {
        return self.tracked.get(key).map(|e| return e.stable_count);
    }

    pub fn code_container_count(&self, key: &str) -> Option<usize> {
        return self.tracked.get(key).map(|e| return e.code_container_count);
    }

    /// Feeds one fresh extraction of `key`. `code_container_count` is the number of code
    /// block containers present in the host markup, rendered or not.
    pub fn observe(
        &mut self,
        key: &str,
        message: &Message,
        code_container_count: usize,
    ) -> PollOutcome {
        let threshold = self.threshold;
        let state = match self.tracked.get_mut(key) {
            Some(state) => state,
            None => return PollOutcome::Untracked,
        };

        state.code_container_count = code_container_count;

        // Code containers exist but their editors have not rendered any lines yet.
        if code_container_count > 0 && !message.has_code_blocks() {
            state.stable_count = 0;
            return PollOutcome::Waiting;
        }

        let signature = message.signature(SIGNATURE_PREFIX_LEN);
        if state.last_signature.as_deref() == Some(signature.as_str()) {
            state.stable_count += 1;
        } else {
            state.stable_count = 0;
            state.last_signature = Some(signature);
        }

        if state.stable_count < threshold {
            return PollOutcome::Waiting;
        }

        tracing::debug!(key, stable_count = state.stable_count, "Message settled");
        self.untrack(key);
        return PollOutcome::Settled;
    }
}

impl Drop for CompletionDetector {
    fn drop(&mut self) {
        self.clear();
    }
}
