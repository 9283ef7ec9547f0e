#[cfg(test)]
#[path = "pending_test.rs"]
mod tests;

use crate::domain::models::PendingPrompt;

/// Prompts submitted to the host and still waiting for a response, oldest first.
#[derive(Default)]
pub struct PendingPrompts {
    prompts: Vec<PendingPrompt>,
}

impl PendingPrompts {
    /// Adds `prompt` unless one with the same client message id is already waiting.
    pub fn register(&mut self, prompt: PendingPrompt) -> bool {
        if self.contains(&prompt.client_msg_id) {
            return false;
        }

        self.prompts.push(prompt);
        return true;
    }

    pub fn contains(&self, client_msg_id: &str) -> bool {
        return self.get(client_msg_id).is_some();
    }

    pub fn get(&self, client_msg_id: &str) -> Option<&PendingPrompt> {
        return self
            .prompts
            .iter()
            .find(|e| return e.client_msg_id == client_msg_id);
    }

    pub fn get_mut(&mut self, client_msg_id: &str) -> Option<&mut PendingPrompt> {
        return self
            .prompts
            .iter_mut()
            .find(|e| return e.client_msg_id == client_msg_id);
    }

    /// Associates the container `key` with the oldest prompt nobody claimed yet.
    pub fn claim_oldest_unclaimed(&mut self, key: &str) -> Option<String> {
        let prompt = self.prompts.iter_mut().find(|e| return e.claimed_by.is_none())?;
        prompt.claimed_by = Some(key.to_string());
        return Some(prompt.client_msg_id.to_string());
    }

    /// Returns every prompt claimed by `key` to the unclaimed pool. Returns how many were
    /// released.
    pub fn release(&mut self, key: &str) -> usize {
        let mut released = 0;
        for prompt in self.prompts.iter_mut() {
            if prompt.claimed_by.as_deref() == Some(key) {
                prompt.claimed_by = None;
                released += 1;
            }
        }

        return released;
    }

    pub fn take(&mut self, client_msg_id: &str) -> Option<PendingPrompt> {
        let idx = self
            .prompts
            .iter()
            .position(|e| return e.client_msg_id == client_msg_id)?;
        return Some(self.prompts.remove(idx));
    }

    /// Removes the prompt a finalized message answers: the one its container claimed,
    /// otherwise the oldest unclaimed one.
    pub fn take_for_message(&mut self, key: &str) -> Option<PendingPrompt> {
        let idx = self
            .prompts
            .iter()
            .position(|e| return e.claimed_by.as_deref() == Some(key))
            .or_else(|| {
                return self
                    .prompts
                    .iter()
                    .position(|e| return e.claimed_by.is_none());
            })?;

        return Some(self.prompts.remove(idx));
    }

    pub fn len(&self) -> usize {
        return self.prompts.len();
    }

    pub fn is_empty(&self) -> bool {
        return self.prompts.is_empty();
    }

    /// Drops every prompt without answering it, cancelling their timeouts.
    pub fn clear(&mut self) {
        self.prompts.clear();
    }
}
