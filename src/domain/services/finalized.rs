#[cfg(test)]
#[path = "finalized_test.rs"]
mod tests;

use crate::domain::models::Message;

/// Finalized messages in finalization order, at most one per sequence key.
#[derive(Default)]
pub struct FinalizedMessages {
    messages: Vec<Message>,
}

impl FinalizedMessages {
    /// Stores `message`, replacing the entry with the same sequence key in place. Returns
    /// the replaced message.
    pub fn upsert(&mut self, message: Message) -> Option<Message> {
        if let Some(existing) = self
            .messages
            .iter_mut()
            .find(|e| return e.sequence_key == message.sequence_key)
        {
            return Some(std::mem::replace(existing, message));
        }

        self.messages.push(message);
        return None;
    }

    pub fn get(&self, key: &str) -> Option<&Message> {
        return self.messages.iter().find(|e| return e.sequence_key == key);
    }

    pub fn contains(&self, key: &str) -> bool {
        return self.get(key).is_some();
    }

    pub fn len(&self) -> usize {
        return self.messages.len();
    }

    pub fn iter(&self) -> impl Iterator<Item = &Message> {
        return self.messages.iter();
    }
}
