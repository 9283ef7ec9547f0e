#[cfg(test)]
#[path = "message_test.rs"]
mod tests;

use serde_derive::Deserialize;
use serde_derive::Serialize;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeBlock {
    pub filename: String,
    pub code: String,
}

impl CodeBlock {
    pub fn new(filename: &str, code: &str) -> CodeBlock {
        return CodeBlock {
            filename: filename.to_string(),
            code: code.to_string(),
        };
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: Option<String>,
    pub sequence_key: String,
    pub text: String,
    pub code_blocks: Vec<CodeBlock>,
    pub is_assistant: bool,
    /// Milliseconds since the epoch of the latest extraction.
    pub timestamp: i64,
    pub completed: bool,
}

impl Message {
    pub fn new(sequence_key: &str, text: &str) -> Message {
        return Message {
            id: None,
            sequence_key: sequence_key.to_string(),
            text: text.to_string(),
            code_blocks: vec![],
            is_assistant: true,
            timestamp: chrono::Utc::now().timestamp_millis(),
            completed: false,
        };
    }

    pub fn has_code_blocks(&self) -> bool {
        return !self.code_blocks.is_empty();
    }

    pub fn is_empty(&self) -> bool {
        return self.text.is_empty() && self.code_blocks.is_empty();
    }

    /// Text with every code block appended as an inline `[CODE: <filename>]` section.
    pub fn relay_text(&self) -> String {
        let mut text = self.text.to_string();
        for block in self.code_blocks.iter() {
            text += &format!("\n\n[CODE: {}]\n{}", block.filename, block.code);
        }

        if text.is_empty() {
            return "(empty)".to_string();
        }

        return text;
    }

    /// Compact fingerprint of the content: the text, the number of code blocks, and the
    /// first `prefix_len` characters and length of each block.
    pub fn signature(&self, prefix_len: usize) -> String {
        let blocks = self
            .code_blocks
            .iter()
            .map(|block| {
                let prefix = block.code.chars().take(prefix_len).collect::<String>();
                return format!("{}:{}:{prefix}", block.filename, block.code.chars().count());
            })
            .collect::<Vec<String>>()
            .join("\u{1f}");

        return format!("{}\u{1e}{}\u{1e}{blocks}", self.text, self.code_blocks.len());
    }

    /// Compares text and code blocks, ignoring capture time and completion.
    pub fn same_content(&self, other: &Message) -> bool {
        return self.text == other.text && self.code_blocks == other.code_blocks;
    }
}
