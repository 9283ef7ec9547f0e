#[cfg(test)]
#[path = "envelope_test.rs"]
mod tests;

use serde_derive::Deserialize;
use serde_derive::Serialize;
use serde_json::Value;

use super::CodeBlock;
use super::Message;

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_index: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub has_code_blocks: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code_blocks: Option<Vec<CodeBlock>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<bool>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseEnvelope {
    pub session_id: String,
    pub client_msg_id: String,
    pub text: String,
    pub metadata: ResponseMetadata,
}

impl ResponseEnvelope {
    pub fn from_message(session_id: &str, client_msg_id: &str, message: &Message) -> ResponseEnvelope {
        return ResponseEnvelope {
            session_id: session_id.to_string(),
            client_msg_id: client_msg_id.to_string(),
            text: message.relay_text(),
            metadata: ResponseMetadata {
                source_id: message.id.clone(),
                source_index: Some(message.sequence_key.to_string()),
                timestamp: Some(message.timestamp),
                has_code_blocks: Some(message.has_code_blocks()),
                code_blocks: Some(message.code_blocks.clone()),
                error: None,
            },
        };
    }

    pub fn error(session_id: &str, client_msg_id: &str, reason: &str) -> ResponseEnvelope {
        return ResponseEnvelope {
            session_id: session_id.to_string(),
            client_msg_id: client_msg_id.to_string(),
            text: format!("Error: {reason}"),
            metadata: ResponseMetadata {
                error: Some(true),
                ..ResponseMetadata::default()
            },
        };
    }
}

/// Frames sent to the relay server.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Outbound {
    Response(ResponseEnvelope),
    Pong { ts: Value },
}

/// Frames received from the relay server.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Inbound {
    Prompt {
        client_msg_id: String,
        prompt: String,
    },
    Ping {
        #[serde(default)]
        ts: Value,
    },
    Message {
        #[serde(default)]
        data: Value,
    },
    Error {
        #[serde(default)]
        error: Option<String>,
        #[serde(default)]
        details: Option<Value>,
    },
}
