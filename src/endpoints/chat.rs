//! AI chat endpoint.
//!
//! The server streams `chunk` deltas for live typing and then sends the
//! authoritative reply in the `complete` frame.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::client::Endpoint;
use crate::reducer::{append, Accumulator, Field, Reducer, Transition};

/// Who wrote a message in the conversation history.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self { role: Role::User, content: content.into() }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: Role::Assistant, content: content.into() }
    }
}

/// Request body of the chat endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    pub message: String,
    #[serde(default)]
    pub conversation_history: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub template: Option<String>,
}

impl ChatRequest {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            conversation_history: Vec::new(),
            template: None,
        }
    }

    pub fn with_history(mut self, history: Vec<ChatMessage>) -> Self {
        self.conversation_history = history;
        self
    }

    pub fn with_template(mut self, template: impl Into<String>) -> Self {
        self.template = Some(template.into());
        self
    }
}

/// Wire frames of the chat endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChatFrame {
    Status {
        message: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        provider: Option<String>,
    },
    Chunk {
        #[serde(alias = "data")]
        content: String,
    },
    /// Fields stay raw so a mistyped value cannot drop the terminal frame.
    Complete {
        #[serde(default)]
        response: Option<Value>,
        #[serde(default)]
        provider: Option<Value>,
    },
    Error {
        message: String,
    },
}

/// Final chat result.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatReply {
    pub response: String,
    pub provider: Option<String>,
}

/// Text streamed so far.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChatTranscript {
    pub full_content: String,
}

impl Accumulator for ChatTranscript {
    fn text(&self, field: Field) -> &str {
        match field {
            Field::Content => &self.full_content,
            Field::Title | Field::Description => "",
        }
    }
}

pub struct ChatReducer;

impl Reducer for ChatReducer {
    type Frame = ChatFrame;
    type Accumulator = ChatTranscript;
    type Output = ChatReply;

    fn reduce(acc: &mut ChatTranscript, frame: ChatFrame) -> Transition<ChatReply> {
        match frame {
            ChatFrame::Status { message, provider } => Transition::Status { message, provider },
            ChatFrame::Chunk { content } => append(&mut acc.full_content, Field::Content, content),
            ChatFrame::Complete { response, provider } => Transition::Complete(ChatReply {
                // Streamed text is only the fallback for servers that omit the final reply.
                response: response
                    .and_then(lenient_text)
                    .unwrap_or_else(|| acc.full_content.clone()),
                provider: provider.and_then(lenient_text),
            }),
            ChatFrame::Error { message } => Transition::Failed(message),
        }
    }
}

/// Text of a loosely typed field: strings as-is, `{"name": ..}` objects by
/// name, other non-null values as JSON.
fn lenient_text(value: Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(text) => Some(text),
        Value::Object(ref map) => match map.get("name").and_then(Value::as_str) {
            Some(name) => Some(name.to_string()),
            None => Some(value.to_string()),
        },
        other => Some(other.to_string()),
    }
}

impl Endpoint for ChatReducer {
    const PATH: &'static str = "/api/ai/chat/stream";
    type Request = ChatRequest;
}
