//! The seam between the turn sequencer and language-model providers.
//!
//! Providers are opaque text-completion services: given the prior
//! conversation they return the next message text. No protocol-level
//! assumptions leak past this trait.

use crate::{BackendError, ModelEndpoint};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Role of a chat message as seen by the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

/// A single message in a completion request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            content: content.into(),
            name: None,
        }
    }

    pub fn user(content: impl Into<String>, name: Option<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
            name,
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
            name: None,
        }
    }
}

/// A completion request on behalf of one participant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatRequest {
    /// The participant whose turn this is.
    pub agent: String,
    pub endpoint: ModelEndpoint,
    pub messages: Vec<ChatMessage>,
}

/// A text-completion provider.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Returns the next message text for the request.
    async fn complete(&self, request: &ChatRequest) -> Result<String, BackendError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_message_serialization() {
        let msg = ChatMessage::user("hola", Some("Coordinador".to_string()));
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["role"], "user");
        assert_eq!(json["name"], "Coordinador");

        let sys = serde_json::to_value(ChatMessage::system("rules")).unwrap();
        assert_eq!(sys["role"], "system");
        assert!(sys.get("name").is_none());
    }
}
