//! Participant definitions.
//!
//! A participant is one seat at the table: either a model-backed agent with a
//! system message and an endpoint, or a proxy that speaks for the operator.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Unique identifier for a participant (its display name).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AgentId(String);

impl AgentId {
    /// Creates a new agent ID.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the ID as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AgentId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for AgentId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Where and how to reach a text-completion provider.
///
/// The credential is a placeholder for local servers that ignore it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelEndpoint {
    pub base_url: String,
    pub api_key: String,
    pub model: String,
}

impl ModelEndpoint {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            model: model.into(),
        }
    }
}

/// How a participant produces its turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParticipantKind {
    /// Replies come from a language model.
    Model {
        endpoint: ModelEndpoint,
        system_message: String,
    },
    /// Replies are a fixed auto-reply; an empty auto-reply means the proxy
    /// passes its turn without speaking.
    Proxy { auto_reply: String },
}

/// A participant in a conversation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Participant {
    pub id: AgentId,
    pub kind: ParticipantKind,
}

impl Participant {
    /// Creates a model-backed participant.
    pub fn model(
        id: impl Into<AgentId>,
        endpoint: ModelEndpoint,
        system_message: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            kind: ParticipantKind::Model {
                endpoint,
                system_message: system_message.into(),
            },
        }
    }

    /// Creates a silent proxy participant.
    pub fn proxy(id: impl Into<AgentId>) -> Self {
        Self {
            id: id.into(),
            kind: ParticipantKind::Proxy {
                auto_reply: String::new(),
            },
        }
    }

    /// Sets the proxy auto-reply. Has no effect on model participants.
    pub fn with_auto_reply(mut self, reply: impl Into<String>) -> Self {
        if let ParticipantKind::Proxy { auto_reply } = &mut self.kind {
            *auto_reply = reply.into();
        }
        self
    }

    /// Returns the model identifier, if this participant is model-backed.
    pub fn model_name(&self) -> Option<&str> {
        match &self.kind {
            ParticipantKind::Model { endpoint, .. } => Some(&endpoint.model),
            ParticipantKind::Proxy { .. } => None,
        }
    }

    pub fn is_proxy(&self) -> bool {
        matches!(self.kind, ParticipantKind::Proxy { .. })
    }
}
