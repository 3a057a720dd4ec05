//! # roundtable-proto
//!
//! Shared types, error definitions, and traits for Roundtable.
//!
//! This crate provides the foundational abstractions used across all Roundtable
//! crates, including:
//! - Participant identities and model endpoints
//! - Messages and the append-only conversation transcript
//! - The `ChatBackend` trait implemented by language-model adapters
//! - Common error types

mod agent;
mod backend;
mod error;
mod message;
mod transcript;

pub use agent::{AgentId, ModelEndpoint, Participant, ParticipantKind};
pub use backend::{ChatBackend, ChatMessage, ChatRequest, ChatRole};
pub use error::{BackendError, Error, Result};
pub use message::Message;
pub use transcript::Transcript;
