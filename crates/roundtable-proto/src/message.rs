//! Conversation messages.

use crate::AgentId;
use serde::{Deserialize, Serialize};

/// One turn's output, as recorded in the transcript.
///
/// Messages are immutable once recorded; downstream stages only read them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// The participant that produced the text.
    pub sender: AgentId,

    /// Raw content as returned by the participant.
    pub text: String,

    /// Position in the run (the kickoff message is 0).
    pub sequence_index: usize,
}

impl Message {
    pub fn new(sender: impl Into<AgentId>, text: impl Into<String>, sequence_index: usize) -> Self {
        Self {
            sender: sender.into(),
            text: text.into(),
            sequence_index,
        }
    }

    /// Returns true if this message was sent by the given participant.
    pub fn is_from(&self, agent: &str) -> bool {
        self.sender.as_str() == agent
    }
}
