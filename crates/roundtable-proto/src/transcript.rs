//! Append-only conversation transcript.
//!
//! The transcript stores messages in the order they were produced and
//! notifies observers as each one is recorded. Observers are the live
//! per-message hook: recorders and best-effort extractors subscribe here
//! without touching turn-taking logic.

use crate::{AgentId, Message};

/// Type alias for the observer callback function.
type Observer = Box<dyn Fn(&Message) + Send + 'static>;

/// Ordered, append-only list of messages with observers.
#[derive(Default)]
pub struct Transcript {
    messages: Vec<Message>,
    observers: Vec<Observer>,
}

impl std::fmt::Debug for Transcript {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transcript")
            .field("messages", &self.messages)
            .field("observers", &self.observers.len())
            .finish()
    }
}

impl Transcript {
    /// Creates a new empty transcript.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an observer that receives every recorded message.
    ///
    /// Observers are called in registration order, after the message has
    /// been appended.
    pub fn add_observer<F>(&mut self, observer: F)
    where
        F: Fn(&Message) + Send + 'static,
    {
        self.observers.push(Box::new(observer));
    }

    /// Removes all observers.
    pub fn clear_observers(&mut self) {
        self.observers.clear();
    }

    /// Records a message from `sender` and returns it.
    ///
    /// The sequence index is assigned here so it always matches the
    /// message's position.
    pub fn record(&mut self, sender: impl Into<AgentId>, text: impl Into<String>) -> &Message {
        let message = Message::new(sender, text, self.messages.len());
        self.messages.push(message);
        let recorded = &self.messages[self.messages.len() - 1];
        for observer in &self.observers {
            observer(recorded);
        }
        recorded
    }

    /// Returns all messages in order.
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Consumes the transcript and returns its messages.
    pub fn into_messages(self) -> Vec<Message> {
        self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Returns the messages sent by one participant.
    pub fn from_sender<'a>(&'a self, agent: &'a str) -> impl Iterator<Item = &'a Message> + 'a {
        self.messages.iter().filter(move |m| m.is_from(agent))
    }

    /// Returns the last message sent by one participant.
    pub fn last_from(&self, agent: &str) -> Option<&Message> {
        self.messages.iter().rev().find(|m| m.is_from(agent))
    }
}
