//! Scripted backend for deterministic tests.
//!
//! Replies are queued per agent and served in order. Every request is kept
//! so tests can assert on the context each participant received.

use async_trait::async_trait;
use roundtable_proto::{BackendError, ChatBackend, ChatRequest};
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

/// A `ChatBackend` that serves pre-scripted replies.
#[derive(Debug, Default)]
pub struct ScriptedBackend {
    replies: Mutex<HashMap<String, VecDeque<String>>>,
    requests: Mutex<Vec<ChatRequest>>,
    delay: Option<Duration>,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues one reply for an agent.
    pub fn reply(self, agent: &str, text: impl Into<String>) -> Self {
        if let Ok(mut replies) = self.replies.lock() {
            replies
                .entry(agent.to_string())
                .or_default()
                .push_back(text.into());
        }
        self
    }

    /// Queues several replies for an agent.
    pub fn replies<I, S>(mut self, agent: &str, texts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for text in texts {
            self = self.reply(agent, text);
        }
        self
    }

    /// Waits this long before every reply.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Requests received so far, in order.
    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }

    /// Replies still queued across all agents.
    pub fn remaining(&self) -> usize {
        self.replies
            .lock()
            .map(|r| r.values().map(VecDeque::len).sum())
            .unwrap_or(0)
    }
}

#[async_trait]
impl ChatBackend for ScriptedBackend {
    async fn complete(&self, request: &ChatRequest) -> Result<String, BackendError> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request.clone());
        }

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let next = self
            .replies
            .lock()
            .ok()
            .and_then(|mut r| r.get_mut(&request.agent).and_then(VecDeque::pop_front));

        next.ok_or_else(|| BackendError::Exhausted {
            agent: request.agent.clone(),
        })
    }
}
