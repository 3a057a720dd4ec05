//! Round-robin turn sequencer.
//!
//! Drives an ordered set of participants through a bounded number of turns.
//! Each model participant sees its system message plus the whole transcript;
//! proxies answer with a fixed auto-reply. The caller's termination predicate
//! is tested after every recorded reply, and a [`Deadline`] is raced against
//! every backend call.

use crate::watchdog::Deadline;
use roundtable_proto::{
    AgentId, ChatBackend, ChatMessage, ChatRequest, Error, Message, Participant, ParticipantKind,
    Result, Transcript,
};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Why a conversation stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TerminationReason {
    /// The termination predicate matched a reply.
    Completed,
    /// The round bound was reached.
    MaxRounds,
    /// The wall-clock deadline fired.
    TimedOut,
    /// A backend call failed.
    BackendFailure(String),
}

impl TerminationReason {
    /// Stable identifier used in reports and transcripts.
    pub fn as_str(&self) -> &'static str {
        match self {
            TerminationReason::Completed => "completed",
            TerminationReason::MaxRounds => "max_rounds",
            TerminationReason::TimedOut => "timed_out",
            TerminationReason::BackendFailure(_) => "backend_failure",
        }
    }
}

/// Summary of a finished conversation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationOutcome {
    pub reason: TerminationReason,
    /// Turns taken after the seed.
    pub rounds: u32,
    pub elapsed: Duration,
}

/// Predicate deciding whether a reply ends the conversation.
pub type TerminationCheck<'a> = dyn Fn(&Message) -> bool + Send + Sync + 'a;

/// A conversation between an ordered list of participants.
#[derive(Debug)]
pub struct Conversation {
    participants: Vec<Participant>,
    transcript: Transcript,
    max_rounds: u32,
}

impl Conversation {
    pub fn new(participants: Vec<Participant>, max_rounds: u32) -> Self {
        Self {
            participants,
            transcript: Transcript::new(),
            max_rounds,
        }
    }

    pub fn participants(&self) -> &[Participant] {
        &self.participants
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    /// Mutable access for installing observers.
    pub fn transcript_mut(&mut self) -> &mut Transcript {
        &mut self.transcript
    }

    pub fn into_transcript(self) -> Transcript {
        self.transcript
    }

    /// Builds the request a model participant sees for its turn.
    fn build_request(&self, speaker: &Participant) -> Option<ChatRequest> {
        let ParticipantKind::Model {
            endpoint,
            system_message,
        } = &speaker.kind
        else {
            return None;
        };

        let mut messages = Vec::with_capacity(self.transcript.len() + 1);
        messages.push(ChatMessage::system(system_message.clone()));
        for message in self.transcript.messages() {
            if message.sender == speaker.id {
                messages.push(ChatMessage::assistant(message.text.clone()));
            } else {
                messages.push(ChatMessage::user(
                    message.text.clone(),
                    Some(message.sender.to_string()),
                ));
            }
        }

        Some(ChatRequest {
            agent: speaker.id.to_string(),
            endpoint: endpoint.clone(),
            messages,
        })
    }

    /// Runs the conversation from a seed message.
    ///
    /// Backend failures and timeouts end the run with the matching
    /// [`TerminationReason`]; whatever was recorded stays in the transcript.
    /// Only an unknown initiator is an error.
    pub async fn run(
        &mut self,
        initiator: &AgentId,
        seed: &str,
        backend: &dyn ChatBackend,
        deadline: &Deadline,
        is_termination: &TerminationCheck<'_>,
    ) -> Result<ConversationOutcome> {
        let start = Instant::now();
        let initiator_pos = self
            .participants
            .iter()
            .position(|p| &p.id == initiator)
            .ok_or_else(|| Error::UnknownParticipant(initiator.to_string()))?;

        self.transcript.record(initiator.clone(), seed);
        info!(initiator = %initiator, participants = self.participants.len(), max_rounds = self.max_rounds, "Conversation started");

        let mut rounds = 0;
        let reason = loop {
            if rounds >= self.max_rounds {
                break TerminationReason::MaxRounds;
            }
            if deadline.is_expired() {
                break TerminationReason::TimedOut;
            }

            let speaker_pos = (initiator_pos + 1 + rounds as usize) % self.participants.len();
            rounds += 1;
            let speaker = self.participants[speaker_pos].clone();

            let reply = match &speaker.kind {
                ParticipantKind::Proxy { auto_reply } => {
                    if auto_reply.is_empty() {
                        debug!(speaker = %speaker.id, round = rounds, "Proxy passes its turn");
                        continue;
                    }
                    auto_reply.clone()
                }
                ParticipantKind::Model { .. } => {
                    let Some(request) = self.build_request(&speaker) else {
                        continue;
                    };
                    debug!(speaker = %speaker.id, round = rounds, context = request.messages.len(), "Requesting completion");

                    let result = tokio::select! {
                        biased;
                        () = deadline.expired() => {
                            warn!(speaker = %speaker.id, round = rounds, "Deadline fired while waiting for a reply");
                            break TerminationReason::TimedOut;
                        }
                        result = backend.complete(&request) => result,
                    };

                    match result {
                        Ok(text) => text,
                        Err(e) => {
                            error!(speaker = %speaker.id, round = rounds, error = %e, "Backend call failed");
                            break TerminationReason::BackendFailure(e.to_string());
                        }
                    }
                }
            };

            let recorded = self.transcript.record(speaker.id.clone(), reply);
            info!(
                speaker = %speaker.id,
                round = rounds,
                chars = recorded.text.chars().count(),
                "Turn complete"
            );

            if is_termination(recorded) {
                info!(speaker = %speaker.id, round = rounds, "Termination condition met");
                break TerminationReason::Completed;
            }
        };

        let outcome = ConversationOutcome {
            reason,
            rounds,
            elapsed: start.elapsed(),
        };
        info!(
            reason = outcome.reason.as_str(),
            rounds = outcome.rounds,
            messages = self.transcript.len(),
            elapsed_secs = outcome.elapsed.as_secs_f64(),
            "Conversation finished"
        );
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedBackend;
    use roundtable_proto::ModelEndpoint;

    fn endpoint(model: &str) -> ModelEndpoint {
        ModelEndpoint::new("http://localhost:11434/v1", "fake-key", model)
    }

    fn participants() -> Vec<Participant> {
        vec![
            Participant::proxy("Coordinador"),
            Participant::model("A", endpoint("m1"), "You are A."),
            Participant::model("B", endpoint("m2"), "You are B."),
        ]
    }

    fn never_done(_: &Message) -> bool {
        false
    }

    #[tokio::test]
    async fn test_round_robin_until_round_bound() {
        let backend = ScriptedBackend::new()
            .reply("A", "a1")
            .reply("B", "b1")
            .reply("A", "a2");
        let mut conversation = Conversation::new(participants(), 4);
        let outcome = conversation
            .run(&AgentId::new("Coordinador"), "start", &backend, &Deadline::never(), &never_done)
            .await
            .unwrap();

        assert_eq!(outcome.reason, TerminationReason::MaxRounds);
        assert_eq!(outcome.rounds, 4);
        // Seed, A, B, (silent proxy), A.
        let texts: Vec<&str> = conversation
            .transcript()
            .messages()
            .iter()
            .map(|m| m.text.as_str())
            .collect();
        assert_eq!(texts, vec!["start", "a1", "b1", "a2"]);
    }

    #[tokio::test]
    async fn test_request_context_roles() {
        let backend = ScriptedBackend::new().reply("A", "a1").reply("B", "b1").reply("A", "a2");
        let mut conversation = Conversation::new(participants(), 4);
        conversation
            .run(&AgentId::new("Coordinador"), "start", &backend, &Deadline::never(), &never_done)
            .await
            .unwrap();

        let requests = backend.requests();
        let last = requests.last().unwrap();
        assert_eq!(last.agent, "A");
        assert_eq!(last.endpoint.model, "m1");
        assert_eq!(last.messages[0], ChatMessage::system("You are A."));
        assert_eq!(
            last.messages[1],
            ChatMessage::user("start", Some("Coordinador".to_string()))
        );
        assert_eq!(last.messages[2], ChatMessage::assistant("a1"));
        assert_eq!(last.messages[3], ChatMessage::user("b1", Some("B".to_string())));
    }

    #[tokio::test]
    async fn test_termination_predicate_never_sees_seed() {
        let backend = ScriptedBackend::new().reply("A", "working").reply("B", "FIN");
        let mut conversation = Conversation::new(participants(), 10);
        let done = |m: &Message| m.text.contains("FIN");
        let outcome = conversation
            .run(&AgentId::new("Coordinador"), "say FIN when done", &backend, &Deadline::never(), &done)
            .await
            .unwrap();

        assert_eq!(outcome.reason, TerminationReason::Completed);
        assert_eq!(outcome.rounds, 2);
        assert_eq!(conversation.transcript().len(), 3);
    }

    #[tokio::test]
    async fn test_proxy_auto_reply_is_recorded() {
        let people = vec![
            Participant::proxy("Coordinador").with_auto_reply("continúa"),
            Participant::model("A", endpoint("m1"), "You are A."),
        ];
        let backend = ScriptedBackend::new().reply("A", "a1").reply("A", "a2");
        let mut conversation = Conversation::new(people, 3);
        conversation
            .run(&AgentId::new("Coordinador"), "start", &backend, &Deadline::never(), &never_done)
            .await
            .unwrap();

        let senders: Vec<&str> = conversation
            .transcript()
            .messages()
            .iter()
            .map(|m| m.sender.as_str())
            .collect();
        assert_eq!(senders, vec!["Coordinador", "A", "Coordinador", "A"]);
    }

    #[tokio::test]
    async fn test_backend_failure_keeps_partial_transcript() {
        let backend = ScriptedBackend::new().reply("A", "a1");
        let mut conversation = Conversation::new(participants(), 10);
        let outcome = conversation
            .run(&AgentId::new("Coordinador"), "start", &backend, &Deadline::never(), &never_done)
            .await
            .unwrap();

        assert!(matches!(outcome.reason, TerminationReason::BackendFailure(ref msg) if msg.contains("B")));
        assert_eq!(conversation.transcript().len(), 2);
    }

    #[tokio::test]
    async fn test_deadline_abandons_in_flight_call() {
        let backend = ScriptedBackend::new()
            .reply("A", "a1")
            .with_delay(Duration::from_secs(30));
        let mut watchdog = crate::watchdog::ThreadWatchdog::new();
        let deadline = crate::watchdog::Watchdog::arm(&mut watchdog, Duration::from_millis(50)).unwrap();

        let mut conversation = Conversation::new(participants(), 10);
        let outcome = tokio::time::timeout(
            Duration::from_secs(5),
            conversation.run(&AgentId::new("Coordinador"), "start", &backend, &deadline, &never_done),
        )
        .await
        .expect("run should stop at the deadline")
        .unwrap();

        assert_eq!(outcome.reason, TerminationReason::TimedOut);
        assert_eq!(conversation.transcript().len(), 1);
    }

    #[tokio::test]
    async fn test_predicate_may_borrow_local_state() {
        let backend = ScriptedBackend::new()
            .reply("A", "still working")
            .reply("B", "LISTO, terminado");
        let marker = String::from("LISTO");
        let is_done = |message: &Message| message.text.contains(marker.as_str());

        let mut conversation = Conversation::new(participants(), 10);
        let outcome = conversation
            .run(&AgentId::new("Coordinador"), "start", &backend, &Deadline::never(), &is_done)
            .await
            .unwrap();

        assert_eq!(outcome.reason, TerminationReason::Completed);
        assert_eq!(conversation.transcript().len(), 3);
    }

    #[tokio::test]
    async fn test_unknown_initiator() {
        let backend = ScriptedBackend::new();
        let mut conversation = Conversation::new(participants(), 3);
        let err = conversation
            .run(&AgentId::new("Nadie"), "start", &backend, &Deadline::never(), &never_done)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::UnknownParticipant(ref name) if name == "Nadie"));
    }
}
