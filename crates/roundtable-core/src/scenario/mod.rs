//! Scenarios: who talks, when to stop, and how to judge the result.

pub mod bias;
pub mod codegen;

use crate::config::RoundtableConfig;
use crate::report::ReportBuilder;
use roundtable_proto::{AgentId, Message, Participant};
use std::path::PathBuf;

pub use bias::BiasScenario;
pub use codegen::CodegenScenario;

/// Per-message callback installed on the live transcript.
pub type LiveHook = Box<dyn Fn(&Message) + Send + 'static>;

/// Where a scenario may write its artifacts.
#[derive(Debug, Clone)]
pub struct ScenarioContext {
    pub output_dir: PathBuf,
}

/// One multi-agent scenario.
pub trait Scenario: Send + Sync {
    /// Short identifier, also used for the output subdirectory.
    fn name(&self) -> &'static str;

    /// Participants in speaking order, models resolved against `config`.
    fn participants(&self, config: &RoundtableConfig) -> Vec<Participant>;

    /// The participant that sends the kickoff message.
    fn initiator(&self) -> AgentId;

    fn kickoff(&self) -> &'static str;

    /// Default round bound.
    fn max_rounds(&self) -> u32;

    /// Whether a reply ends the conversation.
    fn is_termination(&self, message: &Message) -> bool;

    /// Best-effort per-message processing during the run.
    ///
    /// Whatever it does, `analyze` must cover the same ground again.
    fn live_hook(&self, _ctx: &ScenarioContext) -> Option<LiveHook> {
        None
    }

    /// Post-run extraction, validation and persistence.
    fn analyze(&self, messages: &[Message], ctx: &ScenarioContext, report: &mut ReportBuilder);
}

/// Looks up a scenario by name.
pub fn by_name(name: &str) -> Option<Box<dyn Scenario>> {
    match name {
        bias::NAME => Some(Box::new(BiasScenario)),
        codegen::NAME => Some(Box::new(CodegenScenario)),
        _ => None,
    }
}

/// Every participant name across all scenarios.
pub fn known_agents() -> Vec<&'static str> {
    bias::AGENTS.iter().chain(codegen::AGENTS).copied().collect()
}

/// The last message from one sender.
pub(crate) fn last_from<'a>(messages: &'a [Message], agent: &str) -> Option<&'a Message> {
    messages.iter().rev().find(|m| m.is_from(agent))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_by_name() {
        assert_eq!(by_name("bias").unwrap().name(), "bias");
        assert_eq!(by_name("codegen").unwrap().name(), "codegen");
        assert!(by_name("chess").is_none());
    }

    #[test]
    fn test_known_agents() {
        let agents = known_agents();
        assert!(agents.contains(&"Respondedor"));
        assert!(agents.contains(&"Documentador"));
        assert_eq!(agents.len(), 10);
    }

    #[test]
    fn test_participants_follow_model_overrides() {
        let mut config = RoundtableConfig::default();
        config.models.insert("Respondedor".to_string(), "qwen2".to_string());

        let participants = BiasScenario.participants(&config);
        let responder = participants
            .iter()
            .find(|p| p.id.as_str() == "Respondedor")
            .unwrap();
        assert_eq!(responder.model_name(), Some("qwen2"));
        assert!(participants[0].is_proxy());
    }
}
