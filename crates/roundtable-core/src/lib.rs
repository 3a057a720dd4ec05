//! # roundtable-core
//!
//! Core pipeline for Roundtable runs.
//!
//! This crate provides:
//! - Configuration loading and validation
//! - The round-robin conversation engine and its wall-clock watchdog
//! - Extraction of question/answer sets and code artifacts from agent replies
//! - Format validation, artifact writing and the run report
//! - Transcript recording and replay
//! - The built-in scenarios and the orchestrator that runs them

mod config;
mod conversation;
pub mod extract;
mod orchestrator;
mod report;
mod resources;
pub mod scenario;
pub mod testing;
mod transcript_recorder;
pub mod validate;
pub mod watchdog;
mod writer;

pub use config::{
    ConfigError, ConfigWarning, ConversationConfig, DEFAULT_CONFIG_FILE, EndpointConfig,
    OutputConfig, RoundtableConfig,
};
pub use conversation::{Conversation, ConversationOutcome, TerminationCheck, TerminationReason};
pub use orchestrator::{Orchestrator, REPLAY_TERMINATION, RunOutcome, TRANSCRIPT_FILE};
pub use report::{ArtifactTally, FilesCreated, ReportBuilder, RunReport, Summary, ValidationResult};
pub use resources::{ResourceSampler, ResourceSnapshot};
pub use scenario::{BiasScenario, CodegenScenario, Scenario, ScenarioContext};
pub use transcript_recorder::{
    LoadedTranscript, MalformedLine, Record, TranscriptRecorder, read_transcript,
    read_transcript_from,
};
pub use validate::Verdict;
pub use watchdog::{Deadline, Watchdog, WatchdogError, WatchdogKind};
pub use writer::{ArtifactWriter, FileInspection, WriteError, WriteOutcome, WriteSummary};
