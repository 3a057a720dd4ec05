//! # roundtable-adapters
//!
//! Language-model backends for Roundtable.
//!
//! This crate provides:
//! - `OpenAiCompatBackend`, a `ChatBackend` speaking the OpenAI-compatible
//!   `/chat/completions` protocol (local Ollama servers included)
//! - `probe_endpoint`, a preflight that lists the models a server offers
//!
//! ## Preflight
//!
//! The probe only informs. An unreachable server still surfaces later as a
//! backend failure recorded in the run report.

mod openai_compat;
mod probe;

pub use openai_compat::{OpenAiCompatBackend, build_client};
pub use probe::probe_endpoint;
