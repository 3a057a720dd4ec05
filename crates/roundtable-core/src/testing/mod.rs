//! Testing utilities for deterministic conversations without a model server.

pub mod fixtures;
pub mod scripted_backend;

pub use scripted_backend::ScriptedBackend;
