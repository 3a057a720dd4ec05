//! Message extractors.
//!
//! Turn one message's raw text into typed candidate artifacts. Extractors
//! never touch the filesystem and never fail: malformed candidates are
//! skipped and duplicates are reported alongside the result.

pub mod code;
pub mod questions;

pub use code::{CodeArtifact, DetectionMethod, RawBlock, extract_artifacts, resolve_conflicts};
pub use questions::{
    Answer, AnswerRecord, AnswerSet, EntryKey, QuestionPair, QuestionSet, Variant,
    normalize_whitespace,
};
