//! Artifact writer.
//!
//! Persists code artifacts under a single output directory with a monotonic
//! overwrite policy: an existing file is replaced only by strictly longer
//! content. Each artifact is written independently; a failure on one is
//! logged and never blocks the others.

use crate::extract::CodeArtifact;
use crate::extract::code::is_safe_filename;
use crate::validate::{self, Verdict};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Errors from writing a single artifact.
#[derive(Debug, thiserror::Error)]
pub enum WriteError {
    #[error("refusing to write unsafe filename: {0}")]
    UnsafeName(String),

    #[error("failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// What happened to one artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// No file existed; it was created.
    Created { chars: usize },
    /// A shorter file existed and was replaced.
    Replaced { previous_chars: usize, chars: usize },
    /// An equal or longer file exists; nothing was written.
    Skipped { existing_chars: usize, chars: usize },
}

impl WriteOutcome {
    pub fn wrote(self) -> bool {
        !matches!(self, WriteOutcome::Skipped { .. })
    }
}

/// Totals from a batch write.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteSummary {
    pub written: Vec<String>,
    pub skipped: Vec<String>,
    pub failed: Vec<String>,
}

/// Presence and shape of one expected file after the run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileInspection {
    pub filename: String,
    pub size_bytes: Option<u64>,
    /// `None` when the file is absent or unreadable.
    pub shape: Option<Verdict>,
}

impl FileInspection {
    pub fn present(&self) -> bool {
        self.size_bytes.is_some()
    }

    pub fn valid(&self) -> bool {
        self.shape.as_ref().is_some_and(|v| v.passed)
    }
}

/// Writes artifacts into one directory.
#[derive(Debug, Clone)]
pub struct ArtifactWriter {
    dir: PathBuf,
}

impl ArtifactWriter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn io_err(path: &Path) -> impl FnOnce(io::Error) -> WriteError + '_ {
        move |source| WriteError::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    /// Writes one artifact, honoring the keep-the-longest policy.
    pub fn write(&self, artifact: &CodeArtifact) -> Result<WriteOutcome, WriteError> {
        if !is_safe_filename(&artifact.filename) {
            return Err(WriteError::UnsafeName(artifact.filename.clone()));
        }

        fs::create_dir_all(&self.dir).map_err(Self::io_err(&self.dir))?;
        let path = self.dir.join(&artifact.filename);
        let chars = artifact.content.chars().count();

        // Length only; undecodable bytes count as one replacement char each.
        let previous = match fs::read(&path) {
            Ok(existing) => Some(String::from_utf8_lossy(&existing).chars().count()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => None,
            Err(e) => return Err(Self::io_err(&path)(e)),
        };

        if let Some(existing_chars) = previous
            && existing_chars >= chars
        {
            debug!(
                filename = %artifact.filename,
                existing_chars,
                chars,
                "Existing file is at least as long, skipping"
            );
            return Ok(WriteOutcome::Skipped {
                existing_chars,
                chars,
            });
        }

        fs::write(&path, &artifact.content).map_err(Self::io_err(&path))?;
        info!(
            filename = %artifact.filename,
            sender = %artifact.source_sender,
            chars,
            "Saved artifact"
        );

        Ok(match previous {
            Some(previous_chars) => WriteOutcome::Replaced {
                previous_chars,
                chars,
            },
            None => WriteOutcome::Created { chars },
        })
    }

    /// Writes every artifact, logging failures instead of returning them.
    pub fn write_all(&self, artifacts: &[CodeArtifact]) -> WriteSummary {
        let mut summary = WriteSummary::default();
        for artifact in artifacts {
            match self.write(artifact) {
                Ok(outcome) if outcome.wrote() => summary.written.push(artifact.filename.clone()),
                Ok(_) => summary.skipped.push(artifact.filename.clone()),
                Err(e) => {
                    warn!(filename = %artifact.filename, error = %e, "Failed to save artifact");
                    summary.failed.push(artifact.filename.clone());
                }
            }
        }
        summary
    }

    /// Re-reads each expected file from disk and checks its shape.
    pub fn inspect(&self, expected: &[&str]) -> Vec<FileInspection> {
        expected
            .iter()
            .map(|filename| {
                let path = self.dir.join(filename);
                let size_bytes = fs::metadata(&path).ok().filter(|m| m.is_file()).map(|m| m.len());
                let shape = size_bytes.and_then(|_| match fs::read_to_string(&path) {
                    Ok(content) => Some(validate::file_shape(filename, &content)),
                    Err(e) => {
                        warn!(filename, error = %e, "Failed to re-read artifact");
                        None
                    }
                });
                FileInspection {
                    filename: (*filename).to_string(),
                    size_bytes,
                    shape,
                }
            })
            .collect()
    }
}
