//! Transcript recording to JSONL and reading it back.
//!
//! Every message is written as one `{ts, event, data}` line the moment it is
//! recorded, so a crashed or timed-out run still leaves a usable transcript.
//! `read_transcript` turns such a file back into messages for replay.

use roundtable_proto::Message;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{self, BufRead, BufReader, Write};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::warn;

/// Event name for a conversation message.
pub const MESSAGE_EVENT: &str = "message";

/// A timestamped line in the transcript file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Record {
    /// Unix timestamp in milliseconds.
    pub ts: u64,

    /// Discriminator: `message` or a `_meta.*` event.
    pub event: String,

    pub data: serde_json::Value,
}

impl Record {
    /// Creates a record stamped with the current time.
    pub fn new(event: impl Into<String>, data: impl Serialize) -> Self {
        let ts = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
            .unwrap_or_default();

        Self {
            ts,
            event: event.into(),
            data: serde_json::to_value(data).unwrap_or(serde_json::Value::Null),
        }
    }

    pub fn from_message(message: &Message) -> Self {
        Self::new(MESSAGE_EVENT, message)
    }

    /// Metadata record for the start of a run.
    pub fn meta_run_start(scenario: &str, participants: &[String], max_rounds: u32, max_runtime_secs: u64) -> Self {
        Self::new(
            "_meta.run_start",
            serde_json::json!({
                "scenario": scenario,
                "participants": participants,
                "max_rounds": max_rounds,
                "max_runtime_secs": max_runtime_secs,
            }),
        )
    }

    /// Metadata record for how the conversation ended.
    pub fn meta_termination(reason: &str, rounds: u32, messages: usize, elapsed_secs: f64) -> Self {
        Self::new(
            "_meta.termination",
            serde_json::json!({
                "reason": reason,
                "rounds": rounds,
                "messages": messages,
                "elapsed_secs": elapsed_secs,
            }),
        )
    }
}

/// Writes transcript records as JSON lines.
///
/// Write errors are ignored: recording never interrupts a run.
pub struct TranscriptRecorder<W> {
    writer: Mutex<W>,
}

impl<W: Write> TranscriptRecorder<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }

    pub fn record_message(&self, message: &Message) {
        self.write_record(&Record::from_message(message));
    }

    pub fn record_meta(&self, record: Record) {
        self.write_record(&record);
    }

    fn write_record(&self, record: &Record) {
        if let Ok(mut writer) = self.writer.lock()
            && let Ok(json) = serde_json::to_string(record)
        {
            let _ = writeln!(writer, "{json}");
            let _ = writer.flush();
        }
    }

    /// Flushes the underlying writer.
    pub fn flush(&self) -> io::Result<()> {
        self.writer
            .lock()
            .map_err(|_| io::Error::other("transcript writer lock poisoned"))?
            .flush()
    }
}

impl<W: Write + Send + 'static> TranscriptRecorder<W> {
    /// Creates an observer suitable for `Transcript::add_observer`.
    pub fn make_observer(recorder: Arc<Self>) -> impl Fn(&Message) + Send + 'static {
        move |message| recorder.record_message(message)
    }
}

impl TranscriptRecorder<io::BufWriter<File>> {
    /// Creates (or truncates) a transcript file.
    pub fn create(path: &Path) -> io::Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Ok(Self::new(io::BufWriter::new(File::create(path)?)))
    }
}

/// A line that could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MalformedLine {
    /// 1-indexed line number.
    pub line_number: usize,
    pub error: String,
}

/// Messages read back from a transcript.
#[derive(Debug, Clone, Default)]
pub struct LoadedTranscript {
    pub messages: Vec<Message>,
    pub malformed: Vec<MalformedLine>,
}

/// Parses a transcript from any reader. Non-message records are skipped,
/// unparseable lines are counted.
pub fn read_transcript_from<R: BufRead>(reader: R) -> io::Result<LoadedTranscript> {
    let mut loaded = LoadedTranscript::default();

    for (i, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }

        let parsed = serde_json::from_str::<Record>(&line).and_then(|record| {
            if record.event == MESSAGE_EVENT {
                serde_json::from_value::<Message>(record.data).map(Some)
            } else {
                Ok(None)
            }
        });

        match parsed {
            Ok(Some(message)) => loaded.messages.push(message),
            Ok(None) => {}
            Err(e) => {
                warn!(line = i + 1, error = %e, "Skipping malformed transcript line");
                loaded.malformed.push(MalformedLine {
                    line_number: i + 1,
                    error: e.to_string(),
                });
            }
        }
    }

    Ok(loaded)
}

/// Reads a transcript file.
pub fn read_transcript(path: impl AsRef<Path>) -> io::Result<LoadedTranscript> {
    let file = File::open(path.as_ref())?;
    read_transcript_from(BufReader::new(file))
}
