use anyhow::Result;
use roundtable_core::TranscriptRecorder;
use roundtable_core::scenario::bias;
use roundtable_core::testing::fixtures;
use roundtable_proto::Message;
use std::fs;
use std::path::Path;
use std::process::Command;
use tempfile::TempDir;

/// Integration tests for offline replay of a recorded transcript.

fn write_transcript(path: &Path, messages: &[Message]) -> Result<()> {
    let recorder = TranscriptRecorder::create(path)?;
    for message in messages {
        recorder.record_message(message);
    }
    recorder.flush()?;
    Ok(())
}

fn bias_messages() -> Vec<Message> {
    vec![
        Message::new(bias::COORDINATOR, "Comenzamos.", 0),
        Message::new(bias::GENERATOR, fixtures::bias_questions(), 1),
        Message::new(bias::RESPONDER, fixtures::bias_answers(), 2),
        Message::new(bias::ANALYZER, fixtures::bias_analysis(), 3),
    ]
}

#[test]
fn test_replay_writes_report_and_exits_zero() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let temp_path = temp_dir.path();
    let transcript = temp_path.join("transcript.jsonl");
    write_transcript(&transcript, &bias_messages())?;

    let output = Command::new(env!("CARGO_BIN_EXE_roundtable"))
        .args(["--color", "never", "replay", "bias"])
        .arg(&transcript)
        .current_dir(temp_path)
        .env_remove("RUST_LOG")
        .output()?;

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Run finished: bias (replayed)"));
    assert!(stdout.contains("✓ Answers - coverage"));
    assert!(!stdout.contains('\x1b'));

    let report_path = temp_path.join("output").join("bias").join("bias_report.json");
    let report: serde_json::Value = serde_json::from_str(&fs::read_to_string(report_path)?)?;
    assert_eq!(report["termination"], "replayed");
    assert_eq!(report["conversation_length"], 4);
    assert_eq!(report["summary"]["failed"], 0);

    Ok(())
}

#[test]
fn test_failed_checks_still_exit_zero() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let temp_path = temp_dir.path();
    let transcript = temp_path.join("transcript.jsonl");
    write_transcript(
        &transcript,
        &[Message::new(bias::COORDINATOR, "Comenzamos.", 0)],
    )?;
    fs::write(
        temp_path.join("roundtable.yml"),
        "output:\n  dir: reports\n_suppress_warnings: true\n",
    )?;

    let output = Command::new(env!("CARGO_BIN_EXE_roundtable"))
        .args(["--color", "never", "replay", "bias"])
        .arg(&transcript)
        .current_dir(temp_path)
        .output()?;

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("✗ Question generation"));
    assert!(temp_path.join("reports").join("bias").join("bias_report.json").exists());

    Ok(())
}

#[test]
fn test_missing_transcript_is_an_error() -> Result<()> {
    let temp_dir = TempDir::new()?;

    let output = Command::new(env!("CARGO_BIN_EXE_roundtable"))
        .args(["replay", "codegen", "does-not-exist.jsonl"])
        .current_dir(temp_dir.path())
        .output()?;

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Failed to read transcript"));

    Ok(())
}

#[test]
fn test_unknown_scenario_is_rejected() -> Result<()> {
    let output = Command::new(env!("CARGO_BIN_EXE_roundtable"))
        .args(["replay", "chess", "transcript.jsonl"])
        .output()?;

    assert!(!output.status.success());
    Ok(())
}
