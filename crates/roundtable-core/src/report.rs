//! Run report.
//!
//! `ReportBuilder` is threaded through each stage of a run and collects an
//! append-only log of validation results, labelled resource snapshots and
//! artifact counts. `finish` reduces the log (last entry per check name, in
//! first-seen order) and computes the summary and overall score.

use crate::resources::ResourceSnapshot;
use crate::validate::Verdict;
use crate::writer::FileInspection;
use chrono::{DateTime, Utc};
use roundtable_proto::Result;
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::{debug, info, warn};

/// One check outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    #[serde(skip_serializing, default)]
    pub check_name: String,
    pub passed: bool,
    pub details: String,
    pub timestamp: DateTime<Utc>,
}

/// Expected versus created artifact files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilesCreated {
    pub expected: Vec<String>,
    pub created: Vec<String>,
    pub completion_percentage: f64,
    pub missing: Vec<String>,
}

impl Default for FilesCreated {
    fn default() -> Self {
        Self::from_inspection(&[])
    }
}

impl FilesCreated {
    /// Builds the file section from re-inspected files.
    ///
    /// Completion is 100% when nothing is expected.
    pub fn from_inspection(files: &[FileInspection]) -> Self {
        let expected: Vec<String> = files.iter().map(|f| f.filename.clone()).collect();
        let created: Vec<String> = files
            .iter()
            .filter(|f| f.present())
            .map(|f| f.filename.clone())
            .collect();
        let missing: Vec<String> = files
            .iter()
            .filter(|f| !f.present())
            .map(|f| f.filename.clone())
            .collect();

        Self {
            completion_percentage: percentage(created.len(), expected.len()),
            expected,
            created,
            missing,
        }
    }
}

/// Artifact counts feeding the overall score.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactTally {
    pub expected: usize,
    pub produced: usize,
    pub valid: usize,
}

impl ArtifactTally {
    /// Average of completion and validity, 0 to 100.
    ///
    /// Completion is produced/expected (100 when nothing is expected).
    /// Validity is valid/produced (100 when nothing was expected or produced).
    pub fn overall_score(&self) -> f64 {
        let completion = percentage(self.produced.min(self.expected), self.expected);
        let validity = if self.produced == 0 {
            if self.expected == 0 { 100.0 } else { 0.0 }
        } else {
            percentage(self.valid, self.produced)
        };
        round2((completion + validity) / 2.0)
    }
}

/// Derived pass/fail counts.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub pass_rate: f64,
}

fn percentage(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        100.0
    } else {
        round2(part as f64 / whole as f64 * 100.0)
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Accumulates results during a run.
#[derive(Debug)]
pub struct ReportBuilder {
    scenario: String,
    log: Vec<ValidationResult>,
    performance: Vec<(String, ResourceSnapshot)>,
    files_created: FilesCreated,
    tally: ArtifactTally,
    termination: String,
    conversation_length: usize,
    execution_time_secs: f64,
}

impl ReportBuilder {
    pub fn new(scenario: impl Into<String>) -> Self {
        Self {
            scenario: scenario.into(),
            log: Vec::new(),
            performance: Vec::new(),
            files_created: FilesCreated::default(),
            tally: ArtifactTally::default(),
            termination: "not_run".to_string(),
            conversation_length: 0,
            execution_time_secs: 0.0,
        }
    }

    /// Appends a check outcome.
    pub fn record(&mut self, check_name: impl Into<String>, verdict: Verdict) {
        let check_name = check_name.into();
        if verdict.passed {
            info!(check = %check_name, details = %verdict.details, "PASS");
        } else {
            warn!(check = %check_name, details = %verdict.details, "FAIL");
        }
        self.log.push(ValidationResult {
            check_name,
            passed: verdict.passed,
            details: verdict.details,
            timestamp: Utc::now(),
        });
    }

    /// Adds a labelled snapshot. A repeated label replaces the earlier one.
    pub fn snapshot(&mut self, label: impl Into<String>, snapshot: ResourceSnapshot) {
        let label = label.into();
        debug!(label = %label, memory_mb = snapshot.memory_mb, cpu_percent = snapshot.cpu_percent, "Resource snapshot");
        match self.performance.iter_mut().find(|(l, _)| *l == label) {
            Some((_, existing)) => *existing = snapshot,
            None => self.performance.push((label, snapshot)),
        }
    }

    pub fn set_files_created(&mut self, files: FilesCreated) {
        self.files_created = files;
    }

    pub fn set_tally(&mut self, tally: ArtifactTally) {
        self.tally = tally;
    }

    pub fn set_termination(&mut self, termination: impl Into<String>) {
        self.termination = termination.into();
    }

    pub fn set_conversation_length(&mut self, length: usize) {
        self.conversation_length = length;
    }

    pub fn set_execution_time(&mut self, secs: f64) {
        self.execution_time_secs = round2(secs);
    }

    /// All recorded entries, including superseded ones.
    pub fn log(&self) -> &[ValidationResult] {
        &self.log
    }

    /// Reduces the log and computes derived values.
    pub fn finish(self) -> RunReport {
        let mut results: Vec<ValidationResult> = Vec::new();
        for entry in self.log {
            match results.iter_mut().find(|r| r.check_name == entry.check_name) {
                Some(existing) => *existing = entry,
                None => results.push(entry),
            }
        }

        let passed = results.iter().filter(|r| r.passed).count();
        let summary = Summary {
            total: results.len(),
            passed,
            failed: results.len() - passed,
            pass_rate: if results.is_empty() {
                0.0
            } else {
                percentage(passed, results.len())
            },
        };

        RunReport {
            scenario: self.scenario,
            generated_at: Utc::now(),
            termination: self.termination,
            conversation_length: self.conversation_length,
            execution_time_secs: self.execution_time_secs,
            validation_results: results,
            performance: self.performance,
            files_created: self.files_created,
            summary,
            overall_score: self.tally.overall_score(),
        }
    }
}

/// The finalized report, serialized once at the end of a run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub scenario: String,
    pub generated_at: DateTime<Utc>,
    pub termination: String,
    pub conversation_length: usize,
    pub execution_time_secs: f64,
    #[serde(serialize_with = "serialize_results")]
    pub validation_results: Vec<ValidationResult>,
    #[serde(serialize_with = "serialize_performance")]
    pub performance: Vec<(String, ResourceSnapshot)>,
    pub files_created: FilesCreated,
    pub summary: Summary,
    pub overall_score: f64,
}

fn serialize_results<S: Serializer>(
    results: &[ValidationResult],
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    let mut map = serializer.serialize_map(Some(results.len()))?;
    for result in results {
        map.serialize_entry(&result.check_name, result)?;
    }
    map.end()
}

fn serialize_performance<S: Serializer>(
    snapshots: &[(String, ResourceSnapshot)],
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    serializer.collect_map(snapshots.iter().map(|(label, snap)| (label, snap)))
}

impl RunReport {
    /// Looks up a check by name.
    pub fn result(&self, check_name: &str) -> Option<&ValidationResult> {
        self.validation_results
            .iter()
            .find(|r| r.check_name == check_name)
    }

    /// Writes the report as pretty JSON, creating parent directories.
    pub fn write_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        info!(path = %path.display(), "Report written");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snap(memory_mb: f64) -> ResourceSnapshot {
        ResourceSnapshot {
            memory_mb,
            cpu_percent: 0.0,
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn test_log_reduces_to_last_entry_in_first_seen_order() {
        let mut builder = ReportBuilder::new("bias");
        builder.record("Termination", Verdict::fail("round bound"));
        builder.record("Question format", Verdict::pass("ok"));
        builder.record("Termination", Verdict::pass("terminal phrase reached"));
        assert_eq!(builder.log().len(), 3);

        let report = builder.finish();
        let names: Vec<&str> = report
            .validation_results
            .iter()
            .map(|r| r.check_name.as_str())
            .collect();
        assert_eq!(names, vec!["Termination", "Question format"]);
        assert!(report.result("Termination").unwrap().passed);
        assert_eq!(report.summary.total, 2);
        assert_eq!(report.summary.passed, 2);
        assert!((report.summary.pass_rate - 100.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_overall_score() {
        let full = ArtifactTally {
            expected: 5,
            produced: 5,
            valid: 5,
        };
        assert!((full.overall_score() - 100.0).abs() < f64::EPSILON);

        let partial = ArtifactTally {
            expected: 5,
            produced: 4,
            valid: 2,
        };
        // (80 + 50) / 2
        assert!((partial.overall_score() - 65.0).abs() < f64::EPSILON);

        let nothing = ArtifactTally {
            expected: 3,
            produced: 0,
            valid: 0,
        };
        assert!(nothing.overall_score().abs() < f64::EPSILON);
    }

    #[test]
    fn test_empty_report_has_all_top_level_keys() {
        let report = ReportBuilder::new("codegen").finish();
        let json = serde_json::to_value(&report).unwrap();
        for key in [
            "scenario",
            "generated_at",
            "termination",
            "conversation_length",
            "execution_time_secs",
            "validation_results",
            "performance",
            "files_created",
            "summary",
            "overall_score",
        ] {
            assert!(json.get(key).is_some(), "missing {key}");
        }
        assert_eq!(json["files_created"]["completion_percentage"], 100.0);
        assert_eq!(json["summary"]["pass_rate"], 0.0);
    }

    #[test]
    fn test_results_serialize_as_ordered_map() {
        let mut builder = ReportBuilder::new("bias");
        builder.record("Zeta", Verdict::pass("z"));
        builder.record("Alpha", Verdict::fail("a"));
        builder.snapshot("run start", snap(10.0));
        builder.snapshot("run end", snap(12.0));
        builder.snapshot("run end", snap(14.0));

        let json = serde_json::to_string(&builder.finish()).unwrap();
        let zeta = json.find("\"Zeta\"").unwrap();
        let alpha = json.find("\"Alpha\"").unwrap();
        assert!(zeta < alpha);
        assert!(json.contains("\"run start\""));
        assert!(!json.contains("check_name"));

        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["validation_results"]["Alpha"]["passed"], false);
        assert_eq!(value["performance"]["run end"]["memory_mb"], 14.0);
    }

    #[test]
    fn test_files_created_from_inspection() {
        let files = vec![
            FileInspection {
                filename: "README.md".to_string(),
                size_bytes: Some(10),
                shape: Some(Verdict::pass("ok")),
            },
            FileInspection {
                filename: "test_snake.py".to_string(),
                size_bytes: None,
                shape: None,
            },
        ];
        let section = FilesCreated::from_inspection(&files);
        assert_eq!(section.created, vec!["README.md".to_string()]);
        assert_eq!(section.missing, vec!["test_snake.py".to_string()]);
        assert!((section.completion_percentage - 50.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_write_to_creates_parent() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("bias/bias_report.json");
        ReportBuilder::new("bias").finish().write_to(&path).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("\"overall_score\""));
    }
}
