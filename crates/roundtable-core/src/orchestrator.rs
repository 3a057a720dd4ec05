//! Run orchestration.
//!
//! Ties a scenario to the conversation engine: resource snapshots, transcript
//! recording, the live hook, the wall-clock watchdog, run-level checks, the
//! scenario's own analysis and the final report.

use crate::config::RoundtableConfig;
use crate::conversation::{Conversation, ConversationOutcome, TerminationReason};
use crate::report::{ReportBuilder, RunReport};
use crate::resources::ResourceSampler;
use crate::scenario::{Scenario, ScenarioContext};
use crate::transcript_recorder::{Record, TranscriptRecorder};
use crate::validate::Verdict;
use crate::watchdog::{Deadline, arm_watchdog};
use roundtable_proto::{ChatBackend, Message};
use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};

/// File name of the recorded transcript inside the scenario directory.
pub const TRANSCRIPT_FILE: &str = "transcript.jsonl";

/// Termination label used for reports built from a recorded transcript.
pub const REPLAY_TERMINATION: &str = "replayed";

type FileRecorder = TranscriptRecorder<BufWriter<File>>;

/// Result of a run or replay.
#[derive(Debug)]
pub struct RunOutcome {
    pub report: RunReport,
    /// Where the report was written, if writing succeeded.
    pub report_path: Option<PathBuf>,
    /// Where the transcript was recorded, if recording was enabled and worked.
    pub transcript_path: Option<PathBuf>,
    /// `None` for replays and runs that never started.
    pub termination: Option<TerminationReason>,
}

/// Runs scenarios against a backend using one configuration.
#[derive(Debug, Clone)]
pub struct Orchestrator {
    config: RoundtableConfig,
}

impl Orchestrator {
    pub fn new(config: RoundtableConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RoundtableConfig {
        &self.config
    }

    fn context(&self, scenario: &dyn Scenario) -> ScenarioContext {
        ScenarioContext {
            output_dir: self.config.scenario_dir(scenario.name()),
        }
    }

    /// Runs a scenario end to end.
    ///
    /// Never fails: every problem becomes a failed check in the report.
    pub async fn run(&self, scenario: &dyn Scenario, backend: &dyn ChatBackend) -> RunOutcome {
        let started = Instant::now();
        let ctx = self.context(scenario);
        let mut sampler = ResourceSampler::new();
        let mut report = ReportBuilder::new(scenario.name());
        report.snapshot("run start", sampler.snapshot());

        let participants = scenario.participants(&self.config);
        let max_rounds = self.config.max_rounds_or(scenario.max_rounds());
        let max_runtime = self.config.max_runtime();
        info!(
            scenario = scenario.name(),
            participants = participants.len(),
            max_rounds,
            max_runtime_secs = max_runtime.as_secs(),
            output = %ctx.output_dir.display(),
            "Starting run"
        );

        let names: Vec<String> = participants.iter().map(|p| p.id.to_string()).collect();
        let mut conversation = Conversation::new(participants, max_rounds);

        let (recorder, transcript_path) = self.install_recorder(&ctx);
        if let Some(recorder) = &recorder {
            recorder.record_meta(Record::meta_run_start(
                scenario.name(),
                &names,
                max_rounds,
                max_runtime.as_secs(),
            ));
            conversation
                .transcript_mut()
                .add_observer(TranscriptRecorder::make_observer(Arc::clone(recorder)));
        }
        if let Some(hook) = scenario.live_hook(&ctx) {
            conversation.transcript_mut().add_observer(hook);
        }

        let armed = arm_watchdog(self.config.conversation.watchdog, max_runtime);
        let (mut watchdog, deadline) = match armed {
            Ok((watchdog, deadline)) => (Some(watchdog), deadline),
            Err(e) => {
                warn!(error = %e, "No watchdog available, running without a wall-clock bound");
                (None, Deadline::never())
            }
        };

        let is_termination = |message: &Message| scenario.is_termination(message);
        let result = conversation
            .run(
                &scenario.initiator(),
                scenario.kickoff(),
                backend,
                &deadline,
                &is_termination,
            )
            .await;

        if let Some(watchdog) = watchdog.as_mut() {
            watchdog.disarm();
        }
        report.snapshot("run end", sampler.snapshot());

        let messages = conversation.into_transcript().into_messages();
        let elapsed = started.elapsed();

        if let Some(recorder) = &recorder {
            if let Ok(outcome) = &result {
                recorder.record_meta(Record::meta_termination(
                    outcome.reason.as_str(),
                    outcome.rounds,
                    messages.len(),
                    outcome.elapsed.as_secs_f64(),
                ));
            }
            if let Err(e) = recorder.flush() {
                warn!(error = %e, "Failed to flush transcript");
            }
        }

        report.set_conversation_length(messages.len());
        report.set_execution_time(elapsed.as_secs_f64());

        let limit = max_runtime.as_secs_f64();
        let secs = elapsed.as_secs_f64();
        let timing = format!("{secs:.2}s (limit {limit:.0}s)");
        report.record(
            "Execution time",
            if secs < limit {
                Verdict::pass(timing)
            } else {
                Verdict::fail(timing)
            },
        );

        let termination = match result {
            Ok(outcome) => {
                record_outcome(&mut report, &outcome, max_rounds, limit);
                Some(outcome.reason)
            }
            Err(e) => {
                error!(error = %e, "Conversation could not start");
                report.set_termination("error");
                report.record("System execution", Verdict::fail(e.to_string()));
                report.record("Termination", Verdict::fail("conversation never started"));
                None
            }
        };

        scenario.analyze(&messages, &ctx, &mut report);
        let (report, report_path) = self.finalize(scenario, report);

        RunOutcome {
            report,
            report_path,
            transcript_path,
            termination,
        }
    }

    /// Re-runs the post-run analysis on recorded messages.
    pub fn replay(&self, scenario: &dyn Scenario, messages: &[Message]) -> RunOutcome {
        let ctx = self.context(scenario);
        info!(scenario = scenario.name(), messages = messages.len(), "Replaying transcript");

        let mut report = ReportBuilder::new(scenario.name());
        report.set_termination(REPLAY_TERMINATION);
        report.set_conversation_length(messages.len());
        scenario.analyze(messages, &ctx, &mut report);
        let (report, report_path) = self.finalize(scenario, report);

        RunOutcome {
            report,
            report_path,
            transcript_path: None,
            termination: None,
        }
    }

    fn install_recorder(
        &self,
        ctx: &ScenarioContext,
    ) -> (Option<Arc<FileRecorder>>, Option<PathBuf>) {
        if !self.config.output.record_transcript {
            return (None, None);
        }
        let path = ctx.output_dir.join(TRANSCRIPT_FILE);
        match TranscriptRecorder::create(&path) {
            Ok(recorder) => (Some(Arc::new(recorder)), Some(path)),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Transcript recording disabled");
                (None, None)
            }
        }
    }

    fn finalize(
        &self,
        scenario: &dyn Scenario,
        report: ReportBuilder,
    ) -> (RunReport, Option<PathBuf>) {
        let report = report.finish();
        let path = self
            .config
            .scenario_dir(scenario.name())
            .join(format!("{}_report.json", scenario.name()));

        let written = match report.write_to(&path) {
            Ok(()) => Some(path),
            Err(e) => {
                error!(path = %path.display(), error = %e, "Failed to write report");
                None
            }
        };

        info!(
            scenario = %report.scenario,
            passed = report.summary.passed,
            total = report.summary.total,
            pass_rate = report.summary.pass_rate,
            overall_score = report.overall_score,
            "Run finished"
        );
        (report, written)
    }
}

fn record_outcome(
    report: &mut ReportBuilder,
    outcome: &ConversationOutcome,
    max_rounds: u32,
    limit_secs: f64,
) {
    report.set_termination(outcome.reason.as_str());

    let system = match &outcome.reason {
        TerminationReason::BackendFailure(message) => Verdict::fail(message.clone()),
        _ => Verdict::pass(format!("conversation ran for {} round(s) without errors", outcome.rounds)),
    };
    report.record("System execution", system);

    let termination = match &outcome.reason {
        TerminationReason::Completed => {
            Verdict::pass(format!("terminal phrase reached after {} round(s)", outcome.rounds))
        }
        TerminationReason::MaxRounds => Verdict::fail(format!(
            "round bound of {max_rounds} reached without the terminal phrase"
        )),
        TerminationReason::TimedOut => Verdict::fail(format!(
            "wall-clock limit of {limit_secs:.0}s reached, run incomplete"
        )),
        TerminationReason::BackendFailure(_) => {
            Verdict::fail(format!("stopped by a backend failure after {} round(s)", outcome.rounds))
        }
    };
    report.record("Termination", termination);
}
