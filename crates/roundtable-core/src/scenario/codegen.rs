//! Snake game code generation.
//!
//! A coordinator asks four producer agents for one file each. Code blocks in
//! producer replies are carved into named files, written live as messages
//! arrive and again in a post-run pass over the whole transcript. Both passes
//! are idempotent under the keep-the-longest overwrite policy.

use super::{LiveHook, Scenario, ScenarioContext};
use crate::config::RoundtableConfig;
use crate::extract::{CodeArtifact, extract_artifacts, resolve_conflicts};
use crate::report::{ArtifactTally, FilesCreated, ReportBuilder};
use crate::validate::{self, Verdict};
use crate::writer::ArtifactWriter;
use roundtable_proto::{AgentId, Message, ModelEndpoint, Participant};
use tracing::{debug, info};

pub const NAME: &str = "codegen";

pub const USER_PROXY: &str = "CoordinadorUsuario";
pub const COORDINATOR: &str = "CoordinadorPrincipal";
pub const LOGIC_DEVELOPER: &str = "DesarrolladorLogica";
pub const INTERFACE_DEVELOPER: &str = "DesarrolladorInterfaz";
pub const TESTER: &str = "TesterDebugger";
pub const DOCUMENTER: &str = "Documentador";

pub(super) const AGENTS: &[&str] = &[
    USER_PROXY,
    COORDINATOR,
    LOGIC_DEVELOPER,
    INTERFACE_DEVELOPER,
    TESTER,
    DOCUMENTER,
];

/// Roles whose replies may contain code.
pub const PRODUCERS: &[&str] = &[LOGIC_DEVELOPER, INTERFACE_DEVELOPER, TESTER, DOCUMENTER];

pub const EXPECTED_FILES: &[&str] = &[
    "snake_logic.py",
    "snake_game.py",
    "test_snake.py",
    "README.md",
    "requirements.txt",
];

/// Refusal phrasing for producers. "error" is legitimate in code.
const PRODUCER_REFUSALS: &[&str] = &[
    "no puedo",
    "no tengo acceso",
    "como modelo de lenguaje",
    "lo siento",
    "disculpa",
];

const COORDINATOR_PROMPT: &str = "\
Eres el Coordinador Principal. Tu trabajo es pedir a cada agente que genere su archivo:
1. DesarrolladorLogica: snake_logic.py
2. DesarrolladorInterfaz: snake_game.py
3. TesterDebugger: test_snake.py
4. Documentador: README.md y requirements.txt

Coordina paso a paso. Cuando todos los archivos estén listos, di: \"COMPLETADO\".";

const LOGIC_PROMPT: &str = "\
Genera el archivo snake_logic.py con las clases Snake, Food y GameState.
Escribe código completo y funcional en un bloque ```python y pon \"# snake_logic.py\" en la primera línea.
No uses pygame en este archivo.";

const INTERFACE_PROMPT: &str = "\
Genera el archivo snake_game.py con la interfaz del juego usando pygame.
Importa las clases de snake_logic.py. Escribe código completo en un bloque ```python
y pon \"# snake_game.py\" en la primera línea.";

const TESTER_PROMPT: &str = "\
Genera el archivo test_snake.py con pruebas unittest para snake_logic.py.
Escribe código completo en un bloque ```python y pon \"# test_snake.py\" en la primera línea.";

const DOCUMENTER_PROMPT: &str = "\
Genera README.md (instalación y uso) y requirements.txt (pygame y pytest con versión).
Usa un bloque ``` por archivo y pon \"# README.md\" o \"# requirements.txt\" en la primera línea.";

const KICKOFF: &str = "\
Inicia el desarrollo del juego Snake.

Cada agente debe generar su archivo:
- DesarrolladorLogica: snake_logic.py
- DesarrolladorInterfaz: snake_game.py
- TesterDebugger: test_snake.py
- Documentador: README.md y requirements.txt

Genera código completo en bloques ```python

CoordinadorPrincipal: coordina a cada agente paso a paso.";

/// The code generation scenario.
#[derive(Debug, Clone, Copy, Default)]
pub struct CodegenScenario;

fn is_producer(message: &Message) -> bool {
    PRODUCERS.iter().any(|p| message.is_from(p))
}

/// Extracts artifacts from producer messages, longest candidate per file.
pub fn collect_artifacts<'a>(messages: impl IntoIterator<Item = &'a Message>) -> Vec<CodeArtifact> {
    let candidates = messages
        .into_iter()
        .filter(|m| is_producer(m))
        .flat_map(extract_artifacts)
        .collect();
    resolve_conflicts(candidates)
}

impl Scenario for CodegenScenario {
    fn name(&self) -> &'static str {
        NAME
    }

    fn participants(&self, config: &RoundtableConfig) -> Vec<Participant> {
        let endpoint = |agent: &str, default: &str| {
            ModelEndpoint::new(
                config.endpoint.base_url.clone(),
                config.endpoint.api_key.clone(),
                config.model_for(agent, default),
            )
        };

        vec![
            Participant::proxy(USER_PROXY),
            Participant::model(COORDINATOR, endpoint(COORDINATOR, "llama3"), COORDINATOR_PROMPT),
            Participant::model(LOGIC_DEVELOPER, endpoint(LOGIC_DEVELOPER, "codeqwen"), LOGIC_PROMPT),
            Participant::model(
                INTERFACE_DEVELOPER,
                endpoint(INTERFACE_DEVELOPER, "codeqwen"),
                INTERFACE_PROMPT,
            ),
            Participant::model(TESTER, endpoint(TESTER, "codellama"), TESTER_PROMPT),
            Participant::model(DOCUMENTER, endpoint(DOCUMENTER, "mistral"), DOCUMENTER_PROMPT),
        ]
    }

    fn initiator(&self) -> AgentId {
        AgentId::new(USER_PROXY)
    }

    fn kickoff(&self) -> &'static str {
        KICKOFF
    }

    fn max_rounds(&self) -> u32 {
        12
    }

    fn is_termination(&self, message: &Message) -> bool {
        message.text.to_lowercase().contains("completado")
    }

    fn live_hook(&self, ctx: &ScenarioContext) -> Option<LiveHook> {
        let writer = ArtifactWriter::new(ctx.output_dir.clone());
        // Runs inline on the conversation task: the std::fs writes block it,
        // but artifacts are small and no other task shares the runtime.
        Some(Box::new(move |message: &Message| {
            if !is_producer(message) {
                return;
            }
            let artifacts = resolve_conflicts(extract_artifacts(message));
            if artifacts.is_empty() {
                return;
            }
            debug!(sender = %message.sender, count = artifacts.len(), "Intercepted code from message");
            writer.write_all(&artifacts);
        }))
    }

    fn analyze(&self, messages: &[Message], ctx: &ScenarioContext, report: &mut ReportBuilder) {
        let writer = ArtifactWriter::new(ctx.output_dir.clone());

        let producer_messages = messages.iter().filter(|m| is_producer(m)).count();
        let artifacts = collect_artifacts(messages);
        let summary = writer.write_all(&artifacts);
        info!(
            artifacts = artifacts.len(),
            written = summary.written.len(),
            skipped = summary.skipped.len(),
            failed = summary.failed.len(),
            "Post-run extraction complete"
        );

        let names = artifacts
            .iter()
            .map(|a| a.filename.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        let extraction = format!(
            "{} artifact(s) from {producer_messages} producer message(s): [{names}]",
            artifacts.len()
        );
        report.record(
            "Code extraction",
            if artifacts.is_empty() {
                Verdict::fail(extraction)
            } else {
                Verdict::pass(extraction)
            },
        );
        if !summary.failed.is_empty() {
            report.record(
                "Artifact writing",
                Verdict::fail(format!("failed to write: {}", summary.failed.join(", "))),
            );
        }

        let inspected = writer.inspect(EXPECTED_FILES);
        let mut tally = ArtifactTally {
            expected: EXPECTED_FILES.len(),
            ..ArtifactTally::default()
        };
        for file in &inspected {
            let verdict = match (&file.shape, file.size_bytes) {
                (Some(shape), Some(size)) => {
                    tally.produced += 1;
                    tally.valid += usize::from(shape.passed);
                    Verdict {
                        passed: shape.passed,
                        details: format!("{} ({size} bytes)", shape.details),
                    }
                }
                (None, Some(_)) => {
                    tally.produced += 1;
                    Verdict::fail(format!("{} exists but could not be read", file.filename))
                }
                _ => Verdict::fail(format!("{} was not generated", file.filename)),
            };
            report.record(format!("File {}", file.filename), verdict);
        }

        let files = FilesCreated::from_inspection(&inspected);
        report.record(
            "File completeness",
            validate::count_in_range(
                "files created",
                files.created.len(),
                EXPECTED_FILES.len(),
                EXPECTED_FILES.len(),
            ),
        );
        report.record("Producers - hallucination control", producer_hallucinations(messages));
        report.set_files_created(files);
        report.set_tally(tally);
    }
}

fn producer_hallucinations(messages: &[Message]) -> Verdict {
    let mut flagged = Vec::new();
    let mut checked = 0;
    for producer in PRODUCERS {
        let Some(message) = super::last_from(messages, producer) else {
            continue;
        };
        checked += 1;
        let verdict = validate::hallucination(&message.text, PRODUCER_REFUSALS, &[]);
        if !verdict.passed {
            flagged.push(format!("{producer}: {}", verdict.details));
        }
    }

    if checked == 0 {
        Verdict::fail("no producer messages to check")
    } else if flagged.is_empty() {
        Verdict::pass(format!("no hallucinations detected in {checked} producer(s)"))
    } else {
        Verdict::fail(flagged.join("; "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::fixtures;
    use std::fs;
    use tempfile::TempDir;

    fn conversation() -> Vec<Message> {
        vec![
            Message::new(USER_PROXY, KICKOFF, 0),
            Message::new(COORDINATOR, "DesarrolladorLogica, empieza.", 1),
            Message::new(LOGIC_DEVELOPER, fixtures::codegen_logic(), 2),
            Message::new(INTERFACE_DEVELOPER, fixtures::codegen_interface(), 3),
            Message::new(TESTER, fixtures::codegen_tests(), 4),
            Message::new(DOCUMENTER, fixtures::codegen_docs(), 5),
            Message::new(COORDINATOR, "COMPLETADO", 6),
        ]
    }

    #[test]
    fn test_termination_is_case_insensitive() {
        let scenario = CodegenScenario;
        assert!(scenario.is_termination(&Message::new(COORDINATOR, "Proyecto Completado.", 1)));
        assert!(!scenario.is_termination(&Message::new(COORDINATOR, "Sigamos.", 1)));
    }

    #[test]
    fn test_collect_ignores_non_producers() {
        let messages = vec![Message::new(
            COORDINATOR,
            format!("Ejemplo:\n{}", fixtures::codegen_logic()),
            1,
        )];
        assert!(collect_artifacts(&messages).is_empty());
    }

    #[test]
    fn test_full_run_writes_every_expected_file() {
        let temp = TempDir::new().unwrap();
        let ctx = ScenarioContext {
            output_dir: temp.path().to_path_buf(),
        };
        let mut builder = ReportBuilder::new(NAME);
        CodegenScenario.analyze(&conversation(), &ctx, &mut builder);
        let report = builder.finish();

        for file in EXPECTED_FILES {
            assert!(temp.path().join(file).exists(), "{file} missing");
            let check = report.result(&format!("File {file}")).unwrap();
            assert!(check.passed, "{file}: {}", check.details);
        }
        assert!(report.result("File completeness").unwrap().passed);
        assert!(report.result("Producers - hallucination control").unwrap().passed);
        assert!((report.files_created.completion_percentage - 100.0).abs() < f64::EPSILON);
        assert!((report.overall_score - 100.0).abs() < f64::EPSILON);

        let logic = fs::read_to_string(temp.path().join("snake_logic.py")).unwrap();
        assert!(logic.starts_with("import random\n"));
        let requirements = fs::read_to_string(temp.path().join("requirements.txt")).unwrap();
        assert_eq!(requirements, "pygame==2.5.2\npytest>=7.0");
    }

    #[test]
    fn test_live_hook_and_post_pass_agree() {
        let temp = TempDir::new().unwrap();
        let ctx = ScenarioContext {
            output_dir: temp.path().to_path_buf(),
        };
        let hook = CodegenScenario.live_hook(&ctx).unwrap();
        for message in conversation() {
            hook(&message);
        }
        let live = fs::read_to_string(temp.path().join("snake_game.py")).unwrap();

        let mut builder = ReportBuilder::new(NAME);
        CodegenScenario.analyze(&conversation(), &ctx, &mut builder);
        let after = fs::read_to_string(temp.path().join("snake_game.py")).unwrap();
        assert_eq!(live, after);
    }

    #[tokio::test]
    async fn test_live_hook_writes_before_record_returns() {
        let temp = TempDir::new().unwrap();
        let ctx = ScenarioContext {
            output_dir: temp.path().to_path_buf(),
        };
        let mut transcript = roundtable_proto::Transcript::new();
        transcript.add_observer(CodegenScenario.live_hook(&ctx).unwrap());

        transcript.record(LOGIC_DEVELOPER, fixtures::codegen_logic());
        assert!(temp.path().join("snake_logic.py").is_file());
    }

    #[test]
    fn test_missing_files_reported() {
        let temp = TempDir::new().unwrap();
        let ctx = ScenarioContext {
            output_dir: temp.path().to_path_buf(),
        };
        let messages = vec![
            Message::new(USER_PROXY, KICKOFF, 0),
            Message::new(LOGIC_DEVELOPER, "Lo siento, no puedo generar código.", 1),
        ];
        let mut builder = ReportBuilder::new(NAME);
        CodegenScenario.analyze(&messages, &ctx, &mut builder);
        let report = builder.finish();

        assert!(!report.result("Code extraction").unwrap().passed);
        let logic = report.result("File snake_logic.py").unwrap();
        assert_eq!(logic.details, "snake_logic.py was not generated");
        assert_eq!(report.files_created.missing.len(), 5);
        let hallucination = report.result("Producers - hallucination control").unwrap();
        assert!(hallucination.details.contains(LOGIC_DEVELOPER));
        assert!(report.overall_score.abs() < f64::EPSILON);
    }
}
