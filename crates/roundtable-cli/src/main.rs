//! # roundtable-cli
//!
//! Binary entry point for Roundtable.
//!
//! This crate provides:
//! - CLI argument parsing using `clap`
//! - Configuration loading, validation and an endpoint preflight
//! - The `bias` and `codegen` scenario runs
//! - Offline re-analysis of a recorded transcript via `roundtable replay`

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use roundtable_adapters::{OpenAiCompatBackend, build_client, probe_endpoint};
use roundtable_core::{
    BiasScenario, CodegenScenario, DEFAULT_CONFIG_FILE, Orchestrator, RoundtableConfig,
    RunOutcome, Scenario, read_transcript,
};
use std::io::{IsTerminal, stdout};
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Color output mode for terminal display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum ColorMode {
    /// Automatically detect if stdout is a TTY
    #[default]
    Auto,
    /// Always use colors
    Always,
    /// Never use colors
    Never,
}

impl ColorMode {
    /// Returns true if colors should be used based on mode and terminal detection.
    fn should_use_colors(self) -> bool {
        match self {
            ColorMode::Always => true,
            ColorMode::Never => false,
            ColorMode::Auto => stdout().is_terminal(),
        }
    }
}

/// ANSI color codes for terminal output.
mod colors {
    pub const RESET: &str = "\x1b[0m";
    pub const BOLD: &str = "\x1b[1m";
    pub const DIM: &str = "\x1b[2m";
    pub const GREEN: &str = "\x1b[32m";
    pub const YELLOW: &str = "\x1b[33m";
    pub const RED: &str = "\x1b[31m";
    pub const CYAN: &str = "\x1b[36m";
}

/// Roundtable - round-robin LLM agent conversations with output validation
#[derive(Parser, Debug)]
#[command(name = "roundtable", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Path to configuration file
    #[arg(short, long, default_value = DEFAULT_CONFIG_FILE, global = true)]
    config: PathBuf,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Color output mode (auto, always, never)
    #[arg(long, value_enum, default_value_t = ColorMode::Auto, global = true)]
    color: ColorMode,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the bias questionnaire (default if no subcommand given)
    Bias(RunArgs),

    /// Run the snake game code generation
    Codegen(RunArgs),

    /// Re-run the post-run analysis on a recorded transcript
    Replay(ReplayArgs),
}

/// Overrides applied on top of the configuration file.
#[derive(Parser, Debug, Default)]
struct RunArgs {
    /// Override the scenario's round bound
    #[arg(long)]
    max_rounds: Option<u32>,

    /// Override the wall-clock limit in seconds
    #[arg(long)]
    max_runtime: Option<u64>,

    /// Override the output directory
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Skip the endpoint preflight
    #[arg(long)]
    no_probe: bool,
}

#[derive(Parser, Debug)]
struct ReplayArgs {
    /// Scenario whose analysis to apply
    #[arg(value_enum)]
    scenario: ScenarioName,

    /// Transcript recorded by a previous run (JSON lines)
    transcript: PathBuf,

    /// Override the output directory
    #[arg(short, long)]
    output: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ScenarioName {
    Bias,
    Codegen,
}

impl ScenarioName {
    fn scenario(self) -> Box<dyn Scenario> {
        match self {
            ScenarioName::Bias => Box::new(BiasScenario),
            ScenarioName::Codegen => Box::new(CodegenScenario),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr, the summary to stdout. RUST_LOG wins over --verbose.
    let filter = if cli.verbose { "debug" } else { "info" };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    let config = load_config(&cli.config)?;

    match cli.command {
        Some(Commands::Bias(args)) => run_command(config, ScenarioName::Bias, cli.color, args).await,
        Some(Commands::Codegen(args)) => {
            run_command(config, ScenarioName::Codegen, cli.color, args).await
        }
        Some(Commands::Replay(args)) => replay_command(config, cli.color, args),
        None => run_command(config, ScenarioName::Bias, cli.color, RunArgs::default()).await,
    }
}

fn load_config(path: &Path) -> Result<RoundtableConfig> {
    let config = RoundtableConfig::load_or_default(path)
        .with_context(|| format!("Failed to load config from {}", path.display()))?;
    let warnings = config.validate().context("Invalid configuration")?;
    for warning in &warnings {
        warn!("{warning}");
    }
    Ok(config)
}

async fn run_command(
    mut config: RoundtableConfig,
    name: ScenarioName,
    color_mode: ColorMode,
    args: RunArgs,
) -> Result<()> {
    if let Some(rounds) = args.max_rounds {
        config.conversation.max_rounds = Some(rounds);
    }
    if let Some(secs) = args.max_runtime {
        anyhow::ensure!(secs > 0, "--max-runtime must be positive");
        config.conversation.max_runtime_seconds = secs;
    }
    if let Some(dir) = args.output {
        config.output.dir = dir;
    }

    let scenario = name.scenario();
    let client =
        build_client(config.request_timeout()).context("Failed to build the HTTP client")?;

    if !args.no_probe {
        preflight(&client, &config, scenario.as_ref()).await;
    }

    let backend = OpenAiCompatBackend::with_client(client);
    let orchestrator = Orchestrator::new(config);
    let outcome = orchestrator.run(scenario.as_ref(), &backend).await;

    print_summary(&outcome, color_mode.should_use_colors());
    Ok(())
}

/// Checks the endpoint and the configured models. Only warns.
async fn preflight(client: &reqwest::Client, config: &RoundtableConfig, scenario: &dyn Scenario) {
    let endpoint = &config.endpoint;
    match probe_endpoint(client, &endpoint.base_url, &endpoint.api_key).await {
        Ok(available) => {
            info!(url = %endpoint.base_url, models = available.len(), "Endpoint reachable");
            for participant in scenario.participants(config) {
                let Some(model) = participant.model_name() else {
                    continue;
                };
                let tagged = format!("{model}:");
                if !available.iter().any(|m| m == model || m.starts_with(&tagged)) {
                    warn!(agent = %participant.id, model, "Model not offered by the endpoint");
                }
            }
        }
        Err(e) => warn!(error = %e, "Endpoint preflight failed, the run will likely fail"),
    }
}

fn replay_command(
    mut config: RoundtableConfig,
    color_mode: ColorMode,
    args: ReplayArgs,
) -> Result<()> {
    if let Some(dir) = args.output {
        config.output.dir = dir;
    }

    let loaded = read_transcript(&args.transcript)
        .with_context(|| format!("Failed to read transcript {}", args.transcript.display()))?;
    if !loaded.malformed.is_empty() {
        warn!(
            skipped = loaded.malformed.len(),
            first_line = loaded.malformed[0].line_number,
            "Skipped malformed transcript lines"
        );
    }

    let scenario = args.scenario.scenario();
    let outcome = Orchestrator::new(config).replay(scenario.as_ref(), &loaded.messages);
    print_summary(&outcome, color_mode.should_use_colors());
    Ok(())
}

fn print_summary(outcome: &RunOutcome, use_colors: bool) {
    use colors::{BOLD, CYAN, DIM, GREEN, RED, RESET, YELLOW};

    let report = &outcome.report;
    let paint = |color: &'static str| if use_colors { color } else { "" };
    let (reset, bold, dim, cyan) = (paint(RESET), paint(BOLD), paint(DIM), paint(CYAN));
    let status = if report.summary.failed == 0 { paint(GREEN) } else { paint(YELLOW) };
    let separator = if use_colors { "─".repeat(58) } else { "-".repeat(58) };

    println!("\n{bold}{separator}{reset}");
    println!(
        "{bold}Run finished:{reset} {cyan}{}{reset} ({})",
        report.scenario, report.termination
    );
    println!("{bold}{separator}{reset}");

    for check in &report.validation_results {
        let (icon, color) = if check.passed { ("✓", paint(GREEN)) } else { ("✗", paint(RED)) };
        println!("  {color}{icon}{reset} {}: {dim}{}{reset}", check.check_name, check.details);
    }

    println!();
    println!(
        "  Checks:      {status}{}/{}{reset} passed ({:.1}%)",
        report.summary.passed, report.summary.total, report.summary.pass_rate
    );
    println!("  Score:       {status}{:.2}{reset}", report.overall_score);
    println!("  Messages:    {cyan}{}{reset}", report.conversation_length);
    println!("  Elapsed:     {cyan}{:.1}s{reset}", report.execution_time_secs);

    for (label, snapshot) in &report.performance {
        println!(
            "  {label}: {dim}{:.1} MB, {:.1}% CPU{reset}",
            snapshot.memory_mb, snapshot.cpu_percent
        );
    }

    let files = &report.files_created;
    if !files.expected.is_empty() {
        println!(
            "  Files:       {}/{} ({:.0}%)",
            files.created.len(),
            files.expected.len(),
            files.completion_percentage
        );
        let (green, red) = (paint(GREEN), paint(RED));
        for name in &files.created {
            println!("    {green}✓{reset} {name}");
        }
        for name in &files.missing {
            println!("    {red}✗{reset} {name}");
        }
    }

    if let Some(path) = &outcome.report_path {
        println!("  Report:      {}", path.display());
    }
    if let Some(path) = &outcome.transcript_path {
        println!("  Transcript:  {}", path.display());
    }
    println!("{bold}{separator}{reset}");
}
