//! CLI command definitions and dispatch.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing::{error, info};

use crate::config::{OutputFormat, RunConfig};
use crate::orchestrator::{Orchestrator, RunError, TracingReporter};
use crate::report::{render_summary, write_json_report};
use crate::results::RunResults;

/// Exit code for a successful run.
const EXIT_OK: u8 = 0;
/// Exit code for a score below the configured threshold.
const EXIT_THRESHOLD: u8 = 1;
/// Exit code for invalid or incomplete configuration.
const EXIT_CONFIG: u8 = 2;
/// Exit code for infrastructure failures (backend unreachable).
const EXIT_INFRA: u8 = 3;

/// Adversarial reliability testing for conversational AI agents.
#[derive(Parser)]
#[command(name = "promptstorm")]
#[command(about = "Fuzz AI agents with LLM-generated adversarial prompts")]
#[command(version)]
pub struct Cli {
    /// The subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short, long, default_value = "info", global = true)]
    pub log_level: String,
}

/// Available CLI subcommands.
#[derive(clap::Subcommand)]
pub enum Commands {
    /// Execute a full test run and write a report.
    Run(RunArgs),

    /// Execute a run and print only the robustness score.
    ///
    /// Exits 0 when the score meets the threshold, 1 otherwise. Suited
    /// for CI gates.
    Score(ScoreArgs),
}

/// Arguments for the run command.
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Path to the YAML run configuration.
    #[arg(short, long, default_value = "promptstorm.yaml")]
    pub config: PathBuf,
}

/// Arguments for the score command.
#[derive(Parser, Debug)]
pub struct ScoreArgs {
    /// Path to the YAML run configuration.
    #[arg(short, long, default_value = "promptstorm.yaml")]
    pub config: PathBuf,

    /// Minimum robustness score required to pass.
    #[arg(short, long, default_value = "0.9")]
    pub threshold: f64,
}

/// Parses CLI arguments.
pub fn parse_cli() -> Cli {
    Cli::parse()
}

/// Dispatches a parsed CLI invocation.
pub async fn run_with_cli(cli: Cli) -> ExitCode {
    let code = match cli.command {
        Commands::Run(args) => cmd_run(args).await,
        Commands::Score(args) => cmd_score(args).await,
    };
    ExitCode::from(code)
}

/// Loads the config and executes a run, returning results or the exit
/// code to terminate with.
async fn execute(config_path: &PathBuf, with_progress: bool) -> Result<RunResults, u8> {
    let config = match RunConfig::load(config_path) {
        Ok(config) => config,
        Err(e) => {
            error!(path = %config_path.display(), error = %e, "failed to load configuration");
            return Err(EXIT_CONFIG);
        }
    };

    let orchestrator = match Orchestrator::from_config(config) {
        Ok(orchestrator) => orchestrator,
        Err(e) => {
            error!(error = %e, "failed to wire run");
            return Err(EXIT_CONFIG);
        }
    };
    let orchestrator = if with_progress {
        orchestrator.with_reporter(Arc::new(TracingReporter))
    } else {
        orchestrator
    };

    match orchestrator.run().await {
        Ok(results) => Ok(results),
        Err(RunError::NoMutations) => {
            error!("attacker-model backend produced no mutations");
            Err(EXIT_INFRA)
        }
        Err(e) => {
            error!(error = %e, "run failed");
            Err(EXIT_CONFIG)
        }
    }
}

async fn cmd_run(args: RunArgs) -> u8 {
    let results = match execute(&args.config, true).await {
        Ok(results) => results,
        Err(code) => return code,
    };

    let output = &results.config_snapshot.output;
    match output.format {
        OutputFormat::Json => {
            if let Err(e) = write_json_report(&results, &output.path) {
                error!(path = %output.path.display(), error = %e, "failed to write report");
                return EXIT_INFRA;
            }
        }
    }

    println!("{}", render_summary(&results));
    info!(path = %output.path.display(), "run finished");
    EXIT_OK
}

async fn cmd_score(args: ScoreArgs) -> u8 {
    let results = match execute(&args.config, false).await {
        Ok(results) => results,
        Err(code) => return code,
    };

    let score = results.robustness_score();
    println!("{score:.4}");

    if score >= args.threshold {
        EXIT_OK
    } else {
        info!(score, threshold = args.threshold, "score below threshold");
        EXIT_THRESHOLD
    }
}
