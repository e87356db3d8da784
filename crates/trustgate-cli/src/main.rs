use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

use trustgate_core::ToolMessage;
use trustgate_runtime::{RunRegistry, RuntimeConfig};

mod replay;

/// Exit status when a report or answer must not go out.
const EXIT_BLOCKED: u8 = 2;

#[derive(Parser, Debug)]
#[command(name = "trustgate", version, about = "Evidence gates for LLM-drafted reports")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Replay a recorded run through every gate and the trust scorer
    Check {
        #[arg(long, help = "Run file (JSON or YAML)")]
        run: PathBuf,
        #[arg(long, help = "Runtime config with policy thresholds (YAML)")]
        config: Option<PathBuf>,
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },
    /// Check an answer's hard claims against a raw tool transcript
    Ground {
        #[arg(long, help = "File holding the drafted answer")]
        answer: PathBuf,
        #[arg(long, help = "JSON array of {name, content} tool messages")]
        transcript: PathBuf,
        #[arg(long, default_value_t = false)]
        permissive: bool,
        #[arg(long, help = "Runtime config with policy thresholds (YAML)")]
        config: Option<PathBuf>,
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

fn main() -> anyhow::Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Check { run, config, format } => check(&run, config.as_deref(), format),
        Commands::Ground {
            answer,
            transcript,
            permissive,
            config,
            format,
        } => ground(&answer, &transcript, permissive, config.as_deref(), format),
    }
}

fn load_config(path: Option<&Path>) -> anyhow::Result<RuntimeConfig> {
    match path {
        Some(p) => RuntimeConfig::from_file(p).with_context(|| format!("invalid config {}", p.display())),
        None => Ok(RuntimeConfig::default()),
    }
}

fn exit_code(allowed: bool) -> ExitCode {
    if allowed {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(EXIT_BLOCKED)
    }
}

fn check(run_path: &Path, config: Option<&Path>, format: OutputFormat) -> anyhow::Result<ExitCode> {
    let config = load_config(config)?;
    let run = replay::load_run_file(run_path)?;
    let verdict = replay::replay(&run, &config)?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&verdict)?),
        OutputFormat::Text => println!("{}", verdict.render_text()),
    }
    Ok(exit_code(verdict.can_send()))
}

fn ground(
    answer_path: &Path,
    transcript_path: &Path,
    permissive: bool,
    config: Option<&Path>,
    format: OutputFormat,
) -> anyhow::Result<ExitCode> {
    let config = load_config(config)?;
    let answer = std::fs::read_to_string(answer_path)
        .with_context(|| format!("failed to read answer {}", answer_path.display()))?;
    let raw = std::fs::read_to_string(transcript_path)
        .with_context(|| format!("failed to read transcript {}", transcript_path.display()))?;
    let transcript: Vec<ToolMessage> = serde_json::from_str(&raw)
        .with_context(|| format!("transcript {} is not a JSON array of tool messages", transcript_path.display()))?;

    let registry = RunRegistry::from_config(&config)?;
    let context = registry.begin_run("ground");
    let result = context.assert_grounded(&answer, &transcript, !permissive);

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&result)?),
        OutputFormat::Text => {
            println!(
                "Grounded: {} ({} verified, {} violations)",
                result.is_grounded,
                result.verified_claims.len(),
                result.violations.len()
            );
            for v in &result.violations {
                println!("  line {}: {} '{}' - {}", v.line_number, v.claim_type, v.matched_value, v.suggestion);
            }
            if let Some(rec) = &result.recommendation {
                println!("{}", rec);
            }
        }
    }
    Ok(exit_code(result.is_grounded))
}
