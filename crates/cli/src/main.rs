use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use clap::{Parser, Subcommand};
use execai_agents::{ExecutiveAgent, MockCalendar, PipelineOutcome};
use execai_core::config::{DEFAULT_CONFIDENCE_THRESHOLD, DEFAULT_LLM_TIMEOUT_MS};
use execai_core::{parse_busy_spec, PipelineConfig};
use execai_llm::OpenAiIntentAdapter;
use execai_observability::{init_tracing, PipelineMetrics};

type Agent = ExecutiveAgent<OpenAiIntentAdapter>;

#[derive(Debug, Parser)]
#[command(name = "execai")]
#[command(about = "ExecAI intent pipeline CLI")]
struct Cli {
    /// Try the language model before the rule engine.
    #[arg(long, env = "EXECAI_LLM_ENABLED")]
    llm: bool,

    #[arg(long, env = "EXECAI_LLM_TIMEOUT_MS", default_value_t = DEFAULT_LLM_TIMEOUT_MS)]
    timeout_ms: u64,

    #[arg(long, env = "EXECAI_CONFIDENCE_THRESHOLD", default_value_t = DEFAULT_CONFIDENCE_THRESHOLD)]
    threshold: f32,

    /// Mock calendar busy blocks, `start/end` pairs separated by commas.
    /// Defaults to a standard workday of meetings.
    #[arg(long, env = "EXECAI_MOCK_BUSY")]
    busy: Option<String>,

    /// Pin the mock calendar's "now", e.g. 2026-10-19T08:00.
    #[arg(long)]
    anchor: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Resolve and execute one request, printing the full outcome.
    Ask { text: Vec<String> },
    /// Resolve only; prints the resolved request and trace.
    Parse { text: Vec<String> },
    Chat,
    /// One request per line; blank lines and `#` comments are skipped.
    Batch { file: PathBuf },
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing("execai_cli");
    let cli = Cli::parse();

    let config = PipelineConfig::new(cli.llm, cli.timeout_ms, cli.threshold);
    let agent = build_agent(cli.anchor.as_deref(), cli.busy.as_deref())?;

    match cli.command {
        Command::Ask { text } => {
            let text = joined(&text)?;
            let outcome = agent.resolve_and_execute(&text, &config).await;
            println!("{}", serde_json::to_string_pretty(&outcome)?);
        }
        Command::Parse { text } => {
            let text = joined(&text)?;
            let (resolved, trace) = agent.resolve(&text, &config).await;
            println!(
                "{}",
                serde_json::to_string_pretty(&serde_json::json!({
                    "resolved": resolved,
                    "trace": trace,
                }))?
            );
        }
        Command::Chat => run_chat(agent, config).await?,
        Command::Batch { file } => run_batch(agent, config, &file).await?,
    }

    Ok(())
}

async fn run_chat(agent: Agent, config: PipelineConfig) -> Result<()> {
    let metrics = PipelineMetrics::shared();
    println!("ExecAI chat mode. type 'exit' to quit.");

    loop {
        print!("> ");
        io::stdout().flush()?;

        let mut line = String::new();
        if io::stdin().read_line(&mut line)? == 0 {
            break;
        }

        let message = line.trim();
        if message.eq_ignore_ascii_case("exit") || message.eq_ignore_ascii_case("quit") {
            break;
        }
        if message.is_empty() {
            continue;
        }

        let started = Instant::now();
        let outcome = agent.resolve_and_execute(message, &config).await;
        metrics.record_outcome(&outcome);
        metrics.observe_latency(started.elapsed());
        print_summary(&outcome);
    }

    println!("{}", serde_json::to_string_pretty(&metrics.snapshot())?);
    Ok(())
}

async fn run_batch(agent: Agent, config: PipelineConfig, file: &Path) -> Result<()> {
    let contents = std::fs::read_to_string(file)
        .with_context(|| format!("failed reading batch file {}", file.display()))?;
    let metrics = PipelineMetrics::shared();

    for line in contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
    {
        let started = Instant::now();
        let outcome = agent.resolve_and_execute(line, &config).await;
        metrics.record_outcome(&outcome);
        metrics.observe_latency(started.elapsed());
        println!("{}", serde_json::to_string(&outcome)?);
    }

    println!(
        "{}",
        serde_json::to_string(&serde_json::json!({ "summary": metrics.snapshot() }))?
    );
    Ok(())
}

fn print_summary(outcome: &PipelineOutcome) {
    println!(
        "\nintent: {} ({}, confidence {:.2})",
        outcome.resolved.intent,
        outcome.resolved.source.as_str(),
        outcome.resolved.confidence
    );
    println!(
        "action: {} -> {:?}",
        outcome.plan.action_type, outcome.result.status
    );
    if let Some(message) = outcome
        .result
        .payload
        .get("message")
        .or_else(|| outcome.result.payload.get("error"))
        .and_then(|value| value.as_str())
    {
        println!("{message}");
    }
    for record in outcome.trace.records() {
        println!("  [{:?}] {}", record.stage, record.description);
    }
    println!();
}

fn joined(words: &[String]) -> Result<String> {
    let text = words.join(" ");
    anyhow::ensure!(!text.trim().is_empty(), "Text is required.");
    Ok(text)
}

fn build_agent(anchor: Option<&str>, busy: Option<&str>) -> Result<Agent> {
    let calendar = match anchor {
        Some(value) => {
            let anchor = NaiveDateTime::parse_from_str(value.trim(), "%Y-%m-%dT%H:%M")
                .with_context(|| format!("invalid --anchor value {value:?}"))?;
            MockCalendar::new(anchor)
        }
        None => MockCalendar::starting_now(),
    };
    let calendar = match busy {
        Some(spec) => calendar.with_busy(parse_busy_spec(spec)),
        None => calendar.with_mock_workday(),
    };
    let adapter = OpenAiIntentAdapter::from_env()?;

    Ok(ExecutiveAgent::with_mock_handlers(Arc::new(adapter), calendar))
}
