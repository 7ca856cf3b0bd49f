//! Command surface for the decision agent.
//!
//! Host processes embed the agent through [`run_cli`] (full parsed CLI) or
//! [`run_command`] (a single command against an existing agent). All
//! command output is pretty-printed JSON on stdout.

use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};

use decision_agent_core::{
    AgentConfig, DecisionAgent, InsightKind, StateStore, TrendMetric,
};
use decision_agent_store_sqlite::SqliteStateStore;

#[derive(Debug, Parser)]
#[command(name = "da")]
#[command(about = "Experience-driven decision agent")]
pub struct Cli {
    #[arg(long, default_value = "./decision_agent.sqlite3")]
    db: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Process a decision request described by a JSON context.
    Process(ProcessArgs),
    /// Attach observed feedback to a recorded experience.
    Feedback(FeedbackArgs),
    /// Show the agent's current state summary.
    Status,
    /// List learned insights.
    Insights(InsightsArgs),
    Params {
        #[command(subcommand)]
        command: ParamsCommand,
    },
    /// Summarize recent performance.
    Trends(TrendsArgs),
    /// Forecast a metric over a horizon.
    Forecast(ForecastArgs),
    /// Show the action plan for the configured goals.
    Plan,
}

#[derive(Debug, Args)]
pub struct ProcessArgs {
    /// Request context as a JSON object.
    #[arg(long)]
    context_json: String,
}

#[derive(Debug, Args)]
pub struct FeedbackArgs {
    /// Experience id returned by `process`.
    #[arg(long)]
    id: String,
    /// Feedback payload as a JSON object.
    #[arg(long)]
    feedback_json: String,
}

#[derive(Debug, Args)]
pub struct InsightsArgs {
    #[arg(long)]
    kind: Option<InsightKindArg>,
}

#[derive(Debug, Subcommand)]
pub enum ParamsCommand {
    /// Show the current parameter configuration.
    Show,
    /// Suggest parameter nudges from historical correlations.
    Suggest,
    /// Report per-parameter stability.
    Stability,
}

#[derive(Debug, Args)]
pub struct TrendsArgs {
    #[arg(long, default_value_t = 30)]
    window_days: u32,
}

#[derive(Debug, Args)]
pub struct ForecastArgs {
    #[arg(long, default_value = "performance")]
    metric: MetricArg,
    #[arg(long, default_value_t = 30)]
    horizon_days: u32,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum InsightKindArg {
    HighPerformance,
    LowSatisfaction,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum MetricArg {
    Performance,
    Cost,
    Satisfaction,
    Efficiency,
}

impl From<MetricArg> for TrendMetric {
    fn from(metric: MetricArg) -> Self {
        match metric {
            MetricArg::Performance => Self::Performance,
            MetricArg::Cost => Self::Cost,
            MetricArg::Satisfaction => Self::Satisfaction,
            MetricArg::Efficiency => Self::Efficiency,
        }
    }
}

/// Executes the parsed top-level CLI against the configured database.
///
/// # Errors
/// Returns an error when the store cannot be opened or the command fails.
pub fn run_cli(cli: Cli) -> Result<()> {
    let store = SqliteStateStore::open(&cli.db)?;
    let mut agent = DecisionAgent::new(store, AgentConfig::default());
    run_command(cli.command, &mut agent)
}

/// Executes a single command against an existing agent handle.
///
/// # Errors
/// Returns an error when payload parsing or the underlying operation fails.
pub fn run_command<S: StateStore>(command: Command, agent: &mut DecisionAgent<S>) -> Result<()> {
    match command {
        Command::Process(args) => {
            let context = serde_json::from_str(&args.context_json)
                .context("invalid --context-json payload")?;
            let response = agent.process_request(&context)?;
            println!("{}", serde_json::to_string_pretty(&response)?);
            Ok(())
        }
        Command::Feedback(args) => {
            let feedback = serde_json::from_str(&args.feedback_json)
                .context("invalid --feedback-json payload")?;
            let adaptations = agent.learn_from_feedback(&args.id, &feedback)?;
            println!("{}", serde_json::to_string_pretty(&adaptations)?);
            Ok(())
        }
        Command::Status => {
            println!("{}", serde_json::to_string_pretty(&agent.status())?);
            Ok(())
        }
        Command::Insights(args) => {
            let kind = args.kind.map(|kind| match kind {
                InsightKindArg::HighPerformance => InsightKind::HighPerformance,
                InsightKindArg::LowSatisfaction => InsightKind::LowSatisfaction,
            });
            let insights = agent.experience_log().insights(kind);
            println!("{}", serde_json::to_string_pretty(&insights)?);
            Ok(())
        }
        Command::Params { command } => run_params(command, agent),
        Command::Trends(args) => {
            let report = agent.analyze_trend(args.window_days).ok_or_else(|| {
                anyhow!(
                    "no experiences recorded in the last {} days",
                    args.window_days
                )
            })?;
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(())
        }
        Command::Forecast(args) => {
            let forecast = agent.forecast(args.metric.into(), args.horizon_days);
            println!("{}", serde_json::to_string_pretty(&forecast)?);
            Ok(())
        }
        Command::Plan => {
            println!("{}", serde_json::to_string_pretty(&agent.plan())?);
            Ok(())
        }
    }
}

fn run_params<S: StateStore>(command: ParamsCommand, agent: &mut DecisionAgent<S>) -> Result<()> {
    match command {
        ParamsCommand::Show => {
            let parameters = agent.parameter_set().parameters();
            println!("{}", serde_json::to_string_pretty(parameters)?);
            Ok(())
        }
        ParamsCommand::Suggest => {
            let proposals = agent.optimization_proposals();
            println!("{}", serde_json::to_string_pretty(&proposals)?);
            Ok(())
        }
        ParamsCommand::Stability => {
            let report = agent.stability_report();
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(())
        }
    }
}
