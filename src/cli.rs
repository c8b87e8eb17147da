use crate::commands::{
    run_apply_news, run_compose, run_rank, run_rollback, ApplyNewsArgs, ComposeArgs, RankArgs,
    RollbackArgs,
};
use clap::{Parser, Subcommand};
use tool_rankings::config::AppConfig;
use tool_rankings::{telemetry, AppError};
use tracing::debug;

#[derive(Parser, Debug)]
#[command(
    name = "tool-rankings",
    about = "Score, rank and explain monthly AI coding tool rankings",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Compute a ranking period from tool metrics and optionally compare it with the last one
    Rank(RankArgs),
    /// Apply news impact events to stored tool scores
    ApplyNews(ApplyNewsArgs),
    /// Undo every impact a news source contributed
    Rollback(RollbackArgs),
    /// Print the current score composed from a baseline and a delta
    Compose(ComposeArgs),
}

pub(crate) fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let config = AppConfig::load()?;
    telemetry::init(&config.telemetry)?;
    debug!(environment = ?config.environment, "configuration loaded");

    match cli.command {
        Command::Rank(args) => run_rank(args, &config.ranking),
        Command::ApplyNews(args) => run_apply_news(args, &config.ranking),
        Command::Rollback(args) => run_rollback(args),
        Command::Compose(args) => run_compose(args),
    }
}
