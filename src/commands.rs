use crate::infra::{
    parse_date, read_json, read_json_or_default, render_json, replace_files, write_json,
};
use chrono::{DateTime, NaiveDate, Utc};
use clap::Args;
use serde_json::Value;
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::PathBuf;
use std::sync::Arc;
use tool_rankings::changes::{build_report, ChangeAnalyzer, ChangeReport};
use tool_rankings::config::RankingConfig;
use tool_rankings::news::{
    ImpactBatchSummary, ImpactEvent, ImpactLedger, ImpactService, InMemoryImpactLedger,
    KeywordAttributor, LedgerEntry, RollbackSummary,
};
use tool_rankings::ranking::{
    RankingEngine, RankingEntry, RankingPeriod, RankingRun, ToolFailure, WeightTable,
};
use tool_rankings::scoring::{
    clamp_scores, compose_current_score, FactorScoreSet, InMemoryToolScoreStore, ToolScoreStore,
    ToolScoringRecord, RAW_SCORE_RANGE,
};
use tool_rankings::{AppError, SourceId};
use tracing::{info, warn};

#[derive(Args, Debug, Default)]
pub struct RankArgs {
    /// JSON array of per-tool metric records
    #[arg(long)]
    pub metrics: PathBuf,
    /// Previous period JSON to compare against
    #[arg(long)]
    pub previous: Option<PathBuf>,
    /// Date innovation decay is evaluated at (YYYY-MM-DD, defaults to today)
    #[arg(long, value_parser = parse_date)]
    pub as_of: Option<NaiveDate>,
    /// Period label (defaults to the as-of month, e.g. 2025-07)
    #[arg(long)]
    pub period: Option<String>,
    /// Algorithm version overriding RANKINGS_ALGORITHM_VERSION
    #[arg(long)]
    pub algorithm: Option<String>,
    /// Commit the period instead of leaving it as a preview
    #[arg(long)]
    pub commit: bool,
    /// Write the period as JSON
    #[arg(long)]
    pub output: Option<PathBuf>,
    /// Write the period as CSV
    #[arg(long)]
    pub csv: Option<PathBuf>,
    /// Write the change report as Markdown instead of printing it
    #[arg(long)]
    pub report: Option<PathBuf>,
    /// Allow comparing periods computed under different algorithm versions
    #[arg(long)]
    pub acknowledge_version_change: bool,
}

#[derive(Args, Debug, Default)]
pub struct ApplyNewsArgs {
    /// JSON array of tool scoring records; rewritten in place
    #[arg(long)]
    pub scores: PathBuf,
    /// JSON array of impact events
    #[arg(long)]
    pub events: PathBuf,
    /// Processed-events ledger; created when missing, rewritten in place
    #[arg(long)]
    pub ledger: Option<PathBuf>,
    /// Report what would change without writing anything
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(Args, Debug, Default)]
pub struct RollbackArgs {
    /// JSON array of tool scoring records; rewritten in place
    #[arg(long)]
    pub scores: PathBuf,
    /// Processed-events ledger; rewritten in place
    #[arg(long)]
    pub ledger: PathBuf,
    /// Source whose impacts are undone
    #[arg(long)]
    pub source: String,
}

#[derive(Args, Debug, Default)]
pub struct ComposeArgs {
    /// Baseline factor scores (JSON object)
    #[arg(long)]
    pub baseline: PathBuf,
    /// Accumulated delta factor scores (JSON object)
    #[arg(long)]
    pub delta: PathBuf,
}

/// A computed period, the tools it had to leave out, and the comparison report if any.
#[derive(Debug)]
pub struct RankOutcome {
    pub period: RankingPeriod,
    pub failures: Vec<ToolFailure>,
    pub report: Option<ChangeReport>,
}

pub fn rank(
    args: &RankArgs,
    config: &RankingConfig,
    generated_at: DateTime<Utc>,
) -> Result<RankOutcome, AppError> {
    let weights = match &args.algorithm {
        Some(version) => WeightTable::for_version(version)?,
        None => config.weight_table()?,
    };
    let metrics: Vec<Value> = read_json(&args.metrics)?;
    let as_of = args.as_of.unwrap_or_else(|| generated_at.date_naive());
    let label = args
        .period
        .clone()
        .unwrap_or_else(|| as_of.format("%Y-%m").to_string());

    let RankingRun {
        mut period,
        failures,
        ..
    } = RankingEngine::new(weights.clone()).compute_period(metrics, as_of, label, generated_at)?;

    let report = match &args.previous {
        Some(path) => {
            let previous: RankingPeriod = read_json(path)?;
            let analyses = ChangeAnalyzer::new(weights).compare_periods(
                &period,
                Some(&previous),
                args.acknowledge_version_change,
            )?;
            period.apply_movements(&analyses)?;
            Some(build_report(&analyses, config.report_options()))
        }
        None => None,
    };

    if args.commit {
        period = period.commit();
    }
    if let Some(path) = &args.output {
        write_json(path, &period)?;
    }
    if let Some(path) = &args.csv {
        period.write_csv(BufWriter::new(File::create(path)?))?;
    }
    if let (Some(path), Some(report)) = (&args.report, &report) {
        fs::write(path, report.to_markdown())?;
    }

    info!(
        period = %period.period,
        ranked = period.len(),
        excluded = failures.len(),
        status = ?period.status,
        "ranking period computed"
    );

    Ok(RankOutcome {
        period,
        failures,
        report,
    })
}

pub fn run_rank(args: RankArgs, config: &RankingConfig) -> Result<(), AppError> {
    let outcome = rank(&args, config, Utc::now())?;
    render_period(&outcome.period);

    if !outcome.failures.is_empty() {
        let count = outcome.failures.len();
        println!(
            "\nExcluded {count} tool{}",
            if count == 1 { "" } else { "s" }
        );
        for failure in &outcome.failures {
            let id = failure
                .tool_id
                .as_ref()
                .map_or("<missing id>", |id| id.as_str());
            println!("- {id}: {}", failure.error);
        }
    }

    if let Some(report) = &outcome.report {
        if args.report.is_none() {
            println!();
            print!("{}", report.to_markdown());
        }
    }
    Ok(())
}

fn render_period(period: &RankingPeriod) {
    println!(
        "Rankings {} ({}, {})",
        period.period,
        period.algorithm_version,
        if period.is_preview() { "preview" } else { "committed" }
    );
    for entry in &period.entries {
        println!(
            "{:>3}. {:<28} {:>6.3} {}",
            entry.rank,
            entry.tool_name,
            entry.score,
            movement_label(entry)
        );
    }
}

fn movement_label(entry: &RankingEntry) -> String {
    let Some(movement) = &entry.movement else {
        return String::new();
    };
    match movement.rank_change {
        Some(change) if change > 0 => format!("(+{change})"),
        Some(change) if change < 0 => format!("({change})"),
        Some(_) => "(=)".to_string(),
        None => format!("({})", movement.direction.as_str()),
    }
}

type FileBackedService = ImpactService<InMemoryToolScoreStore, InMemoryImpactLedger>;

fn load_service(
    records: Vec<ToolScoringRecord>,
    entries: Vec<LedgerEntry>,
    default_importance: f64,
) -> (
    Arc<InMemoryToolScoreStore>,
    Arc<InMemoryImpactLedger>,
    FileBackedService,
) {
    let store = Arc::new(InMemoryToolScoreStore::from_records(records));
    let ledger = Arc::new(InMemoryImpactLedger::from_entries(entries));
    let service = ImpactService::new(
        Arc::clone(&store),
        Arc::clone(&ledger),
        Arc::new(KeywordAttributor::new(default_importance)),
    );
    (store, ledger, service)
}

pub fn apply_news(
    args: &ApplyNewsArgs,
    config: &RankingConfig,
    applied_at: DateTime<Utc>,
) -> Result<ImpactBatchSummary, AppError> {
    let records: Vec<ToolScoringRecord> = read_json(&args.scores)?;
    let events: Vec<ImpactEvent> = read_json(&args.events)?;
    let entries: Vec<LedgerEntry> = match &args.ledger {
        Some(path) => read_json_or_default(path)?,
        None => Vec::new(),
    };
    let (store, ledger, service) = load_service(records, entries, config.default_importance);

    if args.dry_run {
        return Ok(service.dry_run_batch(&events, applied_at)?);
    }

    let summary = service.apply_batch(&events, applied_at)?;
    let scores = render_json(&store.all()?)?;
    match &args.ledger {
        Some(path) => replace_files(&[
            (path.as_path(), render_json(&ledger.entries()?)?),
            (args.scores.as_path(), scores),
        ])?,
        None => {
            warn!("no ledger path given; re-running these events will apply them again");
            replace_files(&[(args.scores.as_path(), scores)])?;
        }
    }
    Ok(summary)
}

pub fn run_apply_news(args: ApplyNewsArgs, config: &RankingConfig) -> Result<(), AppError> {
    let summary = apply_news(&args, config, Utc::now())?;
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

pub fn rollback(args: &RollbackArgs, at: DateTime<Utc>) -> Result<RollbackSummary, AppError> {
    let records: Vec<ToolScoringRecord> = read_json(&args.scores)?;
    let entries: Vec<LedgerEntry> = read_json(&args.ledger)?;
    // Rollback replays recorded deltas, so the attributor's importance default is never consulted.
    let (store, ledger, service) =
        load_service(records, entries, tool_rankings::news::DEFAULT_IMPORTANCE);

    let summary = service.rollback_source(&SourceId::from(args.source.as_str()), at)?;
    replace_files(&[
        (args.ledger.as_path(), render_json(&ledger.entries()?)?),
        (args.scores.as_path(), render_json(&store.all()?)?),
    ])?;
    Ok(summary)
}

pub fn run_rollback(args: RollbackArgs) -> Result<(), AppError> {
    let summary = rollback(&args, Utc::now())?;
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

/// Composes and saturates the current score the same way a stored record does.
pub fn compose(args: &ComposeArgs) -> Result<FactorScoreSet, AppError> {
    let baseline: FactorScoreSet = read_json(&args.baseline)?;
    let delta: FactorScoreSet = read_json(&args.delta)?;
    Ok(clamp_scores(
        &compose_current_score(&baseline, &delta),
        RAW_SCORE_RANGE,
    ))
}

pub fn run_compose(args: ComposeArgs) -> Result<(), AppError> {
    let current = compose(&args)?;
    println!("{}", serde_json::to_string_pretty(&current)?);
    Ok(())
}
