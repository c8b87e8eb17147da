use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, error, info, warn};

use super::accumulator::subtract;
use super::attribution::FactorAttributor;
use super::event::{ImpactEvent, ImpactKey};
use super::ledger::{ImpactLedger, InMemoryImpactLedger, LedgerEntry, LedgerError};
use crate::domain::{SourceId, ToolId};
use crate::scoring::{FactorScoreSet, InMemoryToolScoreStore, StoreError, ToolScoreStore};

/// Service composing the attribution heuristic, the score store, and the processed-events ledger.
pub struct ImpactService<S, L> {
    store: Arc<S>,
    ledger: Arc<L>,
    attributor: Arc<dyn FactorAttributor>,
}

/// Result of handing one event to the service.
#[derive(Debug, Clone, PartialEq)]
pub enum ApplyOutcome {
    Applied(AppliedImpact),
    /// The (source, tool) pair is already in the ledger; nothing changed.
    Duplicate(ImpactKey),
    UnknownTool(ToolId),
}

#[derive(Debug, Clone, PartialEq)]
pub struct AppliedImpact {
    pub key: ImpactKey,
    pub delta: FactorScoreSet,
    pub previous_overall: f64,
    pub new_overall: f64,
}

impl AppliedImpact {
    pub fn score_change(&self) -> f64 {
        self.new_overall - self.previous_overall
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ScoreChangeStats {
    pub count: usize,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub total: f64,
}

impl ScoreChangeStats {
    fn observe(&mut self, change: f64) {
        self.count += 1;
        self.total += change;
        self.min = Some(self.min.map_or(change, |min| min.min(change)));
        self.max = Some(self.max.map_or(change, |max| max.max(change)));
    }

    pub fn mean(&self) -> Option<f64> {
        if self.count == 0 {
            None
        } else {
            Some(self.total / self.count as f64)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventFailure {
    pub key: ImpactKey,
    pub error: String,
}

/// Aggregate outcome of a batch of impact events.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ImpactBatchSummary {
    pub dry_run: bool,
    pub events_seen: usize,
    pub applied: usize,
    pub duplicates: usize,
    pub unknown_tools: usize,
    pub tools_affected: BTreeSet<ToolId>,
    pub score_changes: ScoreChangeStats,
    pub errors: Vec<EventFailure>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RollbackSummary {
    pub source_id: SourceId,
    pub tools_rolled_back: Vec<ToolId>,
    pub missing_tools: Vec<ToolId>,
}

/// Error raised by the impact service.
#[derive(Debug, thiserror::Error)]
pub enum ImpactServiceError {
    #[error("invalid impact event {key}: {reason}")]
    InvalidEvent { key: ImpactKey, reason: String },
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

impl<S, L> ImpactService<S, L>
where
    S: ToolScoreStore + 'static,
    L: ImpactLedger + 'static,
{
    pub fn new(store: Arc<S>, ledger: Arc<L>, attributor: Arc<dyn FactorAttributor>) -> Self {
        Self {
            store,
            ledger,
            attributor,
        }
    }

    /// Applies one event unless its (source, tool) pair was already processed.
    pub fn apply_event(
        &self,
        event: &ImpactEvent,
        applied_at: DateTime<Utc>,
    ) -> Result<ApplyOutcome, ImpactServiceError> {
        let key = event.key();
        event
            .validate()
            .map_err(|reason| ImpactServiceError::InvalidEvent {
                key: key.clone(),
                reason,
            })?;

        if self.ledger.contains(&key)? {
            debug!(%key, "impact already applied; skipping");
            return Ok(ApplyOutcome::Duplicate(key));
        }

        let Some(mut record) = self.store.fetch(&event.tool_id)? else {
            warn!(tool_id = %event.tool_id, source_id = %event.source_id, "no scoring record for mentioned tool");
            return Ok(ApplyOutcome::UnknownTool(event.tool_id.clone()));
        };

        let delta = self.attributor.derive_event_delta(event);
        let previous_overall = record.overall();
        record.apply_delta(&delta, applied_at);
        let new_overall = record.overall();

        // Ledger first; a failed store write releases the entry again.
        self.ledger.record(LedgerEntry {
            source_id: event.source_id.clone(),
            tool_id: event.tool_id.clone(),
            delta: delta.clone(),
            previous_overall,
            new_overall,
            reason: impact_reason(event.sentiment),
            applied_at,
        })?;
        if let Err(err) = self.store.upsert(record) {
            if let Err(ledger_err) = self.ledger.remove(&key) {
                error!(%key, error = %ledger_err, "could not release ledger entry after failed score write");
            }
            return Err(err.into());
        }

        info!(
            %key,
            previous_overall,
            new_overall,
            "applied news impact"
        );

        Ok(ApplyOutcome::Applied(AppliedImpact {
            key,
            delta,
            previous_overall,
            new_overall,
        }))
    }

    /// Applies a batch, isolating per-event failures. Store or ledger outages abort the batch.
    pub fn apply_batch(
        &self,
        events: &[ImpactEvent],
        applied_at: DateTime<Utc>,
    ) -> Result<ImpactBatchSummary, ImpactServiceError> {
        let mut summary = ImpactBatchSummary {
            events_seen: events.len(),
            ..ImpactBatchSummary::default()
        };

        for event in events {
            match self.apply_event(event, applied_at) {
                Ok(ApplyOutcome::Applied(applied)) => {
                    summary.applied += 1;
                    summary.tools_affected.insert(applied.key.tool_id.clone());
                    summary.score_changes.observe(applied.score_change());
                }
                Ok(ApplyOutcome::Duplicate(_)) => summary.duplicates += 1,
                Ok(ApplyOutcome::UnknownTool(_)) => summary.unknown_tools += 1,
                Err(ImpactServiceError::InvalidEvent { key, reason }) => {
                    warn!(%key, %reason, "skipping invalid impact event");
                    summary.errors.push(EventFailure { key, error: reason });
                }
                Err(err) => return Err(err),
            }
        }

        info!(
            applied = summary.applied,
            duplicates = summary.duplicates,
            unknown_tools = summary.unknown_tools,
            errors = summary.errors.len(),
            "impact batch processed"
        );

        Ok(summary)
    }

    /// Runs the batch against a scratch copy of the store and ledger, leaving both untouched.
    pub fn dry_run_batch(
        &self,
        events: &[ImpactEvent],
        applied_at: DateTime<Utc>,
    ) -> Result<ImpactBatchSummary, ImpactServiceError> {
        let scratch = ImpactService::new(
            Arc::new(InMemoryToolScoreStore::from_records(self.store.all()?)),
            Arc::new(InMemoryImpactLedger::from_entries(self.ledger.entries()?)),
            Arc::clone(&self.attributor),
        );

        let mut summary = scratch.apply_batch(events, applied_at)?;
        summary.dry_run = true;
        Ok(summary)
    }

    /// Subtracts every recorded per-event delta of `source_id` and forgets those ledger entries.
    pub fn rollback_source(
        &self,
        source_id: &SourceId,
        at: DateTime<Utc>,
    ) -> Result<RollbackSummary, ImpactServiceError> {
        let mut summary = RollbackSummary {
            source_id: source_id.clone(),
            ..RollbackSummary::default()
        };

        for entry in self.ledger.entries_for_source(source_id)? {
            let Some(mut record) = self.store.fetch(&entry.tool_id)? else {
                warn!(tool_id = %entry.tool_id, %source_id, "cannot roll back impact for missing tool");
                summary.missing_tools.push(entry.tool_id.clone());
                continue;
            };

            let restored = subtract(record.delta(), &entry.delta);
            record.replace_delta(restored, at);
            let key = entry.key();
            self.ledger.remove(&key)?;
            if let Err(err) = self.store.upsert(record) {
                if let Err(ledger_err) = self.ledger.record(entry.clone()) {
                    error!(%key, error = %ledger_err, "could not restore ledger entry after failed rollback write");
                }
                return Err(err.into());
            }
            summary.tools_rolled_back.push(entry.tool_id.clone());
        }

        info!(
            %source_id,
            rolled_back = summary.tools_rolled_back.len(),
            "rolled back source impact"
        );

        Ok(summary)
    }
}

fn impact_reason(sentiment: f64) -> String {
    let tone = if sentiment > 0.0 { "positive" } else { "negative" };
    format!("Article impact: {tone} sentiment ({sentiment:.2})")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::news::KeywordAttributor;
    use crate::scoring::{Factor, ToolScoringRecord};
    use chrono::TimeZone;
    use std::sync::atomic::{AtomicBool, Ordering};

    struct UnavailableStore;

    impl ToolScoreStore for UnavailableStore {
        fn fetch(&self, _tool_id: &ToolId) -> Result<Option<ToolScoringRecord>, StoreError> {
            Err(StoreError::Unavailable("connection refused".to_string()))
        }

        fn upsert(&self, _record: ToolScoringRecord) -> Result<(), StoreError> {
            Err(StoreError::Unavailable("connection refused".to_string()))
        }

        fn all(&self) -> Result<Vec<ToolScoringRecord>, StoreError> {
            Err(StoreError::Unavailable("connection refused".to_string()))
        }
    }

    /// Wraps the in-memory ledger and fails the next `record`/`remove` when armed.
    #[derive(Default)]
    struct FlakyLedger {
        inner: InMemoryImpactLedger,
        fail_record: AtomicBool,
        fail_remove: AtomicBool,
    }

    fn outage(flag: &AtomicBool) -> Result<(), LedgerError> {
        if flag.swap(false, Ordering::SeqCst) {
            Err(LedgerError::Unavailable("ledger write timed out".to_string()))
        } else {
            Ok(())
        }
    }

    impl ImpactLedger for FlakyLedger {
        fn contains(&self, key: &ImpactKey) -> Result<bool, LedgerError> {
            self.inner.contains(key)
        }

        fn record(&self, entry: LedgerEntry) -> Result<(), LedgerError> {
            outage(&self.fail_record)?;
            self.inner.record(entry)
        }

        fn entries(&self) -> Result<Vec<LedgerEntry>, LedgerError> {
            self.inner.entries()
        }

        fn entries_for_source(&self, source_id: &SourceId) -> Result<Vec<LedgerEntry>, LedgerError> {
            self.inner.entries_for_source(source_id)
        }

        fn remove(&self, key: &ImpactKey) -> Result<Option<LedgerEntry>, LedgerError> {
            outage(&self.fail_remove)?;
            self.inner.remove(key)
        }
    }

    /// In-memory store whose next `upsert` fails when armed.
    #[derive(Default)]
    struct FlakyStore {
        inner: InMemoryToolScoreStore,
        fail_upsert: AtomicBool,
    }

    impl ToolScoreStore for FlakyStore {
        fn fetch(&self, tool_id: &ToolId) -> Result<Option<ToolScoringRecord>, StoreError> {
            self.inner.fetch(tool_id)
        }

        fn upsert(&self, record: ToolScoringRecord) -> Result<(), StoreError> {
            if self.fail_upsert.swap(false, Ordering::SeqCst) {
                return Err(StoreError::Unavailable("write rejected".to_string()));
            }
            self.inner.upsert(record)
        }

        fn all(&self) -> Result<Vec<ToolScoringRecord>, StoreError> {
            self.inner.all()
        }
    }

    fn cursor_store() -> FlakyStore {
        FlakyStore {
            inner: InMemoryToolScoreStore::from_records([ToolScoringRecord::new(
                ToolId::from("cursor"),
                FactorScoreSet::new().with(Factor::MarketTraction, 40.0),
            )]),
            fail_upsert: AtomicBool::new(false),
        }
    }

    fn funding(source: &str) -> ImpactEvent {
        ImpactEvent {
            context: "Cursor closes new funding round".to_string(),
            ..event("cursor", source, 1.0)
        }
    }

    fn traction_delta<S: ToolScoreStore>(store: &S) -> f64 {
        store
            .fetch(&ToolId::from("cursor"))
            .expect("store readable")
            .expect("cursor stored")
            .delta()
            .get(Factor::MarketTraction)
    }

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 7, 15, 9, 30, 0)
            .single()
            .expect("valid timestamp")
    }

    fn event(tool: &str, source: &str, sentiment: f64) -> ImpactEvent {
        ImpactEvent {
            tool_id: ToolId::from(tool),
            source_id: SourceId::from(source),
            sentiment,
            relevance: 1.0,
            context: "new release with benchmark gains".to_string(),
            importance: Some(10.0),
            published_at: None,
        }
    }

    #[test]
    fn store_outage_aborts_the_batch() {
        let service = ImpactService::new(
            Arc::new(UnavailableStore),
            Arc::new(InMemoryImpactLedger::default()),
            Arc::new(KeywordAttributor::default()),
        );

        match service.apply_batch(&[event("cursor", "a-1", 0.5)], at()) {
            Err(ImpactServiceError::Store(StoreError::Unavailable(_))) => {}
            other => panic!("expected store outage, got {other:?}"),
        }
    }

    #[test]
    fn invalid_events_are_recorded_and_the_batch_continues() {
        let store = Arc::new(InMemoryToolScoreStore::from_records([ToolScoringRecord::new(
            ToolId::from("cursor"),
            FactorScoreSet::new().with(Factor::OverallScore, 50.0),
        )]));
        let service = ImpactService::new(
            store.clone(),
            Arc::new(InMemoryImpactLedger::default()),
            Arc::new(KeywordAttributor::default()),
        );

        let summary = service
            .apply_batch(
                &[event("cursor", "a-1", f64::NAN), event("cursor", "a-2", 0.5)],
                at(),
            )
            .expect("batch completes");

        assert_eq!(summary.errors.len(), 1);
        assert_eq!(summary.errors[0].key.source_id, SourceId::from("a-1"));
        assert_eq!(summary.applied, 1);
        assert!(summary.tools_affected.contains(&ToolId::from("cursor")));
    }

    #[test]
    fn score_change_stats_track_extremes() {
        let mut stats = ScoreChangeStats::default();
        assert_eq!(stats.mean(), None);
        stats.observe(1.5);
        stats.observe(-0.5);
        assert_eq!(stats.min, Some(-0.5));
        assert_eq!(stats.max, Some(1.5));
        assert_eq!(stats.mean(), Some(0.5));
    }

    #[test]
    fn ledger_outage_leaves_scores_untouched_so_a_retry_applies_once() {
        let store = Arc::new(cursor_store());
        let ledger = Arc::new(FlakyLedger::default());
        ledger.fail_record.store(true, Ordering::SeqCst);
        let service = ImpactService::new(
            store.clone(),
            ledger.clone(),
            Arc::new(KeywordAttributor::default()),
        );

        match service.apply_event(&funding("a1"), at()) {
            Err(ImpactServiceError::Ledger(LedgerError::Unavailable(_))) => {}
            other => panic!("expected ledger outage, got {other:?}"),
        }
        assert_eq!(traction_delta(store.as_ref()), 0.0);

        let applied = match service.apply_event(&funding("a1"), at()) {
            Ok(ApplyOutcome::Applied(applied)) => applied,
            other => panic!("expected applied impact, got {other:?}"),
        };
        let single = applied.delta.get(Factor::MarketTraction);
        assert!(single > 0.0);
        assert_eq!(traction_delta(store.as_ref()), single);

        assert!(matches!(
            service.apply_event(&funding("a1"), at()),
            Ok(ApplyOutcome::Duplicate(_))
        ));
        assert_eq!(traction_delta(store.as_ref()), single);
    }

    #[test]
    fn failed_score_write_releases_the_ledger_entry() {
        let store = Arc::new(cursor_store());
        store.fail_upsert.store(true, Ordering::SeqCst);
        let ledger = Arc::new(FlakyLedger::default());
        let service = ImpactService::new(
            store.clone(),
            ledger.clone(),
            Arc::new(KeywordAttributor::default()),
        );

        match service.apply_event(&funding("a1"), at()) {
            Err(ImpactServiceError::Store(StoreError::Unavailable(_))) => {}
            other => panic!("expected store outage, got {other:?}"),
        }
        assert!(ledger.entries().expect("ledger readable").is_empty());

        assert!(matches!(
            service.apply_event(&funding("a1"), at()),
            Ok(ApplyOutcome::Applied(_))
        ));
        assert_eq!(ledger.entries().expect("ledger readable").len(), 1);
    }

    #[test]
    fn interrupted_rollback_can_be_retried_without_double_subtraction() {
        let store = Arc::new(cursor_store());
        let ledger = Arc::new(FlakyLedger::default());
        let service = ImpactService::new(
            store.clone(),
            ledger.clone(),
            Arc::new(KeywordAttributor::default()),
        );
        service
            .apply_event(&funding("a1"), at())
            .expect("impact applied");
        let applied = traction_delta(store.as_ref());

        ledger.fail_remove.store(true, Ordering::SeqCst);
        assert!(service.rollback_source(&SourceId::from("a1"), at()).is_err());
        assert_eq!(traction_delta(store.as_ref()), applied);

        store.fail_upsert.store(true, Ordering::SeqCst);
        assert!(service.rollback_source(&SourceId::from("a1"), at()).is_err());
        assert_eq!(traction_delta(store.as_ref()), applied);
        assert_eq!(ledger.entries().expect("ledger readable").len(), 1);

        let summary = service
            .rollback_source(&SourceId::from("a1"), at())
            .expect("rollback completes");
        assert_eq!(summary.tools_rolled_back, vec![ToolId::from("cursor")]);
        assert_eq!(traction_delta(store.as_ref()), 0.0);
        assert!(ledger.entries().expect("ledger readable").is_empty());
    }
}
