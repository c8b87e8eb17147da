use super::composer::{clamp_scores, compose_current_score, RAW_SCORE_RANGE};
use super::factors::{Factor, FactorScoreSet};
use crate::domain::ToolId;
use crate::news::accumulate;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Baseline, accumulated delta, and derived current score for one tool.
///
/// `current` is never stored authoritatively: it is recomputed whenever the
/// baseline or delta changes, including after deserialization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "StoredScoringRecord")]
pub struct ToolScoringRecord {
    tool_id: ToolId,
    baseline: FactorScoreSet,
    delta: FactorScoreSet,
    current: FactorScoreSet,
    #[serde(skip_serializing_if = "Option::is_none")]
    updated_at: Option<DateTime<Utc>>,
}

/// Outcome of the one-time baseline migration for a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BaselineInit {
    Initialized,
    AlreadyInitialized,
}

impl ToolScoringRecord {
    pub fn new(tool_id: ToolId, baseline: FactorScoreSet) -> Self {
        let mut record = Self {
            tool_id,
            baseline,
            delta: FactorScoreSet::new(),
            current: FactorScoreSet::new(),
            updated_at: None,
        };
        record.recompute();
        record
    }

    /// Builds a record whose baseline is the tool's existing score and whose delta is empty.
    pub fn from_existing(tool_id: ToolId, existing: FactorScoreSet, at: DateTime<Utc>) -> Self {
        let mut record = Self::new(tool_id, existing);
        record.updated_at = Some(at);
        record
    }

    pub fn tool_id(&self) -> &ToolId {
        &self.tool_id
    }

    pub fn baseline(&self) -> &FactorScoreSet {
        &self.baseline
    }

    pub fn delta(&self) -> &FactorScoreSet {
        &self.delta
    }

    pub fn current(&self) -> &FactorScoreSet {
        &self.current
    }

    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.updated_at
    }

    pub fn overall(&self) -> f64 {
        self.current.get(Factor::OverallScore)
    }

    /// Administrative baseline replacement; the accumulated delta is kept.
    pub fn set_baseline(&mut self, baseline: FactorScoreSet, at: DateTime<Utc>) {
        self.baseline = baseline;
        self.touch(at);
    }

    /// Seeds the baseline from existing scores unless one is already present.
    pub fn initialize_baseline(
        &mut self,
        existing: FactorScoreSet,
        at: DateTime<Utc>,
    ) -> BaselineInit {
        if !self.baseline.is_empty() {
            return BaselineInit::AlreadyInitialized;
        }

        self.baseline = existing;
        self.delta = FactorScoreSet::new();
        self.touch(at);
        BaselineInit::Initialized
    }

    /// Adds an event-derived partial delta to the running delta.
    pub fn apply_delta(&mut self, partial: &FactorScoreSet, at: DateTime<Utc>) {
        self.delta = accumulate(&self.delta, partial);
        self.touch(at);
    }

    pub(crate) fn replace_delta(&mut self, delta: FactorScoreSet, at: DateTime<Utc>) {
        self.delta = delta;
        self.touch(at);
    }

    /// Recomputes `current` from baseline and delta, saturated to the raw range.
    pub fn recompute(&mut self) {
        self.current = clamp_scores(
            &compose_current_score(&self.baseline, &self.delta),
            RAW_SCORE_RANGE,
        );
    }

    /// Recomputes `current` and stamps the record as updated.
    pub fn refresh(&mut self, at: DateTime<Utc>) {
        self.touch(at);
    }

    fn touch(&mut self, at: DateTime<Utc>) {
        self.recompute();
        self.updated_at = Some(at);
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredScoringRecord {
    tool_id: ToolId,
    #[serde(default)]
    baseline: FactorScoreSet,
    #[serde(default)]
    delta: FactorScoreSet,
    #[serde(default)]
    updated_at: Option<DateTime<Utc>>,
}

impl From<StoredScoringRecord> for ToolScoringRecord {
    fn from(stored: StoredScoringRecord) -> Self {
        let mut record = Self::new(stored.tool_id, stored.baseline);
        record.delta = stored.delta;
        record.updated_at = stored.updated_at;
        record.recompute();
        record
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 7, 1, 12, 0, 0)
            .single()
            .expect("valid timestamp")
    }

    #[test]
    fn current_tracks_baseline_and_delta() {
        let baseline = FactorScoreSet::new()
            .with(Factor::MarketTraction, 75.0)
            .with(Factor::OverallScore, 72.5);
        let mut record = ToolScoringRecord::new(ToolId::from("cursor"), baseline);
        assert_eq!(record.overall(), 72.5);

        record.apply_delta(
            &FactorScoreSet::new()
                .with(Factor::MarketTraction, 5.0)
                .with(Factor::OverallScore, 2.5),
            at(),
        );

        assert_eq!(record.current().get(Factor::MarketTraction), 80.0);
        assert_eq!(record.overall(), 75.0);
        assert_eq!(record.updated_at(), Some(at()));
    }

    #[test]
    fn current_saturates_within_raw_range() {
        let baseline = FactorScoreSet::new()
            .with(Factor::TechnicalCapability, 50.0)
            .with(Factor::MarketTraction, 95.0);
        let mut record = ToolScoringRecord::new(ToolId::from("aider"), baseline);
        record.apply_delta(
            &FactorScoreSet::new()
                .with(Factor::TechnicalCapability, -70.0)
                .with(Factor::MarketTraction, 20.0),
            at(),
        );

        assert_eq!(record.current().get(Factor::TechnicalCapability), 0.0);
        assert_eq!(record.current().get(Factor::MarketTraction), 100.0);
        assert_eq!(record.delta().get(Factor::TechnicalCapability), -70.0);
    }

    #[test]
    fn set_baseline_keeps_accumulated_delta() {
        let mut record = ToolScoringRecord::new(ToolId::from("cline"), FactorScoreSet::new());
        record.apply_delta(&FactorScoreSet::new().with(Factor::OverallScore, 3.0), at());
        record.set_baseline(FactorScoreSet::new().with(Factor::OverallScore, 60.0), at());
        assert_eq!(record.overall(), 63.0);
    }

    #[test]
    fn initialize_baseline_only_runs_once() {
        let mut record = ToolScoringRecord::new(ToolId::from("zed"), FactorScoreSet::new());
        let existing = FactorScoreSet::new().with(Factor::OverallScore, 58.0);

        assert_eq!(
            record.initialize_baseline(existing.clone(), at()),
            BaselineInit::Initialized
        );
        assert_eq!(
            record.initialize_baseline(FactorScoreSet::new().with(Factor::OverallScore, 1.0), at()),
            BaselineInit::AlreadyInitialized
        );
        assert_eq!(record.baseline(), &existing);
    }

    #[test]
    fn deserialization_recomputes_current() {
        let record: ToolScoringRecord = serde_json::from_str(
            r#"{
                "toolId": "devin",
                "baseline": {"overallScore": 70},
                "delta": {"overallScore": -5},
                "current": {"overallScore": 99}
            }"#,
        )
        .expect("record parses");

        assert_eq!(record.overall(), 65.0);
    }
}
