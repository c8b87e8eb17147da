use super::factors::{finite_or_zero, Factor, FactorScoreSet};

/// Inclusive bounds a persisted or ranked score is saturated into.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreRange {
    pub min: f64,
    pub max: f64,
}

/// Range of the persisted baseline/delta/current factor scores.
pub const RAW_SCORE_RANGE: ScoreRange = ScoreRange {
    min: 0.0,
    max: 100.0,
};

/// Range of the ranking algorithm's internal factor scale.
pub const ALGORITHM_SCORE_RANGE: ScoreRange = ScoreRange {
    min: 0.0,
    max: 10.0,
};

impl ScoreRange {
    pub fn clamp(&self, score: f64) -> f64 {
        clamp_to_range(score, self.min, self.max)
    }
}

/// Combines a baseline with its accumulated delta, factor by factor.
///
/// Every known factor is present in the output; missing inputs count as `0`.
/// No clamping happens here, see [`clamp_scores`].
pub fn compose_current_score(baseline: &FactorScoreSet, delta: &FactorScoreSet) -> FactorScoreSet {
    Factor::ALL
        .into_iter()
        .map(|factor| (factor, baseline.get(factor) + delta.get(factor)))
        .collect()
}

/// Saturates `score` into `[min, max]`. Non-finite input is treated as `0`.
pub fn clamp_to_range(score: f64, min: f64, max: f64) -> f64 {
    finite_or_zero(score, "clamp_to_range").max(min).min(max)
}

pub fn clamp_scores(scores: &FactorScoreSet, range: ScoreRange) -> FactorScoreSet {
    scores
        .iter()
        .map(|(factor, value)| (factor, range.clamp(value)))
        .collect()
}
