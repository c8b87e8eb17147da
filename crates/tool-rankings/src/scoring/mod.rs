//! Baseline + delta score composition and the per-tool scoring record.

mod composer;
mod factors;
mod record;
mod store;

pub use composer::{
    clamp_scores, clamp_to_range, compose_current_score, ScoreRange, ALGORITHM_SCORE_RANGE,
    RAW_SCORE_RANGE,
};
pub use factors::{Factor, FactorScoreSet};
pub use record::{BaselineInit, ToolScoringRecord};
pub use store::{
    initialize_baselines, recalculate_all, InMemoryToolScoreStore, StoreError, ToolScoreStore,
};

pub(crate) use factors::finite_or_zero;
