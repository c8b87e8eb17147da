//! Ranking engine: tool metrics in, versioned factor scores and ordered periods out.

mod engine;
mod metrics;
mod period;
mod weights;

pub use engine::{
    innovation_with_decay, platform_risk, AlgorithmScores, RankingEngine, RankingRun,
    ScoreModifiers, ToolFailure, ToolScore, ValidationStatus,
};
pub use metrics::{
    BusinessModel, Innovation, MetricsError, NewsAdjustments, RiskFactor, ToolCategory,
    ToolMetrics, ToolStatus,
};
pub use period::{rank_all, PeriodStatus, RankingEntry, RankingError, RankingPeriod, ScoredTool};
pub use weights::{AlgorithmFactor, WeightError, WeightTable, V6, V6_NEWS, V7};
