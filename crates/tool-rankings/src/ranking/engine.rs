use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::metrics::{
    BusinessModel, Innovation, MetricsError, RiskFactor, ToolCategory, ToolMetrics, ToolStatus,
};
use super::period::{rank_all, RankingError, RankingPeriod, ScoredTool};
use super::weights::{AlgorithmFactor, WeightTable};
use crate::domain::ToolId;
use crate::scoring::{finite_or_zero, Factor, FactorScoreSet, ALGORITHM_SCORE_RANGE};

const DEFAULT_INNOVATION: f64 = 5.0;
/// Roughly a six-month half-life.
const INNOVATION_DECAY_RATE: f64 = 0.115;
const DAYS_PER_MONTH: f64 = 30.0;
const DEFAULT_REVENUE_QUALITY: f64 = 0.5;
const SOURCE_CONFIDENCE: f64 = 0.8;
const MIN_COMPLETENESS: f64 = 0.8;
const MIN_CONFIDENCE: f64 = 0.6;

impl RiskFactor {
    /// Penalties are negative, bonuses positive.
    pub fn modifier(self) -> f64 {
        match self {
            RiskFactor::AcquiredByLlmProvider => -2.0,
            RiskFactor::ExclusiveLlmDependency => -1.0,
            RiskFactor::CompetitorControlled => -1.5,
            RiskFactor::RegulatoryRisk => -0.5,
            RiskFactor::FundingDistress => -1.0,
            RiskFactor::MultiLlmSupport => 0.5,
            RiskFactor::OpenSourceLlmReady => 0.3,
            RiskFactor::SelfHostedOption => 0.3,
        }
    }
}

impl BusinessModel {
    pub fn revenue_quality(self) -> f64 {
        match self {
            BusinessModel::EnterpriseHighAcv => 1.0,
            BusinessModel::EnterpriseStandard => 0.8,
            BusinessModel::SmbSaas => 0.6,
            BusinessModel::ConsumerPremium => 0.5,
            BusinessModel::Freemium => 0.3,
            BusinessModel::OpenSourceDonations => 0.2,
        }
    }
}

impl ToolCategory {
    /// Bonus added to agentic capability, on the 0-10 scale.
    pub fn agentic_bonus(self) -> f64 {
        match self {
            ToolCategory::AutonomousAgent => 2.0,
            ToolCategory::CodeEditor | ToolCategory::ProprietaryIde => 1.5,
            ToolCategory::IdeAssistant | ToolCategory::DevopsAssistant => 1.0,
            ToolCategory::OpenSourceFramework => 0.5,
            ToolCategory::AppBuilder => 0.0,
        }
    }
}

/// Per-factor scores on the algorithm's 0-10 scale.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AlgorithmScores(BTreeMap<AlgorithmFactor, f64>);

impl AlgorithmScores {
    pub fn get(&self, factor: AlgorithmFactor) -> f64 {
        self.0.get(&factor).copied().unwrap_or(0.0)
    }

    pub fn set(&mut self, factor: AlgorithmFactor, value: f64) {
        let value = ALGORITHM_SCORE_RANGE.clamp(finite_or_zero(value, factor.key()));
        self.0.insert(factor, value);
    }

    pub fn iter(&self) -> impl Iterator<Item = (AlgorithmFactor, f64)> + '_ {
        self.0.iter().map(|(factor, value)| (*factor, *value))
    }

    /// Best-effort inverse of [`ToolScore::factor_set`]. Agentic capability and
    /// innovation have no persisted counterpart and stay absent.
    pub fn from_factor_set(set: &FactorScoreSet) -> Self {
        let pairs = [
            (Factor::MarketTraction, AlgorithmFactor::MarketTraction),
            (Factor::TechnicalCapability, AlgorithmFactor::TechnicalPerformance),
            (Factor::DeveloperAdoption, AlgorithmFactor::DeveloperAdoption),
            (Factor::DevelopmentVelocity, AlgorithmFactor::DevelopmentVelocity),
            (Factor::PlatformResilience, AlgorithmFactor::PlatformResilience),
            (Factor::CommunitySentiment, AlgorithmFactor::BusinessSentiment),
        ];
        let mut scores = Self::default();
        for (factor, algorithm_factor) in pairs {
            if let Some(value) = set.value(factor) {
                scores.set(algorithm_factor, value);
            }
        }
        scores
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreModifiers {
    /// Decayed innovation relative to the tool's stated innovation score.
    pub innovation_decay: f64,
    pub platform_risk: f64,
    pub revenue_quality: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationStatus {
    pub is_valid: bool,
    pub completeness: f64,
    pub confidence: f64,
}

/// One tool's scored output under a specific algorithm version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolScore {
    pub tool_id: ToolId,
    pub tool_name: String,
    pub algorithm_version: String,
    pub overall_score: f64,
    pub factor_scores: AlgorithmScores,
    pub modifiers: ScoreModifiers,
    pub validation: ValidationStatus,
}

impl ToolScore {
    /// Projects the algorithm factors onto the persisted factor shape.
    pub fn factor_set(&self) -> FactorScoreSet {
        let scores = &self.factor_scores;
        FactorScoreSet::new()
            .with(
                Factor::MarketTraction,
                scores.get(AlgorithmFactor::MarketTraction),
            )
            .with(
                Factor::TechnicalCapability,
                scores.get(AlgorithmFactor::TechnicalPerformance),
            )
            .with(
                Factor::DeveloperAdoption,
                scores.get(AlgorithmFactor::DeveloperAdoption),
            )
            .with(
                Factor::DevelopmentVelocity,
                scores.get(AlgorithmFactor::DevelopmentVelocity),
            )
            .with(
                Factor::PlatformResilience,
                scores.get(AlgorithmFactor::PlatformResilience),
            )
            .with(
                Factor::CommunitySentiment,
                scores.get(AlgorithmFactor::BusinessSentiment),
            )
            .with(Factor::OverallScore, self.overall_score)
    }
}

/// A tool excluded from a ranking run, with the reason.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolFailure {
    pub tool_id: Option<ToolId>,
    pub error: String,
}

/// Output of one ranking computation: the period plus every excluded tool.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankingRun {
    pub period: RankingPeriod,
    pub scores: Vec<ToolScore>,
    pub failures: Vec<ToolFailure>,
}

/// Converts tool metrics into factor scores under one weight table.
#[derive(Debug, Clone, Default)]
pub struct RankingEngine {
    weights: WeightTable,
}

impl RankingEngine {
    pub fn new(weights: WeightTable) -> Self {
        Self { weights }
    }

    pub fn weights(&self) -> &WeightTable {
        &self.weights
    }

    pub fn algorithm_version(&self) -> &str {
        self.weights.version()
    }

    /// Scores one tool. `as_of` drives innovation decay, so equal inputs always score equally.
    pub fn score_tool(
        &self,
        metrics: &ToolMetrics,
        as_of: NaiveDate,
    ) -> Result<ToolScore, MetricsError> {
        metrics.validate()?;

        let adjusted;
        let metrics = match (&metrics.news, self.weights.include_news()) {
            (Some(news), true) => {
                adjusted = news.apply_to_metrics(metrics);
                &adjusted
            }
            _ => metrics,
        };

        let mut scores = AlgorithmScores::default();
        scores.set(AlgorithmFactor::AgenticCapability, agentic_capability(metrics));
        scores.set(
            AlgorithmFactor::Innovation,
            innovation_with_decay(metrics.innovation_score, &metrics.innovations, as_of),
        );
        scores.set(
            AlgorithmFactor::TechnicalPerformance,
            technical_performance(metrics),
        );
        scores.set(AlgorithmFactor::DeveloperAdoption, developer_adoption(metrics));
        scores.set(AlgorithmFactor::MarketTraction, market_traction(metrics));
        scores.set(AlgorithmFactor::BusinessSentiment, business_sentiment(metrics));
        scores.set(
            AlgorithmFactor::DevelopmentVelocity,
            development_velocity(metrics),
        );
        scores.set(
            AlgorithmFactor::PlatformResilience,
            platform_resilience(metrics),
        );

        if let (Some(news), true) = (&metrics.news, self.weights.include_news()) {
            if news.technical_boost > 0.0 {
                let boosted = scores.get(AlgorithmFactor::TechnicalPerformance) + news.technical_boost;
                scores.set(AlgorithmFactor::TechnicalPerformance, boosted);
            }
            if news.traction_boost > 0.0 {
                let boosted = scores.get(AlgorithmFactor::MarketTraction) + news.traction_boost;
                scores.set(AlgorithmFactor::MarketTraction, boosted);
            }
        }

        let weighted: f64 = self
            .weights
            .iter()
            .map(|(factor, weight)| scores.get(factor) * weight)
            .sum();
        let overall_score = ALGORITHM_SCORE_RANGE.clamp(round3(finite_or_zero(
            weighted,
            "overallScore",
        )));

        let modifiers = ScoreModifiers {
            innovation_decay: match metrics.innovation_score {
                Some(stated) if stated > 0.0 => scores.get(AlgorithmFactor::Innovation) / stated,
                _ => 1.0,
            },
            platform_risk: platform_risk(&metrics.risk_factors),
            revenue_quality: revenue_quality(metrics.business_model),
        };

        let completeness = metrics.completeness();
        let validation = ValidationStatus {
            is_valid: completeness >= MIN_COMPLETENESS && SOURCE_CONFIDENCE >= MIN_CONFIDENCE,
            completeness,
            confidence: SOURCE_CONFIDENCE,
        };

        Ok(ToolScore {
            tool_id: metrics.tool_id.clone(),
            tool_name: metrics.display_name().to_string(),
            algorithm_version: self.weights.version().to_string(),
            overall_score,
            factor_scores: scores,
            modifiers,
            validation,
        })
    }

    /// Scores every input, isolating per-tool failures, then ranks the survivors.
    ///
    /// Inputs are loosely-typed records; each is decoded on its own so one bad
    /// record cannot poison the rest of the run.
    pub fn compute_period(
        &self,
        inputs: impl IntoIterator<Item = serde_json::Value>,
        as_of: NaiveDate,
        period: impl Into<String>,
        generated_at: DateTime<Utc>,
    ) -> Result<RankingRun, RankingError> {
        let period = period.into();
        let mut scores = Vec::new();
        let mut failures = Vec::new();

        for input in inputs {
            let tool_id = input
                .get("tool_id")
                .and_then(serde_json::Value::as_str)
                .map(ToolId::from);

            let scored = ToolMetrics::from_value(input)
                .and_then(|metrics| self.score_tool(&metrics, as_of));
            match scored {
                Ok(score) => scores.push(score),
                Err(err) => {
                    warn!(
                        tool_id = tool_id.as_ref().map(ToolId::as_str).unwrap_or("<unknown>"),
                        algorithm_version = self.algorithm_version(),
                        error = %err,
                        "excluding tool from ranking"
                    );
                    failures.push(ToolFailure {
                        tool_id,
                        error: err.to_string(),
                    });
                }
            }
        }

        let scored_tools: Vec<ScoredTool> = scores.iter().map(ScoredTool::from).collect();
        let ranked = rank_all(
            scored_tools,
            period,
            self.algorithm_version(),
            generated_at,
        )?;

        info!(
            period = %ranked.period,
            algorithm_version = self.algorithm_version(),
            ranked = ranked.entries.len(),
            excluded = failures.len(),
            "computed ranking period"
        );

        Ok(RankingRun {
            period: ranked,
            scores,
            failures,
        })
    }
}

fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

/// Sum of each innovation's score decayed by its age at `as_of`.
pub fn innovation_with_decay(
    stated: Option<f64>,
    innovations: &[Innovation],
    as_of: NaiveDate,
) -> f64 {
    if innovations.is_empty() {
        return stated.unwrap_or(DEFAULT_INNOVATION);
    }

    innovations
        .iter()
        .map(|innovation| {
            // Future-dated innovations are treated as brand new rather than amplified.
            let days = (as_of - innovation.date).num_days().max(0) as f64;
            let months = days / DAYS_PER_MONTH;
            innovation.score * (-INNOVATION_DECAY_RATE * months).exp()
        })
        .sum()
}

pub fn platform_risk(risk_factors: &[RiskFactor]) -> f64 {
    risk_factors.iter().map(|factor| factor.modifier()).sum()
}

fn revenue_quality(model: Option<BusinessModel>) -> f64 {
    model.map_or(DEFAULT_REVENUE_QUALITY, BusinessModel::revenue_quality)
}

fn technical_performance(metrics: &ToolMetrics) -> f64 {
    let swe_bench = metrics.swe_bench_score.unwrap_or(0.0) / 100.0;
    let multi_file = metrics.multi_file_capability.unwrap_or(5.0) / 10.0;
    let context = (metrics.context_window.unwrap_or(100_000) as f64 / 200_000.0).min(1.0);
    let languages = (metrics.language_support.unwrap_or(10) as f64 / 20.0).min(1.0);

    (swe_bench * 0.4 + multi_file * 0.3 + context * 0.2 + languages * 0.1) * 10.0
}

fn agentic_capability(metrics: &ToolMetrics) -> f64 {
    let swe_bench = metrics.swe_bench_score.unwrap_or(0.0) / 100.0;
    let multi_file = metrics.multi_file_capability.unwrap_or(5.0) / 10.0;
    let planning = metrics.planning_depth.unwrap_or(5.0) / 10.0;
    let context_use = metrics.context_utilization.unwrap_or(5.0) / 10.0;

    let base = (swe_bench * 0.4 + multi_file * 0.25 + planning * 0.2 + context_use * 0.15) * 10.0;
    base + metrics.category.map_or(0.0, ToolCategory::agentic_bonus)
}

fn market_traction(metrics: &ToolMetrics) -> f64 {
    let revenue = metrics.monthly_arr.unwrap_or(0.0) * revenue_quality(metrics.business_model);
    let revenue_score = (revenue + 1.0).log10() / 10.0;
    let user_score = (metrics.estimated_users.unwrap_or(0.0) + 1.0).log10() / 7.0;
    let funding_score = (metrics.funding.unwrap_or(0.0) + 1.0).log10() / 11.0;
    let valuation_score = (metrics.valuation.unwrap_or(0.0) + 1.0).log10() / 12.0;

    (revenue_score * 0.4 + user_score * 0.3 + funding_score * 0.2 + valuation_score * 0.1) * 10.0
}

fn developer_adoption(metrics: &ToolMetrics) -> f64 {
    let users = metrics.estimated_users.unwrap_or(0.0);
    let stars = metrics.github_stars.unwrap_or(0) as f64;
    let community = metrics.community_size.unwrap_or(users);

    let user_score = (users / 100_000.0 * 5.0).min(10.0);
    let star_score = (stars / 10_000.0 * 5.0).min(10.0);
    let community_score = community / 10.0 / 50_000.0 * 10.0;

    (user_score * 0.5 + star_score * 0.3 + community_score * 0.2).min(10.0)
}

/// Penalties land here; bonuses land on platform resilience.
fn business_sentiment(metrics: &ToolMetrics) -> f64 {
    let base = metrics.business_sentiment.unwrap_or(0.5) * 10.0;
    base + platform_risk(&metrics.risk_factors)
}

fn development_velocity(metrics: &ToolMetrics) -> f64 {
    let releases = metrics.release_frequency.unwrap_or(2.0) / 4.0 * 10.0;
    let contributors = metrics.github_contributors.unwrap_or(10) as f64 / 100.0 * 10.0;
    (releases * 0.5 + contributors * 0.5).min(10.0)
}

fn platform_resilience(metrics: &ToolMetrics) -> f64 {
    let ownership = if metrics.status == ToolStatus::Acquired {
        3.0
    } else {
        7.0
    };
    let providers = if metrics.multi_model_support || metrics.llm_provider_count.unwrap_or(1) > 1 {
        10.0
    } else {
        5.0
    };
    let bonus: f64 = metrics
        .risk_factors
        .iter()
        .map(|factor| factor.modifier())
        .filter(|modifier| *modifier > 0.0)
        .sum();

    (ownership * 0.5 + providers * 0.5 + bonus).min(10.0)
}
