use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};
use tracing::debug;

use crate::domain::ToolId;

/// Closed schema of the raw signals the ranking formulas consume.
///
/// Decoded and validated once at the ingestion boundary; every formula can
/// then rely on finite, non-negative inputs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolMetrics {
    pub tool_id: ToolId,
    pub name: String,
    #[serde(deserialize_with = "lenient_option")]
    pub category: Option<ToolCategory>,
    pub status: ToolStatus,

    // Agentic
    pub agentic_capability: Option<f64>,
    pub swe_bench_score: Option<f64>,
    pub multi_file_capability: Option<f64>,
    pub planning_depth: Option<f64>,
    pub context_utilization: Option<f64>,

    // Technical
    pub context_window: Option<u64>,
    pub language_support: Option<u32>,
    pub github_stars: Option<u64>,

    // Innovation
    pub innovation_score: Option<f64>,
    pub innovations: Vec<Innovation>,

    // Market
    pub estimated_users: Option<f64>,
    pub monthly_arr: Option<f64>,
    pub valuation: Option<f64>,
    pub funding: Option<f64>,
    #[serde(deserialize_with = "lenient_option")]
    pub business_model: Option<BusinessModel>,

    // Risk and sentiment
    pub business_sentiment: Option<f64>,
    #[serde(deserialize_with = "lenient_list")]
    pub risk_factors: Vec<RiskFactor>,

    // Development
    pub release_frequency: Option<f64>,
    pub github_contributors: Option<u32>,

    // Platform
    pub llm_provider_count: Option<u32>,
    pub multi_model_support: bool,
    pub community_size: Option<f64>,

    /// News-derived qualitative adjustments, applied by news-aware algorithm versions.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub news: Option<NewsAdjustments>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Innovation {
    pub score: f64,
    pub date: NaiveDate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolStatus {
    #[default]
    Active,
    Beta,
    Acquired,
    Deprecated,
    Discontinued,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ToolCategory {
    AutonomousAgent,
    CodeEditor,
    IdeAssistant,
    DevopsAssistant,
    OpenSourceFramework,
    AppBuilder,
    ProprietaryIde,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BusinessModel {
    EnterpriseHighAcv,
    EnterpriseStandard,
    SmbSaas,
    ConsumerPremium,
    Freemium,
    OpenSourceDonations,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskFactor {
    AcquiredByLlmProvider,
    ExclusiveLlmDependency,
    CompetitorControlled,
    RegulatoryRisk,
    FundingDistress,
    MultiLlmSupport,
    OpenSourceLlmReady,
    SelfHostedOption,
}

/// Qualitative boosts distilled from a tool's recent news coverage.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NewsAdjustments {
    pub innovation_boost: f64,
    pub sentiment_adjustment: f64,
    pub velocity_boost: f64,
    pub traction_boost: f64,
    pub technical_boost: f64,
    pub articles_analyzed: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_news_date: Option<NaiveDate>,
}

/// Malformed tool input. Isolated to the offending tool during a ranking run.
#[derive(Debug, thiserror::Error)]
pub enum MetricsError {
    #[error("tool metrics are missing a tool id")]
    MissingToolId,
    #[error("{field} must be a finite number")]
    NonFinite { field: &'static str },
    #[error("{field} must not be negative (got {value})")]
    Negative { field: &'static str, value: f64 },
    #[error("{field} must be within {min}..={max} (got {value})")]
    OutOfRange {
        field: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },
    #[error("could not decode tool metrics: {0}")]
    Decode(#[from] serde_json::Error),
}

impl ToolMetrics {
    pub fn new(tool_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            tool_id: ToolId::new(tool_id),
            name: name.into(),
            ..Self::default()
        }
    }

    /// Decodes one loosely-typed record into the closed schema and validates it.
    pub fn from_value(value: serde_json::Value) -> Result<Self, MetricsError> {
        let metrics: Self = serde_json::from_value(value)?;
        metrics.validate()?;
        Ok(metrics)
    }

    pub fn display_name(&self) -> &str {
        if self.name.trim().is_empty() {
            self.tool_id.as_str()
        } else {
            &self.name
        }
    }

    pub fn validate(&self) -> Result<(), MetricsError> {
        if self.tool_id.is_blank() {
            return Err(MetricsError::MissingToolId);
        }

        let non_negative = [
            ("agentic_capability", self.agentic_capability),
            ("swe_bench_score", self.swe_bench_score),
            ("multi_file_capability", self.multi_file_capability),
            ("planning_depth", self.planning_depth),
            ("context_utilization", self.context_utilization),
            ("innovation_score", self.innovation_score),
            ("estimated_users", self.estimated_users),
            ("monthly_arr", self.monthly_arr),
            ("valuation", self.valuation),
            ("funding", self.funding),
            ("business_sentiment", self.business_sentiment),
            ("release_frequency", self.release_frequency),
            ("community_size", self.community_size),
        ];
        for (field, value) in non_negative {
            if let Some(value) = value {
                check_non_negative(field, value)?;
            }
        }

        if let Some(score) = self.swe_bench_score {
            check_range("swe_bench_score", score, 0.0, 100.0)?;
        }
        if let Some(sentiment) = self.business_sentiment {
            check_range("business_sentiment", sentiment, 0.0, 1.0)?;
        }

        for innovation in &self.innovations {
            check_non_negative("innovations.score", innovation.score)?;
        }

        if let Some(news) = &self.news {
            for (field, value) in [
                ("news.innovation_boost", news.innovation_boost),
                ("news.sentiment_adjustment", news.sentiment_adjustment),
                ("news.velocity_boost", news.velocity_boost),
                ("news.traction_boost", news.traction_boost),
                ("news.technical_boost", news.technical_boost),
            ] {
                if !value.is_finite() {
                    return Err(MetricsError::NonFinite { field });
                }
            }
        }

        Ok(())
    }

    /// Share of the eight core metrics that are populated.
    pub fn completeness(&self) -> f64 {
        let populated = [
            self.agentic_capability.is_some(),
            self.swe_bench_score.is_some(),
            self.estimated_users.is_some(),
            self.monthly_arr.is_some(),
            self.business_sentiment.is_some(),
            self.innovation_score.is_some(),
            self.github_stars.is_some(),
            self.release_frequency.is_some(),
        ];
        populated.iter().filter(|present| **present).count() as f64 / populated.len() as f64
    }
}

impl NewsAdjustments {
    /// Folds the qualitative boosts into the raw metrics before scoring.
    pub fn apply_to_metrics(&self, metrics: &ToolMetrics) -> ToolMetrics {
        let mut updated = metrics.clone();

        if self.innovation_boost > 0.0 {
            let current = updated.innovation_score.unwrap_or(5.0);
            updated.innovation_score = Some((current + self.innovation_boost).min(10.0));

            if self.innovation_boost >= 1.0 {
                if let Some(date) = self.last_news_date {
                    updated.innovations.push(Innovation {
                        score: self.innovation_boost,
                        date,
                        description: Some("Innovation boost from recent developments".to_string()),
                    });
                }
            }
        }

        if self.sentiment_adjustment != 0.0 {
            let current = updated.business_sentiment.unwrap_or(0.5);
            updated.business_sentiment =
                Some((current + self.sentiment_adjustment / 2.0).clamp(0.0, 1.0));
        }

        if self.velocity_boost > 0.0 {
            let current = updated.release_frequency.unwrap_or(2.0);
            updated.release_frequency =
                Some((current * (1.0 + self.velocity_boost / 2.0)).min(30.0));
        }

        updated
    }
}

fn check_non_negative(field: &'static str, value: f64) -> Result<(), MetricsError> {
    if !value.is_finite() {
        return Err(MetricsError::NonFinite { field });
    }
    if value < 0.0 {
        return Err(MetricsError::Negative { field, value });
    }
    Ok(())
}

fn check_range(field: &'static str, value: f64, min: f64, max: f64) -> Result<(), MetricsError> {
    if value < min || value > max {
        return Err(MetricsError::OutOfRange {
            field,
            value,
            min,
            max,
        });
    }
    Ok(())
}

/// Unknown enum labels decode as absent rather than failing the whole record.
fn lenient_option<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: serde::de::DeserializeOwned,
{
    let raw = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(raw.and_then(|value| decode_label(value)))
}

fn lenient_list<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: serde::de::DeserializeOwned,
{
    let raw = Option::<Vec<serde_json::Value>>::deserialize(deserializer)?;
    Ok(raw
        .unwrap_or_default()
        .into_iter()
        .filter_map(decode_label)
        .collect())
}

fn decode_label<T: serde::de::DeserializeOwned>(value: serde_json::Value) -> Option<T> {
    match serde_json::from_value(value.clone()) {
        Ok(decoded) => Some(decoded),
        Err(_) => {
            debug!(label = %value, "ignoring unrecognised metric label");
            None
        }
    }
}
