use super::event::ImpactEvent;
use crate::scoring::{Factor, FactorScoreSet};

/// Turns one impact event into a partial factor delta.
///
/// Accumulation and ranking only depend on this seam, so the keyword
/// heuristic below can be replaced by a better classifier.
pub trait FactorAttributor: Send + Sync {
    fn derive_event_delta(&self, event: &ImpactEvent) -> FactorScoreSet;
}

struct KeywordGroup {
    factor: Factor,
    keywords: &'static [&'static str],
}

const KEYWORD_GROUPS: [KeywordGroup; 5] = [
    KeywordGroup {
        factor: Factor::MarketTraction,
        keywords: &["funding", "revenue", "users"],
    },
    KeywordGroup {
        factor: Factor::TechnicalCapability,
        keywords: &["benchmark", "performance", "capability"],
    },
    KeywordGroup {
        factor: Factor::DeveloperAdoption,
        keywords: &["adoption", "developers", "community"],
    },
    KeywordGroup {
        factor: Factor::DevelopmentVelocity,
        keywords: &["release", "launch", "update"],
    },
    KeywordGroup {
        factor: Factor::PlatformResilience,
        keywords: &["acquisition", "partnership", "enterprise"],
    },
];

const KEYWORD_MULTIPLIER: f64 = 3.0;
const SENTIMENT_MULTIPLIER: f64 = 2.0;

/// Importance assumed for events whose source carries none.
pub const DEFAULT_IMPORTANCE: f64 = 5.0;

/// Substring keyword attribution over the event's lowercased context.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KeywordAttributor {
    default_importance: f64,
}

impl KeywordAttributor {
    pub fn new(default_importance: f64) -> Self {
        Self { default_importance }
    }

    pub fn base_impact(&self, event: &ImpactEvent) -> f64 {
        event.relevance * event.sentiment * (event.importance_or(self.default_importance) / 10.0)
    }
}

impl Default for KeywordAttributor {
    fn default() -> Self {
        Self::new(DEFAULT_IMPORTANCE)
    }
}

impl FactorAttributor for KeywordAttributor {
    fn derive_event_delta(&self, event: &ImpactEvent) -> FactorScoreSet {
        let base_impact = self.base_impact(event);
        let context = event.context.to_lowercase();

        let mut delta = FactorScoreSet::new();
        for group in &KEYWORD_GROUPS {
            if group
                .keywords
                .iter()
                .any(|keyword| context.contains(keyword))
            {
                delta.set(group.factor, base_impact * KEYWORD_MULTIPLIER);
            }
        }

        // Every mention moves sentiment, matched keywords or not.
        delta.set(Factor::CommunitySentiment, base_impact * SENTIMENT_MULTIPLIER);

        // Plain mean over the populated factors, not a weighted one.
        let populated: Vec<f64> = delta.iter().map(|(_, value)| value).collect();
        if !populated.is_empty() {
            let mean = populated.iter().sum::<f64>() / populated.len() as f64;
            delta.set(Factor::OverallScore, mean);
        }

        delta
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{SourceId, ToolId};

    fn event(context: &str, sentiment: f64, relevance: f64, importance: Option<f64>) -> ImpactEvent {
        ImpactEvent {
            tool_id: ToolId::from("cursor"),
            source_id: SourceId::from("article-1"),
            sentiment,
            relevance,
            context: context.to_string(),
            importance,
            published_at: None,
        }
    }

    fn assert_close(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() < 1e-9,
            "expected {expected}, got {actual}"
        );
    }

    #[test]
    fn unmatched_context_still_moves_sentiment_and_overall() {
        let attributor = KeywordAttributor::default();
        let delta =
            attributor.derive_event_delta(&event("A quiet week for the team", 0.5, 1.0, Some(8.0)));

        assert_eq!(delta.len(), 2);
        assert_close(delta.get(Factor::CommunitySentiment), 0.8);
        assert_close(delta.get(Factor::OverallScore), 0.8);
    }

    #[test]
    fn matched_groups_get_triple_impact_and_overall_is_plain_mean() {
        let attributor = KeywordAttributor::default();
        let delta = attributor.derive_event_delta(&event(
            "Series B Funding announced alongside a major Release",
            1.0,
            0.5,
            Some(10.0),
        ));

        assert_close(delta.get(Factor::MarketTraction), 1.5);
        assert_close(delta.get(Factor::DevelopmentVelocity), 1.5);
        assert_close(delta.get(Factor::CommunitySentiment), 1.0);
        assert!(!delta.contains(Factor::TechnicalCapability));
        assert_close(delta.get(Factor::OverallScore), (1.5 + 1.5 + 1.0) / 3.0);
    }

    #[test]
    fn missing_importance_uses_configured_default() {
        let attributor = KeywordAttributor::new(5.0);
        let delta = attributor.derive_event_delta(&event("benchmark results", 1.0, 1.0, None));

        assert_close(delta.get(Factor::TechnicalCapability), 1.5);
        assert_close(delta.get(Factor::CommunitySentiment), 1.0);
    }

    #[test]
    fn negative_sentiment_produces_negative_delta() {
        let attributor = KeywordAttributor::default();
        let delta =
            attributor.derive_event_delta(&event("enterprise partnership ended", -1.0, 1.0, Some(10.0)));

        assert_close(delta.get(Factor::PlatformResilience), -3.0);
        assert_close(delta.get(Factor::CommunitySentiment), -2.0);
        assert_close(delta.get(Factor::OverallScore), -2.5);
    }
}
