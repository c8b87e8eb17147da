use std::fmt;

use serde::{Deserialize, Serialize};

/// The eight factors the ranking algorithm scores on a 0-10 scale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AlgorithmFactor {
    AgenticCapability,
    Innovation,
    TechnicalPerformance,
    DeveloperAdoption,
    MarketTraction,
    BusinessSentiment,
    DevelopmentVelocity,
    PlatformResilience,
}

impl AlgorithmFactor {
    pub const ALL: [AlgorithmFactor; 8] = [
        AlgorithmFactor::AgenticCapability,
        AlgorithmFactor::Innovation,
        AlgorithmFactor::TechnicalPerformance,
        AlgorithmFactor::DeveloperAdoption,
        AlgorithmFactor::MarketTraction,
        AlgorithmFactor::BusinessSentiment,
        AlgorithmFactor::DevelopmentVelocity,
        AlgorithmFactor::PlatformResilience,
    ];

    pub fn key(self) -> &'static str {
        match self {
            AlgorithmFactor::AgenticCapability => "agenticCapability",
            AlgorithmFactor::Innovation => "innovation",
            AlgorithmFactor::TechnicalPerformance => "technicalPerformance",
            AlgorithmFactor::DeveloperAdoption => "developerAdoption",
            AlgorithmFactor::MarketTraction => "marketTraction",
            AlgorithmFactor::BusinessSentiment => "businessSentiment",
            AlgorithmFactor::DevelopmentVelocity => "developmentVelocity",
            AlgorithmFactor::PlatformResilience => "platformResilience",
        }
    }

    /// Lowercase phrase used in reasons and narratives.
    pub fn label(self) -> &'static str {
        match self {
            AlgorithmFactor::AgenticCapability => "agentic capability",
            AlgorithmFactor::Innovation => "innovation",
            AlgorithmFactor::TechnicalPerformance => "technical performance",
            AlgorithmFactor::DeveloperAdoption => "developer adoption",
            AlgorithmFactor::MarketTraction => "market traction",
            AlgorithmFactor::BusinessSentiment => "business sentiment",
            AlgorithmFactor::DevelopmentVelocity => "development velocity",
            AlgorithmFactor::PlatformResilience => "platform resilience",
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            AlgorithmFactor::AgenticCapability => "Agentic Capability",
            AlgorithmFactor::Innovation => "Innovation",
            AlgorithmFactor::TechnicalPerformance => "Technical Performance",
            AlgorithmFactor::DeveloperAdoption => "Developer Adoption",
            AlgorithmFactor::MarketTraction => "Market Traction",
            AlgorithmFactor::BusinessSentiment => "Business Sentiment",
            AlgorithmFactor::DevelopmentVelocity => "Development Velocity",
            AlgorithmFactor::PlatformResilience => "Platform Resilience",
        }
    }

    fn index(self) -> usize {
        match self {
            AlgorithmFactor::AgenticCapability => 0,
            AlgorithmFactor::Innovation => 1,
            AlgorithmFactor::TechnicalPerformance => 2,
            AlgorithmFactor::DeveloperAdoption => 3,
            AlgorithmFactor::MarketTraction => 4,
            AlgorithmFactor::BusinessSentiment => 5,
            AlgorithmFactor::DevelopmentVelocity => 6,
            AlgorithmFactor::PlatformResilience => 7,
        }
    }
}

impl fmt::Display for AlgorithmFactor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

pub const V6: &str = "v6.0";
pub const V6_NEWS: &str = "v6-news";
pub const V7: &str = "v7.0";

const WEIGHT_TOLERANCE: f64 = 1e-9;

/// A named, versioned weight table. Swapping tables never touches the factor formulas.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeightTable {
    version: String,
    weights: [f64; 8],
    include_news: bool,
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum WeightError {
    #[error("unknown algorithm version `{0}`")]
    UnknownVersion(String),
    #[error("weights for {version} sum to {sum}, expected 1.0")]
    BadSum { version: String, sum: f64 },
    #[error("weight for {factor} in {version} is not a finite non-negative number")]
    InvalidWeight {
        version: String,
        factor: AlgorithmFactor,
    },
}

impl WeightTable {
    pub fn v6() -> Self {
        Self {
            version: V6.to_string(),
            weights: [0.30, 0.15, 0.125, 0.125, 0.125, 0.075, 0.05, 0.05],
            include_news: false,
        }
    }

    /// v6 weights with news adjustments folded into the inputs.
    pub fn v6_news() -> Self {
        Self {
            version: V6_NEWS.to_string(),
            include_news: true,
            ..Self::v6()
        }
    }

    pub fn v7() -> Self {
        Self {
            version: V7.to_string(),
            weights: [0.25, 0.125, 0.125, 0.125, 0.125, 0.15, 0.05, 0.05],
            include_news: false,
        }
    }

    pub fn known_versions() -> [&'static str; 3] {
        [V6, V6_NEWS, V7]
    }

    pub fn for_version(version: &str) -> Result<Self, WeightError> {
        match version.trim() {
            V6 | "v6" => Ok(Self::v6()),
            V6_NEWS => Ok(Self::v6_news()),
            V7 | "v7" => Ok(Self::v7()),
            other => Err(WeightError::UnknownVersion(other.to_string())),
        }
    }

    /// Builds a custom table, rejecting anything that does not sum to 1.0.
    pub fn custom(
        version: impl Into<String>,
        weights: impl IntoIterator<Item = (AlgorithmFactor, f64)>,
        include_news: bool,
    ) -> Result<Self, WeightError> {
        let version = version.into();
        let mut table = [0.0; 8];
        for (factor, weight) in weights {
            if !weight.is_finite() || weight < 0.0 {
                return Err(WeightError::InvalidWeight { version, factor });
            }
            table[factor.index()] = weight;
        }

        let sum: f64 = table.iter().sum();
        if (sum - 1.0).abs() > WEIGHT_TOLERANCE {
            return Err(WeightError::BadSum { version, sum });
        }

        Ok(Self {
            version,
            weights: table,
            include_news,
        })
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn include_news(&self) -> bool {
        self.include_news
    }

    pub fn weight(&self, factor: AlgorithmFactor) -> f64 {
        self.weights[factor.index()]
    }

    pub fn iter(&self) -> impl Iterator<Item = (AlgorithmFactor, f64)> + '_ {
        AlgorithmFactor::ALL
            .into_iter()
            .map(|factor| (factor, self.weight(factor)))
    }

    pub fn total(&self) -> f64 {
        self.weights.iter().sum()
    }
}

impl Default for WeightTable {
    fn default() -> Self {
        Self::v6()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_tables_sum_to_one() {
        for version in WeightTable::known_versions() {
            let table = WeightTable::for_version(version).expect("known version");
            assert!((table.total() - 1.0).abs() < 1e-9, "{version} sums to {}", table.total());
        }
    }

    #[test]
    fn v7_shifts_weight_to_business_sentiment() {
        let v6 = WeightTable::v6();
        let v7 = WeightTable::v7();
        assert_eq!(v6.weight(AlgorithmFactor::BusinessSentiment), 0.075);
        assert_eq!(v7.weight(AlgorithmFactor::BusinessSentiment), 0.15);
        assert_eq!(v7.weight(AlgorithmFactor::AgenticCapability), 0.25);
    }

    #[test]
    fn unknown_versions_are_rejected() {
        assert_eq!(
            WeightTable::for_version("v5.9"),
            Err(WeightError::UnknownVersion("v5.9".to_string()))
        );
        assert!(WeightTable::v6_news().include_news());
    }

    #[test]
    fn custom_tables_must_sum_to_one() {
        let lopsided = WeightTable::custom(
            "experiment",
            [
                (AlgorithmFactor::AgenticCapability, 0.5),
                (AlgorithmFactor::Innovation, 0.25),
            ],
            false,
        );
        match lopsided {
            Err(WeightError::BadSum { sum, .. }) => assert!((sum - 0.75).abs() < 1e-12),
            other => panic!("expected bad sum, got {other:?}"),
        }

        let balanced = WeightTable::custom(
            "experiment",
            [
                (AlgorithmFactor::AgenticCapability, 0.5),
                (AlgorithmFactor::MarketTraction, 0.5),
            ],
            false,
        )
        .expect("balanced table");
        assert_eq!(balanced.weight(AlgorithmFactor::Innovation), 0.0);
    }
}
