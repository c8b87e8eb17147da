use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// The closed set of persisted score factors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Factor {
    MarketTraction,
    TechnicalCapability,
    DeveloperAdoption,
    DevelopmentVelocity,
    PlatformResilience,
    CommunitySentiment,
    OverallScore,
}

impl Factor {
    pub const ALL: [Factor; 7] = [
        Factor::MarketTraction,
        Factor::TechnicalCapability,
        Factor::DeveloperAdoption,
        Factor::DevelopmentVelocity,
        Factor::PlatformResilience,
        Factor::CommunitySentiment,
        Factor::OverallScore,
    ];

    /// Every factor except the aggregate `overallScore`.
    pub const COMPONENTS: [Factor; 6] = [
        Factor::MarketTraction,
        Factor::TechnicalCapability,
        Factor::DeveloperAdoption,
        Factor::DevelopmentVelocity,
        Factor::PlatformResilience,
        Factor::CommunitySentiment,
    ];

    pub fn key(self) -> &'static str {
        match self {
            Factor::MarketTraction => "marketTraction",
            Factor::TechnicalCapability => "technicalCapability",
            Factor::DeveloperAdoption => "developerAdoption",
            Factor::DevelopmentVelocity => "developmentVelocity",
            Factor::PlatformResilience => "platformResilience",
            Factor::CommunitySentiment => "communitySentiment",
            Factor::OverallScore => "overallScore",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Factor::MarketTraction => "Market Traction",
            Factor::TechnicalCapability => "Technical Capability",
            Factor::DeveloperAdoption => "Developer Adoption",
            Factor::DevelopmentVelocity => "Development Velocity",
            Factor::PlatformResilience => "Platform Resilience",
            Factor::CommunitySentiment => "Community Sentiment",
            Factor::OverallScore => "Overall Score",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|factor| factor.key() == key)
    }
}

/// Sparse mapping from [`Factor`] to value. Absent factors read as `0`.
///
/// Values are kept finite: anything else handed to [`FactorScoreSet::set`] is
/// stored as `0` and logged.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FactorScoreSet {
    values: BTreeMap<Factor, f64>,
}

impl FactorScoreSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// A set with every factor present and equal to zero.
    pub fn zeroed() -> Self {
        Factor::ALL.into_iter().map(|factor| (factor, 0.0)).collect()
    }

    /// Value of `factor`, treating an absent factor as zero.
    pub fn get(&self, factor: Factor) -> f64 {
        self.values.get(&factor).copied().unwrap_or(0.0)
    }

    /// Value of `factor` only when it is present.
    pub fn value(&self, factor: Factor) -> Option<f64> {
        self.values.get(&factor).copied()
    }

    pub fn set(&mut self, factor: Factor, value: f64) {
        self.values
            .insert(factor, finite_or_zero(value, factor.key()));
    }

    pub fn with(mut self, factor: Factor, value: f64) -> Self {
        self.set(factor, value);
        self
    }

    pub fn contains(&self, factor: Factor) -> bool {
        self.values.contains_key(&factor)
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Factor, f64)> + '_ {
        self.values.iter().map(|(factor, value)| (*factor, *value))
    }
}

impl FromIterator<(Factor, f64)> for FactorScoreSet {
    fn from_iter<I: IntoIterator<Item = (Factor, f64)>>(iter: I) -> Self {
        let mut set = Self::new();
        for (factor, value) in iter {
            set.set(factor, value);
        }
        set
    }
}

impl Serialize for FactorScoreSet {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(self.values.len()))?;
        for (factor, value) in &self.values {
            map.serialize_entry(factor.key(), value)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for FactorScoreSet {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = BTreeMap::<String, Option<f64>>::deserialize(deserializer)?;
        let mut set = Self::new();
        for (key, value) in raw {
            match (Factor::from_key(&key), value) {
                (Some(factor), Some(value)) => set.set(factor, value),
                (Some(_), None) => {}
                (None, _) => debug!(factor = %key, "ignoring unknown score factor"),
            }
        }
        Ok(set)
    }
}

/// Coerces `NaN`/`Infinity` to `0` so they never reach a sort comparator.
pub(crate) fn finite_or_zero(value: f64, context: &str) -> f64 {
    if value.is_finite() {
        value
    } else {
        warn!(context, value = %value, "non-finite score coerced to 0");
        0.0
    }
}
