use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::movement::{ChangeCategory, Movement};
use crate::domain::ToolId;
use crate::ranking::{AlgorithmFactor, AlgorithmScores, RankingEntry, RankingPeriod, WeightTable};

/// Factor moves smaller than this are noise for reasons and trends.
pub(crate) const SIGNIFICANT_FACTOR_CHANGE: f64 = 0.5;
const STRONG_FACTOR_CHANGE: f64 = 1.0;
const DRAMATIC_FACTOR_CHANGE: f64 = 2.0;
const STABLE_SCORE_EPSILON: f64 = 0.1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FactorChange {
    pub factor: AlgorithmFactor,
    pub previous: f64,
    pub current: f64,
    pub change: f64,
    pub percent_change: f64,
    /// Contribution to the overall score change under the analyzer's weights.
    pub impact: f64,
}

impl FactorChange {
    pub fn is_significant(&self) -> bool {
        self.change.abs() > SIGNIFICANT_FACTOR_CHANGE
    }
}

/// Explanation of one tool's movement between two periods.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeAnalysis {
    pub tool_id: ToolId,
    pub tool_name: String,
    pub movement: Movement,
    pub category: ChangeCategory,
    pub previous_rank: Option<u32>,
    pub current_rank: Option<u32>,
    pub previous_score: Option<f64>,
    pub current_score: Option<f64>,
    pub score_change: f64,
    pub percent_score_change: f64,
    pub primary_reason: String,
    pub secondary_reasons: Vec<String>,
    pub factor_changes: Vec<FactorChange>,
    pub narrative: String,
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ComparisonError {
    #[error(
        "period uses algorithm {current} but the previous period used {previous}; \
         acknowledge the version change to compare them"
    )]
    VersionMismatch { current: String, previous: String },
}

/// Factor scores of an entry on the algorithm scale, falling back to the
/// persisted projection when the entry carries no full breakdown.
pub fn entry_factors(entry: &RankingEntry) -> AlgorithmScores {
    entry
        .algorithm_scores
        .clone()
        .unwrap_or_else(|| AlgorithmScores::from_factor_set(&entry.factor_scores))
}

/// Classifies and explains rank movements under one weight table.
#[derive(Debug, Clone, Default)]
pub struct ChangeAnalyzer {
    weights: WeightTable,
}

impl ChangeAnalyzer {
    pub fn new(weights: WeightTable) -> Self {
        Self { weights }
    }

    pub fn weights(&self) -> &WeightTable {
        &self.weights
    }

    pub fn analyze_change(
        &self,
        current: &RankingEntry,
        previous: Option<&RankingEntry>,
        current_factors: &AlgorithmScores,
        previous_factors: Option<&AlgorithmScores>,
    ) -> ChangeAnalysis {
        let movement = match previous {
            Some(previous) => Movement::between(previous.rank, current.rank),
            None => Movement::new_entry(),
        };
        let category = ChangeCategory::from_movement(&movement);

        let previous_score = previous.map(|entry| entry.score);
        let score_change = current.score - previous_score.unwrap_or(0.0);
        let percent_score_change = match previous_score {
            Some(score) if score > 0.0 => score_change / score * 100.0,
            _ => 100.0,
        };

        let factor_changes = self.factor_changes(current_factors, previous_factors);
        let (primary_reason, secondary_reasons) = change_reasons(&factor_changes, category);
        let narrative = narrative(
            &current.tool_name,
            category,
            &movement,
            score_change,
            &factor_changes,
            &primary_reason,
        );

        ChangeAnalysis {
            tool_id: current.tool_id.clone(),
            tool_name: current.tool_name.clone(),
            movement,
            category,
            previous_rank: previous.map(|entry| entry.rank),
            current_rank: Some(current.rank),
            previous_score,
            current_score: Some(current.score),
            score_change,
            percent_score_change,
            primary_reason,
            secondary_reasons,
            factor_changes,
            narrative,
        }
    }

    /// Analysis for a tool ranked previously but missing from the current run.
    pub fn analyze_dropped(&self, previous: &RankingEntry) -> ChangeAnalysis {
        let movement = Movement::dropped(previous.rank);
        let previous_factors = entry_factors(previous);
        let factor_changes = self.factor_changes(&AlgorithmScores::default(), Some(&previous_factors));
        let percent_score_change = if previous.score > 0.0 { -100.0 } else { 0.0 };

        ChangeAnalysis {
            tool_id: previous.tool_id.clone(),
            tool_name: previous.tool_name.clone(),
            movement,
            category: ChangeCategory::Dropped,
            previous_rank: Some(previous.rank),
            current_rank: None,
            previous_score: Some(previous.score),
            current_score: None,
            score_change: -previous.score,
            percent_score_change,
            primary_reason: "Dropped from rankings".to_string(),
            secondary_reasons: Vec::new(),
            factor_changes,
            narrative: format!(
                "{} dropped out of the rankings after holding #{}.",
                previous.tool_name, previous.rank
            ),
        }
    }

    /// Pairs entries by tool id and appends a `dropped` analysis for every
    /// tool that disappeared. Periods computed under different algorithm
    /// versions are refused unless the caller acknowledges the change.
    pub fn compare_periods(
        &self,
        current: &RankingPeriod,
        previous: Option<&RankingPeriod>,
        acknowledge_version_change: bool,
    ) -> Result<Vec<ChangeAnalysis>, ComparisonError> {
        if let Some(previous) = previous {
            if previous.algorithm_version != current.algorithm_version {
                if !acknowledge_version_change {
                    return Err(ComparisonError::VersionMismatch {
                        current: current.algorithm_version.clone(),
                        previous: previous.algorithm_version.clone(),
                    });
                }
                warn!(
                    current = %current.algorithm_version,
                    previous = %previous.algorithm_version,
                    "comparing periods across algorithm versions"
                );
            }
        }

        let previous_entries: BTreeMap<&ToolId, &RankingEntry> = previous
            .map(|period| {
                period
                    .entries
                    .iter()
                    .map(|entry| (&entry.tool_id, entry))
                    .collect()
            })
            .unwrap_or_default();

        let mut analyses: Vec<ChangeAnalysis> = current
            .entries
            .iter()
            .map(|entry| {
                let previous_entry = previous_entries.get(&entry.tool_id).copied();
                let previous_factors = previous_entry.map(entry_factors);
                self.analyze_change(
                    entry,
                    previous_entry,
                    &entry_factors(entry),
                    previous_factors.as_ref(),
                )
            })
            .collect();

        if let Some(previous) = previous {
            for entry in &previous.entries {
                if current.entry_for(&entry.tool_id).is_none() {
                    analyses.push(self.analyze_dropped(entry));
                }
            }
        }

        info!(
            period = %current.period,
            analyses = analyses.len(),
            "compared ranking periods"
        );

        Ok(analyses)
    }

    /// Per-factor deltas, largest absolute impact first.
    fn factor_changes(
        &self,
        current: &AlgorithmScores,
        previous: Option<&AlgorithmScores>,
    ) -> Vec<FactorChange> {
        let mut changes: Vec<FactorChange> = self
            .weights
            .iter()
            .map(|(factor, weight)| {
                let current = current.get(factor);
                let previous = previous.map_or(0.0, |scores| scores.get(factor));
                let change = current - previous;
                FactorChange {
                    factor,
                    previous,
                    current,
                    change,
                    percent_change: if previous > 0.0 {
                        change / previous * 100.0
                    } else {
                        100.0
                    },
                    impact: change * weight,
                }
            })
            .collect();

        changes.sort_by(|a, b| b.impact.abs().total_cmp(&a.impact.abs()));
        changes
    }
}

fn change_reasons(changes: &[FactorChange], category: ChangeCategory) -> (String, Vec<String>) {
    let significant: Vec<&FactorChange> = changes.iter().filter(|change| change.is_significant()).collect();

    if category == ChangeCategory::NewEntry {
        let strengths = significant
            .iter()
            .take(3)
            .map(|change| format!("Strong {} ({:.1}/10)", change.factor.title(), change.current))
            .collect();
        return ("New entry to rankings".to_string(), strengths);
    }

    match significant.split_first() {
        Some((primary, rest)) => (
            factor_reason(primary),
            rest.iter().take(3).map(|change| factor_reason(change)).collect(),
        ),
        None => (
            "Minor adjustments across multiple factors".to_string(),
            Vec::new(),
        ),
    }
}

fn factor_reason(change: &FactorChange) -> String {
    let improved = change.change > 0.0;
    let qualifier = if change.change.abs() > DRAMATIC_FACTOR_CHANGE {
        " significantly"
    } else {
        ""
    };
    let direction = if improved { "improved" } else { "declined" };
    let values = format!("({:.1} → {:.1})", change.previous, change.current);

    match change.factor {
        AlgorithmFactor::AgenticCapability if improved => {
            format!("Agentic capabilities improved{qualifier} {values}")
        }
        AlgorithmFactor::AgenticCapability => {
            format!("Agentic performance weakened{qualifier} {values}")
        }
        AlgorithmFactor::Innovation if improved => format!("New innovations boosted score {values}"),
        AlgorithmFactor::Innovation => format!("Innovation score decayed over time {values}"),
        AlgorithmFactor::TechnicalPerformance => {
            format!("Technical benchmarks {direction}{qualifier} {values}")
        }
        AlgorithmFactor::MarketTraction => {
            format!("Market traction {direction}{qualifier} {values}")
        }
        AlgorithmFactor::DeveloperAdoption => {
            format!("Developer adoption {direction}{qualifier} {values}")
        }
        factor => format!("{} {direction}{qualifier} {values}", factor.title()),
    }
}

fn joined_labels(changes: &[&FactorChange], separator: &str) -> String {
    changes
        .iter()
        .map(|change| change.factor.label())
        .collect::<Vec<_>>()
        .join(separator)
}

fn narrative(
    tool_name: &str,
    category: ChangeCategory,
    movement: &Movement,
    score_change: f64,
    changes: &[FactorChange],
    primary_reason: &str,
) -> String {
    let positions = movement.magnitude.unwrap_or(0);
    let plural = if positions == 1 { "" } else { "s" };
    let reason = primary_reason.to_lowercase();
    let improvements: Vec<&FactorChange> = changes
        .iter()
        .filter(|change| change.change > STRONG_FACTOR_CHANGE)
        .take(3)
        .collect();
    let declines: Vec<&FactorChange> = changes
        .iter()
        .filter(|change| change.change < -STRONG_FACTOR_CHANGE)
        .take(3)
        .collect();

    match category {
        ChangeCategory::MajorRise => {
            let mut text = format!("{tool_name} surged {positions} positions due to {reason}.");
            if improvements.len() > 1 {
                text.push_str(&format!(
                    " Multiple factors contributed to this rise, including improvements in {}.",
                    joined_labels(&improvements[..2], " and ")
                ));
            }
            text
        }
        ChangeCategory::Rise => {
            format!("{tool_name} climbed {positions} position{plural} primarily due to {reason}.")
        }
        ChangeCategory::MajorDecline => {
            let mut text = format!("{tool_name} dropped {positions} positions. {primary_reason}.");
            if declines.len() > 1 {
                text.push_str(&format!(
                    " Additional factors include declining {}.",
                    joined_labels(&declines[1..], " and ")
                ));
            }
            text
        }
        ChangeCategory::Decline => {
            format!("{tool_name} fell {positions} position{plural} due to {reason}.")
        }
        ChangeCategory::Stable if score_change.abs() > STABLE_SCORE_EPSILON => format!(
            "{tool_name} maintained its position despite {} in {reason}.",
            if score_change > 0.0 { "improvements" } else { "declines" }
        ),
        ChangeCategory::Stable => {
            format!("{tool_name} held steady with minimal changes across all ranking factors.")
        }
        ChangeCategory::NewEntry if improvements.is_empty() => {
            format!("{tool_name} enters the rankings.")
        }
        ChangeCategory::NewEntry => format!(
            "{tool_name} enters the rankings with strong scores in {}.",
            joined_labels(&improvements, ", ")
        ),
        ChangeCategory::Dropped => format!("{tool_name} dropped out of the rankings."),
    }
}
