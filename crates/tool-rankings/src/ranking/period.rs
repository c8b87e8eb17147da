use std::collections::BTreeSet;
use std::io::Write;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::engine::{AlgorithmScores, ToolScore};
use crate::changes::{ChangeAnalysis, Movement};
use crate::domain::ToolId;
use crate::scoring::{finite_or_zero, Factor, FactorScoreSet, ToolScoringRecord};

/// Input to [`rank_all`]: one tool with its overall score on the algorithm scale.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredTool {
    pub tool_id: ToolId,
    pub tool_name: String,
    pub score: f64,
    pub factor_scores: FactorScoreSet,
    pub algorithm_scores: Option<AlgorithmScores>,
}

impl From<&ToolScore> for ScoredTool {
    fn from(score: &ToolScore) -> Self {
        Self {
            tool_id: score.tool_id.clone(),
            tool_name: score.tool_name.clone(),
            score: score.overall_score,
            factor_scores: score.factor_set(),
            algorithm_scores: Some(score.factor_scores.clone()),
        }
    }
}

impl ScoredTool {
    /// Ranks a stored record by its current score, rescaled from 0-100 to 0-10.
    pub fn from_record(record: &ToolScoringRecord, tool_name: impl Into<String>) -> Self {
        let factor_scores = record
            .current()
            .iter()
            .map(|(factor, value)| (factor, value / 10.0))
            .collect::<FactorScoreSet>();
        Self {
            tool_id: record.tool_id().clone(),
            tool_name: tool_name.into(),
            score: factor_scores.get(Factor::OverallScore),
            factor_scores,
            algorithm_scores: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PeriodStatus {
    #[default]
    Preview,
    Committed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RankingEntry {
    pub rank: u32,
    pub tool_id: ToolId,
    pub tool_name: String,
    pub score: f64,
    pub factor_scores: FactorScoreSet,
    /// Full algorithm breakdown, when the entry was scored from metrics.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub algorithm_scores: Option<AlgorithmScores>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub movement: Option<Movement>,
}

/// An ordered snapshot of every ranked tool at one point in time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RankingPeriod {
    pub period: String,
    pub algorithm_version: String,
    pub generated_at: DateTime<Utc>,
    #[serde(default)]
    pub status: PeriodStatus,
    pub entries: Vec<RankingEntry>,
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum RankingError {
    #[error("tool {0} appears more than once in the ranking input")]
    DuplicateTool(ToolId),
    #[error("ranks are not contiguous: expected {expected}, found {found}")]
    NonContiguousRanks { expected: u32, found: u32 },
    #[error("period {0} is committed and cannot be modified")]
    Committed(String),
}

#[derive(Debug, Serialize)]
struct CsvRow<'a> {
    rank: u32,
    tool_id: &'a str,
    tool_name: &'a str,
    score: f64,
    movement: &'a str,
    change: Option<i64>,
}

/// Orders tools by score, highest first, and assigns dense ranks from 1.
///
/// Ties go to the lower tool id. Any defect that would leave ranks broken
/// fails the whole call instead of producing a partial period.
pub fn rank_all(
    tools: impl IntoIterator<Item = ScoredTool>,
    period: impl Into<String>,
    algorithm_version: impl Into<String>,
    generated_at: DateTime<Utc>,
) -> Result<RankingPeriod, RankingError> {
    let mut seen = BTreeSet::new();
    let mut tools: Vec<ScoredTool> = tools
        .into_iter()
        .map(|mut tool| {
            // `+ 0.0` folds -0.0 into 0.0 so zero scores still tie on tool id.
            tool.score = finite_or_zero(tool.score, tool.tool_id.as_str()) + 0.0;
            tool
        })
        .collect();

    for tool in &tools {
        if !seen.insert(tool.tool_id.clone()) {
            return Err(RankingError::DuplicateTool(tool.tool_id.clone()));
        }
    }

    tools.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then_with(|| a.tool_id.cmp(&b.tool_id))
    });

    let entries = tools
        .into_iter()
        .zip(1u32..)
        .map(|(tool, rank)| RankingEntry {
            rank,
            tool_id: tool.tool_id,
            tool_name: tool.tool_name,
            score: tool.score,
            factor_scores: tool.factor_scores,
            algorithm_scores: tool.algorithm_scores,
            movement: None,
        })
        .collect();

    let period = RankingPeriod {
        period: period.into(),
        algorithm_version: algorithm_version.into(),
        generated_at,
        status: PeriodStatus::Preview,
        entries,
    };
    period.verify_ranks()?;
    Ok(period)
}

impl RankingPeriod {
    pub fn is_preview(&self) -> bool {
        self.status == PeriodStatus::Preview
    }

    /// Finalizes the period. Committed periods reject further changes.
    pub fn commit(mut self) -> Self {
        self.status = PeriodStatus::Committed;
        self
    }

    pub fn entry_for(&self, tool_id: &ToolId) -> Option<&RankingEntry> {
        self.entries.iter().find(|entry| &entry.tool_id == tool_id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Checks that sorted ranks are exactly `1..=N`.
    pub fn verify_ranks(&self) -> Result<(), RankingError> {
        let mut ranks: Vec<u32> = self.entries.iter().map(|entry| entry.rank).collect();
        ranks.sort_unstable();
        for (expected, found) in (1u32..).zip(ranks) {
            if expected != found {
                return Err(RankingError::NonContiguousRanks { expected, found });
            }
        }
        Ok(())
    }

    /// Annotates entries with movement from a comparison. Only previews can be annotated.
    pub fn apply_movements(&mut self, analyses: &[ChangeAnalysis]) -> Result<(), RankingError> {
        if !self.is_preview() {
            return Err(RankingError::Committed(self.period.clone()));
        }

        for entry in &mut self.entries {
            entry.movement = analyses
                .iter()
                .find(|analysis| analysis.tool_id == entry.tool_id)
                .map(|analysis| analysis.movement.clone());
        }
        debug!(period = %self.period, "applied movements to preview");
        Ok(())
    }

    pub fn write_csv<W: Write>(&self, writer: W) -> Result<(), csv::Error> {
        let mut csv_writer = csv::Writer::from_writer(writer);
        for entry in &self.entries {
            let movement = entry.movement.as_ref();
            csv_writer.serialize(CsvRow {
                rank: entry.rank,
                tool_id: entry.tool_id.as_str(),
                tool_name: &entry.tool_name,
                score: entry.score,
                movement: movement.map_or("", |movement| movement.direction.as_str()),
                change: movement.and_then(|movement| movement.rank_change),
            })?;
        }
        csv_writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn generated_at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 8, 1, 0, 0, 0)
            .single()
            .expect("valid timestamp")
    }

    fn tool(id: &str, score: f64) -> ScoredTool {
        ScoredTool {
            tool_id: ToolId::from(id),
            tool_name: id.to_uppercase(),
            score,
            factor_scores: FactorScoreSet::new().with(Factor::OverallScore, score),
            algorithm_scores: None,
        }
    }

    #[test]
    fn ties_break_by_tool_id_and_ranks_are_dense() {
        let period = rank_all(
            [tool("zed", 7.0), tool("aider", 7.0), tool("cursor", 8.5), tool("cline", 2.0)],
            "2025-08",
            "v6.0",
            generated_at(),
        )
        .expect("ranks");

        let order: Vec<(&str, u32)> = period
            .entries
            .iter()
            .map(|entry| (entry.tool_id.as_str(), entry.rank))
            .collect();
        assert_eq!(
            order,
            vec![("cursor", 1), ("aider", 2), ("zed", 3), ("cline", 4)]
        );
        assert!(period.is_preview());
    }

    #[test]
    fn non_finite_scores_sink_to_zero_instead_of_corrupting_order() {
        let period = rank_all(
            [tool("nan", f64::NAN), tool("ok", 1.0)],
            "2025-08",
            "v6.0",
            generated_at(),
        )
        .expect("ranks");

        assert_eq!(period.entries[0].tool_id.as_str(), "ok");
        assert_eq!(period.entries[1].score, 0.0);
    }

    #[test]
    fn negative_zero_ties_with_zero() {
        let period = rank_all(
            [tool("b", 0.0), tool("a", -0.0)],
            "2025-08",
            "v6.0",
            generated_at(),
        )
        .expect("ranks");

        let order: Vec<&str> = period
            .entries
            .iter()
            .map(|entry| entry.tool_id.as_str())
            .collect();
        assert_eq!(order, vec!["a", "b"]);
        assert!(period.entries[0].score.is_sign_positive());
    }

    #[test]
    fn duplicate_tools_fail_the_whole_ranking() {
        let result = rank_all(
            [tool("cursor", 8.0), tool("cursor", 7.0)],
            "2025-08",
            "v6.0",
            generated_at(),
        );
        assert_eq!(result, Err(RankingError::DuplicateTool(ToolId::from("cursor"))));
    }

    #[test]
    fn gaps_in_ranks_are_detected() {
        let mut period =
            rank_all([tool("a", 2.0), tool("b", 1.0)], "2025-08", "v6.0", generated_at())
                .expect("ranks");
        period.entries[1].rank = 3;
        assert_eq!(
            period.verify_ranks(),
            Err(RankingError::NonContiguousRanks {
                expected: 2,
                found: 3
            })
        );
    }

    #[test]
    fn committed_periods_reject_movement_updates() {
        let mut period = rank_all([tool("a", 2.0)], "2025-08", "v6.0", generated_at())
            .expect("ranks")
            .commit();
        assert_eq!(
            period.apply_movements(&[]),
            Err(RankingError::Committed("2025-08".to_string()))
        );
    }

    #[test]
    fn records_rank_on_the_algorithm_scale() {
        let record = ToolScoringRecord::new(
            ToolId::from("cursor"),
            FactorScoreSet::new()
                .with(Factor::OverallScore, 82.0)
                .with(Factor::MarketTraction, 90.0),
        );
        let scored = ScoredTool::from_record(&record, "Cursor");
        assert!((scored.score - 8.2).abs() < 1e-12);
        assert!((scored.factor_scores.get(Factor::MarketTraction) - 9.0).abs() < 1e-12);
    }

    #[test]
    fn csv_export_lists_every_entry() {
        let period = rank_all(
            [tool("cursor", 8.0), tool("aider", 6.0)],
            "2025-08",
            "v6.0",
            generated_at(),
        )
        .expect("ranks");

        let mut buffer = Vec::new();
        period.write_csv(&mut buffer).expect("csv export");
        let text = String::from_utf8(buffer).expect("utf8");

        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "rank,tool_id,tool_name,score,movement,change");
        assert_eq!(lines[1], "1,cursor,CURSOR,8.0,,");
        assert_eq!(lines.len(), 3);
    }
}
