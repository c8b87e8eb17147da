use std::collections::BTreeMap;
use std::fmt::Write as _;

use serde::Serialize;

use super::analyzer::{ChangeAnalysis, SIGNIFICANT_FACTOR_CHANGE};
use super::movement::{ChangeCategory, MovementDirection};
use crate::ranking::AlgorithmFactor;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportOptions {
    /// Minimum absolute rank change for a tool to count as a major mover.
    pub major_mover_threshold: u32,
    pub max_movers: usize,
}

impl Default for ReportOptions {
    fn default() -> Self {
        Self {
            major_mover_threshold: 3,
            max_movers: 5,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FactorTrend {
    pub improving: usize,
    pub declining: usize,
}

impl FactorTrend {
    pub fn net(&self) -> i64 {
        self.improving as i64 - self.declining as i64
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MajorMovers {
    pub rises: Vec<ChangeAnalysis>,
    pub declines: Vec<ChangeAnalysis>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeReport {
    pub summary: String,
    pub major_movers: MajorMovers,
    pub factor_trends: BTreeMap<AlgorithmFactor, FactorTrend>,
    pub new_entries: Vec<String>,
    pub dropped: Vec<String>,
    pub narrative_summary: String,
}

/// Aggregates per-tool analyses into movers, factor trends and prose.
pub fn build_report(analyses: &[ChangeAnalysis], options: ReportOptions) -> ChangeReport {
    let threshold = i64::from(options.major_mover_threshold);

    let mut rises: Vec<&ChangeAnalysis> = analyses
        .iter()
        .filter(|analysis| analysis.movement.direction == MovementDirection::Up)
        .filter(|analysis| analysis.movement.rank_change.unwrap_or(0) >= threshold)
        .collect();
    rises.sort_by(|a, b| {
        b.movement
            .rank_change
            .cmp(&a.movement.rank_change)
            .then_with(|| a.tool_id.cmp(&b.tool_id))
    });

    let mut declines: Vec<&ChangeAnalysis> = analyses
        .iter()
        .filter(|analysis| analysis.movement.direction == MovementDirection::Down)
        .filter(|analysis| analysis.movement.rank_change.unwrap_or(0) <= -threshold)
        .collect();
    declines.sort_by(|a, b| {
        a.movement
            .rank_change
            .cmp(&b.movement.rank_change)
            .then_with(|| a.tool_id.cmp(&b.tool_id))
    });

    let mut factor_trends: BTreeMap<AlgorithmFactor, FactorTrend> = AlgorithmFactor::ALL
        .into_iter()
        .map(|factor| (factor, FactorTrend::default()))
        .collect();
    // Entrants and exits compare against zero, which would swamp real trends.
    for analysis in analyses.iter().filter(|analysis| {
        !matches!(
            analysis.category,
            ChangeCategory::NewEntry | ChangeCategory::Dropped
        )
    }) {
        for change in &analysis.factor_changes {
            let trend = factor_trends.entry(change.factor).or_default();
            if change.change > SIGNIFICANT_FACTOR_CHANGE {
                trend.improving += 1;
            } else if change.change < -SIGNIFICANT_FACTOR_CHANGE {
                trend.declining += 1;
            }
        }
    }

    let new_entries: Vec<String> = analyses
        .iter()
        .filter(|analysis| analysis.category == ChangeCategory::NewEntry)
        .map(|analysis| analysis.tool_name.clone())
        .collect();
    let dropped: Vec<String> = analyses
        .iter()
        .filter(|analysis| analysis.category == ChangeCategory::Dropped)
        .map(|analysis| analysis.tool_name.clone())
        .collect();

    let summary = format!(
        "{} tools analyzed. {} major rises, {} major declines.",
        analyses.len(),
        rises.len(),
        declines.len()
    );

    let narrative_summary = narrative_summary(
        analyses.len(),
        &rises,
        &declines,
        &factor_trends,
        &new_entries,
        &dropped,
    );

    ChangeReport {
        summary,
        major_movers: MajorMovers {
            rises: rises
                .into_iter()
                .take(options.max_movers)
                .cloned()
                .collect(),
            declines: declines
                .into_iter()
                .take(options.max_movers)
                .cloned()
                .collect(),
        },
        factor_trends,
        new_entries,
        dropped,
        narrative_summary,
    }
}

fn narrative_summary(
    analyzed: usize,
    rises: &[&ChangeAnalysis],
    declines: &[&ChangeAnalysis],
    trends: &BTreeMap<AlgorithmFactor, FactorTrend>,
    new_entries: &[String],
    dropped: &[String],
) -> String {
    if analyzed == 0 {
        return "No ranking changes to report for this period.".to_string();
    }

    let mut parts = Vec::new();
    if rises.is_empty() && declines.is_empty() {
        parts.push("This month's rankings held largely steady across the AI coding tools landscape.".to_string());
    } else {
        parts.push("This month's rankings show significant movement across the AI coding tools landscape.".to_string());
    }

    if let Some(leader) = rises.first() {
        parts.push(format!(
            "{} led the gains, climbing {} positions.",
            leader.tool_name,
            leader.movement.magnitude.unwrap_or(0)
        ));
    }

    if let Some(faller) = declines.first() {
        parts.push(format!(
            "On the other side, {} experienced the largest drop, falling {} positions.",
            faller.tool_name,
            faller.movement.magnitude.unwrap_or(0)
        ));
    }

    let mut dominant: Option<(AlgorithmFactor, FactorTrend)> = None;
    for (factor, trend) in trends {
        let stronger = dominant.map_or(true, |(_, best)| trend.net().abs() > best.net().abs());
        if trend.net() != 0 && stronger {
            dominant = Some((*factor, *trend));
        }
    }
    match dominant {
        Some((factor, trend)) if trend.net() > 0 => parts.push(format!(
            "{} emerged as a key differentiator this month, with {} tool{} showing improvement.",
            factor.title(),
            trend.improving,
            if trend.improving == 1 { "" } else { "s" }
        )),
        Some((factor, trend)) => parts.push(format!(
            "{} softened across the field, with {} tool{} declining.",
            factor.title(),
            trend.declining,
            if trend.declining == 1 { "" } else { "s" }
        )),
        None => {}
    }

    if !new_entries.is_empty() {
        let count = new_entries.len();
        let names: Vec<&str> = new_entries.iter().take(2).map(String::as_str).collect();
        parts.push(format!(
            "{count} new tool{} entered the rankings, including {}.",
            if count == 1 { "" } else { "s" },
            names.join(" and ")
        ));
    }

    if !dropped.is_empty() {
        let count = dropped.len();
        parts.push(format!(
            "{count} tool{} dropped out of the rankings.",
            if count == 1 { "" } else { "s" }
        ));
    }

    parts.join(" ")
}

impl ChangeReport {
    pub fn to_markdown(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "# Ranking Changes\n");
        let _ = writeln!(out, "{}\n", self.summary);

        let _ = writeln!(out, "## Major Rises\n");
        write_movers(&mut out, &self.major_movers.rises);

        let _ = writeln!(out, "## Major Declines\n");
        write_movers(&mut out, &self.major_movers.declines);

        if !self.new_entries.is_empty() {
            let _ = writeln!(out, "## New Entries\n");
            for name in &self.new_entries {
                let _ = writeln!(out, "- {name}");
            }
            out.push('\n');
        }

        if !self.dropped.is_empty() {
            let _ = writeln!(out, "## Dropped\n");
            for name in &self.dropped {
                let _ = writeln!(out, "- {name}");
            }
            out.push('\n');
        }

        let _ = writeln!(out, "## Factor Trends\n");
        let _ = writeln!(out, "| Factor | Improving | Declining |");
        let _ = writeln!(out, "| --- | ---: | ---: |");
        for (factor, trend) in &self.factor_trends {
            let _ = writeln!(
                out,
                "| {} | {} | {} |",
                factor.title(),
                trend.improving,
                trend.declining
            );
        }

        let _ = writeln!(out, "\n## Summary\n");
        let _ = writeln!(out, "{}", self.narrative_summary);
        out
    }
}

fn write_movers(out: &mut String, movers: &[ChangeAnalysis]) {
    if movers.is_empty() {
        let _ = writeln!(out, "_None this period._\n");
        return;
    }
    for mover in movers {
        let _ = writeln!(
            out,
            "- **{}** ({:+}): {}",
            mover.tool_name,
            mover.movement.rank_change.unwrap_or(0),
            mover.primary_reason
        );
    }
    out.push('\n');
}
