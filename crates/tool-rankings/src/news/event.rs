use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::{SourceId, ToolId};

/// One observation tying a tool to a source document, e.g. an article mention.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImpactEvent {
    pub tool_id: ToolId,
    pub source_id: SourceId,
    /// Signed, roughly `[-1, 1]`.
    pub sentiment: f64,
    /// Roughly `[0, 1]`.
    pub relevance: f64,
    /// Free text used for keyword-based factor attribution.
    #[serde(default)]
    pub context: String,
    /// Importance of the source document on a `0..=10` scale.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub importance: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_at: Option<DateTime<Utc>>,
}

impl ImpactEvent {
    pub fn key(&self) -> ImpactKey {
        ImpactKey {
            source_id: self.source_id.clone(),
            tool_id: self.tool_id.clone(),
        }
    }

    pub fn importance_or(&self, default: f64) -> f64 {
        self.importance.unwrap_or(default)
    }

    /// Rejects events that cannot be attributed without producing non-finite deltas.
    pub fn validate(&self) -> Result<(), String> {
        if self.tool_id.is_blank() {
            return Err("event is missing a tool id".to_string());
        }
        if self.source_id.is_blank() {
            return Err("event is missing a source id".to_string());
        }
        if !self.sentiment.is_finite() {
            return Err(format!("sentiment {} is not finite", self.sentiment));
        }
        if !self.relevance.is_finite() {
            return Err(format!("relevance {} is not finite", self.relevance));
        }
        if let Some(importance) = self.importance {
            if !importance.is_finite() {
                return Err(format!("importance {importance} is not finite"));
            }
        }
        Ok(())
    }
}

/// Idempotency key of an applied event: one source document for one tool.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImpactKey {
    pub source_id: SourceId,
    pub tool_id: ToolId,
}

impl fmt::Display for ImpactKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.source_id, self.tool_id)
    }
}
