use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::event::ImpactKey;
use crate::domain::{SourceId, ToolId};
use crate::scoring::FactorScoreSet;

/// Durable record of one applied (source, tool) impact, including the exact delta it added.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerEntry {
    pub source_id: SourceId,
    pub tool_id: ToolId,
    pub delta: FactorScoreSet,
    pub previous_overall: f64,
    pub new_overall: f64,
    pub reason: String,
    pub applied_at: DateTime<Utc>,
}

impl LedgerEntry {
    pub fn key(&self) -> ImpactKey {
        ImpactKey {
            source_id: self.source_id.clone(),
            tool_id: self.tool_id.clone(),
        }
    }
}

/// Processed-events ledger keyed by (source, tool).
pub trait ImpactLedger: Send + Sync {
    fn contains(&self, key: &ImpactKey) -> Result<bool, LedgerError>;
    fn record(&self, entry: LedgerEntry) -> Result<(), LedgerError>;
    fn entries(&self) -> Result<Vec<LedgerEntry>, LedgerError>;
    fn entries_for_source(&self, source_id: &SourceId) -> Result<Vec<LedgerEntry>, LedgerError>;
    fn remove(&self, key: &ImpactKey) -> Result<Option<LedgerEntry>, LedgerError>;
}

#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("impact {0} already recorded")]
    Duplicate(ImpactKey),
    #[error("impact ledger unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Default, Clone)]
pub struct InMemoryImpactLedger {
    entries: Arc<Mutex<BTreeMap<ImpactKey, LedgerEntry>>>,
}

impl InMemoryImpactLedger {
    pub fn from_entries(entries: impl IntoIterator<Item = LedgerEntry>) -> Self {
        let entries = entries
            .into_iter()
            .map(|entry| (entry.key(), entry))
            .collect();
        Self {
            entries: Arc::new(Mutex::new(entries)),
        }
    }

    fn guard(&self) -> Result<MutexGuard<'_, BTreeMap<ImpactKey, LedgerEntry>>, LedgerError> {
        self.entries
            .lock()
            .map_err(|_| LedgerError::Unavailable("impact ledger lock poisoned".to_string()))
    }
}

impl ImpactLedger for InMemoryImpactLedger {
    fn contains(&self, key: &ImpactKey) -> Result<bool, LedgerError> {
        Ok(self.guard()?.contains_key(key))
    }

    fn record(&self, entry: LedgerEntry) -> Result<(), LedgerError> {
        let mut guard = self.guard()?;
        let key = entry.key();
        if guard.contains_key(&key) {
            return Err(LedgerError::Duplicate(key));
        }
        guard.insert(key, entry);
        Ok(())
    }

    fn entries(&self) -> Result<Vec<LedgerEntry>, LedgerError> {
        Ok(self.guard()?.values().cloned().collect())
    }

    fn entries_for_source(&self, source_id: &SourceId) -> Result<Vec<LedgerEntry>, LedgerError> {
        Ok(self
            .guard()?
            .values()
            .filter(|entry| &entry.source_id == source_id)
            .cloned()
            .collect())
    }

    fn remove(&self, key: &ImpactKey) -> Result<Option<LedgerEntry>, LedgerError> {
        Ok(self.guard()?.remove(key))
    }
}
