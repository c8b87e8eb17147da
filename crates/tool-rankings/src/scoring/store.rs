use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use tracing::info;

use super::factors::FactorScoreSet;
use super::record::{BaselineInit, ToolScoringRecord};
use crate::domain::ToolId;

/// Storage seam for tool scoring records (the relational store lives outside this crate).
pub trait ToolScoreStore: Send + Sync {
    fn fetch(&self, tool_id: &ToolId) -> Result<Option<ToolScoringRecord>, StoreError>;
    fn upsert(&self, record: ToolScoringRecord) -> Result<(), StoreError>;
    fn all(&self) -> Result<Vec<ToolScoringRecord>, StoreError>;
}

/// Error enumeration for score store failures.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("score store unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Default, Clone)]
pub struct InMemoryToolScoreStore {
    records: Arc<Mutex<BTreeMap<ToolId, ToolScoringRecord>>>,
}

impl InMemoryToolScoreStore {
    pub fn from_records(records: impl IntoIterator<Item = ToolScoringRecord>) -> Self {
        let records = records
            .into_iter()
            .map(|record| (record.tool_id().clone(), record))
            .collect();
        Self {
            records: Arc::new(Mutex::new(records)),
        }
    }

    fn guard(&self) -> Result<MutexGuard<'_, BTreeMap<ToolId, ToolScoringRecord>>, StoreError> {
        self.records
            .lock()
            .map_err(|_| StoreError::Unavailable("score store lock poisoned".to_string()))
    }
}

impl ToolScoreStore for InMemoryToolScoreStore {
    fn fetch(&self, tool_id: &ToolId) -> Result<Option<ToolScoringRecord>, StoreError> {
        Ok(self.guard()?.get(tool_id).cloned())
    }

    fn upsert(&self, record: ToolScoringRecord) -> Result<(), StoreError> {
        self.guard()?.insert(record.tool_id().clone(), record);
        Ok(())
    }

    fn all(&self) -> Result<Vec<ToolScoringRecord>, StoreError> {
        Ok(self.guard()?.values().cloned().collect())
    }
}

/// Recomputes and persists the current score of every stored record.
pub fn recalculate_all<S: ToolScoreStore + ?Sized>(
    store: &S,
    at: DateTime<Utc>,
) -> Result<usize, StoreError> {
    let records = store.all()?;
    let count = records.len();
    for mut record in records {
        record.refresh(at);
        store.upsert(record)?;
    }

    info!(count, "recalculated tool scores");
    Ok(count)
}

/// One-time migration: seeds baselines from existing scores, leaving initialized records alone.
pub fn initialize_baselines<S: ToolScoreStore + ?Sized>(
    store: &S,
    existing: impl IntoIterator<Item = (ToolId, FactorScoreSet)>,
    at: DateTime<Utc>,
) -> Result<usize, StoreError> {
    let mut initialized = 0;
    for (tool_id, scores) in existing {
        let outcome = match store.fetch(&tool_id)? {
            Some(mut record) => {
                let outcome = record.initialize_baseline(scores, at);
                if outcome == BaselineInit::Initialized {
                    store.upsert(record)?;
                }
                outcome
            }
            None => {
                store.upsert(ToolScoringRecord::from_existing(tool_id, scores, at))?;
                BaselineInit::Initialized
            }
        };

        if outcome == BaselineInit::Initialized {
            initialized += 1;
        }
    }

    info!(initialized, "initialized baseline scores from existing data");
    Ok(initialized)
}
