//! News-driven score deltas: impact events, keyword attribution, accumulation,
//! the processed-events ledger, and the service tying them to the score store.

mod accumulator;
mod attribution;
mod event;
mod ledger;
mod service;

pub use accumulator::{accumulate, subtract};
pub use attribution::{FactorAttributor, KeywordAttributor, DEFAULT_IMPORTANCE};
pub use event::{ImpactEvent, ImpactKey};
pub use ledger::{ImpactLedger, InMemoryImpactLedger, LedgerEntry, LedgerError};
pub use service::{
    AppliedImpact, ApplyOutcome, EventFailure, ImpactBatchSummary, ImpactService,
    ImpactServiceError, RollbackSummary, ScoreChangeStats,
};
