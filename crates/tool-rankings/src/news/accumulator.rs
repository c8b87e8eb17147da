use crate::scoring::{Factor, FactorScoreSet};

/// Factor-wise sum of an existing delta and a new partial delta.
pub fn accumulate(existing: &FactorScoreSet, partial: &FactorScoreSet) -> FactorScoreSet {
    Factor::ALL
        .into_iter()
        .map(|factor| (factor, existing.get(factor) + partial.get(factor)))
        .collect()
}

/// Inverse of [`accumulate`], used when an applied event is rolled back.
pub fn subtract(existing: &FactorScoreSet, partial: &FactorScoreSet) -> FactorScoreSet {
    Factor::ALL
        .into_iter()
        .map(|factor| (factor, existing.get(factor) - partial.get(factor)))
        .collect()
}
