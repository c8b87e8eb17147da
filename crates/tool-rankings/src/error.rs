use crate::changes::ComparisonError;
use crate::config::ConfigError;
use crate::news::{ImpactServiceError, LedgerError};
use crate::ranking::{RankingError, WeightError};
use crate::scoring::StoreError;
use crate::telemetry::TelemetryError;
use std::fmt;

/// Application-level error carried up to the command-line harness.
#[derive(Debug)]
pub enum AppError {
    Config(ConfigError),
    Telemetry(TelemetryError),
    Io(std::io::Error),
    Json(serde_json::Error),
    Csv(csv::Error),
    Store(StoreError),
    Impact(ImpactServiceError),
    Ranking(RankingError),
    Weights(WeightError),
    Comparison(ComparisonError),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Config(err) => write!(f, "configuration error: {}", err),
            AppError::Telemetry(err) => write!(f, "telemetry error: {}", err),
            AppError::Io(err) => write!(f, "io error: {}", err),
            AppError::Json(err) => write!(f, "json error: {}", err),
            AppError::Csv(err) => write!(f, "csv error: {}", err),
            AppError::Store(err) => write!(f, "score store error: {}", err),
            AppError::Impact(err) => write!(f, "impact error: {}", err),
            AppError::Ranking(err) => write!(f, "ranking error: {}", err),
            AppError::Weights(err) => write!(f, "weight table error: {}", err),
            AppError::Comparison(err) => write!(f, "comparison error: {}", err),
        }
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AppError::Config(err) => Some(err),
            AppError::Telemetry(err) => Some(err),
            AppError::Io(err) => Some(err),
            AppError::Json(err) => Some(err),
            AppError::Csv(err) => Some(err),
            AppError::Store(err) => Some(err),
            AppError::Impact(err) => Some(err),
            AppError::Ranking(err) => Some(err),
            AppError::Weights(err) => Some(err),
            AppError::Comparison(err) => Some(err),
        }
    }
}

impl From<ConfigError> for AppError {
    fn from(value: ConfigError) -> Self {
        Self::Config(value)
    }
}

impl From<TelemetryError> for AppError {
    fn from(value: TelemetryError) -> Self {
        Self::Telemetry(value)
    }
}

impl From<std::io::Error> for AppError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<serde_json::Error> for AppError {
    fn from(value: serde_json::Error) -> Self {
        Self::Json(value)
    }
}

impl From<csv::Error> for AppError {
    fn from(value: csv::Error) -> Self {
        Self::Csv(value)
    }
}

impl From<StoreError> for AppError {
    fn from(value: StoreError) -> Self {
        Self::Store(value)
    }
}

impl From<ImpactServiceError> for AppError {
    fn from(value: ImpactServiceError) -> Self {
        Self::Impact(value)
    }
}

impl From<LedgerError> for AppError {
    fn from(value: LedgerError) -> Self {
        Self::Impact(ImpactServiceError::Ledger(value))
    }
}

impl From<RankingError> for AppError {
    fn from(value: RankingError) -> Self {
        Self::Ranking(value)
    }
}

impl From<WeightError> for AppError {
    fn from(value: WeightError) -> Self {
        Self::Weights(value)
    }
}

impl From<ComparisonError> for AppError {
    fn from(value: ComparisonError) -> Self {
        Self::Comparison(value)
    }
}
