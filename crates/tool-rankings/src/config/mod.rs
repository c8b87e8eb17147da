use std::env;
use std::fmt;

use crate::changes::ReportOptions;
use crate::news::DEFAULT_IMPORTANCE;
use crate::ranking::{WeightError, WeightTable};

/// Distinguishes runtime behavior for different stages of a ranking run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Test,
    Production,
}

impl AppEnvironment {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Self::Production,
            "test" | "ci" => Self::Test,
            _ => Self::Development,
        }
    }
}

/// Top-level configuration for the ranking core and its harness.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub ranking: RankingConfig,
    pub telemetry: TelemetryConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("RANKINGS_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let algorithm_version =
            env::var("RANKINGS_ALGORITHM_VERSION").unwrap_or_else(|_| "v6.0".to_string());
        WeightTable::for_version(&algorithm_version)
            .map_err(|source| ConfigError::UnknownAlgorithm { source })?;

        let major_mover_threshold = env::var("RANKINGS_MAJOR_MOVER_THRESHOLD")
            .unwrap_or_else(|_| "3".to_string())
            .trim()
            .parse::<u32>()
            .map_err(|_| ConfigError::InvalidThreshold)?;

        let max_movers = env::var("RANKINGS_MAX_MOVERS")
            .unwrap_or_else(|_| "5".to_string())
            .trim()
            .parse::<usize>()
            .map_err(|_| ConfigError::InvalidMaxMovers)?;

        let default_importance = match env::var("RANKINGS_DEFAULT_IMPORTANCE") {
            Ok(raw) => raw
                .trim()
                .parse::<f64>()
                .ok()
                .filter(|value| (0.0..=10.0).contains(value))
                .ok_or(ConfigError::InvalidImportance)?,
            Err(_) => DEFAULT_IMPORTANCE,
        };

        let log_level = env::var("RANKINGS_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        Ok(Self {
            environment,
            ranking: RankingConfig {
                algorithm_version,
                major_mover_threshold,
                max_movers,
                default_importance,
            },
            telemetry: TelemetryConfig { log_level },
        })
    }
}

/// Knobs for scoring, impact attribution and change reporting.
#[derive(Debug, Clone, PartialEq)]
pub struct RankingConfig {
    pub algorithm_version: String,
    pub major_mover_threshold: u32,
    pub max_movers: usize,
    pub default_importance: f64,
}

impl RankingConfig {
    pub fn weight_table(&self) -> Result<WeightTable, ConfigError> {
        WeightTable::for_version(&self.algorithm_version)
            .map_err(|source| ConfigError::UnknownAlgorithm { source })
    }

    pub fn report_options(&self) -> ReportOptions {
        ReportOptions {
            major_mover_threshold: self.major_mover_threshold,
            max_movers: self.max_movers,
        }
    }
}

impl Default for RankingConfig {
    fn default() -> Self {
        Self {
            algorithm_version: "v6.0".to_string(),
            major_mover_threshold: 3,
            max_movers: 5,
            default_importance: DEFAULT_IMPORTANCE,
        }
    }
}

/// Tracing controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

#[derive(Debug)]
pub enum ConfigError {
    UnknownAlgorithm { source: WeightError },
    InvalidThreshold,
    InvalidMaxMovers,
    InvalidImportance,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::UnknownAlgorithm { source } => {
                write!(f, "RANKINGS_ALGORITHM_VERSION is not usable: {source}")
            }
            ConfigError::InvalidThreshold => {
                write!(f, "RANKINGS_MAJOR_MOVER_THRESHOLD must be a valid u32")
            }
            ConfigError::InvalidMaxMovers => {
                write!(f, "RANKINGS_MAX_MOVERS must be a valid non-negative integer")
            }
            ConfigError::InvalidImportance => {
                write!(f, "RANKINGS_DEFAULT_IMPORTANCE must be a number between 0 and 10")
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::UnknownAlgorithm { source } => Some(source),
            ConfigError::InvalidThreshold
            | ConfigError::InvalidMaxMovers
            | ConfigError::InvalidImportance => None,
        }
    }
}
