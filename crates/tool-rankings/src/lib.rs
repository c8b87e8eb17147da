//! Scoring and ranking core for AI coding tools.
//!
//! Tools carry a curated baseline plus an accumulated, news-driven delta
//! ([`scoring`], [`news`]). The [`ranking`] engine turns raw metrics into
//! versioned factor scores and ordered periods, and [`changes`] explains
//! how one period moved relative to the last.

pub mod changes;
pub mod config;
pub mod domain;
pub mod error;
pub mod news;
pub mod ranking;
pub mod scoring;
pub mod telemetry;

pub use domain::{SourceId, ToolId};
pub use error::AppError;
