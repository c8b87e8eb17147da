//! Movement classification between ranking periods and the change report built from it.

mod analyzer;
mod movement;
mod report;

pub use analyzer::{entry_factors, ChangeAnalysis, ChangeAnalyzer, ComparisonError, FactorChange};
pub use movement::{ChangeCategory, Movement, MovementDirection};
pub use report::{build_report, ChangeReport, FactorTrend, MajorMovers, ReportOptions};
