mod cli;
pub mod commands;
pub mod infra;

use tool_rankings::AppError;

pub fn run() -> Result<(), AppError> {
    cli::run()
}
