use crate::cli::actions::{migrate, server, Action};
use anyhow::Result;
use std::process::ExitCode;

/// Execute the provided action.
// Single dispatch point for all CLI actions.
/// # Errors
/// Returns an error if the action fails.
pub async fn execute(action: Action) -> Result<ExitCode> {
    match action {
        Action::Server(args) => server::execute(args).await.map(|()| ExitCode::SUCCESS),
        Action::Migrate(args) => migrate::execute(args).await,
    }
}
