use anyhow::Result;
use social_insecurity::cli;
use std::process::ExitCode;

// Exit 0 when every record is hashed or skipped, 2 when some records failed,
// 1 (via the error) when the store could not be read at all.
#[tokio::main]
async fn main() -> Result<ExitCode> {
    let action = cli::start_migrate()?;

    action.execute().await
}
