use crate::{
    api,
    config::SecurityConfig,
    credentials::PgCredentialStore,
    uploads::UploadStorage,
};
use anyhow::Result;
use std::{path::PathBuf, sync::Arc};
use tracing::debug;

#[derive(Debug)]
pub struct Args {
    pub port: u16,
    pub dsn: String,
    pub upload_dir: PathBuf,
    pub config: SecurityConfig,
}

/// Execute the server action.
/// # Errors
/// Returns an error if the database is unreachable or the server fails to start.
pub async fn execute(args: Args) -> Result<()> {
    debug!(
        port = args.port,
        upload_dir = %args.upload_dir.display(),
        config = ?args.config,
        "starting server"
    );

    let store = PgCredentialStore::connect(&args.dsn).await?;

    let services = api::Services::new(
        Arc::new(store),
        Arc::new(args.config),
        UploadStorage::new(args.upload_dir),
    )?;

    let result = api::serve(args.port, services).await;

    crate::cli::telemetry::shutdown_tracer();

    result
}
