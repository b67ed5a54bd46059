use crate::credentials::{
    CredentialHasher, CredentialMigrator, MigrationReport, PgCredentialStore, RecordOutcome,
};
use anyhow::{Context, Result};
use std::{
    io::{self, Write},
    process::ExitCode,
};
use tracing::debug;

/// Exit code when the run completed but some records could not be migrated.
/// Fatal errors surface as `Err` from `main`, which exits with 1.
pub const EXIT_PARTIAL_FAILURE: u8 = 2;

#[derive(Debug)]
pub struct Args {
    pub dsn: String,
    pub bcrypt_cost: u32,
    pub hash_marker: String,
}

/// Execute the migration action.
/// # Errors
/// Returns an error if the hashing parameters are invalid, the database is
/// unreachable or the records cannot be listed. Per-record failures only
/// change the exit code.
pub async fn execute(args: Args) -> Result<ExitCode> {
    debug!(
        bcrypt_cost = args.bcrypt_cost,
        hash_marker = %args.hash_marker,
        "starting password migration"
    );

    let hasher = CredentialHasher::new(args.bcrypt_cost, &args.hash_marker)
        .context("invalid hashing parameters")?;
    let store = PgCredentialStore::connect(&args.dsn).await?;

    let result = CredentialMigrator::new(&store, &hasher).migrate_all().await;

    crate::cli::telemetry::shutdown_tracer();

    let report = result?;
    write_report(&report, &mut io::stdout().lock(), &mut io::stderr().lock())
        .context("failed to print migration report")?;

    Ok(ExitCode::from(exit_status(&report)))
}

/// Skipped and failed records go to `err`, the summary line to `out`.
fn write_report(
    report: &MigrationReport,
    out: &mut impl Write,
    err: &mut impl Write,
) -> io::Result<()> {
    for (user_id, outcome) in report.outcomes() {
        match outcome {
            RecordOutcome::Skipped(reason) => writeln!(err, "user {user_id}: skipped ({reason})")?,
            RecordOutcome::Failed(reason) => writeln!(err, "user {user_id}: failed ({reason})")?,
            RecordOutcome::Migrated | RecordOutcome::AlreadyHashed => {}
        }
    }

    writeln!(out, "Password migration completed: {report}")
}

fn exit_status(report: &MigrationReport) -> u8 {
    if report.is_success() {
        0
    } else {
        EXIT_PARTIAL_FAILURE
    }
}
