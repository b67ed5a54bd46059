use crate::cli::{actions::Action, commands, dispatch, telemetry};
use anyhow::Result;
use clap::ArgMatches;

fn init_telemetry(matches: &ArgMatches) -> Result<()> {
    let verbosity_level = commands::logging::tracing_level(
        matches
            .get_one::<u8>(commands::logging::ARG_VERBOSITY)
            .copied()
            .unwrap_or(0),
    );

    telemetry::init(verbosity_level)
}

/// Entry point of the `social-insecurity` server binary.
///
/// # Errors
///
/// Returns an error if argument parsing, telemetry initialization, or action dispatch fails
pub fn start() -> Result<Action> {
    let matches = commands::new().get_matches();

    init_telemetry(&matches)?;

    dispatch::handler(&matches)
}

/// Entry point of the `migrate-passwords` binary.
///
/// # Errors
///
/// Returns an error if argument parsing, telemetry initialization, or action dispatch fails
pub fn start_migrate() -> Result<Action> {
    let matches = commands::migrate().get_matches();

    init_telemetry(&matches)?;

    dispatch::migrate_handler(&matches)
}
