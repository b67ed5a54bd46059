use crate::config::LegacyLogin;
use clap::{Arg, ArgAction, ArgMatches, Command};
use std::time::Duration;

pub const ARG_BCRYPT_COST: &str = "bcrypt-cost";
pub const ARG_HASH_MARKER: &str = "hash-marker";
pub const ARG_LEGACY_PLAINTEXT_LOGIN: &str = "legacy-plaintext-login";
pub const ARG_RATE_LIMIT: &str = "rate-limit";
pub const ARG_RATE_LIMIT_WINDOW: &str = "rate-limit-window";

#[derive(Debug)]
pub struct Options {
    pub bcrypt_cost: u32,
    pub hash_marker: String,
    pub legacy_login: LegacyLogin,
    /// Attempts per window, `None` for commands without login arguments.
    pub rate_limit: Option<(u32, Duration)>,
}

impl Options {
    /// Parse hashing arguments. Login arguments are optional so the same
    /// parser serves commands that do not expose them.
    ///
    /// # Errors
    /// Returns an error if a hashing argument is missing.
    pub fn parse(matches: &ArgMatches) -> anyhow::Result<Self> {
        let bcrypt_cost = matches
            .get_one::<u32>(ARG_BCRYPT_COST)
            .copied()
            .ok_or_else(|| anyhow::anyhow!("missing required argument: --{ARG_BCRYPT_COST}"))?;

        let hash_marker = matches
            .get_one::<String>(ARG_HASH_MARKER)
            .cloned()
            .filter(|marker| !marker.trim().is_empty())
            .ok_or_else(|| anyhow::anyhow!("missing required argument: --{ARG_HASH_MARKER}"))?;

        let legacy_login = match matches.try_get_one::<bool>(ARG_LEGACY_PLAINTEXT_LOGIN) {
            Ok(Some(true)) => LegacyLogin::PlaintextBridge,
            _ => LegacyLogin::Refuse,
        };

        let attempts = matches.try_get_one::<u32>(ARG_RATE_LIMIT).ok().flatten();
        let window = matches
            .try_get_one::<u64>(ARG_RATE_LIMIT_WINDOW)
            .ok()
            .flatten();
        let rate_limit = attempts
            .zip(window)
            .map(|(attempts, secs)| (*attempts, Duration::from_secs(*secs)));

        Ok(Self {
            bcrypt_cost,
            hash_marker,
            legacy_login,
            rate_limit,
        })
    }
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_BCRYPT_COST)
                .long(ARG_BCRYPT_COST)
                .help("bcrypt work factor for new hashes")
                .env("SOCIAL_BCRYPT_COST")
                .default_value("12")
                .value_parser(clap::value_parser!(u32).range(4..=31)),
        )
        .arg(
            Arg::new(ARG_HASH_MARKER)
                .long(ARG_HASH_MARKER)
                .help("Prefix that identifies a hashed credential")
                .env("SOCIAL_HASH_MARKER")
                .default_value("$2b$"),
        )
}

/// Login-only arguments, not offered by `migrate-passwords`.
#[must_use]
pub fn with_login_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_LEGACY_PLAINTEXT_LOGIN)
                .long(ARG_LEGACY_PLAINTEXT_LOGIN)
                .help("Accept logins against unmigrated plaintext credentials")
                .long_help(
                    "Accept logins against unmigrated plaintext credentials by comparing them directly.\n\nTransitional only: run migrate-passwords and drop this flag.",
                )
                .env("SOCIAL_LEGACY_PLAINTEXT_LOGIN")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new(ARG_RATE_LIMIT)
                .long(ARG_RATE_LIMIT)
                .help("Login and registration attempts per client and window, 0 disables")
                .env("SOCIAL_RATE_LIMIT")
                .default_value("1000")
                .value_parser(clap::value_parser!(u32)),
        )
        .arg(
            Arg::new(ARG_RATE_LIMIT_WINDOW)
                .long(ARG_RATE_LIMIT_WINDOW)
                .help("Rate limit window in seconds")
                .env("SOCIAL_RATE_LIMIT_WINDOW")
                .default_value("86400")
                .value_parser(clap::value_parser!(u64).range(1..)),
        )
}
