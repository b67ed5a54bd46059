pub mod credentials;
pub mod database;
pub mod logging;
pub mod uploads;

use clap::{
    builder::styling::{AnsiColor, Effects, Styles},
    Arg, ColorChoice, Command,
};

pub const ARG_PORT: &str = "port";

fn base(name: &'static str, about: &'static str) -> Command {
    let styles = Styles::styled()
        .header(AnsiColor::Yellow.on_default() | Effects::BOLD)
        .usage(AnsiColor::Green.on_default() | Effects::BOLD)
        .literal(AnsiColor::Blue.on_default() | Effects::BOLD)
        .placeholder(AnsiColor::Green.on_default());

    let long_version: &'static str = Box::leak(
        format!("{} - {}", env!("CARGO_PKG_VERSION"), crate::GIT_COMMIT_HASH).into_boxed_str(),
    );

    Command::new(name)
        .about(about)
        .version(env!("CARGO_PKG_VERSION"))
        .long_version(long_version)
        .color(ColorChoice::Auto)
        .styles(styles)
}

/// Arguments of the `social-insecurity` web server.
#[must_use]
pub fn new() -> Command {
    let command = base(
        "social-insecurity",
        "Social Insecurity: registration, login and image uploads",
    )
    .arg(
        Arg::new(ARG_PORT)
            .short('p')
            .long(ARG_PORT)
            .help("Port to listen on")
            .default_value("8080")
            .env("SOCIAL_PORT")
            .value_parser(clap::value_parser!(u16)),
    );

    let command = database::with_args(command);
    let command = credentials::with_args(command);
    let command = credentials::with_login_args(command);
    let command = uploads::with_args(command);
    logging::with_args(command)
}

/// Arguments of the `migrate-passwords` batch job.
#[must_use]
pub fn migrate() -> Command {
    let command = base(
        "migrate-passwords",
        "Hash legacy plaintext passwords in place",
    );

    let command = database::with_args(command);
    let command = credentials::with_args(command);
    logging::with_args(command)
}
