use clap::{Arg, ArgMatches, Command};
use std::path::PathBuf;

pub const ARG_UPLOAD_DIR: &str = "upload-dir";
pub const ARG_UPLOAD_MAX_BYTES: &str = "upload-max-bytes";
pub const ARG_UPLOAD_EXTENSIONS: &str = "upload-extensions";
pub const ARG_UPLOAD_MIME_TYPES: &str = "upload-mime-types";
pub const ARG_UPLOAD_SNIFF_BYTES: &str = "upload-sniff-bytes";

#[derive(Debug)]
pub struct Options {
    pub dir: PathBuf,
    pub max_bytes: u64,
    pub extensions: Vec<String>,
    pub mime_types: Vec<String>,
    pub sniff_bytes: usize,
}

impl Options {
    /// # Errors
    /// Returns an error if an allow-list is empty.
    pub fn parse(matches: &ArgMatches) -> anyhow::Result<Self> {
        let list = |id: &str| -> Vec<String> {
            matches
                .get_many::<String>(id)
                .map(|values| {
                    values
                        .map(|v| v.trim().to_string())
                        .filter(|v| !v.is_empty())
                        .collect()
                })
                .unwrap_or_default()
        };

        let extensions = list(ARG_UPLOAD_EXTENSIONS);
        if extensions.is_empty() {
            anyhow::bail!("--{ARG_UPLOAD_EXTENSIONS} must list at least one extension");
        }

        let mime_types = list(ARG_UPLOAD_MIME_TYPES);
        if mime_types.is_empty() {
            anyhow::bail!("--{ARG_UPLOAD_MIME_TYPES} must list at least one MIME type");
        }

        Ok(Self {
            dir: matches
                .get_one::<String>(ARG_UPLOAD_DIR)
                .map_or_else(|| PathBuf::from("static/uploads"), PathBuf::from),
            max_bytes: matches
                .get_one::<u64>(ARG_UPLOAD_MAX_BYTES)
                .copied()
                .unwrap_or(5 * 1024 * 1024),
            extensions,
            mime_types,
            sniff_bytes: matches
                .get_one::<usize>(ARG_UPLOAD_SNIFF_BYTES)
                .copied()
                .unwrap_or(1024),
        })
    }
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_UPLOAD_DIR)
                .long(ARG_UPLOAD_DIR)
                .help("Directory accepted images are written to")
                .env("SOCIAL_UPLOAD_DIR")
                .default_value("static/uploads"),
        )
        .arg(
            Arg::new(ARG_UPLOAD_MAX_BYTES)
                .long(ARG_UPLOAD_MAX_BYTES)
                .help("Largest accepted upload in bytes")
                .env("SOCIAL_UPLOAD_MAX_BYTES")
                .default_value("5242880")
                .value_parser(clap::value_parser!(u64).range(1..)),
        )
        .arg(
            Arg::new(ARG_UPLOAD_EXTENSIONS)
                .long(ARG_UPLOAD_EXTENSIONS)
                .help("Comma separated file extensions accepted for upload")
                .env("SOCIAL_UPLOAD_EXTENSIONS")
                .value_delimiter(',')
                .default_values(["png", "jpg", "jpeg", "gif"]),
        )
        .arg(
            Arg::new(ARG_UPLOAD_MIME_TYPES)
                .long(ARG_UPLOAD_MIME_TYPES)
                .help("Comma separated content types accepted after sniffing")
                .env("SOCIAL_UPLOAD_MIME_TYPES")
                .value_delimiter(',')
                .default_values(["image/png", "image/jpeg", "image/gif"]),
        )
        .arg(
            Arg::new(ARG_UPLOAD_SNIFF_BYTES)
                .long(ARG_UPLOAD_SNIFF_BYTES)
                .help("Leading bytes read to detect the content type")
                .env("SOCIAL_UPLOAD_SNIFF_BYTES")
                .default_value("1024")
                .value_parser(clap::value_parser!(usize)),
        )
}
