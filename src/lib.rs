//! # Social Insecurity (credential & upload core)
//!
//! `social-insecurity` holds the security-relevant core of the Social Insecurity
//! network: everything that touches stored passwords and user supplied files.
//!
//! ## Credentials
//!
//! Passwords are stored as bcrypt strings tagged with a format marker (`$2b$`).
//! Rows written before hashing was enforced may still hold plaintext; the
//! `migrate-passwords` binary rewrites them in place exactly once and leaves
//! already hashed rows byte-for-byte untouched.
//!
//! Login goes through [`credentials::Authenticator`], which answers only
//! accept/reject. Unknown users cost the same bcrypt work as known ones.
//!
//! ## Uploads
//!
//! Every upload passes [`uploads::UploadGate`] before it reaches disk: an
//! extension allow-list, a size ceiling and a content sniff of the first bytes.
//! Accepted files are stored under a random name by [`uploads::UploadStorage`].
//!
//! ## Configuration
//!
//! All knobs live in [`config::SecurityConfig`], built once at startup from the
//! CLI/environment and shared read-only.

pub mod api;
pub mod cli;
pub mod config;
pub mod credentials;
pub mod uploads;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};
