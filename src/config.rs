//! Process-wide security configuration.
//!
//! Built once at startup (from CLI arguments / environment) and shared
//! read-only behind an `Arc`. Components never mutate it.

use std::{collections::BTreeSet, time::Duration};

const DEFAULT_MAX_UPLOAD_BYTES: u64 = 5 * 1024 * 1024;
const DEFAULT_SNIFF_LEN: usize = 1024;
const DEFAULT_HASH_MARKER: &str = "$2b$";
const DEFAULT_EXTENSIONS: [&str; 4] = ["png", "jpg", "jpeg", "gif"];
const DEFAULT_MIME_TYPES: [&str; 3] = ["image/png", "image/jpeg", "image/gif"];
const DEFAULT_RATE_LIMIT_ATTEMPTS: u32 = 1000;
const DEFAULT_RATE_LIMIT_WINDOW: Duration = Duration::from_secs(24 * 60 * 60);

/// What to do when a login hits a credential that was never migrated.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LegacyLogin {
    /// Reject the login until `migrate-passwords` has run.
    #[default]
    Refuse,
    /// Compare the stored plaintext directly. Transitional only: the stored
    /// value is readable by anyone with database access.
    PlaintextBridge,
}

#[derive(Clone, Debug)]
pub struct SecurityConfig {
    allowed_extensions: BTreeSet<String>,
    allowed_mime_types: BTreeSet<String>,
    max_upload_bytes: u64,
    sniff_len: usize,
    hash_cost: u32,
    hash_marker: String,
    legacy_login: LegacyLogin,
    rate_limit_attempts: u32,
    rate_limit_window: Duration,
}

impl SecurityConfig {
    #[must_use]
    pub fn new() -> Self {
        Self {
            allowed_extensions: DEFAULT_EXTENSIONS.iter().map(ToString::to_string).collect(),
            allowed_mime_types: DEFAULT_MIME_TYPES.iter().map(ToString::to_string).collect(),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            sniff_len: DEFAULT_SNIFF_LEN,
            hash_cost: bcrypt::DEFAULT_COST,
            hash_marker: DEFAULT_HASH_MARKER.to_string(),
            legacy_login: LegacyLogin::Refuse,
            rate_limit_attempts: DEFAULT_RATE_LIMIT_ATTEMPTS,
            rate_limit_window: DEFAULT_RATE_LIMIT_WINDOW,
        }
    }

    /// Replace the extension allow-set. Entries are normalized to lower case
    /// without a leading dot.
    #[must_use]
    pub fn with_allowed_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.allowed_extensions = extensions
            .into_iter()
            .map(|ext| ext.as_ref().trim().trim_start_matches('.').to_lowercase())
            .filter(|ext| !ext.is_empty())
            .collect();
        self
    }

    #[must_use]
    pub fn with_allowed_mime_types<I, S>(mut self, mime_types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.allowed_mime_types = mime_types
            .into_iter()
            .map(|mime| mime.as_ref().trim().to_lowercase())
            .filter(|mime| !mime.is_empty())
            .collect();
        self
    }

    #[must_use]
    pub fn with_max_upload_bytes(mut self, bytes: u64) -> Self {
        self.max_upload_bytes = bytes;
        self
    }

    #[must_use]
    pub fn with_sniff_len(mut self, len: usize) -> Self {
        self.sniff_len = len;
        self
    }

    #[must_use]
    pub fn with_hash_cost(mut self, cost: u32) -> Self {
        self.hash_cost = cost;
        self
    }

    #[must_use]
    pub fn with_hash_marker(mut self, marker: impl Into<String>) -> Self {
        self.hash_marker = marker.into();
        self
    }

    #[must_use]
    pub fn with_legacy_login(mut self, policy: LegacyLogin) -> Self {
        self.legacy_login = policy;
        self
    }

    /// Login and registration attempts allowed per client and window.
    /// `0` turns rate limiting off.
    #[must_use]
    pub fn with_rate_limit(mut self, attempts: u32, window: Duration) -> Self {
        self.rate_limit_attempts = attempts;
        self.rate_limit_window = window;
        self
    }

    #[must_use]
    pub fn allows_extension(&self, extension: &str) -> bool {
        self.allowed_extensions.contains(extension)
    }

    #[must_use]
    pub fn allows_mime_type(&self, mime_type: &str) -> bool {
        self.allowed_mime_types.contains(mime_type)
    }

    #[must_use]
    pub fn allowed_extensions(&self) -> &BTreeSet<String> {
        &self.allowed_extensions
    }

    #[must_use]
    pub fn allowed_mime_types(&self) -> &BTreeSet<String> {
        &self.allowed_mime_types
    }

    #[must_use]
    pub const fn max_upload_bytes(&self) -> u64 {
        self.max_upload_bytes
    }

    #[must_use]
    pub const fn sniff_len(&self) -> usize {
        self.sniff_len
    }

    #[must_use]
    pub const fn hash_cost(&self) -> u32 {
        self.hash_cost
    }

    #[must_use]
    pub fn hash_marker(&self) -> &str {
        &self.hash_marker
    }

    #[must_use]
    pub const fn legacy_login(&self) -> LegacyLogin {
        self.legacy_login
    }

    #[must_use]
    pub const fn rate_limit_attempts(&self) -> u32 {
        self.rate_limit_attempts
    }

    #[must_use]
    pub const fn rate_limit_window(&self) -> Duration {
        self.rate_limit_window
    }
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self::new()
    }
}
