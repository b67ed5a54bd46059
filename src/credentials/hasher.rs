use crate::config::SecurityConfig;
use anyhow::{bail, Context, Result};
use bcrypt::BcryptError;

// Verified against when the account does not exist so both paths cost one
// bcrypt run.
const DECOY_PASSWORD: &str = "social-insecurity-decoy";

/// Longest password bcrypt reads in full: its 72-byte key includes the
/// trailing NUL.
pub const MAX_PASSWORD_BYTES: usize = 71;

const BCRYPT_HASH_LEN: usize = 60;
const BCRYPT_PREFIXES: [&str; 4] = ["$2a$", "$2b$", "$2x$", "$2y$"];

/// What a stored credential value looks like.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CredentialFormat {
    /// `NULL` or empty string.
    Missing,
    /// Carries the configured hash-format marker.
    Hashed,
    /// A bcrypt string from another variant than the configured marker.
    /// Never re-hashed: that would lock the user out for good.
    ForeignHash,
    /// Legacy plaintext.
    Plaintext,
}

/// bcrypt hashing bound to a cost factor and the format marker used to tell
/// hashed rows from legacy plaintext.
#[derive(Clone)]
pub struct CredentialHasher {
    cost: u32,
    marker: String,
    decoy_hash: String,
}

impl CredentialHasher {
    /// # Errors
    /// Returns an error if the cost is outside bcrypt's range or bcrypt output
    /// does not start with `marker`.
    pub fn new(cost: u32, marker: &str) -> Result<Self> {
        if marker.is_empty() {
            bail!("hash format marker must not be empty");
        }

        let decoy_hash = bcrypt::hash(DECOY_PASSWORD, cost)
            .with_context(|| format!("invalid bcrypt cost {cost}"))?;

        if !decoy_hash.starts_with(marker) {
            bail!("hash format marker {marker:?} does not match bcrypt output");
        }

        Ok(Self {
            cost,
            marker: marker.to_string(),
            decoy_hash,
        })
    }

    /// # Errors
    /// See [`CredentialHasher::new`].
    pub fn from_config(config: &SecurityConfig) -> Result<Self> {
        Self::new(config.hash_cost(), config.hash_marker())
    }

    /// Hash a plaintext password with a fresh random salt.
    ///
    /// # Errors
    /// Returns an error if the password is longer than
    /// [`MAX_PASSWORD_BYTES`] or bcrypt rejects the input.
    pub fn hash(&self, plaintext: &str) -> Result<String> {
        bcrypt::non_truncating_hash(plaintext, self.cost).context("bcrypt hash failed")
    }

    /// True when `stored` carries the hash-format marker.
    #[must_use]
    pub fn is_hashed(&self, stored: &str) -> bool {
        stored.starts_with(&self.marker)
    }

    #[must_use]
    pub fn classify(&self, stored: Option<&str>) -> CredentialFormat {
        match stored {
            None | Some("") => CredentialFormat::Missing,
            Some(value) if self.is_hashed(value) => CredentialFormat::Hashed,
            Some(value)
                if value.len() == BCRYPT_HASH_LEN
                    && BCRYPT_PREFIXES.iter().any(|prefix| value.starts_with(prefix)) =>
            {
                CredentialFormat::ForeignHash
            }
            Some(_) => CredentialFormat::Plaintext,
        }
    }

    /// Re-hash `candidate` with the salt and cost embedded in `stored` and
    /// compare in constant time. Malformed hashes and candidates longer than
    /// [`MAX_PASSWORD_BYTES`] never verify.
    #[must_use]
    pub fn verify(&self, candidate: &str, stored: &str) -> bool {
        match bcrypt::non_truncating_verify(candidate, stored) {
            Ok(valid) => valid,
            Err(BcryptError::Truncation(_)) => {
                // Rejected before any hashing; spend the same time anyway.
                self.burn(candidate);
                false
            }
            Err(_) => false,
        }
    }

    /// Spend one verification on the decoy hash and discard the result.
    pub fn burn(&self, candidate: &str) {
        let _ = bcrypt::verify(candidate, &self.decoy_hash);
    }

    #[must_use]
    pub const fn cost(&self) -> u32 {
        self.cost
    }

    #[must_use]
    pub fn marker(&self) -> &str {
        &self.marker
    }
}

impl std::fmt::Debug for CredentialHasher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialHasher")
            .field("cost", &self.cost)
            .field("marker", &self.marker)
            .finish_non_exhaustive()
    }
}
