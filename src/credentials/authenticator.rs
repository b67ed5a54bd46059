use super::{CredentialFormat, CredentialHasher, CredentialStore, Identity};
use crate::config::LegacyLogin;
use anyhow::{Context, Result};
use secrecy::{ExposeSecret, SecretString};
use std::sync::Arc;
use tracing::{debug, instrument, warn};

/// Login-time password check.
///
/// Answers only accept/reject: an unknown identity, a missing credential and
/// a wrong password all return `Ok(false)` after the same amount of bcrypt
/// work. `Err` is reserved for store failures.
#[derive(Clone)]
pub struct Authenticator {
    store: Arc<dyn CredentialStore>,
    hasher: Arc<CredentialHasher>,
    legacy_login: LegacyLogin,
}

impl Authenticator {
    #[must_use]
    pub fn new(
        store: Arc<dyn CredentialStore>,
        hasher: Arc<CredentialHasher>,
        legacy_login: LegacyLogin,
    ) -> Self {
        Self {
            store,
            hasher,
            legacy_login,
        }
    }

    /// # Errors
    /// Returns an error if the credential store cannot be queried.
    #[instrument(skip(self, candidate))]
    pub async fn verify(&self, identity: Identity<'_>, candidate: &SecretString) -> Result<bool> {
        let record = self
            .store
            .get_credential(identity)
            .await
            .context("failed to load credential")?;

        let Some(record) = record else {
            debug!("unknown identity");
            self.burn(candidate).await;
            return Ok(false);
        };

        let stored = record.stored_credential;
        match self.hasher.classify(stored.as_deref()) {
            CredentialFormat::Hashed | CredentialFormat::ForeignHash => {
                let stored = stored.unwrap_or_default();
                Ok(self.check(candidate, stored).await)
            }

            CredentialFormat::Missing => {
                warn!(user_id = record.user_id, "account has no credential");
                self.burn(candidate).await;
                Ok(false)
            }

            CredentialFormat::Plaintext => match self.legacy_login {
                LegacyLogin::Refuse => {
                    warn!(
                        user_id = record.user_id,
                        "credential not migrated; run migrate-passwords"
                    );
                    self.burn(candidate).await;
                    Ok(false)
                }
                LegacyLogin::PlaintextBridge => {
                    warn!(
                        user_id = record.user_id,
                        "plaintext credential compared directly; run migrate-passwords"
                    );
                    self.burn(candidate).await;
                    let stored = stored.unwrap_or_default();
                    Ok(constant_time_eq(
                        stored.as_bytes(),
                        candidate.expose_secret().as_bytes(),
                    ))
                }
            },
        }
    }

    async fn check(&self, candidate: &SecretString, stored: String) -> bool {
        let hasher = Arc::clone(&self.hasher);
        let candidate = SecretString::from(candidate.expose_secret().to_owned());
        tokio::task::spawn_blocking(move || hasher.verify(candidate.expose_secret(), &stored))
            .await
            .unwrap_or(false)
    }

    async fn burn(&self, candidate: &SecretString) {
        let hasher = Arc::clone(&self.hasher);
        let candidate = SecretString::from(candidate.expose_secret().to_owned());
        let _ = tokio::task::spawn_blocking(move || hasher.burn(candidate.expose_secret())).await;
    }
}

/// Constant-time byte comparison to prevent timing attacks.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}
