//! Stored credentials: hashing, verification and migration of legacy rows.

mod authenticator;
mod hasher;
mod memory;
mod migrate;
mod policy;
mod store;

pub use self::authenticator::Authenticator;
pub use self::hasher::{CredentialFormat, CredentialHasher, MAX_PASSWORD_BYTES};
pub use self::memory::MemoryCredentialStore;
pub use self::migrate::{CredentialMigrator, MigrationReport, RecordOutcome, SkipReason};
pub use self::policy::{check_password_policy, PasswordPolicyError};
pub use self::store::{CreateOutcome, CredentialStore, PgCredentialStore};

/// How a caller names the account whose credential is wanted.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Identity<'a> {
    Id(i64),
    Username(&'a str),
}

/// Identity and credential columns of a `users` row.
///
/// `stored_credential` is nullable in the schema; rows created before
/// registration enforced a password may carry `NULL` or an empty string.
#[derive(Clone, PartialEq, Eq)]
pub struct CredentialRecord {
    pub user_id: i64,
    pub username: String,
    pub stored_credential: Option<String>,
}

impl std::fmt::Debug for CredentialRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialRecord")
            .field("user_id", &self.user_id)
            .field("username", &self.username)
            .field("stored_credential", &"***")
            .finish()
    }
}

/// Fields inserted at registration. The credential is already hashed.
#[derive(Clone)]
pub struct NewUser {
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub credential_hash: String,
}

impl std::fmt::Debug for NewUser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NewUser")
            .field("username", &self.username)
            .field("first_name", &self.first_name)
            .field("last_name", &self.last_name)
            .field("credential_hash", &"***")
            .finish()
    }
}
