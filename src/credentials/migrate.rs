//! One-shot rewrite of legacy plaintext credentials into bcrypt hashes.
//!
//! Safe to re-run: rows already carrying the hash-format marker are never
//! touched, since hashing a hash would lock the user out permanently. Each
//! row is rewritten with a compare-and-swap against the value that was read,
//! so a password change racing the migration wins. A bad row is reported and
//! the batch moves on; only an unreadable store aborts the run.

use super::{
    CredentialFormat, CredentialHasher, CredentialRecord, CredentialStore, MAX_PASSWORD_BYTES,
};
use anyhow::{Context, Result};
use std::fmt;
use tracing::{debug, error, info, instrument, warn};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SkipReason {
    /// `NULL` or empty credential; nothing to hash.
    EmptyCredential,
    /// A bcrypt string of another variant than the configured marker.
    ForeignHash,
    /// The value changed between read and write.
    ChangedConcurrently,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyCredential => write!(f, "empty credential"),
            Self::ForeignHash => write!(f, "unrecognized hash format"),
            Self::ChangedConcurrently => write!(f, "changed concurrently"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RecordOutcome {
    Migrated,
    AlreadyHashed,
    Skipped(SkipReason),
    Failed(String),
}

/// Per-record outcomes of one migration run, in store order.
#[derive(Debug, Default)]
pub struct MigrationReport {
    outcomes: Vec<(i64, RecordOutcome)>,
}

impl MigrationReport {
    #[must_use]
    pub fn outcomes(&self) -> &[(i64, RecordOutcome)] {
        &self.outcomes
    }

    #[must_use]
    pub fn outcome(&self, user_id: i64) -> Option<&RecordOutcome> {
        self.outcomes
            .iter()
            .find(|(id, _)| *id == user_id)
            .map(|(_, outcome)| outcome)
    }

    /// Number of records rewritten to hash format.
    #[must_use]
    pub fn migrated(&self) -> usize {
        self.count(|outcome| matches!(outcome, RecordOutcome::Migrated))
    }

    #[must_use]
    pub fn already_hashed(&self) -> usize {
        self.count(|outcome| matches!(outcome, RecordOutcome::AlreadyHashed))
    }

    #[must_use]
    pub fn skipped(&self) -> usize {
        self.count(|outcome| matches!(outcome, RecordOutcome::Skipped(_)))
    }

    #[must_use]
    pub fn failed(&self) -> usize {
        self.count(|outcome| matches!(outcome, RecordOutcome::Failed(_)))
    }

    /// True when no record failed. Skipped records are warnings only.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.failed() == 0
    }

    fn count(&self, predicate: impl Fn(&RecordOutcome) -> bool) -> usize {
        self.outcomes
            .iter()
            .filter(|(_, outcome)| predicate(outcome))
            .count()
    }
}

impl FromIterator<(i64, RecordOutcome)> for MigrationReport {
    fn from_iter<I: IntoIterator<Item = (i64, RecordOutcome)>>(iter: I) -> Self {
        Self {
            outcomes: iter.into_iter().collect(),
        }
    }
}

impl fmt::Display for MigrationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} migrated, {} already hashed, {} skipped, {} failed",
            self.migrated(),
            self.already_hashed(),
            self.skipped(),
            self.failed()
        )
    }
}

pub struct CredentialMigrator<'a> {
    store: &'a dyn CredentialStore,
    hasher: &'a CredentialHasher,
}

impl<'a> CredentialMigrator<'a> {
    #[must_use]
    pub fn new(store: &'a dyn CredentialStore, hasher: &'a CredentialHasher) -> Self {
        Self { store, hasher }
    }

    /// Scan every record and hash the legacy ones in place.
    ///
    /// # Errors
    /// Returns an error only if the records cannot be listed. Per-record
    /// failures are collected in the report.
    #[instrument(skip(self))]
    pub async fn migrate_all(&self) -> Result<MigrationReport> {
        let records = self
            .store
            .list_all()
            .await
            .context("could not read credential records")?;

        info!(records = records.len(), "starting credential migration");

        let mut report = MigrationReport::default();

        for record in records {
            let outcome = self.migrate_record(&record).await;

            match &outcome {
                RecordOutcome::Migrated => debug!(user_id = record.user_id, "credential migrated"),
                RecordOutcome::AlreadyHashed => {}
                RecordOutcome::Skipped(reason) => {
                    warn!(user_id = record.user_id, %reason, "credential skipped");
                }
                RecordOutcome::Failed(reason) => {
                    error!(user_id = record.user_id, %reason, "credential migration failed");
                }
            }

            report.outcomes.push((record.user_id, outcome));
        }

        info!(%report, "credential migration finished");

        Ok(report)
    }

    async fn migrate_record(&self, record: &CredentialRecord) -> RecordOutcome {
        let stored = record.stored_credential.as_deref();

        let plaintext = match self.hasher.classify(stored) {
            CredentialFormat::Hashed => return RecordOutcome::AlreadyHashed,
            CredentialFormat::Missing => {
                return RecordOutcome::Skipped(SkipReason::EmptyCredential)
            }
            CredentialFormat::ForeignHash => {
                return RecordOutcome::Skipped(SkipReason::ForeignHash)
            }
            CredentialFormat::Plaintext => stored.unwrap_or_default().to_string(),
        };

        // bcrypt would only keep a prefix, letting a shorter password log in.
        if plaintext.len() > MAX_PASSWORD_BYTES {
            return RecordOutcome::Failed(format!(
                "credential is longer than {MAX_PASSWORD_BYTES} bytes"
            ));
        }

        let hasher = self.hasher.clone();
        let hashed = match tokio::task::spawn_blocking(move || hasher.hash(&plaintext)).await {
            Ok(Ok(hashed)) => hashed,
            Ok(Err(err)) => return RecordOutcome::Failed(format!("{err:#}")),
            Err(err) => return RecordOutcome::Failed(format!("hash task failed: {err}")),
        };

        match self
            .store
            .replace_credential(record.user_id, stored, &hashed)
            .await
        {
            Ok(true) => RecordOutcome::Migrated,
            Ok(false) => RecordOutcome::Skipped(SkipReason::ChangedConcurrently),
            Err(err) => RecordOutcome::Failed(format!("{err:#}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::MemoryCredentialStore;

    const TEST_COST: u32 = 4;

    fn hasher() -> CredentialHasher {
        CredentialHasher::new(TEST_COST, "$2b$").expect("hasher")
    }

    #[tokio::test]
    async fn legacy_rows_are_hashed() {
        let store = MemoryCredentialStore::new();
        let hasher = hasher();
        let id = store.insert_raw("alice", Some("Passw0rd!")).await;

        let report = CredentialMigrator::new(&store, &hasher)
            .migrate_all()
            .await
            .expect("migrate");

        assert_eq!(report.migrated(), 1);
        assert_eq!(report.outcome(id), Some(&RecordOutcome::Migrated));
        let stored = store.stored_credential(id).await.flatten().expect("stored");
        assert!(stored.starts_with("$2b$"));
        assert!(hasher.verify("Passw0rd!", &stored));
    }

    #[tokio::test]
    async fn empty_rows_are_skipped_not_hashed() {
        let store = MemoryCredentialStore::new();
        let hasher = hasher();
        let null_id = store.insert_raw("nobody", None).await;
        let empty_id = store.insert_raw("blank", Some("")).await;

        let report = CredentialMigrator::new(&store, &hasher)
            .migrate_all()
            .await
            .expect("migrate");

        assert_eq!(report.skipped(), 2);
        assert!(report.is_success());
        assert_eq!(store.stored_credential(null_id).await, Some(None));
        assert_eq!(
            store.stored_credential(empty_id).await,
            Some(Some(String::new()))
        );
    }

    #[tokio::test]
    async fn foreign_bcrypt_rows_are_left_alone() {
        let store = MemoryCredentialStore::new();
        let hasher = hasher();
        let foreign = hasher.hash("pw").expect("hash").replacen("$2b$", "$2y$", 1);
        let id = store.insert_raw("legacy-php", Some(&foreign)).await;

        let report = CredentialMigrator::new(&store, &hasher)
            .migrate_all()
            .await
            .expect("migrate");

        assert_eq!(
            report.outcome(id),
            Some(&RecordOutcome::Skipped(SkipReason::ForeignHash))
        );
        assert_eq!(store.stored_credential(id).await, Some(Some(foreign)));
    }

    #[tokio::test]
    async fn overlong_legacy_rows_fail_and_stay_untouched() {
        let store = MemoryCredentialStore::new();
        let hasher = hasher();
        let long = "L0ng!".repeat(20);
        let long_id = store.insert_raw("verbose", Some(&long)).await;
        let ok_id = store.insert_raw("brief", Some("Sh0rt!pw")).await;

        let report = CredentialMigrator::new(&store, &hasher)
            .migrate_all()
            .await
            .expect("migrate");

        assert!(matches!(
            report.outcome(long_id),
            Some(RecordOutcome::Failed(reason)) if reason.contains("71 bytes")
        ));
        assert_eq!(report.outcome(ok_id), Some(&RecordOutcome::Migrated));
        assert!(!report.is_success());
        assert_eq!(store.stored_credential(long_id).await, Some(Some(long)));
    }

    #[tokio::test]
    async fn unavailable_store_is_fatal() {
        let store = MemoryCredentialStore::new();
        store.set_unavailable(true).await;
        let hasher = hasher();

        let result = CredentialMigrator::new(&store, &hasher).migrate_all().await;
        assert!(result.is_err());
    }

    #[test]
    fn report_summary_counts_each_outcome() {
        let report = MigrationReport {
            outcomes: vec![
                (1, RecordOutcome::Migrated),
                (2, RecordOutcome::AlreadyHashed),
                (3, RecordOutcome::Skipped(SkipReason::EmptyCredential)),
                (4, RecordOutcome::Failed("boom".to_string())),
            ],
        };
        assert_eq!(
            report.to_string(),
            "1 migrated, 1 already hashed, 1 skipped, 1 failed"
        );
        assert!(!report.is_success());
    }
}
