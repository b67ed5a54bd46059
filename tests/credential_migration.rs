//! End-to-end behaviour of the password migration against the in-memory store:
//! legacy rows become verifiable hashes, re-runs are no-ops, bad rows do not
//! stop the batch and concurrent password changes are never overwritten.

use anyhow::Result;
use async_trait::async_trait;
use secrecy::SecretString;
use social_insecurity::{
    config::LegacyLogin,
    credentials::{
        Authenticator, CreateOutcome, CredentialHasher, CredentialMigrator, CredentialRecord,
        CredentialStore, Identity, MemoryCredentialStore, NewUser, RecordOutcome, SkipReason,
    },
};
use std::sync::Arc;

const TEST_COST: u32 = 4;

fn hasher() -> Result<Arc<CredentialHasher>> {
    Ok(Arc::new(CredentialHasher::new(TEST_COST, "$2b$")?))
}

fn secret(value: &str) -> SecretString {
    SecretString::from(value.to_string())
}

#[tokio::test]
async fn migrated_users_keep_their_password() -> Result<()> {
    let store = Arc::new(MemoryCredentialStore::new());
    let hasher = hasher()?;
    let alice = store.insert_raw("alice", Some("Alice!pass1")).await;
    let bob = store.insert_raw("bob", Some("B0b$ecret")).await;

    let authenticator = Authenticator::new(store.clone(), hasher.clone(), LegacyLogin::Refuse);

    // Refused until migrated.
    assert!(
        !authenticator
            .verify(Identity::Id(alice), &secret("Alice!pass1"))
            .await?
    );

    let report = CredentialMigrator::new(store.as_ref(), &hasher)
        .migrate_all()
        .await?;
    assert_eq!(report.migrated(), 2);
    assert!(report.is_success());

    for (id, password) in [(alice, "Alice!pass1"), (bob, "B0b$ecret")] {
        let stored = store.stored_credential(id).await.flatten().unwrap_or_default();
        assert!(stored.starts_with("$2b$"), "user {id} not hashed");
        assert!(authenticator.verify(Identity::Id(id), &secret(password)).await?);
        assert!(!authenticator.verify(Identity::Id(id), &secret("wrong")).await?);
    }

    assert!(
        authenticator
            .verify(Identity::Username("bob"), &secret("B0b$ecret"))
            .await?
    );

    Ok(())
}

#[tokio::test]
async fn second_run_changes_nothing() -> Result<()> {
    let store = MemoryCredentialStore::new();
    let hasher = hasher()?;
    let id = store.insert_raw("carol", Some("Car0l!pass")).await;

    let first = CredentialMigrator::new(&store, &hasher).migrate_all().await?;
    assert_eq!(first.migrated(), 1);
    let after_first = store.stored_credential(id).await;

    let second = CredentialMigrator::new(&store, &hasher).migrate_all().await?;
    assert_eq!(second.migrated(), 0);
    assert_eq!(second.already_hashed(), 1);
    assert_eq!(second.outcome(id), Some(&RecordOutcome::AlreadyHashed));
    assert_eq!(store.stored_credential(id).await, after_first);

    Ok(())
}

#[tokio::test]
async fn one_failing_row_does_not_stop_the_batch() -> Result<()> {
    let store = MemoryCredentialStore::new();
    let hasher = hasher()?;
    let first = store.insert_raw("first", Some("one")).await;
    let broken = store.insert_raw("broken", Some("two")).await;
    let last = store.insert_raw("last", Some("three")).await;
    let empty = store.insert_raw("empty", None).await;
    store.fail_writes_for(broken).await;

    let report = CredentialMigrator::new(&store, &hasher).migrate_all().await?;

    assert_eq!(report.outcome(first), Some(&RecordOutcome::Migrated));
    assert!(matches!(
        report.outcome(broken),
        Some(RecordOutcome::Failed(_))
    ));
    assert_eq!(report.outcome(last), Some(&RecordOutcome::Migrated));
    assert_eq!(
        report.outcome(empty),
        Some(&RecordOutcome::Skipped(SkipReason::EmptyCredential))
    );
    assert_eq!(report.failed(), 1);
    assert!(!report.is_success());
    assert_eq!(
        report.to_string(),
        "2 migrated, 0 already hashed, 1 skipped, 1 failed"
    );
    assert_eq!(
        store.stored_credential(broken).await,
        Some(Some("two".to_string()))
    );

    Ok(())
}

/// Changes one user's password right after the migrator has read every row.
struct RacingStore {
    inner: MemoryCredentialStore,
    user_id: i64,
    new_password: String,
}

#[async_trait]
impl CredentialStore for RacingStore {
    async fn get_credential(&self, identity: Identity<'_>) -> Result<Option<CredentialRecord>> {
        self.inner.get_credential(identity).await
    }

    async fn list_all(&self) -> Result<Vec<CredentialRecord>> {
        let records = self.inner.list_all().await?;
        self.inner
            .update_credential(self.user_id, &self.new_password)
            .await?;
        Ok(records)
    }

    async fn update_credential(&self, user_id: i64, new_value: &str) -> Result<bool> {
        self.inner.update_credential(user_id, new_value).await
    }

    async fn replace_credential(
        &self,
        user_id: i64,
        expected: Option<&str>,
        new_value: &str,
    ) -> Result<bool> {
        self.inner
            .replace_credential(user_id, expected, new_value)
            .await
    }

    async fn create_user(&self, user: &NewUser) -> Result<CreateOutcome> {
        self.inner.create_user(user).await
    }

    async fn ping(&self) -> Result<()> {
        self.inner.ping().await
    }
}

#[tokio::test]
async fn concurrent_password_change_wins() -> Result<()> {
    let hasher = hasher()?;
    let inner = MemoryCredentialStore::new();
    let id = inner.insert_raw("dave", Some("old-plaintext")).await;
    let fresh_hash = hasher.hash("N3w!password")?;
    let store = RacingStore {
        inner,
        user_id: id,
        new_password: fresh_hash.clone(),
    };

    let report = CredentialMigrator::new(&store, &hasher).migrate_all().await?;

    assert_eq!(
        report.outcome(id),
        Some(&RecordOutcome::Skipped(SkipReason::ChangedConcurrently))
    );
    assert_eq!(
        store.inner.stored_credential(id).await,
        Some(Some(fresh_hash))
    );

    Ok(())
}

#[tokio::test]
async fn unreachable_store_aborts_the_run() -> Result<()> {
    let store = MemoryCredentialStore::new();
    store.insert_raw("erin", Some("pw")).await;
    store.set_unavailable(true).await;
    let hasher = hasher()?;

    let result = CredentialMigrator::new(&store, &hasher).migrate_all().await;
    assert!(result.is_err());

    Ok(())
}
