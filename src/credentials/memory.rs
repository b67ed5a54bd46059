//! In-process credential store for tests and local tooling.

use super::{CreateOutcome, CredentialRecord, CredentialStore, Identity, NewUser};
use anyhow::{bail, Result};
use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet};
use tokio::sync::RwLock;

#[derive(Debug, Default)]
struct State {
    next_id: i64,
    users: BTreeMap<i64, CredentialRecord>,
    failing_writes: BTreeSet<i64>,
    unavailable: bool,
}

/// Mirrors `PgCredentialStore` semantics (unique usernames, compare-and-swap
/// updates) without a database. Failure switches simulate an unreachable
/// store or a row whose write always fails.
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    state: RwLock<State>,
}

impl MemoryCredentialStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a row verbatim, bypassing hashing. Used to seed legacy rows.
    pub async fn insert_raw(&self, username: &str, stored_credential: Option<&str>) -> i64 {
        let mut state = self.state.write().await;
        state.next_id += 1;
        let user_id = state.next_id;
        state.users.insert(
            user_id,
            CredentialRecord {
                user_id,
                username: username.to_string(),
                stored_credential: stored_credential.map(ToString::to_string),
            },
        );
        user_id
    }

    /// Current stored value, `None` if the user does not exist.
    pub async fn stored_credential(&self, user_id: i64) -> Option<Option<String>> {
        let state = self.state.read().await;
        state
            .users
            .get(&user_id)
            .map(|record| record.stored_credential.clone())
    }

    pub async fn set_unavailable(&self, unavailable: bool) {
        self.state.write().await.unavailable = unavailable;
    }

    pub async fn fail_writes_for(&self, user_id: i64) {
        self.state.write().await.failing_writes.insert(user_id);
    }

    pub async fn len(&self) -> usize {
        self.state.read().await.users.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

fn ensure_available(state: &State) -> Result<()> {
    if state.unavailable {
        bail!("credential store unavailable");
    }
    Ok(())
}

fn ensure_writable(state: &State, user_id: i64) -> Result<()> {
    ensure_available(state)?;
    if state.failing_writes.contains(&user_id) {
        bail!("write failed for user {user_id}");
    }
    Ok(())
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn get_credential(&self, identity: Identity<'_>) -> Result<Option<CredentialRecord>> {
        let state = self.state.read().await;
        ensure_available(&state)?;
        let record = match identity {
            Identity::Id(user_id) => state.users.get(&user_id),
            Identity::Username(username) => {
                state.users.values().find(|record| record.username == username)
            }
        };
        Ok(record.cloned())
    }

    async fn list_all(&self) -> Result<Vec<CredentialRecord>> {
        let state = self.state.read().await;
        ensure_available(&state)?;
        Ok(state.users.values().cloned().collect())
    }

    async fn update_credential(&self, user_id: i64, new_value: &str) -> Result<bool> {
        let mut state = self.state.write().await;
        ensure_writable(&state, user_id)?;
        Ok(state.users.get_mut(&user_id).is_some_and(|record| {
            record.stored_credential = Some(new_value.to_string());
            true
        }))
    }

    async fn replace_credential(
        &self,
        user_id: i64,
        expected: Option<&str>,
        new_value: &str,
    ) -> Result<bool> {
        let mut state = self.state.write().await;
        ensure_writable(&state, user_id)?;
        match state.users.get_mut(&user_id) {
            Some(record) if record.stored_credential.as_deref() == expected => {
                record.stored_credential = Some(new_value.to_string());
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn create_user(&self, user: &NewUser) -> Result<CreateOutcome> {
        let mut state = self.state.write().await;
        ensure_available(&state)?;
        if state
            .users
            .values()
            .any(|record| record.username == user.username)
        {
            return Ok(CreateOutcome::Conflict);
        }
        state.next_id += 1;
        let user_id = state.next_id;
        state.users.insert(
            user_id,
            CredentialRecord {
                user_id,
                username: user.username.clone(),
                stored_credential: Some(user.credential_hash.clone()),
            },
        );
        Ok(CreateOutcome::Created(user_id))
    }

    async fn ping(&self) -> Result<()> {
        ensure_available(&*self.state.read().await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_user(username: &str) -> NewUser {
        NewUser {
            username: username.to_string(),
            first_name: "Ada".to_string(),
            last_name: "Lovelace".to_string(),
            credential_hash: "$2b$04$hash".to_string(),
        }
    }

    #[tokio::test]
    async fn create_user_rejects_duplicate_username() {
        let store = MemoryCredentialStore::new();
        let first = store.create_user(&new_user("ada")).await.expect("create");
        assert!(matches!(first, CreateOutcome::Created(_)));
        let second = store.create_user(&new_user("ada")).await.expect("create");
        assert_eq!(second, CreateOutcome::Conflict);
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn lookup_by_id_and_username() {
        let store = MemoryCredentialStore::new();
        let id = store.insert_raw("bob", Some("plain")).await;
        let by_id = store.get_credential(Identity::Id(id)).await.expect("get");
        let by_name = store
            .get_credential(Identity::Username("bob"))
            .await
            .expect("get");
        assert_eq!(by_id, by_name);
        assert!(store
            .get_credential(Identity::Username("nobody"))
            .await
            .expect("get")
            .is_none());
    }

    #[tokio::test]
    async fn replace_is_conditional_on_expected_value() {
        let store = MemoryCredentialStore::new();
        let id = store.insert_raw("carol", Some("old")).await;

        assert!(!store
            .replace_credential(id, Some("stale"), "new")
            .await
            .expect("replace"));
        assert_eq!(store.stored_credential(id).await, Some(Some("old".to_string())));

        assert!(store
            .replace_credential(id, Some("old"), "new")
            .await
            .expect("replace"));
        assert_eq!(store.stored_credential(id).await, Some(Some("new".to_string())));
    }

    #[tokio::test]
    async fn replace_matches_null_credentials() {
        let store = MemoryCredentialStore::new();
        let id = store.insert_raw("dave", None).await;
        assert!(store
            .replace_credential(id, None, "set")
            .await
            .expect("replace"));
    }

    #[tokio::test]
    async fn update_reports_missing_user() {
        let store = MemoryCredentialStore::new();
        assert!(!store.update_credential(42, "x").await.expect("update"));
    }

    #[tokio::test]
    async fn unavailable_store_errors() {
        let store = MemoryCredentialStore::new();
        store.set_unavailable(true).await;
        assert!(store.list_all().await.is_err());
        assert!(store.ping().await.is_err());
        store.set_unavailable(false).await;
        assert!(store.ping().await.is_ok());
    }

    #[tokio::test]
    async fn failing_writes_only_affect_marked_user() {
        let store = MemoryCredentialStore::new();
        let bad = store.insert_raw("bad", Some("a")).await;
        let good = store.insert_raw("good", Some("b")).await;
        store.fail_writes_for(bad).await;
        assert!(store.update_credential(bad, "x").await.is_err());
        assert!(store.update_credential(good, "x").await.expect("update"));
    }
}
