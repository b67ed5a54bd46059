//! Credential Store Accessor: the identity and credential columns of `users`.

use super::{CredentialRecord, Identity, NewUser};
use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{
    postgres::{PgPoolOptions, PgRow},
    Connection, PgPool, Row,
};
use std::time::Duration;
use tracing::{info_span, Instrument, Span};

/// Outcome of a registration insert.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CreateOutcome {
    Created(i64),
    Conflict,
}

#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Look up one account. `Ok(None)` when it does not exist.
    async fn get_credential(&self, identity: Identity<'_>) -> Result<Option<CredentialRecord>>;

    /// Every account, ordered by id.
    async fn list_all(&self) -> Result<Vec<CredentialRecord>>;

    /// Unconditionally overwrite the stored credential. Returns `false` when
    /// the account does not exist.
    async fn update_credential(&self, user_id: i64, new_value: &str) -> Result<bool>;

    /// Overwrite the stored credential only if it still equals `expected`.
    /// Returns `false` when another writer changed it first.
    async fn replace_credential(
        &self,
        user_id: i64,
        expected: Option<&str>,
        new_value: &str,
    ) -> Result<bool>;

    async fn create_user(&self, user: &NewUser) -> Result<CreateOutcome>;

    async fn ping(&self) -> Result<()>;
}

#[derive(Clone, Debug)]
pub struct PgCredentialStore {
    pool: PgPool,
}

impl PgCredentialStore {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Open a small pool against `dsn`.
    ///
    /// # Errors
    /// Returns an error if the database is unreachable.
    pub async fn connect(dsn: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .min_connections(1)
            .max_connections(5)
            .max_lifetime(Duration::from_secs(60 * 2))
            .acquire_timeout(Duration::from_secs(5))
            .test_before_acquire(true)
            .connect(dsn)
            .await
            .context("Failed to connect to database")?;

        Ok(Self::new(pool))
    }

    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn query_span(operation: &'static str, statement: &'static str) -> Span {
    info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = operation,
        db.statement = statement
    )
}

fn record_from_row(row: &PgRow) -> Result<CredentialRecord, sqlx::Error> {
    Ok(CredentialRecord {
        user_id: row.try_get("id")?,
        username: row.try_get("username")?,
        stored_credential: row.try_get("password")?,
    })
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .and_then(|db_err| db_err.code())
        .is_some_and(|code| code == "23505")
}

#[async_trait]
impl CredentialStore for PgCredentialStore {
    async fn get_credential(&self, identity: Identity<'_>) -> Result<Option<CredentialRecord>> {
        let row = match identity {
            Identity::Id(user_id) => {
                let query = "SELECT id, username, password FROM users WHERE id = $1";
                sqlx::query(query)
                    .bind(user_id)
                    .fetch_optional(&self.pool)
                    .instrument(query_span("SELECT", query))
                    .await
            }
            Identity::Username(username) => {
                let query = "SELECT id, username, password FROM users WHERE username = $1";
                sqlx::query(query)
                    .bind(username)
                    .fetch_optional(&self.pool)
                    .instrument(query_span("SELECT", query))
                    .await
            }
        }
        .context("failed to look up credential")?;

        row.as_ref()
            .map(record_from_row)
            .transpose()
            .context("failed to decode credential row")
    }

    async fn list_all(&self) -> Result<Vec<CredentialRecord>> {
        let query = "SELECT id, username, password FROM users ORDER BY id";
        let rows = sqlx::query(query)
            .fetch_all(&self.pool)
            .instrument(query_span("SELECT", query))
            .await
            .context("failed to list credentials")?;

        rows.iter()
            .map(record_from_row)
            .collect::<Result<Vec<_>, _>>()
            .context("failed to decode credential row")
    }

    async fn update_credential(&self, user_id: i64, new_value: &str) -> Result<bool> {
        let query = "UPDATE users SET password = $1 WHERE id = $2";
        let result = sqlx::query(query)
            .bind(new_value)
            .bind(user_id)
            .execute(&self.pool)
            .instrument(query_span("UPDATE", query))
            .await
            .context("failed to update credential")?;

        Ok(result.rows_affected() == 1)
    }

    async fn replace_credential(
        &self,
        user_id: i64,
        expected: Option<&str>,
        new_value: &str,
    ) -> Result<bool> {
        // Compare-and-swap on the value read earlier; a concurrent password
        // change makes this a no-op.
        let query =
            "UPDATE users SET password = $1 WHERE id = $2 AND password IS NOT DISTINCT FROM $3";
        let result = sqlx::query(query)
            .bind(new_value)
            .bind(user_id)
            .bind(expected)
            .execute(&self.pool)
            .instrument(query_span("UPDATE", query))
            .await
            .context("failed to replace credential")?;

        Ok(result.rows_affected() == 1)
    }

    async fn create_user(&self, user: &NewUser) -> Result<CreateOutcome> {
        let query = r"
            INSERT INTO users
                (username, first_name, last_name, password)
            VALUES ($1, $2, $3, $4)
            RETURNING id
        ";
        let row = sqlx::query(query)
            .bind(&user.username)
            .bind(&user.first_name)
            .bind(&user.last_name)
            .bind(&user.credential_hash)
            .fetch_one(&self.pool)
            .instrument(query_span("INSERT", query))
            .await;

        match row {
            Ok(row) => Ok(CreateOutcome::Created(
                row.try_get("id").context("failed to decode user id")?,
            )),
            Err(err) if is_unique_violation(&err) => Ok(CreateOutcome::Conflict),
            Err(err) => Err(err).context("failed to insert user"),
        }
    }

    async fn ping(&self) -> Result<()> {
        let acquire_span = info_span!(
            "db.acquire",
            db.system = "postgresql",
            db.operation = "ACQUIRE"
        );
        let mut conn = self
            .pool
            .acquire()
            .instrument(acquire_span)
            .await
            .context("failed to acquire database connection")?;

        let ping_span = info_span!("db.ping", db.system = "postgresql", db.operation = "PING");
        conn.ping()
            .instrument(ping_span)
            .await
            .context("failed to ping database")
    }
}
