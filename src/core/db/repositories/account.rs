//! Account repository for database operations
//!
//! PostgreSQL implementation of [`AccountStore`]. Uniqueness of usernames and
//! emails is enforced by table constraints; violations are translated into
//! the matching [`StoreError`] variant so concurrent signups cannot slip past
//! the pre-insert checks.

use async_trait::async_trait;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::core::db::models::{Account, NewAccount};
use crate::core::db::store::{AccountStore, StoreError};

const USERNAME_CONSTRAINT: &str = "accounts_username_key";
const EMAIL_CONSTRAINT: &str = "accounts_email_key";

/// Account repository for database operations
#[derive(Clone)]
pub struct PgAccountRepository {
    pool: PgPool,
}

impl PgAccountRepository {
    /// Create a new account repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Cheap pre-insert check; the table constraints still decide races
    async fn ensure_unique(&self, account: &NewAccount) -> Result<(), StoreError> {
        if self.find_by_username(&account.username).await?.is_some() {
            return Err(StoreError::DuplicateUsername);
        }

        if let Some(email) = &account.email
            && self.find_by_email(email).await?.is_some()
        {
            return Err(StoreError::DuplicateEmail);
        }

        Ok(())
    }
}

async fn insert_account(
    tx: &mut Transaction<'_, Postgres>,
    account: Account,
) -> Result<Account, StoreError> {
    sqlx::query_as::<_, Account>(
        r#"
        INSERT INTO accounts (id, username, password_hash, email, verified, avatar_url, created_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        RETURNING id, username, password_hash, email, verified, avatar_url, created_at
        "#,
    )
    .bind(account.id)
    .bind(&account.username)
    .bind(&account.password_hash)
    .bind(&account.email)
    .bind(account.verified)
    .bind(&account.avatar_url)
    .bind(account.created_at)
    .fetch_one(&mut **tx)
    .await
    .map_err(map_insert_error)
}

/// Translate unique-constraint violations into store errors
fn map_insert_error(err: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db_err) = &err
        && db_err.is_unique_violation()
    {
        match db_err.constraint() {
            Some(USERNAME_CONSTRAINT) => return StoreError::DuplicateUsername,
            Some(EMAIL_CONSTRAINT) => return StoreError::DuplicateEmail,
            _ => {}
        }
    }
    StoreError::DatabaseError(err)
}

#[async_trait]
impl AccountStore for PgAccountRepository {
    async fn create_account(&self, account: NewAccount) -> Result<Account, StoreError> {
        self.ensure_unique(&account).await?;

        let mut tx = self.pool.begin().await?;
        let created = insert_account(&mut tx, account.into_account()).await?;
        tx.commit().await?;

        Ok(created)
    }

    async fn create_oauth_account(&self, account: NewAccount) -> Result<Account, StoreError> {
        self.ensure_unique(&account).await?;

        let mut tx = self.pool.begin().await?;
        let created = insert_account(&mut tx, account.into_account()).await?;
        sqlx::query("INSERT INTO oauth_links (account_id) VALUES ($1)")
            .bind(created.id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        Ok(created)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Account>, StoreError> {
        let account = sqlx::query_as::<_, Account>(
            r#"
            SELECT id, username, password_hash, email, verified, avatar_url, created_at
            FROM accounts
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(account)
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<Account>, StoreError> {
        let account = sqlx::query_as::<_, Account>(
            r#"
            SELECT id, username, password_hash, email, verified, avatar_url, created_at
            FROM accounts
            WHERE username = $1
            "#,
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;

        Ok(account)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<Account>, StoreError> {
        let account = sqlx::query_as::<_, Account>(
            r#"
            SELECT id, username, password_hash, email, verified, avatar_url, created_at
            FROM accounts
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        Ok(account)
    }

    async fn mark_verified(&self, id: Uuid) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE accounts
            SET verified = TRUE
            WHERE id = $1
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }

        Ok(())
    }

    async fn mark_oauth_linked(&self, id: Uuid) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            INSERT INTO oauth_links (account_id)
            SELECT id FROM accounts WHERE id = $1
            ON CONFLICT (account_id) DO NOTHING
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 && !self.is_oauth_linked(id).await? {
            return Err(StoreError::NotFound);
        }

        Ok(())
    }

    async fn is_oauth_linked(&self, id: Uuid) -> Result<bool, StoreError> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM oauth_links WHERE account_id = $1")
            .bind(id)
            .fetch_one(&self.pool)
            .await?;

        Ok(count.0 > 0)
    }
}
