use async_trait::async_trait;
use sqlx::{postgres::PgArguments, query::Query, PgPool, Postgres};
use time::OffsetDateTime;
use tracing::debug;
use uuid::Uuid;

use super::{model::Account, repo_types::AccountRow, schema};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("email already registered")]
    DuplicateEmail,
    #[error("account not found")]
    NotFound,
    /// A [`Change`] refused to apply to the current row.
    #[error("{0}")]
    Rejected(String),
    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

fn is_email_constraint(constraint: Option<&str>) -> bool {
    constraint == Some(schema::unique_constraint("email").as_str())
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => StoreError::NotFound,
            sqlx::Error::Database(ref db)
                if db.is_unique_violation() && is_email_constraint(db.constraint()) =>
            {
                StoreError::DuplicateEmail
            }
            other => StoreError::Backend(other.into()),
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Edit applied to the freshly loaded row inside [`AccountStore::modify`].
pub type Change<'a> = &'a (dyn Fn(&mut Account) -> StoreResult<()> + Send + Sync);

/// Load/save boundary for accounts. Implementations enforce email uniqueness
/// atomically with the write.
#[async_trait]
pub trait AccountStore: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<Account>>;
    async fn find_by_email(&self, email: &str) -> StoreResult<Option<Account>>;
    async fn find_by_confirmation_token(&self, token: Uuid) -> StoreResult<Option<Account>>;
    async fn insert(&self, account: &Account) -> StoreResult<()>;
    /// Overwrites the whole row. Fails with [`StoreError::NotFound`] when no
    /// row has the account's id.
    async fn update(&self, account: &Account) -> StoreResult<()>;
    /// Loads, applies `change` and writes back while holding the row, so two
    /// concurrent modifications never undo each other. Returns the stored
    /// result.
    async fn modify(&self, id: Uuid, change: Change<'_>) -> StoreResult<Account>;
    /// Sets `last_seen_at` and nothing else.
    async fn touch_last_seen(&self, id: Uuid, at: OffsetDateTime) -> StoreResult<()>;
    async fn delete(&self, id: Uuid) -> StoreResult<()>;
}

#[derive(Clone)]
pub struct PgAccountStore {
    db: PgPool,
}

impl PgAccountStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    async fn find_one(&self, column: &str, bind: FindKey<'_>) -> StoreResult<Option<Account>> {
        let sql = format!(
            "SELECT {} FROM {} WHERE {} = $1",
            schema::select_list(),
            schema::TABLE,
            column
        );
        let query = sqlx::query_as::<_, AccountRow>(&sql);
        let query = match bind {
            FindKey::Uuid(v) => query.bind(v),
            FindKey::Text(v) => query.bind(v),
        };
        let row = query.fetch_optional(&self.db).await?;
        Ok(row.map(Account::from))
    }
}

enum FindKey<'a> {
    Uuid(Uuid),
    Text(&'a str),
}

fn update_sql() -> String {
    format!(
        "UPDATE {} SET {} WHERE id = $1",
        schema::TABLE,
        schema::update_assignments()
    )
}

/// Binds the id and then the mutable columns in [`schema::update_assignments`]
/// order.
fn bind_update<'q>(sql: &'q str, account: &Account) -> Query<'q, Postgres, PgArguments> {
    let row = AccountRow::from(account);
    sqlx::query(sql)
        .bind(row.id)
        .bind(row.name)
        .bind(row.email)
        .bind(row.phone_number)
        .bind(row.roles)
        .bind(row.password_hash)
        .bind(row.activated_at)
        .bind(row.deactivated_at)
        .bind(row.last_seen_at)
        .bind(row.confirmation_token)
}

#[async_trait]
impl AccountStore for PgAccountStore {
    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<Account>> {
        self.find_one("id", FindKey::Uuid(id)).await
    }

    async fn find_by_email(&self, email: &str) -> StoreResult<Option<Account>> {
        self.find_one("email", FindKey::Text(email)).await
    }

    async fn find_by_confirmation_token(&self, token: Uuid) -> StoreResult<Option<Account>> {
        self.find_one("confirmation_token", FindKey::Uuid(token)).await
    }

    async fn insert(&self, account: &Account) -> StoreResult<()> {
        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            schema::TABLE,
            schema::select_list(),
            schema::placeholders()
        );
        let row = AccountRow::from(account);
        sqlx::query(&sql)
            .bind(row.id)
            .bind(row.name)
            .bind(row.email)
            .bind(row.phone_number)
            .bind(row.roles)
            .bind(row.password_hash)
            .bind(row.created_at)
            .bind(row.activated_at)
            .bind(row.deactivated_at)
            .bind(row.last_seen_at)
            .bind(row.confirmation_token)
            .execute(&self.db)
            .await?;
        debug!(account_id = %account.id(), "account inserted");
        Ok(())
    }

    async fn update(&self, account: &Account) -> StoreResult<()> {
        let sql = update_sql();
        let done = bind_update(&sql, account).execute(&self.db).await?;
        if done.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        debug!(account_id = %account.id(), "account updated");
        Ok(())
    }

    async fn modify(&self, id: Uuid, change: Change<'_>) -> StoreResult<Account> {
        let mut tx = self.db.begin().await?;

        let select = format!(
            "SELECT {} FROM {} WHERE id = $1 FOR UPDATE",
            schema::select_list(),
            schema::TABLE
        );
        let row = sqlx::query_as::<_, AccountRow>(&select)
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(StoreError::NotFound)?;

        let mut account = Account::from(row);
        change(&mut account)?;

        let sql = update_sql();
        bind_update(&sql, &account).execute(&mut *tx).await?;
        tx.commit().await?;
        debug!(account_id = %id, "account modified");
        Ok(account)
    }

    async fn touch_last_seen(&self, id: Uuid, at: OffsetDateTime) -> StoreResult<()> {
        let sql = format!("UPDATE {} SET last_seen_at = $2 WHERE id = $1", schema::TABLE);
        let done = sqlx::query(&sql).bind(id).bind(at).execute(&self.db).await?;
        if done.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> StoreResult<()> {
        let sql = format!("DELETE FROM {} WHERE id = $1", schema::TABLE);
        let done = sqlx::query(&sql).bind(id).execute(&self.db).await?;
        if done.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        debug!(account_id = %id, "account deleted");
        Ok(())
    }
}
