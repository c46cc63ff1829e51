use sqlx::{types::Json, FromRow};
use time::OffsetDateTime;
use uuid::Uuid;

/// Account row as stored in the `accounts` table.
#[derive(Debug, Clone, FromRow)]
pub struct AccountRow {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub phone_number: Option<String>,
    pub roles: Json<Vec<String>>,     // JSONB list, base role not stored
    pub password_hash: String,        // argon2 PHC string
    pub created_at: OffsetDateTime,
    pub activated_at: Option<OffsetDateTime>,
    pub deactivated_at: Option<OffsetDateTime>,
    pub last_seen_at: Option<OffsetDateTime>,
    pub confirmation_token: Option<Uuid>,
}
