use serde::Serialize;
use time::OffsetDateTime;
use uuid::Uuid;

use super::repo_types::AccountRow;

/// Base role every account holds, stored or not.
pub const ROLE_USER: &str = "ROLE_USER";
pub const ROLE_ADMIN: &str = "ROLE_ADMIN";

/// Lifecycle state derived from the activation/deactivation timestamps.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AccountStatus {
    Unconfirmed,
    Active,
    Inactive,
}

/// Stored roles plus `ROLE_USER`, duplicates removed, first occurrence wins.
pub fn effective_roles(stored: &[String]) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(stored.len() + 1);
    for role in stored.iter().map(String::as_str).chain(std::iter::once(ROLE_USER)) {
        if !out.iter().any(|r| r == role) {
            out.push(role.to_string());
        }
    }
    out
}

/// User account record.
///
/// `id` and `created_at` are fixed at construction. Everything else changes
/// through the setters and the lifecycle transitions; none of them validate,
/// the write boundary does that before calling in.
#[derive(Debug, Clone)]
pub struct Account {
    id: Uuid,
    name: String,
    email: String,
    phone_number: Option<String>,
    roles: Vec<String>,
    password_hash: String,
    created_at: OffsetDateTime,
    activated_at: Option<OffsetDateTime>,
    deactivated_at: Option<OffsetDateTime>,
    last_seen_at: Option<OffsetDateTime>,
    confirmation_token: Option<Uuid>,
    // never persisted; lives only until the credential encoder has run
    plain_password: Option<String>,
}

impl Account {
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        let mut account = Self {
            id: Uuid::new_v4(),
            name: name.into(),
            email: email.into(),
            phone_number: None,
            roles: Vec::new(),
            password_hash: String::new(),
            created_at: OffsetDateTime::now_utc(),
            activated_at: None,
            deactivated_at: None,
            last_seen_at: None,
            confirmation_token: None,
            plain_password: None,
        };
        account.create_confirmation_token();
        account
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn set_email(&mut self, email: impl Into<String>) {
        self.email = email.into();
    }

    /// Login name. Always the email address.
    pub fn username(&self) -> &str {
        &self.email
    }

    pub fn phone_number(&self) -> Option<&str> {
        self.phone_number.as_deref()
    }

    pub fn set_phone_number(&mut self, phone_number: Option<String>) {
        self.phone_number = phone_number;
    }

    /// Effective roles, see [`effective_roles`].
    pub fn roles(&self) -> Vec<String> {
        effective_roles(&self.roles)
    }

    /// Roles exactly as stored, without the implicit base role.
    pub fn stored_roles(&self) -> &[String] {
        &self.roles
    }

    pub fn set_roles(&mut self, roles: Vec<String>) {
        self.roles = roles;
    }

    pub fn has_role(&self, role: &str) -> bool {
        role == ROLE_USER || self.roles.iter().any(|r| r == role)
    }

    pub fn password_hash(&self) -> &str {
        &self.password_hash
    }

    /// Stores an already-encoded credential verbatim.
    pub fn set_password(&mut self, hash: impl Into<String>) {
        self.password_hash = hash.into();
    }

    pub fn has_password(&self) -> bool {
        !self.password_hash.is_empty()
    }

    pub fn plain_password(&self) -> Option<&str> {
        self.plain_password.as_deref()
    }

    pub fn set_plain_password(&mut self, plain: impl Into<String>) {
        self.plain_password = Some(plain.into());
    }

    pub fn created_at(&self) -> OffsetDateTime {
        self.created_at
    }

    pub fn activated_at(&self) -> Option<OffsetDateTime> {
        self.activated_at
    }

    pub fn deactivated_at(&self) -> Option<OffsetDateTime> {
        self.deactivated_at
    }

    pub fn last_seen_at(&self) -> Option<OffsetDateTime> {
        self.last_seen_at
    }

    pub fn set_last_seen(&mut self) {
        self.set_last_seen_at(OffsetDateTime::now_utc());
    }

    pub(crate) fn set_last_seen_at(&mut self, at: OffsetDateTime) {
        self.last_seen_at = Some(at);
    }

    pub fn confirmation_token(&self) -> Option<Uuid> {
        self.confirmation_token
    }

    pub fn create_confirmation_token(&mut self) {
        self.confirmation_token = Some(Uuid::new_v4());
    }

    pub fn activate(&mut self) {
        self.deactivated_at = None;
        self.activated_at = Some(OffsetDateTime::now_utc());
        self.confirmation_token = None;
    }

    pub fn deactivate(&mut self) {
        self.activated_at = None;
        self.deactivated_at = Some(OffsetDateTime::now_utc());
    }

    pub fn status(&self) -> AccountStatus {
        match (self.activated_at, self.deactivated_at) {
            (Some(_), _) => AccountStatus::Active,
            (None, Some(_)) => AccountStatus::Inactive,
            (None, None) => AccountStatus::Unconfirmed,
        }
    }

    pub(crate) fn clear_plain_password(&mut self) {
        self.plain_password = None;
    }
}

impl From<AccountRow> for Account {
    fn from(r: AccountRow) -> Self {
        Self {
            id: r.id,
            name: r.name,
            email: r.email,
            phone_number: r.phone_number,
            roles: r.roles.0,
            password_hash: r.password_hash,
            created_at: r.created_at,
            activated_at: r.activated_at,
            deactivated_at: r.deactivated_at,
            last_seen_at: r.last_seen_at,
            confirmation_token: r.confirmation_token,
            plain_password: None,
        }
    }
}

impl From<&Account> for AccountRow {
    fn from(a: &Account) -> Self {
        Self {
            id: a.id,
            name: a.name.clone(),
            email: a.email.clone(),
            phone_number: a.phone_number.clone(),
            roles: sqlx::types::Json(a.roles.clone()),
            password_hash: a.password_hash.clone(),
            created_at: a.created_at,
            activated_at: a.activated_at,
            deactivated_at: a.deactivated_at,
            last_seen_at: a.last_seen_at,
            confirmation_token: a.confirmation_token,
        }
    }
}
