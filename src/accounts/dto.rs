use serde::{Deserialize, Deserializer, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use super::model::{Account, AccountStatus};

/// Read profile of an account.
#[derive(Debug, Serialize)]
pub struct AccountView {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub phone_number: Option<String>,
    pub roles: Vec<String>,
    pub has_password: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339::option")]
    pub activated_at: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub deactivated_at: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub last_seen_at: Option<OffsetDateTime>,
    pub confirmation_token: Option<Uuid>,
}

impl From<&Account> for AccountView {
    fn from(a: &Account) -> Self {
        Self {
            id: a.id(),
            name: a.name().to_string(),
            email: a.email().to_string(),
            phone_number: a.phone_number().map(str::to_string),
            roles: a.roles(),
            has_password: a.has_password(),
            created_at: a.created_at(),
            activated_at: a.activated_at(),
            deactivated_at: a.deactivated_at(),
            last_seen_at: a.last_seen_at(),
            confirmation_token: a.confirmation_token(),
        }
    }
}

/// Write profile, used on registration. Anything outside it is ignored.
#[derive(Debug, Deserialize)]
pub struct AccountWrite {
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub phone_number: Option<String>,
    pub password: String,
}

/// Partial write profile. `phone_number: null` clears the number, leaving
/// it out keeps it.
#[derive(Debug, Default, Deserialize)]
pub struct AccountPatch {
    pub name: Option<String>,
    pub email: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub phone_number: Option<Option<String>>,
    pub password: Option<String>,
}

fn double_option<'de, D, T>(de: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(de).map(Some)
}

#[derive(Debug, Deserialize)]
pub struct ConfirmRequest {
    pub token: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct RolesRequest {
    pub roles: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub id: Uuid,
    pub status: AccountStatus,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accounts::schema::{fields_for, Profile};

    #[test]
    fn view_keys_match_read_profile() {
        let mut account = Account::new("Ann", "a@example.com");
        account.set_password("$argon2id$secret-hash");
        let json = serde_json::to_value(AccountView::from(&account)).unwrap();
        let mut keys: Vec<_> = json.as_object().unwrap().keys().cloned().collect();
        let mut expected: Vec<_> = fields_for(Profile::Read).map(str::to_string).collect();
        keys.sort();
        expected.sort();
        assert_eq!(keys, expected);

        let text = json.to_string();
        assert!(!text.contains("secret-hash"));
        assert_eq!(json["has_password"], true);
        assert_eq!(json["roles"], serde_json::json!(["ROLE_USER"]));
        assert!(json["activated_at"].is_null());
    }

    #[test]
    fn view_timestamps_are_rfc3339() {
        let mut account = Account::new("Ann", "a@example.com");
        account.activate();
        let json = serde_json::to_value(AccountView::from(&account)).unwrap();
        let ts = json["activated_at"].as_str().unwrap();
        assert!(OffsetDateTime::parse(ts, &time::format_description::well_known::Rfc3339).is_ok());
        assert!(json["confirmation_token"].is_null());
    }

    #[test]
    fn write_ignores_read_only_fields() {
        let body = r#"{"name":"Ann","email":"a@example.com","password":"hunter2222",
                       "roles":["ROLE_ADMIN"],"id":"00000000-0000-0000-0000-000000000000"}"#;
        let w: AccountWrite = serde_json::from_str(body).unwrap();
        assert_eq!(w.name, "Ann");
        assert!(w.phone_number.is_none());
    }

    #[test]
    fn patch_distinguishes_null_from_missing() {
        let p: AccountPatch = serde_json::from_str(r#"{"phone_number":null}"#).unwrap();
        assert_eq!(p.phone_number, Some(None));
        let p: AccountPatch = serde_json::from_str(r#"{"name":"Bob"}"#).unwrap();
        assert_eq!(p.phone_number, None);
        let p: AccountPatch = serde_json::from_str(r#"{"phone_number":"+1"}"#).unwrap();
        assert_eq!(p.phone_number, Some(Some("+1".into())));
    }
}
