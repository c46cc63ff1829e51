use lazy_static::lazy_static;
use regex::Regex;
use time::OffsetDateTime;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::{
    dto::{AccountPatch, AccountWrite},
    model::{Account, AccountStatus},
    repo::{AccountStore, StoreError},
    validation,
};
use crate::{
    auth::password::{encode_pending, hash_password, verify_password},
    error::{AppError, AppResult, FieldError},
};

fn is_valid_role(role: &str) -> bool {
    lazy_static! {
        static ref ROLE_RE: Regex = Regex::new(r"^ROLE_[A-Z0-9_]+$").unwrap();
    }
    ROLE_RE.is_match(role)
}

pub async fn load(store: &dyn AccountStore, id: Uuid) -> AppResult<Account> {
    store
        .find_by_id(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Account not found".into()))
}

#[instrument(skip(store, payload))]
pub async fn register(store: &dyn AccountStore, payload: AccountWrite) -> AppResult<Account> {
    let name = payload.name.trim().to_string();
    let email = validation::normalize_email(&payload.email);
    let phone = payload.phone_number.filter(|p| !p.trim().is_empty());

    let mut errors = Vec::new();
    validation::check_name(&name, &mut errors);
    validation::check_email(&email, &mut errors);
    validation::check_phone_number(phone.as_deref(), &mut errors);
    validation::check_password(&payload.password, &mut errors);
    validation::finish(errors).map_err(|fields| {
        warn!(email = %email, "registration rejected");
        AppError::Validation(fields)
    })?;

    // early answer for the common case; the store re-checks atomically
    if store.find_by_email(&email).await?.is_some() {
        warn!(email = %email, "email already registered");
        return Err(AppError::Conflict("Email already registered".into()));
    }

    let mut account = Account::new(name, email);
    account.set_phone_number(phone);
    account.set_plain_password(payload.password);
    encode_pending(&mut account)?;

    store.insert(&account).await?;
    info!(account_id = %account.id(), email = %account.email(), "account registered");
    Ok(account)
}

#[instrument(skip(store, patch))]
pub async fn update_profile(
    store: &dyn AccountStore,
    id: Uuid,
    patch: AccountPatch,
) -> AppResult<Account> {
    let name = patch.name.as_deref().map(|n| n.trim().to_string());
    let email = patch.email.as_deref().map(validation::normalize_email);
    let phone = patch
        .phone_number
        .map(|p| p.filter(|v| !v.trim().is_empty()));

    let mut errors = Vec::new();
    if let Some(name) = &name {
        validation::check_name(name, &mut errors);
    }
    if let Some(email) = &email {
        validation::check_email(email, &mut errors);
    }
    if let Some(phone) = &phone {
        validation::check_phone_number(phone.as_deref(), &mut errors);
    }
    if let Some(password) = &patch.password {
        validation::check_password(password, &mut errors);
    }
    validation::finish(errors).map_err(AppError::Validation)?;

    // hashing is slow; keep it outside the row lock
    let hash = patch.password.as_deref().map(hash_password).transpose()?;

    let account = store
        .modify(id, &|account| {
            if let Some(name) = &name {
                account.set_name(name.clone());
            }
            if let Some(email) = &email {
                account.set_email(email.clone());
            }
            if let Some(phone) = &phone {
                account.set_phone_number(phone.clone());
            }
            if let Some(hash) = &hash {
                account.set_password(hash.clone());
            }
            Ok(())
        })
        .await?;
    info!(account_id = %id, "account updated");
    Ok(account)
}

/// Activates the still unconfirmed account holding `token`. Activation
/// clears the token, so a second call finds nothing; a deactivated account
/// is refused so the token cannot undo an admin's decision.
#[instrument(skip(store))]
pub async fn confirm(store: &dyn AccountStore, token: Uuid) -> AppResult<Account> {
    let found = store
        .find_by_confirmation_token(token)
        .await?
        .ok_or_else(|| AppError::NotFound("Unknown confirmation token".into()))?;
    ensure_not_deactivated(&found)?;
    if found.status() != AccountStatus::Unconfirmed {
        return Err(AppError::Conflict("Account is already active".into()));
    }

    let account = store
        .modify(found.id(), &|account| {
            if account.confirmation_token() != Some(token)
                || account.status() != AccountStatus::Unconfirmed
            {
                return Err(StoreError::Rejected("Confirmation token is no longer valid".into()));
            }
            account.activate();
            Ok(())
        })
        .await?;
    info!(account_id = %account.id(), "account confirmed");
    Ok(account)
}

#[instrument(skip(store))]
pub async fn activate(store: &dyn AccountStore, id: Uuid) -> AppResult<Account> {
    let account = store
        .modify(id, &|account| {
            account.activate();
            Ok(())
        })
        .await?;
    info!(account_id = %id, "account activated");
    Ok(account)
}

#[instrument(skip(store))]
pub async fn deactivate(store: &dyn AccountStore, id: Uuid) -> AppResult<Account> {
    let account = store
        .modify(id, &|account| {
            account.deactivate();
            Ok(())
        })
        .await?;
    info!(account_id = %id, "account deactivated");
    Ok(account)
}

#[instrument(skip(store))]
pub async fn regenerate_confirmation_token(
    store: &dyn AccountStore,
    id: Uuid,
) -> AppResult<Account> {
    let account = store
        .modify(id, &|account| {
            account.create_confirmation_token();
            Ok(())
        })
        .await?;
    info!(account_id = %id, "confirmation token regenerated");
    Ok(account)
}

#[instrument(skip(store))]
pub async fn set_roles(store: &dyn AccountStore, id: Uuid, roles: Vec<String>) -> AppResult<Account> {
    let invalid: Vec<FieldError> = roles
        .iter()
        .filter(|r| !is_valid_role(r))
        .map(|r| FieldError::new("roles", format!("invalid role label {:?}", r)))
        .collect();
    validation::finish(invalid).map_err(AppError::Validation)?;

    let account = store
        .modify(id, &|account| {
            account.set_roles(roles.clone());
            Ok(())
        })
        .await?;
    info!(account_id = %id, roles = ?account.roles(), "roles replaced");
    Ok(account)
}

/// Stamps `last_seen_at` in the store and on `account`. Only that column is
/// written, so a concurrent lifecycle change is never overwritten.
pub async fn record_activity(store: &dyn AccountStore, account: &mut Account) -> AppResult<()> {
    let at = OffsetDateTime::now_utc();
    store.touch_last_seen(account.id(), at).await?;
    account.set_last_seen_at(at);
    Ok(())
}

#[instrument(skip(store))]
pub async fn delete(store: &dyn AccountStore, id: Uuid) -> AppResult<()> {
    store.delete(id).await?;
    info!(account_id = %id, "account deleted");
    Ok(())
}

/// Checks credentials and records the login as activity. Deactivated
/// accounts are refused even with a correct password.
#[instrument(skip(store, password))]
pub async fn authenticate(
    store: &dyn AccountStore,
    email: &str,
    password: &str,
) -> AppResult<Account> {
    let email = validation::normalize_email(email);
    let invalid = || AppError::Unauthorized("Invalid credentials".into());

    let Some(mut account) = store.find_by_email(&email).await? else {
        warn!(email = %email, "login unknown email");
        return Err(invalid());
    };

    if !verify_password(password, account.password_hash())? {
        warn!(email = %email, account_id = %account.id(), "login invalid password");
        return Err(invalid());
    }

    ensure_not_deactivated(&account)?;
    record_activity(store, &mut account).await?;
    info!(account_id = %account.id(), "account logged in");
    Ok(account)
}

pub fn ensure_not_deactivated(account: &Account) -> AppResult<()> {
    if account.status() == AccountStatus::Inactive {
        warn!(account_id = %account.id(), "deactivated account refused");
        return Err(AppError::Forbidden("Account is deactivated".into()));
    }
    Ok(())
}
