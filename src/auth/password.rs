use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use rand::rngs::OsRng;
use tracing::error;

use crate::accounts::{identity::UserIdentity, model::Account};

/// One-way encode with a fresh salt. The PHC string carries the salt and
/// parameters, so nothing else needs storing.
pub fn hash_password(plain: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(plain.as_bytes(), &salt)
        .map_err(|e| {
            error!(error = %e, "argon2 hash_password error");
            anyhow::anyhow!(e.to_string())
        })?
        .to_string();
    Ok(hash)
}

pub fn verify_password(plain: &str, hash: &str) -> anyhow::Result<bool> {
    let parsed = PasswordHash::new(hash).map_err(|e| {
        error!(error = %e, "argon2 parse hash error");
        anyhow::anyhow!(e.to_string())
    })?;
    Ok(Argon2::default()
        .verify_password(plain.as_bytes(), &parsed)
        .is_ok())
}

/// Encodes the account's pending plaintext password, if any, and drops it.
pub fn encode_pending(account: &mut Account) -> anyhow::Result<()> {
    if let Some(plain) = account.plain_password() {
        let hash = hash_password(plain)?;
        account.set_password(hash);
    }
    account.clear_transient_credentials();
    Ok(())
}
