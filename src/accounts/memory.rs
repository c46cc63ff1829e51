use std::collections::HashMap;

use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{
    model::Account,
    repo::{AccountStore, Change, StoreError, StoreResult},
};

/// Process-local store. The uniqueness check and the write happen under one
/// write guard, so concurrent registrations of the same email cannot both
/// succeed.
#[derive(Default)]
pub struct MemoryAccountStore {
    accounts: RwLock<HashMap<Uuid, Account>>,
}

impl MemoryAccountStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn email_taken(map: &HashMap<Uuid, Account>, email: &str, except: Uuid) -> bool {
    map.values().any(|a| a.id() != except && a.email() == email)
}

#[async_trait]
impl AccountStore for MemoryAccountStore {
    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<Account>> {
        Ok(self.accounts.read().await.get(&id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> StoreResult<Option<Account>> {
        let map = self.accounts.read().await;
        Ok(map.values().find(|a| a.email() == email).cloned())
    }

    async fn find_by_confirmation_token(&self, token: Uuid) -> StoreResult<Option<Account>> {
        let map = self.accounts.read().await;
        Ok(map
            .values()
            .find(|a| a.confirmation_token() == Some(token))
            .cloned())
    }

    async fn insert(&self, account: &Account) -> StoreResult<()> {
        let mut map = self.accounts.write().await;
        if email_taken(&map, account.email(), account.id()) {
            return Err(StoreError::DuplicateEmail);
        }
        if map.contains_key(&account.id()) {
            return Err(StoreError::Backend(anyhow::anyhow!(
                "duplicate account id {}",
                account.id()
            )));
        }
        let mut stored = account.clone();
        stored.clear_plain_password();
        map.insert(stored.id(), stored);
        Ok(())
    }

    async fn update(&self, account: &Account) -> StoreResult<()> {
        let mut map = self.accounts.write().await;
        if !map.contains_key(&account.id()) {
            return Err(StoreError::NotFound);
        }
        if email_taken(&map, account.email(), account.id()) {
            return Err(StoreError::DuplicateEmail);
        }
        let mut stored = account.clone();
        stored.clear_plain_password();
        map.insert(stored.id(), stored);
        Ok(())
    }

    async fn modify(&self, id: Uuid, change: Change<'_>) -> StoreResult<Account> {
        let mut map = self.accounts.write().await;
        let mut next = map.get(&id).cloned().ok_or(StoreError::NotFound)?;
        change(&mut next)?;
        if email_taken(&map, next.email(), id) {
            return Err(StoreError::DuplicateEmail);
        }
        next.clear_plain_password();
        map.insert(id, next.clone());
        Ok(next)
    }

    async fn touch_last_seen(&self, id: Uuid, at: OffsetDateTime) -> StoreResult<()> {
        let mut map = self.accounts.write().await;
        let account = map.get_mut(&id).ok_or(StoreError::NotFound)?;
        account.set_last_seen_at(at);
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> StoreResult<()> {
        match self.accounts.write().await.remove(&id) {
            Some(_) => Ok(()),
            None => Err(StoreError::NotFound),
        }
    }
}
