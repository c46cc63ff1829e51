use std::sync::Arc;

use anyhow::Context;
use sqlx::{postgres::PgPoolOptions, PgPool};
use tracing::{info, warn};

use crate::accounts::{
    memory::MemoryAccountStore,
    repo::{AccountStore, PgAccountStore},
};
use crate::config::{AppConfig, StoreBackend};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub accounts: Arc<dyn AccountStore>,
}

impl AppState {
    /// Builds the configured store. With Postgres the pool is handed back
    /// so the caller can run migrations before serving.
    pub async fn init() -> anyhow::Result<(Self, Option<PgPool>)> {
        let config = Arc::new(AppConfig::from_env()?);

        match config.store {
            StoreBackend::Postgres => {
                let db = PgPoolOptions::new()
                    .max_connections(config.db_max_connections)
                    .connect(&config.database_url)
                    .await
                    .context("connect to database")?;
                info!("using postgres account store");
                let accounts = Arc::new(PgAccountStore::new(db.clone())) as Arc<dyn AccountStore>;
                Ok((Self::from_parts(config, accounts), Some(db)))
            }
            StoreBackend::Memory => {
                warn!("using in-memory account store; data is lost on restart");
                let accounts = Arc::new(MemoryAccountStore::new()) as Arc<dyn AccountStore>;
                Ok((Self::from_parts(config, accounts), None))
            }
        }
    }

    pub fn from_parts(config: Arc<AppConfig>, accounts: Arc<dyn AccountStore>) -> Self {
        Self { config, accounts }
    }

    /// In-memory state for tests.
    #[cfg(test)]
    pub fn fake() -> Self {
        Self::from_parts(
            Arc::new(AppConfig::for_tests()),
            Arc::new(MemoryAccountStore::new()) as Arc<dyn AccountStore>,
        )
    }
}
