//! services/juris/src/adapters/slots.rs
//!
//! Durable key/value slots for the mock backend, the server-side analogue of
//! browser local storage. Implements the `SlotStorage` port twice: in memory
//! for tests and throwaway runs, and on SQLite through `sqlx`.

use std::collections::HashMap;

use async_trait::async_trait;
use juris_core::ports::{PortError, PortResult, SlotStorage};
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use tokio::sync::RwLock;

//=========================================================================================
// In-memory slots
//=========================================================================================

/// Slots that live only as long as the process.
#[derive(Default)]
pub struct MemorySlots {
    slots: RwLock<HashMap<String, String>>,
}

impl MemorySlots {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SlotStorage for MemorySlots {
    async fn get(&self, key: &str) -> PortResult<Option<String>> {
        Ok(self.slots.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> PortResult<()> {
        self.slots
            .write()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> PortResult<()> {
        self.slots.write().await.remove(key);
        Ok(())
    }
}

//=========================================================================================
// SQLite slots
//=========================================================================================

/// Slots persisted in a single `slots` table.
#[derive(Clone)]
pub struct SqliteSlots {
    pool: SqlitePool,
}

impl SqliteSlots {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Opens the database at `url` and makes sure the slot table exists.
    ///
    /// SQLite allows a single writer, so the pool holds one connection. This
    /// also keeps `sqlite::memory:` databases shared across calls.
    pub async fn connect(url: &str) -> Result<Self, sqlx::Error> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect(url)
            .await?;
        let slots = Self::new(pool);
        slots.run_migrations().await?;
        Ok(slots)
    }

    pub async fn run_migrations(&self) -> Result<(), sqlx::Error> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS slots (
                key TEXT PRIMARY KEY NOT NULL,
                value TEXT NOT NULL
            )",
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl SlotStorage for SqliteSlots {
    async fn get(&self, key: &str) -> PortResult<Option<String>> {
        let value: Option<String> = sqlx::query_scalar("SELECT value FROM slots WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| PortError::Storage(e.to_string()))?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: &str) -> PortResult<()> {
        sqlx::query(
            "INSERT INTO slots (key, value) VALUES (?, ?)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        )
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await
        .map_err(|e| PortError::Storage(e.to_string()))?;
        Ok(())
    }

    async fn remove(&self, key: &str) -> PortResult<()> {
        sqlx::query("DELETE FROM slots WHERE key = ?")
            .bind(key)
            .execute(&self.pool)
            .await
            .map_err(|e| PortError::Storage(e.to_string()))?;
        Ok(())
    }
}
