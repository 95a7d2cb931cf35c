//! services/juris/src/adapters/mock_store.rs
//!
//! The state behind the mock backend: the active session and one row
//! collection per table, mirrored into durable slots.
//!
//! The store is an explicit object. It is loaded from its `SlotStorage` when
//! opened, and every mutation writes the touched slots back before the new
//! state becomes visible.

use std::sync::Arc;

use chrono::{Duration, Utc};
use juris_core::domain::{AccountStatus, Profile, Role, Session, Table};
use juris_core::ports::{to_row, PortError, PortResult, Row, SlotStorage};
use serde::{de::DeserializeOwned, Serialize};
use tokio::sync::Mutex;
use tracing::{info, warn};
use uuid::Uuid;

pub const SESSION_SLOT: &str = "juris.session";
pub const PROFILES_SLOT: &str = "juris.profiles";
pub const PETITIONS_SLOT: &str = "juris.petitions";
pub const DEADLINES_SLOT: &str = "juris.deadlines";
pub const JURISPRUDENCE_SLOT: &str = "juris.jurisprudence";

/// The fixed identity behind every demo sign-in.
pub const DEMO_USER_ID: Uuid = Uuid::from_u128(0x6a1b_3c5d_0000_4000_8000_00de_0000_0001);
pub const DEMO_EMAIL: &str = "demo@juris.app";

/// A durable slot touched by a mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slot {
    Session,
    Rows(Table),
}

impl Slot {
    fn key(self) -> PortResult<&'static str> {
        match self {
            Slot::Session => Ok(SESSION_SLOT),
            Slot::Rows(table) => table_slot(table),
        }
    }
}

fn table_slot(table: Table) -> PortResult<&'static str> {
    match table {
        Table::Profiles => Ok(PROFILES_SLOT),
        Table::Petitions => Ok(PETITIONS_SLOT),
        Table::Deadlines => Ok(DEADLINES_SLOT),
        Table::SavedJurisprudence => Ok(JURISPRUDENCE_SLOT),
        Table::UsageLimits => Err(PortError::Validation(
            "usage_limits is computed and has no storage".to_string(),
        )),
    }
}

#[derive(Debug, Clone, Default)]
pub struct StoreState {
    pub session: Option<Session>,
    pub profiles: Vec<Row>,
    pub petitions: Vec<Row>,
    pub deadlines: Vec<Row>,
    pub jurisprudence: Vec<Row>,
}

impl StoreState {
    pub fn rows(&self, table: Table) -> PortResult<&Vec<Row>> {
        match table {
            Table::Profiles => Ok(&self.profiles),
            Table::Petitions => Ok(&self.petitions),
            Table::Deadlines => Ok(&self.deadlines),
            Table::SavedJurisprudence => Ok(&self.jurisprudence),
            Table::UsageLimits => Err(PortError::Validation(
                "usage_limits is computed and cannot be written".to_string(),
            )),
        }
    }

    pub fn rows_mut(&mut self, table: Table) -> PortResult<&mut Vec<Row>> {
        match table {
            Table::Profiles => Ok(&mut self.profiles),
            Table::Petitions => Ok(&mut self.petitions),
            Table::Deadlines => Ok(&mut self.deadlines),
            Table::SavedJurisprudence => Ok(&mut self.jurisprudence),
            Table::UsageLimits => Err(PortError::Validation(
                "usage_limits is computed and cannot be written".to_string(),
            )),
        }
    }
}

pub struct MockStore {
    storage: Arc<dyn SlotStorage>,
    state: Mutex<StoreState>,
}

impl MockStore {
    /// Loads every slot from `storage`, seeding the demo profiles on first use.
    pub async fn open(storage: Arc<dyn SlotStorage>) -> PortResult<Self> {
        let session = load_slot::<Session>(storage.as_ref(), SESSION_SLOT).await?;
        let mut state = StoreState {
            session,
            profiles: load_rows(storage.as_ref(), PROFILES_SLOT).await?,
            petitions: load_rows(storage.as_ref(), PETITIONS_SLOT).await?,
            deadlines: load_rows(storage.as_ref(), DEADLINES_SLOT).await?,
            jurisprudence: load_rows(storage.as_ref(), JURISPRUDENCE_SLOT).await?,
        };

        let store_is_new = state.profiles.is_empty();
        if store_is_new {
            state.profiles = demo_profiles()?;
        }

        let store = Self {
            storage,
            state: Mutex::new(state),
        };
        if store_is_new {
            info!("Seeding demo profiles into a fresh mock store.");
            let state = store.state.lock().await;
            store.persist(&state, &[Slot::Rows(Table::Profiles)]).await?;
        }
        Ok(store)
    }

    /// Runs `read` against the current state.
    pub async fn read<T, F>(&self, read: F) -> T
    where
        F: FnOnce(&StoreState) -> T,
    {
        let state = self.state.lock().await;
        read(&state)
    }

    /// Applies `operation` to a copy of the state, writes the touched slots,
    /// and only then publishes the copy. A failed write leaves the state as
    /// it was.
    pub async fn mutate<T, F>(&self, touched: &[Slot], operation: F) -> PortResult<T>
    where
        F: FnOnce(&mut StoreState) -> PortResult<T>,
    {
        let mut state = self.state.lock().await;
        let mut next = state.clone();
        let result = operation(&mut next)?;
        self.persist(&next, touched).await?;
        *state = next;
        Ok(result)
    }

    async fn persist(&self, state: &StoreState, touched: &[Slot]) -> PortResult<()> {
        for slot in touched {
            let key = slot.key()?;
            match slot {
                Slot::Session => match &state.session {
                    Some(session) => self.storage.set(key, &encode(session)?).await?,
                    None => self.storage.remove(key).await?,
                },
                Slot::Rows(table) => {
                    let rows = state.rows(*table)?;
                    self.storage.set(key, &encode(rows)?).await?;
                }
            }
        }
        Ok(())
    }
}

fn encode<T: Serialize + ?Sized>(value: &T) -> PortResult<String> {
    serde_json::to_string(value)
        .map_err(|e| PortError::Storage(format!("failed to encode slot payload: {}", e)))
}

/// Reads one slot. A missing slot is `None`; an unreadable payload is logged
/// and treated as missing so a corrupt slot never blocks startup.
async fn load_slot<T: DeserializeOwned>(
    storage: &dyn SlotStorage,
    key: &str,
) -> PortResult<Option<T>> {
    let Some(raw) = storage.get(key).await? else {
        return Ok(None);
    };

    match serde_json::from_str::<T>(&raw) {
        Ok(value) => Ok(Some(value)),
        Err(error) => {
            warn!(slot = key, error = %error, "failed to parse slot; starting it empty");
            Ok(None)
        }
    }
}

async fn load_rows(storage: &dyn SlotStorage, key: &str) -> PortResult<Vec<Row>> {
    Ok(load_slot::<Vec<Row>>(storage, key).await?.unwrap_or_default())
}

/// Fixture accounts so the admin screens have something to show.
fn demo_profiles() -> PortResult<Vec<Row>> {
    let now = Utc::now();
    let profiles = [
        Profile {
            id: DEMO_USER_ID,
            full_name: "Dra. Helena Demo".to_string(),
            email: DEMO_EMAIL.to_string(),
            account_status: AccountStatus::Active,
            role: Role::Admin,
            created_at: now - Duration::days(90),
        },
        Profile {
            id: Uuid::from_u128(0x6a1b_3c5d_0000_4000_8000_00de_0000_0002),
            full_name: "Carlos Mendes".to_string(),
            email: "carlos.mendes@advocacia.com.br".to_string(),
            account_status: AccountStatus::Trial,
            role: Role::User,
            created_at: now - Duration::days(12),
        },
        Profile {
            id: Uuid::from_u128(0x6a1b_3c5d_0000_4000_8000_00de_0000_0003),
            full_name: "Beatriz Lima".to_string(),
            email: "beatriz.lima@escritorio.adv.br".to_string(),
            account_status: AccountStatus::Blocked,
            role: Role::User,
            created_at: now - Duration::days(40),
        },
    ];
    profiles.iter().map(to_row).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::slots::MemorySlots;
    use async_trait::async_trait;
    use serde_json::json;

    #[tokio::test]
    async fn fresh_store_seeds_and_persists_demo_profiles() {
        let slots = Arc::new(MemorySlots::new());
        let store = MockStore::open(slots.clone()).await.unwrap();

        let count = store.read(|state| state.profiles.len()).await;
        assert_eq!(count, 3);
        let raw = slots.get(PROFILES_SLOT).await.unwrap().unwrap();
        assert!(raw.contains(DEMO_EMAIL));
    }

    #[tokio::test]
    async fn state_survives_reopening_the_same_slots() {
        let slots = Arc::new(MemorySlots::new());
        let store = MockStore::open(slots.clone()).await.unwrap();
        store
            .mutate(&[Slot::Rows(Table::Deadlines)], |state| {
                let row = json!({"id": "d1", "title": "Contestação"});
                state.deadlines.push(row.as_object().cloned().unwrap());
                Ok(())
            })
            .await
            .unwrap();

        let reopened = MockStore::open(slots).await.unwrap();
        assert_eq!(reopened.read(|state| state.deadlines.len()).await, 1);
        assert_eq!(reopened.read(|state| state.profiles.len()).await, 3);
    }

    #[tokio::test]
    async fn corrupt_slot_boots_empty() {
        let slots = Arc::new(MemorySlots::new());
        slots.set(PETITIONS_SLOT, "not json").await.unwrap();

        let store = MockStore::open(slots).await.unwrap();

        assert!(store.read(|state| state.petitions.is_empty()).await);
    }

    struct FailingSlots;

    #[async_trait]
    impl SlotStorage for FailingSlots {
        async fn get(&self, _key: &str) -> PortResult<Option<String>> {
            // Pretend profiles already exist so `open` does not write.
            Ok(Some("[{\"id\":\"x\"}]".to_string()))
        }
        async fn set(&self, _key: &str, _value: &str) -> PortResult<()> {
            Err(PortError::Storage("disk full".to_string()))
        }
        async fn remove(&self, _key: &str) -> PortResult<()> {
            Err(PortError::Storage("disk full".to_string()))
        }
    }

    #[tokio::test]
    async fn failed_write_leaves_state_untouched() {
        let store = MockStore::open(Arc::new(FailingSlots)).await.unwrap();
        let before = store.read(|state| state.deadlines.len()).await;

        let result = store
            .mutate(&[Slot::Rows(Table::Deadlines)], |state| {
                state.deadlines.push(Row::new());
                Ok(())
            })
            .await;

        assert!(matches!(result, Err(PortError::Storage(_))));
        assert_eq!(store.read(|state| state.deadlines.len()).await, before);
    }
}
