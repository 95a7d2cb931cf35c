//! services/juris/src/backend/mod.rs
//!
//! The backend facade the rest of the application codes against: `auth()`
//! for the session lifecycle and `from::<T>()` for typed table queries.

pub mod query;

use std::sync::Arc;

use juris_core::domain::Record;
use juris_core::ports::{AuthService, TableService};
use tracing::info;

use crate::adapters::{MockBackend, MockStore, RemoteBackend, SqliteSlots};
use crate::config::{BackendMode, Config};
use crate::error::AppError;

pub use query::{
    DeleteQuery, FilteredSelect, InsertQuery, InsertSelect, SelectQuery, TableQuery, UpdateQuery,
};

#[derive(Clone)]
pub struct Backend {
    auth: Arc<dyn AuthService>,
    tables: Arc<dyn TableService>,
    mode: &'static str,
}

impl Backend {
    pub fn new(auth: Arc<dyn AuthService>, tables: Arc<dyn TableService>) -> Self {
        Self {
            auth,
            tables,
            mode: "custom",
        }
    }

    pub fn mock(mock: Arc<MockBackend>) -> Self {
        Self {
            auth: mock.clone(),
            tables: mock,
            mode: "mock",
        }
    }

    pub fn remote(remote: Arc<RemoteBackend>) -> Self {
        Self {
            auth: remote.clone(),
            tables: remote,
            mode: "remote",
        }
    }

    /// Picks the remote backend when it is configured, otherwise opens the
    /// mock on the configured slot database.
    pub async fn connect(config: &Config, http: reqwest::Client) -> Result<Self, AppError> {
        match config.backend_mode() {
            BackendMode::Remote { url, anon_key } => {
                info!("Using remote backend at {}", url);
                Ok(Self::remote(Arc::new(RemoteBackend::new(http, url, anon_key))))
            }
            BackendMode::Mock => {
                info!("No backend configured; using the local mock at {}", config.storage_url);
                let slots = SqliteSlots::connect(&config.storage_url).await?;
                let store = MockStore::open(Arc::new(slots)).await?;
                let mock = MockBackend::new(Arc::new(store), config.mock_latency).await;
                Ok(Self::mock(Arc::new(mock)))
            }
        }
    }

    /// `"mock"`, `"remote"` or `"custom"`.
    pub fn mode(&self) -> &'static str {
        self.mode
    }

    pub fn auth(&self) -> &dyn AuthService {
        self.auth.as_ref()
    }

    pub fn from<T: Record>(&self) -> TableQuery<T> {
        TableQuery::new(self.tables.clone())
    }
}
