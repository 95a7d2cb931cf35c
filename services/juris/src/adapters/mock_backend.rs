//! services/juris/src/adapters/mock_backend.rs
//!
//! A local stand-in for the BaaS provider. Implements the `AuthService` and
//! `TableService` ports over a `MockStore`, so the rest of the application
//! cannot tell it apart from the remote backend.
//!
//! Sign-in performs no password check: any demo-looking email binds to the
//! demo account and any other email gets a fresh identity.

use std::cmp::Ordering as CmpOrdering;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{Datelike, TimeZone, Utc};
use juris_core::domain::{
    AuthEvent, Credentials, NewProfile, Session, SessionUser, SignUp, Table, UsageLimit,
    UserUpdate,
};
use juris_core::events::{AuthChannel, AuthListener, Subscription};
use juris_core::ports::{
    to_row, AuthService, Filter, PortError, PortResult, Row, SelectSpec, TableService,
};
use serde_json::Value;
use tracing::{debug, info};
use uuid::Uuid;

use crate::adapters::mock_store::{MockStore, Slot, StoreState, DEMO_EMAIL, DEMO_USER_ID};

/// Drafts allowed per month for every account in mock mode.
pub const DEFAULT_MONTHLY_LIMIT: u32 = 50;

const SESSION_TTL_SECS: u64 = 3600;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

#[derive(Clone)]
pub struct MockBackend {
    store: Arc<MockStore>,
    channel: AuthChannel,
    latency: Duration,
}

impl MockBackend {
    /// Creates a new `MockBackend`. Subscribers start from the session the
    /// store restored, if any.
    pub async fn new(store: Arc<MockStore>, latency: Duration) -> Self {
        let session = store.read(|state| state.session.clone()).await;
        Self {
            store,
            channel: AuthChannel::new(session),
            latency,
        }
    }

    /// Simulated network round trip.
    async fn tick(&self) {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
    }

    async fn start_session(&self, session: Session, profile: Option<NewProfile>) -> PortResult<Session> {
        let mut touched = vec![Slot::Session];
        if profile.is_some() {
            touched.push(Slot::Rows(Table::Profiles));
        }

        let stored = session.clone();
        self.store
            .mutate(&touched, move |state| {
                if let Some(profile) = profile {
                    let mut row = to_row(&profile)?;
                    stamp_created_at(&mut row);
                    state.profiles.push(row);
                }
                state.session = Some(stored);
                Ok(())
            })
            .await?;

        self.tick().await;
        self.channel.publish(AuthEvent::signed_in(session.clone()));
        Ok(session)
    }
}

fn is_demo_email(email: &str) -> bool {
    email
        .trim()
        .split('@')
        .next()
        .map(|local| local.to_lowercase().contains("demo"))
        .unwrap_or(false)
}

fn new_session(user_id: Uuid, email: &str) -> Session {
    Session {
        user: SessionUser {
            id: user_id,
            email: email.trim().to_string(),
        },
        access_token: format!("mock-{}", Uuid::new_v4().simple()),
        expires_in: SESSION_TTL_SECS,
    }
}

fn stamp_created_at(row: &mut Row) {
    row.insert("created_at".to_string(), Value::String(Utc::now().to_rfc3339()));
}

//=========================================================================================
// `AuthService` Trait Implementation
//=========================================================================================

#[async_trait]
impl AuthService for MockBackend {
    async fn get_session(&self) -> Option<Session> {
        self.store.read(|state| state.session.clone()).await
    }

    fn on_auth_state_change(&self, listener: AuthListener) -> Subscription {
        self.channel.subscribe(listener)
    }

    async fn sign_in_with_password(&self, credentials: Credentials) -> PortResult<Session> {
        let session = if is_demo_email(&credentials.email) {
            new_session(DEMO_USER_ID, DEMO_EMAIL)
        } else {
            new_session(Uuid::new_v4(), &credentials.email)
        };
        info!(user_id = %session.user.id, "Mock sign-in.");
        self.start_session(session, None).await
    }

    async fn sign_up(&self, request: SignUp) -> PortResult<Session> {
        if request.email.trim().is_empty() {
            return Err(PortError::Validation("E-mail é obrigatório.".to_string()));
        }

        let session = new_session(Uuid::new_v4(), &request.email);
        let profile = NewProfile::trial(session.user.id, request.full_name.trim(), session.user.email.clone());
        info!(user_id = %session.user.id, "Mock sign-up.");
        self.start_session(session, Some(profile)).await
    }

    async fn sign_out(&self) -> PortResult<()> {
        self.store
            .mutate(&[Slot::Session], |state| {
                state.session = None;
                Ok(())
            })
            .await?;

        self.tick().await;
        self.channel.publish(AuthEvent::signed_out());
        info!("Mock sign-out.");
        Ok(())
    }

    async fn update_user(&self, update: UserUpdate) -> PortResult<()> {
        self.tick().await;
        match update.password {
            Some(password) if !password.is_empty() => Ok(()),
            _ => Err(PortError::Validation("Nenhuma senha informada.".to_string())),
        }
    }
}

//=========================================================================================
// `TableService` Trait Implementation
//=========================================================================================

#[async_trait]
impl TableService for MockBackend {
    async fn select(&self, table: Table, spec: SelectSpec) -> PortResult<Vec<Row>> {
        let rows = self
            .store
            .read(|state| {
                if table == Table::UsageLimits {
                    return usage_rows(state, spec.filter.as_ref());
                }
                let mut rows: Vec<Row> = state
                    .rows(table)?
                    .iter()
                    .filter(|row| spec.filter.as_ref().map_or(true, |f| f.matches(row)))
                    .cloned()
                    .collect();
                if let Some(order) = &spec.order {
                    rows.sort_by(|a, b| {
                        let ordering = compare_values(a.get(&order.column), b.get(&order.column));
                        if order.ascending {
                            ordering
                        } else {
                            ordering.reverse()
                        }
                    });
                }
                Ok(rows)
            })
            .await?;

        self.tick().await;
        debug!(%table, count = rows.len(), "Mock select.");
        Ok(rows)
    }

    async fn insert(&self, table: Table, rows: Vec<Row>) -> PortResult<Vec<Row>> {
        if rows.is_empty() {
            return Err(PortError::Validation(format!("nothing to insert into {}", table)));
        }

        let inserted = self
            .store
            .mutate(&[Slot::Rows(table)], |state| {
                let collection = state.rows_mut(table)?;
                let mut inserted = Vec::with_capacity(rows.len());
                for mut row in rows {
                    if !matches!(row.get("id"), Some(Value::String(_))) {
                        row.insert("id".to_string(), Value::String(Uuid::new_v4().to_string()));
                    }
                    stamp_created_at(&mut row);
                    match table {
                        Table::Petitions => {
                            row.entry("filed").or_insert(Value::Bool(false));
                        }
                        Table::Deadlines => {
                            row.entry("status")
                                .or_insert(Value::String("pending".to_string()));
                        }
                        _ => {}
                    }
                    collection.push(row.clone());
                    inserted.push(row);
                }
                Ok(inserted)
            })
            .await?;

        self.tick().await;
        debug!(%table, count = inserted.len(), "Mock insert.");
        Ok(inserted)
    }

    async fn update(&self, table: Table, filter: Filter, patch: Row) -> PortResult<Vec<Row>> {
        let updated = self
            .store
            .mutate(&[Slot::Rows(table)], |state| {
                let mut updated = Vec::new();
                for row in state.rows_mut(table)?.iter_mut().filter(|row| filter.matches(row)) {
                    for (column, value) in &patch {
                        row.insert(column.clone(), value.clone());
                    }
                    updated.push(row.clone());
                }
                Ok(updated)
            })
            .await?;

        self.tick().await;
        debug!(%table, count = updated.len(), "Mock update.");
        Ok(updated)
    }

    async fn delete(&self, table: Table, filter: Filter) -> PortResult<Vec<Row>> {
        let removed = self
            .store
            .mutate(&[Slot::Rows(table)], |state| {
                let collection = state.rows_mut(table)?;
                let (removed, kept): (Vec<Row>, Vec<Row>) =
                    collection.drain(..).partition(|row| filter.matches(row));
                *collection = kept;
                Ok(removed)
            })
            .await?;

        self.tick().await;
        debug!(%table, count = removed.len(), "Mock delete.");
        Ok(removed)
    }
}

/// Usage snapshots are derived: the used count is the number of petitions
/// the user owns.
fn usage_rows(state: &StoreState, filter: Option<&Filter>) -> PortResult<Vec<Row>> {
    let user_ids: Vec<Value> = match filter {
        Some(filter) if filter.column == "user_id" => vec![filter.value.clone()],
        Some(filter) => {
            return Err(PortError::Validation(format!(
                "usage_limits can only be filtered by user_id, not {}",
                filter.column
            )))
        }
        None => state
            .profiles
            .iter()
            .filter_map(|row| row.get("id").cloned())
            .collect(),
    };

    let now = Utc::now();
    let last_reset = Utc
        .with_ymd_and_hms(now.year(), now.month(), 1, 0, 0, 0)
        .single()
        .unwrap_or(now);

    user_ids
        .into_iter()
        .map(|user_id| {
            let used = state
                .petitions
                .iter()
                .filter(|row| row.get("user_id") == Some(&user_id))
                .count();
            let user_id = match &user_id {
                Value::String(raw) => Uuid::parse_str(raw)
                    .map_err(|e| PortError::Validation(format!("invalid user_id: {}", e)))?,
                other => {
                    return Err(PortError::Validation(format!("invalid user_id: {}", other)))
                }
            };
            to_row(&UsageLimit {
                user_id,
                monthly_limit: DEFAULT_MONTHLY_LIMIT,
                used_this_month: u32::try_from(used).unwrap_or(u32::MAX),
                last_reset,
            })
        })
        .collect()
}

/// Orders JSON column values: missing and null first, then booleans, numbers
/// and strings. ISO-8601 dates sort correctly as strings.
fn compare_values(a: Option<&Value>, b: Option<&Value>) -> CmpOrdering {
    fn rank(value: Option<&Value>) -> u8 {
        match value {
            None | Some(Value::Null) => 0,
            Some(Value::Bool(_)) => 1,
            Some(Value::Number(_)) => 2,
            Some(Value::String(_)) => 3,
            Some(Value::Array(_)) => 4,
            Some(Value::Object(_)) => 5,
        }
    }

    match (a, b) {
        (Some(Value::Bool(x)), Some(Value::Bool(y))) => x.cmp(y),
        (Some(Value::Number(x)), Some(Value::Number(y))) => {
            let x = x.as_f64().unwrap_or(f64::NAN);
            let y = y.as_f64().unwrap_or(f64::NAN);
            x.partial_cmp(&y).unwrap_or(CmpOrdering::Equal)
        }
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        _ => rank(a).cmp(&rank(b)),
    }
}
