//! crates/juris_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the application's core logic.
//! These traits form the boundary of the hexagonal architecture: the typed
//! query builders and the wizards talk to these ports and never know whether
//! a mock or a remote backend, or which AI provider, sits behind them.

use async_trait::async_trait;
use bytes::Bytes;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::{Map, Value};

use crate::domain::{Credentials, Session, SignUp, Table, UserUpdate};
use crate::events::{AuthListener, Subscription};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// The code a BaaS REST API returns when `.single()` matched no rows.
pub const NOT_FOUND_CODE: &str = "PGRST116";

/// A generic error type for all port operations.
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("Invalid request: {0}")]
    Validation(String),
    #[error("Rate limit or quota exceeded: {0}")]
    RateLimited(String),
    #[error("AI API key is missing or invalid; set GEMINI_API_KEY in the configuration")]
    MissingCredential,
    #[error("Unauthorized: {0}")]
    Unauthorized(String),
    #[error("Storage failure: {0}")]
    Storage(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

impl PortError {
    /// A stable code callers can branch on.
    pub fn code(&self) -> &'static str {
        match self {
            PortError::NotFound(_) => NOT_FOUND_CODE,
            PortError::Validation(_) => "validation",
            PortError::RateLimited(_) => "rate_limited",
            PortError::MissingCredential => "missing_credential",
            PortError::Unauthorized(_) => "unauthorized",
            PortError::Storage(_) => "storage",
            PortError::Unexpected(_) => "unexpected",
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.code() == NOT_FOUND_CODE
    }
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Table access
//=========================================================================================

/// A row as the backend stores it: a JSON object keyed by column.
pub type Row = Map<String, Value>;

/// Serializes a record or payload into a row.
pub fn to_row<T: Serialize>(value: &T) -> PortResult<Row> {
    match serde_json::to_value(value) {
        Ok(Value::Object(row)) => Ok(row),
        Ok(other) => Err(PortError::Validation(format!(
            "rows must be JSON objects, got {}",
            other
        ))),
        Err(e) => Err(PortError::Validation(e.to_string())),
    }
}

/// Decodes a stored row into a typed record.
pub fn from_row<T: DeserializeOwned>(row: Row) -> PortResult<T> {
    serde_json::from_value(Value::Object(row))
        .map_err(|e| PortError::Unexpected(format!("malformed row: {}", e)))
}

/// Equality filter on one column.
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    pub column: String,
    pub value: Value,
}

impl Filter {
    pub fn eq(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            column: column.into(),
            value: value.into(),
        }
    }

    pub fn matches(&self, row: &Row) -> bool {
        row.get(&self.column) == Some(&self.value)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Ordering {
    pub column: String,
    pub ascending: bool,
}

/// The shape of a select call after the builder has been resolved.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SelectSpec {
    pub filter: Option<Filter>,
    pub order: Option<Ordering>,
    /// Set by `.single()`; backends may use it to limit the result to one row.
    pub single: bool,
}

#[async_trait]
pub trait TableService: Send + Sync {
    async fn select(&self, table: Table, spec: SelectSpec) -> PortResult<Vec<Row>>;

    /// Inserts rows, returning them as stored (with generated columns).
    async fn insert(&self, table: Table, rows: Vec<Row>) -> PortResult<Vec<Row>>;

    /// Merges `patch` into every row matching `filter`, returning the updated rows.
    async fn update(&self, table: Table, filter: Filter, patch: Row) -> PortResult<Vec<Row>>;

    /// Removes every row matching `filter`, returning the removed rows.
    async fn delete(&self, table: Table, filter: Filter) -> PortResult<Vec<Row>>;
}

//=========================================================================================
// Auth
//=========================================================================================

#[async_trait]
pub trait AuthService: Send + Sync {
    async fn get_session(&self) -> Option<Session>;

    /// Registers a listener. It is called immediately with the current state
    /// and again on every sign-in and sign-out until unsubscribed.
    fn on_auth_state_change(&self, listener: AuthListener) -> Subscription;

    async fn sign_in_with_password(&self, credentials: Credentials) -> PortResult<Session>;

    async fn sign_up(&self, request: SignUp) -> PortResult<Session>;

    async fn sign_out(&self) -> PortResult<()>;

    async fn update_user(&self, update: UserUpdate) -> PortResult<()>;
}

//=========================================================================================
// Durable key/value slots
//=========================================================================================

/// Durable string slots, one per key. The mock backend keeps one JSON value
/// per table here.
#[async_trait]
pub trait SlotStorage: Send + Sync {
    async fn get(&self, key: &str) -> PortResult<Option<String>>;
    async fn set(&self, key: &str, value: &str) -> PortResult<()>;
    async fn remove(&self, key: &str) -> PortResult<()>;
}

//=========================================================================================
// Generative AI
//=========================================================================================

/// One piece of a prompt: text or an inlined binary file.
#[derive(Debug, Clone, PartialEq)]
pub enum PromptPart {
    Text(String),
    Inline { mime_type: String, data: Bytes },
}

/// A single request to the AI provider.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerateRequest {
    pub model: String,
    pub parts: Vec<PromptPart>,
    pub system_instruction: Option<String>,
    /// Ask the provider for a JSON document instead of free text.
    pub json_output: bool,
}

#[async_trait]
pub trait AiProvider: Send + Sync {
    /// Generates text (or JSON text when `json_output` is set).
    async fn generate(&self, request: GenerateRequest) -> PortResult<String>;

    /// Counts the tokens the request would consume.
    async fn count_tokens(&self, request: GenerateRequest) -> PortResult<u32>;
}
