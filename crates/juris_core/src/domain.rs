//! crates/juris_core/src/domain.rs
//!
//! Defines the core data structures for the application: the rows persisted
//! through the backend, the auth session, and the structured inputs and
//! outputs exchanged with the drafting AI.

use bytes::Bytes;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use uuid::Uuid;

//=========================================================================================
// Tables
//=========================================================================================

/// The logical tables exposed by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Table {
    Profiles,
    UsageLimits,
    Petitions,
    Deadlines,
    SavedJurisprudence,
}

impl Table {
    /// The table name as the BaaS REST API knows it.
    pub fn name(self) -> &'static str {
        match self {
            Table::Profiles => "profiles",
            Table::UsageLimits => "usage_limits",
            Table::Petitions => "petitions",
            Table::Deadlines => "deadlines",
            Table::SavedJurisprudence => "saved_jurisprudence",
        }
    }
}

impl std::fmt::Display for Table {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// A row type that lives in one backend table.
///
/// `Insert` is the payload accepted by `insert`; the backend fills in the
/// generated `id` and `created_at`.
pub trait Record: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    const TABLE: Table;
    type Insert: Serialize + Send + Sync;
}

//=========================================================================================
// Auth
//=========================================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionUser {
    pub id: Uuid,
    pub email: String,
}

/// The signed-in session. At most one is active at a time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub user: SessionUser,
    pub access_token: String,
    pub expires_in: u64,
}

#[derive(Debug, Clone)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone)]
pub struct SignUp {
    pub email: String,
    pub password: String,
    pub full_name: String,
}

#[derive(Debug, Clone, Default)]
pub struct UserUpdate {
    pub password: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthEventKind {
    SignedIn,
    SignedOut,
}

/// Payload delivered to auth state subscribers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthEvent {
    pub kind: AuthEventKind,
    pub session: Option<Session>,
}

impl AuthEvent {
    pub fn signed_in(session: Session) -> Self {
        Self {
            kind: AuthEventKind::SignedIn,
            session: Some(session),
        }
    }

    pub fn signed_out() -> Self {
        Self {
            kind: AuthEventKind::SignedOut,
            session: None,
        }
    }

    /// The event describing an existing state, used when a subscriber joins.
    pub fn from_state(session: Option<Session>) -> Self {
        match session {
            Some(session) => Self::signed_in(session),
            None => Self::signed_out(),
        }
    }
}

//=========================================================================================
// Profiles and usage
//=========================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountStatus {
    Trial,
    Active,
    Blocked,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    User,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub id: Uuid,
    pub full_name: String,
    pub email: String,
    pub account_status: AccountStatus,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

impl Profile {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct NewProfile {
    pub id: Uuid,
    pub full_name: String,
    pub email: String,
    pub account_status: AccountStatus,
    pub role: Role,
}

impl NewProfile {
    /// The profile every self-service account starts with.
    pub fn trial(id: Uuid, full_name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            id,
            full_name: full_name.into(),
            email: email.into(),
            account_status: AccountStatus::Trial,
            role: Role::User,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ProfilePatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub account_status: Option<AccountStatus>,
}

impl Record for Profile {
    const TABLE: Table = Table::Profiles;
    type Insert = NewProfile;
}

/// Monthly drafting quota for one user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageLimit {
    pub user_id: Uuid,
    pub monthly_limit: u32,
    pub used_this_month: u32,
    pub last_reset: DateTime<Utc>,
}

impl UsageLimit {
    pub fn remaining(&self) -> u32 {
        self.monthly_limit.saturating_sub(self.used_this_month)
    }

    pub fn is_exhausted(&self) -> bool {
        self.remaining() == 0
    }
}

impl Record for UsageLimit {
    const TABLE: Table = Table::UsageLimits;
    type Insert = UsageLimit;
}

//=========================================================================================
// Petitions
//=========================================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Petition {
    pub id: Uuid,
    pub user_id: Uuid,
    pub area: String,
    pub action_type: String,
    /// The drafted document as HTML.
    pub content: String,
    pub plaintiff_name: String,
    pub defendant_name: String,
    #[serde(default)]
    pub analyzed_documents: Vec<String>,
    #[serde(default)]
    pub filed: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewPetition {
    pub user_id: Uuid,
    pub area: String,
    pub action_type: String,
    pub content: String,
    pub plaintiff_name: String,
    pub defendant_name: String,
    pub analyzed_documents: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct PetitionPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filed: Option<bool>,
}

impl Record for Petition {
    const TABLE: Table = Table::Petitions;
    type Insert = NewPetition;
}

//=========================================================================================
// Deadlines
//=========================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeadlineStatus {
    Pending,
    Completed,
}

impl DeadlineStatus {
    pub fn toggled(self) -> Self {
        match self {
            DeadlineStatus::Pending => DeadlineStatus::Completed,
            DeadlineStatus::Completed => DeadlineStatus::Pending,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Deadline {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub due_date: NaiveDate,
    pub status: DeadlineStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewDeadline {
    pub user_id: Uuid,
    pub title: String,
    pub due_date: NaiveDate,
    pub status: DeadlineStatus,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct DeadlinePatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<DeadlineStatus>,
}

impl Record for Deadline {
    const TABLE: Table = Table::Deadlines;
    type Insert = NewDeadline;
}

//=========================================================================================
// Jurisprudence
//=========================================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedJurisprudence {
    pub id: Uuid,
    pub user_id: Uuid,
    pub query: String,
    /// The search result as HTML.
    pub result: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewSavedJurisprudence {
    pub user_id: Uuid,
    pub query: String,
    pub result: String,
}

impl Record for SavedJurisprudence {
    const TABLE: Table = Table::SavedJurisprudence;
    type Insert = NewSavedJurisprudence;
}

//=========================================================================================
// AI task inputs and outputs
//=========================================================================================

/// A binary file sent inline to the AI provider (PDF, image or audio).
#[derive(Debug, Clone)]
pub struct Attachment {
    pub file_name: String,
    pub mime_type: String,
    pub data: Bytes,
}

impl Attachment {
    pub fn new(file_name: impl Into<String>, mime_type: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self {
            file_name: file_name.into(),
            mime_type: mime_type.into(),
            data: data.into(),
        }
    }
}

/// Case facts pulled out of uploaded documents. Every field may be empty when
/// the provider could not find it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ExtractedCaseData {
    #[serde(deserialize_with = "lenient::text")]
    pub plaintiff_name: String,
    #[serde(deserialize_with = "lenient::text")]
    pub plaintiff_document: String,
    #[serde(deserialize_with = "lenient::text")]
    pub plaintiff_address: String,
    #[serde(deserialize_with = "lenient::text")]
    pub defendant_name: String,
    #[serde(deserialize_with = "lenient::text")]
    pub defendant_document: String,
    #[serde(deserialize_with = "lenient::text")]
    pub defendant_address: String,
    #[serde(deserialize_with = "lenient::text")]
    pub facts_summary: String,
    #[serde(deserialize_with = "lenient::text_list")]
    pub relevant_dates: Vec<String>,
    #[serde(deserialize_with = "lenient::optional_text")]
    pub claimed_value: Option<String>,
}

impl ExtractedCaseData {
    /// Whether the extraction produced anything the wizard can build on.
    pub fn is_empty(&self) -> bool {
        self.plaintiff_name.trim().is_empty()
            && self.defendant_name.trim().is_empty()
            && self.facts_summary.trim().is_empty()
    }
}

/// Suggested data for the court's electronic filing form.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FilingMetadata {
    #[serde(deserialize_with = "lenient::text")]
    pub competence: String,
    #[serde(deserialize_with = "lenient::text")]
    pub procedural_class: String,
    #[serde(deserialize_with = "lenient::text")]
    pub main_subject: String,
    #[serde(deserialize_with = "lenient::optional_text")]
    pub claim_value: Option<String>,
    #[serde(deserialize_with = "lenient::flag")]
    pub free_justice_requested: bool,
}

/// Field readers for model-produced JSON, where a field the model could not
/// fill comes back as `null` and values drift between strings and numbers.
/// A bad field degrades to its empty value.
mod lenient {
    use serde::{Deserialize, Deserializer};
    use serde_json::Value;

    fn scalar(value: Value) -> Option<String> {
        match value {
            Value::String(text) => Some(text),
            Value::Number(number) => Some(number.to_string()),
            Value::Bool(flag) => Some(flag.to_string()),
            _ => None,
        }
    }

    pub fn text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
        Ok(scalar(Value::deserialize(deserializer)?).unwrap_or_default())
    }

    pub fn optional_text<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<String>, D::Error> {
        Ok(scalar(Value::deserialize(deserializer)?).filter(|text| !text.trim().is_empty()))
    }

    pub fn text_list<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<String>, D::Error> {
        Ok(match Value::deserialize(deserializer)? {
            Value::Array(items) => items.into_iter().filter_map(scalar).collect(),
            other => scalar(other).into_iter().collect(),
        })
    }

    pub fn flag<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
        Ok(match Value::deserialize(deserializer)? {
            Value::Bool(flag) => flag,
            Value::String(text) => matches!(
                text.trim().to_lowercase().as_str(),
                "true" | "sim" | "yes"
            ),
            _ => false,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Party {
    pub name: String,
    /// CPF or CNPJ.
    pub document: String,
    pub address: String,
    /// Nationality, marital status, profession and similar qualifiers.
    pub qualification: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PetitionRequest {
    pub area: String,
    pub action_type: String,
    pub plaintiff: Party,
    pub defendant: Party,
    pub facts: String,
    pub requests: Vec<String>,
    pub evidence: Vec<String>,
    pub urgent_relief: bool,
    pub claim_value: Option<String>,
    pub analyzed_documents: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DefenseRequest {
    pub area: String,
    pub defense_type: String,
    pub client: Party,
    pub opposing_party: Party,
    pub initial_claim_summary: String,
    pub defense_facts: String,
    pub theses: Vec<String>,
    pub analyzed_documents: Vec<String>,
}
