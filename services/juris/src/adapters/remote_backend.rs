//! services/juris/src/adapters/remote_backend.rs
//!
//! Adapter for a Supabase-compatible BaaS: GoTrue auth under `/auth/v1` and
//! PostgREST tables under `/rest/v1`. Implements the same `AuthService` and
//! `TableService` ports as the mock.

use async_trait::async_trait;
use juris_core::domain::{AuthEvent, Credentials, Session, SessionUser, SignUp, Table, UserUpdate};
use juris_core::events::{AuthChannel, AuthListener, Subscription};
use juris_core::ports::{
    AuthService, Filter, PortError, PortResult, Row, SelectSpec, TableService, NOT_FOUND_CODE,
};
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::RwLock;
use tracing::{debug, error, info};
use uuid::Uuid;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

pub struct RemoteBackend {
    http: reqwest::Client,
    base_url: String,
    anon_key: String,
    session: RwLock<Option<Session>>,
    channel: AuthChannel,
}

impl RemoteBackend {
    /// Creates a new `RemoteBackend` for the project at `base_url`.
    pub fn new(http: reqwest::Client, base_url: impl Into<String>, anon_key: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            anon_key: anon_key.into(),
            session: RwLock::new(None),
            channel: AuthChannel::new(None),
        }
    }

    /// Builds a request carrying the project key and, when signed in, the
    /// user's access token.
    async fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let bearer = match self.session.read().await.as_ref() {
            Some(session) => session.access_token.clone(),
            None => self.anon_key.clone(),
        };
        self.http
            .request(method, format!("{}{}", self.base_url, path))
            .header("apikey", &self.anon_key)
            .bearer_auth(bearer)
    }

    async fn send(&self, builder: RequestBuilder) -> PortResult<Response> {
        let response = builder.send().await.map_err(|e| {
            error!("BaaS request failed: {}", e);
            PortError::Unexpected(e.to_string())
        })?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(map_error(status, &body))
    }

    async fn rows(&self, builder: RequestBuilder) -> PortResult<Vec<Row>> {
        let response = self.send(builder.header("Prefer", "return=representation")).await?;
        response
            .json::<Vec<Row>>()
            .await
            .map_err(|e| PortError::Unexpected(format!("malformed rows: {}", e)))
    }

    async fn establish(&self, session: Session) -> Session {
        *self.session.write().await = Some(session.clone());
        self.channel.publish(AuthEvent::signed_in(session.clone()));
        session
    }
}

/// Maps a failed response to a port error. PostgREST reports errors as
/// `{code, message}`, GoTrue as `{error_description}` or `{msg}`.
fn map_error(status: StatusCode, body: &str) -> PortError {
    let parsed: Value = serde_json::from_str(body).unwrap_or(Value::Null);
    let code = parsed.get("code").and_then(Value::as_str).unwrap_or_default();
    let message = ["message", "error_description", "msg", "error"]
        .iter()
        .find_map(|key| parsed.get(*key).and_then(Value::as_str))
        .map(str::to_string)
        .unwrap_or_else(|| format!("HTTP {}", status));

    if code == NOT_FOUND_CODE || status == StatusCode::NOT_ACCEPTABLE {
        return PortError::NotFound(message);
    }
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => PortError::Unauthorized(message),
        StatusCode::TOO_MANY_REQUESTS => PortError::RateLimited(message),
        StatusCode::BAD_REQUEST | StatusCode::CONFLICT | StatusCode::UNPROCESSABLE_ENTITY => {
            PortError::Validation(message)
        }
        _ => PortError::Unexpected(message),
    }
}

/// PostgREST filter value: strings bare, everything else as JSON text.
fn filter_param(filter: &Filter) -> (String, String) {
    let value = match &filter.value {
        Value::String(raw) => raw.clone(),
        other => other.to_string(),
    };
    (filter.column.clone(), format!("eq.{}", value))
}

fn select_params(spec: &SelectSpec) -> Vec<(String, String)> {
    let mut params = vec![("select".to_string(), "*".to_string())];
    if let Some(filter) = &spec.filter {
        params.push(filter_param(filter));
    }
    if let Some(order) = &spec.order {
        let direction = if order.ascending { "asc" } else { "desc" };
        params.push(("order".to_string(), format!("{}.{}", order.column, direction)));
    }
    if spec.single {
        params.push(("limit".to_string(), "1".to_string()));
    }
    params
}

//=========================================================================================
// GoTrue payloads
//=========================================================================================

#[derive(Deserialize)]
struct GoTrueUser {
    id: Uuid,
    #[serde(default)]
    email: Option<String>,
}

#[derive(Deserialize)]
struct GoTrueSession {
    #[serde(default)]
    access_token: Option<String>,
    #[serde(default)]
    expires_in: Option<u64>,
    #[serde(default)]
    user: Option<GoTrueUser>,
}

impl GoTrueSession {
    fn into_session(self, fallback_email: &str) -> PortResult<Session> {
        match (self.access_token, self.user) {
            (Some(access_token), Some(user)) => Ok(Session {
                user: SessionUser {
                    id: user.id,
                    email: user.email.unwrap_or_else(|| fallback_email.to_string()),
                },
                access_token,
                expires_in: self.expires_in.unwrap_or(3600),
            }),
            _ => Err(PortError::Validation(
                "Confirme seu e-mail antes de entrar.".to_string(),
            )),
        }
    }
}

//=========================================================================================
// `AuthService` Trait Implementation
//=========================================================================================

#[async_trait]
impl AuthService for RemoteBackend {
    async fn get_session(&self) -> Option<Session> {
        self.session.read().await.clone()
    }

    fn on_auth_state_change(&self, listener: AuthListener) -> Subscription {
        self.channel.subscribe(listener)
    }

    async fn sign_in_with_password(&self, credentials: Credentials) -> PortResult<Session> {
        let builder = self
            .request(Method::POST, "/auth/v1/token")
            .await
            .query(&[("grant_type", "password")])
            .json(&json!({"email": credentials.email, "password": credentials.password}));
        let payload: GoTrueSession = self
            .send(builder)
            .await?
            .json()
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        let session = payload.into_session(&credentials.email)?;
        info!(user_id = %session.user.id, "Signed in.");
        Ok(self.establish(session).await)
    }

    async fn sign_up(&self, request: SignUp) -> PortResult<Session> {
        let builder = self.request(Method::POST, "/auth/v1/signup").await.json(&json!({
            "email": request.email,
            "password": request.password,
            "data": {"full_name": request.full_name},
        }));
        let payload: GoTrueSession = self
            .send(builder)
            .await?
            .json()
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        let session = payload.into_session(&request.email)?;
        info!(user_id = %session.user.id, "Signed up.");
        Ok(self.establish(session).await)
    }

    async fn sign_out(&self) -> PortResult<()> {
        if self.session.read().await.is_some() {
            let builder = self.request(Method::POST, "/auth/v1/logout").await;
            // The local session is dropped even if the server already forgot it.
            if let Err(e) = self.send(builder).await {
                error!("Remote logout failed: {}", e);
            }
        }
        *self.session.write().await = None;
        self.channel.publish(AuthEvent::signed_out());
        Ok(())
    }

    async fn update_user(&self, update: UserUpdate) -> PortResult<()> {
        let password = match update.password {
            Some(password) if !password.is_empty() => password,
            _ => return Err(PortError::Validation("Nenhuma senha informada.".to_string())),
        };
        let builder = self
            .request(Method::PUT, "/auth/v1/user")
            .await
            .json(&json!({"password": password}));
        self.send(builder).await?;
        Ok(())
    }
}

//=========================================================================================
// `TableService` Trait Implementation
//=========================================================================================

#[async_trait]
impl TableService for RemoteBackend {
    async fn select(&self, table: Table, spec: SelectSpec) -> PortResult<Vec<Row>> {
        let path = format!("/rest/v1/{}", table);
        let builder = self.request(Method::GET, &path).await.query(&select_params(&spec));
        let rows = self.rows(builder).await?;
        debug!(%table, count = rows.len(), "Remote select.");
        Ok(rows)
    }

    async fn insert(&self, table: Table, rows: Vec<Row>) -> PortResult<Vec<Row>> {
        let path = format!("/rest/v1/{}", table);
        let builder = self.request(Method::POST, &path).await.json(&rows);
        self.rows(builder).await
    }

    async fn update(&self, table: Table, filter: Filter, patch: Row) -> PortResult<Vec<Row>> {
        let path = format!("/rest/v1/{}", table);
        let builder = self
            .request(Method::PATCH, &path)
            .await
            .query(&[filter_param(&filter)])
            .json(&patch);
        self.rows(builder).await
    }

    async fn delete(&self, table: Table, filter: Filter) -> PortResult<Vec<Row>> {
        let path = format!("/rest/v1/{}", table);
        let builder = self
            .request(Method::DELETE, &path)
            .await
            .query(&[filter_param(&filter)]);
        self.rows(builder).await
    }
}
