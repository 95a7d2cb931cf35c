//! services/juris/src/testing.rs
//!
//! Shared fixtures for unit tests: a scripted AI provider and an application
//! state wired to an in-memory mock backend with no latency.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use juris_core::domain::{Credentials, Session, SignUp};
use juris_core::ports::{AiProvider, AuthService, GenerateRequest, PortError, PortResult};

use crate::adapters::{MemorySlots, MockBackend, MockStore};
use crate::ai::{AiGateway, RetryPolicy};
use crate::backend::Backend;
use crate::config::Config;
use crate::state::AppState;

pub const TEST_KEY: &str = "AIzaSy-test-key-123456";

/// Replays scripted responses in order and records every request. Token
/// counts are answered with `tokens`, or fail when it is `None`.
pub struct ScriptedProvider {
    responses: Mutex<VecDeque<PortResult<String>>>,
    tokens: Option<u32>,
    pub requests: Mutex<Vec<GenerateRequest>>,
    pub counted: Mutex<Vec<GenerateRequest>>,
}

impl ScriptedProvider {
    pub fn with(responses: Vec<PortResult<String>>) -> Arc<Self> {
        Self::with_tokens(responses, Some(42))
    }

    pub fn with_tokens(responses: Vec<PortResult<String>>, tokens: Option<u32>) -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(responses.into()),
            tokens,
            requests: Mutex::default(),
            counted: Mutex::default(),
        })
    }

    /// Number of `generate` calls.
    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl AiProvider for ScriptedProvider {
    async fn generate(&self, request: GenerateRequest) -> PortResult<String> {
        self.requests.lock().unwrap().push(request);
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(PortError::Unexpected("script exhausted".to_string())))
    }

    async fn count_tokens(&self, request: GenerateRequest) -> PortResult<u32> {
        self.counted.lock().unwrap().push(request);
        self.tokens
            .ok_or_else(|| PortError::Unexpected("countTokens unavailable".to_string()))
    }
}

pub fn gateway(provider: Arc<ScriptedProvider>) -> AiGateway {
    AiGateway::new(
        provider,
        "gemini-test",
        Some(TEST_KEY),
        RetryPolicy::linear(3, Duration::from_millis(1)),
    )
}

pub struct Harness {
    pub state: AppState,
    pub mock: Arc<MockBackend>,
    pub provider: Arc<ScriptedProvider>,
}

impl Harness {
    pub async fn new(responses: Vec<PortResult<String>>) -> Self {
        Self::build(ScriptedProvider::with(responses), Duration::ZERO).await
    }

    /// A harness whose mock backend sleeps `latency` before every call.
    pub async fn with_latency(responses: Vec<PortResult<String>>, latency: Duration) -> Self {
        Self::build(ScriptedProvider::with(responses), latency).await
    }

    pub async fn with_provider(provider: Arc<ScriptedProvider>) -> Self {
        Self::build(provider, Duration::ZERO).await
    }

    async fn build(provider: Arc<ScriptedProvider>, latency: Duration) -> Self {
        let store = MockStore::open(Arc::new(MemorySlots::new())).await.unwrap();
        let mock = Arc::new(MockBackend::new(Arc::new(store), latency).await);
        let config = Config::from_lookup(|_| None).unwrap();
        let state = AppState::new(Backend::mock(mock.clone()), gateway(provider.clone()), config);
        Self {
            state,
            mock,
            provider,
        }
    }

    pub async fn sign_up(&self, email: &str, full_name: &str) -> Session {
        self.mock
            .sign_up(SignUp {
                email: email.to_string(),
                password: "segredo123".to_string(),
                full_name: full_name.to_string(),
            })
            .await
            .unwrap()
    }

    pub async fn sign_in_demo(&self) -> Session {
        self.mock
            .sign_in_with_password(Credentials {
                email: "demo@juris.app".to_string(),
                password: "qualquer".to_string(),
            })
            .await
            .unwrap()
    }
}
