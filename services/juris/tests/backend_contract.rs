//! End-to-end checks of the mock backend and the drafting flow through the
//! public API: auth notifications, query chains, usage accounting, admin
//! actions and retry behaviour.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use juris_core::domain::{
    AccountStatus, AuthEvent, AuthEventKind, Credentials, Deadline, DeadlinePatch,
    DeadlineStatus, NewDeadline, NewPetition, Petition, Profile, Role, SignUp, UsageLimit,
};
use juris_core::ports::{
    AiProvider, AuthService, GenerateRequest, PortError, PortResult, SlotStorage, NOT_FOUND_CODE,
};
use juris_lib::adapters::{MemorySlots, MockBackend, MockStore, SqliteSlots};
use juris_lib::ai::{AiGateway, RetryPolicy};
use juris_lib::backend::Backend;
use juris_lib::config::Config;
use juris_lib::state::AppState;
use juris_lib::workflow::{DeadlineBoard, Shell, View};
use uuid::Uuid;

// ============================================================================
// Fixtures
// ============================================================================

async fn mock_on(slots: Arc<dyn SlotStorage>) -> (Backend, Arc<MockBackend>) {
    let store = MockStore::open(slots).await.unwrap();
    let mock = Arc::new(MockBackend::new(Arc::new(store), Duration::ZERO).await);
    (Backend::mock(mock.clone()), mock)
}

async fn mock() -> (Backend, Arc<MockBackend>) {
    mock_on(Arc::new(MemorySlots::new())).await
}

fn sign_up(email: &str) -> SignUp {
    SignUp {
        email: email.to_string(),
        password: "segredo123".to_string(),
        full_name: "Ana Souza".to_string(),
    }
}

fn recorder(backend: &Backend) -> (Arc<Mutex<Vec<AuthEvent>>>, juris_core::events::Subscription) {
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = events.clone();
    let subscription = backend
        .auth()
        .on_auth_state_change(Arc::new(move |event: &AuthEvent| {
            sink.lock().unwrap().push(event.clone());
        }));
    (events, subscription)
}

fn new_petition(user_id: Uuid) -> NewPetition {
    NewPetition {
        user_id,
        area: "Consumidor".to_string(),
        action_type: "Indenização".to_string(),
        content: "<h1>PETIÇÃO</h1>".to_string(),
        plaintiff_name: "Ana Souza".to_string(),
        defendant_name: "Banco Exemplo S.A.".to_string(),
        analyzed_documents: vec![],
    }
}

/// Always fails with the configured error and counts the attempts.
struct FailingProvider {
    error: fn() -> PortError,
    calls: Mutex<u32>,
}

#[async_trait]
impl AiProvider for FailingProvider {
    async fn generate(&self, _request: GenerateRequest) -> PortResult<String> {
        *self.calls.lock().unwrap() += 1;
        Err((self.error)())
    }

    async fn count_tokens(&self, _request: GenerateRequest) -> PortResult<u32> {
        Err((self.error)())
    }
}

// ============================================================================
// Auth
// ============================================================================

#[tokio::test]
async fn sign_in_and_sign_up_notify_every_subscriber() {
    let (backend, _) = mock().await;
    let (first, first_sub) = recorder(&backend);
    let (second, _second_sub) = recorder(&backend);

    let session = backend.auth().sign_up(sign_up("ana@x.com")).await.unwrap();

    for events in [&first, &second] {
        let events = events.lock().unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].kind, AuthEventKind::SignedOut);
        assert_eq!(events[1], AuthEvent::signed_in(session.clone()));
    }
    assert_eq!(backend.auth().get_session().await, Some(session));

    first_sub.unsubscribe();
    let demo = backend
        .auth()
        .sign_in_with_password(Credentials {
            email: "demo@juris.app".to_string(),
            password: "qualquer".to_string(),
        })
        .await
        .unwrap();

    assert_eq!(first.lock().unwrap().len(), 2);
    let second = second.lock().unwrap();
    assert_eq!(second.len(), 3);
    assert_eq!(second[2].session.as_ref(), Some(&demo));
    assert_eq!(backend.auth().get_session().await, Some(demo));
}

#[tokio::test]
async fn sign_out_clears_the_session_and_notifies() {
    let (backend, _) = mock().await;
    backend.auth().sign_up(sign_up("ana@x.com")).await.unwrap();
    let (events, _sub) = recorder(&backend);

    backend.auth().sign_out().await.unwrap();

    assert!(backend.auth().get_session().await.is_none());
    let events = events.lock().unwrap();
    assert_eq!(events.last().map(|e| e.kind), Some(AuthEventKind::SignedOut));
}

// ============================================================================
// Tables
// ============================================================================

#[tokio::test]
async fn inserted_petitions_come_back_with_an_id_and_unfiled() {
    let (backend, _) = mock().await;
    let user_id = Uuid::new_v4();

    let inserted = backend
        .from::<Petition>()
        .insert_one(new_petition(user_id))
        .select()
        .single()
        .await
        .unwrap();

    let listed = backend
        .from::<Petition>()
        .select()
        .eq("user_id", user_id.to_string())
        .order("created_at", false)
        .await
        .unwrap();

    assert_eq!(listed, vec![inserted.clone()]);
    assert!(!inserted.filed);
    assert_ne!(inserted.id, Uuid::nil());
}

#[tokio::test]
async fn toggling_a_deadline_twice_persists_only_the_final_state() {
    let slots = Arc::new(MemorySlots::new());
    let (backend, _) = mock_on(slots.clone()).await;
    let user_id = Uuid::new_v4();
    let deadline = backend
        .from::<Deadline>()
        .insert_one(NewDeadline {
            user_id,
            title: "Contestação".to_string(),
            due_date: NaiveDate::from_ymd_opt(2026, 11, 3).unwrap(),
            status: DeadlineStatus::Pending,
        })
        .select()
        .single()
        .await
        .unwrap();

    for _ in 0..2 {
        let current = backend
            .from::<Deadline>()
            .select()
            .eq("id", deadline.id.to_string())
            .single()
            .await
            .unwrap();
        let patch = DeadlinePatch {
            status: Some(current.status.toggled()),
            ..DeadlinePatch::default()
        };
        backend
            .from::<Deadline>()
            .update(&patch)
            .eq("id", deadline.id.to_string())
            .await
            .unwrap();
    }

    let (reopened, _) = mock_on(slots).await;
    let stored: Vec<Deadline> = reopened
        .from::<Deadline>()
        .select()
        .eq("user_id", user_id.to_string())
        .await
        .unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].status, DeadlineStatus::Pending);
}

#[tokio::test]
async fn missing_profile_is_reported_with_the_not_found_code() {
    let (backend, _) = mock().await;

    let error = backend
        .from::<Profile>()
        .select()
        .eq("id", Uuid::new_v4().to_string())
        .single()
        .await
        .unwrap_err();

    assert!(error.is_not_found());
    assert_eq!(error.code(), NOT_FOUND_CODE);
}

#[tokio::test]
async fn state_survives_a_restart_on_sqlite_slots() {
    let slots = Arc::new(SqliteSlots::connect("sqlite::memory:").await.unwrap());
    let (backend, _) = mock_on(slots.clone()).await;
    let session = backend.auth().sign_up(sign_up("ana@x.com")).await.unwrap();
    backend
        .from::<Petition>()
        .insert_one(new_petition(session.user.id))
        .await
        .unwrap();

    let (restarted, _) = mock_on(slots).await;

    assert_eq!(restarted.auth().get_session().await, Some(session.clone()));
    let petitions: Vec<Petition> = restarted
        .from::<Petition>()
        .select()
        .eq("user_id", session.user.id.to_string())
        .await
        .unwrap();
    assert_eq!(petitions.len(), 1);
}

// ============================================================================
// Scenarios
// ============================================================================

#[tokio::test]
async fn new_account_counts_its_first_petition() {
    let (backend, _) = mock().await;
    let session = backend.auth().sign_up(sign_up("ana@x.com")).await.unwrap();
    let user_id = session.user.id;

    let profile = backend
        .from::<Profile>()
        .select()
        .eq("id", user_id.to_string())
        .single()
        .await
        .unwrap();
    assert_eq!(profile.account_status, AccountStatus::Trial);
    assert_eq!(profile.role, Role::User);

    backend
        .from::<Petition>()
        .insert_one(new_petition(user_id))
        .select()
        .single()
        .await
        .unwrap();

    let usage = backend
        .from::<UsageLimit>()
        .select()
        .eq("user_id", user_id.to_string())
        .single()
        .await
        .unwrap();
    assert_eq!(usage.used_this_month, 1);
}

#[tokio::test]
async fn admin_block_is_visible_on_the_next_fetch() {
    let (backend, _) = mock().await;
    let ana = backend.auth().sign_up(sign_up("ana@x.com")).await.unwrap();
    backend
        .auth()
        .sign_in_with_password(Credentials {
            email: "demo@juris.app".to_string(),
            password: "qualquer".to_string(),
        })
        .await
        .unwrap();

    let config = Config::from_lookup(|_| None).unwrap();
    let provider = Arc::new(FailingProvider {
        error: || PortError::Unexpected("unused".to_string()),
        calls: Mutex::new(0),
    });
    let ai = AiGateway::from_config(provider, &config);
    let mut shell = Shell::new(AppState::new(backend.clone(), ai, config));
    shell.sync_auth().await.unwrap();
    assert_eq!(shell.navigate(View::Admin).unwrap(), View::Admin);

    shell
        .set_account_status(ana.user.id, AccountStatus::Blocked)
        .await
        .unwrap();

    let fetched = backend
        .from::<Profile>()
        .select()
        .eq("id", ana.user.id.to_string())
        .single()
        .await
        .unwrap();
    assert_eq!(fetched.account_status, AccountStatus::Blocked);
}

#[tokio::test]
async fn deadline_board_round_trip() {
    let (backend, _) = mock().await;
    let board = DeadlineBoard::new(backend, Uuid::new_v4());

    let deadline = board
        .add("Embargos de declaração", NaiveDate::from_ymd_opt(2026, 10, 21).unwrap())
        .await
        .unwrap();
    let toggled = board.toggle(&deadline).await.unwrap();
    assert_eq!(toggled.status, DeadlineStatus::Completed);
    board.delete(deadline.id).await.unwrap();
    assert!(board.list().await.unwrap().is_empty());
}

// ============================================================================
// AI retry policy
// ============================================================================

fn gateway_with(provider: Arc<FailingProvider>) -> AiGateway {
    AiGateway::new(
        provider,
        "gemini-test",
        Some("AIzaSy-test-key-123456"),
        RetryPolicy::linear(3, Duration::from_millis(1)),
    )
}

#[tokio::test]
async fn quota_failures_are_retried_up_to_the_bound() {
    let provider = Arc::new(FailingProvider {
        error: || PortError::RateLimited("RESOURCE_EXHAUSTED".to_string()),
        calls: Mutex::new(0),
    });

    let result = gateway_with(provider.clone())
        .search_jurisprudence("dano moral", None)
        .await;

    assert!(matches!(result, Err(PortError::RateLimited(_))));
    assert_eq!(*provider.calls.lock().unwrap(), 3);
}

#[tokio::test]
async fn other_failures_are_not_retried() {
    let provider = Arc::new(FailingProvider {
        error: || PortError::Unauthorized("API key not valid".to_string()),
        calls: Mutex::new(0),
    });

    let result = gateway_with(provider.clone())
        .refine_legal_petition("<p>peça</p>", "Resuma os fatos.")
        .await;

    assert!(matches!(result, Err(PortError::Unauthorized(_))));
    assert_eq!(*provider.calls.lock().unwrap(), 1);
}
