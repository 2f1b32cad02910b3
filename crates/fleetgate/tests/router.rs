//! Gateway tests without a network: calls go straight into
//! [`Gateway::dispatch`] against a scripted engine.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use fleetgate::account::{AccountStore, MemoryAccountPersister};
use fleetgate::prelude::*;
use fleetgate::protocol::ErrorKind;
use fleetgate::session::SweepConfig;
use serde_json::{Value, json};
use tokio::sync::broadcast;
use tokio::time::Instant;

// =========================================================================
// Scripted engine
// =========================================================================

struct ScriptedEngine {
    events: broadcast::Sender<Event>,
    calls: Mutex<Vec<(String, Vec<Value>)>>,
}

impl ScriptedEngine {
    fn new() -> Self {
        let (events, _) = broadcast::channel(64);
        Self {
            events,
            calls: Mutex::new(Vec::new()),
        }
    }

    fn emit(&self, kind: &str, payload: Value) {
        let _ = self.events.send(Event::new(kind, payload));
    }

    fn calls(&self) -> Vec<(String, Vec<Value>)> {
        self.calls.lock().unwrap().clone()
    }
}

impl Engine for ScriptedEngine {
    fn operations(&self) -> Vec<EngineOperation> {
        vec![
            EngineOperation::requires("getVehicles", [Permission::ReadData]),
            EngineOperation::requires(
                "withdrawByVehicle",
                [Permission::ReadData, Permission::ModifyVehicles],
            ),
            EngineOperation::requires("explode", [Permission::ReadData]),
            // Shadowed by the gateway's own login.
            EngineOperation::requires("login", [Permission::ReadData]),
            EngineOperation::undeclared("getKernelState"),
        ]
    }

    async fn invoke(&self, operation: &str, args: Vec<Value>) -> Result<Value, EngineError> {
        self.calls
            .lock()
            .unwrap()
            .push((operation.to_string(), args.clone()));
        match operation {
            "getVehicles" => Ok(json!(["v1", "v2"])),
            "withdrawByVehicle" => Ok(Value::Null),
            "getKernelState" => Ok(json!("OPERATING")),
            "explode" => Err(EngineError::Failed("boom".into())),
            other => Err(EngineError::UnknownOperation(other.to_string())),
        }
    }

    fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.events.subscribe()
    }
}

// =========================================================================
// Helpers
// =========================================================================

async fn setup() -> (Arc<Gateway<ScriptedEngine>>, Arc<ScriptedEngine>) {
    let (gateway, engine, _) = setup_with_persister().await;
    (gateway, engine)
}

async fn setup_with_persister() -> (
    Arc<Gateway<ScriptedEngine>>,
    Arc<ScriptedEngine>,
    Arc<MemoryAccountPersister>,
) {
    let engine = Arc::new(ScriptedEngine::new());
    let persister = Arc::new(MemoryAccountPersister::new());
    let accounts = AccountStore::load(persister.clone()).await.unwrap();
    let gateway = Gateway::new(engine.clone(), accounts, SweepConfig::with_interval_ms(1000));
    (Arc::new(gateway), engine, persister)
}

async fn call(
    gateway: &Gateway<ScriptedEngine>,
    op: &str,
    args: Value,
) -> Result<Value, GatewayError> {
    let args = match args {
        Value::Array(args) => args,
        other => panic!("args must be an array, got {other}"),
    };
    gateway.dispatch(op, args).await
}

async fn login(gateway: &Gateway<ScriptedEngine>, user: &str, password: &str) -> String {
    let token = call(gateway, "login", json!([user, password])).await.unwrap();
    token.as_str().unwrap().to_string()
}

async fn guest(gateway: &Gateway<ScriptedEngine>) -> String {
    login(gateway, "guest", "guest-password").await
}

/// Creates `user` (password `"pw"`) and logs them in.
async fn user_with(gateway: &Gateway<ScriptedEngine>, user: &str, permissions: Value) -> String {
    let admin = guest(gateway).await;
    call(gateway, "createUser", json!([admin, user, "pw", permissions]))
        .await
        .unwrap();
    login(gateway, user, "pw").await
}

/// Lets spawned tasks run without moving the clock.
async fn settle() {
    for _ in 0..20 {
        tokio::task::yield_now().await;
    }
}

fn kinds(events: &Value) -> Vec<String> {
    events
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["kind"].as_str().unwrap().to_string())
        .collect()
}

// =========================================================================
// Login and sessions
// =========================================================================

#[tokio::test]
async fn test_login_bootstrap_guest_has_every_permission() {
    let (gateway, _) = setup().await;
    let token = guest(&gateway).await;

    let permissions = call(&gateway, "getPermissions", json!([token])).await.unwrap();

    assert_eq!(permissions.as_array().unwrap().len(), Permission::ALL.len());
}

#[tokio::test]
async fn test_login_wrong_password_returns_credentials_invalid() {
    let (gateway, _) = setup().await;

    let err = call(&gateway, "login", json!(["guest", "nope"])).await.unwrap_err();

    assert!(matches!(err, GatewayError::CredentialsInvalid(_)));
    assert_eq!(err.kind(), ErrorKind::CredentialsInvalid);
}

#[tokio::test]
async fn test_login_twice_returns_distinct_tokens() {
    let (gateway, _) = setup().await;

    let first = guest(&gateway).await;
    let second = guest(&gateway).await;

    assert_ne!(first, second);
    assert_eq!(gateway.sessions().lock().await.len(), 2);
}

#[tokio::test]
async fn test_logout_then_call_returns_credentials_invalid() {
    let (gateway, _) = setup().await;
    let token = guest(&gateway).await;

    call(&gateway, "logout", json!([token])).await.unwrap();
    let err = call(&gateway, "getVehicles", json!([token])).await.unwrap_err();

    assert!(matches!(err, GatewayError::CredentialsInvalid(_)));
}

#[tokio::test]
async fn test_logout_unknown_token_is_silent() {
    let (gateway, _) = setup().await;

    let result = call(&gateway, "logout", json!(["never-issued"])).await;

    assert_eq!(result.unwrap(), Value::Null);
}

#[tokio::test]
async fn test_get_permissions_unknown_token_returns_empty_set() {
    let (gateway, _) = setup().await;
    let token = guest(&gateway).await;
    call(&gateway, "logout", json!([token])).await.unwrap();

    let permissions = call(&gateway, "getPermissions", json!([token])).await.unwrap();

    assert_eq!(permissions, json!([]));
}

#[tokio::test]
async fn test_get_permissions_returns_login_snapshot() {
    let (gateway, _) = setup().await;
    let alice = user_with(&gateway, "alice", json!(["READ_DATA"])).await;

    let permissions = call(&gateway, "getPermissions", json!([alice])).await.unwrap();

    assert_eq!(permissions, json!(["READ_DATA"]));
}

// =========================================================================
// Argument checking
// =========================================================================

#[tokio::test]
async fn test_poll_negative_timeout_is_illegal_even_with_bad_token() {
    let (gateway, _) = setup().await;

    let err = call(&gateway, "pollEvents", json!(["never-issued", -1]))
        .await
        .unwrap_err();

    assert!(matches!(err, GatewayError::IllegalArgument(_)), "{err}");
    assert!(err.to_string().contains("timeout"));
}

#[tokio::test]
async fn test_local_call_missing_argument_returns_illegal_argument() {
    let (gateway, _) = setup().await;

    let err = call(&gateway, "login", json!(["guest"])).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::IllegalArgument);
}

#[tokio::test]
async fn test_local_call_extra_argument_returns_illegal_argument() {
    let (gateway, _) = setup().await;
    let token = guest(&gateway).await;

    let err = call(&gateway, "logout", json!([token, "surplus"])).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::IllegalArgument);
}

#[tokio::test]
async fn test_create_user_unknown_permission_returns_illegal_argument() {
    let (gateway, _) = setup().await;
    let token = guest(&gateway).await;

    let err = call(&gateway, "createUser", json!([token, "alice", "pw", ["FLY"]]))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::IllegalArgument);
}

// =========================================================================
// User management
// =========================================================================

#[tokio::test]
async fn test_create_user_without_manage_users_is_denied() {
    let (gateway, _) = setup().await;
    let alice = user_with(&gateway, "alice", json!(["READ_DATA"])).await;

    let err = call(&gateway, "createUser", json!([alice, "mallory", "pw", []]))
        .await
        .unwrap_err();

    assert!(matches!(err, GatewayError::PermissionDenied(Permission::ManageUsers)));
}

#[tokio::test]
async fn test_create_user_duplicate_returns_account_exists() {
    let (gateway, _) = setup().await;
    let token = guest(&gateway).await;

    let err = call(&gateway, "createUser", json!([token, "guest", "pw", []]))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::AccountExists);
}

#[tokio::test]
async fn test_set_password_own_account_needs_no_permission() {
    let (gateway, _) = setup().await;
    let bob = user_with(&gateway, "bob", json!([])).await;

    call(&gateway, "setPassword", json!([bob, "bob", "new-pw"]))
        .await
        .unwrap();

    login(&gateway, "bob", "new-pw").await;
    let err = call(&gateway, "login", json!(["bob", "pw"])).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::CredentialsInvalid);
}

#[tokio::test]
async fn test_set_password_other_account_needs_manage_users() {
    let (gateway, _) = setup().await;
    let bob = user_with(&gateway, "bob", json!(["READ_DATA"])).await;

    let err = call(&gateway, "setPassword", json!([bob, "guest", "hijacked"]))
        .await
        .unwrap_err();

    assert!(matches!(err, GatewayError::PermissionDenied(Permission::ManageUsers)));
    guest(&gateway).await;
}

#[tokio::test]
async fn test_set_password_unknown_user_returns_account_unknown() {
    let (gateway, _) = setup().await;
    let token = guest(&gateway).await;

    let err = call(&gateway, "setPassword", json!([token, "nobody", "pw"]))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::AccountUnknown);
}

#[tokio::test]
async fn test_set_password_unknown_token_is_credentials_invalid() {
    let (gateway, _) = setup().await;

    let err = call(&gateway, "setPassword", json!(["bogus", "guest", "pw"]))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::CredentialsInvalid);
    guest(&gateway).await;
}

#[tokio::test]
async fn test_set_password_own_removed_account_returns_account_unknown() {
    let (gateway, _) = setup().await;
    let bob = user_with(&gateway, "bob", json!([])).await;
    let admin = guest(&gateway).await;
    call(&gateway, "removeUser", json!([admin, "bob"])).await.unwrap();

    // Still the owner through the open session, so no permission check.
    let err = call(&gateway, "setPassword", json!([bob, "bob", "pw2"]))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::AccountUnknown);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_account_changes_all_reach_persister() {
    let (gateway, _, persister) = setup_with_persister().await;
    let admin = guest(&gateway).await;

    let mut tasks = Vec::new();
    for i in 0..8 {
        let gateway = gateway.clone();
        let admin = admin.clone();
        tasks.push(tokio::spawn(async move {
            let name = format!("user{i}");
            call(&gateway, "createUser", json!([admin, name, "pw", []])).await
        }));
    }
    for task in tasks {
        task.await.unwrap().unwrap();
    }

    // Saves are serialized, so the last one holds every account.
    assert_eq!(persister.snapshot().len(), 9);
    assert_eq!(persister.save_count(), 9);
}

#[tokio::test]
async fn test_set_permissions_applies_on_next_login_only() {
    let (gateway, _) = setup().await;
    let bob = user_with(&gateway, "bob", json!([])).await;
    let admin = guest(&gateway).await;

    let err = call(&gateway, "getVehicles", json!([bob])).await.unwrap_err();
    assert!(matches!(err, GatewayError::PermissionDenied(Permission::ReadData)));

    call(&gateway, "setPermissions", json!([admin, "bob", ["READ_DATA"]]))
        .await
        .unwrap();

    // The open session keeps its login snapshot.
    let err = call(&gateway, "getVehicles", json!([bob])).await.unwrap_err();
    assert!(matches!(err, GatewayError::PermissionDenied(Permission::ReadData)));

    let bob_again = login(&gateway, "bob", "pw").await;
    let vehicles = call(&gateway, "getVehicles", json!([bob_again])).await.unwrap();
    assert_eq!(vehicles, json!(["v1", "v2"]));
}

#[tokio::test]
async fn test_remove_user_blocks_login_but_keeps_open_sessions() {
    let (gateway, _) = setup().await;
    let alice = user_with(&gateway, "alice", json!(["READ_DATA"])).await;
    let admin = guest(&gateway).await;

    call(&gateway, "removeUser", json!([admin, "alice"])).await.unwrap();

    let err = call(&gateway, "login", json!(["alice", "pw"])).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::CredentialsInvalid);
    call(&gateway, "getVehicles", json!([alice])).await.unwrap();

    let err = call(&gateway, "removeUser", json!([admin, "alice"])).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::AccountUnknown);
}

// =========================================================================
// Pass-through
// =========================================================================

#[tokio::test]
async fn test_pass_through_strips_token_before_engine() {
    let (gateway, engine) = setup().await;
    let token = guest(&gateway).await;

    call(&gateway, "withdrawByVehicle", json!([token, "v1", true]))
        .await
        .unwrap();

    assert_eq!(
        engine.calls(),
        vec![("withdrawByVehicle".to_string(), vec![json!("v1"), json!(true)])]
    );
}

#[tokio::test]
async fn test_pass_through_reports_first_missing_permission() {
    let (gateway, engine) = setup().await;
    let alice = user_with(&gateway, "alice", json!(["READ_DATA"])).await;

    let err = call(&gateway, "withdrawByVehicle", json!([alice, "v1", false]))
        .await
        .unwrap_err();

    assert!(matches!(err, GatewayError::PermissionDenied(Permission::ModifyVehicles)));
    assert!(engine.calls().is_empty());
}

#[tokio::test]
async fn test_pass_through_without_token_returns_illegal_argument() {
    let (gateway, engine) = setup().await;

    let missing = call(&gateway, "getVehicles", json!([])).await.unwrap_err();
    let mistyped = call(&gateway, "getVehicles", json!([42])).await.unwrap_err();

    assert_eq!(missing.kind(), ErrorKind::IllegalArgument);
    assert_eq!(mistyped.kind(), ErrorKind::IllegalArgument);
    assert!(engine.calls().is_empty());
}

#[tokio::test]
async fn test_pass_through_engine_failure_maps_to_engine_error() {
    let (gateway, _) = setup().await;
    let token = guest(&gateway).await;

    let err = call(&gateway, "explode", json!([token])).await.unwrap_err();

    assert!(matches!(err, GatewayError::Engine(ref msg) if msg == "boom"));
    assert_eq!(err.kind(), ErrorKind::EngineFailure);
}

#[tokio::test]
async fn test_dispatch_unknown_operation_is_unsupported() {
    let (gateway, engine) = setup().await;
    let token = guest(&gateway).await;

    let err = call(&gateway, "selfDestruct", json!([token])).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::UnsupportedOperation);
    assert!(engine.calls().is_empty());
}

#[tokio::test]
async fn test_dispatch_local_operation_shadows_engine() {
    let (gateway, engine) = setup().await;

    guest(&gateway).await;

    assert!(engine.calls().is_empty());
}

#[tokio::test]
async fn test_dispatch_undeclared_operation_is_allowed() {
    let (gateway, engine) = setup().await;

    let state = call(&gateway, "getKernelState", json!(["not-a-session"]))
        .await
        .unwrap();

    assert_eq!(state, json!("OPERATING"));
    assert_eq!(engine.calls().len(), 1);
}

// =========================================================================
// Events
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_poll_returns_events_in_emission_order() {
    let (gateway, engine) = setup().await;
    gateway.start().await;
    let token = guest(&gateway).await;
    call(&gateway, "setEventFilter", json!([token, {"type": "AcceptAll"}]))
        .await
        .unwrap();

    engine.emit("vehicle.updated", json!(1));
    engine.emit("order.created", json!(2));
    engine.emit("vehicle.updated", json!(3));
    settle().await;

    let events = call(&gateway, "pollEvents", json!([token, 0])).await.unwrap();
    assert_eq!(kinds(&events), ["vehicle.updated", "order.created", "vehicle.updated"]);
    assert_eq!(events[2]["payload"], json!(3));

    let again = call(&gateway, "pollEvents", json!([token, 0])).await.unwrap();
    assert_eq!(again, json!([]));

    gateway.terminate().await;
}

#[tokio::test(start_paused = true)]
async fn test_poll_default_filter_refuses_everything() {
    let (gateway, engine) = setup().await;
    gateway.start().await;
    let token = guest(&gateway).await;

    engine.emit("vehicle.updated", json!(1));
    settle().await;

    let events = call(&gateway, "pollEvents", json!([token, 0])).await.unwrap();
    assert_eq!(events, json!([]));

    gateway.terminate().await;
}

#[tokio::test(start_paused = true)]
async fn test_poll_kinds_filter_keeps_matching_events() {
    let (gateway, engine) = setup().await;
    gateway.start().await;
    let token = guest(&gateway).await;
    let filter = json!({"type": "Kinds", "kinds": ["order.created"]});
    call(&gateway, "setEventFilter", json!([token, filter])).await.unwrap();

    engine.emit("vehicle.updated", json!(1));
    engine.emit("order.created", json!(2));
    settle().await;

    let events = call(&gateway, "pollEvents", json!([token, 0])).await.unwrap();
    assert_eq!(kinds(&events), ["order.created"]);

    gateway.terminate().await;
}

#[tokio::test(start_paused = true)]
async fn test_poll_empty_buffer_waits_full_timeout() {
    let (gateway, _) = setup().await;
    let token = guest(&gateway).await;

    let started = Instant::now();
    let events = call(&gateway, "pollEvents", json!([token, 2000])).await.unwrap();

    assert_eq!(events, json!([]));
    let waited = started.elapsed();
    assert!(waited >= Duration::from_millis(2000), "waited {waited:?}");
    assert!(waited < Duration::from_millis(2100), "waited {waited:?}");
}

#[tokio::test(start_paused = true)]
async fn test_poll_wakes_as_soon_as_event_arrives() {
    let (gateway, engine) = setup().await;
    gateway.start().await;
    let token = guest(&gateway).await;
    call(&gateway, "setEventFilter", json!([token, {"type": "AcceptAll"}]))
        .await
        .unwrap();

    let poller = {
        let gateway = gateway.clone();
        let token = token.clone();
        tokio::spawn(async move {
            let started = Instant::now();
            let events = call(&gateway, "pollEvents", json!([token, 10_000])).await.unwrap();
            (events, started.elapsed())
        })
    };
    tokio::time::sleep(Duration::from_millis(100)).await;
    engine.emit("order.created", json!("o1"));

    let (events, waited) = poller.await.unwrap();
    assert_eq!(kinds(&events), ["order.created"]);
    assert!(waited < Duration::from_secs(1), "waited {waited:?}");

    gateway.terminate().await;
}

#[tokio::test(start_paused = true)]
async fn test_set_event_filter_unknown_token_is_rejected() {
    let (gateway, _) = setup().await;

    let err = call(&gateway, "setEventFilter", json!(["never-issued", {"type": "AcceptAll"}]))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::CredentialsInvalid);
}

// =========================================================================
// Lifecycle and reaping
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_start_and_terminate_are_idempotent() {
    let (gateway, _) = setup().await;
    assert!(!gateway.is_initialized().await);

    gateway.start().await;
    gateway.start().await;
    assert!(gateway.is_initialized().await);

    gateway.terminate().await;
    gateway.terminate().await;
    assert!(!gateway.is_initialized().await);
}

#[tokio::test(start_paused = true)]
async fn test_terminate_stops_event_delivery() {
    let (gateway, engine) = setup().await;
    gateway.start().await;
    let token = guest(&gateway).await;
    call(&gateway, "setEventFilter", json!([token, {"type": "AcceptAll"}]))
        .await
        .unwrap();

    gateway.terminate().await;
    engine.emit("vehicle.updated", json!(1));
    settle().await;

    let events = call(&gateway, "pollEvents", json!([token, 0])).await.unwrap();
    assert_eq!(events, json!([]));
}

#[tokio::test(start_paused = true)]
async fn test_reaper_evicts_idle_session_but_keeps_polling_one() {
    let (gateway, _) = setup().await;
    gateway.start().await;
    let idle = guest(&gateway).await;
    let busy = guest(&gateway).await;

    let poller = {
        let gateway = gateway.clone();
        let busy = busy.clone();
        tokio::spawn(async move {
            for _ in 0..10 {
                call(&gateway, "pollEvents", json!([busy, 500])).await.unwrap();
            }
        })
    };
    poller.await.unwrap();

    let err = call(&gateway, "setEventFilter", json!([idle, {"type": "AcceptAll"}]))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::CredentialsInvalid);
    call(&gateway, "setEventFilter", json!([busy, {"type": "AcceptAll"}]))
        .await
        .unwrap();

    gateway.terminate().await;
}

#[tokio::test(start_paused = true)]
async fn test_reaper_never_evicts_session_blocked_in_poll() {
    let (gateway, _) = setup().await;
    gateway.start().await;
    let token = guest(&gateway).await;

    // One poll spanning many sweeps.
    let events = call(&gateway, "pollEvents", json!([token, 5000])).await.unwrap();
    assert_eq!(events, json!([]));

    assert!(gateway.sessions().lock().await.get(&SessionToken::new(&token)).is_some());
    gateway.terminate().await;
}
