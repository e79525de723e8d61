use super::*;
use std::{collections::HashMap, sync::Arc};

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use tokio::{net::TcpListener, sync::Mutex};

const ANON_KEY: &str = "anon-key";
const USER_ID: &str = "6f1f2c1e-0c43-4a8e-9a7e-6b3c8f1d2a10";

#[derive(Clone, Default)]
struct ServerState {
    bearer_tokens: Arc<Mutex<Vec<String>>>,
    accept_headers: Arc<Mutex<Vec<String>>>,
    grants: Arc<Mutex<Vec<String>>>,
    logout_status: Arc<Mutex<Option<StatusCode>>>,
}

impl ServerState {
    async fn record(&self, headers: &HeaderMap) {
        let bearer = headers
            .get("authorization")
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default()
            .to_string();
        self.bearer_tokens.lock().await.push(bearer);
        let accept = headers
            .get("accept")
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default()
            .to_string();
        self.accept_headers.lock().await.push(accept);
    }
}

fn session_json(access_token: &str, expires_in: i64) -> Value {
    json!({
        "access_token": access_token,
        "refresh_token": "refresh-1",
        "token_type": "bearer",
        "expires_in": expires_in,
        "user": {
            "id": USER_ID,
            "email": "admin@example.com",
            "user_metadata": { "full_name": "Admin" }
        }
    })
}

fn employee_json() -> Value {
    json!({
        "id": USER_ID,
        "full_name": "Admin",
        "email": "admin@example.com",
        "role": "admin",
        "branch_id": 3,
        "salary": "125000.50",
        "created_at": "2024-01-05T10:00:00+00:00",
        "branch": { "id": 3, "name": "HQ", "location": "Lahore" }
    })
}

async fn token(
    State(state): State<ServerState>,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
    Json(body): Json<Value>,
) -> impl IntoResponse {
    if headers.get("apikey").and_then(|value| value.to_str().ok()) != Some(ANON_KEY) {
        return (StatusCode::UNAUTHORIZED, Json(json!({ "message": "Invalid API key" })));
    }
    let grant = query.get("grant_type").cloned().unwrap_or_default();
    state.grants.lock().await.push(grant.clone());
    match grant.as_str() {
        "password" if body["password"] == "secret1" => {
            (StatusCode::OK, Json(session_json("access-1", 3600)))
        }
        "password" => (
            StatusCode::BAD_REQUEST,
            Json(json!({
                "error": "invalid_grant",
                "error_description": "Invalid login credentials"
            })),
        ),
        "refresh_token" if body["refresh_token"] == "refresh-1" => {
            (StatusCode::OK, Json(session_json("access-2", 3600)))
        }
        _ => (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error_description": "Invalid Refresh Token" })),
        ),
    }
}

async fn logout(State(state): State<ServerState>, headers: HeaderMap) -> StatusCode {
    state.record(&headers).await;
    state
        .logout_status
        .lock()
        .await
        .unwrap_or(StatusCode::NO_CONTENT)
}

async fn employees(
    State(state): State<ServerState>,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
) -> Json<Value> {
    state.record(&headers).await;
    if query.get("select").map(String::as_str) == Some("branch_id") {
        return Json(json!([{ "branch_id": 3 }, { "branch_id": null }, { "branch_id": 3 }]));
    }
    if query.contains_key("id") {
        return Json(employee_json());
    }
    Json(json!([employee_json()]))
}

async fn sign_object(
    State(state): State<ServerState>,
    headers: HeaderMap,
    Path((bucket, path)): Path<(String, String)>,
    Json(body): Json<Value>,
) -> Json<Value> {
    state.record(&headers).await;
    Json(json!({
        "signedURL": format!("/object/sign/{bucket}/{path}?token=signed-{}", body["expiresIn"])
    }))
}

async fn spawn_backend_server() -> std::io::Result<(String, ServerState)> {
    std::env::set_var("NO_PROXY", "127.0.0.1,localhost");
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let state = ServerState::default();
    let app = Router::new()
        .route("/auth/v1/token", post(token))
        .route("/auth/v1/logout", post(logout))
        .route("/rest/v1/employees", get(employees))
        .route("/storage/v1/object/sign/:bucket/*path", post(sign_object))
        .with_state(state.clone());
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    Ok((format!("http://{addr}"), state))
}

fn backend(base_url: &str, service_key: Option<&str>) -> HttpBackend {
    HttpBackend::new(HttpBackendConfig {
        base_url: format!("{base_url}/"),
        anon_key: ANON_KEY.to_string(),
        service_key: service_key.map(str::to_string),
    })
}

fn stored_session(access_token: &str, expires_at: i64) -> Session {
    serde_json::from_value(json!({
        "access_token": access_token,
        "refresh_token": "refresh-1",
        "expires_at": expires_at,
        "user": { "id": USER_ID, "email": "admin@example.com" }
    }))
    .expect("session")
}

#[tokio::test]
async fn password_sign_in_stores_session_and_notifies() {
    let (server_url, _state) = spawn_backend_server().await.expect("spawn server");
    let backend = backend(&server_url, None);
    let mut events = backend.subscribe();

    let before = Utc::now().timestamp();
    let session = backend
        .sign_in_with_password("admin@example.com", "secret1")
        .await
        .expect("sign in");
    assert_eq!(session.access_token, "access-1");
    let expires_at = session.expires_at.expect("absolute expiry");
    assert!(expires_at >= before + 3600);

    assert_eq!(backend.current_session().await, Some(session.clone()));
    assert_eq!(events.recv().await.expect("event"), AuthEvent::SignedIn(session));
}

#[tokio::test]
async fn rejected_credentials_surface_provider_message() {
    let (server_url, _state) = spawn_backend_server().await.expect("spawn server");
    let backend = backend(&server_url, None);

    let err = backend
        .sign_in_with_password("admin@example.com", "wrong")
        .await
        .expect_err("bad password");
    match &err {
        ClientError::Remote(api) => assert_eq!(api.code, ErrorCode::Validation),
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(err.to_string(), "Invalid login credentials");
    assert!(backend.current_session().await.is_none());
}

#[tokio::test]
async fn expired_session_is_refreshed_on_read() {
    let (server_url, state) = spawn_backend_server().await.expect("spawn server");
    let backend = backend(&server_url, None);
    backend
        .set_session(stored_session("stale", Utc::now().timestamp() - 10))
        .await
        .expect("set session");
    let mut events = backend.subscribe();

    let session = backend
        .get_session()
        .await
        .expect("get session")
        .expect("refreshed");
    assert_eq!(session.access_token, "access-2");
    assert_eq!(state.grants.lock().await.clone(), vec!["refresh_token".to_string()]);
    assert_eq!(events.recv().await.expect("event").name(), "TOKEN_REFRESHED");
}

#[tokio::test]
async fn failed_refresh_clears_session_and_signs_out() {
    let (server_url, _state) = spawn_backend_server().await.expect("spawn server");
    let backend = backend(&server_url, None);
    let mut session = stored_session("stale", Utc::now().timestamp() - 10);
    session.refresh_token = Some("revoked".into());
    backend.set_session(session).await.expect("set session");
    let mut events = backend.subscribe();

    assert!(backend.get_session().await.expect("get session").is_none());
    assert!(backend.current_session().await.is_none());
    assert_eq!(events.recv().await.expect("event"), AuthEvent::SignedOut);
}

#[tokio::test]
async fn row_requests_carry_user_token_and_decode_joined_rows() {
    let (server_url, state) = spawn_backend_server().await.expect("spawn server");
    let backend = backend(&server_url, None);
    backend
        .set_session(stored_session("user-token", Utc::now().timestamp() + 600))
        .await
        .expect("set session");

    let employees = backend.list_employees().await.expect("list");
    assert_eq!(employees.len(), 1);
    assert_eq!(employees[0].salary, Some(125_000.5));
    assert_eq!(employees[0].branch.as_ref().map(|b| b.name.as_str()), Some("HQ"));

    let single = backend.get_employee(employees[0].id).await.expect("get");
    assert_eq!(single.branch_id, Some(BranchId(3)));

    let refs = backend.employee_branch_refs().await.expect("refs");
    assert_eq!(refs, vec![Some(BranchId(3)), None, Some(BranchId(3))]);

    let tokens = state.bearer_tokens.lock().await.clone();
    assert!(tokens.iter().all(|token| token == "Bearer user-token"));
    let accepts = state.accept_headers.lock().await.clone();
    assert_eq!(accepts[1], "application/vnd.pgrst.object+json");
}

#[tokio::test]
async fn signed_urls_are_made_absolute_and_use_service_key() {
    let (server_url, state) = spawn_backend_server().await.expect("spawn server");
    let backend = backend(&server_url, Some("service-key"));

    let url = backend
        .create_signed_url("cnic-images", "u1/front-1.png", Duration::from_secs(604_800))
        .await
        .expect("sign");
    assert_eq!(
        url,
        format!("{server_url}/storage/v1/object/sign/cnic-images/u1/front-1.png?token=signed-604800")
    );
    assert_eq!(
        state.bearer_tokens.lock().await.clone(),
        vec!["Bearer service-key".to_string()]
    );
}

#[tokio::test]
async fn admin_calls_require_service_key() {
    let (server_url, _state) = spawn_backend_server().await.expect("spawn server");
    let backend = backend(&server_url, None);

    let err = backend
        .admin_delete_user(EmployeeId(uuid::Uuid::nil()))
        .await
        .expect_err("no service key");
    assert!(matches!(err, ClientError::Validation(_)));
}

#[tokio::test]
async fn sign_out_tolerates_already_expired_remote_session() {
    let (server_url, state) = spawn_backend_server().await.expect("spawn server");
    *state.logout_status.lock().await = Some(StatusCode::UNAUTHORIZED);
    let backend = backend(&server_url, None);
    backend
        .set_session(stored_session("user-token", Utc::now().timestamp() + 600))
        .await
        .expect("set session");
    let mut events = backend.subscribe();

    backend.sign_out().await.expect("sign out");
    assert!(backend.current_session().await.is_none());
    assert_eq!(events.recv().await.expect("event"), AuthEvent::SignedOut);
}
