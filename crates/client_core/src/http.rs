//! `reqwest` implementation of the backend seams against the hosted
//! auth (`/auth/v1`), row (`/rest/v1`) and storage (`/storage/v1`) endpoints.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::{header, Client, RequestBuilder, Response};
use serde::{de::DeserializeOwned, Deserialize};
use shared::{
    domain::{
        Branch, BranchChanges, BranchId, Employee, EmployeeChanges, EmployeeId, NewBranch,
    },
    error::{ApiError, ErrorCode},
    protocol::{
        AdminCreateUserRequest, AuthEvent, AuthUser, OtpKind, PasswordGrantRequest,
        RefreshGrantRequest, RemoveObjectsRequest, Session, SignObjectRequest,
        SignObjectResponse, UpdateUserRequest, VerifyOtpRequest,
    },
};
use tokio::sync::{broadcast, RwLock};
use tracing::{debug, info, warn};

use crate::{
    backend::{AuthProvider, EmployeeInsert, ObjectStore, RowStore},
    error::{ClientError, ClientResult},
};

const EMPLOYEES_TABLE: &str = "employees";
const BRANCHES_TABLE: &str = "branches";
const EMPLOYEE_COLUMNS: &str = "id,full_name,email,phone,address,role,branch_id,salary,\
cnic_number,cnic_front_url,cnic_back_url,created_at,branch:branches!branch_id(id,name,location)";
const SINGLE_OBJECT: &str = "application/vnd.pgrst.object+json";
const RETURN_REPRESENTATION: &str = "return=representation";
const UPLOAD_CACHE_CONTROL: &str = "max-age=3600";

#[derive(Debug, Clone)]
pub struct HttpBackendConfig {
    pub base_url: String,
    pub anon_key: String,
    /// Needed for user administration and storage access.
    pub service_key: Option<String>,
}

pub struct HttpBackend {
    http: Client,
    base_url: String,
    anon_key: String,
    service_key: Option<String>,
    session: RwLock<Option<Session>>,
    events: broadcast::Sender<AuthEvent>,
}

#[derive(Debug, Deserialize)]
struct BranchRef {
    #[serde(default)]
    branch_id: Option<BranchId>,
}

#[derive(Debug, Deserialize)]
struct IdRow {
    id: EmployeeId,
}

impl HttpBackend {
    pub fn new(config: HttpBackendConfig) -> Self {
        let (events, _) = broadcast::channel(64);
        Self {
            http: Client::new(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            anon_key: config.anon_key,
            service_key: config.service_key,
            session: RwLock::new(None),
            events,
        }
    }

    /// Session as currently held, without refreshing.
    pub async fn current_session(&self) -> Option<Session> {
        self.session.read().await.clone()
    }

    fn auth_url(&self, path: &str) -> String {
        format!("{}/auth/v1{path}", self.base_url)
    }

    fn rest_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{table}", self.base_url)
    }

    fn storage_url(&self, path: &str) -> String {
        format!("{}/storage/v1{path}", self.base_url)
    }

    fn emit(&self, event: AuthEvent) {
        debug!(event = event.name(), "auth: emitting provider event");
        let _ = self.events.send(event);
    }

    async fn user_token(&self) -> String {
        match self.session.read().await.as_ref() {
            Some(session) => session.access_token.clone(),
            None => self.anon_key.clone(),
        }
    }

    fn service_token(&self) -> ClientResult<&str> {
        self.service_key
            .as_deref()
            .ok_or_else(|| ClientError::validation("backend service key is not configured"))
    }

    /// Storage calls use the service key when one is configured.
    async fn storage_token(&self) -> String {
        match &self.service_key {
            Some(key) => key.clone(),
            None => self.user_token().await,
        }
    }

    fn with_key(&self, request: RequestBuilder, token: &str) -> RequestBuilder {
        request
            .header("apikey", &self.anon_key)
            .bearer_auth(token)
    }

    async fn rows(&self, request: RequestBuilder) -> RequestBuilder {
        let token = self.user_token().await;
        self.with_key(request, &token)
    }

    async fn store_session(&self, session: Session) -> Session {
        let session = session.with_absolute_expiry(Utc::now());
        *self.session.write().await = Some(session.clone());
        session
    }

    async fn clear_session(&self) {
        *self.session.write().await = None;
    }

    async fn refresh_session(&self, refresh_token: &str) -> ClientResult<Session> {
        let request = self
            .http
            .post(self.auth_url("/token"))
            .query(&[("grant_type", "refresh_token")])
            .json(&RefreshGrantRequest {
                refresh_token: refresh_token.to_string(),
            });
        let session: Session = send_json(self.with_key(request, &self.anon_key)).await?;
        let session = self.store_session(session).await;
        info!(user_id = %session.user.id, "auth: session refreshed");
        self.emit(AuthEvent::TokenRefreshed(session.clone()));
        Ok(session)
    }
}

async fn check(response: Response) -> ClientResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(ApiError::from_response(status.as_u16(), &body).into())
}

async fn send_json<T: DeserializeOwned>(request: RequestBuilder) -> ClientResult<T> {
    let response = check(request.send().await?).await?;
    Ok(response.json().await?)
}

async fn send_empty(request: RequestBuilder) -> ClientResult<()> {
    check(request.send().await?).await?;
    Ok(())
}

#[async_trait]
impl AuthProvider for HttpBackend {
    async fn sign_in_with_password(&self, email: &str, password: &str) -> ClientResult<Session> {
        let request = self
            .http
            .post(self.auth_url("/token"))
            .query(&[("grant_type", "password")])
            .json(&PasswordGrantRequest {
                email: email.to_string(),
                password: password.to_string(),
            });
        let session: Session = send_json(self.with_key(request, &self.anon_key)).await?;
        let session = self.store_session(session).await;
        info!(user_id = %session.user.id, "auth: signed in with password");
        self.emit(AuthEvent::SignedIn(session.clone()));
        Ok(session)
    }

    async fn get_session(&self) -> ClientResult<Option<Session>> {
        let Some(session) = self.current_session().await else {
            return Ok(None);
        };
        if !session.is_expired(Utc::now()) {
            return Ok(Some(session));
        }

        let Some(refresh_token) = session.refresh_token.clone() else {
            warn!(user_id = %session.user.id, "auth: session expired without refresh token");
            self.clear_session().await;
            self.emit(AuthEvent::SignedOut);
            return Ok(None);
        };

        match self.refresh_session(&refresh_token).await {
            Ok(session) => Ok(Some(session)),
            Err(err) => {
                warn!(error = %err, "auth: session refresh failed; clearing session");
                self.clear_session().await;
                self.emit(AuthEvent::SignedOut);
                Ok(None)
            }
        }
    }

    async fn set_session(&self, session: Session) -> ClientResult<()> {
        self.store_session(session).await;
        Ok(())
    }

    async fn sign_out(&self) -> ClientResult<()> {
        if let Some(session) = self.current_session().await {
            let request = self.http.post(self.auth_url("/logout"));
            match send_empty(self.with_key(request, &session.access_token)).await {
                Ok(()) => {}
                Err(ClientError::Remote(err))
                    if matches!(err.code, ErrorCode::Unauthorized | ErrorCode::NotFound) =>
                {
                    debug!("auth: remote session already gone during sign-out");
                }
                Err(err) => return Err(err),
            }
        }
        self.clear_session().await;
        info!("auth: signed out");
        self.emit(AuthEvent::SignedOut);
        Ok(())
    }

    async fn update_password(&self, new_password: &str) -> ClientResult<AuthUser> {
        let session = self.current_session().await.ok_or(ClientError::NoSession)?;
        let request = self.http.put(self.auth_url("/user")).json(&UpdateUserRequest {
            password: new_password.to_string(),
        });
        let user: AuthUser = send_json(self.with_key(request, &session.access_token)).await?;
        {
            let mut guard = self.session.write().await;
            if let Some(current) = guard.as_mut() {
                current.user = user.clone();
            }
        }
        self.emit(AuthEvent::UserUpdated(user.clone()));
        Ok(user)
    }

    async fn verify_otp(&self, token_hash: &str, kind: OtpKind) -> ClientResult<Session> {
        let request = self.http.post(self.auth_url("/verify")).json(&VerifyOtpRequest {
            token_hash: token_hash.to_string(),
            kind,
        });
        let session: Session = send_json(self.with_key(request, &self.anon_key)).await?;
        let session = self.store_session(session).await;
        info!(user_id = %session.user.id, kind = ?kind, "auth: one-time token verified");
        if kind == OtpKind::Recovery {
            self.emit(AuthEvent::PasswordRecovery(session.clone()));
        } else {
            self.emit(AuthEvent::SignedIn(session.clone()));
        }
        Ok(session)
    }

    async fn admin_create_user(&self, request: AdminCreateUserRequest) -> ClientResult<AuthUser> {
        let token = self.service_token()?;
        let builder = self.http.post(self.auth_url("/admin/users")).json(&request);
        let user: AuthUser = send_json(self.with_key(builder, token)).await?;
        info!(user_id = %user.id, "auth: created user");
        Ok(user)
    }

    async fn admin_delete_user(&self, user_id: EmployeeId) -> ClientResult<()> {
        let token = self.service_token()?;
        let builder = self
            .http
            .delete(self.auth_url(&format!("/admin/users/{user_id}")));
        send_empty(self.with_key(builder, token)).await?;
        info!(user_id = %user_id, "auth: deleted user");
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        self.events.subscribe()
    }
}

#[async_trait]
impl RowStore for HttpBackend {
    async fn list_employees(&self) -> ClientResult<Vec<Employee>> {
        let request = self
            .http
            .get(self.rest_url(EMPLOYEES_TABLE))
            .query(&[("select", EMPLOYEE_COLUMNS), ("order", "created_at.desc")]);
        send_json(self.rows(request).await).await
    }

    async fn get_employee(&self, id: EmployeeId) -> ClientResult<Employee> {
        let request = self
            .http
            .get(self.rest_url(EMPLOYEES_TABLE))
            .query(&[("select", EMPLOYEE_COLUMNS.to_string()), ("id", format!("eq.{id}"))])
            .header(header::ACCEPT, SINGLE_OBJECT);
        send_json(self.rows(request).await).await
    }

    async fn insert_employee(&self, row: &EmployeeInsert) -> ClientResult<Employee> {
        let request = self
            .http
            .post(self.rest_url(EMPLOYEES_TABLE))
            .query(&[("select", EMPLOYEE_COLUMNS)])
            .header("Prefer", RETURN_REPRESENTATION)
            .header(header::ACCEPT, SINGLE_OBJECT)
            .json(row);
        send_json(self.rows(request).await).await
    }

    async fn update_employee(
        &self,
        id: EmployeeId,
        changes: &EmployeeChanges,
    ) -> ClientResult<Employee> {
        let request = self
            .http
            .patch(self.rest_url(EMPLOYEES_TABLE))
            .query(&[("select", EMPLOYEE_COLUMNS.to_string()), ("id", format!("eq.{id}"))])
            .header("Prefer", RETURN_REPRESENTATION)
            .header(header::ACCEPT, SINGLE_OBJECT)
            .json(changes);
        send_json(self.rows(request).await).await
    }

    async fn delete_employee(&self, id: EmployeeId) -> ClientResult<()> {
        let request = self
            .http
            .delete(self.rest_url(EMPLOYEES_TABLE))
            .query(&[("id", format!("eq.{id}"))]);
        send_empty(self.rows(request).await).await
    }

    async fn employee_branch_refs(&self) -> ClientResult<Vec<Option<BranchId>>> {
        let request = self
            .http
            .get(self.rest_url(EMPLOYEES_TABLE))
            .query(&[("select", "branch_id")]);
        let rows: Vec<BranchRef> = send_json(self.rows(request).await).await?;
        Ok(rows.into_iter().map(|row| row.branch_id).collect())
    }

    async fn employees_in_branch(&self, branch_id: BranchId) -> ClientResult<Vec<EmployeeId>> {
        let request = self
            .http
            .get(self.rest_url(EMPLOYEES_TABLE))
            .query(&[("select", "id".to_string()), ("branch_id", format!("eq.{branch_id}"))]);
        let rows: Vec<IdRow> = send_json(self.rows(request).await).await?;
        Ok(rows.into_iter().map(|row| row.id).collect())
    }

    async fn list_branches(&self) -> ClientResult<Vec<Branch>> {
        let request = self
            .http
            .get(self.rest_url(BRANCHES_TABLE))
            .query(&[("select", "*")]);
        send_json(self.rows(request).await).await
    }

    async fn insert_branch(&self, branch: &NewBranch) -> ClientResult<Branch> {
        let request = self
            .http
            .post(self.rest_url(BRANCHES_TABLE))
            .query(&[("select", "*")])
            .header("Prefer", RETURN_REPRESENTATION)
            .header(header::ACCEPT, SINGLE_OBJECT)
            .json(branch);
        send_json(self.rows(request).await).await
    }

    async fn update_branch(&self, id: BranchId, changes: &BranchChanges) -> ClientResult<Branch> {
        let request = self
            .http
            .patch(self.rest_url(BRANCHES_TABLE))
            .query(&[("select", "*".to_string()), ("id", format!("eq.{id}"))])
            .header("Prefer", RETURN_REPRESENTATION)
            .header(header::ACCEPT, SINGLE_OBJECT)
            .json(changes);
        send_json(self.rows(request).await).await
    }

    async fn delete_branch(&self, id: BranchId) -> ClientResult<()> {
        let request = self
            .http
            .delete(self.rest_url(BRANCHES_TABLE))
            .query(&[("id", format!("eq.{id}"))]);
        send_empty(self.rows(request).await).await
    }
}

#[async_trait]
impl ObjectStore for HttpBackend {
    async fn upload(
        &self,
        bucket: &str,
        path: &str,
        content_type: &str,
        bytes: Vec<u8>,
    ) -> ClientResult<()> {
        let token = self.storage_token().await;
        let request = self
            .http
            .post(self.storage_url(&format!("/object/{bucket}/{path}")))
            .header(header::CONTENT_TYPE, content_type)
            .header(header::CACHE_CONTROL, UPLOAD_CACHE_CONTROL)
            .header("x-upsert", "true")
            .body(bytes);
        send_empty(self.with_key(request, &token)).await?;
        debug!(bucket, path, "storage: uploaded object");
        Ok(())
    }

    async fn create_signed_url(
        &self,
        bucket: &str,
        path: &str,
        expires_in: Duration,
    ) -> ClientResult<String> {
        let token = self.storage_token().await;
        let expires_in = i64::try_from(expires_in.as_secs())
            .map_err(|_| ClientError::validation("signed URL lifetime is too long"))?;
        let request = self
            .http
            .post(self.storage_url(&format!("/object/sign/{bucket}/{path}")))
            .json(&SignObjectRequest { expires_in });
        let response: SignObjectResponse = send_json(self.with_key(request, &token)).await?;
        if response.signed_url.starts_with("http://") || response.signed_url.starts_with("https://")
        {
            return Ok(response.signed_url);
        }
        Ok(self.storage_url(&response.signed_url))
    }

    async fn remove(&self, bucket: &str, paths: Vec<String>) -> ClientResult<()> {
        if paths.is_empty() {
            return Ok(());
        }
        let token = self.storage_token().await;
        let request = self
            .http
            .delete(self.storage_url(&format!("/object/{bucket}")))
            .json(&RemoveObjectsRequest { prefixes: paths });
        send_empty(self.with_key(request, &token)).await
    }
}

#[cfg(test)]
#[path = "tests/http_tests.rs"]
mod tests;
