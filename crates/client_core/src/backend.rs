//! Seams to the hosted backend: auth provider, row store and object storage.

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use shared::{
    domain::{
        Branch, BranchChanges, BranchId, Employee, EmployeeChanges, EmployeeId, NewBranch,
        NewEmployee,
    },
    protocol::{AdminCreateUserRequest, AuthEvent, AuthUser, OtpKind, Session},
};
use tokio::sync::broadcast;

use crate::error::ClientResult;

#[async_trait]
pub trait AuthProvider: Send + Sync {
    async fn sign_in_with_password(&self, email: &str, password: &str) -> ClientResult<Session>;
    /// Current session, refreshed first when it has expired.
    async fn get_session(&self) -> ClientResult<Option<Session>>;
    /// Installs a session persisted by an earlier run.
    async fn set_session(&self, session: Session) -> ClientResult<()>;
    async fn sign_out(&self) -> ClientResult<()>;
    async fn update_password(&self, new_password: &str) -> ClientResult<AuthUser>;
    async fn verify_otp(&self, token_hash: &str, kind: OtpKind) -> ClientResult<Session>;
    async fn admin_create_user(&self, request: AdminCreateUserRequest) -> ClientResult<AuthUser>;
    async fn admin_delete_user(&self, user_id: EmployeeId) -> ClientResult<()>;
    fn subscribe(&self) -> broadcast::Receiver<AuthEvent>;
}

/// Row written when an employee is created; the id is the auth identity.
#[derive(Debug, Clone, Serialize)]
pub struct EmployeeInsert {
    pub id: EmployeeId,
    #[serde(flatten)]
    pub fields: NewEmployee,
    pub cnic_front_url: Option<String>,
    pub cnic_back_url: Option<String>,
}

#[async_trait]
pub trait RowStore: Send + Sync {
    /// All employees joined with their branch, newest first.
    async fn list_employees(&self) -> ClientResult<Vec<Employee>>;
    async fn get_employee(&self, id: EmployeeId) -> ClientResult<Employee>;
    async fn insert_employee(&self, row: &EmployeeInsert) -> ClientResult<Employee>;
    async fn update_employee(
        &self,
        id: EmployeeId,
        changes: &EmployeeChanges,
    ) -> ClientResult<Employee>;
    async fn delete_employee(&self, id: EmployeeId) -> ClientResult<()>;
    /// `branch_id` of every employee row.
    async fn employee_branch_refs(&self) -> ClientResult<Vec<Option<BranchId>>>;
    async fn employees_in_branch(&self, branch_id: BranchId) -> ClientResult<Vec<EmployeeId>>;

    async fn list_branches(&self) -> ClientResult<Vec<Branch>>;
    async fn insert_branch(&self, branch: &NewBranch) -> ClientResult<Branch>;
    async fn update_branch(&self, id: BranchId, changes: &BranchChanges) -> ClientResult<Branch>;
    async fn delete_branch(&self, id: BranchId) -> ClientResult<()>;
}

#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn upload(
        &self,
        bucket: &str,
        path: &str,
        content_type: &str,
        bytes: Vec<u8>,
    ) -> ClientResult<()>;
    /// Absolute download URL valid for `expires_in`.
    async fn create_signed_url(
        &self,
        bucket: &str,
        path: &str,
        expires_in: Duration,
    ) -> ClientResult<String>;
    async fn remove(&self, bucket: &str, paths: Vec<String>) -> ClientResult<()>;
}
