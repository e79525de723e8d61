use std::sync::Arc;

use chrono::Utc;
use futures::future::{join_all, try_join};
use shared::{
    domain::{
        BranchChanges, BranchEntry, BranchId, Employee, EmployeeChanges, EmployeeId, ImageKind,
        NewBranch, NewEmployee, ProfileChanges,
    },
    protocol::{AdminCreateUserRequest, AuthEvent, NewUserMetadata, OtpKind, Session},
};
use tokio::sync::{
    broadcast::{self, error::RecvError},
    Mutex,
};
use tracing::{debug, error, info, warn};

pub mod backend;
pub mod error;
pub mod http;
pub mod password;
pub mod routes;
pub mod session;
pub mod signed_url;
pub mod stats;
pub mod store;

pub use backend::{AuthProvider, EmployeeInsert, ObjectStore, RowStore};
pub use error::{ClientError, ClientResult};
pub use http::{HttpBackend, HttpBackendConfig};
pub use routes::{GuardOutcome, NavItem, Route};
pub use session::{AuthSubscription, CurrentUser, SessionPhase};
pub use signed_url::{ImageUpload, SignedUrl, SignedUrlBroker, DEFAULT_BUCKET};
pub use stats::{BranchView, DashboardStats};
pub use store::{Action, AppState, DashboardAction, EntityAction, Placement, ProfileAction, Store};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeVariant {
    Default,
    Destructive,
}

/// Transient message shown to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub title: String,
    pub description: String,
    pub variant: NoticeVariant,
}

impl Notice {
    pub fn info(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            variant: NoticeVariant::Default,
        }
    }

    pub fn error(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            variant: NoticeVariant::Destructive,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    Notice(Notice),
    Redirect { to: Route, from: Option<String> },
    SessionChanged(SessionPhase),
}

#[derive(Debug, Clone, Default)]
pub struct CnicImages {
    pub front: Option<ImageUpload>,
    pub back: Option<ImageUpload>,
}

impl CnicImages {
    fn validate(&self) -> ClientResult<()> {
        for image in [&self.front, &self.back].into_iter().flatten() {
            image.validate()?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct CreatedEmployee {
    pub employee: Employee,
    pub temporary_password: String,
}

/// Query parameters of the auth callback link.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallbackParams {
    pub token: Option<String>,
    pub kind: Option<String>,
}

impl CallbackParams {
    pub fn from_query(query: &str) -> Self {
        let query = query.split_once('?').map_or(query, |(_, rest)| rest);
        let mut params = Self::default();
        for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
            match key.as_ref() {
                "token" => params.token = Some(value.into_owned()),
                "type" => params.kind = Some(value.into_owned()),
                _ => {}
            }
        }
        params
    }
}

const CALLBACK_FAILURE: &str = "Failed to process authentication. Please try again.";

pub struct DashboardClient {
    auth: Arc<dyn AuthProvider>,
    rows: Arc<dyn RowStore>,
    images: SignedUrlBroker,
    store: Store,
    events: broadcast::Sender<ClientEvent>,
    /// Access token of a credential sign-in whose profile lookup failed.
    declined_session: Mutex<Option<String>>,
}

impl DashboardClient {
    pub fn new(backend: Arc<HttpBackend>, bucket: impl Into<String>) -> Arc<Self> {
        Self::new_with_dependencies(backend.clone(), backend.clone(), backend, bucket)
    }

    pub fn new_with_dependencies(
        auth: Arc<dyn AuthProvider>,
        rows: Arc<dyn RowStore>,
        objects: Arc<dyn ObjectStore>,
        bucket: impl Into<String>,
    ) -> Arc<Self> {
        let (events, _) = broadcast::channel(256);
        Arc::new(Self {
            auth,
            rows,
            images: SignedUrlBroker::new(objects, bucket),
            store: Store::new(),
            events,
            declined_session: Mutex::new(None),
        })
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<ClientEvent> {
        self.events.subscribe()
    }

    pub fn images(&self) -> &SignedUrlBroker {
        &self.images
    }

    pub async fn state(&self) -> AppState {
        self.store.snapshot().await
    }

    fn emit(&self, event: ClientEvent) {
        let _ = self.events.send(event);
    }

    fn notify_error(&self, err: &ClientError) {
        self.emit(ClientEvent::Notice(Notice::error("Error", err.to_string())));
    }

    fn redirect(&self, to: Route) {
        self.emit(ClientEvent::Redirect { to, from: None });
    }

    async fn dispatch(&self, action: Action) -> AppState {
        let before = self.store.snapshot().await.auth.phase;
        let next = self.store.dispatch(action).await;
        if next.auth.phase != before {
            self.emit(ClientEvent::SessionChanged(next.auth.phase));
        }
        next
    }

    /// Records a failed operation: error slot, notice and, for unauthorized
    /// failures, sign-out plus a redirect to the login route.
    async fn reject(&self, err: ClientError, action: impl FnOnce(String) -> Action) -> ClientError {
        let message = err.to_string();
        warn!(error = %message, "operation rejected");
        self.dispatch(action(message)).await;
        if err.is_unauthorized() {
            self.dispatch(Action::ClearUser).await;
            self.redirect(Route::Login);
        }
        self.notify_error(&err);
        err
    }

    async fn require_session(&self) -> ClientResult<Session> {
        self.auth.get_session().await?.ok_or(ClientError::NoSession)
    }

    async fn load_profile(&self, session: &Session) -> ClientResult<CurrentUser> {
        let employee = self.rows.get_employee(session.user.id).await?;
        Ok(CurrentUser::merge(session, employee))
    }

    async fn clear_local_state(&self) {
        self.dispatch(Action::ClearUser).await;
        self.dispatch(Action::Employees(EntityAction::Cleared)).await;
        self.dispatch(Action::Branches(EntityAction::Cleared)).await;
    }

    // ---- session -------------------------------------------------------

    /// Restores an existing provider session, if any, into the store.
    pub async fn initialize(&self) -> SessionPhase {
        self.dispatch(Action::RestoreStarted).await;
        let restored = match self.auth.get_session().await {
            Ok(Some(session)) => self.load_profile(&session).await.map(Some),
            Ok(None) => Ok(None),
            Err(err) => Err(err),
        };
        let state = match restored {
            Ok(Some(user)) => {
                info!(user_id = %user.id, role = %user.role(), "session: restored");
                self.dispatch(Action::Authenticated(user)).await
            }
            Ok(None) => self.dispatch(Action::Anonymous).await,
            Err(err) => {
                warn!(error = %err, "session: restore failed");
                self.dispatch(Action::AuthRejected(err.to_string())).await
            }
        };
        state.auth.phase
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> ClientResult<CurrentUser> {
        *self.declined_session.lock().await = None;
        self.dispatch(Action::SignInPending).await;
        let session = match self.auth.sign_in_with_password(email, password).await {
            Ok(session) => session,
            Err(err) => return Err(self.reject(err, Action::AuthRejected).await),
        };

        match self.load_profile(&session).await {
            Ok(user) => {
                info!(user_id = %user.id, role = %user.role(), "session: signed in");
                self.dispatch(Action::Authenticated(user.clone())).await;
                Ok(user)
            }
            Err(err) => {
                // Marked before the rejection clears `pending`.
                *self.declined_session.lock().await = Some(session.access_token);
                Err(self.reject(err, Action::AuthRejected).await)
            }
        }
    }

    /// Consumes the marker left by a failed credential sign-in for `session`.
    async fn take_declined(&self, session: &Session) -> bool {
        let mut declined = self.declined_session.lock().await;
        if declined.as_deref() == Some(session.access_token.as_str()) {
            *declined = None;
            return true;
        }
        false
    }

    pub async fn sign_out(&self) -> ClientResult<()> {
        if let Err(err) = self.auth.sign_out().await {
            warn!(error = %err, "session: sign-out failed");
            self.notify_error(&err);
            return Err(err);
        }
        self.clear_local_state().await;
        self.redirect(Route::Login);
        Ok(())
    }

    /// Mirrors provider notifications into the store until the returned
    /// handle is unsubscribed or dropped.
    pub fn attach_auth_listener(self: &Arc<Self>) -> AuthSubscription {
        let mut events = self.auth.subscribe();
        let client = Arc::clone(self);
        let task = tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(event) => client.handle_auth_event(event).await,
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "session: auth listener lagged behind provider events");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        });
        AuthSubscription::new(task)
    }

    pub async fn handle_auth_event(&self, event: AuthEvent) {
        debug!(event = event.name(), "session: provider event");
        match event {
            AuthEvent::SignedIn(session) => {
                let auth = self.store.snapshot().await.auth;
                let already_current = auth
                    .user
                    .as_ref()
                    .is_some_and(|user| user.id == session.user.id);
                // A pending credential submission performs its own lookup.
                if already_current || auth.pending {
                    return;
                }
                if self.take_declined(&session).await {
                    debug!(user_id = %session.user.id, "session: profile lookup already failed");
                    return;
                }
                match self.load_profile(&session).await {
                    Ok(user) => {
                        info!(user_id = %user.id, "session: signed in by provider event");
                        self.dispatch(Action::Authenticated(user)).await;
                    }
                    Err(err) => {
                        self.reject(err, Action::AuthRejected).await;
                    }
                }
            }
            AuthEvent::SignedOut => {
                info!("session: signed out by provider event");
                self.clear_local_state().await;
            }
            AuthEvent::TokenRefreshed(session) => {
                self.dispatch(Action::AccessTokenRefreshed(session.access_token)).await;
            }
            AuthEvent::UserUpdated(_) | AuthEvent::PasswordRecovery(_) => {}
        }
    }

    // ---- routing -------------------------------------------------------

    pub async fn navigate(&self, path: &str) -> GuardOutcome {
        let auth = self.store.snapshot().await.auth;
        let outcome = routes::guard(path, &auth);
        if let GuardOutcome::Redirect {
            notice: Some(notice),
            ..
        } = &outcome
        {
            self.emit(ClientEvent::Notice(notice.clone()));
        }
        outcome
    }

    pub async fn navigation(&self) -> Vec<NavItem> {
        let role = self.store.snapshot().await.auth.user.map(|user| user.role());
        routes::navigation(role)
    }

    /// Handles the landing page of emailed auth links and returns where the
    /// app goes next.
    pub async fn handle_auth_callback(&self, params: &CallbackParams) -> Route {
        let result: ClientResult<Route> = async {
            match (params.kind.as_deref(), params.token.as_deref()) {
                (Some(kind @ ("recovery" | "invite")), token) => {
                    let token = token
                        .filter(|token| !token.is_empty())
                        .ok_or_else(|| ClientError::validation("Invalid password reset link"))?;
                    let otp = if kind == "invite" {
                        OtpKind::Magiclink
                    } else {
                        OtpKind::Recovery
                    };
                    self.auth.verify_otp(token, otp).await?;
                    Ok(Route::ResetPassword)
                }
                _ => Ok(match self.auth.get_session().await? {
                    Some(_) => Route::Dashboard,
                    None => Route::Login,
                }),
            }
        }
        .await;

        let route = match result {
            Ok(route) => route,
            Err(err) => {
                error!(error = %err, "session: auth callback failed");
                self.emit(ClientEvent::Notice(Notice::error("Error", CALLBACK_FAILURE)));
                Route::Login
            }
        };
        self.redirect(route);
        route
    }

    /// Sets the password of the session opened by a recovery or invite link,
    /// then signs out so the user logs in with it.
    pub async fn reset_password(&self, password: &str, confirmation: &str) -> ClientResult<Route> {
        if let Err(err) = password::validate_reset(password, confirmation) {
            self.notify_error(&err);
            return Err(err);
        }
        if self.auth.get_session().await.ok().flatten().is_none() {
            self.emit(ClientEvent::Notice(Notice::error(
                "Error",
                "Invalid or expired reset link",
            )));
            self.redirect(Route::Login);
            return Err(ClientError::NoSession);
        }

        let result: ClientResult<()> = async {
            self.auth.update_password(password).await?;
            self.auth.sign_out().await
        }
        .await;
        if let Err(err) = result {
            warn!(error = %err, "session: password reset failed");
            self.notify_error(&err);
            return Err(err);
        }

        self.clear_local_state().await;
        self.emit(ClientEvent::Notice(Notice::info(
            "Success",
            "Password set successfully. Please login with your new password.",
        )));
        self.redirect(Route::Login);
        Ok(Route::Login)
    }

    // ---- employees -----------------------------------------------------

    async fn with_signed_images(&self, mut employee: Employee) -> Employee {
        let signed = try_join(
            self.images
                .resign_optional(employee.cnic_front_url.as_deref()),
            self.images.resign_optional(employee.cnic_back_url.as_deref()),
        )
        .await;
        match signed {
            Ok((front, back)) => {
                employee.cnic_front_url = front;
                employee.cnic_back_url = back;
            }
            Err(err) => {
                warn!(
                    employee_id = %employee.id,
                    error = %err,
                    "employees: could not sign image links"
                );
            }
        }
        employee
    }

    pub async fn fetch_employees(&self) -> ClientResult<Vec<Employee>> {
        self.dispatch(Action::Employees(EntityAction::Pending)).await;
        let result: ClientResult<Vec<Employee>> = async {
            self.require_session().await?;
            let employees = self.rows.list_employees().await?;
            Ok(join_all(
                employees
                    .into_iter()
                    .map(|employee| self.with_signed_images(employee)),
            )
            .await)
        }
        .await;

        match result {
            Ok(employees) => {
                debug!(count = employees.len(), "employees: fetched");
                self.dispatch(Action::Employees(EntityAction::Fetched(employees.clone()))).await;
                Ok(employees)
            }
            Err(err) => Err(self
                .reject(err, |message| {
                    Action::Employees(EntityAction::Rejected(message))
                })
                .await),
        }
    }

    pub async fn add_employee(
        &self,
        draft: NewEmployee,
        images: CnicImages,
    ) -> ClientResult<CreatedEmployee> {
        self.dispatch(Action::Employees(EntityAction::Pending)).await;
        match self.create_employee(draft, images).await {
            Ok(created) => {
                info!(employee_id = %created.employee.id, "employees: created");
                self.dispatch(Action::Employees(EntityAction::Inserted {
                    item: created.employee.clone(),
                    at: Placement::Front,
                }))
                .await;
                Ok(created)
            }
            Err(err) => Err(self
                .reject(err, |message| {
                    Action::Employees(EntityAction::Rejected(message))
                })
                .await),
        }
    }

    async fn create_employee(
        &self,
        draft: NewEmployee,
        images: CnicImages,
    ) -> ClientResult<CreatedEmployee> {
        self.require_session().await?;
        images.validate()?;

        let temporary_password = password::temporary_password();
        let user = self
            .auth
            .admin_create_user(AdminCreateUserRequest {
                email: draft.email.clone(),
                password: temporary_password.clone(),
                email_confirm: true,
                user_metadata: NewUserMetadata {
                    full_name: draft.full_name.clone(),
                    role: draft.role,
                },
            })
            .await?;
        let owner = user.id;

        let stored: ClientResult<Employee> = async {
            let (front, back) = try_join(
                self.images
                    .upload_optional(owner, ImageKind::Front, images.front),
                self.images.upload_optional(owner, ImageKind::Back, images.back),
            )
            .await?;
            let row = EmployeeInsert {
                id: owner,
                fields: draft,
                cnic_front_url: front.map(|signed| signed.url),
                cnic_back_url: back.map(|signed| signed.url),
            };
            self.rows.insert_employee(&row).await
        }
        .await;

        match stored {
            Ok(employee) => Ok(CreatedEmployee {
                employee,
                temporary_password,
            }),
            Err(err) => {
                warn!(
                    user_id = %owner,
                    error = %err,
                    "employees: create failed; removing auth user"
                );
                if let Err(cleanup) = self.auth.admin_delete_user(owner).await {
                    error!(
                        user_id = %owner,
                        error = %cleanup,
                        "employees: auth user cleanup failed"
                    );
                }
                Err(err)
            }
        }
    }

    pub async fn update_employee(
        &self,
        id: EmployeeId,
        changes: EmployeeChanges,
        images: CnicImages,
    ) -> ClientResult<Employee> {
        self.dispatch(Action::Employees(EntityAction::Pending)).await;
        match self.apply_employee_update(id, changes, images).await {
            Ok(employee) => {
                info!(employee_id = %id, "employees: updated");
                self.dispatch(Action::Employees(EntityAction::Replaced(employee.clone()))).await;
                self.dispatch(Action::ProfileUpdated(employee.clone())).await;
                Ok(employee)
            }
            Err(err) => Err(self
                .reject(err, |message| {
                    Action::Employees(EntityAction::Rejected(message))
                })
                .await),
        }
    }

    async fn apply_employee_update(
        &self,
        id: EmployeeId,
        mut changes: EmployeeChanges,
        images: CnicImages,
    ) -> ClientResult<Employee> {
        self.require_session().await?;
        images.validate()?;

        let cached = self.store.snapshot().await.employees.get(id).cloned();
        let previous = |kind: ImageKind, given: &Option<String>| {
            given.clone().or_else(|| {
                cached
                    .as_ref()
                    .and_then(|employee| employee.image_url(kind).map(str::to_string))
            })
        };
        let old_front = previous(ImageKind::Front, &changes.cnic_front_url);
        let old_back = previous(ImageKind::Back, &changes.cnic_back_url);

        let (front, back) = try_join(
            self.images.upload_optional(id, ImageKind::Front, images.front),
            self.images.upload_optional(id, ImageKind::Back, images.back),
        )
        .await?;
        if let Some(front) = front {
            self.images.delete(old_front.as_deref()).await?;
            changes.cnic_front_url = Some(front.url);
        }
        if let Some(back) = back {
            self.images.delete(old_back.as_deref()).await?;
            changes.cnic_back_url = Some(back.url);
        }

        let mut updated = self.rows.update_employee(id, &changes).await?;
        let (front, back) = try_join(
            self.images.resign_optional(updated.cnic_front_url.as_deref()),
            self.images.resign_optional(updated.cnic_back_url.as_deref()),
        )
        .await?;
        updated.cnic_front_url = front;
        updated.cnic_back_url = back;
        Ok(updated)
    }

    pub async fn delete_employee(&self, id: EmployeeId) -> ClientResult<()> {
        self.dispatch(Action::Employees(EntityAction::Pending)).await;
        let result: ClientResult<()> = async {
            self.require_session().await?;
            let employee = self.rows.get_employee(id).await?;
            try_join(
                self.images.delete(employee.cnic_front_url.as_deref()),
                self.images.delete(employee.cnic_back_url.as_deref()),
            )
            .await?;
            self.rows.delete_employee(id).await?;
            // The row is gone remotely; a lingering auth user must not keep
            // the cache entry alive.
            if let Err(err) = self.auth.admin_delete_user(id).await {
                warn!(employee_id = %id, error = %err, "employees: auth user removal failed");
            }
            Ok(())
        }
        .await;

        match result {
            Ok(()) => {
                info!(employee_id = %id, "employees: deleted");
                self.dispatch(Action::Employees(EntityAction::Removed(id))).await;
                Ok(())
            }
            Err(err) => Err(self
                .reject(err, |message| {
                    Action::Employees(EntityAction::Rejected(message))
                })
                .await),
        }
    }

    // ---- branches ------------------------------------------------------

    pub async fn fetch_branches(&self) -> ClientResult<Vec<BranchEntry>> {
        self.dispatch(Action::Branches(EntityAction::Pending)).await;
        let result: ClientResult<Vec<BranchEntry>> = async {
            self.require_session().await?;
            let (branches, refs) =
                try_join(self.rows.list_branches(), self.rows.employee_branch_refs()).await?;
            Ok(branches
                .into_iter()
                .map(|branch| {
                    let employee_count = refs
                        .iter()
                        .filter(|branch_id| **branch_id == Some(branch.id))
                        .count();
                    BranchEntry {
                        branch,
                        employee_count,
                    }
                })
                .collect())
        }
        .await;

        match result {
            Ok(entries) => {
                debug!(count = entries.len(), "branches: fetched");
                self.dispatch(Action::Branches(EntityAction::Fetched(entries.clone()))).await;
                Ok(entries)
            }
            Err(err) => Err(self
                .reject(err, |message| {
                    Action::Branches(EntityAction::Rejected(message))
                })
                .await),
        }
    }

    pub async fn add_branch(&self, draft: NewBranch) -> ClientResult<BranchEntry> {
        self.dispatch(Action::Branches(EntityAction::Pending)).await;
        let result: ClientResult<BranchEntry> = async {
            self.require_session().await?;
            let branch = self.rows.insert_branch(&draft).await?;
            Ok(BranchEntry {
                branch,
                employee_count: 0,
            })
        }
        .await;

        match result {
            Ok(entry) => {
                info!(branch_id = %entry.branch.id, "branches: created");
                self.dispatch(Action::Branches(EntityAction::Inserted {
                    item: entry.clone(),
                    at: Placement::Back,
                }))
                .await;
                Ok(entry)
            }
            Err(err) => Err(self
                .reject(err, |message| {
                    Action::Branches(EntityAction::Rejected(message))
                })
                .await),
        }
    }

    pub async fn update_branch(
        &self,
        id: BranchId,
        changes: BranchChanges,
    ) -> ClientResult<BranchEntry> {
        self.dispatch(Action::Branches(EntityAction::Pending)).await;
        let result: ClientResult<BranchEntry> = async {
            self.require_session().await?;
            let branch = self.rows.update_branch(id, &changes).await?;
            let members = self.rows.employees_in_branch(id).await?;
            Ok(BranchEntry {
                branch,
                employee_count: members.len(),
            })
        }
        .await;

        match result {
            Ok(entry) => {
                info!(branch_id = %id, "branches: updated");
                self.dispatch(Action::Branches(EntityAction::Replaced(entry.clone()))).await;
                Ok(entry)
            }
            Err(err) => Err(self
                .reject(err, |message| {
                    Action::Branches(EntityAction::Rejected(message))
                })
                .await),
        }
    }

    /// Refused while any employee still references the branch.
    pub async fn delete_branch(&self, id: BranchId) -> ClientResult<()> {
        self.dispatch(Action::Branches(EntityAction::Pending)).await;
        let result: ClientResult<()> = async {
            self.require_session().await?;
            let members = self.rows.employees_in_branch(id).await?;
            if !members.is_empty() {
                return Err(ClientError::BranchInUse);
            }
            self.rows.delete_branch(id).await
        }
        .await;

        match result {
            Ok(()) => {
                info!(branch_id = %id, "branches: deleted");
                self.dispatch(Action::Branches(EntityAction::Removed(id))).await;
                Ok(())
            }
            Err(err) => Err(self
                .reject(err, |message| {
                    Action::Branches(EntityAction::Rejected(message))
                })
                .await),
        }
    }

    // ---- dashboard & profile -------------------------------------------

    pub async fn fetch_dashboard_stats(&self) -> ClientResult<DashboardStats> {
        self.dispatch(Action::Dashboard(DashboardAction::Pending)).await;
        let result: ClientResult<DashboardStats> = async {
            self.require_session().await?;
            let (employees, branches) =
                try_join(self.rows.list_employees(), self.rows.list_branches()).await?;
            Ok(stats::compute(&employees, &branches, Utc::now()))
        }
        .await;

        match result {
            Ok(stats) => {
                self.dispatch(Action::Dashboard(DashboardAction::Loaded(stats.clone()))).await;
                Ok(stats)
            }
            Err(err) => Err(self
                .reject(err, |message| {
                    Action::Dashboard(DashboardAction::Rejected(message))
                })
                .await),
        }
    }

    /// Branch figures for the signed-in user's own branch, from the cached
    /// employee list.
    pub async fn branch_overview(&self) -> Option<BranchView> {
        let state = self.store.snapshot().await;
        let branch_id = state.auth.user.as_ref()?.branch_id()?;
        Some(stats::branch_view(&state.employees.items, branch_id))
    }

    pub async fn update_profile(&self, changes: ProfileChanges) -> ClientResult<Employee> {
        let user_id = self
            .store
            .snapshot()
            .await
            .auth
            .user
            .map(|user| user.id)
            .ok_or(ClientError::NoSession)?;

        self.dispatch(Action::Profile(ProfileAction::Pending)).await;
        let result: ClientResult<Employee> = async {
            self.require_session().await?;
            self.rows
                .update_employee(user_id, &EmployeeChanges::from(changes))
                .await
        }
        .await;

        match result {
            Ok(employee) => {
                info!(employee_id = %user_id, "profile: updated");
                self.dispatch(Action::ProfileUpdated(employee.clone())).await;
                self.dispatch(Action::Employees(EntityAction::Replaced(employee.clone()))).await;
                self.dispatch(Action::Profile(ProfileAction::Succeeded)).await;
                self.emit(ClientEvent::Notice(Notice::info(
                    "Success",
                    "Profile updated successfully",
                )));
                Ok(employee)
            }
            Err(err) => Err(self
                .reject(err, |message| {
                    Action::Profile(ProfileAction::Rejected(message))
                })
                .await),
        }
    }

    pub async fn change_password(
        &self,
        new_password: &str,
        confirmation: &str,
    ) -> ClientResult<()> {
        if let Err(err) = password::validate_change(new_password, confirmation) {
            self.notify_error(&err);
            return Err(err);
        }

        self.dispatch(Action::Profile(ProfileAction::Pending)).await;
        let result: ClientResult<()> = async {
            self.require_session().await?;
            self.auth.update_password(new_password).await?;
            Ok(())
        }
        .await;

        match result {
            Ok(()) => {
                info!("profile: password changed");
                self.dispatch(Action::Profile(ProfileAction::Succeeded)).await;
                self.emit(ClientEvent::Notice(Notice::info(
                    "Success",
                    "Password updated successfully",
                )));
                Ok(())
            }
            Err(err) => Err(self
                .reject(err, |message| {
                    Action::Profile(ProfileAction::Rejected(message))
                })
                .await),
        }
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
