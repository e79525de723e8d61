//! Application state container: message-style actions applied by pure
//! reducers, behind a single async mutex.

use shared::domain::{BranchEntry, BranchId, Employee, EmployeeId};
use tokio::sync::Mutex;

use crate::{
    session::{CurrentUser, SessionPhase},
    stats::DashboardStats,
};

pub trait Keyed {
    type Key: PartialEq + Copy + std::fmt::Debug;

    fn key(&self) -> Self::Key;
}

impl Keyed for Employee {
    type Key = EmployeeId;

    fn key(&self) -> EmployeeId {
        self.id
    }
}

impl Keyed for BranchEntry {
    type Key = BranchId;

    fn key(&self) -> BranchId {
        self.branch.id
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AuthState {
    pub phase: SessionPhase,
    pub user: Option<CurrentUser>,
    /// A credential submission is in flight.
    pub pending: bool,
    pub error: Option<String>,
}

impl AuthState {
    pub fn is_loading(&self) -> bool {
        self.pending || !self.phase.is_settled()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EntityState<T> {
    pub items: Vec<T>,
    pub loading: bool,
    pub error: Option<String>,
}

impl<T> Default for EntityState<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            loading: false,
            error: None,
        }
    }
}

impl<T: Keyed> EntityState<T> {
    pub fn get(&self, key: T::Key) -> Option<&T> {
        self.items.iter().find(|item| item.key() == key)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DashboardState {
    pub stats: DashboardStats,
    pub loading: bool,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProfileState {
    pub loading: bool,
    pub error: Option<String>,
    pub success: bool,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AppState {
    pub auth: AuthState,
    pub employees: EntityState<Employee>,
    pub branches: EntityState<BranchEntry>,
    pub dashboard: DashboardState,
    pub profile: ProfileState,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    Front,
    Back,
}

#[derive(Debug, Clone, PartialEq)]
pub enum EntityAction<T: Keyed> {
    Pending,
    Fetched(Vec<T>),
    Inserted { item: T, at: Placement },
    Replaced(T),
    Removed(T::Key),
    Rejected(String),
    Cleared,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DashboardAction {
    Pending,
    Loaded(DashboardStats),
    Rejected(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum ProfileAction {
    Pending,
    Succeeded,
    Rejected(String),
    Reset,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    RestoreStarted,
    SignInPending,
    Authenticated(CurrentUser),
    /// Sign-in, restore or profile lookup failed.
    AuthRejected(String),
    Anonymous,
    ClearUser,
    AccessTokenRefreshed(String),
    ProfileUpdated(Employee),
    Employees(EntityAction<Employee>),
    Branches(EntityAction<BranchEntry>),
    Dashboard(DashboardAction),
    Profile(ProfileAction),
}

pub fn reduce(mut state: AppState, action: Action) -> AppState {
    match action {
        Action::RestoreStarted => {
            state.auth.phase = SessionPhase::Restoring;
            state.auth.error = None;
        }
        Action::SignInPending => {
            state.auth.pending = true;
            state.auth.error = None;
        }
        Action::Authenticated(user) => {
            state.auth = AuthState {
                phase: SessionPhase::Authenticated,
                user: Some(user),
                pending: false,
                error: None,
            };
        }
        Action::AuthRejected(message) => {
            state.auth = AuthState {
                phase: SessionPhase::Anonymous,
                user: None,
                pending: false,
                error: Some(message),
            };
        }
        Action::Anonymous | Action::ClearUser => {
            state.auth = AuthState {
                phase: SessionPhase::Anonymous,
                ..AuthState::default()
            };
        }
        Action::AccessTokenRefreshed(token) => {
            if let Some(user) = state.auth.user.as_mut() {
                user.access_token = token;
            }
        }
        Action::ProfileUpdated(employee) => {
            if let Some(user) = state.auth.user.as_mut() {
                if user.id == employee.id {
                    user.email = employee.email.clone();
                    user.profile = employee;
                }
            }
        }
        Action::Employees(action) => reduce_entities(&mut state.employees, action),
        Action::Branches(action) => reduce_entities(&mut state.branches, action),
        Action::Dashboard(action) => reduce_dashboard(&mut state.dashboard, action),
        Action::Profile(action) => reduce_profile(&mut state.profile, action),
    }
    state
}

fn reduce_entities<T: Keyed>(state: &mut EntityState<T>, action: EntityAction<T>) {
    match action {
        EntityAction::Pending => {
            state.loading = true;
            state.error = None;
        }
        EntityAction::Fetched(items) => {
            state.items = items;
            state.loading = false;
        }
        EntityAction::Inserted { item, at } => {
            match at {
                Placement::Front => state.items.insert(0, item),
                Placement::Back => state.items.push(item),
            }
            state.loading = false;
        }
        EntityAction::Replaced(item) => {
            let key = item.key();
            if let Some(slot) = state.items.iter_mut().find(|existing| existing.key() == key) {
                *slot = item;
            }
            state.loading = false;
        }
        EntityAction::Removed(key) => {
            state.items.retain(|item| item.key() != key);
            state.loading = false;
        }
        EntityAction::Rejected(message) => {
            state.loading = false;
            state.error = Some(message);
        }
        EntityAction::Cleared => *state = EntityState::default(),
    }
}

fn reduce_dashboard(state: &mut DashboardState, action: DashboardAction) {
    match action {
        DashboardAction::Pending => {
            state.loading = true;
            state.error = None;
        }
        DashboardAction::Loaded(stats) => {
            state.stats = stats;
            state.loading = false;
        }
        DashboardAction::Rejected(message) => {
            state.loading = false;
            state.error = Some(message);
        }
    }
}

fn reduce_profile(state: &mut ProfileState, action: ProfileAction) {
    match action {
        ProfileAction::Pending => {
            *state = ProfileState {
                loading: true,
                ..ProfileState::default()
            };
        }
        ProfileAction::Succeeded => {
            *state = ProfileState {
                success: true,
                ..ProfileState::default()
            };
        }
        ProfileAction::Rejected(message) => {
            *state = ProfileState {
                error: Some(message),
                ..ProfileState::default()
            };
        }
        ProfileAction::Reset => *state = ProfileState::default(),
    }
}

#[derive(Default)]
pub struct Store {
    state: Mutex<AppState>,
}

impl Store {
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies `action` and returns the resulting state.
    pub async fn dispatch(&self, action: Action) -> AppState {
        let mut guard = self.state.lock().await;
        let next = reduce(std::mem::take(&mut *guard), action);
        *guard = next.clone();
        next
    }

    pub async fn snapshot(&self) -> AppState {
        self.state.lock().await.clone()
    }
}

#[cfg(test)]
#[path = "tests/store_tests.rs"]
mod tests;
