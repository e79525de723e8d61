//! Page routes, role gating and per-role navigation.

use shared::domain::Role;

use crate::{
    session::SessionPhase,
    store::AuthState,
    Notice,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Route {
    Login,
    ResetPassword,
    AuthCallback,
    Dashboard,
    Profile,
    Employees,
    Branches,
}

impl Route {
    pub const ALL: [Route; 7] = [
        Route::Login,
        Route::ResetPassword,
        Route::AuthCallback,
        Route::Dashboard,
        Route::Profile,
        Route::Employees,
        Route::Branches,
    ];

    pub fn path(self) -> &'static str {
        match self {
            Route::Login => "/login",
            Route::ResetPassword => "/reset-password",
            Route::AuthCallback => "/auth/callback",
            Route::Dashboard => "/dashboard",
            Route::Profile => "/profile",
            Route::Employees => "/employees",
            Route::Branches => "/branches",
        }
    }

    /// `None` for `/` and unknown paths; both land on the dashboard.
    pub fn parse(path: &str) -> Option<Route> {
        let path = path.split(['?', '#']).next().unwrap_or_default();
        let trimmed = path.trim_end_matches('/');
        Route::ALL.into_iter().find(|route| route.path() == trimmed)
    }

    pub fn is_public(self) -> bool {
        matches!(
            self,
            Route::Login | Route::ResetPassword | Route::AuthCallback
        )
    }

    /// Empty means any signed-in user.
    pub fn allowed_roles(self) -> &'static [Role] {
        match self {
            Route::Employees => &[Role::Admin, Role::Manager],
            Route::Branches => &[Role::Admin],
            _ => &[],
        }
    }

    pub fn permits(self, role: Role) -> bool {
        let allowed = self.allowed_roles();
        allowed.is_empty() || allowed.contains(&role)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum GuardOutcome {
    /// Session is still being restored.
    Wait,
    Render(Route),
    Redirect {
        to: Route,
        /// Originally requested location, kept for after sign-in.
        from: Option<String>,
        notice: Option<Notice>,
    },
}

pub fn guard(path: &str, auth: &AuthState) -> GuardOutcome {
    if matches!(
        auth.phase,
        SessionPhase::Uninitialized | SessionPhase::Restoring
    ) {
        return GuardOutcome::Wait;
    }

    let Some(route) = Route::parse(path) else {
        return GuardOutcome::Redirect {
            to: Route::Dashboard,
            from: None,
            notice: None,
        };
    };

    let user = auth.user.as_ref();
    if route == Route::Login && user.is_some() {
        return GuardOutcome::Redirect {
            to: Route::Dashboard,
            from: None,
            notice: None,
        };
    }
    if route.is_public() {
        return GuardOutcome::Render(route);
    }

    let Some(user) = user else {
        return GuardOutcome::Redirect {
            to: Route::Login,
            from: Some(path.to_string()),
            notice: None,
        };
    };

    if !route.permits(user.role()) {
        return GuardOutcome::Redirect {
            to: Route::Dashboard,
            from: None,
            notice: Some(Notice::error(
                "Access Denied",
                "You don't have permission to access this page",
            )),
        };
    }

    GuardOutcome::Render(route)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NavItem {
    pub name: &'static str,
    pub route: Route,
}

pub fn navigation(role: Option<Role>) -> Vec<NavItem> {
    let mut items = vec![
        NavItem {
            name: "Dashboard",
            route: Route::Dashboard,
        },
        NavItem {
            name: "Profile",
            route: Route::Profile,
        },
    ];
    if let Some(role) = role {
        for (name, route) in [("Employees", Route::Employees), ("Branches", Route::Branches)] {
            if route.permits(role) {
                items.push(NavItem { name, route });
            }
        }
    }
    items
}
