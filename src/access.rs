//! Roles, console routes and the route guard.
//!
//! Every screen of the console is a [`Route`]; each route declares which
//! roles may open it. [`guard`] turns the current session (if any) and a
//! target route into a decision the front end acts on.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ConsoleError;
use crate::session::Session;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    Vendor,
    Pmo,
    Hr,
    Admin,
}

impl Role {
    pub const ALL: [Role; 4] = [Role::Vendor, Role::Pmo, Role::Hr, Role::Admin];

    /// Wire tag carried in the token's `role` claim.
    pub fn tag(self) -> &'static str {
        match self {
            Role::Vendor => "VENDOR",
            Role::Pmo => "PMO",
            Role::Hr => "HR",
            Role::Admin => "ADMIN",
        }
    }

    pub fn profile(self) -> RoleProfile {
        match self {
            Role::Vendor => RoleProfile {
                label: "Vendor recruiter",
                landing: Route::VendorDashboard,
                navigation: &[Route::VendorDashboard, Route::SendExam, Route::Candidates],
            },
            Role::Pmo => RoleProfile {
                label: "Program management office",
                landing: Route::HrDashboard,
                navigation: &[Route::HrDashboard, Route::PmoCandidates],
            },
            Role::Hr => RoleProfile {
                label: "Human resources",
                landing: Route::Home,
                navigation: &[Route::HrDashboard, Route::PmoCandidates],
            },
            Role::Admin => RoleProfile {
                label: "Administrator",
                landing: Route::Home,
                navigation: &[
                    Route::VendorDashboard,
                    Route::HrDashboard,
                    Route::SendExam,
                    Route::Candidates,
                    Route::PmoCandidates,
                    Route::Register,
                ],
            },
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for Role {
    type Err = ConsoleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Role::ALL
            .into_iter()
            .find(|role| role.tag() == s)
            .ok_or_else(|| ConsoleError::UnknownRole(s.to_string()))
    }
}

/// Per-role presentation: display label, post-login landing screen and
/// sidebar entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoleProfile {
    pub label: &'static str,
    pub landing: Route,
    pub navigation: &'static [Route],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Route {
    Login,
    Unauthorized,
    Home,
    Register,
    VendorDashboard,
    HrDashboard,
    SendExam,
    Candidates,
    PmoCandidates,
}

impl Route {
    pub fn path(self) -> &'static str {
        match self {
            Route::Login => "/login",
            Route::Unauthorized => "/unauthorized",
            Route::Home => "/",
            Route::Register => "/register",
            Route::VendorDashboard => "/vendor/dashboard",
            Route::HrDashboard => "/hr/dashboard",
            Route::SendExam => "/send-exam",
            Route::Candidates => "/candidates",
            Route::PmoCandidates => "/hr/candidates",
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            Route::Login => "Login",
            Route::Unauthorized => "Unauthorized",
            Route::Home => "Home",
            Route::Register => "Register user",
            Route::VendorDashboard | Route::HrDashboard => "Dashboard",
            Route::SendExam => "Send exam",
            Route::Candidates => "Candidates",
            Route::PmoCandidates => "Candidate details",
        }
    }

    /// `None` means the route is public; otherwise only the listed roles may
    /// open it.
    pub fn allowed_roles(self) -> Option<&'static [Role]> {
        match self {
            Route::Login | Route::Unauthorized => None,
            Route::Home => Some(&Role::ALL),
            Route::Register => Some(&[Role::Admin]),
            Route::VendorDashboard | Route::SendExam | Route::Candidates => {
                Some(&[Role::Vendor, Role::Admin])
            }
            Route::HrDashboard | Route::PmoCandidates => Some(&[Role::Pmo, Role::Hr, Role::Admin]),
        }
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardDecision {
    Allow,
    RedirectLogin,
    RedirectUnauthorized,
}

/// Decide whether `session` may open `route`.
///
/// An expired session is treated as no session at all.
pub fn guard(session: Option<&Session>, route: Route) -> GuardDecision {
    let Some(allowed) = route.allowed_roles() else {
        return GuardDecision::Allow;
    };

    let Some(session) = session.filter(|s| !s.is_expired(chrono::Utc::now())) else {
        return GuardDecision::RedirectLogin;
    };

    if allowed.contains(&session.role()) {
        GuardDecision::Allow
    } else {
        GuardDecision::RedirectUnauthorized
    }
}

/// Like [`guard`], but converts a redirect into an error carrying enough
/// context for the command line to explain itself.
pub fn require(session: Option<&Session>, route: Route) -> Result<(), ConsoleError> {
    match guard(session, route) {
        GuardDecision::Allow => Ok(()),
        GuardDecision::RedirectLogin => Err(ConsoleError::NotAuthenticated),
        GuardDecision::RedirectUnauthorized => Err(ConsoleError::Forbidden {
            role: session.map(|s| s.role().to_string()).unwrap_or_default(),
            route: route.path().to_string(),
        }),
    }
}

pub fn landing_route(role: Role) -> Route {
    role.profile().landing
}
