//! Navigation guard over the session store.
//!
//! Evaluated before a navigation proceeds. The live-token path is a
//! synchronous read of the [`SessionStore`]; only an expired access token
//! sends the guard through [`SessionManager::ensure_fresh`], so a quietly
//! expired session recovers without bouncing the user to the login page.
//!
//! The guard is advisory. The backend middleware makes the authoritative
//! call; a bypassed guard can only ever fail toward "deny".

pub mod view;

use crate::authz::{self, AccessRequirement};
use crate::session::SessionManager;

/// Outcome of a guard evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardDecision {
    Allow,
    RedirectToLogin,
    RedirectToUnauthorized,
}

/// Where the evaluation runs. Session state only exists in the interactive
/// context; prerendering cannot read it and must not guess.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExecutionContext {
    #[default]
    Interactive,
    Prerender,
}

#[derive(Clone)]
pub struct RouteGuard {
    manager: SessionManager,
}

impl RouteGuard {
    #[must_use]
    pub fn new(manager: SessionManager) -> Self {
        Self { manager }
    }

    /// Decides whether a navigation to a route declaring `requirement` may
    /// proceed.
    ///
    /// Signed out (or unrecoverably expired) sessions redirect to login. An
    /// authenticated session passes an empty requirement outright and is
    /// otherwise checked with ANY-of semantics, redirecting to the
    /// unauthorized page on a miss. In a prerender context the guard denies
    /// by default.
    pub async fn check(
        &self,
        requirement: &AccessRequirement,
        context: ExecutionContext,
    ) -> GuardDecision {
        if context == ExecutionContext::Prerender {
            return GuardDecision::RedirectToLogin;
        }

        let store = self.manager.store();
        let claims = match store.claims() {
            Some(claims) => Some(claims),
            // Expired or absent. A session with refresh credentials gets one
            // refresh attempt before the login redirect.
            None => match self.manager.ensure_fresh().await {
                Ok(()) => store.claims(),
                Err(_) => None,
            },
        };

        let Some(claims) = claims else {
            return GuardDecision::RedirectToLogin;
        };

        if requirement.is_empty() {
            return GuardDecision::Allow;
        }

        if authz::satisfies(requirement, &claims.roles, &claims.permissions) {
            GuardDecision::Allow
        } else {
            GuardDecision::RedirectToUnauthorized
        }
    }
}
