//! Permission-gated rendering.
//!
//! The rendering-time analog of the route guard: a fragment whose permission
//! requirement is not met is entirely absent from the output, not hidden. The
//! producing closure never runs for a denied fragment, so privileged content
//! is not even built. Callers re-evaluate on their own render cycle; reads of
//! a just-changed session converge on the next pass.

use crate::authz::{self, AccessRequirement};
use crate::session::SessionStore;

/// Renders `produce` iff the live session holds at least one of
/// `permissions`. An empty slice only asks for an authenticated session.
pub fn render_with_any_permission<T, F>(
    store: &SessionStore,
    permissions: &[&str],
    produce: F,
) -> Option<T>
where
    F: FnOnce() -> T,
{
    let claims = store.claims()?;
    let requirement = AccessRequirement::permissions(permissions.iter().copied());
    if authz::satisfies(&requirement, &claims.roles, &claims.permissions) {
        Some(produce())
    } else {
        None
    }
}

/// Single-permission form of [`render_with_any_permission`].
pub fn render_with_permission<T, F>(store: &SessionStore, permission: &str, produce: F) -> Option<T>
where
    F: FnOnce() -> T,
{
    render_with_any_permission(store, &[permission], produce)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::test_support::{expired_pair, fresh_pair, test_session_claims};
    use std::sync::atomic::{AtomicBool, Ordering};

    fn signed_in_store() -> SessionStore {
        let store = SessionStore::new();
        store.set_session(fresh_pair(900), test_session_claims());
        store
    }

    #[test]
    fn renders_when_a_permission_matches() {
        let store = signed_in_store();
        let fragment = render_with_any_permission(&store, &["tenants.read", "other"], || "panel");
        assert_eq!(fragment, Some("panel"));
    }

    #[test]
    fn denied_fragment_is_absent_and_never_built() {
        let store = signed_in_store();
        let built = AtomicBool::new(false);

        let fragment = render_with_permission(&store, "tenants.create", || {
            built.store(true, Ordering::SeqCst);
            "panel"
        });

        assert_eq!(fragment, None);
        assert!(!built.load(Ordering::SeqCst), "closure ran for a denied fragment");
    }

    #[test]
    fn signed_out_store_renders_nothing() {
        let store = SessionStore::new();
        let built = AtomicBool::new(false);

        let fragment = render_with_any_permission(&store, &[], || {
            built.store(true, Ordering::SeqCst);
            "panel"
        });

        assert_eq!(fragment, None);
        assert!(!built.load(Ordering::SeqCst));
    }

    #[test]
    fn expired_session_renders_nothing() {
        let store = SessionStore::new();
        store.set_session(expired_pair(), test_session_claims());

        assert_eq!(render_with_permission(&store, "tenants.read", || ()), None);
    }

    #[test]
    fn empty_requirement_renders_for_any_authenticated_session() {
        let store = signed_in_store();
        assert_eq!(render_with_any_permission(&store, &[], || "home"), Some("home"));
    }

    #[test]
    fn any_of_vectors_match_the_guard() {
        let store = SessionStore::new();
        let mut claims = test_session_claims();
        claims.permissions = vec!["B".to_string()];
        store.set_session(fresh_pair(900), claims);

        assert!(render_with_any_permission(&store, &["A", "B"], || ()).is_some());

        let mut claims = test_session_claims();
        claims.permissions = vec!["C".to_string()];
        store.set_session(fresh_pair(900), claims);

        assert!(render_with_any_permission(&store, &["A", "B"], || ()).is_none());
    }
}
