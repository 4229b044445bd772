//! # Gardi (Multi-Tenant Access Control Core)
//!
//! `gardi` is a multi-tenant access control service and client library. It issues
//! short-lived `RS256` access tokens paired with rotating refresh tokens, resolves
//! users to tenants, and gates routes and views by roles and permissions.
//!
//! ## Token Lifecycle
//!
//! Logins return an access/refresh token pair. Access tokens carry roles and
//! permissions as claims and expire within minutes; refresh tokens are opaque,
//! stored only as SHA-256 hashes, and rotate on every use.
//!
//! - **Rotation:** A refresh token is consumed the moment it is presented. Replaying
//!   a consumed token fails; the client must use the replacement it was handed.
//! - **Device binding:** Each login starts a device session. Refresh tokens only
//!   rotate for the device they were minted on.
//! - **Revocation:** Logout revokes a single device; logout-all revokes every
//!   device the user has.
//!
//! ## Tenant Model
//!
//! Users resolve to tenants through identifying emails, matched case-insensitively.
//! An inactive tenant fails login and cuts running sessions off at the next rotation.
//!
//! ## Authorization
//!
//! Authorization is ANY-of: a route or view guarded by roles or permissions opens
//! when the caller holds at least one of them. The server-side middleware is the
//! authoritative gate; the client-side session, route guard and view filter only
//! shape navigation and rendering, never access.

pub mod api;
pub mod authz;
pub mod cli;
pub mod client;
pub mod error;
pub mod guard;
pub mod session;
pub mod store;
pub mod tenant;
pub mod token;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_git_commit_hash_format() {
        if GIT_COMMIT_HASH == "unknown" {
            // Acceptable in non-git build environments
            return;
        }
        // Should be a hex string (full SHA-1 is 40 chars, but could be short)
        assert!(
            GIT_COMMIT_HASH.chars().all(|c| c.is_ascii_hexdigit()),
            "GIT_COMMIT_HASH should be a hex string, got: {GIT_COMMIT_HASH}"
        );
        assert!(
            GIT_COMMIT_HASH.len() >= 7,
            "GIT_COMMIT_HASH should be at least 7 characters long, got: {GIT_COMMIT_HASH}"
        );
    }

    #[test]
    fn test_app_user_agent_format() {
        assert!(APP_USER_AGENT.starts_with(env!("CARGO_PKG_NAME")));
        assert!(APP_USER_AGENT.contains(env!("CARGO_PKG_VERSION")));
    }
}
