//! Auth handlers and supporting modules.
//!
//! This module coordinates credential login, refresh token rotation, and
//! logout for single devices or a whole user.
//!
//! ## Refresh Rotation
//!
//! Every refresh consumes the presented token atomically and issues a
//! replacement bound to the same device id. A replayed token is
//! indistinguishable from an unknown one and is rejected, which bounds
//! what a stolen token is worth.

pub(crate) mod login;
pub(crate) mod session;
mod state;
mod tokens;
pub(crate) mod types;

pub use state::{AuthConfig, AuthState};
