//! API handlers for the gardi service.
//!
//! Routes are grouped by concern: `auth` carries the token lifecycle
//! endpoints, `tenants` the protected tenant directory, `health` and `root`
//! the probes.

pub mod auth;
pub mod health;
pub mod root;
pub mod tenants;
