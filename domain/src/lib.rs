//! Login domain: wires configuration into the `login-auth` flow and resolver.
//!
//! The `web` crate depends on this crate only; the `login-auth` types it needs are
//! re-exported here so the boundary never reaches past the domain layer.
pub use login_auth::oauth::{spawn_sweeper, ExternalIdentity, Resolution, StateStore};

pub mod error;
pub mod gateway;
pub mod login;

pub use login::{Gateway, LoginOutcome};
pub use tokio_util::sync::CancellationToken;
