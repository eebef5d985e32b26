//! OAuth 2.0 authorization-code login.
//!
//! [`Flow`] drives a login attempt from the authorize redirect to a parsed
//! [`ExternalIdentity`]; [`IdentityResolver`] maps that identity to a local user.

mod flow;
mod identity;
mod pkce;
mod provider;
mod state;

pub mod providers;

pub use flow::{CompletedLogin, Flow};
pub use identity::{IdentityKey, IdentityResolver, LocalUserDirectory, MemoryUserDirectory, Resolution};
pub use pkce::{PkceChallenge, PkceVerifier};
pub use provider::{
    ClientAuth, ExternalIdentity, IdentityParser, ProviderConfig, ProviderConfigBuilder,
    UserinfoRequest,
};
pub use state::{spawn_sweeper, LoginAttempt, MemoryStateStore, PendingLogin, StateStore};
