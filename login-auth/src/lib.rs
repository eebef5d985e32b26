//! # login-auth
//!
//! Provider-agnostic OAuth 2.0 authorization-code login:
//! - Provider configuration with validated endpoints and per-provider identity parsing
//! - Single-use, expiring state tokens binding a login attempt to an optional tag
//! - The two-step login flow (authorize redirect, callback completion)
//! - Mapping external identities onto local user ids
//!
//! ## Architecture
//!
//! This crate never reads the environment. The `domain` crate resolves configuration
//! into [`oauth::ProviderConfig`] values and the `web` crate owns the HTTP surface.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use login_auth::{
//!     http::HttpClientBuilder,
//!     oauth::{providers::github, Flow, MemoryStateStore},
//! };
//!
//! let provider = github::builder("client-id", SecretString::from(client_secret)).build()?;
//! let flow = Flow::new(
//!     vec![provider],
//!     Arc::new(MemoryStateStore::new()),
//!     HttpClientBuilder::new().build()?,
//! );
//! let redirect_url = flow.begin_login(github::PROVIDER_ID, None).await?;
//! ```

pub mod error;
pub mod http;
pub mod oauth;

// Re-export commonly used types
pub use error::{Error, ErrorKind};
