//! Google OAuth provider preset.
//!
//! Google accounts are keyed locally by email. The v2 userinfo endpoint reports
//! `verified_email`, and an unverified address never resolves to an account.

use secrecy::SecretString;

use super::standard;
use crate::error::Error;
use crate::oauth::{ExternalIdentity, IdentityKey, ProviderConfig, ProviderConfigBuilder};

pub const PROVIDER_ID: &str = "google";
pub const AUTHORIZE_URL: &str = "https://accounts.google.com/o/oauth2/auth";
pub const TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
pub const USERINFO_URL: &str = "https://www.googleapis.com/oauth2/v2/userinfo";
pub const DEFAULT_SCOPES: &[&str] = &["https://www.googleapis.com/auth/userinfo.email"];

/// Builder preloaded with Google's endpoints, default scope, PKCE and email keying.
pub fn builder(client_id: impl Into<String>, client_secret: SecretString) -> ProviderConfigBuilder {
    ProviderConfig::builder(PROVIDER_ID)
        .client_id(client_id)
        .client_secret(client_secret)
        .authorize_url(AUTHORIZE_URL)
        .token_url(TOKEN_URL)
        .userinfo_url(USERINFO_URL)
        .scopes(DEFAULT_SCOPES.iter().copied())
        .pkce(true)
        .identity_key(IdentityKey::Email)
        .identity_parser(parse_identity)
}

/// Parse a v2 userinfo (or OpenID Connect userinfo) document.
///
/// ```json
/// {"id": "108212271843429487853", "email": "someone@gmail.com", "verified_email": true, "picture": "https://..."}
/// ```
pub fn parse_identity(provider_id: &str, body: &[u8]) -> Result<ExternalIdentity, Error> {
    standard::parse_identity(provider_id, body)
}
