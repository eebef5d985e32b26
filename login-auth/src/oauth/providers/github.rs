//! GitHub OAuth provider preset.
//!
//! The profile comes from the GraphQL API's `viewer`, whose `id` is an opaque,
//! stable node id (e.g. `MDQ6VXNlcjM5ODM1OTYy`). Accounts are keyed by that id.

use std::collections::BTreeMap;

use secrecy::SecretString;
use serde::Deserialize;

use crate::error::{identity_parse_error, Error, ErrorKind};
use crate::oauth::{
    ExternalIdentity, IdentityKey, ProviderConfig, ProviderConfigBuilder, UserinfoRequest,
};

pub const PROVIDER_ID: &str = "github";
pub const AUTHORIZE_URL: &str = "https://github.com/login/oauth/authorize";
pub const TOKEN_URL: &str = "https://github.com/login/oauth/access_token";
pub const GRAPHQL_URL: &str = "https://api.github.com/graphql";
pub const DEFAULT_SCOPES: &[&str] = &["read:user"];
pub const VIEWER_QUERY: &str = "query { viewer { id login email } }";

/// Builder preloaded with GitHub's endpoints and the GraphQL viewer query.
pub fn builder(client_id: impl Into<String>, client_secret: SecretString) -> ProviderConfigBuilder {
    ProviderConfig::builder(PROVIDER_ID)
        .client_id(client_id)
        .client_secret(client_secret)
        .authorize_url(AUTHORIZE_URL)
        .token_url(TOKEN_URL)
        .userinfo_url(GRAPHQL_URL)
        .userinfo_request(UserinfoRequest::PostJson(
            serde_json::json!({ "query": VIEWER_QUERY }),
        ))
        .scopes(DEFAULT_SCOPES.iter().copied())
        .identity_key(IdentityKey::Subject)
        .identity_parser(parse_identity)
}

#[derive(Debug, Deserialize)]
struct GraphqlResponse {
    data: Option<ViewerData>,
    #[serde(default)]
    errors: Vec<GraphqlError>,
}

#[derive(Debug, Deserialize)]
struct ViewerData {
    viewer: Option<Viewer>,
}

#[derive(Debug, Deserialize)]
struct Viewer {
    id: String,
    login: Option<String>,
    email: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GraphqlError {
    message: String,
}

/// Parse `{"data":{"viewer":{"id":"..."}}}`.
///
/// GraphQL reports failures with HTTP 200 and an `errors` array; those are parse
/// errors here since the document carries no identity.
pub fn parse_identity(provider_id: &str, body: &[u8]) -> Result<ExternalIdentity, Error> {
    let response: GraphqlResponse = serde_json::from_slice(body).map_err(|e| Error {
        source: Some(Box::new(e)),
        error_kind: ErrorKind::IdentityParse,
    })?;

    if let Some(first) = response.errors.first() {
        return Err(identity_parse_error(&format!(
            "GitHub GraphQL returned {} error(s): {}",
            response.errors.len(),
            first.message
        )));
    }

    let viewer = response
        .data
        .and_then(|data| data.viewer)
        .filter(|viewer| !viewer.id.is_empty())
        .ok_or_else(|| identity_parse_error("GitHub response has no viewer id"))?;

    let mut display_fields = BTreeMap::new();
    if let Some(login) = viewer.login {
        display_fields.insert("login".to_string(), login);
    }

    Ok(ExternalIdentity {
        provider_id: provider_id.to_string(),
        subject_id: viewer.id,
        // GitHub answers "" when the profile email is private.
        email: viewer.email.filter(|email| !email.is_empty()),
        verified_email: None,
        display_fields,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_defaults() {
        let config = builder("client", SecretString::from("secret".to_string()))
            .build()
            .unwrap();
        assert_eq!(config.provider_id(), "github");
        assert!(!config.uses_pkce());
        assert!(config.redirect_url().is_none());
        assert_eq!(config.identity_key(), IdentityKey::Subject);
        assert_eq!(
            config.userinfo_request(),
            &UserinfoRequest::PostJson(serde_json::json!({ "query": VIEWER_QUERY }))
        );
    }

    #[test]
    fn test_parse_viewer() {
        let body = br#"{"data":{"viewer":{"id":"MDQ6VXNlcjM5ODM1OTYy","login":"muchlis","email":""}}}"#;
        let identity = parse_identity(PROVIDER_ID, body).unwrap();
        assert_eq!(identity.subject_id, "MDQ6VXNlcjM5ODM1OTYy");
        assert_eq!(identity.email, None);
        assert_eq!(
            identity.display_fields.get("login").map(String::as_str),
            Some("muchlis")
        );
    }

    #[test]
    fn test_parse_graphql_errors() {
        let body = br#"{"data":null,"errors":[{"message":"Bad credentials"}]}"#;
        let err = parse_identity(PROVIDER_ID, body).unwrap_err();
        assert_eq!(err.error_kind, ErrorKind::IdentityParse);
    }

    #[test]
    fn test_parse_missing_viewer() {
        let err = parse_identity(PROVIDER_ID, br#"{"data":{}}"#).unwrap_err();
        assert_eq!(err.error_kind, ErrorKind::IdentityParse);
    }
}
