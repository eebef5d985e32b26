//! Parser for plain JSON userinfo documents.
//!
//! Accepts the common `{"id"|"sub", "email", ...}` shape, with string or numeric ids.

use std::collections::BTreeMap;

use serde::Deserialize;

use crate::error::{identity_parse_error, Error};
use crate::oauth::ExternalIdentity;

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SubjectId {
    Text(String),
    Number(u64),
}

// OAuth 2.0 style (`id`, `verified_email`) and OIDC style (`sub`, `email_verified`)
// names may both be present; the OAuth 2.0 one wins.
#[derive(Debug, Deserialize)]
struct Profile {
    id: Option<SubjectId>,
    sub: Option<SubjectId>,
    email: Option<String>,
    verified_email: Option<bool>,
    email_verified: Option<bool>,
    name: Option<String>,
    login: Option<String>,
    picture: Option<String>,
}

/// Parse a userinfo body into an [`ExternalIdentity`].
pub fn parse_identity(provider_id: &str, body: &[u8]) -> Result<ExternalIdentity, Error> {
    let profile: Profile = serde_json::from_slice(body).map_err(|e| Error {
        source: Some(Box::new(e)),
        error_kind: crate::ErrorKind::IdentityParse,
    })?;

    let subject_id = [profile.id, profile.sub]
        .into_iter()
        .flatten()
        .find_map(|id| match id {
            SubjectId::Text(id) if id.is_empty() => None,
            SubjectId::Text(id) => Some(id),
            SubjectId::Number(id) => Some(id.to_string()),
        })
        .ok_or_else(|| identity_parse_error("Userinfo response has no subject id"))?;

    let mut display_fields = BTreeMap::new();
    for (field, value) in [
        ("name", profile.name),
        ("login", profile.login),
        ("picture", profile.picture),
    ] {
        if let Some(value) = value.filter(|v| !v.is_empty()) {
            display_fields.insert(field.to_string(), value);
        }
    }

    Ok(ExternalIdentity {
        provider_id: provider_id.to_string(),
        subject_id,
        email: profile.email.filter(|email| !email.is_empty()),
        verified_email: profile.verified_email.or(profile.email_verified),
        display_fields,
    })
}
