//! OAuth provider configuration and identity parsing seam.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use url::Url;

use super::identity::IdentityKey;
use super::pkce::{PkceChallenge, CHALLENGE_METHOD};
use crate::error::{config_error, ConfigErrorKind, Error};

/// Identity asserted by an external provider after a completed login.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalIdentity {
    /// Id of the provider configuration that produced this identity.
    pub provider_id: String,
    /// Provider's stable identifier for the account.
    pub subject_id: String,
    pub email: Option<String>,
    /// Whether the provider vouches for the email. `None` when it doesn't say.
    pub verified_email: Option<bool>,
    /// Extra profile fields (login, name, picture, ...) for display only.
    #[serde(default)]
    pub display_fields: BTreeMap<String, String>,
}

/// Turns a raw userinfo response body into an [`ExternalIdentity`].
///
/// Implementations must return an `IdentityParse` error, never panic, on bodies they
/// don't understand. Any `Fn(&str, &[u8]) -> Result<ExternalIdentity, Error>` closure
/// is a parser.
pub trait IdentityParser: Send + Sync {
    fn parse(&self, provider_id: &str, body: &[u8]) -> Result<ExternalIdentity, Error>;
}

impl<F> IdentityParser for F
where
    F: Fn(&str, &[u8]) -> Result<ExternalIdentity, Error> + Send + Sync,
{
    fn parse(&self, provider_id: &str, body: &[u8]) -> Result<ExternalIdentity, Error> {
        self(provider_id, body)
    }
}

/// How the profile resource is requested.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserinfoRequest {
    /// Plain `GET` with the bearer token.
    Get,
    /// `POST` of a JSON document, e.g. a GraphQL query.
    PostJson(serde_json::Value),
}

/// Where the client credentials go on the token request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientAuth {
    /// `client_id` and `client_secret` as form fields.
    RequestBody,
    /// HTTP Basic authentication.
    BasicAuth,
}

/// Static description of one OAuth 2.0 provider.
///
/// Immutable once built; shared between concurrent logins without locking.
#[derive(Clone)]
pub struct ProviderConfig {
    provider_id: String,
    client_id: String,
    client_secret: SecretString,
    authorize_url: Url,
    token_url: Url,
    redirect_url: Option<Url>,
    scopes: Vec<String>,
    userinfo_url: Url,
    userinfo_request: UserinfoRequest,
    client_auth: ClientAuth,
    pkce: bool,
    extra_authorize_params: Vec<(String, String)>,
    identity_key: IdentityKey,
    identity_parser: Arc<dyn IdentityParser>,
}

impl ProviderConfig {
    /// Start building a configuration registered under `provider_id`.
    pub fn builder(provider_id: impl Into<String>) -> ProviderConfigBuilder {
        ProviderConfigBuilder::new(provider_id.into())
    }

    pub fn provider_id(&self) -> &str {
        &self.provider_id
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    pub fn client_secret(&self) -> &SecretString {
        &self.client_secret
    }

    pub fn authorize_url(&self) -> &Url {
        &self.authorize_url
    }

    pub fn token_url(&self) -> &Url {
        &self.token_url
    }

    pub fn redirect_url(&self) -> Option<&Url> {
        self.redirect_url.as_ref()
    }

    pub fn scopes(&self) -> &[String] {
        &self.scopes
    }

    pub fn userinfo_url(&self) -> &Url {
        &self.userinfo_url
    }

    pub fn userinfo_request(&self) -> &UserinfoRequest {
        &self.userinfo_request
    }

    pub fn client_auth(&self) -> ClientAuth {
        self.client_auth
    }

    pub fn uses_pkce(&self) -> bool {
        self.pkce
    }

    pub fn identity_key(&self) -> IdentityKey {
        self.identity_key
    }

    /// Run the provider's identity parser over a userinfo response body.
    pub fn parse_identity(&self, body: &[u8]) -> Result<ExternalIdentity, Error> {
        self.identity_parser.parse(&self.provider_id, body)
    }

    /// Build the URL the user agent is redirected to.
    ///
    /// Pure construction: `response_type=code`, `client_id`, optional `redirect_uri`,
    /// space-joined `scope`, `state` and, when given, the PKCE challenge.
    pub fn authorization_url(&self, state: &str, challenge: Option<&PkceChallenge>) -> Url {
        let mut url = self.authorize_url.clone();
        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("response_type", "code")
                .append_pair("client_id", &self.client_id);
            if let Some(redirect_url) = &self.redirect_url {
                query.append_pair("redirect_uri", redirect_url.as_str());
            }
            if !self.scopes.is_empty() {
                query.append_pair("scope", &self.scopes.join(" "));
            }
            query.append_pair("state", state);
            if let Some(challenge) = challenge {
                query
                    .append_pair("code_challenge", challenge.as_str())
                    .append_pair("code_challenge_method", CHALLENGE_METHOD);
            }
            for (key, value) in &self.extra_authorize_params {
                query.append_pair(key, value);
            }
        }
        url
    }
}

impl fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("provider_id", &self.provider_id)
            .field("client_id", &self.client_id)
            .field("authorize_url", &self.authorize_url.as_str())
            .field("token_url", &self.token_url.as_str())
            .field("redirect_url", &self.redirect_url.as_ref().map(Url::as_str))
            .field("scopes", &self.scopes)
            .field("userinfo_url", &self.userinfo_url.as_str())
            .field("pkce", &self.pkce)
            .field("identity_key", &self.identity_key)
            .finish_non_exhaustive()
    }
}

/// Builder for [`ProviderConfig`]. All validation happens in [`ProviderConfigBuilder::build`].
pub struct ProviderConfigBuilder {
    provider_id: String,
    client_id: String,
    client_secret: Option<SecretString>,
    authorize_url: String,
    token_url: String,
    redirect_url: Option<String>,
    scopes: Vec<String>,
    userinfo_url: String,
    userinfo_request: UserinfoRequest,
    client_auth: ClientAuth,
    pkce: bool,
    extra_authorize_params: Vec<(String, String)>,
    identity_key: IdentityKey,
    identity_parser: Option<Arc<dyn IdentityParser>>,
}

impl ProviderConfigBuilder {
    fn new(provider_id: String) -> Self {
        Self {
            provider_id,
            client_id: String::new(),
            client_secret: None,
            authorize_url: String::new(),
            token_url: String::new(),
            redirect_url: None,
            scopes: Vec::new(),
            userinfo_url: String::new(),
            userinfo_request: UserinfoRequest::Get,
            client_auth: ClientAuth::RequestBody,
            pkce: false,
            extra_authorize_params: Vec::new(),
            identity_key: IdentityKey::Subject,
            identity_parser: None,
        }
    }

    pub fn client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = client_id.into();
        self
    }

    pub fn client_secret(mut self, client_secret: SecretString) -> Self {
        self.client_secret = Some(client_secret);
        self
    }

    pub fn authorize_url(mut self, url: impl Into<String>) -> Self {
        self.authorize_url = url.into();
        self
    }

    pub fn token_url(mut self, url: impl Into<String>) -> Self {
        self.token_url = url.into();
        self
    }

    /// Leave unset to rely on the callback registered with the provider.
    pub fn redirect_url(mut self, url: Option<String>) -> Self {
        self.redirect_url = url;
        self
    }

    pub fn scopes<I, S>(mut self, scopes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.scopes = scopes.into_iter().map(Into::into).collect();
        self
    }

    pub fn userinfo_url(mut self, url: impl Into<String>) -> Self {
        self.userinfo_url = url.into();
        self
    }

    pub fn userinfo_request(mut self, request: UserinfoRequest) -> Self {
        self.userinfo_request = request;
        self
    }

    pub fn client_auth(mut self, client_auth: ClientAuth) -> Self {
        self.client_auth = client_auth;
        self
    }

    pub fn pkce(mut self, enabled: bool) -> Self {
        self.pkce = enabled;
        self
    }

    pub fn extra_authorize_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra_authorize_params.push((key.into(), value.into()));
        self
    }

    pub fn identity_key(mut self, identity_key: IdentityKey) -> Self {
        self.identity_key = identity_key;
        self
    }

    pub fn identity_parser(mut self, parser: impl IdentityParser + 'static) -> Self {
        self.identity_parser = Some(Arc::new(parser));
        self
    }

    /// Validate and freeze the configuration.
    ///
    /// Fails with a `Config` error when a required field is empty or an endpoint is
    /// not an absolute http(s) URL.
    pub fn build(self) -> Result<ProviderConfig, Error> {
        require_non_empty("provider id", &self.provider_id)?;
        require_non_empty("client id", &self.client_id)?;

        let client_secret = self
            .client_secret
            .filter(|secret| !secret.expose_secret().is_empty())
            .ok_or_else(|| {
                config_error(
                    ConfigErrorKind::MissingField,
                    &format!("Provider '{}' is missing its client secret", self.provider_id),
                )
            })?;

        let identity_parser = self.identity_parser.ok_or_else(|| {
            config_error(
                ConfigErrorKind::MissingField,
                &format!("Provider '{}' is missing an identity parser", self.provider_id),
            )
        })?;

        let redirect_url = self
            .redirect_url
            .filter(|url| !url.is_empty())
            .map(|url| parse_absolute_url("redirect url", &url))
            .transpose()?;

        Ok(ProviderConfig {
            authorize_url: parse_absolute_url("authorize url", &self.authorize_url)?,
            token_url: parse_absolute_url("token url", &self.token_url)?,
            userinfo_url: parse_absolute_url("userinfo url", &self.userinfo_url)?,
            provider_id: self.provider_id,
            client_id: self.client_id,
            client_secret,
            redirect_url,
            scopes: self.scopes,
            userinfo_request: self.userinfo_request,
            client_auth: self.client_auth,
            pkce: self.pkce,
            extra_authorize_params: self.extra_authorize_params,
            identity_key: self.identity_key,
            identity_parser,
        })
    }
}

fn require_non_empty(field: &str, value: &str) -> Result<(), Error> {
    if value.trim().is_empty() {
        return Err(config_error(
            ConfigErrorKind::MissingField,
            &format!("Provider {} must not be empty", field),
        ));
    }
    Ok(())
}

fn parse_absolute_url(field: &str, value: &str) -> Result<Url, Error> {
    if value.is_empty() {
        return Err(config_error(
            ConfigErrorKind::MissingField,
            &format!("Provider {} must not be empty", field),
        ));
    }
    let url = Url::parse(value)?;
    match url.scheme() {
        "http" | "https" if url.has_host() => Ok(url),
        _ => Err(config_error(
            ConfigErrorKind::InvalidUrl,
            &format!("Provider {} must be an absolute http(s) URL", field),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{identity_parse_error, ErrorKind};

    fn stub_parser(provider_id: &str, _body: &[u8]) -> Result<ExternalIdentity, Error> {
        Ok(ExternalIdentity {
            provider_id: provider_id.to_string(),
            subject_id: "stub".to_string(),
            email: None,
            verified_email: None,
            display_fields: BTreeMap::new(),
        })
    }

    fn valid_builder() -> ProviderConfigBuilder {
        ProviderConfig::builder("example")
            .client_id("client-123")
            .client_secret(SecretString::from("secret-456".to_string()))
            .authorize_url("https://idp.example.com/authorize")
            .token_url("https://idp.example.com/token")
            .userinfo_url("https://idp.example.com/userinfo")
            .redirect_url(Some("http://localhost:8080/oauth/example/callback".to_string()))
            .scopes(["openid", "email"])
            .identity_parser(stub_parser)
    }

    #[test]
    fn test_build_valid_config() {
        let config = valid_builder().build().unwrap();
        assert_eq!(config.provider_id(), "example");
        assert_eq!(config.client_id(), "client-123");
        assert_eq!(config.client_secret().expose_secret(), "secret-456");
        assert_eq!(config.scopes(), ["openid", "email"]);
        assert_eq!(config.identity_key(), IdentityKey::Subject);
    }

    #[test]
    fn test_build_rejects_empty_client_id() {
        let err = valid_builder().client_id("").build().unwrap_err();
        assert_eq!(err.error_kind, ErrorKind::Config(ConfigErrorKind::MissingField));
    }

    #[test]
    fn test_build_rejects_empty_client_secret() {
        let err = valid_builder()
            .client_secret(SecretString::from(String::new()))
            .build()
            .unwrap_err();
        assert_eq!(err.error_kind, ErrorKind::Config(ConfigErrorKind::MissingField));
    }

    #[test]
    fn test_build_rejects_missing_parser() {
        let err = ProviderConfig::builder("example")
            .client_id("client-123")
            .client_secret(SecretString::from("secret".to_string()))
            .authorize_url("https://idp.example.com/authorize")
            .token_url("https://idp.example.com/token")
            .userinfo_url("https://idp.example.com/userinfo")
            .build()
            .unwrap_err();
        assert_eq!(err.error_kind, ErrorKind::Config(ConfigErrorKind::MissingField));
    }

    #[test]
    fn test_build_rejects_relative_url() {
        let err = valid_builder().token_url("/token").build().unwrap_err();
        assert_eq!(err.error_kind, ErrorKind::Config(ConfigErrorKind::InvalidUrl));
    }

    #[test]
    fn test_build_rejects_non_http_url() {
        let err = valid_builder()
            .userinfo_url("mailto:someone@example.com")
            .build()
            .unwrap_err();
        assert_eq!(err.error_kind, ErrorKind::Config(ConfigErrorKind::InvalidUrl));
    }

    #[test]
    fn test_empty_redirect_url_is_treated_as_unset() {
        let config = valid_builder().redirect_url(Some(String::new())).build().unwrap();
        assert!(config.redirect_url().is_none());
    }

    #[test]
    fn test_authorization_url_carries_required_params() {
        let config = valid_builder().build().unwrap();
        let url = config.authorization_url("token-abc", None);
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();

        assert_eq!(url.host_str(), Some("idp.example.com"));
        assert!(pairs.contains(&("response_type".to_string(), "code".to_string())));
        assert!(pairs.contains(&("client_id".to_string(), "client-123".to_string())));
        assert!(pairs.contains(&(
            "redirect_uri".to_string(),
            "http://localhost:8080/oauth/example/callback".to_string()
        )));
        assert!(pairs.contains(&("scope".to_string(), "openid email".to_string())));
        assert!(pairs.contains(&("state".to_string(), "token-abc".to_string())));
        assert!(!pairs.iter().any(|(key, _)| key == "code_challenge"));
    }

    #[test]
    fn test_authorization_url_omits_unset_redirect_and_empty_scope() {
        let config = valid_builder()
            .redirect_url(None)
            .scopes(Vec::<String>::new())
            .build()
            .unwrap();
        let url = config.authorization_url("token-abc", None);
        assert!(!url.query_pairs().any(|(key, _)| key == "redirect_uri" || key == "scope"));
    }

    #[test]
    fn test_authorization_url_with_pkce_and_extra_params() {
        let config = valid_builder()
            .extra_authorize_param("prompt", "select_account")
            .build()
            .unwrap();
        let verifier = crate::oauth::PkceVerifier::generate();
        let challenge = verifier.challenge();
        let url = config.authorization_url("token-abc", Some(&challenge));
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();

        assert!(pairs.contains(&("code_challenge".to_string(), challenge.as_str().to_string())));
        assert!(pairs.contains(&("code_challenge_method".to_string(), "S256".to_string())));
        assert!(pairs.contains(&("prompt".to_string(), "select_account".to_string())));
    }

    #[test]
    fn test_debug_output_hides_secret() {
        let config = valid_builder().build().unwrap();
        let debug = format!("{:?}", config);
        assert!(!debug.contains("secret-456"));
    }

    #[test]
    fn test_closure_parser_errors_pass_through() {
        let config = valid_builder()
            .identity_parser(|_: &str, _: &[u8]| Err(identity_parse_error("nope")))
            .build()
            .unwrap();
        let err = config.parse_identity(b"{}").unwrap_err();
        assert_eq!(err.error_kind, ErrorKind::IdentityParse);
    }
}
