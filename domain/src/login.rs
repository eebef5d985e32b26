//! Third-party login: start a login, then complete it and resolve the local account.

use std::sync::Arc;
use std::time::Duration;

use log::*;
use login_auth::http::HttpClientBuilder;
use login_auth::oauth::{
    ExternalIdentity, Flow, IdentityResolver, MemoryStateStore, MemoryUserDirectory,
    ProviderConfig, Resolution, StateStore,
};
use service::config::Config;
use tokio_util::sync::CancellationToken;

use crate::error::Error;
use crate::gateway::oauth::providers_from_config;

/// Everything the HTTP boundary learns from a completed login.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginOutcome {
    pub identity: ExternalIdentity,
    /// Application tag bound to the login when it started.
    pub tag: Option<String>,
    /// Whether the identity maps to an existing local account. A miss is not an error:
    /// whether to provision or reject is the caller's decision.
    pub resolution: Resolution,
}

/// Login entry point shared by all requests.
pub struct Gateway {
    flow: Flow,
    resolver: IdentityResolver,
    states: Arc<MemoryStateStore>,
    allowed_applications: Vec<String>,
}

impl Gateway {
    pub fn new(
        providers: Vec<ProviderConfig>,
        states: Arc<MemoryStateStore>,
        http: reqwest::Client,
        resolver: IdentityResolver,
        allowed_applications: Vec<String>,
    ) -> Self {
        let flow = Flow::new(providers, states.clone(), http);
        Self {
            flow,
            resolver,
            states,
            allowed_applications,
        }
    }

    /// Build the gateway described by `config`: enabled providers, the in-memory state
    /// store and the demo user directory.
    pub fn from_config(config: &Config) -> Result<Self, Error> {
        let providers = providers_from_config(config)?;
        if providers.is_empty() {
            warn!("No OAuth provider is configured; every login will be rejected");
        }

        let ttl = i64::try_from(config.login_state_ttl_secs)
            .ok()
            .and_then(chrono::TimeDelta::try_seconds)
            .ok_or_else(|| Error::config("login state TTL is out of range".to_string()))?;
        let states = Arc::new(MemoryStateStore::with_ttl(ttl));

        let http = HttpClientBuilder::new()
            .with_timeout(Duration::from_secs(config.upstream_timeout_secs))
            .build()?;

        let directory: MemoryUserDirectory = config
            .known_users()
            .iter()
            .map(|user| (user.key.clone(), user.user_id.clone()))
            .collect();
        info!("User directory seeded with {} known user(s)", directory.len());

        let allowed_applications = config
            .allowed_applications()
            .into_iter()
            .map(str::to_string)
            .collect();

        Ok(Self::new(
            providers,
            states,
            http,
            IdentityResolver::new(Arc::new(directory)),
            allowed_applications,
        ))
    }

    /// Ids of the enabled providers, sorted.
    pub fn provider_ids(&self) -> Vec<&str> {
        self.flow.provider_ids()
    }

    pub fn allowed_applications(&self) -> &[String] {
        &self.allowed_applications
    }

    /// The store holding login attempts, for the background sweeper.
    pub fn state_store(&self) -> Arc<dyn StateStore> {
        self.states.clone()
    }

    /// Start a login and return the provider URL to redirect the user agent to.
    ///
    /// An application outside the allow-list is dropped and the login proceeds without a
    /// tag, the same as when no application was asked for.
    pub async fn begin(
        &self,
        provider_id: &str,
        application: Option<String>,
    ) -> Result<String, Error> {
        let tag = self.application_tag(application);
        let url = self.flow.begin_login(provider_id, tag).await?;
        Ok(url.into())
    }

    /// Complete a login from the provider's callback and resolve the local account.
    pub async fn complete(
        &self,
        provider_id: &str,
        code: &str,
        state: &str,
    ) -> Result<LoginOutcome, Error> {
        self.complete_until(provider_id, code, state, &CancellationToken::new())
            .await
    }

    /// [`Gateway::complete`] that gives up with an `Aborted` error once `cancel` fires.
    pub async fn complete_until(
        &self,
        provider_id: &str,
        code: &str,
        state: &str,
        cancel: &CancellationToken,
    ) -> Result<LoginOutcome, Error> {
        let completed = self
            .flow
            .complete_login_until(provider_id, code, state, cancel)
            .await?;

        let policy = self.flow.provider(provider_id)?.identity_key();
        let resolution = self.resolver.resolve(&completed.identity, policy).await;
        match &resolution {
            Resolution::Found(user_id) => {
                info!("{} login resolved to user {}", provider_id, user_id)
            }
            Resolution::NotFound { .. } => {
                info!("New {} identity has logged in without a local account", provider_id)
            }
        }

        Ok(LoginOutcome {
            identity: completed.identity,
            tag: completed.tag,
            resolution,
        })
    }

    fn application_tag(&self, application: Option<String>) -> Option<String> {
        let application = application
            .map(|app| app.trim().to_string())
            .filter(|app| !app.is_empty())?;

        if self.allowed_applications.is_empty() || self.allowed_applications.contains(&application)
        {
            Some(application)
        } else {
            warn!("Ignoring login for unknown application '{}'", application);
            None
        }
    }
}

/// A gateway wired to a single stand-in provider, for tests that serve the provider
/// endpoints from a local mock server.
#[cfg(any(test, feature = "mock"))]
pub mod mock {
    use super::*;
    use login_auth::oauth::providers::standard;
    use login_auth::oauth::IdentityKey;
    use secrecy::SecretString;

    /// Id of the stand-in provider.
    pub const PROVIDER_ID: &str = "providerX";

    /// Build a gateway whose `providerX` authorizes at `{base_url}/authorize`, exchanges
    /// codes at `{base_url}/token` and reads profiles from `GET {base_url}/userinfo`.
    pub fn gateway_for(
        base_url: &str,
        known_users: &[(&str, &str)],
        allowed_applications: &[&str],
    ) -> Result<Gateway, Error> {
        let provider = ProviderConfig::builder(PROVIDER_ID)
            .client_id("client-x")
            .client_secret(SecretString::from("secret-x".to_string()))
            .authorize_url(format!("{base_url}/authorize"))
            .token_url(format!("{base_url}/token"))
            .userinfo_url(format!("{base_url}/userinfo"))
            .identity_key(IdentityKey::Email)
            .identity_parser(standard::parse_identity)
            .build()?;
        let directory: MemoryUserDirectory = known_users.iter().copied().collect();

        Ok(Gateway::new(
            vec![provider],
            Arc::new(MemoryStateStore::new()),
            HttpClientBuilder::new().build()?,
            IdentityResolver::new(Arc::new(directory)),
            allowed_applications
                .iter()
                .map(|app| app.to_string())
                .collect(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{DomainErrorKind, ExternalErrorKind, InternalErrorKind, LoginErrorKind};
    use clap::Parser;
    use mockito::{Server, ServerGuard};
    use serial_test::serial;

    async fn setup_test_server() -> ServerGuard {
        Server::new_async().await
    }

    fn gateway_with(server_url: &str, known: &[(&str, &str)], allowed: &[&str]) -> Gateway {
        mock::gateway_for(server_url, known, allowed).unwrap()
    }

    fn query_value(url: &str, name: &str) -> Option<String> {
        url::Url::parse(url)
            .unwrap()
            .query_pairs()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.into_owned())
    }

    async fn mock_provider(server: &mut ServerGuard, profile: &str) {
        server
            .mock("POST", "/token")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"access_token":"at-123"}"#)
            .create_async()
            .await;
        server
            .mock("GET", "/userinfo")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(profile)
            .create_async()
            .await;
    }

    #[tokio::test]
    async fn test_login_resolves_known_user() {
        let mut server = setup_test_server().await;
        mock_provider(&mut server, r#"{"id":"u1","email":"a@example.com"}"#).await;
        let gateway = gateway_with(&server.url(), &[("a@example.com", "muchlis-123")], &[]);

        let url = gateway.begin("providerX", None).await.unwrap();
        assert_eq!(query_value(&url, "client_id").as_deref(), Some("client-x"));
        let state = query_value(&url, "state").unwrap();

        let outcome = gateway.complete("providerX", "goodcode", &state).await.unwrap();
        assert_eq!(outcome.identity.subject_id, "u1");
        assert_eq!(outcome.resolution, Resolution::Found("muchlis-123".to_string()));
        assert_eq!(outcome.tag, None);
    }

    #[tokio::test]
    async fn test_login_with_unknown_user_is_not_an_error() {
        let mut server = setup_test_server().await;
        mock_provider(&mut server, r#"{"id":"u1","email":"a@example.com"}"#).await;
        let gateway = gateway_with(&server.url(), &[], &[]);

        let url = gateway
            .begin("providerX", Some("aplication1".to_string()))
            .await
            .unwrap();
        let state = query_value(&url, "state").unwrap();

        let outcome = gateway.complete("providerX", "goodcode", &state).await.unwrap();
        assert!(!outcome.resolution.found());
        assert_eq!(outcome.tag.as_deref(), Some("aplication1"));
    }

    #[tokio::test]
    async fn test_application_outside_allow_list_is_dropped() {
        let mut server = setup_test_server().await;
        mock_provider(&mut server, r#"{"id":"u1","email":"a@example.com"}"#).await;
        let gateway = gateway_with(&server.url(), &[], &["aplication1"]);

        let url = gateway
            .begin("providerX", Some("aplication9".to_string()))
            .await
            .unwrap();
        let state = query_value(&url, "state").unwrap();

        let outcome = gateway.complete("providerX", "goodcode", &state).await.unwrap();
        assert_eq!(outcome.tag, None);
    }

    #[tokio::test]
    async fn test_malformed_profile_maps_to_invalid_response() {
        let mut server = setup_test_server().await;
        mock_provider(&mut server, "not json").await;
        let gateway = gateway_with(&server.url(), &[], &[]);

        let url = gateway.begin("providerX", None).await.unwrap();
        let state = query_value(&url, "state").unwrap();

        let err = gateway
            .complete("providerX", "goodcode", &state)
            .await
            .unwrap_err();
        assert_eq!(
            err.error_kind,
            DomainErrorKind::External(ExternalErrorKind::InvalidResponse)
        );
    }

    #[tokio::test]
    async fn test_unknown_provider() {
        let server = setup_test_server().await;
        let gateway = gateway_with(&server.url(), &[], &[]);

        let err = gateway.begin("gitlab", None).await.unwrap_err();
        assert_eq!(
            err.error_kind,
            DomainErrorKind::Login(LoginErrorKind::UnknownProvider)
        );
    }

    #[tokio::test]
    async fn test_cancelled_login_is_aborted_and_keeps_state() {
        let mut server = setup_test_server().await;
        let gateway = gateway_with(&server.url(), &[], &[]);

        let url = gateway.begin("providerX", None).await.unwrap();
        let state = query_value(&url, "state").unwrap();

        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = gateway
            .complete_until("providerX", "goodcode", &state, &cancel)
            .await
            .unwrap_err();
        assert_eq!(err.error_kind, DomainErrorKind::Login(LoginErrorKind::Aborted));

        // The attempt was never validated, so the callback can still go through.
        mock_provider(&mut server, r#"{"id":"u1","email":"a@example.com"}"#).await;
        assert!(gateway.complete("providerX", "goodcode", &state).await.is_ok());
    }

    #[test]
    #[serial]
    fn test_from_config_rejects_unrepresentable_state_ttl() {
        for ttl in ["10000000000000000", "18446744073709551615"] {
            let config =
                Config::try_parse_from(["login_gateway", "--login-state-ttl-secs", ttl]).unwrap();
            let err = Gateway::from_config(&config).err().unwrap();
            assert_eq!(
                err.error_kind,
                DomainErrorKind::Internal(InternalErrorKind::Config)
            );
        }
    }

    #[test]
    #[serial]
    fn test_from_config_accepts_very_long_state_ttl() {
        let config = Config::try_parse_from([
            "login_gateway",
            "--login-state-ttl-secs",
            "10000000000000",
        ])
        .unwrap();
        assert!(Gateway::from_config(&config).is_ok());
    }

    #[test]
    #[serial]
    fn test_from_config_enables_configured_providers() {
        let config = Config::try_parse_from([
            "login_gateway",
            "--github-client-id",
            "gh-id",
            "--github-client-secret",
            "gh-secret",
            "--known-users",
            "github:MDQ6VXNlcjM5ODM1OTYy=muchlis-123",
        ])
        .unwrap();

        let gateway = Gateway::from_config(&config).unwrap();
        assert!(gateway.provider_ids().contains(&"github"));
    }

    #[test]
    #[serial]
    fn test_from_config_rejects_half_configured_provider() {
        let config = Config::try_parse_from([
            "login_gateway",
            "--google-client-id",
            "google-id",
            "--google-client-secret",
            "",
        ])
        .unwrap();

        let err = Gateway::from_config(&config).err().unwrap();
        assert_eq!(
            err.error_kind,
            DomainErrorKind::Internal(InternalErrorKind::Config)
        );
    }
}
