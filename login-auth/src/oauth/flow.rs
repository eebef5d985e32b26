//! The two HTTP-facing steps of an authorization-code login.
//!
//! A login attempt moves `Started -> AwaitingCallback -> Completed | Failed`. Nothing
//! about it is kept here; the state store's record is the only trace between steps.

use std::collections::HashMap;
use std::sync::Arc;

use log::*;
use reqwest::header::ACCEPT;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use url::Url;

use super::pkce::PkceVerifier;
use super::provider::{ClientAuth, ExternalIdentity, ProviderConfig, UserinfoRequest};
use super::state::{PendingLogin, StateStore};
use crate::error::{
    aborted_error, invalid_state_error, profile_fetch_error, token_exchange_error,
    unknown_provider_error, Error, ErrorKind,
};

/// Result of a completed login.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletedLogin {
    pub identity: ExternalIdentity,
    /// Tag bound to the state token when the login started.
    pub tag: Option<String>,
}

/// Token endpoint response. Providers disagree on error signalling: GitHub answers
/// 200 with an `error` field, most others use a 4xx status.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

/// Authorization-code login across a set of providers.
///
/// Cheap to share behind an `Arc`; concurrent logins only meet in the state store.
/// No lock is held across a network call and no step after state validation is
/// retried: codes and state tokens are single-use, so a failed attempt is restarted
/// with [`Flow::begin_login`].
pub struct Flow {
    providers: HashMap<String, Arc<ProviderConfig>>,
    states: Arc<dyn StateStore>,
    http: reqwest::Client,
}

impl Flow {
    pub fn new(
        providers: impl IntoIterator<Item = ProviderConfig>,
        states: Arc<dyn StateStore>,
        http: reqwest::Client,
    ) -> Self {
        let providers = providers
            .into_iter()
            .map(|config| (config.provider_id().to_string(), Arc::new(config)))
            .collect();
        Self {
            providers,
            states,
            http,
        }
    }

    /// Look up a registered provider.
    pub fn provider(&self, provider_id: &str) -> Result<&ProviderConfig, Error> {
        self.providers
            .get(provider_id)
            .map(Arc::as_ref)
            .ok_or_else(|| unknown_provider_error(provider_id))
    }

    /// Ids of all registered providers, sorted.
    pub fn provider_ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.providers.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }

    pub fn state_store(&self) -> &Arc<dyn StateStore> {
        &self.states
    }

    /// Start a login: issue a state token bound to `tag` and build the provider's
    /// authorization URL. Makes no network call.
    pub async fn begin_login(&self, provider_id: &str, tag: Option<String>) -> Result<Url, Error> {
        let provider = self.provider(provider_id)?;

        let pkce_verifier = provider.uses_pkce().then(PkceVerifier::generate);
        let challenge = pkce_verifier.as_ref().map(PkceVerifier::challenge);

        let state = self
            .states
            .issue(PendingLogin {
                provider_id: provider_id.to_string(),
                tag,
                pkce_verifier,
            })
            .await?;

        debug!("Starting {} login", provider_id);
        Ok(provider.authorization_url(&state, challenge.as_ref()))
    }

    /// Finish a login from the provider's callback parameters.
    pub async fn complete_login(
        &self,
        provider_id: &str,
        code: &str,
        state: &str,
    ) -> Result<CompletedLogin, Error> {
        self.complete_login_until(provider_id, code, state, &CancellationToken::new())
            .await
    }

    /// [`Flow::complete_login`] that stops with an `Aborted` error once `cancel` fires.
    ///
    /// Cancelled before state validation, the attempt is left untouched. Cancelled
    /// after, the attempt stays consumed; a retry needs a fresh `begin_login`.
    pub async fn complete_login_until(
        &self,
        provider_id: &str,
        code: &str,
        state: &str,
        cancel: &CancellationToken,
    ) -> Result<CompletedLogin, Error> {
        let provider = self.provider(provider_id)?;

        if cancel.is_cancelled() {
            return Err(aborted_error("Login cancelled before state validation"));
        }

        // Must come before any network call: never exchange a code for an unverified request.
        let PendingLogin {
            provider_id: issued_for,
            tag,
            pkce_verifier,
        } = self.states.validate(state).await.inspect_err(|_| {
            warn!("Rejected {} callback with invalid state", provider_id)
        })?;

        if issued_for != provider_id {
            warn!(
                "Rejected {} callback carrying state issued for {}",
                provider_id, issued_for
            );
            return Err(invalid_state_error());
        }

        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                warn!("{} login cancelled after state validation", provider_id);
                Err(aborted_error("Login cancelled after state validation"))
            }
            identity = self.exchange_and_identify(provider, code, pkce_verifier.as_ref()) => {
                let identity = identity?;
                info!("Completed {} login", provider_id);
                Ok(CompletedLogin { identity, tag })
            }
        }
    }

    async fn exchange_and_identify(
        &self,
        provider: &ProviderConfig,
        code: &str,
        pkce_verifier: Option<&PkceVerifier>,
    ) -> Result<ExternalIdentity, Error> {
        let access_token = self
            .exchange_code(provider, code, pkce_verifier)
            .await
            .inspect_err(|e| warn!("{} token exchange failed: {:?}", provider.provider_id(), e))?;

        let body = self
            .fetch_profile(provider, &access_token)
            .await
            .inspect_err(|e| warn!("{} profile fetch failed: {:?}", provider.provider_id(), e))?;

        provider
            .parse_identity(&body)
            .inspect_err(|e| warn!("{} identity parse failed: {:?}", provider.provider_id(), e))
    }

    /// Exchange an authorization code for an access token.
    async fn exchange_code(
        &self,
        provider: &ProviderConfig,
        code: &str,
        pkce_verifier: Option<&PkceVerifier>,
    ) -> Result<SecretString, Error> {
        let mut form: Vec<(&str, &str)> = vec![("grant_type", "authorization_code"), ("code", code)];
        if let Some(redirect_url) = provider.redirect_url() {
            form.push(("redirect_uri", redirect_url.as_str()));
        }
        if let Some(verifier) = pkce_verifier {
            form.push(("code_verifier", verifier.as_str()));
        }

        let mut request = self
            .http
            .post(provider.token_url().clone())
            .header(ACCEPT, "application/json");
        request = match provider.client_auth() {
            ClientAuth::RequestBody => {
                form.push(("client_id", provider.client_id()));
                form.push(("client_secret", provider.client_secret().expose_secret()));
                request
            }
            ClientAuth::BasicAuth => request.basic_auth(
                provider.client_id(),
                Some(provider.client_secret().expose_secret()),
            ),
        };

        let response = request.form(&form).send().await.map_err(|e| Error {
            source: Some(Box::new(e)),
            error_kind: ErrorKind::TokenExchange,
        })?;

        let status = response.status();
        let tokens: TokenResponse = response.json().await.map_err(|e| Error {
            source: Some(Box::new(e)),
            error_kind: ErrorKind::TokenExchange,
        })?;

        if let Some(error) = tokens.error {
            return Err(token_exchange_error(&format!(
                "Provider rejected the code exchange ({}): {} {}",
                status,
                error,
                tokens.error_description.unwrap_or_default()
            )));
        }
        if !status.is_success() {
            return Err(token_exchange_error(&format!(
                "Token endpoint answered {}",
                status
            )));
        }

        tokens
            .access_token
            .filter(|token| !token.is_empty())
            .map(SecretString::from)
            .ok_or_else(|| token_exchange_error("Token response has no access_token"))
    }

    /// Fetch the raw userinfo document with the access token as bearer credential.
    async fn fetch_profile(
        &self,
        provider: &ProviderConfig,
        access_token: &SecretString,
    ) -> Result<Vec<u8>, Error> {
        let url = provider.userinfo_url().clone();
        let request = match provider.userinfo_request() {
            UserinfoRequest::Get => self.http.get(url),
            UserinfoRequest::PostJson(body) => self.http.post(url).json(body),
        };

        let response = request
            .bearer_auth(access_token.expose_secret())
            .header(ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| Error {
                source: Some(Box::new(e)),
                error_kind: ErrorKind::ProfileFetch,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(profile_fetch_error(&format!(
                "Userinfo endpoint answered {}",
                status
            )));
        }

        let body = response.bytes().await.map_err(|e| Error {
            source: Some(Box::new(e)),
            error_kind: ErrorKind::ProfileFetch,
        })?;
        Ok(body.to_vec())
    }
}
