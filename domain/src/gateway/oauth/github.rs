//! GitHub OAuth provider from process configuration.

use login_auth::oauth::{providers::github, ProviderConfig};
use secrecy::SecretString;
use service::config::Config;

use crate::error::Error;

/// Create the GitHub provider, or `None` when GitHub login is not configured.
///
/// GitHub falls back to the callback registered with the OAuth app when no
/// redirect URI is configured.
pub fn new_provider(config: &Config) -> Result<Option<ProviderConfig>, Error> {
    let Some((client_id, client_secret)) = super::credentials(
        "GitHub",
        config.github_client_id(),
        config.github_client_secret(),
    )?
    else {
        return Ok(None);
    };

    let provider = github::builder(client_id, SecretString::from(client_secret))
        .redirect_url(config.github_redirect_uri())
        .scopes(
            config
                .github_scopes()
                .iter()
                .map(|scope| scope.trim())
                .filter(|scope| !scope.is_empty()),
        )
        .build()?;
    Ok(Some(provider))
}
