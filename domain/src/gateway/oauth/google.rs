//! Google OAuth provider from process configuration.

use login_auth::oauth::{providers::google, ProviderConfig};
use secrecy::SecretString;
use service::config::Config;

use crate::error::Error;

/// Create the Google provider, or `None` when Google login is not configured.
pub fn new_provider(config: &Config) -> Result<Option<ProviderConfig>, Error> {
    let Some((client_id, client_secret)) = super::credentials(
        "Google",
        config.google_client_id(),
        config.google_client_secret(),
    )?
    else {
        return Ok(None);
    };

    let provider = google::builder(client_id, SecretString::from(client_secret))
        .redirect_url(config.google_redirect_uri())
        .scopes(
            config
                .google_scopes()
                .iter()
                .map(|scope| scope.trim())
                .filter(|scope| !scope.is_empty()),
        )
        .build()?;
    Ok(Some(provider))
}
