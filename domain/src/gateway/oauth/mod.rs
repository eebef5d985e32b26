//! OAuth authentication gateway.
//!
//! Turns the process configuration into `login-auth` provider configurations.

pub mod github;
pub mod google;

use login_auth::oauth::ProviderConfig;
use service::config::Config;

use crate::error::Error;

/// Build every provider enabled in `config`.
///
/// A provider is enabled when both its client id and secret are set. Setting only
/// one of the two is a configuration error rather than a silently disabled login.
pub fn providers_from_config(config: &Config) -> Result<Vec<ProviderConfig>, Error> {
    let providers = [github::new_provider(config)?, google::new_provider(config)?];
    Ok(providers.into_iter().flatten().collect())
}

/// Pair up a client id and secret, rejecting a half-configured provider.
fn credentials(
    provider: &str,
    client_id: Option<String>,
    client_secret: Option<String>,
) -> Result<Option<(String, String)>, Error> {
    let non_empty = |value: Option<String>| value.filter(|v| !v.trim().is_empty());
    match (non_empty(client_id), non_empty(client_secret)) {
        (Some(id), Some(secret)) => Ok(Some((id, secret))),
        (None, None) => Ok(None),
        _ => Err(Error::config(format!(
            "{provider} login needs both a client id and a client secret"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{DomainErrorKind, InternalErrorKind};

    #[test]
    fn test_credentials_pairing() {
        assert_eq!(credentials("GitHub", None, None).unwrap(), None);
        assert_eq!(
            credentials("GitHub", Some("id".into()), Some("secret".into())).unwrap(),
            Some(("id".to_string(), "secret".to_string()))
        );
        assert_eq!(
            credentials("GitHub", Some("  ".into()), None).unwrap(),
            None
        );

        let err = credentials("GitHub", Some("id".into()), None).unwrap_err();
        assert_eq!(
            err.error_kind,
            DomainErrorKind::Internal(InternalErrorKind::Config)
        );
    }
}
