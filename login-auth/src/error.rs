//! Error types for the `login-auth` crate.
//!
//! Follows the same pattern as domain::error with a root Error struct and error kind enums.
//! Messages carried in `source` never contain client secrets, access tokens or
//! authorization codes.

use std::error::Error as StdError;
use std::fmt;

/// Top-level error type for login-auth crate.
/// Holds error kind and optional source for error chaining.
#[derive(Debug)]
pub struct Error {
    pub source: Option<Box<dyn StdError + Send + Sync>>,
    pub error_kind: ErrorKind,
}

/// Major categories of errors in login-auth.
#[derive(Debug, PartialEq)]
pub enum ErrorKind {
    /// Malformed provider configuration. Fatal at startup.
    Config(ConfigErrorKind),
    /// No provider is registered under the requested id.
    UnknownProvider,
    /// The callback state is unknown, expired, already used or bound to another provider.
    InvalidState,
    /// The provider refused or failed the authorization code exchange.
    TokenExchange,
    /// The userinfo/profile request failed.
    ProfileFetch,
    /// The profile response did not match what the provider's parser expects.
    IdentityParse,
    /// The caller cancelled the login while it was in flight.
    Aborted,
}

/// Errors from provider configuration.
#[derive(Debug, PartialEq)]
pub enum ConfigErrorKind {
    MissingField,
    InvalidUrl,
    HttpClient,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self.error_kind {
            ErrorKind::Config(kind) => write!(f, "Config error: {:?}", kind),
            ErrorKind::UnknownProvider => write!(f, "Unknown OAuth provider"),
            ErrorKind::InvalidState => write!(f, "Invalid login state"),
            ErrorKind::TokenExchange => write!(f, "Token exchange failed"),
            ErrorKind::ProfileFetch => write!(f, "Profile fetch failed"),
            ErrorKind::IdentityParse => write!(f, "Identity parse failed"),
            ErrorKind::Aborted => write!(f, "Login aborted"),
        }
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn StdError + 'static))
    }
}

impl From<url::ParseError> for Error {
    fn from(err: url::ParseError) -> Self {
        Error {
            source: Some(Box::new(err)),
            error_kind: ErrorKind::Config(ConfigErrorKind::InvalidUrl),
        }
    }
}

/// Helper function to create config errors.
pub fn config_error(kind: ConfigErrorKind, message: &str) -> Error {
    Error {
        source: Some(message.to_string().into()),
        error_kind: ErrorKind::Config(kind),
    }
}

/// Helper function to create unknown provider errors.
pub fn unknown_provider_error(provider_id: &str) -> Error {
    Error {
        source: Some(format!("No provider registered as '{}'", provider_id).into()),
        error_kind: ErrorKind::UnknownProvider,
    }
}

/// Helper function to create invalid state errors.
///
/// The message is identical for every cause so callers cannot learn whether a token
/// ever existed.
pub fn invalid_state_error() -> Error {
    Error {
        source: Some("State is invalid, expired or already used".into()),
        error_kind: ErrorKind::InvalidState,
    }
}

/// Helper function to create token exchange errors.
pub fn token_exchange_error(message: &str) -> Error {
    Error {
        source: Some(message.to_string().into()),
        error_kind: ErrorKind::TokenExchange,
    }
}

/// Helper function to create profile fetch errors.
pub fn profile_fetch_error(message: &str) -> Error {
    Error {
        source: Some(message.to_string().into()),
        error_kind: ErrorKind::ProfileFetch,
    }
}

/// Helper function to create identity parse errors.
pub fn identity_parse_error(message: &str) -> Error {
    Error {
        source: Some(message.to_string().into()),
        error_kind: ErrorKind::IdentityParse,
    }
}

/// Helper function to create aborted errors.
pub fn aborted_error(message: &str) -> Error {
    Error {
        source: Some(message.to_string().into()),
        error_kind: ErrorKind::Aborted,
    }
}
