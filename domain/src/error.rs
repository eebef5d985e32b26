//! Error types for the `domain` layer.
use login_auth::error::{Error as LoginAuthError, ErrorKind as LoginAuthErrorKind};
use std::error::Error as StdError;
use std::fmt;

/// Top-level domain error type.
/// Errors in the Domain layer are modeled as a tree structure
/// with `domain::error::Error` as the root type holding a tree of `error_kind`
/// enums that represent the kinds of errors that can occur in the domain layer or
/// in lower layers. The `source` field is used to hold the original error that caused
/// the domain error. Ex. `domain` is dependent on `login-auth`, and `web` is dependent on
/// `domain`, but `web` should not be dependent, directly, on `login-auth`. Ultimately the
/// various `error_kind`s are used by `web` to return appropriate HTTP status codes.
#[derive(Debug)]
pub struct Error {
    pub source: Option<Box<dyn StdError + Send + Sync>>,
    pub error_kind: DomainErrorKind,
}

/// Enum representing the major categories of errors that can occur in the `domain` layer.
#[derive(Debug, PartialEq)]
pub enum DomainErrorKind {
    Internal(InternalErrorKind),
    Login(LoginErrorKind),
    External(ExternalErrorKind),
}

/// Errors originating in this process.
#[derive(Debug, PartialEq)]
pub enum InternalErrorKind {
    Config,
    Other(String),
}

/// Errors caused by the request driving a login.
#[derive(Debug, PartialEq)]
pub enum LoginErrorKind {
    UnknownProvider,
    InvalidState,
    Aborted,
}

/// Errors caused by the upstream identity provider.
#[derive(Debug, PartialEq)]
pub enum ExternalErrorKind {
    TokenExchange,
    ProfileFetch,
    InvalidResponse,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Domain Error: {self:?}")
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn StdError + 'static))
    }
}

impl Error {
    pub(crate) fn config(message: String) -> Self {
        Error {
            source: Some(message.into()),
            error_kind: DomainErrorKind::Internal(InternalErrorKind::Config),
        }
    }
}

// This is where we translate errors from the `login-auth` layer to the `domain` layer.
impl From<LoginAuthError> for Error {
    fn from(err: LoginAuthError) -> Self {
        let error_kind = match &err.error_kind {
            LoginAuthErrorKind::Config(_) => DomainErrorKind::Internal(InternalErrorKind::Config),
            LoginAuthErrorKind::UnknownProvider => {
                DomainErrorKind::Login(LoginErrorKind::UnknownProvider)
            }
            LoginAuthErrorKind::InvalidState => DomainErrorKind::Login(LoginErrorKind::InvalidState),
            LoginAuthErrorKind::Aborted => DomainErrorKind::Login(LoginErrorKind::Aborted),
            LoginAuthErrorKind::TokenExchange => {
                DomainErrorKind::External(ExternalErrorKind::TokenExchange)
            }
            LoginAuthErrorKind::ProfileFetch => {
                DomainErrorKind::External(ExternalErrorKind::ProfileFetch)
            }
            LoginAuthErrorKind::IdentityParse => {
                DomainErrorKind::External(ExternalErrorKind::InvalidResponse)
            }
        };
        Error {
            source: Some(Box::new(err)),
            error_kind,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use login_auth::error::{
        config_error, identity_parse_error, invalid_state_error, ConfigErrorKind,
    };

    #[test]
    fn test_translate_login_auth_errors() {
        let err: Error = invalid_state_error().into();
        assert_eq!(
            err.error_kind,
            DomainErrorKind::Login(LoginErrorKind::InvalidState)
        );

        let err: Error = identity_parse_error("bad json").into();
        assert_eq!(
            err.error_kind,
            DomainErrorKind::External(ExternalErrorKind::InvalidResponse)
        );

        let err: Error = config_error(ConfigErrorKind::InvalidUrl, "bad url").into();
        assert_eq!(
            err.error_kind,
            DomainErrorKind::Internal(InternalErrorKind::Config)
        );
    }

    #[test]
    fn test_source_is_preserved() {
        let err: Error = invalid_state_error().into();
        assert!(StdError::source(&err).is_some());
    }
}
