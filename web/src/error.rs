use std::error::Error as StdError;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use domain::error::{
    DomainErrorKind, Error as DomainError, ExternalErrorKind, InternalErrorKind, LoginErrorKind,
};

use log::*;

pub type Result<T> = core::result::Result<T, Error>;

#[derive(Debug)]
pub enum Error {
    Domain(DomainError),
    Web(WebErrorKind),
}

/// Errors detected at the HTTP boundary before the domain is involved.
#[derive(Debug, PartialEq)]
pub enum WebErrorKind {
    /// A required query parameter is missing or empty.
    Input,
    /// The provider redirected back with an `error` parameter instead of a code.
    ProviderDenied,
}

impl StdError for Error {}

impl std::fmt::Display for Error {
    fn fmt(&self, fmt: &mut std::fmt::Formatter) -> core::result::Result<(), std::fmt::Error> {
        write!(fmt, "{self:?}")
    }
}

// List of possible StatusCode variants https://docs.rs/http/latest/http/status/struct.StatusCode.html
impl IntoResponse for Error {
    fn into_response(self) -> Response {
        match self {
            Error::Domain(domain_error) => match domain_error.error_kind {
                DomainErrorKind::Login(login_error_kind) => match login_error_kind {
                    LoginErrorKind::UnknownProvider | LoginErrorKind::InvalidState => {
                        warn!("Rejected login request: {:?}", login_error_kind);
                        (StatusCode::BAD_REQUEST, "BAD REQUEST").into_response()
                    }
                    LoginErrorKind::Aborted => {
                        (StatusCode::SERVICE_UNAVAILABLE, "SERVICE UNAVAILABLE").into_response()
                    }
                },
                DomainErrorKind::External(external_error_kind) => match external_error_kind {
                    ExternalErrorKind::TokenExchange | ExternalErrorKind::ProfileFetch => {
                        error!(
                            "Identity provider call failed ({:?}): {:?}",
                            external_error_kind, domain_error.source
                        );
                        (StatusCode::BAD_GATEWAY, "BAD GATEWAY").into_response()
                    }
                    ExternalErrorKind::InvalidResponse => {
                        error!(
                            "Identity provider returned an unusable profile: {:?}",
                            domain_error.source
                        );
                        (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL SERVER ERROR").into_response()
                    }
                },
                DomainErrorKind::Internal(internal_error_kind) => {
                    error!(
                        "Internal error ({:?}): {:?}",
                        internal_error_kind, domain_error.source
                    );
                    (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL SERVER ERROR").into_response()
                }
            },
            Error::Web(web_error_kind) => match web_error_kind {
                WebErrorKind::Input | WebErrorKind::ProviderDenied => {
                    (StatusCode::BAD_REQUEST, "BAD REQUEST").into_response()
                }
            },
        }
    }
}

impl<E> From<E> for Error
where
    E: Into<DomainError>,
{
    fn from(err: E) -> Self {
        Self::Domain(err.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn domain_error(error_kind: DomainErrorKind) -> Error {
        Error::Domain(DomainError {
            source: None,
            error_kind,
        })
    }

    #[test]
    fn test_status_codes() {
        let cases = [
            (
                domain_error(DomainErrorKind::Login(LoginErrorKind::UnknownProvider)),
                StatusCode::BAD_REQUEST,
            ),
            (
                domain_error(DomainErrorKind::Login(LoginErrorKind::InvalidState)),
                StatusCode::BAD_REQUEST,
            ),
            (
                domain_error(DomainErrorKind::Login(LoginErrorKind::Aborted)),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
            (
                domain_error(DomainErrorKind::External(ExternalErrorKind::TokenExchange)),
                StatusCode::BAD_GATEWAY,
            ),
            (
                domain_error(DomainErrorKind::External(ExternalErrorKind::ProfileFetch)),
                StatusCode::BAD_GATEWAY,
            ),
            (
                domain_error(DomainErrorKind::External(
                    ExternalErrorKind::InvalidResponse,
                )),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (
                domain_error(DomainErrorKind::Internal(InternalErrorKind::Config)),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (Error::Web(WebErrorKind::Input), StatusCode::BAD_REQUEST),
            (Error::Web(WebErrorKind::ProviderDenied), StatusCode::BAD_REQUEST),
        ];

        for (error, expected) in cases {
            assert_eq!(error.into_response().status(), expected);
        }
    }
}
