//! Request extractor and gate for the shared secret.

use async_trait::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use std::convert::Infallible;

use crate::common::AppError;
use crate::config::SECRET_HEADER;
use crate::server::session::TransferSession;

/// Raw `Authorization` bytes. The secret is sent as-is, no scheme prefix,
/// and is not required to be ASCII.
pub struct SecretHeader(pub Option<Vec<u8>>);

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for SecretHeader {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let value = parts
            .headers
            .get(SECRET_HEADER)
            .map(|v| v.as_bytes().to_vec());
        Ok(SecretHeader(value))
    }
}

/// Reject the request unless the supplied secret opens the session.
pub fn require_secret(session: &TransferSession, supplied: Option<&[u8]>) -> Result<(), AppError> {
    if session.authorize(supplied) {
        return Ok(());
    }
    tracing::warn!(
        provided = supplied.is_some_and(|s| !s.is_empty()),
        "GET pack (blocked): invalid password"
    );
    Err(AppError::Unauthorized)
}
