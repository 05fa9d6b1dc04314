//! HTTP handlers for the probe and fetch endpoints.

use anyhow::Context;
use axum::{
    body::Body,
    extract::State,
    http::{header, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use tokio_util::io::ReaderStream;

use crate::common::AppError;
use crate::config::SERVED_FILENAME;
use crate::server::auth::{self, SecretHeader};
use crate::server::state::{GuardedReader, HostState};

/// Body of `GET /`.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ProbeResponse {
    pub requires_secret: bool,
}

/// Report whether fetching needs a secret. Never authorized.
pub async fn probe_handler(State(state): State<HostState>) -> Json<ProbeResponse> {
    tracing::info!("GET /");
    Json(ProbeResponse {
        requires_secret: state.session.requires_secret(),
    })
}

/// Stream the archive to an authorized caller.
pub async fn fetch_handler(
    SecretHeader(secret): SecretHeader,
    State(state): State<HostState>,
) -> Result<Response<Body>, AppError> {
    auth::require_secret(&state.session, secret.as_deref())?;

    let path = state.session.path();

    // fresh read-only handle per request
    let file = match tokio::fs::File::open(path).await {
        Ok(file) => file,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::error!(path = %path.display(), "hosted archive disappeared");
            return Err(AppError::NotFound(path.display().to_string()));
        }
        Err(err) => {
            return Err(anyhow::Error::new(err)
                .context(format!("open {}", path.display()))
                .into())
        }
    };
    let size = file
        .metadata()
        .await
        .context("read archive metadata")?
        .len();

    tracing::info!(bytes = size, "GET pack (giving)");

    // counted until the body is fully sent or the client goes away
    let reader = GuardedReader::new(file, state.begin_transfer());
    let body = Body::from_stream(ReaderStream::new(reader));
    Ok(Response::builder()
        .header(header::CONTENT_TYPE, "application/zip")
        .header(header::CONTENT_LENGTH, size)
        .header(
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{SERVED_FILENAME}\""),
        )
        .body(body)
        .context("build response")?)
}
