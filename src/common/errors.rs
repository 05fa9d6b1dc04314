//! Error taxonomy for packing, hosting, and fetching.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use std::path::PathBuf;
use thiserror::Error;

/// Terminal failure of a pack operation. The partial archive is already gone
/// by the time one of these reaches the caller.
#[derive(Debug, Error)]
pub enum PackError {
    #[error("directory to pack does not exist: {}", .0.display())]
    MissingRoot(PathBuf),

    #[error("not a directory: {}", .0.display())]
    RootNotDirectory(PathBuf),

    #[error("archive destination {} is a directory", .0.display())]
    DestinationIsDirectory(PathBuf),

    #[error("cannot create archive {}", path.display())]
    CreateArchive {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot read {}", path.display())]
    ReadEntry {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot write {} into the archive", path.display())]
    WriteEntry {
        path: PathBuf,
        #[source]
        source: zip::result::ZipError,
    },

    #[error("failed to finalize archive {}", path.display())]
    Finalize {
        path: PathBuf,
        #[source]
        source: zip::result::ZipError,
    },
}

/// Terminal failure of a fetch. Partial downloads and partial extraction
/// directories are removed before this is returned.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("the host requires a password but none was provided")]
    AuthRequired,

    #[error("invalid password")]
    InvalidCredential,

    #[error("failed to fetch {url} (status {status})")]
    FetchFailure { url: String, status: u16 },

    #[error("host at {url} did not answer the probe as a packnow host")]
    InvalidProbe {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("request to {url} failed")]
    Network {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("failed to extract archive: {0}")]
    Extraction(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Per-request failures on the host. Each one ends a single request and
/// leaves the server running.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("missing or invalid password")]
    Unauthorized,

    #[error("archive not available: {0}")]
    NotFound(String),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    fn status(&self) -> StatusCode {
        match self {
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Short machine-readable code placed in the `error` field.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Unauthorized => "password",
            AppError::NotFound(_) => "missing",
            AppError::Internal(_) => "internal",
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if let AppError::Internal(err) = &self {
            tracing::error!("request failed: {err:#}");
        }
        let body = serde_json::json!({ "error": self.code() });
        (self.status(), Json(body)).into_response()
    }
}
