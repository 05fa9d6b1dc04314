//! Immutable hosting session: which archive, which secret.

use anyhow::{ensure, Context, Result};
use std::path::{Path, PathBuf};

/// One hosted archive. Read-only for the life of the server; every request
/// is authorized against it independently.
#[derive(Debug)]
pub struct TransferSession {
    path: PathBuf,
    secret: Option<String>,
}

impl TransferSession {
    /// Validate the archive and build a session. An empty secret means
    /// the archive is open to anyone who can reach the host.
    pub fn new(path: impl Into<PathBuf>, secret: Option<String>) -> Result<Self> {
        let path = path.into();
        ensure!(
            path.extension().is_some_and(|ext| ext == "zip"),
            "provided file was not a zipped file: {}",
            path.display()
        );

        let meta = std::fs::metadata(&path)
            .with_context(|| format!("Cannot host {}", path.display()))?;
        ensure!(meta.is_file(), "Cannot host {}: not a regular file", path.display());

        let secret = secret.filter(|s| !s.is_empty());
        Ok(Self { path, secret })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn requires_secret(&self) -> bool {
        self.secret.is_some()
    }

    /// Whether the raw header bytes in `supplied` grant access. Always true
    /// without a secret. Bytes are compared as sent, so non-ASCII secrets
    /// work in whatever encoding the client used for the header.
    pub fn authorize(&self, supplied: Option<&[u8]>) -> bool {
        match &self.secret {
            None => true,
            Some(secret) => supplied.is_some_and(|s| secrets_match(secret.as_bytes(), s)),
        }
    }
}

// Comparison time depends only on the lengths, not on where bytes differ.
fn secrets_match(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
