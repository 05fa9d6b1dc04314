//! HTTP side of a fetch: probe, authenticate, stream to disk.

use reqwest::header::HeaderValue;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

use super::credentials::CredentialSource;
use super::extract::extract_archive;
use crate::common::FetchError;
use crate::config::SECRET_HEADER;
use crate::output;
use crate::server::handlers::ProbeResponse;

/// Result of a completed fetch.
#[derive(Debug)]
pub struct FetchReport {
    pub directory: PathBuf,
    pub files: usize,
    pub downloaded: u64,
}

/// Talks to one packnow host at a time; reusable across fetches.
pub struct TransferClient {
    http: reqwest::Client,
    output_dir: PathBuf,
    show_progress: bool,
}

impl TransferClient {
    /// Downloads and extractions land in `output_dir`.
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        let http = reqwest::Client::builder()
            .user_agent(concat!("packnow/", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            http,
            output_dir: output_dir.into(),
            show_progress: false,
        }
    }

    /// Draw a progress bar while downloading.
    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    /// Ask the host whether fetching needs a secret.
    pub async fn probe(&self, url: &str) -> Result<bool, FetchError> {
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|source| FetchError::Network {
                url: url.to_string(),
                source,
            })?;

        if !response.status().is_success() {
            return Err(FetchError::FetchFailure {
                url: url.to_string(),
                status: response.status().as_u16(),
            });
        }

        let probe: ProbeResponse =
            response
                .json()
                .await
                .map_err(|source| FetchError::InvalidProbe {
                    url: url.to_string(),
                    source,
                })?;
        tracing::debug!(requires_secret = probe.requires_secret, "probe");
        Ok(probe.requires_secret)
    }

    /// Probe, authenticate if needed, download, and extract.
    pub async fn fetch(
        &self,
        url: &str,
        credentials: &dyn CredentialSource,
    ) -> Result<FetchReport, FetchError> {
        let requires_secret = self.probe(url).await?;

        let secret = if requires_secret {
            credentials.secret().ok_or(FetchError::AuthRequired)?
        } else {
            String::new()
        };

        // raw UTF-8 bytes; header values may carry non-ASCII octets
        let secret = HeaderValue::from_bytes(secret.as_bytes())
            .map_err(|_| FetchError::InvalidCredential)?;

        let get_url = fetch_url(url);
        let mut response = self
            .http
            .get(&get_url)
            .header(SECRET_HEADER, secret)
            .send()
            .await
            .map_err(|source| FetchError::Network {
                url: get_url.clone(),
                source,
            })?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            tracing::warn!(status, url = %get_url, "fetch rejected");
            return Err(if requires_secret {
                FetchError::InvalidCredential
            } else {
                FetchError::FetchFailure {
                    url: url.to_string(),
                    status,
                }
            });
        }

        // deleted on drop, so a failed download leaves nothing behind
        let download = tempfile::Builder::new()
            .prefix(".packnow-")
            .suffix(".zip.part")
            .tempfile_in(&self.output_dir)?;

        let downloaded = self
            .stream_to(&mut response, download.as_file(), &get_url)
            .await?;
        tracing::info!(bytes = downloaded, "download complete");

        let spinner = self.show_progress.then(|| output::spinner("extracting..."));
        let archive = download.path().to_path_buf();
        let output_dir = self.output_dir.clone();
        let extracted = tokio::task::spawn_blocking(move || extract_archive(&archive, &output_dir))
            .await
            .map_err(|e| FetchError::Extraction(format!("extraction task failed: {e}")))?;

        let report = match (extracted, spinner) {
            (Ok(report), Some(spinner)) => {
                output::finish_spinner_success(&spinner, "extracted");
                report
            }
            (Err(err), Some(spinner)) => {
                output::finish_spinner_error(&spinner, "extraction failed");
                return Err(err);
            }
            (result, None) => result?,
        };

        download.close()?;

        Ok(FetchReport {
            directory: report.directory,
            files: report.files,
            downloaded,
        })
    }

    /// Copy the body chunk by chunk; never holds more than one chunk.
    async fn stream_to(
        &self,
        response: &mut reqwest::Response,
        file: &std::fs::File,
        url: &str,
    ) -> Result<u64, FetchError> {
        let mut out = tokio::fs::File::from_std(file.try_clone()?);
        let bar = self
            .show_progress
            .then(|| output::download_bar(response.content_length()));

        let mut written = 0u64;
        loop {
            let chunk = response
                .chunk()
                .await
                .map_err(|source| FetchError::Network {
                    url: url.to_string(),
                    source,
                })?;
            let Some(chunk) = chunk else { break };

            out.write_all(&chunk).await?;
            written += chunk.len() as u64;
            if let Some(bar) = &bar {
                bar.set_position(written);
            }
        }
        out.flush().await?;
        out.sync_all().await?;

        if let Some(bar) = bar {
            bar.finish_and_clear();
        }
        Ok(written)
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }
}

/// `<base>/get` without a doubled slash.
pub fn fetch_url(base: &str) -> String {
    format!("{}/get", base.trim_end_matches('/'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fetch_url_normalizes_trailing_slash() {
        assert_eq!(fetch_url("http://10.0.0.5:8080"), "http://10.0.0.5:8080/get");
        assert_eq!(fetch_url("http://10.0.0.5:8080/"), "http://10.0.0.5:8080/get");
        assert_eq!(
            fetch_url("https://myrepl.alice.repl.co//"),
            "https://myrepl.alice.repl.co/get"
        );
    }
}
