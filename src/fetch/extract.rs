//! Unpack a downloaded archive into a directory nobody else is using.

use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::common::FetchError;

/// What landed on disk.
#[derive(Debug)]
pub struct ExtractReport {
    pub directory: PathBuf,
    pub files: usize,
    pub bytes: u64,
}

/// Create `parent/packnow-<unix-seconds>`, adding `-N` until the name is
/// unused. Creation is atomic, so two fetches never share a directory.
pub fn create_extract_dir(parent: &Path) -> io::Result<PathBuf> {
    let secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default();
    create_unique_dir(parent, &format!("packnow-{secs}"))
}

fn create_unique_dir(parent: &Path, base: &str) -> io::Result<PathBuf> {
    let mut candidate = parent.join(base);
    let mut counter = 1u32;
    loop {
        match fs::create_dir(&candidate) {
            Ok(()) => return Ok(candidate),
            Err(err) if err.kind() == io::ErrorKind::AlreadyExists => {
                candidate = parent.join(format!("{base}-{counter}"));
                counter += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

/// Extract `archive` into a fresh directory under `parent`. On failure the
/// partially filled directory is removed.
pub fn extract_archive(archive: &Path, parent: &Path) -> Result<ExtractReport, FetchError> {
    let directory = create_extract_dir(parent)?;

    match unpack_into(archive, &directory) {
        Ok((files, bytes)) => Ok(ExtractReport {
            directory,
            files,
            bytes,
        }),
        Err(err) => {
            if let Err(cleanup) = fs::remove_dir_all(&directory) {
                tracing::warn!(
                    dir = %directory.display(),
                    error = %cleanup,
                    "failed to remove partial extraction"
                );
            }
            Err(err)
        }
    }
}

fn unpack_into(archive: &Path, target: &Path) -> Result<(usize, u64), FetchError> {
    let file = File::open(archive)?;
    let mut zip = zip::ZipArchive::new(file).map_err(|e| FetchError::Extraction(e.to_string()))?;

    let mut files = 0usize;
    let mut bytes = 0u64;

    for index in 0..zip.len() {
        let mut entry = zip
            .by_index(index)
            .map_err(|e| FetchError::Extraction(e.to_string()))?;

        // rejects absolute names and `..` escapes
        let Some(relative) = entry.enclosed_name().map(Path::to_path_buf) else {
            return Err(FetchError::Extraction(format!(
                "entry '{}' points outside the extraction directory",
                entry.name()
            )));
        };
        let out_path = target.join(&relative);

        if entry.is_dir() {
            fs::create_dir_all(&out_path)?;
            continue;
        }

        if let Some(parent) = out_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut out = File::create(&out_path)?;
        bytes += io::copy(&mut entry, &mut out)
            .map_err(|e| FetchError::Extraction(format!("{}: {e}", relative.display())))?;
        files += 1;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            if let Some(mode) = entry.unix_mode() {
                fs::set_permissions(&out_path, fs::Permissions::from_mode(mode & 0o777))?;
            }
        }
    }

    Ok((files, bytes))
}
