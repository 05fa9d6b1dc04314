use std::cell::Cell;
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use walkdir::{DirEntry, WalkDir};
use zip::write::FileOptions;

use super::rules::{ExclusionObserver, Matcher, RuleSet};
use crate::common::PackError;

/// Entries above this size need zip64 headers.
const ZIP64_THRESHOLD: u64 = u32::MAX as u64;

/// One file written into the archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    pub source_path: PathBuf,
    /// Tree-relative name, `/`-separated
    pub archive_path: String,
}

/// Outcome of a finished pack.
#[derive(Debug)]
pub struct PackReport {
    pub archive: PathBuf,
    pub entries: Vec<ArchiveEntry>,
    pub excluded: usize,
    pub elapsed: Duration,
}

/// Called for every file written, for console display.
pub trait PackProgress {
    fn packed(&self, entry: &ArchiveEntry);
}

impl PackProgress for () {
    fn packed(&self, _entry: &ArchiveEntry) {}
}

// RAII: Drop deletes the file unless `finish` disarmed the guard.
struct PartialArchive {
    path: PathBuf,
    disarmed: bool,
}

impl PartialArchive {
    fn finish(mut self) -> PathBuf {
        self.disarmed = true;
        std::mem::take(&mut self.path)
    }
}

impl Drop for PartialArchive {
    fn drop(&mut self) {
        if self.disarmed {
            return;
        }
        match std::fs::remove_file(&self.path) {
            Ok(()) => tracing::debug!(path = %self.path.display(), "removed partial archive"),
            Err(err) if err.kind() == io::ErrorKind::NotFound => {}
            Err(err) => {
                tracing::warn!(path = %self.path.display(), error = %err, "failed to remove partial archive")
            }
        }
    }
}

/// Walk `tree_root`, apply `rules`, and write the retained files into a zip
/// at `destination`.
pub fn pack(
    tree_root: &Path,
    rules: &RuleSet,
    destination: &Path,
    observer: &dyn ExclusionObserver,
    progress: &dyn PackProgress,
) -> Result<PackReport, PackError> {
    let started = Instant::now();

    match std::fs::metadata(tree_root) {
        Ok(meta) if meta.is_dir() => {}
        Ok(_) => return Err(PackError::RootNotDirectory(tree_root.to_path_buf())),
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            return Err(PackError::MissingRoot(tree_root.to_path_buf()))
        }
        Err(source) => {
            return Err(PackError::ReadEntry {
                path: tree_root.to_path_buf(),
                source,
            })
        }
    }

    if destination.is_dir() {
        return Err(PackError::DestinationIsDirectory(destination.to_path_buf()));
    }

    let file = File::create(destination).map_err(|source| PackError::CreateArchive {
        path: destination.to_path_buf(),
        source,
    })?;
    let guard = PartialArchive {
        path: destination.to_path_buf(),
        disarmed: false,
    };

    // the destination now exists, so it resolves
    let resolved = destination.canonicalize().ok();
    let matcher = Matcher::new(rules, tree_root, resolved, observer);

    let (candidates, excluded) = collect_files(tree_root, &matcher);

    let mut writer = zip::ZipWriter::new(file);
    let mut entries = Vec::with_capacity(candidates.len());

    for source in candidates {
        let entry = ArchiveEntry {
            archive_path: archive_name(tree_root, &source),
            source_path: source,
        };
        write_entry(&mut writer, &entry)?;
        progress.packed(&entry);
        entries.push(entry);
    }

    writer
        .finish()
        .map_err(|source| PackError::Finalize {
            path: destination.to_path_buf(),
            source,
        })?;

    let archive = guard.finish();
    let elapsed = started.elapsed();
    tracing::info!(
        archive = %archive.display(),
        files = entries.len(),
        excluded,
        elapsed_ms = elapsed.as_millis() as u64,
        "pack complete"
    );

    Ok(PackReport {
        archive,
        entries,
        excluded,
        elapsed,
    })
}

/// Top-down, pre-order walk. Excluded directories are pruned before descent.
fn collect_files(tree_root: &Path, matcher: &Matcher<'_>) -> (Vec<PathBuf>, usize) {
    let mut files = Vec::new();
    let pruned = Cell::new(0usize);
    let mut skipped = 0usize;

    let walker = WalkDir::new(tree_root)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| !e.file_type().is_dir() || keep_dir(matcher, e, &pruned));

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                let path = err.path().map(|p| p.display().to_string()).unwrap_or_default();
                tracing::warn!(path = %path, error = %err, "skipping unreadable entry");
                continue;
            }
        };

        if entry.file_type().is_dir() {
            continue;
        }

        // symlinks to files pack their target; links to dirs and dangling links don't
        if entry.path_is_symlink() && !entry.path().is_file() {
            tracing::warn!(path = %entry.path().display(), "skipping symlink without a file target");
            continue;
        }

        if !entry.file_type().is_file() && !entry.path_is_symlink() {
            tracing::debug!(path = %entry.path().display(), "skipping special file");
            continue;
        }

        if matcher.include_file(entry.path()) {
            files.push(entry.into_path());
        } else {
            skipped += 1;
        }
    }

    (files, skipped + pruned.get())
}

fn keep_dir(matcher: &Matcher<'_>, entry: &DirEntry, pruned: &Cell<usize>) -> bool {
    let keep = matcher.include_dir(entry.path());
    if !keep {
        pruned.set(pruned.get() + 1);
    }
    keep
}

fn archive_name(tree_root: &Path, source: &Path) -> String {
    let rel = source.strip_prefix(tree_root).unwrap_or(source);
    rel.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

fn write_entry(
    writer: &mut zip::ZipWriter<File>,
    entry: &ArchiveEntry,
) -> Result<(), PackError> {
    let read_err = |source| PackError::ReadEntry {
        path: entry.source_path.clone(),
        source,
    };

    let mut source = File::open(&entry.source_path).map_err(read_err)?;
    let meta = source.metadata().map_err(read_err)?;

    let options = FileOptions::default()
        .compression_method(zip::CompressionMethod::Deflated)
        .large_file(meta.len() >= ZIP64_THRESHOLD);

    #[cfg(unix)]
    let options = {
        use std::os::unix::fs::PermissionsExt;
        options.unix_permissions(meta.permissions().mode() & 0o777)
    };

    writer
        .start_file(entry.archive_path.as_str(), options)
        .map_err(|source| PackError::WriteEntry {
            path: entry.source_path.clone(),
            source,
        })?;
    io::copy(&mut source, writer).map_err(read_err)?;

    Ok(())
}
