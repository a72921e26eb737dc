use std::path::{Path, PathBuf};

use tracing::{debug, warn};

/// Remove each of the given paths that exists. Absent entries and missing
/// files are skipped; individual removal failures are logged and swallowed
/// so one stuck file never aborts the batch.
pub fn cleanup_files<'a, I>(paths: I)
where
    I: IntoIterator<Item = Option<&'a Path>>,
{
    for path in paths.into_iter().flatten() {
        if !path.exists() {
            continue;
        }
        match std::fs::remove_file(path) {
            Ok(()) => debug!(path = %path.display(), "removed artifact"),
            Err(e) => warn!(path = %path.display(), error = %e, "failed to remove artifact"),
        }
    }
}

/// Scoped cleanup for the artifacts of one resolution attempt.
///
/// Every file written during the attempt is tracked here; if the attempt
/// errors out or is cancelled, dropping the janitor removes whatever partial
/// artifacts exist. On success the pipeline calls [`Janitor::disarm`] to
/// hand ownership of the files to the caller.
#[derive(Debug, Default)]
pub struct Janitor {
    paths: Vec<PathBuf>,
    disarmed: bool,
}

impl Janitor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a path for removal if this attempt does not complete.
    pub fn track(&mut self, path: impl Into<PathBuf>) {
        self.paths.push(path.into());
    }

    /// Release all tracked files to the caller; nothing is removed on drop.
    pub fn disarm(mut self) {
        self.disarmed = true;
    }
}

impl Drop for Janitor {
    fn drop(&mut self) {
        if !self.disarmed && !self.paths.is_empty() {
            debug!(count = self.paths.len(), "removing partial artifacts");
            cleanup_files(self.paths.iter().map(|p| Some(p.as_path())));
        }
    }
}
