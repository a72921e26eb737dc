use std::path::PathBuf;
use std::time::Duration;

/// Options for one resolution attempt.
pub struct FetchOptions {
    /// Directory artifacts are written to. Defaults to a `tunegrab`
    /// directory under the system temp dir.
    pub output_dir: Option<PathBuf>,
    /// Search results requested per query variant.
    pub per_variant_limit: usize,
    /// How many ranked candidates to try downloading before giving up.
    pub max_attempts: usize,
    /// Files at or below this size are treated as corrupt and rejected.
    pub min_audio_bytes: u64,
    /// Optional wall-clock budget for the whole attempt. On expiry the
    /// pipeline aborts, removes partial artifacts, and returns
    /// [`crate::Error::DeadlineExceeded`].
    pub deadline: Option<Duration>,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            output_dir: None,
            per_variant_limit: 5,
            max_attempts: 10,
            min_audio_bytes: 1000,
            deadline: None,
        }
    }
}

impl FetchOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn output_dir(mut self, dir: PathBuf) -> Self {
        self.output_dir = Some(dir);
        self
    }

    pub fn per_variant_limit(mut self, limit: usize) -> Self {
        self.per_variant_limit = limit;
        self
    }

    pub fn max_attempts(mut self, attempts: usize) -> Self {
        self.max_attempts = attempts;
        self
    }

    pub fn min_audio_bytes(mut self, bytes: u64) -> Self {
        self.min_audio_bytes = bytes;
        self
    }

    pub fn deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Resolve the output directory, defaulting to `$TMPDIR/tunegrab`.
    pub fn resolve_output_dir(&self) -> PathBuf {
        self.output_dir
            .clone()
            .unwrap_or_else(|| std::env::temp_dir().join("tunegrab"))
    }
}
