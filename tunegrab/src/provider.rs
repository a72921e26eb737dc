use std::path::{Path, PathBuf};

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::identity::PostMetadata;
use crate::rank::SearchCandidate;

/// Desktop browser user-agent. Some platforms serve mobile apps or login
/// walls to unknown clients.
const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/121.0.0.0 Safari/537.36";

const ACCEPT_HEADER: &str = "Accept:text/html,application/xhtml+xml,application/xml;q=0.9,\
     image/avif,image/webp,image/apng,*/*;q=0.8";

const ACCEPT_LANGUAGE_HEADER: &str = "Accept-Language:en-US,en;q=0.9";

static POST_URL_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"^https?://(?:www\.)?instagram\.com/(?:p|reel|reels|tv)/[\w-]+/?",
        r"^https?://(?:www\.)?instagram\.com/[\w.-]+/(?:p|reel|reels|tv)/[\w-]+/?",
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});

/// Whether a piece of user input is a platform post URL (as opposed to a
/// free-text song query).
pub fn is_post_url(text: &str) -> bool {
    let trimmed = text.trim();
    POST_URL_PATTERNS.iter().any(|re| re.is_match(trimmed))
}

/// Validate that a string looks like a URL.
/// Rejects anything that isn't http:// or https://.
fn validate_url(url: &str) -> Result<()> {
    let trimmed = url.trim();
    if trimmed.starts_with("https://") || trimmed.starts_with("http://") {
        Ok(())
    } else {
        Err(Error::Download(format!(
            "invalid URL (must start with http:// or https://): {trimmed}"
        )))
    }
}

/// Narrow capability interface over the underlying extraction tool.
///
/// The acquisition pipeline only ever talks to the provider through this
/// trait, so it can be exercised against an in-memory fake without network
/// access or an installed yt-dlp.
#[async_trait]
pub trait MediaProvider: Send + Sync {
    /// Fetch post metadata without downloading anything.
    /// `Ok(None)` means the provider had nothing usable for the URL.
    async fn fetch_metadata(&self, url: &str) -> Result<Option<PostMetadata>>;

    /// Search, returning up to `limit` candidates in provider order.
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchCandidate>>;

    /// Download the post's default video stream into `dir`, named
    /// `{id}_video.{ext}`. Returns the path of the file that landed on disk.
    async fn download_video(&self, url: &str, dir: &Path, id: &str) -> Result<PathBuf>;

    /// Download the best audio stream, post-processed to mp3, into `dir` at
    /// `{stem}.mp3`.
    async fn download_audio(&self, url: &str, dir: &Path, stem: &str) -> Result<PathBuf>;
}

/// The real provider: yt-dlp driven as a subprocess.
///
/// # Security
/// - URLs are validated to start with http:// or https://
/// - Arguments are passed via `.arg()` (no shell expansion)
/// - `--no-exec` prevents yt-dlp from running post-processing commands
#[derive(Debug, Default)]
pub struct YtDlp;

impl YtDlp {
    pub fn new() -> Self {
        Self
    }

    /// Check yt-dlp is installed and runnable.
    pub async fn ensure_available(&self) -> Result<()> {
        let check = tokio::process::Command::new("yt-dlp")
            .arg("--version")
            .output()
            .await;
        if check.is_err() {
            return Err(Error::YtDlpNotFound);
        }
        Ok(())
    }

    fn base_command(&self) -> tokio::process::Command {
        let mut cmd = tokio::process::Command::new("yt-dlp");
        cmd.args([
            "--quiet",
            "--no-warnings",
            "--no-check-certificate",
            "--no-exec",
            "--user-agent",
            USER_AGENT,
            "--add-header",
            ACCEPT_HEADER,
            "--add-header",
            ACCEPT_LANGUAGE_HEADER,
        ]);
        // A cancelled attempt must not leave a detached child still writing
        // into the output directory.
        cmd.kill_on_drop(true);
        cmd
    }
}

fn truncated_stderr(stderr: &[u8]) -> String {
    // Limit error message length to avoid dumping huge stderr
    String::from_utf8_lossy(stderr).chars().take(1000).collect()
}

/// Normalize a path by resolving `.` and `..` components without touching
/// the filesystem.
fn normalize_path(path: &Path) -> PathBuf {
    use std::path::Component;
    let mut parts = Vec::new();
    for component in path.components() {
        match component {
            Component::ParentDir => {
                parts.pop();
            }
            Component::CurDir => {}
            other => parts.push(other),
        }
    }
    parts.iter().collect()
}

/// Validate that a path is inside the expected directory (prevents path
/// traversal via a hostile filename echoed back by the tool).
fn validate_path_in_dir(path: &Path, expected_dir: &Path) -> Result<()> {
    let canonical_dir = expected_dir
        .canonicalize()
        .unwrap_or_else(|_| normalize_path(expected_dir));
    let canonical_path = path
        .canonicalize()
        .unwrap_or_else(|_| normalize_path(path));

    if canonical_path.starts_with(&canonical_dir) {
        Ok(())
    } else {
        warn!(
            path = %path.display(),
            expected_dir = %expected_dir.display(),
            "downloaded file path outside expected directory"
        );
        Err(Error::Download(
            "downloaded file path is outside the expected output directory".into(),
        ))
    }
}

/// Scan `dir` for a file whose name starts with `stem` — yt-dlp may pick a
/// container other than the one named in the output template.
fn find_by_stem(dir: &Path, stem: &str) -> Option<PathBuf> {
    let entries = std::fs::read_dir(dir).ok()?;
    for entry in entries.flatten() {
        let name = entry.file_name();
        if name.to_string_lossy().starts_with(stem) {
            return Some(entry.path());
        }
    }
    None
}

fn output_template(dir: &Path, pattern: &str) -> Result<String> {
    dir.join(pattern)
        .to_str()
        .map(str::to_string)
        .ok_or_else(|| Error::Download("output directory path contains invalid UTF-8".into()))
}

#[async_trait]
impl MediaProvider for YtDlp {
    async fn fetch_metadata(&self, url: &str) -> Result<Option<PostMetadata>> {
        validate_url(url)?;
        debug!(%url, "fetching post metadata");

        let output = self
            .base_command()
            .args(["--dump-json", "--no-download"])
            .arg(url)
            .output()
            .await?;

        if !output.status.success() {
            warn!(%url, stderr = %truncated_stderr(&output.stderr), "metadata fetch failed");
            return Ok(None);
        }

        Ok(serde_json::from_slice(&output.stdout).ok())
    }

    async fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchCandidate>> {
        debug!(query, limit, "searching");

        // `--dump-json` on a search target prints one JSON object per entry.
        let output = self
            .base_command()
            .args(["--dump-json", "--no-download"])
            .arg(format!("ytsearch{limit}:{query}"))
            .output()
            .await?;

        if !output.status.success() {
            return Err(Error::Download(format!(
                "search failed: {}",
                truncated_stderr(&output.stderr)
            )));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let candidates = stdout
            .lines()
            .filter(|line| !line.trim().is_empty())
            .filter_map(|line| match serde_json::from_str::<SearchCandidate>(line) {
                Ok(candidate) => Some(candidate),
                Err(e) => {
                    debug!(error = %e, "skipping unparseable search entry");
                    None
                }
            })
            .collect();

        Ok(candidates)
    }

    async fn download_video(&self, url: &str, dir: &Path, id: &str) -> Result<PathBuf> {
        validate_url(url)?;
        info!(%url, "downloading video");

        tokio::fs::create_dir_all(dir).await?;
        let stem = format!("{id}_video");
        let template = output_template(dir, &format!("{stem}.%(ext)s"))?;

        let output = self
            .base_command()
            .args([
                "--format",
                "best",
                "--no-playlist",
                "--output",
                &template,
                "--print",
                "after_move:filepath",
            ])
            .arg(url)
            .output()
            .await?;

        if !output.status.success() {
            return Err(Error::Download(format!(
                "video download failed: {}",
                truncated_stderr(&output.stderr)
            )));
        }

        let printed = String::from_utf8_lossy(&output.stdout).trim().to_string();
        let path = if printed.is_empty() {
            // The tool may have picked a different container; adopt whatever
            // landed with our basename.
            find_by_stem(dir, &format!("{stem}."))
                .ok_or_else(|| Error::Download("no video file found after download".into()))?
        } else {
            let candidate = PathBuf::from(&printed);
            validate_path_in_dir(&candidate, dir)?;
            candidate
        };

        if !path.exists() {
            return Err(Error::Download(format!(
                "downloaded video not found at {}",
                path.display()
            )));
        }

        debug!(path = %path.display(), "video downloaded");
        Ok(path)
    }

    async fn download_audio(&self, url: &str, dir: &Path, stem: &str) -> Result<PathBuf> {
        validate_url(url)?;
        info!(%url, "downloading audio");

        tokio::fs::create_dir_all(dir).await?;
        let template = output_template(dir, &format!("{stem}.%(ext)s"))?;

        let output = self
            .base_command()
            .args([
                "--format",
                "bestaudio/best",
                "--extract-audio",
                "--audio-format",
                "mp3",
                "--audio-quality",
                "192K",
                "--no-playlist",
                "--output",
                &template,
            ])
            .arg(url)
            .output()
            .await?;

        if !output.status.success() {
            return Err(Error::Download(format!(
                "audio download failed: {}",
                truncated_stderr(&output.stderr)
            )));
        }

        let expected = dir.join(format!("{stem}.mp3"));
        if !expected.exists() {
            return Err(Error::Download(format!(
                "downloaded audio not found at {}",
                expected.display()
            )));
        }

        debug!(path = %expected.display(), "audio downloaded");
        Ok(expected)
    }
}
