use std::future::Future;
use std::path::PathBuf;
use std::time::Duration;

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, info, warn};

use crate::cleanup::{cleanup_files, Janitor};
use crate::config::FetchOptions;
use crate::error::{Error, Result};
use crate::identity::extract_identity;
use crate::provider::MediaProvider;
use crate::query::query_variants;
use crate::rank::{rank_candidates, SearchCandidate};
use crate::transcode;

/// One on-disk artifact produced by a post resolution.
#[derive(Debug)]
pub struct PostArtifact {
    pub path: PathBuf,
    pub size_bytes: u64,
}

impl PostArtifact {
    fn from_path(path: PathBuf) -> Self {
        let size_bytes = std::fs::metadata(&path).map(|m| m.len()).unwrap_or(0);
        Self { path, size_bytes }
    }
}

/// Outcome of resolving a platform post.
///
/// Media is the required output; the identity is best-effort. All three
/// fields are absent only when both video and audio acquisition failed
/// outright.
#[derive(Debug)]
pub struct ResolvedPost {
    pub video: Option<PostArtifact>,
    pub audio: Option<PostArtifact>,
    pub identity: Option<String>,
}

impl ResolvedPost {
    /// Whether any media artifact was acquired.
    pub fn has_media(&self) -> bool {
        self.video.is_some() || self.audio.is_some()
    }
}

/// One successfully acquired audio artifact.
#[derive(Debug)]
pub struct AcquiredTrack {
    pub path: PathBuf,
    pub size_bytes: u64,
    pub title: Option<String>,
    pub artist: Option<String>,
}

/// Quality/source tags stripped from derived titles and artists.
static JUNK_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(?i)\(official.*?\)",
        r"(?i)\[official.*?\]",
        r"(?i)audio",
        r"(?i)video",
        r"(?i)clip",
        r"(?i)klip",
        r"(?i)full",
        r"(?i)original",
        r"\d{4}",
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});

/// Wall-clock budget for one attempt. Provider and transcoder calls are
/// wrapped in a timeout sized to the remaining budget.
struct Deadline {
    at: Option<tokio::time::Instant>,
}

impl Deadline {
    fn new(budget: Option<Duration>) -> Self {
        Self {
            at: budget.map(|d| tokio::time::Instant::now() + d),
        }
    }

    async fn run<T>(&self, fut: impl Future<Output = Result<T>>) -> Result<T> {
        match self.at {
            None => fut.await,
            Some(at) => {
                let now = tokio::time::Instant::now();
                if at <= now {
                    return Err(Error::DeadlineExceeded);
                }
                match tokio::time::timeout(at - now, fut).await {
                    Ok(result) => result,
                    Err(_) => Err(Error::DeadlineExceeded),
                }
            }
        }
    }
}

/// Resolve a platform post URL into a video artifact, an audio artifact, and
/// a best-guess song identity.
///
/// Fails only when the provider has no metadata for the URL or the attempt
/// deadline expires; individual stream failures degrade to absent fields.
/// An audio artifact is guaranteed whenever a video artifact exists — if the
/// direct audio stream fails, audio is extracted from the video file.
pub async fn resolve_post<P: MediaProvider>(
    provider: &P,
    url: &str,
    options: &FetchOptions,
) -> Result<ResolvedPost> {
    let deadline = Deadline::new(options.deadline);
    let out_dir = options.resolve_output_dir();
    tokio::fs::create_dir_all(&out_dir).await?;

    let meta = deadline
        .run(provider.fetch_metadata(url))
        .await?
        .ok_or_else(|| Error::MetadataUnavailable {
            url: url.to_string(),
        })?;

    let identity = extract_identity(&meta);
    let post_id = meta.id.clone().unwrap_or_else(|| "post".to_string());
    info!(%post_id, identity = identity.as_deref().unwrap_or(""), "post analyzed");

    let mut janitor = Janitor::new();

    let video = match deadline.run(provider.download_video(url, &out_dir, &post_id)).await {
        Ok(path) => {
            janitor.track(&path);
            Some(PostArtifact::from_path(path))
        }
        Err(e @ Error::DeadlineExceeded) => return Err(e),
        Err(e) => {
            warn!(error = %e, "video download failed");
            None
        }
    };

    let audio_stem = format!("{post_id}_audio");
    let mut audio = match deadline
        .run(provider.download_audio(url, &out_dir, &audio_stem))
        .await
    {
        Ok(path) => {
            janitor.track(&path);
            Some(PostArtifact::from_path(path))
        }
        Err(e @ Error::DeadlineExceeded) => return Err(e),
        Err(e) => {
            warn!(error = %e, "direct audio download failed");
            None
        }
    };

    // Direct audio extraction from social platforms is unreliable; whenever a
    // video exists we can still produce audio from it.
    if audio.is_none() {
        if let Some(video_artifact) = &video {
            let target = out_dir.join(format!("{post_id}_extracted.mp3"));
            match deadline
                .run(transcode::extract_audio(&video_artifact.path, &target))
                .await
            {
                Ok(path) => {
                    janitor.track(&path);
                    audio = Some(PostArtifact::from_path(path));
                }
                Err(e @ Error::DeadlineExceeded) => return Err(e),
                Err(e) => warn!(error = %e, "fallback audio extraction failed"),
            }
        }
    }

    janitor.disarm();
    Ok(ResolvedPost {
        video,
        audio,
        identity,
    })
}

/// Search for a song and download the single best-matching audio artifact.
/// `Ok(None)` is the definitive "not found" outcome.
pub async fn find_track<P: MediaProvider>(
    provider: &P,
    query: &str,
    options: &FetchOptions,
) -> Result<Option<AcquiredTrack>> {
    Ok(find_tracks(provider, query, 1, options).await?.into_iter().next())
}

/// Search for a song and download up to `limit` distinct audio artifacts in
/// ranked order. Only successful acquisitions count toward the limit; failed
/// candidates consume attempt budget and nothing else. An empty result after
/// exhausting all variants and attempts is a valid outcome, not an error.
pub async fn find_tracks<P: MediaProvider>(
    provider: &P,
    query: &str,
    limit: usize,
    options: &FetchOptions,
) -> Result<Vec<AcquiredTrack>> {
    let deadline = Deadline::new(options.deadline);
    let out_dir = options.resolve_output_dir();
    tokio::fs::create_dir_all(&out_dir).await?;

    let mut candidates: Vec<SearchCandidate> = Vec::new();
    for variant in query_variants(query) {
        match deadline
            .run(provider.search(&variant, options.per_variant_limit))
            .await
        {
            Ok(mut found) => {
                debug!(%variant, count = found.len(), "search variant returned");
                candidates.append(&mut found);
            }
            Err(e @ Error::DeadlineExceeded) => return Err(e),
            Err(e) => warn!(%variant, error = %e, "search variant failed"),
        }
    }

    if candidates.is_empty() {
        info!(query, "no search candidates found");
        return Ok(Vec::new());
    }

    let ranked = rank_candidates(candidates, query);

    let mut janitor = Janitor::new();
    let mut accepted = Vec::new();

    for ranked_candidate in ranked.iter().take(options.max_attempts) {
        if accepted.len() >= limit {
            break;
        }
        let candidate = &ranked_candidate.candidate;
        let url = candidate
            .web_url
            .clone()
            .unwrap_or_else(|| format!("https://www.youtube.com/watch?v={}", candidate.id));
        let stem = format!("{}_yt", candidate.id);

        // Track the expected path before the call so a partially written
        // file is removed if the attempt is cancelled.
        janitor.track(out_dir.join(format!("{stem}.mp3")));

        let path = match deadline
            .run(provider.download_audio(&url, &out_dir, &stem))
            .await
        {
            Ok(path) => path,
            Err(e @ Error::DeadlineExceeded) => return Err(e),
            Err(e) => {
                warn!(id = %candidate.id, error = %e, "candidate download failed, trying next");
                continue;
            }
        };

        let size_bytes = std::fs::metadata(&path).map(|m| m.len()).unwrap_or(0);
        if size_bytes <= options.min_audio_bytes {
            warn!(id = %candidate.id, size_bytes, "rejecting suspiciously small file");
            cleanup_files([Some(path.as_path())]);
            continue;
        }

        let (title, artist) = derive_title_artist(candidate);
        info!(
            id = %candidate.id,
            title = title.as_deref().unwrap_or(""),
            artist = artist.as_deref().unwrap_or(""),
            size_bytes,
            "track acquired"
        );
        accepted.push(AcquiredTrack {
            path,
            size_bytes,
            title,
            artist,
        });
    }

    janitor.disarm();
    Ok(accepted)
}

/// Derive (title, artist) from a candidate. The title is split on the first
/// " - " into artist/title; otherwise the uploader name stands in as the
/// artist. Junk tokens are stripped from both afterwards.
fn derive_title_artist(candidate: &SearchCandidate) -> (Option<String>, Option<String>) {
    let raw_title = candidate.title.clone().unwrap_or_default();
    let uploader = candidate.uploader.clone().unwrap_or_default();

    let mut artist = uploader
        .replace(" - Topic", "")
        .replace("Official", "")
        .replace("VEVO", "")
        .trim()
        .to_string();
    let mut title = raw_title.clone();

    if let Some((left, right)) = raw_title.split_once(" - ") {
        artist = left.trim().to_string();
        title = right.trim().to_string();
    }

    for pattern in JUNK_PATTERNS.iter() {
        title = pattern.replace_all(&title, "").trim().to_string();
        artist = pattern.replace_all(&artist, "").trim().to_string();
    }

    (non_empty(title), non_empty(artist))
}

fn non_empty(s: String) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s.trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::PostMetadata;
    use async_trait::async_trait;
    use std::collections::HashSet;
    use std::path::Path;

    struct FakeProvider {
        metadata: Option<PostMetadata>,
        candidates: Vec<SearchCandidate>,
        failing_ids: HashSet<String>,
        tiny_ids: HashSet<String>,
        video_ok: bool,
        audio_ok: bool,
    }

    impl FakeProvider {
        fn new() -> Self {
            Self {
                metadata: None,
                candidates: Vec::new(),
                failing_ids: HashSet::new(),
                tiny_ids: HashSet::new(),
                video_ok: true,
                audio_ok: true,
            }
        }
    }

    #[async_trait]
    impl MediaProvider for FakeProvider {
        async fn fetch_metadata(&self, _url: &str) -> crate::Result<Option<PostMetadata>> {
            Ok(self.metadata.clone())
        }

        async fn search(&self, _query: &str, limit: usize) -> crate::Result<Vec<SearchCandidate>> {
            Ok(self.candidates.iter().take(limit).cloned().collect())
        }

        async fn download_video(
            &self,
            _url: &str,
            dir: &Path,
            id: &str,
        ) -> crate::Result<PathBuf> {
            if !self.video_ok {
                return Err(Error::Download("video stream unavailable".into()));
            }
            std::fs::create_dir_all(dir)?;
            let path = dir.join(format!("{id}_video.mp4"));
            std::fs::write(&path, vec![0u8; 4096])?;
            Ok(path)
        }

        async fn download_audio(
            &self,
            _url: &str,
            dir: &Path,
            stem: &str,
        ) -> crate::Result<PathBuf> {
            if !self.audio_ok {
                return Err(Error::Download("audio stream unavailable".into()));
            }
            let id = stem.trim_end_matches("_yt").trim_end_matches("_audio");
            if self.failing_ids.contains(id) {
                return Err(Error::Download(format!("download failed for {id}")));
            }
            std::fs::create_dir_all(dir)?;
            let path = dir.join(format!("{stem}.mp3"));
            let size = if self.tiny_ids.contains(id) { 10 } else { 4096 };
            std::fs::write(&path, vec![0u8; size])?;
            Ok(path)
        }
    }

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("tunegrab_pipeline_{name}_{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        dir
    }

    fn options(dir: PathBuf) -> FetchOptions {
        FetchOptions::new().output_dir(dir)
    }

    fn candidate(id: &str, title: &str, uploader: &str, duration: f64) -> SearchCandidate {
        SearchCandidate {
            id: id.into(),
            title: Some(title.into()),
            uploader: Some(uploader.into()),
            duration: Some(duration),
            web_url: None,
        }
    }

    #[tokio::test]
    async fn test_post_resolution_yields_media_and_identity() {
        let dir = scratch_dir("post_ok");
        let mut provider = FakeProvider::new();
        provider.metadata = Some(PostMetadata {
            id: Some("abc".into()),
            track: Some("Gulyuzim".into()),
            artist: Some("Janob Rasul".into()),
            ..PostMetadata::default()
        });

        let resolved = resolve_post(&provider, "https://instagram.com/reel/abc/", &options(dir))
            .await
            .unwrap();

        assert_eq!(resolved.identity.as_deref(), Some("Janob Rasul - Gulyuzim"));
        assert!(resolved.has_media());
        let video = resolved.video.unwrap();
        let audio = resolved.audio.unwrap();
        assert!(video.path.exists(), "video artifact handed to caller must exist");
        assert!(audio.path.exists(), "audio artifact handed to caller must exist");
        assert_eq!(video.size_bytes, 4096, "reported size must match the file on disk");
        assert_eq!(audio.size_bytes, 4096, "reported size must match the file on disk");

        cleanup_files([Some(video.path.as_path()), Some(audio.path.as_path())]);
    }

    #[tokio::test]
    async fn test_post_resolution_metadata_unavailable() {
        let dir = scratch_dir("post_no_meta");
        let provider = FakeProvider::new();

        let result = resolve_post(&provider, "https://instagram.com/reel/abc/", &options(dir)).await;
        assert!(matches!(result, Err(Error::MetadataUnavailable { .. })));
    }

    #[tokio::test]
    async fn test_post_resolution_all_streams_failed_is_not_an_error() {
        let dir = scratch_dir("post_all_fail");
        let mut provider = FakeProvider::new();
        provider.metadata = Some(PostMetadata {
            id: Some("abc".into()),
            uploader: Some("someone".into()),
            ..PostMetadata::default()
        });
        provider.video_ok = false;
        provider.audio_ok = false;

        let resolved = resolve_post(&provider, "https://instagram.com/reel/abc/", &options(dir))
            .await
            .unwrap();

        assert!(!resolved.has_media());
        assert!(resolved.identity.is_some());
    }

    #[tokio::test]
    async fn test_find_track_accepts_best_candidate() {
        let dir = scratch_dir("find_one");
        let mut provider = FakeProvider::new();
        provider.candidates = vec![
            candidate("clip", "Song short clip", "random", 30.0),
            candidate("good", "Artist - Song (Official Audio)", "Artist - Topic", 210.0),
        ];

        let track = find_track(&provider, "Song", &options(dir))
            .await
            .unwrap()
            .expect("a track should be acquired");

        assert!(track.path.to_string_lossy().contains("good_yt"));
        assert_eq!(track.title.as_deref(), Some("Song"));
        assert_eq!(track.artist.as_deref(), Some("Artist"));
        assert!(track.size_bytes > 1000);

        cleanup_files([Some(track.path.as_path())]);
    }

    #[tokio::test]
    async fn test_failed_candidate_falls_through_to_next() {
        let dir = scratch_dir("fallthrough");
        let mut provider = FakeProvider::new();
        provider.candidates = vec![
            candidate("best", "Song (Official Audio)", "Artist - Topic", 210.0),
            candidate("second", "Song (Audio)", "Artist", 220.0),
        ];
        provider.failing_ids.insert("best".into());

        let track = find_track(&provider, "Song", &options(dir))
            .await
            .unwrap()
            .expect("second candidate should be acquired");

        assert!(track.path.to_string_lossy().contains("second_yt"));
        cleanup_files([Some(track.path.as_path())]);
    }

    #[tokio::test]
    async fn test_tiny_file_rejected_and_next_accepted() {
        let dir = scratch_dir("tiny");
        let mut provider = FakeProvider::new();
        provider.candidates = vec![
            candidate("best", "Song (Official Audio)", "Artist - Topic", 210.0),
            candidate("second", "Song (Audio)", "Artist", 220.0),
        ];
        provider.tiny_ids.insert("best".into());

        let track = find_track(&provider, "Song", &options(dir.clone()))
            .await
            .unwrap()
            .expect("second candidate should be acquired");

        assert!(track.path.to_string_lossy().contains("second_yt"));
        assert!(
            !dir.join("best_yt.mp3").exists(),
            "rejected tiny file must be removed"
        );
        cleanup_files([Some(track.path.as_path())]);
    }

    #[tokio::test]
    async fn test_batch_returns_only_available_successes() {
        let dir = scratch_dir("batch_short");
        let mut provider = FakeProvider::new();
        provider.candidates = vec![
            candidate("one", "A - Song One", "A", 210.0),
            candidate("two", "B - Song Two", "B", 220.0),
        ];

        let tracks = find_tracks(&provider, "Song", 3, &options(dir)).await.unwrap();

        assert_eq!(tracks.len(), 2, "limit 3 with 2 available yields exactly 2");
        for track in &tracks {
            cleanup_files([Some(track.path.as_path())]);
        }
    }

    #[tokio::test]
    async fn test_batch_limit_counts_only_successes() {
        let dir = scratch_dir("batch_limit");
        let mut provider = FakeProvider::new();
        provider.candidates = vec![
            candidate("fail1", "A - One (Official Audio)", "A - Topic", 210.0),
            candidate("ok1", "B - Two (Official Audio)", "B - Topic", 215.0),
            candidate("ok2", "C - Three (Official Audio)", "C - Topic", 220.0),
            candidate("ok3", "D - Four (Official Audio)", "D - Topic", 225.0),
        ];
        provider.failing_ids.insert("fail1".into());

        let tracks = find_tracks(&provider, "Song", 3, &options(dir)).await.unwrap();

        assert_eq!(tracks.len(), 3, "failed downloads must not consume result slots");
        for track in &tracks {
            cleanup_files([Some(track.path.as_path())]);
        }
    }

    #[tokio::test]
    async fn test_empty_candidate_set_is_ok_none() {
        let dir = scratch_dir("empty");
        let provider = FakeProvider::new();

        let track = find_track(&provider, "does not exist", &options(dir)).await.unwrap();
        assert!(track.is_none());
    }

    #[tokio::test]
    async fn test_expired_deadline_aborts_attempt() {
        let dir = scratch_dir("deadline");
        let mut provider = FakeProvider::new();
        provider.candidates = vec![candidate("good", "Song", "Artist", 210.0)];

        let opts = options(dir).deadline(Duration::ZERO);
        let result = find_tracks(&provider, "Song", 1, &opts).await;
        assert!(matches!(result, Err(Error::DeadlineExceeded)));
    }

    #[test]
    fn test_derive_title_artist_split() {
        let c = candidate("x", "Janob Rasul - Gulyuzim (Official Audio)", "whatever", 210.0);
        let (title, artist) = derive_title_artist(&c);
        assert_eq!(title.as_deref(), Some("Gulyuzim"));
        assert_eq!(artist.as_deref(), Some("Janob Rasul"));
    }

    #[test]
    fn test_derive_title_artist_uploader_fallback() {
        let c = candidate("x", "Gulyuzim", "JanobRasulVEVO", 210.0);
        let (title, artist) = derive_title_artist(&c);
        assert_eq!(title.as_deref(), Some("Gulyuzim"));
        assert_eq!(artist.as_deref(), Some("JanobRasul"));
    }

    #[test]
    fn test_derive_title_artist_strips_junk_tokens() {
        let c = candidate("x", "Artist - Song [Official Video] 2019", "Artist - Topic", 210.0);
        let (title, artist) = derive_title_artist(&c);
        assert_eq!(title.as_deref(), Some("Song"));
        assert_eq!(artist.as_deref(), Some("Artist"));
    }
}
