pub mod cleanup;
pub mod config;
pub mod error;
pub mod identity;
pub mod pipeline;
pub mod provider;
pub mod query;
pub mod rank;
pub mod transcode;

pub use cleanup::{cleanup_files, Janitor};
pub use config::FetchOptions;
pub use error::{Error, Result};
pub use identity::{extract_identity, MusicInfo, PostMetadata};
pub use pipeline::{AcquiredTrack, PostArtifact, ResolvedPost};
pub use provider::{is_post_url, MediaProvider, YtDlp};
pub use query::query_variants;
pub use rank::{rank_candidates, RankedCandidate, SearchCandidate};

/// Resolve a platform post URL with default options.
pub async fn resolve_post(url: &str) -> Result<ResolvedPost> {
    resolve_post_with_options(url, &FetchOptions::default()).await
}

/// Resolve a platform post URL with custom options.
pub async fn resolve_post_with_options(url: &str, options: &FetchOptions) -> Result<ResolvedPost> {
    let provider = YtDlp::new();
    provider.ensure_available().await?;
    pipeline::resolve_post(&provider, url, options).await
}

/// Search for a song by free text and download the best match as audio.
/// `Ok(None)` means nothing usable was found — a valid outcome, not an error.
pub async fn find_track(query: &str) -> Result<Option<AcquiredTrack>> {
    find_track_with_options(query, &FetchOptions::default()).await
}

/// Search for a song with custom options.
pub async fn find_track_with_options(
    query: &str,
    options: &FetchOptions,
) -> Result<Option<AcquiredTrack>> {
    let provider = YtDlp::new();
    provider.ensure_available().await?;
    pipeline::find_track(&provider, query, options).await
}

/// Search for a song and download up to `limit` distinct matches in ranked
/// order, with default options.
pub async fn find_tracks(query: &str, limit: usize) -> Result<Vec<AcquiredTrack>> {
    find_tracks_with_options(query, limit, &FetchOptions::default()).await
}

/// Batch search-download with custom options.
pub async fn find_tracks_with_options(
    query: &str,
    limit: usize,
    options: &FetchOptions,
) -> Result<Vec<AcquiredTrack>> {
    let provider = YtDlp::new();
    provider.ensure_available().await?;
    pipeline::find_tracks(&provider, query, limit, options).await
}
