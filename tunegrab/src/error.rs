/// All errors that can occur in tunegrab.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("no metadata available for post: {url}")]
    MetadataUnavailable { url: String },

    #[error("download error: {0}")]
    Download(String),

    #[error("audio extraction failed: {0}")]
    ExtractionTool(String),

    #[error("yt-dlp not found — install with: pip install yt-dlp")]
    YtDlpNotFound,

    #[error("resolution attempt exceeded its deadline")]
    DeadlineExceeded,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
