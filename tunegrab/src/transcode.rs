use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::error::{Error, Result};

// Fixed target format for extracted audio.
const SAMPLE_RATE: &str = "44100";
const CHANNELS: &str = "2";
const BITRATE: &str = "192k";

/// Extract an audio-only mp3 from a video file via ffmpeg.
///
/// Success is judged by the output file existing afterwards, not by the
/// process exit code — ffmpeg sometimes reports non-fatal stream warnings
/// through a non-zero status.
pub async fn extract_audio(video: &Path, output: &Path) -> Result<PathBuf> {
    info!(video = %video.display(), output = %output.display(), "extracting audio from video");

    let result = tokio::process::Command::new("ffmpeg")
        .args(["-nostdin", "-i"])
        .arg(video)
        .args(["-vn", "-ar", SAMPLE_RATE, "-ac", CHANNELS, "-b:a", BITRATE])
        .arg(output)
        .arg("-y")
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::ExtractionTool("ffmpeg not found — install with: apt install ffmpeg".into())
            } else {
                Error::ExtractionTool(format!("failed to run ffmpeg: {e}"))
            }
        })?;

    if !output.exists() {
        let stderr = String::from_utf8_lossy(&result.stderr);
        let stderr_truncated: String = stderr.chars().take(1000).collect();
        return Err(Error::ExtractionTool(format!(
            "ffmpeg produced no output: {stderr_truncated}"
        )));
    }

    if !result.status.success() {
        warn!(status = %result.status, "ffmpeg exited non-zero but output file exists");
    }

    Ok(output.to_path_buf())
}
