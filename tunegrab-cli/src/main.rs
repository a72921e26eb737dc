use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use tunegrab::{is_post_url, FetchOptions};

#[derive(Parser)]
#[command(name = "tunegrab", about = "Download a song from a post URL or free-text search")]
struct Cli {
    /// Post URL or free-text song query.
    input: String,

    /// Directory for downloaded artifacts.
    #[arg(short, long, default_value = "downloads")]
    output: PathBuf,

    /// Number of tracks to fetch in search mode.
    #[arg(short, long, default_value = "1")]
    limit: usize,

    /// Abort the attempt after this many seconds.
    #[arg(long)]
    timeout: Option<u64>,
}

fn format_size(bytes: u64) -> String {
    format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("tunegrab=info".parse().unwrap()),
        )
        .with_writer(std::io::stderr)
        .init();

    let mut options = FetchOptions::new().output_dir(cli.output);
    if let Some(secs) = cli.timeout {
        options = options.deadline(Duration::from_secs(secs));
    }

    if is_post_url(&cli.input) {
        match tunegrab::resolve_post_with_options(&cli.input, &options).await {
            Ok(resolved) => {
                if !resolved.has_media() {
                    eprintln!("Could not download anything from that post.");
                    std::process::exit(1);
                }
                if let Some(identity) = &resolved.identity {
                    println!("Song: {identity}");
                }
                for (label, artifact) in [("Video", &resolved.video), ("Audio", &resolved.audio)] {
                    if let Some(artifact) = artifact {
                        println!(
                            "{label}: {} ({})",
                            artifact.path.display(),
                            format_size(artifact.size_bytes)
                        );
                    }
                }
            }
            Err(e) => {
                eprintln!("Error: {e}");
                std::process::exit(1);
            }
        }
    } else {
        match tunegrab::find_tracks_with_options(&cli.input, cli.limit, &options).await {
            Ok(tracks) if tracks.is_empty() => {
                println!("No matching track found for '{}'.", cli.input);
            }
            Ok(tracks) => {
                for (i, track) in tracks.iter().enumerate() {
                    println!(
                        "{}. {} - {} ({}, {})",
                        i + 1,
                        track.artist.as_deref().unwrap_or("Unknown"),
                        track.title.as_deref().unwrap_or("Unknown"),
                        track.path.display(),
                        format_size(track.size_bytes),
                    );
                }
            }
            Err(e) => {
                eprintln!("Error: {e}");
                std::process::exit(1);
            }
        }
    }
}
