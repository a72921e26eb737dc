use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use tracing::debug;

/// Metadata the extraction tool reports for a single post.
///
/// Platforms populate these fields inconsistently; every one of them may be
/// missing, which is why identity extraction is a cascade rather than a
/// single lookup.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PostMetadata {
    pub id: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub track: Option<String>,
    pub artist: Option<String>,
    pub creator: Option<String>,
    pub uploader: Option<String>,
    pub alt_title: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub music_info: Option<MusicInfo>,
}

/// Embedded music block some platforms attach to a post. When present its
/// fields are the most reliable signal and take precedence over the
/// top-level `track`/`artist`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MusicInfo {
    pub title: Option<String>,
    pub artist: Option<String>,
}

impl PostMetadata {
    fn effective_track(&self) -> Option<&str> {
        self.music_info
            .as_ref()
            .and_then(|m| m.title.as_deref())
            .or(self.track.as_deref())
    }

    fn effective_artist(&self) -> Option<&str> {
        self.music_info
            .as_ref()
            .and_then(|m| m.artist.as_deref())
            .or(self.artist.as_deref())
    }
}

/// Captions meaning "original audio/sound" in the languages we see in the
/// wild. They carry no searchable song information and would poison ranking.
const GENERIC_PLACEHOLDERS: &[&str] = &[
    "original audio",
    "original music",
    "originalniy zvuk",
    "asl audio",
];

/// Labeled song markers in post descriptions, e.g. "Music: ..." or a line
/// prefixed with a music emoji. Checked in order; the first capture wins.
static DESCRIPTION_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(?i)(?:Music|Song|Musiqa|Trek|Nomi):\s*([^\n|]+)",
        r"🎵\s*([^\n|]+)",
        r"🎧\s*([^\n|]+)",
        r"🎤\s*([^\n|]+)",
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});

static TITLE_BOILERPLATE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)Instagram (?:video|reel|reels|post|TV).*").unwrap());

static TITLE_NOISE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"#\w+|@\w+|https?://\S+|www\.\S+").unwrap());

static UPLOADER_SEPARATORS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[._]").unwrap());

type Rule = fn(&PostMetadata) -> Option<String>;

/// High-confidence rules, in priority order. Results from these are subject
/// to the generic-placeholder filter.
const SEARCHABLE_RULES: &[Rule] = &[
    rule_track_and_artist,
    rule_track_only,
    rule_alt_title,
    rule_description,
];

/// Derive a best-guess "artist - title" search phrase from post metadata.
///
/// Rules are tried in priority order; the first one that produces a value
/// wins. A high-confidence result that turns out to be a generic "original
/// audio" caption is discarded in favor of an uploader-derived phrase, or
/// the cascade falls through to the low-confidence title/uploader rules.
pub fn extract_identity(meta: &PostMetadata) -> Option<String> {
    for rule in SEARCHABLE_RULES {
        if let Some(identity) = rule(meta) {
            if is_generic_placeholder(&identity) {
                debug!(%identity, "discarding generic placeholder identity");
                if let Some(uploader) = meta.uploader.as_deref() {
                    return Some(uploader_phrase(uploader));
                }
                break;
            }
            return Some(identity);
        }
    }

    rule_cleaned_title(meta).or_else(|| meta.uploader.as_deref().map(uploader_phrase))
}

fn is_generic_placeholder(identity: &str) -> bool {
    let lower = identity.to_lowercase();
    GENERIC_PLACEHOLDERS.iter().any(|p| lower.contains(p))
}

fn rule_track_and_artist(meta: &PostMetadata) -> Option<String> {
    match (meta.effective_artist(), meta.effective_track()) {
        (Some(artist), Some(track)) => Some(format!("{artist} - {track}")),
        _ => None,
    }
}

fn rule_track_only(meta: &PostMetadata) -> Option<String> {
    meta.effective_track().map(str::to_string)
}

fn rule_alt_title(meta: &PostMetadata) -> Option<String> {
    let alt = meta.alt_title.as_deref()?;
    Some(match meta.effective_artist() {
        Some(artist) => format!("{artist} - {alt}"),
        None => alt.to_string(),
    })
}

fn rule_description(meta: &PostMetadata) -> Option<String> {
    let description = meta.description.as_deref()?;
    for pattern in DESCRIPTION_PATTERNS.iter() {
        if let Some(captures) = pattern.captures(description) {
            let captured = captures.get(1)?.as_str().trim();
            if !captured.is_empty() {
                return Some(captured.to_string());
            }
        }
    }
    None
}

/// Strip platform boilerplate, hashtags, mentions, and URLs from the post
/// title. Only remnants longer than five characters are worth searching for.
fn rule_cleaned_title(meta: &PostMetadata) -> Option<String> {
    let title = meta.title.as_deref()?;
    let cleaned = TITLE_BOILERPLATE.replace(title, "");
    let cleaned = TITLE_NOISE.replace_all(&cleaned, "");
    let cleaned = cleaned.trim();
    if cleaned.chars().count() > 5 {
        Some(cleaned.to_string())
    } else {
        None
    }
}

/// Last-resort phrase built from the uploader handle: separators become
/// spaces and a generic suffix biases search toward their recent releases.
fn uploader_phrase(uploader: &str) -> String {
    let name = UPLOADER_SEPARATORS.replace_all(uploader, " ");
    format!("{} new track", name.trim())
}
