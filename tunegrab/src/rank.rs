use std::cmp::Ordering;
use std::collections::HashSet;

use serde::Deserialize;
use tracing::debug;

/// One entry from a provider search.
#[derive(Debug, Clone, Deserialize)]
pub struct SearchCandidate {
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub uploader: Option<String>,
    #[serde(default)]
    pub duration: Option<f64>,
    #[serde(default, rename = "webpage_url")]
    pub web_url: Option<String>,
}

/// A candidate plus its computed score.
#[derive(Debug, Clone)]
pub struct RankedCandidate {
    pub candidate: SearchCandidate,
    pub score: f64,
}

// Duration bands, in seconds. The ideal band is a typical full song; below
// the short cutoff is almost always a clip, above the long cutoff a mix.
const IDEAL_BAND: (f64, f64) = (150.0, 360.0);
const ACCEPTABLE_BAND: (f64, f64) = (120.0, 600.0);
const SHORT_CUTOFF: f64 = 120.0;

/// Deduplicate by id (first occurrence wins), score each candidate against
/// the query, and return them in descending score order. Ties keep the
/// provider's original relative order.
pub fn rank_candidates(candidates: Vec<SearchCandidate>, query: &str) -> Vec<RankedCandidate> {
    let mut seen = HashSet::new();
    let mut ranked: Vec<RankedCandidate> = candidates
        .into_iter()
        .filter(|c| seen.insert(c.id.clone()))
        .map(|c| RankedCandidate {
            score: score_candidate(&c, query),
            candidate: c,
        })
        .collect();

    ranked.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));

    for (i, rc) in ranked.iter().take(5).enumerate() {
        debug!(
            rank = i + 1,
            title = rc.candidate.title.as_deref().unwrap_or(""),
            score = rc.score,
            duration = rc.candidate.duration.unwrap_or(0.0),
            "ranked candidate"
        );
    }

    ranked
}

/// Additive heuristic score. The constants are policy, not a contract; the
/// shape (duration bands, keyword bonuses/penalties, query overlap) is what
/// matters.
fn score_candidate(candidate: &SearchCandidate, query: &str) -> f64 {
    let title = candidate.title.as_deref().unwrap_or("").to_lowercase();
    let uploader = candidate.uploader.as_deref().unwrap_or("").to_lowercase();
    let duration = candidate.duration.unwrap_or(0.0);

    let mut score = 0.0;

    if duration >= IDEAL_BAND.0 && duration <= IDEAL_BAND.1 {
        score += 150.0;
    } else if duration >= ACCEPTABLE_BAND.0 && duration <= ACCEPTABLE_BAND.1 {
        score += 80.0;
    } else if duration < SHORT_CUTOFF {
        score -= 100.0;
    } else {
        score -= 50.0;
    }

    if ["official", "original", "full", "audio"].iter().any(|k| title.contains(k)) {
        score += 60.0;
    }
    if ["clip", "klip", "music video"].iter().any(|k| title.contains(k)) {
        score += 30.0;
    }
    // "mix" also covers "remix"
    if title.contains("mix") {
        score -= 40.0;
    }
    if title.contains("live") {
        score -= 30.0;
    }
    if duration < SHORT_CUTOFF
        && ["short", "reel", "clip"].iter().any(|k| title.contains(k))
    {
        score -= 100.0;
    }

    if ["official", "vevo", "topic", "music"].iter().any(|k| uploader.contains(k)) {
        score += 70.0;
    }

    // Fraction of query words (bias qualifiers stripped) found in the title
    // or channel name, scaled to a bounded bonus.
    let stripped = query.to_lowercase().replace("official", "").replace("audio", "");
    let words: Vec<&str> = stripped.split_whitespace().collect();
    if !words.is_empty() {
        let matched = words
            .iter()
            .filter(|w| title.contains(*w) || uploader.contains(*w))
            .count();
        score += matched as f64 / words.len() as f64 * 100.0;
    }

    score
}
