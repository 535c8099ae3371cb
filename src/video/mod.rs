//! Duration-tolerant video candidate search.
//!
//! Two interchangeable search paths exist: the platform's official API and
//! a rendered-search-page scrape. Both yield the same candidate shape and
//! go through the same filter/rank step: keep results within the tolerance
//! window around the target duration, stable-sort by closeness, cap at 5.

pub mod api;
pub mod scrape;

use serde::Serialize;

use crate::error::Result;

pub use api::YoutubeApiSearch;
pub use scrape::YoutubeScrapeSearch;

/// Tolerance window (± seconds) for accepting a duration match.
pub const DURATION_TOLERANCE_SECS: u32 = 5;
/// Raw results requested from the source before filtering.
pub const RAW_RESULT_LIMIT: usize = 25;
/// Ranked candidates returned to the caller.
pub const MAX_CANDIDATES: usize = 5;

/// One plausible video match, ranked before use.
#[derive(Debug, Clone, Serialize)]
pub struct VideoCandidate {
    #[serde(rename = "videoId")]
    pub video_id: String,
    pub title: String,
    #[serde(rename = "durationSec")]
    pub duration_sec: u32,
    pub url: String,
    pub category: String,
}

/// Source-specific implementation of the candidate-search contract.
///
/// Fails `NoResults` when nothing lands inside the tolerance window and
/// `Provider` on transport/parse failure.
pub trait VideoSearch {
    async fn search(
        &self,
        title: &str,
        artist: &str,
        target_duration_sec: u32,
    ) -> Result<Vec<VideoCandidate>>;
}

/// Filter to the tolerance window, rank by closeness, truncate.
///
/// The sort is stable, so ties keep their original discovery order.
pub fn filter_and_rank(candidates: Vec<VideoCandidate>, target_sec: u32) -> Vec<VideoCandidate> {
    let mut kept: Vec<VideoCandidate> = candidates
        .into_iter()
        .filter(|c| c.duration_sec.abs_diff(target_sec) <= DURATION_TOLERANCE_SECS)
        .collect();
    kept.sort_by_key(|c| c.duration_sec.abs_diff(target_sec));
    kept.truncate(MAX_CANDIDATES);
    kept
}

/// Parse duration text like "3:45" or "1:23:45" into whole seconds.
///
/// Malformed text parses to 0; entries with no duration text at all (live
/// streams) are the ones callers drop before filtering.
pub fn parse_duration_text(text: &str) -> u32 {
    let parts: Vec<&str> = text.split(':').collect();
    match parts.len() {
        2 => {
            let (Ok(mins), Ok(secs)) = (parts[0].parse::<u32>(), parts[1].parse::<u32>()) else {
                return 0;
            };
            mins * 60 + secs
        }
        3 => {
            let (Ok(hours), Ok(mins), Ok(secs)) = (
                parts[0].parse::<u32>(),
                parts[1].parse::<u32>(),
                parts[2].parse::<u32>(),
            ) else {
                return 0;
            };
            hours * 3600 + mins * 60 + secs
        }
        _ => 0,
    }
}

/// Parse an ISO-8601 duration like "PT3M45S" into whole seconds.
pub fn parse_iso8601_duration(iso: &str) -> Option<u32> {
    let rest = iso.strip_prefix("PT").or_else(|| iso.strip_prefix("P"))?;
    let mut total = 0u32;
    let mut num = String::new();
    for c in rest.chars() {
        if c.is_ascii_digit() {
            num.push(c);
            continue;
        }
        let value: u32 = num.parse().ok()?;
        num.clear();
        total = total.checked_add(match c {
            'H' => value.checked_mul(3600)?,
            'M' => value.checked_mul(60)?,
            'S' => value,
            _ => return None,
        })?;
    }
    if !num.is_empty() {
        return None;
    }
    Some(total)
}
