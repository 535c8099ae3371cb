//! Lyrics resolution across heterogeneous sources.
//!
//! Every source implements the same capability: resolve a (title, artist)
//! pair to a canonical page URL, scrape that page to raw markdown, and
//! release whatever per-call resources it held. The cleaning step is shared
//! and provider-agnostic.

pub mod clean;
pub mod genius;
pub mod musixmatch;
pub mod scrape;

use serde::Serialize;
use tracing::{debug, warn};

use crate::error::{Error, Result};

pub use clean::clean_lyrics_markdown;
pub use genius::GeniusClient;
pub use musixmatch::MusixmatchClient;

/// Outcome of a scrape: markdown or an error description, never both.
#[derive(Debug, Clone)]
pub enum RawContent {
    Markdown(String),
    Failed(String),
}

/// Source-specific implementation of the lyrics-resolution contract.
///
/// `lyric_url` fails `NoResults` when the source has no matching track and
/// `Provider` for transport/parse failure. `scrape` never fails for a bad
/// page; it reports through `RawContent` instead. `close` is idempotent and
/// safe after a prior failure.
pub trait LyricsSource {
    fn name(&self) -> &'static str;

    async fn lyric_url(&self, title: &str, artist: &str) -> Result<String>;

    async fn scrape(&self, url: &str) -> RawContent;

    async fn close(&self) {}
}

/// Normalized lyrics result handed to the boundary layer.
#[derive(Debug, Clone, Serialize)]
pub struct LyricsResult {
    pub source: &'static str,
    pub title: String,
    pub artist: String,
    pub lyrics: String,
    pub url: String,
}

/// Resolve, scrape, and clean lyrics through one source.
///
/// The source is closed on every exit path; close failures are the source's
/// own to log and swallow.
pub async fn fetch_lyrics<S: LyricsSource>(
    source: &S,
    title: &str,
    artist: &str,
) -> Result<LyricsResult> {
    let out = fetch_inner(source, title, artist).await;
    source.close().await;
    out
}

async fn fetch_inner<S: LyricsSource>(
    source: &S,
    title: &str,
    artist: &str,
) -> Result<LyricsResult> {
    let url = source.lyric_url(title, artist).await?;
    debug!(source = source.name(), %url, "resolved lyric url");

    match source.scrape(&url).await {
        RawContent::Markdown(md) => {
            let lyrics = clean_lyrics_markdown(&md);
            if lyrics.is_empty() {
                return Err(Error::no_results(format!(
                    "{}: page at {url} had no lyric content after cleaning",
                    source.name()
                )));
            }
            Ok(LyricsResult {
                source: source.name(),
                title: title.to_string(),
                artist: artist.to_string(),
                lyrics,
                url,
            })
        }
        RawContent::Failed(e) => {
            warn!(source = source.name(), %url, error = %e, "scrape failed");
            Err(Error::provider(format!(
                "{}: scraping {url} failed: {e}",
                source.name()
            )))
        }
    }
}
