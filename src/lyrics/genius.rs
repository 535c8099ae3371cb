//! Genius lyrics source.
//!
//! Track resolution goes through the official API (bearer token); the lyric
//! page itself has no API so it is scraped, restricted to the page's
//! lyrics-container region.

use serde_json::Value;
use tracing::debug;

use crate::error::{Error, Result};
use crate::lyrics::scrape::{self, LyricsRegion};
use crate::lyrics::{LyricsSource, RawContent};

const LYRICS_REGION: LyricsRegion = LyricsRegion {
    container: "div[data-lyrics-container='true']",
    exclude: Some("div[data-exclude-from-selection='true']"),
    exclude_link_containers: false,
};

/// Genius API + page-scrape client.
#[derive(Debug, Clone)]
pub struct GeniusClient {
    api: reqwest::Client,
    pages: reqwest::Client,
    base_url: String,
}

impl GeniusClient {
    const DEFAULT_BASE_URL: &'static str = "https://api.genius.com";
    const USER_AGENT: &'static str = "songscout/0.1.0 (+https://github.com/songscout)";
    const PAGE_USER_AGENT: &'static str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) \
         AppleWebKit/537.36 (KHTML, like Gecko) Chrome/121.0.0.0 Safari/537.36";

    pub fn new(access_token: &str) -> Result<Self> {
        if access_token.is_empty() {
            return Err(Error::provider("genius access token must be provided"));
        }

        let mut headers = reqwest::header::HeaderMap::new();
        let mut auth = reqwest::header::HeaderValue::from_str(&format!("Bearer {access_token}"))
            .map_err(|e| Error::provider(format!("invalid genius token: {e}")))?;
        auth.set_sensitive(true);
        headers.insert(reqwest::header::AUTHORIZATION, auth);
        headers.insert(
            reqwest::header::ACCEPT,
            reqwest::header::HeaderValue::from_static("application/json"),
        );

        let api = reqwest::Client::builder()
            .user_agent(Self::USER_AGENT)
            .default_headers(headers)
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .map_err(|e| Error::provider(format!("build genius api client: {e}")))?;

        let pages = reqwest::Client::builder()
            .user_agent(Self::PAGE_USER_AGENT)
            .timeout(std::time::Duration::from_secs(15))
            .build()
            .map_err(|e| Error::provider(format!("build genius page client: {e}")))?;

        Ok(Self {
            api,
            pages,
            base_url: Self::DEFAULT_BASE_URL.to_string(),
        })
    }

    /// GET an API path and unwrap the Genius envelope.
    ///
    /// Genius sometimes answers HTTP 200 with an error status embedded in
    /// `meta`; that and an empty envelope are provider failures.
    async fn get_json(&self, path: &str, params: &[(&str, &str)]) -> Result<Value> {
        let url = format!("{}{path}", self.base_url);
        let resp = self.api.get(&url).query(params).send().await?;
        let resp = resp
            .error_for_status()
            .map_err(|e| Error::provider(format!("genius http status: {e}")))?;
        let data: Value = resp.json().await?;

        if let Some(status) = data.pointer("/meta/status").and_then(Value::as_i64)
            && status >= 400
        {
            return Err(Error::provider(format!(
                "genius api error in response meta: {}",
                data.pointer("/meta").unwrap_or(&Value::Null)
            )));
        }

        let payload = data.get("response").cloned().unwrap_or(data);
        if payload.is_null()
            || payload.as_object().is_some_and(|o| o.is_empty())
        {
            return Err(Error::provider(format!("empty response body for {url}")));
        }
        Ok(payload)
    }

    async fn search(&self, title: &str, artist: &str) -> Result<Value> {
        if title.is_empty() || artist.is_empty() {
            return Err(Error::provider("title and artist must be provided"));
        }
        let q = format!("{title}-{artist}");
        self.get_json("/search", &[("q", &q), ("per_page", "1"), ("page", "1")])
            .await
    }

    /// Pick the top hit's track id, accepting only "song" typed hits.
    fn first_track_id(search_result: &Value) -> Result<i64> {
        let hits = search_result
            .pointer("/hits")
            .and_then(Value::as_array)
            .filter(|h| !h.is_empty())
            .ok_or_else(|| Error::no_results("genius: no results found"))?;

        let first = &hits[0];
        if first.get("type").and_then(Value::as_str) != Some("song") {
            return Err(Error::no_results("genius: top result is not a song"));
        }
        first
            .pointer("/result/id")
            .and_then(Value::as_i64)
            .ok_or_else(|| Error::no_results("genius: no track id in top result"))
    }

    async fn url_for_track(&self, id: i64) -> Result<String> {
        let payload = self.get_json(&format!("/songs/{id}"), &[]).await?;
        let song = payload
            .get("song")
            .filter(|s| !s.is_null())
            .ok_or_else(|| Error::provider("genius: song payload missing in response"))?;
        song.get("url")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| Error::no_results("genius: no url found for track"))
    }
}

impl LyricsSource for GeniusClient {
    fn name(&self) -> &'static str {
        "genius"
    }

    async fn lyric_url(&self, title: &str, artist: &str) -> Result<String> {
        let res = self.search(title, artist).await?;
        let track_id = Self::first_track_id(&res)?;
        self.url_for_track(track_id).await
    }

    async fn scrape(&self, url: &str) -> RawContent {
        debug!(url, "scraping genius page");
        let html = match self.pages.get(url).send().await {
            Ok(resp) => match resp.error_for_status() {
                Ok(resp) => match resp.text().await {
                    Ok(html) => html,
                    Err(e) => return RawContent::Failed(format!("read page body: {e}")),
                },
                Err(e) => return RawContent::Failed(format!("page status: {e}")),
            },
            Err(e) => return RawContent::Failed(format!("fetch page: {e}")),
        };

        match scrape::extract_markdown(&html, &LYRICS_REGION) {
            Ok(md) => RawContent::Markdown(md),
            Err(e) => RawContent::Failed(e.to_string()),
        }
    }
}
