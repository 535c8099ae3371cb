//! Video search through the platform's official data API.
//!
//! Listing results carry no durations, so the full metadata (including the
//! ISO-8601 duration) is pulled for all result ids in one batch call before
//! filtering.

use serde::Deserialize;
use tracing::debug;

use crate::error::{Error, Result};
use crate::video::{
    filter_and_rank, parse_iso8601_duration, RAW_RESULT_LIMIT, VideoCandidate, VideoSearch,
};

#[derive(Debug, Deserialize)]
struct SearchListResponse {
    #[serde(default)]
    items: Vec<SearchItem>,
}

#[derive(Debug, Deserialize)]
struct SearchItem {
    id: SearchItemId,
}

#[derive(Debug, Deserialize)]
struct SearchItemId {
    kind: String,
    #[serde(rename = "videoId")]
    video_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct VideoListResponse {
    #[serde(default)]
    items: Vec<VideoItem>,
}

#[derive(Debug, Deserialize)]
struct VideoItem {
    id: String,
    snippet: Option<VideoSnippet>,
    #[serde(rename = "contentDetails")]
    content_details: Option<ContentDetails>,
}

#[derive(Debug, Deserialize)]
struct VideoSnippet {
    title: String,
    #[serde(rename = "categoryId")]
    category_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ContentDetails {
    duration: Option<String>,
}

/// Official-API search client.
#[derive(Debug, Clone)]
pub struct YoutubeApiSearch {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl YoutubeApiSearch {
    const DEFAULT_BASE_URL: &'static str = "https://www.googleapis.com/youtube/v3";

    pub fn new(api_key: &str) -> Result<Self> {
        if api_key.is_empty() {
            return Err(Error::provider("youtube api key is required"));
        }
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .map_err(|e| Error::provider(format!("build youtube api client: {e}")))?;
        Ok(Self {
            http,
            api_key: api_key.to_string(),
            base_url: Self::DEFAULT_BASE_URL.to_string(),
        })
    }

    async fn list_search(&self, query: &str) -> Result<SearchListResponse> {
        let max_results = RAW_RESULT_LIMIT.to_string();
        let resp = self
            .http
            .get(format!("{}/search", self.base_url))
            .query(&[
                ("part", "snippet"),
                ("maxResults", max_results.as_str()),
                ("q", query),
                ("type", "video"),
                ("eventType", "none"),
                ("order", "relevance"),
                ("safeSearch", "none"),
                ("key", self.api_key.as_str()),
            ])
            .send()
            .await?
            .error_for_status()
            .map_err(|e| Error::provider(format!("youtube search http status: {e}")))?;
        Ok(resp.json().await?)
    }

    async fn list_videos(&self, ids: &[String]) -> Result<VideoListResponse> {
        let resp = self
            .http
            .get(format!("{}/videos", self.base_url))
            .query(&[
                ("part", "snippet,contentDetails"),
                ("id", ids.join(",").as_str()),
                ("key", self.api_key.as_str()),
            ])
            .send()
            .await?
            .error_for_status()
            .map_err(|e| Error::provider(format!("youtube videos http status: {e}")))?;
        Ok(resp.json().await?)
    }
}

impl VideoSearch for YoutubeApiSearch {
    async fn search(
        &self,
        title: &str,
        artist: &str,
        target_duration_sec: u32,
    ) -> Result<Vec<VideoCandidate>> {
        let query = format!("{title} {artist}");
        let listing = self.list_search(&query).await?;

        let video_ids: Vec<String> = listing
            .items
            .into_iter()
            .filter(|item| item.id.kind == "youtube#video")
            .filter_map(|item| item.id.video_id)
            .collect();

        if video_ids.is_empty() {
            return Err(Error::no_results(format!(
                "youtube api: source returned nothing for query: {query}"
            )));
        }
        debug!(count = video_ids.len(), %query, "youtube api listing");

        let videos = self.list_videos(&video_ids).await?;
        if videos.items.is_empty() {
            return Err(Error::provider(format!(
                "youtube api: empty metadata batch for query: {query}"
            )));
        }

        let candidates: Vec<VideoCandidate> = videos
            .items
            .into_iter()
            .filter_map(|v| {
                let snippet = v.snippet?;
                let duration_sec =
                    parse_iso8601_duration(&v.content_details?.duration?)?;
                Some(VideoCandidate {
                    url: format!("https://www.youtube.com/watch?v={}", v.id),
                    video_id: v.id,
                    title: snippet.title,
                    duration_sec,
                    category: snippet.category_id.unwrap_or_default(),
                })
            })
            .collect();

        let ranked = filter_and_rank(candidates, target_duration_sec);
        if ranked.is_empty() {
            return Err(Error::no_results(format!(
                "youtube api: no duration-matched results for query: {query}"
            )));
        }
        Ok(ranked)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_listing_deserializes() {
        let raw = r#"{
            "items": [
                {"id": {"kind": "youtube#video", "videoId": "abc123"}},
                {"id": {"kind": "youtube#channel"}}
            ]
        }"#;
        let listing: SearchListResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(listing.items.len(), 2);
        assert_eq!(listing.items[0].id.video_id.as_deref(), Some("abc123"));
        assert!(listing.items[1].id.video_id.is_none());
    }

    #[test]
    fn test_video_listing_deserializes() {
        let raw = r#"{
            "items": [{
                "id": "abc123",
                "snippet": {"title": "A Song", "categoryId": "10"},
                "contentDetails": {"duration": "PT3M45S"}
            }]
        }"#;
        let videos: VideoListResponse = serde_json::from_str(raw).unwrap();
        let item = &videos.items[0];
        assert_eq!(item.snippet.as_ref().unwrap().title, "A Song");
        assert_eq!(
            item.content_details.as_ref().unwrap().duration.as_deref(),
            Some("PT3M45S")
        );
    }

    #[test]
    fn test_empty_key_rejected() {
        assert!(YoutubeApiSearch::new("").is_err());
    }
}
