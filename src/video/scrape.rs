//! Video search by scraping the rendered search page.
//!
//! The page embeds its result data as a JSON blob (`ytInitialData`) inside
//! script content. The blob's framing shifts between page versions, so a
//! small set of alternative patterns is tried in order until one parses.
//! Extraction of results is best-effort: the renderer tree changes often,
//! so we scan for `videoRenderer` nodes anywhere in the blob.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use tracing::debug;

use crate::error::{Error, Result};
use crate::video::{
    filter_and_rank, parse_duration_text, RAW_RESULT_LIMIT, VideoCandidate, VideoSearch,
};

static YT_INITIAL_DATA_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r#"(?s)window\["ytInitialData"\]\s*=\s*(\{.+?\});"#,
        r"(?s)var ytInitialData\s*=\s*(\{.+?\});",
        r#"(?s)ytInitialData"\s*:\s*(\{.+?\}),"#,
        r"(?s)ytInitialData\s*=\s*(\{.+?\});",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("ytInitialData pattern"))
    .collect()
});

/// Scrape-based search client.
#[derive(Debug, Clone)]
pub struct YoutubeScrapeSearch {
    http: reqwest::Client,
}

impl YoutubeScrapeSearch {
    const USER_AGENT: &'static str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
         AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

    pub fn new() -> Result<Self> {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            reqwest::header::ACCEPT_LANGUAGE,
            reqwest::header::HeaderValue::from_static("en"),
        );
        headers.insert(
            reqwest::header::ACCEPT,
            reqwest::header::HeaderValue::from_static(
                "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
            ),
        );
        let http = reqwest::Client::builder()
            .user_agent(Self::USER_AGENT)
            .default_headers(headers)
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .map_err(|e| Error::provider(format!("build scrape client: {e}")))?;
        Ok(Self { http })
    }
}

impl VideoSearch for YoutubeScrapeSearch {
    async fn search(
        &self,
        title: &str,
        artist: &str,
        target_duration_sec: u32,
    ) -> Result<Vec<VideoCandidate>> {
        let query = format!("'{title}' {artist}");
        let url = format!(
            "https://www.youtube.com/results?search_query={}",
            urlencoding::encode(&query)
        );
        debug!(%url, "youtube scrape search");

        let html = self
            .http
            .get(&url)
            .send()
            .await?
            .error_for_status()
            .map_err(|e| Error::provider(format!("search page http status: {e}")))?
            .text()
            .await?;

        let data = extract_initial_data(&html)?;
        let raw = parse_search_results(&data, RAW_RESULT_LIMIT);
        if raw.is_empty() {
            return Err(Error::no_results(format!(
                "youtube scrape: source returned nothing for query: {query}"
            )));
        }

        let ranked = filter_and_rank(raw, target_duration_sec);
        if ranked.is_empty() {
            return Err(Error::no_results(format!(
                "youtube scrape: no duration-matched results for query: {query}"
            )));
        }
        Ok(ranked)
    }
}

/// Pull the embedded JSON blob out of the page, trying each framing pattern
/// in order until one captures valid JSON.
fn extract_initial_data(html: &str) -> Result<Value> {
    for pattern in YT_INITIAL_DATA_PATTERNS.iter() {
        if let Some(caps) = pattern.captures(html)
            && let Ok(v) = serde_json::from_str::<Value>(&caps[1])
        {
            return Ok(v);
        }
    }
    Err(Error::provider(
        "could not extract ytInitialData from search page",
    ))
}

/// Scan the blob for `videoRenderer` nodes.
///
/// Entries without duration text are live streams (or upcoming videos) and
/// are excluded here, before duration filtering.
fn parse_search_results(data: &Value, limit: usize) -> Vec<VideoCandidate> {
    let mut out = Vec::new();
    scan_value(data, &mut |node| {
        let r = node.get("videoRenderer")?;
        let video_id = r.get("videoId").and_then(Value::as_str)?;

        let title = r
            .pointer("/title/runs/0/text")
            .and_then(Value::as_str)
            .unwrap_or("Unknown title")
            .to_string();

        let duration_text = r
            .pointer("/lengthText/simpleText")
            .and_then(Value::as_str)?;

        Some(VideoCandidate {
            video_id: video_id.to_string(),
            title,
            duration_sec: parse_duration_text(duration_text),
            url: format!("https://youtube.com/watch?v={video_id}"),
            // The rendered page carries no category; default to Music.
            category: "10".to_string(),
        })
    }, limit, &mut out);
    out
}

fn scan_value<F>(v: &Value, f: &mut F, limit: usize, out: &mut Vec<VideoCandidate>)
where
    F: FnMut(&Value) -> Option<VideoCandidate>,
{
    if out.len() >= limit {
        return;
    }
    if let Some(c) = f(v) {
        out.push(c);
    }
    match v {
        Value::Array(a) => {
            for x in a {
                scan_value(x, f, limit, out);
            }
        }
        Value::Object(o) => {
            for (_, x) in o {
                scan_value(x, f, limit, out);
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn renderer(id: &str, duration: Option<&str>) -> Value {
        let mut r = json!({
            "videoId": id,
            "title": {"runs": [{"text": format!("video {id}")}]}
        });
        if let Some(d) = duration {
            r["lengthText"] = json!({"simpleText": d});
        }
        json!({"videoRenderer": r})
    }

    #[test]
    fn test_extract_initial_data_variants() {
        let blob = r#"{"contents":{}}"#;
        for html in [
            format!(r#"<script>window["ytInitialData"] = {blob};</script>"#),
            format!("<script>var ytInitialData = {blob};</script>"),
            format!("<script>ytInitialData = {blob};</script>"),
        ] {
            assert!(extract_initial_data(&html).is_ok(), "failed on: {html}");
        }
    }

    #[test]
    fn test_extract_initial_data_missing() {
        let err = extract_initial_data("<html>no data here</html>").unwrap_err();
        assert!(matches!(err, Error::Provider(_)));
    }

    #[test]
    fn test_parse_search_results() {
        let data = json!({
            "contents": [renderer("a", Some("3:45")), renderer("b", None), renderer("c", Some("1:02:03"))]
        });
        let results = parse_search_results(&data, 25);
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].video_id, "a");
        assert_eq!(results[0].duration_sec, 225);
        assert_eq!(results[1].duration_sec, 3723);
    }

    #[test]
    fn test_parse_respects_limit() {
        let items: Vec<Value> = (0..30)
            .map(|i| renderer(&i.to_string(), Some("3:00")))
            .collect();
        let data = json!({"contents": items});
        assert_eq!(parse_search_results(&data, 25).len(), 25);
    }
}
