//! Musixmatch lyrics source.
//!
//! Musixmatch blocks anonymous scraping, so pages are rendered through a
//! headless Chromium launched against a pre-authorized browsing profile
//! (`--user-data-dir`). Search results come from the rendered search page:
//! a "best result" section and a "tracks" list, distinguished only by
//! structural class names. The lyric page region is likewise structural,
//! with link-holding containers excluded as an ad/share heuristic.

use std::path::{Path, PathBuf};

use scraper::{Html, Selector};
use tokio::process::Command;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::lyrics::scrape::{self, LyricsRegion};
use crate::lyrics::{LyricsSource, RawContent};
use crate::normalize::normalize;

const LYRICS_REGION: LyricsRegion = LyricsRegion {
    container: "div.css-175oi2r.r-zd98yo",
    exclude: None,
    exclude_link_containers: true,
};

/// One search-page hit, title/artist already normalized.
#[derive(Debug, Clone, PartialEq)]
pub struct PageHit {
    pub url: String,
    pub title: String,
    pub artist: String,
}

/// The two candidate lists a search page yields.
#[derive(Debug, Default)]
pub struct SearchLists {
    pub best_results: Vec<PageHit>,
    pub tracks: Vec<PageHit>,
}

impl SearchLists {
    /// First best result wins, else the first track.
    ///
    /// Precedence is unconditional: textual closeness to the query is not
    /// checked even though normalized title/artist values are carried.
    pub fn top(&self) -> Result<&PageHit> {
        self.best_results
            .first()
            .or_else(|| self.tracks.first())
            .ok_or_else(|| Error::no_results("musixmatch: no results found"))
    }
}

/// Musixmatch scrape client bound to an authenticated browser profile.
#[derive(Debug, Clone)]
pub struct MusixmatchClient {
    profile_dir: PathBuf,
    browser_bin: String,
    render_timeout: std::time::Duration,
}

impl MusixmatchClient {
    const BASE_URL: &'static str = "https://www.musixmatch.com";
    const RENDER_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(15);

    pub fn new(profile_dir: &Path, browser_bin: &str) -> Result<Self> {
        if !profile_dir.is_dir() {
            return Err(Error::provider(format!(
                "musixmatch profile dir {} does not exist",
                profile_dir.display()
            )));
        }
        Ok(Self {
            profile_dir: profile_dir.to_path_buf(),
            browser_bin: browser_bin.to_string(),
            render_timeout: Self::RENDER_TIMEOUT,
        })
    }

    #[cfg(test)]
    fn with_render_timeout(mut self, timeout: std::time::Duration) -> Self {
        self.render_timeout = timeout;
        self
    }

    /// Render a page through the authenticated profile and dump its DOM.
    async fn rendered_html(&self, url: &str) -> Result<String> {
        let mut cmd = Command::new(&self.browser_bin);
        cmd.arg("--headless=new")
            .arg("--disable-gpu")
            .arg("--no-first-run")
            .arg(format!("--user-data-dir={}", self.profile_dir.display()))
            .arg("--virtual-time-budget=8000")
            .arg("--dump-dom")
            .arg(url);
        // A timed-out render must not leave the browser running; it would
        // keep holding the profile's singleton lock.
        cmd.kill_on_drop(true);

        let out = tokio::time::timeout(self.render_timeout, cmd.output())
            .await
            .map_err(|_| Error::provider(format!("rendering {url} timed out")))?
            .map_err(|e| Error::provider(format!("spawn {}: {e}", self.browser_bin)))?;

        if !out.status.success() {
            let stderr = String::from_utf8_lossy(&out.stderr);
            return Err(Error::provider(format!(
                "{} failed rendering {url}: {}",
                self.browser_bin,
                stderr.trim()
            )));
        }
        Ok(String::from_utf8_lossy(&out.stdout).into_owned())
    }

    async fn search(&self, title: &str, artist: &str) -> Result<SearchLists> {
        let q = format!("{title} {artist}");
        let query = urlencoding::encode(&q);
        let url = format!("{}/search?query={query}", Self::BASE_URL);
        debug!(%url, "musixmatch search");

        let html = self.rendered_html(&url).await?;
        let lists = parse_search_page(&html)?;
        if lists.best_results.is_empty() && lists.tracks.is_empty() {
            return Err(Error::no_results(format!(
                "musixmatch: no search results for {title} - {artist}"
            )));
        }
        Ok(lists)
    }
}

impl LyricsSource for MusixmatchClient {
    fn name(&self) -> &'static str {
        "musixmatch"
    }

    async fn lyric_url(&self, title: &str, artist: &str) -> Result<String> {
        let lists = self.search(title, artist).await?;
        let top = lists.top()?;
        if top.url.is_empty() {
            return Err(Error::no_results("musixmatch: no url found for top result"));
        }
        Ok(top.url.clone())
    }

    async fn scrape(&self, url: &str) -> RawContent {
        debug!(%url, "scraping musixmatch page");
        let html = match self.rendered_html(url).await {
            Ok(html) => html,
            Err(e) => return RawContent::Failed(e.to_string()),
        };
        match scrape::extract_markdown(&html, &LYRICS_REGION) {
            Ok(md) => RawContent::Markdown(md),
            Err(e) => RawContent::Failed(e.to_string()),
        }
    }

    async fn close(&self) {
        // The browser exits with each render; nothing persistent to tear
        // down. Stale headless singleton locks in the profile are removed so
        // the next call can reuse it.
        let lock = self.profile_dir.join("SingletonLock");
        if lock.exists()
            && let Err(e) = std::fs::remove_file(&lock)
        {
            warn!(path = %lock.display(), error = %e, "failed to remove profile lock");
        }
    }
}

/// Extract the best-result and track lists from a rendered search page.
pub fn parse_search_page(html: &str) -> Result<SearchLists> {
    let doc = Html::parse_document(html);
    let best_sel = sel("div.r-140ww7k")?;
    let tracks_sel = sel("div.r-1f720gc")?;

    let mut lists = SearchLists::default();
    for el in doc.select(&best_sel) {
        if let Some(hit) = parse_hit(&el)? {
            lists.best_results.push(hit);
        }
    }
    for el in doc.select(&tracks_sel) {
        if let Some(hit) = parse_hit(&el)? {
            lists.tracks.push(hit);
        }
    }
    Ok(lists)
}

/// One hit: the lyrics link plus its primary/secondary text lines.
fn parse_hit(el: &scraper::ElementRef<'_>) -> Result<Option<PageHit>> {
    let link_sel = sel("a[href^='/lyrics']")?;
    let text_sel = sel("a[href^='/lyrics'] div[dir='auto']")?;

    let Some(link) = el.select(&link_sel).next() else {
        return Ok(None);
    };
    let Some(href) = link.value().attr("href") else {
        return Ok(None);
    };

    let mut texts = el.select(&text_sel);
    let title = texts
        .next()
        .map(|t| t.text().collect::<String>())
        .unwrap_or_default();
    let artist = texts
        .next()
        .map(|t| t.text().collect::<String>())
        .unwrap_or_default();

    Ok(Some(PageHit {
        url: absolute_url(href),
        title: normalize(&title, true),
        artist: normalize(&artist, true),
    }))
}

fn absolute_url(href: &str) -> String {
    if href.starts_with("http") {
        href.to_string()
    } else {
        format!("{}{href}", MusixmatchClient::BASE_URL)
    }
}

fn sel(s: &str) -> Result<Selector> {
    Selector::parse(s).map_err(|e| Error::provider(format!("bad selector {s:?}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SEARCH_PAGE: &str = r#"<html><body>
      <div class="r-140ww7k">
        <a href="/lyrics/Nipsey-Hussle/Blue-Laces">
          <div dir="auto">Blue  Laces</div>
          <div dir="auto">Nipsey Hussle</div>
        </a>
      </div>
      <div class="r-1f720gc">
        <a href="/lyrics/Nipsey-Hussle/Blue-Laces-2">
          <div dir="auto">Blue Laces 2</div>
          <div dir="auto">Nipsey Hussle</div>
        </a>
      </div>
    </body></html>"#;

    #[test]
    fn test_parse_search_page() {
        let lists = parse_search_page(SEARCH_PAGE).unwrap();
        assert_eq!(lists.best_results.len(), 1);
        assert_eq!(lists.tracks.len(), 1);
        assert_eq!(
            lists.best_results[0].url,
            "https://www.musixmatch.com/lyrics/Nipsey-Hussle/Blue-Laces"
        );
        // Title/artist come back normalized.
        assert_eq!(lists.best_results[0].title, "blue laces");
        assert_eq!(lists.tracks[0].title, "blue laces 2");
    }

    #[test]
    fn test_top_prefers_best_result() {
        let lists = parse_search_page(SEARCH_PAGE).unwrap();
        assert_eq!(lists.top().unwrap().title, "blue laces");
    }

    #[test]
    fn test_top_falls_back_to_tracks() {
        let mut lists = parse_search_page(SEARCH_PAGE).unwrap();
        lists.best_results.clear();
        assert_eq!(lists.top().unwrap().title, "blue laces 2");
    }

    #[test]
    fn test_top_empty_is_no_results() {
        let lists = SearchLists::default();
        assert!(matches!(lists.top().unwrap_err(), Error::NoResults(_)));
    }

    #[test]
    fn test_hit_without_link_skipped() {
        let html = r#"<div class="r-1f720gc"><div dir="auto">No link here</div></div>"#;
        let lists = parse_search_page(html).unwrap();
        assert!(lists.tracks.is_empty());
    }

    /// `pid` is gone or a zombie awaiting reap.
    fn exited(pid: i32) -> bool {
        match std::fs::read_to_string(format!("/proc/{pid}/stat")) {
            Err(_) => true,
            Ok(stat) => stat
                .rsplit(')')
                .next()
                .and_then(|rest| rest.split_whitespace().next())
                .is_some_and(|state| state == "Z"),
        }
    }

    #[tokio::test]
    async fn test_render_timeout_kills_browser() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let pid_file = dir.path().join("render.pid");
        let script = dir.path().join("slow-browser");
        std::fs::write(
            &script,
            format!("#!/bin/sh\necho $$ > {}\nsleep 30\n", pid_file.display()),
        )
        .unwrap();
        let mut perms = std::fs::metadata(&script).unwrap().permissions();
        perms.set_mode(0o755);
        std::fs::set_permissions(&script, perms).unwrap();

        let client = MusixmatchClient::new(dir.path(), &script.to_string_lossy())
            .unwrap()
            .with_render_timeout(std::time::Duration::from_millis(200));
        let err = client
            .rendered_html("https://example.com")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("timed out"), "error was: {err}");

        let pid: i32 = std::fs::read_to_string(&pid_file)
            .unwrap()
            .trim()
            .parse()
            .unwrap();
        for _ in 0..100 {
            if exited(pid) {
                return;
            }
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        }
        panic!("browser process {pid} still running after render timeout");
    }
}
