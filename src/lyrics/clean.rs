//! Markdown cleaner for scraped lyrics pages.
//!
//! Both lyric sources hand back markdown with junk around the actual lyrics:
//! contributor counts, translation link lists, a "## Song Title Lyrics"
//! heading, and ads before the first section marker. This strips all of it
//! and normalizes section headers to `### <name>` regardless of which
//! convention the source used (`[Verse 1: X]` tags vs `### verse` headings).

use once_cell::sync::Lazy;
use regex::Regex;

static CONTRIBUTORS_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^\d+\s+Contributors").expect("contributors regex"));
static SECTION_TAG_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\[.*?\]$").expect("section tag regex"));
static TITLE_HEADING_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^## .*lyrics$").expect("title heading regex"));
static EMPHASIS_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[_*`]").expect("emphasis regex"));

/// Clean raw scraped markdown into canonical lyric text.
///
/// When the source has any section markers, everything before the first one
/// (descriptions, ads) is suppressed. When it has none, every non-junk line
/// is emitted. Blank lines are always dropped.
pub fn clean_lyrics_markdown(md: &str) -> String {
    let lines: Vec<&str> = md.lines().collect();

    let has_headers = lines.iter().any(|line| {
        let line = line.trim();
        SECTION_TAG_RE.is_match(line) || line.starts_with("### ")
    });

    let mut saw_section = !has_headers;
    let mut cleaned: Vec<String> = Vec::new();

    for line in lines {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        if CONTRIBUTORS_RE.is_match(line) {
            continue;
        }
        if line.to_lowercase().starts_with("translations") {
            continue;
        }
        // Translation bullet list.
        if line.starts_with("* ") {
            continue;
        }
        if TITLE_HEADING_RE.is_match(line) {
            continue;
        }

        // Genius-style section tags like [Verse 1: Artist].
        if SECTION_TAG_RE.is_match(line) {
            saw_section = true;
            let section = line.trim_matches(['[', ']']).to_lowercase();
            cleaned.push(format!("### {section}"));
            continue;
        }

        // Musixmatch-style headings like "### verse".
        if let Some(rest) = line.strip_prefix("### ") {
            saw_section = true;
            let section = rest.trim().to_lowercase();
            cleaned.push(format!("### {section}"));
            continue;
        }

        let line = EMPHASIS_RE.replace_all(line, "");
        if saw_section {
            cleaned.push(line.into_owned());
        }
    }

    cleaned.join("\n")
}
