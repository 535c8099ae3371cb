//! Shared page-region extraction for lyric scrapes.
//!
//! Each source names a CSS region holding the lyrics plus an exclusion rule
//! for ad/share blocks nested inside it. Extraction renders the surviving
//! nodes to a markdown-ish text (line breaks preserved, emphasis kept as
//! `*...*` markers) that `clean_lyrics_markdown` then canonicalizes.

use std::collections::HashSet;

use ego_tree::NodeId;
use scraper::{Html, Node, Selector};

use crate::error::{Error, Result};

/// Blocks whose link-text share exceeds this are treated as boilerplate.
pub const PRUNE_THRESHOLD: f64 = 0.5;

/// The page region a source keeps its lyrics in.
pub struct LyricsRegion {
    /// Selector for the lyrics containers.
    pub container: &'static str,
    /// Selector for subtrees to drop from inside the containers.
    pub exclude: Option<&'static str>,
    /// Drop whole containers that hold nested links (ad/share heuristic).
    pub exclude_link_containers: bool,
}

/// Pull the lyrics region out of a page and render it as markdown text.
///
/// Fails `Provider` when no container matches or everything was pruned;
/// callers surface that through `RawContent` rather than an error.
pub fn extract_markdown(html: &str, region: &LyricsRegion) -> Result<String> {
    let doc = Html::parse_document(html);
    let container_sel = parse_selector(region.container)?;
    let link_sel = parse_selector("a")?;

    let excluded: HashSet<NodeId> = match region.exclude {
        Some(sel) => {
            let sel = parse_selector(sel)?;
            doc.select(&sel).map(|el| el.id()).collect()
        }
        None => HashSet::new(),
    };

    let mut out = String::new();
    let mut matched = 0usize;

    for container in doc.select(&container_sel) {
        matched += 1;
        if excluded.contains(&container.id()) {
            continue;
        }
        if region.exclude_link_containers && container.select(&link_sel).next().is_some() {
            continue;
        }
        if link_density(&container) > PRUNE_THRESHOLD {
            continue;
        }

        render_children(*container, &excluded, &mut out);
        out.push('\n');
    }

    if matched == 0 {
        return Err(Error::provider(format!(
            "no element matched lyrics selector {:?}; page structure may have changed",
            region.container
        )));
    }

    let out = out.trim().to_string();
    if out.is_empty() {
        return Err(Error::provider(
            "lyrics region matched but contained no text after pruning",
        ));
    }
    Ok(out)
}

fn parse_selector(s: &str) -> Result<Selector> {
    Selector::parse(s).map_err(|e| Error::provider(format!("bad selector {s:?}: {e}")))
}

/// Share of a block's text that sits inside links.
fn link_density(el: &scraper::ElementRef<'_>) -> f64 {
    let total: usize = el.text().map(str::len).sum();
    if total == 0 {
        return 0.0;
    }
    let link_sel = Selector::parse("a").expect("anchor selector");
    let linked: usize = el
        .select(&link_sel)
        .map(|a| a.text().map(str::len).sum::<usize>())
        .sum();
    linked as f64 / total as f64
}

fn render_children(
    node: ego_tree::NodeRef<'_, Node>,
    excluded: &HashSet<NodeId>,
    out: &mut String,
) {
    for child in node.children() {
        render_node(child, excluded, out);
    }
}

fn render_node(node: ego_tree::NodeRef<'_, Node>, excluded: &HashSet<NodeId>, out: &mut String) {
    if excluded.contains(&node.id()) {
        return;
    }
    match node.value() {
        Node::Text(t) => out.push_str(t),
        Node::Element(el) => match el.name() {
            "br" => out.push('\n'),
            "script" | "style" | "noscript" => {}
            "i" | "em" => {
                out.push('*');
                render_children(node, excluded, out);
                out.push('*');
            }
            "a" => {
                // Link targets are ignored, only the text survives.
                render_children(node, excluded, out);
            }
            "div" | "p" | "section" | "h1" | "h2" | "h3" | "h4" => {
                render_children(node, excluded, out);
                if !out.ends_with('\n') {
                    out.push('\n');
                }
            }
            _ => render_children(node, excluded, out),
        },
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const GENIUS_REGION: LyricsRegion = LyricsRegion {
        container: "div[data-lyrics-container='true']",
        exclude: Some("div[data-exclude-from-selection='true']"),
        exclude_link_containers: false,
    };

    #[test]
    fn test_extracts_container_text() {
        let html = r#"<html><body>
            <div data-lyrics-container="true">[Verse 1]<br>first line<br><i>second</i> line</div>
            <div>unrelated chrome</div>
        </body></html>"#;
        let md = extract_markdown(html, &GENIUS_REGION).unwrap();
        assert_eq!(md, "[Verse 1]\nfirst line\n*second* line");
    }

    #[test]
    fn test_excluded_subtree_dropped() {
        let html = r#"<html><body>
            <div data-lyrics-container="true">kept line<br>
              <div data-exclude-from-selection="true">sponsored junk</div>
            </div>
        </body></html>"#;
        let md = extract_markdown(html, &GENIUS_REGION).unwrap();
        assert!(md.contains("kept line"));
        assert!(!md.contains("sponsored junk"));
    }

    #[test]
    fn test_link_heavy_container_pruned() {
        let region = LyricsRegion {
            container: "div.flow",
            exclude: None,
            exclude_link_containers: true,
        };
        let html = r#"<html><body>
            <div class="flow">lyric line one<br>lyric line two</div>
            <div class="flow"><a href="/share">Share</a></div>
        </body></html>"#;
        let md = extract_markdown(html, &region).unwrap();
        assert!(md.contains("lyric line one"));
        assert!(!md.contains("Share"));
    }

    #[test]
    fn test_no_container_is_provider_error() {
        let err = extract_markdown("<html><body></body></html>", &GENIUS_REGION).unwrap_err();
        assert!(matches!(err, Error::Provider(_)));
    }
}
