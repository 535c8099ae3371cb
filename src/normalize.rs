//! Text normalization used for search-query construction and for post-hoc
//! title/artist comparison. Deterministic and side-effect-free, so the same
//! function serves both.

use once_cell::sync::Lazy;
use regex::Regex;
use unicode_normalization::UnicodeNormalization;

static NON_WORD_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^\w\s]").expect("non-word regex"));
static PADDED_DOT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s*\.\s*").expect("padded dot regex"));
static DOT_RUN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\.{2,}").expect("dot run regex"));

/// Normalize a title or artist string.
///
/// Steps, in order: NFKC composition, lowercase, whitespace collapse/trim,
/// optional punctuation strip, transliteration to a Latin approximation,
/// and (when punctuation is kept) dot standardization so acronyms like
/// "m . a . a . d" become "m.a.a.d".
pub fn normalize(text: &str, keep_punctuation: bool) -> String {
    if text.is_empty() {
        return String::new();
    }

    let text: String = text.nfkc().collect();
    let text = text.to_lowercase();
    let text = text.split_whitespace().collect::<Vec<_>>().join(" ");

    let text = if keep_punctuation {
        text
    } else {
        NON_WORD_RE.replace_all(&text, "").into_owned()
    };

    // Cyrillic, CJK, etc. -> Latin approximation. Transliteration can
    // introduce uppercase ("北" -> "Bei"), so lowercase again after it.
    let text = any_ascii::any_ascii(&text).to_lowercase();

    if keep_punctuation {
        let text = PADDED_DOT_RE.replace_all(&text, ".");
        let text = DOT_RUN_RE.replace_all(&text, ".");
        text.trim_matches(['.', ' ']).to_string()
    } else {
        text
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_input() {
        assert_eq!(normalize("", true), "");
        assert_eq!(normalize("", false), "");
    }

    #[test]
    fn test_lowercase_and_whitespace() {
        assert_eq!(normalize("  Blue   LACES  ", true), "blue laces");
    }

    #[test]
    fn test_acronym_dots() {
        assert_eq!(normalize("M . A . A . D", true), "m.a.a.d");
        assert_eq!(normalize("good kid, m.A.A.d city", true), "good kid, m.a.a.d city");
    }

    #[test]
    fn test_dot_runs_and_ends() {
        assert_eq!(normalize("wait... for it.", true), "wait.for it");
    }

    #[test]
    fn test_strip_punctuation() {
        assert_eq!(normalize("Don't Stop!", false), "dont stop");
    }

    #[test]
    fn test_transliteration() {
        let out = normalize("Café", true);
        assert!(out.is_ascii());
        assert_eq!(out, "cafe");
    }

    #[test]
    fn test_transliteration_stays_lowercase() {
        let out = normalize("北京", false);
        assert_eq!(out, "beijing");
    }

    #[test]
    fn test_idempotent() {
        for s in ["M . A . A . D", "Café del Mar", "  HELLO   world  ", "a...b", "北京"] {
            let once = normalize(s, true);
            assert_eq!(normalize(&once, true), once);
        }
    }
}
