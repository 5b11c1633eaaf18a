// ============================================================
// Layer 4 — Text Normalizer
// ============================================================
// Cleans raw text extracted from a PDF before chunking.
//
// Extracted PDF text typically has:
//   - Runs of blank lines between blocks and pages
//   - Runs of spaces from column layout
//   - Words hyphenated at the end of a line ("informa-\ntion")
//
// Cleaning steps (applied in order):
//   1. Collapse 3+ newlines into exactly 2 (keep paragraph breaks)
//   2. Collapse 2+ spaces into 1
//   3. Rejoin words split by a hyphen at a line break
//   4. Trim the whole text
//
// Step 3 is a heuristic: a real compound word ("well-\nknown")
// broken at a line boundary is merged as well ("wellknown").
//
// Page markers ("[Page 3]") contain no runs of spaces or
// hyphens, so they pass through untouched.

use std::borrow::Cow;
use std::sync::LazyLock;

use regex::Regex;

static EXCESS_NEWLINES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n{3,}").expect("valid pattern"));

static EXCESS_SPACES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r" {2,}").expect("valid pattern"));

static LINE_BREAK_HYPHEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\w+)-\n(\w+)").expect("valid pattern"));

/// Stateless text cleaner. `normalize` is total and idempotent.
#[derive(Debug, Clone, Copy, Default)]
pub struct TextNormalizer;

impl TextNormalizer {
    pub fn new() -> Self {
        Self
    }

    /// Clean a raw text string for downstream chunking.
    pub fn normalize(&self, text: &str) -> String {
        // ── Step 1: Paragraph breaks ──────────────────────────────────────────
        let step1 = EXCESS_NEWLINES.replace_all(text, "\n\n");

        // ── Step 2: Spaces ────────────────────────────────────────────────────
        let step2 = EXCESS_SPACES.replace_all(&step1, " ");

        // ── Step 3: Dehyphenation ─────────────────────────────────────────────
        // replace_all never sees overlapping matches, so "a-\nb-\nc"
        // needs a second pass to become "abc".
        let mut current: String = step2.into_owned();
        loop {
            match LINE_BREAK_HYPHEN.replace_all(&current, "${1}${2}") {
                Cow::Borrowed(_) => break,
                Cow::Owned(next) => current = next,
            }
        }

        // ── Step 4: Trim ──────────────────────────────────────────────────────
        current.trim().to_string()
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    fn norm(s: &str) -> String {
        TextNormalizer::new().normalize(s)
    }

    #[test]
    fn test_collapses_blank_lines_to_one() {
        assert_eq!(norm("line1\n\n\n\n\nline2"), "line1\n\nline2");
        // A single paragraph break is kept as is
        assert_eq!(norm("line1\n\nline2"), "line1\n\nline2");
    }

    #[test]
    fn test_collapses_multiple_spaces() {
        assert_eq!(norm("hello     world"), "hello world");
    }

    #[test]
    fn test_rejoins_hyphenated_words() {
        assert_eq!(norm("informa-\ntion retrieval"), "information retrieval");
    }

    #[test]
    fn test_rejoins_chained_hyphenation() {
        assert_eq!(norm("a-\nb-\nc"), "abc");
    }

    #[test]
    fn test_merges_compound_words_at_line_break() {
        // Known imprecision of the heuristic
        assert_eq!(norm("well-\nknown"), "wellknown");
    }

    #[test]
    fn test_hyphen_without_line_break_is_kept() {
        assert_eq!(norm("state-of-the-art"), "state-of-the-art");
    }

    #[test]
    fn test_trims_edges() {
        assert_eq!(norm("  \n hello world \n\n "), "hello world");
    }

    #[test]
    fn test_page_markers_survive() {
        let out = norm("[Page 1]\nIntro   text\n\n\n\n[Page 2]\nMore");
        assert_eq!(out, "[Page 1]\nIntro text\n\n[Page 2]\nMore");
    }

    #[test]
    fn test_empty_string() {
        assert_eq!(norm(""), "");
        assert_eq!(norm("   \n\n\n  "), "");
    }

    #[test]
    fn test_idempotent() {
        let inputs = [
            "",
            "plain",
            "a-\nb-\nc-\nd",
            "  x  \n\n\n\n  y   z  ",
            "[Page 1]\nfoo-\nbar    baz\n\n\n\n\n[Page 2]\n  qux-\n\nquux  ",
            "tab\tand  \r\n\r\n\r\n carriage",
            "ünï-\ncødé   wörds",
        ];
        for input in inputs {
            let once = norm(input);
            assert_eq!(norm(&once), once, "not idempotent for {input:?}");
        }
    }
}
