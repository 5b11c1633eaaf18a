// ============================================================
// Layer 4 — Text Chunker
// ============================================================
// Splits normalised document text into overlapping windows of
// words, the unit that gets embedded and retrieved.
//
// Sliding window with overlap:
//   - Each chunk holds at most `chunk_size` words
//   - Consecutive chunks of the same page share `overlap` words
//   - stride = chunk_size - overlap
//
// Example with chunk_size=5, overlap=2:
//   Page:     "A B C D E F G H I J"
//   Chunk 1:  "A B C D E"          (positions 0-4)
//   Chunk 2:  "D E F G H"          (positions 3-7)
//   Chunk 3:  "G H I J"            (positions 6-9, reaches the end)
//
// Page-respecting mode:
//   The text is first cut at every "[Page N]" marker. The marker
//   stays at the front of its page, so the first window of every
//   page starts with it and answers can cite the page. Windows
//   never cross from one page into the next.

use crate::domain::document::PAGE_MARKER;
use crate::domain::error::RagError;

pub const DEFAULT_CHUNK_SIZE: usize = 600;
pub const DEFAULT_OVERLAP:    usize = 120;

#[derive(Debug, Clone)]
pub struct Chunker {
    /// Target number of words per chunk
    chunk_size: usize,
    /// Number of words shared between adjacent chunks
    overlap: usize,
    /// Window each page separately
    respect_pages: bool,
}

impl Default for Chunker {
    fn default() -> Self {
        Self {
            chunk_size:    DEFAULT_CHUNK_SIZE,
            overlap:       DEFAULT_OVERLAP,
            respect_pages: true,
        }
    }
}

impl Chunker {
    /// Create a new Chunker.
    ///
    /// # Errors
    /// `RagError::InvalidConfig` if `chunk_size` is zero or
    /// `overlap >= chunk_size` (the window would never advance).
    pub fn new(chunk_size: usize, overlap: usize, respect_pages: bool) -> Result<Self, RagError> {
        if chunk_size == 0 {
            return Err(RagError::InvalidConfig(
                "chunk_size must be greater than zero".into(),
            ));
        }
        if overlap >= chunk_size {
            return Err(RagError::InvalidConfig(format!(
                "overlap ({overlap}) must be less than chunk_size ({chunk_size})"
            )));
        }
        Ok(Self { chunk_size, overlap, respect_pages })
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn overlap(&self) -> usize {
        self.overlap
    }

    pub fn respects_pages(&self) -> bool {
        self.respect_pages
    }

    /// Split text into ordered chunks. The position of a chunk in
    /// the returned Vec is its only identifier downstream.
    pub fn chunk(&self, text: &str) -> Vec<String> {
        let text = text.replace('\r', " ");

        if !self.respect_pages {
            return self.window(&text);
        }

        split_pages(&text)
            .into_iter()
            .flat_map(|page| self.window(page))
            .collect()
    }

    /// Word-windowing over one segment of text.
    fn window(&self, text: &str) -> Vec<String> {
        let words: Vec<&str> = text.split_whitespace().collect();

        // Empty segment → nothing to emit
        if words.is_empty() {
            return Vec::new();
        }

        // Non-zero: guaranteed by the constructor
        let stride = self.chunk_size - self.overlap;

        let mut chunks = Vec::with_capacity(self.num_chunks(words.len()));
        let mut start  = 0usize;

        loop {
            // End of this chunk (clamped to segment length)
            let end = (start + self.chunk_size).min(words.len());

            chunks.push(words[start..end].join(" "));

            if end == words.len() {
                break;
            }

            start += stride;
        }

        chunks
    }

    /// Returns how many chunks a segment of `word_count` words produces
    pub fn num_chunks(&self, word_count: usize) -> usize {
        if word_count == 0 {
            return 0;
        }
        if word_count <= self.chunk_size {
            return 1;
        }
        let stride = self.chunk_size - self.overlap;
        1 + (word_count - self.chunk_size).div_ceil(stride)
    }
}

/// Cut text at every page marker, keeping each marker as the
/// prefix of the page it introduces. Text before the first marker
/// (if any) is returned as its own segment.
pub fn split_pages(text: &str) -> Vec<&str> {
    let mut pages = Vec::new();
    let mut start = 0usize;

    for m in PAGE_MARKER.find_iter(text) {
        if m.start() > start {
            pages.push(&text[start..m.start()]);
        }
        start = m.start();
    }
    pages.push(&text[start..]);

    pages
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn words(n: usize) -> String {
        (0..n).map(|i| format!("w{i}")).collect::<Vec<_>>().join(" ")
    }

    #[test]
    fn test_basic_chunking() {
        let c      = Chunker::new(5, 2, false).unwrap();
        let chunks = c.chunk("a b c d e f g h i j");
        assert_eq!(chunks, vec!["a b c d e", "d e f g h", "g h i j"]);
    }

    #[test]
    fn test_short_text_gives_one_chunk() {
        let c      = Chunker::new(100, 10, false).unwrap();
        let chunks = c.chunk("just a few words");
        assert_eq!(chunks, vec!["just a few words"]);
    }

    #[test]
    fn test_exact_fit_gives_one_chunk() {
        let c = Chunker::new(4, 1, false).unwrap();
        assert_eq!(c.chunk("a b c d"), vec!["a b c d"]);
    }

    #[test]
    fn test_empty_text_gives_no_chunks() {
        let c = Chunker::new(5, 2, true).unwrap();
        assert!(c.chunk("").is_empty());
        assert!(c.chunk("   \n\n ").is_empty());
    }

    #[test]
    fn test_overlap_must_be_less_than_chunk_size() {
        assert!(matches!(Chunker::new(5, 5, true), Err(RagError::InvalidConfig(_))));
        assert!(matches!(Chunker::new(5, 9, true), Err(RagError::InvalidConfig(_))));
        assert!(matches!(Chunker::new(0, 0, true), Err(RagError::InvalidConfig(_))));
        assert!(Chunker::new(5, 4, true).is_ok());
    }

    #[test]
    fn test_defaults() {
        let c = Chunker::default();
        assert_eq!((c.chunk_size(), c.overlap(), c.respects_pages()), (600, 120, true));
    }

    #[test]
    fn test_every_word_covered_in_order() {
        for (size, overlap) in [(1, 0), (3, 1), (7, 3), (10, 9), (50, 10)] {
            let c      = Chunker::new(size, overlap, false).unwrap();
            let text   = words(37);
            let chunks = c.chunk(&text);

            // Walk the chunks, dropping the overlapping prefix of each
            let mut rebuilt: Vec<String> = Vec::new();
            for (i, chunk) in chunks.iter().enumerate() {
                let ws: Vec<&str> = chunk.split(' ').collect();
                assert!(ws.len() <= size);
                let skip = if i == 0 { 0 } else { overlap };
                rebuilt.extend(ws[skip..].iter().map(|w| w.to_string()));
            }
            assert_eq!(rebuilt.join(" "), text, "size={size} overlap={overlap}");
            assert_eq!(chunks.len(), c.num_chunks(37));
        }
    }

    #[test]
    fn test_every_word_covered_in_order_per_page() {
        // Pages of 0, 3, 11 and 17 body words (+2 marker words each)
        let text = ["", "a b c", &words(11), &words(17)]
            .iter()
            .enumerate()
            .map(|(i, body)| format!("[Page {}]\n{body}", i + 1))
            .collect::<Vec<_>>()
            .join("\n\n");

        for (size, overlap) in [(6, 2), (1, 0), (4, 3), (30, 5)] {
            let c      = Chunker::new(size, overlap, true).unwrap();
            let chunks = c.chunk(&text);

            // Overlap is only shared between windows of the same page
            let mut rebuilt: Vec<&str> = Vec::new();
            for (i, chunk) in chunks.iter().enumerate() {
                let ws: Vec<&str> = chunk.split(' ').collect();
                assert!(ws.len() <= size);
                let page_start = i == 0 || chunk.starts_with("[Page ");
                let skip       = if page_start { 0 } else { overlap };
                rebuilt.extend(&ws[skip..]);
            }
            let expected: Vec<&str> = text.split_whitespace().collect();
            assert_eq!(rebuilt, expected, "size={size} overlap={overlap}");
        }
    }

    #[test]
    fn test_consecutive_chunks_share_overlap() {
        let c      = Chunker::new(6, 2, true).unwrap();
        let chunks = c.chunk(&words(20));
        for pair in chunks.windows(2) {
            let a: Vec<&str> = pair[0].split(' ').collect();
            let b: Vec<&str> = pair[1].split(' ').collect();
            assert_eq!(&a[a.len() - 2..], &b[..2]);
        }
    }

    #[test]
    fn test_chunks_never_span_pages() {
        let c    = Chunker::new(4, 1, true).unwrap();
        let text = "[Page 1]\none two three four five six\n\n[Page 2]\nseven eight nine\n\n[Page 3]\nten";
        let chunks = c.chunk(text);
        for chunk in &chunks {
            assert!(PAGE_MARKER.find_iter(chunk).count() <= 1, "{chunk}");
        }
        // Each page's first window starts with its marker
        let starts: Vec<&String> = chunks.iter().filter(|c| c.starts_with("[Page")).collect();
        assert_eq!(starts.len(), 3);
    }

    #[test]
    fn test_page_windowing_math() {
        // "[Page 1]" is two words: "[Page" and "1]"
        // Page 1: [Page 1] The cat sat on the mat.  → 8 words
        // Page 2: [Page 2] Dogs bark loudly.        → 5 words
        let c    = Chunker::new(5, 1, true).unwrap();
        let text = "[Page 1]\nThe cat sat on the mat. [Page 2]\nDogs bark loudly.";
        assert_eq!(
            c.chunk(text),
            vec![
                "[Page 1] The cat sat",
                "sat on the mat.",
                "[Page 2] Dogs bark loudly.",
            ]
        );
    }

    #[test]
    fn test_one_chunk_per_short_page() {
        let c    = Chunker::new(5, 1, true).unwrap();
        let text = "[Page 1]\nThe cat sat. [Page 2]\nDogs bark loudly.";
        assert_eq!(c.chunk(text), vec!["[Page 1] The cat sat.", "[Page 2] Dogs bark loudly."]);
    }

    #[test]
    fn test_pages_ignored_when_disabled() {
        let c    = Chunker::new(5, 1, false).unwrap();
        let text = "[Page 1]\nThe cat sat. [Page 2]\nDogs bark loudly.";
        assert_eq!(
            c.chunk(text),
            vec!["[Page 1] The cat sat.", "sat. [Page 2] Dogs bark", "bark loudly."]
        );
    }

    #[test]
    fn test_text_before_first_marker_is_its_own_segment() {
        assert_eq!(split_pages("preface [Page 1] body"), vec!["preface ", "[Page 1] body"]);
        assert_eq!(split_pages("no markers"), vec!["no markers"]);
        assert_eq!(split_pages("[Page 1] a [Page 2] b"), vec!["[Page 1] a ", "[Page 2] b"]);
    }

    #[test]
    fn test_carriage_returns_are_whitespace() {
        let c = Chunker::new(10, 2, false).unwrap();
        assert_eq!(c.chunk("one\rtwo\r\nthree"), vec!["one two three"]);
    }
}
