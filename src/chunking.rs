/// Paragraph boundary in extracted document text
const PARAGRAPH_SEPARATOR: &str = "\n\n";

/// Default target chunk size, in characters
pub const DEFAULT_CHUNK_SIZE: usize = 1000;
/// Default overlap budget; every 10 units carry one word into the next chunk
pub const DEFAULT_CHUNK_OVERLAP: usize = 200;

/// Splits document text into ordered, overlapping chunks bounded by a target size
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chunker {
    target_size: usize,
    overlap_budget: usize,
}

impl Default for Chunker {
    fn default() -> Self {
        Chunker::new(DEFAULT_CHUNK_SIZE, DEFAULT_CHUNK_OVERLAP)
    }
}

impl Chunker {
    /// Create a chunker with the given target size and overlap budget
    pub fn new(target_size: usize, overlap_budget: usize) -> Self {
        Chunker {
            target_size,
            overlap_budget,
        }
    }

    /// Number of trailing words repeated at the start of the next word-split chunk
    pub fn overlap_words(&self) -> usize {
        self.overlap_budget / 10
    }

    /// Split text into chunks using this chunker's settings
    pub fn split(&self, text: &str) -> Vec<String> {
        split_into_chunks(text, self.target_size, self.overlap_budget)
    }
}

/// Text being accumulated into the next chunk, with its length in characters
#[derive(Default)]
struct ChunkBuffer {
    text: String,
    len: usize,
}

impl ChunkBuffer {
    fn push(&mut self, s: &str) {
        self.text.push_str(s);
        self.len += s.chars().count();
    }

    fn len(&self) -> usize {
        self.len
    }

    fn take(&mut self) -> String {
        self.len = 0;
        std::mem::take(&mut self.text)
    }
}

/// Split text into chunks of at most `target_size` characters.
///
/// Paragraphs (separated by a blank line) are packed together while they fit.
/// A paragraph longer than `target_size` is split at word boundaries, and each
/// of those chunks after the first starts with the last `overlap_budget / 10`
/// words of the one before it. Paragraph-level chunks carry no overlap.
pub fn split_into_chunks(text: &str, target_size: usize, overlap_budget: usize) -> Vec<String> {
    let overlap_words = overlap_budget / 10;

    let mut chunks = Vec::new();
    let mut current = ChunkBuffer::default();

    for paragraph in text
        .split(PARAGRAPH_SEPARATOR)
        .filter(|p| !p.trim().is_empty())
    {
        let paragraph_len = paragraph.chars().count();

        // Boundary is checked before appending, so a fitting paragraph always joins
        if current.len() + paragraph_len <= target_size {
            current.push(paragraph);
            current.push(PARAGRAPH_SEPARATOR);
            continue;
        }

        push_chunk(&mut chunks, &current.take());

        if paragraph_len > target_size {
            for word in paragraph.split_whitespace() {
                if current.len() + word.chars().count() > target_size {
                    let emitted = current.take();
                    push_chunk(&mut chunks, &emitted);

                    current.push(&overlap_tail(&emitted, overlap_words));
                    current.push(" ");
                }
                current.push(word);
                current.push(" ");
            }
        } else {
            current.push(paragraph);
            current.push(PARAGRAPH_SEPARATOR);
        }
    }

    push_chunk(&mut chunks, &current.take());

    chunks
}

/// Push the trimmed buffer as a finished chunk, skipping blank buffers
fn push_chunk(chunks: &mut Vec<String>, buffer: &str) {
    let trimmed = buffer.trim();
    if !trimmed.is_empty() {
        chunks.push(trimmed.to_string());
    }
}

/// Last `words` whitespace-separated words of `buffer`, space-joined
fn overlap_tail(buffer: &str, words: usize) -> String {
    if words == 0 {
        return String::new();
    }

    let all: Vec<&str> = buffer.split_whitespace().collect();
    all[all.len().saturating_sub(words)..].join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    impl Chunker {
        pub(crate) fn target_size(&self) -> usize {
            self.target_size
        }
    }

    fn numbered_words(count: usize) -> String {
        (0..count)
            .map(|i| format!("w{}", i))
            .collect::<Vec<_>>()
            .join(" ")
    }

    #[test]
    fn test_empty_and_blank_input() {
        assert!(split_into_chunks("", 1000, 200).is_empty());
        assert!(split_into_chunks("   \n\n  ", 1000, 200).is_empty());
        assert!(split_into_chunks("\n\n\n\n\n\n", 10, 0).is_empty());
    }

    #[test]
    fn test_small_paragraphs_are_packed() {
        let text = "First paragraph.\n\nSecond paragraph.";
        let chunks = split_into_chunks(text, 1000, 200);
        assert_eq!(chunks, vec!["First paragraph.\n\nSecond paragraph."]);
    }

    #[test]
    fn test_single_newlines_preserved() {
        let chunks = split_into_chunks("line one\nline two\n\nnext", 1000, 200);
        assert_eq!(chunks, vec!["line one\nline two\n\nnext"]);
    }

    #[test]
    fn test_paragraph_boundary_flush_has_no_overlap() {
        let first = "a".repeat(20);
        let second = "b".repeat(20);
        let text = format!("{}\n\n{}", first, second);

        let chunks = split_into_chunks(&text, 30, 200);
        assert_eq!(chunks, vec![first, second]);
    }

    #[test]
    fn test_word_split_with_overlap() {
        let chunks = split_into_chunks("aaa bbb ccc ddd", 10, 10);
        assert_eq!(chunks, vec!["aaa bbb", "bbb ccc", "ccc ddd"]);
    }

    #[test]
    fn test_word_split_without_overlap() {
        // 5 / 10 == 0 words of overlap
        let chunks = split_into_chunks("aaa bbb ccc ddd", 10, 5);
        assert_eq!(chunks, vec!["aaa bbb", "ccc ddd"]);
    }

    #[test]
    fn test_word_split_remainder_joins_next_paragraph() {
        let chunks = split_into_chunks("aaa bbb ccc ddd\n\nee", 10, 10);
        assert_eq!(chunks, vec!["aaa bbb", "bbb ccc", "ccc ddd ee"]);
    }

    #[test]
    fn test_overlap_words_prefix_each_following_chunk() {
        let text = numbered_words(40);
        let chunker = Chunker::new(40, 30);
        let chunks = chunker.split(&text);
        assert!(chunks.len() >= 2);

        let n = chunker.overlap_words();
        assert_eq!(n, 3);
        for pair in chunks.windows(2) {
            let prev: Vec<&str> = pair[0].split_whitespace().collect();
            let next: Vec<&str> = pair[1].split_whitespace().collect();
            assert_eq!(&next[..n], &prev[prev.len() - n..]);
        }
    }

    #[test]
    fn test_oversized_word_is_never_an_empty_chunk() {
        let long_word = "x".repeat(25);
        let text = format!("{} tail", long_word);
        let chunks = split_into_chunks(&text, 10, 0);
        assert_eq!(chunks, vec![long_word, "tail".to_string()]);
    }

    #[test]
    fn test_chunks_non_empty_and_deterministic() {
        let text = format!(
            "Intro line.\n\n  \n\n{}\n\nShort.\n\n\n\n{}\nend",
            numbered_words(120),
            numbered_words(15)
        );
        let first = split_into_chunks(&text, 64, 100);
        let second = split_into_chunks(&text, 64, 100);

        assert_eq!(first, second);
        assert!(!first.is_empty());
        for chunk in &first {
            assert!(!chunk.trim().is_empty());
            assert_eq!(chunk, chunk.trim());
        }
    }

    #[test]
    fn test_paragraph_chunks_within_target() {
        let paragraphs: Vec<String> = (0..30)
            .map(|i| format!("Paragraph number {} has some words.", i))
            .collect();
        let text = paragraphs.join("\n\n");

        for chunk in split_into_chunks(&text, 120, 200) {
            assert!(chunk.chars().count() <= 120, "chunk too long: {:?}", chunk);
        }
    }

    #[test]
    fn test_length_counts_characters_not_bytes() {
        let text = "ééééé\n\nüüüüü";
        assert_eq!(split_into_chunks(text, 5, 0), vec!["ééééé", "üüüüü"]);
    }

    #[test]
    fn test_default_chunker_settings() {
        let chunker = Chunker::default();
        assert_eq!(chunker.target_size(), DEFAULT_CHUNK_SIZE);
        assert_eq!(chunker.overlap_words(), 20);
    }
}
