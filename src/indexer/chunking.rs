//! Overlapping character-window chunker for page and document text.
//!
//! Windows hold at most `target` characters and are cut at the largest semantic boundary that
//! fits: paragraph, then line, then sentence, then word, then character. The next window repeats
//! up to `overlap` characters of the previous one.

use text_splitter::{ChunkConfig, TextSplitter};

/// Target window size for pages and documents, in characters.
pub const CHUNK_TARGET_CHARS: usize = 2000;
/// Characters repeated at the start of the following window.
pub const CHUNK_OVERLAP_CHARS: usize = 300;

/// Split `text` into trimmed, non-empty, overlapping chunks.
pub fn split_text(text: &str, target: usize, overlap: usize) -> Vec<String> {
    let target = target.max(1);
    let overlap = overlap.min(target / 2);
    let config = ChunkConfig::new(target)
        .with_overlap(overlap)
        .unwrap_or_else(|_| ChunkConfig::new(target));
    let splitter = TextSplitter::new(config);

    let chunks: Vec<String> = splitter
        .chunks(text)
        .map(str::trim)
        .filter(|chunk| !chunk.is_empty())
        .map(str::to_string)
        .collect();
    tracing::debug!(
        input_chars = text.chars().count(),
        chunks = chunks.len(),
        target,
        overlap,
        "Split text"
    );
    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sentence_text(sentences: usize) -> String {
        (0..sentences)
            .map(|i| format!("Sentence number {i} talks about oak parquet."))
            .collect::<Vec<_>>()
            .join(" ")
    }

    #[test]
    fn short_text_is_a_single_chunk() {
        assert_eq!(split_text("  Oak floors.  ", 2000, 300), vec!["Oak floors."]);
        assert!(split_text(" \n ", 2000, 300).is_empty());
    }

    #[test]
    fn chunks_respect_target_size() {
        let text = sentence_text(200);
        let chunks = split_text(&text, CHUNK_TARGET_CHARS, CHUNK_OVERLAP_CHARS);
        assert!(chunks.len() > 1);
        assert!(chunks.iter().all(|chunk| chunk.chars().count() <= CHUNK_TARGET_CHARS));
        assert!(chunks.last().expect("last").ends_with("Sentence number 199 talks about oak parquet."));
    }

    #[test]
    fn consecutive_chunks_overlap() {
        let text = sentence_text(200);
        let chunks = split_text(&text, CHUNK_TARGET_CHARS, CHUNK_OVERLAP_CHARS);
        for pair in chunks.windows(2) {
            let head: String = pair[1].chars().take(40).collect();
            assert!(pair[0].contains(&head), "missing overlap before {head:?}");
        }
    }

    #[test]
    fn prefers_paragraph_then_sentence_boundaries() {
        let text = format!("{}\n\n{}", "a".repeat(70), "b ".repeat(30));
        let chunks = split_text(&text, 100, 0);
        assert_eq!(chunks[0], "a".repeat(70));

        let text = format!("{} Done. {}", "word ".repeat(12), "tail ".repeat(20));
        let chunks = split_text(&text, 80, 0);
        assert!(chunks[0].ends_with("Done."));
    }

    #[test]
    fn falls_back_to_hard_cut_without_boundaries() {
        let chunks = split_text(&"x".repeat(250), 100, 10);
        assert_eq!(chunks[0].len(), 100);
        assert!(chunks.iter().all(|chunk| chunk.len() <= 100));
    }

    #[test]
    fn splits_cyrillic_on_character_boundaries() {
        let text = "Дъбов паркет с лак. ".repeat(150);
        let chunks = split_text(&text, 500, 50);
        assert!(chunks.len() > 1);
        assert!(chunks.iter().all(|chunk| chunk.chars().count() <= 500));
        assert!(chunks[0].ends_with("лак."));
    }
}
