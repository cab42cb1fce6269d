//! Text chunking with character offset tracking
//!
//! Spans are cut at the best break point inside each window (paragraph,
//! line, sentence, whitespace, then a hard cut) and each span after the
//! first starts exactly `chunk_overlap` characters before the previous
//! one ended. Offsets count Unicode scalar values, not bytes.

use unicode_segmentation::UnicodeSegmentation;

use crate::config::ChunkingConfig;
use crate::error::Result;
use crate::types::{Chunk, ChunkSource, Document};

/// Text chunker with configurable size and overlap
#[derive(Debug, Clone, Copy)]
pub struct TextChunker {
    /// Maximum chunk size in characters
    chunk_size: usize,
    /// Overlap between consecutive chunks in characters
    overlap: usize,
}

/// A span of the source text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextSpan<'a> {
    /// Position in the chunk sequence
    pub index: u32,
    /// First character, inclusive
    pub char_start: usize,
    /// Last character, exclusive
    pub char_end: usize,
    /// The exact source text of the span
    pub text: &'a str,
}

impl TextChunker {
    /// Create a new chunker, rejecting configurations that cannot make progress
    pub fn new(config: ChunkingConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            chunk_size: config.chunk_size,
            overlap: config.chunk_overlap,
        })
    }

    /// Iterate over the spans of `text`. Calling again restarts from the beginning.
    pub fn spans<'a>(&self, text: &'a str) -> ChunkSpans<'a> {
        let mut offsets: Vec<usize> = text.char_indices().map(|(i, _)| i).collect();
        offsets.push(text.len());

        ChunkSpans {
            text,
            offsets,
            chunk_size: self.chunk_size,
            overlap: self.overlap,
            next_start: 0,
            next_index: 0,
            done: text.is_empty(),
        }
    }

    /// Chunk a document into passages owned by it
    pub fn chunk_document(&self, doc: &Document) -> Vec<Chunk> {
        self.spans(&doc.text)
            .map(|span| {
                let source = ChunkSource {
                    filename: doc.filename.clone(),
                    page_number: doc.page_at(span.char_start),
                };
                Chunk::new(
                    doc.id,
                    span.text.to_string(),
                    source,
                    span.char_start,
                    span.char_end,
                    span.index,
                )
            })
            .collect()
    }
}

/// Iterator over the spans of one text
#[derive(Debug, Clone)]
pub struct ChunkSpans<'a> {
    text: &'a str,
    /// Byte offset of every character, plus `text.len()`
    offsets: Vec<usize>,
    chunk_size: usize,
    overlap: usize,
    next_start: usize,
    next_index: u32,
    done: bool,
}

impl<'a> ChunkSpans<'a> {
    fn char_count(&self) -> usize {
        self.offsets.len() - 1
    }

    fn char_at_byte(&self, byte: usize) -> usize {
        self.offsets.binary_search(&byte).unwrap_or_else(|i| i)
    }

    fn slice(&self, start: usize, end: usize) -> &'a str {
        &self.text[self.offsets[start]..self.offsets[end]]
    }

    /// Pick the end of a span starting at `start` whose window ends at `window_end`.
    ///
    /// The result lies in `start + overlap + 1 ..= window_end` so the next span
    /// always starts after this one.
    fn break_point(&self, start: usize, window_end: usize) -> usize {
        let min_end = start + self.overlap + 1;
        let base = self.offsets[start];
        let window = self.slice(start, window_end);

        for separator in ["\n\n", "\n"] {
            if let Some(pos) = window.rfind(separator) {
                let end = self.char_at_byte(base + pos + separator.len());
                if end >= min_end {
                    return end;
                }
            }
        }

        if let Some(end) = window
            .split_sentence_bound_indices()
            .map(|(pos, _)| self.char_at_byte(base + pos))
            .filter(|end| *end >= min_end)
            .last()
        {
            return end;
        }

        if let Some((pos, ws)) = window
            .char_indices()
            .filter(|(_, c)| c.is_whitespace())
            .last()
        {
            let end = self.char_at_byte(base + pos + ws.len_utf8());
            if end >= min_end {
                return end;
            }
        }

        window_end
    }
}

impl<'a> Iterator for ChunkSpans<'a> {
    type Item = TextSpan<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        let total = self.char_count();
        let start = self.next_start;
        let window_end = (start + self.chunk_size).min(total);
        let end = if window_end == total {
            total
        } else {
            self.break_point(start, window_end)
        };

        let span = TextSpan {
            index: self.next_index,
            char_start: start,
            char_end: end,
            text: self.slice(start, end),
        };

        if end == total {
            self.done = true;
        } else {
            self.next_start = end - self.overlap;
            self.next_index += 1;
        }

        Some(span)
    }
}

impl std::iter::FusedIterator for ChunkSpans<'_> {}

/// Rebuild the source text from consecutive spans by dropping each overlap
pub fn reconstruct(spans: &[TextSpan<'_>]) -> String {
    let mut out = String::new();
    let mut covered = 0usize;

    for span in spans {
        let skip = covered.saturating_sub(span.char_start);
        out.extend(span.text.chars().skip(skip));
        covered = span.char_end;
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use proptest::prelude::*;

    fn chunker(chunk_size: usize, chunk_overlap: usize) -> TextChunker {
        TextChunker::new(ChunkingConfig {
            chunk_size,
            chunk_overlap,
        })
        .unwrap()
    }

    #[test]
    fn test_rejects_invalid_config() {
        let err = TextChunker::new(ChunkingConfig {
            chunk_size: 10,
            chunk_overlap: 10,
        })
        .unwrap_err();
        assert!(matches!(err, Error::InvalidConfiguration(_)));

        let err = TextChunker::new(ChunkingConfig {
            chunk_size: 0,
            chunk_overlap: 0,
        })
        .unwrap_err();
        assert!(matches!(err, Error::InvalidConfiguration(_)));
    }

    #[test]
    fn test_short_text_single_span() {
        let spans: Vec<_> = chunker(100, 10).spans("A short note.").collect();
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].char_start, 0);
        assert_eq!(spans[0].char_end, 13);
        assert_eq!(spans[0].text, "A short note.");
    }

    #[test]
    fn test_empty_text_has_no_spans() {
        assert_eq!(chunker(100, 10).spans("").count(), 0);
    }

    #[test]
    fn test_prefers_paragraph_breaks() {
        let first = "a".repeat(60);
        let second = "b".repeat(60);
        let text = format!("{}\n\n{}", first, second);

        let spans: Vec<_> = chunker(80, 10).spans(&text).collect();
        assert_eq!(spans[0].char_end, 62);
        assert!(spans[0].text.ends_with("\n\n"));
        assert_eq!(spans[1].char_start, 52);
        assert_eq!(reconstruct(&spans), text);
    }

    #[test]
    fn test_sentence_then_word_breaks() {
        let text = "One sentence here. Another sentence follows it. And a third one ends.";
        let spans: Vec<_> = chunker(30, 5).spans(text).collect();

        assert!(spans.len() > 1);
        assert!(spans[0].text.ends_with(". "));
        for pair in spans.windows(2) {
            assert_eq!(pair[0].char_end - pair[1].char_start, 5);
            assert!(pair[1].char_start > pair[0].char_start);
        }
        assert_eq!(reconstruct(&spans), text);
    }

    #[test]
    fn test_spans_are_restartable() {
        let c = chunker(20, 4);
        let text = "restartable sequences should yield identical spans every time";
        let first: Vec<_> = c.spans(text).collect();
        let second: Vec<_> = c.spans(text).collect();
        assert_eq!(first, second);

        let mut iter = c.spans(text);
        iter.next();
        let cloned: Vec<_> = iter.clone().collect();
        let rest: Vec<_> = iter.collect();
        assert_eq!(cloned, rest);
    }

    #[test]
    fn test_chunk_document_pages() {
        let doc = Document::new(
            "book.pdf",
            format!("{}\u{000C}{}", "x".repeat(50), "y".repeat(50)),
        );
        let chunks = chunker(40, 5).chunk_document(&doc);

        assert!(chunks.iter().all(|c| c.document_id == doc.id));
        assert_eq!(chunks.first().unwrap().source.page_number, Some(1));
        assert_eq!(chunks.last().unwrap().source.page_number, Some(2));
        for (i, c) in chunks.iter().enumerate() {
            assert_eq!(c.chunk_index as usize, i);
        }
    }

    proptest! {
        #[test]
        fn prop_spans_reconstruct_text(
            text in "[a-zA-Z .,\n é漢]{0,400}",
            size in 1usize..60,
            overlap_seed in 0usize..60,
        ) {
            let overlap = overlap_seed % size;
            let spans: Vec<_> = chunker(size, overlap).spans(&text).collect();

            prop_assert_eq!(reconstruct(&spans), text.clone());
            for span in &spans {
                prop_assert!(span.char_end - span.char_start <= size);
                prop_assert!(span.char_end > span.char_start);
            }
            for pair in spans.windows(2) {
                prop_assert!(pair[1].char_start > pair[0].char_start);
                prop_assert_eq!(pair[0].char_end - pair[1].char_start, overlap);
            }
            if let Some(last) = spans.last() {
                prop_assert_eq!(last.char_end, text.chars().count());
            }
        }
    }
}
