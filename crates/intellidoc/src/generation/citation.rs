//! Strict citation parsing and grounding
//!
//! Grammar: a marker is `[` n (`,` n)* `]` where n is a decimal passage
//! number, 1-based, into the passages supplied to the generator. Numbers
//! outside that range are grounding violations and are stripped.

use regex::{Captures, Regex};
use std::collections::HashSet;
use std::sync::OnceLock;

use crate::error::Result;
use crate::providers::vector_store::VectorSearchResult;
use crate::types::{Citation, GroundingViolation};

fn marker_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"([ \t]*)\[(\s*\d+\s*(?:,\s*\d+\s*)*)\]")
            .expect("citation marker regex is valid")
    })
}

/// Answer text after grounding, with the citations that survived
#[derive(Debug, Clone, Default)]
pub struct ParsedAnswer {
    /// Answer with invalid markers removed
    pub answer: String,
    /// Citations in order of first appearance
    pub citations: Vec<Citation>,
    /// Markers that referenced no supplied passage
    pub violations: Vec<GroundingViolation>,
}

impl ParsedAnswer {
    /// Fail on the first violation instead of recovering from it
    pub fn into_strict(self) -> Result<Self> {
        match self.violations.into_iter().next() {
            Some(violation) => Err(violation.into()),
            None => Ok(Self {
                violations: Vec::new(),
                ..self
            }),
        }
    }
}

/// Extract citations from a generated answer and link them to the supplied passages
pub fn extract_and_link_citations(answer: &str, passages: &[VectorSearchResult]) -> ParsedAnswer {
    let mut citations: Vec<Citation> = Vec::new();
    let mut seen: HashSet<usize> = HashSet::new();
    let mut violations = Vec::new();

    let rewritten = marker_pattern().replace_all(answer, |caps: &Captures| {
        let leading = caps.get(1).map_or("", |m| m.as_str());
        let mut kept: Vec<usize> = Vec::new();

        for raw in caps[2].split(',').map(str::trim) {
            match raw.parse::<usize>() {
                Ok(n) if (1..=passages.len()).contains(&n) => {
                    if !kept.contains(&n) {
                        kept.push(n);
                    }
                    if seen.insert(n) {
                        let result = &passages[n - 1];
                        citations.push(Citation::from_chunk(&result.chunk, n, result.similarity));
                    }
                }
                _ => {
                    let violation = GroundingViolation {
                        marker: raw.to_string(),
                        reason: format!(
                            "does not match any of the {} supplied passages",
                            passages.len()
                        ),
                    };
                    tracing::warn!(
                        "Grounding violation: [{}] {}",
                        violation.marker,
                        violation.reason
                    );
                    violations.push(violation);
                }
            }
        }

        if kept.is_empty() {
            String::new()
        } else {
            let numbers: Vec<String> = kept.iter().map(|n| n.to_string()).collect();
            format!("{}[{}]", leading, numbers.join(", "))
        }
    });

    ParsedAnswer {
        answer: rewritten.trim().to_string(),
        citations,
        violations,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::types::{Chunk, ChunkSource};
    use uuid::Uuid;

    fn passages(n: usize) -> Vec<VectorSearchResult> {
        (0..n)
            .map(|i| VectorSearchResult {
                chunk: Chunk::new(
                    Uuid::new_v4(),
                    format!("passage {}", i),
                    ChunkSource {
                        filename: "doc.pdf".into(),
                        page_number: Some(i as u32 + 1),
                    },
                    0,
                    9,
                    i as u32,
                ),
                similarity: 0.9 - i as f32 * 0.1,
            })
            .collect()
    }

    #[test]
    fn test_links_valid_markers() {
        let supplied = passages(3);
        let parsed = extract_and_link_citations("Cats sleep [2]. Dogs bark [1, 2].", &supplied);

        assert_eq!(parsed.answer, "Cats sleep [2]. Dogs bark [1, 2].");
        assert!(parsed.violations.is_empty());
        let ids: Vec<Uuid> = parsed.citations.iter().map(|c| c.passage_id).collect();
        assert_eq!(ids, vec![supplied[1].chunk.id, supplied[0].chunk.id]);
        assert_eq!(parsed.citations[0].marker, 2);
        assert_eq!(parsed.citations[0].page_number, Some(2));
    }

    #[test]
    fn test_strips_invented_markers() {
        let supplied = passages(2);
        let parsed =
            extract_and_link_citations("Fact one [1]. Invented [7]. Mixed [2, 9].", &supplied);

        assert_eq!(parsed.answer, "Fact one [1]. Invented. Mixed [2].");
        assert_eq!(parsed.citations.len(), 2);
        let markers: Vec<&str> = parsed
            .violations
            .iter()
            .map(|v| v.marker.as_str())
            .collect();
        assert_eq!(markers, vec!["7", "9"]);
    }

    #[test]
    fn test_zero_and_no_passages_are_violations() {
        let parsed = extract_and_link_citations("Nothing here [0] [1]", &[]);
        assert_eq!(parsed.answer, "Nothing here");
        assert!(parsed.citations.is_empty());
        assert_eq!(parsed.violations.len(), 2);
    }

    #[test]
    fn test_every_citation_is_supplied() {
        let supplied = passages(4);
        let parsed =
            extract_and_link_citations("[4] [3] [12] [1,1] [99999999999999999999999]", &supplied);
        let supplied_ids: HashSet<Uuid> = supplied.iter().map(|p| p.chunk.id).collect();

        assert!(parsed
            .citations
            .iter()
            .all(|c| supplied_ids.contains(&c.passage_id)));
        assert_eq!(parsed.citations.len(), 3);
        assert_eq!(parsed.violations.len(), 2);
        assert!(parsed.answer.contains("[1]"));
        assert!(!parsed.answer.contains("[1, 1]"));
    }

    #[test]
    fn test_plain_brackets_are_not_markers() {
        let parsed = extract_and_link_citations("See [appendix] and [a, b].", &passages(1));
        assert_eq!(parsed.answer, "See [appendix] and [a, b].");
        assert!(parsed.violations.is_empty());
    }

    #[test]
    fn test_strict_mode() {
        let parsed = extract_and_link_citations("Bad [5]", &passages(1));
        assert!(matches!(parsed.into_strict(), Err(Error::GroundingViolation { .. })));

        let parsed = extract_and_link_citations("Good [1]", &passages(1));
        assert_eq!(parsed.into_strict().unwrap().citations.len(), 1);
    }
}
