//! Hybrid Retriever (C7): classifies a query into `baseline`/`precision`
//! mode via a compiled pattern set, then routes to the Vector Store
//! accordingly (spec §4.7). The classifier follows the teacher pack's
//! `ClaimExtractor`-style fixed word/pattern lists (`rand-loop`'s
//! `epistemic::claims`), compiled once behind `OnceLock` rather than
//! per-call, since classification runs on every retrieval.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::OnceLock;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::errors::AppError;
use crate::models::memory::{MemoryRecord, MemoryType};

use super::vector_store::{MemoryFilter, VectorStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetrievalMode {
    Baseline,
    Precision,
}

#[derive(Debug, Clone)]
pub struct QueryClassification {
    pub mode: RetrievalMode,
    pub reason: &'static str,
    pub confidence: f32,
}

static ROLE_TERMS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(proponent said|opponent argued|moderator)\b").unwrap());
static TEMPORAL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(yesterday|earlier|last turn)\b").unwrap());
static CITATION: Lazy<Regex> = Lazy::new(|| Regex::new(r"\[\d+\]").unwrap());
static DOC_MARKER: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\b(ocr|uploaded|image)\b").unwrap());

fn patterns() -> &'static [(&'static Regex, &'static str, MemoryType)] {
    static PATTERNS: OnceLock<Vec<(&'static Regex, &'static str, MemoryType)>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        vec![
            (&*ROLE_TERMS, "role_term", MemoryType::RoleStatement),
            (&*TEMPORAL, "temporal_qualifier", MemoryType::DebateTurn),
            (&*CITATION, "citation_reference", MemoryType::WebMemory),
            (&*DOC_MARKER, "document_type_marker", MemoryType::UserDoc),
        ]
    })
}

/// Classify `query` per spec §4.7's trigger list, in the order listed
/// there — the first matching trigger determines `reason` and the
/// derived metadata filter.
pub fn classify(query: &str) -> (QueryClassification, Option<MemoryType>) {
    for (pattern, reason, kind) in patterns() {
        if pattern.is_match(query) {
            return (
                QueryClassification {
                    mode: RetrievalMode::Precision,
                    reason,
                    confidence: 0.8,
                },
                Some(*kind),
            );
        }
    }
    (
        QueryClassification {
            mode: RetrievalMode::Baseline,
            reason: "no precision trigger matched",
            confidence: 0.6,
        },
        None,
    )
}

#[derive(Default)]
pub struct RetrieverStats {
    pub baseline_count: AtomicU64,
    pub precision_count: AtomicU64,
    pub precision_fallback_count: AtomicU64,
}

pub struct HybridRetriever {
    store: std::sync::Arc<VectorStore>,
    top_k: usize,
    stats: RetrieverStats,
}

impl HybridRetriever {
    pub fn new(store: std::sync::Arc<VectorStore>, top_k: usize) -> Self {
        Self {
            store,
            top_k,
            stats: RetrieverStats::default(),
        }
    }

    /// Route `query` to baseline or precision search per its
    /// classification, falling back to baseline when precision returns
    /// nothing (spec §4.7 "On empty result, fall back to baseline").
    pub fn retrieve(
        &self,
        query_embedding: &[f32],
        query: &str,
    ) -> Result<(Vec<(MemoryRecord, f32)>, QueryClassification), AppError> {
        let (classification, filter) = classify(query);
        match classification.mode {
            RetrievalMode::Baseline => {
                self.stats.baseline_count.fetch_add(1, Ordering::Relaxed);
                let results = self.store.search(query_embedding, self.top_k, MemoryFilter::default())?;
                Ok((results, classification))
            }
            RetrievalMode::Precision => {
                self.stats.precision_count.fetch_add(1, Ordering::Relaxed);
                let mut results = self.store.search(
                    query_embedding,
                    self.top_k * 2,
                    MemoryFilter {
                        kind: filter,
                        source: None,
                    },
                )?;
                if results.is_empty() {
                    self.stats
                        .precision_fallback_count
                        .fetch_add(1, Ordering::Relaxed);
                    let baseline = self.store.search(query_embedding, self.top_k, MemoryFilter::default())?;
                    return Ok((
                        baseline,
                        QueryClassification {
                            mode: RetrievalMode::Baseline,
                            reason: "precision search returned no results",
                            confidence: classification.confidence,
                        },
                    ));
                }
                results.truncate(self.top_k);
                Ok((results, classification))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_role_term_as_precision() {
        let (c, filter) = classify("what did the proponent said about this");
        assert_eq!(c.mode, RetrievalMode::Precision);
        assert_eq!(filter, Some(MemoryType::RoleStatement));
    }

    #[test]
    fn classifies_citation_reference_as_precision() {
        let (c, _) = classify("can you expand on [2]");
        assert_eq!(c.mode, RetrievalMode::Precision);
    }

    #[test]
    fn classifies_plain_query_as_baseline() {
        let (c, filter) = classify("tell me about vaccines");
        assert_eq!(c.mode, RetrievalMode::Baseline);
        assert_eq!(filter, None);
    }

    #[test]
    fn precision_falls_back_to_baseline_on_empty_result() {
        let store = std::sync::Arc::new(VectorStore::in_memory(3).unwrap());
        let retriever = HybridRetriever::new(store, 5);
        let (results, classification) = retriever
            .retrieve(&[1.0, 0.0, 0.0], "what did the moderator say")
            .unwrap();
        assert!(results.is_empty());
        assert_eq!(classification.mode, RetrievalMode::Baseline);
    }
}
