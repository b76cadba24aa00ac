//! Evidence Gatherer (C10): topic -> ranked [`EvidenceBundle`] (spec
//! §4.10). Candidate discovery is behind an abstract `SearchBackend` so
//! the concrete search provider can be swapped without touching ranking
//! or fetch/summarize plumbing. Fetch+summarize work fans out over a
//! bounded worker pool the same way the teacher fans out retries —
//! `buffer_unordered` rather than one task per URL, so `max_io_workers`
//! is a hard ceiling on concurrent sockets.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use chrono::Utc;
use futures::stream::{self, StreamExt};

use crate::models::evidence::{EvidenceBundle, EvidenceMethod, SourceType};
use crate::models::memory::{MemoryMetadata, MemoryType};

use super::cache::UrlCache;
use super::fetcher::WebFetcher;
use super::summarizer::Summarizer;

const DEFAULT_WORKERS: usize = 4;

/// Abstract candidate-URL source (spec §4.10 "abstract interface
/// `search(topic, n) -> [url]`").
#[async_trait]
pub trait SearchBackend: Send + Sync {
    async fn search(&self, topic: &str, n: usize) -> Vec<String>;
}

/// Fixed candidate list, useful for tests and for operators who curate a
/// known-good source list rather than querying a live search API.
pub struct StaticSearchBackend {
    candidates: Vec<String>,
}

impl StaticSearchBackend {
    pub fn new(candidates: Vec<String>) -> Self {
        Self { candidates }
    }
}

#[async_trait]
impl SearchBackend for StaticSearchBackend {
    async fn search(&self, _topic: &str, n: usize) -> Vec<String> {
        self.candidates.iter().take(n).cloned().collect()
    }
}

/// Per-domain authority table (spec §4.10 "authority score per domain
/// from a configurable table"). Unknown domains default to 0.3.
pub struct AuthorityTable {
    scores: HashMap<String, f32>,
    default_score: f32,
}

impl Default for AuthorityTable {
    fn default() -> Self {
        let mut scores = HashMap::new();
        scores.insert("wikipedia.org".to_string(), 0.8);
        scores.insert("reuters.com".to_string(), 0.9);
        scores.insert("apnews.com".to_string(), 0.9);
        scores.insert("nature.com".to_string(), 0.95);
        scores.insert("nih.gov".to_string(), 0.95);
        scores.insert("who.int".to_string(), 0.9);
        Self {
            scores,
            default_score: 0.3,
        }
    }
}

impl AuthorityTable {
    pub fn score_for(&self, domain: &str) -> f32 {
        self.scores
            .iter()
            .find(|(k, _)| domain == k.as_str() || domain.ends_with(&format!(".{k}")))
            .map(|(_, v)| *v)
            .unwrap_or(self.default_score)
    }
}

pub fn classify_source_type(domain: &str) -> SourceType {
    if domain.ends_with(".gov") || domain.ends_with(".int") {
        SourceType::Government
    } else if domain.ends_with(".edu") || domain.contains("nature.com") || domain.contains("nih.gov") {
        SourceType::Academic
    } else if domain.contains("reuters.com") || domain.contains("apnews.com") || domain.contains("bbc.") {
        SourceType::News
    } else if domain.contains("wikipedia.org") {
        SourceType::Reference
    } else if domain.contains("reddit.com") || domain.contains("twitter.com") || domain.contains("x.com") {
        SourceType::Social
    } else if domain.contains("blog") || domain.contains("medium.com") {
        SourceType::Blog
    } else {
        SourceType::Unknown
    }
}

/// Lexical overlap between topic and summary text, in [0,1]. A stand-in
/// for an embedding-based semantic match — cheap enough to run inline
/// during ranking without another Gateway round trip.
pub fn semantic_match(topic: &str, summary: &str) -> f32 {
    let topic_words: std::collections::HashSet<String> = topic
        .to_lowercase()
        .split_whitespace()
        .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()).to_string())
        .filter(|w| w.len() > 2)
        .collect();
    if topic_words.is_empty() {
        return 0.0;
    }
    let summary_lower = summary.to_lowercase();
    let matched = topic_words
        .iter()
        .filter(|w| summary_lower.contains(w.as_str()))
        .count();
    (matched as f32 / topic_words.len() as f32).min(1.0)
}

struct RankedCandidate {
    url: String,
    domain: String,
    title: Option<String>,
    summary: String,
    authority: f32,
    source_type: SourceType,
    score: f32,
}

pub struct EvidenceGatherer {
    search: Arc<dyn SearchBackend>,
    fetcher: Arc<WebFetcher>,
    cache: Arc<UrlCache>,
    summarizer: Arc<Summarizer>,
    authority: AuthorityTable,
    workers: usize,
    max_candidates: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RagStatus {
    CacheHit,
    LiveFetch,
    InternalKnowledge,
}

impl RagStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RagStatus::CacheHit => "CACHE_HIT",
            RagStatus::LiveFetch => "LIVE_FETCH",
            RagStatus::InternalKnowledge => "INTERNAL_KNOWLEDGE",
        }
    }
}

pub struct GatherOutcome {
    pub bundle: EvidenceBundle,
    pub rag_status: RagStatus,
    /// Freshly-fetched (url, summary) pairs — written back into the
    /// Vector Store by the caller as `web_memory` facts (spec §4.6
    /// "learning loop").
    pub learned: Vec<(String, String)>,
}

impl EvidenceGatherer {
    pub fn new(
        search: Arc<dyn SearchBackend>,
        fetcher: Arc<WebFetcher>,
        cache: Arc<UrlCache>,
        summarizer: Arc<Summarizer>,
        max_candidates: usize,
    ) -> Self {
        Self {
            search,
            fetcher,
            cache,
            summarizer,
            authority: AuthorityTable::default(),
            workers: DEFAULT_WORKERS,
            max_candidates,
        }
    }

    pub async fn gather(&self, topic: &str, top_k: usize) -> GatherOutcome {
        let started = Instant::now();
        let candidates = self.search.search(topic, self.max_candidates).await;
        let mut learned = Vec::new();
        let mut any_from_cache = false;
        let mut any_live = false;

        let results: Vec<Option<RankedCandidate>> = stream::iter(candidates.into_iter().map(|url| {
            let fetcher = self.fetcher.clone();
            let cache = self.cache.clone();
            let summarizer = self.summarizer.clone();
            let topic = topic.to_string();
            async move {
                let domain = domain_of(&url);
                if let Some(entry) = cache.get(&url) {
                    return Some((
                        RankedCandidate {
                            url,
                            domain,
                            title: None,
                            summary: entry.summary,
                            authority: 0.0,
                            source_type: SourceType::Unknown,
                            score: 0.0,
                        },
                        EvidenceMethod::Cache,
                    ));
                }
                let page = match fetcher.fetch(&url).await {
                    Ok(p) => p,
                    Err(e) => {
                        tracing::warn!(url = %url, error = %e, "evidence fetch failed, skipping");
                        return None;
                    }
                };
                let summary = match summarizer.summarize(&topic, &page.text).await {
                    Ok(s) => s,
                    Err(e) => {
                        tracing::warn!(url = %url, error = %e, "evidence summarize failed, skipping");
                        return None;
                    }
                };
                cache
                    .put(&url, summary.clone(), page.text.chars().take(4_000).collect(), Utc::now())
                    .await;
                Some((
                    RankedCandidate {
                        url,
                        domain,
                        title: page.title,
                        summary,
                        authority: 0.0,
                        source_type: SourceType::Unknown,
                        score: 0.0,
                    },
                    EvidenceMethod::Live,
                ))
            }
        }))
        .buffer_unordered(self.workers)
        .collect()
        .await;

        let mut ranked: Vec<(RankedCandidate, EvidenceMethod)> = Vec::new();
        for item in results.into_iter().flatten() {
            let (mut candidate, method) = item;
            match method {
                EvidenceMethod::Cache => any_from_cache = true,
                EvidenceMethod::Live => {
                    any_live = true;
                    learned.push((candidate.url.clone(), candidate.summary.clone()));
                }
                EvidenceMethod::VectorRecall => {}
            }
            candidate.authority = self.authority.score_for(&candidate.domain);
            candidate.source_type = classify_source_type(&candidate.domain);
            candidate.score = candidate.authority * semantic_match(topic, &candidate.summary);
            ranked.push((candidate, method));
        }
        ranked.sort_by(|a, b| b.0.score.partial_cmp(&a.0.score).unwrap_or(std::cmp::Ordering::Equal));
        ranked.truncate(top_k);

        let mut bundle = EvidenceBundle::default();
        for (candidate, method) in ranked {
            bundle.push(crate::models::evidence::EvidenceItem {
                citation_idx: 0,
                url: candidate.url,
                domain: candidate.domain,
                title: candidate.title,
                snippet: candidate.summary,
                authority: candidate.authority,
                source_type: candidate.source_type,
                method,
                fetched_at: Utc::now(),
            });
        }

        let elapsed = started.elapsed();
        let rag_status = if bundle.is_empty() {
            RagStatus::InternalKnowledge
        } else if any_live && !any_from_cache {
            RagStatus::LiveFetch
        } else if elapsed.as_secs_f64() < 1.5 {
            RagStatus::CacheHit
        } else {
            RagStatus::LiveFetch
        };

        GatherOutcome {
            bundle,
            rag_status,
            learned,
        }
    }
}

fn domain_of(url: &str) -> String {
    url::Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(|h| h.to_string()))
        .unwrap_or_else(|| url.to_string())
}

/// Used by the Memory Manager to tag a freshly-learned web summary
/// before it is inserted into the Vector Store (spec §4.6). `source` is
/// the URL the summary was fetched from, so later retrieval can filter
/// on `{type=web_memory, source=u}` (P6).
pub fn web_memory_metadata(topic: &str, source: &str) -> MemoryMetadata {
    MemoryMetadata {
        kind: MemoryType::WebMemory,
        source: Some(source.to_string()),
        role: None,
        debate_id: None,
        topic: Some(topic.to_string()),
        timestamp: Utc::now(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn semantic_match_scores_overlap() {
        let score = semantic_match("climate change effects", "this article discusses climate policy");
        assert!(score > 0.0);
    }

    #[test]
    fn authority_table_falls_back_to_default() {
        let table = AuthorityTable::default();
        assert_eq!(table.score_for("random-blog.example"), 0.3);
        assert!(table.score_for("en.wikipedia.org") > 0.3);
    }

    #[test]
    fn classify_source_type_detects_government() {
        assert_eq!(classify_source_type("cdc.gov"), SourceType::Government);
        assert_eq!(classify_source_type("en.wikipedia.org"), SourceType::Reference);
    }

    #[tokio::test]
    async fn gather_returns_internal_knowledge_when_no_candidates() {
        let dir = tempfile::tempdir().unwrap();
        let cache = Arc::new(UrlCache::load(dir.path().join("c.json"), 3600));
        let fetcher = Arc::new(WebFetcher::new(5_000, 1_000_000));
        let gw = Arc::new(crate::gateway::Gateway::new(vec![Arc::new(
            crate::provider::MockProvider::always_ok("p1", "summary"),
        )]));
        let summarizer = Arc::new(Summarizer::new(gw));
        let search = Arc::new(StaticSearchBackend::new(vec![]));
        let gatherer = EvidenceGatherer::new(search, fetcher, cache, summarizer, 5);
        let outcome = gatherer.gather("some topic", 3).await;
        assert!(outcome.bundle.is_empty());
        assert_eq!(outcome.rag_status, RagStatus::InternalKnowledge);
    }
}
