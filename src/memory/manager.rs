//! Memory Manager (C8): assembles the composite prompt context for one
//! turn from system prompt, recent history, retrieved evidence and live
//! web content (spec §4.8). The embedding backend is injected as a
//! boxed async closure — the same `EmbedFn`-as-`Arc<dyn Fn>` shape the
//! pack's memory manager (`danielmriley-aigent`'s `manager/mod.rs`) uses
//! to keep the manager decoupled from any one embedding provider.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use crate::errors::AppError;
use crate::evidence::gatherer::web_memory_metadata;
use crate::evidence::{Summarizer, UrlCache, WebFetcher};
use crate::models::evidence::{EvidenceBundle, EvidenceItem, EvidenceMethod, SourceType};
use crate::models::memory::{MemoryMetadata, MemoryType};

use super::retriever::HybridRetriever;
use super::vector_store::VectorStore;

pub type EmbedFn = Arc<dyn Fn(String) -> Pin<Box<dyn Future<Output = Result<Vec<f32>, AppError>> + Send>> + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatStyle {
    Conversational,
    Debate,
}

#[derive(Debug, Clone)]
pub struct ContextFlags {
    pub use_long_term: bool,
    pub use_short_term: bool,
    pub enable_web_rag: bool,
    pub format_style: FormatStyle,
}

pub struct ContextRequest<'a> {
    pub system_prompt: &'a str,
    pub current_task: &'a str,
    pub query: &'a str,
    pub short_term: &'a [String],
    pub flags: ContextFlags,
}

static URL_PATTERN: once_cell::sync::Lazy<regex::Regex> =
    once_cell::sync::Lazy::new(|| regex::Regex::new(r"https?://\S+").unwrap());

pub struct MemoryManager {
    store: Arc<VectorStore>,
    retriever: HybridRetriever,
    cache: Arc<UrlCache>,
    fetcher: Arc<WebFetcher>,
    summarizer: Arc<Summarizer>,
    embed: EmbedFn,
}

impl MemoryManager {
    pub fn new(
        store: Arc<VectorStore>,
        top_k: usize,
        cache: Arc<UrlCache>,
        fetcher: Arc<WebFetcher>,
        summarizer: Arc<Summarizer>,
        embed: EmbedFn,
    ) -> Self {
        let retriever = HybridRetriever::new(store.clone(), top_k);
        Self {
            store,
            retriever,
            cache,
            fetcher,
            summarizer,
            embed,
        }
    }

    /// Assemble the composite context and the evidence bundle referenced
    /// by it, per spec §4.8's fixed section order.
    pub async fn build_context(&self, req: ContextRequest<'_>) -> Result<(String, EvidenceBundle), AppError> {
        let mut sections: Vec<String> = Vec::new();
        let mut bundle = EvidenceBundle::default();

        sections.push(self.header("SYSTEM", &req.flags) + &format!("\n{}", req.system_prompt));

        if req.flags.use_short_term && !req.short_term.is_empty() {
            let body = req.short_term.join("\n");
            sections.push(self.header("RECENT CONVERSATION", &req.flags) + &format!("\n{}", body));
        }

        if req.flags.use_long_term {
            let query_embedding = (self.embed)(req.query.to_string()).await?;
            let (results, _classification) = self.retriever.retrieve(&query_embedding, req.query)?;
            if !results.is_empty() {
                let mut lines = Vec::new();
                for (record, _score) in &results {
                    let idx = bundle.push(memory_record_to_evidence(record));
                    lines.push(format!("[{idx}] {}", record.text));
                }
                sections.push(self.header("RETRIEVED EVIDENCE", &req.flags) + &format!("\n{}", lines.join("\n")));
            }
        }

        if req.flags.enable_web_rag {
            if let Some(url) = URL_PATTERN.find(req.query).map(|m| m.as_str().to_string()) {
                if let Some(summary_item) = self.live_web_content(&url, req.query).await? {
                    let idx = bundle.push(summary_item.clone());
                    sections.push(
                        self.header("LIVE WEB CONTENT", &req.flags)
                            + &format!("\n[{idx}] {}", summary_item.snippet),
                    );
                }
            }
        }

        sections.push(self.header("USER QUESTION", &req.flags) + &format!("\n{}", req.current_task));

        Ok((sections.join("\n\n"), bundle))
    }

    fn header(&self, title: &str, flags: &ContextFlags) -> String {
        match flags.format_style {
            FormatStyle::Conversational => format!("## {title}"),
            FormatStyle::Debate => format!("=== {title} ==="),
        }
    }

    /// Fetch -> summarize -> cache -> insert into the Vector Store as a
    /// `web_memory` record (spec §4.8's "learning loop").
    async fn live_web_content(&self, url: &str, topic: &str) -> Result<Option<EvidenceItem>, AppError> {
        let (summary, method) = if let Some(cached) = self.cache.get(url) {
            (cached.summary, EvidenceMethod::Cache)
        } else {
            let page = self.fetcher.fetch(url).await?;
            let summary = self.summarizer.summarize(topic, &page.text).await?;
            self.cache
                .put(url, summary.clone(), page.text.chars().take(4_000).collect(), Utc::now())
                .await;
            (summary, EvidenceMethod::Live)
        };

        if method == EvidenceMethod::Live {
            let embedding = (self.embed)(summary.clone()).await?;
            self.store
                .add(summary.clone(), embedding, web_memory_metadata(topic, url))?;
        }

        let domain = url::Url::parse(url)
            .ok()
            .and_then(|u| u.host_str().map(|h| h.to_string()))
            .unwrap_or_else(|| url.to_string());

        Ok(Some(EvidenceItem {
            citation_idx: 0,
            url: url.to_string(),
            domain,
            title: None,
            snippet: summary,
            authority: 0.5,
            source_type: SourceType::Unknown,
            method,
            fetched_at: Utc::now(),
        }))
    }

    pub fn vector_store(&self) -> &Arc<VectorStore> {
        &self.store
    }

    pub fn retriever(&self) -> &HybridRetriever {
        &self.retriever
    }

    /// Expose the injected embedding function to transport handlers that
    /// need a raw embedding outside of `build_context` (e.g. the
    /// consistency-check and role-history endpoints).
    pub async fn embed_text(&self, text: &str) -> Result<Vec<f32>, AppError> {
        (self.embed)(text.to_string()).await
    }

    /// Write-back after a successful turn (spec §4.8 "Memory write-back").
    pub async fn persist_turn(
        &self,
        text: String,
        kind: MemoryType,
        role: Option<String>,
        debate_id: Uuid,
    ) -> Result<Uuid, AppError> {
        let embedding = (self.embed)(text.clone()).await?;
        let metadata = MemoryMetadata {
            kind,
            source: None,
            role,
            debate_id: Some(debate_id),
            topic: None,
            timestamp: Utc::now(),
        };
        self.store.add(text, embedding, metadata)
    }
}

fn memory_record_to_evidence(record: &crate::models::memory::MemoryRecord) -> EvidenceItem {
    EvidenceItem {
        citation_idx: 0,
        url: record.metadata.source.clone().unwrap_or_default(),
        domain: String::new(),
        title: record.metadata.topic.clone(),
        snippet: record.text.clone(),
        authority: 0.5,
        source_type: SourceType::Unknown,
        method: EvidenceMethod::VectorRecall,
        fetched_at: record.metadata.timestamp,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::MockProvider;
    use std::sync::Arc as StdArc;

    fn noop_embed() -> EmbedFn {
        StdArc::new(|_text: String| Box::pin(async { Ok(vec![1.0, 0.0, 0.0]) }))
    }

    #[tokio::test]
    async fn omits_evidence_section_when_no_long_term_memory() {
        let dir = tempfile::tempdir().unwrap();
        let store = StdArc::new(VectorStore::in_memory(3).unwrap());
        let cache = StdArc::new(UrlCache::load(dir.path().join("c.json"), 3600));
        let fetcher = StdArc::new(WebFetcher::new(5000, 1_000_000));
        let gw = StdArc::new(crate::gateway::Gateway::new(vec![StdArc::new(
            MockProvider::always_ok("p1", "summary"),
        )]));
        let summarizer = StdArc::new(Summarizer::new(gw));
        let manager = MemoryManager::new(store, 5, cache, fetcher, summarizer, noop_embed());

        let (context, bundle) = manager
            .build_context(ContextRequest {
                system_prompt: "You are a debate moderator.",
                current_task: "Summarize the debate.",
                query: "what happened",
                short_term: &[],
                flags: ContextFlags {
                    use_long_term: true,
                    use_short_term: false,
                    enable_web_rag: false,
                    format_style: FormatStyle::Conversational,
                },
            })
            .await
            .unwrap();

        assert!(bundle.is_empty());
        assert!(!context.contains("RETRIEVED EVIDENCE"));
        assert!(context.contains("USER QUESTION"));
    }
}
