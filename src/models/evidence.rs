use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// `spec.md` §3 "EvidenceItem". Citation index is stable within a debate
/// once assigned (invariant I1/P4).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvidenceItem {
    pub citation_idx: u32,
    pub url: String,
    pub domain: String,
    pub title: Option<String>,
    pub snippet: String,
    pub authority: f32,
    pub source_type: SourceType,
    pub method: EvidenceMethod,
    pub fetched_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
    News,
    Academic,
    Government,
    Reference,
    Blog,
    Social,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvidenceMethod {
    Live,
    Cache,
    VectorRecall,
}

/// An ordered set of `EvidenceItem`s referenced by 1-based citation index
/// within a turn or verdict (glossary: "evidence bundle").
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EvidenceBundle {
    pub items: Vec<EvidenceItem>,
}

impl EvidenceBundle {
    pub fn next_index(&self) -> u32 {
        self.items.len() as u32 + 1
    }

    pub fn push(&mut self, mut item: EvidenceItem) -> u32 {
        let idx = self.next_index();
        item.citation_idx = idx;
        self.items.push(item);
        idx
    }

    pub fn resolve(&self, citation_idx: u32) -> Option<&EvidenceItem> {
        self.items.iter().find(|i| i.citation_idx == citation_idx)
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
