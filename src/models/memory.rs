use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// `spec.md` §3 "Memory Record". Embedding is immutable once stored; `id`
/// is the ownership key (invariant I3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryRecord {
    pub id: Uuid,
    pub text: String,
    pub embedding: Vec<f32>,
    pub metadata: MemoryMetadata,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryMetadata {
    #[serde(rename = "type")]
    pub kind: MemoryType,
    pub source: Option<String>,
    pub role: Option<String>,
    pub debate_id: Option<Uuid>,
    pub topic: Option<String>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryType {
    #[default]
    WebMemory,
    DebateTurn,
    RoleStatement,
    UserDoc,
}

impl Default for MemoryMetadata {
    fn default() -> Self {
        Self {
            kind: MemoryType::default(),
            source: None,
            role: None,
            debate_id: None,
            topic: None,
            timestamp: Utc::now(),
        }
    }
}
