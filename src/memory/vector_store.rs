//! Vector Store (C6): SQLite-persisted embeddings with cosine-similarity
//! search (spec §4.6). Grounded in `rand-loop`'s `SqliteMemoryStore`
//! (`memory/store.rs`) — a single `Arc<Mutex<Connection>>` guarding a
//! `with_conn` helper, embeddings packed as little-endian `f32` BLOBs.
//! `rusqlite` has no native vector index, so `search` loads all
//! candidate rows and scores them in-process; acceptable at the scale
//! this component targets (spec Non-goals exclude ANN indexing).

use std::sync::{Arc, Mutex};

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::memory::{MemoryMetadata, MemoryRecord, MemoryType};

pub struct VectorStore {
    conn: Arc<Mutex<Connection>>,
    embedding_dim: usize,
}

/// Conjunctive filter over a record's `kind`/`source` metadata (spec
/// §4.6 "filter={type=web_memory, source=u}", P6). `None` fields are
/// unconstrained.
#[derive(Debug, Clone, Default)]
pub struct MemoryFilter {
    pub kind: Option<MemoryType>,
    pub source: Option<String>,
}

impl MemoryFilter {
    pub fn kind(kind: MemoryType) -> Self {
        Self {
            kind: Some(kind),
            source: None,
        }
    }
}

impl VectorStore {
    pub fn open(path: &str, embedding_dim: usize) -> Result<Self, AppError> {
        let conn = Connection::open(path)?;
        Self::init_schema(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            embedding_dim,
        })
    }

    pub fn in_memory(embedding_dim: usize) -> Result<Self, AppError> {
        let conn = Connection::open_in_memory()?;
        Self::init_schema(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            embedding_dim,
        })
    }

    fn init_schema(conn: &Connection) -> Result<(), AppError> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS memory_records (
                id TEXT PRIMARY KEY,
                text TEXT NOT NULL,
                embedding BLOB NOT NULL,
                content_hash TEXT NOT NULL,
                kind TEXT NOT NULL,
                source TEXT,
                role TEXT,
                debate_id TEXT,
                topic TEXT,
                timestamp TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_memory_content_hash ON memory_records(content_hash);
            CREATE INDEX IF NOT EXISTS idx_memory_kind ON memory_records(kind);",
        )?;
        Ok(())
    }

    fn with_conn<F, T>(&self, f: F) -> Result<T, AppError>
    where
        F: FnOnce(&Connection) -> rusqlite::Result<T>,
    {
        let conn = self.conn.lock().expect("vector store mutex poisoned");
        f(&conn).map_err(AppError::from)
    }

    /// I5: `metadata.timestamp` must not be in the future relative to
    /// insertion time. I3: a new fetch of the same URL only creates a
    /// new record if content differs under this normalization hash.
    fn content_hash(text: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(text.trim().to_lowercase().as_bytes());
        hex::encode(hasher.finalize())
    }

    /// Insert a record, skipping if a record with the same content hash
    /// and source already exists (I3 dedup). Returns the id of the
    /// inserted (or pre-existing) record.
    pub fn add(&self, text: String, embedding: Vec<f32>, metadata: MemoryMetadata) -> Result<Uuid, AppError> {
        if embedding.len() != self.embedding_dim {
            return Err(AppError::Internal(anyhow::anyhow!(
                "embedding dimension {} does not match configured {}",
                embedding.len(),
                self.embedding_dim
            )));
        }
        let hash = Self::content_hash(&text);
        let now = Utc::now();
        let timestamp = metadata.timestamp.min(now);

        self.with_conn(|conn| {
            if let Some(existing) = conn
                .query_row(
                    "SELECT id FROM memory_records WHERE content_hash = ?1 AND source IS ?2 LIMIT 1",
                    params![hash, metadata.source],
                    |row| row.get::<_, String>(0),
                )
                .optional()?
            {
                return Ok(Uuid::parse_str(&existing).unwrap_or_else(|_| Uuid::now_v7()));
            }

            let id = Uuid::now_v7();
            let blob: Vec<u8> = embedding.iter().flat_map(|f| f.to_le_bytes()).collect();
            conn.execute(
                "INSERT INTO memory_records (
                    id, text, embedding, content_hash, kind, source, role, debate_id, topic, timestamp
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                params![
                    id.to_string(),
                    text,
                    blob,
                    hash,
                    kind_str(metadata.kind),
                    metadata.source,
                    metadata.role,
                    metadata.debate_id.map(|d| d.to_string()),
                    metadata.topic,
                    timestamp.to_rfc3339(),
                ],
            )?;
            Ok(id)
        })
    }

    /// Top-`k` nearest neighbors by cosine similarity, scoped by `filter`
    /// (a conjunction of the `kind`/`source` predicates it sets).
    pub fn search(&self, query_embedding: &[f32], k: usize, filter: MemoryFilter) -> Result<Vec<(MemoryRecord, f32)>, AppError> {
        let rows = self.with_conn(|conn| {
            let where_clause = match (&filter.kind, &filter.source) {
                (Some(_), Some(_)) => " WHERE kind = ?1 AND source = ?2",
                (Some(_), None) => " WHERE kind = ?1",
                (None, Some(_)) => " WHERE source = ?1",
                (None, None) => "",
            };
            let query = format!(
                "SELECT id, text, embedding, kind, source, role, debate_id, topic, timestamp
                 FROM memory_records{where_clause}"
            );
            let mut stmt = conn.prepare(&query)?;
            let map_row = |row: &rusqlite::Row| -> rusqlite::Result<MemoryRecord> {
                let id: String = row.get(0)?;
                let text: String = row.get(1)?;
                let blob: Vec<u8> = row.get(2)?;
                let kind: String = row.get(3)?;
                let source: Option<String> = row.get(4)?;
                let role: Option<String> = row.get(5)?;
                let debate_id: Option<String> = row.get(6)?;
                let topic: Option<String> = row.get(7)?;
                let timestamp: String = row.get(8)?;
                let embedding = blob
                    .chunks_exact(4)
                    .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
                    .collect();
                Ok(MemoryRecord {
                    id: Uuid::parse_str(&id).unwrap_or_else(|_| Uuid::now_v7()),
                    text,
                    embedding,
                    metadata: MemoryMetadata {
                        kind: parse_kind(&kind),
                        source,
                        role,
                        debate_id: debate_id.and_then(|d| Uuid::parse_str(&d).ok()),
                        topic,
                        timestamp: chrono::DateTime::parse_from_rfc3339(&timestamp)
                            .map(|t| t.with_timezone(&Utc))
                            .unwrap_or_else(|_| Utc::now()),
                    },
                })
            };
            let records: Result<Vec<MemoryRecord>, rusqlite::Error> = match (&filter.kind, &filter.source) {
                (Some(kf), Some(src)) => stmt.query_map(params![kind_str(*kf), src], map_row)?.collect(),
                (Some(kf), None) => stmt.query_map(params![kind_str(*kf)], map_row)?.collect(),
                (None, Some(src)) => stmt.query_map(params![src], map_row)?.collect(),
                (None, None) => stmt.query_map([], map_row)?.collect(),
            };
            records
        })?;

        let mut scored: Vec<(MemoryRecord, f32)> = rows
            .into_iter()
            .map(|record| {
                let score = cosine_similarity(query_embedding, &record.embedding);
                (record, score)
            })
            .collect();
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(k);
        Ok(scored)
    }

    /// All records of `kind`, most recent first, optionally scoped to one
    /// `role` (used by `/memory/role/history`). No embedding comparison —
    /// this is a plain metadata lookup, not a similarity search.
    pub fn list_by_kind(
        &self,
        kind: MemoryType,
        role: Option<&str>,
        limit: usize,
    ) -> Result<Vec<MemoryRecord>, AppError> {
        let mut records = self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, text, embedding, kind, source, role, debate_id, topic, timestamp
                 FROM memory_records WHERE kind = ?1 ORDER BY timestamp DESC",
            )?;
            let map_row = |row: &rusqlite::Row| -> rusqlite::Result<MemoryRecord> {
                let id: String = row.get(0)?;
                let text: String = row.get(1)?;
                let blob: Vec<u8> = row.get(2)?;
                let kind: String = row.get(3)?;
                let source: Option<String> = row.get(4)?;
                let role: Option<String> = row.get(5)?;
                let debate_id: Option<String> = row.get(6)?;
                let topic: Option<String> = row.get(7)?;
                let timestamp: String = row.get(8)?;
                let embedding = blob
                    .chunks_exact(4)
                    .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
                    .collect();
                Ok(MemoryRecord {
                    id: Uuid::parse_str(&id).unwrap_or_else(|_| Uuid::now_v7()),
                    text,
                    embedding,
                    metadata: MemoryMetadata {
                        kind: parse_kind(&kind),
                        source,
                        role,
                        debate_id: debate_id.and_then(|d| Uuid::parse_str(&d).ok()),
                        topic,
                        timestamp: chrono::DateTime::parse_from_rfc3339(&timestamp)
                            .map(|t| t.with_timezone(&Utc))
                            .unwrap_or_else(|_| Utc::now()),
                    },
                })
            };
            let records: Result<Vec<MemoryRecord>, rusqlite::Error> =
                stmt.query_map(params![kind_str(kind)], map_row)?.collect();
            records
        })?;
        if let Some(role) = role {
            records.retain(|r| r.metadata.role.as_deref() == Some(role));
        }
        records.truncate(limit);
        Ok(records)
    }

    pub fn count(&self) -> Result<usize, AppError> {
        self.with_conn(|conn| conn.query_row("SELECT COUNT(*) FROM memory_records", [], |r| r.get(0)))
            .map(|n: i64| n as usize)
    }
}

fn kind_str(kind: MemoryType) -> &'static str {
    match kind {
        MemoryType::WebMemory => "web_memory",
        MemoryType::DebateTurn => "debate_turn",
        MemoryType::RoleStatement => "role_statement",
        MemoryType::UserDoc => "user_doc",
    }
}

fn parse_kind(s: &str) -> MemoryType {
    match s {
        "debate_turn" => MemoryType::DebateTurn,
        "role_statement" => MemoryType::RoleStatement,
        "user_doc" => MemoryType::UserDoc,
        _ => MemoryType::WebMemory,
    }
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta() -> MemoryMetadata {
        MemoryMetadata {
            kind: MemoryType::WebMemory,
            source: Some("https://example.com".to_string()),
            role: None,
            debate_id: None,
            topic: Some("topic".to_string()),
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn add_then_search_returns_closest_first() {
        let store = VectorStore::in_memory(3).unwrap();
        store.add("alpha".into(), vec![1.0, 0.0, 0.0], meta()).unwrap();
        store.add("beta".into(), vec![0.0, 1.0, 0.0], meta()).unwrap();
        let results = store.search(&[1.0, 0.0, 0.0], 2, MemoryFilter::default()).unwrap();
        assert_eq!(results[0].0.text, "alpha");
    }

    #[test]
    fn search_filters_by_source_within_a_kind() {
        let store = VectorStore::in_memory(3).unwrap();
        let mut meta_a = meta();
        meta_a.source = Some("https://a.example.com".to_string());
        let mut meta_b = meta();
        meta_b.source = Some("https://b.example.com".to_string());
        store.add("from a".into(), vec![1.0, 0.0, 0.0], meta_a).unwrap();
        store.add("from b".into(), vec![1.0, 0.0, 0.0], meta_b).unwrap();

        let results = store
            .search(
                &[1.0, 0.0, 0.0],
                10,
                MemoryFilter {
                    kind: Some(MemoryType::WebMemory),
                    source: Some("https://b.example.com".to_string()),
                },
            )
            .unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].0.text, "from b");
    }

    #[test]
    fn dedup_skips_identical_content_same_source() {
        let store = VectorStore::in_memory(3).unwrap();
        let id1 = store.add("same text".into(), vec![1.0, 0.0, 0.0], meta()).unwrap();
        let id2 = store.add("Same Text".into(), vec![1.0, 0.0, 0.0], meta()).unwrap();
        assert_eq!(id1, id2);
        assert_eq!(store.count().unwrap(), 1);
    }

    #[test]
    fn rejects_mismatched_embedding_dimension() {
        let store = VectorStore::in_memory(3).unwrap();
        let err = store.add("x".into(), vec![1.0, 0.0], meta()).unwrap_err();
        assert!(matches!(err, AppError::Internal(_)));
    }
}
