//! `/memory/role/reversal`, `/memory/role/history`,
//! `/memory/consistency/check` (spec §6): direct HTTP access to the
//! Memory Manager / Vector Store for clients that want to inspect or
//! drive role memory outside of a full debate run.

use std::sync::Arc;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use serde_json::json;

use crate::errors::AppError;
use crate::memory::vector_store::MemoryFilter;
use crate::memory::{ContextFlags, ContextRequest, FormatStyle};
use crate::models::debate::Role;
use crate::models::memory::MemoryType;

use super::AppState;

#[derive(Debug, Deserialize)]
pub struct RoleReversalRequest {
    pub role: Role,
    pub topic: String,
}

/// `POST /memory/role/reversal`: build the composite context a reversed
/// role would argue from, reusing the Memory Manager's normal context
/// assembly (spec §4.8) with the role's own prior statements pulled in
/// as long-term memory.
pub async fn role_reversal(
    axum::extract::State(state): axum::extract::State<Arc<AppState>>,
    axum::Json(req): axum::Json<RoleReversalRequest>,
) -> Result<axum::Json<serde_json::Value>, AppError> {
    let system_prompt = format!(
        "You now argue the {} position on \"{}\". Review the prior opposing \
         statements retrieved below and construct the strongest reversed argument.",
        req.role.as_str(),
        req.topic,
    );
    let (context, bundle) = state
        .memory
        .build_context(ContextRequest {
            system_prompt: &system_prompt,
            current_task: &req.topic,
            query: &req.topic,
            short_term: &[],
            flags: ContextFlags {
                use_long_term: true,
                use_short_term: false,
                enable_web_rag: false,
                format_style: FormatStyle::Debate,
            },
        })
        .await?;

    Ok(axum::Json(json!({
        "context": context,
        "evidence_count": bundle.items.len(),
    })))
}

#[derive(Debug, Deserialize)]
pub struct RoleHistoryRequest {
    pub role: Role,
    #[serde(default = "default_history_limit")]
    pub limit: usize,
}

fn default_history_limit() -> usize {
    20
}

/// `POST /memory/role/history`: past statements made by one role, most
/// recent first.
pub async fn role_history(
    axum::extract::State(state): axum::extract::State<Arc<AppState>>,
    axum::Json(req): axum::Json<RoleHistoryRequest>,
) -> Result<axum::Json<serde_json::Value>, AppError> {
    let records = state.memory.vector_store().list_by_kind(
        MemoryType::RoleStatement,
        Some(req.role.as_str()),
        req.limit,
    )?;
    let memories: Vec<serde_json::Value> = records
        .iter()
        .map(|r| {
            json!({
                "id": r.id,
                "text": r.text,
                "debate_id": r.metadata.debate_id,
                "timestamp": r.metadata.timestamp,
            })
        })
        .collect();

    Ok(axum::Json(json!({
        "count": memories.len(),
        "memories": memories,
    })))
}

#[derive(Debug, Deserialize)]
pub struct ConsistencyCheckRequest {
    pub role: Role,
    pub statement: String,
    #[serde(default = "default_history_limit")]
    pub top_k: usize,
}

static NEGATION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(not|never|false|disputed|contrary|no longer)\b").unwrap());

/// Matches "X is (always/often/...) <comparative> than Y" — catches
/// antonymy that swaps subject and object around a comparative claim
/// rather than adding a negation word (e.g. "Nuclear is safer than
/// solar" vs. "Solar is always safer than nuclear").
static COMPARATIVE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b([a-z][a-z0-9 '-]*?)\s+(?:is|are)\s+(?:always|often|generally|usually|clearly)?\s*(safer|cheaper|faster|slower|stronger|weaker|bigger|smaller|healthier|better|worse|more \w+|less \w+)\s+than\s+([a-z][a-z0-9 '-]*?)(?:[.,!?]|$)",
    )
    .unwrap()
});

#[derive(Debug, Clone, PartialEq, Eq)]
struct ComparativeClaim {
    subject: String,
    predicate: String,
    object: String,
}

impl ComparativeClaim {
    /// True when `other` makes the opposite comparison about the same
    /// pair of entities (subject/object swapped, same predicate).
    fn reverses(&self, other: &ComparativeClaim) -> bool {
        self.predicate == other.predicate && self.subject == other.object && self.object == other.subject
    }
}

fn comparative_claims(text: &str) -> Vec<ComparativeClaim> {
    COMPARATIVE
        .captures_iter(text)
        .map(|c| ComparativeClaim {
            subject: normalize_entity(&c[1]),
            predicate: c[2].to_lowercase(),
            object: normalize_entity(&c[3]),
        })
        .collect()
}

fn normalize_entity(s: &str) -> String {
    s.trim().trim_end_matches(|c: char| !c.is_alphanumeric()).to_lowercase()
}

/// `POST /memory/consistency/check`: compare a new statement against a
/// role's past statements and flag likely contradictions. A candidate is
/// flagged when it is topically close (cosine similarity above 0.5) and
/// either exactly one of the two statements carries a negation marker,
/// or the two statements make reversed comparative claims about the
/// same entity pair (e.g. "X is safer than Y" vs. "Y is safer than X")
/// — both lexical proxies for "says the opposite thing about the same
/// claim".
pub async fn consistency_check(
    axum::extract::State(state): axum::extract::State<Arc<AppState>>,
    axum::Json(req): axum::Json<ConsistencyCheckRequest>,
) -> Result<axum::Json<serde_json::Value>, AppError> {
    const SIMILARITY_THRESHOLD: f32 = 0.5;

    let embedding = state.memory.embed_text(&req.statement).await?;
    let candidates = state.memory.vector_store().search(
        &embedding,
        req.top_k * 3,
        MemoryFilter::kind(MemoryType::RoleStatement),
    )?;

    let role_str = req.role.as_str();
    let new_has_negation = NEGATION.is_match(&req.statement);
    let new_comparatives = comparative_claims(&req.statement);

    let mut related_statements = Vec::new();
    let mut warnings = Vec::new();
    let mut contradiction_count = 0usize;

    for (record, similarity) in candidates
        .into_iter()
        .filter(|(r, _)| r.metadata.role.as_deref() == Some(role_str))
        .take(req.top_k)
    {
        if similarity >= SIMILARITY_THRESHOLD {
            let prior_has_negation = NEGATION.is_match(&record.text);
            let negation_conflict = new_has_negation != prior_has_negation;
            let reversed_comparative = new_comparatives
                .iter()
                .any(|c| comparative_claims(&record.text).iter().any(|p| c.reverses(p)));
            if negation_conflict || reversed_comparative {
                contradiction_count += 1;
                warnings.push(format!(
                    "Statement conflicts with a prior {role_str} statement: \"{}\"",
                    record.text
                ));
            }
        }
        related_statements.push(json!({
            "text": record.text,
            "similarity": similarity,
            "timestamp": record.metadata.timestamp,
        }));
    }

    let consistency_score = if related_statements.is_empty() {
        1.0
    } else {
        1.0 - (contradiction_count as f32 / related_statements.len() as f32)
    };

    Ok(axum::Json(json!({
        "has_inconsistencies": contradiction_count > 0,
        "consistency_score": consistency_score,
        "warnings": warnings,
        "related_statements": related_statements,
    })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_reversed_comparative_claim() {
        let prior = comparative_claims("Nuclear is safer than solar.");
        let new = comparative_claims("Solar is always safer than nuclear.");
        assert_eq!(prior.len(), 1);
        assert_eq!(new.len(), 1);
        assert!(new[0].reverses(&prior[0]));
    }

    #[test]
    fn same_direction_claim_does_not_reverse() {
        let prior = comparative_claims("Nuclear is safer than solar.");
        let new = comparative_claims("Nuclear is clearly safer than solar.");
        assert!(!new[0].reverses(&prior[0]));
    }
}
