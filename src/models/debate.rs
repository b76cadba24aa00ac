use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// `spec.md` §3 "Debate". Created on request, mutated only by its owning
/// orchestrator task, terminal on verdict or fatal error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Debate {
    pub debate_id: Uuid,
    pub topic: String,
    pub session_id: String,
    pub mode: DebateMode,
    pub created_at: DateTime<Utc>,
    pub status: DebateStatus,
    pub turn_count: u32,
    pub final_verdict: Option<super::verdict::VerdictReport>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DebateMode {
    Debate,
    Analytical,
    Simplified,
    V2Enhanced,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DebateStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl Debate {
    pub fn new(topic: String, session_id: String, mode: DebateMode) -> Self {
        Self {
            debate_id: Uuid::now_v7(),
            topic,
            session_id,
            mode,
            created_at: Utc::now(),
            status: DebateStatus::Pending,
            turn_count: 0,
            final_verdict: None,
        }
    }
}

/// `spec.md` §3 "Turn". Turn index is strictly monotonic per debate;
/// append-only, content may grow during streaming.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Turn {
    pub debate_id: Uuid,
    pub turn_index: u32,
    pub role: Role,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub content: String,
    pub evidence_ids: Vec<u32>,
    pub provider_used: Option<String>,
    pub status: TurnStatus,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Proponent,
    Opponent,
    Moderator,
    ReversedProponent,
    ReversedOpponent,
    Verdict,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Proponent => "proponent",
            Role::Opponent => "opponent",
            Role::Moderator => "moderator",
            Role::ReversedProponent => "reversed_proponent",
            Role::ReversedOpponent => "reversed_opponent",
            Role::Verdict => "verdict",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnStatus {
    Running,
    Completed,
    Skipped,
    Failed,
}

impl Turn {
    pub fn new(debate_id: Uuid, turn_index: u32, role: Role) -> Self {
        Self {
            debate_id,
            turn_index,
            role,
            started_at: Utc::now(),
            completed_at: None,
            content: String::new(),
            evidence_ids: Vec::new(),
            provider_used: None,
            status: TurnStatus::Running,
            error: None,
        }
    }
}
