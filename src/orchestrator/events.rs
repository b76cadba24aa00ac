//! SSE event vocabulary for one debate (spec §4.9). Each variant maps to
//! one `event:`/`data:` frame; `kind()` supplies the SSE `event:` field
//! and `Serialize` supplies the `data:` field (as JSON).

use serde::Serialize;
use uuid::Uuid;

use crate::models::evidence::EvidenceItem;
use crate::models::verdict::VerdictReport;

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum DebateEvent {
    #[serde(rename = "metadata")]
    Metadata {
        debate_id: Uuid,
        topic: String,
        model_used: String,
        memory_enabled: bool,
        v2_features_enabled: bool,
        rag_status: String,
    },
    /// The pre-turn evidence gather's ranked citations, emitted once
    /// right after `metadata` (spec §4.10).
    #[serde(rename = "evidence")]
    Evidence { items: Vec<EvidenceItem> },
    #[serde(rename = "start_role")]
    StartRole { role: &'static str },
    #[serde(rename = "token")]
    Token { role: &'static str, text: String },
    #[serde(rename = "end_role")]
    EndRole { role: &'static str },
    #[serde(rename = "turn_error")]
    TurnError { role: &'static str, message: String },
    #[serde(rename = "role_reversal_start")]
    RoleReversalStart {},
    #[serde(rename = "role_reversal_complete")]
    RoleReversalComplete { stats: RoleReversalStats },
    #[serde(rename = "analytics_metrics")]
    AnalyticsMetrics { metrics: serde_json::Value },
    #[serde(rename = "final_verdict")]
    FinalVerdict { verdict: VerdictReport },
    #[serde(rename = "error")]
    Error { message: String, code: &'static str },
    #[serde(rename = "end")]
    End {},
}

#[derive(Debug, Clone, Serialize)]
pub struct RoleReversalStats {
    pub initial_divergence: f32,
    pub final_divergence: f32,
    pub rounds_run: u32,
}

impl DebateEvent {
    /// The SSE `event:` field — kept distinct from the JSON `type` tag so
    /// clients can dispatch on the frame's `event:` line without parsing
    /// the body first.
    pub fn kind(&self) -> &'static str {
        match self {
            DebateEvent::Metadata { .. } => "metadata",
            DebateEvent::Evidence { .. } => "evidence",
            DebateEvent::StartRole { .. } => "start_role",
            DebateEvent::Token { .. } => "token",
            DebateEvent::EndRole { .. } => "end_role",
            DebateEvent::TurnError { .. } => "turn_error",
            DebateEvent::RoleReversalStart {} => "role_reversal_start",
            DebateEvent::RoleReversalComplete { .. } => "role_reversal_complete",
            DebateEvent::AnalyticsMetrics { .. } => "analytics_metrics",
            DebateEvent::FinalVerdict { .. } => "final_verdict",
            DebateEvent::Error { .. } => "error",
            DebateEvent::End {} => "end",
        }
    }

    /// Render as one SSE frame, e.g. `event: token\ndata: {...}\n\n`.
    pub fn to_sse_frame(&self) -> String {
        let data = serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string());
        format!("event: {}\ndata: {}\n\n", self.kind(), data)
    }
}
