//! Verdict stage logic (spec §4.9 "Verdict stage"): parse the
//! moderator's JSON, validate against schema, attempt one repair, and
//! fall back to a synthetic verdict on a second failure.

use std::sync::Arc;

use crate::gateway::Gateway;
use crate::models::verdict::{validate_against_schema, VerdictReport};
use crate::provider::{CallParams, ChatMessage, ChatRole};

/// Extract a JSON object from `raw` (moderators sometimes wrap it in
/// prose or a fenced code block) and validate+deserialize it; on
/// failure, ask the Gateway once to repair it; on a second failure,
/// return a synthetic `COMPLEX` verdict built from `raw`.
pub async fn finalize_verdict(gateway: &Arc<Gateway>, raw: &str) -> VerdictReport {
    if let Some(report) = try_parse(raw) {
        return report;
    }

    let repair_prompt = format!(
        "The following was supposed to be a JSON object matching the VerdictReport schema \
         (fields: verdict, confidence_pct, summary, key_evidence, forensic_dossier, \
         bias_signals, recommendation, contradictions) but failed validation. Please emit \
         valid JSON matching this schema and nothing else:\n\n{raw}"
    );
    let messages = vec![ChatMessage {
        role: ChatRole::User,
        content: repair_prompt,
    }];
    let repaired = gateway
        .call(&messages, &CallParams::default())
        .await
        .ok()
        .and_then(|result| try_parse(&result.text));

    repaired.unwrap_or_else(|| VerdictReport::synthetic_complex(summarize_raw(raw)))
}

fn try_parse(raw: &str) -> Option<VerdictReport> {
    let json_slice = extract_json_object(raw)?;
    let value: serde_json::Value = serde_json::from_str(json_slice).ok()?;
    validate_against_schema(&value).ok()?;
    serde_json::from_value(value).ok()
}

/// Find the first top-level `{...}` object in `raw`, tolerating prose or
/// a ```json fenced block around it.
fn extract_json_object(raw: &str) -> Option<&str> {
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    if end < start {
        return None;
    }
    Some(&raw[start..=end])
}

fn summarize_raw(raw: &str) -> String {
    raw.chars().take(500).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::MockProvider;

    #[tokio::test]
    async fn parses_valid_json_directly() {
        let gw = Arc::new(Gateway::new(vec![Arc::new(MockProvider::always_ok(
            "p1",
            "unused",
        ))]));
        let raw = r#"{"verdict":"VERIFIED","confidence_pct":90,"summary":"ok"}"#;
        let report = finalize_verdict(&gw, raw).await;
        assert_eq!(report.confidence_pct, 90);
    }

    #[tokio::test]
    async fn repairs_once_then_falls_back_to_synthetic() {
        let gw = Arc::new(Gateway::new(vec![Arc::new(MockProvider::always_ok(
            "p1",
            "still not json",
        ))]));
        let report = finalize_verdict(&gw, "not json at all").await;
        assert_eq!(report.confidence_pct, 50);
    }

    #[test]
    fn extracts_json_from_fenced_prose() {
        let raw = "Here you go:\n```json\n{\"verdict\":\"DEBUNKED\",\"confidence_pct\":70,\"summary\":\"x\"}\n```";
        let extracted = extract_json_object(raw).unwrap();
        assert!(extracted.starts_with('{'));
    }
}
