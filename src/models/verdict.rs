use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use super::evidence::EvidenceItem;

/// `spec.md` §3 "VerdictReport", fields frozen per §9 design note (c) — do
/// not add fields without a version bump.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerdictReport {
    pub verdict: VerdictLabel,
    pub confidence_pct: u8,
    pub summary: String,
    #[serde(default)]
    pub key_evidence: Vec<EvidenceItem>,
    #[serde(default)]
    pub forensic_dossier: ForensicDossier,
    #[serde(default)]
    pub bias_signals: Vec<String>,
    #[serde(default)]
    pub recommendation: String,
    #[serde(default)]
    pub contradictions: Vec<String>,
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum VerdictLabel {
    Verified,
    Debunked,
    Complex,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ForensicDossier {
    pub entities: Vec<ForensicEntity>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForensicEntity {
    pub name: String,
    pub reputation_score: f32,
    pub red_flags: Vec<String>,
}

impl VerdictReport {
    /// A synthetic verdict constructed when the LLM fails to produce valid
    /// JSON after one repair attempt (spec §4.9 "Verdict stage").
    pub fn synthetic_complex(summary: String) -> Self {
        Self {
            verdict: VerdictLabel::Complex,
            confidence_pct: 50,
            summary,
            key_evidence: Vec::new(),
            forensic_dossier: ForensicDossier::default(),
            bias_signals: Vec::new(),
            recommendation: "Manual review recommended — automated synthesis was incomplete."
                .to_string(),
            contradictions: Vec::new(),
            timestamp: Utc::now(),
        }
    }

    /// P10: `confidence_pct` must be in [0,100]. Schema conformance beyond
    /// that range check is enforced by [`validate_against_schema`].
    pub fn is_well_formed(&self) -> bool {
        self.confidence_pct <= 100
    }
}

/// JSON Schema for `VerdictReport`, used to validate LLM-produced JSON
/// before it is deserialized (spec §4.9: "Orchestrator validates the JSON
/// against a schema").
pub static VERDICT_SCHEMA: Lazy<serde_json::Value> = Lazy::new(|| {
    serde_json::json!({
        "type": "object",
        "required": ["verdict", "confidence_pct", "summary"],
        "properties": {
            "verdict": { "enum": ["VERIFIED", "DEBUNKED", "COMPLEX"] },
            "confidence_pct": { "type": "number", "minimum": 0, "maximum": 100 },
            "summary": { "type": "string" },
            "key_evidence": { "type": "array" },
            "forensic_dossier": { "type": "object" },
            "bias_signals": { "type": "array" },
            "recommendation": { "type": "string" },
            "contradictions": { "type": "array" }
        }
    })
});

/// Validate a raw JSON value against [`VERDICT_SCHEMA`]. Returns the first
/// validation error message, if any.
pub fn validate_against_schema(value: &serde_json::Value) -> Result<(), String> {
    let compiled = jsonschema::JSONSchema::compile(&VERDICT_SCHEMA)
        .expect("VERDICT_SCHEMA is a static, known-valid schema");
    match compiled.validate(value) {
        Ok(()) => Ok(()),
        Err(errors) => {
            let messages: Vec<String> = errors.map(|e| e.to_string()).collect();
            Err(messages.join("; "))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn synthetic_complex_is_well_formed() {
        let v = VerdictReport::synthetic_complex("moderator summary".into());
        assert!(v.is_well_formed());
        assert_eq!(v.confidence_pct, 50);
        assert_eq!(v.verdict, VerdictLabel::Complex);
    }

    #[test]
    fn schema_accepts_minimal_valid_verdict() {
        let value = serde_json::json!({
            "verdict": "VERIFIED",
            "confidence_pct": 80,
            "summary": "ok"
        });
        assert!(validate_against_schema(&value).is_ok());
    }

    #[test]
    fn schema_rejects_out_of_range_confidence() {
        let value = serde_json::json!({
            "verdict": "VERIFIED",
            "confidence_pct": 180,
            "summary": "ok"
        });
        assert!(validate_against_schema(&value).is_err());
    }

    #[test]
    fn schema_rejects_unknown_verdict_label() {
        let value = serde_json::json!({
            "verdict": "MAYBE",
            "confidence_pct": 50,
            "summary": "ok"
        });
        assert!(validate_against_schema(&value).is_err());
    }
}
