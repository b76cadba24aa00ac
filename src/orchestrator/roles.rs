//! `ROLE_PROMPTS` configuration table (spec §4.9 "current role's system
//! prompt (from a configuration table `ROLE_PROMPTS`)"). Loadable from a
//! JSON file at `ROLE_PROMPTS_PATH` so operators can tune role framing
//! without a rebuild; falls back to built-in defaults when unset.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::models::debate::Role;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RolePrompts {
    prompts: HashMap<String, String>,
}

impl Default for RolePrompts {
    fn default() -> Self {
        let mut prompts = HashMap::new();
        prompts.insert(
            "proponent".to_string(),
            "You are the Proponent. Argue in favor of the claim under debate, citing evidence \
             by its [n] index where available. Be direct; do not hedge unnecessarily."
                .to_string(),
        );
        prompts.insert(
            "opponent".to_string(),
            "You are the Opponent. Argue against the claim under debate, citing evidence by its \
             [n] index where available. Challenge the Proponent's points directly."
                .to_string(),
        );
        prompts.insert(
            "moderator".to_string(),
            "You are the Moderator. Summarize the strongest points from both sides neutrally and \
             identify unresolved disagreements."
                .to_string(),
        );
        prompts.insert(
            "reversed_proponent".to_string(),
            "You previously argued against this claim. Now argue FOR it, using the same \
             standard of evidence, and note where your position genuinely changed."
                .to_string(),
        );
        prompts.insert(
            "reversed_opponent".to_string(),
            "You previously argued for this claim. Now argue AGAINST it, using the same \
             standard of evidence, and note where your position genuinely changed."
                .to_string(),
        );
        prompts.insert(
            "verdict".to_string(),
            "You are the Verdict synthesizer. Given the full debate transcript and evidence, \
             emit a single JSON object matching the VerdictReport schema: verdict \
             (VERIFIED|DEBUNKED|COMPLEX), confidence_pct (0-100), summary, key_evidence, \
             forensic_dossier, bias_signals, recommendation, contradictions. Emit JSON only."
                .to_string(),
        );
        Self { prompts }
    }
}

impl RolePrompts {
    /// Load from a JSON file of `{role: prompt}` pairs, falling back to
    /// built-in defaults for any role missing from the file.
    pub fn load(path: Option<&str>) -> anyhow::Result<Self> {
        let mut table = Self::default();
        if let Some(path) = path {
            let contents = std::fs::read_to_string(path)?;
            let overrides: HashMap<String, String> = serde_json::from_str(&contents)?;
            table.prompts.extend(overrides);
        }
        Ok(table)
    }

    pub fn for_role(&self, role: Role) -> &str {
        self.prompts
            .get(role.as_str())
            .map(|s| s.as_str())
            .unwrap_or("You are a debate participant.")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_table_covers_every_role() {
        let table = RolePrompts::default();
        for role in [
            Role::Proponent,
            Role::Opponent,
            Role::Moderator,
            Role::ReversedProponent,
            Role::ReversedOpponent,
            Role::Verdict,
        ] {
            assert!(!table.for_role(role).is_empty());
        }
    }
}
