//! UI-chrome stripping driven by a configurable `(pattern, replacement)` table.

use gembridge_core::{Error, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Upper bound on strip passes; real tables converge in one or two.
const MAX_PASSES: usize = 8;

/// One entry of the noise table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoiseRule {
    pub pattern: String,
    #[serde(default)]
    pub replacement: String,
}

impl NoiseRule {
    pub fn remove(pattern: &str) -> Self {
        Self {
            pattern: pattern.to_string(),
            replacement: String::new(),
        }
    }
}

/// Known chrome of the Gemini web UI, English and Italian copy.
pub fn default_noise_rules() -> Vec<NoiseRule> {
    vec![
        // Privacy / accuracy disclaimers under every answer.
        NoiseRule::remove(r"(?i)Gemini (can|may) (make mistakes|display inaccurate info)[^\n]*"),
        NoiseRule::remove(
            r"(?i)Gemini può (commettere errori|mostrare informazioni imprecise)[^\n]*",
        ),
        NoiseRule::remove(r"(?i)Your privacy (and|&) Gemini( Apps)?[^\n]*"),
        NoiseRule::remove(r"(?i)La tua privacy e (le app )?Gemini[^\n]*"),
        // Interrupted-response notices.
        NoiseRule::remove(
            r"(?i)(You stopped this response|Response stopped|Hai interrotto questa risposta|Risposta interrotta)\.?",
        ),
        // Tool-menu labels trailing the answer.
        NoiseRule::remove(
            r"(?i)(\s*\b(Copy code|Copia codice|Copy|Copia|Share|Condividi|Export to Docs|Esporta in Documenti|Show drafts|Mostra bozze|Use code with caution\.?|Usa il codice con cautela\.?)\s*)+$",
        ),
    ]
}

/// Compiled noise table.
#[derive(Debug, Clone)]
pub struct NoiseTable {
    rules: Vec<(Regex, String)>,
}

impl NoiseTable {
    pub fn compile(rules: &[NoiseRule]) -> Result<Self> {
        let compiled = rules
            .iter()
            .map(|rule| {
                let re = Regex::new(&rule.pattern).map_err(|e| {
                    Error::Config(format!("bad noise pattern {:?}: {}", rule.pattern, e))
                })?;
                // A replacement its own rule keeps rewriting never reaches a fixpoint.
                let replacement = rule.replacement.as_str();
                if re.replace_all(replacement, replacement) != replacement {
                    return Err(Error::Config(format!(
                        "noise replacement {:?} is rewritten by its own pattern {:?}",
                        rule.replacement, rule.pattern
                    )));
                }
                Ok((re, rule.replacement.clone()))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { rules: compiled })
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Apply every rule in order, trimming after each, until nothing changes.
    pub fn strip(&self, text: &str) -> String {
        let mut current = text.trim().to_string();
        for _ in 0..MAX_PASSES {
            let next = self.strip_once(&current);
            if next == current {
                return current;
            }
            current = next;
        }
        warn!("Noise table did not converge in {} passes", MAX_PASSES);
        current
    }

    fn strip_once(&self, text: &str) -> String {
        let mut out = text.to_string();
        for (re, replacement) in &self.rules {
            out = re.replace_all(&out, replacement.as_str()).trim().to_string();
        }
        out
    }
}

impl Default for NoiseTable {
    fn default() -> Self {
        Self::compile(&default_noise_rules()).unwrap_or(Self { rules: Vec::new() })
    }
}
