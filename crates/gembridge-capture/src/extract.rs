//! Extraction pipeline: locate the newest answer, clean it, validate it.

use gembridge_core::{Error, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, info, warn};

use crate::config::{BracketMode, CaptureConfig};
use crate::noise::NoiseTable;
use crate::page::ChatPage;
use crate::probe::DomProbe;
use crate::types::{CapturedAnswer, ExtractionMethod, PageSnapshot};

static OBJECT_SPAN: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)\{.*\}").unwrap());
static ARRAY_SPAN: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)\[.*\]").unwrap());

pub struct ExtractionPipeline<'a> {
    config: &'a CaptureConfig,
    noise: &'a NoiseTable,
}

impl<'a> ExtractionPipeline<'a> {
    pub fn new(config: &'a CaptureConfig, noise: &'a NoiseTable) -> Self {
        Self { config, noise }
    }

    pub async fn extract(
        &self,
        page: &dyn ChatPage,
        probe: &DomProbe,
        snapshot: &PageSnapshot,
        prompt: &str,
    ) -> Result<CapturedAnswer> {
        let (raw, method) = match self.from_answer_element(page, probe, snapshot).await {
            Ok(Some(found)) => found,
            Ok(None) => self.from_text_diff(page, snapshot, prompt).await?,
            Err(e) => {
                warn!("Answer element read failed, using text diff: {}", e);
                self.from_text_diff(page, snapshot, prompt).await?
            }
        };

        let cleaned = post_process(&raw, self.config.bracket_mode, self.noise);
        let answer = CapturedAnswer::new(cleaned, method);
        if answer.char_count < self.config.min_capture_chars {
            warn!(
                "Captured text too short ({} chars via {:?})",
                answer.char_count, method
            );
            return Err(Error::EmptyOrTooShortCapture(answer.char_count));
        }

        info!(
            "Captured {} chars via {:?}",
            answer.char_count, answer.extraction_method
        );
        Ok(answer)
    }

    /// Newest answer element; code blocks win over the element's own text.
    async fn from_answer_element(
        &self,
        page: &dyn ChatPage,
        probe: &DomProbe,
        snapshot: &PageSnapshot,
    ) -> Result<Option<(String, ExtractionMethod)>> {
        let answers = probe.answer_elements(page).await?;
        let Some(last) = answers.last() else {
            return Ok(None);
        };

        let blocks: Vec<String> = page
            .code_block_texts(last)
            .await?
            .into_iter()
            .filter(|b| !b.trim().is_empty())
            .collect();
        let (text, method) = if blocks.is_empty() {
            (page.element_text(last).await?, ExtractionMethod::ElementText)
        } else {
            (blocks.join("\n"), ExtractionMethod::CodeBlock)
        };

        // A node that was already there is a previous turn, not the answer.
        if text.trim().is_empty() || snapshot.contains(&text) {
            debug!("Newest answer element is empty or stale");
            return Ok(None);
        }
        Ok(Some((text, method)))
    }

    async fn from_text_diff(
        &self,
        page: &dyn ChatPage,
        snapshot: &PageSnapshot,
        prompt: &str,
    ) -> Result<(String, ExtractionMethod)> {
        let current = page.body_text().await?;
        let text = text_diff(
            &current,
            &snapshot.full_text,
            prompt,
            self.config.prompt_prefix_chars,
            self.config.tail_fallback_chars,
        );
        Ok((text, ExtractionMethod::TextDiff))
    }
}

/// Best-effort new text when no answer element is usable.
///
/// Prefers whatever follows the last echo of the prompt, then the growth past
/// the baseline, then the last `tail_chars` characters.
pub fn text_diff(
    current: &str,
    baseline: &str,
    prompt: &str,
    prefix_chars: usize,
    tail_chars: usize,
) -> String {
    let prompt = prompt.trim();
    let prefix: String = prompt.chars().take(prefix_chars).collect();
    if !prefix.is_empty() {
        if let Some(pos) = current.rfind(&prefix) {
            let rest = &current[pos..];
            let after = rest
                .strip_prefix(prompt)
                .unwrap_or(&rest[prefix.len()..]);
            if !after.trim().is_empty() {
                return after.trim().to_string();
            }
        }
    }

    // Edits elsewhere on the page shift content, so go by length, not prefix.
    let growth = current.chars().count().saturating_sub(baseline.chars().count());
    if growth > 0 {
        let grown = last_chars(current, growth);
        if !grown.trim().is_empty() {
            return grown.trim().to_string();
        }
    }

    last_chars(current, tail_chars).trim().to_string()
}

fn last_chars(text: &str, n: usize) -> &str {
    let total = text.chars().count();
    match text.char_indices().nth(total.saturating_sub(n)) {
        Some((start, _)) => &text[start..],
        None => "",
    }
}

/// Bracket isolation followed by the noise strip.
pub fn post_process(raw: &str, mode: BracketMode, noise: &NoiseTable) -> String {
    let isolated = match mode {
        BracketMode::Off => None,
        BracketMode::Greedy => bracket_span(raw),
        BracketMode::Json => bracket_span(raw)
            .filter(|span| serde_json::from_str::<serde_json::Value>(span).is_ok()),
    };
    noise.strip(isolated.unwrap_or(raw))
}

/// Longest `{...}` or `[...]` span.
fn bracket_span(text: &str) -> Option<&str> {
    let object = OBJECT_SPAN.find(text).map(|m| m.as_str());
    let array = ARRAY_SPAN.find(text).map(|m| m.as_str());
    match (object, array) {
        (Some(o), Some(a)) => Some(if a.len() > o.len() { a } else { o }),
        (o, a) => o.or(a),
    }
}
