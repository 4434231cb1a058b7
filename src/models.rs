//! Core data models used throughout claimsift.
//!
//! These types represent the messages, decisions, chunks, and evidence that
//! flow through the verification pipeline: inbound message → gatekeeper →
//! retrieval → evidence aggregation → verdict → log entry.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// A normalized inbound chat message, as supplied by a platform adapter.
///
/// Ephemeral: constructed per request from adapter-supplied fields and never
/// persisted by the core.
#[derive(Debug, Clone, Default)]
pub struct Message {
    pub text: String,
    pub caption: Option<String>,
    pub has_image: bool,
    pub has_document: bool,
    pub is_forwarded: bool,
    /// Text of the message this one replies to, when the platform provides it.
    pub reply_context: Option<String>,
}

impl Message {
    /// Convenience constructor for plain text messages.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }

    /// The claim text under verification: message text plus caption.
    pub fn claim_text(&self) -> String {
        match &self.caption {
            Some(c) if !c.trim().is_empty() => format!("{} {}", self.text, c),
            _ => self.text.clone(),
        }
    }

    /// True when the message carries neither text, caption, nor media.
    pub fn is_empty(&self) -> bool {
        self.text.trim().is_empty()
            && self.caption.as_deref().map_or(true, |c| c.trim().is_empty())
            && !self.has_image
            && !self.has_document
    }
}

/// Processing priority assigned by the gatekeeper.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    Medium,
    Low,
    Skip,
}

/// The gatekeeper's admission-control decision for one message.
///
/// Invariant: `priority == Skip` if and only if `should_process == false`.
#[derive(Debug, Clone)]
pub struct GatekeeperDecision {
    pub should_process: bool,
    pub reason: String,
    /// Matched trigger terms in first-encountered order, duplicates suppressed.
    pub matched_keywords: Vec<String>,
    pub priority: Priority,
}

impl GatekeeperDecision {
    pub fn skip(reason: impl Into<String>) -> Self {
        Self {
            should_process: false,
            reason: reason.into(),
            matched_keywords: Vec::new(),
            priority: Priority::Skip,
        }
    }

    pub fn process(priority: Priority, reason: impl Into<String>) -> Self {
        debug_assert!(priority != Priority::Skip);
        Self {
            should_process: true,
            reason: reason.into(),
            matched_keywords: Vec::new(),
            priority,
        }
    }
}

/// A bounded, overlap-aware slice of a reference document.
///
/// Owned exclusively by the document index; rebuilt wholesale on reload.
/// Text is trimmed and at least 50 characters (shorter fragments are
/// discarded at build time).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentChunk {
    pub text: String,
    pub source_name: String,
    /// Position of this chunk within its source file, starting at 0.
    pub chunk_index: usize,
}

/// A chunk plus its relevance score for one query. Ephemeral.
#[derive(Debug, Clone)]
pub struct ScoredChunk {
    pub chunk: DocumentChunk,
    /// Lexical-overlap score, ≥ 0, rounded to 2 decimals at the retrieval boundary.
    pub relevance_score: f64,
}

/// Top-K retrieval response from the document index.
#[derive(Debug, Clone, Default)]
pub struct QueryHits {
    pub chunks: Vec<ScoredChunk>,
    /// True when the best score exceeds the relevance threshold.
    pub has_relevant_results: bool,
}

/// One result item from an evidence source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvidenceItem {
    pub title: String,
    pub url: String,
    pub excerpt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub published_date: Option<String>,
    /// Set when domain scoping was requested: whether the item's host belongs
    /// to the trusted-domain set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub official: Option<bool>,
}

/// The uniform response shape for every evidence source.
///
/// A source that fails or is unconfigured returns an empty `found = false`
/// result rather than an error; faults never reach the orchestrator.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EvidenceResult {
    pub found: bool,
    pub items: Vec<EvidenceItem>,
    pub sources_checked: BTreeSet<String>,
}

impl EvidenceResult {
    /// Empty result attributed to `source`, used for degraded/unconfigured sources.
    pub fn empty(source: &str) -> Self {
        let mut sources_checked = BTreeSet::new();
        sources_checked.insert(source.to_string());
        Self {
            found: false,
            items: Vec::new(),
            sources_checked,
        }
    }
}

/// Final verdict on a processed claim.
///
/// `Uncertain` is the "unable to verify" outcome, reserved for minor or
/// ambiguous claims with zero evidence from every source. Skipped messages
/// receive no verdict at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Verdict {
    #[serde(rename = "HOAX")]
    Hoax,
    #[serde(rename = "VERIFIED")]
    Verified,
    #[serde(rename = "UNCERTAIN")]
    Uncertain,
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Verdict::Hoax => "HOAX",
            Verdict::Verified => "VERIFIED",
            Verdict::Uncertain => "UNCERTAIN",
        };
        f.write_str(s)
    }
}

/// One durable record in the verification log.
///
/// Append-only; only `was_correct` and `feedback` may be set retroactively,
/// matched on timestamp + claim.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    /// ISO-8601 timestamp of the decision.
    pub timestamp: String,
    pub claim: String,
    pub verdict: Verdict,
    pub sources: Vec<String>,
    /// Always in [0, 100]; clamped before persisting.
    pub confidence: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub was_correct: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub feedback: Option<String>,
}

impl LogEntry {
    /// Build an entry timestamped now, clamping confidence into [0, 100].
    pub fn new(
        claim: impl Into<String>,
        verdict: Verdict,
        sources: Vec<String>,
        confidence: i64,
    ) -> Self {
        Self {
            timestamp: chrono::Utc::now().to_rfc3339(),
            claim: claim.into(),
            verdict,
            sources,
            confidence: confidence.clamp(0, 100) as u8,
            was_correct: None,
            feedback: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_claim_text_joins_caption() {
        let mut msg = Message::text("exam postponed");
        msg.caption = Some("see attached circular".to_string());
        assert_eq!(msg.claim_text(), "exam postponed see attached circular");
    }

    #[test]
    fn test_claim_text_ignores_blank_caption() {
        let mut msg = Message::text("hello");
        msg.caption = Some("   ".to_string());
        assert_eq!(msg.claim_text(), "hello");
    }

    #[test]
    fn test_is_empty_respects_media() {
        let mut msg = Message::text("");
        assert!(msg.is_empty());
        msg.has_image = true;
        assert!(!msg.is_empty());
    }

    #[test]
    fn test_skip_decision_invariant() {
        let d = GatekeeperDecision::skip("casual");
        assert!(!d.should_process);
        assert_eq!(d.priority, Priority::Skip);
    }

    #[test]
    fn test_log_entry_clamps_confidence() {
        let e = LogEntry::new("c", Verdict::Hoax, vec![], 250);
        assert_eq!(e.confidence, 100);
        let e = LogEntry::new("c", Verdict::Hoax, vec![], -5);
        assert_eq!(e.confidence, 0);
    }

    #[test]
    fn test_verdict_serializes_uppercase() {
        let json = serde_json::to_string(&Verdict::Hoax).unwrap();
        assert_eq!(json, "\"HOAX\"");
        let v: Verdict = serde_json::from_str("\"UNCERTAIN\"").unwrap();
        assert_eq!(v, Verdict::Uncertain);
    }
}
