//! Durable verification log: the pipeline's learning record.
//!
//! Every processed (non-skipped) claim gets one append-only [`LogEntry`] in a
//! single JSON store. Appends are serialized behind an async lock and written
//! via a flushed temp-file rename, so concurrent requests never clobber each
//! other and an acknowledged append is on disk. The log also answers
//! similarity lookups ("have we judged something like this before?") and
//! surfaces frequent vocabulary per verdict as a coarse pattern signal.

use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::warn;

use crate::matcher::{self, DEFAULT_MAX_DISTANCE};
use crate::models::{LogEntry, Verdict};

/// Similarity cutoff for [`VerificationLog::find_similar`].
const SIMILARITY_THRESHOLD: f64 = 0.5;

/// Cap on terms returned by [`extract_patterns`].
const MAX_PATTERN_TERMS: usize = 10;

pub struct VerificationLog {
    path: PathBuf,
    /// Serializes the load-modify-persist cycle so concurrent appends cannot
    /// lose entries.
    write_lock: Mutex<()>,
}

/// Frequent-claim vocabulary split by verdict history.
#[derive(Debug, Clone, Default)]
pub struct VerdictPatterns {
    pub hoax_terms: Vec<String>,
    pub verified_terms: Vec<String>,
}

impl VerificationLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// Append one entry and persist the full log before returning.
    pub async fn append(&self, mut entry: LogEntry) -> Result<()> {
        // Belt and braces: entries are clamped at construction, but the store
        // must never hold an out-of-range confidence.
        entry.confidence = entry.confidence.min(100);

        let _guard = self.write_lock.lock().await;
        let mut entries = self.load()?;
        entries.push(entry);
        self.persist(&entries)
    }

    /// All entries, oldest first. An absent or empty store is zero entries.
    pub async fn entries(&self) -> Result<Vec<LogEntry>> {
        self.load()
    }

    /// Prior entries whose claim overlaps the new one, most recent first,
    /// at most `limit`.
    pub async fn find_similar(&self, claim: &str, limit: usize) -> Result<Vec<LogEntry>> {
        let entries = self.load()?;
        let mut similar: Vec<LogEntry> = entries
            .into_iter()
            .filter(|entry| claim_similarity(claim, &entry.claim) > SIMILARITY_THRESHOLD)
            .collect();

        // Entries are stored oldest-first; keep the most recent `limit` and
        // return them in recency order.
        let keep = similar.len().saturating_sub(limit);
        similar.drain(..keep);
        similar.reverse();
        Ok(similar)
    }

    /// Set the retroactive correction fields on the entry matching
    /// timestamp + claim. Returns whether a matching entry was found.
    pub async fn record_feedback(
        &self,
        timestamp: &str,
        claim: &str,
        was_correct: bool,
        feedback: Option<String>,
    ) -> Result<bool> {
        let _guard = self.write_lock.lock().await;
        let mut entries = self.load()?;

        let Some(entry) = entries
            .iter_mut()
            .find(|e| e.timestamp == timestamp && e.claim == claim)
        else {
            warn!(timestamp, "feedback for unknown log entry ignored");
            return Ok(false);
        };

        entry.was_correct = Some(was_correct);
        entry.feedback = feedback;
        self.persist(&entries)?;
        Ok(true)
    }

    /// Frequent claim vocabulary split by HOAX vs VERIFIED history.
    pub async fn verdict_patterns(&self) -> Result<VerdictPatterns> {
        let entries = self.load()?;
        let hoax_claims: Vec<String> = entries
            .iter()
            .filter(|e| e.verdict == Verdict::Hoax)
            .map(|e| e.claim.clone())
            .collect();
        let verified_claims: Vec<String> = entries
            .iter()
            .filter(|e| e.verdict == Verdict::Verified)
            .map(|e| e.claim.clone())
            .collect();

        Ok(VerdictPatterns {
            hoax_terms: extract_patterns(&hoax_claims),
            verified_terms: extract_patterns(&verified_claims),
        })
    }

    fn load(&self) -> Result<Vec<LogEntry>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let content = std::fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read log store: {}", self.path.display()))?;
        if content.trim().is_empty() {
            return Ok(Vec::new());
        }
        serde_json::from_str(&content)
            .with_context(|| format!("Malformed log store: {}", self.path.display()))
    }

    /// Write the full log to a temp sibling, flush it, then rename over the
    /// store so readers never observe a half-written file.
    fn persist(&self, entries: &[LogEntry]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create log dir: {}", parent.display()))?;
            }
        }

        let tmp_path = self.path.with_extension("json.tmp");
        let json = serde_json::to_string_pretty(entries)?;
        {
            let mut file = std::fs::File::create(&tmp_path)
                .with_context(|| format!("Failed to create {}", tmp_path.display()))?;
            file.write_all(json.as_bytes())?;
            file.sync_all()?;
        }
        std::fs::rename(&tmp_path, &self.path)
            .with_context(|| format!("Failed to replace log store: {}", self.path.display()))?;
        Ok(())
    }
}

/// Token-set overlap between two claims: count of tokens in one claim with a
/// lexical match in the other, divided by the larger token-set size. Token
/// matching reuses the fuzzy matcher so "exams"/"exam" and "december"/"dec"
/// count as shared.
pub fn claim_similarity(a: &str, b: &str) -> f64 {
    let a_tokens = unique_words(a);
    let b_tokens = unique_words(b);
    if a_tokens.is_empty() || b_tokens.is_empty() {
        return 0.0;
    }

    let common = a_tokens
        .iter()
        .filter(|at| {
            b_tokens
                .iter()
                .any(|bt| matcher::matches_term(at, bt, DEFAULT_MAX_DISTANCE))
        })
        .count();

    common as f64 / a_tokens.len().max(b_tokens.len()) as f64
}

/// Frequent terms (length > 3, occurring at least twice) over a claim subset,
/// most frequent first. Ties are broken alphabetically for determinism.
pub fn extract_patterns(claims: &[String]) -> Vec<String> {
    let mut frequency: BTreeMap<String, usize> = BTreeMap::new();
    for claim in claims {
        for token in claim.to_lowercase().split_whitespace() {
            let token: String = token.chars().filter(|c| c.is_alphanumeric()).collect();
            if token.chars().count() > 3 {
                *frequency.entry(token).or_insert(0) += 1;
            }
        }
    }

    let mut terms: Vec<(String, usize)> = frequency
        .into_iter()
        .filter(|(_, count)| *count >= 2)
        .collect();
    terms.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
    terms
        .into_iter()
        .take(MAX_PATTERN_TERMS)
        .map(|(term, _)| term)
        .collect()
}

/// Lower-cased whitespace tokens, duplicates removed.
fn unique_words(text: &str) -> Vec<String> {
    let mut words = Vec::new();
    for word in text.to_lowercase().split_whitespace() {
        let word: String = word
            .chars()
            .filter(|c| c.is_alphanumeric())
            .collect();
        if !word.is_empty() && !words.contains(&word) {
            words.push(word);
        }
    }
    words
}

/// Path of the log store inside a base directory, at its well-known name.
pub fn default_store_path(base: &Path) -> PathBuf {
    base.join("verification_log.json")
}
