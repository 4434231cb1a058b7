//! Verdict orchestrator: the decision policy as an explicit state machine.
//!
//! The pipeline for one message is
//! `RECEIVED → GATED → MEDIA_CHECKED → LOCAL_SEARCHED → EXTERNALLY_SEARCHED →
//! DECIDED → LOGGED`. Skips short-circuit from GATED straight to terminal
//! with nothing logged. Fraudulent media short-circuits to DECIDED(HOAX) —
//! once physical-document fraud is detected, no external search can overturn
//! it.
//!
//! The tallying and short-circuit rules live here as deterministic code; the
//! language model behind [`VerdictWriter`] only words a verdict that has
//! already been computed. Every evidence-gathering step is failure-absorbed:
//! the orchestrator always reaches DECIDED with whatever evidence it
//! collected. No lock is held across a network call, so a slow or abandoned
//! evidence call never blocks gating or indexing for other messages.

use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{info, warn};

use crate::evidence::{search_absorbed, EvidenceSource, SearchOptions};
use crate::gatekeeper::Gatekeeper;
use crate::index::{unique_lex_tokens, DocumentIndex};
use crate::log::VerificationLog;
use crate::models::{EvidenceResult, LogEntry, Message, QueryHits, Verdict};
use crate::video::{find_video_link, VideoEvidence};

/// Fixed reply used when no verdict text can be produced at all. The one
/// failure that is surfaced to the end user rather than purely logged.
pub const FALLBACK_REPLY: &str = "We're having technical difficulty verifying this message \
right now. Please rely on official channels until we can check it.";

/// Urgency framing that marks a claim as alarmist.
const URGENCY_TERMS: &[&str] = &[
    "urgent",
    "breaking",
    "immediately",
    "share",
    "forward",
    "spread",
    "alert",
    "emergency",
    "warning",
];

/// Institution-wide disruption vocabulary. Absence of an official
/// announcement for such a claim is itself disconfirming evidence.
const DISRUPTION_TERMS: &[&str] = &[
    "shut",
    "closed",
    "closure",
    "shutdown",
    "cancelled",
    "canceled",
    "postponed",
    "suspended",
    "banned",
    "curfew",
    "strike",
    "lockdown",
    "evacuated",
];

/// Debunking vocabulary: an overlapping result carrying one of these is read
/// as contradicting the claim rather than corroborating it.
const DEBUNK_TERMS: &[&str] = &[
    "fake",
    "hoax",
    "false",
    "fabricated",
    "misleading",
    "rumour",
    "rumor",
    "debunked",
    "clarification",
    "denied",
    "no truth",
];

/// Pipeline states, recorded on the report for debuggability.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Received,
    Gated,
    MediaChecked,
    LocalSearched,
    ExternallySearched,
    Decided,
    Logged,
}

/// What an image/document analysis collaborator concluded about attached media.
#[derive(Debug, Clone)]
pub struct MediaAssessment {
    /// False when the attachment could not be read at all.
    pub readable: bool,
    /// Whether the attachment carries official markers (letterhead, seal,
    /// reference number).
    pub official_markers: bool,
    /// Whether the attachment's content matches the claim made about it.
    pub matches_claim: bool,
}

impl MediaAssessment {
    /// Unreadable, unofficial, or mismatched media is sufficient on its own
    /// for a HOAX verdict.
    pub fn is_fraudulent(&self) -> bool {
        !self.readable || !self.official_markers || !self.matches_claim
    }
}

/// Image/document analysis collaborator. External; failures are absorbed as
/// "media unavailable" and the pipeline proceeds without it.
#[async_trait]
pub trait MediaAnalyzer: Send + Sync {
    async fn assess(&self, message: &Message) -> Result<MediaAssessment>;
}

/// Decision-model collaborator that words an already-computed verdict.
///
/// The state machine governs when tools run and what the verdict is; this
/// trait is only responsible for natural-language phrasing.
#[async_trait]
pub trait VerdictWriter: Send + Sync {
    async fn compose(
        &self,
        claim: &str,
        decision: &Decision,
        context: &DecisionContext,
    ) -> Result<String>;
}

/// A computed verdict plus the material that supports it.
#[derive(Debug, Clone)]
pub struct Decision {
    pub verdict: Verdict,
    /// Always in [0, 100].
    pub confidence: u8,
    /// The cited primary source, when one exists.
    pub primary_source: Option<String>,
    pub rationale: String,
}

/// Everything gathered on the way to a decision, handed to the writer.
#[derive(Debug, Clone, Default)]
pub struct DecisionContext {
    /// Text of the message this one replies to, when the platform supplied
    /// it. Carried for the writer's prompt; the tally never reads it.
    pub reply_context: Option<String>,
    pub local_hits: QueryHits,
    /// Official result first, then general sources, in call order.
    pub evidence: Vec<EvidenceResult>,
    pub video_evidence: Option<String>,
    /// Related prior log entries, most recent first.
    pub similar_past: Vec<LogEntry>,
}

/// Terminal outcome for one message.
#[derive(Debug, Clone)]
pub enum Outcome {
    Skipped { reason: String },
    Decided(Decision),
}

/// Full result of running one message through the pipeline.
#[derive(Debug, Clone)]
pub struct Report {
    pub outcome: Outcome,
    /// Verdict text for delivery. `None` for skipped messages.
    pub reply: Option<String>,
    pub trace: Vec<Stage>,
}

pub struct Orchestrator {
    gatekeeper: Gatekeeper,
    index: Arc<DocumentIndex>,
    /// The high-precision, domain-scoped source; the mandatory tiebreaker.
    official: Arc<dyn EvidenceSource>,
    general: Vec<Arc<dyn EvidenceSource>>,
    video: Option<Arc<VideoEvidence>>,
    media: Option<Arc<dyn MediaAnalyzer>>,
    writer: Arc<dyn VerdictWriter>,
    log: Arc<VerificationLog>,
    trusted_domains: Vec<String>,
    top_k: usize,
    result_count: usize,
}

impl Orchestrator {
    pub fn new(
        gatekeeper: Gatekeeper,
        index: Arc<DocumentIndex>,
        official: Arc<dyn EvidenceSource>,
        writer: Arc<dyn VerdictWriter>,
        log: Arc<VerificationLog>,
    ) -> Self {
        Self {
            gatekeeper,
            index,
            official,
            general: Vec::new(),
            video: None,
            media: None,
            writer,
            log,
            trusted_domains: Vec::new(),
            top_k: 3,
            result_count: 5,
        }
    }

    pub fn with_general_source(mut self, source: Arc<dyn EvidenceSource>) -> Self {
        self.general.push(source);
        self
    }

    pub fn with_video(mut self, video: Arc<VideoEvidence>) -> Self {
        self.video = Some(video);
        self
    }

    pub fn with_media_analyzer(mut self, media: Arc<dyn MediaAnalyzer>) -> Self {
        self.media = Some(media);
        self
    }

    pub fn with_trusted_domains(mut self, domains: Vec<String>) -> Self {
        self.trusted_domains = domains;
        self
    }

    pub fn with_limits(mut self, top_k: usize, result_count: usize) -> Self {
        self.top_k = top_k.max(1);
        self.result_count = result_count.max(1);
        self
    }

    /// Run one message through the full pipeline.
    pub async fn handle(&self, message: &Message) -> Report {
        let mut trace = vec![Stage::Received];

        let gate = self.gatekeeper.classify(message);
        trace.push(Stage::Gated);
        if !gate.should_process {
            info!(reason = %gate.reason, "message gated out");
            return Report {
                outcome: Outcome::Skipped { reason: gate.reason },
                reply: None,
                trace,
            };
        }

        let claim = message.claim_text();
        let mut context = DecisionContext {
            reply_context: message.reply_context.clone(),
            ..DecisionContext::default()
        };

        let decision = match self.check_media(message, &mut trace).await {
            Some(decision) => decision,
            None => self.gather_and_decide(message, &claim, &mut context, &mut trace).await,
        };
        trace.push(Stage::Decided);

        // Surface related prior decisions before this one is appended, so the
        // claim cannot match itself.
        context.similar_past = match self.log.find_similar(&claim, 5).await {
            Ok(similar) => similar,
            Err(err) => {
                warn!(%err, "similar-claim lookup failed");
                Vec::new()
            }
        };

        let entry = LogEntry::new(
            &claim,
            decision.verdict,
            self.cited_sources(&decision, &context),
            decision.confidence as i64,
        );
        // A failed append is reported but never blocks the verdict.
        match self.log.append(entry).await {
            Ok(()) => trace.push(Stage::Logged),
            Err(err) => warn!(%err, "failed to persist verification log entry"),
        }

        let reply = match self.writer.compose(&claim, &decision, &context).await {
            Ok(text) if !text.trim().is_empty() => text,
            Ok(_) => {
                warn!("decision model returned no content, using fallback reply");
                FALLBACK_REPLY.to_string()
            }
            Err(err) => {
                warn!(%err, "decision model failed, using fallback reply");
                FALLBACK_REPLY.to_string()
            }
        };

        Report {
            outcome: Outcome::Decided(decision),
            reply: Some(reply),
            trace,
        }
    }

    /// Media check: runs before any other evidence step. Returns a verdict
    /// only when fraud is detected; analyzer failure means "media
    /// unavailable" and the pipeline proceeds.
    async fn check_media(&self, message: &Message, trace: &mut Vec<Stage>) -> Option<Decision> {
        if !message.has_image && !message.has_document {
            return None;
        }
        let analyzer = self.media.as_ref()?;

        match analyzer.assess(message).await {
            Ok(assessment) => {
                trace.push(Stage::MediaChecked);
                if assessment.is_fraudulent() {
                    Some(Decision {
                        verdict: Verdict::Hoax,
                        confidence: 90,
                        primary_source: Some("attachment analysis".to_string()),
                        rationale: "attached media lacks official markers or does not match \
                                    the claim"
                            .to_string(),
                    })
                } else {
                    None
                }
            }
            Err(err) => {
                warn!(%err, "media analysis unavailable, continuing without it");
                trace.push(Stage::MediaChecked);
                None
            }
        }
    }

    async fn gather_and_decide(
        &self,
        message: &Message,
        claim: &str,
        context: &mut DecisionContext,
        trace: &mut Vec<Stage>,
    ) -> Decision {
        let local_hits = match self.index.query(claim, self.top_k).await {
            Ok(hits) => hits,
            Err(err) => {
                warn!(%err, "document index query failed, continuing without local evidence");
                QueryHits::default()
            }
        };
        trace.push(Stage::LocalSearched);

        let dramatic = is_dramatic(claim);

        // A relevant match in the official reference corpus settles a
        // non-dramatic claim without external search. Disruption claims still
        // require external corroboration.
        if local_hits.has_relevant_results && !dramatic {
            let top = &local_hits.chunks[0];
            let decision = Decision {
                verdict: Verdict::Verified,
                confidence: 85,
                primary_source: Some(top.chunk.source_name.clone()),
                rationale: format!(
                    "answered from the official reference document '{}'",
                    top.chunk.source_name
                ),
            };
            context.local_hits = local_hits;
            return decision;
        }
        context.local_hits = local_hits;

        let official_result = search_absorbed(
            self.official.as_ref(),
            claim,
            &SearchOptions {
                domains: self.trusted_domains.clone(),
                count: self.result_count,
            },
        )
        .await;

        let mut general_results = Vec::new();
        for source in &self.general {
            general_results.push(
                search_absorbed(
                    source.as_ref(),
                    claim,
                    &SearchOptions {
                        domains: Vec::new(),
                        count: self.result_count,
                    },
                )
                .await,
            );
        }

        if let Some(video) = &self.video {
            if let Some(link) = find_video_link(&message.text) {
                match video.inspect(&link, claim).await {
                    Ok(report) => {
                        let mut text = report.evidence_text.clone();
                        if report.pending_review {
                            text.push_str("\n(pending review: video content could not be \
                                           mechanically related to the claim)");
                        }
                        context.video_evidence = Some(text);
                    }
                    Err(err) => warn!(%err, "video evidence unavailable"),
                }
            }
        }
        trace.push(Stage::ExternallySearched);

        let decision = decide(claim, dramatic, &official_result, &general_results);

        context.evidence = std::iter::once(official_result)
            .chain(general_results)
            .collect();
        decision
    }

    /// Sources to record on the log entry: the primary citation plus every
    /// source that was checked.
    fn cited_sources(&self, decision: &Decision, context: &DecisionContext) -> Vec<String> {
        let mut sources = Vec::new();
        if let Some(primary) = &decision.primary_source {
            sources.push(primary.clone());
        }
        for result in &context.evidence {
            for checked in &result.sources_checked {
                if !sources.contains(checked) {
                    sources.push(checked.clone());
                }
            }
        }
        sources
    }
}

/// How one evidence source relates to the claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stance {
    Corroborates,
    Contradicts,
    Silent,
}

/// Reduce the collected evidence to a verdict via the tallying rules.
fn decide(
    claim: &str,
    dramatic: bool,
    official_result: &EvidenceResult,
    general_results: &[EvidenceResult],
) -> Decision {
    let claim_tokens = unique_lex_tokens(claim);

    let official_stance = stance_of(&claim_tokens, official_result);
    let general_stances: Vec<Stance> = general_results
        .iter()
        .map(|result| stance_of(&claim_tokens, result))
        .collect();

    let agreeing = general_stances
        .iter()
        .filter(|s| **s == Stance::Corroborates)
        .count()
        + usize::from(official_stance == Stance::Corroborates);
    let contradicting = general_stances
        .iter()
        .filter(|s| **s == Stance::Contradicts)
        .count()
        + usize::from(official_stance == Stance::Contradicts);

    let primary = primary_citation(official_result, general_results);

    if contradicting >= 2 {
        return Decision {
            verdict: Verdict::Hoax,
            confidence: 90,
            primary_source: primary,
            rationale: "multiple independent sources contradict the claim".to_string(),
        };
    }
    if agreeing >= 2 {
        return Decision {
            verdict: Verdict::Verified,
            confidence: 90,
            primary_source: primary,
            rationale: "multiple independent sources corroborate the claim".to_string(),
        };
    }

    if agreeing == 1 && contradicting == 1 {
        // Conflict: the high-precision source breaks the tie.
        return match official_stance {
            Stance::Corroborates => Decision {
                verdict: Verdict::Verified,
                confidence: 65,
                primary_source: primary,
                rationale: "conflicting reports, resolved by the official source".to_string(),
            },
            Stance::Contradicts => Decision {
                verdict: Verdict::Hoax,
                confidence: 65,
                primary_source: primary,
                rationale: "conflicting reports, resolved by the official source".to_string(),
            },
            Stance::Silent => silent_official_verdict(dramatic, primary),
        };
    }

    if contradicting == 1 {
        return Decision {
            verdict: Verdict::Hoax,
            confidence: 70,
            primary_source: primary,
            rationale: "a checked source contradicts the claim".to_string(),
        };
    }

    if agreeing == 1 {
        if official_stance == Stance::Corroborates {
            return Decision {
                verdict: Verdict::Verified,
                confidence: 75,
                primary_source: primary,
                rationale: "corroborated by the official source".to_string(),
            };
        }
        if dramatic {
            // One unofficial echo of a dramatic claim with official silence
            // is how hoaxes spread.
            return Decision {
                verdict: Verdict::Hoax,
                confidence: 70,
                primary_source: Some("absence of any official announcement".to_string()),
                rationale: "dramatic claim repeated without any official confirmation".to_string(),
            };
        }
        return Decision {
            verdict: Verdict::Verified,
            confidence: 55,
            primary_source: primary,
            rationale: "a single unofficial source corroborates the claim".to_string(),
        };
    }

    // Zero corroboration from every source.
    if dramatic {
        return Decision {
            verdict: Verdict::Hoax,
            confidence: 80,
            primary_source: Some("absence of any official announcement".to_string()),
            rationale: "an institution-wide disruption would carry an official announcement; \
                        none exists"
                .to_string(),
        };
    }
    Decision {
        verdict: Verdict::Uncertain,
        confidence: 30,
        primary_source: None,
        rationale: "no evidence found for or against this claim".to_string(),
    }
}

fn silent_official_verdict(dramatic: bool, primary: Option<String>) -> Decision {
    if dramatic {
        Decision {
            verdict: Verdict::Hoax,
            confidence: 60,
            primary_source: Some("absence of any official announcement".to_string()),
            rationale: "conflicting unofficial reports and no official confirmation".to_string(),
        }
    } else {
        Decision {
            verdict: Verdict::Uncertain,
            confidence: 40,
            primary_source: primary,
            rationale: "conflicting unofficial reports".to_string(),
        }
    }
}

/// A source's stance: silent unless at least one item overlaps the claim;
/// overlapping items carrying debunk vocabulary contradict, others corroborate.
fn stance_of(claim_tokens: &[String], result: &EvidenceResult) -> Stance {
    if !result.found {
        return Stance::Silent;
    }

    let mut saw_overlap = false;
    for item in &result.items {
        let text = format!("{} {}", item.title, item.excerpt).to_lowercase();
        if !overlaps_claim(claim_tokens, &text) {
            continue;
        }
        saw_overlap = true;
        if DEBUNK_TERMS.iter().any(|term| text.contains(term)) {
            return Stance::Contradicts;
        }
    }

    if saw_overlap {
        Stance::Corroborates
    } else {
        Stance::Silent
    }
}

/// An item is about the claim when at least half of the claim's tokens (or
/// any three of them) appear in it.
fn overlaps_claim(claim_tokens: &[String], text_lower: &str) -> bool {
    if claim_tokens.is_empty() {
        return false;
    }
    let hits = claim_tokens
        .iter()
        .filter(|token| text_lower.contains(token.as_str()))
        .count();
    hits * 2 >= claim_tokens.len() || hits >= 3
}

/// Preferred citation: an official-flagged item, then any official-search
/// item, then the first general item.
fn primary_citation(
    official_result: &EvidenceResult,
    general_results: &[EvidenceResult],
) -> Option<String> {
    if let Some(item) = official_result
        .items
        .iter()
        .find(|item| item.official == Some(true))
    {
        return Some(item.url.clone());
    }
    if let Some(item) = official_result.items.first() {
        return Some(item.url.clone());
    }
    general_results
        .iter()
        .flat_map(|result| result.items.first())
        .next()
        .map(|item| item.url.clone())
}

/// Alarmist framing (shouting, urgency vocabulary) or an institution-wide
/// disruption claim.
pub fn is_dramatic(claim: &str) -> bool {
    let exclamations = claim.matches('!').count();

    let letters: Vec<char> = claim.chars().filter(|c| c.is_alphabetic()).collect();
    let shouting = if letters.len() >= 10 {
        let upper = letters.iter().filter(|c| c.is_uppercase()).count();
        upper as f64 / letters.len() as f64 > 0.3
    } else {
        false
    };

    let tokens = unique_lex_tokens(claim);
    let urgent = tokens
        .iter()
        .any(|t| URGENCY_TERMS.contains(&t.as_str()));
    let disruption = tokens
        .iter()
        .any(|t| DISRUPTION_TERMS.contains(&t.as_str()));

    exclamations >= 2 || shouting || urgent || disruption
}
