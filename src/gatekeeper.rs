//! Admission-control classifier.
//!
//! Runs before any paid API call and decides whether a message warrants the
//! expensive verification pipeline at all. Deliberately cheap: no network,
//! no model, just flags and fuzzy keyword scanning. Under-triggering on
//! borderline chatter is acceptable; media attachments and keyword hits are
//! never silently dropped.

use crate::matcher::{self, DEFAULT_MAX_DISTANCE};
use crate::models::{GatekeeperDecision, Message, Priority};

/// Panic/misinformation trigger vocabulary. Tokens are scanned against this
/// list with fuzzy matching, so common misspellings still fire.
const TRIGGER_TERMS: &[&str] = &[
    "exam",
    "exams",
    "examination",
    "syllabus",
    "circular",
    "notice",
    "notification",
    "announcement",
    "postponed",
    "preponed",
    "rescheduled",
    "cancelled",
    "canceled",
    "cancellation",
    "holiday",
    "holidays",
    "closed",
    "closure",
    "shutdown",
    "suspended",
    "strike",
    "bandh",
    "curfew",
    "result",
    "results",
    "revaluation",
    "admission",
    "admissions",
    "counselling",
    "scholarship",
    "fees",
    "refund",
    "deadline",
    "extended",
    "timetable",
    "schedule",
    "semester",
    "internal",
    "internals",
    "practical",
    "practicals",
    "viva",
    "hallticket",
    "admit",
    "attendance",
    "detained",
    "debarred",
    "placement",
    "placements",
    "recruitment",
    "urgent",
    "breaking",
    "alert",
    "warning",
    "emergency",
    "official",
    "university",
    "college",
    "campus",
    "hostel",
    "ragging",
    "leaked",
    "datesheet",
];

/// Greetings, acknowledgements, and fillers. A short message made entirely of
/// these is casual chat and never enters the pipeline.
const CASUAL_WORDS: &[&str] = &[
    "hi",
    "hii",
    "hello",
    "hey",
    "ok",
    "okay",
    "yes",
    "no",
    "yeah",
    "yup",
    "nope",
    "thanks",
    "thank",
    "thx",
    "welcome",
    "good",
    "morning",
    "afternoon",
    "evening",
    "night",
    "bye",
    "lol",
    "haha",
    "hehe",
    "hmm",
    "oh",
    "wow",
    "nice",
    "cool",
    "great",
    "fine",
    "sure",
    "done",
    "pls",
    "please",
    "sorry",
    "congrats",
    "congratulations",
    "happy",
    "birthday",
    "wishes",
];

/// The admission-control classifier.
///
/// Parameterized so deployments can extend the trigger vocabulary without
/// forking the classifier; defaults match the built-in term tables.
pub struct Gatekeeper {
    trigger_terms: Vec<String>,
    casual_words: Vec<String>,
    max_edit_distance: usize,
}

impl Default for Gatekeeper {
    fn default() -> Self {
        Self::new()
    }
}

impl Gatekeeper {
    pub fn new() -> Self {
        Self {
            trigger_terms: TRIGGER_TERMS.iter().map(|s| s.to_string()).collect(),
            casual_words: CASUAL_WORDS.iter().map(|s| s.to_string()).collect(),
            max_edit_distance: DEFAULT_MAX_DISTANCE,
        }
    }

    /// Add deployment-specific trigger terms on top of the built-in list.
    pub fn with_extra_terms(mut self, extra: &[String]) -> Self {
        for term in extra {
            let term = term.to_lowercase();
            if !term.is_empty() && !self.trigger_terms.contains(&term) {
                self.trigger_terms.push(term);
            }
        }
        self
    }

    pub fn with_max_edit_distance(mut self, max_edit_distance: usize) -> Self {
        self.max_edit_distance = max_edit_distance;
        self
    }

    /// Classify a message. First matching rule wins:
    ///
    /// 0. empty message with no media → skip ("empty")
    /// 1. image or document attached → process, high priority
    /// 2. forwarded → process, medium priority
    /// 3. ≤3 tokens, all casual → skip ("casual")
    /// 4. any token fuzzy-matches a trigger term → process, high priority
    /// 5. otherwise → skip ("neutral")
    pub fn classify(&self, message: &Message) -> GatekeeperDecision {
        if message.is_empty() {
            return GatekeeperDecision::skip("empty");
        }

        // Media is always escalated: the most information-dense and most
        // spoofable claim medium.
        if message.has_image || message.has_document {
            return GatekeeperDecision::process(Priority::High, "media present");
        }

        if message.is_forwarded {
            return GatekeeperDecision::process(Priority::Medium, "forwarded");
        }

        let tokens = tokenize(&message.claim_text());

        if tokens.len() <= 3 && tokens.iter().all(|t| self.is_casual(t)) {
            return GatekeeperDecision::skip("casual");
        }

        let matched = self.scan_triggers(&tokens);
        if !matched.is_empty() {
            let mut decision = GatekeeperDecision::process(Priority::High, "keyword match");
            decision.matched_keywords = matched;
            return decision;
        }

        GatekeeperDecision::skip("neutral")
    }

    fn is_casual(&self, token: &str) -> bool {
        self.casual_words.iter().any(|w| w.contains(token))
    }

    /// Scan every token against the trigger list. Matched terms are collected
    /// in first-encountered order with duplicates suppressed.
    fn scan_triggers(&self, tokens: &[String]) -> Vec<String> {
        let mut matched: Vec<String> = Vec::new();
        for token in tokens {
            for term in &self.trigger_terms {
                if matcher::matches_term(token, term, self.max_edit_distance)
                    && !matched.contains(term)
                {
                    matched.push(term.clone());
                }
            }
        }
        matched
    }
}

/// Lower-case, whitespace-split, empty tokens dropped.
fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split_whitespace()
        .filter(|t| !t.is_empty())
        .map(|t| t.to_string())
        .collect()
}
