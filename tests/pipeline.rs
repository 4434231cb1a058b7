use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;

use anyhow::Result;
use async_trait::async_trait;

use claimsift::config::{load_config, Config};
use claimsift::evidence::{EvidenceSource, SearchOptions};
use claimsift::gatekeeper::Gatekeeper;
use claimsift::index::DocumentIndex;
use claimsift::log::VerificationLog;
use claimsift::models::{EvidenceItem, EvidenceResult, Message, Verdict};
use claimsift::orchestrator::{
    Decision, DecisionContext, Orchestrator, Outcome, VerdictWriter, FALLBACK_REPLY,
};

/// Route pipeline warnings (absorbed evidence failures, log errors) to the
/// test harness output. Safe to call from every test; only the first
/// initialization wins.
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn setup_test_env() -> (TempDir, Config) {
    init_tracing();
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let corpus_dir = root.join("reference");
    fs::create_dir_all(&corpus_dir).unwrap();
    fs::write(
        corpus_dir.join("academic_calendar.txt"),
        "Academic calendar 2025-26. Odd semester classes begin August 4. \
         Mid-semester examinations run from September 22 to September 27. \
         End-semester examinations begin December 1 and conclude December 12. \
         Winter vacation starts December 15.",
    )
    .unwrap();
    fs::write(
        corpus_dir.join("hostel_rules.md"),
        "# Hostel Rules\n\nHostel gates close at 10 PM on weekdays. \
         Visitors are permitted in common areas between 9 AM and 6 PM. \
         Mess fees are payable by the 5th of every month at the accounts office.",
    )
    .unwrap();

    let config_content = format!(
        r#"[corpus]
dir = "{}/reference"
include_globs = ["**/*.txt", "**/*.md"]

[chunking]
target_chars = 400
overlap_chars = 80

[retrieval]
top_k = 3
relevance_threshold = 0.1

[gatekeeper]
extra_trigger_terms = ["convocation"]

[log]
path = "{}/verification_log.json"
"#,
        root.display(),
        root.display()
    );
    let config_path = root.join("claimsift.toml");
    fs::write(&config_path, config_content).unwrap();

    let config = load_config(&config_path).unwrap();
    (tmp, config)
}

struct CannedSource {
    name: &'static str,
    result: EvidenceResult,
}

impl CannedSource {
    fn silent(name: &'static str) -> Arc<Self> {
        Arc::new(Self {
            name,
            result: EvidenceResult::empty(name),
        })
    }

    fn echoing(name: &'static str, claim: &str) -> Arc<Self> {
        let mut result = EvidenceResult::empty(name);
        result.found = true;
        result.items = vec![EvidenceItem {
            title: claim.to_string(),
            url: format!("https://{}.example/result", name),
            excerpt: claim.to_string(),
            published_date: None,
            official: None,
        }];
        Arc::new(Self { name, result })
    }
}

#[async_trait]
impl EvidenceSource for CannedSource {
    fn name(&self) -> &str {
        self.name
    }
    async fn search(&self, _query: &str, _opts: &SearchOptions) -> Result<EvidenceResult> {
        Ok(self.result.clone())
    }
}

struct PlainWriter;

#[async_trait]
impl VerdictWriter for PlainWriter {
    async fn compose(
        &self,
        claim: &str,
        decision: &Decision,
        _context: &DecisionContext,
    ) -> Result<String> {
        Ok(format!("[{}] {} ({})", decision.verdict, claim, decision.rationale))
    }
}

fn build_orchestrator(
    config: &Config,
    official: Arc<dyn EvidenceSource>,
    general: Option<Arc<dyn EvidenceSource>>,
) -> (Orchestrator, Arc<VerificationLog>) {
    let index = Arc::new(DocumentIndex::new(
        config.corpus.clone(),
        config.chunking.clone(),
        config.retrieval.clone(),
    ));
    let log = Arc::new(VerificationLog::new(config.log.path.clone()));
    let gatekeeper = Gatekeeper::new()
        .with_extra_terms(&config.gatekeeper.extra_trigger_terms)
        .with_max_edit_distance(config.gatekeeper.max_edit_distance);

    let mut orchestrator = Orchestrator::new(
        gatekeeper,
        index,
        official,
        Arc::new(PlainWriter),
        log.clone(),
    )
    .with_trusted_domains(config.evidence.trusted_domains.clone())
    .with_limits(config.retrieval.top_k, config.evidence.result_count);
    if let Some(source) = general {
        orchestrator = orchestrator.with_general_source(source);
    }
    (orchestrator, log)
}

fn log_path(config: &Config) -> PathBuf {
    config.log.path.clone()
}

#[tokio::test]
async fn test_corpus_question_verified_from_local_index() {
    let (_tmp, config) = setup_test_env();
    let (orchestrator, log) =
        build_orchestrator(&config, CannedSource::silent("web-search"), None);

    let report = orchestrator
        .handle(&Message::text(
            "when do the end semester examinations begin in december",
        ))
        .await;

    match &report.outcome {
        Outcome::Decided(decision) => {
            assert_eq!(decision.verdict, Verdict::Verified);
            assert_eq!(
                decision.primary_source.as_deref(),
                Some("academic_calendar.txt")
            );
        }
        other => panic!("unexpected outcome: {:?}", other),
    }

    let entries = log.entries().await.unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].verdict, Verdict::Verified);
    assert!(entries[0]
        .sources
        .contains(&"academic_calendar.txt".to_string()));
}

#[tokio::test]
async fn test_alarmist_rumor_with_no_evidence_is_hoax() {
    let (_tmp, config) = setup_test_env();
    let (orchestrator, log) = build_orchestrator(
        &config,
        CannedSource::silent("web-search"),
        Some(CannedSource::silent("neural-search")),
    );

    let report = orchestrator
        .handle(&Message::text(
            "BREAKING!! All hostels evacuated tonight, forward this to everyone NOW!!",
        ))
        .await;

    match &report.outcome {
        Outcome::Decided(decision) => {
            assert_eq!(decision.verdict, Verdict::Hoax);
            assert!(decision.confidence >= 70);
        }
        other => panic!("unexpected outcome: {:?}", other),
    }
    let reply = report.reply.unwrap();
    assert!(reply.contains("HOAX"), "reply was: {}", reply);

    let entries = log.entries().await.unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].verdict, Verdict::Hoax);
}

#[tokio::test]
async fn test_casual_chatter_is_skipped_and_unlogged() {
    let (_tmp, config) = setup_test_env();
    let (orchestrator, log) =
        build_orchestrator(&config, CannedSource::silent("web-search"), None);

    for text in ["hi", "good morning", "lol ok"] {
        let report = orchestrator.handle(&Message::text(text)).await;
        assert!(
            matches!(report.outcome, Outcome::Skipped { .. }),
            "expected skip for {:?}",
            text
        );
        assert!(report.reply.is_none());
    }

    assert!(log.entries().await.unwrap().is_empty());
    assert!(!log_path(&config).exists());
}

#[tokio::test]
async fn test_corroborated_disruption_claim_is_verified() {
    let (_tmp, config) = setup_test_env();
    let claim = "convocation ceremony postponed to January 10 announcement";
    let (orchestrator, _log) = build_orchestrator(
        &config,
        CannedSource::echoing("web-search", claim),
        Some(CannedSource::echoing("neural-search", claim)),
    );

    let report = orchestrator.handle(&Message::text(claim)).await;
    match &report.outcome {
        Outcome::Decided(decision) => {
            assert_eq!(decision.verdict, Verdict::Verified);
            assert_eq!(decision.confidence, 90);
        }
        other => panic!("unexpected outcome: {:?}", other),
    }
}

#[tokio::test]
async fn test_repeat_rumors_surface_in_similarity_lookup() {
    let (_tmp, config) = setup_test_env();
    let (orchestrator, log) = build_orchestrator(
        &config,
        CannedSource::silent("web-search"),
        Some(CannedSource::silent("neural-search")),
    );

    orchestrator
        .handle(&Message::text("exams cancelled this december"))
        .await;
    orchestrator
        .handle(&Message::text("mess fees doubled from next month"))
        .await;

    let similar = log.find_similar("exam cancelled december", 5).await.unwrap();
    assert_eq!(similar.len(), 1);
    assert!(similar[0].claim.contains("exams cancelled"));
}

#[tokio::test]
async fn test_feedback_and_patterns_after_decisions() {
    let (_tmp, config) = setup_test_env();
    let (orchestrator, log) = build_orchestrator(
        &config,
        CannedSource::silent("web-search"),
        Some(CannedSource::silent("neural-search")),
    );

    orchestrator
        .handle(&Message::text("campus shut tomorrow forward this urgently"))
        .await;
    orchestrator
        .handle(&Message::text("campus shut again this friday share now"))
        .await;

    let entries = log.entries().await.unwrap();
    assert_eq!(entries.len(), 2);

    let found = log
        .record_feedback(
            &entries[0].timestamp,
            &entries[0].claim,
            true,
            Some("registrar confirmed the hoax".to_string()),
        )
        .await
        .unwrap();
    assert!(found);

    let patterns = log.verdict_patterns().await.unwrap();
    assert!(patterns.hoax_terms.contains(&"campus".to_string()));
    assert!(patterns.hoax_terms.contains(&"shut".to_string()));
}

#[tokio::test]
async fn test_reload_picks_up_new_reference_documents() {
    let (tmp, config) = setup_test_env();
    let index = Arc::new(DocumentIndex::new(
        config.corpus.clone(),
        config.chunking.clone(),
        config.retrieval.clone(),
    ));

    let before = index.query("library membership renewal", 3).await.unwrap();
    assert!(!before.has_relevant_results);

    fs::write(
        tmp.path().join("reference").join("library.txt"),
        "Library membership renewal forms are available at the circulation desk \
         and must be submitted before the start of each semester.",
    )
    .unwrap();
    index.reload().await.unwrap();

    let after = index.query("library membership renewal", 3).await.unwrap();
    assert!(after.has_relevant_results);
}

#[tokio::test]
async fn test_empty_message_with_media_but_no_analyzer_stays_uncertain() {
    let (_tmp, config) = setup_test_env();
    let (orchestrator, _log) =
        build_orchestrator(&config, CannedSource::silent("web-search"), None);

    let mut message = Message::text("see attached circular regarding convocation dates");
    message.has_document = true;
    let report = orchestrator.handle(&message).await;

    // Media present but no analyzer configured: the pipeline proceeds on the
    // text alone and the fixed fallback is never needed.
    match &report.outcome {
        Outcome::Decided(decision) => assert_eq!(decision.verdict, Verdict::Uncertain),
        other => panic!("unexpected outcome: {:?}", other),
    }
    assert_ne!(report.reply.as_deref(), Some(FALLBACK_REPLY));
}
