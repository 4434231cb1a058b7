use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub corpus: CorpusConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub gatekeeper: GatekeeperConfig,
    #[serde(default)]
    pub evidence: EvidenceConfig,
    pub log: LogConfig,
}

/// Local reference-document corpus settings.
#[derive(Debug, Deserialize, Clone)]
pub struct CorpusConfig {
    pub dir: PathBuf,
    #[serde(default = "default_include_globs")]
    pub include_globs: Vec<String>,
    #[serde(default)]
    pub exclude_globs: Vec<String>,
}

fn default_include_globs() -> Vec<String> {
    vec![
        "**/*.txt".to_string(),
        "**/*.md".to_string(),
        "**/*.pdf".to_string(),
    ]
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_target_chars")]
    pub target_chars: usize,
    #[serde(default = "default_overlap_chars")]
    pub overlap_chars: usize,
    #[serde(default = "default_min_chunk_chars")]
    pub min_chunk_chars: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            target_chars: default_target_chars(),
            overlap_chars: default_overlap_chars(),
            min_chunk_chars: default_min_chunk_chars(),
        }
    }
}

fn default_target_chars() -> usize {
    500
}
fn default_overlap_chars() -> usize {
    100
}
fn default_min_chunk_chars() -> usize {
    50
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    /// Best score must exceed this for a query to count as a relevant hit.
    #[serde(default = "default_relevance_threshold")]
    pub relevance_threshold: f64,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            relevance_threshold: default_relevance_threshold(),
        }
    }
}

fn default_top_k() -> usize {
    3
}
fn default_relevance_threshold() -> f64 {
    0.1
}

#[derive(Debug, Deserialize, Clone)]
pub struct GatekeeperConfig {
    #[serde(default = "default_max_edit_distance")]
    pub max_edit_distance: usize,
    /// Deployment-specific trigger terms added to the built-in vocabulary.
    #[serde(default)]
    pub extra_trigger_terms: Vec<String>,
}

impl Default for GatekeeperConfig {
    fn default() -> Self {
        Self {
            max_edit_distance: default_max_edit_distance(),
            extra_trigger_terms: Vec::new(),
        }
    }
}

fn default_max_edit_distance() -> usize {
    2
}

/// External evidence source settings. API keys are optional: a source with
/// no key degrades to an empty result instead of erroring.
#[derive(Debug, Deserialize, Clone)]
pub struct EvidenceConfig {
    /// Allow-list of official domains for scoped search and official tagging.
    #[serde(default)]
    pub trusted_domains: Vec<String>,
    #[serde(default = "default_result_count")]
    pub result_count: usize,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub serp_api_key: Option<String>,
    #[serde(default)]
    pub neural_api_key: Option<String>,
    /// Best-effort transcript excerpts are truncated to this many chars.
    #[serde(default = "default_transcript_limit")]
    pub transcript_limit_chars: usize,
}

impl Default for EvidenceConfig {
    fn default() -> Self {
        Self {
            trusted_domains: Vec::new(),
            result_count: default_result_count(),
            timeout_secs: default_timeout_secs(),
            serp_api_key: None,
            neural_api_key: None,
            transcript_limit_chars: default_transcript_limit(),
        }
    }
}

fn default_result_count() -> usize {
    5
}
fn default_timeout_secs() -> u64 {
    10
}
fn default_transcript_limit() -> usize {
    5000
}

#[derive(Debug, Deserialize, Clone)]
pub struct LogConfig {
    /// Path of the durable verification-log store (a single JSON file).
    pub path: PathBuf,
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    if config.chunking.target_chars == 0 {
        anyhow::bail!("chunking.target_chars must be > 0");
    }

    // Overlap must leave forward progress between windows.
    if config.chunking.overlap_chars >= config.chunking.target_chars {
        anyhow::bail!("chunking.overlap_chars must be < chunking.target_chars");
    }

    if config.retrieval.top_k < 1 {
        anyhow::bail!("retrieval.top_k must be >= 1");
    }

    if !(0.0..=1.0).contains(&config.retrieval.relevance_threshold) {
        anyhow::bail!("retrieval.relevance_threshold must be in [0.0, 1.0]");
    }

    if config.evidence.timeout_secs == 0 {
        anyhow::bail!("evidence.timeout_secs must be > 0");
    }

    if config.evidence.serp_api_key.is_some() && config.evidence.trusted_domains.is_empty() {
        anyhow::bail!("evidence.trusted_domains must be set when scoped search is configured");
    }

    Ok(())
}
