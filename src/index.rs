//! In-memory document index over the local reference corpus.
//!
//! Reference files are split into overlapping, sentence-aligned chunks and
//! scored against queries with a bag-of-words overlap heuristic. This is
//! deliberately lexical, not semantic: the corpus is a handful of official
//! documents where exact terminology (circular numbers, dates) matters more
//! than paraphrase matching.
//!
//! The index is built lazily on first query. Builds are serialized behind an
//! async lock and the chunk set is swapped in atomically on completion, so a
//! query never observes a partially built index.

use anyhow::{Context, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::path::Path;
use std::sync::{Arc, RwLock};
use tokio::sync::Mutex;
use tracing::{info, warn};
use walkdir::WalkDir;

use crate::config::{ChunkingConfig, CorpusConfig, RetrievalConfig};
use crate::models::{DocumentChunk, QueryHits, ScoredChunk};

/// Extensions of page-oriented binary formats we cannot parse natively.
/// These get a placeholder chunk naming the file instead of failing the build.
const BINARY_DOC_EXTENSIONS: &[&str] = &["doc", "docx", "ppt", "pptx", "xls", "xlsx"];

pub struct DocumentIndex {
    corpus: CorpusConfig,
    chunking: ChunkingConfig,
    retrieval: RetrievalConfig,
    /// Current chunk set. `None` until the first build completes; replaced
    /// wholesale (never mutated in place) on reload.
    chunks: RwLock<Option<Arc<Vec<DocumentChunk>>>>,
    /// Serializes (re)builds so concurrent first queries cannot race.
    build_lock: Mutex<()>,
}

impl DocumentIndex {
    pub fn new(corpus: CorpusConfig, chunking: ChunkingConfig, retrieval: RetrievalConfig) -> Self {
        Self {
            corpus,
            chunking,
            retrieval,
            chunks: RwLock::new(None),
            build_lock: Mutex::new(()),
        }
    }

    /// Score every indexed chunk against `text` and return the top `top_k`.
    ///
    /// Builds the index first if it has not been built yet. Ties are broken
    /// by original chunk order (the sort is stable).
    pub async fn query(&self, text: &str, top_k: usize) -> Result<QueryHits> {
        let chunks = self.snapshot().await?;

        let query_tokens = unique_lex_tokens(text);
        if query_tokens.is_empty() || chunks.is_empty() {
            return Ok(QueryHits::default());
        }

        let mut scored: Vec<(f64, &DocumentChunk)> = chunks
            .iter()
            .map(|chunk| (score_chunk(&query_tokens, &chunk.text), chunk))
            .collect();

        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));

        let has_relevant_results = scored
            .first()
            .map(|(score, _)| *score > self.retrieval.relevance_threshold)
            .unwrap_or(false);

        let top: Vec<ScoredChunk> = scored
            .into_iter()
            .take(top_k)
            .map(|(score, chunk)| ScoredChunk {
                chunk: chunk.clone(),
                // 2-decimal rounding at the retrieval boundary
                relevance_score: (score * 100.0).round() / 100.0,
            })
            .collect();

        Ok(QueryHits {
            chunks: top,
            has_relevant_results,
        })
    }

    /// Force a full rebuild, replacing the index atomically.
    /// Returns the new chunk count.
    pub async fn reload(&self) -> Result<usize> {
        let _guard = self.build_lock.lock().await;
        let built = Arc::new(self.build()?);
        let count = built.len();
        *self.chunks.write().unwrap() = Some(built);
        info!(chunks = count, "document index reloaded");
        Ok(count)
    }

    /// Current chunk set, building it first if uninitialized.
    async fn snapshot(&self) -> Result<Arc<Vec<DocumentChunk>>> {
        if let Some(chunks) = self.chunks.read().unwrap().clone() {
            return Ok(chunks);
        }

        let _guard = self.build_lock.lock().await;
        // Another task may have finished the build while we waited.
        if let Some(chunks) = self.chunks.read().unwrap().clone() {
            return Ok(chunks);
        }

        let built = Arc::new(self.build()?);
        *self.chunks.write().unwrap() = Some(built.clone());
        info!(chunks = built.len(), "document index built");
        Ok(built)
    }

    /// Rebuild the chunk set from the corpus directory.
    ///
    /// A missing directory is not an error: it is created so a later write
    /// succeeds, and the corpus is treated as empty.
    fn build(&self) -> Result<Vec<DocumentChunk>> {
        let dir = &self.corpus.dir;
        if !dir.exists() {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create corpus dir: {}", dir.display()))?;
            info!(dir = %dir.display(), "corpus directory created, starting with empty index");
            return Ok(Vec::new());
        }

        let include_set = build_globset(&self.corpus.include_globs)?;
        let exclude_set = build_globset(&self.corpus.exclude_globs)?;

        let mut files: Vec<_> = WalkDir::new(dir)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .map(|e| e.into_path())
            .filter(|path| {
                let relative = path.strip_prefix(dir).unwrap_or(path);
                let rel_str = relative.to_string_lossy();
                include_set.is_match(rel_str.as_ref()) && !exclude_set.is_match(rel_str.as_ref())
            })
            .collect();

        // Sort for deterministic ordering across rebuilds
        files.sort();

        let mut chunks = Vec::new();
        for path in &files {
            let source_name = path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_else(|| path.to_string_lossy().to_string());

            match self.read_source(path) {
                Some(SourceText::Text(text)) => {
                    for (chunk_index, text) in chunk_text(
                        &text,
                        self.chunking.target_chars,
                        self.chunking.overlap_chars,
                        self.chunking.min_chunk_chars,
                    )
                    .into_iter()
                    .enumerate()
                    {
                        chunks.push(DocumentChunk {
                            text,
                            source_name: source_name.clone(),
                            chunk_index,
                        });
                    }
                }
                Some(SourceText::Placeholder) => {
                    chunks.push(DocumentChunk {
                        text: format!(
                            "Reference document '{}' is stored in the corpus but its \
                             contents could not be extracted as text.",
                            source_name
                        ),
                        source_name,
                        chunk_index: 0,
                    });
                }
                None => {}
            }
        }

        Ok(chunks)
    }

    fn read_source(&self, path: &Path) -> Option<SourceText> {
        let extension = path
            .extension()
            .and_then(std::ffi::OsStr::to_str)
            .unwrap_or("")
            .to_lowercase();

        if extension == "pdf" {
            return match pdf_extract::extract_text(path) {
                Ok(text) => Some(SourceText::Text(text)),
                Err(err) => {
                    warn!(path = %path.display(), %err, "PDF extraction failed, indexing placeholder");
                    Some(SourceText::Placeholder)
                }
            };
        }

        if BINARY_DOC_EXTENSIONS.contains(&extension.as_str()) {
            return Some(SourceText::Placeholder);
        }

        match std::fs::read_to_string(path) {
            Ok(text) => Some(SourceText::Text(text)),
            Err(err) => {
                warn!(path = %path.display(), %err, "skipping unreadable corpus file");
                None
            }
        }
    }
}

enum SourceText {
    Text(String),
    Placeholder,
}

/// Split text into overlapping windows of roughly `target` chars.
///
/// At each window boundary the cutoff snaps backward to the nearest sentence
/// terminator or newline, as long as that is not more than half the target
/// earlier than the hard cutoff. Chunks shorter than `min_len` after trimming
/// are discarded.
pub fn chunk_text(text: &str, target: usize, overlap: usize, min_len: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    let mut out = Vec::new();
    let mut start = 0usize;

    while start < chars.len() {
        let hard_end = (start + target).min(chars.len());
        let mut end = hard_end;

        if hard_end < chars.len() {
            let floor = hard_end - target / 2;
            let mut i = hard_end;
            while i > floor {
                let c = chars[i - 1];
                if c == '.' || c == '!' || c == '?' || c == '\n' {
                    end = i;
                    break;
                }
                i -= 1;
            }
        }

        let piece: String = chars[start..end].iter().collect();
        let trimmed = piece.trim();
        if trimmed.chars().count() >= min_len {
            out.push(trimmed.to_string());
        }

        if end >= chars.len() {
            break;
        }
        // Overlap with the previous window, guaranteeing forward progress.
        start = end.saturating_sub(overlap).max(start + 1);
    }

    out
}

/// Symmetric lexical-overlap score between a tokenized query and chunk text.
///
/// +1 per unique query token appearing verbatim among the chunk tokens,
/// +0.5 per chunk token that strictly contains or is contained in the query
/// token (rewards partial/compound-word overlap, e.g. "exam" inside
/// "examination"). Normalized by the unique query token count.
pub fn score_chunk(query_tokens: &[String], chunk_text: &str) -> f64 {
    let chunk_tokens = lex_tokens(chunk_text);
    let mut raw = 0.0;

    for qt in query_tokens {
        if chunk_tokens.iter().any(|ct| ct == qt) {
            raw += 1.0;
        }
        for ct in &chunk_tokens {
            if ct != qt && (ct.contains(qt.as_str()) || qt.contains(ct.as_str())) {
                raw += 0.5;
            }
        }
    }

    raw / query_tokens.len().max(1) as f64
}

/// Lower-cased alphanumeric tokens of length > 2.
pub fn lex_tokens(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.chars().count() > 2)
        .map(|t| t.to_string())
        .collect()
}

/// Like [`lex_tokens`] but with duplicates removed, first occurrence kept.
pub fn unique_lex_tokens(text: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    for token in lex_tokens(text) {
        if !tokens.contains(&token) {
            tokens.push(token);
        }
    }
    tokens
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    Ok(builder.build().context("invalid corpus glob set")?)
}
