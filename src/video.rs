//! Video-content evidence source.
//!
//! Resolves canonical metadata for a video link (title, channel) via the
//! public oEmbed endpoint and, best-effort, a caption transcript excerpt via
//! the timedtext endpoint. The result is unstructured evidence text for the
//! orchestrator and decision model to weigh — this source never renders a
//! verdict itself. When nothing about the claim can be mechanically related
//! to the video content, the report carries a pending-review marker.

use anyhow::{Context, Result};
use quick_xml::events::Event;
use quick_xml::Reader;
use serde_json::Value;
use tracing::warn;
use url::Url;

use crate::config::EvidenceConfig;
use crate::index::unique_lex_tokens;

/// Evidence gathered for one video link.
#[derive(Debug, Clone)]
pub struct VideoReport {
    pub title: String,
    pub channel: String,
    /// Best-effort caption excerpt, bounded by the configured char limit.
    pub transcript_excerpt: Option<String>,
    /// Metadata plus transcript, formatted for the decision model.
    pub evidence_text: String,
    /// Set when the claim cannot be mechanically related to the video
    /// content; a human or the decision model has to weigh it.
    pub pending_review: bool,
}

pub struct VideoEvidence {
    client: reqwest::Client,
    transcript_limit: usize,
}

impl VideoEvidence {
    pub fn new(config: &EvidenceConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self {
            client,
            transcript_limit: config.transcript_limit_chars,
        })
    }

    /// Resolve metadata and a transcript excerpt for `media_url`.
    ///
    /// Metadata failure is an error (the caller's absorption wrapper handles
    /// it); transcript failure is absorbed here since captions are optional.
    pub async fn inspect(&self, media_url: &str, claim: &str) -> Result<VideoReport> {
        let video_id = extract_video_id(media_url)
            .with_context(|| format!("unrecognized video link: {}", media_url))?;
        let watch_url = format!("https://www.youtube.com/watch?v={}", video_id);

        let oembed: Value = self
            .client
            .get("https://www.youtube.com/oembed")
            .query(&[("url", watch_url.as_str()), ("format", "json")])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let title = oembed["title"].as_str().unwrap_or("(untitled)").to_string();
        let channel = oembed["author_name"].as_str().unwrap_or("(unknown)").to_string();

        let transcript_excerpt = match self.fetch_transcript(&video_id).await {
            Ok(text) if !text.is_empty() => Some(text),
            Ok(_) => None,
            Err(err) => {
                warn!(video_id, %err, "transcript fetch failed, proceeding without captions");
                None
            }
        };

        let mut evidence_text = format!("Video: \"{}\" by {}.", title, channel);
        if let Some(transcript) = &transcript_excerpt {
            evidence_text.push_str("\nTranscript excerpt: ");
            evidence_text.push_str(transcript);
        }

        let pending_review = !mechanically_relatable(claim, &evidence_text);

        Ok(VideoReport {
            title,
            channel,
            transcript_excerpt,
            evidence_text,
            pending_review,
        })
    }

    async fn fetch_transcript(&self, video_id: &str) -> Result<String> {
        let xml = self
            .client
            .get("https://video.google.com/timedtext")
            .query(&[("lang", "en"), ("v", video_id)])
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        let text = transcript_text(&xml);
        Ok(truncate_chars(&text, self.transcript_limit))
    }
}

/// True when at least one claim token appears in the gathered evidence text.
/// Used to decide whether a report needs the pending-review marker.
pub fn mechanically_relatable(claim: &str, evidence_text: &str) -> bool {
    let evidence_lower = evidence_text.to_lowercase();
    unique_lex_tokens(claim)
        .iter()
        .any(|token| evidence_lower.contains(token.as_str()))
}

/// Pull the video id out of the common YouTube link shapes:
/// `youtu.be/<id>`, `youtube.com/watch?v=<id>`, `youtube.com/shorts/<id>`.
pub fn extract_video_id(link: &str) -> Option<String> {
    let parsed = Url::parse(link).ok()?;
    let host = parsed.host_str()?.to_lowercase();

    if host == "youtu.be" {
        return parsed
            .path_segments()
            .and_then(|mut segments| segments.next().map(|s| s.to_string()))
            .filter(|id| !id.is_empty());
    }

    if host == "youtube.com" || host.ends_with(".youtube.com") {
        if let Some(id) = parsed
            .query_pairs()
            .find(|(k, _)| k == "v")
            .map(|(_, v)| v.to_string())
        {
            return Some(id);
        }
        let segments: Vec<&str> = parsed.path_segments()?.collect();
        if segments.len() >= 2 && (segments[0] == "shorts" || segments[0] == "embed") {
            return Some(segments[1].to_string()).filter(|id| !id.is_empty());
        }
    }

    None
}

/// First token in `text` that looks like a video link.
pub fn find_video_link(text: &str) -> Option<String> {
    text.split_whitespace()
        .find(|token| token.contains("youtube.com/") || token.contains("youtu.be/"))
        .map(|token| token.trim_matches(|c: char| c == ',' || c == ')' || c == '.').to_string())
}

/// Concatenate the text nodes of a timedtext XML document.
fn transcript_text(xml: &str) -> String {
    let mut reader = Reader::from_str(xml);
    let mut out = String::new();

    loop {
        match reader.read_event() {
            Ok(Event::Text(t)) => {
                if let Ok(text) = t.unescape() {
                    let text = text.trim();
                    if !text.is_empty() {
                        if !out.is_empty() {
                            out.push(' ');
                        }
                        out.push_str(text);
                    }
                }
            }
            Ok(Event::Eof) | Err(_) => break,
            _ => {}
        }
    }

    out
}

fn truncate_chars(text: &str, limit: usize) -> String {
    if text.chars().count() <= limit {
        return text.to_string();
    }
    text.chars().take(limit).collect()
}
