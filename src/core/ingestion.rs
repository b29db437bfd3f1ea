/// Ingestion — deterministic normalization and chunking of raw story text.
///
/// Normalizes by source kind, then chunks into overlapping windows that
/// prefer paragraph boundaries. Segment ids are content-hash-derived, so
/// idempotent retries over identical normalized input reproduce identical
/// ids.

use thiserror::Error;
use tracing::{debug, warn};

use crate::schema::{content_hash, stable_id, PipelineIssue, Segment, Severity, SourceKind};

/// Chunk window and overlap, in characters. The window must stay larger
/// than the overlap or chunking cannot advance.
pub const CHUNK_WINDOW: usize = 900;
pub const CHUNK_OVERLAP: usize = 120;

#[derive(Debug, Error)]
pub enum IngestionError {
    #[error("source_text contains no usable content after normalization")]
    EmptySource,
    #[error("transcript produced zero usable lines")]
    UnusableTranscript,
    #[error("chunk window ({window}) must be greater than overlap ({overlap})")]
    ChunkConfig { window: usize, overlap: usize },
}

/// Normalized artifact emitted by the ingestion stage.
#[derive(Debug, Clone)]
pub struct IngestionArtifact {
    pub source_hash: String,
    /// Dedupe key for upstream job-level idempotency checks.
    pub dedupe_key: String,
    pub normalized_text: String,
    pub source_kind: SourceKind,
    pub segments: Vec<Segment>,
    pub issues: Vec<PipelineIssue>,
}

/// Create deterministic segments from one raw source string.
pub fn ingest_story_text(
    source_kind: &str,
    source_text: &str,
    idempotency_key: &str,
) -> Result<IngestionArtifact, IngestionError> {
    let mut issues = Vec::new();

    let kind = match SourceKind::parse(source_kind) {
        Some(kind) => kind,
        None => {
            warn!(source_kind, "unsupported source kind, degrading to text");
            issues.push(PipelineIssue::new(
                "source_kind_degraded",
                Severity::Warning,
                format!("unsupported source kind '{source_kind}', treating input as plain text"),
            ));
            SourceKind::Text
        }
    };

    let normalized = normalize_text(source_text);
    let prepared = match kind {
        SourceKind::Text => normalized,
        SourceKind::Document => prepare_document(&normalized),
        SourceKind::Transcript => prepare_transcript(&normalized, &mut issues)?,
    };
    if prepared.is_empty() {
        return Err(IngestionError::EmptySource);
    }

    let source_hash = content_hash(&prepared);
    let dedupe_key = content_hash(&format!("{idempotency_key}|{source_hash}"));

    let chunks = chunk_text(&prepared, CHUNK_WINDOW, CHUNK_OVERLAP)?;
    let segments = chunks
        .into_iter()
        .enumerate()
        .map(|(offset, chunk)| {
            let index = offset + 1;
            Segment {
                segment_id: stable_id("seg", &format!("{source_hash}:{index}")),
                source_kind: kind,
                original_text: chunk.text.clone(),
                normalized_text: chunk.text,
                language_code: "und".to_string(),
                translated_text: None,
                segment_index: index,
                char_start: chunk.char_start,
                char_end: chunk.char_end,
            }
        })
        .collect::<Vec<_>>();

    debug!(
        segments = segments.len(),
        kind = kind.name(),
        "ingestion complete"
    );
    Ok(IngestionArtifact {
        source_hash,
        dedupe_key,
        normalized_text: prepared,
        source_kind: kind,
        segments,
        issues,
    })
}

/// Normalize text while preserving paragraph boundaries: fold line endings,
/// strip control characters, collapse horizontal whitespace per line, and
/// reduce blank-line runs to a single paragraph break.
pub fn normalize_text(text: &str) -> String {
    let unified = text.replace("\r\n", "\n").replace('\r', "\n");
    let cleaned: String = unified
        .chars()
        .filter(|c| !c.is_control() || *c == '\n' || *c == '\t')
        .collect();

    let mut lines: Vec<String> = Vec::new();
    for raw_line in cleaned.split('\n') {
        lines.push(collapse_horizontal_whitespace(raw_line));
    }
    join_with_paragraphs(&lines)
}

fn collapse_horizontal_whitespace(line: &str) -> String {
    let mut out = String::with_capacity(line.len());
    let mut in_gap = false;
    for ch in line.chars() {
        if ch == ' ' || ch == '\t' {
            in_gap = true;
        } else {
            if in_gap && !out.is_empty() {
                out.push(' ');
            }
            in_gap = false;
            out.push(ch);
        }
    }
    out
}

/// Join lines, keeping at most one blank line between content and trimming
/// blank edges.
fn join_with_paragraphs(lines: &[String]) -> String {
    let mut out: Vec<&str> = Vec::with_capacity(lines.len());
    let mut pending_blank = false;
    for line in lines {
        if line.is_empty() {
            pending_blank = !out.is_empty();
        } else {
            if pending_blank {
                out.push("");
                pending_blank = false;
            }
            out.push(line);
        }
    }
    out.join("\n")
}

/// Strip heading, list, blockquote, and ordinal markup prefixes per line.
fn prepare_document(normalized: &str) -> String {
    let lines: Vec<String> = normalized
        .split('\n')
        .map(strip_document_markup)
        .collect();
    join_with_paragraphs(&lines)
}

fn strip_document_markup(line: &str) -> String {
    let rest = line.trim_start();
    if rest.starts_with('#') {
        return rest.trim_start_matches('#').trim_start().to_string();
    }
    for bullet in ["- ", "* ", "> "] {
        if let Some(stripped) = rest.strip_prefix(bullet) {
            return stripped.trim_start().to_string();
        }
    }
    let digits = rest.chars().take_while(|c| c.is_ascii_digit()).count();
    if digits > 0 {
        let tail = &rest[digits..];
        for marker in [". ", ") "] {
            if let Some(stripped) = tail.strip_prefix(marker) {
                return stripped.trim_start().to_string();
            }
        }
    }
    rest.to_string()
}

/// Strip optional `[timestamp]` and `Speaker:` prefixes per transcript line,
/// dropping lines without alphanumeric content as warnings. Zero usable
/// lines is a hard error — an empty transcript cannot be analyzed.
fn prepare_transcript(
    normalized: &str,
    issues: &mut Vec<PipelineIssue>,
) -> Result<String, IngestionError> {
    let mut lines: Vec<String> = Vec::new();
    let mut usable = 0usize;
    for (line_number, line) in normalized.split('\n').enumerate() {
        if line.is_empty() {
            lines.push(String::new());
            continue;
        }
        let stripped = strip_transcript_prefix(line);
        if stripped.chars().any(|c| c.is_alphanumeric()) {
            usable += 1;
            lines.push(stripped.to_string());
        } else {
            issues.push(PipelineIssue::new(
                "transcript_line_skipped",
                Severity::Warning,
                format!("transcript line {} has no alphanumeric content", line_number + 1),
            ));
            lines.push(String::new());
        }
    }
    if usable == 0 {
        return Err(IngestionError::UnusableTranscript);
    }
    Ok(join_with_paragraphs(&lines))
}

fn strip_transcript_prefix(line: &str) -> &str {
    let mut rest = line.trim_start();
    if rest.starts_with('[') {
        if let Some(close) = rest.find(']') {
            rest = rest[close + 1..].trim_start();
        }
    }
    if let Some(colon) = rest.find(':') {
        let prefix = &rest[..colon];
        let speaker_like = colon > 0
            && colon <= 32
            && prefix
                .chars()
                .all(|c| c.is_alphanumeric() || c == ' ' || c == '.' || c == '_' || c == '-')
            && !prefix.chars().all(|c| c.is_ascii_digit() || c == ' ');
        if speaker_like {
            rest = rest[colon + 1..].trim_start();
        }
    }
    rest
}

#[derive(Debug, Clone)]
struct Chunk {
    text: String,
    char_start: usize,
    char_end: usize,
}

/// Split text into overlapping windows, preferring paragraph boundaries
/// once past a third of the window. Offsets are in characters.
fn chunk_text(text: &str, window: usize, overlap: usize) -> Result<Vec<Chunk>, IngestionError> {
    if window <= overlap {
        return Err(IngestionError::ChunkConfig { window, overlap });
    }
    let chars: Vec<char> = text.chars().collect();
    let total = chars.len();
    if total <= window {
        return Ok(vec![Chunk {
            text: text.to_string(),
            char_start: 0,
            char_end: total,
        }]);
    }

    let mut chunks = Vec::new();
    let mut start = 0usize;
    while start < total {
        let mut stop = (start + window).min(total);
        if stop < total {
            if let Some(split_at) = last_paragraph_break(&chars[start..stop]) {
                if split_at > window / 3 {
                    stop = start + split_at;
                }
            }
        }
        if let Some(chunk) = trimmed_chunk(&chars, start, stop) {
            chunks.push(chunk);
        }
        if stop >= total {
            break;
        }
        start = (stop.saturating_sub(overlap)).max(start + 1);
    }
    Ok(chunks)
}

/// Position of the last `\n\n` inside the slice, if any.
fn last_paragraph_break(window: &[char]) -> Option<usize> {
    (1..window.len())
        .rev()
        .find(|&i| window[i] == '\n' && window[i - 1] == '\n')
        .map(|i| i - 1)
}

fn trimmed_chunk(chars: &[char], start: usize, stop: usize) -> Option<Chunk> {
    let mut lead = start;
    while lead < stop && chars[lead].is_whitespace() {
        lead += 1;
    }
    let mut tail = stop;
    while tail > lead && chars[tail - 1].is_whitespace() {
        tail -= 1;
    }
    if lead == tail {
        return None;
    }
    Some(Chunk {
        text: chars[lead..tail].iter().collect(),
        char_start: lead,
        char_end: tail,
    })
}
