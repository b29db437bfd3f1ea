/// Canonical story analysis schema shared across all pipeline stages.
///
/// Every record here is an immutable value produced once per pipeline run.
/// Identifiers are content-derived hashes, so re-running the pipeline on
/// identical input reproduces identical ids — a load-bearing invariant for
/// upstream caching and for test determinism.

pub mod beat;
pub mod document;
pub mod event;
pub mod insight;
pub mod quality;
pub mod segment;
pub mod signal;
pub mod timeline;

use chrono::{DateTime, Utc};
use rustc_hash::FxHasher;
use serde::{Deserialize, Serialize};
use std::hash::Hasher;
use thiserror::Error;

pub use beat::StoryBeat;
pub use document::{StoryDocument, STORY_SCHEMA_VERSION};
pub use event::{EntityKind, EntityMention, ExtractedEvent};
pub use insight::{Granularity, Insight, InsightStyle};
pub use quality::{EvaluationMetrics, GateThresholds, QualityGate};
pub use segment::{Segment, SourceKind};
pub use signal::{ArcSignal, ConflictShift, EmotionSignal, EmotionTone, ThemeSignal, TrendDirection};
pub use timeline::{PointSource, TimeSource, TimelineConflict, TimelinePoint};

#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("{field} must not be empty")]
    Empty { field: &'static str },
    #[error("{field} must be within [{min}, {max}], got {value}")]
    OutOfRange {
        field: &'static str,
        min: f64,
        max: f64,
        value: f64,
    },
    #[error("{field} must be at most {max} characters")]
    TooLong { field: &'static str, max: usize },
    #[error("identifier '{value}' does not match the lowercase id pattern")]
    InvalidId { value: String },
    #[error("char_end ({end}) must be greater than char_start ({start})")]
    CharSpan { start: usize, end: usize },
    #[error("{field} must be at least {min}, got {value}")]
    BelowMinimum {
        field: &'static str,
        min: usize,
        value: usize,
    },
}

/// The four-stage story arc every beat, signal, and timeline point maps onto.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Setup,
    Escalation,
    Climax,
    Resolution,
}

impl Stage {
    pub const ALL: [Stage; 4] = [
        Stage::Setup,
        Stage::Escalation,
        Stage::Climax,
        Stage::Resolution,
    ];

    /// Zero-based position in the canonical stage ordering.
    pub fn index(&self) -> usize {
        match self {
            Self::Setup => 0,
            Self::Escalation => 1,
            Self::Climax => 2,
            Self::Resolution => 3,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Setup => "setup",
            Self::Escalation => "escalation",
            Self::Climax => "climax",
            Self::Resolution => "resolution",
        }
    }

    /// Stage for a zero-based index, clamped to `Resolution`.
    pub fn from_index(index: usize) -> Stage {
        *Stage::ALL.get(index).unwrap_or(&Stage::Resolution)
    }
}

/// Severity attached to recoverable diagnostics and timeline conflicts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Warning,
    Error,
}

/// One recoverable issue collected alongside a stage's normal output.
///
/// Fatal issues never appear here — they abort the run via stage errors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineIssue {
    pub code: String,
    pub severity: Severity,
    pub message: String,
    pub segment_id: Option<String>,
    pub attempt: Option<u32>,
}

impl PipelineIssue {
    pub fn new(code: &str, severity: Severity, message: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            severity,
            message: message.into(),
            segment_id: None,
            attempt: None,
        }
    }

    pub fn for_segment(mut self, segment_id: &str) -> Self {
        self.segment_id = Some(segment_id.to_string());
        self
    }

    pub fn on_attempt(mut self, attempt: u32) -> Self {
        self.attempt = Some(attempt);
        self
    }
}

/// Confidence metadata attached to derived artifacts. The method string
/// records which heuristic or fallback produced the value, so tests can
/// assert on provider selection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceScore {
    pub method: String,
    pub score: f64,
}

impl ConfidenceScore {
    pub fn new(method: &str, score: f64) -> Self {
        Self {
            method: method.to_string(),
            score,
        }
    }

    pub fn validate(&self) -> Result<(), SchemaError> {
        require_non_empty(&self.method, "confidence.method")?;
        check_unit_interval(self.score, "confidence.score")
    }
}

/// Provenance metadata for generated records. `created_at_utc` is the only
/// field not derived from content; the orchestrator captures it once per run
/// and it never participates in id hashing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProvenanceRecord {
    pub source_segment_ids: Vec<String>,
    pub created_at_utc: DateTime<Utc>,
    pub generator: String,
    pub generator_version: String,
}

impl ProvenanceRecord {
    /// Build a provenance record, deduping and lowercasing segment ids while
    /// preserving first-seen order.
    pub fn new(source_segment_ids: &[String], generator: &str, created_at: DateTime<Utc>) -> Self {
        let mut seen: Vec<String> = Vec::with_capacity(source_segment_ids.len());
        for raw in source_segment_ids {
            let id = raw.trim().to_lowercase();
            if !id.is_empty() && !seen.contains(&id) {
                seen.push(id);
            }
        }
        Self {
            source_segment_ids: seen,
            created_at_utc: created_at,
            generator: generator.to_string(),
            generator_version: "v1".to_string(),
        }
    }

    pub fn validate(&self) -> Result<(), SchemaError> {
        if self.source_segment_ids.is_empty() {
            return Err(SchemaError::Empty {
                field: "provenance.source_segment_ids",
            });
        }
        require_non_empty(&self.generator, "provenance.generator")?;
        require_non_empty(&self.generator_version, "provenance.generator_version")
    }
}

/// Build a deterministic identifier from a stable text payload:
/// `{prefix}_{12 lowercase hex digits}`. The hash has no per-process seed,
/// so identical inputs reproduce identical ids across runs and processes.
pub fn stable_id(prefix: &str, text: &str) -> String {
    let mut hasher = FxHasher::default();
    hasher.write(prefix.as_bytes());
    hasher.write(b":");
    hasher.write(text.as_bytes());
    let digest = hasher.finish();
    format!("{}_{:012x}", prefix, digest & 0xffff_ffff_ffff)
}

/// Stable hex digest of a full text body, used as the run-level source hash.
pub fn content_hash(text: &str) -> String {
    let mut hasher = FxHasher::default();
    hasher.write(text.as_bytes());
    let head = hasher.finish();
    // Second pass with a length prefix widens the digest to 128 bits.
    let mut tail_hasher = FxHasher::default();
    tail_hasher.write_usize(text.len());
    tail_hasher.write(text.as_bytes());
    let tail = tail_hasher.finish();
    format!("{:016x}{:016x}", head, tail)
}

pub(crate) fn require_non_empty(value: &str, field: &'static str) -> Result<(), SchemaError> {
    if value.trim().is_empty() {
        Err(SchemaError::Empty { field })
    } else {
        Ok(())
    }
}

pub(crate) fn check_unit_interval(value: f64, field: &'static str) -> Result<(), SchemaError> {
    if !(0.0..=1.0).contains(&value) {
        Err(SchemaError::OutOfRange {
            field,
            min: 0.0,
            max: 1.0,
            value,
        })
    } else {
        Ok(())
    }
}

pub(crate) fn check_max_len(
    value: &str,
    max: usize,
    field: &'static str,
) -> Result<(), SchemaError> {
    if value.chars().count() > max {
        Err(SchemaError::TooLong { field, max })
    } else {
        Ok(())
    }
}

/// Identifiers must match `^[a-z][a-z0-9_-]{1,119}$`.
pub(crate) fn check_id(value: &str) -> Result<(), SchemaError> {
    let mut chars = value.chars();
    let valid_head = chars.next().is_some_and(|c| c.is_ascii_lowercase());
    let valid_tail = chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-');
    let len = value.len();
    if valid_head && valid_tail && (2..=120).contains(&len) {
        Ok(())
    } else {
        Err(SchemaError::InvalidId {
            value: value.to_string(),
        })
    }
}
