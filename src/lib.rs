//! Story Intel: deterministic narrative intelligence for raw story text.
//!
//! Turns plain prose, structured documents, or timestamped transcripts into a
//! fully structured, evidence-linked analysis document: segments, events,
//! narrative beats, theme/arc/conflict/emotion signals, a dual-view timeline,
//! multi-granularity insights, and a pass/fail quality gate. Everything is
//! computed with closed-form heuristics over token sets and structural cues.
//! No external services, no persistence, no randomness: identical input
//! reproduces identical output, down to the content-derived identifiers.

pub mod core;
pub mod schema;

pub use crate::core::pipeline::{
    run_story_analysis, AnalysisRequest, PipelineConfig, PipelineError, StoryAnalysis,
};
pub use crate::schema::{StoryDocument, STORY_SCHEMA_VERSION};
