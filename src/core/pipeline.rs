/// Pipeline orchestrator: runs the stages in order, enforces the stage
/// contracts between them, and assembles the final analysis bundle.
///
/// Provider selection (translation backend, extraction backend, rendering
/// style) is explicit configuration on `PipelineConfig`; the pipeline never
/// consults ambient process state.

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{debug, info};

use crate::core::contracts::{
    validate_beat_output, validate_extraction_output, validate_ingestion_output,
    validate_insight_output, validate_theme_output, validate_timeline_output,
    validate_translation_output, ContractError,
};
use crate::core::beats::detect_beats;
use crate::core::extraction::{extract_events, ExtractionBackend};
use crate::core::ingestion::{ingest_story_text, IngestionError};
use crate::core::insights::generate_insights;
use crate::core::language::{translate_segments, SegmentAlignment, TranslationBackend};
use crate::core::lexicon::CueLexicon;
use crate::core::quality::evaluate_quality;
use crate::core::signals::track_signals;
use crate::core::timeline::compose_timeline;
use crate::schema::{
    ArcSignal, ConflictShift, EmotionSignal, EvaluationMetrics, GateThresholds, InsightStyle,
    PipelineIssue, StoryDocument, TimelineConflict, TimelinePoint, STORY_SCHEMA_VERSION,
};

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("ingestion failed: {0}")]
    Ingestion(#[from] IngestionError),
    #[error(transparent)]
    Contract(#[from] ContractError),
}

/// One analysis job: a raw source plus routing metadata.
#[derive(Debug, Clone)]
pub struct AnalysisRequest {
    pub story_id: String,
    pub source_kind: String,
    pub source_text: String,
    pub target_language: String,
}

/// Run configuration. Everything is explicit and has a sensible default;
/// `created_at_utc` may be pinned for reproducible provenance timestamps.
#[derive(Debug, Clone, Default)]
pub struct PipelineConfig {
    pub translation: TranslationBackend,
    pub extraction: ExtractionBackend,
    pub insight_style: InsightStyle,
    pub thresholds: GateThresholds,
    pub lexicon: CueLexicon,
    pub created_at_utc: Option<DateTime<Utc>>,
}

/// Everything one run produces: the canonical document plus the side
/// artifacts that do not live inside it.
#[derive(Debug, Clone)]
pub struct StoryAnalysis {
    pub document: StoryDocument,
    pub alignments: Vec<SegmentAlignment>,
    pub arcs: Vec<ArcSignal>,
    pub conflicts: Vec<ConflictShift>,
    pub emotions: Vec<EmotionSignal>,
    /// Resolved points by actual time, unresolved last. The narrative view
    /// lives in `document.timeline_points`.
    pub timeline_actual: Vec<TimelinePoint>,
    pub timeline_conflicts: Vec<TimelineConflict>,
    pub metrics: EvaluationMetrics,
    pub issues: Vec<PipelineIssue>,
}

pub fn run_story_analysis(
    request: &AnalysisRequest,
    config: &PipelineConfig,
) -> Result<StoryAnalysis, PipelineError> {
    let story_id = request.story_id.trim();
    if story_id.is_empty() {
        return Err(PipelineError::InvalidRequest(
            "story_id must not be empty".to_string(),
        ));
    }
    let target_language = request.target_language.trim().to_lowercase();
    if target_language.is_empty() {
        return Err(PipelineError::InvalidRequest(
            "target_language must not be empty".to_string(),
        ));
    }
    let created_at = config.created_at_utc.unwrap_or_else(Utc::now);
    let mut issues = Vec::new();

    let ingestion = ingest_story_text(&request.source_kind, &request.source_text, story_id)?;
    issues.extend(ingestion.issues.clone());
    validate_ingestion_output(&ingestion.segments)?;
    debug!(segments = ingestion.segments.len(), "ingestion validated");

    let translation = translate_segments(
        &ingestion.segments,
        &target_language,
        config.translation,
        &config.lexicon,
    );
    issues.extend(translation.issues.clone());
    validate_translation_output(&translation.segments)?;

    let extraction = extract_events(
        &translation.segments,
        config.extraction,
        &config.lexicon,
        created_at,
    );
    issues.extend(extraction.issues.clone());
    validate_extraction_output(&extraction.events, &extraction.entities)?;

    let beats = detect_beats(&extraction.events, &config.lexicon, created_at);
    validate_beat_output(&beats)?;

    let signals = track_signals(&beats, &extraction.entities, &config.lexicon, created_at);
    validate_theme_output(&signals.themes)?;

    let timeline = compose_timeline(&extraction.events, &beats, created_at);
    validate_timeline_output(&timeline.narrative)?;

    let insights = generate_insights(
        &beats,
        &signals.themes,
        &translation.segments,
        config.insight_style,
        created_at,
    );
    validate_insight_output(&insights)?;

    let (metrics, gate) = evaluate_quality(
        &translation.segments,
        &insights,
        timeline.consistency,
        &target_language,
        &config.thresholds,
    );

    info!(
        story_id,
        source_language = %translation.source_language,
        segments = translation.segments.len(),
        events = extraction.events.len(),
        beats = beats.len(),
        insights = insights.len(),
        gate_passed = gate.passed,
        "story analysis complete"
    );

    let document = StoryDocument {
        schema_version: STORY_SCHEMA_VERSION.to_string(),
        story_id: story_id.to_string(),
        source_language: translation.source_language,
        target_language,
        segments: translation.segments,
        events: extraction.events,
        beats,
        themes: signals.themes,
        entities: extraction.entities,
        timeline_points: timeline.narrative,
        insights,
        quality_gate: gate,
    };

    Ok(StoryAnalysis {
        document,
        alignments: translation.alignments,
        arcs: signals.arcs,
        conflicts: signals.conflicts,
        emotions: signals.emotions,
        timeline_actual: timeline.actual,
        timeline_conflicts: timeline.conflicts,
        metrics,
        issues,
    })
}
