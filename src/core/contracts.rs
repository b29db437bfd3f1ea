/// Stage contract validator — shared assertions invoked at every stage
/// boundary. A violation is fatal for the whole run: downstream stages
/// assume these invariants unconditionally, so no partial output may flow
/// past a failed check.

use thiserror::Error;

use crate::schema::{
    EntityMention, ExtractedEvent, Insight, SchemaError, Segment, StoryBeat, ThemeSignal,
    TimelinePoint,
};

#[derive(Debug, Error)]
pub enum ContractError {
    #[error("stage '{stage}': {message}")]
    Violation { stage: &'static str, message: String },
    #[error("stage '{stage}': record failed validation: {source}")]
    InvalidRecord {
        stage: &'static str,
        #[source]
        source: SchemaError,
    },
}

fn violation(stage: &'static str, message: impl Into<String>) -> ContractError {
    ContractError::Violation {
        stage,
        message: message.into(),
    }
}

fn check_records<T>(
    stage: &'static str,
    items: &[T],
    validate: impl Fn(&T) -> Result<(), SchemaError>,
) -> Result<(), ContractError> {
    for item in items {
        validate(item).map_err(|source| ContractError::InvalidRecord { stage, source })?;
    }
    Ok(())
}

/// Order fields must form a contiguous ascending 1..N sequence.
fn assert_contiguous(
    stage: &'static str,
    label: &str,
    values: &[usize],
) -> Result<(), ContractError> {
    for (index, value) in values.iter().enumerate() {
        if *value != index + 1 {
            return Err(violation(
                stage,
                format!(
                    "{label} must be a contiguous 1..N sequence, got {value} at position {}",
                    index + 1
                ),
            ));
        }
    }
    Ok(())
}

pub fn validate_ingestion_output(segments: &[Segment]) -> Result<(), ContractError> {
    const STAGE: &str = "ingestion";
    if segments.is_empty() {
        return Err(violation(STAGE, "at least one segment is required"));
    }
    check_records(STAGE, segments, Segment::validate)?;
    let indexes: Vec<usize> = segments.iter().map(|s| s.segment_index).collect();
    assert_contiguous(STAGE, "segment_index", &indexes)
}

pub fn validate_translation_output(segments: &[Segment]) -> Result<(), ContractError> {
    const STAGE: &str = "translation";
    if segments.is_empty() {
        return Err(violation(STAGE, "translation must preserve all segments"));
    }
    check_records(STAGE, segments, Segment::validate)?;
    let indexes: Vec<usize> = segments.iter().map(|s| s.segment_index).collect();
    assert_contiguous(STAGE, "segment_index", &indexes)
}

pub fn validate_extraction_output(
    events: &[ExtractedEvent],
    entities: &[EntityMention],
) -> Result<(), ContractError> {
    const STAGE: &str = "extraction";
    if events.is_empty() {
        return Err(violation(STAGE, "extraction must produce at least one event"));
    }
    check_records(STAGE, events, ExtractedEvent::validate)?;
    check_records(STAGE, entities, EntityMention::validate)?;
    let orders: Vec<usize> = events.iter().map(|e| e.narrative_order).collect();
    assert_contiguous(STAGE, "event narrative_order", &orders)
}

pub fn validate_beat_output(beats: &[StoryBeat]) -> Result<(), ContractError> {
    const STAGE: &str = "beat_detection";
    if beats.is_empty() {
        return Err(violation(STAGE, "beat detection must produce at least one beat"));
    }
    check_records(STAGE, beats, StoryBeat::validate)?;
    let orders: Vec<usize> = beats.iter().map(|b| b.order_index).collect();
    assert_contiguous(STAGE, "beat order_index", &orders)?;
    // Monotonic stage progression — beats never flicker backward.
    for pair in beats.windows(2) {
        if pair[1].stage.index() < pair[0].stage.index() {
            return Err(violation(
                STAGE,
                format!(
                    "stage regressed from {} to {} at beat {}",
                    pair[0].stage.name(),
                    pair[1].stage.name(),
                    pair[1].order_index
                ),
            ));
        }
    }
    Ok(())
}

pub fn validate_theme_output(themes: &[ThemeSignal]) -> Result<(), ContractError> {
    const STAGE: &str = "theme_tracking";
    if themes.is_empty() {
        return Err(violation(STAGE, "theme tracking must produce at least one signal"));
    }
    check_records(STAGE, themes, ThemeSignal::validate)
}

pub fn validate_timeline_output(points: &[TimelinePoint]) -> Result<(), ContractError> {
    const STAGE: &str = "timeline";
    if points.is_empty() {
        return Err(violation(STAGE, "timeline must produce at least one point"));
    }
    check_records(STAGE, points, TimelinePoint::validate)?;
    let orders: Vec<usize> = points.iter().map(|p| p.narrative_order).collect();
    assert_contiguous(STAGE, "timeline narrative_order", &orders)
}

pub fn validate_insight_output(insights: &[Insight]) -> Result<(), ContractError> {
    const STAGE: &str = "insights";
    if insights.is_empty() {
        return Err(violation(STAGE, "insight generation must produce at least one insight"));
    }
    check_records(STAGE, insights, Insight::validate)
}
