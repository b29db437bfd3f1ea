/// The canonical end-to-end story intelligence artifact.

use serde::{Deserialize, Serialize};

use super::{require_non_empty, EntityMention, ExtractedEvent, Insight, QualityGate, SchemaError, Segment, StoryBeat, ThemeSignal, TimelinePoint};

pub const STORY_SCHEMA_VERSION: &str = "story_analysis.v1";

/// One immutable analysis document aggregating every stage's output.
/// Persistence adapters, dashboard projections, and bundle packaging all
/// consume this value; the pipeline itself never writes anywhere.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoryDocument {
    pub schema_version: String,
    pub story_id: String,
    pub source_language: String,
    pub target_language: String,
    pub segments: Vec<Segment>,
    pub events: Vec<ExtractedEvent>,
    pub beats: Vec<StoryBeat>,
    pub themes: Vec<ThemeSignal>,
    pub entities: Vec<EntityMention>,
    pub timeline_points: Vec<TimelinePoint>,
    pub insights: Vec<Insight>,
    pub quality_gate: QualityGate,
}

impl StoryDocument {
    pub fn validate(&self) -> Result<(), SchemaError> {
        if self.schema_version != STORY_SCHEMA_VERSION {
            return Err(SchemaError::InvalidId {
                value: self.schema_version.clone(),
            });
        }
        require_non_empty(&self.story_id, "document.story_id")?;
        require_non_empty(&self.source_language, "document.source_language")?;
        require_non_empty(&self.target_language, "document.target_language")?;
        if self.segments.is_empty() {
            return Err(SchemaError::Empty {
                field: "document.segments",
            });
        }
        for segment in &self.segments {
            segment.validate()?;
        }
        for event in &self.events {
            event.validate()?;
        }
        for beat in &self.beats {
            beat.validate()?;
        }
        for theme in &self.themes {
            theme.validate()?;
        }
        for entity in &self.entities {
            entity.validate()?;
        }
        for point in &self.timeline_points {
            point.validate()?;
        }
        for insight in &self.insights {
            insight.validate()?;
        }
        self.quality_gate.validate()
    }
}
