/// Extracted events and entity mentions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{check_id, check_max_len, require_non_empty, ConfidenceScore, ProvenanceRecord, SchemaError};

/// Atomic event extracted from one segment sentence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedEvent {
    pub event_id: String,
    pub summary: String,
    pub segment_id: String,
    /// 1..N, contiguous across the run.
    pub narrative_order: usize,
    pub event_time_utc: Option<DateTime<Utc>>,
    pub entity_names: Vec<String>,
    pub confidence: ConfidenceScore,
    pub provenance: ProvenanceRecord,
}

impl ExtractedEvent {
    pub fn validate(&self) -> Result<(), SchemaError> {
        check_id(&self.event_id)?;
        check_id(&self.segment_id)?;
        require_non_empty(&self.summary, "event.summary")?;
        check_max_len(&self.summary, 4000, "event.summary")?;
        if self.narrative_order == 0 {
            return Err(SchemaError::BelowMinimum {
                field: "event.narrative_order",
                min: 1,
                value: 0,
            });
        }
        self.confidence.validate()?;
        self.provenance.validate()
    }
}

/// Category assigned to a tracked entity by the seed gazetteer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    #[default]
    Character,
    Location,
    Organization,
    Concept,
}

impl EntityKind {
    pub fn parse(value: &str) -> EntityKind {
        match value {
            "location" => Self::Location,
            "organization" => Self::Organization,
            "concept" => Self::Concept,
            _ => Self::Character,
        }
    }
}

/// Entity mention aggregated across segments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityMention {
    pub entity_id: String,
    pub name: String,
    pub kind: EntityKind,
    pub mention_count: usize,
    pub segment_ids: Vec<String>,
    pub confidence: ConfidenceScore,
    pub provenance: ProvenanceRecord,
}

impl EntityMention {
    pub fn validate(&self) -> Result<(), SchemaError> {
        check_id(&self.entity_id)?;
        require_non_empty(&self.name, "entity.name")?;
        check_max_len(&self.name, 200, "entity.name")?;
        if self.mention_count == 0 {
            return Err(SchemaError::BelowMinimum {
                field: "entity.mention_count",
                min: 1,
                value: 0,
            });
        }
        if self.segment_ids.is_empty() {
            return Err(SchemaError::Empty {
                field: "entity.segment_ids",
            });
        }
        self.confidence.validate()?;
        self.provenance.validate()
    }
}
