/// Story beats — narrative units mapped onto the four-stage arc.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{check_id, check_max_len, require_non_empty, ConfidenceScore, ProvenanceRecord, SchemaError, Stage};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoryBeat {
    pub beat_id: String,
    pub stage: Stage,
    /// 1..N, contiguous across the run.
    pub order_index: usize,
    pub summary: String,
    pub timestamp_utc: Option<DateTime<Utc>>,
    pub evidence_segment_ids: Vec<String>,
    pub confidence: ConfidenceScore,
    pub provenance: ProvenanceRecord,
}

impl StoryBeat {
    pub fn validate(&self) -> Result<(), SchemaError> {
        check_id(&self.beat_id)?;
        require_non_empty(&self.summary, "beat.summary")?;
        check_max_len(&self.summary, 4000, "beat.summary")?;
        if self.order_index == 0 {
            return Err(SchemaError::BelowMinimum {
                field: "beat.order_index",
                min: 1,
                value: 0,
            });
        }
        if self.evidence_segment_ids.is_empty() {
            return Err(SchemaError::Empty {
                field: "beat.evidence_segment_ids",
            });
        }
        self.confidence.validate()?;
        self.provenance.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::stable_id;

    #[test]
    fn beat_requires_evidence() {
        let beat = StoryBeat {
            beat_id: stable_id("beat", "x"),
            stage: Stage::Setup,
            order_index: 1,
            summary: "The story opens".to_string(),
            timestamp_utc: None,
            evidence_segment_ids: vec![],
            confidence: ConfidenceScore::new("beat.blend.v2", 0.7),
            provenance: ProvenanceRecord::new(&[stable_id("seg", "x")], "beat_detector", Utc::now()),
        };
        assert!(beat.validate().is_err());
    }
}
