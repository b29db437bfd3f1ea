/// Timeline points shared by the actual-time and narrative-order views.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{check_id, check_max_len, require_non_empty, ConfidenceScore, ProvenanceRecord, SchemaError, Severity, Stage};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PointSource {
    Event,
    Beat,
}

impl PointSource {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Event => "event",
            Self::Beat => "beat",
        }
    }
}

/// Which step of the time-inference fallback chain produced a point's time.
/// `PreviousPoint` and `SyntheticAnchor` leave the point "unresolved": the
/// stored time is usable for deterministic ordering but counts as a
/// missing-time warning during conflict detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeSource {
    Explicit,
    ParsedExpression,
    LinkedBeat,
    PreviousPoint,
    SyntheticAnchor,
}

impl TimeSource {
    /// True when the time came from real evidence (chain steps 1-3).
    pub fn is_resolved(&self) -> bool {
        matches!(self, Self::Explicit | Self::ParsedExpression | Self::LinkedBeat)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelinePoint {
    pub point_id: String,
    pub source_id: String,
    pub source_kind: PointSource,
    pub label: String,
    /// 1..N after deterministic renumbering.
    pub narrative_order: usize,
    pub actual_time_utc: Option<DateTime<Utc>>,
    pub time_source: TimeSource,
    pub stage: Stage,
    pub confidence: ConfidenceScore,
    pub provenance: ProvenanceRecord,
}

impl TimelinePoint {
    pub fn validate(&self) -> Result<(), SchemaError> {
        check_id(&self.point_id)?;
        check_id(&self.source_id)?;
        require_non_empty(&self.label, "timeline.label")?;
        check_max_len(&self.label, 1000, "timeline.label")?;
        if self.narrative_order == 0 {
            return Err(SchemaError::BelowMinimum {
                field: "timeline.narrative_order",
                min: 1,
                value: 0,
            });
        }
        self.confidence.validate()?;
        self.provenance.validate()
    }
}

/// One chronology conflict detected while composing the timeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelineConflict {
    pub code: String,
    pub severity: Severity,
    pub point_id: String,
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolved_time_sources() {
        assert!(TimeSource::Explicit.is_resolved());
        assert!(TimeSource::LinkedBeat.is_resolved());
        assert!(!TimeSource::PreviousPoint.is_resolved());
        assert!(!TimeSource::SyntheticAnchor.is_resolved());
    }
}
