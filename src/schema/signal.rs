/// Theme, character-arc, conflict, and emotion signals tracked per stage.
///
/// Every signal is evidence-linked back to segments; the tracking stage never
/// emits a signal with an empty evidence list.

use serde::{Deserialize, Serialize};

use super::{check_id, check_max_len, check_unit_interval, require_non_empty, ConfidenceScore, ProvenanceRecord, SchemaError, Stage};

/// Trend of a theme or arc relative to the nearest preceding populated stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendDirection {
    Emerging,
    Strengthening,
    Steady,
    Fading,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThemeSignal {
    pub theme_id: String,
    pub label: String,
    pub stage: Stage,
    pub strength: f64,
    pub direction: TrendDirection,
    pub evidence_segment_ids: Vec<String>,
    pub confidence: ConfidenceScore,
    pub provenance: ProvenanceRecord,
}

impl ThemeSignal {
    pub fn validate(&self) -> Result<(), SchemaError> {
        check_id(&self.theme_id)?;
        require_non_empty(&self.label, "theme.label")?;
        check_max_len(&self.label, 200, "theme.label")?;
        check_unit_interval(self.strength, "theme.strength")?;
        if self.evidence_segment_ids.is_empty() {
            return Err(SchemaError::Empty {
                field: "theme.evidence_segment_ids",
            });
        }
        self.confidence.validate()?;
        self.provenance.validate()
    }
}

/// One entity's involvement in one stage, measured as segment overlap.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArcSignal {
    pub entity_id: String,
    pub entity_name: String,
    pub stage: Stage,
    pub state: TrendDirection,
    /// Share of the entity's mention segments that fall inside this stage.
    pub overlap: f64,
    pub delta: f64,
    pub evidence_segment_ids: Vec<String>,
}

impl ArcSignal {
    pub fn validate(&self) -> Result<(), SchemaError> {
        check_id(&self.entity_id)?;
        require_non_empty(&self.entity_name, "arc.entity_name")?;
        check_unit_interval(self.overlap, "arc.overlap")?;
        if self.evidence_segment_ids.is_empty() {
            return Err(SchemaError::Empty {
                field: "arc.evidence_segment_ids",
            });
        }
        Ok(())
    }
}

/// Stage-to-stage change in conflict intensity, anchored at 0.5.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConflictShift {
    pub from_stage: Stage,
    pub to_stage: Stage,
    pub from_intensity: f64,
    pub to_intensity: f64,
    pub intensity_delta: f64,
    pub evidence_segment_ids: Vec<String>,
}

impl ConflictShift {
    pub fn validate(&self) -> Result<(), SchemaError> {
        check_unit_interval(self.from_intensity, "conflict.from_intensity")?;
        check_unit_interval(self.to_intensity, "conflict.to_intensity")?;
        if self.evidence_segment_ids.is_empty() {
            return Err(SchemaError::Empty {
                field: "conflict.evidence_segment_ids",
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmotionTone {
    Negative,
    Neutral,
    Positive,
}

/// Emotional tone of one stage's beat text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmotionSignal {
    pub stage: Stage,
    pub tone: EmotionTone,
    pub score: f64,
    pub evidence_segment_ids: Vec<String>,
}

impl EmotionSignal {
    pub fn validate(&self) -> Result<(), SchemaError> {
        check_unit_interval(self.score, "emotion.score")?;
        if self.evidence_segment_ids.is_empty() {
            return Err(SchemaError::Empty {
                field: "emotion.evidence_segment_ids",
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::stable_id;
    use chrono::Utc;

    #[test]
    fn theme_strength_bounds() {
        let signal = ThemeSignal {
            theme_id: stable_id("theme", "memory:setup"),
            label: "memory".to_string(),
            stage: Stage::Setup,
            strength: 1.4,
            direction: TrendDirection::Emerging,
            evidence_segment_ids: vec![stable_id("seg", "a")],
            confidence: ConfidenceScore::new("theme.cue.v2", 0.66),
            provenance: ProvenanceRecord::new(&[stable_id("seg", "a")], "theme_tracker", Utc::now()),
        };
        assert!(signal.validate().is_err());
    }

    #[test]
    fn emotion_requires_evidence() {
        let signal = EmotionSignal {
            stage: Stage::Climax,
            tone: EmotionTone::Neutral,
            score: 0.5,
            evidence_segment_ids: vec![],
        };
        assert!(signal.validate().is_err());
    }
}
