/// Insights generated at macro, meso, and micro granularity.

use serde::{Deserialize, Serialize};

use super::{check_id, check_max_len, require_non_empty, ConfidenceScore, ProvenanceRecord, SchemaError, Stage};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    Macro,
    Meso,
    Micro,
}

impl Granularity {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Macro => "macro",
            Self::Meso => "meso",
            Self::Micro => "micro",
        }
    }
}

/// Rendering rule applied to insight titles and content. Selected by the
/// caller through the pipeline config, never by ambient process state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InsightStyle {
    #[default]
    Plain,
    Dashboard,
    Export,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Insight {
    pub insight_id: String,
    pub granularity: Granularity,
    pub title: String,
    pub content: String,
    pub stage: Option<Stage>,
    pub beat_id: Option<String>,
    pub evidence_segment_ids: Vec<String>,
    pub confidence: ConfidenceScore,
    pub provenance: ProvenanceRecord,
}

impl Insight {
    pub fn validate(&self) -> Result<(), SchemaError> {
        check_id(&self.insight_id)?;
        require_non_empty(&self.title, "insight.title")?;
        check_max_len(&self.title, 240, "insight.title")?;
        require_non_empty(&self.content, "insight.content")?;
        check_max_len(&self.content, 8000, "insight.content")?;
        if self.evidence_segment_ids.is_empty() {
            return Err(SchemaError::Empty {
                field: "insight.evidence_segment_ids",
            });
        }
        self.confidence.validate()?;
        if self.confidence.score <= 0.0 {
            return Err(SchemaError::OutOfRange {
                field: "insight.confidence.score",
                min: f64::MIN_POSITIVE,
                max: 1.0,
                value: self.confidence.score,
            });
        }
        self.provenance.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::stable_id;
    use chrono::Utc;

    #[test]
    fn insight_confidence_must_be_positive() {
        let insight = Insight {
            insight_id: stable_id("ins", "macro:test"),
            granularity: Granularity::Macro,
            title: "Story Thesis".to_string(),
            content: "Something happens.".to_string(),
            stage: None,
            beat_id: None,
            evidence_segment_ids: vec![stable_id("seg", "a")],
            confidence: ConfidenceScore::new("insight.rule.v2", 0.0),
            provenance: ProvenanceRecord::new(&[stable_id("seg", "a")], "insight_engine", Utc::now()),
        };
        assert!(insight.validate().is_err());
    }
}
