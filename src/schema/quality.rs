/// Quality gate verdict and the evaluation metrics behind it.

use serde::{Deserialize, Serialize};

use super::{check_unit_interval, SchemaError};

/// The five independent metrics computed by the evaluation stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationMetrics {
    pub confidence_floor: f64,
    pub hallucination_risk: f64,
    pub translation_quality: f64,
    pub timeline_consistency: f64,
    pub evidence_consistency: f64,
}

impl EvaluationMetrics {
    pub fn validate(&self) -> Result<(), SchemaError> {
        check_unit_interval(self.confidence_floor, "metrics.confidence_floor")?;
        check_unit_interval(self.hallucination_risk, "metrics.hallucination_risk")?;
        check_unit_interval(self.translation_quality, "metrics.translation_quality")?;
        check_unit_interval(self.timeline_consistency, "metrics.timeline_consistency")?;
        check_unit_interval(self.evidence_consistency, "metrics.evidence_consistency")
    }
}

/// Pass/fail verdict over all five metrics. Failing thresholds accumulate
/// named reasons — the verdict is never a bare boolean.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityGate {
    pub passed: bool,
    pub confidence_floor: f64,
    pub hallucination_risk: f64,
    pub translation_quality: f64,
    pub timeline_consistency: f64,
    pub evidence_consistency: f64,
    pub reasons: Vec<String>,
}

impl QualityGate {
    pub fn validate(&self) -> Result<(), SchemaError> {
        check_unit_interval(self.confidence_floor, "gate.confidence_floor")?;
        check_unit_interval(self.hallucination_risk, "gate.hallucination_risk")?;
        check_unit_interval(self.translation_quality, "gate.translation_quality")?;
        check_unit_interval(self.timeline_consistency, "gate.timeline_consistency")?;
        check_unit_interval(self.evidence_consistency, "gate.evidence_consistency")
    }
}

/// Gate thresholds. Hand-tuned defaults — treat as configuration, verified
/// against the scenario tests rather than as business rules.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GateThresholds {
    pub min_confidence_floor: f64,
    pub max_hallucination_risk: f64,
    pub min_translation_quality: f64,
    pub min_timeline_consistency: f64,
    pub min_evidence_consistency: f64,
    /// Per-insight content↔evidence token overlap required to count the
    /// insight as consistent.
    pub min_evidence_overlap: f64,
}

impl Default for GateThresholds {
    fn default() -> Self {
        Self {
            min_confidence_floor: 0.55,
            max_hallucination_risk: 0.45,
            min_translation_quality: 0.5,
            min_timeline_consistency: 0.55,
            min_evidence_consistency: 0.58,
            min_evidence_overlap: 0.08,
        }
    }
}
