/// Evaluation metrics and the quality gate.
///
/// Five independent metrics, each in [0,1], compared against configured
/// thresholds. Every failed threshold appends a named reason so callers can
/// see exactly why a run was rejected.

use rustc_hash::FxHashSet;
use tracing::debug;

use crate::core::lexicon::tokenize;
use crate::schema::{EvaluationMetrics, GateThresholds, Insight, QualityGate, Segment};

pub fn evaluate_quality(
    segments: &[Segment],
    insights: &[Insight],
    timeline_consistency: f64,
    target_language: &str,
    thresholds: &GateThresholds,
) -> (EvaluationMetrics, QualityGate) {
    let metrics = EvaluationMetrics {
        confidence_floor: confidence_floor(insights),
        hallucination_risk: hallucination_risk(segments, insights),
        translation_quality: translation_quality(segments, target_language),
        timeline_consistency,
        evidence_consistency: evidence_consistency(segments, insights, thresholds),
    };
    let gate = apply_gate(&metrics, thresholds);
    debug!(passed = gate.passed, reasons = gate.reasons.len(), "quality gate evaluated");
    (metrics, gate)
}

/// Minimum confidence across all insights.
fn confidence_floor(insights: &[Insight]) -> f64 {
    insights
        .iter()
        .map(|i| i.confidence.score)
        .fold(1.0, f64::min)
}

/// Fraction of insight evidence links that do not resolve to a known
/// segment. Only insight links count: a hallucinating insight must not be
/// diluted by valid links elsewhere. No links at all scores fully
/// hallucinated.
fn hallucination_risk(segments: &[Segment], insights: &[Insight]) -> f64 {
    let known: FxHashSet<&str> = segments.iter().map(|s| s.segment_id.as_str()).collect();
    let mut total = 0usize;
    let mut invalid = 0usize;
    for link in insights.iter().flat_map(|i| i.evidence_segment_ids.iter()) {
        total += 1;
        if !known.contains(link.as_str()) {
            invalid += 1;
        }
    }
    if total == 0 {
        return 1.0;
    }
    invalid as f64 / total as f64
}

/// 1 minus the unchanged-translation fraction over segments that actually
/// needed translation. A run with nothing to translate scores 1.0.
fn translation_quality(segments: &[Segment], target_language: &str) -> f64 {
    let translated: Vec<&Segment> = segments
        .iter()
        .filter(|s| s.language_code != target_language && s.language_code != "und")
        .collect();
    if translated.is_empty() {
        return 1.0;
    }
    let unchanged = translated
        .iter()
        .filter(|s| {
            s.translated_text
                .as_deref()
                .is_none_or(|t| t.trim() == s.normalized_text.trim())
        })
        .count();
    1.0 - unchanged as f64 / translated.len() as f64
}

/// Fraction of insights whose content shares enough token overlap with the
/// text of their evidence segments.
fn evidence_consistency(
    segments: &[Segment],
    insights: &[Insight],
    thresholds: &GateThresholds,
) -> f64 {
    if insights.is_empty() {
        return 0.0;
    }
    let consistent = insights
        .iter()
        .filter(|insight| {
            let content: FxHashSet<String> = tokenize(&insight.content).into_iter().collect();
            let mut evidence: FxHashSet<String> = FxHashSet::default();
            for id in &insight.evidence_segment_ids {
                if let Some(segment) = segments.iter().find(|s| &s.segment_id == id) {
                    evidence.extend(tokenize(segment.working_text()));
                }
            }
            jaccard(&content, &evidence) >= thresholds.min_evidence_overlap
        })
        .count();
    consistent as f64 / insights.len() as f64
}

fn jaccard(a: &FxHashSet<String>, b: &FxHashSet<String>) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 0.0;
    }
    let intersection = a.intersection(b).count() as f64;
    let union = a.union(b).count() as f64;
    intersection / union
}

fn apply_gate(metrics: &EvaluationMetrics, thresholds: &GateThresholds) -> QualityGate {
    let mut reasons = Vec::new();
    if metrics.confidence_floor < thresholds.min_confidence_floor {
        reasons.push(format!(
            "confidence_floor {:.3} below minimum {:.2}",
            metrics.confidence_floor, thresholds.min_confidence_floor
        ));
    }
    if metrics.hallucination_risk > thresholds.max_hallucination_risk {
        reasons.push(format!(
            "hallucination_risk {:.3} above maximum {:.2}",
            metrics.hallucination_risk, thresholds.max_hallucination_risk
        ));
    }
    if metrics.translation_quality < thresholds.min_translation_quality {
        reasons.push(format!(
            "translation_quality {:.3} below minimum {:.2}",
            metrics.translation_quality, thresholds.min_translation_quality
        ));
    }
    if metrics.timeline_consistency < thresholds.min_timeline_consistency {
        reasons.push(format!(
            "timeline_consistency {:.3} below minimum {:.2}",
            metrics.timeline_consistency, thresholds.min_timeline_consistency
        ));
    }
    if metrics.evidence_consistency < thresholds.min_evidence_consistency {
        reasons.push(format!(
            "evidence_consistency {:.3} below minimum {:.2}",
            metrics.evidence_consistency, thresholds.min_evidence_consistency
        ));
    }
    QualityGate {
        passed: reasons.is_empty(),
        confidence_floor: metrics.confidence_floor,
        hallucination_risk: metrics.hallucination_risk,
        translation_quality: metrics.translation_quality,
        timeline_consistency: metrics.timeline_consistency,
        evidence_consistency: metrics.evidence_consistency,
        reasons,
    }
}
