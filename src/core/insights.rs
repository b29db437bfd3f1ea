/// Insight generation at three granularities, plus the style-driven
/// rendering pass and the theme-strength confidence boost.

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::schema::{
    stable_id, ConfidenceScore, Granularity, Insight, InsightStyle, ProvenanceRecord, Segment,
    Stage, StoryBeat, ThemeSignal,
};

const MACRO_BEAT_LIMIT: usize = 8;
const MESO_BEAT_LIMIT: usize = 3;
const MESO_CONFIDENCE: f64 = 0.6;
/// Largest confidence boost the theme pass may apply.
const MAX_THEME_BOOST: f64 = 0.15;

pub fn generate_insights(
    beats: &[StoryBeat],
    themes: &[ThemeSignal],
    segments: &[Segment],
    style: InsightStyle,
    created_at: DateTime<Utc>,
) -> Vec<Insight> {
    let mean_theme = mean_theme_strength(themes);
    let mut insights = Vec::new();

    if let Some(overview) = macro_insight(beats, segments, mean_theme, created_at) {
        insights.push(overview);
    }
    insights.extend(meso_insights(beats, created_at));
    insights.extend(micro_insights(beats, created_at));

    let boost = (mean_theme * 0.2).min(MAX_THEME_BOOST);
    for insight in &mut insights {
        insight.confidence.score = (insight.confidence.score + boost).min(1.0);
        render(insight, style);
    }
    debug!(insights = insights.len(), style = ?style, "insight generation complete");
    insights
}

fn macro_insight(
    beats: &[StoryBeat],
    segments: &[Segment],
    mean_theme: f64,
    created_at: DateTime<Utc>,
) -> Option<Insight> {
    if beats.is_empty() {
        return None;
    }
    let summaries: Vec<&str> = beats
        .iter()
        .take(MACRO_BEAT_LIMIT)
        .map(|b| b.summary.as_str())
        .collect();
    let evidence = collect_evidence(beats.iter());
    let coverage = evidence.len() as f64 / segments.len().max(1) as f64;
    let confidence = (0.58 + 0.2 * coverage + 0.15 * mean_theme).min(0.9);
    let content = summaries.join("; ");
    Some(Insight {
        // Id folds the content so different stories never collide.
        insight_id: stable_id("ins", &format!("macro:{content}")),
        granularity: Granularity::Macro,
        title: "Story overview".to_string(),
        content,
        stage: None,
        beat_id: None,
        confidence: ConfidenceScore::new("insight.rule.v2", confidence),
        provenance: ProvenanceRecord::new(&evidence, "insight_engine", created_at),
        evidence_segment_ids: evidence,
    })
}

fn meso_insights(beats: &[StoryBeat], created_at: DateTime<Utc>) -> Vec<Insight> {
    let mut insights = Vec::new();
    for stage in Stage::ALL {
        let stage_beats: Vec<&StoryBeat> = beats.iter().filter(|b| b.stage == stage).collect();
        if stage_beats.is_empty() {
            continue;
        }
        let summaries: Vec<&str> = stage_beats
            .iter()
            .take(MESO_BEAT_LIMIT)
            .map(|b| b.summary.as_str())
            .collect();
        let evidence = collect_evidence(stage_beats.iter().copied());
        let content = summaries.join("; ");
        insights.push(Insight {
            insight_id: stable_id("ins", &format!("meso:{}:{content}", stage.name())),
            granularity: Granularity::Meso,
            title: format!("{} in brief", capitalize(stage.name())),
            content,
            stage: Some(stage),
            beat_id: None,
            confidence: ConfidenceScore::new("insight.rule.v2", MESO_CONFIDENCE),
            provenance: ProvenanceRecord::new(&evidence, "insight_engine", created_at),
            evidence_segment_ids: evidence,
        });
    }
    insights
}

fn micro_insights(beats: &[StoryBeat], created_at: DateTime<Utc>) -> Vec<Insight> {
    beats
        .iter()
        .map(|beat| Insight {
            insight_id: stable_id("ins", &format!("micro:{}", beat.beat_id)),
            granularity: Granularity::Micro,
            title: truncate(&beat.summary, 80),
            content: beat.summary.clone(),
            stage: Some(beat.stage),
            beat_id: Some(beat.beat_id.clone()),
            evidence_segment_ids: beat.evidence_segment_ids.clone(),
            confidence: ConfidenceScore::new("insight.rule.v2", beat.confidence.score),
            provenance: ProvenanceRecord::new(
                &beat.evidence_segment_ids,
                "insight_engine",
                created_at,
            ),
        })
        .collect()
}

/// Apply the configured rendering rule. Pure formatting, no data changes.
fn render(insight: &mut Insight, style: InsightStyle) {
    match style {
        InsightStyle::Plain => {}
        InsightStyle::Dashboard => {
            insight.title = format!(
                "[{}] {}",
                insight.granularity.name().to_uppercase(),
                insight.title
            );
        }
        InsightStyle::Export => {
            insight.content = format!(
                "{}\n(evidence segments: {})",
                insight.content,
                insight.evidence_segment_ids.len()
            );
        }
    }
}

fn mean_theme_strength(themes: &[ThemeSignal]) -> f64 {
    if themes.is_empty() {
        return 0.0;
    }
    themes.iter().map(|t| t.strength).sum::<f64>() / themes.len() as f64
}

fn collect_evidence<'a>(beats: impl Iterator<Item = &'a StoryBeat>) -> Vec<String> {
    let mut evidence: Vec<String> = Vec::new();
    for beat in beats {
        for id in &beat.evidence_segment_ids {
            if !evidence.contains(id) {
                evidence.push(id.clone());
            }
        }
    }
    evidence
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    text.chars().take(max_chars).collect()
}
