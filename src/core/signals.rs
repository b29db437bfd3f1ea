/// Stage-level signal tracking: themes, character arcs, conflict intensity,
/// and emotional tone, all derived from the per-stage beat evidence context.

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::core::lexicon::{tokenize, CueLexicon};
use crate::schema::{
    stable_id, ArcSignal, ConfidenceScore, ConflictShift, EmotionSignal, EmotionTone,
    EntityMention, ProvenanceRecord, Stage, StoryBeat, ThemeSignal, TrendDirection,
};

/// Denominator scale per beat when normalizing weighted theme hits.
const THEME_BEAT_SCALE: f64 = 2.8;
/// Minimum strength/overlap movement that counts as a trend change.
const TREND_DELTA: f64 = 0.08;
const CONFLICT_BASELINE: f64 = 0.5;
const CONFLICT_STEP: f64 = 0.08;

#[derive(Debug, Clone)]
pub struct SignalBundle {
    pub themes: Vec<ThemeSignal>,
    pub arcs: Vec<ArcSignal>,
    pub conflicts: Vec<ConflictShift>,
    pub emotions: Vec<EmotionSignal>,
}

/// Joined beat text, deduped evidence ids, and tokens for one populated stage.
struct StageContext {
    stage: Stage,
    beat_count: usize,
    evidence_segment_ids: Vec<String>,
    tokens: Vec<String>,
}

pub fn track_signals(
    beats: &[StoryBeat],
    entities: &[EntityMention],
    lexicon: &CueLexicon,
    created_at: DateTime<Utc>,
) -> SignalBundle {
    let contexts = stage_contexts(beats);
    let themes = track_themes(&contexts, lexicon, created_at);
    let arcs = track_arcs(&contexts, entities);
    let conflicts = track_conflicts(&contexts, lexicon);
    let emotions = track_emotions(&contexts, lexicon);
    debug!(
        themes = themes.len(),
        arcs = arcs.len(),
        conflicts = conflicts.len(),
        emotions = emotions.len(),
        "signal tracking complete"
    );
    SignalBundle {
        themes,
        arcs,
        conflicts,
        emotions,
    }
}

fn stage_contexts(beats: &[StoryBeat]) -> Vec<StageContext> {
    let mut contexts = Vec::new();
    for stage in Stage::ALL {
        let stage_beats: Vec<&StoryBeat> = beats.iter().filter(|b| b.stage == stage).collect();
        if stage_beats.is_empty() {
            continue;
        }
        let mut evidence: Vec<String> = Vec::new();
        let mut tokens = Vec::new();
        for beat in &stage_beats {
            for id in &beat.evidence_segment_ids {
                if !evidence.contains(id) {
                    evidence.push(id.clone());
                }
            }
            tokens.extend(tokenize(&beat.summary));
        }
        contexts.push(StageContext {
            stage,
            beat_count: stage_beats.len(),
            evidence_segment_ids: evidence,
            tokens,
        });
    }
    contexts
}

fn weighted_hits(tokens: &[String], vocabulary: &[(String, f64)]) -> f64 {
    vocabulary
        .iter()
        .map(|(term, weight)| tokens.iter().filter(|t| *t == term).count() as f64 * weight)
        .sum()
}

fn count_hits(tokens: &[String], words: &[String]) -> usize {
    tokens.iter().filter(|t| words.contains(t)).count()
}

fn trend(previous: f64, current: f64) -> TrendDirection {
    if previous <= 0.0 {
        TrendDirection::Emerging
    } else if current - previous > TREND_DELTA {
        TrendDirection::Strengthening
    } else if previous - current > TREND_DELTA {
        TrendDirection::Fading
    } else {
        TrendDirection::Steady
    }
}

fn track_themes(
    contexts: &[StageContext],
    lexicon: &CueLexicon,
    created_at: DateTime<Utc>,
) -> Vec<ThemeSignal> {
    let mut themes = Vec::new();
    for (label, vocabulary) in &lexicon.theme_vocabulary {
        let mut previous = 0.0;
        for context in contexts {
            let hits = weighted_hits(&context.tokens, vocabulary);
            let strength =
                (hits / (context.beat_count as f64 * THEME_BEAT_SCALE).max(1.0)).min(1.0);
            if strength <= 0.0 {
                continue;
            }
            themes.push(ThemeSignal {
                theme_id: stable_id("theme", &format!("{}:{}", label, context.stage.name())),
                label: label.clone(),
                stage: context.stage,
                strength,
                direction: trend(previous, strength),
                evidence_segment_ids: context.evidence_segment_ids.clone(),
                confidence: ConfidenceScore::new("theme.cue.v2", (0.6 + strength * 0.25).min(0.9)),
                provenance: ProvenanceRecord::new(
                    &context.evidence_segment_ids,
                    "theme_tracker",
                    created_at,
                ),
            });
            previous = strength;
        }
    }
    if themes.is_empty() {
        if let Some(context) = contexts.first() {
            // No vocabulary theme surfaced anywhere; emit a single generic
            // signal so downstream consumers always see one.
            themes.push(ThemeSignal {
                theme_id: stable_id("theme", &format!("story:{}", context.stage.name())),
                label: "story".to_string(),
                stage: context.stage,
                strength: 0.2,
                direction: TrendDirection::Steady,
                evidence_segment_ids: context.evidence_segment_ids.clone(),
                confidence: ConfidenceScore::new("theme.fallback.v1", 0.5),
                provenance: ProvenanceRecord::new(
                    &context.evidence_segment_ids,
                    "theme_tracker",
                    created_at,
                ),
            });
        }
    }
    themes
}

fn track_arcs(contexts: &[StageContext], entities: &[EntityMention]) -> Vec<ArcSignal> {
    let mut arcs = Vec::new();
    for entity in entities {
        let mention_total = entity.segment_ids.len().max(1) as f64;
        let mut previous = 0.0;
        for context in contexts {
            let shared: Vec<String> = entity
                .segment_ids
                .iter()
                .filter(|id| context.evidence_segment_ids.contains(id))
                .cloned()
                .collect();
            if shared.is_empty() {
                continue;
            }
            let overlap = shared.len() as f64 / mention_total;
            arcs.push(ArcSignal {
                entity_id: entity.entity_id.clone(),
                entity_name: entity.name.clone(),
                stage: context.stage,
                state: trend(previous, overlap),
                overlap,
                delta: overlap - previous,
                evidence_segment_ids: shared,
            });
            previous = overlap;
        }
    }
    arcs
}

fn conflict_intensity(context: &StageContext, lexicon: &CueLexicon) -> f64 {
    let conflict = count_hits(&context.tokens, &lexicon.conflict_cues) as f64;
    let relief = count_hits(&context.tokens, &lexicon.relief_cues) as f64;
    (CONFLICT_BASELINE + CONFLICT_STEP * (conflict - relief)).clamp(0.0, 1.0)
}

fn track_conflicts(contexts: &[StageContext], lexicon: &CueLexicon) -> Vec<ConflictShift> {
    contexts
        .windows(2)
        .map(|pair| {
            let from_intensity = conflict_intensity(&pair[0], lexicon);
            let to_intensity = conflict_intensity(&pair[1], lexicon);
            let mut evidence = pair[0].evidence_segment_ids.clone();
            for id in &pair[1].evidence_segment_ids {
                if !evidence.contains(id) {
                    evidence.push(id.clone());
                }
            }
            ConflictShift {
                from_stage: pair[0].stage,
                to_stage: pair[1].stage,
                from_intensity,
                to_intensity,
                intensity_delta: to_intensity - from_intensity,
                evidence_segment_ids: evidence,
            }
        })
        .collect()
}

fn track_emotions(contexts: &[StageContext], lexicon: &CueLexicon) -> Vec<EmotionSignal> {
    contexts
        .iter()
        .map(|context| {
            let positive = count_hits(&context.tokens, &lexicon.positive_words) as f64;
            let negative = count_hits(&context.tokens, &lexicon.negative_words) as f64;
            let score = (positive + 1.0) / (positive + negative + 2.0);
            let tone = if score <= 0.42 {
                EmotionTone::Negative
            } else if score >= 0.58 {
                EmotionTone::Positive
            } else {
                EmotionTone::Neutral
            };
            EmotionSignal {
                stage: context.stage,
                tone,
                score,
                evidence_segment_ids: context.evidence_segment_ids.clone(),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::contracts::validate_theme_output;
    use crate::schema::EntityKind;

    fn beat(order: usize, stage: Stage, summary: &str, segment: &str) -> StoryBeat {
        let segment_id = stable_id("seg", segment);
        StoryBeat {
            beat_id: stable_id("beat", &format!("{order}:{}", stage.name())),
            stage,
            order_index: order,
            summary: summary.to_string(),
            timestamp_utc: None,
            evidence_segment_ids: vec![segment_id.clone()],
            confidence: ConfidenceScore::new("beat.blend.v2", 0.7),
            provenance: ProvenanceRecord::new(&[segment_id], "beat_detector", Utc::now()),
        }
    }

    fn rhea_beats() -> Vec<StoryBeat> {
        vec![
            beat(1, Stage::Setup, "Rhea enters the archive and finds her family's ledger", "a"),
            beat(2, Stage::Escalation, "The council denies her claim and tension rises", "a"),
            beat(3, Stage::Climax, "She confronts the council in the great hall", "a"),
            beat(4, Stage::Resolution, "At last the city heals and accepts the truth", "a"),
        ]
    }

    #[test]
    fn memory_theme_emerges_in_setup() {
        let bundle = track_signals(&rhea_beats(), &[], &CueLexicon::default(), Utc::now());
        let memory = bundle
            .themes
            .iter()
            .find(|t| t.label == "memory" && t.stage == Stage::Setup)
            .unwrap();
        assert!((memory.strength - 2.0 / 2.8).abs() < 1e-9);
        assert_eq!(memory.direction, TrendDirection::Emerging);
        validate_theme_output(&bundle.themes).unwrap();
    }

    #[test]
    fn cueless_story_gets_fallback_theme() {
        let beats = vec![beat(1, Stage::Setup, "Plain words without any themed phrasing", "a")];
        let bundle = track_signals(&beats, &[], &CueLexicon::default(), Utc::now());
        assert_eq!(bundle.themes.len(), 1);
        assert_eq!(bundle.themes[0].label, "story");
        assert_eq!(bundle.themes[0].confidence.method, "theme.fallback.v1");
    }

    #[test]
    fn conflict_rises_then_releases() {
        let bundle = track_signals(&rhea_beats(), &[], &CueLexicon::default(), Utc::now());
        assert_eq!(bundle.conflicts.len(), 3);
        let first = &bundle.conflicts[0];
        assert_eq!(first.from_stage, Stage::Setup);
        assert!(first.intensity_delta > 0.0);
        let last = &bundle.conflicts[2];
        assert_eq!(last.to_stage, Stage::Resolution);
        assert!(last.to_intensity < CONFLICT_BASELINE);
    }

    #[test]
    fn emotion_defaults_to_neutral_midpoint() {
        let beats = vec![beat(1, Stage::Setup, "Someone walks through a door", "a")];
        let bundle = track_signals(&beats, &[], &CueLexicon::default(), Utc::now());
        assert_eq!(bundle.emotions.len(), 1);
        assert!((bundle.emotions[0].score - 0.5).abs() < 1e-9);
        assert_eq!(bundle.emotions[0].tone, EmotionTone::Neutral);
    }

    #[test]
    fn arcs_measure_segment_overlap() {
        let segment_id = stable_id("seg", "a");
        let entity = EntityMention {
            entity_id: stable_id("ent", "rhea"),
            name: "rhea".to_string(),
            kind: EntityKind::Character,
            mention_count: 2,
            segment_ids: vec![segment_id.clone()],
            confidence: ConfidenceScore::new("extract.rule.v2", 0.68),
            provenance: ProvenanceRecord::new(&[segment_id], "entity_extractor", Utc::now()),
        };
        let bundle = track_signals(&rhea_beats(), &[entity], &CueLexicon::default(), Utc::now());
        assert!(!bundle.arcs.is_empty());
        let first = &bundle.arcs[0];
        assert!((first.overlap - 1.0).abs() < 1e-9);
        assert_eq!(first.state, TrendDirection::Emerging);
        first.validate().unwrap();
    }

    #[test]
    fn every_signal_carries_evidence() {
        let bundle = track_signals(&rhea_beats(), &[], &CueLexicon::default(), Utc::now());
        for theme in &bundle.themes {
            assert!(!theme.evidence_segment_ids.is_empty());
        }
        for shift in &bundle.conflicts {
            assert!(!shift.evidence_segment_ids.is_empty());
        }
        for emotion in &bundle.emotions {
            assert!(!emotion.evidence_segment_ids.is_empty());
        }
    }
}
