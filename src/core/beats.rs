/// Story beat detection: maps extracted events onto the four-stage arc.
///
/// Stage selection blends a lexical cue score with a positional prior, then
/// clamps the winner to a monotonic window so the arc never regresses and
/// never jumps more than two stages at once.

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::core::lexicon::{tokenize, CueLexicon};
use crate::schema::{stable_id, ConfidenceScore, ExtractedEvent, ProvenanceRecord, Stage, StoryBeat};

const LEXICAL_WEIGHT: f64 = 0.72;
const POSITIONAL_WEIGHT: f64 = 0.28;
/// Positional prior decay per stage of distance from the expected stage.
const POSITIONAL_FALLOFF: f64 = 0.45;
/// A beat may advance at most this many stages past its predecessor.
const MAX_STAGE_JUMP: usize = 2;

pub fn detect_beats(
    events: &[ExtractedEvent],
    lexicon: &CueLexicon,
    created_at: DateTime<Utc>,
) -> Vec<StoryBeat> {
    let mut beats = Vec::with_capacity(events.len());
    let mut previous_stage = 0usize;
    for (index, event) in events.iter().enumerate() {
        let expected = expected_stage(index, events.len());
        let (stage, blended) = select_stage(event, expected, previous_stage, lexicon);
        previous_stage = stage.index();
        let confidence = (0.55 + 0.3 * blended).min(0.9);
        beats.push(StoryBeat {
            beat_id: stable_id("beat", &format!("{}:{}", event.event_id, stage.name())),
            stage,
            order_index: index + 1,
            summary: event.summary.clone(),
            timestamp_utc: event.event_time_utc,
            evidence_segment_ids: vec![event.segment_id.clone()],
            confidence: ConfidenceScore::new("beat.blend.v2", confidence),
            provenance: ProvenanceRecord::new(
                std::slice::from_ref(&event.segment_id),
                "beat_detector",
                created_at,
            ),
        });
    }
    debug!(beats = beats.len(), "beat detection complete");
    beats
}

/// Positional prior: quartiles for four or more events; short stories pin
/// the first event to setup, the last to resolution, and anything between
/// to climax.
fn expected_stage(index: usize, total: usize) -> Stage {
    if total <= 3 {
        if index == 0 {
            return Stage::Setup;
        }
        if index + 1 == total {
            return Stage::Resolution;
        }
        return Stage::Climax;
    }
    Stage::from_index(index * Stage::ALL.len() / total)
}

fn select_stage(
    event: &ExtractedEvent,
    expected: Stage,
    previous_stage: usize,
    lexicon: &CueLexicon,
) -> (Stage, f64) {
    let tokens = tokenize(&event.summary);
    let token_count = tokens.len().max(1) as f64;
    let window_end = (previous_stage + MAX_STAGE_JUMP).min(Stage::ALL.len() - 1);

    let mut best_stage = Stage::from_index(previous_stage);
    let mut best_score = f64::MIN;
    for stage in Stage::ALL {
        if stage.index() < previous_stage || stage.index() > window_end {
            continue;
        }
        let cue_weight: f64 = lexicon
            .stage_cues(stage)
            .iter()
            .filter(|(term, _)| tokens.contains(term))
            .map(|(_, weight)| *weight)
            .sum();
        let lexical = cue_weight / token_count;
        let distance = stage.index().abs_diff(expected.index()) as f64;
        let positional = (1.0 - POSITIONAL_FALLOFF * distance).max(0.0);
        let blended = LEXICAL_WEIGHT * lexical + POSITIONAL_WEIGHT * positional;
        // Strict comparison keeps ties on the earlier stage.
        if blended > best_score {
            best_score = blended;
            best_stage = stage;
        }
    }
    (best_stage, best_score.max(0.0))
}
