/// Timeline composition: one point per event and per beat, a five-step time
/// inference chain, two deterministic views, and chronology conflict
/// detection feeding the consistency score.

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use tracing::debug;

use crate::schema::{
    stable_id, ConfidenceScore, ExtractedEvent, PointSource, ProvenanceRecord, Severity, Stage,
    StoryBeat, TimeSource, TimelineConflict, TimelinePoint,
};

/// Gap assumed between consecutive points when no time evidence exists.
const INFERRED_GAP_MINUTES: i64 = 5;
const ERROR_PENALTY: f64 = 1.2;
const WARNING_PENALTY: f64 = 0.35;

#[derive(Debug, Clone)]
pub struct TimelineOutcome {
    /// Points renumbered 1..N in narrative order.
    pub narrative: Vec<TimelinePoint>,
    /// Resolved points sorted by actual time, unresolved points last.
    pub actual: Vec<TimelinePoint>,
    pub conflicts: Vec<TimelineConflict>,
    pub consistency: f64,
}

pub fn compose_timeline(
    events: &[ExtractedEvent],
    beats: &[StoryBeat],
    created_at: DateTime<Utc>,
) -> TimelineOutcome {
    let mut pending = Vec::with_capacity(events.len() + beats.len());
    for event in events {
        let linked = matching_beat(event, beats);
        let candidate = event
            .event_time_utc
            .map(|t| (t, TimeSource::Explicit))
            .or_else(|| parse_time_expression(&event.summary).map(|t| (t, TimeSource::ParsedExpression)))
            .or_else(|| {
                linked
                    .and_then(|b| b.timestamp_utc)
                    .map(|t| (t, TimeSource::LinkedBeat))
            });
        let stage = linked
            .map(|b| b.stage)
            .unwrap_or_else(|| quartile_stage(event.narrative_order, events.len()));
        pending.push(PendingPoint {
            source_kind: PointSource::Event,
            source_id: event.event_id.clone(),
            label: event.summary.clone(),
            initial_order: event.narrative_order,
            stage,
            candidate,
            evidence: vec![event.segment_id.clone()],
        });
    }
    for beat in beats {
        let candidate = beat
            .timestamp_utc
            .map(|t| (t, TimeSource::Explicit))
            .or_else(|| parse_time_expression(&beat.summary).map(|t| (t, TimeSource::ParsedExpression)));
        pending.push(PendingPoint {
            source_kind: PointSource::Beat,
            source_id: beat.beat_id.clone(),
            label: beat.summary.clone(),
            initial_order: beat.order_index,
            stage: beat.stage,
            candidate,
            evidence: beat.evidence_segment_ids.clone(),
        });
    }
    pending.sort_by(|a, b| {
        a.initial_order
            .cmp(&b.initial_order)
            .then(a.source_kind.name().cmp(b.source_kind.name()))
            .then(a.source_id.cmp(&b.source_id))
    });

    let mut narrative = Vec::with_capacity(pending.len());
    let mut conflicts = Vec::new();
    let mut previous_time: Option<DateTime<Utc>> = None;
    for (index, point) in pending.into_iter().enumerate() {
        let narrative_order = index + 1;
        let (time, time_source) = match point.candidate {
            Some((time, source)) => (time, source),
            None => match previous_time {
                Some(prev) => (
                    prev + Duration::minutes(INFERRED_GAP_MINUTES),
                    TimeSource::PreviousPoint,
                ),
                None => (
                    synthetic_epoch()
                        + Duration::minutes(INFERRED_GAP_MINUTES * narrative_order as i64),
                    TimeSource::SyntheticAnchor,
                ),
            },
        };
        previous_time = Some(time);
        let point_id = stable_id(
            "tlp",
            &format!("{}:{}", point.source_kind.name(), point.source_id),
        );
        if !time_source.is_resolved() {
            conflicts.push(TimelineConflict {
                code: "timeline_missing_time".to_string(),
                severity: Severity::Warning,
                point_id: point_id.clone(),
                message: format!("no time evidence for '{}'; inferred", point.label),
            });
        }
        narrative.push(TimelinePoint {
            point_id,
            source_id: point.source_id,
            source_kind: point.source_kind,
            label: point.label,
            narrative_order,
            actual_time_utc: Some(time),
            time_source,
            stage: point.stage,
            confidence: ConfidenceScore::new("timeline.chain.v1", chain_confidence(time_source)),
            provenance: ProvenanceRecord::new(&point.evidence, "timeline_composer", created_at),
        });
    }

    let mut actual: Vec<TimelinePoint> = narrative
        .iter()
        .filter(|p| p.time_source.is_resolved())
        .cloned()
        .collect();
    actual.sort_by_key(|p| (p.actual_time_utc, p.narrative_order));
    actual.extend(
        narrative
            .iter()
            .filter(|p| !p.time_source.is_resolved())
            .cloned(),
    );

    // Adjacent resolved pairs in the actual-time view whose narrative order
    // runs backwards. Pairing by time keeps one misplaced point to one
    // conflict instead of charging each narrative neighbor it crosses.
    for pair in actual.windows(2) {
        let (earlier, later) = (&pair[0], &pair[1]);
        if !earlier.time_source.is_resolved() || !later.time_source.is_resolved() {
            continue;
        }
        if later.narrative_order < earlier.narrative_order {
            conflicts.push(TimelineConflict {
                code: "chronology_order_conflict".to_string(),
                severity: Severity::Error,
                point_id: later.point_id.clone(),
                message: format!(
                    "point {} is narratively before {} but occurs later in time",
                    later.narrative_order, earlier.narrative_order
                ),
            });
        }
    }

    let errors = conflicts.iter().filter(|c| c.severity == Severity::Error).count() as f64;
    let warnings = conflicts.iter().filter(|c| c.severity == Severity::Warning).count() as f64;
    let consistency = 1.0
        - ((errors * ERROR_PENALTY + warnings * WARNING_PENALTY)
            / narrative.len().max(1) as f64)
            .min(1.0);

    debug!(
        points = narrative.len(),
        conflicts = conflicts.len(),
        consistency,
        "timeline composed"
    );
    TimelineOutcome {
        narrative,
        actual,
        conflicts,
        consistency,
    }
}

struct PendingPoint {
    source_kind: PointSource,
    source_id: String,
    label: String,
    initial_order: usize,
    stage: Stage,
    candidate: Option<(DateTime<Utc>, TimeSource)>,
    evidence: Vec<String>,
}

/// 2000-01-01T00:00:00Z, the anchor for fully synthetic timelines.
fn synthetic_epoch() -> DateTime<Utc> {
    DateTime::from_timestamp(946_684_800, 0).unwrap_or(DateTime::UNIX_EPOCH)
}

fn chain_confidence(source: TimeSource) -> f64 {
    match source {
        TimeSource::Explicit => 0.9,
        TimeSource::ParsedExpression => 0.8,
        TimeSource::LinkedBeat => 0.75,
        TimeSource::PreviousPoint => 0.55,
        TimeSource::SyntheticAnchor => 0.5,
    }
}

/// Beat an event point inherits stage and timestamp from: the nearest beat
/// (by order index) among those sharing the event's segment, else the
/// nearest beat overall. Single-segment stories put every beat in the
/// shared set, so proximity decides, not evidence alone.
fn matching_beat<'a>(event: &ExtractedEvent, beats: &'a [StoryBeat]) -> Option<&'a StoryBeat> {
    let nearest =
        |b: &&StoryBeat| (b.order_index.abs_diff(event.narrative_order), b.order_index);
    beats
        .iter()
        .filter(|b| b.evidence_segment_ids.contains(&event.segment_id))
        .min_by_key(nearest)
        .or_else(|| beats.iter().min_by_key(nearest))
}

fn quartile_stage(order: usize, total: usize) -> Stage {
    Stage::from_index((order.saturating_sub(1)) * Stage::ALL.len() / total.max(1))
}

/// Parse `YYYY-MM-DD[ HH:MM]`, RFC 3339, or `at HH:MM` from free text.
/// Bare clock times anchor on the synthetic epoch date.
fn parse_time_expression(text: &str) -> Option<DateTime<Utc>> {
    let tokens: Vec<&str> = text.split_whitespace().collect();
    for (index, raw) in tokens.iter().enumerate() {
        let word = trim_punct(raw);
        if let Ok(parsed) = DateTime::parse_from_rfc3339(word) {
            return Some(parsed.with_timezone(&Utc));
        }
        if let Ok(parsed) = NaiveDateTime::parse_from_str(word, "%Y-%m-%dT%H:%M:%S") {
            return Some(Utc.from_utc_datetime(&parsed));
        }
        if let Ok(parsed) = NaiveDateTime::parse_from_str(word, "%Y-%m-%dT%H:%M") {
            return Some(Utc.from_utc_datetime(&parsed));
        }
        if let Ok(date) = NaiveDate::parse_from_str(word, "%Y-%m-%d") {
            if let Some(time) = tokens
                .get(index + 1)
                .and_then(|next| NaiveTime::parse_from_str(trim_punct(next), "%H:%M").ok())
            {
                return Some(Utc.from_utc_datetime(&date.and_time(time)));
            }
            return Some(Utc.from_utc_datetime(&date.and_time(NaiveTime::MIN)));
        }
        if word.eq_ignore_ascii_case("at") {
            if let Some(time) = tokens
                .get(index + 1)
                .and_then(|next| NaiveTime::parse_from_str(trim_punct(next), "%H:%M").ok())
            {
                return Some(Utc.from_utc_datetime(&synthetic_epoch().date_naive().and_time(time)));
            }
        }
    }
    None
}

fn trim_punct(word: &str) -> &str {
    word.trim_matches(|c: char| ".,;!?()".contains(c))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::contracts::validate_timeline_output;

    fn event(order: usize, summary: &str, time: Option<DateTime<Utc>>) -> ExtractedEvent {
        let segment_id = stable_id("seg", &format!("t:{order}"));
        ExtractedEvent {
            event_id: stable_id("evt", &format!("{segment_id}:{order}")),
            summary: summary.to_string(),
            segment_id: segment_id.clone(),
            narrative_order: order,
            event_time_utc: time,
            entity_names: vec![],
            confidence: ConfidenceScore::new("extract.cue.v2", 0.7),
            provenance: ProvenanceRecord::new(&[segment_id], "event_extractor", Utc::now()),
        }
    }

    fn utc(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    #[test]
    fn prose_story_infers_all_times_with_warnings() {
        let events = vec![
            event(1, "The story opens quietly", None),
            event(2, "Pressure builds in the hall", None),
            event(3, "Everything comes to a head", None),
            event(4, "The dust settles at last", None),
        ];
        let outcome = compose_timeline(&events, &[], Utc::now());
        assert_eq!(outcome.narrative.len(), 4);
        validate_timeline_output(&outcome.narrative).unwrap();
        assert_eq!(outcome.narrative[0].time_source, TimeSource::SyntheticAnchor);
        for point in &outcome.narrative[1..] {
            assert_eq!(point.time_source, TimeSource::PreviousPoint);
        }
        let warnings = outcome
            .conflicts
            .iter()
            .filter(|c| c.code == "timeline_missing_time")
            .count();
        assert_eq!(warnings, 4);
        // 1 - (4 * 0.35) / 4
        assert!((outcome.consistency - 0.65).abs() < 1e-9);
    }

    #[test]
    fn contradictory_explicit_times_raise_chronology_conflict() {
        let events = vec![
            event(1, "Second thing recorded first", Some(utc("2024-03-01T10:00:00Z"))),
            event(2, "First thing recorded second", Some(utc("2024-03-01T08:00:00Z"))),
        ];
        let outcome = compose_timeline(&events, &[], Utc::now());
        assert!(outcome
            .conflicts
            .iter()
            .any(|c| c.code == "chronology_order_conflict" && c.severity == Severity::Error));
        assert!(outcome.consistency < 1.0);
        // Actual view reorders by time regardless of narrative order.
        assert_eq!(outcome.actual[0].narrative_order, 2);
    }

    #[test]
    fn parsed_date_expression_resolves_point() {
        let events = vec![event(1, "The siege began on 2024-03-01 at dawn", None)];
        let outcome = compose_timeline(&events, &[], Utc::now());
        assert_eq!(outcome.narrative[0].time_source, TimeSource::ParsedExpression);
        assert_eq!(
            outcome.narrative[0].actual_time_utc,
            Some(utc("2024-03-01T00:00:00Z"))
        );
    }

    #[test]
    fn bare_clock_time_anchors_on_epoch_date() {
        let parsed = parse_time_expression("They met at 14:30 in the square").unwrap();
        assert_eq!(parsed, utc("2000-01-01T14:30:00Z"));
    }

    #[test]
    fn beat_points_interleave_and_renumber_contiguously() {
        let events = vec![
            event(1, "Rhea enters the archive", None),
            event(2, "The council denies her claim", None),
        ];
        let beats = vec![StoryBeat {
            beat_id: stable_id("beat", "b1"),
            stage: Stage::Setup,
            order_index: 1,
            summary: "Rhea enters the archive".to_string(),
            timestamp_utc: Some(utc("2024-03-01T09:00:00Z")),
            evidence_segment_ids: vec![events[0].segment_id.clone()],
            confidence: ConfidenceScore::new("beat.blend.v2", 0.7),
            provenance: ProvenanceRecord::new(
                &[events[0].segment_id.clone()],
                "beat_detector",
                Utc::now(),
            ),
        }];
        let outcome = compose_timeline(&events, &beats, Utc::now());
        assert_eq!(outcome.narrative.len(), 3);
        validate_timeline_output(&outcome.narrative).unwrap();
        // Event linked to the beat inherits its timestamp.
        let linked = outcome
            .narrative
            .iter()
            .find(|p| p.source_kind == PointSource::Event && p.source_id == events[0].event_id)
            .unwrap();
        assert_eq!(linked.time_source, TimeSource::LinkedBeat);
        assert_eq!(linked.stage, Stage::Setup);
    }

    #[test]
    fn single_segment_events_inherit_their_nearest_beat_stage() {
        // Every beat cites the same segment, so evidence alone cannot pick;
        // each event must land on the beat at its own order index.
        let shared_segment = stable_id("seg", "single:1");
        let events: Vec<ExtractedEvent> = (1..=4)
            .map(|order| {
                let mut e = event(order, "Something happens in the archive", None);
                e.segment_id = shared_segment.clone();
                e
            })
            .collect();
        let beats: Vec<StoryBeat> = Stage::ALL
            .iter()
            .enumerate()
            .map(|(index, stage)| StoryBeat {
                beat_id: stable_id("beat", &format!("shared:{}", index + 1)),
                stage: *stage,
                order_index: index + 1,
                summary: "Something happens in the archive".to_string(),
                timestamp_utc: None,
                evidence_segment_ids: vec![shared_segment.clone()],
                confidence: ConfidenceScore::new("beat.blend.v2", 0.7),
                provenance: ProvenanceRecord::new(
                    &[shared_segment.clone()],
                    "beat_detector",
                    Utc::now(),
                ),
            })
            .collect();
        let outcome = compose_timeline(&events, &beats, Utc::now());
        for (index, original) in events.iter().enumerate() {
            let point = outcome
                .narrative
                .iter()
                .find(|p| p.source_kind == PointSource::Event && p.source_id == original.event_id)
                .unwrap();
            assert_eq!(point.stage, Stage::ALL[index]);
        }
    }

    #[test]
    fn one_misplaced_point_yields_one_chronology_conflict() {
        // Narrative order 1..4 with times 10:00, 08:00, 11:00, 09:00. In the
        // actual-time view only one adjacent pair runs backwards.
        let events = vec![
            event(1, "First told", Some(utc("2024-03-01T10:00:00Z"))),
            event(2, "Second told", Some(utc("2024-03-01T08:00:00Z"))),
            event(3, "Third told", Some(utc("2024-03-01T11:00:00Z"))),
            event(4, "Fourth told", Some(utc("2024-03-01T09:00:00Z"))),
        ];
        let outcome = compose_timeline(&events, &[], Utc::now());
        let errors: Vec<&TimelineConflict> = outcome
            .conflicts
            .iter()
            .filter(|c| c.code == "chronology_order_conflict")
            .collect();
        assert_eq!(errors.len(), 1);
        let orders: Vec<usize> = outcome.actual.iter().map(|p| p.narrative_order).collect();
        assert_eq!(orders, vec![2, 4, 1, 3]);
        // 1 - (1 * 1.2) / 4
        assert!((outcome.consistency - 0.7).abs() < 1e-9);
    }

    #[test]
    fn timeline_is_deterministic() {
        let events = vec![
            event(1, "Opening move", None),
            event(2, "Counter move", None),
        ];
        let now = Utc::now();
        let first = compose_timeline(&events, &[], now);
        let second = compose_timeline(&events, &[], now);
        assert_eq!(first.narrative, second.narrative);
        assert_eq!(first.actual, second.actual);
    }
}
