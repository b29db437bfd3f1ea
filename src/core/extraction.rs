/// Event and entity extraction.
///
/// The cue-weighted backend splits each segment into sentences and emits one
/// event per usable sentence, scored against the event cue table. Entity
/// mentions come from a capitalization heuristic plus the seed gazetteer.
/// The `Failing` backend exists for fault injection: it forces the stage
/// into its first-sentence fallback, which keeps the run alive at a
/// confidence low enough for the quality gate to notice.

use chrono::{DateTime, Utc};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::core::lexicon::{tokenize, CueLexicon};
use crate::schema::{
    stable_id, ConfidenceScore, EntityKind, EntityMention, ExtractedEvent, PipelineIssue,
    ProvenanceRecord, Segment, Severity,
};

/// Extraction backend strategies, selected by caller configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtractionBackend {
    #[default]
    CueWeighted,
    Failing,
}

impl ExtractionBackend {
    pub fn name(&self) -> &'static str {
        match self {
            Self::CueWeighted => "cue_weighted.v2",
            Self::Failing => "failing.v1",
        }
    }
}

/// Output of the extraction stage.
#[derive(Debug, Clone)]
pub struct ExtractionOutcome {
    pub events: Vec<ExtractedEvent>,
    pub entities: Vec<EntityMention>,
    pub issues: Vec<PipelineIssue>,
}

/// Words never treated as entity names despite initial capitals.
const ENTITY_STOPWORDS: &[&str] = &[
    "the", "a", "an", "and", "but", "or", "when", "then", "after", "before", "at", "in", "on",
    "by", "with", "for", "she", "he", "it", "they", "her", "his", "its", "their", "this", "that",
    "these", "those", "last", "once", "now", "here", "there", "what", "who", "how", "why",
];

pub fn extract_events(
    segments: &[Segment],
    backend: ExtractionBackend,
    lexicon: &CueLexicon,
    created_at: DateTime<Utc>,
) -> ExtractionOutcome {
    let mut issues = Vec::new();
    let mut events = match backend {
        ExtractionBackend::CueWeighted => cue_weighted_events(segments, lexicon, created_at),
        ExtractionBackend::Failing => {
            warn!(provider = backend.name(), "extraction provider failed, using first-sentence fallback");
            issues.push(PipelineIssue::new(
                "extraction_provider_failed",
                Severity::Error,
                format!("provider '{}' raised; no cue-weighted events available", backend.name()),
            ));
            issues.push(PipelineIssue::new(
                "extraction_fallback_used",
                Severity::Warning,
                "first-sentence fallback extraction applied to all segments",
            ));
            fallback_events(segments, created_at)
        }
    };
    for (index, event) in events.iter_mut().enumerate() {
        event.narrative_order = index + 1;
    }

    let entities = extract_entities(segments, lexicon, created_at);
    debug!(
        events = events.len(),
        entities = entities.len(),
        provider = backend.name(),
        "extraction complete"
    );
    ExtractionOutcome {
        events,
        entities,
        issues,
    }
}

fn cue_weighted_events(
    segments: &[Segment],
    lexicon: &CueLexicon,
    created_at: DateTime<Utc>,
) -> Vec<ExtractedEvent> {
    let mut events = Vec::new();
    for segment in segments {
        let text = segment.working_text();
        let mut sentences: Vec<String> = split_sentences(text)
            .into_iter()
            .filter(|s| tokenize(s).len() >= 3)
            .collect();
        if sentences.is_empty() {
            // Degenerate segment: keep one event so the segment stays
            // represented downstream.
            sentences.push(text.trim().to_string());
        }
        for (sentence_index, sentence) in sentences.iter().enumerate() {
            let tokens = tokenize(sentence);
            let cue_weight: f64 = lexicon
                .event_cues
                .iter()
                .filter(|(term, _)| tokens.contains(term))
                .map(|(_, weight)| *weight)
                .sum();
            let cue_strength = (cue_weight / 3.0).min(1.0);
            let named = entity_candidates(sentence);
            let confidence =
                (0.55 + 0.25 * cue_strength + 0.04 * (named.len() as f64).min(3.0)).min(0.92);
            events.push(ExtractedEvent {
                event_id: stable_id("evt", &format!("{}:{}", segment.segment_id, sentence_index)),
                summary: sentence.clone(),
                segment_id: segment.segment_id.clone(),
                narrative_order: 0, // assigned after collection
                event_time_utc: parse_explicit_timestamp(sentence),
                entity_names: named,
                confidence: ConfidenceScore::new("extract.cue.v2", confidence),
                provenance: ProvenanceRecord::new(
                    std::slice::from_ref(&segment.segment_id),
                    "event_extractor",
                    created_at,
                ),
            });
        }
    }
    events
}

fn fallback_events(segments: &[Segment], created_at: DateTime<Utc>) -> Vec<ExtractedEvent> {
    segments
        .iter()
        .map(|segment| {
            let text = segment.working_text();
            let summary = split_sentences(text)
                .into_iter()
                .next()
                .unwrap_or_else(|| text.trim().to_string());
            ExtractedEvent {
                event_id: stable_id("evt", &format!("{}:fallback", segment.segment_id)),
                entity_names: entity_candidates(&summary),
                summary,
                segment_id: segment.segment_id.clone(),
                narrative_order: 0,
                event_time_utc: None,
                confidence: ConfidenceScore::new("extract.fallback.first_sentence", 0.45),
                provenance: ProvenanceRecord::new(
                    std::slice::from_ref(&segment.segment_id),
                    "event_extractor",
                    created_at,
                ),
            }
        })
        .collect()
}

fn extract_entities(
    segments: &[Segment],
    lexicon: &CueLexicon,
    created_at: DateTime<Utc>,
) -> Vec<EntityMention> {
    struct Tally {
        kind: EntityKind,
        count: usize,
        segment_ids: Vec<String>,
    }
    let mut tallies: FxHashMap<String, Tally> = FxHashMap::default();
    for segment in segments {
        let text = segment.working_text();
        let mut names = entity_candidates(text);
        for token in tokenize(text) {
            if lexicon.entity_seed.iter().any(|(name, _)| *name == token) {
                names.push(token);
            }
        }
        for name in names {
            let kind = lexicon
                .entity_seed
                .iter()
                .find(|(seed, _)| *seed == name)
                .map(|(_, kind)| EntityKind::parse(kind))
                .unwrap_or_default();
            let tally = tallies.entry(name).or_insert(Tally {
                kind,
                count: 0,
                segment_ids: Vec::new(),
            });
            tally.count += 1;
            if !tally.segment_ids.contains(&segment.segment_id) {
                tally.segment_ids.push(segment.segment_id.clone());
            }
        }
    }

    let mut entities: Vec<EntityMention> = tallies
        .into_iter()
        .map(|(name, tally)| EntityMention {
            entity_id: stable_id("ent", &name),
            kind: tally.kind,
            mention_count: tally.count,
            confidence: ConfidenceScore::new("extract.rule.v2", 0.68),
            provenance: ProvenanceRecord::new(&tally.segment_ids, "entity_extractor", created_at),
            segment_ids: tally.segment_ids,
            name,
        })
        .collect();
    entities.sort_by(|a, b| a.name.cmp(&b.name));
    entities
}

/// Capitalized alphabetic words (≥3 chars) outside the stopword list,
/// lowercased and deduped in first-seen order.
fn entity_candidates(text: &str) -> Vec<String> {
    let mut names = Vec::new();
    for word in text.split_whitespace() {
        let cleaned = word.trim_matches(|c: char| !c.is_alphabetic());
        if cleaned.chars().count() < 3 || !cleaned.chars().all(|c| c.is_alphabetic()) {
            continue;
        }
        if !cleaned.chars().next().is_some_and(|c| c.is_uppercase()) {
            continue;
        }
        let lowered = cleaned.to_lowercase();
        if ENTITY_STOPWORDS.contains(&lowered.as_str()) || names.contains(&lowered) {
            continue;
        }
        names.push(lowered);
    }
    names
}

/// Sentence split on terminal punctuation, keeping non-empty trimmed bodies.
pub fn split_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut current = String::new();
    for ch in text.chars() {
        if matches!(ch, '.' | '!' | '?') {
            let body = current.trim();
            if !body.is_empty() {
                sentences.push(body.to_string());
            }
            current.clear();
        } else {
            current.push(ch);
        }
    }
    let body = current.trim();
    if !body.is_empty() {
        sentences.push(body.to_string());
    }
    sentences
}

/// Full RFC 3339 timestamps embedded in a sentence count as explicit times.
fn parse_explicit_timestamp(text: &str) -> Option<DateTime<Utc>> {
    for word in text.split_whitespace() {
        let candidate = word.trim_matches(|c: char| ".,;!?()".contains(c));
        if let Ok(parsed) = DateTime::parse_from_rfc3339(candidate) {
            return Some(parsed.with_timezone(&Utc));
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::SourceKind;

    fn segment(index: usize, text: &str) -> Segment {
        Segment {
            segment_id: stable_id("seg", &format!("test:{index}")),
            source_kind: SourceKind::Text,
            original_text: text.to_string(),
            normalized_text: text.to_string(),
            language_code: "en".to_string(),
            translated_text: None,
            segment_index: index,
            char_start: 0,
            char_end: text.chars().count().max(1),
        }
    }

    const RHEA: &str = "Rhea enters the archive and finds her family's ledger. \
        The council denies her claim and tension rises. \
        She confronts the council in the great hall. \
        At last the city heals and accepts the truth.";

    #[test]
    fn one_event_per_sentence() {
        let lexicon = CueLexicon::default();
        let outcome = extract_events(
            &[segment(1, RHEA)],
            ExtractionBackend::CueWeighted,
            &lexicon,
            Utc::now(),
        );
        assert_eq!(outcome.events.len(), 4);
        let orders: Vec<usize> = outcome.events.iter().map(|e| e.narrative_order).collect();
        assert_eq!(orders, vec![1, 2, 3, 4]);
        for event in &outcome.events {
            assert_eq!(event.confidence.method, "extract.cue.v2");
            assert!(event.confidence.score >= 0.55 && event.confidence.score <= 0.92);
        }
        assert!(outcome.issues.is_empty());
    }

    #[test]
    fn entities_include_names_and_gazetteer_hits() {
        let lexicon = CueLexicon::default();
        let outcome = extract_events(
            &[segment(1, RHEA)],
            ExtractionBackend::CueWeighted,
            &lexicon,
            Utc::now(),
        );
        let names: Vec<&str> = outcome.entities.iter().map(|e| e.name.as_str()).collect();
        assert!(names.contains(&"rhea"));
        assert!(names.contains(&"council"));
        assert!(names.contains(&"archive"));
        let council = outcome.entities.iter().find(|e| e.name == "council").unwrap();
        assert_eq!(council.kind, EntityKind::Organization);
        assert!(council.mention_count >= 2);
    }

    #[test]
    fn entities_are_sorted_and_deterministic() {
        let lexicon = CueLexicon::default();
        let segs = [segment(1, RHEA)];
        let first = extract_events(&segs, ExtractionBackend::CueWeighted, &lexicon, Utc::now());
        let names: Vec<&String> = first.entities.iter().map(|e| &e.name).collect();
        let mut sorted = names.clone();
        sorted.sort();
        assert_eq!(names, sorted);
    }

    #[test]
    fn failing_backend_uses_first_sentence_fallback() {
        let lexicon = CueLexicon::default();
        let outcome = extract_events(
            &[segment(1, RHEA)],
            ExtractionBackend::Failing,
            &lexicon,
            Utc::now(),
        );
        assert_eq!(outcome.events.len(), 1);
        let event = &outcome.events[0];
        assert_eq!(event.confidence.method, "extract.fallback.first_sentence");
        assert!(event.confidence.score < 0.52);
        assert!(event.summary.starts_with("Rhea enters"));
        let codes: Vec<&str> = outcome.issues.iter().map(|i| i.code.as_str()).collect();
        assert!(codes.contains(&"extraction_provider_failed"));
        assert!(codes.contains(&"extraction_fallback_used"));
    }

    #[test]
    fn explicit_timestamps_are_parsed() {
        let lexicon = CueLexicon::default();
        let outcome = extract_events(
            &[segment(1, "The siege began at dawn on 2024-03-01T06:00:00Z near the gate.")],
            ExtractionBackend::CueWeighted,
            &lexicon,
            Utc::now(),
        );
        assert!(outcome.events[0].event_time_utc.is_some());
    }

    #[test]
    fn degenerate_segment_still_yields_an_event() {
        let lexicon = CueLexicon::default();
        let outcome = extract_events(
            &[segment(1, "Dawn")],
            ExtractionBackend::CueWeighted,
            &lexicon,
            Utc::now(),
        );
        assert_eq!(outcome.events.len(), 1);
    }

    #[test]
    fn sentence_split_handles_mixed_punctuation() {
        let sentences = split_sentences("One thing happened. Another thing! A third? trailing");
        assert_eq!(sentences.len(), 4);
        assert_eq!(sentences[3], "trailing");
    }
}
