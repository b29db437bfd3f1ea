/// Language detection and translation with provider-chain fallback.
///
/// Detection is script-based first (CJK ratio), then lexical marker overlap
/// with a majority vote across segments. Translation runs a closed set of
/// backend strategies behind a bounded retry loop; every candidate is
/// checked by a "looks untranslated" heuristic before it is accepted, and
/// the lexicon fallback keeps the stage from ever failing outright.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::core::lexicon::{tokenize, CueLexicon};
use crate::schema::{PipelineIssue, Segment, Severity};

/// Fixed attempt count for the primary backend before the chain moves on.
const TRANSLATION_ATTEMPTS: u32 = 2;

/// Translation backend strategies. A closed set selected by caller
/// configuration; `Failing` exists for fault-injection in tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TranslationBackend {
    #[default]
    Lexicon,
    Identity,
    Failing,
}

impl TranslationBackend {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Lexicon => "lexicon.v2",
            Self::Identity => "identity.v1",
            Self::Failing => "failing.v1",
        }
    }
}

#[derive(Debug, Error)]
#[error("translation provider failed: {0}")]
pub struct TranslationProviderError(String);

/// Language metadata for one segment or document.
#[derive(Debug, Clone, PartialEq)]
pub struct LanguageDetection {
    pub language_code: String,
    pub confidence: f64,
}

/// Alignment metadata between one source segment and its translation.
/// Offsets are in characters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentAlignment {
    pub source_segment_id: String,
    pub source_offsets: (usize, usize),
    pub target_offsets: (usize, usize),
    pub method: String,
    pub quality_score: f64,
}

/// Output of the translation stage.
#[derive(Debug, Clone)]
pub struct TranslationOutcome {
    pub segments: Vec<Segment>,
    pub alignments: Vec<SegmentAlignment>,
    pub source_language: String,
    pub issues: Vec<PipelineIssue>,
}

/// Detect a text's language from script and lexical markers.
pub fn detect_language(text: &str, lexicon: &CueLexicon) -> LanguageDetection {
    let cjk = text.chars().filter(|c| is_cjk(*c)).count();
    let latin = text.chars().filter(|c| c.is_ascii_alphabetic()).count();
    if cjk >= 4 && cjk >= latin {
        let confidence = (0.82 + cjk as f64 / text.chars().count().max(1) as f64 * 0.18).min(1.0);
        return LanguageDetection {
            language_code: "ja".to_string(),
            confidence,
        };
    }

    let tokens = tokenize(text);
    if tokens.is_empty() {
        return LanguageDetection {
            language_code: "und".to_string(),
            confidence: 0.0,
        };
    }

    let mut scores: Vec<(&str, f64)> = lexicon
        .language_markers
        .iter()
        .map(|(code, markers)| {
            let hits = tokens.iter().filter(|t| markers.contains(t)).count();
            (code.as_str(), hits as f64 / tokens.len() as f64)
        })
        .collect();
    scores.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal).then(a.0.cmp(b.0)));

    let (top_code, top_score) = scores.first().map(|(c, s)| (*c, *s)).unwrap_or(("en", 0.0));
    if top_score <= 0.0 {
        return LanguageDetection {
            language_code: "en".to_string(),
            confidence: 0.62,
        };
    }
    let runner_up = scores.get(1).map(|(_, s)| *s).unwrap_or(0.0);
    let margin = (top_score - runner_up).max(0.0);
    LanguageDetection {
        language_code: top_code.to_string(),
        confidence: (0.58 + top_score * 0.22 + margin * 0.25).min(0.98),
    }
}

/// Translate segments into the target language. Each segment records its
/// detected language; the run's source language is the per-segment majority.
pub fn translate_segments(
    segments: &[Segment],
    target_language: &str,
    backend: TranslationBackend,
    lexicon: &CueLexicon,
) -> TranslationOutcome {
    let mut out_segments = Vec::with_capacity(segments.len());
    let mut alignments = Vec::with_capacity(segments.len());
    let mut detected_codes = Vec::with_capacity(segments.len());
    let mut issues = Vec::new();

    for segment in segments {
        let detected = detect_language(&segment.normalized_text, lexicon);
        detected_codes.push(detected.language_code.clone());

        let translated = translate_one(
            &segment.normalized_text,
            &detected.language_code,
            target_language,
            backend,
            lexicon,
            &segment.segment_id,
            &mut issues,
        );

        alignments.push(SegmentAlignment {
            source_segment_id: segment.segment_id.clone(),
            source_offsets: (0, segment.normalized_text.chars().count()),
            target_offsets: (0, translated.text.chars().count()),
            method: translated.method,
            quality_score: translated.quality,
        });

        let mut updated = segment.clone();
        updated.language_code = detected.language_code;
        updated.translated_text = Some(translated.text);
        out_segments.push(updated);
    }

    let source_language = majority_language(&detected_codes);
    debug!(
        source_language = %source_language,
        degraded = issues.iter().filter(|i| i.code == "translation_provider_fallback_used").count(),
        "translation complete"
    );
    TranslationOutcome {
        segments: out_segments,
        alignments,
        source_language,
        issues,
    }
}

struct TranslatedText {
    text: String,
    method: String,
    quality: f64,
}

fn translate_one(
    text: &str,
    source_language: &str,
    target_language: &str,
    backend: TranslationBackend,
    lexicon: &CueLexicon,
    segment_id: &str,
    issues: &mut Vec<PipelineIssue>,
) -> TranslatedText {
    if source_language == target_language || source_language == "und" {
        return TranslatedText {
            text: text.to_string(),
            method: backend.name().to_string(),
            quality: 1.0,
        };
    }

    for attempt in 1..=TRANSLATION_ATTEMPTS {
        match run_backend(backend, text, source_language, target_language, lexicon) {
            Ok(candidate) if !looks_untranslated(&candidate, text, source_language) => {
                return TranslatedText {
                    quality: provider_quality(text, &candidate, source_language, lexicon),
                    text: candidate,
                    method: backend.name().to_string(),
                };
            }
            Ok(_) => {
                issues.push(
                    PipelineIssue::new(
                        "translation_provider_attempt_failed",
                        Severity::Warning,
                        format!(
                            "provider '{}' returned text that looks untranslated",
                            backend.name()
                        ),
                    )
                    .for_segment(segment_id)
                    .on_attempt(attempt),
                );
            }
            Err(error) => {
                issues.push(
                    PipelineIssue::new(
                        "translation_provider_attempt_failed",
                        Severity::Warning,
                        error.to_string(),
                    )
                    .for_segment(segment_id)
                    .on_attempt(attempt),
                );
            }
        }
    }

    warn!(segment_id, provider = backend.name(), "translation fell back to lexicon substitution");
    let fallback = lexicon_substitute(text, source_language, target_language, lexicon);
    issues.push(
        PipelineIssue::new(
            "translation_provider_fallback_used",
            Severity::Error,
            format!(
                "provider '{}' failed after {TRANSLATION_ATTEMPTS} attempts; lexicon fallback applied",
                backend.name()
            ),
        )
        .for_segment(segment_id),
    );
    let quality = if fallback == text { 0.32 } else { 0.52 };
    TranslatedText {
        text: fallback,
        method: "fallback.lexicon.v1".to_string(),
        quality,
    }
}

fn run_backend(
    backend: TranslationBackend,
    text: &str,
    source_language: &str,
    target_language: &str,
    lexicon: &CueLexicon,
) -> Result<String, TranslationProviderError> {
    match backend {
        TranslationBackend::Lexicon => Ok(lexicon_substitute(
            text,
            source_language,
            target_language,
            lexicon,
        )),
        TranslationBackend::Identity => Ok(text.to_string()),
        TranslationBackend::Failing => Err(TranslationProviderError(
            "configured failing provider always raises".to_string(),
        )),
    }
}

/// Heuristic acceptance check for a translation candidate. CJK sources must
/// shed most of their script; latin sources must at least change the text.
fn looks_untranslated(candidate: &str, source_text: &str, source_language: &str) -> bool {
    if source_language == "ja" || source_language == "zh" {
        let total = candidate.chars().count().max(1);
        let residual = candidate.chars().filter(|c| is_cjk(*c)).count();
        return residual as f64 / total as f64 >= 0.3;
    }
    candidate.trim() == source_text.trim()
}

fn provider_quality(
    source_text: &str,
    translated_text: &str,
    source_language: &str,
    lexicon: &CueLexicon,
) -> f64 {
    if translated_text == source_text {
        return 0.35;
    }
    let Some(pairs) = lexicon.translation_lexicon(source_language) else {
        return 0.76;
    };
    let tokens = tokenize(source_text);
    if tokens.is_empty() {
        return 0.42;
    }
    let replaced = tokens
        .iter()
        .filter(|t| pairs.iter().any(|(from, _)| from == *t))
        .count();
    let coverage = replaced as f64 / tokens.len() as f64;
    if coverage <= 0.0 {
        return 0.42;
    }
    let edit_ratio = token_edit_ratio(source_text, translated_text);
    (0.7 + coverage * 0.2 + (edit_ratio * 0.1).min(0.08)).clamp(0.78, 0.98)
}

fn token_edit_ratio(source_text: &str, translated_text: &str) -> f64 {
    let source = tokenize(source_text);
    let translated = tokenize(translated_text);
    if source.is_empty() {
        return 0.0;
    }
    let total = source.len().max(translated.len());
    let changes = (0..total)
        .filter(|&i| source.get(i) != translated.get(i))
        .count();
    changes as f64 / total as f64
}

/// Word-for-word lexicon substitution, preserving unknown words as-is.
fn lexicon_substitute(
    text: &str,
    source_language: &str,
    target_language: &str,
    lexicon: &CueLexicon,
) -> String {
    if target_language != "en" {
        return text.to_string();
    }
    let Some(pairs) = lexicon.translation_lexicon(source_language) else {
        return text.to_string();
    };
    text.split_whitespace()
        .map(|word| {
            let cleaned: String = word
                .trim_matches(|c: char| ".,!?;:()[]{}\"'".contains(c))
                .to_lowercase();
            pairs
                .iter()
                .find(|(from, _)| *from == cleaned)
                .map(|(_, to)| to.clone())
                .unwrap_or_else(|| word.to_string())
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn majority_language(codes: &[String]) -> String {
    if codes.is_empty() {
        return "und".to_string();
    }
    let mut counts: Vec<(String, usize)> = Vec::new();
    for code in codes {
        match counts.iter_mut().find(|(c, _)| c == code) {
            Some((_, n)) => *n += 1,
            None => counts.push((code.clone(), 1)),
        }
    }
    counts.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
    counts[0].0.clone()
}

fn is_cjk(c: char) -> bool {
    matches!(c, '\u{3040}'..='\u{30ff}' | '\u{4e00}'..='\u{9fff}')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{stable_id, SourceKind};

    fn segment(text: &str) -> Segment {
        Segment {
            segment_id: stable_id("seg", text),
            source_kind: SourceKind::Text,
            original_text: text.to_string(),
            normalized_text: text.to_string(),
            language_code: "und".to_string(),
            translated_text: None,
            segment_index: 1,
            char_start: 0,
            char_end: text.chars().count().max(1),
        }
    }

    #[test]
    fn detects_spanish_from_markers() {
        let lexicon = CueLexicon::default();
        let detected = detect_language(
            "La historia de una familia cambia cuando encuentran la memoria perdida.",
            &lexicon,
        );
        assert_eq!(detected.language_code, "es");
        assert!(detected.confidence > 0.58);
    }

    #[test]
    fn detects_english_by_default() {
        let lexicon = CueLexicon::default();
        let detected = detect_language("Nothing matches whatsoever here.", &lexicon);
        assert_eq!(detected.language_code, "en");
    }

    #[test]
    fn detects_japanese_from_script() {
        let lexicon = CueLexicon::default();
        let detected = detect_language("物語は家族の記憶とともに変わる", &lexicon);
        assert_eq!(detected.language_code, "ja");
        assert!(detected.confidence >= 0.82);
    }

    #[test]
    fn spanish_segment_translates_to_english_tokens() {
        let lexicon = CueLexicon::default();
        let segments = vec![segment(
            "La historia de una familia cambia cuando encuentran la memoria perdida.",
        )];
        let outcome = translate_segments(&segments, "en", TranslationBackend::Lexicon, &lexicon);
        assert_eq!(outcome.source_language, "es");
        let translated = outcome.segments[0].translated_text.as_deref().unwrap();
        assert!(translated.contains("story"), "got: {translated}");
        assert!(outcome.issues.is_empty());
        assert!(outcome.alignments[0].quality_score >= 0.78);
    }

    #[test]
    fn failing_backend_degrades_to_lexicon_fallback() {
        let lexicon = CueLexicon::default();
        let segments = vec![segment("La historia de la familia y la memoria.")];
        let outcome = translate_segments(&segments, "en", TranslationBackend::Failing, &lexicon);
        let translated = outcome.segments[0].translated_text.as_deref().unwrap();
        assert!(translated.contains("story"));
        let attempts = outcome
            .issues
            .iter()
            .filter(|i| i.code == "translation_provider_attempt_failed")
            .count();
        assert_eq!(attempts as u32, TRANSLATION_ATTEMPTS);
        assert!(outcome
            .issues
            .iter()
            .any(|i| i.code == "translation_provider_fallback_used"));
        assert_eq!(outcome.alignments[0].method, "fallback.lexicon.v1");
    }

    #[test]
    fn same_language_passes_through_at_full_quality() {
        let lexicon = CueLexicon::default();
        let segments = vec![segment("The council and the archive hold the truth.")];
        let outcome = translate_segments(&segments, "en", TranslationBackend::Lexicon, &lexicon);
        assert_eq!(outcome.source_language, "en");
        assert_eq!(outcome.alignments[0].quality_score, 1.0);
        assert_eq!(
            outcome.segments[0].translated_text.as_deref(),
            Some("The council and the archive hold the truth.")
        );
    }

    #[test]
    fn translation_is_deterministic() {
        let lexicon = CueLexicon::default();
        let segments = vec![segment("La historia de una familia.")];
        let first = translate_segments(&segments, "en", TranslationBackend::Lexicon, &lexicon);
        let second = translate_segments(&segments, "en", TranslationBackend::Lexicon, &lexicon);
        assert_eq!(first.segments, second.segments);
        assert_eq!(first.alignments, second.alignments);
    }
}
