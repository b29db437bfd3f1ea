/// Cue-term tables, theme vocabulary, language markers, and fallback
/// translation lexicons backing every heuristic scorer in the pipeline.
///
/// The embedded defaults are hand-tuned against the scenario tests; callers
/// can override the whole table set from a RON file, the same way genre
/// grammar data is loaded elsewhere in this codebase family.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

use crate::schema::Stage;

#[derive(Debug, Error)]
pub enum LexiconError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("RON deserialization error: {0}")]
    Ron(#[from] ron::error::SpannedError),
}

/// All heuristic word tables used by the pipeline, as one replaceable value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CueLexicon {
    /// Salience cues for event-sentence scoring: `(term, weight)`.
    pub event_cues: Vec<(String, f64)>,
    pub setup_cues: Vec<(String, f64)>,
    pub escalation_cues: Vec<(String, f64)>,
    pub climax_cues: Vec<(String, f64)>,
    pub resolution_cues: Vec<(String, f64)>,
    /// Theme label to weighted term list.
    pub theme_vocabulary: Vec<(String, Vec<(String, f64)>)>,
    pub conflict_cues: Vec<String>,
    pub relief_cues: Vec<String>,
    pub positive_words: Vec<String>,
    pub negative_words: Vec<String>,
    /// Seed gazetteer: `(entity name, kind)` with kinds from `EntityKind`.
    pub entity_seed: Vec<(String, String)>,
    /// Language code to lexical marker set for detection voting.
    pub language_markers: Vec<(String, Vec<String>)>,
    /// Language code to `(source term, target term)` substitution pairs.
    pub translation_lexicons: Vec<(String, Vec<(String, String)>)>,
}

impl CueLexicon {
    pub fn stage_cues(&self, stage: Stage) -> &[(String, f64)] {
        match stage {
            Stage::Setup => &self.setup_cues,
            Stage::Escalation => &self.escalation_cues,
            Stage::Climax => &self.climax_cues,
            Stage::Resolution => &self.resolution_cues,
        }
    }

    pub fn translation_lexicon(&self, code: &str) -> Option<&[(String, String)]> {
        self.translation_lexicons
            .iter()
            .find(|(lang, _)| lang == code)
            .map(|(_, pairs)| pairs.as_slice())
    }

    /// Load a full lexicon override from a RON file.
    pub fn load_from_ron(path: &Path) -> Result<CueLexicon, LexiconError> {
        let contents = std::fs::read_to_string(path)?;
        Ok(Self::parse_ron(&contents)?)
    }

    pub fn parse_ron(contents: &str) -> Result<CueLexicon, ron::error::SpannedError> {
        ron::from_str(contents)
    }
}

impl Default for CueLexicon {
    fn default() -> Self {
        Self {
            event_cues: weighted(&[
                ("conflict", 1.4),
                ("confronts", 1.5),
                ("erupts", 1.4),
                ("discovers", 1.3),
                ("finds", 1.2),
                ("reveals", 1.3),
                ("denies", 1.2),
                ("accepts", 1.2),
                ("betrays", 1.4),
                ("escapes", 1.3),
                ("decides", 1.1),
                ("arrives", 1.0),
                ("dies", 1.5),
                ("fights", 1.4),
                ("heals", 1.1),
                ("returns", 1.0),
                ("begins", 0.9),
                ("ends", 0.9),
            ]),
            setup_cues: weighted(&[
                ("enters", 1.2),
                ("arrives", 1.2),
                ("begins", 1.0),
                ("opens", 1.0),
                ("introduces", 1.0),
                ("discovers", 1.1),
                ("finds", 1.2),
                ("meets", 1.0),
                ("once", 0.8),
                ("morning", 0.8),
            ]),
            escalation_cues: weighted(&[
                ("conflict", 1.2),
                ("erupts", 1.4),
                ("denies", 1.2),
                ("refuses", 1.2),
                ("tension", 1.2),
                ("argues", 1.1),
                ("threatens", 1.3),
                ("struggles", 1.1),
                ("worsens", 1.2),
                ("rises", 1.0),
                ("against", 0.8),
            ]),
            climax_cues: weighted(&[
                ("confronts", 1.5),
                ("confrontation", 1.5),
                ("showdown", 1.5),
                ("clash", 1.3),
                ("battle", 1.3),
                ("crisis", 1.3),
                ("breaks", 1.1),
                ("faces", 1.1),
                ("peak", 1.0),
                ("finally", 0.9),
            ]),
            resolution_cues: weighted(&[
                ("accepts", 1.2),
                ("heal", 1.2),
                ("heals", 1.2),
                ("resolves", 1.3),
                ("resolved", 1.3),
                ("reconciles", 1.2),
                ("settles", 1.1),
                ("peace", 1.1),
                ("aftermath", 1.0),
                ("ends", 1.0),
                ("truth", 0.8),
            ]),
            theme_vocabulary: vec![
                (
                    "memory".to_string(),
                    weighted(&[
                        ("memory", 1.2),
                        ("remember", 1.0),
                        ("archive", 1.0),
                        ("ledger", 1.0),
                        ("records", 1.0),
                        ("history", 0.8),
                    ]),
                ),
                (
                    "conflict".to_string(),
                    weighted(&[
                        ("conflict", 1.2),
                        ("war", 1.2),
                        ("battle", 1.0),
                        ("fight", 1.0),
                        ("struggle", 1.0),
                    ]),
                ),
                (
                    "identity".to_string(),
                    weighted(&[
                        ("identity", 1.2),
                        ("origin", 1.0),
                        ("belonging", 1.0),
                        ("name", 0.8),
                        ("self", 0.8),
                    ]),
                ),
                (
                    "trust".to_string(),
                    weighted(&[
                        ("trust", 1.2),
                        ("betray", 1.2),
                        ("truth", 1.0),
                        ("loyal", 1.0),
                        ("honest", 0.8),
                    ]),
                ),
            ],
            conflict_cues: words(&[
                "conflict", "war", "battle", "fight", "denies", "refuses", "threat", "anger",
                "clash",
            ]),
            relief_cues: words(&[
                "peace", "accepts", "heals", "resolved", "reconciles", "calm", "truce",
            ]),
            positive_words: words(&[
                "hope", "trust", "healed", "heal", "resolved", "love", "calm", "peace", "joy",
            ]),
            negative_words: words(&[
                "fear", "betray", "war", "loss", "anger", "conflict", "dread", "grief",
            ]),
            entity_seed: vec![
                ("council".to_string(), "organization".to_string()),
                ("guild".to_string(), "organization".to_string()),
                ("archive".to_string(), "location".to_string()),
                ("city".to_string(), "location".to_string()),
                ("hall".to_string(), "location".to_string()),
                ("temple".to_string(), "location".to_string()),
                ("ledger".to_string(), "concept".to_string()),
                ("truth".to_string(), "concept".to_string()),
            ],
            language_markers: vec![
                (
                    "en".to_string(),
                    words(&["the", "and", "story", "memory", "council", "archive", "when", "truth"]),
                ),
                (
                    "es".to_string(),
                    words(&[
                        "el", "la", "los", "las", "que", "una", "pero", "porque", "historia",
                        "cuando", "familia", "memoria",
                    ]),
                ),
                (
                    "fr".to_string(),
                    words(&[
                        "le", "la", "les", "une", "des", "dans", "avec", "histoire", "quand",
                        "pourquoi", "famille", "memoire",
                    ]),
                ),
            ],
            translation_lexicons: vec![
                (
                    "es".to_string(),
                    pairs(&[
                        ("historia", "story"),
                        ("familia", "family"),
                        ("conflicto", "conflict"),
                        ("amor", "love"),
                        ("guerra", "war"),
                        ("memoria", "memory"),
                        ("consejo", "council"),
                        ("archivo", "archive"),
                        ("verdad", "truth"),
                        ("cambia", "changes"),
                        ("encuentran", "find"),
                        ("perdida", "lost"),
                        ("cuando", "when"),
                    ]),
                ),
                (
                    "fr".to_string(),
                    pairs(&[
                        ("histoire", "story"),
                        ("famille", "family"),
                        ("conflit", "conflict"),
                        ("amour", "love"),
                        ("guerre", "war"),
                        ("memoire", "memory"),
                        ("conseil", "council"),
                        ("verite", "truth"),
                    ]),
                ),
            ],
        }
    }
}

/// Lowercased word tokens: alphabetic runs, apostrophes kept inside words.
pub fn tokenize(text: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    for ch in text.chars() {
        if ch.is_alphabetic() || (ch == '\'' && !current.is_empty()) {
            current.extend(ch.to_lowercase());
        } else if !current.is_empty() {
            tokens.push(std::mem::take(&mut current));
        }
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    // Trailing apostrophes from possessives ("family's" keeps the s,
    // "heroes'" drops the mark).
    for token in &mut tokens {
        while token.ends_with('\'') {
            token.pop();
        }
    }
    tokens
}

fn weighted(entries: &[(&str, f64)]) -> Vec<(String, f64)> {
    entries
        .iter()
        .map(|(term, weight)| (term.to_string(), *weight))
        .collect()
}

fn words(entries: &[&str]) -> Vec<String> {
    entries.iter().map(|word| word.to_string()).collect()
}

fn pairs(entries: &[(&str, &str)]) -> Vec<(String, String)> {
    entries
        .iter()
        .map(|(from, to)| (from.to_string(), to.to_string()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokenize_lowercases_and_splits() {
        assert_eq!(
            tokenize("Rhea finds her family's ledger!"),
            vec!["rhea", "finds", "her", "family's", "ledger"]
        );
    }

    #[test]
    fn tokenize_handles_empty_and_digits() {
        assert!(tokenize("1234 --- !!").is_empty());
    }

    #[test]
    fn stage_cues_cover_all_stages() {
        let lexicon = CueLexicon::default();
        for stage in Stage::ALL {
            assert!(!lexicon.stage_cues(stage).is_empty());
        }
    }

    #[test]
    fn marker_sets_present_for_supported_languages() {
        let lexicon = CueLexicon::default();
        for code in ["en", "es", "fr"] {
            assert!(lexicon
                .language_markers
                .iter()
                .any(|(lang, markers)| lang == code && !markers.is_empty()));
        }
        assert!(!lexicon.language_markers.iter().any(|(lang, _)| lang == "de"));
    }

    #[test]
    fn lexicon_round_trips_through_ron() {
        let lexicon = CueLexicon::default();
        let encoded = ron::to_string(&lexicon).unwrap();
        let decoded = CueLexicon::parse_ron(&encoded).unwrap();
        assert_eq!(lexicon, decoded);
    }
}
