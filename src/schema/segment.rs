/// Segment — one normalized, ordered chunk of source text.

use serde::{Deserialize, Serialize};

use super::{check_id, check_max_len, require_non_empty, SchemaError};

/// Kind of raw source the text came from. Unknown kinds degrade to `Text`
/// during ingestion rather than failing the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    #[default]
    Text,
    Document,
    Transcript,
}

impl SourceKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Document => "document",
            Self::Transcript => "transcript",
        }
    }

    /// Parse a caller-supplied kind string. `None` signals an unsupported
    /// kind the ingestion stage should degrade with a warning.
    pub fn parse(value: &str) -> Option<SourceKind> {
        match value.trim().to_lowercase().as_str() {
            "text" => Some(Self::Text),
            "document" => Some(Self::Document),
            "transcript" => Some(Self::Transcript),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub segment_id: String,
    pub source_kind: SourceKind,
    pub original_text: String,
    pub normalized_text: String,
    /// BCP-47-ish language code, `"und"` until detection runs.
    pub language_code: String,
    pub translated_text: Option<String>,
    /// 1..N, contiguous across a run.
    pub segment_index: usize,
    pub char_start: usize,
    pub char_end: usize,
}

impl Segment {
    /// Text downstream stages should read: the translation when present.
    pub fn working_text(&self) -> &str {
        self.translated_text
            .as_deref()
            .unwrap_or(&self.normalized_text)
    }

    pub fn validate(&self) -> Result<(), SchemaError> {
        check_id(&self.segment_id)?;
        require_non_empty(&self.original_text, "segment.original_text")?;
        require_non_empty(&self.normalized_text, "segment.normalized_text")?;
        require_non_empty(&self.language_code, "segment.language_code")?;
        check_max_len(&self.language_code, 16, "segment.language_code")?;
        if self.segment_index == 0 {
            return Err(SchemaError::BelowMinimum {
                field: "segment.segment_index",
                min: 1,
                value: 0,
            });
        }
        if self.char_end <= self.char_start {
            return Err(SchemaError::CharSpan {
                start: self.char_start,
                end: self.char_end,
            });
        }
        Ok(())
    }
}
