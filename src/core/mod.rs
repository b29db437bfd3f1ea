/// Pipeline stages, each a pure function consuming the prior stage's
/// validated output, wired together by `pipeline::run_story_analysis`.

pub mod beats;
pub mod contracts;
pub mod extraction;
pub mod ingestion;
pub mod insights;
pub mod language;
pub mod lexicon;
pub mod pipeline;
pub mod quality;
pub mod signals;
pub mod timeline;
