//! Note quality rating.
//!
//! - `parse`: tagged parser for free-form rating responses
//! - `rater`: prompt and provider call

mod parse;
mod rater;

pub use rater::{QualityRater, RateError};

use serde::Serialize;

use crate::markdown::SectionKind;

/// Score and feedback for one note.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QualityRecord {
    /// 1..=10
    pub score: u8,
    pub feedback: String,
}

impl QualityRecord {
    /// Body of the note-quality section.
    pub fn render_section(&self) -> String {
        format!(
            "### Note Quality\n**Score:** {}/10\n\n{}\n",
            self.score,
            strip_markers(self.feedback.trim())
        )
    }
}

/// Model output must never be able to close or open a generated section.
pub(crate) fn strip_markers(text: &str) -> String {
    SectionKind::ALL.iter().fold(text.to_string(), |acc, kind| {
        acc.replace(kind.start_marker(), "")
            .replace(kind.end_marker(), "")
    })
}
