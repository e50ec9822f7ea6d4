use std::sync::Arc;

use crate::note::NoteId;
use crate::provider::{CompletionProvider, ProviderError};
use crate::retry::RetryPolicy;
use crate::semantic::truncate_content;

use super::parse::{parse_rating, RatingParse};
use super::QualityRecord;

#[derive(Debug, thiserror::Error)]
pub enum RateError {
    #[error("rating request failed: {0}")]
    Provider(#[from] ProviderError),

    #[error("no score in 1..=10 found in response: {raw:?}")]
    Unparseable { raw: String },
}

/// Instruction sent ahead of the note text.
pub fn build_prompt(text: &str) -> String {
    format!(
        r#"You review Markdown notes from a personal knowledge base.
Rate the note below from 1 (poor) to 10 (excellent), judging how dense and
how complete its information is. Then give exactly one concrete suggestion
that would improve it.

Answer with a single JSON object and nothing else:
{{"rating": <integer 1-10>, "feedback": "<one suggestion>"}}

Note:
---
{text}
---
"#
    )
}

/// Asks the completion model for a score and feedback.
pub struct QualityRater {
    provider: Arc<dyn CompletionProvider>,
    retry: RetryPolicy,
    max_input_chars: usize,
}

impl QualityRater {
    pub fn new(provider: Arc<dyn CompletionProvider>, retry: RetryPolicy, max_input_chars: usize) -> Self {
        Self {
            provider,
            retry,
            max_input_chars,
        }
    }

    pub fn model(&self) -> &str {
        self.provider.model()
    }

    /// Rate one note body. Unparseable answers are an error, never a
    /// default score.
    pub fn rate(&self, note: &NoteId, text: &str) -> Result<QualityRecord, RateError> {
        let prompt = build_prompt(&truncate_content(text.trim(), self.max_input_chars));
        let what = format!("rate {note}");
        let response = self.retry.run(&what, || self.provider.generate(&prompt))?;

        match parse_rating(&response) {
            RatingParse::Parsed {
                score,
                feedback,
                clamped_from,
            } => {
                if let Some(value) = clamped_from {
                    log::warn!("{note}: provider returned out-of-range score {value}, clamped to {score}");
                }
                log::debug!("{note}: rated {score}/10");
                Ok(QualityRecord { score, feedback })
            }
            RatingParse::Unparseable { raw } => Err(RateError::Unparseable { raw }),
        }
    }
}
