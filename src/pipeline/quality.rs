use std::sync::Arc;

use rayon::prelude::*;

use crate::markdown::{rewrite, set_property, SectionKind, QUALITY_PROPERTY};
use crate::note::{Note, NoteId};
use crate::provider::ProviderError;
use crate::quality::{QualityRater, QualityRecord, RateError};
use crate::vault::VaultStore;

use super::{
    extract_all, load_all, progress_bar, worker_pool, write_all, CancelToken, FailureCategory,
    Mode, PipelineError, RunOptions, RunSummary, Stage,
};

/// Apply a rating to a note: the frontmatter property first, then the
/// generated section.
pub(crate) fn apply_rating(raw: &str, record: &QualityRecord) -> Result<String, String> {
    let with_property =
        set_property(raw, QUALITY_PROPERTY, &record.score.to_string()).map_err(|e| e.to_string())?;
    rewrite(&with_property, SectionKind::NoteQuality, &record.render_section()).map_err(|e| e.to_string())
}

/// Rates every note and records the result in the note itself.
pub struct QualityPipeline {
    vault: Arc<dyn VaultStore>,
    rater: QualityRater,
    workers: usize,
}

impl QualityPipeline {
    pub fn new(vault: Arc<dyn VaultStore>, rater: QualityRater, workers: usize) -> Self {
        Self {
            vault,
            rater,
            workers,
        }
    }

    pub fn run(&self, options: &RunOptions, cancel: &CancelToken) -> Result<RunSummary, PipelineError> {
        let _span = tracing::info_span!("quality", model = self.rater.model()).entered();
        let mut summary = RunSummary::new(Mode::Quality, options.dry_run);

        let notes = load_all(self.vault.as_ref(), &mut summary)?;
        let prepared = extract_all(notes, &mut summary);

        let mut to_rate: Vec<(&Note, &str)> = Vec::with_capacity(prepared.len());
        for p in &prepared {
            if p.extracted.body.trim().is_empty() {
                log::debug!("{}: nothing to rate", p.note.id);
                summary.skipped(Stage::Rate);
                summary.unchanged += 1;
            } else {
                to_rate.push((&p.note, p.extracted.body.as_str()));
            }
        }

        let progress = progress_bar(to_rate.len(), "rating", options.show_progress);
        let pool = worker_pool(self.workers)?;

        let results: Vec<(&Note, Option<Result<QualityRecord, RateError>>)> = pool.install(|| {
            to_rate
                .par_iter()
                .map(|(note, body)| {
                    let outcome = if cancel.is_cancelled() {
                        None
                    } else {
                        Some(self.rater.rate(&note.id, body))
                    };
                    progress.inc(1);
                    (*note, outcome)
                })
                .collect()
        });
        progress.finish_and_clear();

        let mut rated = Vec::new();
        let mut unreachable: Option<String> = None;
        let mut answered = false;

        for (note, outcome) in results {
            match outcome {
                None => {
                    summary.cancelled = true;
                    summary.skipped(Stage::Rate);
                }
                Some(Ok(record)) => {
                    answered = true;
                    summary.processed(Stage::Rate);
                    rated.push((note, record));
                }
                Some(Err(RateError::Provider(cause))) => {
                    if matches!(cause, ProviderError::Unreachable(_)) {
                        unreachable = Some(cause.to_string());
                    } else {
                        answered = true;
                    }
                    summary.failed(Stage::Rate, &note.id, FailureCategory::RatingFailed, cause.to_string());
                }
                Some(Err(err @ RateError::Unparseable { .. })) => {
                    answered = true;
                    summary.failed(
                        Stage::Rate,
                        &note.id,
                        FailureCategory::RatingParseError,
                        err.to_string(),
                    );
                }
            }
        }

        if summary.cancelled {
            log::warn!("interrupted while rating, nothing was written");
            return Ok(summary);
        }

        // an unparseable answer is still an answer
        if !answered {
            if let Some(cause) = unreachable {
                return Err(PipelineError::ProviderUnreachable {
                    stage: Stage::Rate,
                    cause,
                });
            }
        }

        let updates = render_all(rated, &mut summary);
        write_all(self.vault.as_ref(), updates, options, cancel, &mut summary);

        Ok(summary)
    }
}

fn render_all(rated: Vec<(&Note, QualityRecord)>, summary: &mut RunSummary) -> Vec<(NoteId, String)> {
    let mut updates = Vec::new();

    for (note, record) in rated {
        match apply_rating(&note.raw, &record) {
            Ok(content) => {
                summary.processed(Stage::Render);
                if content == note.raw {
                    summary.unchanged += 1;
                } else {
                    updates.push((note.id.clone(), content));
                }
            }
            Err(reason) => {
                summary.failed(Stage::Render, &note.id, FailureCategory::ParseError, reason);
            }
        }
    }

    updates
}
