//! Batch runs over a whole vault.
//!
//! Both modes share one shape:
//! Load → Extract → (Embed → Rank | Rate) → Render → Write.
//! Every note is read before the first write, and each note is written
//! at most once. Per-note failures end up in the `RunSummary`; only
//! problems that make the whole run meaningless abort it.

mod linker;
mod quality;
mod summary;

pub use linker::Linker;
pub use quality::QualityPipeline;
pub use summary::{FailureCategory, Mode, RunSummary, Stage};

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use indicatif::{ProgressBar, ProgressStyle};

use crate::markdown::extract;
use crate::note::{ExtractedNote, Note, NoteId};
use crate::vault::{VaultError, VaultStore};

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error(transparent)]
    Vault(#[from] VaultError),

    #[error("embedding dimension changed mid-run at {note}: expected {expected}, got {got}")]
    ProviderInconsistency {
        note: NoteId,
        expected: usize,
        got: usize,
    },

    #[error("provider unreachable during {stage}: {cause}")]
    ProviderUnreachable { stage: Stage, cause: String },

    #[error("failed to start worker pool: {0}")]
    WorkerPool(#[from] rayon::ThreadPoolBuildError),
}

/// Shared flag flipped by the interrupt handler.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Compute everything, write nothing
    pub dry_run: bool,
    pub show_progress: bool,
}

/// A note that made it through extraction.
#[derive(Debug, Clone)]
pub(crate) struct Prepared {
    pub note: Note,
    pub extracted: ExtractedNote,
}

pub(crate) fn progress_bar(len: usize, label: &'static str, show: bool) -> ProgressBar {
    if !show {
        return ProgressBar::hidden();
    }

    let bar = ProgressBar::new(len as u64);
    if let Ok(style) = ProgressStyle::with_template("{msg:>9} [{bar:30}] {pos}/{len} ({eta})") {
        bar.set_style(style.progress_chars("=> "));
    }
    bar.set_message(label);
    bar
}

pub(crate) fn worker_pool(workers: usize) -> Result<rayon::ThreadPool, PipelineError> {
    Ok(rayon::ThreadPoolBuilder::new()
        .num_threads(workers.max(1))
        .thread_name(|idx| format!("provider-{idx}"))
        .build()?)
}

/// Read every note before anything is written.
pub(crate) fn load_all(vault: &dyn VaultStore, summary: &mut RunSummary) -> Result<Vec<Note>, PipelineError> {
    let ids = vault.list_notes()?;
    summary.notes_found = ids.len();
    log::info!("found {} notes", ids.len());

    let mut notes = Vec::with_capacity(ids.len());
    for id in ids {
        match vault.read_note(&id) {
            Ok(raw) => {
                summary.processed(Stage::Load);
                notes.push(Note { id, raw });
            }
            Err(err) => {
                summary.failed(Stage::Load, &id, FailureCategory::IoFailure, err.to_string());
            }
        }
    }

    Ok(notes)
}

pub(crate) fn extract_all(notes: Vec<Note>, summary: &mut RunSummary) -> Vec<Prepared> {
    let mut prepared = Vec::with_capacity(notes.len());

    for note in notes {
        match extract(&note.raw) {
            Ok(extracted) => {
                summary.processed(Stage::Extract);
                let title = ExtractedNote::derive_title(&note.id, &extracted.frontmatter);
                let extracted = ExtractedNote {
                    title,
                    body: extracted.body,
                };
                prepared.push(Prepared { note, extracted });
            }
            Err(err) => {
                summary.failed(
                    Stage::Extract,
                    &note.id,
                    FailureCategory::ParseError,
                    err.to_string(),
                );
            }
        }
    }

    prepared
}

/// Write finished notes one by one. Each write is atomic on its own;
/// an interrupt stops before the next note.
pub(crate) fn write_all(
    vault: &dyn VaultStore,
    updates: Vec<(NoteId, String)>,
    options: &RunOptions,
    cancel: &CancelToken,
    summary: &mut RunSummary,
) {
    for (id, content) in updates {
        if cancel.is_cancelled() {
            log::warn!("interrupted, {id} and later notes left as they were");
            summary.cancelled = true;
            break;
        }

        if options.dry_run {
            log::info!("{id}: would update");
            summary.processed(Stage::Write);
            summary.written.push(id);
            continue;
        }

        match vault.write_note(&id, &content) {
            Ok(()) => {
                log::info!("{id}: updated");
                summary.processed(Stage::Write);
                summary.written.push(id);
            }
            Err(err) => {
                summary.failed(Stage::Write, &id, FailureCategory::IoFailure, err.to_string());
            }
        }
    }
}
