use std::collections::BTreeMap;
use std::sync::Arc;

use rayon::prelude::*;

use crate::config::LinkerConfig;
use crate::markdown::{has_section, normalize_target, rewrite, wikilink_targets, SectionKind};
use crate::note::NoteId;
use crate::provider::ProviderError;
use crate::semantic::{embedding_input, rank_all, EmbedError, EmbedOutcome, EmbeddingClient, Related};
use crate::vault::VaultStore;

use super::{
    extract_all, load_all, progress_bar, worker_pool, write_all, CancelToken, FailureCategory,
    Mode, PipelineError, Prepared, RunOptions, RunSummary, Stage,
};

/// Body of the related-notes section.
pub fn render_related(related: &[Related], show_scores: bool) -> String {
    let mut out = String::from("### Related Notes\n");
    for entry in related {
        if show_scores {
            out.push_str(&format!("- [[{}]] ({:.2})\n", entry.id.link_target(), entry.score));
        } else {
            out.push_str(&format!("- [[{}]]\n", entry.id.link_target()));
        }
    }
    out
}

/// Drop neighbours the body already links to, by path or by file name.
fn without_existing_links(related: &[Related], body: &str) -> Vec<Related> {
    let existing = wikilink_targets(body);
    if existing.is_empty() {
        return related.to_vec();
    }

    related
        .iter()
        .filter(|r| {
            !existing.contains(&normalize_target(r.id.link_target()))
                && !existing.contains(&normalize_target(r.id.stem()))
        })
        .cloned()
        .collect()
}

/// Links every note to its most similar neighbours.
pub struct Linker {
    vault: Arc<dyn VaultStore>,
    embedder: EmbeddingClient,
    config: LinkerConfig,
    workers: usize,
}

impl Linker {
    pub fn new(
        vault: Arc<dyn VaultStore>,
        embedder: EmbeddingClient,
        config: LinkerConfig,
        workers: usize,
    ) -> Self {
        Self {
            vault,
            embedder,
            config,
            workers,
        }
    }

    pub fn run(&self, options: &RunOptions, cancel: &CancelToken) -> Result<RunSummary, PipelineError> {
        let _span = tracing::info_span!("linker", model = self.embedder.model()).entered();
        let mut summary = RunSummary::new(Mode::Linker, options.dry_run);

        let notes = load_all(self.vault.as_ref(), &mut summary)?;
        let prepared = extract_all(notes, &mut summary);

        let vectors = self.embed_all(&prepared, options, cancel, &mut summary)?;
        if summary.cancelled {
            return Ok(summary);
        }

        log::info!(
            "ranking {} notes (k={}, min_score={})",
            vectors.len(),
            self.config.max_related,
            self.config.min_score
        );
        let ranked = rank_all(&vectors, self.config.max_related, self.config.min_score);
        for _ in 0..ranked.len() {
            summary.processed(Stage::Rank);
        }

        let updates = self.render_all(&prepared, &ranked, &mut summary);
        write_all(self.vault.as_ref(), updates, options, cancel, &mut summary);

        Ok(summary)
    }

    /// Embed every note on the worker pool. Ordering of the returned map
    /// does not depend on completion order.
    fn embed_all(
        &self,
        prepared: &[Prepared],
        options: &RunOptions,
        cancel: &CancelToken,
        summary: &mut RunSummary,
    ) -> Result<BTreeMap<NoteId, Vec<f32>>, PipelineError> {
        let inputs: Vec<(&NoteId, String)> = prepared
            .iter()
            .map(|p| {
                let text = embedding_input(
                    &p.extracted.title,
                    &p.extracted.body,
                    self.config.include_title,
                    self.config.max_input_chars,
                );
                (&p.note.id, text)
            })
            .collect();

        let progress = progress_bar(inputs.len(), "embedding", options.show_progress);
        let pool = worker_pool(self.workers)?;

        let results: Vec<(&NoteId, Option<Result<EmbedOutcome, EmbedError>>)> = pool.install(|| {
            inputs
                .par_iter()
                .map(|(id, text)| {
                    let outcome = if cancel.is_cancelled() {
                        None
                    } else {
                        Some(self.embedder.embed(id, text))
                    };
                    progress.inc(1);
                    (*id, outcome)
                })
                .collect()
        });
        progress.finish_and_clear();

        let mut vectors = BTreeMap::new();
        let mut unreachable: Option<String> = None;
        // any response at all, even an error status, means the server is up
        let mut answered = false;

        for (id, outcome) in results {
            match outcome {
                None => {
                    summary.cancelled = true;
                    summary.skipped(Stage::Embed);
                }
                Some(Ok(EmbedOutcome::Embedded(vector))) => {
                    answered = true;
                    summary.processed(Stage::Embed);
                    vectors.insert(id.clone(), vector);
                }
                Some(Ok(EmbedOutcome::Skipped)) => {
                    summary.skipped(Stage::Embed);
                }
                Some(Err(EmbedError::ProviderInconsistency {
                    note,
                    expected,
                    got,
                })) => {
                    log::error!("{note}: embedding dimension {got} does not match {expected}, aborting");
                    return Err(PipelineError::ProviderInconsistency {
                        note,
                        expected,
                        got,
                    });
                }
                Some(Err(EmbedError::Failed { note, cause })) => {
                    if matches!(cause, ProviderError::Unreachable(_)) {
                        unreachable = Some(cause.to_string());
                    } else {
                        answered = true;
                    }
                    summary.failed(
                        Stage::Embed,
                        &note,
                        FailureCategory::EmbeddingFailed,
                        cause.to_string(),
                    );
                }
            }
        }

        if summary.cancelled {
            log::warn!("interrupted while embedding, nothing was written");
        }

        if let Some(dimensions) = self.embedder.dimensions() {
            log::info!(
                "embedded {} notes, {dimensions} dimensions",
                self.embedder.cached_len()
            );
        }

        if !answered {
            if let Some(cause) = unreachable {
                return Err(PipelineError::ProviderUnreachable {
                    stage: Stage::Embed,
                    cause,
                });
            }
        }

        Ok(vectors)
    }

    fn render_all(
        &self,
        prepared: &[Prepared],
        ranked: &BTreeMap<NoteId, Vec<Related>>,
        summary: &mut RunSummary,
    ) -> Vec<(NoteId, String)> {
        let mut updates = Vec::new();

        for p in prepared {
            let id = &p.note.id;
            // failed or skipped during embedding: leave the note alone
            let related = match ranked.get(id) {
                Some(related) => related,
                None => continue,
            };
            let related = if self.config.skip_existing_links {
                without_existing_links(related, &p.extracted.body)
            } else {
                related.clone()
            };

            if related.is_empty() {
                match has_section(&p.note.raw, SectionKind::RelatedNotes) {
                    Ok(false) => {
                        summary.skipped(Stage::Render);
                        summary.unchanged += 1;
                        continue;
                    }
                    Ok(true) => {}
                    Err(err) => {
                        summary.failed(Stage::Render, id, FailureCategory::ParseError, err.to_string());
                        continue;
                    }
                }
            }

            let section = render_related(&related, self.config.show_scores);
            match rewrite(&p.note.raw, SectionKind::RelatedNotes, &section) {
                Ok(content) => {
                    summary.processed(Stage::Render);
                    if content == p.note.raw {
                        summary.unchanged += 1;
                    } else {
                        log::debug!(
                            "{id}: related {:?}",
                            related.iter().map(|r| r.id.as_str()).collect::<Vec<_>>()
                        );
                        updates.push((id.clone(), content));
                    }
                }
                Err(err) => {
                    summary.failed(Stage::Render, id, FailureCategory::ParseError, err.to_string());
                }
            }
        }

        updates
    }
}
