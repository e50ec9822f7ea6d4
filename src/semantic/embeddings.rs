//! Embedding client for one linker run.
//!
//! Wraps an `EmbeddingProvider` with:
//! - skipping of empty input (no request is made)
//! - the retry policy
//! - a per-run cache keyed by note id
//! - a dimension check across all vectors of the run

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::note::NoteId;
use crate::provider::{EmbeddingProvider, ProviderError};
use crate::retry::RetryPolicy;

/// Result of asking for a note's embedding.
#[derive(Debug, Clone, PartialEq)]
pub enum EmbedOutcome {
    Embedded(Vec<f32>),
    /// Nothing to embed; the provider was not called
    Skipped,
}

#[derive(Debug, thiserror::Error)]
pub enum EmbedError {
    #[error("embedding failed for {note}: {cause}")]
    Failed { note: NoteId, cause: ProviderError },

    #[error("provider returned a {got}-dimensional vector for {note}, expected {expected}")]
    ProviderInconsistency {
        note: NoteId,
        expected: usize,
        got: usize,
    },
}

pub struct EmbeddingClient {
    provider: Arc<dyn EmbeddingProvider>,
    retry: RetryPolicy,
    cache: Mutex<HashMap<NoteId, Vec<f32>>>,
    /// Discovered from the first successful call
    dimensions: Mutex<Option<usize>>,
}

impl EmbeddingClient {
    pub fn new(provider: Arc<dyn EmbeddingProvider>, retry: RetryPolicy) -> Self {
        Self {
            provider,
            retry,
            cache: Mutex::new(HashMap::new()),
            dimensions: Mutex::new(None),
        }
    }

    /// Get the model name
    pub fn model(&self) -> &str {
        self.provider.model()
    }

    /// Dimension of this run's vectors, once known.
    pub fn dimensions(&self) -> Option<usize> {
        *self.dimensions.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Number of notes embedded so far.
    pub fn cached_len(&self) -> usize {
        self.cache.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Embed `text` for `note`. A note embedded earlier in the run is
    /// served from the cache.
    pub fn embed(&self, note: &NoteId, text: &str) -> Result<EmbedOutcome, EmbedError> {
        if let Some(vector) = self
            .cache
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(note)
        {
            return Ok(EmbedOutcome::Embedded(vector.clone()));
        }

        if text.trim().is_empty() {
            log::debug!("{note}: empty after extraction, not embedding");
            return Ok(EmbedOutcome::Skipped);
        }

        let what = format!("embed {note}");
        let vector = self
            .retry
            .run(&what, || {
                let vector = self.provider.embed(text)?;
                if vector.is_empty() {
                    return Err(ProviderError::InvalidResponse(
                        "empty embedding".to_string(),
                    ));
                }
                Ok(vector)
            })
            .map_err(|cause| EmbedError::Failed {
                note: note.clone(),
                cause,
            })?;

        self.check_dimensions(note, vector.len())?;

        self.cache
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(note.clone(), vector.clone());

        Ok(EmbedOutcome::Embedded(vector))
    }

    fn check_dimensions(&self, note: &NoteId, got: usize) -> Result<(), EmbedError> {
        let mut dimensions = self.dimensions.lock().unwrap_or_else(|e| e.into_inner());
        match *dimensions {
            None => {
                log::debug!("embedding dimension for this run: {got}");
                *dimensions = Some(got);
                Ok(())
            }
            Some(expected) if expected == got => Ok(()),
            Some(expected) => Err(EmbedError::ProviderInconsistency {
                note: note.clone(),
                expected,
                got,
            }),
        }
    }
}
