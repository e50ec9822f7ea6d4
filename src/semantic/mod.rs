//! Semantic linking between notes.
//!
//! Embeddings are produced by the model server, held in memory for one
//! run and compared exhaustively.
//!
//! # Architecture
//!
//! - `embeddings`: provider wrapper with retry, per-run cache and
//!   dimension check
//! - `ranker`: cosine similarity and per-note top-k selection
//! - `preprocess`: text preparation for embedding input

pub mod embeddings;
mod preprocess;
mod ranker;

pub use embeddings::{EmbedError, EmbedOutcome, EmbeddingClient};
pub use preprocess::{embedding_input, truncate_content};
pub use ranker::{rank_all, Related};
#[cfg(test)]
pub use ranker::cosine_similarity;
