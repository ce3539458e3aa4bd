/// Error types shared across the recommender binaries.
///
/// These errors represent failures in infrastructure components (vector DB, embeddings)
/// that every binary touches. Application-specific errors are defined in the
/// application crate and wrap `CommonError` via `#[from]`.

#[derive(Debug, thiserror::Error)]
pub enum CommonError {
    #[error("vector db error: {0}")]
    VectorDb(String),

    #[error("embedding error: {0}")]
    Embedding(String),
}
