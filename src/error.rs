//! Error types for the engine.

/// Engine result type.
pub type Result<T> = std::result::Result<T, EngineError>;

/// Errors produced by the engine's public operations.
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// A caller-supplied argument failed validation.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// An id was referenced that does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The underlying store failed.
    #[error("store error: {0}")]
    StoreError(#[from] rusqlite::Error),

    /// An internal invariant was violated (e.g. a one-sided Hebbian edge).
    ///
    /// The engine self-heals these where it can; this variant exists for the
    /// cases it cannot, so callers are never silently handed corrupt state.
    #[error("consistency violation: {0}")]
    ConsistencyViolation(String),

    /// IO failure opening or creating the backing store.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
