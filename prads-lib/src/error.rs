use thiserror::Error;

/// Errors surfaced by the engine.
///
/// Only initialization failures and signal-driven shutdowns are meant to
/// propagate out of `main`; dissection and matching swallow their own
/// failures into "unknown" per-packet (see `dissect` and the matchers).
#[derive(Error, Debug)]
pub enum PradsError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{file}:{line}: {reason}")]
    SigParse {
        file: String,
        line: usize,
        reason: String,
    },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Capture error: {0}")]
    Capture(String),

    #[error("Persistence error: {0}")]
    Persistence(String),
}

pub type Result<T> = std::result::Result<T, PradsError>;
