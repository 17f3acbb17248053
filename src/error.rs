//! Cycle error taxonomy
//!
//! Anything that could corrupt the returned session state is fatal and
//! surfaced to the caller. Information-source failures never appear here:
//! the gateway folds them into its result mapping as data.

use thiserror::Error;

/// Errors surfaced by a behaviour cycle
#[derive(Error, Debug)]
pub enum TrackerError {
    #[error("No chat provider configured")]
    ProviderUnavailable,
    #[error("Provider request failed: {0}")]
    Provider(String),
    #[error("Malformed model output: {0}")]
    MalformedModelOutput(String),
    #[error("Behaviour log write failed: {0}")]
    Persistence(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, TrackerError>;
