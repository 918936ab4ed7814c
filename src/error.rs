//! # Error Types
//!
//! Errors raised by the exercise generator, the settings layer and the wasm
//! boundary. The evaluator has no error path: input that arrives outside an
//! active session is answered neutrally instead.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum TrainerError {
    /// No (category, type) pair in the request exists in the chord catalog.
    ///
    /// Callers are expected to block "Start" before this happens.
    #[error("No chord types selected")]
    EmptyRequest,

    /// A root or key name that is not one of the 12 canonical names.
    #[error("Unknown root note: {0}")]
    UnknownRoot(String),

    #[error("Melody length must be at least 1, got {0}")]
    InvalidLength(usize),

    #[error("Unknown evaluation mode: {0}")]
    UnknownMode(String),

    #[error("Unknown chord category: {0}")]
    UnknownCategory(String),

    #[error("Unknown chord type: {0}")]
    UnknownChordType(String),

    /// The persisted settings blob could not be parsed or written.
    #[error("Invalid settings: {0}")]
    Settings(#[from] serde_json::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

pub type Result<T> = std::result::Result<T, TrainerError>;
