// crates/demoforge-core/src/error.rs
//
// Error kinds, not type names: every fallible core operation returns one of
// these variants so the CLI can map failures onto a stable exit contract
// without string-matching on messages.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DemoforgeError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("timeline schema violation in field `{field}`: {reason}")]
    SchemaViolation { field: String, reason: String },

    #[error("driver failure during {action} (url={url:?}, selector={selector:?}): {reason}")]
    DriverFailure {
        action: String,
        url: Option<String>,
        selector: Option<String>,
        reason: String,
    },

    #[error("narration mismatch: preprocessed {expected} segment(s), recorded {actual}")]
    NarrationMismatch { expected: usize, actual: usize },

    #[error("tts failure: {0}")]
    TtsFailure(String),

    #[error("render failure: {0}")]
    RenderFailure(String),

    #[error("config error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, DemoforgeError>;
