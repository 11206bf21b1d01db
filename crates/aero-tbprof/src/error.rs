use thiserror::Error;

pub type Result<T> = std::result::Result<T, ProfilerError>;

/// Startup-time option errors.
///
/// Every variant is fatal: a profiler is never constructed from a partially understood option
/// set.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("option parsing failed: {0} (expected key=value)")]
    MissingValue(String),

    #[error("option parsing failed: unknown option {0}")]
    UnknownOption(String),

    #[error("option parsing failed: {key}={value} is not an unsigned integer")]
    InvalidInteger { key: &'static str, value: String },

    #[error("option parsing failed: {key} must be greater than zero")]
    ZeroNotAllowed { key: &'static str },

    #[error("option parsing failed: {key}={value} (expected one of: {expected})")]
    InvalidChoice {
        key: &'static str,
        value: String,
        expected: &'static str,
    },
}

/// Errors surfaced by [`crate::Profiler::finish`].
///
/// The translation and execution hooks never fail; only the one-time shutdown writes can.
#[derive(Debug, Error)]
pub enum ProfilerError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("failed to write {what}: {source}")]
    Io {
        what: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize ranking report: {0}")]
    Json(#[from] serde_json::Error),
}

impl ProfilerError {
    pub(crate) fn io(what: &'static str, source: std::io::Error) -> Self {
        Self::Io { what, source }
    }
}
