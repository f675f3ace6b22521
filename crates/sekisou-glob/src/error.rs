//! Pattern compilation errors.

use thiserror::Error;

/// Error raised while compiling a glob pattern.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GlobError {
    /// The pattern string was empty.
    #[error("empty glob pattern")]
    EmptyPattern,

    /// The pattern translated into something the regex engine rejected.
    #[error("invalid glob pattern {pattern:?}: {reason}")]
    InvalidPattern { pattern: String, reason: String },
}

impl GlobError {
    pub(crate) fn invalid(pattern: &str, err: regex::Error) -> Self {
        Self::InvalidPattern {
            pattern: pattern.to_string(),
            reason: err.to_string(),
        }
    }
}

/// Glob result type.
pub type GlobResult<T> = Result<T, GlobError>;
