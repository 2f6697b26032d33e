#![forbid(unsafe_code)]

//! Error signals carried by streams.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, StreamError>;

/// Everything that can reach an `on_error` handler or fail stream creation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StreamError {
    /// Malformed configuration, reported synchronously at creation time.
    #[error("invalid argument: {message}")]
    InvalidArgument { message: String },

    /// A `try_map` / `try_filter` callback failed.
    #[error("transform failed: {message}")]
    TransformFailure { message: String },

    /// Raised by a producer through [`Emitter::error`](crate::Emitter::error).
    #[error("{message}")]
    Producer { message: String },
}

impl StreamError {
    #[must_use]
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn transform(message: impl Into<String>) -> Self {
        Self::TransformFailure {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn producer(message: impl Into<String>) -> Self {
        Self::Producer {
            message: message.into(),
        }
    }

    /// Short label used in log fields.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidArgument { .. } => "invalid_argument",
            Self::TransformFailure { .. } => "transform_failure",
            Self::Producer { .. } => "producer",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_message() {
        assert_eq!(
            StreamError::invalid("period must be positive").to_string(),
            "invalid argument: period must be positive"
        );
        assert_eq!(
            StreamError::transform("odd tick").to_string(),
            "transform failed: odd tick"
        );
        assert_eq!(StreamError::producer("Does not work").to_string(), "Does not work");
    }

    #[test]
    fn kind_labels_are_stable() {
        assert_eq!(StreamError::invalid("x").kind(), "invalid_argument");
        assert_eq!(StreamError::transform("x").kind(), "transform_failure");
        assert_eq!(StreamError::producer("x").kind(), "producer");
    }
}
