use thiserror::Error;

/// Errors raised while loading or validating a [`RacerConfig`](crate::config::RacerConfig).
#[derive(Debug, Error)]
pub enum RacerError {
    #[error("config parse error: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid {field}: {reason}")]
    InvalidParameter { field: &'static str, reason: String },
}

/// Audio platform failures.
///
/// These never escape the race operations; the engine node and the
/// controller log them and carry on silently.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AudioError {
    #[error("audio output unavailable: {0}")]
    Unavailable(String),
    #[error("audio context is closed")]
    Closed,
    #[error("engine voice is already running")]
    VoiceAlreadyRunning,
}

impl RacerError {
    pub(crate) fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        RacerError::InvalidParameter {
            field,
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_parameter_message() {
        let e = RacerError::invalid("friction", "must be positive, got -1");
        assert_eq!(format!("{e}"), "invalid friction: must be positive, got -1");
    }

    #[test]
    fn parse_error_wraps_serde() {
        let err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let e: RacerError = err.into();
        assert!(format!("{e}").starts_with("config parse error"));
    }
}
