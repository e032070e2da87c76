//! Error types for relay setup and configuration loading.

use thiserror::Error;

/// Errors that prevent a relay from being built or started.
#[derive(Debug, Error)]
pub enum RelayError {
    /// The waypoint/runner layout or a tuning value cannot produce a working relay.
    #[error("invalid track configuration: {0}")]
    InvalidTrackConfiguration(String),

    /// The configuration file could not be read.
    #[error("failed to read configuration {path}: {source}")]
    ConfigIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// The configuration file is not valid JSON for `RelayConfig`.
    #[error("failed to parse configuration: {0}")]
    ConfigParse(#[from] serde_json::Error),
}

impl RelayError {
    pub(crate) fn track(reason: impl Into<String>) -> Self {
        Self::InvalidTrackConfiguration(reason.into())
    }
}

pub type RelayResult<T> = Result<T, RelayError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn track_error_message_is_descriptive() {
        let err = RelayError::track("need at least 2 occupied waypoints, got 1");
        assert_eq!(
            err.to_string(),
            "invalid track configuration: need at least 2 occupied waypoints, got 1"
        );
    }

    #[test]
    fn parse_error_converts_from_serde() {
        let parse = serde_json::from_str::<u32>("not json").unwrap_err();
        let err: RelayError = parse.into();
        assert!(matches!(err, RelayError::ConfigParse(_)));
    }
}
