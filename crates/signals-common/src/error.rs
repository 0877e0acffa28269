//! Error types for the signal enrichment pipeline.

use thiserror::Error;

/// Result type alias using SignalError.
pub type SignalResult<T> = Result<T, SignalError>;

/// Primary error type for provider clients, resolvers and decoders.
///
/// None of these ever reach the caller of the aggregator: each source turns
/// its own errors into "produced nothing" at the point where it gives up.
#[derive(Debug, Error)]
pub enum SignalError {
    // === Configuration ===
    #[error("Configuration missing: {0}")]
    ConfigurationMissing(String),

    // === Transport ===
    #[error("Request to {url} failed: {message}")]
    Transport { url: String, message: String },

    #[error("Request to {url} returned HTTP {status}")]
    HttpStatus { url: String, status: u16 },

    // === Payload shape ===
    #[error("Unexpected response shape: {0}")]
    SchemaMismatch(String),

    #[error("Listing is empty: {0}")]
    EmptyListing(String),

    // === Decoding ===
    #[error("Decoder not available: {0}")]
    DecodeUnsupported(String),

    #[error("Failed to decode payload: {0}")]
    Decode(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
}

impl SignalError {
    /// Short, stable label used for log fields and metric labels.
    pub fn kind(&self) -> &'static str {
        match self {
            SignalError::ConfigurationMissing(_) => "configuration_missing",
            SignalError::Transport { .. } | SignalError::HttpStatus { .. } => "transport",
            SignalError::SchemaMismatch(_) | SignalError::EmptyListing(_) => "schema_mismatch",
            SignalError::DecodeUnsupported(_) => "decode_unsupported",
            SignalError::Decode(_) => "decode",
            SignalError::InvalidUrl(_) => "invalid_url",
        }
    }

    /// Whether the error only means "nobody configured this source".
    pub fn is_unconfigured(&self) -> bool {
        matches!(self, SignalError::ConfigurationMissing(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        let err = SignalError::HttpStatus {
            url: "http://example.com".to_string(),
            status: 503,
        };
        assert_eq!(err.kind(), "transport");
        assert!(err.to_string().contains("503"));

        let err = SignalError::EmptyListing("instances".to_string());
        assert_eq!(err.kind(), "schema_mismatch");

        assert!(SignalError::ConfigurationMissing("KNMI_API_KEY".into()).is_unconfigured());
        assert!(!SignalError::Decode("bad".into()).is_unconfigured());
    }
}
