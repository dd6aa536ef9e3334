//! Error types for envelope ingestion

use thiserror::Error;

/// Reasons a payload could not be applied or published
///
/// Inbound failures never escape the delivery loop; they are logged and
/// counted. `Encode` is returned to whoever publishes on the bus.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("envelope is not valid JSON: {0}")]
    MalformedJson(#[from] serde_json::Error),

    #[error("envelope is not a JSON object")]
    NotAnObject,

    #[error("envelope carries both State and Delta")]
    AmbiguousEnvelope,

    #[error("invalid {field} payload: {source}")]
    InvalidPayload {
        field: &'static str,
        source: serde_json::Error,
    },

    #[error("unrecognized task status: {0}")]
    InvalidStatus(String),

    #[error("failed to encode outbound payload: {0}")]
    Encode(#[source] serde_json::Error),
}

impl IngestError {
    /// Short label used for metrics and structured logs
    pub fn reason(&self) -> &'static str {
        match self {
            IngestError::MalformedJson(_) => "malformed_json",
            IngestError::NotAnObject => "not_an_object",
            IngestError::AmbiguousEnvelope => "ambiguous_envelope",
            IngestError::InvalidPayload { .. } => "invalid_payload",
            IngestError::InvalidStatus(_) => "invalid_status",
            IngestError::Encode(_) => "encode_failed",
        }
    }

    pub(crate) fn payload(field: &'static str, source: serde_json::Error) -> Self {
        IngestError::InvalidPayload { field, source }
    }
}
