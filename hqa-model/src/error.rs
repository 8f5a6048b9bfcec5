//! Error types for the `hqa-model` crate.

use thiserror::Error;

/// Broad classification of a failed provider call.
///
/// Used at the service boundary to pick a response status without
/// string-matching on error messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// The upstream could not be reached (connection refused, timeout, DNS).
    Unavailable,
    /// The upstream rejected the requested model or deployment.
    InvalidModel,
    /// The upstream answered with an error status.
    Rejected,
    /// The upstream answered successfully but the payload was unusable.
    Malformed,
}

impl FailureKind {
    /// Classify a transport-level `reqwest` failure.
    pub fn from_reqwest(err: &reqwest::Error) -> Self {
        if err.is_connect() || err.is_timeout() { Self::Unavailable } else { Self::Rejected }
    }

    /// Classify an HTTP error status plus the upstream error detail.
    ///
    /// The detail only decides for request-shaped statuses (`0` meaning the
    /// status is unknown); auth, quota and server errors keep their class even
    /// when the message happens to name the model.
    pub fn from_status(status: u16, detail: &str) -> Self {
        match status {
            404 => Self::InvalidModel,
            502..=504 => Self::Unavailable,
            0 | 400 | 422 if names_model(detail) => Self::InvalidModel,
            _ => Self::Rejected,
        }
    }

    /// HTTP status a front-end should report for this failure.
    pub fn status_code(self) -> u16 {
        match self {
            Self::Unavailable => 503,
            Self::InvalidModel => 422,
            Self::Rejected | Self::Malformed => 500,
        }
    }
}

fn names_model(detail: &str) -> bool {
    let detail = detail.to_ascii_lowercase();
    detail.contains("model") || detail.contains("deployment")
}

/// Errors that can occur while talking to a chat provider.
#[derive(Debug, Error)]
pub enum ModelError {
    /// The provider discriminator is not one of the supported backends.
    #[error("Unsupported provider: '{0}' (expected one of 'azure_openai', 'openai', 'cohere')")]
    UnsupportedProvider(String),

    /// A downstream provider call failed.
    #[error("Provider error ({provider}): {message}")]
    Provider {
        /// The provider that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
        /// How the call failed.
        kind: FailureKind,
    },

    /// Missing or invalid provider credentials or settings.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl ModelError {
    pub(crate) fn provider(
        provider: impl Into<String>,
        kind: FailureKind,
        message: impl Into<String>,
    ) -> Self {
        Self::Provider { provider: provider.into(), message: message.into(), kind }
    }

    /// HTTP status a front-end should report for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::UnsupportedProvider(_) => 400,
            Self::Provider { kind, .. } => kind.status_code(),
            Self::Config(_) => 500,
        }
    }
}

/// A convenience result type for provider operations.
pub type Result<T> = std::result::Result<T, ModelError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_follow_boundary_contract() {
        assert_eq!(ModelError::UnsupportedProvider("x".into()).status_code(), 400);
        assert_eq!(
            ModelError::provider("cohere", FailureKind::InvalidModel, "bad model").status_code(),
            422
        );
        assert_eq!(
            ModelError::provider("azure_openai", FailureKind::Unavailable, "refused").status_code(),
            503
        );
        assert_eq!(ModelError::Config("missing key".into()).status_code(), 500);
    }

    #[test]
    fn not_found_and_model_detail_classify_as_invalid_model() {
        assert_eq!(FailureKind::from_status(404, "not found"), FailureKind::InvalidModel);
        assert_eq!(
            FailureKind::from_status(400, "invalid request: model 'foo' not found"),
            FailureKind::InvalidModel
        );
        assert_eq!(FailureKind::from_status(503, "overloaded"), FailureKind::Unavailable);
        assert_eq!(FailureKind::from_status(401, "invalid api token"), FailureKind::Rejected);
        assert_eq!(
            FailureKind::from_status(0, "The model `gpt-5o` does not exist"),
            FailureKind::InvalidModel
        );
    }

    #[test]
    fn model_in_detail_does_not_override_auth_or_quota_status() {
        assert_eq!(
            FailureKind::from_status(401, "key not authorized for model gpt-4o"),
            FailureKind::Rejected
        );
        assert_eq!(
            FailureKind::from_status(429, "rate limit reached for model gpt-4o"),
            FailureKind::Rejected
        );
        assert_eq!(
            FailureKind::from_status(503, "deployment is warming up"),
            FailureKind::Unavailable
        );
        assert_eq!(FailureKind::from_status(400, "max_tokens too large"), FailureKind::Rejected);
    }
}
