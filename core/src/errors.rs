use thiserror::Error;

/// Failure taxonomy for a single generation attempt.
///
/// Per-provider variants are carried inside a
/// [`GenerationOutcome`](crate::agents::GenerationOutcome); only
/// [`GenerationError::Unexpected`] ever escapes the orchestrator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GenerationError {
    #[error("No images are mapped for this prompt")]
    NoMapping,
    #[error("Error for {provider}")]
    ProviderUnavailable { provider: String },
    #[error("Not signed in: no access token available")]
    Authentication,
    #[error("{message}")]
    Transport { status: Option<u16>, message: String },
    #[error("Malformed response: {0}")]
    MalformedResponse(String),
    #[error("History store unavailable: {0}")]
    Persistence(String),
    #[error("{0}")]
    Unexpected(String),
}

impl GenerationError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::NoMapping => "GEN-1001",
            Self::ProviderUnavailable { .. } => "GEN-1002",
            Self::Authentication => "AUTH-1001",
            Self::Transport { .. } => "NET-1001",
            Self::MalformedResponse(_) => "NET-1002",
            Self::Persistence(_) => "DB-1001",
            Self::Unexpected(_) => "GEN-1000",
        }
    }

    pub fn explain(&self) -> &'static str {
        match self {
            Self::NoMapping => "The prompt matched no keyword in the offline image table.",
            Self::ProviderUnavailable { .. } => {
                "The prompt is mapped, but not for this provider."
            }
            Self::Authentication => "Remote generation needs a bearer token from the login flow.",
            Self::Transport { .. } => "The generation endpoint could not be reached or refused the request.",
            Self::MalformedResponse(_) => "The generation endpoint answered without an image payload.",
            Self::Persistence(_) => "The SQLite history database could not be accessed.",
            Self::Unexpected(_) => "An unspecified error occurred while generating.",
        }
    }

    /// Build a transport error from an HTTP status and an optional server message.
    pub fn from_status(status: u16, message: Option<String>) -> Self {
        let message = message
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| format!("Request failed with status {status}"));
        Self::Transport {
            status: Some(status),
            message,
        }
    }
}

impl From<reqwest::Error> for GenerationError {
    fn from(err: reqwest::Error) -> Self {
        Self::Transport {
            status: err.status().map(|s| s.as_u16()),
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_status_prefers_server_message() {
        let err = GenerationError::from_status(403, Some("quota exceeded".into()));
        assert_eq!(err.to_string(), "quota exceeded");
        assert_eq!(err.code(), "NET-1001");
    }

    #[test]
    fn from_status_falls_back_to_generic_text() {
        let err = GenerationError::from_status(502, Some("   ".into()));
        assert_eq!(err.to_string(), "Request failed with status 502");
        let err = GenerationError::from_status(500, None);
        assert_eq!(err.to_string(), "Request failed with status 500");
    }
}
