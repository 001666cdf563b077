//! Error types for LLM provider calls.

use thiserror::Error;

/// Errors surfaced by a provider call.
///
/// Cancellation is not represented here: a cancelled call resolves normally.
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    /// The request exceeded its deadline.
    #[error("{provider} request timeout")]
    Timeout { provider: String },

    /// The backend rejected the credentials (HTTP 401).
    #[error("{provider} request failed with 401")]
    Unauthorized { provider: String },

    /// Any other non-2xx response.
    #[error("{provider} request failed with {status}")]
    Http {
        provider: String,
        status: u16,
        body: String,
    },

    /// Network-level failure, or a failure while reading the body.
    #[error("{provider} request failed: {message}")]
    Transport { provider: String, message: String },

    /// The provider needs an API key and none was configured.
    #[error("{0} API key is required")]
    MissingApiKey(String),

    /// Configuration cannot produce a working provider.
    #[error("Invalid provider configuration: {0}")]
    InvalidConfig(String),

    /// The request body could not be encoded.
    #[error("Failed to encode request body: {0}")]
    Encode(String),
}

impl ProviderError {
    /// True if the error should trigger re-authentication.
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, ProviderError::Unauthorized { .. })
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, ProviderError::Timeout { .. })
    }

    /// Map a reqwest error raised before any response was received.
    pub(crate) fn from_reqwest(provider: &str, err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ProviderError::Timeout {
                provider: provider.to_string(),
            }
        } else if let Some(status) = err.status() {
            ProviderError::from_status(provider, status.as_u16(), String::new())
        } else {
            ProviderError::Transport {
                provider: provider.to_string(),
                message: err.to_string(),
            }
        }
    }

    pub(crate) fn from_status(provider: &str, status: u16, body: String) -> Self {
        if status == 401 {
            ProviderError::Unauthorized {
                provider: provider.to_string(),
            }
        } else {
            ProviderError::Http {
                provider: provider.to_string(),
                status,
                body,
            }
        }
    }
}

/// Errors inside the event stream decoder.
#[derive(Debug, Error)]
pub enum StreamError {
    /// A payload could not be parsed; the event is dropped.
    #[error("Failed to decode event: {0}")]
    Decode(String),

    /// The underlying byte stream failed.
    #[error("Stream error: {0}")]
    Io(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert!(ProviderError::from_status("OpenAI", 401, String::new()).is_unauthorized());
        let err = ProviderError::from_status("OpenAI", 500, "boom".to_string());
        assert!(!err.is_unauthorized());
        assert_eq!(err.to_string(), "OpenAI request failed with 500");
    }

    #[test]
    fn test_messages() {
        let err = ProviderError::Timeout {
            provider: "OpenAI".to_string(),
        };
        assert_eq!(err.to_string(), "OpenAI request timeout");
        assert_eq!(
            ProviderError::MissingApiKey("OpenAI".to_string()).to_string(),
            "OpenAI API key is required"
        );
    }
}
