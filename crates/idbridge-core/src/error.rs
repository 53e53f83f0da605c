use thiserror::Error;

/// Raised synchronously while constructing an `AuthenticationClient`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required configuration: {0}")]
    MissingField(&'static str),

    #[error("AuthenticationClient must be created inside a Tokio runtime")]
    NoRuntime,
}

/// Failure reported by the credential broker while fetching or refreshing
/// credentials. Delivered to listeners through `AuthEvent::Deauthenticated`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CredentialError {
    #[error("Not authorized: {0}")]
    NotAuthorized(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Credential broker error: {0}")]
    Other(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    #[error("Storage backend error: {0}")]
    Backend(String),
}

/// Maximum length for broker messages carried inside errors
const MAX_ERROR_MESSAGE_LENGTH: usize = 500;

impl CredentialError {
    /// Truncate a broker message to avoid logging excessive data
    fn truncate_message(message: &str) -> String {
        if message.len() <= MAX_ERROR_MESSAGE_LENGTH {
            return message.to_string();
        }
        let mut end = MAX_ERROR_MESSAGE_LENGTH;
        while !message.is_char_boundary(end) {
            end -= 1;
        }
        format!(
            "{}... (truncated, {} total bytes)",
            &message[..end],
            message.len()
        )
    }

    /// Map a broker error code (as returned by federated identity services)
    /// onto a `CredentialError`. For `CredentialBroker` implementations.
    pub fn from_code(code: &str, message: &str) -> Self {
        let truncated = Self::truncate_message(message);
        match code {
            "NotAuthorizedException" | "AccessDeniedException" => {
                CredentialError::NotAuthorized(truncated)
            }
            "NetworkingError" | "TimeoutError" => CredentialError::Network(truncated),
            _ => CredentialError::Other(format!("{}: {}", code, truncated)),
        }
    }
}
