//! Error types for chatline.
//!
//! A single error type covers the whole core: credential resolution,
//! HTTP status validation, response decoding, transport failures, and
//! user-initiated cancellation.
//!
//! No external error crates (anyhow, thiserror, eyre) are used in the library.

use std::fmt;

/// Errors that can occur while talking to a chat provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatError {
    /// The specific error that occurred
    pub kind: ChatErrorKind,
}

/// Specific error kinds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatErrorKind {
    /// No usable API key for the selected provider
    MissingCredential {
        /// Display name of the provider that needed the key
        provider: String,
    },
    /// Non-2xx status or an unusable endpoint
    InvalidResponse {
        /// HTTP status code, if a response was received
        status: Option<u16>,
        /// Description of what was wrong
        message: String,
    },
    /// Response body did not match the expected schema
    DecodeFailure {
        /// Description of the decode failure
        message: String,
    },
    /// Generation was stopped by the user
    StreamCancelled,
    /// Connection failure, timeout, or a dropped stream
    TransportFailure {
        /// Description of the transport failure
        message: String,
    },
    /// Invalid configuration or caller input
    InvalidConfig {
        /// The field that was invalid
        field: String,
        /// Why it was invalid
        reason: String,
    },
}

impl ChatError {
    /// Creates a new ChatError with the given kind.
    #[must_use]
    pub fn new(kind: ChatErrorKind) -> Self {
        Self { kind }
    }

    /// Creates a missing credential error.
    #[must_use]
    pub fn missing_credential(provider: impl Into<String>) -> Self {
        Self::new(ChatErrorKind::MissingCredential {
            provider: provider.into(),
        })
    }

    /// Creates an invalid response error for a received HTTP status.
    #[must_use]
    pub fn invalid_status(status: u16, message: impl Into<String>) -> Self {
        Self::new(ChatErrorKind::InvalidResponse {
            status: Some(status),
            message: message.into(),
        })
    }

    /// Creates an invalid response error that has no HTTP status (e.g. a bad endpoint).
    #[must_use]
    pub fn invalid_response(message: impl Into<String>) -> Self {
        Self::new(ChatErrorKind::InvalidResponse {
            status: None,
            message: message.into(),
        })
    }

    /// Creates a decode failure error.
    #[must_use]
    pub fn decode(message: impl Into<String>) -> Self {
        Self::new(ChatErrorKind::DecodeFailure {
            message: message.into(),
        })
    }

    /// Creates a stream cancelled error.
    #[must_use]
    pub fn cancelled() -> Self {
        Self::new(ChatErrorKind::StreamCancelled)
    }

    /// Creates a transport failure error.
    #[must_use]
    pub fn transport(message: impl Into<String>) -> Self {
        Self::new(ChatErrorKind::TransportFailure {
            message: message.into(),
        })
    }

    /// Creates an invalid config error.
    #[must_use]
    pub fn invalid_config(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::new(ChatErrorKind::InvalidConfig {
            field: field.into(),
            reason: reason.into(),
        })
    }

    /// Returns true if this error represents a user-initiated stop.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self.kind, ChatErrorKind::StreamCancelled)
    }

    /// Returns true if no credential was available.
    #[must_use]
    pub fn is_missing_credential(&self) -> bool {
        matches!(self.kind, ChatErrorKind::MissingCredential { .. })
    }

    /// Returns true if this is a transport-level failure.
    #[must_use]
    pub fn is_transport(&self) -> bool {
        matches!(self.kind, ChatErrorKind::TransportFailure { .. })
    }

    /// Returns the HTTP status attached to an invalid response, if any.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match &self.kind {
            ChatErrorKind::InvalidResponse { status, .. } => *status,
            _ => None,
        }
    }
}

impl fmt::Display for ChatError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ChatErrorKind::MissingCredential { provider } => {
                write!(
                    f,
                    "missing API key for {}; add a key in settings before chatting",
                    provider
                )
            }
            ChatErrorKind::InvalidResponse {
                status: Some(status),
                message,
            } => {
                write!(f, "server returned an invalid response (HTTP {}): {}", status, message)
            }
            ChatErrorKind::InvalidResponse {
                status: None,
                message,
            } => {
                write!(f, "server returned an invalid response: {}", message)
            }
            ChatErrorKind::DecodeFailure { message } => {
                write!(f, "failed to decode provider response: {}", message)
            }
            ChatErrorKind::StreamCancelled => {
                write!(f, "generation was stopped")
            }
            ChatErrorKind::TransportFailure { message } => {
                write!(
                    f,
                    "network error communicating with provider: {}; check network connectivity",
                    message
                )
            }
            ChatErrorKind::InvalidConfig { field, reason } => {
                write!(f, "invalid configuration for '{}': {}", field, reason)
            }
        }
    }
}

impl std::error::Error for ChatError {}

impl From<reqwest::Error> for ChatError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            ChatError::transport(format!("request timed out: {}", error))
        } else if error.is_connect() {
            ChatError::transport(format!("connection failed: {}", error))
        } else if error.is_builder() {
            ChatError::invalid_response(format!("could not build request: {}", error))
        } else {
            ChatError::transport(error.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_credential_display_names_provider() {
        let error = ChatError::missing_credential("Anthropic");

        let message = error.to_string();
        assert!(message.contains("missing API key"));
        assert!(message.contains("Anthropic"));
    }

    #[test]
    fn invalid_status_display_includes_code() {
        let error = ChatError::invalid_status(401, "invalid x-api-key");

        let message = error.to_string();
        assert!(message.contains("401"));
        assert!(message.contains("invalid x-api-key"));
        assert_eq!(error.status(), Some(401));
    }

    #[test]
    fn invalid_response_without_status() {
        let error = ChatError::invalid_response("bad endpoint");

        assert!(!error.to_string().contains("HTTP"));
        assert_eq!(error.status(), None);
    }

    #[test]
    fn cancelled_is_cancelled() {
        assert!(ChatError::cancelled().is_cancelled());
        assert!(!ChatError::transport("reset").is_cancelled());
    }

    #[test]
    fn transport_display_mentions_network() {
        let error = ChatError::transport("connection reset by peer");

        let message = error.to_string();
        assert!(message.contains("network error"));
        assert!(message.contains("connection reset by peer"));
        assert!(error.is_transport());
    }

    #[test]
    fn decode_display() {
        let error = ChatError::decode("missing field `choices`");
        assert!(error.to_string().contains("missing field `choices`"));
    }

    #[test]
    fn invalid_config_display() {
        let error = ChatError::invalid_config("providers.openai.model", "must not be empty");

        let message = error.to_string();
        assert!(message.contains("providers.openai.model"));
        assert!(message.contains("must not be empty"));
    }

    #[test]
    fn errors_are_clone_and_eq() {
        let error1 = ChatError::missing_credential("OpenAI");
        let error2 = error1.clone();
        assert_eq!(error1, error2);
        assert!(error2.is_missing_credential());

        assert_ne!(error1, ChatError::cancelled());
    }
}
