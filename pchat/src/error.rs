//! Chat-layer errors, classification, and the user-facing turn outcome.

use std::error::Error;
use std::fmt::{Display, Formatter};

use pprovider::{ProviderError, ProviderErrorKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatErrorKind {
    QuotaExhausted,
    AllCredentialsExhausted,
    RequestFailed,
    InvalidRequest,
    ConversationNotFound,
    Store,
    NormalizationFailed,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatError {
    pub kind: ChatErrorKind,
    pub message: String,
    /// Status of the endpoint response behind a `RequestFailed`, when known.
    pub status: Option<u16>,
}

impl ChatError {
    pub fn new(kind: ChatErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            status: None,
        }
    }

    pub fn with_status(mut self, status: Option<u16>) -> Self {
        self.status = status;
        self
    }

    pub fn quota_exhausted(message: impl Into<String>) -> Self {
        Self::new(ChatErrorKind::QuotaExhausted, message)
    }

    pub fn all_credentials_exhausted(message: impl Into<String>) -> Self {
        Self::new(ChatErrorKind::AllCredentialsExhausted, message)
    }

    pub fn request_failed(message: impl Into<String>) -> Self {
        Self::new(ChatErrorKind::RequestFailed, message)
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(ChatErrorKind::InvalidRequest, message)
    }

    pub fn conversation_not_found(message: impl Into<String>) -> Self {
        Self::new(ChatErrorKind::ConversationNotFound, message)
    }

    pub fn store(message: impl Into<String>) -> Self {
        Self::new(ChatErrorKind::Store, message)
    }

    pub fn normalization_failed(message: impl Into<String>) -> Self {
        Self::new(ChatErrorKind::NormalizationFailed, message)
    }

    pub fn cancelled(message: impl Into<String>) -> Self {
        Self::new(ChatErrorKind::Cancelled, message)
    }

    /// Message suitable for showing to an end user. Never contains a raw status code.
    pub fn user_message(&self) -> &'static str {
        match self.kind {
            ChatErrorKind::QuotaExhausted => {
                "Every API key has reached its rate limit. Please try again in a minute."
            }
            ChatErrorKind::AllCredentialsExhausted => {
                "No valid API key is left. Please check the configured keys."
            }
            ChatErrorKind::RequestFailed => {
                "The model service could not complete the request. Please try again later."
            }
            ChatErrorKind::InvalidRequest => "The message could not be sent as written.",
            ChatErrorKind::ConversationNotFound => "The conversation no longer exists.",
            ChatErrorKind::Store => "The conversation could not be saved.",
            ChatErrorKind::NormalizationFailed => "The reply could not be translated.",
            ChatErrorKind::Cancelled => "The request was cancelled.",
        }
    }
}

impl Display for ChatError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self.status {
            Some(status) => write!(f, "{:?} ({status}): {}", self.kind, self.message),
            None => write!(f, "{:?}: {}", self.kind, self.message),
        }
    }
}

impl Error for ChatError {}

impl From<ProviderError> for ChatError {
    fn from(value: ProviderError) -> Self {
        let kind = match value.kind {
            ProviderErrorKind::QuotaExhausted => ChatErrorKind::QuotaExhausted,
            ProviderErrorKind::CredentialsExhausted => ChatErrorKind::AllCredentialsExhausted,
            ProviderErrorKind::InvalidRequest if value.status.is_none() => {
                ChatErrorKind::InvalidRequest
            }
            _ => ChatErrorKind::RequestFailed,
        };

        ChatError::new(kind, value.to_string()).with_status(value.status)
    }
}

/// Structured result handed to the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnOutcome {
    Ok { text: String },
    Err { kind: ChatErrorKind, message: String },
}

impl TurnOutcome {
    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Ok { .. })
    }
}

impl<T> From<Result<T, ChatError>> for TurnOutcome
where
    T: Into<String>,
{
    fn from(value: Result<T, ChatError>) -> Self {
        match value {
            Ok(text) => Self::Ok { text: text.into() },
            Err(error) => Self::Err {
                kind: error.kind,
                message: error.user_message().to_string(),
            },
        }
    }
}
