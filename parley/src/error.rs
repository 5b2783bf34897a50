//! Facade errors for configuration loading and runtime assembly.

use std::error::Error;
use std::fmt::{Display, Formatter};

use pchat::ChatError;
use pmemory::MemoryError;
use pprovider::ProviderError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeErrorKind {
    MissingSetting,
    InvalidSetting,
    Provider,
    Store,
    Chat,
    /// No tokio runtime was available for background tasks.
    NoRuntime,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeError {
    pub kind: RuntimeErrorKind,
    pub message: String,
}

impl RuntimeError {
    pub fn new(kind: RuntimeErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn missing_setting(message: impl Into<String>) -> Self {
        Self::new(RuntimeErrorKind::MissingSetting, message)
    }

    pub fn invalid_setting(message: impl Into<String>) -> Self {
        Self::new(RuntimeErrorKind::InvalidSetting, message)
    }

    pub fn no_runtime(message: impl Into<String>) -> Self {
        Self::new(RuntimeErrorKind::NoRuntime, message)
    }
}

impl Display for RuntimeError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.message)
    }
}

impl Error for RuntimeError {}

impl From<ProviderError> for RuntimeError {
    fn from(value: ProviderError) -> Self {
        Self::new(RuntimeErrorKind::Provider, value.to_string())
    }
}

impl From<MemoryError> for RuntimeError {
    fn from(value: MemoryError) -> Self {
        Self::new(RuntimeErrorKind::Store, value.to_string())
    }
}

impl From<ChatError> for RuntimeError {
    fn from(value: ChatError) -> Self {
        Self::new(RuntimeErrorKind::Chat, value.to_string())
    }
}
