//! Provider-agnostic request, response, and message model types.
//!
//! ```rust
//! use pprovider::{Message, ModelRequest, ProviderErrorKind, Role};
//!
//! let ok = ModelRequest::new_validated(
//!     "llama-3.3-70b-versatile",
//!     vec![Message::new(Role::User, "Explain recursion")],
//! );
//! assert!(ok.is_ok());
//!
//! let err = ModelRequest::new_validated("", vec![Message::new(Role::User, "hi")])
//!     .err()
//!     .expect("empty model should fail");
//! assert_eq!(err.kind, ProviderErrorKind::InvalidRequest);
//! ```

use pcommon::GenerationOptions;

use crate::ProviderError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ModelRequest {
    pub model: String,
    pub messages: Vec<Message>,
    pub temperature: Option<f32>,
    pub stream: bool,
}

impl ModelRequest {
    pub fn new(model: impl Into<String>, messages: Vec<Message>) -> Self {
        Self {
            model: model.into(),
            messages,
            temperature: None,
            stream: false,
        }
    }

    pub fn new_validated(
        model: impl Into<String>,
        messages: Vec<Message>,
    ) -> Result<Self, ProviderError> {
        let request = Self::new(model, messages);
        request.validate()?;
        Ok(request)
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_options(mut self, options: GenerationOptions) -> Self {
        if let Some(temperature) = options.temperature {
            self.temperature = Some(temperature);
        }
        self.stream = options.stream;
        self
    }

    pub fn enable_streaming(mut self) -> Self {
        self.stream = true;
        self
    }

    pub fn validate(&self) -> Result<(), ProviderError> {
        if self.model.trim().is_empty() {
            return Err(ProviderError::invalid_request("model must not be empty"));
        }

        if self.messages.is_empty() {
            return Err(ProviderError::invalid_request(
                "at least one message is required",
            ));
        }

        if let Some(temperature) = self.temperature {
            if !(0.0..=2.0).contains(&temperature) {
                return Err(ProviderError::invalid_request(
                    "temperature must be in the inclusive range 0.0..=2.0",
                ));
            }
        }

        Ok(())
    }
}

/// Complete, non-streamed assistant reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelResponse {
    pub model: String,
    pub content: String,
}

#[cfg(test)]
mod tests {
    use pcommon::GenerationOptions;

    use super::{Message, ModelRequest, Role};
    use crate::ProviderErrorKind;

    #[test]
    fn validate_rejects_out_of_range_temperature() {
        let request = ModelRequest::new("model", vec![Message::new(Role::User, "hi")])
            .with_temperature(2.5);

        let error = request.validate().expect_err("temperature should be rejected");
        assert_eq!(error.kind, ProviderErrorKind::InvalidRequest);
    }

    #[test]
    fn validate_rejects_empty_message_list() {
        let error = ModelRequest::new("model", Vec::new())
            .validate()
            .expect_err("empty messages should be rejected");
        assert_eq!(error.message, "at least one message is required");
    }

    #[test]
    fn with_options_applies_generation_settings() {
        let request = ModelRequest::new("model", vec![Message::new(Role::User, "hi")])
            .with_temperature(0.1)
            .with_options(GenerationOptions::default().enable_streaming());

        assert!(request.stream);
        assert_eq!(request.temperature, Some(0.1));
        assert_eq!(Role::Assistant.as_str(), "assistant");
    }
}
