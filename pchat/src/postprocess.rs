//! Reply language detection and normalization through the completion endpoint.
//!
//! ```rust
//! use pchat::needs_normalization;
//!
//! assert!(needs_normalization("Hello, how are you?"));
//! assert!(!needs_normalization("你好，世界"));
//! assert!(!needs_normalization("   "));
//! ```

use std::sync::Arc;

use pprovider::{CredentialLease, Message, ModelProvider, ModelRequest, Role};

use crate::ChatError;

pub const NORMALIZATION_TEMPERATURE: f32 = 0.3;

pub const NORMALIZATION_INSTRUCTION: &str = "You are a professional translation assistant. Please note:
1. Translate the English text into Simplified Chinese.
2. Stay professional and accurate.
3. Organize the content with Markdown.
4. If the content is a list, keep the list formatting.
5. Do not repeat content.
6. Do not append the original text after the translation.";

const MARKUP_CHARS: [char; 9] = ['#', '*', '`', '[', ']', '(', ')', '_', '-'];

/// True when more than half of the visible characters are ASCII letters,
/// ignoring Markdown markup.
pub fn needs_normalization(text: &str) -> bool {
    let mut letters = 0_usize;
    let mut visible = 0_usize;

    for ch in text.chars() {
        if MARKUP_CHARS.contains(&ch) || ch.is_whitespace() {
            continue;
        }
        visible += 1;
        if ch.is_ascii_alphabetic() {
            letters += 1;
        }
    }

    visible > 0 && letters * 2 > visible
}

pub fn translation_prompt(text: &str) -> String {
    format!("Translate the following content:\n\n{text}")
}

/// Rewrites reply text into the target language with a single non-streaming request.
#[derive(Clone)]
pub struct Normalizer {
    provider: Arc<dyn ModelProvider>,
    model: String,
}

impl Normalizer {
    pub fn new(provider: Arc<dyn ModelProvider>, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Uses `credential` as-is; the caller already holds it for the turn.
    pub async fn normalize(
        &self,
        text: &str,
        credential: CredentialLease,
    ) -> Result<String, ChatError> {
        let request = ModelRequest::new(
            self.model.clone(),
            vec![
                Message::new(Role::System, NORMALIZATION_INSTRUCTION),
                Message::new(Role::User, translation_prompt(text)),
            ],
        )
        .with_temperature(NORMALIZATION_TEMPERATURE);

        let response = self
            .provider
            .complete(request, credential)
            .await
            .map_err(|error| ChatError::normalization_failed(error.to_string()))?;

        if response.content.trim().is_empty() {
            return Err(ChatError::normalization_failed(
                "translation response was empty",
            ));
        }

        Ok(response.content)
    }
}

impl std::fmt::Debug for Normalizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Normalizer")
            .field("provider", &self.provider.name())
            .field("model", &self.model)
            .finish()
    }
}
