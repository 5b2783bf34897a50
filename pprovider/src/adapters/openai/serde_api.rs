//! Chat-completions HTTP payload serde models and line parsing helpers.

use serde::{Deserialize, Serialize};

use crate::ProviderError;

use super::types::{OpenAiFinishReason, OpenAiMessage, OpenAiRequest, OpenAiResponse};

const DATA_PREFIX: &str = "data: ";
const DONE_SENTINEL: &str = "[DONE]";

pub(crate) fn build_api_request(request: OpenAiRequest) -> Result<OpenAiApiRequest, ProviderError> {
    let messages = request
        .messages
        .into_iter()
        .map(OpenAiApiMessage::from)
        .collect::<Vec<_>>();

    if messages.is_empty() {
        return Err(ProviderError::invalid_request(
            "chat completion request requires at least one message",
        ));
    }

    Ok(OpenAiApiRequest {
        model: request.model,
        messages,
        temperature: request.temperature,
        stream: request.stream,
    })
}

pub(crate) fn parse_finish_reason(value: Option<&str>) -> OpenAiFinishReason {
    match value {
        Some("stop") => OpenAiFinishReason::Stop,
        Some("length") => OpenAiFinishReason::Length,
        _ => OpenAiFinishReason::Other,
    }
}

pub(crate) fn extract_error_message(body: &str) -> Option<String> {
    let parsed = serde_json::from_str::<OpenAiApiErrorEnvelope>(body).ok()?;
    Some(parsed.error.message)
}

/// Classification of one line of a server-sent event body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum StreamLine {
    /// Blank lines, comments, and anything not starting with `data: `.
    Ignored,
    Done,
    Delta(String),
    /// A well-formed frame carrying no content, such as the role preamble.
    Empty,
    Malformed(String),
}

pub(crate) fn parse_stream_line(line: &str) -> StreamLine {
    let Some(payload) = line.strip_prefix(DATA_PREFIX) else {
        return StreamLine::Ignored;
    };

    if payload.contains(DONE_SENTINEL) {
        return StreamLine::Done;
    }

    match serde_json::from_str::<OpenAiApiStreamResponse>(payload) {
        Ok(parsed) => parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.delta.content)
            .filter(|content| !content.is_empty())
            .map(StreamLine::Delta)
            .unwrap_or(StreamLine::Empty),
        Err(err) => StreamLine::Malformed(err.to_string()),
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct OpenAiApiErrorEnvelope {
    pub error: OpenAiApiError,
}

#[derive(Debug, Deserialize)]
pub(crate) struct OpenAiApiError {
    pub message: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct OpenAiApiRequest {
    pub model: String,
    pub messages: Vec<OpenAiApiMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    pub stream: bool,
}

#[derive(Debug, Serialize)]
pub(crate) struct OpenAiApiMessage {
    pub role: &'static str,
    pub content: String,
}

impl From<OpenAiMessage> for OpenAiApiMessage {
    fn from(value: OpenAiMessage) -> Self {
        Self {
            role: value.role.as_str(),
            content: value.content,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct OpenAiApiResponse {
    #[serde(default)]
    pub model: Option<String>,
    pub choices: Vec<OpenAiApiChoice>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct OpenAiApiChoice {
    pub message: OpenAiApiAssistantMessage,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct OpenAiApiAssistantMessage {
    #[serde(default)]
    pub content: Option<String>,
}

impl OpenAiApiResponse {
    pub(crate) fn into_response(self, fallback_model: &str) -> Result<OpenAiResponse, ProviderError> {
        let choice = self.choices.into_iter().next().ok_or_else(|| {
            ProviderError::transport("chat completion response did not include choices")
        })?;

        Ok(OpenAiResponse {
            model: self.model.unwrap_or_else(|| fallback_model.to_string()),
            content: choice.message.content.unwrap_or_default(),
            finish_reason: parse_finish_reason(choice.finish_reason.as_deref()),
        })
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct OpenAiApiStreamResponse {
    #[serde(default)]
    pub choices: Vec<OpenAiApiStreamChoice>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct OpenAiApiStreamChoice {
    #[serde(default)]
    pub delta: OpenAiApiStreamDelta,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct OpenAiApiStreamDelta {
    #[serde(default)]
    pub content: Option<String>,
}
