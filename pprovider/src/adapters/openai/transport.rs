//! Chat-completions transport trait and reqwest-based HTTP implementation.

use std::pin::Pin;

use async_stream::try_stream;
use futures_core::Stream;
use futures_util::StreamExt;
use reqwest::{Client, Response};

use crate::{CredentialLease, LineBuffer, MAX_LINE_BYTES, ProviderError, ProviderFuture};

use super::serde_api::{
    OpenAiApiResponse, StreamLine, build_api_request, extract_error_message, parse_stream_line,
};
use super::types::{OpenAiRequest, OpenAiResponse, OpenAiStreamChunk};

/// Groq's OpenAI-compatible API root.
pub const DEFAULT_BASE_URL: &str = "https://api.groq.com/openai/v1";

pub type OpenAiChunkStream<'a> =
    Pin<Box<dyn Stream<Item = Result<OpenAiStreamChunk, ProviderError>> + Send + 'a>>;

pub trait OpenAiTransport: Send + Sync + std::fmt::Debug {
    fn complete<'a>(
        &'a self,
        request: OpenAiRequest,
        credential: CredentialLease,
    ) -> ProviderFuture<'a, Result<OpenAiResponse, ProviderError>>;

    fn stream<'a>(
        &'a self,
        request: OpenAiRequest,
        credential: CredentialLease,
    ) -> ProviderFuture<'a, Result<OpenAiChunkStream<'a>, ProviderError>>;
}

#[derive(Debug, Clone)]
pub struct OpenAiHttpTransport {
    client: Client,
    base_url: String,
}

impl OpenAiHttpTransport {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), path)
    }

    async fn send(
        &self,
        request: OpenAiRequest,
        credential: &CredentialLease,
    ) -> Result<Response, ProviderError> {
        let api_request = build_api_request(request)?;
        let response = self
            .client
            .post(self.endpoint("chat/completions"))
            .bearer_auth(credential.expose())
            .json(&api_request)
            .send()
            .await
            .map_err(|err| {
                if err.is_timeout() {
                    ProviderError::timeout(err.to_string())
                } else {
                    ProviderError::transport(err.to_string())
                }
            })?;

        if !response.status().is_success() {
            return Err(Self::parse_error(response).await);
        }

        Ok(response)
    }

    async fn parse_error(response: Response) -> ProviderError {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        let message = extract_error_message(&body)
            .unwrap_or_else(|| format!("chat completion request failed with status {status}"));

        ProviderError::from_status(status.as_u16(), message)
    }
}

impl OpenAiTransport for OpenAiHttpTransport {
    fn complete<'a>(
        &'a self,
        mut request: OpenAiRequest,
        credential: CredentialLease,
    ) -> ProviderFuture<'a, Result<OpenAiResponse, ProviderError>> {
        Box::pin(async move {
            request.stream = false;
            let model = request.model.clone();
            let response = self.send(request, &credential).await?;

            let parsed: OpenAiApiResponse = response
                .json()
                .await
                .map_err(|err| ProviderError::transport(err.to_string()))?;

            parsed.into_response(&model)
        })
    }

    fn stream<'a>(
        &'a self,
        mut request: OpenAiRequest,
        credential: CredentialLease,
    ) -> ProviderFuture<'a, Result<OpenAiChunkStream<'a>, ProviderError>> {
        Box::pin(async move {
            request.stream = true;
            let response = self.send(request, &credential).await?;

            let stream = try_stream! {
                let mut chunks = response.bytes_stream();
                let mut lines = LineBuffer::new();
                let mut finished = false;

                while let Some(item) = chunks.next().await {
                    let bytes = item.map_err(|err| ProviderError::transport(err.to_string()))?;
                    lines.push(&bytes);

                    while let Some(line) = lines.next_line() {
                        match parse_stream_line(&line) {
                            StreamLine::Done => {
                                finished = true;
                                break;
                            }
                            StreamLine::Delta(text) => {
                                yield OpenAiStreamChunk::TextDelta(text);
                            }
                            StreamLine::Malformed(reason) => {
                                yield OpenAiStreamChunk::Malformed { reason };
                            }
                            StreamLine::Ignored | StreamLine::Empty => {}
                        }
                    }

                    if lines.take_overflow() {
                        yield OpenAiStreamChunk::Malformed { reason: overflow_reason() };
                    }

                    if finished {
                        break;
                    }
                }

                if !finished {
                    if let Some(line) = lines.finish() {
                        match parse_stream_line(&line) {
                            StreamLine::Delta(text) => {
                                yield OpenAiStreamChunk::TextDelta(text);
                            }
                            StreamLine::Malformed(reason) => {
                                yield OpenAiStreamChunk::Malformed { reason };
                            }
                            StreamLine::Done | StreamLine::Ignored | StreamLine::Empty => {}
                        }
                    }
                    if lines.take_overflow() {
                        yield OpenAiStreamChunk::Malformed { reason: overflow_reason() };
                    }
                }
            };

            Ok(Box::pin(stream) as OpenAiChunkStream<'a>)
        })
    }
}

fn overflow_reason() -> String {
    format!("stream line exceeded {MAX_LINE_BYTES} bytes")
}
