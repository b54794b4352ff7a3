//! Model-client seam: the one trait the pipeline calls out through.
//!
//! The core never talks to a concrete API type; it submits a
//! [`ModelRequest`] through `dyn ModelClient` and gets raw text back. Tests
//! substitute a scripted stub, production uses [`OpenAiClient`] against any
//! OpenAI-compatible endpoint (OpenRouter, Azure, a local gateway).
//!
//! Every call is treated as fallible and potentially slow. The pipeline
//! applies its own request-level timeout via [`submit_timed`] and never
//! assumes success, ordering, or bounded latency.

use crate::error::UnitError;
use async_openai::{
    config::OpenAIConfig,
    types::chat::{
        ChatCompletionRequestMessage, ChatCompletionRequestMessageContentPartImage,
        ChatCompletionRequestMessageContentPartText, ChatCompletionRequestSystemMessageArgs,
        ChatCompletionRequestUserMessageArgs, ChatCompletionRequestUserMessageContent,
        ChatCompletionRequestUserMessageContentPart, CreateChatCompletionRequestArgs, ImageDetail,
        ImageUrl,
    },
    Client,
};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use std::time::Duration;
use tracing::debug;

/// One request to the language model.
#[derive(Debug, Clone)]
pub enum ModelRequest {
    /// Image-plus-instruction payload (extraction). The response must be a
    /// JSON array conforming to the declared question schema.
    Vision {
        instruction: String,
        image_png: Vec<u8>,
    },
    /// Text-only prompt (classification). The response is free text
    /// expected to contain exactly one delimited label.
    Text { system: String, user: String },
}

/// Stateless request/response wrapper around a language-model API.
#[async_trait]
pub trait ModelClient: Send + Sync {
    /// Submit a request and return the raw response text.
    async fn submit(&self, request: &ModelRequest) -> Result<String, UnitError>;
}

/// Run `client.submit` under a request-level timeout.
///
/// A timeout counts as a failed attempt like any other model error; the
/// response, if one eventually arrives, is discarded.
pub async fn submit_timed(
    client: &dyn ModelClient,
    request: &ModelRequest,
    timeout: Duration,
) -> Result<String, UnitError> {
    match tokio::time::timeout(timeout, client.submit(request)).await {
        Ok(result) => result,
        Err(_) => Err(UnitError::Timeout {
            secs: timeout.as_secs(),
        }),
    }
}

/// [`ModelClient`] backed by the async-openai chat-completions API.
pub struct OpenAiClient {
    client: Client<OpenAIConfig>,
    model: String,
    temperature: f32,
    max_tokens: u32,
}

impl OpenAiClient {
    /// Create a client for an OpenAI-compatible endpoint.
    pub fn new(api_base: &str, api_key: &str, model: impl Into<String>) -> Self {
        let config = OpenAIConfig::new()
            .with_api_key(api_key)
            .with_api_base(api_base);
        Self {
            client: Client::with_config(config),
            model: model.into(),
            temperature: 0.5,
            max_tokens: 8_192,
        }
    }

    /// Override the sampling temperature (extraction runs hotter than
    /// classification).
    pub fn with_temperature(mut self, t: f32) -> Self {
        self.temperature = t.clamp(0.0, 2.0);
        self
    }

    /// Override the completion-token budget.
    pub fn with_max_tokens(mut self, n: u32) -> Self {
        self.max_tokens = n;
        self
    }

    fn build_messages(
        &self,
        request: &ModelRequest,
    ) -> Result<Vec<ChatCompletionRequestMessage>, UnitError> {
        let mut messages = Vec::new();

        match request {
            ModelRequest::Vision {
                instruction,
                image_png,
            } => {
                let parts: Vec<ChatCompletionRequestUserMessageContentPart> = vec![
                    ChatCompletionRequestUserMessageContentPart::Text(
                        ChatCompletionRequestMessageContentPartText {
                            text: instruction.clone(),
                        },
                    ),
                    ChatCompletionRequestUserMessageContentPart::ImageUrl(
                        ChatCompletionRequestMessageContentPartImage {
                            image_url: ImageUrl {
                                url: format!(
                                    "data:image/png;base64,{}",
                                    BASE64.encode(image_png)
                                ),
                                detail: Some(ImageDetail::High),
                            },
                        },
                    ),
                ];
                let user = ChatCompletionRequestUserMessageArgs::default()
                    .content(ChatCompletionRequestUserMessageContent::Array(parts))
                    .build()
                    .map_err(|e| UnitError::Model(e.to_string()))?;
                messages.push(ChatCompletionRequestMessage::User(user));
            }
            ModelRequest::Text { system, user } => {
                let sys = ChatCompletionRequestSystemMessageArgs::default()
                    .content(system.as_str())
                    .build()
                    .map_err(|e| UnitError::Model(e.to_string()))?;
                messages.push(ChatCompletionRequestMessage::System(sys));

                let usr = ChatCompletionRequestUserMessageArgs::default()
                    .content(user.as_str())
                    .build()
                    .map_err(|e| UnitError::Model(e.to_string()))?;
                messages.push(ChatCompletionRequestMessage::User(usr));
            }
        }

        Ok(messages)
    }
}

#[async_trait]
impl ModelClient for OpenAiClient {
    async fn submit(&self, request: &ModelRequest) -> Result<String, UnitError> {
        let messages = self.build_messages(request)?;

        let req = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(messages)
            .temperature(self.temperature)
            .max_tokens(self.max_tokens)
            .build()
            .map_err(|e| UnitError::Model(e.to_string()))?;

        let response = self
            .client
            .chat()
            .create(req)
            .await
            .map_err(|e| UnitError::Model(e.to_string()))?;

        let content = response
            .choices
            .first()
            .and_then(|choice| choice.message.content.clone())
            .ok_or_else(|| UnitError::Model(format!("empty response from {}", self.model)))?;

        debug!(model = %self.model, chars = content.len(), "model response received");
        Ok(content.trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct SlowStub;

    #[async_trait]
    impl ModelClient for SlowStub {
        async fn submit(&self, _request: &ModelRequest) -> Result<String, UnitError> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok("too late".into())
        }
    }

    struct CountingStub {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ModelClient for CountingStub {
        async fn submit(&self, _request: &ModelRequest) -> Result<String, UnitError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok("<subject>Power Systems</subject>".into())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn submit_timed_cuts_off_slow_calls() {
        let got = submit_timed(
            &SlowStub,
            &ModelRequest::Text {
                system: String::new(),
                user: String::new(),
            },
            Duration::from_secs(1),
        )
        .await;
        assert!(matches!(got, Err(UnitError::Timeout { secs: 1 })));
    }

    #[tokio::test]
    async fn submit_timed_passes_fast_responses_through() {
        let stub = CountingStub {
            calls: AtomicUsize::new(0),
        };
        let got = submit_timed(
            &stub,
            &ModelRequest::Text {
                system: "s".into(),
                user: "u".into(),
            },
            Duration::from_secs(5),
        )
        .await
        .unwrap();
        assert_eq!(got, "<subject>Power Systems</subject>");
        assert_eq!(stub.calls.load(Ordering::SeqCst), 1);
    }
}
