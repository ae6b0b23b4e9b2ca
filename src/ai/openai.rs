//! OpenAI-compatible chat completions client (OpenAI, DeepSeek, Ollama).

use std::future::Future;
use std::pin::Pin;

use anyhow::Result;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::error::ProviderError;
use super::{AiClient, AiClientMetadata};

/// Sampling temperature for commit message generation.
const TEMPERATURE: f32 = 0.3;

/// Commit messages are short; cap the response accordingly.
const MAX_TOKENS: u32 = 200;

/// Chat completions request message
#[derive(Serialize, Debug)]
struct Message<'a> {
    role: &'a str,
    content: &'a str,
}

/// Chat completions request body
#[derive(Serialize, Debug)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<Message<'a>>,
    temperature: f32,
    max_tokens: u32,
    stream: bool,
}

/// Chat completions response choice
#[derive(Deserialize, Debug)]
struct Choice {
    message: ResponseMessage,
}

/// Chat completions response message
#[derive(Deserialize, Debug)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Chat completions response
#[derive(Deserialize, Debug)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    model: Option<String>,
    usage: Option<Usage>,
}

/// Token usage statistics
#[derive(Deserialize, Debug)]
#[allow(dead_code)]
struct Usage {
    prompt_tokens: Option<u32>,
    completion_tokens: Option<u32>,
    total_tokens: Option<u32>,
}

/// Client for any OpenAI-compatible chat completions endpoint.
pub struct OpenAiAiClient {
    /// HTTP client for API requests
    client: Client,
    /// Display name of the backend
    provider: String,
    /// API key for authentication (absent for Ollama)
    api_key: Option<String>,
    /// Model identifier
    model: String,
    /// Base URL, e.g. "https://api.openai.com" or "http://localhost:11434"
    base_url: String,
    /// Whether the endpoint is outside the local machine
    remote: bool,
}

impl OpenAiAiClient {
    /// Creates a client for `base_url`.
    pub fn new(
        provider: String,
        model: String,
        api_key: Option<String>,
        base_url: String,
        remote: bool,
    ) -> Self {
        Self {
            client: Client::new(),
            provider,
            api_key,
            model,
            base_url,
            remote,
        }
    }

    /// Builds the full chat completions URL.
    fn api_url(&self) -> String {
        let base = self.base_url.trim_end_matches('/');
        let base = base.strip_suffix("/v1").unwrap_or(base);
        format!("{base}/v1/chat/completions")
    }
}

impl AiClient for OpenAiAiClient {
    fn send_request<'a>(
        &'a self,
        system_prompt: &'a str,
        user_prompt: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<String>> + Send + 'a>> {
        Box::pin(async move {
            let mut messages = Vec::with_capacity(2);
            if !system_prompt.is_empty() {
                messages.push(Message {
                    role: "system",
                    content: system_prompt,
                });
            }
            messages.push(Message {
                role: "user",
                content: user_prompt,
            });

            let request = ChatRequest {
                model: &self.model,
                messages,
                temperature: TEMPERATURE,
                max_tokens: MAX_TOKENS,
                stream: false,
            };

            let api_url = self.api_url();
            info!(
                url = %api_url,
                provider = %self.provider,
                model = %self.model,
                user_prompt_len = user_prompt.len(),
                "Sending request to OpenAI-compatible API"
            );

            let mut req_builder = self.client.post(&api_url).json(&request);
            if let Some(ref api_key) = self.api_key {
                req_builder = req_builder.bearer_auth(api_key);
            }

            let response = req_builder
                .send()
                .await
                .map_err(|e| ProviderError::Network(e.without_url().to_string()))?;

            let status = response.status();
            if !status.is_success() {
                let error_text = response.text().await.unwrap_or_default();
                return Err(ProviderError::from_status(status.as_u16(), &error_text).into());
            }

            let chat_response: ChatResponse = response
                .json()
                .await
                .map_err(|e| ProviderError::InvalidResponse(e.without_url().to_string()))?;

            debug!(
                choice_count = chat_response.choices.len(),
                model = ?chat_response.model,
                usage = ?chat_response.usage,
                "Received OpenAI-compatible API response"
            );

            chat_response
                .choices
                .into_iter()
                .next()
                .and_then(|choice| choice.message.content)
                .filter(|content| !content.trim().is_empty())
                .ok_or_else(|| {
                    ProviderError::InvalidResponse("No message content in response".to_string())
                        .into()
                })
        })
    }

    fn get_metadata(&self) -> AiClientMetadata {
        AiClientMetadata {
            provider: self.provider.clone(),
            model: self.model.clone(),
            remote: self.remote,
        }
    }
}
