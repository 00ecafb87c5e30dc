//! OpenAI-compatible chat completion client.
//!
//! Speaks the non-streaming `/v1/chat/completions` contract: one POST, one
//! JSON body back. The reply reservation from [`ChatConfig`] is sent as
//! `max_tokens`, which is what keeps the provider inside the token budget
//! the window was packed against.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{ChatCompletionClient, CompletionReply, CompletionRequest};
use crate::config::ChatConfig;
use crate::error::{CompanionError, Result};

/// Client for any server exposing the OpenAI chat completions API.
pub struct OpenAiChatClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
}

impl OpenAiChatClient {
    /// Build a client from chat configuration.
    ///
    /// Fails with a config error when no API key is present.
    pub fn new(config: &ChatConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .as_deref()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| CompanionError::Config("chat.api_key is not set".to_owned()))?
            .to_owned();
        Ok(Self {
            client: reqwest::Client::new(),
            base_url: config.base_url.trim_end_matches('/').to_owned(),
            api_key,
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.reply_reserve_tokens,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/v1/chat/completions", self.base_url)
    }

    /// Map a non-success HTTP response to the appropriate error class.
    fn map_http_error(status: reqwest::StatusCode, body: &str) -> CompanionError {
        let parsed = serde_json::from_str::<WireErrorBody>(body)
            .ok()
            .and_then(|b| b.error);
        let message = parsed
            .as_ref()
            .and_then(|e| e.message.clone())
            .unwrap_or_else(|| format!("HTTP {}: {body}", status.as_u16()));

        match status.as_u16() {
            401 | 403 => CompanionError::Auth(message),
            _ => CompanionError::Provider {
                message,
                kind: parsed.as_ref().and_then(|e| e.kind.clone()),
                code: parsed.and_then(|e| e.code),
            },
        }
    }
}

#[async_trait]
impl ChatCompletionClient for OpenAiChatClient {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionReply> {
        let mut messages = Vec::with_capacity(request.history.len() + 2);
        if let Some(system) = request.system_prompt.as_deref() {
            messages.push(WireMessage {
                role: "system",
                content: system.to_owned(),
            });
        }
        for entry in &request.history {
            messages.push(WireMessage {
                role: entry.role.as_str(),
                content: entry.text.clone(),
            });
        }
        messages.push(WireMessage {
            role: "user",
            content: request.user_message,
        });

        let body = WireRequest {
            model: &self.model,
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            messages,
        };

        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| CompanionError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Self::map_http_error(status, &body));
        }

        let parsed: WireResponse = response
            .json()
            .await
            .map_err(|e| CompanionError::Provider {
                message: format!("malformed completion response: {e}"),
                kind: None,
                code: None,
            })?;

        let text = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default();
        let (completion_tokens, prompt_tokens) = match parsed.usage {
            Some(usage) => (usage.completion_tokens, usage.prompt_tokens),
            None => (None, None),
        };

        Ok(CompletionReply {
            text,
            completion_tokens,
            prompt_tokens,
        })
    }
}

// ── Wire types ────────────────────────────────────────────────

#[derive(Serialize)]
struct WireRequest<'a> {
    model: &'a str,
    temperature: f32,
    max_tokens: u32,
    messages: Vec<WireMessage<'a>>,
}

#[derive(Serialize)]
struct WireMessage<'a> {
    role: &'a str,
    content: String,
}

#[derive(Deserialize)]
struct WireResponse {
    #[serde(default)]
    choices: Vec<WireChoice>,
    usage: Option<WireUsage>,
}

#[derive(Deserialize)]
struct WireChoice {
    message: WireChoiceMessage,
}

#[derive(Deserialize)]
struct WireChoiceMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct WireUsage {
    prompt_tokens: Option<u32>,
    completion_tokens: Option<u32>,
}

#[derive(Deserialize)]
struct WireErrorBody {
    error: Option<WireErrorInner>,
}

#[derive(Deserialize)]
struct WireErrorInner {
    message: Option<String>,
    #[serde(rename = "type")]
    kind: Option<String>,
    code: Option<String>,
}
