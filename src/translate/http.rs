//! HTTP translation client.
//!
//! Speaks the LibreTranslate-compatible contract: POST `{base_url}/translate`
//! with `{q, source, target}` and an optional API key, `{translatedText}`
//! back.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::TranslationClient;
use crate::config::TranslationConfig;
use crate::error::{CompanionError, Result};

/// Client for a LibreTranslate-compatible translation endpoint.
pub struct HttpTranslationClient {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    source: String,
    target: String,
}

impl HttpTranslationClient {
    /// Build a client from translation configuration.
    ///
    /// Fails with a config error when no base URL is set.
    pub fn new(config: &TranslationConfig) -> Result<Self> {
        if config.base_url.trim().is_empty() {
            return Err(CompanionError::Config(
                "translation.base_url is not set".to_owned(),
            ));
        }
        Ok(Self {
            client: reqwest::Client::new(),
            base_url: config.base_url.trim_end_matches('/').to_owned(),
            api_key: config.api_key.clone(),
            source: config.source_lang.clone(),
            target: config.target_lang.clone(),
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/translate", self.base_url)
    }
}

#[async_trait]
impl TranslationClient for HttpTranslationClient {
    async fn translate(&self, text: &str) -> Result<String> {
        let body = WireRequest {
            q: text,
            source: &self.source,
            target: &self.target,
            format: "text",
            api_key: self.api_key.as_deref(),
        };

        let response = self
            .client
            .post(self.endpoint())
            .json(&body)
            .send()
            .await
            .map_err(|e| CompanionError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = format!("HTTP {}: {body}", status.as_u16());
            return Err(match status.as_u16() {
                401 | 403 => CompanionError::Auth(message),
                _ => CompanionError::Provider {
                    message,
                    kind: None,
                    code: Some(status.as_u16().to_string()),
                },
            });
        }

        let parsed: WireResponse = response
            .json()
            .await
            .map_err(|e| CompanionError::Provider {
                message: format!("malformed translation response: {e}"),
                kind: None,
                code: None,
            })?;
        Ok(parsed.translated_text)
    }
}

#[derive(Serialize)]
struct WireRequest<'a> {
    q: &'a str,
    source: &'a str,
    target: &'a str,
    format: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    api_key: Option<&'a str>,
}

#[derive(Deserialize)]
struct WireResponse {
    #[serde(rename = "translatedText")]
    translated_text: String,
}
