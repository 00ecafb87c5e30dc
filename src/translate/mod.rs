//! Reply translation contract.
//!
//! Translation is optional per session: when no client is configured the
//! reply proceeds to synthesis untranslated, and when a configured client
//! fails or returns blank the session falls back to the original text.

pub mod http;

use async_trait::async_trait;

use crate::error::Result;

/// Translation capability consumed by the session loop.
#[async_trait]
pub trait TranslationClient: Send + Sync {
    /// Translate `text` into the engine's spoken language.
    async fn translate(&self, text: &str) -> Result<String>;
}
