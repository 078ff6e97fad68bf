//! Chat model provider implementations for docassist.
//!
//! All providers implement the `docassist_core::Provider` trait. The default
//! backend is Gemini, reached through its OpenAI-compatible endpoint.

pub mod openai_compat;

pub use openai_compat::OpenAiCompatProvider;

use docassist_config::AppConfig;
use docassist_core::error::ProviderError;

/// Build the configured provider.
pub fn from_config(config: &AppConfig) -> Result<OpenAiCompatProvider, ProviderError> {
    let api_key = config.api_key.clone().ok_or_else(|| {
        ProviderError::NotConfigured(
            "no API key; set DOCASSIST_API_KEY or GEMINI_API_KEY, or api_key in config.toml".into(),
        )
    })?;
    OpenAiCompatProvider::new("gemini", &config.api_url, api_key)
}
