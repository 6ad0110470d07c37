// Modular translation architecture
//
// Machine translation is an external collaborator. Implementations:
// - ollama: translate with a local LLM over the Ollama HTTP API
// - tagging: prefix the text with the target language, for dry runs and tests
// - cache: decorator that memoizes any translator in memory and on disk

pub mod cache;
pub mod ollama;
pub mod tagging;

use async_trait::async_trait;
use std::sync::Arc;

pub use cache::{CachingTranslator, TranslationCache, TranslationCacheEntry};
pub use ollama::{check_ollama_availability, language_code_to_name, OllamaTranslator};
pub use tagging::TaggingTranslator;

use crate::config::{TranslateConfig, TranslationProvider};
use crate::error::Result;

/// Main trait for translation operations
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Translator: Send + Sync {
    /// Translate plain text between two language codes
    async fn translate(&self, text: &str, source_language: &str, target_language: &str) -> Result<String>;
}

/// Factory for creating translator instances
pub struct TranslatorFactory;

impl TranslatorFactory {
    /// Create a translator based on the configured provider
    pub fn create_translator(config: &TranslateConfig) -> Result<Arc<dyn Translator>> {
        match config.provider {
            TranslationProvider::Ollama => {
                let ollama: Arc<dyn Translator> = Arc::new(OllamaTranslator::new(config.clone())?);
                let cache = config.cache_dir.clone().map(TranslationCache::new);
                Ok(Arc::new(CachingTranslator::new(ollama, &config.model, cache)))
            }
            TranslationProvider::Tagging => Ok(Arc::new(TaggingTranslator)),
        }
    }
}
