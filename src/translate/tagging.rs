use async_trait::async_trait;

use crate::error::Result;
use super::Translator;

/// Marks text with its target language instead of translating it.
///
/// Produces `[<target>] <text>`, which keeps the whole pipeline runnable
/// without a translation service.
#[derive(Debug, Clone, Copy, Default)]
pub struct TaggingTranslator;

#[async_trait]
impl Translator for TaggingTranslator {
    async fn translate(&self, text: &str, _source_language: &str, target_language: &str) -> Result<String> {
        Ok(format!("[{}] {}", target_language, text))
    }
}
