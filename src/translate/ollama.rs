use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;
use tracing::{debug, info};

use crate::config::TranslateConfig;
use crate::error::{Result, SubtrixError};
use super::Translator;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateRequest {
    pub model: String,
    pub prompt: String,
    pub stream: bool,
    pub format: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateResponse {
    pub response: String,
    #[serde(default)]
    pub done: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranslationResult {
    pub text: String,
}

/// Translator backed by a local Ollama model
pub struct OllamaTranslator {
    client: Client,
    config: TranslateConfig,
}

impl OllamaTranslator {
    pub fn new(config: TranslateConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self { client, config })
    }

    fn generate_url(&self) -> String {
        format!("{}/api/generate", self.config.endpoint.trim_end_matches('/'))
    }
}

#[async_trait]
impl Translator for OllamaTranslator {
    async fn translate(&self, text: &str, source_language: &str, target_language: &str) -> Result<String> {
        let request = GenerateRequest {
            model: self.config.model.clone(),
            prompt: build_translation_prompt(text, source_language, target_language),
            stream: false,
            format: "json".to_string(),
        };

        let url = self.generate_url();
        debug!("Sending translation request to: {}", url);

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| SubtrixError::Translation(format!("HTTP request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(SubtrixError::Translation(format!(
                "Ollama API error {}: {}",
                status, error_text
            )));
        }

        let generated: GenerateResponse = response
            .json()
            .await
            .map_err(|e| SubtrixError::Translation(format!("Failed to parse response: {}", e)))?;

        let raw_response = generated.response.trim();
        debug!("Raw Ollama response: {}", raw_response);

        extract_translation(raw_response)
    }
}

/// Build a JSON-mode translation prompt
fn build_translation_prompt(text: &str, source_language: &str, target_language: &str) -> String {
    let source_name = language_code_to_name(source_language);
    let target_name = language_code_to_name(target_language);

    format!(
        "You are a professional subtitle translator.\n\
         \n\
         Translate the subtitle below from {} to {} ONLY. Do not translate to any other language.\n\
         The target language is: {} (language code: {})\n\
         Keep it short enough to read on screen.\n\
         \n\
         Return ONLY the translation in JSON format as {{\"text\":\"your {} translation here\"}}.\n\
         Do not include any explanations, alternatives, or text in other languages.\n\
         \n\
         Subtitle: \"{}\"\n",
        source_name, target_name, target_name, target_language, target_name, text
    )
}

/// Pull the translation out of a model reply, preferring the JSON payload
fn extract_translation(raw_response: &str) -> Result<String> {
    if raw_response.is_empty() {
        return Err(SubtrixError::Translation("Empty translation received".to_string()));
    }

    if let Ok(result) = serde_json::from_str::<TranslationResult>(raw_response) {
        let text = result.text.trim();
        if text.is_empty() {
            return Err(SubtrixError::Translation("Empty translation received".to_string()));
        }
        return Ok(text.to_string());
    }

    Ok(clean_translation_response(raw_response))
}

/// Strip chatty preambles a model may add around a plain-text answer
fn clean_translation_response(response: &str) -> String {
    let is_chatter = |line: &str| {
        line.starts_with("Here are")
            || line.starts_with("Here is")
            || line.starts_with("Option")
            || line.starts_with("**Option")
            || line.starts_with("Translation:")
            || line.starts_with("- ")
            || line.starts_with("* ")
            || (line.starts_with("**") && line.ends_with("**"))
    };

    response
        .lines()
        .map(str::trim)
        .find(|line| line.chars().count() > 3 && !is_chatter(line))
        .or_else(|| response.lines().map(str::trim).find(|line| !line.is_empty()))
        .unwrap_or(response)
        .to_string()
}

/// Full language name for a code, used to make prompts unambiguous
pub fn language_code_to_name(code: &str) -> String {
    let lower = code.to_lowercase();
    let primary = lower.split(['-', '_']).next().unwrap_or_default();

    let name = match primary {
        "en" => "English",
        "ms" => "Malay",
        "zh" => "Chinese (Simplified)",
        "ta" => "Tamil",
        "id" => "Indonesian",
        "ja" => "Japanese",
        "ko" => "Korean",
        "th" => "Thai",
        "vi" => "Vietnamese",
        "hi" => "Hindi",
        "bn" => "Bengali",
        "te" => "Telugu",
        "ml" => "Malayalam",
        "fr" => "French",
        "de" => "German",
        "es" => "Spanish",
        "pt" => "Portuguese",
        "it" => "Italian",
        "nl" => "Dutch",
        "ru" => "Russian",
        "ar" => "Arabic",
        "tr" => "Turkish",
        _ => return code.to_string(),
    };

    if lower == "zh-tw" || lower == "zh-hk" {
        return "Chinese (Traditional)".to_string();
    }
    name.to_string()
}

/// Check if Ollama is available and the model is loaded
pub async fn check_ollama_availability(endpoint: &str, model: &str) -> Result<()> {
    let client = Client::new();
    let url = format!("{}/api/show", endpoint.trim_end_matches('/'));

    let response = client
        .post(&url)
        .json(&json!({ "name": model }))
        .send()
        .await
        .map_err(|e| SubtrixError::Translation(format!("Failed to connect to Ollama: {}", e)))?;

    if response.status().is_success() {
        info!("Ollama model '{}' is available", model);
        Ok(())
    } else {
        Err(SubtrixError::Translation(format!(
            "Ollama model '{}' not found. Please pull the model first: ollama pull {}",
            model, model
        )))
    }
}
