use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

use crate::config::TranscriberConfig;
use crate::error::{Result, SubtrixError};
use super::{Transcriber, common::{Transcript, TranscriptMapper, Utterance, Word}};

/// Deepgram prerecorded transcription response (only the fields used here)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeepgramResponse {
    pub results: Option<DeepgramResults>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeepgramResults {
    #[serde(default)]
    pub channels: Vec<DeepgramChannel>,
    #[serde(default)]
    pub utterances: Vec<DeepgramUtterance>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeepgramChannel {
    #[serde(default)]
    pub alternatives: Vec<DeepgramAlternative>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeepgramAlternative {
    #[serde(default)]
    pub transcript: String,
    #[serde(default)]
    pub confidence: f64,
    #[serde(default)]
    pub words: Vec<DeepgramWord>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeepgramWord {
    pub word: String,
    pub start: f64,
    pub end: f64,
    #[serde(default)]
    pub confidence: Option<f64>,
    #[serde(default)]
    pub punctuated_word: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeepgramUtterance {
    pub start: f64,
    pub end: f64,
    #[serde(default)]
    pub words: Vec<DeepgramWord>,
}

impl From<DeepgramWord> for Word {
    fn from(word: DeepgramWord) -> Self {
        let punctuated_text = word.punctuated_word.unwrap_or_else(|| word.word.clone());
        Word {
            text: word.word,
            start: word.start,
            end: word.end,
            punctuated_text,
            confidence: word.confidence,
        }
    }
}

/// Mapper for Deepgram responses
pub struct DeepgramMapper;

impl DeepgramMapper {
    /// Parse a stored Deepgram JSON response
    pub fn from_json(json: &str, language: &str) -> Result<Transcript> {
        let response: DeepgramResponse = serde_json::from_str(json)?;
        Self::to_transcript(response, language)
    }
}

impl TranscriptMapper<DeepgramResponse> for DeepgramMapper {
    fn to_transcript(response: DeepgramResponse, language: &str) -> Result<Transcript> {
        let results = response.results.ok_or_else(|| {
            SubtrixError::Transcription("Invalid response from Deepgram: missing results structure".to_string())
        })?;

        let alternative = results
            .channels
            .into_iter()
            .next()
            .and_then(|channel| channel.alternatives.into_iter().next())
            .ok_or_else(|| {
                SubtrixError::Transcription("Invalid response from Deepgram: no transcript alternatives".to_string())
            })?;

        let utterances = results
            .utterances
            .into_iter()
            .map(|u| Utterance {
                words: u.words.into_iter().map(Word::from).collect(),
            })
            .collect();

        Ok(Transcript {
            language: language.to_string(),
            confidence: alternative.confidence,
            words: alternative.words.into_iter().map(Word::from).collect(),
            utterances,
        })
    }
}

/// Deepgram speech-recognition client
pub struct DeepgramTranscriber {
    client: Client,
    config: TranscriberConfig,
    api_key: String,
}

impl DeepgramTranscriber {
    pub fn new(config: TranscriberConfig) -> Result<Self> {
        let api_key = std::env::var(&config.api_key_env).map_err(|_| {
            SubtrixError::Config(format!(
                "Deepgram API key not found: set the {} environment variable",
                config.api_key_env
            ))
        })?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            config,
            api_key,
        })
    }

    fn listen_url(&self) -> String {
        format!("{}/v1/listen", self.config.endpoint.trim_end_matches('/'))
    }
}

/// Query parameters for a prerecorded request
fn listen_query<'a>(language_code: &'a str, model: &'a str) -> Vec<(&'static str, &'a str)> {
    vec![
        ("model", model),
        ("language", language_code),
        ("smart_format", "true"),
        ("punctuate", "true"),
        ("utterances", "true"),
    ]
}

#[async_trait]
impl Transcriber for DeepgramTranscriber {
    async fn transcribe(&self, audio_path: &Path, language_code: &str, model: &str) -> Result<Transcript> {
        info!(
            "Transcribing {} with model {} and language {}",
            audio_path.display(),
            model,
            language_code
        );

        let audio = tokio::fs::read(audio_path).await.map_err(|e| {
            SubtrixError::Transcription(format!("Failed to read audio {}: {}", audio_path.display(), e))
        })?;
        if audio.is_empty() {
            return Err(SubtrixError::Transcription(format!(
                "Audio file {} is empty",
                audio_path.display()
            )));
        }

        let url = self.listen_url();
        debug!("Sending transcription request to: {}", url);

        let response = self
            .client
            .post(&url)
            .query(&listen_query(language_code, model))
            .header("Authorization", format!("Token {}", self.api_key))
            .header("Content-Type", "audio/wav")
            .body(audio)
            .send()
            .await
            .map_err(|e| SubtrixError::Transcription(format!("HTTP request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(SubtrixError::Transcription(format!(
                "Deepgram API error {}: {}",
                status, error_text
            )));
        }

        let payload: DeepgramResponse = response
            .json()
            .await
            .map_err(|e| SubtrixError::Transcription(format!("Failed to parse response: {}", e)))?;

        let transcript = DeepgramMapper::to_transcript(payload, language_code)?;
        info!(
            "Received {} words for {} (confidence {:.2})",
            transcript.words.len(),
            language_code,
            transcript.confidence
        );
        Ok(transcript)
    }
}
