use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Result, SubtrixError};
use crate::language::{default_profiles, find_profile, LanguageProfile};
use crate::segment::CaptionConfig;

fn default_max_concurrent_transcriptions() -> usize {
    2
}

fn default_max_concurrent_translations() -> usize {
    4
}

fn default_retention_hours() -> u64 {
    24
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub transcriber: TranscriberConfig,
    pub translate: TranslateConfig,
    #[serde(default)]
    pub captions: CaptionConfig,
    pub pipeline: PipelineConfig,
    pub media: MediaConfig,
    /// Languages a job may be asked to transcribe
    #[serde(default = "default_profiles")]
    pub languages: Vec<LanguageProfile>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriberConfig {
    /// Transcription service (currently: deepgram)
    pub service: String,
    /// Service base URL
    pub endpoint: String,
    /// Environment variable holding the API key
    pub api_key_env: String,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranslateConfig {
    /// Translation backend
    pub provider: TranslationProvider,
    /// Ollama endpoint URL
    pub endpoint: String,
    /// LLM model to use for translation
    pub model: String,
    /// Maximum retries for a failed cue translation
    pub max_retries: u32,
    /// Request timeout in seconds
    pub timeout_secs: u64,
    /// Directory for the persistent translation cache; disabled when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TranslationProvider {
    /// Ollama: translate with a local LLM
    Ollama,
    /// Tagging: prefix text with the target language, for dry runs
    Tagging,
}

impl TranslationProvider {
    pub fn parse(name: &str) -> Result<Self> {
        match name.to_lowercase().as_str() {
            "ollama" => Ok(Self::Ollama),
            "tagging" | "tag" => Ok(Self::Tagging),
            _ => Err(SubtrixError::Config(format!(
                "Invalid translation provider '{}'. Valid providers: ollama, tagging",
                name
            ))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Languages transcribed at the same time
    #[serde(default = "default_max_concurrent_transcriptions")]
    pub max_concurrent_transcriptions: usize,
    /// Translation pairs processed at the same time
    #[serde(default = "default_max_concurrent_translations")]
    pub max_concurrent_translations: usize,
    /// Hours a finished job stays queryable
    #[serde(default = "default_retention_hours")]
    pub retention_hours: u64,
    /// Report jobs with any failed language or pair as PartiallyFailed instead of Done
    #[serde(default)]
    pub report_partial_failure: bool,
    /// Root directory for job output (`<output_dir>/<job id>/subtitles`)
    pub output_dir: PathBuf,
    /// Where per-job scratch directories for extracted audio are created; system temp dir when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub work_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaConfig {
    /// Path to ffmpeg binary
    pub binary_path: String,
    /// Sample rate of the extracted audio
    pub sample_rate: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            transcriber: TranscriberConfig {
                service: "deepgram".to_string(),
                endpoint: "https://api.deepgram.com".to_string(),
                api_key_env: "DEEPGRAM_API_KEY".to_string(),
                timeout_secs: 600,
            },
            translate: TranslateConfig {
                provider: TranslationProvider::Ollama,
                endpoint: "http://localhost:11434".to_string(),
                model: "llama3.2:3b".to_string(),
                max_retries: 3,
                timeout_secs: 300,
                cache_dir: Some(PathBuf::from(".subtrix/cache/translations")),
            },
            captions: CaptionConfig::default(),
            pipeline: PipelineConfig {
                max_concurrent_transcriptions: default_max_concurrent_transcriptions(),
                max_concurrent_translations: default_max_concurrent_translations(),
                retention_hours: default_retention_hours(),
                report_partial_failure: false,
                output_dir: PathBuf::from("tmp"),
                work_dir: None,
            },
            media: MediaConfig {
                binary_path: "ffmpeg".to_string(),
                sample_rate: 16000,
            },
            languages: default_profiles(),
        }
    }
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| SubtrixError::Config(format!("Failed to read config file: {}", e)))?;

        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| SubtrixError::Config(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, content)
            .map_err(|e| SubtrixError::Config(format!("Failed to write config file: {}", e)))?;

        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        self.captions.validate()?;

        if self.pipeline.max_concurrent_transcriptions == 0 || self.pipeline.max_concurrent_translations == 0 {
            return Err(SubtrixError::Config("Concurrency limits must be positive".to_string()));
        }
        if self.languages.is_empty() {
            return Err(SubtrixError::Config("At least one language must be configured".to_string()));
        }
        for profile in &self.languages {
            profile.caption_config(&self.captions).validate()?;
        }

        Ok(())
    }

    /// Look up a configured language by name or code
    pub fn language(&self, language: &str) -> Option<&LanguageProfile> {
        find_profile(&self.languages, language)
    }

    /// Names of every configured language, in configuration order
    pub fn language_names(&self) -> Vec<String> {
        self.languages.iter().map(|p| p.name.clone()).collect()
    }

    /// Caption settings for a language, falling back to the shared defaults
    pub fn captions_for(&self, language: &str) -> CaptionConfig {
        match self.language(language) {
            Some(profile) => profile.caption_config(&self.captions),
            None => self.captions.clone(),
        }
    }
}
