// Modular transcription architecture
//
// Speech recognition is an external service. This module defines the seam:
// - common: service-agnostic Word / Transcript model and the mapper trait
// - deepgram: Deepgram prerecorded-audio API client and JSON mapper
//
// To add a new transcription service:
// 1. Create service-specific data structures for parsing its JSON
// 2. Implement TranscriptMapper for them
// 3. Add the service to TranscriberImplementation
// 4. Update the factory to create your implementation

pub mod common;
pub mod deepgram;

use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;

pub use common::*;
use crate::config::TranscriberConfig;
use crate::error::{Result, SubtrixError};

/// Main trait for transcription operations
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Transcriber: Send + Sync {
    /// Transcribe an audio file in one language with the given recognition model
    async fn transcribe(&self, audio_path: &Path, language_code: &str, model: &str) -> Result<Transcript>;
}

/// Transcriber implementation type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TranscriberImplementation {
    Deepgram,
}

impl TranscriberImplementation {
    pub fn parse(name: &str) -> Result<Self> {
        match name.to_lowercase().as_str() {
            "deepgram" => Ok(Self::Deepgram),
            _ => Err(SubtrixError::Config(format!(
                "Unknown transcription service '{}'. Valid services: deepgram",
                name
            ))),
        }
    }
}

/// Factory for creating transcriber instances
pub struct TranscriberFactory;

impl TranscriberFactory {
    /// Create a transcriber based on the configured service
    pub fn create_transcriber(config: &TranscriberConfig) -> Result<Arc<dyn Transcriber>> {
        match TranscriberImplementation::parse(&config.service)? {
            TranscriberImplementation::Deepgram => {
                Ok(Arc::new(deepgram::DeepgramTranscriber::new(config.clone())?))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_implementation() {
        assert_eq!(
            TranscriberImplementation::parse("Deepgram").unwrap(),
            TranscriberImplementation::Deepgram
        );
        assert!(TranscriberImplementation::parse("whisper").is_err());
    }
}
