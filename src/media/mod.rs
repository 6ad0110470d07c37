// Media processing
//
// Audio is pulled out of the submitted media with ffmpeg before transcription:
// - commands: argument builder and child-process execution
// - processor: ffmpeg implementation of MediaProcessor

pub mod commands;
pub mod processor;

use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;

pub use commands::*;
pub use processor::*;

use crate::config::MediaConfig;
use crate::error::Result;

/// Main trait for media processing operations
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MediaProcessor: Send + Sync {
    /// Extract speech-recognition-ready audio from a media file
    async fn extract_audio(&self, media_path: &Path, audio_path: &Path) -> Result<()>;

    /// First line of the processor's version banner; fails when it is not installed
    async fn version_info(&self) -> Result<String>;
}

/// Factory for creating media processor instances
pub struct MediaProcessorFactory;

impl MediaProcessorFactory {
    pub fn create_processor(config: MediaConfig) -> Arc<dyn MediaProcessor> {
        Arc::new(FfmpegProcessor::new(config))
    }
}
