use async_trait::async_trait;
use std::path::Path;
use tracing::{debug, info};

use crate::config::MediaConfig;
use crate::error::{Result, SubtrixError};
use super::{MediaCommandBuilder, MediaProcessor};

/// ffmpeg-backed media processor
pub struct FfmpegProcessor {
    config: MediaConfig,
    command_builder: MediaCommandBuilder,
}

impl FfmpegProcessor {
    pub fn new(config: MediaConfig) -> Self {
        let command_builder = MediaCommandBuilder::new(&config.binary_path);

        Self {
            config,
            command_builder,
        }
    }
}

#[async_trait]
impl MediaProcessor for FfmpegProcessor {
    async fn extract_audio(&self, media_path: &Path, audio_path: &Path) -> Result<()> {
        if !media_path.exists() {
            return Err(SubtrixError::FileNotFound(media_path.display().to_string()));
        }
        info!("Extracting audio from {} to {}", media_path.display(), audio_path.display());

        self.command_builder
            .extract_audio(media_path, audio_path, self.config.sample_rate)
            .execute()
            .await?;

        let size = tokio::fs::metadata(audio_path).await.map(|m| m.len()).unwrap_or(0);
        if size == 0 {
            return Err(SubtrixError::Media(format!(
                "Audio extraction produced no audio for {}",
                media_path.display()
            )));
        }

        info!("Audio extraction completed ({} bytes)", size);
        Ok(())
    }

    async fn version_info(&self) -> Result<String> {
        debug!("Getting media processor version information");

        let stdout = self.command_builder.version_check().execute().await?;
        Ok(stdout.lines().next().unwrap_or("Unknown version").to_string())
    }
}
