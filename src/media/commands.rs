use std::path::Path;
use tokio::process::Command;
use tracing::debug;

use crate::error::{Result, SubtrixError};

/// An ffmpeg invocation assembled argument by argument
#[derive(Debug, Clone)]
pub struct MediaCommand {
    pub binary_path: String,
    pub args: Vec<String>,
    pub description: String,
}

impl MediaCommand {
    pub fn new<S1: Into<String>, S2: Into<String>>(binary_path: S1, description: S2) -> Self {
        Self {
            binary_path: binary_path.into(),
            args: Vec::new(),
            description: description.into(),
        }
    }

    pub fn arg<S: Into<String>>(mut self, arg: S) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn input<P: AsRef<Path>>(self, path: P) -> Self {
        self.arg("-i").arg(path.as_ref().to_string_lossy().to_string())
    }

    pub fn output<P: AsRef<Path>>(self, path: P) -> Self {
        self.arg(path.as_ref().to_string_lossy().to_string())
    }

    pub fn overwrite(self) -> Self {
        self.arg("-y")
    }

    pub fn quiet(self) -> Self {
        self.arg("-hide_banner").arg("-loglevel").arg("error")
    }

    pub fn no_video(self) -> Self {
        self.arg("-vn")
    }

    pub fn audio_codec<S: Into<String>>(self, codec: S) -> Self {
        self.arg("-c:a").arg(codec)
    }

    pub fn audio_sample_rate(self, rate: u32) -> Self {
        self.arg("-ar").arg(rate.to_string())
    }

    pub fn audio_channels(self, channels: u32) -> Self {
        self.arg("-ac").arg(channels.to_string())
    }

    pub fn format<S: Into<String>>(self, format: S) -> Self {
        self.arg("-f").arg(format)
    }

    /// Run to completion and return stdout
    pub async fn execute(&self) -> Result<String> {
        debug!("Executing {}: {} {:?}", self.description, self.binary_path, self.args);

        let output = Command::new(&self.binary_path)
            .args(&self.args)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| SubtrixError::Media(format!("Failed to execute {}: {}", self.binary_path, e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(SubtrixError::Media(format!(
                "{} failed ({}): {}",
                self.description,
                output.status,
                stderr.trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

/// Builds the ffmpeg commands the pipeline needs
#[derive(Debug, Clone)]
pub struct MediaCommandBuilder {
    binary_path: String,
}

impl MediaCommandBuilder {
    pub fn new<S: Into<String>>(binary_path: S) -> Self {
        Self {
            binary_path: binary_path.into(),
        }
    }

    /// Mono 16-bit PCM WAV at the given sample rate, as speech recognizers expect
    pub fn extract_audio<P: AsRef<Path>, Q: AsRef<Path>>(
        &self,
        media_path: P,
        audio_path: Q,
        sample_rate: u32,
    ) -> MediaCommand {
        MediaCommand::new(&self.binary_path, "Audio extraction")
            .quiet()
            .input(media_path)
            .no_video()
            .audio_codec("pcm_s16le")
            .audio_sample_rate(sample_rate)
            .audio_channels(1)
            .format("wav")
            .overwrite()
            .output(audio_path)
    }

    pub fn version_check(&self) -> MediaCommand {
        MediaCommand::new(&self.binary_path, "Version check").arg("-version")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_audio_arguments() {
        let command = MediaCommandBuilder::new("ffmpeg").extract_audio("in/movie.mp4", "tmp/audio.wav", 16000);

        assert_eq!(command.binary_path, "ffmpeg");
        let args = command.args.join(" ");
        assert!(args.contains("-i in/movie.mp4"));
        assert!(args.contains("-vn"));
        assert!(args.contains("-c:a pcm_s16le"));
        assert!(args.contains("-ar 16000"));
        assert!(args.contains("-ac 1"));
        assert!(args.contains("-f wav"));
        assert_eq!(command.args.last().map(String::as_str), Some("tmp/audio.wav"));
    }

    #[tokio::test]
    async fn test_missing_binary_is_a_media_error() {
        let result = MediaCommandBuilder::new("definitely-not-an-ffmpeg-binary")
            .version_check()
            .execute()
            .await;
        assert!(matches!(result, Err(SubtrixError::Media(_))));
    }
}
