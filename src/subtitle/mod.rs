// Subtitle data model and text formats
//
// - srt: numbered-cue format, the canonical on-disk representation
// - vtt: WebVTT export for web players
//
// Both dialects are read by the same tolerant parser in `srt`.

pub mod srt;
pub mod vtt;

use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::fs;
use tracing::info;

pub use srt::{format_srt, format_timestamp, parse_srt, parse_timestamp};
pub use vtt::format_vtt;

use crate::error::{Result, SubtrixError};

/// One timed caption unit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cue {
    /// 1-based position in the track
    pub index: usize,
    pub start_time: f64,
    pub end_time: f64,
    pub lines: Vec<String>,
}

impl Cue {
    pub fn new(index: usize, start_time: f64, end_time: f64, lines: Vec<String>) -> Self {
        Self {
            index,
            start_time,
            end_time,
            lines,
        }
    }

    pub fn duration(&self) -> f64 {
        self.end_time - self.start_time
    }

    /// All lines joined into one sentence, as sent for translation
    pub fn joined_text(&self) -> String {
        self.lines
            .iter()
            .map(|l| l.trim())
            .filter(|l| !l.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Length of the longest line in characters
    pub fn max_line_chars(&self) -> usize {
        self.lines.iter().map(|l| l.chars().count()).max().unwrap_or(0)
    }
}

/// Ordered cues belonging to one language (or one translation pair) of a job
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SubtitleTrack {
    pub cues: Vec<Cue>,
}

impl SubtitleTrack {
    pub fn new(cues: Vec<Cue>) -> Self {
        Self { cues }
    }

    pub fn len(&self) -> usize {
        self.cues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cues.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Cue> {
        self.cues.iter()
    }

    /// Number of cues whose end runs past the next cue's start
    pub fn overlap_count(&self) -> usize {
        self.cues
            .windows(2)
            .filter(|pair| pair[0].end_time > pair[1].start_time)
            .count()
    }
}

/// On-disk subtitle dialect
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SubtitleFormat {
    Srt,
    Vtt,
}

impl SubtitleFormat {
    /// Pick the dialect from a file extension, defaulting to SRT
    pub fn from_path<P: AsRef<Path>>(path: P) -> Self {
        match path
            .as_ref()
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
            .as_deref()
        {
            Some("vtt") => Self::Vtt,
            _ => Self::Srt,
        }
    }

    pub fn parse(name: &str) -> Result<Self> {
        match name.to_lowercase().as_str() {
            "srt" => Ok(Self::Srt),
            "vtt" | "webvtt" => Ok(Self::Vtt),
            _ => Err(SubtrixError::Config(format!(
                "Invalid subtitle format '{}'. Valid formats: srt, vtt",
                name
            ))),
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            Self::Srt => "srt",
            Self::Vtt => "vtt",
        }
    }

    pub fn render(&self, track: &SubtitleTrack) -> String {
        match self {
            Self::Srt => format_srt(track),
            Self::Vtt => format_vtt(track),
        }
    }
}

/// Read and parse a subtitle file (SRT or WebVTT)
pub async fn read_track<P: AsRef<Path>>(path: P) -> Result<SubtitleTrack> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(SubtrixError::FileNotFound(path.display().to_string()));
    }

    let content = fs::read_to_string(path).await?;
    let track = parse_srt(&content);
    info!("Read {} cues from {}", track.len(), path.display());
    Ok(track)
}

/// Write a track, choosing the dialect from the file extension
pub async fn write_track<P: AsRef<Path>>(path: P, track: &SubtitleTrack) -> Result<()> {
    let path = path.as_ref();
    write_track_as(path, track, SubtitleFormat::from_path(path)).await
}

/// Write a track in the given dialect regardless of the file extension
pub async fn write_track_as<P: AsRef<Path>>(path: P, track: &SubtitleTrack, format: SubtitleFormat) -> Result<()> {
    let path = path.as_ref();

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).await?;
        }
    }

    fs::write(path, format.render(track)).await?;
    info!("Wrote {} cues to {}", track.len(), path.display());
    Ok(())
}
