use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Configuration file path
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Generate subtitles for every language of one media file and cross-translate them
    Process {
        /// Input media file
        #[arg(short, long)]
        input: PathBuf,

        /// Source languages to transcribe (comma-separated, default: all configured)
        #[arg(short, long)]
        languages: Option<String>,

        /// Root directory for job output
        #[arg(short, long)]
        output_dir: Option<PathBuf>,

        /// Translation provider (ollama, tagging)
        #[arg(long)]
        translator: Option<String>,

        /// Print the final job status as JSON
        #[arg(long)]
        json: bool,
    },

    /// Process all media files in a directory
    Batch {
        /// Input directory containing media files
        #[arg(short, long)]
        input_dir: PathBuf,

        /// Source languages to transcribe (comma-separated, default: all configured)
        #[arg(short, long)]
        languages: Option<String>,

        /// Root directory for job output
        #[arg(short, long)]
        output_dir: Option<PathBuf>,

        /// Translation provider (ollama, tagging)
        #[arg(long)]
        translator: Option<String>,
    },

    /// Segment a stored Deepgram JSON response into a subtitle file
    Segment {
        /// Deepgram response JSON
        #[arg(short, long)]
        input: PathBuf,

        /// Language name or code of the transcript
        #[arg(short, long)]
        language: String,

        /// Output subtitle file (.srt or .vtt)
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Convert a subtitle file between SRT and WebVTT
    Convert {
        /// Input subtitle file
        #[arg(short, long)]
        input: PathBuf,

        /// Output subtitle file; the extension picks the format unless --format is given
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Output format (srt, vtt); without --output the input is rewritten next to itself
        #[arg(short, long)]
        format: Option<String>,
    },

    /// Translate one subtitle file, keeping its timing
    Translate {
        /// Input subtitle file
        #[arg(short, long)]
        input: PathBuf,

        /// Source language name or code
        #[arg(short, long)]
        source: String,

        /// Target languages (comma-separated)
        #[arg(short, long)]
        target_langs: String,

        /// Output directory (default: next to the input)
        #[arg(short, long)]
        output_dir: Option<PathBuf>,

        /// Translation provider (ollama, tagging)
        #[arg(long)]
        translator: Option<String>,
    },

    /// List configured languages
    Languages,

    /// Write the default configuration
    InitConfig {
        /// Destination file
        #[arg(short, long, default_value = "config.toml")]
        output: PathBuf,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Delete job output directories older than the retention period
    Clean {
        /// Age in hours (default: pipeline.retention_hours)
        #[arg(long)]
        hours: Option<u64>,

        /// Root directory for job output
        #[arg(short, long)]
        output_dir: Option<PathBuf>,
    },

    /// Manage the translation cache
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
}

#[derive(Subcommand)]
pub enum CacheAction {
    /// Clear all cached translations
    Clear,

    /// Show cache statistics
    Info,
}

/// Split a comma-separated language list, dropping blanks
pub fn parse_language_list(list: &str) -> Vec<String> {
    list.split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
        .collect()
}
