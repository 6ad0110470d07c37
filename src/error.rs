use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum SubtrixError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Transcription error: {0}")]
    Transcription(String),

    #[error("Segmentation error: {0}")]
    Segmentation(String),

    #[error("Subtitle parse error: {0}")]
    FormatParse(String),

    #[error("Translation error: {0}")]
    Translation(String),

    #[error("Subtitle generation failed for every language: {}", .0.join(", "))]
    AllLanguagesFailed(Vec<String>),

    #[error("Media processing error: {0}")]
    Media(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Job not found: {0}")]
    JobNotFound(Uuid),

    #[error("No subtitle result {file} for job {job_id}")]
    ResultNotFound { job_id: Uuid, file: String },

    #[error("Invalid subtitle file name: {0}")]
    InvalidFileName(String),

    #[error("Job {0} was cancelled")]
    Cancelled(Uuid),
}

pub type Result<T> = std::result::Result<T, SubtrixError>;
