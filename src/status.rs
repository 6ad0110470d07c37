//! Job status tracking.
//!
//! A job is created when media is submitted and updated by the orchestrator
//! at every milestone. Pollers read a [`JobStatusView`]; subtitle downloads go
//! through [`subtitle_file`]. The store is a trait so tests and embedders can
//! inject their own; [`InMemoryJobStore`] keeps one lock per job so updates
//! to different jobs never contend.

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{Result, SubtrixError};
use crate::matrix::LanguagePair;
use crate::subtitle::{format_srt, SubtitleTrack};

/// Progress once audio has been extracted
pub const PROGRESS_AUDIO_DONE: u8 = 5;
/// Progress once every language is terminal
pub const PROGRESS_LANGUAGES_DONE: u8 = 70;
/// Progress once every translation pair is terminal
pub const PROGRESS_PAIRS_DONE: u8 = 99;

/// Linear progress inside a stage spanning `start..=end`
pub fn stage_progress(start: u8, end: u8, done: usize, total: usize) -> u8 {
    if total == 0 {
        return end;
    }
    let span = usize::from(end.saturating_sub(start));
    start.saturating_add((span * done.min(total) / total) as u8)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobPhase {
    Queued,
    ExtractingAudio,
    Transcribing,
    Translating,
    Done,
    PartiallyFailed,
    Failed,
    Cancelled,
}

impl JobPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::PartiallyFailed | Self::Failed | Self::Cancelled)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::ExtractingAudio => "extracting_audio",
            Self::Transcribing => "transcribing",
            Self::Translating => "translating",
            Self::Done => "done",
            Self::PartiallyFailed => "partially_failed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for JobPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LanguageStatus {
    Succeeded,
    Failed,
}

/// Outcome of one source language
#[derive(Debug, Clone, PartialEq)]
pub struct LanguageJobResult {
    pub language: String,
    pub status: LanguageStatus,
    pub track: Option<SubtitleTrack>,
    pub error: Option<String>,
}

impl LanguageJobResult {
    pub fn succeeded(language: &str, track: SubtitleTrack) -> Self {
        Self {
            language: language.to_string(),
            status: LanguageStatus::Succeeded,
            track: Some(track),
            error: None,
        }
    }

    pub fn failed(language: &str, error: impl Into<String>) -> Self {
        Self {
            language: language.to_string(),
            status: LanguageStatus::Failed,
            track: None,
            error: Some(error.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == LanguageStatus::Succeeded
    }
}

/// Outcome of one translation pair
#[derive(Debug, Clone, PartialEq)]
pub enum TranslationOutcome {
    Succeeded(SubtitleTrack),
    Failed(String),
}

impl From<std::result::Result<SubtitleTrack, String>> for TranslationOutcome {
    fn from(result: std::result::Result<SubtitleTrack, String>) -> Self {
        match result {
            Ok(track) => Self::Succeeded(track),
            Err(error) => Self::Failed(error),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Job {
    pub id: Uuid,
    pub source_languages: Vec<String>,
    pub results: BTreeMap<String, LanguageJobResult>,
    pub translation_results: BTreeMap<LanguagePair, TranslationOutcome>,
    /// 0..=100, never decreases
    pub progress: u8,
    pub phase: JobPhase,
    pub message: String,
    /// Job-fatal error, set when the whole job failed
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub cancel_requested: bool,
}

impl Job {
    pub fn new(id: Uuid, source_languages: Vec<String>) -> Self {
        let now = Utc::now();
        Self {
            id,
            source_languages,
            results: BTreeMap::new(),
            translation_results: BTreeMap::new(),
            progress: 0,
            phase: JobPhase::Queued,
            message: "Queued".to_string(),
            error: None,
            created_at: now,
            updated_at: now,
            completed_at: None,
            cancel_requested: false,
        }
    }

    /// Merge a partial update. A terminal phase is final and forces progress to 100.
    pub fn apply(&mut self, update: JobUpdate) {
        let now = Utc::now();

        if let Some(phase) = update.phase {
            if !self.phase.is_terminal() {
                self.phase = phase;
                if phase.is_terminal() {
                    self.completed_at = Some(now);
                    self.progress = 100;
                }
            }
        }
        if let Some(progress) = update.progress {
            self.progress = self.progress.max(progress.min(100));
        }
        if let Some(message) = update.message {
            self.message = message;
        }
        if let Some(error) = update.error {
            self.error = Some(error);
        }
        for result in update.language_results {
            self.results.insert(result.language.clone(), result);
        }
        for (pair, outcome) in update.translation_results {
            self.translation_results.insert(pair, outcome);
        }

        self.updated_at = now;
    }

    /// Languages whose subtitles were produced, in name order
    pub fn succeeded_tracks(&self) -> BTreeMap<String, SubtitleTrack> {
        self.results
            .values()
            .filter_map(|r| r.track.clone().map(|track| (r.language.clone(), track)))
            .collect()
    }

    pub fn has_failures(&self) -> bool {
        self.results.values().any(|r| !r.is_success())
            || self
                .translation_results
                .values()
                .any(|o| matches!(o, TranslationOutcome::Failed(_)))
    }

    fn is_expired(&self, now: DateTime<Utc>, retention: Duration) -> bool {
        match self.completed_at {
            Some(completed_at) if self.phase.is_terminal() => (now - completed_at)
                .to_std()
                .map(|age| age >= retention)
                .unwrap_or(false),
            _ => false,
        }
    }
}

/// Partial update merged into a job under its lock
#[derive(Debug, Clone, Default)]
pub struct JobUpdate {
    pub phase: Option<JobPhase>,
    pub progress: Option<u8>,
    pub message: Option<String>,
    pub error: Option<String>,
    pub language_results: Vec<LanguageJobResult>,
    pub translation_results: Vec<(LanguagePair, TranslationOutcome)>,
}

impl JobUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(mut self, phase: JobPhase) -> Self {
        self.phase = Some(phase);
        self
    }

    pub fn progress(mut self, progress: u8) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    pub fn language_result(mut self, result: LanguageJobResult) -> Self {
        self.language_results.push(result);
        self
    }

    pub fn translation_result(mut self, pair: LanguagePair, outcome: TranslationOutcome) -> Self {
        self.translation_results.push((pair, outcome));
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailedLanguage {
    pub language: String,
    pub error: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailedPair {
    pub source: String,
    pub target: String,
    pub error: String,
}

/// What a poller sees
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobStatusView {
    pub id: Uuid,
    pub phase: JobPhase,
    pub progress: u8,
    pub message: String,
    pub succeeded_languages: Vec<String>,
    pub failed_languages: Vec<FailedLanguage>,
    pub translation_pairs_succeeded: Vec<LanguagePair>,
    pub translation_pairs_failed: Vec<FailedPair>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl From<&Job> for JobStatusView {
    fn from(job: &Job) -> Self {
        let mut succeeded_languages = Vec::new();
        let mut failed_languages = Vec::new();
        for result in job.results.values() {
            if result.is_success() {
                succeeded_languages.push(result.language.clone());
            } else {
                failed_languages.push(FailedLanguage {
                    language: result.language.clone(),
                    error: result.error.clone().unwrap_or_default(),
                });
            }
        }

        let mut translation_pairs_succeeded = Vec::new();
        let mut translation_pairs_failed = Vec::new();
        for (pair, outcome) in &job.translation_results {
            match outcome {
                TranslationOutcome::Succeeded(_) => translation_pairs_succeeded.push(pair.clone()),
                TranslationOutcome::Failed(error) => translation_pairs_failed.push(FailedPair {
                    source: pair.source.clone(),
                    target: pair.target.clone(),
                    error: error.clone(),
                }),
            }
        }

        Self {
            id: job.id,
            phase: job.phase,
            progress: job.progress,
            message: job.message.clone(),
            succeeded_languages,
            failed_languages,
            translation_pairs_succeeded,
            translation_pairs_failed,
            error: job.error.clone(),
            created_at: job.created_at,
            completed_at: job.completed_at,
        }
    }
}

/// Keyed table of jobs
pub trait JobStore: Send + Sync {
    /// Register a new queued job
    fn create(&self, source_languages: Vec<String>) -> Uuid;

    fn get(&self, id: Uuid) -> Option<JobStatusView>;

    /// Full copy of the job, including produced tracks
    fn snapshot(&self, id: Uuid) -> Option<Job>;

    /// Atomically merge an update into a job
    fn update(&self, id: Uuid, update: JobUpdate) -> Result<()>;

    fn request_cancel(&self, id: Uuid) -> Result<()>;

    fn is_cancelled(&self, id: Uuid) -> bool;

    fn delete(&self, id: Uuid) -> bool;

    /// Evict terminal jobs past retention, returning how many were removed
    fn sweep(&self) -> usize;
}

pub struct InMemoryJobStore {
    jobs: RwLock<HashMap<Uuid, Arc<Mutex<Job>>>>,
    retention: Duration,
}

impl InMemoryJobStore {
    pub fn new(retention: Duration) -> Self {
        Self {
            jobs: RwLock::new(HashMap::new()),
            retention,
        }
    }

    pub fn with_retention_hours(hours: u64) -> Self {
        Self::new(Duration::from_secs(hours.saturating_mul(60 * 60)))
    }

    pub fn len(&self) -> usize {
        self.jobs.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.read().is_empty()
    }

    /// Live job handle; an expired job is evicted and reported missing
    fn entry(&self, id: Uuid) -> Option<Arc<Mutex<Job>>> {
        let entry = self.jobs.read().get(&id).cloned()?;
        let expired = entry.lock().is_expired(Utc::now(), self.retention);
        if expired {
            self.jobs.write().remove(&id);
            debug!("Evicted expired job {}", id);
            return None;
        }
        Some(entry)
    }

    pub(crate) fn sweep_at(&self, now: DateTime<Utc>) -> usize {
        let mut jobs = self.jobs.write();
        let before = jobs.len();
        jobs.retain(|_, job| !job.lock().is_expired(now, self.retention));
        before - jobs.len()
    }
}

impl Default for InMemoryJobStore {
    fn default() -> Self {
        Self::with_retention_hours(24)
    }
}

impl JobStore for InMemoryJobStore {
    fn create(&self, source_languages: Vec<String>) -> Uuid {
        let id = Uuid::new_v4();
        let job = Job::new(id, source_languages);
        self.jobs.write().insert(id, Arc::new(Mutex::new(job)));
        debug!("Created job {}", id);
        id
    }

    fn get(&self, id: Uuid) -> Option<JobStatusView> {
        self.entry(id).map(|job| JobStatusView::from(&*job.lock()))
    }

    fn snapshot(&self, id: Uuid) -> Option<Job> {
        self.entry(id).map(|job| job.lock().clone())
    }

    fn update(&self, id: Uuid, update: JobUpdate) -> Result<()> {
        let job = self.entry(id).ok_or(SubtrixError::JobNotFound(id))?;
        job.lock().apply(update);
        Ok(())
    }

    fn request_cancel(&self, id: Uuid) -> Result<()> {
        let job = self.entry(id).ok_or(SubtrixError::JobNotFound(id))?;
        let mut job = job.lock();
        if !job.phase.is_terminal() {
            job.cancel_requested = true;
            job.updated_at = Utc::now();
            info!("Cancellation requested for job {}", id);
        }
        Ok(())
    }

    fn is_cancelled(&self, id: Uuid) -> bool {
        self.entry(id).is_some_and(|job| job.lock().cancel_requested)
    }

    fn delete(&self, id: Uuid) -> bool {
        self.jobs.write().remove(&id).is_some()
    }

    fn sweep(&self) -> usize {
        self.sweep_at(Utc::now())
    }
}

/// Periodically evict expired jobs until the returned handle is aborted
pub fn spawn_sweeper(store: Arc<dyn JobStore>, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            let removed = store.sweep();
            if removed > 0 {
                info!("Swept {} expired jobs", removed);
            }
        }
    })
}

/// Identifies one downloadable subtitle file of a job
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ResultKey {
    Original(String),
    Translation(LanguagePair),
}

impl ResultKey {
    pub fn translation(source: &str, target: &str) -> Self {
        Self::Translation(LanguagePair::new(source, target))
    }

    /// `english.srt` or `english_to_malay.srt`
    pub fn file_name(&self) -> String {
        match self {
            Self::Original(language) => format!("{}.srt", language),
            Self::Translation(pair) => format!("{}.srt", pair.file_stem()),
        }
    }

    /// Parse a requested download name, rejecting anything that is not a plain `.srt` name
    pub fn from_file_name(name: &str) -> Result<Self> {
        if !is_safe_srt_name(name) {
            return Err(SubtrixError::InvalidFileName(name.to_string()));
        }

        let stem = &name[..name.len() - ".srt".len()];
        match stem.split_once("_to_") {
            Some((source, target)) if !source.is_empty() && !target.is_empty() => {
                Ok(Self::translation(source, target))
            }
            _ => Ok(Self::Original(stem.to_string())),
        }
    }
}

/// `[A-Za-z0-9_-]+(\.[A-Za-z0-9_-]+)*\.srt`
fn is_safe_srt_name(name: &str) -> bool {
    let Some(stem) = name.strip_suffix(".srt") else {
        return false;
    };
    !stem.is_empty()
        && stem.split('.').all(|part| {
            !part.is_empty() && part.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        })
}

/// Render a finished subtitle of a job as SRT text
pub fn subtitle_file(store: &dyn JobStore, job_id: Uuid, key: &ResultKey) -> Result<String> {
    let job = store.snapshot(job_id).ok_or(SubtrixError::JobNotFound(job_id))?;

    let track = match key {
        ResultKey::Original(language) => job.results.get(language).and_then(|r| r.track.as_ref()),
        ResultKey::Translation(pair) => match job.translation_results.get(pair) {
            Some(TranslationOutcome::Succeeded(track)) => Some(track),
            _ => None,
        },
    };

    track.map(format_srt).ok_or_else(|| SubtrixError::ResultNotFound {
        job_id,
        file: key.file_name(),
    })
}
