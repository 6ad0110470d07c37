use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::Config;
use crate::error::{Result, SubtrixError};
use crate::matrix::{MatrixBuilder, MatrixResults};
use crate::media::{MediaProcessor, MediaProcessorFactory};
use crate::output::OutputLayout;
use crate::segment::segment_transcript;
use crate::status::{
    stage_progress, Job, JobPhase, JobStore, JobUpdate, LanguageJobResult, ResultKey, TranslationOutcome,
    PROGRESS_AUDIO_DONE, PROGRESS_LANGUAGES_DONE,
};
use crate::subtitle::SubtitleTrack;
use crate::transcribe::{Transcriber, TranscriberFactory};
use crate::translate::{Translator, TranslatorFactory};

/// Runs jobs: audio extraction, per-language subtitles, then the translation matrix
#[derive(Clone)]
pub struct Orchestrator {
    config: Arc<Config>,
    store: Arc<dyn JobStore>,
    transcriber: Arc<dyn Transcriber>,
    translator: Arc<dyn Translator>,
    media: Arc<dyn MediaProcessor>,
    output: Option<OutputLayout>,
}

impl Orchestrator {
    pub fn new(
        config: Config,
        store: Arc<dyn JobStore>,
        transcriber: Arc<dyn Transcriber>,
        translator: Arc<dyn Translator>,
        media: Arc<dyn MediaProcessor>,
    ) -> Self {
        let output = Some(OutputLayout::new(&config.pipeline.output_dir));
        Self {
            config: Arc::new(config),
            store,
            transcriber,
            translator,
            media,
            output,
        }
    }

    /// Build the configured collaborators
    pub fn from_config(config: Config, store: Arc<dyn JobStore>) -> Result<Self> {
        let transcriber = TranscriberFactory::create_transcriber(&config.transcriber)?;
        let translator = TranslatorFactory::create_translator(&config.translate)?;
        let media = MediaProcessorFactory::create_processor(config.media.clone());
        Ok(Self::new(config, store, transcriber, translator, media))
    }

    /// Where subtitle files are written; `None` keeps results in the store only
    pub fn with_output(mut self, output: Option<OutputLayout>) -> Self {
        self.output = output;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn JobStore> {
        &self.store
    }

    pub fn output(&self) -> Option<&OutputLayout> {
        self.output.as_ref()
    }

    /// Register a queued job
    pub fn submit(&self, languages: &[String]) -> Uuid {
        self.store.create(resolve_languages(&self.config, languages))
    }

    pub fn cancel(&self, job_id: Uuid) -> Result<()> {
        self.store.request_cancel(job_id)
    }

    /// Create a job for a media file and run it to completion
    pub async fn process_media(&self, media_path: &Path, languages: &[String]) -> Result<Job> {
        let job_id = self.submit(languages);
        self.process_job(job_id, media_path, languages).await
    }

    /// Start a job in the background and return its id immediately
    pub fn spawn(&self, media_path: PathBuf, languages: Vec<String>) -> Uuid {
        let job_id = self.submit(&languages);
        let orchestrator = self.clone();

        tokio::spawn(async move {
            if let Err(e) = orchestrator.process_job(job_id, &media_path, &languages).await {
                warn!("Job {} did not complete: {}", job_id, e);
            }
        });

        job_id
    }

    async fn process_job(&self, job_id: Uuid, media_path: &Path, languages: &[String]) -> Result<Job> {
        let result = self.extract_and_run(job_id, media_path, languages).await;
        if let Err(e) = &result {
            self.fail_unfinished(job_id, e);
        }
        result
    }

    async fn extract_and_run(&self, job_id: Uuid, media_path: &Path, languages: &[String]) -> Result<Job> {
        info!("Processing {} as job {}", media_path.display(), job_id);
        self.store.update(
            job_id,
            JobUpdate::new()
                .phase(JobPhase::ExtractingAudio)
                .message("Extracting audio..."),
        )?;

        if self.store.is_cancelled(job_id) {
            return self.finish_cancelled(job_id);
        }

        let mut builder = tempfile::Builder::new();
        builder.prefix("subtrix-");
        let workdir = match &self.config.pipeline.work_dir {
            Some(dir) => builder.tempdir_in(dir)?,
            None => builder.tempdir()?,
        };
        let audio_path = workdir.path().join("audio.wav");

        if let Err(e) = self.media.extract_audio(media_path, &audio_path).await {
            self.store.update(
                job_id,
                JobUpdate::new()
                    .phase(JobPhase::Failed)
                    .message("Audio extraction failed")
                    .error(e.to_string()),
            )?;
            return Err(e);
        }

        self.store.update(
            job_id,
            JobUpdate::new()
                .progress(PROGRESS_AUDIO_DONE)
                .message("Audio extracted"),
        )?;

        self.run(job_id, &audio_path, languages).await
    }

    /// Run an existing job on already-extracted audio.
    ///
    /// Returns the finished job; fails with `AllLanguagesFailed` when no
    /// language produced subtitles.
    pub async fn run(&self, job_id: Uuid, audio_path: &Path, languages: &[String]) -> Result<Job> {
        let result = self.run_stages(job_id, audio_path, languages).await;
        if let Err(e) = &result {
            self.fail_unfinished(job_id, e);
        }
        result
    }

    async fn run_stages(&self, job_id: Uuid, audio_path: &Path, languages: &[String]) -> Result<Job> {
        let languages = resolve_languages(&self.config, languages);
        if languages.is_empty() {
            let error = SubtrixError::Config("No languages requested".to_string());
            self.store.update(
                job_id,
                JobUpdate::new().phase(JobPhase::Failed).error(error.to_string()),
            )?;
            return Err(error);
        }

        self.store.update(
            job_id,
            JobUpdate::new()
                .phase(JobPhase::Transcribing)
                .progress(PROGRESS_AUDIO_DONE)
                .message(format!("Generating subtitles for {} languages...", languages.len())),
        )?;

        self.fan_out(job_id, audio_path, &languages).await;

        if self.store.is_cancelled(job_id) {
            return self.finish_cancelled(job_id);
        }

        let job = self.snapshot(job_id)?;
        let succeeded = job.succeeded_tracks();
        if succeeded.is_empty() {
            let failed: Vec<String> = job.results.keys().cloned().collect();
            let error = SubtrixError::AllLanguagesFailed(failed);
            warn!("Job {}: {}", job_id, error);
            self.store.update(
                job_id,
                JobUpdate::new()
                    .phase(JobPhase::Failed)
                    .message("Failed to generate subtitles for any language")
                    .error(error.to_string()),
            )?;
            return Err(error);
        }

        info!(
            "Job {}: {}/{} languages succeeded",
            job_id,
            succeeded.len(),
            languages.len()
        );
        self.store.update(
            job_id,
            JobUpdate::new()
                .phase(JobPhase::Translating)
                .progress(PROGRESS_LANGUAGES_DONE)
                .message("Translating subtitles..."),
        )?;

        let matrix = MatrixBuilder::from_config(Arc::clone(&self.translator), &self.config)
            .with_store(Arc::clone(&self.store));
        let translations = matrix.build(Some(job_id), &succeeded).await;
        self.persist_translations(job_id, &translations).await;

        if self.store.is_cancelled(job_id) {
            return self.finish_cancelled(job_id);
        }

        let job = self.snapshot(job_id)?;
        let phase = if self.config.pipeline.report_partial_failure && job.has_failures() {
            JobPhase::PartiallyFailed
        } else {
            JobPhase::Done
        };
        let translated = job
            .translation_results
            .values()
            .filter(|o| matches!(o, TranslationOutcome::Succeeded(_)))
            .count();

        self.store.update(
            job_id,
            JobUpdate::new().phase(phase).message(format!(
                "Subtitles ready: {} languages, {} translations",
                succeeded.len(),
                translated
            )),
        )?;
        info!("Job {} finished as {}", job_id, phase);

        self.snapshot(job_id)
    }

    /// Produce one track per language, concurrently, recording each outcome as it lands
    async fn fan_out(&self, job_id: Uuid, audio_path: &Path, languages: &[String]) {
        let total = languages.len();
        let semaphore = Arc::new(Semaphore::new(self.config.pipeline.max_concurrent_transcriptions.max(1)));
        let mut tasks = JoinSet::new();
        let mut spawned = HashMap::new();

        for language in languages {
            let orchestrator = self.clone();
            let semaphore = Arc::clone(&semaphore);
            let task_language = language.clone();
            let audio_path = audio_path.to_path_buf();

            let handle = tasks.spawn(async move {
                let language = task_language;
                let _permit = match semaphore.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => return (language, None),
                };
                if orchestrator.store.is_cancelled(job_id) {
                    debug!("Skipping {} for cancelled job {}", language, job_id);
                    return (language, None);
                }

                if let Err(e) = orchestrator.store.update(
                    job_id,
                    JobUpdate::new().message(format!("Generating {} subtitles...", language)),
                ) {
                    warn!("Failed to update job {}: {}", job_id, e);
                }

                let result = orchestrator
                    .process_language(job_id, &language, &audio_path)
                    .await
                    .map_err(|e| e.to_string());
                (language, Some(result))
            });
            spawned.insert(handle.id(), language.clone());
        }

        let mut finished = 0;
        while let Some(joined) = tasks.join_next_with_id().await {
            let (language, result) = match joined {
                Ok((_, done)) => done,
                Err(e) => match spawned.remove(&e.id()) {
                    Some(language) => (language, Some(Err(format!("Subtitle task failed: {}", e)))),
                    None => {
                        warn!("Unknown language task failed: {}", e);
                        continue;
                    }
                },
            };
            let Some(result) = result else {
                continue;
            };

            finished += 1;
            let entry = match result {
                Ok(track) => {
                    info!("Generated {} subtitles ({} cues)", language, track.len());
                    LanguageJobResult::succeeded(&language, track)
                }
                Err(error) => {
                    warn!("Failed to generate {} subtitles: {}", language, error);
                    LanguageJobResult::failed(&language, error)
                }
            };

            let update = JobUpdate::new()
                .language_result(entry)
                .progress(stage_progress(PROGRESS_AUDIO_DONE, PROGRESS_LANGUAGES_DONE, finished, total));
            if let Err(e) = self.store.update(job_id, update) {
                warn!("Failed to record {} result for job {}: {}", language, job_id, e);
            }
        }
    }

    /// Transcribe, segment and persist one language
    async fn process_language(&self, job_id: Uuid, language: &str, audio_path: &Path) -> Result<SubtitleTrack> {
        let profile = self
            .config
            .language(language)
            .ok_or_else(|| SubtrixError::Config(format!("Unsupported language: {}", language)))?;

        let mut transcript = self
            .transcriber
            .transcribe(audio_path, &profile.code, &profile.model)
            .await?;
        transcript.language = profile.code.clone();

        let captions = profile.caption_config(&self.config.captions);
        let track = segment_transcript(&transcript, &captions);
        if track.is_empty() {
            return Err(SubtrixError::Segmentation(format!(
                "Generated subtitles for {} are empty",
                language
            )));
        }

        if let Some(output) = &self.output {
            let path = output
                .write(job_id, &ResultKey::Original(language.to_string()), &track)
                .await?;
            debug!("Saved {} subtitles to {}", language, path.display());
        }

        Ok(track)
    }

    async fn persist_translations(
        &self,
        job_id: Uuid,
        translations: &MatrixResults,
    ) {
        let Some(output) = &self.output else {
            return;
        };

        for (pair, result) in translations {
            let Ok(track) = result else {
                continue;
            };
            let key = ResultKey::Translation(pair.clone());
            if let Err(e) = output.write(job_id, &key, track).await {
                warn!("Failed to save {}: {}", key.file_name(), e);
                let update = JobUpdate::new()
                    .translation_result(pair.clone(), TranslationOutcome::Failed(e.to_string()));
                if let Err(e) = self.store.update(job_id, update) {
                    warn!("Failed to update job {}: {}", job_id, e);
                }
            }
        }
    }

    /// Mark a job that stopped on an error as failed, unless it already finished
    fn fail_unfinished(&self, job_id: Uuid, error: &SubtrixError) {
        let unfinished = self.store.get(job_id).is_some_and(|view| !view.phase.is_terminal());
        if !unfinished {
            return;
        }

        warn!("Job {} failed: {}", job_id, error);
        let update = JobUpdate::new()
            .phase(JobPhase::Failed)
            .message("Job failed")
            .error(error.to_string());
        if let Err(e) = self.store.update(job_id, update) {
            warn!("Failed to update job {}: {}", job_id, e);
        }
    }

    fn finish_cancelled(&self, job_id: Uuid) -> Result<Job> {
        info!("Job {} cancelled", job_id);
        self.store.update(
            job_id,
            JobUpdate::new().phase(JobPhase::Cancelled).message("Cancelled"),
        )?;
        self.snapshot(job_id)
    }

    fn snapshot(&self, job_id: Uuid) -> Result<Job> {
        self.store.snapshot(job_id).ok_or(SubtrixError::JobNotFound(job_id))
    }
}

/// Requested languages as configured names, without repeats, in request order.
/// Codes and other spellings map to the profile name; unknown names are kept
/// so they fail on their own.
fn resolve_languages(config: &Config, languages: &[String]) -> Vec<String> {
    let mut unique: Vec<String> = Vec::with_capacity(languages.len());
    for language in languages {
        let language = language.trim();
        if language.is_empty() {
            continue;
        }
        let name = config
            .language(language)
            .map(|profile| profile.name.as_str())
            .unwrap_or(language);
        if !unique.iter().any(|l| l.eq_ignore_ascii_case(name)) {
            unique.push(name.to_string());
        }
    }
    unique
}
