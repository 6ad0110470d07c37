use assert_fs::prelude::*;
use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;

use subtrix::config::Config;
use subtrix::error::{Result, SubtrixError};
use subtrix::media::MediaProcessor;
use subtrix::status::{subtitle_file, InMemoryJobStore, JobPhase, JobStore, ResultKey};
use subtrix::subtitle::read_track;
use subtrix::transcribe::{Transcriber, Transcript, Word};
use subtrix::translate::TaggingTranslator;
use subtrix::workflow::Orchestrator;

/// Returns a fixed phrase per language code; "ta" is unavailable
struct ScriptedTranscriber;

#[async_trait]
impl Transcriber for ScriptedTranscriber {
    async fn transcribe(&self, _audio_path: &Path, language_code: &str, _model: &str) -> Result<Transcript> {
        let phrase = match language_code {
            "en" => ["Good", "morning", "everyone"],
            "ms" => ["Selamat", "pagi", "semua"],
            _ => return Err(SubtrixError::Transcription(format!("no model for {}", language_code))),
        };
        let words = phrase
            .iter()
            .enumerate()
            .map(|(i, w)| Word::new(w, i as f64 * 0.5, i as f64 * 0.5 + 0.4))
            .collect();
        Ok(Transcript::from_words(language_code, words))
    }
}

struct CopyingMediaProcessor;

#[async_trait]
impl MediaProcessor for CopyingMediaProcessor {
    async fn extract_audio(&self, media_path: &Path, audio_path: &Path) -> Result<()> {
        tokio::fs::copy(media_path, audio_path).await?;
        Ok(())
    }

    async fn version_info(&self) -> Result<String> {
        Ok("fake 1.0".to_string())
    }
}

fn orchestrator(output_dir: &Path) -> Orchestrator {
    let mut config = Config::default();
    config.pipeline.output_dir = output_dir.to_path_buf();
    let store: Arc<dyn JobStore> = Arc::new(InMemoryJobStore::default());

    Orchestrator::new(
        config,
        store,
        Arc::new(ScriptedTranscriber),
        Arc::new(TaggingTranslator),
        Arc::new(CopyingMediaProcessor),
    )
}

#[tokio::test]
async fn media_file_produces_originals_and_cross_translations() {
    let temp = assert_fs::TempDir::new().unwrap();
    let media = temp.child("talk.mp4");
    media.write_str("not really video").unwrap();
    let out = temp.child("out");

    let orchestrator = orchestrator(out.path());
    let languages = vec!["english".to_string(), "malay".to_string()];
    let job = orchestrator.process_media(media.path(), &languages).await.unwrap();

    assert_eq!(job.phase, JobPhase::Done);
    assert_eq!(job.progress, 100);
    assert_eq!(job.translation_results.len(), 2);

    let subtitles = out.child(format!("{}/subtitles", job.id));
    for name in ["english.srt", "malay.srt", "english_to_malay.srt", "malay_to_english.srt"] {
        assert!(subtitles.child(name).path().is_file(), "missing {}", name);
    }

    let english = read_track(subtitles.child("english.srt").path()).await.unwrap();
    assert_eq!(english.cues[0].joined_text(), "Good morning everyone");

    let translated = subtitle_file(
        orchestrator.store().as_ref(),
        job.id,
        &ResultKey::translation("english", "malay"),
    )
    .unwrap();
    assert!(translated.contains("[ms] Good morning everyone"));

    let output = orchestrator.output().unwrap();
    let path = output.resolve_download(job.id, "malay_to_english.srt").unwrap();
    let content = std::fs::read_to_string(path).unwrap();
    assert!(content.starts_with("1\n00:00:00,000 --> "));
    assert!(content.contains("[en] Selamat pagi semua"));
}

#[tokio::test]
async fn one_failed_language_does_not_fail_the_job() {
    let temp = assert_fs::TempDir::new().unwrap();
    let media = temp.child("talk.mp4");
    media.write_str("audio").unwrap();

    let orchestrator = orchestrator(temp.child("out").path());
    let languages = vec!["english".to_string(), "tamil".to_string(), "malay".to_string()];
    let job = orchestrator.process_media(media.path(), &languages).await.unwrap();

    assert_eq!(job.phase, JobPhase::Done);
    let view = orchestrator.store().get(job.id).unwrap();
    assert_eq!(view.succeeded_languages, vec!["english", "malay"]);
    assert_eq!(view.failed_languages.len(), 1);
    assert_eq!(view.failed_languages[0].language, "tamil");
    assert_eq!(view.translation_pairs_succeeded.len(), 2);

    let missing = orchestrator.output().unwrap().resolve_download(job.id, "tamil.srt");
    assert!(matches!(missing, Err(SubtrixError::ResultNotFound { .. })));
}

#[test]
fn missing_media_fails_the_job() {
    let temp = assert_fs::TempDir::new().unwrap();
    let orchestrator = orchestrator(temp.path());

    let result = tokio_test::block_on(
        orchestrator.process_media(&temp.path().join("absent.mp4"), &["english".to_string()]),
    );
    assert!(matches!(result, Err(SubtrixError::Io(_))));
}
