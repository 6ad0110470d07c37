//! Cross-translation of every succeeded language into every other one.
//!
//! Cue timing and numbering are copied from the source track; only the text
//! is translated. Each cue's lines are joined into one sentence for the
//! translator and the answer is re-split into the same number of lines.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::Config;
use crate::error::{Result, SubtrixError};
use crate::language::{find_profile, LanguageProfile};
use crate::status::{stage_progress, JobStore, JobUpdate, PROGRESS_LANGUAGES_DONE, PROGRESS_PAIRS_DONE};
use crate::subtitle::{Cue, SubtitleTrack};
use crate::translate::Translator;

/// Ordered (source, target) language names
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LanguagePair {
    pub source: String,
    pub target: String,
}

impl LanguagePair {
    pub fn new(source: &str, target: &str) -> Self {
        Self {
            source: source.to_string(),
            target: target.to_string(),
        }
    }

    /// `english_to_malay`
    pub fn file_stem(&self) -> String {
        format!("{}_to_{}", self.source, self.target)
    }
}

impl fmt::Display for LanguagePair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.source, self.target)
    }
}

/// Every ordered pair of distinct languages, sorted
pub fn language_pairs<S: AsRef<str>>(languages: &[S]) -> Vec<LanguagePair> {
    let names: Vec<&str> = languages.iter().map(|l| l.as_ref()).collect();
    let mut pairs = Vec::new();
    for source in &names {
        for target in &names {
            if source != target {
                pairs.push(LanguagePair::new(source, target));
            }
        }
    }
    pairs.sort();
    pairs.dedup();
    pairs
}

/// How often a failed cue translation is retried
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_retries: u32,
    /// Delay before the first retry; grows linearly with each attempt
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            delay: Duration::from_millis(500),
        }
    }
}

pub type MatrixResults = BTreeMap<LanguagePair, std::result::Result<SubtitleTrack, String>>;

pub struct MatrixBuilder {
    translator: Arc<dyn Translator>,
    languages: Vec<LanguageProfile>,
    max_concurrent: usize,
    retry: RetryPolicy,
    store: Option<Arc<dyn JobStore>>,
}

impl MatrixBuilder {
    pub fn new(translator: Arc<dyn Translator>, languages: Vec<LanguageProfile>) -> Self {
        Self {
            translator,
            languages,
            max_concurrent: 4,
            retry: RetryPolicy::default(),
            store: None,
        }
    }

    pub fn from_config(translator: Arc<dyn Translator>, config: &Config) -> Self {
        Self::new(translator, config.languages.clone())
            .with_concurrency(config.pipeline.max_concurrent_translations)
            .with_retry(RetryPolicy {
                max_retries: config.translate.max_retries,
                ..RetryPolicy::default()
            })
    }

    pub fn with_concurrency(mut self, max_concurrent: usize) -> Self {
        self.max_concurrent = max_concurrent.max(1);
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Record pair outcomes and progress in the store and honor cancellation
    pub fn with_store(mut self, store: Arc<dyn JobStore>) -> Self {
        self.store = Some(store);
        self
    }

    fn language_code(&self, language: &str) -> String {
        find_profile(&self.languages, language)
            .map(|p| p.code.clone())
            .unwrap_or_else(|| language.to_string())
    }

    /// Translate every succeeded track into every other succeeded language.
    ///
    /// A failing pair is recorded as its error; pairs never started because
    /// the job was cancelled are absent from the result.
    pub async fn build(&self, job_id: Option<Uuid>, succeeded: &BTreeMap<String, SubtitleTrack>) -> MatrixResults {
        let languages: Vec<&String> = succeeded.keys().collect();
        let pairs = language_pairs(&languages);
        let total = pairs.len();
        let mut results = MatrixResults::new();

        if pairs.is_empty() {
            debug!("Fewer than two succeeded languages, no translation pairs");
            return results;
        }
        info!("Translating {} language pairs", total);

        let job = job_id.zip(self.store.clone());
        let semaphore = Arc::new(Semaphore::new(self.max_concurrent));
        let mut tasks = JoinSet::new();
        let mut spawned = HashMap::new();

        for pair in pairs {
            let Some(track) = succeeded.get(&pair.source).cloned() else {
                continue;
            };
            let translator = Arc::clone(&self.translator);
            let semaphore = Arc::clone(&semaphore);
            let job = job.clone();
            let source_code = self.language_code(&pair.source);
            let target_code = self.language_code(&pair.target);
            let retry = self.retry;
            let task_pair = pair.clone();

            let handle = tasks.spawn(async move {
                let pair = task_pair;
                let _permit = match semaphore.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => return (pair, None),
                };
                if let Some((job_id, store)) = &job {
                    if store.is_cancelled(*job_id) {
                        debug!("Skipping {} for cancelled job {}", pair, job_id);
                        return (pair, None);
                    }
                }

                let outcome = translate_track(translator.as_ref(), &track, &source_code, &target_code, retry)
                    .await
                    .map_err(|e| e.to_string());
                (pair, Some(outcome))
            });
            spawned.insert(handle.id(), pair);
        }

        let mut finished = 0;
        while let Some(joined) = tasks.join_next_with_id().await {
            let (pair, outcome) = match joined {
                Ok((_, done)) => done,
                Err(e) => match spawned.remove(&e.id()) {
                    Some(pair) => (pair, Some(Err(format!("Translation task failed: {}", e)))),
                    None => {
                        warn!("Unknown translation task failed: {}", e);
                        continue;
                    }
                },
            };
            let Some(outcome) = outcome else {
                continue;
            };

            finished += 1;
            match &outcome {
                Ok(track) => info!("Translated {} ({} cues)", pair, track.len()),
                Err(error) => warn!("Translation {} failed: {}", pair, error),
            }

            if let Some((job_id, store)) = &job {
                let update = JobUpdate::new()
                    .translation_result(pair.clone(), outcome.clone().into())
                    .progress(stage_progress(PROGRESS_LANGUAGES_DONE, PROGRESS_PAIRS_DONE, finished, total))
                    .message(format!("Translated {} to {} ({}/{})", pair.source, pair.target, finished, total));
                if let Err(e) = store.update(*job_id, update) {
                    warn!("Failed to record translation {}: {}", pair, e);
                }
            }

            results.insert(pair, outcome);
        }

        results
    }
}

/// Translate one track cue by cue, keeping timing and line structure
pub async fn translate_track(
    translator: &dyn Translator,
    track: &SubtitleTrack,
    source_language: &str,
    target_language: &str,
    retry: RetryPolicy,
) -> Result<SubtitleTrack> {
    let mut cues = Vec::with_capacity(track.len());

    for cue in track.iter() {
        let text = cue.joined_text();
        if text.is_empty() {
            cues.push(cue.clone());
            continue;
        }

        let translated = translate_with_retry(translator, &text, source_language, target_language, retry)
            .await
            .map_err(|e| SubtrixError::Translation(format!("cue {}: {}", cue.index, e)))?;

        cues.push(Cue::new(
            cue.index,
            cue.start_time,
            cue.end_time,
            split_balanced(&translated, cue.lines.len()),
        ));
    }

    Ok(SubtitleTrack::new(cues))
}

async fn translate_with_retry(
    translator: &dyn Translator,
    text: &str,
    source_language: &str,
    target_language: &str,
    retry: RetryPolicy,
) -> Result<String> {
    let mut attempt = 0;
    loop {
        let error = match translator.translate(text, source_language, target_language).await {
            Ok(translation) if !translation.trim().is_empty() => return Ok(translation.trim().to_string()),
            Ok(_) => SubtrixError::Translation("Empty translation received".to_string()),
            Err(e) => e,
        };

        if attempt >= retry.max_retries {
            return Err(error);
        }
        attempt += 1;
        warn!(
            "Translation {} -> {} failed (attempt {}/{}): {}",
            source_language,
            target_language,
            attempt,
            retry.max_retries + 1,
            error
        );
        tokio::time::sleep(retry.delay * attempt).await;
    }
}

/// Split text into at most `line_count` lines of similar character length,
/// never breaking a word
pub fn split_balanced(text: &str, line_count: usize) -> Vec<String> {
    let words: Vec<&str> = text.split_whitespace().collect();
    let line_count = line_count.clamp(1, words.len().max(1));
    if line_count == 1 {
        return vec![words.join(" ")];
    }

    let total = words.iter().map(|w| w.chars().count()).sum::<usize>() + words.len() - 1;
    let mut lines: Vec<String> = Vec::with_capacity(line_count);
    let mut current: Vec<&str> = Vec::new();
    let mut position = 0;

    for (i, word) in words.iter().enumerate() {
        let separator = usize::from(i > 0);
        let with_word = position + separator + word.chars().count();

        if !current.is_empty() && lines.len() + 1 < line_count {
            let remaining_words = words.len() - i;
            let remaining_lines = line_count - lines.len();
            let target = total * (lines.len() + 1) / line_count;
            let overshoot = with_word.saturating_sub(target);
            let undershoot = target.saturating_sub(position);

            if remaining_words < remaining_lines || (with_word > target && overshoot > undershoot) {
                lines.push(current.join(" "));
                current.clear();
            }
        }

        current.push(word);
        position = with_word;
    }
    lines.push(current.join(" "));

    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::language::default_profiles;
    use crate::status::{InMemoryJobStore, JobStore, TranslationOutcome};
    use crate::translate::{MockTranslator, TaggingTranslator};

    fn track(lines: &[&[&str]]) -> SubtitleTrack {
        SubtitleTrack::new(
            lines
                .iter()
                .enumerate()
                .map(|(i, cue_lines)| {
                    let start = i as f64 * 2.0;
                    Cue::new(i + 1, start, start + 1.5, cue_lines.iter().map(|l| l.to_string()).collect())
                })
                .collect(),
        )
    }

    fn succeeded(languages: &[&str]) -> BTreeMap<String, SubtitleTrack> {
        languages
            .iter()
            .map(|l| (l.to_string(), track(&[&["Good morning", "everyone"], &["Thanks"]])))
            .collect()
    }

    fn no_delay() -> RetryPolicy {
        RetryPolicy {
            max_retries: 1,
            delay: Duration::ZERO,
        }
    }

    #[test]
    fn test_language_pairs() {
        let pairs = language_pairs(&["english", "malay", "tamil"]);
        assert_eq!(pairs.len(), 6);
        assert!(pairs.iter().all(|p| p.source != p.target));
        assert_eq!(pairs[0], LanguagePair::new("english", "malay"));
        assert!(language_pairs(&["english"]).is_empty());
    }

    #[test]
    fn test_split_balanced() {
        assert_eq!(split_balanced("aaa bbb ccc ddd", 2), vec!["aaa bbb", "ccc ddd"]);
        assert_eq!(split_balanced("one two three", 3), vec!["one", "two", "three"]);
        assert_eq!(split_balanced("早上好大家", 2), vec!["早上好大家"]);
        assert_eq!(split_balanced("  spaced   out  ", 1), vec!["spaced out"]);
        assert_eq!(
            split_balanced("[ms] Selamat pagi semua orang", 2),
            vec!["[ms] Selamat", "pagi semua orang"]
        );
    }

    #[tokio::test]
    async fn test_translate_track_keeps_timing() {
        let source = track(&[&["Good morning", "everyone"], &["Thanks"]]);
        let translated = translate_track(&TaggingTranslator, &source, "en", "ms", no_delay())
            .await
            .unwrap();

        assert_eq!(translated.len(), source.len());
        for (original, cue) in source.iter().zip(translated.iter()) {
            assert_eq!(cue.index, original.index);
            assert_eq!(cue.start_time, original.start_time);
            assert_eq!(cue.end_time, original.end_time);
            assert!(cue.lines.len() <= original.lines.len());
        }
        assert_eq!(translated.cues[0].lines, vec!["[ms] Good morning", "everyone"]);
        assert_eq!(translated.cues[1].lines, vec!["[ms] Thanks"]);
    }

    #[tokio::test]
    async fn test_retries_then_succeeds() {
        let mut translator = MockTranslator::new();
        let mut calls = 0;
        translator.expect_translate().times(2).returning(move |text, _, _| {
            calls += 1;
            if calls == 1 {
                Err(SubtrixError::Translation("rate limited".to_string()))
            } else {
                Ok(format!("ok {}", text))
            }
        });

        let source = track(&[&["Hello"]]);
        let translated = translate_track(&translator, &source, "en", "ta", no_delay()).await.unwrap();
        assert_eq!(translated.cues[0].lines, vec!["ok Hello"]);
    }

    #[tokio::test]
    async fn test_matrix_records_failing_pair_and_continues() {
        let mut translator = MockTranslator::new();
        translator.expect_translate().returning(|text, _, target| {
            if target == "ta" {
                Err(SubtrixError::Translation("tamil model offline".to_string()))
            } else {
                Ok(format!("[{}] {}", target, text))
            }
        });

        let builder = MatrixBuilder::new(Arc::new(translator), default_profiles())
            .with_concurrency(2)
            .with_retry(no_delay());
        let results = builder.build(None, &succeeded(&["english", "malay", "tamil"])).await;

        assert_eq!(results.len(), 6);
        let failed: Vec<_> = results.iter().filter(|(_, r)| r.is_err()).map(|(p, _)| p.clone()).collect();
        assert_eq!(
            failed,
            vec![LanguagePair::new("english", "tamil"), LanguagePair::new("malay", "tamil")]
        );

        let english_to_malay = results[&LanguagePair::new("english", "malay")].as_ref().unwrap();
        assert!(english_to_malay.cues[0].lines[0].starts_with("[ms]"));
    }

    #[tokio::test]
    async fn test_matrix_updates_store() {
        let store = Arc::new(InMemoryJobStore::default());
        let job_id = store.create(vec!["english".into(), "malay".into()]);

        let builder = MatrixBuilder::new(Arc::new(TaggingTranslator), default_profiles())
            .with_store(store.clone());
        let results = builder.build(Some(job_id), &succeeded(&["english", "malay"])).await;
        assert_eq!(results.len(), 2);

        let job = store.snapshot(job_id).unwrap();
        assert_eq!(job.progress, PROGRESS_PAIRS_DONE);
        assert!(matches!(
            job.translation_results[&LanguagePair::new("malay", "english")],
            TranslationOutcome::Succeeded(_)
        ));
    }

    /// Translator that crashes on tamil targets
    struct CrashingTranslator;

    #[async_trait::async_trait]
    impl Translator for CrashingTranslator {
        async fn translate(&self, text: &str, _source: &str, target: &str) -> Result<String> {
            if target == "ta" {
                panic!("tamil model crashed");
            }
            Ok(format!("[{}] {}", target, text))
        }
    }

    #[tokio::test]
    async fn test_crashed_pair_is_recorded_as_failed() {
        let store = Arc::new(InMemoryJobStore::default());
        let job_id = store.create(vec!["english".into(), "malay".into(), "tamil".into()]);

        let builder = MatrixBuilder::new(Arc::new(CrashingTranslator), default_profiles())
            .with_retry(no_delay())
            .with_store(store.clone());
        let results = builder.build(Some(job_id), &succeeded(&["english", "malay", "tamil"])).await;

        assert_eq!(results.len(), 6);
        let crashed = &results[&LanguagePair::new("english", "tamil")];
        assert!(crashed.as_ref().unwrap_err().contains("Translation task failed"));
        assert!(results[&LanguagePair::new("tamil", "english")].is_ok());

        let view = store.get(job_id).unwrap();
        assert_eq!(view.translation_pairs_failed.len(), 2);
        assert_eq!(view.translation_pairs_succeeded.len(), 4);
        assert_eq!(view.progress, PROGRESS_PAIRS_DONE);
    }

    #[tokio::test]
    async fn test_cancelled_job_starts_no_pairs() {
        let store = Arc::new(InMemoryJobStore::default());
        let job_id = store.create(vec!["english".into(), "malay".into()]);
        store.request_cancel(job_id).unwrap();

        let mut translator = MockTranslator::new();
        translator.expect_translate().times(0);

        let builder = MatrixBuilder::new(Arc::new(translator), default_profiles()).with_store(store.clone());
        let results = builder.build(Some(job_id), &succeeded(&["english", "malay"])).await;
        assert!(results.is_empty());
    }
}
