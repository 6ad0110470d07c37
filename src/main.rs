//! subtrix - multi-language subtitle generation
//!
//! Entry point for the `subtrix` binary: loads configuration, sets up
//! logging and dispatches CLI commands to the library.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn, Level};
use tracing_appender::{non_blocking, rolling};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use walkdir::WalkDir;

use subtrix::cli::{parse_language_list, Args, CacheAction, Commands};
use subtrix::config::{Config, TranslationProvider};
use subtrix::error::SubtrixError;
use subtrix::matrix::{translate_track, LanguagePair, RetryPolicy};
use subtrix::media::MediaProcessorFactory;
use subtrix::output::clean_old_jobs;
use subtrix::segment::segment_transcript;
use subtrix::status::{spawn_sweeper, InMemoryJobStore, JobPhase, JobStatusView, JobStore};
use subtrix::subtitle::{read_track, write_track, write_track_as, SubtitleFormat};
use subtrix::transcribe::deepgram::DeepgramMapper;
use subtrix::translate::{check_ollama_availability, TranslationCache, TranslatorFactory};
use subtrix::workflow::Orchestrator;

const MEDIA_EXTENSIONS: [&str; 10] = ["mp4", "mov", "mkv", "avi", "webm", "m4v", "mp3", "wav", "m4a", "flac"];

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    setup_logging(args.verbose)?;

    let mut config = match &args.config {
        Some(config_path) => Config::from_file(config_path)?,
        None => {
            if Path::new("config.toml").exists() {
                info!("Found config.toml in current directory, loading...");
                Config::from_file("config.toml")?
            } else {
                Config::default()
            }
        }
    };

    match args.command {
        Commands::Process { input, languages, output_dir, translator, json } => {
            apply_overrides(&mut config, output_dir, translator)?;
            let languages = requested_languages(&config, languages.as_deref());

            let orchestrator = build_orchestrator(config).await?;
            let view = run_with_progress(&orchestrator, input, languages).await?;

            if json {
                println!("{}", serde_json::to_string_pretty(&view)?);
            } else {
                print_summary(&view, orchestrator.config().pipeline.output_dir.as_path());
            }
            if view.phase == JobPhase::Cancelled {
                return Err(SubtrixError::Cancelled(view.id).into());
            }
        }
        Commands::Batch { input_dir, languages, output_dir, translator } => {
            apply_overrides(&mut config, output_dir, translator)?;
            let languages = requested_languages(&config, languages.as_deref());

            if !input_dir.is_dir() {
                return Err(SubtrixError::Config(format!("{} is not a directory", input_dir.display())).into());
            }
            let media_files = find_media_files(&input_dir);
            info!("Found {} media files to process", media_files.len());

            let orchestrator = build_orchestrator(config).await?;
            let mut failures = 0;
            for media_path in media_files {
                match orchestrator.process_media(&media_path, &languages).await {
                    Ok(job) => info!("Processed {} as job {} ({})", media_path.display(), job.id, job.phase),
                    Err(e) => {
                        failures += 1;
                        warn!("Failed to process {}: {}", media_path.display(), e);
                    }
                }
            }
            if failures > 0 {
                warn!("{} media files failed", failures);
            }
        }
        Commands::Segment { input, language, output } => {
            let content = tokio::fs::read_to_string(&input)
                .await
                .with_context(|| format!("Failed to read {}", input.display()))?;
            let code = config
                .language(&language)
                .map(|p| p.code.clone())
                .unwrap_or_else(|| language.clone());

            let transcript = DeepgramMapper::from_json(&content, &code)?;
            let track = segment_transcript(&transcript, &config.captions_for(&language));
            write_track(&output, &track).await?;
            println!("Wrote {} cues to {}", track.len(), output.display());
        }
        Commands::Convert { input, output, format } => {
            let format = format.as_deref().map(SubtitleFormat::parse).transpose()?;
            let (output, format) = match (output, format) {
                (Some(output), Some(format)) => (output, format),
                (Some(output), None) => {
                    let format = SubtitleFormat::from_path(&output);
                    (output, format)
                }
                (None, Some(format)) => (input.with_extension(format.extension()), format),
                (None, None) => {
                    return Err(SubtrixError::Config("convert needs --output or --format".to_string()).into());
                }
            };
            if output == input {
                return Err(SubtrixError::Config(format!("{} is already the input file", output.display())).into());
            }

            let track = read_track(&input).await?;
            write_track_as(&output, &track, format).await?;
            println!("Converted {} cues to {}", track.len(), output.display());
        }
        Commands::Translate { input, source, target_langs, output_dir, translator } => {
            apply_overrides(&mut config, None, translator)?;
            ensure_translator_available(&config).await?;

            let track = read_track(&input).await?;
            let translator = TranslatorFactory::create_translator(&config.translate)?;
            let retry = RetryPolicy {
                max_retries: config.translate.max_retries,
                ..RetryPolicy::default()
            };
            let output_dir = output_dir
                .or_else(|| input.parent().map(Path::to_path_buf))
                .unwrap_or_else(|| PathBuf::from("."));

            let (source_name, source_code) = resolve_language(&config, &source);
            for target in parse_language_list(&target_langs) {
                let (target_name, target_code) = resolve_language(&config, &target);
                let pair = LanguagePair::new(&source_name, &target_name);
                let translated = translate_track(translator.as_ref(), &track, &source_code, &target_code, retry).await?;

                let path = output_dir.join(format!("{}.srt", pair.file_stem()));
                write_track(&path, &translated).await?;
                println!("Translated {} to {}", pair, path.display());
            }
        }
        Commands::Languages => {
            println!("{:<12} {:<8} {:<10} {:<10}", "Name", "Code", "Model", "Chars/line");
            println!("{}", "-".repeat(44));
            for profile in &config.languages {
                let captions = profile.caption_config(&config.captions);
                println!(
                    "{:<12} {:<8} {:<10} {:<10}",
                    profile.name, profile.code, profile.model, captions.max_chars_per_line
                );
            }
        }
        Commands::InitConfig { output, force } => {
            if output.exists() && !force {
                return Err(SubtrixError::Config(format!(
                    "{} already exists (use --force to overwrite)",
                    output.display()
                ))
                .into());
            }
            Config::default().save_to_file(&output)?;
            println!("Wrote default configuration to {}", output.display());
        }
        Commands::Clean { hours, output_dir } => {
            let hours = hours.unwrap_or(config.pipeline.retention_hours);
            let root = output_dir.unwrap_or_else(|| config.pipeline.output_dir.clone());
            let removed = clean_old_jobs(&root, Duration::from_secs(hours.saturating_mul(60 * 60))).await?;
            println!("Removed {} job directories older than {} hours from {}", removed, hours, root.display());
        }
        Commands::Cache { action } => {
            let Some(cache_dir) = config.translate.cache_dir.clone() else {
                println!("Translation cache is disabled (translate.cache_dir is not set)");
                return Ok(());
            };
            let cache = TranslationCache::new(cache_dir);

            match action {
                CacheAction::Clear => {
                    let count = cache.clear().await?;
                    println!("Cleared {} cached translations", count);
                }
                CacheAction::Info => {
                    let entries = cache.list().await?;
                    println!("\nTranslation Cache:");
                    println!("Directory: {}", cache.dir().display());
                    println!("Entries: {}", entries.len());
                    if let Some(newest) = entries.first() {
                        println!("Newest entry: {}", newest.cached_at.format("%Y-%m-%d %H:%M:%S"));
                    }
                    if let Some(oldest) = entries.last() {
                        println!("Oldest entry: {}", oldest.cached_at.format("%Y-%m-%d %H:%M:%S"));
                    }
                }
            }
        }
    }

    Ok(())
}

fn apply_overrides(config: &mut Config, output_dir: Option<PathBuf>, translator: Option<String>) -> Result<()> {
    if let Some(output_dir) = output_dir {
        config.pipeline.output_dir = output_dir;
    }
    if let Some(translator) = translator {
        config.translate.provider = TranslationProvider::parse(&translator)?;
    }
    Ok(())
}

fn requested_languages(config: &Config, languages: Option<&str>) -> Vec<String> {
    match languages {
        Some(list) => parse_language_list(list),
        None => config.language_names(),
    }
}

/// Configured (name, code) for a language, falling back to the input for both
fn resolve_language(config: &Config, language: &str) -> (String, String) {
    match config.language(language) {
        Some(profile) => (profile.name.clone(), profile.code.clone()),
        None => (language.to_string(), language.to_string()),
    }
}

async fn ensure_translator_available(config: &Config) -> Result<()> {
    if config.translate.provider == TranslationProvider::Ollama {
        check_ollama_availability(&config.translate.endpoint, &config.translate.model).await?;
    }
    Ok(())
}

async fn build_orchestrator(config: Config) -> Result<Orchestrator> {
    let version = MediaProcessorFactory::create_processor(config.media.clone())
        .version_info()
        .await
        .context("ffmpeg is required to extract audio")?;
    info!("Using {}", version);
    ensure_translator_available(&config).await?;

    let store: Arc<dyn JobStore> = Arc::new(InMemoryJobStore::with_retention_hours(config.pipeline.retention_hours));
    Ok(Orchestrator::from_config(config, store)?)
}

/// Run a job in the background and follow it with a progress bar; Ctrl-C cancels it
async fn run_with_progress(orchestrator: &Orchestrator, input: PathBuf, languages: Vec<String>) -> Result<JobStatusView> {
    if !input.exists() {
        return Err(SubtrixError::FileNotFound(input.display().to_string()).into());
    }

    let store = Arc::clone(orchestrator.store());
    let sweeper = spawn_sweeper(Arc::clone(&store), Duration::from_secs(60 * 60));
    let job_id = orchestrator.spawn(input, languages);

    let pb = ProgressBar::new(100);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos:>3}% {msg}")?
            .progress_chars("#>-"),
    );

    let mut ticker = tokio::time::interval(Duration::from_millis(250));
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut cancel_sent = false;

    let view = loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = &mut ctrl_c, if !cancel_sent => {
                pb.set_message("Cancelling...");
                orchestrator.cancel(job_id)?;
                cancel_sent = true;
                continue;
            }
        }

        let view = store.get(job_id).ok_or(SubtrixError::JobNotFound(job_id))?;
        pb.set_position(u64::from(view.progress));
        pb.set_message(view.message.clone());
        if view.phase.is_terminal() {
            break view;
        }
    };

    pb.finish_with_message(format!("{} ({})", view.message, view.phase));
    sweeper.abort();
    Ok(view)
}

fn print_summary(view: &JobStatusView, output_root: &Path) {
    println!("\nJob {}: {}", view.id, view.phase);
    if let Some(error) = &view.error {
        println!("Error: {}", error);
    }
    println!("Languages succeeded: {}", view.succeeded_languages.join(", "));
    for failed in &view.failed_languages {
        println!("Language failed: {} ({})", failed.language, failed.error);
    }
    println!("Translations succeeded: {}", view.translation_pairs_succeeded.len());
    for failed in &view.translation_pairs_failed {
        println!("Translation failed: {} to {} ({})", failed.source, failed.target, failed.error);
    }
    println!("Output: {}", output_root.join(view.id.to_string()).join("subtitles").display());
}

fn find_media_files(dir: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(dir)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter(|e| {
            e.path()
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| MEDIA_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        })
        .map(|e| e.path().to_path_buf())
        .collect();
    files.sort();
    files
}

/// Setup logging to both console and file
fn setup_logging(verbose: bool) -> Result<()> {
    let log_dir = std::env::current_dir()?.join(".subtrix").join("log");
    std::fs::create_dir_all(&log_dir)?;

    let file_appender = rolling::daily(&log_dir, "subtrix.log");
    let (non_blocking_file, guard) = non_blocking(file_appender);
    // Keep the guard alive for the duration of the program
    std::mem::forget(guard);

    let log_level = if verbose { Level::DEBUG } else { Level::INFO };

    let console_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_file(verbose)
        .with_line_number(verbose);

    let file_layer = fmt::layer()
        .with_writer(non_blocking_file)
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .with_ansi(false);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive(log_level.into()))
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    info!(
        "Logging initialized - console: {}, file: {}",
        log_level,
        log_dir.join("subtrix.log").display()
    );

    Ok(())
}
