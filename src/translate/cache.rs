use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::error::{Result, SubtrixError};
use super::Translator;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranslationCacheEntry {
    pub source_text: String,
    pub source_language: String,
    pub target_language: String,
    pub translation: String,
    pub model: String,
    pub cached_at: DateTime<Utc>,
}

impl TranslationCacheEntry {
    /// Whether this entry was stored for exactly this request
    pub fn matches(&self, text: &str, source_language: &str, target_language: &str, model: &str) -> bool {
        self.source_text == text
            && self.source_language == source_language
            && self.target_language == target_language
            && self.model == model
    }
}

/// Directory of JSON files, one per cached translation
#[derive(Debug, Clone)]
pub struct TranslationCache {
    dir: PathBuf,
}

impl TranslationCache {
    pub fn new<P: Into<PathBuf>>(dir: P) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Cache key for a translation request
    pub fn key(text: &str, source_language: &str, target_language: &str, model: &str) -> String {
        let mut hasher = DefaultHasher::new();
        text.hash(&mut hasher);
        source_language.hash(&mut hasher);
        target_language.hash(&mut hasher);
        model.hash(&mut hasher);
        format!("{:016x}", hasher.finish())
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", key))
    }

    /// Load the entry for a request; unreadable, corrupt or colliding entries count as misses
    pub async fn load(
        &self,
        text: &str,
        source_language: &str,
        target_language: &str,
        model: &str,
    ) -> Option<TranslationCacheEntry> {
        let key = Self::key(text, source_language, target_language, model);
        let content = tokio::fs::read_to_string(self.entry_path(&key)).await.ok()?;
        match serde_json::from_str::<TranslationCacheEntry>(&content) {
            Ok(entry) if entry.matches(text, source_language, target_language, model) => {
                debug!("Translation cache hit: {} (cached {})", key, entry.cached_at);
                Some(entry)
            }
            Ok(_) => {
                debug!("Translation cache entry {} belongs to another request", key);
                None
            }
            Err(e) => {
                warn!("Failed to parse translation cache entry {}: {}", key, e);
                None
            }
        }
    }

    pub async fn store(&self, key: &str, entry: &TranslationCacheEntry) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let content = serde_json::to_string_pretty(entry)
            .map_err(|e| SubtrixError::Translation(format!("Failed to serialize translation cache: {}", e)))?;
        tokio::fs::write(self.entry_path(key), content).await?;
        debug!("Saved translation to cache: {}", key);
        Ok(())
    }

    /// Remove every entry, returning how many were deleted
    pub async fn clear(&self) -> Result<u64> {
        let mut count = 0;
        if let Ok(mut entries) = tokio::fs::read_dir(&self.dir).await {
            while let Ok(Some(entry)) = entries.next_entry().await {
                let path = entry.path();
                if path.extension().is_some_and(|ext| ext == "json")
                    && tokio::fs::remove_file(&path).await.is_ok()
                {
                    count += 1;
                }
            }
        }
        info!("Cleared {} translation cache entries", count);
        Ok(count)
    }

    /// All readable entries, newest first
    pub async fn list(&self) -> Result<Vec<TranslationCacheEntry>> {
        let mut cached = Vec::new();

        if let Ok(mut entries) = tokio::fs::read_dir(&self.dir).await {
            while let Ok(Some(entry)) = entries.next_entry().await {
                let path = entry.path();
                if !path.extension().is_some_and(|ext| ext == "json") {
                    continue;
                }
                if let Ok(content) = tokio::fs::read_to_string(&path).await {
                    if let Ok(cache_entry) = serde_json::from_str::<TranslationCacheEntry>(&content) {
                        cached.push(cache_entry);
                    }
                }
            }
        }

        cached.sort_by(|a, b| b.cached_at.cmp(&a.cached_at));
        Ok(cached)
    }
}

/// Memoizes another translator in memory and, when a cache directory is
/// configured, on disk across runs. Failures are never cached.
pub struct CachingTranslator {
    inner: Arc<dyn Translator>,
    model: String,
    disk: Option<TranslationCache>,
    memory: Mutex<HashMap<(String, String, String), String>>,
}

impl CachingTranslator {
    pub fn new(inner: Arc<dyn Translator>, model: &str, disk: Option<TranslationCache>) -> Self {
        Self {
            inner,
            model: model.to_string(),
            disk,
            memory: Mutex::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl Translator for CachingTranslator {
    async fn translate(&self, text: &str, source_language: &str, target_language: &str) -> Result<String> {
        let memo_key = (text.to_string(), source_language.to_string(), target_language.to_string());

        let memoized = self.memory.lock().get(&memo_key).cloned();
        if let Some(cached) = memoized {
            return Ok(cached);
        }

        if let Some(disk) = &self.disk {
            if let Some(entry) = disk.load(text, source_language, target_language, &self.model).await {
                self.memory.lock().insert(memo_key, entry.translation.clone());
                return Ok(entry.translation);
            }
        }

        let translation = self.inner.translate(text, source_language, target_language).await?;
        self.memory.lock().insert(memo_key, translation.clone());

        if let Some(disk) = &self.disk {
            let entry = TranslationCacheEntry {
                source_text: text.to_string(),
                source_language: source_language.to_string(),
                target_language: target_language.to_string(),
                translation: translation.clone(),
                model: self.model.clone(),
                cached_at: Utc::now(),
            };
            let key = TranslationCache::key(text, source_language, target_language, &self.model);
            if let Err(e) = disk.store(&key, &entry).await {
                warn!("Failed to save translation to persistent cache: {}", e);
            }
        }

        Ok(translation)
    }
}
