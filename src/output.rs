use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{Result, SubtrixError};
use crate::status::ResultKey;
use crate::subtitle::{write_track, SubtitleTrack};

/// On-disk layout of job results: `<root>/<job id>/subtitles/<file>.srt`
#[derive(Debug, Clone)]
pub struct OutputLayout {
    root: PathBuf,
}

impl OutputLayout {
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn job_dir(&self, job_id: Uuid) -> PathBuf {
        self.root.join(job_id.to_string())
    }

    pub fn subtitles_dir(&self, job_id: Uuid) -> PathBuf {
        self.job_dir(job_id).join("subtitles")
    }

    pub fn path_for(&self, job_id: Uuid, key: &ResultKey) -> PathBuf {
        self.subtitles_dir(job_id).join(key.file_name())
    }

    pub async fn write(&self, job_id: Uuid, key: &ResultKey, track: &SubtitleTrack) -> Result<PathBuf> {
        let path = self.path_for(job_id, key);
        write_track(&path, track).await?;
        Ok(path)
    }

    /// Map a requested download name to an existing file of the job
    pub fn resolve_download(&self, job_id: Uuid, file_name: &str) -> Result<PathBuf> {
        let key = ResultKey::from_file_name(file_name)?;
        let path = self.path_for(job_id, &key);
        if !path.is_file() {
            return Err(SubtrixError::ResultNotFound {
                job_id,
                file: key.file_name(),
            });
        }
        Ok(path)
    }
}

/// Delete job directories under `root` not modified within `max_age`
pub async fn clean_old_jobs(root: &Path, max_age: Duration) -> Result<usize> {
    if !root.exists() {
        debug!("Nothing to clean, {} does not exist", root.display());
        return Ok(0);
    }

    let cutoff = SystemTime::now().checked_sub(max_age).unwrap_or(SystemTime::UNIX_EPOCH);
    let mut removed = 0;
    let mut entries = tokio::fs::read_dir(root).await?;

    while let Some(entry) = entries.next_entry().await? {
        let metadata = entry.metadata().await?;
        if !metadata.is_dir() {
            continue;
        }
        let modified = metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH);
        if modified > cutoff {
            continue;
        }

        match tokio::fs::remove_dir_all(entry.path()).await {
            Ok(()) => {
                debug!("Removed old job directory {}", entry.path().display());
                removed += 1;
            }
            Err(e) => warn!("Failed to remove {}: {}", entry.path().display(), e),
        }
    }

    info!("Cleaned {} job directories older than {:?}", removed, max_age);
    Ok(removed)
}
