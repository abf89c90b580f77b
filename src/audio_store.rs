//! Synthesized audio artifacts. Each turn writes one file, the provider
//! fetches it once through `/audio/:file`, and the reclamation pass deletes
//! it afterwards.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{Duration, SystemTime};
use tokio::fs;
use tracing::{debug, warn};
use uuid::Uuid;

/// Delivered artifacts linger this long in case the provider re-fetches.
const DELIVERED_GRACE: Duration = Duration::from_secs(60);

pub struct AudioStore {
    dir: PathBuf,
    public_base_url: String,
    ttl: Duration,
    delivered: Mutex<HashSet<String>>,
}

impl AudioStore {
    pub async fn open(
        dir: impl Into<PathBuf>,
        public_base_url: &str,
        ttl: Duration,
    ) -> std::io::Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir).await?;
        Ok(Self {
            dir,
            public_base_url: public_base_url.trim_end_matches('/').to_string(),
            ttl,
            delivered: Mutex::new(HashSet::new()),
        })
    }

    /// Writes the artifact and returns the URL the provider should play.
    pub async fn save(&self, bytes: &[u8], extension: &str) -> std::io::Result<String> {
        let file_name = format!("{}.{extension}", Uuid::new_v4());
        fs::write(self.dir.join(&file_name), bytes).await?;
        debug!(file=%file_name, size=bytes.len(), "saved audio artifact");
        Ok(self.url_for(&file_name))
    }

    pub fn url_for(&self, file_name: &str) -> String {
        format!("{}/audio/{file_name}", self.public_base_url)
    }

    /// Resolves a requested file name, refusing anything that is not a bare
    /// artifact name.
    pub fn path_for(&self, file_name: &str) -> Option<PathBuf> {
        let valid = !file_name.is_empty()
            && file_name.len() <= 64
            && !file_name.starts_with('.')
            && file_name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '.');
        if !valid {
            return None;
        }
        Some(self.dir.join(file_name))
    }

    pub fn mark_delivered(&self, file_name: &str) {
        self.delivered
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(file_name.to_string());
    }

    /// Deletes delivered artifacts past the grace period and anything older
    /// than the TTL. Returns how many files went away.
    pub async fn reclaim(&self) -> std::io::Result<usize> {
        let mut removed = 0;
        let mut entries = fs::read_dir(&self.dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let file_name = entry.file_name().to_string_lossy().into_owned();
            let age = match entry.metadata().await.and_then(|m| m.modified()) {
                Ok(modified) => SystemTime::now()
                    .duration_since(modified)
                    .unwrap_or_default(),
                Err(e) => {
                    warn!(file=%file_name, error=%e, "cannot stat audio artifact");
                    continue;
                }
            };
            let delivered = self
                .delivered
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .contains(&file_name);
            if age > self.ttl || (delivered && age > DELIVERED_GRACE) {
                if let Err(e) = fs::remove_file(entry.path()).await {
                    warn!(file=%file_name, error=%e, "failed to delete audio artifact");
                    continue;
                }
                self.delivered
                    .lock()
                    .unwrap_or_else(|e| e.into_inner())
                    .remove(&file_name);
                removed += 1;
            }
        }
        Ok(removed)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}
