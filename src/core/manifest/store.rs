use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};
use uuid::Uuid;

use super::model::{ModEntry, ModManifest};
use crate::core::error::{ModSyncError, ModSyncResult};

/// Owns the on-disk `mods.json`.
///
/// Every mutation is applied to the caller's in-memory manifest and then the
/// whole document is rewritten through a temp file + rename, so a killed
/// process leaves either the old or the new file, never a torn one.
pub struct ManifestStore {
    path: PathBuf,
}

impl ManifestStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load and validate the manifest. Missing or malformed files are fatal.
    pub async fn load(&self) -> ModSyncResult<ModManifest> {
        let json = match tokio::fs::read_to_string(&self.path).await {
            Ok(json) => json,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ModSyncError::ManifestNotFound(self.path.clone()));
            }
            Err(e) => return Err(ModSyncError::io(&self.path, e)),
        };

        let manifest: ModManifest =
            serde_json::from_str(&json).map_err(|source| ModSyncError::ManifestMalformed {
                path: self.path.clone(),
                source,
            })?;

        if let Some(dup) = manifest.first_duplicate() {
            return Err(ModSyncError::DuplicateEntry {
                namespace: dup.namespace,
                name: dup.name,
            });
        }

        debug!("Loaded {} manifest entries from {:?}", manifest.mods.len(), self.path);
        Ok(manifest)
    }

    /// Persist the whole manifest atomically.
    pub async fn save(&self, manifest: &ModManifest) -> ModSyncResult<()> {
        let mut json = serde_json::to_string_pretty(manifest).map_err(ModSyncError::Serialize)?;
        json.push('\n');

        let parent = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let file_name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "mods.json".into());
        let temp_path = parent.join(format!(".{file_name}.tmp-{}", Uuid::new_v4()));

        let result = write_and_replace(&temp_path, &self.path, json.as_bytes()).await;
        if result.is_err() {
            let _ = tokio::fs::remove_file(&temp_path).await;
        }
        result
    }

    /// Set `version` and record it in history, then persist if changed.
    pub async fn apply_version_update(
        &self,
        manifest: &mut ModManifest,
        namespace: &str,
        name: &str,
        new_version: &str,
        at: DateTime<Utc>,
    ) -> ModSyncResult<bool> {
        let entry = entry_mut(manifest, namespace, name)?;
        let previous = entry.version.clone();
        if !entry.apply_version_update(new_version, at) {
            return Ok(false);
        }
        self.save(manifest).await?;
        info!(namespace, name, from = %previous, to = %new_version, "Manifest version updated");
        Ok(true)
    }

    /// Mark an entry deprecated, then persist if changed.
    pub async fn apply_deprecation(
        &self,
        manifest: &mut ModManifest,
        namespace: &str,
        name: &str,
        at: DateTime<Utc>,
    ) -> ModSyncResult<bool> {
        let entry = entry_mut(manifest, namespace, name)?;
        if !entry.apply_deprecation(at) {
            return Ok(false);
        }
        self.save(manifest).await?;
        info!(namespace, name, "Manifest entry marked deprecated");
        Ok(true)
    }
}

/// Write `bytes` to `temp_path`, fsync, then rename over `target`. The caller
/// removes `temp_path` when this fails at any step.
async fn write_and_replace(temp_path: &Path, target: &Path, bytes: &[u8]) -> ModSyncResult<()> {
    {
        let mut file = tokio::fs::File::create(temp_path)
            .await
            .map_err(|e| ModSyncError::io(temp_path, e))?;
        file.write_all(bytes)
            .await
            .map_err(|e| ModSyncError::io(temp_path, e))?;
        file.sync_all()
            .await
            .map_err(|e| ModSyncError::io(temp_path, e))?;
    }
    tokio::fs::rename(temp_path, target)
        .await
        .map_err(|e| ModSyncError::io(target, e))
}

fn entry_mut<'a>(
    manifest: &'a mut ModManifest,
    namespace: &str,
    name: &str,
) -> ModSyncResult<&'a mut ModEntry> {
    manifest
        .find_entry_mut(namespace, name)
        .ok_or_else(|| ModSyncError::EntryNotFound {
            namespace: namespace.to_string(),
            name: name.to_string(),
        })
}
