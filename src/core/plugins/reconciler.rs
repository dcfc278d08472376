use std::collections::{BTreeSet, HashSet};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::Utc;
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::extract::extract_zip_bytes;
use crate::core::error::{ModSyncError, ModSyncResult};
use crate::core::manifest::ModId;

/// Filesystem side of reconciliation, as seen by the orchestrator.
#[async_trait]
pub trait ModFilesystem: Send + Sync {
    /// Top-level plugin folders not named in `managed`.
    async fn list_unmanaged(&self, managed: &HashSet<String>) -> ModSyncResult<BTreeSet<String>>;

    /// Move one plugin folder into the backup area.
    async fn quarantine(&self, folder_name: &str) -> ModSyncResult<PathBuf>;

    /// Quarantine every installed version of `id`.
    async fn replace_version(&self, id: &ModId) -> ModSyncResult<Vec<PathBuf>>;

    /// Unpack `archive` as `{namespace}-{name}-{version}`.
    async fn install(&self, id: &ModId, version: &str, archive: &[u8]) -> ModSyncResult<PathBuf>;

    /// Whether `folder_name` is present and non-empty.
    async fn is_installed(&self, folder_name: &str) -> ModSyncResult<bool>;
}

/// Plugins directory plus its backup and staging areas.
pub struct PluginsReconciler {
    plugins_dir: PathBuf,
    backup_dir: PathBuf,
    staging_root: PathBuf,
}

impl PluginsReconciler {
    pub fn new(plugins_dir: PathBuf, backup_dir: PathBuf, staging_root: PathBuf) -> Self {
        Self {
            plugins_dir,
            backup_dir,
            staging_root,
        }
    }

    pub fn plugins_dir(&self) -> &Path {
        &self.plugins_dir
    }

    pub fn backup_dir(&self) -> &Path {
        &self.backup_dir
    }
}

#[async_trait]
impl ModFilesystem for PluginsReconciler {
    async fn list_unmanaged(&self, managed: &HashSet<String>) -> ModSyncResult<BTreeSet<String>> {
        list_unmanaged(&self.plugins_dir, managed).await
    }

    async fn quarantine(&self, folder_name: &str) -> ModSyncResult<PathBuf> {
        quarantine(&self.plugins_dir.join(folder_name), &self.backup_dir).await
    }

    async fn replace_version(&self, id: &ModId) -> ModSyncResult<Vec<PathBuf>> {
        replace_version(id, &self.backup_dir, &self.plugins_dir).await
    }

    async fn install(&self, id: &ModId, version: &str, archive: &[u8]) -> ModSyncResult<PathBuf> {
        install(id, version, archive, &self.plugins_dir, &self.staging_root).await
    }

    async fn is_installed(&self, folder_name: &str) -> ModSyncResult<bool> {
        folder_is_populated(&self.plugins_dir.join(folder_name)).await
    }
}

/// Names of the top-level directories under `plugins_dir` that are not in
/// `managed`. Loose files are ignored. A missing plugins dir has nothing
/// unmanaged in it.
pub async fn list_unmanaged(
    plugins_dir: &Path,
    managed: &HashSet<String>,
) -> ModSyncResult<BTreeSet<String>> {
    Ok(plugin_folders(plugins_dir)
        .await?
        .into_iter()
        .filter(|name| !managed.contains(name))
        .collect())
}

/// Move `folder_path` into `backup_dir` under its own name.
///
/// An older backup with the same name is first renamed with a timestamp
/// suffix, so the newest copy always keeps the original name and nothing in
/// the backup area is overwritten.
pub async fn quarantine(folder_path: &Path, backup_dir: &Path) -> ModSyncResult<PathBuf> {
    let folder_name = folder_path
        .file_name()
        .ok_or_else(|| {
            ModSyncError::io(
                folder_path,
                std::io::Error::new(std::io::ErrorKind::InvalidInput, "path has no folder name"),
            )
        })?
        .to_os_string();

    tokio::fs::create_dir_all(backup_dir)
        .await
        .map_err(|e| ModSyncError::io(backup_dir, e))?;

    let destination = backup_dir.join(&folder_name);
    if path_exists(&destination).await {
        let stamp = Utc::now().format("%Y%m%dT%H%M%SZ");
        let mut aside = backup_dir.join(format!("{}.{stamp}", folder_name.to_string_lossy()));
        if path_exists(&aside).await {
            aside = backup_dir.join(format!(
                "{}.{stamp}-{}",
                folder_name.to_string_lossy(),
                &Uuid::new_v4().simple().to_string()[..8]
            ));
        }
        tokio::fs::rename(&destination, &aside)
            .await
            .map_err(|e| ModSyncError::io(&aside, e))?;
        debug!("Previous backup {:?} kept as {:?}", destination, aside);
    }

    move_dir(folder_path, &destination).await?;
    info!("Quarantined {:?} -> {:?}", folder_path, destination);
    Ok(destination)
}

/// Quarantine every `{namespace}-{name}-*` folder in `plugins_dir`.
pub async fn replace_version(
    id: &ModId,
    backup_dir: &Path,
    plugins_dir: &Path,
) -> ModSyncResult<Vec<PathBuf>> {
    let mut moved = Vec::new();
    for folder in plugin_folders(plugins_dir).await? {
        if id.owns_folder(&folder) {
            moved.push(quarantine(&plugins_dir.join(&folder), backup_dir).await?);
        }
    }
    Ok(moved)
}

/// Extract `archive` into a scratch directory under `staging_root`, then
/// move it into place as `{namespace}-{name}-{version}`. On any failure the
/// scratch directory is removed and no target folder is left behind.
pub async fn install(
    id: &ModId,
    version: &str,
    archive: &[u8],
    plugins_dir: &Path,
    staging_root: &Path,
) -> ModSyncResult<PathBuf> {
    let target = plugins_dir.join(id.folder_name(version));
    if path_exists(&target).await {
        return Err(ModSyncError::io(
            &target,
            std::io::Error::new(std::io::ErrorKind::AlreadyExists, "install target already exists"),
        ));
    }

    let digest = hex::encode(Sha256::digest(archive));
    debug!(%id, version, sha256 = %digest, bytes = archive.len(), "Installing archive");

    let staging = staging_root.join(Uuid::new_v4().to_string());
    let result = stage_and_promote(archive, &staging, plugins_dir, &target).await;
    if result.is_err() && path_exists(&staging).await {
        if let Err(e) = tokio::fs::remove_dir_all(&staging).await {
            warn!("Could not remove staging dir {:?}: {}", staging, e);
        }
    }
    result?;

    info!(%id, version, "Installed into {:?}", target);
    Ok(target)
}

async fn stage_and_promote(
    archive: &[u8],
    staging: &Path,
    plugins_dir: &Path,
    target: &Path,
) -> ModSyncResult<()> {
    let files = extract_zip_bytes(archive, staging)?;
    debug!("Extracted {} files into {:?}", files, staging);

    tokio::fs::create_dir_all(plugins_dir)
        .await
        .map_err(|e| ModSyncError::io(plugins_dir, e))?;
    move_dir(staging, target).await
}

/// Rename when possible; across filesystems copy to a hidden name next to
/// `to`, rename that into place, then drop the source.
async fn move_dir(from: &Path, to: &Path) -> ModSyncResult<()> {
    match tokio::fs::rename(from, to).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::CrossesDevices => copy_then_swap(from, to).await,
        Err(e) => Err(ModSyncError::io(from, e)),
    }
}

/// Copy `from` into a hidden partial name next to `to`, rename it into
/// place, then remove `from`. A failed copy leaves no partial behind.
async fn copy_then_swap(from: &Path, to: &Path) -> ModSyncResult<()> {
    let parent = to.parent().unwrap_or(Path::new("."));
    let name = to
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    let partial = parent.join(format!(".{name}.partial-{}", Uuid::new_v4()));

    let (src, dst) = (from.to_path_buf(), partial.clone());
    let copied = tokio::task::spawn_blocking(move || copy_dir_recursive(&src, &dst))
        .await
        .map_err(|e| ModSyncError::io(from, std::io::Error::other(e)))?;
    if let Err(e) = copied {
        let _ = tokio::fs::remove_dir_all(&partial).await;
        return Err(ModSyncError::io(&partial, e));
    }

    if let Err(e) = tokio::fs::rename(&partial, to).await {
        let _ = tokio::fs::remove_dir_all(&partial).await;
        return Err(ModSyncError::io(to, e));
    }
    tokio::fs::remove_dir_all(from)
        .await
        .map_err(|e| ModSyncError::io(from, e))
}

fn copy_dir_recursive(source: &Path, destination: &Path) -> std::io::Result<()> {
    std::fs::create_dir_all(destination)?;
    for entry in std::fs::read_dir(source)? {
        let entry = entry?;
        let src_path = entry.path();
        let dst_path = destination.join(entry.file_name());
        let file_type = entry.file_type()?;

        if file_type.is_dir() {
            copy_dir_recursive(&src_path, &dst_path)?;
        } else {
            std::fs::copy(&src_path, &dst_path)?;
        }
    }
    Ok(())
}

async fn plugin_folders(plugins_dir: &Path) -> ModSyncResult<Vec<String>> {
    let mut entries = match tokio::fs::read_dir(plugins_dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(ModSyncError::io(plugins_dir, e)),
    };

    let mut folders = Vec::new();
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| ModSyncError::io(plugins_dir, e))?
    {
        let file_type = entry
            .file_type()
            .await
            .map_err(|e| ModSyncError::io(entry.path(), e))?;
        if file_type.is_dir() {
            folders.push(entry.file_name().to_string_lossy().to_string());
        }
    }
    folders.sort();
    Ok(folders)
}

async fn folder_is_populated(path: &Path) -> ModSyncResult<bool> {
    let mut entries = match tokio::fs::read_dir(path).await {
        Ok(entries) => entries,
        Err(e)
            if matches!(
                e.kind(),
                std::io::ErrorKind::NotFound | std::io::ErrorKind::NotADirectory
            ) =>
        {
            return Ok(false)
        }
        Err(e) => return Err(ModSyncError::io(path, e)),
    };
    Ok(entries
        .next_entry()
        .await
        .map_err(|e| ModSyncError::io(path, e))?
        .is_some())
}

async fn path_exists(path: &Path) -> bool {
    tokio::fs::try_exists(path).await.unwrap_or(false)
}
