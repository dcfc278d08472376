use reqwest::Client;
use tracing::{info, warn};

use super::settings::ResolvedConfig;
use crate::core::error::{ModSyncError, ModSyncResult};
use crate::core::http::build_http_client;
use crate::core::manifest::ManifestStore;
use crate::core::plugins::PluginsReconciler;
use crate::core::registry::HttpRegistryClient;
use crate::core::sync::Orchestrator;

/// Everything a command needs, built once per process from the resolved
/// configuration.
pub struct AppState {
    pub config: ResolvedConfig,
    pub http_client: Client,
}

impl AppState {
    /// Check the collaborator-provided layout and build shared clients.
    ///
    /// The installation root must already exist. The plugins dir is created
    /// when missing. A missing framework marker is only reported.
    pub async fn prepare(config: ResolvedConfig) -> ModSyncResult<Self> {
        match tokio::fs::metadata(&config.installation_root).await {
            Ok(meta) if meta.is_dir() => {}
            Ok(_) => {
                return Err(ModSyncError::InvalidConfig(format!(
                    "installation root {:?} is not a directory",
                    config.installation_root
                )))
            }
            Err(e) => {
                return Err(ModSyncError::InvalidConfig(format!(
                    "installation root {:?} is not accessible: {e}",
                    config.installation_root
                )))
            }
        }

        tokio::fs::create_dir_all(&config.plugins_dir)
            .await
            .map_err(|e| ModSyncError::io(&config.plugins_dir, e))?;

        if !tokio::fs::try_exists(&config.framework_marker)
            .await
            .unwrap_or(false)
        {
            warn!(
                "Mod framework not detected at {:?}; installed mods will not load until it is present",
                config.framework_marker
            );
        }

        let http_client = build_http_client()
            .map_err(|e| ModSyncError::InvalidConfig(format!("cannot build HTTP client: {e}")))?;

        info!(
            "Installation root {:?}, plugins {:?}, backup {:?}",
            config.installation_root, config.plugins_dir, config.backup_dir
        );
        Ok(Self {
            config,
            http_client,
        })
    }

    pub fn manifest_store(&self) -> ManifestStore {
        ManifestStore::new(self.config.manifest_path.clone())
    }

    pub fn plugins(&self) -> PluginsReconciler {
        PluginsReconciler::new(
            self.config.plugins_dir.clone(),
            self.config.backup_dir.clone(),
            self.config.staging_dir.clone(),
        )
    }

    pub fn registry(&self) -> HttpRegistryClient {
        HttpRegistryClient::new(
            self.http_client.clone(),
            &self.config.registry_base_url,
            self.config.registry_delay,
            self.config.download_delay,
        )
    }

    pub fn orchestrator(&self) -> Orchestrator<HttpRegistryClient, PluginsReconciler> {
        Orchestrator::new(self.manifest_store(), self.registry(), self.plugins())
            .with_recheck_deprecated(self.config.recheck_deprecated)
    }
}
