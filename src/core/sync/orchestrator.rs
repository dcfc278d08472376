use chrono::Utc;
use tracing::{debug, error, info, instrument, warn};

use super::decision::{decide, EntryAction, InstallReason};
use super::report::{EntryOutcome, PlanReport, PlannedStep, RunReport};
use crate::core::error::{ModSyncError, ModSyncResult};
use crate::core::manifest::{ManifestStore, ModEntry, ModManifest};
use crate::core::plugins::ModFilesystem;
use crate::core::registry::RegistryClient;

/// Drives one reconciliation pass: unmanaged cleanup, then every manifest
/// entry in order, one at a time.
pub struct Orchestrator<R, F> {
    store: ManifestStore,
    registry: R,
    plugins: F,
    recheck_deprecated: bool,
}

impl<R: RegistryClient, F: ModFilesystem> Orchestrator<R, F> {
    pub fn new(store: ManifestStore, registry: R, plugins: F) -> Self {
        Self {
            store,
            registry,
            plugins,
            recheck_deprecated: false,
        }
    }

    /// Query the registry again for entries already marked deprecated.
    pub fn with_recheck_deprecated(mut self, recheck: bool) -> Self {
        self.recheck_deprecated = recheck;
        self
    }

    /// Full run. Only a manifest that cannot be loaded fails the run. An
    /// unreadable plugins root is logged and skips the cleanup step; every
    /// per-entry failure is logged and recorded in the report.
    pub async fn run(&self) -> ModSyncResult<RunReport> {
        let mut manifest = self.store.load().await?;
        info!(
            "Reconciling {} manifest entries from {:?}",
            manifest.mods.len(),
            self.store.path()
        );

        let mut report = RunReport {
            quarantined_unmanaged: self.cleanup_unmanaged(&manifest).await,
            ..Default::default()
        };

        for index in 0..manifest.mods.len() {
            let entry = manifest.mods[index].clone();
            let outcome = self.process_entry(&mut manifest, &entry).await;
            report.entries.push((entry.id(), outcome));
        }

        info!("Reconciliation finished: {}", report);
        Ok(report)
    }

    /// Dry run: same registry lookups and decisions, no filesystem or
    /// manifest changes.
    pub async fn plan(&self) -> ModSyncResult<PlanReport> {
        let manifest = self.store.load().await?;
        let unmanaged = match self.plugins.list_unmanaged(&manifest.managed_folder_names()).await {
            Ok(unmanaged) => unmanaged,
            Err(e) => {
                error!(kind = %e.kind(), "Could not scan plugins directory: {e}");
                Default::default()
            }
        };

        let mut entries = Vec::with_capacity(manifest.mods.len());
        for entry in &manifest.mods {
            entries.push((entry.id(), self.plan_entry(entry).await));
        }

        Ok(PlanReport { unmanaged, entries })
    }

    /// Quarantine every plugin folder the manifest, as loaded, does not
    /// claim. Failures are logged; the run continues.
    async fn cleanup_unmanaged(&self, manifest: &ModManifest) -> Vec<String> {
        let managed = manifest.managed_folder_names();
        let unmanaged = match self.plugins.list_unmanaged(&managed).await {
            Ok(unmanaged) => unmanaged,
            Err(e) => {
                error!(kind = %e.kind(), "Could not scan plugins directory: {e}");
                return Vec::new();
            }
        };

        let mut moved = Vec::new();
        for folder in unmanaged {
            match self.plugins.quarantine(&folder).await {
                Ok(dest) => {
                    warn!(folder = %folder, "Unmanaged plugin folder moved to {:?}", dest);
                    moved.push(folder);
                }
                Err(e) => error!(folder = %folder, kind = %e.kind(), "Could not quarantine: {e}"),
            }
        }
        moved
    }

    /// Registry lookup + decision for the dry run. Registry and disk
    /// failures are reported as different steps.
    async fn plan_entry(&self, entry: &ModEntry) -> PlannedStep {
        if entry.deprecated && !self.recheck_deprecated {
            return PlannedStep::SkipDeprecated;
        }
        let remote = match self.registry.fetch_package_info(&entry.id()).await {
            Ok(remote) => remote,
            Err(e) => {
                return PlannedStep::FetchFailed {
                    kind: e.kind(),
                    message: e.to_string(),
                }
            }
        };
        match self.plugins.is_installed(&entry.folder_name()).await {
            Ok(present) => PlannedStep::Act(decide(entry, &remote, present)),
            Err(e) => PlannedStep::Failed {
                kind: e.kind(),
                message: e.to_string(),
            },
        }
    }

    #[instrument(skip_all, fields(namespace = %entry.namespace, name = %entry.name, version = %entry.version))]
    async fn process_entry(&self, manifest: &mut ModManifest, entry: &ModEntry) -> EntryOutcome {
        if entry.deprecated && !self.recheck_deprecated {
            debug!("Entry is deprecated; skipping registry lookup");
            return EntryOutcome::SkippedDeprecated;
        }

        let remote = match self.registry.fetch_package_info(&entry.id()).await {
            Ok(remote) => remote,
            Err(e) => {
                error!(kind = %e.kind(), "Registry lookup failed: {e}");
                return EntryOutcome::FetchFailed {
                    kind: e.kind(),
                    message: e.to_string(),
                };
            }
        };

        let outcome = match self.plugins.is_installed(&entry.folder_name()).await {
            Ok(present) => {
                let action = decide(entry, &remote, present);
                debug!(%action, "Decided");
                self.execute(manifest, entry, action).await
            }
            Err(e) => Err(e),
        };

        match outcome {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(kind = %e.kind(), "Entry failed: {e}");
                e.into()
            }
        }
    }

    async fn execute(
        &self,
        manifest: &mut ModManifest,
        entry: &ModEntry,
        action: EntryAction,
    ) -> ModSyncResult<EntryOutcome> {
        let id = entry.id();
        match action {
            EntryAction::UpToDate => Ok(EntryOutcome::UpToDate),
            EntryAction::Deprecate => {
                let moved = self.plugins.replace_version(&id).await?;
                self.store
                    .apply_deprecation(manifest, &id.namespace, &id.name, Utc::now())
                    .await?;
                warn!(quarantined = moved.len(), "Mod is deprecated on the registry");
                Ok(EntryOutcome::Deprecated {
                    quarantined: moved.len(),
                })
            }
            EntryAction::Install {
                version,
                download_url,
                reason,
            } => {
                // Download before touching the old install so a network
                // failure leaves it in place.
                let archive = self.registry.download(&download_url).await?;
                let moved = self.plugins.replace_version(&id).await?;
                if !moved.is_empty() {
                    debug!("Moved {} previous folder(s) to backup", moved.len());
                }
                self.plugins.install(&id, &version, &archive).await?;
                self.store
                    .apply_version_update(manifest, &id.namespace, &id.name, &version, Utc::now())
                    .await?;

                Ok(match reason {
                    InstallReason::NewVersion { from } => {
                        info!(from = %from, to = %version, "Mod updated");
                        EntryOutcome::Updated { from, to: version }
                    }
                    InstallReason::SelfHeal => {
                        info!("Missing mod folder reinstalled");
                        EntryOutcome::SelfHealed { version }
                    }
                })
            }
        }
    }
}

impl From<ModSyncError> for EntryOutcome {
    fn from(e: ModSyncError) -> Self {
        EntryOutcome::Failed {
            kind: e.kind(),
            message: e.to_string(),
        }
    }
}
