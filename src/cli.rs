use std::path::PathBuf;

use clap::ArgAction;

use crate::core::state::SyncSettings;

#[derive(clap::Parser, Debug)]
#[command(name = "modsync", version, about = "Keep server mods in step with mods.json and the registry")]
pub struct Cli {
    /// Settings file (JSON). Defaults to the per-user config dir when present.
    #[arg(long, global = true, env = "MODSYNC_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(flatten)]
    pub overrides: SettingsArgs,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(clap::Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Reconcile the plugins directory and manifest (default)
    Sync,
    /// Show what a sync would do without changing anything
    Plan,
    /// List manifest entries and whether their folders are present
    List,
}

#[derive(clap::Args, Debug, Default)]
pub struct SettingsArgs {
    /// Server installation root
    #[arg(long, global = true, env = "MODSYNC_INSTALLATION_ROOT")]
    pub installation_root: Option<PathBuf>,

    /// Manifest file
    #[arg(long, global = true, env = "MODSYNC_MANIFEST")]
    pub manifest: Option<PathBuf>,

    /// Plugins directory
    #[arg(long, global = true, env = "MODSYNC_PLUGINS_DIR")]
    pub plugins_dir: Option<PathBuf>,

    /// Where quarantined folders are moved
    #[arg(long, global = true, env = "MODSYNC_BACKUP_DIR")]
    pub backup_dir: Option<PathBuf>,

    /// File whose presence indicates the mod framework is installed
    #[arg(long, global = true, env = "MODSYNC_FRAMEWORK_MARKER")]
    pub framework_marker: Option<PathBuf>,

    /// Directory for the rolling log file
    #[arg(long, global = true, env = "MODSYNC_LOG_DIR")]
    pub log_dir: Option<PathBuf>,

    /// Registry package endpoint base URL
    #[arg(long, global = true, env = "MODSYNC_REGISTRY_URL")]
    pub registry_url: Option<String>,

    /// Pause after each registry lookup, in milliseconds
    #[arg(long, global = true, env = "MODSYNC_REGISTRY_DELAY_MS")]
    pub registry_delay_ms: Option<u64>,

    /// Pause after each package download, in milliseconds
    #[arg(long, global = true, env = "MODSYNC_DOWNLOAD_DELAY_MS")]
    pub download_delay_ms: Option<u64>,

    /// Keep querying the registry for entries already marked deprecated
    #[arg(long, global = true, env = "MODSYNC_RECHECK_DEPRECATED", action = ArgAction::SetTrue)]
    pub recheck_deprecated: bool,
}

impl SettingsArgs {
    pub fn into_settings(self) -> SyncSettings {
        SyncSettings {
            installation_root: self.installation_root,
            manifest_path: self.manifest,
            plugins_dir: self.plugins_dir,
            backup_dir: self.backup_dir,
            framework_marker: self.framework_marker,
            log_dir: self.log_dir,
            registry_base_url: self.registry_url,
            registry_delay_ms: self.registry_delay_ms,
            download_delay_ms: self.download_delay_ms,
            recheck_deprecated: self.recheck_deprecated.then_some(true),
        }
    }
}
