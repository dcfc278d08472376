use crate::core::manifest::ModEntry;
use crate::core::registry::RemotePackageInfo;

/// Why an entry gets (re)installed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstallReason {
    /// The registry publishes a different version than the manifest tracks.
    NewVersion { from: String },
    /// Versions agree but the expected folder is missing or empty.
    SelfHeal,
}

/// What the orchestrator will do for one entry once registry data is in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryAction {
    /// Quarantine every installed version and mark the entry deprecated.
    Deprecate,
    /// Nothing to do.
    UpToDate,
    /// Download `version`, quarantine old folders, install, record it.
    Install {
        version: String,
        download_url: String,
        reason: InstallReason,
    },
}

impl std::fmt::Display for EntryAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EntryAction::Deprecate => write!(f, "deprecate and quarantine"),
            EntryAction::UpToDate => write!(f, "up to date"),
            EntryAction::Install {
                version,
                reason: InstallReason::NewVersion { from },
                ..
            } => write!(f, "update {from} -> {version}"),
            EntryAction::Install {
                version,
                reason: InstallReason::SelfHeal,
                ..
            } => write!(f, "reinstall missing {version}"),
        }
    }
}

/// Pure decision for one entry.
///
/// Deprecation wins over everything and is terminal: an entry already marked
/// deprecated is never reinstalled, whatever the registry says now.
/// Installed-ness is judged from `folder_present` alone, so a deleted folder
/// is reinstalled even when the versions agree.
pub fn decide(entry: &ModEntry, remote: &RemotePackageInfo, folder_present: bool) -> EntryAction {
    if entry.deprecated || remote.is_deprecated {
        return EntryAction::Deprecate;
    }

    if remote.latest_version == entry.version && folder_present {
        return EntryAction::UpToDate;
    }

    let reason = if remote.latest_version == entry.version {
        InstallReason::SelfHeal
    } else {
        InstallReason::NewVersion {
            from: entry.version.clone(),
        }
    };

    EntryAction::Install {
        version: remote.latest_version.clone(),
        download_url: remote.download_url.clone(),
        reason,
    }
}
