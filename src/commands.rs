use tracing::{info, warn};

use crate::core::error::ModSyncResult;
use crate::core::plugins::ModFilesystem;
use crate::core::state::AppState;
use crate::core::sync::{EntryOutcome, RunReport};

/// `modsync sync`: one full reconciliation pass.
pub async fn sync(state: &AppState) -> ModSyncResult<RunReport> {
    let report = state.orchestrator().run().await?;

    for folder in &report.quarantined_unmanaged {
        println!("quarantined  {folder}");
    }
    for (id, outcome) in &report.entries {
        println!("{:<40} {}", id.to_string(), describe(outcome));
    }
    println!("{report}");

    Ok(report)
}

/// `modsync plan`: decisions only, nothing is changed.
pub async fn plan(state: &AppState) -> ModSyncResult<()> {
    let plan = state.orchestrator().plan().await?;

    if plan.unmanaged.is_empty() {
        println!("No unmanaged plugin folders.");
    }
    for folder in &plan.unmanaged {
        println!("would quarantine  {folder}");
    }
    for (id, step) in &plan.entries {
        println!("{:<40} {}", id.to_string(), step);
    }

    info!("Plan computed for {} entries", plan.entries.len());
    Ok(())
}

/// `modsync list`: manifest contents and folder presence, offline.
pub async fn list(state: &AppState) -> ModSyncResult<()> {
    let manifest = state.manifest_store().load().await?;
    let plugins = state.plugins();

    if manifest.mods.is_empty() {
        println!("Manifest {:?} lists no mods.", state.config.manifest_path);
        return Ok(());
    }

    for entry in &manifest.mods {
        let status = if entry.deprecated {
            match entry.deprecated_date {
                Some(date) => format!("deprecated since {}", date.format("%Y-%m-%d")),
                None => "deprecated".to_string(),
            }
        } else {
            match plugins.is_installed(&entry.folder_name()).await {
                Ok(true) => "installed".to_string(),
                Ok(false) => "missing".to_string(),
                Err(e) => {
                    warn!(kind = %e.kind(), "Could not inspect {}: {e}", entry.folder_name());
                    "unreadable".to_string()
                }
            }
        };
        println!(
            "{:<40} {:<12} {:<24} history: {}",
            entry.id().to_string(),
            entry.version,
            status,
            entry.version_history.len()
        );
    }
    Ok(())
}

fn describe(outcome: &EntryOutcome) -> String {
    match outcome {
        EntryOutcome::Updated { from, to } => format!("updated {from} -> {to}"),
        EntryOutcome::SelfHealed { version } => format!("reinstalled {version}"),
        EntryOutcome::UpToDate => "up to date".into(),
        EntryOutcome::Deprecated { quarantined } => {
            format!("deprecated ({quarantined} folder(s) quarantined)")
        }
        EntryOutcome::SkippedDeprecated => "deprecated, skipped".into(),
        EntryOutcome::FetchFailed { kind, message } => {
            format!("registry lookup failed ({kind}): {message}")
        }
        EntryOutcome::Failed { kind, message } => format!("failed ({kind}): {message}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::ErrorKind;

    #[test]
    fn outcome_descriptions() {
        assert_eq!(
            describe(&EntryOutcome::Updated {
                from: "1.20.0".into(),
                to: "1.21.0".into()
            }),
            "updated 1.20.0 -> 1.21.0"
        );
        assert_eq!(
            describe(&EntryOutcome::FetchFailed {
                kind: ErrorKind::Parse,
                message: "missing `latest`".into()
            }),
            "registry lookup failed (parse): missing `latest`"
        );
    }
}
