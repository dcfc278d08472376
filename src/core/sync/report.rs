use std::collections::BTreeSet;

use crate::core::error::ErrorKind;
use crate::core::manifest::ModId;

use super::decision::EntryAction;

/// Terminal state of one entry within a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryOutcome {
    Updated { from: String, to: String },
    SelfHealed { version: String },
    UpToDate,
    Deprecated { quarantined: usize },
    SkippedDeprecated,
    FetchFailed { kind: ErrorKind, message: String },
    Failed { kind: ErrorKind, message: String },
}

impl EntryOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, EntryOutcome::FetchFailed { .. } | EntryOutcome::Failed { .. })
    }
}

/// Summary of a reconciliation run.
#[derive(Debug, Default)]
pub struct RunReport {
    pub quarantined_unmanaged: Vec<String>,
    pub entries: Vec<(ModId, EntryOutcome)>,
}

impl RunReport {
    pub fn count(&self, pred: impl Fn(&EntryOutcome) -> bool) -> usize {
        self.entries.iter().filter(|(_, o)| pred(o)).count()
    }

    pub fn failures(&self) -> usize {
        self.count(EntryOutcome::is_failure)
    }
}

impl std::fmt::Display for RunReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} entries: {} updated, {} reinstalled, {} up to date, {} deprecated, {} skipped (deprecated), {} fetch failed, {} failed; {} unmanaged folders quarantined",
            self.entries.len(),
            self.count(|o| matches!(o, EntryOutcome::Updated { .. })),
            self.count(|o| matches!(o, EntryOutcome::SelfHealed { .. })),
            self.count(|o| matches!(o, EntryOutcome::UpToDate)),
            self.count(|o| matches!(o, EntryOutcome::Deprecated { .. })),
            self.count(|o| matches!(o, EntryOutcome::SkippedDeprecated)),
            self.count(|o| matches!(o, EntryOutcome::FetchFailed { .. })),
            self.count(|o| matches!(o, EntryOutcome::Failed { .. })),
            self.quarantined_unmanaged.len(),
        )
    }
}

/// What a dry run found for one entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlannedStep {
    Act(EntryAction),
    SkipDeprecated,
    FetchFailed { kind: ErrorKind, message: String },
    /// Local check failed, e.g. the plugins root could not be read.
    Failed { kind: ErrorKind, message: String },
}

impl std::fmt::Display for PlannedStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlannedStep::Act(action) => write!(f, "{action}"),
            PlannedStep::SkipDeprecated => write!(f, "skip (deprecated)"),
            PlannedStep::FetchFailed { kind, message } => {
                write!(f, "registry lookup failed ({kind}): {message}")
            }
            PlannedStep::Failed { kind, message } => write!(f, "failed ({kind}): {message}"),
        }
    }
}

/// Result of a dry run: nothing on disk has been touched.
#[derive(Debug, Default)]
pub struct PlanReport {
    pub unmanaged: BTreeSet<String>,
    pub entries: Vec<(ModId, PlannedStep)>,
}
