pub mod extract;
pub mod reconciler;

pub use reconciler::{install, list_unmanaged, quarantine, replace_version, ModFilesystem, PluginsReconciler};
