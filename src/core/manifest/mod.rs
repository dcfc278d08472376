pub mod model;
pub mod store;

pub use model::{ModEntry, ModId, ModManifest, VersionRecord};
pub use store::ManifestStore;
