pub mod client;
pub mod package;

pub use client::{HttpRegistryClient, RegistryClient};
pub use package::RemotePackageInfo;
