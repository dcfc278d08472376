use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::core::error::{ModSyncError, ModSyncResult};

const APP_DIR_NAME: &str = "ModSync";
const SETTINGS_FILE: &str = "settings.json";

pub const DEFAULT_REGISTRY_BASE_URL: &str = "https://thunderstore.io/api/experimental/package";
pub const DEFAULT_REGISTRY_DELAY_MS: u64 = 2_000;
pub const MIN_REGISTRY_DELAY_MS: u64 = 1_000;
pub const DEFAULT_DOWNLOAD_DELAY_MS: u64 = 5_000;
pub const MIN_DOWNLOAD_DELAY_MS: u64 = 2_000;

/// User-facing settings. Every field is optional so layers (file,
/// environment, flags) can be stacked with [`SyncSettings::overlay`].
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SyncSettings {
    pub installation_root: Option<PathBuf>,
    pub manifest_path: Option<PathBuf>,
    pub plugins_dir: Option<PathBuf>,
    pub backup_dir: Option<PathBuf>,
    pub framework_marker: Option<PathBuf>,
    pub log_dir: Option<PathBuf>,
    pub registry_base_url: Option<String>,
    pub registry_delay_ms: Option<u64>,
    pub download_delay_ms: Option<u64>,
    pub recheck_deprecated: Option<bool>,
}

/// Fully resolved, validated configuration handed to every component.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedConfig {
    pub installation_root: PathBuf,
    pub manifest_path: PathBuf,
    pub plugins_dir: PathBuf,
    pub backup_dir: PathBuf,
    pub staging_dir: PathBuf,
    pub framework_marker: PathBuf,
    pub log_dir: PathBuf,
    pub registry_base_url: String,
    pub registry_delay: Duration,
    pub download_delay: Duration,
    pub recheck_deprecated: bool,
}

impl SyncSettings {
    /// Read a settings file. An explicitly requested file must exist.
    pub fn load(path: &Path) -> ModSyncResult<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            ModSyncError::InvalidConfig(format!("cannot read settings file {path:?}: {e}"))
        })?;
        serde_json::from_str(&raw)
            .map_err(|e| ModSyncError::InvalidConfig(format!("settings file {path:?} is malformed: {e}")))
    }

    /// Settings from the per-user config dir, if that file exists.
    pub fn load_default() -> ModSyncResult<Self> {
        match default_settings_path() {
            Some(path) if path.exists() => Self::load(&path),
            _ => Ok(Self::default()),
        }
    }

    /// Fields set in `overrides` win over fields set in `self`.
    pub fn overlay(self, overrides: SyncSettings) -> SyncSettings {
        SyncSettings {
            installation_root: overrides.installation_root.or(self.installation_root),
            manifest_path: overrides.manifest_path.or(self.manifest_path),
            plugins_dir: overrides.plugins_dir.or(self.plugins_dir),
            backup_dir: overrides.backup_dir.or(self.backup_dir),
            framework_marker: overrides.framework_marker.or(self.framework_marker),
            log_dir: overrides.log_dir.or(self.log_dir),
            registry_base_url: overrides.registry_base_url.or(self.registry_base_url),
            registry_delay_ms: overrides.registry_delay_ms.or(self.registry_delay_ms),
            download_delay_ms: overrides.download_delay_ms.or(self.download_delay_ms),
            recheck_deprecated: overrides.recheck_deprecated.or(self.recheck_deprecated),
        }
    }

    /// Fill defaults, anchor relative paths at the installation root and
    /// enforce the politeness floors on both delays.
    pub fn resolve(self) -> ModSyncResult<ResolvedConfig> {
        let installation_root = self
            .installation_root
            .unwrap_or_else(|| default_base_dir().join(APP_DIR_NAME).join("server"));
        let under_root = |p: PathBuf| {
            if p.is_absolute() {
                p
            } else {
                installation_root.join(p)
            }
        };

        let manifest_path = under_root(self.manifest_path.unwrap_or_else(|| "mods.json".into()));
        let plugins_dir = under_root(
            self.plugins_dir
                .unwrap_or_else(|| Path::new("BepInEx").join("plugins")),
        );
        let plugins_parent = plugins_dir
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| installation_root.clone());
        let backup_dir = match self.backup_dir {
            Some(dir) => under_root(dir),
            None => {
                let name = plugins_dir
                    .file_name()
                    .map(|n| n.to_string_lossy().to_string())
                    .unwrap_or_else(|| "plugins".into());
                plugins_parent.join(format!("{name}_backup"))
            }
        };
        let staging_dir = plugins_parent.join(".modsync-staging");
        let framework_marker = under_root(
            self.framework_marker
                .unwrap_or_else(|| Path::new("BepInEx").join("core").join("BepInEx.dll")),
        );
        let log_dir = under_root(self.log_dir.unwrap_or_else(|| "logs".into()));

        if backup_dir == plugins_dir || backup_dir.starts_with(&plugins_dir) {
            return Err(ModSyncError::InvalidConfig(format!(
                "backup dir {backup_dir:?} must not live inside the plugins dir {plugins_dir:?}"
            )));
        }

        let registry_base_url = self
            .registry_base_url
            .unwrap_or_else(|| DEFAULT_REGISTRY_BASE_URL.to_string());
        validate_registry_url(&registry_base_url)?;

        let registry_delay = clamp_delay(
            "registry_delay_ms",
            self.registry_delay_ms.unwrap_or(DEFAULT_REGISTRY_DELAY_MS),
            MIN_REGISTRY_DELAY_MS,
        );
        let download_delay = clamp_delay(
            "download_delay_ms",
            self.download_delay_ms.unwrap_or(DEFAULT_DOWNLOAD_DELAY_MS),
            MIN_DOWNLOAD_DELAY_MS,
        );

        Ok(ResolvedConfig {
            installation_root,
            manifest_path,
            plugins_dir,
            backup_dir,
            staging_dir,
            framework_marker,
            log_dir,
            registry_base_url,
            registry_delay,
            download_delay,
            recheck_deprecated: self.recheck_deprecated.unwrap_or(false),
        })
    }
}

fn clamp_delay(key: &str, requested_ms: u64, floor_ms: u64) -> Duration {
    if requested_ms < floor_ms {
        warn!("{key}={requested_ms} is below the minimum of {floor_ms}ms; using {floor_ms}ms");
        return Duration::from_millis(floor_ms);
    }
    Duration::from_millis(requested_ms)
}

fn validate_registry_url(raw: &str) -> ModSyncResult<()> {
    let url = reqwest::Url::parse(raw)
        .map_err(|e| ModSyncError::InvalidConfig(format!("registry url {raw:?} is invalid: {e}")))?;
    match url.scheme() {
        "http" | "https" => Ok(()),
        other => Err(ModSyncError::InvalidConfig(format!(
            "registry url must be http(s), got scheme {other:?}"
        ))),
    }
}

pub fn default_settings_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(APP_DIR_NAME).join(SETTINGS_FILE))
}

fn default_base_dir() -> PathBuf {
    dirs::data_dir().unwrap_or_else(|| PathBuf::from("."))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rooted(root: &str) -> SyncSettings {
        SyncSettings {
            installation_root: Some(PathBuf::from(root)),
            ..Default::default()
        }
    }

    #[test]
    fn defaults_hang_off_the_installation_root() {
        let config = rooted("/srv/valheim").resolve().unwrap();
        assert_eq!(config.manifest_path, PathBuf::from("/srv/valheim/mods.json"));
        assert_eq!(config.plugins_dir, PathBuf::from("/srv/valheim/BepInEx/plugins"));
        assert_eq!(config.backup_dir, PathBuf::from("/srv/valheim/BepInEx/plugins_backup"));
        assert_eq!(config.staging_dir, PathBuf::from("/srv/valheim/BepInEx/.modsync-staging"));
        assert_eq!(
            config.framework_marker,
            PathBuf::from("/srv/valheim/BepInEx/core/BepInEx.dll")
        );
        assert_eq!(config.registry_base_url, DEFAULT_REGISTRY_BASE_URL);
        assert_eq!(config.registry_delay, Duration::from_millis(DEFAULT_REGISTRY_DELAY_MS));
        assert!(!config.recheck_deprecated);
    }

    #[test]
    fn delays_below_floor_are_raised() {
        let settings = SyncSettings {
            registry_delay_ms: Some(10),
            download_delay_ms: Some(0),
            ..rooted("/srv/valheim")
        };
        let config = settings.resolve().unwrap();
        assert_eq!(config.registry_delay, Duration::from_millis(MIN_REGISTRY_DELAY_MS));
        assert_eq!(config.download_delay, Duration::from_millis(MIN_DOWNLOAD_DELAY_MS));
    }

    #[test]
    fn delays_above_floor_are_kept() {
        let settings = SyncSettings {
            registry_delay_ms: Some(3_500),
            ..rooted("/srv/valheim")
        };
        assert_eq!(
            settings.resolve().unwrap().registry_delay,
            Duration::from_millis(3_500)
        );
    }

    #[test]
    fn overlay_prefers_overrides() {
        let file = SyncSettings {
            plugins_dir: Some("/from/file".into()),
            registry_delay_ms: Some(4_000),
            ..rooted("/srv/a")
        };
        let flags = SyncSettings {
            installation_root: Some("/srv/b".into()),
            ..Default::default()
        };
        let merged = file.overlay(flags);
        assert_eq!(merged.installation_root, Some(PathBuf::from("/srv/b")));
        assert_eq!(merged.plugins_dir, Some(PathBuf::from("/from/file")));
        assert_eq!(merged.registry_delay_ms, Some(4_000));
    }

    #[test]
    fn custom_plugins_dir_moves_backup_with_it() {
        let settings = SyncSettings {
            plugins_dir: Some("/data/mods".into()),
            ..rooted("/srv/valheim")
        };
        let config = settings.resolve().unwrap();
        assert_eq!(config.backup_dir, PathBuf::from("/data/mods_backup"));
    }

    #[test]
    fn backup_inside_plugins_is_rejected() {
        let settings = SyncSettings {
            backup_dir: Some("BepInEx/plugins/old".into()),
            ..rooted("/srv/valheim")
        };
        assert!(matches!(settings.resolve(), Err(ModSyncError::InvalidConfig(_))));
    }

    #[test]
    fn bad_registry_urls_are_rejected() {
        for url in ["not a url", "ftp://registry.test/api"] {
            let settings = SyncSettings {
                registry_base_url: Some(url.into()),
                ..rooted("/srv/valheim")
            };
            let err = settings.resolve().unwrap_err();
            assert!(err.is_fatal());
        }
    }

    #[test]
    fn settings_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(
            &path,
            r#"{ "installation_root": "/srv/valheim", "download_delay_ms": 9000 }"#,
        )
        .unwrap();
        let settings = SyncSettings::load(&path).unwrap();
        assert_eq!(settings.download_delay_ms, Some(9_000));
        assert_eq!(settings.plugins_dir, None);

        assert!(SyncSettings::load(&dir.path().join("missing.json")).is_err());
    }
}
