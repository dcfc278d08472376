use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::collections::HashSet;

/// Registry identity of a mod: `(namespace, name)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ModId {
    pub namespace: String,
    pub name: String,
}

impl ModId {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    /// Folder name for a given version: `{namespace}-{name}-{version}`.
    pub fn folder_name(&self, version: &str) -> String {
        format!("{}-{}-{}", self.namespace, self.name, version)
    }

    /// Prefix shared by every installed version of this mod.
    pub fn folder_prefix(&self) -> String {
        format!("{}-{}-", self.namespace, self.name)
    }

    /// True when `folder` is some version of this mod.
    pub fn owns_folder(&self, folder: &str) -> bool {
        folder
            .strip_prefix(&self.folder_prefix())
            .is_some_and(|version| !version.is_empty())
    }
}

impl std::fmt::Display for ModId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}", self.namespace, self.name)
    }
}

/// Reads an ISO-8601 timestamp. Accepts RFC 3339, a datetime without offset
/// (taken as UTC) and a bare date (midnight UTC). Always written as RFC 3339.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_timestamp(&raw)
        .ok_or_else(|| serde::de::Error::custom(format!("invalid ISO-8601 timestamp `{raw}`")))
}

fn deserialize_optional_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<String>::deserialize(deserializer)? {
        Some(raw) => parse_timestamp(&raw)
            .map(Some)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid ISO-8601 timestamp `{raw}`"))),
        None => Ok(None),
    }
}

/// One install event in an entry's history.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct VersionRecord {
    pub version: String,
    #[serde(deserialize_with = "deserialize_timestamp")]
    pub installed_date: DateTime<Utc>,
}

/// A desired mod and its tracked state, persisted inside `mods.json`.
///
/// Unknown keys are kept in `extra` so hand-added annotations survive a
/// rewrite.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ModEntry {
    pub namespace: String,
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub deprecated: bool,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "deserialize_optional_timestamp"
    )]
    pub deprecated_date: Option<DateTime<Utc>>,
    /// Most recent first; a version appears at most once.
    #[serde(default)]
    pub version_history: Vec<VersionRecord>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ModEntry {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
            version: version.into(),
            deprecated: false,
            deprecated_date: None,
            version_history: Vec::new(),
            extra: Map::new(),
        }
    }

    pub fn id(&self) -> ModId {
        ModId::new(&self.namespace, &self.name)
    }

    pub fn matches(&self, namespace: &str, name: &str) -> bool {
        self.namespace == namespace && self.name == name
    }

    /// Folder this entry expects in the plugins directory.
    pub fn folder_name(&self) -> String {
        self.id().folder_name(&self.version)
    }

    pub fn has_version_in_history(&self, version: &str) -> bool {
        self.version_history.iter().any(|r| r.version == version)
    }

    /// Sets `version`; records it at the head of the history only when the
    /// history does not already contain it. Returns whether anything changed.
    pub fn apply_version_update(&mut self, version: &str, at: DateTime<Utc>) -> bool {
        let mut changed = false;
        if self.version != version {
            self.version = version.to_string();
            changed = true;
        }
        if !self.has_version_in_history(version) {
            self.version_history.insert(
                0,
                VersionRecord {
                    version: version.to_string(),
                    installed_date: at,
                },
            );
            changed = true;
        }
        changed
    }

    /// Marks the entry deprecated. The first deprecation date is kept.
    pub fn apply_deprecation(&mut self, at: DateTime<Utc>) -> bool {
        if self.deprecated && self.deprecated_date.is_some() {
            return false;
        }
        self.deprecated = true;
        if self.deprecated_date.is_none() {
            self.deprecated_date = Some(at);
        }
        true
    }
}

/// Top-level manifest document: `{ "mods": [...] }`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ModManifest {
    #[serde(default)]
    pub mods: Vec<ModEntry>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ModManifest {
    pub fn find_entry(&self, namespace: &str, name: &str) -> Option<&ModEntry> {
        self.mods.iter().find(|m| m.matches(namespace, name))
    }

    pub fn find_entry_mut(&mut self, namespace: &str, name: &str) -> Option<&mut ModEntry> {
        self.mods.iter_mut().find(|m| m.matches(namespace, name))
    }

    /// Folder names the manifest claims: one per non-deprecated entry.
    pub fn managed_folder_names(&self) -> HashSet<String> {
        self.mods
            .iter()
            .filter(|m| !m.deprecated)
            .map(ModEntry::folder_name)
            .collect()
    }

    /// First `(namespace, name)` listed twice, if any.
    pub fn first_duplicate(&self) -> Option<ModId> {
        let mut seen = HashSet::new();
        self.mods
            .iter()
            .map(ModEntry::id)
            .find(|id| !seen.insert(id.clone()))
    }
}
