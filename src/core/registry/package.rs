// ─── Registry Package Metadata ───
// Wire shape of `GET {base}/{namespace}/{name}/` and its reduction to the
// three values the reconciler needs.

use serde::Deserialize;

use crate::core::error::{ModSyncError, ModSyncResult};

/// What the registry currently publishes for one package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemotePackageInfo {
    pub latest_version: String,
    pub download_url: String,
    pub is_deprecated: bool,
}

#[derive(Debug, Deserialize)]
struct PackageResponse {
    #[serde(default)]
    latest: Option<LatestVersion>,
    #[serde(default)]
    is_deprecated: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct LatestVersion {
    #[serde(default)]
    version_number: Option<String>,
    #[serde(default)]
    download_url: Option<String>,
}

impl RemotePackageInfo {
    /// Parse a registry response body. `url` is only used for error context.
    ///
    /// `latest.version_number` and `latest.download_url` are required; a
    /// missing or null `is_deprecated` reads as `false`.
    pub fn from_response(url: &str, body: &[u8]) -> ModSyncResult<Self> {
        let response: PackageResponse =
            serde_json::from_slice(body).map_err(|source| ModSyncError::InvalidResponse {
                url: url.to_string(),
                source,
            })?;

        let missing = |field: &'static str| ModSyncError::MissingField {
            url: url.to_string(),
            field,
        };

        let latest = response.latest.ok_or_else(|| missing("latest"))?;
        let latest_version = latest
            .version_number
            .filter(|v| !v.is_empty())
            .ok_or_else(|| missing("latest.version_number"))?;
        if !is_single_path_component(&latest_version) {
            return Err(ModSyncError::InvalidVersion {
                url: url.to_string(),
                version: latest_version,
            });
        }
        let download_url = latest
            .download_url
            .filter(|u| !u.is_empty())
            .ok_or_else(|| missing("latest.download_url"))?;

        Ok(Self {
            latest_version,
            download_url,
            is_deprecated: response.is_deprecated.unwrap_or(false),
        })
    }
}

/// The version becomes the last segment of a folder name under the plugins
/// root, so it must not carry separators or dot segments.
fn is_single_path_component(version: &str) -> bool {
    !matches!(version, "." | "..")
        && !version.contains(|c: char| c == '/' || c == '\\' || c == '\0' || c == ':')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::ErrorKind;

    const URL: &str = "https://registry.test/Advize/PlantEverything/";

    #[test]
    fn parses_full_response() {
        let body = br#"{
            "namespace": "Advize",
            "name": "PlantEverything",
            "is_deprecated": false,
            "latest": {
                "version_number": "1.21.0",
                "download_url": "https://registry.test/download/Advize/PlantEverything/1.21.0/",
                "downloads": 120394
            }
        }"#;
        let info = RemotePackageInfo::from_response(URL, body).unwrap();
        assert_eq!(info.latest_version, "1.21.0");
        assert!(info.download_url.ends_with("/1.21.0/"));
        assert!(!info.is_deprecated);
    }

    #[test]
    fn absent_or_null_deprecation_flag_means_active() {
        let body = br#"{ "latest": { "version_number": "1.0.0", "download_url": "u" }, "is_deprecated": null }"#;
        assert!(!RemotePackageInfo::from_response(URL, body).unwrap().is_deprecated);

        let body = br#"{ "latest": { "version_number": "1.0.0", "download_url": "u" } }"#;
        assert!(!RemotePackageInfo::from_response(URL, body).unwrap().is_deprecated);
    }

    #[test]
    fn deprecated_flag_is_read() {
        let body = br#"{ "latest": { "version_number": "1.0.0", "download_url": "u" }, "is_deprecated": true }"#;
        assert!(RemotePackageInfo::from_response(URL, body).unwrap().is_deprecated);
    }

    #[test]
    fn null_version_is_a_parse_error() {
        let body = br#"{ "latest": { "version_number": null, "download_url": "u" } }"#;
        let err = RemotePackageInfo::from_response(URL, body).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Parse);
        assert!(matches!(
            err,
            ModSyncError::MissingField { field: "latest.version_number", .. }
        ));
    }

    #[test]
    fn missing_download_url_is_a_parse_error() {
        let body = br#"{ "latest": { "version_number": "1.0.0" } }"#;
        let err = RemotePackageInfo::from_response(URL, body).unwrap_err();
        assert!(matches!(
            err,
            ModSyncError::MissingField { field: "latest.download_url", .. }
        ));
    }

    #[test]
    fn missing_latest_block_is_a_parse_error() {
        let err = RemotePackageInfo::from_response(URL, br#"{ "is_deprecated": true }"#).unwrap_err();
        assert!(matches!(err, ModSyncError::MissingField { field: "latest", .. }));
    }

    #[test]
    fn non_json_body_is_a_parse_error() {
        let err = RemotePackageInfo::from_response(URL, b"<html>busy</html>").unwrap_err();
        assert!(matches!(err, ModSyncError::InvalidResponse { .. }));
        assert_eq!(err.kind(), ErrorKind::Parse);
    }

    #[test]
    fn version_that_is_not_a_plain_name_is_rejected() {
        for version in ["../../etc", "1.0/evil", "..", "1.0\\x", "C:1.0"] {
            let body = serde_json::json!({
                "latest": { "version_number": version, "download_url": "u" }
            })
            .to_string();
            let err = RemotePackageInfo::from_response(URL, body.as_bytes()).unwrap_err();
            assert!(
                matches!(err, ModSyncError::InvalidVersion { .. }),
                "{version} accepted"
            );
            assert_eq!(err.kind(), ErrorKind::Parse);
        }
    }
}
