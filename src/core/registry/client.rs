use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::header::{HeaderValue, ACCEPT};
use reqwest::Client;
use tracing::{debug, instrument};

use super::package::RemotePackageInfo;
use crate::core::error::{ModSyncError, ModSyncResult};
use crate::core::manifest::ModId;

/// Upper bound on the buffer reserved from a `Content-Length` header.
const MAX_PREALLOCATED_BYTES: u64 = 64 * 1024 * 1024;

/// Source of package metadata and archives.
#[async_trait]
pub trait RegistryClient: Send + Sync {
    /// Latest published version, its archive URL, and deprecation status.
    async fn fetch_package_info(&self, id: &ModId) -> ModSyncResult<RemotePackageInfo>;

    /// Raw bytes of a package archive.
    async fn download(&self, url: &str) -> ModSyncResult<Vec<u8>>;
}

/// HTTP client for the package registry.
///
/// Calls are never issued concurrently by the reconciler; after every
/// successful metadata call the client waits `request_delay`, and after every
/// successful download it waits `download_delay`.
pub struct HttpRegistryClient {
    client: Client,
    base_url: String,
    request_delay: Duration,
    download_delay: Duration,
}

impl HttpRegistryClient {
    pub fn new(client: Client, base_url: &str, request_delay: Duration, download_delay: Duration) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            request_delay,
            download_delay,
        }
    }

    /// `{base}/{namespace}/{name}/`
    pub fn package_url(&self, id: &ModId) -> String {
        format!("{}/{}/{}/", self.base_url, id.namespace, id.name)
    }
}

#[async_trait]
impl RegistryClient for HttpRegistryClient {
    #[instrument(skip(self, id), fields(namespace = %id.namespace, name = %id.name))]
    async fn fetch_package_info(&self, id: &ModId) -> ModSyncResult<RemotePackageInfo> {
        let url = self.package_url(id);
        let response = self
            .client
            .get(&url)
            .header(ACCEPT, HeaderValue::from_static("application/json"))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ModSyncError::RegistryStatus {
                url,
                status: status.as_u16(),
            });
        }

        let body = response.bytes().await?;
        let info = RemotePackageInfo::from_response(&url, &body)?;
        debug!(
            latest = %info.latest_version,
            deprecated = info.is_deprecated,
            "Registry metadata fetched"
        );

        tokio::time::sleep(self.request_delay).await;
        Ok(info)
    }

    #[instrument(skip(self))]
    async fn download(&self, url: &str) -> ModSyncResult<Vec<u8>> {
        let response = self.client.get(url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ModSyncError::RegistryStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let hint = response
            .content_length()
            .unwrap_or(0)
            .min(MAX_PREALLOCATED_BYTES);
        let mut bytes = Vec::with_capacity(hint as usize);
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            bytes.extend_from_slice(&chunk?);
        }
        debug!("Downloaded {} bytes from {}", bytes.len(), url);

        tokio::time::sleep(self.download_delay).await;
        Ok(bytes)
    }
}
