//! Modelview Store - HTTP object-store client
//!
//! Talks to a Firebase-Storage style REST endpoint:
//! - `GET  {base}/v0/b/{bucket}/o?prefix=..&delimiter=/&pageToken=..` lists objects
//! - `GET  {base}/v0/b/{bucket}/o/{name}` returns metadata with download tokens
//! - `GET  {base}/v0/b/{bucket}/o/{name}?alt=media&token=..` downloads
//! - `POST {base}/v0/b/{bucket}/o?name={name}` uploads
//!
//! Object names are percent-encoded as a single path segment.

use modelview_core::config::StoreConfig;
use modelview_core::storage::{ObjectRef, ObjectStore, StorageError};
use serde::Deserialize;
use tracing::{debug, info, warn};

/// Upper bound on listing pages, in case a server keeps returning tokens
const MAX_PAGES: usize = 100;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListResponse {
    #[serde(default)]
    items: Vec<ListItem>,
    #[serde(default)]
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ListItem {
    name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ObjectMetadata {
    #[serde(default)]
    download_tokens: Option<String>,
}

impl ObjectMetadata {
    fn first_token(&self) -> Option<&str> {
        self.download_tokens
            .as_deref()
            .and_then(|t| t.split(',').map(str::trim).find(|t| !t.is_empty()))
    }
}

/// Object store reached over HTTP
#[derive(Debug, Clone)]
pub struct HttpObjectStore {
    client: reqwest::Client,
    base_url: String,
    bucket: String,
}

impl HttpObjectStore {
    pub fn new(base_url: &str, bucket: &str) -> Result<Self, StorageError> {
        let builder = reqwest::Client::builder();
        #[cfg(not(target_arch = "wasm32"))]
        let builder = builder.timeout(std::time::Duration::from_secs(30));
        let client = builder
            .build()
            .map_err(|e| StorageError::Request(format!("Failed to create HTTP client: {e}")))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            bucket: bucket.to_string(),
        })
    }

    pub fn from_config(config: &StoreConfig) -> Result<Self, StorageError> {
        Self::new(&config.base_url, &config.bucket)
    }

    fn objects_url(&self) -> String {
        format!(
            "{}/v0/b/{}/o",
            self.base_url,
            urlencoding::encode(&self.bucket)
        )
    }

    pub fn list_url(&self, prefix: &str, page_token: Option<&str>) -> String {
        let mut url = format!(
            "{}?prefix={}&delimiter=%2F",
            self.objects_url(),
            urlencoding::encode(prefix)
        );
        if let Some(token) = page_token {
            url.push_str("&pageToken=");
            url.push_str(&urlencoding::encode(token));
        }
        url
    }

    pub fn metadata_url(&self, name: &str) -> String {
        format!("{}/{}", self.objects_url(), urlencoding::encode(name))
    }

    pub fn media_url(&self, name: &str, token: Option<&str>) -> String {
        let mut url = format!("{}?alt=media", self.metadata_url(name));
        if let Some(token) = token {
            url.push_str("&token=");
            url.push_str(&urlencoding::encode(token));
        }
        url
    }

    pub fn upload_url(&self, name: &str) -> String {
        format!("{}?name={}", self.objects_url(), urlencoding::encode(name))
    }

    async fn get(&self, url: &str) -> Result<reqwest::Response, StorageError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(request_error)?;
        check_status(response, url)
    }
}

fn request_error(e: reqwest::Error) -> StorageError {
    StorageError::Request(e.to_string())
}

fn check_status(response: reqwest::Response, url: &str) -> Result<reqwest::Response, StorageError> {
    let status = response.status();
    if status == reqwest::StatusCode::NOT_FOUND {
        return Err(StorageError::NotFound(url.to_string()));
    }
    if !status.is_success() {
        warn!(url, status = %status, "Store request failed");
        return Err(StorageError::Status {
            status: status.as_u16(),
            url: url.to_string(),
        });
    }
    Ok(response)
}

impl ObjectStore for HttpObjectStore {
    async fn list(&self, prefix: &str) -> Result<Vec<ObjectRef>, StorageError> {
        let mut objects = Vec::new();
        let mut page_token: Option<String> = None;
        for page in 0..MAX_PAGES {
            let url = self.list_url(prefix, page_token.as_deref());
            debug!(url = %url, page, "Listing objects");
            let body: ListResponse = self
                .get(&url)
                .await?
                .json()
                .await
                .map_err(|e| StorageError::InvalidResponse(e.to_string()))?;
            objects.extend(body.items.into_iter().map(|item| ObjectRef::new(item.name)));
            match body.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => return Ok(objects),
            }
        }
        warn!(prefix, pages = MAX_PAGES, "Listing truncated");
        Ok(objects)
    }

    async fn download_url(&self, object: &ObjectRef) -> Result<String, StorageError> {
        let url = self.metadata_url(&object.name);
        let metadata: ObjectMetadata = self
            .get(&url)
            .await?
            .json()
            .await
            .map_err(|e| StorageError::InvalidResponse(e.to_string()))?;
        Ok(self.media_url(&object.name, metadata.first_token()))
    }

    async fn upload(
        &self,
        name: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<(), StorageError> {
        let url = self.upload_url(name);
        let size = bytes.len();
        let response = self
            .client
            .post(&url)
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(bytes)
            .send()
            .await
            .map_err(request_error)?;
        check_status(response, &url)?;
        info!(object = name, size, "Uploaded object");
        Ok(())
    }

    async fn fetch(&self, url: &str) -> Result<Vec<u8>, StorageError> {
        let bytes = self
            .get(url)
            .await?
            .bytes()
            .await
            .map_err(request_error)?;
        debug!(url, size = bytes.len(), "Fetched object");
        Ok(bytes.to_vec())
    }
}
