//! Object-store bridge: the contract a remote store implements plus the
//! listing and upload flows built on top of it

use futures_util::future::join_all;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::sync::Mutex;
use thiserror::Error;
use tracing::{info, warn};

use crate::loader::{load_gltf, LoadedModel, ModelError};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum StorageError {
    #[error("Object not found: {0}")]
    NotFound(String),
    #[error("Request failed: {0}")]
    Request(String),
    #[error("Unexpected status {status} from {url}")]
    Status { status: u16, url: String },
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

/// An object stored under the configured prefix
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectRef {
    /// Full object path inside the bucket
    pub name: String,
}

impl ObjectRef {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    /// Last path segment, shown as the dropdown label
    pub fn file_name(&self) -> &str {
        self.name.rsplit('/').next().unwrap_or(&self.name)
    }
}

/// A listing entry whose URL has been resolved
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteFileEntry {
    pub name: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ListingFailure {
    pub name: String,
    pub error: StorageError,
}

/// Outcome of a listing: resolved entries in listing order plus any entry
/// whose URL could not be resolved
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Listing {
    pub entries: Vec<RemoteFileEntry>,
    pub failures: Vec<ListingFailure>,
}

/// Operations the viewer needs from a remote object store
#[allow(async_fn_in_trait)]
pub trait ObjectStore {
    /// Every object under `prefix`
    async fn list(&self, prefix: &str) -> Result<Vec<ObjectRef>, StorageError>;

    /// A URL the object can be fetched from
    async fn download_url(&self, object: &ObjectRef) -> Result<String, StorageError>;

    async fn upload(&self, name: &str, bytes: Vec<u8>, content_type: &str)
        -> Result<(), StorageError>;

    async fn fetch(&self, url: &str) -> Result<Vec<u8>, StorageError>;
}

/// List `prefix` and resolve every entry's URL concurrently. A failing
/// entry is reported in [`Listing::failures`] and does not affect the rest.
pub async fn list_remote_files<S: ObjectStore>(
    store: &S,
    prefix: &str,
) -> Result<Listing, StorageError> {
    let objects = store.list(prefix).await?;
    let resolved = join_all(objects.iter().map(|o| store.download_url(o))).await;

    let mut listing = Listing::default();
    for (object, result) in objects.iter().zip(resolved) {
        match result {
            Ok(url) => listing.entries.push(RemoteFileEntry {
                name: object.file_name().to_string(),
                url,
            }),
            Err(error) => {
                warn!(object = %object.name, %error, "Failed to resolve download URL");
                listing.failures.push(ListingFailure {
                    name: object.file_name().to_string(),
                    error,
                });
            }
        }
    }
    info!(
        prefix,
        entries = listing.entries.len(),
        failures = listing.failures.len(),
        "Listed remote models"
    );
    Ok(listing)
}

/// Object path for an upload under `prefix`
pub fn object_path(prefix: &str, name: &str) -> String {
    let prefix = prefix.trim_matches('/');
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{prefix}/{name}")
    }
}

/// Upload an exported document; returns the notice shown to the user
pub async fn upload_export<S: ObjectStore>(
    store: &S,
    prefix: &str,
    name: &str,
    document: String,
) -> Result<String, StorageError> {
    let path = object_path(prefix, name);
    store
        .upload(&path, document.into_bytes(), crate::export::GLTF_CONTENT_TYPE)
        .await?;
    info!(object = %path, "Model uploaded");
    Ok(format!("Model \"{name}\" uploaded successfully"))
}

/// Fetch a model by URL and parse it
pub async fn fetch_model<S: ObjectStore>(store: &S, url: &str) -> Result<LoadedModel, ModelError> {
    let bytes = store
        .fetch(url)
        .await
        .map_err(|e| ModelError::Fetch(e.to_string()))?;
    load_gltf(&bytes)
}

/// In-process store keyed by object path. URLs take the form
/// `memory://<path>`.
#[derive(Debug, Default)]
pub struct MemoryStore {
    objects: Mutex<BTreeMap<String, Vec<u8>>>,
    broken: HashSet<String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_object(self, name: &str, bytes: impl Into<Vec<u8>>) -> Self {
        if let Ok(mut objects) = self.objects.lock() {
            objects.insert(name.to_string(), bytes.into());
        }
        self
    }

    /// Make URL resolution fail for `name`
    pub fn with_broken(mut self, name: &str) -> Self {
        self.broken.insert(name.to_string());
        self
    }

    pub fn get(&self, name: &str) -> Option<Vec<u8>> {
        self.objects.lock().ok()?.get(name).cloned()
    }

    fn poisoned() -> StorageError {
        StorageError::Request("store lock poisoned".to_string())
    }
}

impl ObjectStore for MemoryStore {
    async fn list(&self, prefix: &str) -> Result<Vec<ObjectRef>, StorageError> {
        let objects = self.objects.lock().map_err(|_| Self::poisoned())?;
        Ok(objects
            .keys()
            .filter(|k| k.starts_with(prefix))
            .map(ObjectRef::new)
            .collect())
    }

    async fn download_url(&self, object: &ObjectRef) -> Result<String, StorageError> {
        if self.broken.contains(&object.name) {
            return Err(StorageError::NotFound(object.name.clone()));
        }
        Ok(format!("memory://{}", object.name))
    }

    async fn upload(
        &self,
        name: &str,
        bytes: Vec<u8>,
        _content_type: &str,
    ) -> Result<(), StorageError> {
        let mut objects = self.objects.lock().map_err(|_| Self::poisoned())?;
        objects.insert(name.to_string(), bytes);
        Ok(())
    }

    async fn fetch(&self, url: &str) -> Result<Vec<u8>, StorageError> {
        let name = url
            .strip_prefix("memory://")
            .ok_or_else(|| StorageError::NotFound(url.to_string()))?;
        self.get(name)
            .ok_or_else(|| StorageError::NotFound(url.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_listing_isolates_failures() {
        let store = MemoryStore::new()
            .with_object("models/a.glb", vec![1])
            .with_object("models/b.glb", vec![2])
            .with_object("models/c.glb", vec![3])
            .with_object("other/d.glb", vec![4])
            .with_broken("models/b.glb");

        let listing = list_remote_files(&store, "models/").await.unwrap();
        let names: Vec<_> = listing.entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["a.glb", "c.glb"]);
        assert_eq!(listing.entries[0].url, "memory://models/a.glb");
        assert_eq!(listing.failures.len(), 1);
        assert_eq!(listing.failures[0].name, "b.glb");
    }

    #[tokio::test]
    async fn test_upload_export_reports_success() {
        let store = MemoryStore::new();
        let notice = upload_export(&store, "models", "car.gltf", "{}".to_string())
            .await
            .unwrap();
        assert_eq!(notice, "Model \"car.gltf\" uploaded successfully");
        assert_eq!(store.get("models/car.gltf").unwrap(), b"{}".to_vec());
    }

    #[tokio::test]
    async fn test_fetch_model_failure_is_a_load_error() {
        let store = MemoryStore::new();
        let result = fetch_model(&store, "memory://missing.glb").await;
        assert!(matches!(result, Err(ModelError::Fetch(_))));
    }

    #[test]
    fn test_object_path_and_file_name() {
        assert_eq!(object_path("/models/", "a.gltf"), "models/a.gltf");
        assert_eq!(object_path("", "a.gltf"), "a.gltf");
        assert_eq!(ObjectRef::new("models/sub/a.glb").file_name(), "a.glb");
        assert_eq!(ObjectRef::new("a.glb").file_name(), "a.glb");
    }
}
