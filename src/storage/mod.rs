//! Object storage for profile photos.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::database::StoreError;

pub const USER_DIR: &str = "users";
pub const PET_DIR: &str = "pets";
const PROFILES_DIR: &str = "profiles";

pub fn profile_dir(kind: &str, id: Uuid) -> String {
    format!("{}/{}/{}", kind, id, PROFILES_DIR)
}

/// Each upload gets a fresh name so cached links never point at stale bytes.
pub fn new_profile_path(kind: &str, id: Uuid) -> String {
    let nanos = Utc::now().timestamp_nanos_opt().unwrap_or_default();
    format!("{}/{:x}", profile_dir(kind, id), nanos)
}

#[derive(Debug, Clone)]
pub struct MediaObject {
    pub path: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

#[async_trait]
pub trait MediaStore: Send + Sync {
    /// Store the object and return its public link.
    async fn upload(&self, object: MediaObject) -> Result<String, StoreError>;

    /// Remove everything under `dir`. Missing directories are not an error.
    async fn delete_dir(&self, dir: &str) -> Result<(), StoreError>;
}

/// Media kept on the local filesystem under a root directory.
pub struct LocalMediaStore {
    root: PathBuf,
    public_base_url: String,
}

impl LocalMediaStore {
    pub fn new(root: impl Into<PathBuf>, public_base_url: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            public_base_url: public_base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn resolve(&self, relative: &str) -> Result<PathBuf, StoreError> {
        let relative = Path::new(relative);
        if relative
            .components()
            .any(|c| !matches!(c, std::path::Component::Normal(_)))
        {
            return Err(StoreError::InvalidFormat(format!(
                "media path {:?}",
                relative
            )));
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl MediaStore for LocalMediaStore {
    async fn upload(&self, object: MediaObject) -> Result<String, StoreError> {
        let target = self.resolve(&object.path)?;
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&target, &object.bytes).await?;
        tracing::debug!(path = %object.path, content_type = %object.content_type, "media uploaded");
        Ok(format!("{}/{}", self.public_base_url, object.path))
    }

    async fn delete_dir(&self, dir: &str) -> Result<(), StoreError> {
        let target = self.resolve(dir)?;
        match tokio::fs::remove_dir_all(&target).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// In-process media store.
#[derive(Default)]
pub struct MemoryMediaStore {
    objects: RwLock<HashMap<String, MediaObject>>,
}

impl MemoryMediaStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn paths(&self) -> Vec<String> {
        let mut paths: Vec<String> = self.objects.read().await.keys().cloned().collect();
        paths.sort();
        paths
    }
}

#[async_trait]
impl MediaStore for MemoryMediaStore {
    async fn upload(&self, object: MediaObject) -> Result<String, StoreError> {
        let link = format!("memory://{}", object.path);
        self.objects.write().await.insert(object.path.clone(), object);
        Ok(link)
    }

    async fn delete_dir(&self, dir: &str) -> Result<(), StoreError> {
        let prefix = format!("{}/", dir.trim_end_matches('/'));
        self.objects
            .write()
            .await
            .retain(|path, _| !path.starts_with(&prefix));
        Ok(())
    }
}
