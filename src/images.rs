use std::{io::ErrorKind, path::PathBuf};

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::{ActionError, QueryError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageKind {
    Recipe,
    Avatar,
}

impl ImageKind {
    fn directory(&self) -> &'static str {
        match self {
            ImageKind::Recipe => "recipes/images",
            ImageKind::Avatar => "users/avatars",
        }
    }
}

/// Opaque image storage: bytes in, reference out.
#[async_trait]
pub trait ImageStore: Send + Sync {
    async fn store(&self, bytes: &[u8], kind: ImageKind) -> Result<String, ActionError>;

    /// Removing a reference that no longer exists is not an error.
    async fn remove(&self, reference: &str) -> Result<(), ActionError>;
}

/// Hands `result` back unchanged, first removing `stored` when `result` is
/// an error so no file is left without a row pointing at it.
pub async fn discard_on_error<T>(
    images: &dyn ImageStore,
    stored: Option<&str>,
    result: Result<T, ActionError>,
) -> Result<T, ActionError> {
    if let (Err(_), Some(reference)) = (&result, stored) {
        if let Err(e) = images.remove(reference).await {
            log::warn!("Failed to remove orphaned image {reference}: {e}");
        }
    }
    result
}

fn storage_error(info: &str) -> ActionError {
    ActionError::Query(QueryError::new(info.to_string()))
}

/// Writes images under a media root with random file names and hands back
/// the path relative to that root.
#[derive(Debug, Clone)]
pub struct DiskImageStore {
    root: PathBuf,
}

impl DiskImageStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl ImageStore for DiskImageStore {
    async fn store(&self, bytes: &[u8], kind: ImageKind) -> Result<String, ActionError> {
        if bytes.is_empty() {
            return Err(ActionError::validation("image", "The submitted file is empty"));
        }

        let reference = format!("{}/{}", kind.directory(), Uuid::new_v4().simple());
        let path = self.root.join(&reference);

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                log::error!("Failed to create {}: {e}", parent.display());
                storage_error("Failed to store image")
            })?;
        }
        tokio::fs::write(&path, bytes).await.map_err(|e| {
            log::error!("Failed to store image at {}: {e}", path.display());
            storage_error("Failed to store image")
        })?;

        log::debug!("Stored {} byte image as {reference}", bytes.len());
        Ok(reference)
    }

    async fn remove(&self, reference: &str) -> Result<(), ActionError> {
        match tokio::fs::remove_file(self.root.join(reference)).await {
            Ok(()) => {
                log::debug!("Removed image {reference}");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => {
                log::error!("Failed to remove image {reference}: {e}");
                Err(storage_error("Failed to remove image"))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    fn scratch_root() -> PathBuf {
        std::env::temp_dir().join(format!("foodgram-sdk-{}", Uuid::new_v4()))
    }

    #[derive(Default)]
    struct RecordingStore {
        removed: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl ImageStore for RecordingStore {
        async fn store(&self, _: &[u8], _: ImageKind) -> Result<String, ActionError> {
            Ok(String::from("recipes/images/recorded"))
        }

        async fn remove(&self, reference: &str) -> Result<(), ActionError> {
            self.removed.lock().expect("lock").push(reference.to_string());
            Ok(())
        }
    }

    #[tokio::test]
    async fn stores_under_kind_directory() {
        let root = scratch_root();
        let store = DiskImageStore::new(&root);

        let reference = store
            .store(b"png bytes", ImageKind::Recipe)
            .await
            .expect("stored");

        assert!(reference.starts_with("recipes/images/"));
        assert_eq!(std::fs::read(root.join(&reference)).expect("readable"), b"png bytes");

        store.remove(&reference).await.expect("removed");
        assert!(!root.join(&reference).exists());
        store.remove(&reference).await.expect("second removal is a no-op");

        let _ = std::fs::remove_dir_all(root);
    }

    #[tokio::test]
    async fn rejects_empty_payload() {
        let store = DiskImageStore::new(scratch_root());
        assert!(matches!(
            store.store(&[], ImageKind::Avatar).await,
            Err(ActionError::Validation { field: "image", .. })
        ));
    }

    #[tokio::test]
    async fn failed_write_discards_stored_image() {
        let store = RecordingStore::default();

        let result: Result<(), ActionError> = Err(ActionError::Forbidden);
        assert!(discard_on_error(&store, Some("recipes/images/a"), result).await.is_err());

        let result: Result<i32, ActionError> = Ok(7);
        assert_eq!(discard_on_error(&store, Some("recipes/images/b"), result).await.ok(), Some(7));

        let result: Result<(), ActionError> = Err(ActionError::Forbidden);
        assert!(discard_on_error(&store, None, result).await.is_err());

        assert_eq!(*store.removed.lock().expect("lock"), vec![String::from("recipes/images/a")]);
    }
}
