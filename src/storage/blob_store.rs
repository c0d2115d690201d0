//! Flat-directory blob store.
//!
//! Blobs live at `<root>/<id>.<extension>`. Writes go to a uniquely named
//! temporary file in the same directory, are fsynced, and are then published
//! with `hard_link`, which fails if the target exists. A concurrent reader
//! therefore sees either no blob or the complete blob, and an existing blob is
//! never overwritten.

use std::path::{Path, PathBuf};

use bytes::Bytes;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::instrument;
use uuid::Uuid;

use super::StorageError;

/// Local filesystem blob store keyed by opaque identifier.
#[derive(Debug, Clone)]
pub struct BlobStore {
    root: PathBuf,
    extension: &'static str,
}

impl BlobStore {
    /// Open a store rooted at `root`, creating the directory if needed.
    pub async fn new(root: impl AsRef<Path>, extension: &'static str) -> Result<Self, StorageError> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root).await?;
        Ok(Self { root, extension })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Full path for an identifier.
    ///
    /// Identifiers are flat: anything other than ASCII alphanumerics, `-` and
    /// `_` cannot name a blob and is reported as absent.
    pub fn path(&self, id: &str) -> Result<PathBuf, StorageError> {
        if !is_valid_id(id) {
            return Err(StorageError::NotFound(id.to_string()));
        }
        Ok(self.root.join(format!("{}.{}", id, self.extension)))
    }

    /// Store `data` under `id`. Fails with `Conflict` if `id` already exists.
    #[instrument(skip(self, data), fields(root = %self.root.display(), size = data.len()))]
    pub async fn put(&self, id: &str, data: &[u8]) -> Result<(), StorageError> {
        let path = self.path(id)?;
        let temp_path = self.root.join(format!(".tmp.{}.{}", id, Uuid::new_v4()));

        let written = async {
            let mut file = fs::File::create(&temp_path).await?;
            file.write_all(data).await?;
            // Data must be on disk before the name becomes visible
            file.sync_all().await?;
            Ok::<_, std::io::Error>(())
        }
        .await;

        let published = match written {
            Ok(()) => fs::hard_link(&temp_path, &path).await,
            Err(e) => Err(e),
        };

        // The temporary name is always discarded; the link (if any) keeps the data
        let _ = fs::remove_file(&temp_path).await;

        match published {
            Ok(()) => {
                tracing::debug!(id, "Blob stored");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                Err(StorageError::Conflict(id.to_string()))
            }
            Err(e) => Err(StorageError::Io(e)),
        }
    }

    /// Open a blob for reading.
    pub async fn open(&self, id: &str) -> Result<fs::File, StorageError> {
        let path = self.path(id)?;
        fs::File::open(&path)
            .await
            .map_err(|e| StorageError::from_io(id, e))
    }

    /// Size of a blob in bytes.
    pub async fn size(&self, id: &str) -> Result<u64, StorageError> {
        let path = self.path(id)?;
        let metadata = fs::metadata(&path)
            .await
            .map_err(|e| StorageError::from_io(id, e))?;
        Ok(metadata.len())
    }

    /// Read a whole blob into memory. Only meant for small blobs (rendered pages).
    pub async fn read(&self, id: &str) -> Result<Bytes, StorageError> {
        let path = self.path(id)?;
        let data = fs::read(&path)
            .await
            .map_err(|e| StorageError::from_io(id, e))?;
        Ok(Bytes::from(data))
    }

    /// Check whether a blob exists.
    pub async fn exists(&self, id: &str) -> Result<bool, StorageError> {
        match self.path(id) {
            Ok(path) => Ok(fs::try_exists(&path).await?),
            Err(StorageError::NotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }
}

fn is_valid_id(id: &str) -> bool {
    !id.is_empty()
        && id.len() <= 128
        && id
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
}
