// # File Storage
//
// File-based implementation of DocumentStorage.
//
// ## Purpose
//
// Keeps the record document on disk at a fixed path (UTF-8 JSON) so the
// collection survives restarts.
//
// ## Crash Safety
//
// - Atomic writes: the new document goes to `<path>.tmp`, then is renamed
//   over `<path>`
// - A missing file reads as "nothing persisted yet"
// - A document that does not fully decode is copied to `<path>.corrupt`
//   before anything overwrites it

use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::Error;
use crate::traits::DocumentStorage;

/// File-based document storage
///
/// # Example
///
/// ```rust,no_run
/// use enumbers_core::storage::FileStorage;
/// use enumbers_core::traits::DocumentStorage;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let storage = FileStorage::new("/var/lib/enumbers/enumbers.json").await?;
///
///     storage.write(b"[]").await?;
///     assert_eq!(storage.read().await?, Some(b"[]".to_vec()));
///
///     Ok(())
/// }
/// ```
#[derive(Debug)]
pub struct FileStorage {
    path: PathBuf,
}

impl FileStorage {
    /// Open file storage at `path`
    ///
    /// Creates parent directories if needed. The file itself is only created
    /// by the first write.
    pub async fn new<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            fs::create_dir_all(parent).await.map_err(|e| {
                Error::config(format!(
                    "Failed to create data directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        Ok(Self { path })
    }

    /// Path of the persisted document
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Get path to temporary file for atomic writes
    fn temp_path(&self) -> PathBuf {
        let mut temp = self.path.clone();
        temp.set_extension("tmp");
        temp
    }

    /// Where a damaged document is set aside (`<path>.corrupt`)
    pub fn corrupt_path(&self) -> PathBuf {
        let mut corrupt = self.path.clone().into_os_string();
        corrupt.push(".corrupt");
        PathBuf::from(corrupt)
    }
}

#[async_trait]
impl DocumentStorage for FileStorage {
    async fn read(&self) -> Result<Option<Vec<u8>>, Error> {
        match fs::read(&self.path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::debug!("Data file does not exist: {}", self.path.display());
                Ok(None)
            }
            Err(e) => Err(Error::persistence(format!(
                "Failed to read data file {}: {}",
                self.path.display(),
                e
            ))),
        }
    }

    async fn write(&self, bytes: &[u8]) -> Result<(), Error> {
        let temp_path = self.temp_path();
        {
            let mut file = fs::File::create(&temp_path).await.map_err(|e| {
                Error::persistence(format!(
                    "Failed to create temp file {}: {}",
                    temp_path.display(),
                    e
                ))
            })?;

            file.write_all(bytes).await.map_err(|e| {
                Error::persistence(format!(
                    "Failed to write to temp file {}: {}",
                    temp_path.display(),
                    e
                ))
            })?;

            file.flush().await.map_err(|e| {
                Error::persistence(format!(
                    "Failed to flush temp file {}: {}",
                    temp_path.display(),
                    e
                ))
            })?;
        }

        fs::rename(&temp_path, &self.path).await.map_err(|e| {
            Error::persistence(format!(
                "Failed to rename {} to {}: {}",
                temp_path.display(),
                self.path.display(),
                e
            ))
        })?;

        tracing::trace!("Data written to file: {}", self.path.display());
        Ok(())
    }

    async fn preserve_damaged(&self, bytes: &[u8]) -> Result<(), Error> {
        let corrupt_path = self.corrupt_path();
        fs::write(&corrupt_path, bytes).await.map_err(|e| {
            Error::persistence(format!(
                "Failed to set damaged document aside at {}: {}",
                corrupt_path.display(),
                e
            ))
        })?;
        tracing::warn!(
            "Damaged data file copied to {}",
            corrupt_path.display()
        );
        Ok(())
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}
