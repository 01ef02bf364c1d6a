use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::{
    io::ErrorKind,
    marker::PhantomData,
    path::{Path, PathBuf},
};
use thiserror::Error;
use tokio::sync::Mutex;
use uuid::Uuid;

/// All errors generated during aggregate persistence.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, Error)]
pub enum StoreError {
    #[error("store io: {0}")]
    Io(String),

    #[error("store codec: {0}")]
    Codec(String),
}

impl From<std::io::Error> for StoreError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(value: serde_json::Error) -> Self {
        Self::Codec(value.to_string())
    }
}

/// Durable JSON-file store owning exactly one aggregate file.
///
/// First load with the file absent writes the provided defaults and returns
/// them. Every save goes to a uniquely named temp sibling first and is then
/// renamed over the target, so a reader never observes a torn file.
/// Concurrent saves to the same store serialize; last writer wins.
#[derive(Debug)]
pub struct JsonStore<Data> {
    path: PathBuf,
    write_lock: Mutex<()>,
    phantom: PhantomData<fn() -> Data>,
}

impl<Data> JsonStore<Data>
where
    Data: Serialize + DeserializeOwned,
{
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
            phantom: PhantomData,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the aggregate, persisting and returning `defaults` on first run.
    pub async fn load_or_init(&self, defaults: Data) -> Result<Data, StoreError> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(error) if error.kind() == ErrorKind::NotFound => {
                self.save(&defaults).await?;
                Ok(defaults)
            }
            Err(error) => Err(error.into()),
        }
    }

    /// Persist the aggregate atomically (temp sibling + rename).
    pub async fn save(&self, data: &Data) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;

        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let json = serde_json::to_string_pretty(data)?;

        let file_name = self
            .path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| String::from("store"));
        let tmp = self
            .path
            .with_file_name(format!("{}.{}.tmp", file_name, Uuid::new_v4()));

        tokio::fs::write(&tmp, json.as_bytes()).await?;
        tokio::fs::rename(&tmp, &self.path).await?;

        Ok(())
    }
}
