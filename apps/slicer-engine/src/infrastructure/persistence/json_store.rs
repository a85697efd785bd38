//! File-backed JSON repositories.
//!
//! One file per aggregate under a base directory, written atomically
//! (temp file then rename) so a crash mid-checkpoint leaves the previous
//! snapshot intact. This is the store that makes executions and conditional
//! orders survive a restart.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tracing::warn;

use crate::application::ports::{
    ConditionalOrderRepository, ExecutionRepository, StorageError,
};
use crate::domain::conditional::ConditionalOrder;
use crate::domain::execution::Execution;
use crate::domain::shared::{ExecutionId, OrderId};

const EXECUTIONS_DIR: &str = "executions";
const CONDITIONAL_DIR: &str = "conditional";

/// JSON-file implementation of both repository ports.
#[derive(Debug, Clone)]
pub struct JsonStore {
    base_dir: PathBuf,
}

impl JsonStore {
    /// Open a store rooted at `base_dir`, creating the layout if needed.
    pub async fn open(base_dir: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let base_dir = base_dir.into();
        fs::create_dir_all(base_dir.join(EXECUTIONS_DIR)).await?;
        fs::create_dir_all(base_dir.join(CONDITIONAL_DIR)).await?;
        Ok(Self { base_dir })
    }

    /// Root directory of the store.
    #[must_use]
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    fn execution_path(&self, id: &ExecutionId) -> PathBuf {
        self.base_dir
            .join(EXECUTIONS_DIR)
            .join(format!("{}.json", id.as_str()))
    }

    fn conditional_path(&self, order_id: &OrderId) -> PathBuf {
        self.base_dir
            .join(CONDITIONAL_DIR)
            .join(format!("{}.json", order_id.as_str()))
    }

    async fn write_atomic(path: &Path, payload: &[u8]) -> Result<(), StorageError> {
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, payload).await?;
        fs::rename(&tmp, path).await?;
        Ok(())
    }

    async fn read_json<T: serde::de::DeserializeOwned>(
        path: &Path,
    ) -> Result<Option<T>, StorageError> {
        match fs::read(path).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Load every JSON file in a subdirectory, skipping files that no longer
    /// parse (a warning is logged; recovery must not die on one bad file).
    async fn read_dir<T: serde::de::DeserializeOwned>(
        &self,
        subdir: &str,
    ) -> Result<Vec<T>, StorageError> {
        let mut entries = fs::read_dir(self.base_dir.join(subdir)).await?;
        let mut items = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().is_none_or(|ext| ext != "json") {
                continue;
            }
            let bytes = fs::read(&path).await?;
            match serde_json::from_slice(&bytes) {
                Ok(item) => items.push(item),
                Err(e) => warn!(path = %path.display(), error = %e, "skipping unreadable snapshot"),
            }
        }
        Ok(items)
    }

    async fn remove(path: &Path) -> Result<bool, StorageError> {
        match fs::remove_file(path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl ExecutionRepository for JsonStore {
    async fn save(&self, execution: &Execution) -> Result<(), StorageError> {
        let payload = serde_json::to_vec_pretty(execution)?;
        Self::write_atomic(&self.execution_path(&execution.id), &payload).await
    }

    async fn get(&self, id: &ExecutionId) -> Result<Option<Execution>, StorageError> {
        Self::read_json(&self.execution_path(id)).await
    }

    async fn list(&self) -> Result<Vec<Execution>, StorageError> {
        self.read_dir(EXECUTIONS_DIR).await
    }

    async fn delete(&self, id: &ExecutionId) -> Result<bool, StorageError> {
        Self::remove(&self.execution_path(id)).await
    }
}

#[async_trait]
impl ConditionalOrderRepository for JsonStore {
    async fn save(&self, order: &ConditionalOrder) -> Result<(), StorageError> {
        let payload = serde_json::to_vec_pretty(order)?;
        Self::write_atomic(&self.conditional_path(order.order_id()), &payload).await
    }

    async fn get(&self, order_id: &OrderId) -> Result<Option<ConditionalOrder>, StorageError> {
        Self::read_json(&self.conditional_path(order_id)).await
    }

    async fn list(&self) -> Result<Vec<ConditionalOrder>, StorageError> {
        self.read_dir(CONDITIONAL_DIR).await
    }

    async fn delete(&self, order_id: &OrderId) -> Result<bool, StorageError> {
        Self::remove(&self.conditional_path(order_id)).await
    }
}
