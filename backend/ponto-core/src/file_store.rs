// src/file_store.rs
use async_trait::async_trait;
use serde_json::Value;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{error, info};

use crate::error::{io_context, StoreError};
use crate::store::{
    merge_fields, DocumentPath, DocumentStore, Fields, Snapshot, SubscriberRegistry, Subscription,
};

/// Document store persisting each document as a pretty-printed JSON file at
/// `{root}/{document path}.json`.
pub struct JsonFileStore {
    root: PathBuf,
    write_lock: Mutex<()>,
    registry: Arc<SubscriberRegistry>,
}

impl JsonFileStore {
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        if !root.exists() {
            fs::create_dir_all(&root)
                .map_err(|e| io_context(e, format!("Failed to create data directory: {:?}", root)))?;
        }
        let metadata = fs::metadata(&root)
            .map_err(|e| io_context(e, format!("Failed to inspect data directory: {:?}", root)))?;
        if metadata.permissions().readonly() {
            return Err(io_context(
                std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only"),
                format!("Data directory is not writable: {:?}", root),
            ));
        }
        info!("JSON file store opened at {}", root.display());
        Ok(Self {
            root,
            write_lock: Mutex::new(()),
            registry: Arc::new(SubscriberRegistry::default()),
        })
    }

    pub fn registry(&self) -> &Arc<SubscriberRegistry> {
        &self.registry
    }

    fn file_path(&self, path: &DocumentPath) -> PathBuf {
        self.root.join(format!("{}.json", path.as_str()))
    }

    fn read_document(&self, path: &DocumentPath) -> Result<Option<Fields>, StoreError> {
        let file = self.file_path(path);
        if !file.exists() {
            return Ok(None);
        }
        let json_string = fs::read_to_string(&file)
            .map_err(|e| io_context(e, format!("Failed to read document file: {:?}", file)))?;
        match serde_json::from_str::<Value>(&json_string)? {
            Value::Object(fields) => Ok(Some(fields)),
            _ => Err(StoreError::MalformedDocument {
                path: path.to_string(),
            }),
        }
    }

    // Write to a sibling temp file first so a crash never leaves half a document.
    fn write_document(&self, path: &DocumentPath, fields: &Fields) -> Result<(), StoreError> {
        let file = self.file_path(path);
        if let Some(parent) = file.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                io_context(e, format!("Failed to create directory for document: {:?}", parent))
            })?;
        }
        let json_string = serde_json::to_string_pretty(fields)?;
        let tmp_file = file.with_extension("json.tmp");
        fs::write(&tmp_file, json_string.as_bytes())
            .map_err(|e| io_context(e, format!("Failed to write document file: {:?}", tmp_file)))?;
        fs::rename(&tmp_file, &file)
            .map_err(|e| io_context(e, format!("Failed to replace document file: {:?}", file)))?;
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for JsonFileStore {
    async fn get(&self, path: &DocumentPath) -> Result<Snapshot, StoreError> {
        Ok(Snapshot {
            path: path.clone(),
            data: self.read_document(path)?,
            origin: None,
        })
    }

    async fn upsert_merge(&self, path: &DocumentPath, fields: Fields, origin: &str) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;
        let mut document = self.read_document(path)?.unwrap_or_default();
        merge_fields(&mut document, fields);
        self.write_document(path, &document)?;
        info!("Document {} saved by {}", path, origin);

        self.registry.publish(&Snapshot {
            path: path.clone(),
            data: Some(document),
            origin: Some(origin.to_string()),
        });
        Ok(())
    }

    async fn subscribe(&self, path: &DocumentPath) -> Subscription {
        let _guard = self.write_lock.lock().await;
        let initial = self.read_document(path).map(|data| Snapshot {
            path: path.clone(),
            data,
            origin: None,
        });
        if let Err(e) = &initial {
            error!("Initial read of {} failed: {}", path, e);
        }
        self.registry.register(path, initial)
    }

    fn describe(&self) -> String {
        format!("JSON file store at {}", self.root.display())
    }
}
