//! Object store operations the pipeline relies on, built on [`ObjectStorePort`].

use super::fanout::fan_out;
use crate::error::{PipelineError, PipelineResult};
use crate::ports::storage::ObjectStorePort;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::NamedTempFile;
use tracing::{debug, info};
use walkdir::WalkDir;

pub const HLS_CONTENT_TYPE: &str = "application/x-mpegURL";
pub const TS_CONTENT_TYPE: &str = "video/mp2t";

/// Content type inferred from the key's extension; `None` leaves it untyped.
pub fn content_type_for(key: &str) -> Option<&'static str> {
    match Path::new(key).extension().and_then(|ext| ext.to_str()) {
        Some("m3u8") => Some(HLS_CONTENT_TYPE),
        Some("ts") => Some(TS_CONTENT_TYPE),
        _ => None,
    }
}

pub struct ObjectStoreGateway<S: ?Sized> {
    store: Arc<S>,
    public_base: String,
}

impl<S: ?Sized> Clone for ObjectStoreGateway<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            public_base: self.public_base.clone(),
        }
    }
}

impl<S> ObjectStoreGateway<S>
where
    S: ObjectStorePort + ?Sized + 'static,
{
    pub fn new(store: Arc<S>, public_base: impl Into<String>) -> Self {
        Self {
            store,
            public_base: public_base.into().trim_end_matches('/').to_string(),
        }
    }

    /// Public URL of an uploaded key.
    pub fn absolute_url(&self, key: &str) -> String {
        format!("{}/{}", self.public_base, key.trim_start_matches('/'))
    }

    /// Accept either a raw key or a public URL and return the bare key.
    pub fn normalize_key<'a>(&self, key: &'a str) -> &'a str {
        key.strip_prefix(self.public_base.as_str())
            .unwrap_or(key)
            .trim_start_matches('/')
    }

    /// Download into a fresh temporary file. The file is removed when the
    /// returned handle is dropped.
    pub async fn get_object(&self, key: &str) -> PipelineResult<NamedTempFile> {
        let key = self.normalize_key(key);
        let leaf = Path::new(key)
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        let file = tempfile::Builder::new()
            .suffix(&format!("_{}", leaf))
            .tempfile()?;

        self.store.download(key, file.path()).await?;
        debug!(key, path = %file.path().display(), "Downloaded object");
        Ok(file)
    }

    /// Upload one file under the key produced by `key_for`; returns that key.
    pub async fn put_object<F>(&self, local_path: &Path, key_for: F) -> PipelineResult<String>
    where
        F: FnOnce(&Path) -> String,
    {
        let key = key_for(local_path);
        self.store
            .upload(local_path, &key, content_type_for(&key))
            .await?;
        info!(key = %key, "Uploaded file");
        Ok(key)
    }

    /// Upload every regular file below `local_dir` concurrently, one task per
    /// file, under `<leaf dir name>/<relative path>`. Fails with the first
    /// observed error once all uploads have finished.
    pub async fn put_directory(&self, local_dir: &Path) -> PipelineResult<Vec<String>> {
        let leaf = local_dir
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .ok_or_else(|| {
                PipelineError::storage(format!("{} has no directory name", local_dir.display()))
            })?;

        let root = local_dir.to_path_buf();
        let files = tokio::task::spawn_blocking(move || list_files(&root))
            .await
            .map_err(|e| PipelineError::internal(e.to_string()))??;

        let uploads = files.into_iter().map(|path| {
            let relative = path
                .strip_prefix(local_dir)
                .map(|rel| rel.to_string_lossy().replace('\\', "/"))
                .unwrap_or_default();
            (path, format!("{}/{}", leaf, relative))
        });

        let outcome = fan_out(uploads, |(path, key)| {
            let store = self.store.clone();
            async move {
                store.upload(&path, &key, content_type_for(&key)).await?;
                debug!(key = %key, "Uploaded file");
                Ok(key)
            }
        })
        .await;

        let keys = outcome.into_result()?;
        info!(dir = %local_dir.display(), count = keys.len(), "Uploaded directory");
        Ok(keys)
    }

    pub async fn delete_object(&self, key: &str) -> PipelineResult<()> {
        self.store.delete(self.normalize_key(key)).await
    }

    /// List everything under `prefix` and delete it in one batch.
    pub async fn delete_directory(&self, prefix: &str) -> PipelineResult<usize> {
        let keys = self.store.list(self.normalize_key(prefix)).await?;
        if keys.is_empty() {
            return Ok(0);
        }
        self.store.delete_many(&keys).await?;
        Ok(keys.len())
    }
}

fn list_files(root: &Path) -> PipelineResult<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(root) {
        let entry = entry.map_err(|e| PipelineError::storage(e.to_string()))?;
        if entry.file_type().is_file() {
            files.push(entry.into_path());
        }
    }
    files.sort();
    Ok(files)
}
