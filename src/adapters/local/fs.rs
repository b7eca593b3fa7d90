use crate::error::{PipelineError, PipelineResult};
use crate::ports::storage::ObjectStorePort;
use async_trait::async_trait;
use std::path::{Component, Path, PathBuf};
use tokio::fs;
use walkdir::WalkDir;

/// Object store backed by a local directory; keys are paths below `root`.
#[derive(Clone, Debug)]
pub struct FsAdapter {
    root: PathBuf,
}

impl FsAdapter {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn object_path(&self, key: &str) -> PipelineResult<PathBuf> {
        let relative = Path::new(key);
        if relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_)))
        {
            return Err(PipelineError::storage(format!("invalid object key {:?}", key)));
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl ObjectStorePort for FsAdapter {
    async fn download(&self, key: &str, local_path: &Path) -> PipelineResult<()> {
        let object = self.object_path(key)?;
        if let Some(parent) = local_path.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::copy(&object, local_path)
            .await
            .map_err(|e| PipelineError::storage(format!("get {}: {}", key, e)))?;
        Ok(())
    }

    async fn upload(
        &self,
        local_path: &Path,
        key: &str,
        _content_type: Option<&'static str>,
    ) -> PipelineResult<()> {
        let object = self.object_path(key)?;
        if let Some(parent) = object.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::copy(local_path, &object)
            .await
            .map_err(|e| PipelineError::storage(format!("put {}: {}", key, e)))?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> PipelineResult<()> {
        let object = self.object_path(key)?;
        match fs::remove_file(&object).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(PipelineError::storage(format!("delete {}: {}", key, e))),
        }
    }

    async fn list(&self, prefix: &str) -> PipelineResult<Vec<String>> {
        let root = self.root.clone();
        let prefix = prefix.to_string();
        tokio::task::spawn_blocking(move || {
            let mut keys: Vec<String> = WalkDir::new(&root)
                .into_iter()
                .filter_map(|entry| entry.ok())
                .filter(|entry| entry.file_type().is_file())
                .filter_map(|entry| {
                    entry
                        .path()
                        .strip_prefix(&root)
                        .ok()
                        .map(|rel| rel.to_string_lossy().replace('\\', "/"))
                })
                .filter(|key| key.starts_with(&prefix))
                .collect();
            keys.sort();
            keys
        })
        .await
        .map_err(|e| PipelineError::internal(e.to_string()))
    }

    async fn delete_many(&self, keys: &[String]) -> PipelineResult<()> {
        for key in keys {
            self.delete(key).await?;
        }
        Ok(())
    }
}
