use crate::error::PipelineResult;
use async_trait::async_trait;
use std::path::Path;

/// Key/value object storage holding source assets and published outputs.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ObjectStorePort: Send + Sync {
    /// Download an object to a local path
    async fn download(&self, key: &str, local_path: &Path) -> PipelineResult<()>;

    /// Upload a file from a local path, tagging it with `content_type` when known
    async fn upload(
        &self,
        local_path: &Path,
        key: &str,
        content_type: Option<&'static str>,
    ) -> PipelineResult<()>;

    async fn delete(&self, key: &str) -> PipelineResult<()>;

    /// List every key starting with `prefix`
    async fn list(&self, prefix: &str) -> PipelineResult<Vec<String>>;

    /// Delete a batch of keys in one call
    async fn delete_many(&self, keys: &[String]) -> PipelineResult<()>;
}
