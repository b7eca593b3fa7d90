use crate::config::StorageConfig;
use crate::error::{PipelineError, PipelineResult};
use crate::ports::storage::ObjectStorePort;
use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_credential_types::Credentials;
use aws_sdk_s3::config::{Builder, Region};
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{Delete, ObjectIdentifier};
use aws_sdk_s3::Client;
use std::path::Path;
use tracing::debug;

/// DeleteObjects accepts at most this many keys per request.
const DELETE_BATCH: usize = 1000;

/// S3Adapter implements ObjectStorePort for AWS S3 and S3-compatible stores.
#[derive(Clone)]
pub struct S3Adapter {
    client: Client,
    bucket: String,
}

impl S3Adapter {
    pub fn new(client: Client, bucket: String) -> Self {
        Self { client, bucket }
    }

    /// Build a client with static credentials. A custom endpoint switches to
    /// path-style addressing.
    pub fn from_config(config: &StorageConfig) -> Self {
        let credentials = Credentials::new(
            &config.access_key,
            &config.secret_key,
            None,
            None,
            "static",
        );

        let mut builder = Builder::new()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new(config.region.clone()))
            .credentials_provider(credentials);
        if let Some(endpoint) = &config.endpoint {
            builder = builder.endpoint_url(endpoint).force_path_style(true);
        }

        Self::new(Client::from_conf(builder.build()), config.bucket.clone())
    }
}

fn s3_error<E>(op: &str, key: &str, err: E) -> PipelineError
where
    E: std::error::Error,
{
    PipelineError::storage(format!("{} {}: {}", op, key, DisplayErrorContext(err)))
}

#[async_trait]
impl ObjectStorePort for S3Adapter {
    async fn download(&self, key: &str, local_path: &Path) -> PipelineResult<()> {
        let resp = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| s3_error("get", key, e))?;

        let body = resp
            .body
            .collect()
            .await
            .map_err(|e| s3_error("read", key, e))?;
        tokio::fs::write(local_path, body.into_bytes()).await?;
        debug!(key, bucket = %self.bucket, "Object downloaded");
        Ok(())
    }

    async fn upload(
        &self,
        local_path: &Path,
        key: &str,
        content_type: Option<&'static str>,
    ) -> PipelineResult<()> {
        let body = ByteStream::from_path(local_path)
            .await
            .map_err(|e| s3_error("open", key, e))?;

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(body)
            .set_content_type(content_type.map(str::to_string))
            .send()
            .await
            .map_err(|e| s3_error("put", key, e))?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> PipelineResult<()> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| s3_error("delete", key, e))?;
        Ok(())
    }

    async fn list(&self, prefix: &str) -> PipelineResult<Vec<String>> {
        let mut keys = Vec::new();
        let mut continuation_token: Option<String> = None;

        loop {
            let mut request = self
                .client
                .list_objects_v2()
                .bucket(&self.bucket)
                .prefix(prefix);
            if let Some(token) = continuation_token {
                request = request.continuation_token(token);
            }

            let response = request
                .send()
                .await
                .map_err(|e| s3_error("list", prefix, e))?;
            keys.extend(response.contents().iter().filter_map(|obj| obj.key().map(str::to_string)));

            if response.is_truncated() == Some(true) {
                continuation_token = response.next_continuation_token;
            } else {
                break;
            }
        }

        Ok(keys)
    }

    async fn delete_many(&self, keys: &[String]) -> PipelineResult<()> {
        for batch in keys.chunks(DELETE_BATCH) {
            let objects = batch
                .iter()
                .map(|k| ObjectIdentifier::builder().key(k).build())
                .collect::<Result<Vec<_>, _>>()
                .map_err(|e| s3_error("delete", "batch", e))?;
            let delete = Delete::builder()
                .set_objects(Some(objects))
                .quiet(true)
                .build()
                .map_err(|e| s3_error("delete", "batch", e))?;

            self.client
                .delete_objects()
                .bucket(&self.bucket)
                .delete(delete)
                .send()
                .await
                .map_err(|e| s3_error("delete", "batch", e))?;
            debug!(count = batch.len(), bucket = %self.bucket, "Objects deleted");
        }
        Ok(())
    }
}
