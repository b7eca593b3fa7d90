use crate::domain::jobs::{Job, JobCompletionReport};
use crate::error::PipelineResult;
use async_trait::async_trait;

/// External job registry: source of jobs and sink of lifecycle webhooks.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait JobRegistryPort: Send + Sync {
    async fn get_job(&self, job_id: &str) -> PipelineResult<Job>;

    async fn mark_started(&self, job_id: &str) -> PipelineResult<()>;

    async fn mark_failed(&self, job_id: &str, error: &str) -> PipelineResult<()>;

    async fn complete(&self, report: &JobCompletionReport) -> PipelineResult<()>;
}
