//! Best-effort lifecycle notifications to the job registry. Nothing is
//! retried, and a failed notification never changes a job's outcome.

use crate::domain::jobs::JobCompletionReport;
use crate::error::PipelineError;
use crate::ports::registry::JobRegistryPort;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

pub struct WebhookReporter<R: ?Sized> {
    registry: Arc<R>,
}

impl<R: ?Sized> Clone for WebhookReporter<R> {
    fn clone(&self) -> Self {
        Self {
            registry: self.registry.clone(),
        }
    }
}

impl<R> WebhookReporter<R>
where
    R: JobRegistryPort + ?Sized + 'static,
{
    pub fn new(registry: Arc<R>) -> Self {
        Self { registry }
    }

    /// Announce the start without blocking the caller.
    pub fn started(&self, job_id: &str) -> JoinHandle<()> {
        let registry = self.registry.clone();
        let job_id = job_id.to_string();
        tokio::spawn(async move {
            match registry.mark_started(&job_id).await {
                Ok(()) => info!(job_id = %job_id, "Reported job start"),
                Err(e) => warn!(job_id = %job_id, error = %e, "Start webhook failed"),
            }
        })
    }

    pub async fn failed(&self, job_id: &str, error: &PipelineError) {
        match self.registry.mark_failed(job_id, &error.to_string()).await {
            Ok(()) => info!(job_id, "Reported job failure"),
            Err(e) => warn!(job_id, error = %e, "Failure webhook failed"),
        }
    }

    pub async fn completed(&self, report: &JobCompletionReport) {
        match self.registry.complete(report).await {
            Ok(()) => info!(job_id = %report.id, status = %report.status, "Reported job completion"),
            Err(e) => warn!(job_id = %report.id, error = %e, "Completion webhook failed"),
        }
    }
}
