//! Job intake. Every submitted job gets its own task, but all of them share
//! one lock, so at most one job pipeline runs at any instant system-wide.

use crate::domain::jobs::Job;
use crate::error::{PipelineError, PipelineResult};
use async_trait::async_trait;
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

/// Runs one job to completion and reports its outcome.
#[async_trait]
pub trait JobExecutor: Send + Sync + 'static {
    async fn execute(&self, job: Job);

    /// Called when `execute` panicked, with the panic message.
    async fn recover(&self, job: &Job, reason: String);
}

#[derive(Clone)]
pub struct JobDispatcher {
    sender: mpsc::UnboundedSender<Job>,
}

impl JobDispatcher {
    /// Spawn the consumer loop. It exits once every dispatcher handle is dropped.
    pub fn start<E>(executor: Arc<E>) -> (Self, JoinHandle<()>)
    where
        E: JobExecutor + ?Sized,
    {
        let (sender, mut receiver) = mpsc::unbounded_channel::<Job>();
        let pipeline_lock = Arc::new(Mutex::new(()));

        let consumer = tokio::spawn(async move {
            while let Some(job) = receiver.recv().await {
                let executor = executor.clone();
                let pipeline_lock = pipeline_lock.clone();
                tokio::spawn(async move {
                    let _guard = pipeline_lock.lock().await;
                    debug!(job_id = %job.id, "Pipeline lock acquired");

                    let outcome = AssertUnwindSafe(executor.execute(job.clone()))
                        .catch_unwind()
                        .await;
                    if let Err(panic) = outcome {
                        let reason = panic_message(panic.as_ref());
                        error!(job_id = %job.id, reason = %reason, "Job execution panicked");
                        executor.recover(&job, reason).await;
                    }

                    debug!(job_id = %job.id, "Pipeline lock released");
                });
            }
            info!("Job intake closed");
        });

        (Self { sender }, consumer)
    }

    pub fn submit(&self, job: Job) -> PipelineResult<()> {
        let job_id = job.id.clone();
        self.sender
            .send(job)
            .map_err(|_| PipelineError::internal("job dispatcher is not running"))?;
        info!(job_id = %job_id, "Job queued");
        Ok(())
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(msg) = panic.downcast_ref::<&str>() {
        msg.to_string()
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        msg.clone()
    } else {
        String::from("job execution panicked")
    }
}
