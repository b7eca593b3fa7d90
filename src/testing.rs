//! In-memory fakes for scenario tests that need real files on disk.

use crate::domain::hls::ResolutionProfile;
use crate::domain::jobs::{Job, JobCompletionReport, Language};
use crate::error::{PipelineError, PipelineResult};
use crate::ports::media::MediaToolsPort;
use crate::ports::registry::JobRegistryPort;
use crate::ports::speech::SpeechPort;
use crate::ports::storage::ObjectStorePort;
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

struct StoredObject {
    bytes: Vec<u8>,
    content_type: Option<&'static str>,
}

/// Object store keeping everything in a map. Counts every put it receives.
#[derive(Default)]
pub struct MemoryStore {
    objects: Mutex<HashMap<String, StoredObject>>,
    puts: AtomicUsize,
    failing_key: Option<String>,
}

impl MemoryStore {
    pub fn with_object(self, key: &str, bytes: &[u8]) -> Self {
        self.objects.lock().unwrap().insert(
            key.to_string(),
            StoredObject {
                bytes: bytes.to_vec(),
                content_type: None,
            },
        );
        self
    }

    /// Every put of `key` fails.
    pub fn failing_on(mut self, key: &str) -> Self {
        self.failing_key = Some(key.to_string());
        self
    }

    pub fn put_count(&self) -> usize {
        self.puts.load(Ordering::SeqCst)
    }

    pub fn object(&self, key: &str) -> Option<Vec<u8>> {
        self.objects.lock().unwrap().get(key).map(|o| o.bytes.clone())
    }

    pub fn content_type(&self, key: &str) -> Option<&'static str> {
        self.objects
            .lock()
            .unwrap()
            .get(key)
            .and_then(|o| o.content_type)
    }

    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.objects.lock().unwrap().keys().cloned().collect();
        keys.sort();
        keys
    }
}

#[async_trait]
impl ObjectStorePort for MemoryStore {
    async fn download(&self, key: &str, local_path: &Path) -> PipelineResult<()> {
        let bytes = self
            .object(key)
            .ok_or_else(|| PipelineError::storage(format!("no such key {}", key)))?;
        tokio::fs::write(local_path, bytes).await?;
        Ok(())
    }

    async fn upload(
        &self,
        local_path: &Path,
        key: &str,
        content_type: Option<&'static str>,
    ) -> PipelineResult<()> {
        self.puts.fetch_add(1, Ordering::SeqCst);
        if self.failing_key.as_deref() == Some(key) {
            return Err(PipelineError::storage(format!("put {} denied", key)));
        }
        let bytes = tokio::fs::read(local_path).await?;
        self.objects.lock().unwrap().insert(
            key.to_string(),
            StoredObject {
                bytes,
                content_type,
            },
        );
        Ok(())
    }

    async fn delete(&self, key: &str) -> PipelineResult<()> {
        self.objects.lock().unwrap().remove(key);
        Ok(())
    }

    async fn list(&self, prefix: &str) -> PipelineResult<Vec<String>> {
        Ok(self
            .keys()
            .into_iter()
            .filter(|k| k.starts_with(prefix))
            .collect())
    }

    async fn delete_many(&self, keys: &[String]) -> PipelineResult<()> {
        let mut objects = self.objects.lock().unwrap();
        for key in keys {
            objects.remove(key);
        }
        Ok(())
    }
}

/// Media tools that write plausible manifests and segments instead of encoding.
pub struct FakeMediaTools {
    duration: f64,
    probe_delay: Option<Duration>,
    failing_profile: Option<&'static str>,
}

impl Default for FakeMediaTools {
    fn default() -> Self {
        Self {
            duration: 10.0,
            probe_delay: None,
            failing_profile: None,
        }
    }
}

impl FakeMediaTools {
    pub fn with_duration(mut self, duration: f64) -> Self {
        self.duration = duration;
        self
    }

    pub fn with_probe_delay(mut self, delay: Duration) -> Self {
        self.probe_delay = Some(delay);
        self
    }

    /// Encoding the profile with this label fails.
    pub fn failing_profile(mut self, label: &'static str) -> Self {
        self.failing_profile = Some(label);
        self
    }
}

#[async_trait]
impl MediaToolsPort for FakeMediaTools {
    async fn probe_duration(&self, _media: &Path) -> PipelineResult<f64> {
        if let Some(delay) = self.probe_delay {
            tokio::time::sleep(delay).await;
        }
        Ok(self.duration)
    }

    async fn encode_rendition(
        &self,
        _source: &Path,
        profile: &ResolutionProfile,
        manifest: &Path,
        segment_pattern: &Path,
    ) -> PipelineResult<()> {
        if self.failing_profile == Some(profile.label) {
            return Err(PipelineError::tool(
                "ffmpeg",
                format!("{} rendition failed", profile.label),
            ));
        }

        let segment = segment_pattern
            .file_name()
            .map(|n| n.to_string_lossy().replace("%03d", "000"))
            .unwrap_or_default();
        tokio::fs::write(segment_pattern.with_file_name(&segment), b"ts").await?;
        tokio::fs::write(
            manifest,
            format!(
                "#EXTM3U\n#EXT-X-TARGETDURATION:10\n#EXTINF:10.0,\n{}\n#EXT-X-ENDLIST\n",
                segment
            ),
        )
        .await?;
        Ok(())
    }

    async fn extract_audio(&self, _source: &Path, output: &Path) -> PipelineResult<()> {
        tokio::fs::write(output, b"audio").await?;
        Ok(())
    }

    async fn convert_image(&self, source: &Path, output: &Path) -> PipelineResult<()> {
        tokio::fs::copy(source, output).await?;
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeSpeech;

#[async_trait]
impl SpeechPort for FakeSpeech {
    async fn transcribe(&self, _audio: &Path) -> PipelineResult<String> {
        Ok("WEBVTT\n\n00:00:00.000 --> 00:00:02.000\nHello\n".to_string())
    }

    async fn translate(&self, _vtt: &str, language: Language) -> PipelineResult<String> {
        Ok(format!(
            "WEBVTT\n\n00:00:00.000 --> 00:00:02.000\n[{}] Hello\n",
            language
        ))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum WebhookEvent {
    Started(String),
    Failed(String, String),
    Completed(JobCompletionReport),
}

/// Registry serving a fixed set of jobs and recording every webhook.
#[derive(Default)]
pub struct RecordingRegistry {
    jobs: HashMap<String, Job>,
    events: Mutex<Vec<WebhookEvent>>,
}

impl RecordingRegistry {
    pub fn with_job(mut self, job: Job) -> Self {
        self.jobs.insert(job.id.clone(), job);
        self
    }

    pub fn events(&self) -> Vec<WebhookEvent> {
        self.events.lock().unwrap().clone()
    }

    fn record(&self, event: WebhookEvent) {
        self.events.lock().unwrap().push(event);
    }
}

#[async_trait]
impl JobRegistryPort for RecordingRegistry {
    async fn get_job(&self, job_id: &str) -> PipelineResult<Job> {
        self.jobs
            .get(job_id)
            .cloned()
            .ok_or_else(|| PipelineError::registry(format!("failed to get job: 404 ({})", job_id)))
    }

    async fn mark_started(&self, job_id: &str) -> PipelineResult<()> {
        self.record(WebhookEvent::Started(job_id.to_string()));
        Ok(())
    }

    async fn mark_failed(&self, job_id: &str, error: &str) -> PipelineResult<()> {
        self.record(WebhookEvent::Failed(job_id.to_string(), error.to_string()));
        Ok(())
    }

    async fn complete(&self, report: &JobCompletionReport) -> PipelineResult<()> {
        self.record(WebhookEvent::Completed(report.clone()));
        Ok(())
    }
}
