//! The job pipeline: download the source, package and subtitle it in
//! parallel, publish the outputs, then report to the registry.

use super::dispatcher::JobExecutor;
use super::gateway::ObjectStoreGateway;
use super::packager::HlsPackager;
use super::reporter::WebhookReporter;
use super::subtitles::{upload_tracks, SubtitlePipeline};
use crate::config::AppConfig;
use crate::domain::jobs::{Job, JobCompletionReport, JobStatus, Language, SubtitleTrack};
use crate::error::{PipelineError, PipelineResult};
use crate::ports::media::MediaToolsPort;
use crate::ports::registry::JobRegistryPort;
use crate::ports::speech::SpeechPort;
use crate::ports::storage::ObjectStorePort;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use uuid::Uuid;

pub const PROBE_TIMEOUT: Duration = Duration::from_secs(120);

const VIDEO_EXTENSIONS: [&str; 4] = ["mp4", "mov", "mkv", "webm"];

pub fn is_video(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| VIDEO_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
}

#[derive(Clone, Debug)]
pub struct PipelineSettings {
    pub public_base: String,
    pub target_language: Language,
    pub delete_source: bool,
    pub probe_timeout: Duration,
    /// Parent of the per-job scratch directories.
    pub scratch_root: PathBuf,
}

impl PipelineSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            public_base: config.storage.public_asset_endpoint.clone(),
            target_language: config.subtitle_language,
            delete_source: config.delete_source_after_job,
            probe_timeout: PROBE_TIMEOUT,
            scratch_root: std::env::temp_dir(),
        }
    }
}

pub struct JobPipeline<S: ?Sized, M: ?Sized, T: ?Sized, R: ?Sized> {
    gateway: ObjectStoreGateway<S>,
    packager: HlsPackager<M, S>,
    subtitles: SubtitlePipeline<M, T>,
    reporter: WebhookReporter<R>,
    tools: Arc<M>,
    settings: PipelineSettings,
}

/// The pipeline as wired by the server, over trait objects.
pub type DynJobPipeline =
    JobPipeline<dyn ObjectStorePort, dyn MediaToolsPort, dyn SpeechPort, dyn JobRegistryPort>;

impl<S, M, T, R> JobPipeline<S, M, T, R>
where
    S: ObjectStorePort + ?Sized + 'static,
    M: MediaToolsPort + ?Sized + 'static,
    T: SpeechPort + ?Sized + 'static,
    R: JobRegistryPort + ?Sized + 'static,
{
    pub fn new(
        store: Arc<S>,
        tools: Arc<M>,
        speech: Arc<T>,
        registry: Arc<R>,
        settings: PipelineSettings,
    ) -> Self {
        let gateway = ObjectStoreGateway::new(store, settings.public_base.clone());
        Self {
            packager: HlsPackager::new(tools.clone(), gateway.clone()),
            subtitles: SubtitlePipeline::new(tools.clone(), speech),
            reporter: WebhookReporter::new(registry),
            gateway,
            tools,
            settings,
        }
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    /// Run a job fetched from the registry. Only `pending` jobs are processed.
    pub async fn run(&self, job: &Job) -> PipelineResult<JobCompletionReport> {
        if job.status != JobStatus::Pending {
            return Err(PipelineError::validation(format!(
                "job {} is {}, expected pending",
                job.id, job.status
            )));
        }

        let source = self.gateway.get_object(&job.video_url).await?;
        let outcome = self.process(job, source.path()).await;

        if self.settings.delete_source {
            if let Err(e) = self.gateway.delete_object(&job.video_url).await {
                warn!(job_id = %job.id, key = %job.video_url, error = %e, "Could not delete source object");
            }
        }
        outcome
    }

    async fn process(&self, job: &Job, source: &Path) -> PipelineResult<JobCompletionReport> {
        let duration = self.probe(source).await?;
        let work = self.scratch_dir()?;

        let (master, tracks) = tokio::join!(
            self.packager.package(source, work.path()),
            self.subtitles
                .generate(source, work.path(), self.settings.target_language),
        );
        let master = master?;
        let tracks = upload_tracks(&self.gateway, tracks?).await?;

        info!(job_id = %job.id, master = %master, tracks = tracks.len(), "Job outputs published");
        Ok(JobCompletionReport {
            id: job.id.clone(),
            status: JobStatus::Done,
            video_url: master,
            subtitle_tracks: tracks,
            video_duration: duration,
        })
    }

    /// Synchronous HLS transcode of an uploaded video. Returns the master
    /// playlist URL and the probed duration.
    pub async fn transcode_video(&self, source: &Path) -> PipelineResult<(String, f64)> {
        if !is_video(source) {
            return Err(PipelineError::validation(format!(
                "{} is not a supported video file",
                source.display()
            )));
        }
        let duration = self.probe(source).await?;
        let work = self.scratch_dir()?;
        let master = self.packager.package(source, work.path()).await?;
        Ok((master, duration))
    }

    /// Transcribe and translate an uploaded video or audio file, then publish
    /// the tracks.
    pub async fn transcribe(&self, source: &Path) -> PipelineResult<Vec<SubtitleTrack>> {
        let work = self.scratch_dir()?;
        let tracks = self
            .subtitles
            .generate(source, work.path(), self.settings.target_language)
            .await?;
        upload_tracks(&self.gateway, tracks).await
    }

    /// Convert an uploaded image to webp next to it and return the new path.
    pub async fn convert_image(&self, source: &Path) -> PipelineResult<PathBuf> {
        let output = source.with_file_name(format!("{}.webp", Uuid::new_v4()));
        self.tools.convert_image(source, &output).await?;
        Ok(output)
    }

    async fn probe(&self, media: &Path) -> PipelineResult<f64> {
        let after = self.settings.probe_timeout;
        tokio::time::timeout(after, self.tools.probe_duration(media))
            .await
            .map_err(|_| PipelineError::Timeout {
                operation: "media probe",
                after,
            })?
    }

    fn scratch_dir(&self) -> PipelineResult<tempfile::TempDir> {
        Ok(tempfile::Builder::new()
            .prefix("vodpipe-")
            .tempdir_in(&self.settings.scratch_root)?)
    }
}

#[async_trait]
impl<S, M, T, R> JobExecutor for JobPipeline<S, M, T, R>
where
    S: ObjectStorePort + ?Sized + 'static,
    M: MediaToolsPort + ?Sized + 'static,
    T: SpeechPort + ?Sized + 'static,
    R: JobRegistryPort + ?Sized + 'static,
{
    async fn execute(&self, job: Job) {
        info!(job_id = %job.id, "Job started");
        let started = self.reporter.started(&job.id);
        let outcome = self.run(&job).await;

        // registry sees start before the terminal event
        if let Err(e) = started.await {
            warn!(job_id = %job.id, error = %e, "Start webhook task failed");
        }

        match outcome {
            Ok(report) => {
                info!(job_id = %job.id, "Job done");
                self.reporter.completed(&report).await;
            }
            Err(e) => {
                error!(job_id = %job.id, error = %e, "Job failed");
                self.reporter.failed(&job.id, &e).await;
            }
        }
    }

    async fn recover(&self, job: &Job, reason: String) {
        self.reporter
            .failed(&job.id, &PipelineError::internal(reason))
            .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeMediaTools, FakeSpeech, MemoryStore, RecordingRegistry, WebhookEvent};
    use tempfile::{tempdir, TempDir};

    struct Harness {
        store: Arc<MemoryStore>,
        registry: Arc<RecordingRegistry>,
        pipeline: JobPipeline<MemoryStore, FakeMediaTools, FakeSpeech, RecordingRegistry>,
        scratch: TempDir,
    }

    fn harness(tools: FakeMediaTools, probe_timeout: Duration) -> Harness {
        harness_with_target(tools, probe_timeout, Language::Mandarin)
    }

    fn harness_with_target(
        tools: FakeMediaTools,
        probe_timeout: Duration,
        target_language: Language,
    ) -> Harness {
        let scratch = tempdir().unwrap();
        let store = Arc::new(MemoryStore::default().with_object("v1.mp4", b"source"));
        let registry = Arc::new(RecordingRegistry::default());
        let pipeline = JobPipeline::new(
            store.clone(),
            Arc::new(tools),
            Arc::new(FakeSpeech::default()),
            registry.clone(),
            PipelineSettings {
                public_base: "https://cdn.example.com".to_string(),
                target_language,
                delete_source: true,
                probe_timeout,
                scratch_root: scratch.path().to_path_buf(),
            },
        );
        Harness {
            store,
            registry,
            pipeline,
            scratch,
        }
    }

    fn pending(id: &str) -> Job {
        Job {
            id: id.to_string(),
            status: JobStatus::Pending,
            video_url: "v1.mp4".to_string(),
        }
    }

    #[tokio::test]
    async fn test_pending_job_reports_start_then_completion() {
        let h = harness(FakeMediaTools::default().with_duration(12.5), PROBE_TIMEOUT);

        h.pipeline.execute(pending("j1")).await;

        let events = h.registry.events();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0], WebhookEvent::Started("j1".to_string()));
        let WebhookEvent::Completed(report) = &events[1] else {
            panic!("expected completion, got {:?}", events[1]);
        };
        assert_eq!(report.id, "j1");
        assert_eq!(report.status, JobStatus::Done);
        assert!(report.video_url.starts_with("https://cdn.example.com/"));
        assert!(report.video_url.ends_with("_master.m3u8"));
        assert_eq!(report.video_duration, 12.5);

        let languages: Vec<_> = report.subtitle_tracks.iter().map(|t| t.language).collect();
        assert_eq!(languages, vec![Language::English, Language::Mandarin]);
        for track in &report.subtitle_tracks {
            let key = track.src.trim_start_matches("https://cdn.example.com/");
            assert!(h.store.object(key).is_some(), "missing {}", key);
        }

        let master_key = report.video_url.trim_start_matches("https://cdn.example.com/");
        assert!(h.store.object(master_key).is_some());
        assert!(h.store.object("v1.mp4").is_none());
        assert_eq!(std::fs::read_dir(h.scratch.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_source_language_target_publishes_one_track() {
        let h = harness_with_target(FakeMediaTools::default(), PROBE_TIMEOUT, Language::English);

        h.pipeline.execute(pending("j6")).await;

        let events = h.registry.events();
        let WebhookEvent::Completed(report) = &events[1] else {
            panic!("expected completion, got {:?}", events[1]);
        };
        assert_eq!(report.subtitle_tracks.len(), 1);
        assert_eq!(report.subtitle_tracks[0].language, Language::English);
    }

    #[test]
    fn test_settings_reject_unknown_language_before_any_job() {
        let vars = [
            ("AWS_ACCESS_KEY", "minioadmin"),
            ("AWS_SECRET_KEY", "minioadmin"),
            ("S3_BUCKET", "media"),
            ("PUBLIC_ASSET_ENDPOINT", "https://cdn.example.com"),
            ("VIDEO_PLATFORM_SERVER_URL", "https://platform.example.com"),
            ("VIDEO_PLATFORM_API_KEY", "secret"),
            ("OPENAI_API_KEY", "sk-test"),
        ];
        let lookup = |target: &'static str| {
            move |name: &str| {
                if name == "SUBTITLE_LANGUAGE" {
                    return Some(target.to_string());
                }
                vars.iter()
                    .find(|(key, _)| *key == name)
                    .map(|(_, value)| value.to_string())
            }
        };

        let config = AppConfig::from_lookup(lookup("en")).unwrap();
        let settings = PipelineSettings::from_config(&config);
        assert_eq!(settings.target_language, Language::English);

        assert!(AppConfig::from_lookup(lookup("fr")).is_err());
    }

    #[tokio::test]
    async fn test_failed_encode_reports_failure_only() {
        let h = harness(FakeMediaTools::default().failing_profile("mid"), PROBE_TIMEOUT);

        h.pipeline.execute(pending("j2")).await;

        let events = h.registry.events();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0], WebhookEvent::Started("j2".to_string()));
        assert!(matches!(&events[1], WebhookEvent::Failed(id, msg) if id == "j2" && msg.contains("ffmpeg")));
        assert!(h.store.keys().iter().all(|k| !k.ends_with("_master.m3u8")));
        assert!(h.store.object("v1.mp4").is_none());
        assert_eq!(std::fs::read_dir(h.scratch.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_non_pending_job_is_rejected() {
        let h = harness(FakeMediaTools::default(), PROBE_TIMEOUT);
        let mut job = pending("j3");
        job.status = JobStatus::Processing;

        h.pipeline.execute(job).await;

        let events = h.registry.events();
        assert_eq!(events[0], WebhookEvent::Started("j3".to_string()));
        assert!(matches!(&events[1], WebhookEvent::Failed(_, msg) if msg.starts_with("validation failed")));
        assert!(h.store.object("v1.mp4").is_some());
    }

    #[tokio::test]
    async fn test_stuck_probe_times_out() {
        let tools = FakeMediaTools::default().with_probe_delay(Duration::from_secs(5));
        let h = harness(tools, Duration::from_millis(50));

        h.pipeline.execute(pending("j4")).await;

        let events = h.registry.events();
        assert_eq!(events.len(), 2);
        assert!(matches!(&events[1], WebhookEvent::Failed(_, msg) if msg.contains("timed out")));
    }

    #[tokio::test]
    async fn test_missing_source_fails_job() {
        let h = harness(FakeMediaTools::default(), PROBE_TIMEOUT);
        let mut job = pending("j5");
        job.video_url = "https://cdn.example.com/missing.mp4".to_string();

        h.pipeline.execute(job).await;

        let events = h.registry.events();
        assert!(matches!(&events[1], WebhookEvent::Failed(id, _) if id == "j5"));
        assert_eq!(h.store.put_count(), 0);
    }

    #[tokio::test]
    async fn test_transcode_video_rejects_other_extensions() {
        let h = harness(FakeMediaTools::default(), PROBE_TIMEOUT);
        let err = h
            .pipeline
            .transcode_video(Path::new("/in/notes.txt"))
            .await
            .unwrap_err();
        assert!(err.is_validation());
        assert_eq!(h.store.put_count(), 0);
    }

    #[test]
    fn test_video_detection() {
        assert!(is_video(Path::new("a.MP4")));
        assert!(is_video(Path::new("a.webm")));
        assert!(!is_video(Path::new("a.mp3")));
    }
}
