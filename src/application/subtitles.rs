//! Audio extraction, transcription, translation and subtitle upload.

use super::fanout::fan_out;
use super::gateway::ObjectStoreGateway;
use crate::domain::jobs::{Language, LocalTrack, SubtitleTrack};
use crate::error::PipelineResult;
use crate::ports::media::MediaToolsPort;
use crate::ports::speech::SpeechPort;
use crate::ports::storage::ObjectStorePort;
use std::path::Path;
use std::sync::Arc;
use tokio::fs;
use tracing::{debug, info, warn};
use uuid::Uuid;

const AUDIO_EXTENSIONS: [&str; 6] = ["mp3", "wav", "m4a", "aac", "ogg", "flac"];

/// True when the file can be handed to speech-to-text without extraction.
pub fn is_audio(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| AUDIO_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
}

pub struct SubtitlePipeline<M: ?Sized, T: ?Sized> {
    tools: Arc<M>,
    speech: Arc<T>,
}

impl<M, T> SubtitlePipeline<M, T>
where
    M: MediaToolsPort + ?Sized + 'static,
    T: SpeechPort + ?Sized + 'static,
{
    pub fn new(tools: Arc<M>, speech: Arc<T>) -> Self {
        Self { tools, speech }
    }

    /// Produce the source-language track and, unless `target` is the source
    /// language, its translation. Files are written into `work_dir`.
    pub async fn generate(
        &self,
        source: &Path,
        work_dir: &Path,
        target: Language,
    ) -> PipelineResult<Vec<LocalTrack>> {
        let transcript = if is_audio(source) {
            self.speech.transcribe(source).await?
        } else {
            let audio = work_dir.join(format!("{}.mp3", Uuid::new_v4()));
            self.tools.extract_audio(source, &audio).await?;
            debug!(audio = %audio.display(), "Audio extracted");
            let transcript = self.speech.transcribe(&audio).await;
            if let Err(e) = fs::remove_file(&audio).await {
                warn!(audio = %audio.display(), error = %e, "Could not remove extracted audio");
            }
            transcript?
        };

        let stem = Uuid::new_v4().to_string();
        let source_path = work_dir.join(format!("{}.vtt", stem));
        fs::write(&source_path, &transcript).await?;
        info!(language = %Language::SOURCE, "Transcription written");

        let mut tracks = vec![LocalTrack {
            path: source_path,
            language: Language::SOURCE,
        }];
        if target == Language::SOURCE {
            return Ok(tracks);
        }

        let translated = self.speech.translate(&transcript, target).await?;
        let translated_path = work_dir.join(format!("{}_{}.vtt", stem, target.code()));
        fs::write(&translated_path, translated).await?;
        info!(language = %target, "Translation written");

        tracks.push(LocalTrack {
            path: translated_path,
            language: target,
        });
        Ok(tracks)
    }
}

/// Upload every track concurrently under its file name and return the
/// published tracks in the same order.
pub async fn upload_tracks<S>(
    gateway: &ObjectStoreGateway<S>,
    tracks: Vec<LocalTrack>,
) -> PipelineResult<Vec<SubtitleTrack>>
where
    S: ObjectStorePort + ?Sized + 'static,
{
    let outcome = fan_out(tracks, |track| {
        let gateway = gateway.clone();
        async move {
            let key = gateway.put_object(&track.path, file_name).await?;
            Ok(SubtitleTrack {
                src: gateway.absolute_url(&key),
                language: track.language,
            })
        }
    })
    .await;

    outcome.into_result()
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default()
}
