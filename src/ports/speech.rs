use crate::domain::jobs::Language;
use crate::error::PipelineResult;
use async_trait::async_trait;
use std::path::Path;

/// Speech-to-text and subtitle translation service.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SpeechPort: Send + Sync {
    /// Transcribe an audio file into a WebVTT document.
    async fn transcribe(&self, audio: &Path) -> PipelineResult<String>;

    /// Translate a WebVTT document, keeping cue timings.
    async fn translate(&self, vtt: &str, language: Language) -> PipelineResult<String>;
}
