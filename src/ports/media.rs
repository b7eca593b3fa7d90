use crate::domain::hls::ResolutionProfile;
use crate::error::PipelineResult;
use async_trait::async_trait;
use std::path::Path;

/// Encoder and probe tooling (ffmpeg/ffprobe in production).
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MediaToolsPort: Send + Sync {
    /// Container duration in seconds.
    async fn probe_duration(&self, media: &Path) -> PipelineResult<f64>;

    /// Encode one HLS rendition: writes `manifest` plus segments named after `segment_pattern`.
    async fn encode_rendition(
        &self,
        source: &Path,
        profile: &ResolutionProfile,
        manifest: &Path,
        segment_pattern: &Path,
    ) -> PipelineResult<()>;

    /// Write the audio tracks of `source` to `output`.
    async fn extract_audio(&self, source: &Path, output: &Path) -> PipelineResult<()>;

    /// Re-encode an image; the output format follows the extension of `output`.
    async fn convert_image(&self, source: &Path, output: &Path) -> PipelineResult<()>;
}
