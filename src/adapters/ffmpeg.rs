//! ffmpeg / ffprobe command line tools.

use crate::domain::hls::{ResolutionProfile, SEGMENT_SECONDS};
use crate::error::{PipelineError, PipelineResult};
use crate::ports::media::MediaToolsPort;
use async_trait::async_trait;
use std::ffi::OsString;
use std::path::Path;
use std::process::Output;
use tokio::process::Command;
use tracing::debug;

/// Bytes of stderr kept in a tool error.
const STDERR_TAIL: usize = 512;

#[derive(Clone, Debug)]
pub struct FfmpegTools {
    ffmpeg: OsString,
    ffprobe: OsString,
}

impl Default for FfmpegTools {
    fn default() -> Self {
        Self::new("ffmpeg", "ffprobe")
    }
}

impl FfmpegTools {
    pub fn new(ffmpeg: impl Into<OsString>, ffprobe: impl Into<OsString>) -> Self {
        Self {
            ffmpeg: ffmpeg.into(),
            ffprobe: ffprobe.into(),
        }
    }

    async fn run(
        &self,
        tool: &'static str,
        program: &OsString,
        args: Vec<OsString>,
    ) -> PipelineResult<Output> {
        debug!(tool, args = ?args, "Running");
        let output = Command::new(program)
            .args(&args)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| PipelineError::tool(tool, e.to_string()))?;

        if !output.status.success() {
            return Err(PipelineError::tool(
                tool,
                format!("{}: {}", output.status, stderr_tail(&output.stderr)),
            ));
        }
        Ok(output)
    }
}

/// Arguments for one HLS rendition.
pub fn encode_args(
    source: &Path,
    profile: &ResolutionProfile,
    manifest: &Path,
    segment_pattern: &Path,
) -> Vec<OsString> {
    let mut args: Vec<OsString> = vec!["-y".into(), "-i".into(), source.into()];
    for (flag, value) in [
        ("-c:v", "h264".to_string()),
        ("-b:v", profile.video_bitrate.to_string()),
        ("-c:a", "aac".to_string()),
        ("-b:a", profile.audio_bitrate.to_string()),
        ("-vf", format!("scale={}", profile.resolution)),
        ("-f", "hls".to_string()),
        ("-hls_time", SEGMENT_SECONDS.to_string()),
        ("-hls_list_size", "0".to_string()),
        ("-crf", "20".to_string()),
    ] {
        args.push(flag.into());
        args.push(value.into());
    }
    args.push("-hls_segment_filename".into());
    args.push(segment_pattern.into());
    args.push(manifest.into());
    args
}

/// Parse ffprobe's `format=duration` output.
pub fn parse_duration(stdout: &[u8]) -> PipelineResult<f64> {
    let text = String::from_utf8_lossy(stdout);
    let trimmed = text.trim();
    trimmed
        .parse::<f64>()
        .ok()
        .filter(|d| d.is_finite() && *d >= 0.0)
        .ok_or_else(|| PipelineError::tool("ffprobe", format!("unreadable duration {:?}", trimmed)))
}

fn stderr_tail(stderr: &[u8]) -> String {
    let text = String::from_utf8_lossy(stderr);
    let text = text.trim();
    let start = text
        .char_indices()
        .map(|(i, _)| i)
        .find(|&i| text.len() - i <= STDERR_TAIL)
        .unwrap_or(text.len());
    text[start..].to_string()
}

#[async_trait]
impl MediaToolsPort for FfmpegTools {
    async fn probe_duration(&self, media: &Path) -> PipelineResult<f64> {
        let args: Vec<OsString> = vec![
            "-v".into(),
            "error".into(),
            "-show_entries".into(),
            "format=duration".into(),
            "-of".into(),
            "default=noprint_wrappers=1:nokey=1".into(),
            media.into(),
        ];
        let output = self.run("ffprobe", &self.ffprobe, args).await?;
        parse_duration(&output.stdout)
    }

    async fn encode_rendition(
        &self,
        source: &Path,
        profile: &ResolutionProfile,
        manifest: &Path,
        segment_pattern: &Path,
    ) -> PipelineResult<()> {
        let args = encode_args(source, profile, manifest, segment_pattern);
        self.run("ffmpeg", &self.ffmpeg, args).await?;
        Ok(())
    }

    async fn extract_audio(&self, source: &Path, output: &Path) -> PipelineResult<()> {
        let args: Vec<OsString> = vec![
            "-y".into(),
            "-i".into(),
            source.into(),
            "-map".into(),
            "0:a".into(),
            output.into(),
        ];
        self.run("ffmpeg", &self.ffmpeg, args).await?;
        Ok(())
    }

    async fn convert_image(&self, source: &Path, output: &Path) -> PipelineResult<()> {
        let args: Vec<OsString> = vec![
            "-y".into(),
            "-i".into(),
            source.into(),
            "-compression_level".into(),
            "6".into(),
            output.into(),
        ];
        self.run("ffmpeg", &self.ffmpeg, args).await?;
        Ok(())
    }
}
