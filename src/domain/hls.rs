use std::path::{Path, PathBuf};
use tokio::fs::{self, File};
use tokio::io::AsyncWriteExt;
use walkdir::WalkDir;

/// One rung of the adaptive bitrate ladder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolutionProfile {
    pub label: &'static str,
    /// `WIDTHxHEIGHT`, used both for scaling and in the master playlist.
    pub resolution: &'static str,
    pub video_bitrate: &'static str,
    pub audio_bitrate: &'static str,
    /// Advertised in `#EXT-X-STREAM-INF:BANDWIDTH=`.
    pub bandwidth: u64,
}

pub static RESOLUTION_LADDER: [ResolutionProfile; 3] = [
    ResolutionProfile {
        label: "low",
        resolution: "320x180",
        video_bitrate: "500k",
        audio_bitrate: "64k",
        bandwidth: 676_800,
    },
    ResolutionProfile {
        label: "mid",
        resolution: "854x480",
        video_bitrate: "1000k",
        audio_bitrate: "128k",
        bandwidth: 1_353_600,
    },
    ResolutionProfile {
        label: "high",
        resolution: "1280x720",
        video_bitrate: "2500k",
        audio_bitrate: "192k",
        bandwidth: 3_230_400,
    },
];

/// Seconds of media per transport stream segment.
pub const SEGMENT_SECONDS: u32 = 10;

/// Result of one successful rendition encode.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaylistEntry {
    pub profile: ResolutionProfile,
    pub manifest_path: PathBuf,
}

/// Per-rendition manifest path: `<dir>/<prefix>_<resolution>.m3u8`.
pub fn rendition_manifest_path(dir: &Path, prefix: &str, profile: &ResolutionProfile) -> PathBuf {
    dir.join(format!("{}_{}.m3u8", prefix, profile.resolution))
}

/// ffmpeg segment filename pattern living next to the rendition manifest.
pub fn rendition_segment_pattern(manifest: &Path) -> PathBuf {
    let name = manifest
        .file_name()
        .map(|n| n.to_string_lossy().replace(".m3u8", "_m3u8"))
        .unwrap_or_default();
    manifest.with_file_name(format!("{}_%03d.ts", name))
}

pub fn master_playlist_name(prefix: &str) -> String {
    format!("{}_master.m3u8", prefix)
}

pub struct MasterPlaylist {
    pub entries: Vec<PlaylistEntry>,
}

impl MasterPlaylist {
    pub fn new(entries: Vec<PlaylistEntry>) -> Self {
        Self { entries }
    }

    /// Render the manifest with each rendition referenced relative to `dir`.
    pub fn render(&self, dir: &Path) -> String {
        let mut out = String::from("#EXTM3U\n");
        for entry in &self.entries {
            let uri = entry
                .manifest_path
                .strip_prefix(dir)
                .unwrap_or(&entry.manifest_path);
            out.push_str(&format!(
                "#EXT-X-STREAM-INF:BANDWIDTH={},RESOLUTION={}\n{}\n",
                entry.profile.bandwidth,
                entry.profile.resolution,
                uri.to_string_lossy()
            ));
        }
        out
    }

    pub async fn write_to(&self, path: &Path) -> Result<(), std::io::Error> {
        let dir = path.parent().unwrap_or_else(|| Path::new(""));
        let mut file = File::create(path).await?;
        file.write_all(self.render(dir).as_bytes()).await?;
        file.sync_all().await?;
        Ok(())
    }
}

/// Point every relative URI that starts with `file_prefix` at `base`.
///
/// Only URI lines are touched, and a URI already under `base` is left alone,
/// so applying the rewrite twice yields the same manifest.
pub fn rewrite_uris(manifest: &str, file_prefix: &str, base: &str) -> String {
    let base = base.trim_end_matches('/');
    let mut out = String::with_capacity(manifest.len() + base.len() * 4);
    for line in manifest.split_inclusive('\n') {
        let uri = line.trim_end_matches(['\r', '\n']);
        let ending = &line[uri.len()..];
        if !uri.starts_with('#') && uri.starts_with(file_prefix) && !uri.starts_with(base) {
            out.push_str(base);
            out.push('/');
            out.push_str(uri);
            out.push_str(ending);
        } else {
            out.push_str(line);
        }
    }
    out
}

/// Rewrite every `.m3u8` under `dir` in place. Returns how many manifests were visited.
pub async fn rewrite_manifests_in(
    dir: &Path,
    file_prefix: &str,
    base: &str,
) -> Result<usize, std::io::Error> {
    let manifests: Vec<PathBuf> = WalkDir::new(dir)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .filter(|path| path.extension().is_some_and(|ext| ext == "m3u8"))
        .collect();

    for path in &manifests {
        let content = fs::read_to_string(path).await?;
        let rewritten = rewrite_uris(&content, file_prefix, base);
        if rewritten != content {
            fs::write(path, rewritten).await?;
        }
    }
    Ok(manifests.len())
}
