use super::fanout::fan_out;
use crate::domain::hls::{
    rendition_manifest_path, rendition_segment_pattern, PlaylistEntry, ResolutionProfile,
};
use crate::error::PipelineResult;
use crate::ports::media::MediaToolsPort;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

/// Encode `source` once per profile, concurrently.
///
/// Every encode runs to completion even when a sibling fails. Entries come
/// back in ladder order; on failure the first observed error is returned.
pub async fn encode_ladder<M>(
    tools: Arc<M>,
    source: &Path,
    out_dir: &Path,
    prefix: &str,
    ladder: &[ResolutionProfile],
) -> PipelineResult<Vec<PlaylistEntry>>
where
    M: MediaToolsPort + ?Sized + 'static,
{
    let outcome = fan_out(ladder.iter().cloned(), |profile| {
        let tools = tools.clone();
        let source = source.to_path_buf();
        let manifest_path = rendition_manifest_path(out_dir, prefix, &profile);
        async move {
            info!(profile = profile.label, resolution = profile.resolution, "Encoding rendition");
            let segments = rendition_segment_pattern(&manifest_path);
            match tools
                .encode_rendition(&source, &profile, &manifest_path, &segments)
                .await
            {
                Ok(()) => {
                    info!(profile = profile.label, "Rendition encoded");
                    Ok(PlaylistEntry {
                        profile,
                        manifest_path,
                    })
                }
                Err(e) => {
                    warn!(profile = profile.label, error = %e, "Rendition failed");
                    Err(e)
                }
            }
        }
    })
    .await;

    outcome.into_result()
}
