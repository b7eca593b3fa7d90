//! Adaptive bitrate packaging: encode the ladder, assemble the master
//! playlist, point every manifest at its public location, upload.

use super::encode::encode_ladder;
use super::gateway::ObjectStoreGateway;
use crate::domain::hls::{
    master_playlist_name, rewrite_manifests_in, MasterPlaylist, ResolutionProfile,
    RESOLUTION_LADDER,
};
use crate::error::PipelineResult;
use crate::ports::media::MediaToolsPort;
use crate::ports::storage::ObjectStorePort;
use std::path::Path;
use std::sync::Arc;
use tokio::fs;
use tracing::info;
use uuid::Uuid;

pub struct HlsPackager<M: ?Sized, S: ?Sized> {
    tools: Arc<M>,
    gateway: ObjectStoreGateway<S>,
    ladder: Vec<ResolutionProfile>,
}

impl<M, S> HlsPackager<M, S>
where
    M: MediaToolsPort + ?Sized + 'static,
    S: ObjectStorePort + ?Sized + 'static,
{
    pub fn new(tools: Arc<M>, gateway: ObjectStoreGateway<S>) -> Self {
        Self {
            tools,
            gateway,
            ladder: RESOLUTION_LADDER.to_vec(),
        }
    }

    /// Package `source` under a fresh directory inside `work_dir` and return
    /// the public URL of the master playlist.
    ///
    /// Nothing is uploaded unless every rendition encoded successfully.
    pub async fn package(&self, source: &Path, work_dir: &Path) -> PipelineResult<String> {
        let leaf = Uuid::new_v4().to_string();
        let prefix = Uuid::new_v4().to_string();
        let out_dir = work_dir.join(&leaf);
        fs::create_dir_all(&out_dir).await?;

        let entries =
            encode_ladder(self.tools.clone(), source, &out_dir, &prefix, &self.ladder).await?;

        let master_name = master_playlist_name(&prefix);
        MasterPlaylist::new(entries)
            .write_to(&out_dir.join(&master_name))
            .await?;

        let base = self.gateway.absolute_url(&leaf);
        let rewritten = rewrite_manifests_in(&out_dir, &prefix, &base).await?;
        info!(dir = %leaf, manifests = rewritten, "Manifests rewritten");

        self.gateway.put_directory(&out_dir).await?;
        Ok(format!("{}/{}", base, master_name))
    }
}
