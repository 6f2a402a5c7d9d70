//! HLS master manifest over the renditions finished so far.

use std::path::Path;

use crate::config::renditions::RenditionSpec;
use crate::infrastructure::media::{Artifact, ArtifactRole};

pub struct MasterPlaylist {
    file_id: String,
    entries: Vec<(usize, RenditionSpec)>,
}

impl MasterPlaylist {
    pub fn new(file_id: &str) -> Self {
        Self {
            file_id: file_id.to_string(),
            entries: Vec::new(),
        }
    }

    /// Adds a completed rendition; `ladder_index` keeps ladder order.
    pub fn push(&mut self, ladder_index: usize, spec: RenditionSpec) {
        if self.entries.iter().any(|(i, _)| *i == ladder_index) {
            return;
        }
        self.entries.push((ladder_index, spec));
        self.entries.sort_by_key(|(i, _)| *i);
    }

    pub fn file_name(&self) -> String {
        format!("{}.m3u8", self.file_id)
    }

    pub fn render(&self) -> String {
        let mut m3u8 = String::from("#EXTM3U\n#EXT-X-VERSION:3\n");
        for (_, spec) in &self.entries {
            // bandwidth keeps the historical kbps * 1024 scaling
            let bandwidth = (u64::from(spec.video_bitrate) + u64::from(spec.audio_bitrate)) * 1024;
            m3u8.push_str(&format!(
                "#EXT-X-STREAM-INF:BANDWIDTH={},RESOLUTION={}x{},NAME=\"{}\"\n{}_{}p.m3u8\n",
                bandwidth, spec.width, spec.height, spec.height, self.file_id, spec.height
            ));
        }
        m3u8
    }

    /// Writes the manifest into `dir` and describes it for publishing.
    pub async fn write(&self, dir: &Path) -> std::io::Result<Artifact> {
        let path = dir.join(self.file_name());
        tokio::fs::write(&path, self.render()).await?;
        Ok(Artifact::new(path, ArtifactRole::MasterPlaylist))
    }
}
