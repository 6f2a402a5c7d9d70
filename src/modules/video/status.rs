use super::model::{RenditionJob, RenditionStatus};
use crate::infrastructure::storage::join;

/// Player-facing master manifest URL, available once any rendition is Ready.
pub fn stream_reference(
    base_url: &str,
    video_root: &str,
    bucket_id: &str,
    file_id: &str,
    renditions: &[RenditionJob],
) -> Option<String> {
    renditions
        .iter()
        .any(|r| r.status == RenditionStatus::Ready)
        .then(|| {
            let path = join(&join(video_root, bucket_id), &format!("{}/{}.m3u8", file_id, file_id));
            join(base_url, &path)
        })
}
