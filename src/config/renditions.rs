use serde::Serialize;

/// One target quality of the bitrate ladder. Bitrates are in kbps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenditionSpec {
    pub id: &'static str,
    pub name: &'static str,
    pub width: u32,
    pub height: u32,
    pub video_bitrate: u32,
    pub audio_bitrate: u32,
}

/// The ladder every source is transcoded into, processed in this order.
pub const RENDITIONS: &[RenditionSpec] = &[
    RenditionSpec {
        id: "240p",
        name: "240p",
        width: 426,
        height: 240,
        video_bitrate: 400,
        audio_bitrate: 64,
    },
    RenditionSpec {
        id: "360p",
        name: "360p",
        width: 640,
        height: 360,
        video_bitrate: 800,
        audio_bitrate: 96,
    },
    RenditionSpec {
        id: "480p",
        name: "480p",
        width: 854,
        height: 480,
        video_bitrate: 1400,
        audio_bitrate: 128,
    },
    RenditionSpec {
        id: "720p",
        name: "720p",
        width: 1280,
        height: 720,
        video_bitrate: 2000,
        audio_bitrate: 128,
    },
    RenditionSpec {
        id: "1080p",
        name: "1080p",
        width: 1920,
        height: 1080,
        video_bitrate: 4500,
        audio_bitrate: 192,
    },
];
