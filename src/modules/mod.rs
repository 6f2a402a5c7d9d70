pub mod transcoding;
pub mod video;
