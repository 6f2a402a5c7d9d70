pub mod crypto;
pub mod db;
pub mod media;
pub mod queue;
pub mod storage;
