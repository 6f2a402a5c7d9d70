pub mod adapter;
pub mod cleanup;
pub mod error;
#[cfg(test)]
pub mod fakes;
pub mod playlist;
pub mod prober;
pub mod publisher;
pub mod retriever;
pub mod service;
