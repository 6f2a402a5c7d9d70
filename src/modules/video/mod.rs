pub mod events;
#[cfg(test)]
pub mod memory;
pub mod model;
pub mod repository;
pub mod state_store;
pub mod status;
