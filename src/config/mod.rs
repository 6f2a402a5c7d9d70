pub mod env;
pub mod renditions;
pub mod settings;
