pub mod config_service;
pub mod mapping;
pub mod program;
pub mod serde_utils;
pub mod stats;
pub mod xmltv;
