pub mod config_service;
pub mod dto;
pub mod memory_backend;

pub use crate::config_service::ConfigService;
pub use crate::memory_backend::InMemoryBackend;
