//! llamaserve core library
//!
//! This crate provides the foundational utilities shared by the inference
//! service, the index builder and the command line:
//! - Error handling (`AppError`, `AppResult`)
//! - Logging infrastructure
//! - Configuration management

pub mod config;
pub mod error;
pub mod logging;

// Re-export commonly used types
pub use config::{AppConfig, ConfigOverrides, LlmSettings, ServerConfig};
pub use error::{AppError, AppResult};
