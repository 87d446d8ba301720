//! CRAG Core Library
//!
//! Foundational utilities shared by every CRAG crate:
//! - Error handling (`AppError`, `AppResult`)
//! - Logging infrastructure
//! - Configuration management (`AppConfig`, `CragSettings`)

pub mod config;
pub mod error;
pub mod logging;

// Re-export commonly used types
pub use config::{AppConfig, CragSettings, SearchFailurePolicy};
pub use error::{AppError, AppResult};
