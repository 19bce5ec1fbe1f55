//! # Core Module
//!
//! Shared configuration for the scene pipeline.
//!
//! ## Organization
//!
//! - **Config**: Pipeline, cache and logging settings
//! - **Foundation**: Low-level utilities (math, stamps, handles, diagnostics)

pub mod config;

// Re-export foundation modules for convenience
pub use crate::foundation;

// Re-export commonly used config types
pub use config::{
    PipelineConfig,
    CacheConfig,
    LoggingConfig,
};
pub use crate::config::{Config, ConfigError};
