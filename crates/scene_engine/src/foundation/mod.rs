//! Foundation module - Core utilities and types
//!
//! This module provides fundamental utilities used throughout the crate:
//! - Math types and operations
//! - Stable handles into entity arenas
//! - Version stamps and the clock that issues them
//! - Structured diagnostics for data-driven failures
//! - Logging utilities

pub mod math;
pub mod collections;
pub mod stamp;
pub mod diagnostics;
pub mod logging;
