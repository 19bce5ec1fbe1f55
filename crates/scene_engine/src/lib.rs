//! # Scene Engine
//!
//! A versioned scene database with render-list construction and a lazily
//! updated transform cache.
//!
//! ## Features
//!
//! - **Scene Database**: Typed libraries of buffers, images, geometries,
//!   cameras, lights, effects, materials, nodes and visual scenes, with
//!   read-through fallback databases
//! - **Change Stamps**: Every edit is stamped from an injectable clock and
//!   propagated up to the library and the database
//! - **Render Lists**: Backend-agnostic action sequences, rebuilt only on
//!   structural change
//! - **Transform Cache**: Matrices and runtime semantics recomputed only
//!   when their sources move
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use scene_engine::prelude::*;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = PipelineConfig::default();
//!     let mut database = Database::default();
//!     // ... populate the database ...
//!     # database.add::<VisualScene>("main")?;
//!
//!     let mut cache = TransformCache::new(config.cache.clone());
//!     let mut list = RenderList::new(&config);
//!     list.build(&database, &mut cache, "main")?;
//!     cache.update(&database, 1280, 720);
//!
//!     for action in &list {
//!         println!("{action}");
//!     }
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(
    clippy::module_name_repetitions,
    clippy::similar_names,
    clippy::too_many_arguments,
    clippy::cast_precision_loss,
    clippy::must_use_candidate
)]

pub mod config;
pub mod core;
pub mod foundation;
pub mod render;
pub mod scene;

#[cfg(test)]
mod tests;

/// Common imports for crate users
pub mod prelude {
    pub use crate::{
        config::{Config, ConfigError},
        core::config::{CacheConfig, LoggingConfig, PipelineConfig},
        foundation::{
            collections::Handle,
            diagnostics::{Diagnostics, Issue},
            math::{Mat3, Mat4, Vec2, Vec3, Vec4},
            stamp::{Clock, SequenceClock, Stamp, Versioned},
        },
        render::{BuildOutcome, RenderAction, RenderList, RenderListError, TransformCache},
        scene::{
            Camera, Database, DatabaseError, Effect, Entity, Geometry, Image, Light, Material,
            Node, RuntimeSemantic, SourceBuffer, Value, ValueType, VisualScene,
        },
    };
}
