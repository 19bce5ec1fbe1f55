//! Render list and transform cache
//!
//! The render list is the backend-facing output: an ordered sequence of
//! actions built from a visual scene. The transform cache supplies the
//! matrices and runtime values those actions refer to.

pub mod actions;
pub mod coord_sys;
pub mod render_list;
pub mod transform_cache;

pub use actions::{
    InputBinding, PassRef, RenderAction, SamplerBinding, UniformBinding, UniformSource,
};
pub use coord_sys::{LightBinding, LocalId, ValueId, ViewCoordSys, ViewId};
pub use render_list::{BuildOutcome, RenderList, RenderListError};
pub use transform_cache::{CacheKey, CacheStats, LocalEntry, TransformCache, ViewEntry};
