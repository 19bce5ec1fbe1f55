//! Render actions
//!
//! The backend-agnostic steps a render list is made of. A backend walks the
//! list in order and translates each action into API calls. Actions never
//! carry uniform values directly: they carry where to fetch them from, so a
//! list built once stays correct while parameters and transforms change.

use std::fmt;

use crate::foundation::collections::{EffectKey, GeometryKey, Handle, ImageKey, MaterialKey, SourceBufferKey};
use crate::scene::{
    Database, Effect, FramebufferClear, Material, ParamValue, Pass, PixelOps, PrimitiveType,
    RasterState, TargetSlot, Value, ValueType,
};

use super::coord_sys::{LocalId, ValueId, ViewId};
use super::transform_cache::TransformCache;

/// One pass of one technique of an effect
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PassRef {
    /// Effect owning the pass
    pub effect: Handle<EffectKey>,
    /// Technique index inside the effect
    pub technique: usize,
    /// Pass index inside the technique
    pub pass: usize,
}

impl PassRef {
    /// The referenced pass, if the effect still has it
    pub fn resolve<'a>(&self, database: &'a Database) -> Option<&'a Pass> {
        database
            .get::<Effect>(self.effect)?
            .techniques()
            .get(self.technique)?
            .passes()
            .get(self.pass)
    }
}

/// A vertex attribute fed from a source buffer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputBinding {
    /// Shader attribute symbol
    pub symbol: String,
    /// Buffer holding the data
    pub source: Handle<SourceBufferKey>,
    /// Scalars per vertex
    pub components: u32,
    /// First scalar
    pub offset: u32,
    /// Scalars between vertices
    pub stride: u32,
}

/// A texture bound to a sampler unit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SamplerBinding {
    /// Shader sampler symbol
    pub symbol: String,
    /// Texture unit
    pub unit: u32,
    /// Sampled image
    pub image: Handle<ImageKey>,
}

/// Where a uniform's value comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UniformSource {
    /// Literal stored on the pass declaration
    Literal {
        /// Declaring pass
        pass: PassRef,
        /// Uniform index inside the pass
        uniform: usize,
    },
    /// Material parameter override
    MaterialParam {
        /// Material
        material: Handle<MaterialKey>,
        /// Parameter sid
        sid: String,
    },
    /// Effect parameter holding a stored value
    EffectParam {
        /// Effect
        effect: Handle<EffectKey>,
        /// Parameter sid
        sid: String,
    },
    /// Value computed by the transform cache
    Runtime(ValueId),
}

impl UniformSource {
    /// Current value
    pub fn fetch(&self, database: &Database, cache: &TransformCache) -> Option<Value> {
        match self {
            Self::Literal { pass, uniform } => pass.resolve(database)?.uniforms().get(*uniform)?.value,
            Self::MaterialParam { material, sid } => database.get::<Material>(*material)?.param(sid).copied(),
            Self::EffectParam { effect, sid } => match database.get::<Effect>(*effect)?.param(sid)?.value {
                ParamValue::Value(value) => Some(value),
                ParamValue::Semantic(_) => None,
            },
            Self::Runtime(id) => cache.value(*id).copied(),
        }
    }
}

/// A uniform and its source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniformBinding {
    /// Shader symbol
    pub symbol: String,
    /// Declared shader type
    pub value_type: ValueType,
    /// Where to fetch the value
    pub source: UniformSource,
}

impl UniformBinding {
    /// Current value
    pub fn fetch(&self, database: &Database, cache: &TransformCache) -> Option<Value> {
        self.source.fetch(database, cache)
    }
}

/// One step of a render list
#[derive(Debug, Clone, PartialEq)]
pub enum RenderAction {
    /// Render into these attachments; empty means the default framebuffer
    SetFramebuffer {
        /// Attachments
        targets: Vec<(TargetSlot, Handle<ImageKey>)>,
    },
    /// Clear the current framebuffer
    SetFramebufferControl(FramebufferClear),
    /// Draw from this camera and light set
    SetViewCoordSys(ViewId),
    /// Draw objects placed by this node path
    SetLocalCoordSys(LocalId),
    /// Use this pass's shaders
    SetPass(PassRef),
    /// Per-fragment operations of the pass
    SetPixelOps(PixelOps),
    /// Rasterizer state of the pass
    SetRaster(RasterState),
    /// Vertex attribute streams
    SetInputs {
        /// Geometry the streams come from
        geometry: Handle<GeometryKey>,
        /// Primitive set index inside the geometry
        primitive_set: usize,
        /// Attribute bindings
        bindings: Vec<InputBinding>,
    },
    /// Texture bindings
    SetSamplers(Vec<SamplerBinding>),
    /// Uniform bindings
    SetUniforms(Vec<UniformBinding>),
    /// Non-indexed draw
    Draw {
        /// Primitive topology
        mode: PrimitiveType,
        /// First vertex
        first: u32,
        /// Vertex count
        count: u32,
        /// Bounding-box visibility value; skip the draw when it is false
        visibility: Option<ValueId>,
    },
    /// Indexed draw
    DrawIndexed {
        /// Primitive topology
        mode: PrimitiveType,
        /// Index buffer
        indices: Handle<SourceBufferKey>,
        /// First index
        offset: u32,
        /// Index count
        count: u32,
        /// Bounding-box visibility value; skip the draw when it is false
        visibility: Option<ValueId>,
    },
}

impl RenderAction {
    /// Short action name for logs
    pub fn name(&self) -> &'static str {
        match self {
            Self::SetFramebuffer { .. } => "SetFramebuffer",
            Self::SetFramebufferControl(_) => "SetFramebufferControl",
            Self::SetViewCoordSys(_) => "SetViewCoordSys",
            Self::SetLocalCoordSys(_) => "SetLocalCoordSys",
            Self::SetPass(_) => "SetPass",
            Self::SetPixelOps(_) => "SetPixelOps",
            Self::SetRaster(_) => "SetRaster",
            Self::SetInputs { .. } => "SetInputs",
            Self::SetSamplers(_) => "SetSamplers",
            Self::SetUniforms(_) => "SetUniforms",
            Self::Draw { .. } => "Draw",
            Self::DrawIndexed { .. } => "DrawIndexed",
        }
    }

    /// Whether this action draws
    pub fn is_draw(&self) -> bool {
        matches!(self, Self::Draw { .. } | Self::DrawIndexed { .. })
    }

    /// Visibility value of a draw
    pub fn visibility(&self) -> Option<ValueId> {
        match self {
            Self::Draw { visibility, .. } | Self::DrawIndexed { visibility, .. } => *visibility,
            _ => None,
        }
    }
}

impl fmt::Display for RenderAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SetFramebuffer { targets } if targets.is_empty() => write!(f, "SetFramebuffer(default)"),
            Self::SetFramebuffer { targets } => write!(f, "SetFramebuffer({} targets)", targets.len()),
            Self::SetFramebufferControl(clear) => write!(f, "SetFramebufferControl({clear:?})"),
            Self::SetViewCoordSys(view) => write!(f, "SetViewCoordSys(#{})", view.index()),
            Self::SetLocalCoordSys(local) => write!(f, "SetLocalCoordSys(#{})", local.index()),
            Self::SetPass(pass) => write!(f, "SetPass(technique {}, pass {})", pass.technique, pass.pass),
            Self::SetPixelOps(ops) => write!(f, "SetPixelOps({ops:?})"),
            Self::SetRaster(raster) => write!(f, "SetRaster({raster:?})"),
            Self::SetInputs { primitive_set, bindings, .. } => {
                write!(f, "SetInputs(set {primitive_set}, {} streams)", bindings.len())
            }
            Self::SetSamplers(samplers) => write!(f, "SetSamplers({})", samplers.len()),
            Self::SetUniforms(uniforms) => write!(f, "SetUniforms({})", uniforms.len()),
            Self::Draw { mode, first, count, .. } => write!(f, "Draw({mode:?}, {first}, {count})"),
            Self::DrawIndexed { mode, offset, count, .. } => write!(f, "DrawIndexed({mode:?}, {offset}, {count})"),
        }
    }
}
