//! Scene database
//!
//! Entity types, the libraries that own them, the database that ties the
//! libraries together, and the resolver that turns ids into handles.

pub mod bounds;
pub mod camera;
pub mod database;
pub mod effect;
pub mod geometry;
pub mod image;
pub mod library;
pub mod light;
pub mod material;
pub mod node;
pub mod resolver;
pub mod semantic;
pub mod source_buffer;
pub mod value;
pub mod visual_scene;

pub use bounds::Aabb;
pub use camera::{Camera, ClipPlanes, Projection};
pub use database::{Database, DatabaseError};
pub use effect::{
    AttributeDecl, CullFace, Effect, EffectParam, ParamValue, Pass, PixelOps, PolygonMode,
    RasterState, RenderTarget, SamplerDecl, ShaderSource, ShaderStage, TargetSlot, Technique,
    UniformDecl,
};
pub use geometry::{Geometry, PrimitiveSet, PrimitiveType, VertexInput, NORMAL, POSITION, TEXCOORD};
pub use image::{Image, ImageFormat};
pub use library::{Edit, Entity, EntityKind, Library};
pub use light::{Attenuation, Light, LightKind};
pub use material::Material;
pub use node::{Instance, InstanceGeometry, MaterialBinding, Node, NodeInstance, ResolvedTarget, TransformOp};
pub use resolver::{Dependency, NodePath, Resolver};
pub use semantic::RuntimeSemantic;
pub use source_buffer::{BufferContents, ElementType, SourceBuffer};
pub use value::{Value, ValueType};
pub use visual_scene::{EvaluateScene, FramebufferClear, RenderItem, VisualScene};
