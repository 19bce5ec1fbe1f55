//! Effects: parameters, techniques and passes
//!
//! An effect bundles named parameters with one or more techniques. Each
//! technique is an ordered list of passes, and a pass is everything a backend
//! needs to set up one draw: shader sources, the uniforms, attributes and
//! samplers those shaders declare, optional render targets and fixed-function
//! state.

use std::fmt;

use bitflags::bitflags;

use crate::foundation::collections::EffectKey;
use crate::foundation::stamp::Versioned;

use super::library::{impl_entity, Edit, EntityKind};
use super::semantic::RuntimeSemantic;
use super::value::{Value, ValueType};

/// Where an effect parameter gets its value
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ParamValue {
    /// A stored value
    Value(Value),
    /// Supplied by the renderer at draw time
    Semantic(RuntimeSemantic),
}

impl ParamValue {
    /// Type of the value this parameter produces
    pub fn value_type(&self) -> ValueType {
        match self {
            Self::Value(value) => value.value_type(),
            Self::Semantic(semantic) => semantic.value_type(),
        }
    }
}

/// Named effect parameter
#[derive(Debug, Clone, PartialEq)]
pub struct EffectParam {
    /// Scoped id that materials and uniforms refer to
    pub sid: String,
    /// Value or semantic
    pub value: ParamValue,
}

/// Shader stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    /// Vertex shader
    Vertex,
    /// Geometry shader
    Geometry,
    /// Fragment shader
    Fragment,
}

impl fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Vertex => f.write_str("vertex"),
            Self::Geometry => f.write_str("geometry"),
            Self::Fragment => f.write_str("fragment"),
        }
    }
}

/// Source text of one shader stage
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShaderSource {
    /// Stage
    pub stage: ShaderStage,
    /// Source text
    pub source: String,
}

/// A uniform declared by a pass
///
/// A uniform may name several sources; the render list uses the first that
/// resolves, in order literal, parameter, runtime semantic.
#[derive(Debug, Clone, PartialEq)]
pub struct UniformDecl {
    /// Shader symbol
    pub symbol: String,
    /// Declared shader type
    pub value_type: ValueType,
    /// Literal value stored on the pass
    pub value: Option<Value>,
    /// Effect or material parameter sid
    pub param: Option<String>,
    /// Renderer-supplied value
    pub semantic: Option<RuntimeSemantic>,
}

impl UniformDecl {
    /// Uniform with no source yet
    pub fn new(symbol: impl Into<String>, value_type: ValueType) -> Self {
        Self {
            symbol: symbol.into(),
            value_type,
            value: None,
            param: None,
            semantic: None,
        }
    }

    /// Add a literal value
    pub fn with_value(mut self, value: Value) -> Self {
        self.value = Some(value);
        self
    }

    /// Add a parameter reference
    pub fn with_param(mut self, sid: impl Into<String>) -> Self {
        self.param = Some(sid.into());
        self
    }

    /// Add a runtime semantic
    pub fn with_semantic(mut self, semantic: RuntimeSemantic) -> Self {
        self.semantic = Some(semantic);
        self
    }
}

/// A vertex attribute declared by a pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeDecl {
    /// Shader symbol
    pub symbol: String,
    /// Vertex semantic it reads (`POSITION`, `NORMAL`, ...)
    pub semantic: String,
}

/// A texture sampler declared by a pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SamplerDecl {
    /// Shader symbol
    pub symbol: String,
    /// Id of the sampled image
    pub image: String,
}

/// Framebuffer attachment point
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TargetSlot {
    /// Color attachment `n`
    Color(u8),
    /// Depth attachment
    Depth,
}

/// An image a pass renders into
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderTarget {
    /// Attachment point
    pub slot: TargetSlot,
    /// Id of the target image
    pub image: String,
}

bitflags! {
    /// Per-fragment operations a pass enables
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct PixelOps: u32 {
        /// Depth test
        const DEPTH_TEST = 1 << 0;
        /// Depth writes
        const DEPTH_WRITE = 1 << 1;
        /// Alpha blending
        const BLEND = 1 << 2;
    }
}

/// Face culling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CullFace {
    /// Draw both sides
    #[default]
    None,
    /// Cull back faces
    Back,
    /// Cull front faces
    Front,
}

/// Polygon rasterization
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PolygonMode {
    /// Filled polygons
    #[default]
    Fill,
    /// Outlines
    Line,
    /// Vertices only
    Point,
}

/// Rasterizer state of a pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct RasterState {
    /// Face culling
    pub cull: CullFace,
    /// Polygon mode
    pub polygon_mode: PolygonMode,
}

/// One rendering pass
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Pass {
    sid: String,
    shaders: Vec<ShaderSource>,
    uniforms: Vec<UniformDecl>,
    attributes: Vec<AttributeDecl>,
    samplers: Vec<SamplerDecl>,
    render_targets: Vec<RenderTarget>,
    pixel_ops: Option<PixelOps>,
    raster: Option<RasterState>,
}

impl Pass {
    /// Empty pass
    pub fn new(sid: impl Into<String>) -> Self {
        Self {
            sid: sid.into(),
            ..Self::default()
        }
    }

    /// Set the source of a stage
    pub fn with_shader(mut self, stage: ShaderStage, source: impl Into<String>) -> Self {
        self.shaders.retain(|shader| shader.stage != stage);
        self.shaders.push(ShaderSource { stage, source: source.into() });
        self
    }

    /// Declare a uniform
    pub fn with_uniform(mut self, uniform: UniformDecl) -> Self {
        self.uniforms.push(uniform);
        self
    }

    /// Declare a vertex attribute
    pub fn with_attribute(mut self, symbol: impl Into<String>, semantic: impl Into<String>) -> Self {
        self.attributes.push(AttributeDecl { symbol: symbol.into(), semantic: semantic.into() });
        self
    }

    /// Declare a sampler
    pub fn with_sampler(mut self, symbol: impl Into<String>, image: impl Into<String>) -> Self {
        self.samplers.push(SamplerDecl { symbol: symbol.into(), image: image.into() });
        self
    }

    /// Render into an image instead of the default framebuffer
    pub fn with_render_target(mut self, slot: TargetSlot, image: impl Into<String>) -> Self {
        self.render_targets.retain(|target| target.slot != slot);
        self.render_targets.push(RenderTarget { slot, image: image.into() });
        self
    }

    /// Set pixel operations
    pub fn with_pixel_ops(mut self, pixel_ops: PixelOps) -> Self {
        self.pixel_ops = Some(pixel_ops);
        self
    }

    /// Set rasterizer state
    pub fn with_raster(mut self, raster: RasterState) -> Self {
        self.raster = Some(raster);
        self
    }

    /// Scoped id
    pub fn sid(&self) -> &str {
        &self.sid
    }

    /// Shader sources
    pub fn shaders(&self) -> &[ShaderSource] {
        &self.shaders
    }

    /// Source of one stage
    pub fn shader(&self, stage: ShaderStage) -> Option<&str> {
        self.shaders
            .iter()
            .find(|shader| shader.stage == stage)
            .map(|shader| shader.source.as_str())
    }

    /// Declared uniforms
    pub fn uniforms(&self) -> &[UniformDecl] {
        &self.uniforms
    }

    /// Declared attributes
    pub fn attributes(&self) -> &[AttributeDecl] {
        &self.attributes
    }

    /// Declared samplers
    pub fn samplers(&self) -> &[SamplerDecl] {
        &self.samplers
    }

    /// Render targets (empty means the default framebuffer)
    pub fn render_targets(&self) -> &[RenderTarget] {
        &self.render_targets
    }

    /// Pixel operations, if the pass sets them
    pub fn pixel_ops(&self) -> Option<PixelOps> {
        self.pixel_ops
    }

    /// Rasterizer state, if the pass sets it
    pub fn raster(&self) -> Option<RasterState> {
        self.raster
    }
}

/// An ordered list of passes
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Technique {
    sid: String,
    passes: Vec<Pass>,
}

impl Technique {
    /// Technique without passes
    pub fn new(sid: impl Into<String>) -> Self {
        Self { sid: sid.into(), passes: Vec::new() }
    }

    /// Append a pass
    pub fn with_pass(mut self, pass: Pass) -> Self {
        self.passes.push(pass);
        self
    }

    /// Scoped id
    pub fn sid(&self) -> &str {
        &self.sid
    }

    /// Passes in draw order
    pub fn passes(&self) -> &[Pass] {
        &self.passes
    }
}

/// An effect
#[derive(Debug)]
pub struct Effect {
    id: String,
    versions: Versioned,
    params: Vec<EffectParam>,
    techniques: Vec<Technique>,
}

impl Effect {
    pub(crate) fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            versions: Versioned::default(),
            params: Vec::new(),
            techniques: Vec::new(),
        }
    }

    /// All parameters
    pub fn params(&self) -> &[EffectParam] {
        &self.params
    }

    /// Parameter by sid
    pub fn param(&self, sid: &str) -> Option<&EffectParam> {
        self.params.iter().find(|param| param.sid == sid)
    }

    /// All techniques
    pub fn techniques(&self) -> &[Technique] {
        &self.techniques
    }

    /// Technique by sid
    pub fn technique(&self, sid: &str) -> Option<&Technique> {
        self.techniques.iter().find(|technique| technique.sid == sid)
    }

    /// Index of the technique to use for an optional hint
    ///
    /// A hint that names no technique is a miss; no hint picks the first.
    pub fn technique_index(&self, hint: Option<&str>) -> Option<usize> {
        match hint {
            Some(sid) => self.techniques.iter().position(|technique| technique.sid == sid),
            None if self.techniques.is_empty() => None,
            None => Some(0),
        }
    }
}

impl_entity!(Effect, EffectKey, EntityKind::Effect, effects);

impl Edit<'_, Effect> {
    /// Set a parameter, creating it if needed
    ///
    /// Replacing a stored value with one of the same type is a value change;
    /// creating a parameter, changing its type or switching between value and
    /// semantic is structural.
    pub fn set_param(&mut self, sid: impl Into<String>, value: ParamValue) {
        let sid = sid.into();
        let params = &mut self.entity_mut().params;
        let structural = match params.iter_mut().find(|param| param.sid == sid) {
            Some(param) => {
                let same_shape = matches!(
                    (&param.value, &value),
                    (ParamValue::Value(old), ParamValue::Value(new)) if old.value_type() == new.value_type()
                );
                param.value = value;
                !same_shape
            }
            None => {
                params.push(EffectParam { sid, value });
                true
            }
        };
        if structural {
            self.touch_structure();
        } else {
            self.touch_value();
        }
    }

    /// Remove a parameter
    pub fn remove_param(&mut self, sid: &str) -> bool {
        let params = &mut self.entity_mut().params;
        let before = params.len();
        params.retain(|param| param.sid != sid);
        let removed = params.len() != before;
        if removed {
            self.touch_structure();
        }
        removed
    }

    /// Add a technique, replacing one with the same sid
    pub fn add_technique(&mut self, technique: Technique) {
        let techniques = &mut self.entity_mut().techniques;
        match techniques.iter_mut().find(|existing| existing.sid == technique.sid) {
            Some(existing) => *existing = technique,
            None => techniques.push(technique),
        }
        self.touch_structure();
    }

    /// Remove a technique
    pub fn remove_technique(&mut self, sid: &str) -> Option<Technique> {
        let techniques = &mut self.entity_mut().techniques;
        let index = techniques.iter().position(|technique| technique.sid == sid)?;
        let removed = techniques.remove(index);
        self.touch_structure();
        Some(removed)
    }

    /// Replace (or append) a pass inside a technique
    pub fn set_pass(&mut self, technique: &str, pass: Pass) -> bool {
        let techniques = &mut self.entity_mut().techniques;
        let Some(technique) = techniques.iter_mut().find(|existing| existing.sid == technique) else {
            return false;
        };
        match technique.passes.iter_mut().find(|existing| existing.sid == pass.sid) {
            Some(existing) => *existing = pass,
            None => technique.passes.push(pass),
        }
        self.touch_structure();
        true
    }

    /// Change the source of one stage of a pass
    pub fn set_shader_source(
        &mut self,
        technique: &str,
        pass: &str,
        stage: ShaderStage,
        source: impl Into<String>,
    ) -> bool {
        let techniques = &mut self.entity_mut().techniques;
        let Some(target) = techniques
            .iter_mut()
            .filter(|existing| existing.sid == technique)
            .flat_map(|existing| existing.passes.iter_mut())
            .find(|existing| existing.sid == pass)
        else {
            return false;
        };
        let source = source.into();
        match target.shaders.iter_mut().find(|shader| shader.stage == stage) {
            Some(shader) => shader.source = source,
            None => target.shaders.push(ShaderSource { stage, source }),
        }
        self.touch_structure();
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::Vec3;
    use crate::scene::Database;

    fn phong() -> Technique {
        Technique::new("phong").with_pass(
            Pass::new("p0")
                .with_shader(ShaderStage::Vertex, "void main() {}")
                .with_shader(ShaderStage::Fragment, "void main() {}")
                .with_attribute("position", "POSITION")
                .with_uniform(UniformDecl::new("mvp", ValueType::Mat4).with_semantic(RuntimeSemantic::ClipFromObject))
                .with_pixel_ops(PixelOps::DEPTH_TEST | PixelOps::DEPTH_WRITE),
        )
    }

    #[test]
    fn test_technique_selection() {
        let mut db = Database::default();
        let handle = db.add::<Effect>("fx").unwrap();
        {
            let mut effect = db.edit::<Effect>(handle).unwrap();
            effect.add_technique(phong());
            effect.add_technique(Technique::new("wire"));
        }
        let effect = db.get::<Effect>(handle).unwrap();
        assert_eq!(effect.technique_index(None), Some(0));
        assert_eq!(effect.technique_index(Some("wire")), Some(1));
        assert_eq!(effect.technique_index(Some("toon")), None);
        assert_eq!(effect.techniques()[0].passes()[0].shader(ShaderStage::Vertex), Some("void main() {}"));
    }

    #[test]
    fn test_param_edits() {
        let mut db = Database::default();
        let handle = db.add::<Effect>("fx").unwrap();

        let created = db.versions().structure_changed();
        db.edit::<Effect>(handle).unwrap().set_param("diffuse", ParamValue::Value(Value::Vec3(Vec3::zeros())));
        let after_create = db.versions().structure_changed();
        assert!(after_create > created);

        db.edit::<Effect>(handle).unwrap().set_param("diffuse", ParamValue::Value(Value::Vec3(Vec3::x())));
        assert_eq!(db.versions().structure_changed(), after_create);

        db.edit::<Effect>(handle).unwrap().set_param("diffuse", ParamValue::Value(Value::Float(1.0)));
        assert!(db.versions().structure_changed() > after_create);

        assert!(db.edit::<Effect>(handle).unwrap().remove_param("diffuse"));
        assert!(!db.edit::<Effect>(handle).unwrap().remove_param("diffuse"));
    }

    #[test]
    fn test_shader_source_edit_is_structural() {
        let mut db = Database::default();
        let handle = db.add::<Effect>("fx").unwrap();
        db.edit::<Effect>(handle).unwrap().add_technique(phong());
        let structure = db.versions().structure_changed();

        assert!(db.edit::<Effect>(handle).unwrap().set_shader_source("phong", "p0", ShaderStage::Fragment, "// new"));
        assert!(db.versions().structure_changed() > structure);
        assert!(!db.edit::<Effect>(handle).unwrap().set_shader_source("phong", "p9", ShaderStage::Fragment, ""));

        let effect = db.get::<Effect>(handle).unwrap();
        assert_eq!(effect.techniques()[0].passes()[0].shader(ShaderStage::Fragment), Some("// new"));
    }
}
