//! Render list construction
//!
//! Walks a visual scene's evaluations and turns every visible primitive set
//! into a flat, backend-agnostic sequence of [`RenderAction`]s. The list is
//! rebuilt only when the structure of something it was built from changes;
//! value-only edits (transforms, parameters) are picked up through the
//! transform cache and the uniform sources without touching the list.

use std::ops::Index;

use thiserror::Error;

use crate::core::config::PipelineConfig;
use crate::foundation::collections::{
    EffectKey, GeometryKey, Handle, ImageKey, MaterialKey, NodeKey, SourceBufferKey,
};
use crate::foundation::diagnostics::{Diagnostics, Issue};
use crate::foundation::stamp::Versioned;
use crate::scene::{
    Camera, Database, Dependency, Effect, Entity, Geometry, Image, InstanceGeometry, Light,
    Material, Node, NodePath, ParamValue, Pass, PrimitiveSet, RenderItem, Resolver,
    SourceBuffer, TargetSlot, UniformDecl, ValueType, VisualScene,
};

use super::actions::{
    InputBinding, PassRef, RenderAction, SamplerBinding, UniformBinding, UniformSource,
};
use super::coord_sys::{LocalId, ValueId, ViewCoordSys, ViewId};
use super::transform_cache::TransformCache;

/// Render list errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RenderListError {
    /// The visual scene to build from does not exist anywhere in the database chain
    #[error("visual scene '{id}' not found")]
    VisualSceneNotFound {
        /// Requested scene id
        id: String,
    },
}

/// What the last call to [`RenderList::build`] did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildOutcome {
    /// The action sequence was regenerated
    Rebuilt,
    /// Only values moved; the sequence was kept
    ValuesChanged,
    /// Nothing the list depends on changed
    Unchanged,
}

/// Ordered render actions for one visual scene
#[derive(Debug)]
pub struct RenderList {
    config: PipelineConfig,
    actions: Vec<RenderAction>,
    scene_id: Option<String>,
    built: Versioned,
    cache_generation: Option<u32>,
    dependencies: Vec<Dependency>,
    diagnostics: Diagnostics,
    last_outcome: Option<BuildOutcome>,
}

impl RenderList {
    /// Create an empty list
    pub fn new(config: &PipelineConfig) -> Self {
        Self {
            config: config.clone(),
            actions: Vec::new(),
            scene_id: None,
            built: Versioned::default(),
            cache_generation: None,
            dependencies: Vec::new(),
            diagnostics: Diagnostics::new(),
            last_outcome: None,
        }
    }

    /// Bring the list up to date with `scene_id` in `database`
    ///
    /// Returns `true` if the action sequence was rebuilt. A rebuild purges
    /// `cache` and registers everything the new list refers to; callers must
    /// run [`TransformCache::update`] before reading values.
    pub fn build(
        &mut self,
        database: &Database,
        cache: &mut TransformCache,
        scene_id: &str,
    ) -> Result<bool, RenderListError> {
        let current = database.versions();
        let outcome = self.classify(database, cache, scene_id, &current);

        if outcome == BuildOutcome::Rebuilt {
            if let Err(err) = self.rebuild(database, cache, scene_id) {
                self.clear();
                return Err(err);
            }
        }

        self.built = current;
        self.last_outcome = Some(outcome);
        log::debug!(
            "Render list for '{}': {:?} ({} actions, {} issues)",
            scene_id,
            outcome,
            self.actions.len(),
            self.diagnostics.len()
        );
        Ok(outcome == BuildOutcome::Rebuilt)
    }

    fn classify(
        &self,
        database: &Database,
        cache: &TransformCache,
        scene_id: &str,
        current: &Versioned,
    ) -> BuildOutcome {
        if self.scene_id.as_deref() != Some(scene_id) || self.cache_generation != Some(cache.generation()) {
            return BuildOutcome::Rebuilt;
        }

        let structure_moved = !self.built.structure_changed().as_recent_as(current.structure_changed());
        if structure_moved && self.dependencies.iter().any(|dependency| dependency.changed(database)) {
            return BuildOutcome::Rebuilt;
        }

        if self.built.value_changed().as_recent_as(current.value_changed()) {
            BuildOutcome::Unchanged
        } else {
            BuildOutcome::ValuesChanged
        }
    }

    fn rebuild(&mut self, database: &Database, cache: &mut TransformCache, scene_id: &str) -> Result<(), RenderListError> {
        cache.purge();
        self.actions.clear();
        self.diagnostics.clear();

        let max_depth = self.config.max_node_path_depth.max(1);
        let culling = self.config.enable_bounding_box_culling;
        let texture_units = self.config.max_texture_units;
        let mut resolver = Resolver::new(database, &mut self.diagnostics).with_max_depth(max_depth);

        let Some((_, scene)) = resolver.lookup::<VisualScene>(scene_id) else {
            return Err(RenderListError::VisualSceneNotFound { id: scene_id.to_string() });
        };

        let mut builder = Builder {
            resolver,
            cache: &mut *cache,
            culling,
            max_depth,
            texture_units,
            actions: Vec::new(),
            state: EmitState::default(),
        };
        builder.visual_scene(scene);
        let Builder { resolver, actions, .. } = builder;

        self.dependencies = resolver.into_dependencies();
        self.actions = actions;
        self.scene_id = Some(scene_id.to_string());
        self.cache_generation = Some(cache.generation());
        log::info!(
            "Built render list for '{}': {} actions from {} lookups",
            scene_id,
            self.actions.len(),
            self.dependencies.len()
        );
        Ok(())
    }

    /// Drop the actions and everything recorded about the last build
    pub fn clear(&mut self) {
        self.actions.clear();
        self.scene_id = None;
        self.built = Versioned::default();
        self.cache_generation = None;
        self.dependencies.clear();
        self.last_outcome = None;
    }

    /// Actions in execution order
    pub fn actions(&self) -> &[RenderAction] {
        &self.actions
    }

    /// Iterate over the actions
    pub fn iter(&self) -> std::slice::Iter<'_, RenderAction> {
        self.actions.iter()
    }

    /// Number of actions
    pub fn len(&self) -> usize {
        self.actions.len()
    }

    /// Whether the list has no actions
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Scene the list was last built from
    pub fn scene_id(&self) -> Option<&str> {
        self.scene_id.as_deref()
    }

    /// Outcome of the last successful build
    pub fn last_outcome(&self) -> Option<BuildOutcome> {
        self.last_outcome
    }

    /// Problems found by the last rebuild
    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    /// Lookups the last rebuild depended on
    pub fn dependencies(&self) -> &[Dependency] {
        &self.dependencies
    }

    /// Number of draws the cache currently considers visible
    pub fn visible_draws(&self, cache: &TransformCache) -> usize {
        self.actions
            .iter()
            .filter(|action| action.is_draw() && cache.is_visible(action.visibility()))
            .count()
    }
}

impl Index<usize> for RenderList {
    type Output = RenderAction;

    fn index(&self, index: usize) -> &Self::Output {
        &self.actions[index]
    }
}

impl<'l> IntoIterator for &'l RenderList {
    type Item = &'l RenderAction;
    type IntoIter = std::slice::Iter<'l, RenderAction>;

    fn into_iter(self) -> Self::IntoIter {
        self.actions.iter()
    }
}

/// State last emitted into the list, used to skip redundant actions
#[derive(Default)]
struct EmitState {
    local: Option<LocalId>,
    view: Option<ViewId>,
    framebuffer: Vec<(TargetSlot, Handle<ImageKey>)>,
    pass: Option<PassRef>,
}

/// Everything resolved for one primitive set
struct DrawContext<'a> {
    view: ViewId,
    local: LocalId,
    geometry_handle: Handle<GeometryKey>,
    geometry: &'a Geometry,
    primitive_set: usize,
    set: &'a PrimitiveSet,
    material_handle: Handle<MaterialKey>,
    material: &'a Material,
    effect_handle: Handle<EffectKey>,
    effect: &'a Effect,
    indices: Option<Handle<SourceBufferKey>>,
    visibility: Option<ValueId>,
}

struct Builder<'a, 'c> {
    resolver: Resolver<'a>,
    cache: &'c mut TransformCache,
    culling: bool,
    max_depth: usize,
    texture_units: u32,
    actions: Vec<RenderAction>,
    state: EmitState,
}

impl<'a> Builder<'a, '_> {
    fn visual_scene(&mut self, scene: &'a VisualScene) {
        for evaluation in scene.evaluations() {
            if !evaluation.enabled {
                log::debug!("Skipping disabled evaluation '{}'", evaluation.sid);
                continue;
            }
            for item in &evaluation.renders {
                self.render_item(scene, item);
            }
        }
    }

    fn render_item(&mut self, scene: &'a VisualScene, item: &'a RenderItem) {
        let Some(view) = self.view(scene, item) else {
            log::warn!("Skipping render item with camera node '{}'", item.camera_node);
            return;
        };

        if let Some(clear) = item.clear {
            self.actions.push(RenderAction::SetFramebufferControl(clear));
        }

        for root_id in scene.roots() {
            let Some((root, node)) = self.resolver.lookup::<Node>(root_id) else {
                continue;
            };
            self.walk(&NodePath::new(vec![root]), node, false, item, view);
        }
    }

    /// Camera placement and light set of a render item
    fn view(&mut self, scene: &'a VisualScene, item: &'a RenderItem) -> Option<ViewId> {
        let (camera_path, camera_node) = self.instancing_path(scene, &item.camera_node)?;
        let Some(instance) = camera_node.instance_camera() else {
            self.resolver.report(Issue::MissingInstance {
                node: camera_node.id().to_string(),
                kind: "camera",
            });
            return None;
        };
        let (camera, _) = self.resolver.resolve_instance::<Camera>(instance)?;

        let mut coord_sys = ViewCoordSys::new(camera_path, camera);
        for light_id in &item.lights {
            let Some((light_path, light_node)) = self.instancing_path(scene, light_id) else {
                continue;
            };
            let Some(instance) = light_node.instance_light() else {
                self.resolver.report(Issue::MissingInstance {
                    node: light_node.id().to_string(),
                    kind: "light",
                });
                continue;
            };
            if let Some((light, _)) = self.resolver.resolve_instance::<Light>(instance) {
                coord_sys = coord_sys.with_light(light_path, light);
            }
        }
        Some(self.cache.view_coord_sys(coord_sys))
    }

    fn instancing_path(&mut self, scene: &'a VisualScene, node_id: &str) -> Option<(NodePath, &'a Node)> {
        let (handle, node) = self.resolver.lookup::<Node>(node_id)?;
        let path = self.resolver.find_node_path_in_scene(scene, handle)?;
        Some((path, node))
    }

    /// Layer-filtered depth-first traversal
    ///
    /// A node whose layers intersect the filter pulls in its whole subtree. A
    /// node with layers that miss the filter is skipped with its subtree. A
    /// node without layers is always visited but passes no match down.
    fn walk(&mut self, path: &NodePath, node: &'a Node, inherited: bool, item: &'a RenderItem, view: ViewId) {
        let matched = inherited
            || item.layers.is_empty()
            || node.layers().iter().any(|layer| item.layers.contains(layer));
        if !matched && !node.layers().is_empty() {
            log::trace!("Node '{}' filtered out by layers {:?}", node.id(), item.layers);
            return;
        }

        for instance in node.instance_geometries() {
            self.instance_geometry(path, instance, item, view);
        }

        for child_id in node.children() {
            if let Some((child, child_node)) = self.resolver.lookup::<Node>(child_id) {
                self.descend(path, child, child_node, matched, item, view);
            }
        }
        for instance in node.instance_nodes() {
            if let Some((child, child_node)) = self.resolver.resolve_instance::<Node>(instance) {
                self.descend(path, child, child_node, matched, item, view);
            }
        }
    }

    fn descend(
        &mut self,
        path: &NodePath,
        child: Handle<NodeKey>,
        child_node: &'a Node,
        inherited: bool,
        item: &'a RenderItem,
        view: ViewId,
    ) {
        if path.contains(child) {
            self.resolver.report(Issue::InstancingCycle { node: child_node.id().to_string() });
            return;
        }
        if path.len() >= self.max_depth {
            self.resolver.report(Issue::PathTooDeep {
                node: child_node.id().to_string(),
                max_depth: self.max_depth,
            });
            return;
        }
        self.walk(&path.child(child), child_node, inherited, item, view);
    }

    fn instance_geometry(&mut self, path: &NodePath, instance: &'a InstanceGeometry, item: &'a RenderItem, view: ViewId) {
        let Some((geometry_handle, geometry)) = self.resolver.resolve_geometry(instance) else {
            return;
        };
        let local = self.cache.local_coord_sys(path.clone());
        let visibility = self
            .culling
            .then(|| self.cache.check_bounding_box(view, local, geometry_handle));

        for (primitive_set, set) in geometry.primitive_sets().iter().enumerate() {
            let Some((material_handle, material)) = self.material(geometry, instance, set, item) else {
                continue;
            };
            let Some((effect_handle, effect)) = self.resolver.lookup::<Effect>(material.effect()) else {
                continue;
            };
            let technique = effect
                .technique_index(material.technique_hint())
                .and_then(|index| Some((index, effect.techniques().get(index)?)));
            let Some((technique_index, technique)) = technique else {
                self.resolver.report(Issue::MissingTechnique {
                    effect: effect.id().to_string(),
                    hint: material.technique_hint().unwrap_or_default().to_string(),
                });
                continue;
            };
            let indices = match set.index_buffer() {
                Some(buffer) => match self.resolver.lookup::<SourceBuffer>(buffer) {
                    Some((handle, _)) => Some(handle),
                    None => continue,
                },
                None => None,
            };

            let context = DrawContext {
                view,
                local,
                geometry_handle,
                geometry,
                primitive_set,
                set,
                material_handle,
                material,
                effect_handle,
                effect,
                indices,
                visibility,
            };
            for (pass_index, pass) in technique.passes().iter().enumerate() {
                let pass_ref = PassRef {
                    effect: effect_handle,
                    technique: technique_index,
                    pass: pass_index,
                };
                self.emit_pass(&context, pass_ref, pass);
            }
        }
    }

    /// Render item override first, then the instance's symbol binding
    fn material(
        &mut self,
        geometry: &'a Geometry,
        instance: &'a InstanceGeometry,
        set: &'a PrimitiveSet,
        item: &'a RenderItem,
    ) -> Option<(Handle<MaterialKey>, &'a Material)> {
        let id = match &item.material_override {
            Some(id) => id.as_str(),
            None => {
                let Some(id) = instance.material_for(set.material_symbol()) else {
                    self.resolver.report(Issue::UnboundMaterialSymbol {
                        geometry: geometry.id().to_string(),
                        symbol: set.material_symbol().to_string(),
                    });
                    return None;
                };
                id
            }
        };
        self.resolver.lookup::<Material>(id)
    }

    fn emit_pass(&mut self, context: &DrawContext<'a>, pass_ref: PassRef, pass: &'a Pass) {
        if self.state.local != Some(context.local) {
            self.state.local = Some(context.local);
            self.actions.push(RenderAction::SetLocalCoordSys(context.local));
        }
        if self.state.view != Some(context.view) {
            self.state.view = Some(context.view);
            self.actions.push(RenderAction::SetViewCoordSys(context.view));
        }

        let targets: Vec<_> = pass
            .render_targets()
            .iter()
            .filter_map(|target| {
                let (image, _) = self.resolver.lookup::<Image>(&target.image)?;
                Some((target.slot, image))
            })
            .collect();
        if targets != self.state.framebuffer {
            self.state.framebuffer.clone_from(&targets);
            self.actions.push(RenderAction::SetFramebuffer { targets });
        }

        if self.state.pass != Some(pass_ref) {
            self.state.pass = Some(pass_ref);
            self.actions.push(RenderAction::SetPass(pass_ref));
            if let Some(pixel_ops) = pass.pixel_ops() {
                self.actions.push(RenderAction::SetPixelOps(pixel_ops));
            }
            if let Some(raster) = pass.raster() {
                self.actions.push(RenderAction::SetRaster(raster));
            }
        }

        let bindings = self.input_bindings(context, pass);
        self.actions.push(RenderAction::SetInputs {
            geometry: context.geometry_handle,
            primitive_set: context.primitive_set,
            bindings,
        });

        let samplers = self.sampler_bindings(pass);
        if !samplers.is_empty() {
            self.actions.push(RenderAction::SetSamplers(samplers));
        }

        let uniforms: Vec<_> = pass
            .uniforms()
            .iter()
            .enumerate()
            .filter_map(|(index, decl)| self.uniform_binding(context, pass_ref, index, decl))
            .collect();
        if !uniforms.is_empty() {
            self.actions.push(RenderAction::SetUniforms(uniforms));
        }

        let mode = context.set.primitive_type();
        let count = context.set.vertex_count();
        self.actions.push(match context.indices {
            Some(indices) => RenderAction::DrawIndexed {
                mode,
                indices,
                offset: context.set.index_offset(),
                count,
                visibility: context.visibility,
            },
            None => RenderAction::Draw {
                mode,
                first: 0,
                count,
                visibility: context.visibility,
            },
        });
    }

    fn input_bindings(&mut self, context: &DrawContext<'a>, pass: &'a Pass) -> Vec<InputBinding> {
        let mut bindings = Vec::with_capacity(pass.attributes().len());
        for attribute in pass.attributes() {
            let Some(input) = context.geometry.input(&attribute.semantic) else {
                self.resolver.report(Issue::MissingVertexInput {
                    geometry: context.geometry.id().to_string(),
                    symbol: attribute.symbol.clone(),
                    semantic: attribute.semantic.clone(),
                });
                continue;
            };
            let Some((source, _)) = self.resolver.lookup::<SourceBuffer>(&input.source) else {
                continue;
            };
            bindings.push(InputBinding {
                symbol: attribute.symbol.clone(),
                source,
                components: input.components,
                offset: input.offset,
                stride: input.effective_stride(),
            });
        }
        bindings
    }

    fn sampler_bindings(&mut self, pass: &'a Pass) -> Vec<SamplerBinding> {
        let mut bindings: Vec<SamplerBinding> = Vec::new();
        for sampler in pass.samplers() {
            let Some((image, _)) = self.resolver.lookup::<Image>(&sampler.image) else {
                continue;
            };
            let unit = match u32::try_from(bindings.len()) {
                Ok(unit) if unit < self.texture_units => unit,
                _ => {
                    self.resolver.report(Issue::SamplerUnitsExhausted {
                        pass: pass.sid().to_string(),
                        symbol: sampler.symbol.clone(),
                        limit: self.texture_units,
                    });
                    continue;
                }
            };
            bindings.push(SamplerBinding {
                symbol: sampler.symbol.clone(),
                unit,
                image,
            });
        }
        bindings
    }

    /// Literal, then parameter (material before effect), then runtime semantic
    fn uniform_binding(
        &mut self,
        context: &DrawContext<'a>,
        pass_ref: PassRef,
        index: usize,
        decl: &'a UniformDecl,
    ) -> Option<UniformBinding> {
        let resolved = if let Some(value) = decl.value {
            Some((UniformSource::Literal { pass: pass_ref, uniform: index }, value.value_type()))
        } else {
            None
        };
        let resolved = resolved
            .or_else(|| decl.param.as_deref().and_then(|sid| self.param_source(context, sid)))
            .or_else(|| {
                decl.semantic.map(|semantic| {
                    let id = self.cache.runtime_semantic(semantic, context.view, Some(context.local));
                    (UniformSource::Runtime(id), semantic.value_type())
                })
            });

        let Some((source, found)) = resolved else {
            self.resolver.report(Issue::UnresolvedUniform { symbol: decl.symbol.clone() });
            return None;
        };
        if found != decl.value_type {
            self.resolver.report(Issue::TypeMismatch {
                symbol: decl.symbol.clone(),
                expected: decl.value_type.to_string(),
                found: found.to_string(),
            });
            return None;
        }
        Some(UniformBinding {
            symbol: decl.symbol.clone(),
            value_type: decl.value_type,
            source,
        })
    }

    fn param_source(&mut self, context: &DrawContext<'a>, sid: &str) -> Option<(UniformSource, ValueType)> {
        if let Some(value) = context.material.param(sid) {
            let source = UniformSource::MaterialParam {
                material: context.material_handle,
                sid: sid.to_string(),
            };
            return Some((source, value.value_type()));
        }
        match context.effect.param(sid)?.value {
            ParamValue::Value(value) => {
                let source = UniformSource::EffectParam {
                    effect: context.effect_handle,
                    sid: sid.to_string(),
                };
                Some((source, value.value_type()))
            }
            ParamValue::Semantic(semantic) => {
                let id = self.cache.runtime_semantic(semantic, context.view, Some(context.local));
                Some((UniformSource::Runtime(id), semantic.value_type()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::Vec3;
    use crate::scene::{
        EvaluateScene, FramebufferClear, NodeInstance, PrimitiveType, RuntimeSemantic, ShaderStage,
        Technique, TransformOp, Value, VertexInput, POSITION,
    };

    /// One camera, one triangle geometry with a material bound to `mat`
    fn scene() -> Database {
        let mut db = Database::default();

        let positions = db.add::<SourceBuffer>("positions").unwrap();
        db.edit::<SourceBuffer>(positions)
            .unwrap()
            .set_contents(crate::scene::BufferContents::Float(vec![
                0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0,
            ]));

        let tri = db.add::<Geometry>("tri").unwrap();
        {
            let mut geometry = db.edit::<Geometry>(tri).unwrap();
            geometry.add_input(VertexInput::new(POSITION, "positions", 3));
            geometry.add_primitive_set(PrimitiveSet::new(PrimitiveType::Triangles, 3).with_material_symbol("mat"));
        }
        db.refresh_bounding_box(tri).unwrap();

        let effect = db.add::<Effect>("flat").unwrap();
        db.edit::<Effect>(effect).unwrap().add_technique(
            Technique::new("default").with_pass(
                Pass::new("p0")
                    .with_shader(ShaderStage::Vertex, "void main() {}")
                    .with_attribute("a_position", POSITION)
                    .with_uniform(
                        UniformDecl::new("u_mvp", ValueType::Mat4).with_semantic(RuntimeSemantic::ClipFromObject),
                    )
                    .with_uniform(UniformDecl::new("u_color", ValueType::Vec3).with_param("color")),
            ),
        );
        {
            let mut effect = db.edit::<Effect>(effect).unwrap();
            effect.set_param("color", ParamValue::Value(Value::Vec3(Vec3::new(1.0, 0.0, 0.0))));
        }
        let material = db.add::<Material>("red").unwrap();
        db.edit::<Material>(material).unwrap().set_effect("flat");

        db.add::<Camera>("cam").unwrap();
        let eye = db.add::<Node>("eye").unwrap();
        {
            let mut node = db.edit::<Node>(eye).unwrap();
            node.add_transform(TransformOp::Translate(Vec3::new(0.0, 0.0, 5.0)));
            node.add_instance(NodeInstance::camera("cam"));
        }
        let object = db.add::<Node>("object").unwrap();
        {
            let mut node = db.edit::<Node>(object).unwrap();
            node.add_instance(NodeInstance::Geometry(
                InstanceGeometry::new("tri").with_binding("mat", "red"),
            ));
        }
        let root = db.add::<Node>("root").unwrap();
        {
            let mut node = db.edit::<Node>(root).unwrap();
            node.add_child("eye");
            node.add_child("object");
        }

        let scene = db.add::<VisualScene>("main").unwrap();
        {
            let mut scene = db.edit::<VisualScene>(scene).unwrap();
            scene.add_root("root");
            scene.add_evaluation(EvaluateScene::new("beauty").with_render(
                RenderItem::new("eye").with_clear(FramebufferClear::color_and_depth([0.0, 0.0, 0.0, 1.0], 1.0)),
            ));
        }
        db
    }

    fn names(list: &RenderList) -> Vec<&'static str> {
        list.iter().map(RenderAction::name).collect()
    }

    #[test]
    fn test_emission_order() {
        let db = scene();
        let mut cache = TransformCache::default();
        let mut list = RenderList::new(&PipelineConfig::default());

        assert_eq!(list.build(&db, &mut cache, "main"), Ok(true));
        assert_eq!(
            names(&list),
            vec![
                "SetFramebufferControl",
                "SetLocalCoordSys",
                "SetViewCoordSys",
                "SetPass",
                "SetInputs",
                "SetUniforms",
                "Draw",
            ]
        );
        assert!(list.diagnostics().is_empty(), "{:?}", list.diagnostics().issues());
        assert_eq!(list.last_outcome(), Some(BuildOutcome::Rebuilt));
        assert_eq!(list.scene_id(), Some("main"));

        let RenderAction::SetUniforms(uniforms) = &list[5] else { panic!("expected uniforms") };
        assert_eq!(uniforms.len(), 2);
        assert!(matches!(uniforms[0].source, UniformSource::Runtime(_)));
        assert!(matches!(uniforms[1].source, UniformSource::EffectParam { .. }));

        cache.update(&db, 640, 480);
        assert_eq!(
            uniforms[1].fetch(&db, &cache),
            Some(Value::Vec3(Vec3::new(1.0, 0.0, 0.0)))
        );
        assert!(uniforms[0].fetch(&db, &cache).is_some());
        assert_eq!(list.visible_draws(&cache), 1);
    }

    #[test]
    fn test_second_build_is_unchanged() {
        let db = scene();
        let mut cache = TransformCache::default();
        let mut list = RenderList::new(&PipelineConfig::default());

        assert_eq!(list.build(&db, &mut cache, "main"), Ok(true));
        let first: Vec<_> = list.actions().to_vec();
        assert_eq!(list.build(&db, &mut cache, "main"), Ok(false));
        assert_eq!(list.last_outcome(), Some(BuildOutcome::Unchanged));
        assert_eq!(list.actions(), first.as_slice());
    }

    #[test]
    fn test_value_edit_keeps_list() {
        let mut db = scene();
        let mut cache = TransformCache::default();
        let mut list = RenderList::new(&PipelineConfig::default());
        list.build(&db, &mut cache, "main").unwrap();

        db.edit_by_id::<Node>("object")
            .unwrap()
            .add_transform(TransformOp::Translate(Vec3::new(0.0, 1.0, 0.0)));
        // Adding a transform is structural on the node, which is a dependency
        assert_eq!(list.build(&db, &mut cache, "main"), Ok(true));

        db.edit_by_id::<Node>("object")
            .unwrap()
            .set_transform(0, TransformOp::Translate(Vec3::new(0.0, 2.0, 0.0)));
        assert_eq!(list.build(&db, &mut cache, "main"), Ok(false));
        assert_eq!(list.last_outcome(), Some(BuildOutcome::ValuesChanged));
    }

    #[test]
    fn test_unrelated_structure_edit_keeps_list() {
        let mut db = scene();
        let mut cache = TransformCache::default();
        let mut list = RenderList::new(&PipelineConfig::default());
        list.build(&db, &mut cache, "main").unwrap();

        db.add::<Node>("unrelated").unwrap();
        assert_eq!(list.build(&db, &mut cache, "main"), Ok(false));
        assert_eq!(list.last_outcome(), Some(BuildOutcome::ValuesChanged));
    }

    #[test]
    fn test_purged_cache_forces_rebuild() {
        let db = scene();
        let mut cache = TransformCache::default();
        let mut list = RenderList::new(&PipelineConfig::default());
        list.build(&db, &mut cache, "main").unwrap();

        cache.purge();
        assert_eq!(list.build(&db, &mut cache, "main"), Ok(true));
    }

    #[test]
    fn test_missing_scene() {
        let db = scene();
        let mut cache = TransformCache::default();
        let mut list = RenderList::new(&PipelineConfig::default());
        assert_eq!(
            list.build(&db, &mut cache, "nope"),
            Err(RenderListError::VisualSceneNotFound { id: "nope".to_string() })
        );
        assert!(list.is_empty());
        assert_eq!(list.scene_id(), None);
    }

    #[test]
    fn test_type_mismatch_drops_uniform() {
        let mut db = scene();
        db.edit_by_id::<Effect>("flat")
            .unwrap()
            .set_param("color", ParamValue::Value(Value::Float(0.5)));
        let mut cache = TransformCache::default();
        let mut list = RenderList::new(&PipelineConfig::default());
        list.build(&db, &mut cache, "main").unwrap();

        let RenderAction::SetUniforms(uniforms) = &list[5] else { panic!("expected uniforms") };
        assert_eq!(uniforms.len(), 1);
        assert_eq!(uniforms[0].symbol, "u_mvp");
        assert!(list.diagnostics().iter().any(|issue| matches!(
            issue,
            Issue::TypeMismatch { symbol, .. } if symbol == "u_color"
        )));
    }

    #[test]
    fn test_material_param_overrides_effect() {
        let mut db = scene();
        db.edit_by_id::<Material>("red")
            .unwrap()
            .set_param("color", Value::Vec3(Vec3::new(0.0, 0.0, 1.0)));
        let mut cache = TransformCache::default();
        let mut list = RenderList::new(&PipelineConfig::default());
        list.build(&db, &mut cache, "main").unwrap();

        let RenderAction::SetUniforms(uniforms) = &list[5] else { panic!("expected uniforms") };
        assert!(matches!(uniforms[1].source, UniformSource::MaterialParam { .. }));
        cache.update(&db, 640, 480);
        assert_eq!(uniforms[1].fetch(&db, &cache), Some(Value::Vec3(Vec3::new(0.0, 0.0, 1.0))));
    }

    #[test]
    fn test_unbound_material_skips_draw() {
        let mut db = scene();
        db.edit_by_id::<Geometry>("tri").unwrap().set_material_symbol(0, "other");
        let mut cache = TransformCache::default();
        let mut list = RenderList::new(&PipelineConfig::default());
        list.build(&db, &mut cache, "main").unwrap();

        assert!(list.iter().all(|action| !action.is_draw()));
        assert!(list
            .diagnostics()
            .iter()
            .any(|issue| matches!(issue, Issue::UnboundMaterialSymbol { symbol, .. } if symbol == "other")));
    }

    #[test]
    fn test_missing_camera_instance() {
        let mut db = scene();
        db.edit_by_id::<VisualScene>("main").unwrap().clear_evaluations();
        db.edit_by_id::<VisualScene>("main")
            .unwrap()
            .add_evaluation(EvaluateScene::new("broken").with_render(RenderItem::new("object")));
        let mut cache = TransformCache::default();
        let mut list = RenderList::new(&PipelineConfig::default());
        list.build(&db, &mut cache, "main").unwrap();

        assert!(list.is_empty());
        assert!(list
            .diagnostics()
            .iter()
            .any(|issue| matches!(issue, Issue::MissingInstance { kind: "camera", .. })));
    }

    #[test]
    fn test_culling_disabled_has_no_visibility() {
        let db = scene();
        let mut cache = TransformCache::default();
        let mut list = RenderList::new(&PipelineConfig::default().with_culling(false));
        list.build(&db, &mut cache, "main").unwrap();

        let draw = list.iter().find(|action| action.is_draw()).unwrap();
        assert_eq!(draw.visibility(), None);
    }

    #[test]
    fn test_samplers_beyond_unit_limit_dropped() {
        let mut db = scene();
        for image in ["albedo", "normal", "gloss"] {
            db.add::<Image>(image).unwrap();
        }
        let effect = db.add::<Effect>("textured").unwrap();
        db.edit::<Effect>(effect).unwrap().add_technique(
            Technique::new("default").with_pass(
                Pass::new("lit")
                    .with_attribute("a_position", POSITION)
                    .with_sampler("s_albedo", "albedo")
                    .with_sampler("s_normal", "normal")
                    .with_sampler("s_gloss", "gloss"),
            ),
        );
        db.edit_by_id::<Material>("red").unwrap().set_effect("textured");

        let mut cache = TransformCache::default();
        let mut list = RenderList::new(&PipelineConfig::default().with_max_texture_units(2));
        list.build(&db, &mut cache, "main").unwrap();

        let samplers = list
            .iter()
            .find_map(|action| match action {
                RenderAction::SetSamplers(samplers) => Some(samplers.clone()),
                _ => None,
            })
            .unwrap();
        let units: Vec<_> = samplers.iter().map(|binding| (binding.symbol.as_str(), binding.unit)).collect();
        assert_eq!(units, [("s_albedo", 0), ("s_normal", 1)]);
        assert!(list.diagnostics().iter().any(|issue| matches!(
            issue,
            Issue::SamplerUnitsExhausted { symbol, limit: 2, .. } if symbol == "s_gloss"
        )));
        assert!(list.iter().any(RenderAction::is_draw));
    }

    #[test]
    fn test_clear_resets() {
        let db = scene();
        let mut cache = TransformCache::default();
        let mut list = RenderList::new(&PipelineConfig::default());
        list.build(&db, &mut cache, "main").unwrap();

        list.clear();
        assert!(list.is_empty());
        assert_eq!(list.last_outcome(), None);
        assert_eq!(list.build(&db, &mut cache, "main"), Ok(true));
    }
}
