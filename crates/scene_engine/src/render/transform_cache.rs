//! Lazily updated transforms and runtime values
//!
//! The cache owns every matrix a render list needs: one entry per local
//! coordinate system (node path), one per view coordinate system (camera
//! path, camera, lights), and one per runtime semantic or bounding-box test
//! used by a draw. Entries remember the newest source stamp they were
//! computed from. [`TransformCache::update`] walks the entries in dependency
//! order and recomputes exactly those whose sources moved past that stamp,
//! so a frame in which nothing relevant changed does no matrix work at all.

use std::collections::HashMap;

use crate::core::config::CacheConfig;
use crate::foundation::collections::{GeometryKey, Handle, NodeKey};
use crate::foundation::math::{utils, Mat4, Vec2, Vec3, Vec4};
use crate::foundation::stamp::Stamp;
use crate::scene::{
    Aabb, Camera, ClipPlanes, Database, Entity, Geometry, Light, LightKind, Node, NodePath,
    RuntimeSemantic, Value,
};

use super::coord_sys::{LocalId, ValueId, ViewCoordSys, ViewId};

/// What a cached value is derived from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheKey {
    /// A runtime semantic for a view, and for object-dependent semantics a
    /// local coordinate system
    Semantic {
        /// Semantic
        semantic: RuntimeSemantic,
        /// View coordinate system
        view: ViewId,
        /// Local coordinate system
        local: Option<LocalId>,
    },
    /// Bounding-box visibility of a geometry placed by `local` seen from `view`
    BoundingBox {
        /// View coordinate system
        view: ViewId,
        /// Local coordinate system
        local: LocalId,
        /// Geometry whose box is tested
        geometry: Handle<GeometryKey>,
    },
}

/// Recomputation counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Calls to [`TransformCache::update`]
    pub updates: u64,
    /// Local coordinate systems recomputed
    pub locals_computed: u64,
    /// View coordinate systems recomputed
    pub views_computed: u64,
    /// Runtime semantics recomputed
    pub semantics_computed: u64,
    /// Bounding-box tests recomputed
    pub bounds_computed: u64,
}

impl CacheStats {
    /// Total entries recomputed
    pub fn total_computed(&self) -> u64 {
        self.locals_computed + self.views_computed + self.semantics_computed + self.bounds_computed
    }
}

/// Cached transform of a node path
#[derive(Debug, Clone)]
pub struct LocalEntry {
    path: NodePath,
    world_from_object: Mat4,
    object_from_world: Mat4,
    stamp: Stamp,
}

impl LocalEntry {
    /// Node path
    pub fn path(&self) -> &NodePath {
        &self.path
    }

    /// Object-to-world matrix (product of the path's local matrices, root first)
    pub fn world_from_object(&self) -> &Mat4 {
        &self.world_from_object
    }

    /// World-to-object matrix
    pub fn object_from_world(&self) -> &Mat4 {
        &self.object_from_world
    }

    /// Newest source stamp this entry reflects
    pub fn stamp(&self) -> Stamp {
        self.stamp
    }
}

#[derive(Debug, Clone)]
struct LightFrame {
    kind: LightKind,
    color: Vec3,
    world_from_light: Mat4,
    light_from_world: Mat4,
}

impl Default for LightFrame {
    fn default() -> Self {
        Self {
            kind: LightKind::Ambient,
            color: Vec3::zeros(),
            world_from_light: Mat4::identity(),
            light_from_world: Mat4::identity(),
        }
    }
}

/// Cached camera and light transforms of a view
#[derive(Debug, Clone)]
pub struct ViewEntry {
    coord_sys: ViewCoordSys,
    world_from_eye: Mat4,
    eye_from_world: Mat4,
    clip_from_eye: Mat4,
    eye_from_clip: Mat4,
    near: f32,
    far: f32,
    lights: Vec<LightFrame>,
    // A bounding-box test was registered since the last update
    refit: bool,
    stamp: Stamp,
}

impl ViewEntry {
    /// Descriptor this entry was registered with
    pub fn coord_sys(&self) -> &ViewCoordSys {
        &self.coord_sys
    }

    /// Camera-to-world matrix
    pub fn world_from_eye(&self) -> &Mat4 {
        &self.world_from_eye
    }

    /// View matrix
    pub fn eye_from_world(&self) -> &Mat4 {
        &self.eye_from_world
    }

    /// Projection matrix
    pub fn clip_from_eye(&self) -> &Mat4 {
        &self.clip_from_eye
    }

    /// Inverse projection
    pub fn eye_from_clip(&self) -> &Mat4 {
        &self.eye_from_clip
    }

    /// Near and far plane used for the projection
    pub fn depth_range(&self) -> (f32, f32) {
        (self.near, self.far)
    }

    /// Newest source stamp this entry reflects
    pub fn stamp(&self) -> Stamp {
        self.stamp
    }
}

#[derive(Debug, Clone)]
struct ValueEntry {
    key: CacheKey,
    value: Value,
    stamp: Stamp,
}

/// Memo of transforms and runtime semantic values
#[derive(Debug)]
pub struct TransformCache {
    config: CacheConfig,
    generation: u32,
    locals: Vec<LocalEntry>,
    local_ids: HashMap<NodePath, usize>,
    views: Vec<ViewEntry>,
    view_ids: HashMap<ViewCoordSys, usize>,
    values: Vec<ValueEntry>,
    value_ids: HashMap<CacheKey, usize>,
    viewport: (u32, u32),
    viewport_stamp: Stamp,
    stats: CacheStats,
}

impl TransformCache {
    /// Create an empty cache
    pub fn new(config: CacheConfig) -> Self {
        let viewport = config.default_viewport;
        Self {
            config,
            generation: 0,
            locals: Vec::new(),
            local_ids: HashMap::new(),
            views: Vec::new(),
            view_ids: HashMap::new(),
            values: Vec::new(),
            value_ids: HashMap::new(),
            viewport,
            viewport_stamp: Stamp::INVALID,
            stats: CacheStats::default(),
        }
    }

    /// Generation, bumped by every purge
    pub fn generation(&self) -> u32 {
        self.generation
    }

    /// Recomputation counters
    pub fn stats(&self) -> CacheStats {
        self.stats
    }

    /// Viewport used by the last update
    pub fn viewport(&self) -> (u32, u32) {
        self.viewport
    }

    /// Number of registered entries (locals, views, values)
    pub fn len(&self) -> usize {
        self.locals.len() + self.views.len() + self.values.len()
    }

    /// Whether nothing is registered
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every entry; ids issued before are stale afterwards
    pub fn purge(&mut self) {
        log::debug!(
            "Purging transform cache generation {} ({} entries)",
            self.generation,
            self.len()
        );
        self.locals.clear();
        self.local_ids.clear();
        self.views.clear();
        self.view_ids.clear();
        self.values.clear();
        self.value_ids.clear();
        self.generation = self.generation.wrapping_add(1);
    }

    /// Register a node path
    pub fn local_coord_sys(&mut self, path: NodePath) -> LocalId {
        if let Some(&index) = self.local_ids.get(&path) {
            return LocalId::new(self.generation, index);
        }
        let index = self.locals.len();
        self.local_ids.insert(path.clone(), index);
        self.locals.push(LocalEntry {
            path,
            world_from_object: Mat4::identity(),
            object_from_world: Mat4::identity(),
            stamp: Stamp::INVALID,
        });
        LocalId::new(self.generation, index)
    }

    /// Register a camera placement and light set
    pub fn view_coord_sys(&mut self, coord_sys: ViewCoordSys) -> ViewId {
        if let Some(&index) = self.view_ids.get(&coord_sys) {
            return ViewId::new(self.generation, index);
        }
        let index = self.views.len();
        self.view_ids.insert(coord_sys.clone(), index);
        self.views.push(ViewEntry {
            coord_sys,
            world_from_eye: Mat4::identity(),
            eye_from_world: Mat4::identity(),
            clip_from_eye: Mat4::identity(),
            eye_from_clip: Mat4::identity(),
            near: 0.0,
            far: 0.0,
            lights: Vec::new(),
            refit: false,
            stamp: Stamp::INVALID,
        });
        ViewId::new(self.generation, index)
    }

    /// Register a runtime semantic
    ///
    /// `local` is ignored for semantics that do not depend on the object.
    pub fn runtime_semantic(&mut self, semantic: RuntimeSemantic, view: ViewId, local: Option<LocalId>) -> ValueId {
        let local = if semantic.depends_on_object() { local } else { None };
        self.value_id(CacheKey::Semantic { semantic, view, local }, Value::default_for(semantic.value_type()))
    }

    /// Register a bounding-box visibility test
    pub fn check_bounding_box(&mut self, view: ViewId, local: LocalId, geometry: Handle<GeometryKey>) -> ValueId {
        let key = CacheKey::BoundingBox { view, local, geometry };
        if !self.value_ids.contains_key(&key) {
            if let Some(entry) = self.views.get_mut(view.index()) {
                entry.refit = true;
            }
        }
        self.value_id(key, Value::Bool(true))
    }

    fn value_id(&mut self, key: CacheKey, initial: Value) -> ValueId {
        if let Some(&index) = self.value_ids.get(&key) {
            return ValueId::new(self.generation, index);
        }
        let index = self.values.len();
        self.value_ids.insert(key, index);
        self.values.push(ValueEntry { key, value: initial, stamp: Stamp::INVALID });
        ValueId::new(self.generation, index)
    }

    /// Local coordinate system entry
    pub fn local(&self, id: LocalId) -> Option<&LocalEntry> {
        self.check_generation(id.generation(), "local coordinate system")?;
        self.locals.get(id.index())
    }

    /// View coordinate system entry
    pub fn view(&self, id: ViewId) -> Option<&ViewEntry> {
        self.check_generation(id.generation(), "view coordinate system")?;
        self.views.get(id.index())
    }

    /// Current value, or `None` if the id is stale or the value has never
    /// been computed
    pub fn value(&self, id: ValueId) -> Option<&Value> {
        self.check_generation(id.generation(), "value")?;
        let entry = self.values.get(id.index())?;
        entry.stamp.is_valid().then_some(&entry.value)
    }

    /// Whether a draw with this visibility value should be issued
    pub fn is_visible(&self, visibility: Option<ValueId>) -> bool {
        visibility
            .and_then(|id| self.value(id))
            .and_then(Value::as_bool)
            .unwrap_or(true)
    }

    fn check_generation(&self, generation: u32, what: &str) -> Option<()> {
        if generation == self.generation {
            Some(())
        } else {
            log::error!(
                "Stale {} id from cache generation {} (current generation {})",
                what,
                generation,
                self.generation
            );
            None
        }
    }

    /// Bring every entry up to date
    ///
    /// Locals first, then views (which may fit their clip planes to the
    /// bounds of what they see), then runtime semantics and bounding-box
    /// tests. An entry is recomputed iff it was never computed or one of its
    /// sources is newer than its stamp.
    pub fn update(&mut self, database: &Database, width: u32, height: u32) {
        self.stats.updates += 1;

        let viewport = if width == 0 || height == 0 {
            log::warn!(
                "Empty viewport {}x{}, using {:?}",
                width,
                height,
                self.config.default_viewport
            );
            self.config.default_viewport
        } else {
            (width, height)
        };
        if viewport != self.viewport || !self.viewport_stamp.is_valid() {
            self.viewport = viewport;
            self.viewport_stamp.touch(database.clock());
        }

        self.update_locals(database);
        self.update_views(database);
        self.update_values(database);
    }

    fn update_locals(&mut self, database: &Database) {
        for entry in &mut self.locals {
            let source = path_stamp(database, &entry.path);
            if entry.stamp.is_valid() && entry.stamp.as_recent_as(source) {
                continue;
            }
            entry.world_from_object = path_matrix(database, &entry.path);
            entry.object_from_world = utils::inverse_or_identity(&entry.world_from_object);
            entry.stamp.move_forward(source);
            self.stats.locals_computed += 1;
            log::trace!("Recomputed local coordinate system of {} nodes", entry.path.len());
        }
    }

    fn update_views(&mut self, database: &Database) {
        let aspect = self.viewport.0 as f32 / self.viewport.1 as f32;

        for view_index in 0..self.views.len() {
            let refit = std::mem::take(&mut self.views[view_index].refit);
            let entry = &self.views[view_index];
            let coord_sys = &entry.coord_sys;
            let camera = database.get::<Camera>(coord_sys.camera);

            let mut source = self.viewport_stamp;
            source.move_forward(path_stamp(database, &coord_sys.camera_path));
            source.move_forward(camera.map_or(Stamp::INVALID, |camera| camera.versions().value_changed()));
            for binding in &coord_sys.lights {
                source.move_forward(path_stamp(database, &binding.path));
                source.move_forward(
                    database
                        .get::<Light>(binding.light)
                        .map_or(Stamp::INVALID, |light| light.versions().value_changed()),
                );
            }
            let fit_to_scene = matches!(
                camera.map(Camera::clip_planes),
                Some(ClipPlanes::FitToScene { .. })
            );
            let fitted = if fit_to_scene {
                if refit {
                    let mut fresh = Stamp::INVALID;
                    source.move_forward(fresh.touch(database.clock()));
                }
                self.bounds_seen_by(database, view_index, &mut source)
            } else {
                Vec::new()
            };

            if entry.stamp.is_valid() && entry.stamp.as_recent_as(source) {
                continue;
            }

            let world_from_eye = path_matrix(database, &coord_sys.camera_path);
            let eye_from_world = utils::inverse_or_identity(&world_from_eye);

            let (near, far) = match camera.map(Camera::clip_planes) {
                Some(ClipPlanes::Fixed { near, far }) => (*near, *far),
                Some(ClipPlanes::FitToScene { fallback_near, fallback_far }) => {
                    self.fit_depth_range(&eye_from_world, &fitted)
                        .unwrap_or((*fallback_near, *fallback_far))
                }
                None => {
                    log::warn!("View camera is gone; using the default clip planes");
                    match ClipPlanes::default() {
                        ClipPlanes::Fixed { near, far } => (near, far),
                        ClipPlanes::FitToScene { fallback_near, fallback_far } => (fallback_near, fallback_far),
                    }
                }
            };
            let clip_from_eye = camera
                .map_or_else(Mat4::identity, |camera| camera.projection().matrix(aspect, near, far));
            let eye_from_clip = utils::inverse_or_identity(&clip_from_eye);

            let lights = coord_sys
                .lights
                .iter()
                .map(|binding| {
                    let Some(light) = database.get::<Light>(binding.light) else {
                        return LightFrame::default();
                    };
                    let world_from_light = path_matrix(database, &binding.path);
                    LightFrame {
                        kind: light.kind(),
                        color: light.color(),
                        light_from_world: utils::inverse_or_identity(&world_from_light),
                        world_from_light,
                    }
                })
                .collect();

            let entry = &mut self.views[view_index];
            entry.world_from_eye = world_from_eye;
            entry.eye_from_world = eye_from_world;
            entry.clip_from_eye = clip_from_eye;
            entry.eye_from_clip = eye_from_clip;
            entry.near = near;
            entry.far = far;
            entry.lights = lights;
            entry.stamp.move_forward(source);
            self.stats.views_computed += 1;
            log::trace!("Recomputed view coordinate system #{} (near {}, far {})", view_index, near, far);
        }
    }

    /// World-space boxes of every geometry tested against a view, folding
    /// their source stamps into `source`
    fn bounds_seen_by(&self, database: &Database, view_index: usize, source: &mut Stamp) -> Vec<Aabb> {
        let mut boxes = Vec::new();
        for entry in &self.values {
            let CacheKey::BoundingBox { view, local, geometry } = entry.key else {
                continue;
            };
            if view.index() != view_index {
                continue;
            }
            let (Some(local), Some(geometry)) = (self.locals.get(local.index()), database.get::<Geometry>(geometry)) else {
                continue;
            };
            source.move_forward(local.stamp);
            source.move_forward(geometry.versions().value_changed());
            if let Some(bounds) = geometry.bounding_box() {
                boxes.push(bounds.transformed(&local.world_from_object));
            }
        }
        boxes
    }

    /// Near and far planes enclosing `boxes` (world space) in front of the eye
    fn fit_depth_range(&self, eye_from_world: &Mat4, boxes: &[Aabb]) -> Option<(f32, f32)> {
        let scene = boxes
            .iter()
            .map(|bounds| bounds.transformed(eye_from_world))
            .reduce(|a, b| a.union(&b))?;

        // Eye space looks down -Z
        let radius = scene.radius().max(f32::EPSILON);
        let min_near = self.config.near_plane_epsilon * radius;
        let far = -scene.min.z;
        if far <= 0.0 {
            return None;
        }
        let near = (-scene.max.z).max(min_near);
        let far = far.max(near + min_near);
        Some((near, far))
    }

    fn update_values(&mut self, database: &Database) {
        let viewport = Vec2::new(self.viewport.0 as f32, self.viewport.1 as f32);

        for entry in &mut self.values {
            match entry.key {
                CacheKey::Semantic { semantic, view, local } => {
                    let Some(view) = self.views.get(view.index()) else { continue };
                    let local = local.and_then(|local| self.locals.get(local.index()));

                    let mut source = view.stamp;
                    if let Some(local) = local {
                        source.move_forward(local.stamp);
                    }
                    if entry.stamp.is_valid() && entry.stamp.as_recent_as(source) {
                        continue;
                    }

                    entry.value = semantic_value(semantic, view, local, viewport);
                    entry.stamp.move_forward(source);
                    self.stats.semantics_computed += 1;
                }
                CacheKey::BoundingBox { view, local, geometry } => {
                    let (Some(view), Some(local)) = (self.views.get(view.index()), self.locals.get(local.index())) else {
                        continue;
                    };
                    let geometry = database.get::<Geometry>(geometry);

                    let mut source = view.stamp;
                    source.move_forward(local.stamp);
                    source.move_forward(geometry.map_or(Stamp::INVALID, |geometry| geometry.versions().value_changed()));
                    if entry.stamp.is_valid() && entry.stamp.as_recent_as(source) {
                        continue;
                    }

                    let visible = match geometry.and_then(Geometry::bounding_box) {
                        Some(bounds) => {
                            let clip_from_object = view.clip_from_eye * view.eye_from_world * local.world_from_object;
                            bounds.in_clip_volume(&clip_from_object)
                        }
                        // Nothing to test against, so never cull
                        None => true,
                    };
                    entry.value = Value::Bool(visible);
                    entry.stamp.move_forward(source);
                    self.stats.bounds_computed += 1;
                }
            }
        }
    }
}

impl Default for TransformCache {
    fn default() -> Self {
        Self::new(CacheConfig::default())
    }
}

/// Newest value stamp along a node path
fn path_stamp(database: &Database, path: &NodePath) -> Stamp {
    let mut stamp = Stamp::INVALID;
    for &node in path.nodes() {
        if let Some(node) = database.get::<Node>(node) {
            stamp.move_forward(node.versions().value_changed());
        }
    }
    stamp
}

/// Product of the local matrices along a path, root first
fn path_matrix(database: &Database, path: &NodePath) -> Mat4 {
    path.nodes().iter().fold(Mat4::identity(), |matrix, &handle: &Handle<NodeKey>| {
        match database.get::<Node>(handle) {
            Some(node) => matrix * node.local_matrix(),
            None => {
                log::warn!("Node on a cached path is gone; treating it as identity");
                matrix
            }
        }
    })
}

fn semantic_value(semantic: RuntimeSemantic, view: &ViewEntry, local: Option<&LocalEntry>, viewport: Vec2) -> Value {
    let identity = Mat4::identity();
    let world_from_object = local.map_or(&identity, |local| &local.world_from_object);
    let object_from_world = local.map_or(&identity, |local| &local.object_from_world);
    let eye_from_object = || view.eye_from_world * world_from_object;
    let light = |index: u8| view.lights.get(usize::from(index));

    match semantic {
        RuntimeSemantic::WorldFromObject => Value::Mat4(*world_from_object),
        RuntimeSemantic::ObjectFromWorld => Value::Mat4(*object_from_world),
        RuntimeSemantic::EyeFromWorld => Value::Mat4(view.eye_from_world),
        RuntimeSemantic::WorldFromEye => Value::Mat4(view.world_from_eye),
        RuntimeSemantic::ClipFromEye => Value::Mat4(view.clip_from_eye),
        RuntimeSemantic::EyeFromClip => Value::Mat4(view.eye_from_clip),
        RuntimeSemantic::EyeFromObject => Value::Mat4(eye_from_object()),
        RuntimeSemantic::ObjectFromEye => Value::Mat4(object_from_world * view.world_from_eye),
        RuntimeSemantic::ClipFromObject => Value::Mat4(view.clip_from_eye * eye_from_object()),
        RuntimeSemantic::ObjectFromClip => {
            Value::Mat4(object_from_world * view.world_from_eye * view.eye_from_clip)
        }
        RuntimeSemantic::ClipFromWorld => Value::Mat4(view.clip_from_eye * view.eye_from_world),
        RuntimeSemantic::NormalMatrix => Value::Mat3(utils::normal_matrix(&eye_from_object())),
        RuntimeSemantic::FramebufferSize => Value::Vec2(viewport),
        RuntimeSemantic::LightPositionEye(index) => Value::Vec4(light(index).map_or_else(Vec4::zeros, |light| {
            match light.kind {
                // Directional lights sit at infinity along +Z of their node
                LightKind::Directional => view.eye_from_world * light.world_from_light * Vec4::new(0.0, 0.0, 1.0, 0.0),
                LightKind::Point | LightKind::Spot => {
                    view.eye_from_world * light.world_from_light * Vec4::new(0.0, 0.0, 0.0, 1.0)
                }
                LightKind::Ambient => Vec4::zeros(),
            }
        })),
        RuntimeSemantic::LightDirectionEye(index) => Value::Vec3(light(index).map_or_else(Vec3::zeros, |light| {
            let direction = view.eye_from_world * light.world_from_light * Vec4::new(0.0, 0.0, -1.0, 0.0);
            let direction = Vec3::new(direction.x, direction.y, direction.z);
            direction.try_normalize(f32::EPSILON).unwrap_or(direction)
        })),
        RuntimeSemantic::LightColor(index) => Value::Vec3(light(index).map_or_else(Vec3::zeros, |light| light.color)),
        RuntimeSemantic::LightEyeFromObject(index) => Value::Mat4(
            light(index).map_or(identity, |light| light.light_from_world * world_from_object),
        ),
    }
}
