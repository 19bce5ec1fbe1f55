//! Scene graph nodes
//!
//! A node carries an ordered list of transform operations, child node ids,
//! layer tags and instance records. Instances refer to their targets by id
//! and remember what the id last resolved to, so repeated resolution is a
//! stamp compare instead of a hash lookup.

use std::cell::Cell;

use crate::foundation::collections::{CameraKey, GeometryKey, Handle, Key, LightKey, NodeKey};
use crate::foundation::math::{Mat4, Mat4Ext, Vec3};
use crate::foundation::stamp::{Stamp, Versioned};

use super::library::{impl_entity, Edit, EntityKind};

/// One step of a node's local transform
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TransformOp {
    /// Arbitrary matrix
    Matrix(Mat4),
    /// Translation
    Translate(Vec3),
    /// Rotation of `angle` degrees about `axis`
    Rotate {
        /// Rotation axis
        axis: Vec3,
        /// Angle in degrees
        angle: f32,
    },
    /// Non-uniform scale
    Scale(Vec3),
    /// Place the node at `eye` looking at `target`
    LookAt {
        /// Position
        eye: Vec3,
        /// Point looked at
        target: Vec3,
        /// Up direction
        up: Vec3,
    },
}

impl TransformOp {
    /// Matrix of this operation
    pub fn matrix(&self) -> Mat4 {
        match self {
            Self::Matrix(matrix) => *matrix,
            Self::Translate(offset) => Mat4::new_translation(offset),
            Self::Rotate { axis, angle } => Mat4::rotation_axis(axis, *angle),
            Self::Scale(scale) => Mat4::new_nonuniform_scaling(scale),
            Self::LookAt { eye, target, up } => Mat4::look_at_inverse(eye, target, up),
        }
    }
}

/// Memo of what an instance url last resolved to, tagged with the library
/// structure stamp at the time
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolvedTarget<K: Key> {
    cached: Cell<Option<(Handle<K>, Stamp)>>,
}

impl<K: Key> ResolvedTarget<K> {
    /// Cached handle, if it was resolved at or after `library_structure`
    pub fn get(&self, library_structure: Stamp) -> Option<Handle<K>> {
        match self.cached.get() {
            Some((handle, stamp)) if stamp.as_recent_as(library_structure) => Some(handle),
            _ => None,
        }
    }

    /// Remember a resolution
    pub fn set(&self, handle: Handle<K>, library_structure: Stamp) {
        self.cached.set(Some((handle, library_structure)));
    }

    /// Forget the cached resolution
    pub fn clear(&self) {
        self.cached.set(None);
    }

    /// Whether anything is cached, fresh or not
    pub fn is_set(&self) -> bool {
        self.cached.get().is_some()
    }
}

/// Reference from a node to a camera, light or other node
#[derive(Debug, Clone, PartialEq)]
pub struct Instance<K: Key> {
    url: String,
    resolved: ResolvedTarget<K>,
}

impl<K: Key> Instance<K> {
    /// Instance of the entity with id `url`
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            resolved: ResolvedTarget::default(),
        }
    }

    /// Target id
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Resolution memo
    pub fn resolved(&self) -> &ResolvedTarget<K> {
        &self.resolved
    }
}

/// Binds a primitive set's material symbol to a material id
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaterialBinding {
    /// Material symbol used by primitive sets
    pub symbol: String,
    /// Material id
    pub target: String,
}

/// Geometry instance with its material bindings
#[derive(Debug, Clone, PartialEq)]
pub struct InstanceGeometry {
    url: String,
    bindings: Vec<MaterialBinding>,
    resolved: ResolvedTarget<GeometryKey>,
}

impl InstanceGeometry {
    /// Instance of geometry `url` with no bindings
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            bindings: Vec::new(),
            resolved: ResolvedTarget::default(),
        }
    }

    /// Bind a material symbol
    pub fn with_binding(mut self, symbol: impl Into<String>, target: impl Into<String>) -> Self {
        let symbol = symbol.into();
        self.bindings.retain(|binding| binding.symbol != symbol);
        self.bindings.push(MaterialBinding { symbol, target: target.into() });
        self
    }

    /// Geometry id
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Material bindings
    pub fn bindings(&self) -> &[MaterialBinding] {
        &self.bindings
    }

    /// Material id bound to a symbol
    pub fn material_for(&self, symbol: &str) -> Option<&str> {
        self.bindings
            .iter()
            .find(|binding| binding.symbol == symbol)
            .map(|binding| binding.target.as_str())
    }

    /// Resolution memo
    pub fn resolved(&self) -> &ResolvedTarget<GeometryKey> {
        &self.resolved
    }
}

/// Something a node instances
#[derive(Debug, Clone, PartialEq)]
pub enum NodeInstance {
    /// A geometry
    Geometry(InstanceGeometry),
    /// A camera
    Camera(Instance<CameraKey>),
    /// A light
    Light(Instance<LightKey>),
    /// Another node (and its subtree)
    Node(Instance<NodeKey>),
}

impl NodeInstance {
    /// Instance of a geometry without bindings
    pub fn geometry(url: impl Into<String>) -> Self {
        Self::Geometry(InstanceGeometry::new(url))
    }

    /// Instance of a camera
    pub fn camera(url: impl Into<String>) -> Self {
        Self::Camera(Instance::new(url))
    }

    /// Instance of a light
    pub fn light(url: impl Into<String>) -> Self {
        Self::Light(Instance::new(url))
    }

    /// Instance of a node
    pub fn node(url: impl Into<String>) -> Self {
        Self::Node(Instance::new(url))
    }

    /// Target id
    pub fn url(&self) -> &str {
        match self {
            Self::Geometry(instance) => instance.url(),
            Self::Camera(instance) => instance.url(),
            Self::Light(instance) => instance.url(),
            Self::Node(instance) => instance.url(),
        }
    }
}

/// A scene graph node
#[derive(Debug)]
pub struct Node {
    id: String,
    versions: Versioned,
    layers: Vec<String>,
    transforms: Vec<TransformOp>,
    children: Vec<String>,
    instances: Vec<NodeInstance>,
}

impl Node {
    pub(crate) fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            versions: Versioned::default(),
            layers: Vec::new(),
            transforms: Vec::new(),
            children: Vec::new(),
            instances: Vec::new(),
        }
    }

    /// Layer tags
    pub fn layers(&self) -> &[String] {
        &self.layers
    }

    /// Whether the node carries a layer tag
    pub fn has_layer(&self, layer: &str) -> bool {
        self.layers.iter().any(|tag| tag == layer)
    }

    /// Transform operations in declaration order
    pub fn transforms(&self) -> &[TransformOp] {
        &self.transforms
    }

    /// Parent-from-node matrix: the product of the operations, first on the left
    pub fn local_matrix(&self) -> Mat4 {
        self.transforms
            .iter()
            .fold(Mat4::identity(), |matrix, op| matrix * op.matrix())
    }

    /// Child node ids
    pub fn children(&self) -> &[String] {
        &self.children
    }

    /// All instance records
    pub fn instances(&self) -> &[NodeInstance] {
        &self.instances
    }

    /// Geometry instances
    pub fn instance_geometries(&self) -> impl Iterator<Item = &InstanceGeometry> + '_ {
        self.instances.iter().filter_map(|instance| match instance {
            NodeInstance::Geometry(geometry) => Some(geometry),
            _ => None,
        })
    }

    /// Node instances
    pub fn instance_nodes(&self) -> impl Iterator<Item = &Instance<NodeKey>> + '_ {
        self.instances.iter().filter_map(|instance| match instance {
            NodeInstance::Node(node) => Some(node),
            _ => None,
        })
    }

    /// First camera instance
    pub fn instance_camera(&self) -> Option<&Instance<CameraKey>> {
        self.instances.iter().find_map(|instance| match instance {
            NodeInstance::Camera(camera) => Some(camera),
            _ => None,
        })
    }

    /// First light instance
    pub fn instance_light(&self) -> Option<&Instance<LightKey>> {
        self.instances.iter().find_map(|instance| match instance {
            NodeInstance::Light(light) => Some(light),
            _ => None,
        })
    }

    /// Ids of every node reachable in one step: children first, then
    /// instanced nodes
    pub fn node_edges(&self) -> impl Iterator<Item = &str> + '_ {
        self.children
            .iter()
            .map(String::as_str)
            .chain(self.instance_nodes().map(Instance::url))
    }
}

impl_entity!(Node, NodeKey, EntityKind::Node, nodes);

impl Edit<'_, Node> {
    /// Tag the node with a layer
    pub fn add_layer(&mut self, layer: impl Into<String>) {
        let layer = layer.into();
        if self.has_layer(&layer) {
            return;
        }
        self.entity_mut().layers.push(layer);
        self.touch_structure();
    }

    /// Remove a layer tag
    pub fn remove_layer(&mut self, layer: &str) -> bool {
        let layers = &mut self.entity_mut().layers;
        let before = layers.len();
        layers.retain(|tag| tag != layer);
        let removed = layers.len() != before;
        if removed {
            self.touch_structure();
        }
        removed
    }

    /// Append a transform operation; returns its index
    pub fn add_transform(&mut self, op: TransformOp) -> usize {
        let transforms = &mut self.entity_mut().transforms;
        transforms.push(op);
        let index = transforms.len() - 1;
        self.touch_structure();
        index
    }

    /// Replace a transform operation
    ///
    /// Keeping the operation kind is a value change; changing it is
    /// structural.
    pub fn set_transform(&mut self, index: usize, op: TransformOp) -> bool {
        let Some(existing) = self.entity_mut().transforms.get_mut(index) else {
            return false;
        };
        let structural = std::mem::discriminant(existing) != std::mem::discriminant(&op);
        *existing = op;
        if structural {
            self.touch_structure();
        } else {
            self.touch_value();
        }
        true
    }

    /// Remove a transform operation
    pub fn remove_transform(&mut self, index: usize) -> Option<TransformOp> {
        if index >= self.transforms.len() {
            return None;
        }
        let removed = self.entity_mut().transforms.remove(index);
        self.touch_structure();
        Some(removed)
    }

    /// Append a child node id
    pub fn add_child(&mut self, child: impl Into<String>) {
        self.entity_mut().children.push(child.into());
        self.touch_structure();
    }

    /// Remove a child node id
    pub fn remove_child(&mut self, child: &str) -> bool {
        let children = &mut self.entity_mut().children;
        let Some(index) = children.iter().position(|id| id == child) else {
            return false;
        };
        children.remove(index);
        self.touch_structure();
        true
    }

    /// Append an instance record; returns its index
    pub fn add_instance(&mut self, instance: NodeInstance) -> usize {
        let instances = &mut self.entity_mut().instances;
        instances.push(instance);
        let index = instances.len() - 1;
        self.touch_structure();
        index
    }

    /// Remove an instance record
    pub fn remove_instance(&mut self, index: usize) -> Option<NodeInstance> {
        if index >= self.instances.len() {
            return None;
        }
        let removed = self.entity_mut().instances.remove(index);
        self.touch_structure();
        Some(removed)
    }

    /// Bind a material symbol on a geometry instance
    pub fn bind_material(&mut self, instance: usize, symbol: impl Into<String>, target: impl Into<String>) -> bool {
        let Some(NodeInstance::Geometry(geometry)) = self.entity_mut().instances.get_mut(instance) else {
            return false;
        };
        let symbol = symbol.into();
        geometry.bindings.retain(|binding| binding.symbol != symbol);
        geometry.bindings.push(MaterialBinding { symbol, target: target.into() });
        self.touch_structure();
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use crate::foundation::math::utils;
    use crate::scene::Database;

    #[test]
    fn test_local_matrix_applies_first_op_leftmost() {
        let mut db = Database::default();
        let handle = db.add::<Node>("n").unwrap();
        {
            let mut node = db.edit::<Node>(handle).unwrap();
            node.add_transform(TransformOp::Translate(Vec3::new(10.0, 0.0, 0.0)));
            node.add_transform(TransformOp::Rotate { axis: Vec3::z(), angle: 90.0 });
            node.add_transform(TransformOp::Scale(Vec3::new(2.0, 2.0, 2.0)));
        }
        let node = db.get::<Node>(handle).unwrap();

        // Scale, then rotate, then translate the point
        let p = utils::transform_homogeneous(&node.local_matrix(), &Vec3::new(1.0, 0.0, 0.0));
        assert_relative_eq!(p.x, 10.0, epsilon = 1e-5);
        assert_relative_eq!(p.y, 2.0, epsilon = 1e-5);
        assert_relative_eq!(p.z, 0.0, epsilon = 1e-5);
    }

    #[test]
    fn test_transform_value_vs_structure() {
        let mut db = Database::default();
        let handle = db.add::<Node>("n").unwrap();
        db.edit::<Node>(handle).unwrap().add_transform(TransformOp::Translate(Vec3::zeros()));
        let structure = db.versions().structure_changed();

        assert!(db.edit::<Node>(handle).unwrap().set_transform(0, TransformOp::Translate(Vec3::x())));
        assert_eq!(db.versions().structure_changed(), structure);

        assert!(db.edit::<Node>(handle).unwrap().set_transform(0, TransformOp::Scale(Vec3::x())));
        assert!(db.versions().structure_changed() > structure);
    }

    #[test]
    fn test_node_edges_children_before_instances() {
        let mut db = Database::default();
        let handle = db.add::<Node>("n").unwrap();
        {
            let mut node = db.edit::<Node>(handle).unwrap();
            node.add_instance(NodeInstance::node("shared"));
            node.add_child("a");
            node.add_instance(NodeInstance::geometry("mesh"));
            node.add_child("b");
        }
        let node = db.get::<Node>(handle).unwrap();
        assert_eq!(node.node_edges().collect::<Vec<_>>(), vec!["a", "b", "shared"]);
        assert_eq!(node.instance_geometries().count(), 1);
    }

    #[test]
    fn test_bind_material_replaces_symbol() {
        let mut db = Database::default();
        let handle = db.add::<Node>("n").unwrap();
        {
            let mut node = db.edit::<Node>(handle).unwrap();
            let index = node.add_instance(NodeInstance::Geometry(InstanceGeometry::new("mesh").with_binding("body", "red")));
            assert!(node.bind_material(index, "body", "blue"));
            assert!(!node.bind_material(index + 1, "body", "green"));
        }
        let node = db.get::<Node>(handle).unwrap();
        let geometry = node.instance_geometries().next().unwrap();
        assert_eq!(geometry.bindings().len(), 1);
        assert_eq!(geometry.material_for("body"), Some("blue"));
    }
}
