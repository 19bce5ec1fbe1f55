//! Geometry: vertex inputs and primitive sets
//!
//! A geometry names the source buffers that feed each vertex semantic and
//! groups its primitives into sets. Every primitive set carries a material
//! symbol that a node's geometry instance binds to a concrete material.

use crate::foundation::collections::GeometryKey;
use crate::foundation::stamp::Versioned;

use super::bounds::Aabb;
use super::library::{impl_entity, Edit, EntityKind};

/// Vertex semantic of positions; also used for bounding boxes
pub const POSITION: &str = "POSITION";
/// Vertex semantic of normals
pub const NORMAL: &str = "NORMAL";
/// Vertex semantic of texture coordinates
pub const TEXCOORD: &str = "TEXCOORD";

/// Primitive topology of a primitive set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveType {
    /// Independent points
    Points,
    /// Independent line segments
    Lines,
    /// Connected line strip
    LineStrip,
    /// Independent triangles
    Triangles,
    /// Triangle strip
    TriangleStrip,
    /// Triangle fan
    TriangleFan,
    /// Independent quads
    Quads,
}

/// One vertex attribute stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VertexInput {
    /// Vertex semantic (`POSITION`, `NORMAL`, ...)
    pub semantic: String,
    /// Id of the source buffer holding the data
    pub source: String,
    /// Scalars per vertex
    pub components: u32,
    /// First scalar in the buffer
    pub offset: u32,
    /// Scalars between consecutive vertices (0 means tightly packed)
    pub stride: u32,
}

impl VertexInput {
    /// Tightly packed input starting at the beginning of the buffer
    pub fn new(semantic: impl Into<String>, source: impl Into<String>, components: u32) -> Self {
        Self {
            semantic: semantic.into(),
            source: source.into(),
            components,
            offset: 0,
            stride: 0,
        }
    }

    /// Set offset and stride (in scalars)
    pub fn with_layout(mut self, offset: u32, stride: u32) -> Self {
        self.offset = offset;
        self.stride = stride;
        self
    }

    /// Effective stride in scalars
    pub fn effective_stride(&self) -> u32 {
        if self.stride == 0 {
            self.components
        } else {
            self.stride
        }
    }
}

/// A run of primitives drawn with one material
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrimitiveSet {
    primitive_type: PrimitiveType,
    vertex_count: u32,
    index_buffer: Option<String>,
    index_offset: u32,
    material_symbol: String,
}

impl PrimitiveSet {
    /// Non-indexed set of `vertex_count` vertices with no material symbol
    pub fn new(primitive_type: PrimitiveType, vertex_count: u32) -> Self {
        Self {
            primitive_type,
            vertex_count,
            index_buffer: None,
            index_offset: 0,
            material_symbol: String::new(),
        }
    }

    /// Set the material symbol
    pub fn with_material_symbol(mut self, symbol: impl Into<String>) -> Self {
        self.material_symbol = symbol.into();
        self
    }

    /// Draw through an index buffer starting at `offset`
    pub fn with_indices(mut self, buffer: impl Into<String>, offset: u32) -> Self {
        self.index_buffer = Some(buffer.into());
        self.index_offset = offset;
        self
    }

    /// Primitive topology
    pub fn primitive_type(&self) -> PrimitiveType {
        self.primitive_type
    }

    /// Number of vertices (or indices) to draw
    pub fn vertex_count(&self) -> u32 {
        self.vertex_count
    }

    /// Index buffer id, if indexed
    pub fn index_buffer(&self) -> Option<&str> {
        self.index_buffer.as_deref()
    }

    /// First index used
    pub fn index_offset(&self) -> u32 {
        self.index_offset
    }

    /// Material symbol bound by geometry instances
    pub fn material_symbol(&self) -> &str {
        &self.material_symbol
    }
}

/// Mesh geometry
#[derive(Debug)]
pub struct Geometry {
    id: String,
    versions: Versioned,
    inputs: Vec<VertexInput>,
    primitive_sets: Vec<PrimitiveSet>,
    bounding_box: Option<Aabb>,
}

impl Geometry {
    pub(crate) fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            versions: Versioned::default(),
            inputs: Vec::new(),
            primitive_sets: Vec::new(),
            bounding_box: None,
        }
    }

    /// All vertex inputs
    pub fn inputs(&self) -> &[VertexInput] {
        &self.inputs
    }

    /// Input feeding a vertex semantic
    pub fn input(&self, semantic: &str) -> Option<&VertexInput> {
        self.inputs.iter().find(|input| input.semantic == semantic)
    }

    /// All primitive sets
    pub fn primitive_sets(&self) -> &[PrimitiveSet] {
        &self.primitive_sets
    }

    /// Object-space bounding box, if known
    pub fn bounding_box(&self) -> Option<Aabb> {
        self.bounding_box
    }
}

impl_entity!(Geometry, GeometryKey, EntityKind::Geometry, geometries);

impl Edit<'_, Geometry> {
    /// Add a vertex input, replacing any input with the same semantic
    pub fn add_input(&mut self, input: VertexInput) {
        let inputs = &mut self.entity_mut().inputs;
        match inputs.iter_mut().find(|existing| existing.semantic == input.semantic) {
            Some(existing) => *existing = input,
            None => inputs.push(input),
        }
        self.touch_structure();
    }

    /// Remove the input feeding `semantic`
    pub fn remove_input(&mut self, semantic: &str) -> Option<VertexInput> {
        let inputs = &mut self.entity_mut().inputs;
        let index = inputs.iter().position(|input| input.semantic == semantic)?;
        let removed = inputs.remove(index);
        self.touch_structure();
        Some(removed)
    }

    /// Append a primitive set; returns its index
    pub fn add_primitive_set(&mut self, set: PrimitiveSet) -> usize {
        let sets = &mut self.entity_mut().primitive_sets;
        sets.push(set);
        let index = sets.len() - 1;
        self.touch_structure();
        index
    }

    /// Remove a primitive set
    pub fn remove_primitive_set(&mut self, index: usize) -> Option<PrimitiveSet> {
        if index >= self.primitive_sets.len() {
            return None;
        }
        let removed = self.entity_mut().primitive_sets.remove(index);
        self.touch_structure();
        Some(removed)
    }

    /// Change how many vertices a set draws
    ///
    /// Draw actions carry the count, so this is a structure edit.
    pub fn set_vertex_count(&mut self, index: usize, count: u32) -> bool {
        let Some(set) = self.entity_mut().primitive_sets.get_mut(index) else {
            return false;
        };
        set.vertex_count = count;
        self.touch_structure();
        true
    }

    /// Change the material symbol of a set
    pub fn set_material_symbol(&mut self, index: usize, symbol: impl Into<String>) -> bool {
        let Some(set) = self.entity_mut().primitive_sets.get_mut(index) else {
            return false;
        };
        set.material_symbol = symbol.into();
        self.touch_structure();
        true
    }

    /// Change or drop the index buffer of a set
    pub fn set_index_buffer(&mut self, index: usize, buffer: Option<(String, u32)>) -> bool {
        let Some(set) = self.entity_mut().primitive_sets.get_mut(index) else {
            return false;
        };
        match buffer {
            Some((id, offset)) => {
                set.index_buffer = Some(id);
                set.index_offset = offset;
            }
            None => {
                set.index_buffer = None;
                set.index_offset = 0;
            }
        }
        self.touch_structure();
        true
    }

    /// Change the topology of a set
    pub fn set_primitive_type(&mut self, index: usize, primitive_type: PrimitiveType) -> bool {
        let Some(set) = self.entity_mut().primitive_sets.get_mut(index) else {
            return false;
        };
        set.primitive_type = primitive_type;
        self.touch_structure();
        true
    }

    /// Store an object-space bounding box
    pub fn set_bounding_box(&mut self, bounds: Option<Aabb>) {
        self.entity_mut().bounding_box = bounds;
        self.touch_value();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::Database;

    #[test]
    fn test_primitive_set_roundtrip() {
        let mut db = Database::default();
        let handle = db.add::<Geometry>("teapot").unwrap();
        {
            let mut geometry = db.edit::<Geometry>(handle).unwrap();
            geometry.add_primitive_set(
                PrimitiveSet::new(PrimitiveType::Triangles, 3072)
                    .with_material_symbol("body")
                    .with_indices("teapot-indices", 12),
            );
            geometry.add_primitive_set(PrimitiveSet::new(PrimitiveType::LineStrip, 7));
        }

        let geometry = db.get::<Geometry>(handle).unwrap();
        let first = &geometry.primitive_sets()[0];
        assert_eq!(first.primitive_type(), PrimitiveType::Triangles);
        assert_eq!(first.vertex_count(), 3072);
        assert_eq!(first.material_symbol(), "body");
        assert_eq!(first.index_buffer(), Some("teapot-indices"));
        assert_eq!(first.index_offset(), 12);

        let second = &geometry.primitive_sets()[1];
        assert_eq!(second.vertex_count(), 7);
        assert_eq!(second.material_symbol(), "");
        assert_eq!(second.index_buffer(), None);
    }

    #[test]
    fn test_setters_pick_the_right_stamp() {
        let mut db = Database::default();
        let handle = db.add::<Geometry>("quad").unwrap();
        db.edit::<Geometry>(handle)
            .unwrap()
            .add_primitive_set(PrimitiveSet::new(PrimitiveType::TriangleStrip, 4));
        let structure = db.versions().structure_changed();

        db.edit::<Geometry>(handle).unwrap().set_bounding_box(None);
        assert_eq!(db.versions().structure_changed(), structure);

        assert!(db.edit::<Geometry>(handle).unwrap().set_vertex_count(0, 6));
        assert!(db.versions().structure_changed() > structure);
        assert_eq!(db.get::<Geometry>(handle).unwrap().primitive_sets()[0].vertex_count(), 6);

        let structure = db.versions().structure_changed();
        assert!(db.edit::<Geometry>(handle).unwrap().set_material_symbol(0, "paint"));
        assert!(db.versions().structure_changed() > structure);

        assert!(!db.edit::<Geometry>(handle).unwrap().set_vertex_count(5, 1));
    }

    #[test]
    fn test_input_replaces_same_semantic() {
        let mut db = Database::default();
        let handle = db.add::<Geometry>("mesh").unwrap();
        {
            let mut geometry = db.edit::<Geometry>(handle).unwrap();
            geometry.add_input(VertexInput::new(POSITION, "a", 3));
            geometry.add_input(VertexInput::new(NORMAL, "n", 3));
            geometry.add_input(VertexInput::new(POSITION, "b", 3).with_layout(3, 6));
        }
        let geometry = db.get::<Geometry>(handle).unwrap();
        assert_eq!(geometry.inputs().len(), 2);
        let position = geometry.input(POSITION).unwrap();
        assert_eq!(position.source, "b");
        assert_eq!(position.effective_stride(), 6);
    }
}
