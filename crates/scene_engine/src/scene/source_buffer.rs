//! Typed arrays of vertex and index data

use crate::foundation::collections::SourceBufferKey;
use crate::foundation::stamp::Versioned;

use super::library::{impl_entity, Edit, EntityKind};

/// Scalar type of a source buffer's elements
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementType {
    /// 32-bit float
    Float,
    /// 32-bit signed integer
    Int,
    /// 32-bit unsigned integer
    UInt,
}

/// Contents of a source buffer
#[derive(Debug, Clone, PartialEq)]
pub enum BufferContents {
    /// Floating point data (positions, normals, texture coordinates, ...)
    Float(Vec<f32>),
    /// Signed integer data
    Int(Vec<i32>),
    /// Unsigned integer data (typically indices)
    UInt(Vec<u32>),
}

impl BufferContents {
    /// Element type of the contents
    pub fn element_type(&self) -> ElementType {
        match self {
            Self::Float(_) => ElementType::Float,
            Self::Int(_) => ElementType::Int,
            Self::UInt(_) => ElementType::UInt,
        }
    }

    /// Number of scalar elements
    pub fn len(&self) -> usize {
        match self {
            Self::Float(data) => data.len(),
            Self::Int(data) => data.len(),
            Self::UInt(data) => data.len(),
        }
    }

    /// Whether there are no elements
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Float view, if the contents are floats
    pub fn as_floats(&self) -> Option<&[f32]> {
        match self {
            Self::Float(data) => Some(data),
            Self::Int(_) | Self::UInt(_) => None,
        }
    }

    /// Unsigned view, if the contents are unsigned integers
    pub fn as_uints(&self) -> Option<&[u32]> {
        match self {
            Self::UInt(data) => Some(data),
            Self::Float(_) | Self::Int(_) => None,
        }
    }

    /// Raw bytes for buffer upload
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Self::Float(data) => bytemuck::cast_slice(data.as_slice()),
            Self::Int(data) => bytemuck::cast_slice(data.as_slice()),
            Self::UInt(data) => bytemuck::cast_slice(data.as_slice()),
        }
    }
}

impl Default for BufferContents {
    fn default() -> Self {
        Self::Float(Vec::new())
    }
}

/// A flat array of scalars referenced by geometry inputs and index buffers
#[derive(Debug)]
pub struct SourceBuffer {
    id: String,
    versions: Versioned,
    contents: BufferContents,
}

impl SourceBuffer {
    pub(crate) fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            versions: Versioned::default(),
            contents: BufferContents::default(),
        }
    }

    /// Current contents
    pub fn contents(&self) -> &BufferContents {
        &self.contents
    }

    /// Element type
    pub fn element_type(&self) -> ElementType {
        self.contents.element_type()
    }

    /// Number of scalar elements
    pub fn len(&self) -> usize {
        self.contents.len()
    }

    /// Whether the buffer is empty
    pub fn is_empty(&self) -> bool {
        self.contents.is_empty()
    }
}

impl_entity!(SourceBuffer, SourceBufferKey, EntityKind::SourceBuffer, source_buffers);

impl Edit<'_, SourceBuffer> {
    /// Replace the contents
    ///
    /// Same type and length is a value change; anything else changes the
    /// buffer's layout and is structural.
    pub fn set_contents(&mut self, contents: BufferContents) {
        let structural = self.contents.element_type() != contents.element_type()
            || self.contents.len() != contents.len();
        self.entity_mut().contents = contents;
        if structural {
            self.touch_structure();
        } else {
            self.touch_value();
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::scene::{Database, SourceBuffer, BufferContents, ElementType};

    #[test]
    fn test_same_shape_is_value_change() {
        let mut db = Database::default();
        let handle = db.add::<SourceBuffer>("positions").unwrap();
        db.edit::<SourceBuffer>(handle).unwrap().set_contents(BufferContents::Float(vec![0.0; 6]));
        let structure = db.versions().structure_changed();

        db.edit::<SourceBuffer>(handle).unwrap().set_contents(BufferContents::Float(vec![1.0; 6]));
        assert_eq!(db.versions().structure_changed(), structure);

        db.edit::<SourceBuffer>(handle).unwrap().set_contents(BufferContents::UInt(vec![1; 6]));
        assert!(db.versions().structure_changed() > structure);

        let buffer = db.get::<SourceBuffer>(handle).unwrap();
        assert_eq!(buffer.element_type(), ElementType::UInt);
        assert_eq!(buffer.contents().as_bytes().len(), 24);
    }
}
