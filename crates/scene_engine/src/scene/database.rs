//! The scene database
//!
//! A [`Database`] owns one [`Library`] per entity kind and an injected
//! [`Clock`]. It may sit on top of a read-only fallback database: lookups that
//! miss locally continue down the chain and hand back handles tagged with the
//! layer they came from. Writes only ever reach the local layer.

use std::rc::Rc;
use std::sync::Arc;

use thiserror::Error;

use crate::foundation::collections::{GeometryKey, Handle};
use crate::foundation::math::Vec3;
use crate::foundation::stamp::{Clock, SequenceClock, Versioned};

use super::bounds::Aabb;
use super::camera::Camera;
use super::effect::Effect;
use super::geometry::{Geometry, POSITION};
use super::image::Image;
use super::library::{Edit, Entity, EntityKind, Library, LibraryParts};
use super::light::Light;
use super::material::Material;
use super::node::Node;
use super::source_buffer::SourceBuffer;
use super::visual_scene::VisualScene;

/// Errors from database mutations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DatabaseError {
    /// Entities need a non-empty id
    #[error("cannot add a {kind} with an empty id")]
    EmptyId {
        /// Library that rejected the id
        kind: EntityKind,
    },

    /// The id is already taken in the local library
    #[error("a {kind} with id '{id}' already exists")]
    DuplicateId {
        /// Library that rejected the id
        kind: EntityKind,
        /// The duplicate id
        id: String,
    },

    /// No local entity has this id
    #[error("no {kind} with id '{id}'")]
    UnknownId {
        /// Library that was searched
        kind: EntityKind,
        /// The missing id
        id: String,
    },

    /// The handle's slot has been freed (or reused by a newer entity)
    #[error("stale {kind} handle")]
    StaleHandle {
        /// Library the handle points into
        kind: EntityKind,
    },

    /// The entity lives in a fallback database, which is read-only
    #[error("{kind} lives in a read-only fallback database")]
    ReadOnlyFallback {
        /// Library the handle points into
        kind: EntityKind,
    },
}

/// Scene asset database
#[derive(Debug)]
pub struct Database {
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) versions: Versioned,
    fallback: Option<Rc<Database>>,
    pub(crate) source_buffers: Library<SourceBuffer>,
    pub(crate) images: Library<Image>,
    pub(crate) geometries: Library<Geometry>,
    pub(crate) cameras: Library<Camera>,
    pub(crate) lights: Library<Light>,
    pub(crate) effects: Library<Effect>,
    pub(crate) materials: Library<Material>,
    pub(crate) nodes: Library<Node>,
    pub(crate) visual_scenes: Library<VisualScene>,
}

impl Database {
    /// Create an empty database drawing stamps from `clock`
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            versions: Versioned::default(),
            fallback: None,
            source_buffers: Library::new(),
            images: Library::new(),
            geometries: Library::new(),
            cameras: Library::new(),
            lights: Library::new(),
            effects: Library::new(),
            materials: Library::new(),
            nodes: Library::new(),
            visual_scenes: Library::new(),
        }
    }

    /// Create an empty database layered on top of `fallback`
    ///
    /// The new database shares the fallback's clock so stamps from both
    /// layers stay comparable.
    pub fn with_fallback(fallback: Rc<Database>) -> Self {
        let mut database = Self::new(Arc::clone(&fallback.clock));
        database.fallback = Some(fallback);
        database
    }

    /// The clock stamps are drawn from
    pub fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }

    /// The next database down the chain
    pub fn fallback(&self) -> Option<&Database> {
        self.fallback.as_deref()
    }

    /// Stamps of the whole chain (this layer and every fallback)
    pub fn versions(&self) -> Versioned {
        let mut versions = self.versions;
        if let Some(fallback) = self.fallback() {
            versions.move_forward(&fallback.versions());
        }
        versions
    }

    /// Stamps of the library of kind `T` across the whole chain
    pub fn library_versions<T: Entity>(&self) -> Versioned {
        let mut versions = *T::library(self).versions();
        if let Some(fallback) = self.fallback() {
            versions.move_forward(&fallback.library_versions::<T>());
        }
        versions
    }

    /// The local library of kind `T`
    pub fn library<T: Entity>(&self) -> &Library<T> {
        T::library(self)
    }

    /// Local source buffers
    pub fn source_buffers(&self) -> &Library<SourceBuffer> {
        &self.source_buffers
    }

    /// Local images
    pub fn images(&self) -> &Library<Image> {
        &self.images
    }

    /// Local geometries
    pub fn geometries(&self) -> &Library<Geometry> {
        &self.geometries
    }

    /// Local cameras
    pub fn cameras(&self) -> &Library<Camera> {
        &self.cameras
    }

    /// Local lights
    pub fn lights(&self) -> &Library<Light> {
        &self.lights
    }

    /// Local effects
    pub fn effects(&self) -> &Library<Effect> {
        &self.effects
    }

    /// Local materials
    pub fn materials(&self) -> &Library<Material> {
        &self.materials
    }

    /// Local nodes
    pub fn nodes(&self) -> &Library<Node> {
        &self.nodes
    }

    /// Local visual scenes
    pub fn visual_scenes(&self) -> &Library<VisualScene> {
        &self.visual_scenes
    }

    /// Entity behind a handle, following the handle's origin layer
    pub fn get<T: Entity>(&self, handle: Handle<T::Key>) -> Option<&T> {
        match handle.lowered() {
            None => T::library(self).get(handle.key()),
            Some(lower) => self.fallback()?.get::<T>(lower),
        }
    }

    /// Find an entity by id, locally first and then down the fallback chain
    pub fn lookup<T: Entity>(&self, id: &str) -> Option<(Handle<T::Key>, &T)> {
        let library = T::library(self);
        if let Some(key) = library.key_of(id) {
            return library.get(key).map(|entity| (Handle::local(key), entity));
        }
        let (handle, entity) = self.fallback()?.lookup::<T>(id)?;
        Some((handle.lifted(), entity))
    }

    /// Stamps of the entity behind a handle
    pub fn versions_of<T: Entity>(&self, handle: Handle<T::Key>) -> Option<Versioned> {
        self.get::<T>(handle).map(|entity| *entity.versions())
    }

    /// Add a new entity with default attributes
    pub fn add<T: Entity>(&mut self, id: &str) -> Result<Handle<T::Key>, DatabaseError> {
        let LibraryParts { library, clock, database } = T::parts(self);
        let key = library.add(id, clock)?;
        database.move_forward(library.versions());
        Ok(Handle::local(key))
    }

    /// Open an entity for editing
    pub fn edit<T: Entity>(&mut self, handle: Handle<T::Key>) -> Result<Edit<'_, T>, DatabaseError> {
        if !handle.is_local() {
            return Err(DatabaseError::ReadOnlyFallback { kind: T::KIND });
        }
        let LibraryParts { library, clock, database } = T::parts(self);
        library
            .edit(handle.key(), clock, database)
            .ok_or(DatabaseError::StaleHandle { kind: T::KIND })
    }

    /// Open an entity for editing by id
    ///
    /// Ids that only exist further down the chain are rejected as read-only.
    pub fn edit_by_id<T: Entity>(&mut self, id: &str) -> Result<Edit<'_, T>, DatabaseError> {
        let handle = self.local_handle::<T>(id)?;
        self.edit::<T>(handle)
    }

    /// Remove a local entity and hand it back
    pub fn remove<T: Entity>(&mut self, handle: Handle<T::Key>) -> Result<T, DatabaseError> {
        if !handle.is_local() {
            return Err(DatabaseError::ReadOnlyFallback { kind: T::KIND });
        }
        let LibraryParts { library, clock, database } = T::parts(self);
        let entity = library
            .remove(handle.key(), clock)
            .ok_or(DatabaseError::StaleHandle { kind: T::KIND })?;
        database.move_forward(library.versions());
        Ok(entity)
    }

    /// Remove a local entity by id
    pub fn remove_by_id<T: Entity>(&mut self, id: &str) -> Result<T, DatabaseError> {
        let handle = self.local_handle::<T>(id)?;
        self.remove::<T>(handle)
    }

    /// Drop every local entity of kind `T`
    pub fn clear<T: Entity>(&mut self) {
        let LibraryParts { library, clock, database } = T::parts(self);
        library.clear(clock);
        database.move_forward(library.versions());
    }

    fn local_handle<T: Entity>(&self, id: &str) -> Result<Handle<T::Key>, DatabaseError> {
        if let Some(key) = T::library(self).key_of(id) {
            return Ok(Handle::local(key));
        }
        match self.lookup::<T>(id) {
            Some(_) => Err(DatabaseError::ReadOnlyFallback { kind: T::KIND }),
            None => Err(DatabaseError::UnknownId { kind: T::KIND, id: id.to_string() }),
        }
    }

    /// Bounding box of a geometry's `POSITION` input
    ///
    /// Returns `None` when the geometry has no position input, the source
    /// buffer is missing or not floating point, or the layout selects no
    /// complete vertex.
    pub fn compute_bounding_box(&self, geometry: &Geometry) -> Option<Aabb> {
        let input = geometry.input(POSITION)?;
        let (_, buffer) = self.lookup::<SourceBuffer>(&input.source)?;
        let floats = buffer.contents().as_floats()?;

        let components = input.components.clamp(1, 3) as usize;
        let stride = if input.stride == 0 { input.components as usize } else { input.stride as usize };
        let offset = input.offset as usize;
        if stride == 0 || stride < components {
            return None;
        }

        let points = floats
            .get(offset..)?
            .chunks(stride)
            .filter(|chunk| chunk.len() >= components)
            .map(|chunk| {
                let mut point = Vec3::zeros();
                for (i, component) in chunk.iter().take(components).enumerate() {
                    point[i] = *component;
                }
                point
            });
        Aabb::from_points(points)
    }

    /// Recompute and store a local geometry's bounding box
    pub fn refresh_bounding_box(&mut self, handle: Handle<GeometryKey>) -> Result<Option<Aabb>, DatabaseError> {
        let geometry = self
            .get::<Geometry>(handle)
            .ok_or(DatabaseError::StaleHandle { kind: EntityKind::Geometry })?;
        let bounds = self.compute_bounding_box(geometry);
        self.edit::<Geometry>(handle)?.set_bounding_box(bounds);
        Ok(bounds)
    }
}

impl Default for Database {
    fn default() -> Self {
        Self::new(Arc::new(SequenceClock::new()))
    }
}
