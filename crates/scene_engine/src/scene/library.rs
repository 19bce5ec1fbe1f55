//! Typed entity libraries
//!
//! A library exclusively owns the entities of one kind. Entities live in a
//! slot arena, so a [`Handle`](crate::foundation::collections::Handle) stays
//! valid across unrelated removals and simply stops resolving once its own
//! entity is gone. Libraries also keep a dense index order (swap-with-last on
//! removal) for positional access, and an id map for symbolic lookups.

use std::collections::HashMap;
use std::fmt;
use std::ops::Deref;

use slotmap::SlotMap;

use crate::foundation::collections::Key;
use crate::foundation::stamp::{Clock, Versioned};

use super::database::{Database, DatabaseError};

/// Kinds of entity a database stores
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EntityKind {
    /// [`SourceBuffer`](super::SourceBuffer)
    SourceBuffer,
    /// [`Image`](super::Image)
    Image,
    /// [`Geometry`](super::Geometry)
    Geometry,
    /// [`Camera`](super::Camera)
    Camera,
    /// [`Light`](super::Light)
    Light,
    /// [`Effect`](super::Effect)
    Effect,
    /// [`Material`](super::Material)
    Material,
    /// [`Node`](super::Node)
    Node,
    /// [`VisualScene`](super::VisualScene)
    VisualScene,
}

impl EntityKind {
    /// Lowercase name used in log lines and diagnostics
    pub fn name(self) -> &'static str {
        match self {
            Self::SourceBuffer => "source buffer",
            Self::Image => "image",
            Self::Geometry => "geometry",
            Self::Camera => "camera",
            Self::Light => "light",
            Self::Effect => "effect",
            Self::Material => "material",
            Self::Node => "node",
            Self::VisualScene => "visual scene",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Something a [`Library`] can own
///
/// Implemented by every entity type through `impl_entity!`, which also wires
/// the type to its library inside [`Database`].
pub trait Entity: Sized + fmt::Debug {
    /// Arena key type
    type Key: Key;

    /// Entity kind
    const KIND: EntityKind;

    /// Fresh entity with the given id and default attributes
    fn create(id: &str) -> Self;

    /// Identifier, unique within the library
    fn id(&self) -> &str;

    /// Value/structure stamps
    fn versions(&self) -> &Versioned;

    /// Mutable stamps (library internal)
    fn versions_mut(&mut self) -> &mut Versioned;

    /// The library of this kind inside a database
    fn library(database: &Database) -> &Library<Self>;

    /// The library, the clock and the database stamps, borrowed disjointly
    fn parts(database: &mut Database) -> LibraryParts<'_, Self>;
}

/// Disjoint borrows needed to mutate one library of a database
pub struct LibraryParts<'a, T: Entity> {
    /// The library
    pub library: &'a mut Library<T>,
    /// The database clock
    pub clock: &'a dyn Clock,
    /// The database-wide stamps
    pub database: &'a mut Versioned,
}

/// Implements [`Entity`] for a struct with `id: String` and `versions: Versioned`
/// fields and an associated `fn new(id: &str) -> Self`.
macro_rules! impl_entity {
    ($ty:ty, $key:ty, $kind:expr, $field:ident) => {
        impl $crate::scene::library::Entity for $ty {
            type Key = $key;

            const KIND: $crate::scene::library::EntityKind = $kind;

            fn create(id: &str) -> Self {
                Self::new(id)
            }

            fn id(&self) -> &str {
                &self.id
            }

            fn versions(&self) -> &$crate::foundation::stamp::Versioned {
                &self.versions
            }

            fn versions_mut(&mut self) -> &mut $crate::foundation::stamp::Versioned {
                &mut self.versions
            }

            fn library(database: &$crate::scene::Database) -> &$crate::scene::library::Library<Self> {
                &database.$field
            }

            fn parts(database: &mut $crate::scene::Database) -> $crate::scene::library::LibraryParts<'_, Self> {
                $crate::scene::library::LibraryParts {
                    library: &mut database.$field,
                    clock: database.clock.as_ref(),
                    database: &mut database.versions,
                }
            }
        }
    };
}

pub(crate) use impl_entity;

#[derive(Debug)]
struct Slot<T> {
    entity: T,
    index: usize,
}

/// Exclusive owner of all entities of one kind
#[derive(Debug)]
pub struct Library<T: Entity> {
    slots: SlotMap<T::Key, Slot<T>>,
    order: Vec<T::Key>,
    ids: HashMap<String, T::Key>,
    versions: Versioned,
}

impl<T: Entity> Library<T> {
    /// Create an empty library
    pub fn new() -> Self {
        Self {
            slots: SlotMap::with_key(),
            order: Vec::new(),
            ids: HashMap::new(),
            versions: Versioned::default(),
        }
    }

    /// Stamps moved forward by every edit of every member and by add/remove
    pub fn versions(&self) -> &Versioned {
        &self.versions
    }

    /// Number of entities
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Whether the library is empty
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Entity by slot key
    pub fn get(&self, key: T::Key) -> Option<&T> {
        self.slots.get(key).map(|slot| &slot.entity)
    }

    /// Slot key of the entity with this id
    pub fn key_of(&self, id: &str) -> Option<T::Key> {
        self.ids.get(id).copied()
    }

    /// Entity by id
    pub fn get_by_id(&self, id: &str) -> Option<&T> {
        self.key_of(id).and_then(|key| self.get(key))
    }

    /// Slot key at a dense index
    ///
    /// Indices are reassigned by removal; do not hold on to them across edits.
    pub fn key_at(&self, index: usize) -> Option<T::Key> {
        self.order.get(index).copied()
    }

    /// Entity at a dense index
    pub fn get_at(&self, index: usize) -> Option<&T> {
        self.key_at(index).and_then(|key| self.get(key))
    }

    /// Current dense index of an entity
    pub fn index_of(&self, key: T::Key) -> Option<usize> {
        self.slots.get(key).map(|slot| slot.index)
    }

    /// Whether the key refers to a live entity
    pub fn contains(&self, key: T::Key) -> bool {
        self.slots.contains_key(key)
    }

    /// Iterate over `(key, entity)` in index order
    pub fn iter(&self) -> impl Iterator<Item = (T::Key, &T)> + '_ {
        self.order
            .iter()
            .filter_map(move |&key| self.get(key).map(|entity| (key, entity)))
    }

    pub(crate) fn add(&mut self, id: &str, clock: &dyn Clock) -> Result<T::Key, DatabaseError> {
        if id.is_empty() {
            return Err(DatabaseError::EmptyId { kind: T::KIND });
        }
        if self.ids.contains_key(id) {
            return Err(DatabaseError::DuplicateId { kind: T::KIND, id: id.to_string() });
        }

        let mut entity = T::create(id);
        entity.versions_mut().touch_structure(clock);
        self.versions.move_forward(entity.versions());

        let index = self.order.len();
        let key = self.slots.insert(Slot { entity, index });
        self.order.push(key);
        self.ids.insert(id.to_string(), key);

        log::trace!("Added {} '{}' at index {}", T::KIND, id, index);
        Ok(key)
    }

    pub(crate) fn remove(&mut self, key: T::Key, clock: &dyn Clock) -> Option<T> {
        let slot = self.slots.remove(key)?;

        // Swap the last entity into the vacated index and patch its slot
        self.order.swap_remove(slot.index);
        if let Some(&moved) = self.order.get(slot.index) {
            if let Some(moved_slot) = self.slots.get_mut(moved) {
                moved_slot.index = slot.index;
            }
        }

        // Removal by key, so the id map is patched by id first and by
        // identity only if the id was somehow rebound
        if self.ids.get(slot.entity.id()) == Some(&key) {
            self.ids.remove(slot.entity.id());
        } else {
            self.ids.retain(|_, mapped| *mapped != key);
        }

        self.versions.touch_structure(clock);
        log::trace!("Removed {} '{}'", T::KIND, slot.entity.id());
        Some(slot.entity)
    }

    pub(crate) fn clear(&mut self, clock: &dyn Clock) {
        if self.order.is_empty() {
            return;
        }
        self.slots.clear();
        self.order.clear();
        self.ids.clear();
        self.versions.touch_structure(clock);
    }

    pub(crate) fn edit<'a>(
        &'a mut self,
        key: T::Key,
        clock: &'a dyn Clock,
        database: &'a mut Versioned,
    ) -> Option<Edit<'a, T>> {
        let Self { slots, versions, .. } = self;
        let slot = slots.get_mut(key)?;
        Some(Edit {
            entity: &mut slot.entity,
            clock,
            library: versions,
            database,
        })
    }
}

impl<T: Entity> Default for Library<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Write access to one entity
///
/// Type-specific setters live in `impl Edit<'_, EntityType>` blocks next to
/// each entity. Every setter records either a value or a structure change;
/// both are propagated to the owning library and the database immediately.
pub struct Edit<'a, T: Entity> {
    entity: &'a mut T,
    clock: &'a dyn Clock,
    library: &'a mut Versioned,
    database: &'a mut Versioned,
}

impl<'a, T: Entity> Edit<'a, T> {
    /// Record a value-only change
    pub fn touch_value(&mut self) {
        self.entity.versions_mut().touch_value(self.clock);
        self.propagate();
    }

    /// Record a structural change (implies a value change)
    pub fn touch_structure(&mut self) {
        self.entity.versions_mut().touch_structure(self.clock);
        self.propagate();
    }

    /// Mutable entity for setters; callers must touch a stamp afterwards
    pub(crate) fn entity_mut(&mut self) -> &mut T {
        &mut *self.entity
    }

    fn propagate(&mut self) {
        self.library.move_forward(self.entity.versions());
        self.database.move_forward(self.library);
    }
}

impl<T: Entity> Deref for Edit<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        &*self.entity
    }
}

impl<T: Entity> fmt::Debug for Edit<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Edit").field("entity", &self.entity).finish_non_exhaustive()
    }
}
