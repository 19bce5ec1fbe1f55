//! Specialized collection types

pub use slotmap::{Key, SlotMap};

slotmap::new_key_type! {
    /// Slot key of a [`SourceBuffer`](crate::scene::SourceBuffer)
    pub struct SourceBufferKey;
    /// Slot key of an [`Image`](crate::scene::Image)
    pub struct ImageKey;
    /// Slot key of a [`Geometry`](crate::scene::Geometry)
    pub struct GeometryKey;
    /// Slot key of a [`Camera`](crate::scene::Camera)
    pub struct CameraKey;
    /// Slot key of a [`Light`](crate::scene::Light)
    pub struct LightKey;
    /// Slot key of an [`Effect`](crate::scene::Effect)
    pub struct EffectKey;
    /// Slot key of a [`Material`](crate::scene::Material)
    pub struct MaterialKey;
    /// Slot key of a [`Node`](crate::scene::Node)
    pub struct NodeKey;
    /// Slot key of a [`VisualScene`](crate::scene::VisualScene)
    pub struct VisualSceneKey;
}

/// Stable reference to an entity in a database chain
///
/// `origin` is the layer the entity lives in: 0 for the database that was
/// asked, 1 for its fallback, and so on. Slot keys from different layers come
/// from different arenas, so the origin is part of the identity. A handle to
/// a removed entity stays a valid value; dereferencing it simply fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Handle<K> {
    origin: u8,
    key: K,
}

impl<K: Key> Handle<K> {
    /// Handle to an entity owned by the local database
    pub fn local(key: K) -> Self {
        Self { origin: 0, key }
    }

    /// Handle to an entity `origin` layers down the fallback chain
    pub fn new(origin: u8, key: K) -> Self {
        Self { origin, key }
    }

    /// Fallback layer the entity lives in
    pub fn origin(&self) -> u8 {
        self.origin
    }

    /// Whether the entity is owned by the local (writable) database
    pub fn is_local(&self) -> bool {
        self.origin == 0
    }

    /// Slot key inside the owning library
    pub fn key(&self) -> K {
        self.key
    }

    /// Same entity as seen from one layer further up the chain
    pub(crate) fn lifted(self) -> Self {
        Self {
            origin: self.origin.saturating_add(1),
            key: self.key,
        }
    }

    /// Same entity as seen from one layer further down the chain
    pub(crate) fn lowered(self) -> Option<Self> {
        self.origin.checked_sub(1).map(|origin| Self { origin, key: self.key })
    }

    /// Process-unique numeric identity (slot index, generation and layer)
    pub fn identity(&self) -> u64 {
        self.key.data().as_ffi() ^ (u64::from(self.origin) << 56)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handle_layers() {
        let mut map: SlotMap<NodeKey, ()> = SlotMap::with_key();
        let key = map.insert(());

        let local = Handle::local(key);
        assert!(local.is_local());
        assert_eq!(local.lowered(), None);

        let lifted = local.lifted();
        assert_eq!(lifted.origin(), 1);
        assert_ne!(lifted, local);
        assert_ne!(lifted.identity(), local.identity());
        assert_eq!(lifted.lowered(), Some(local));
    }

    #[test]
    fn test_removed_slot_gets_new_generation() {
        let mut map: SlotMap<NodeKey, u32> = SlotMap::with_key();
        let first = map.insert(1);
        map.remove(first);
        let second = map.insert(2);

        assert_ne!(Handle::local(first), Handle::local(second));
        assert!(map.get(first).is_none());
    }
}
