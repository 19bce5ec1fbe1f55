//! Coordinate system descriptors and cache ids
//!
//! A render list refers to transforms indirectly: a local coordinate system
//! is a node path, a view coordinate system is a camera placement plus the
//! lights bound to it. The transform cache hands out small ids for both and
//! for every derived value, tagged with the cache generation so ids from
//! before a purge are recognised as stale.

use crate::foundation::collections::{CameraKey, Handle, LightKey};
use crate::scene::NodePath;

macro_rules! cache_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name {
            generation: u32,
            index: u32,
        }

        impl $name {
            pub(crate) fn new(generation: u32, index: usize) -> Self {
                Self {
                    generation,
                    index: u32::try_from(index).unwrap_or(u32::MAX),
                }
            }

            /// Cache generation the id was issued in
            pub fn generation(self) -> u32 {
                self.generation
            }

            /// Slot inside the cache
            pub fn index(self) -> usize {
                self.index as usize
            }
        }
    };
}

cache_id!(
    /// Id of a registered local coordinate system
    LocalId
);
cache_id!(
    /// Id of a registered view coordinate system
    ViewId
);
cache_id!(
    /// Id of a cached runtime value
    ValueId
);

/// A light and the node path placing it
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LightBinding {
    /// Path from a scene root to the node instancing the light
    pub path: NodePath,
    /// The light
    pub light: Handle<LightKey>,
}

/// Camera placement and light set a render item draws with
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ViewCoordSys {
    /// Path from a scene root to the node instancing the camera
    pub camera_path: NodePath,
    /// The camera
    pub camera: Handle<CameraKey>,
    /// Lights, in light index order
    pub lights: Vec<LightBinding>,
}

impl ViewCoordSys {
    /// View without lights
    pub fn new(camera_path: NodePath, camera: Handle<CameraKey>) -> Self {
        Self {
            camera_path,
            camera,
            lights: Vec::new(),
        }
    }

    /// Bind the next light index
    pub fn with_light(mut self, path: NodePath, light: Handle<LightKey>) -> Self {
        self.lights.push(LightBinding { path, light });
        self
    }
}
