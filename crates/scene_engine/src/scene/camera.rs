//! Camera optics
//!
//! A camera only describes its projection; where it sits in the world comes
//! from the node path that instances it.

use std::mem;

use crate::foundation::collections::CameraKey;
use crate::foundation::math::{utils, Mat4, Mat4Ext};
use crate::foundation::stamp::Versioned;

use super::library::{impl_entity, Edit, EntityKind};

/// Vertical field of view used when a perspective camera specifies neither
const DEFAULT_YFOV_DEGREES: f32 = 45.0;

/// Projection model, with the optional parameters a COLLADA camera may omit
///
/// Angles are in degrees, magnifications are half-extents in eye units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Projection {
    /// Perspective projection
    Perspective {
        /// Horizontal field of view
        xfov: Option<f32>,
        /// Vertical field of view
        yfov: Option<f32>,
        /// Width over height
        aspect: Option<f32>,
    },
    /// Orthographic projection
    Orthographic {
        /// Horizontal half-extent
        xmag: Option<f32>,
        /// Vertical half-extent
        ymag: Option<f32>,
        /// Width over height
        aspect: Option<f32>,
    },
}

impl Projection {
    /// Perspective with a vertical field of view, aspect taken from the viewport
    pub fn perspective_yfov(yfov: f32) -> Self {
        Self::Perspective { xfov: None, yfov: Some(yfov), aspect: None }
    }

    /// Orthographic with a vertical half-extent, aspect taken from the viewport
    pub fn orthographic_ymag(ymag: f32) -> Self {
        Self::Orthographic { xmag: None, ymag: Some(ymag), aspect: None }
    }

    /// Projection matrix for a viewport aspect and depth range
    ///
    /// Missing parameters are derived from the ones given; the viewport
    /// aspect is used only when the camera does not pin one down itself.
    pub fn matrix(&self, viewport_aspect: f32, near: f32, far: f32) -> Mat4 {
        match *self {
            Self::Perspective { xfov, yfov, aspect } => {
                let half_tan = |degrees: f32| (utils::deg_to_rad(degrees) * 0.5).tan();
                let (yfov, aspect) = match (xfov, yfov, aspect) {
                    (_, Some(y), Some(a)) => (utils::deg_to_rad(y), a),
                    (Some(x), Some(y), None) => (utils::deg_to_rad(y), half_tan(x) / half_tan(y)),
                    (None, Some(y), None) => (utils::deg_to_rad(y), viewport_aspect),
                    (Some(x), None, a) => {
                        let aspect = a.unwrap_or(viewport_aspect);
                        (2.0 * (half_tan(x) / aspect).atan(), aspect)
                    }
                    (None, None, a) => (
                        utils::deg_to_rad(DEFAULT_YFOV_DEGREES),
                        a.unwrap_or(viewport_aspect),
                    ),
                };
                Mat4::perspective(yfov, aspect, near, far)
            }
            Self::Orthographic { xmag, ymag, aspect } => {
                let (xmag, ymag) = match (xmag, ymag, aspect) {
                    (Some(x), Some(y), _) => (x, y),
                    (Some(x), None, a) => (x, x / a.unwrap_or(viewport_aspect)),
                    (None, Some(y), a) => (y * a.unwrap_or(viewport_aspect), y),
                    (None, None, a) => (a.unwrap_or(viewport_aspect), 1.0),
                };
                Mat4::orthographic(xmag, ymag, near, far)
            }
        }
    }
}

impl Default for Projection {
    fn default() -> Self {
        Self::Perspective { xfov: None, yfov: None, aspect: None }
    }
}

/// How the near and far planes are chosen
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ClipPlanes {
    /// Fixed planes
    Fixed {
        /// Near plane distance
        near: f32,
        /// Far plane distance
        far: f32,
    },
    /// Fit to the eye-space bounds of everything drawn with this camera
    FitToScene {
        /// Near plane when nothing with a bounding box is drawn
        fallback_near: f32,
        /// Far plane when nothing with a bounding box is drawn
        fallback_far: f32,
    },
}

impl Default for ClipPlanes {
    fn default() -> Self {
        Self::Fixed { near: 0.1, far: 100.0 }
    }
}

/// A camera
#[derive(Debug)]
pub struct Camera {
    id: String,
    versions: Versioned,
    projection: Projection,
    clip_planes: ClipPlanes,
}

impl Camera {
    pub(crate) fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            versions: Versioned::default(),
            projection: Projection::default(),
            clip_planes: ClipPlanes::default(),
        }
    }

    /// Projection model
    pub fn projection(&self) -> &Projection {
        &self.projection
    }

    /// Clip plane policy
    pub fn clip_planes(&self) -> &ClipPlanes {
        &self.clip_planes
    }
}

impl_entity!(Camera, CameraKey, EntityKind::Camera, cameras);

impl Edit<'_, Camera> {
    /// Replace the projection; switching between perspective and
    /// orthographic is structural
    pub fn set_projection(&mut self, projection: Projection) {
        let structural = mem::discriminant(&self.projection) != mem::discriminant(&projection);
        self.entity_mut().projection = projection;
        if structural {
            self.touch_structure();
        } else {
            self.touch_value();
        }
    }

    /// Replace the clip plane policy; switching policy is structural
    pub fn set_clip_planes(&mut self, clip_planes: ClipPlanes) {
        let structural = mem::discriminant(&self.clip_planes) != mem::discriminant(&clip_planes);
        self.entity_mut().clip_planes = clip_planes;
        if structural {
            self.touch_structure();
        } else {
            self.touch_value();
        }
    }
}
