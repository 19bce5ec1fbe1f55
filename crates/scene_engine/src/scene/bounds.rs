//! Axis-aligned bounding boxes

use crate::foundation::math::{utils, Mat4, Vec3};

/// Axis-Aligned Bounding Box for culling and clip-plane fitting
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    /// Minimum corner of the bounding box
    pub min: Vec3,
    /// Maximum corner of the bounding box
    pub max: Vec3,
}

impl Aabb {
    /// Create a new AABB from min and max points
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    /// Create an AABB centered at a point with given extents
    pub fn from_center_extents(center: Vec3, extents: Vec3) -> Self {
        Self {
            min: center - extents,
            max: center + extents,
        }
    }

    /// Smallest box containing every point, or `None` for an empty set
    pub fn from_points<I>(points: I) -> Option<Self>
    where
        I: IntoIterator<Item = Vec3>,
    {
        let mut points = points.into_iter();
        let first = points.next()?;
        Some(points.fold(Self::new(first, first), |mut aabb, point| {
            aabb.min = aabb.min.inf(&point);
            aabb.max = aabb.max.sup(&point);
            aabb
        }))
    }

    /// Get the center of the AABB
    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    /// Get the extents (half-size) of the AABB
    pub fn extents(&self) -> Vec3 {
        (self.max - self.min) * 0.5
    }

    /// Radius of the bounding sphere around the center
    pub fn radius(&self) -> f32 {
        self.extents().magnitude()
    }

    /// Smallest box containing both boxes
    pub fn union(&self, other: &Self) -> Self {
        Self {
            min: self.min.inf(&other.min),
            max: self.max.sup(&other.max),
        }
    }

    /// The eight corners, in binary order of (x, y, z) choosing min/max
    pub fn corners(&self) -> [Vec3; 8] {
        let (lo, hi) = (self.min, self.max);
        [
            Vec3::new(lo.x, lo.y, lo.z),
            Vec3::new(hi.x, lo.y, lo.z),
            Vec3::new(lo.x, hi.y, lo.z),
            Vec3::new(hi.x, hi.y, lo.z),
            Vec3::new(lo.x, lo.y, hi.z),
            Vec3::new(hi.x, lo.y, hi.z),
            Vec3::new(lo.x, hi.y, hi.z),
            Vec3::new(hi.x, hi.y, hi.z),
        ]
    }

    /// Bounding box of this box after an affine transform
    pub fn transformed(&self, matrix: &Mat4) -> Self {
        let corners = self.corners().map(|corner| {
            let p = utils::transform_homogeneous(matrix, &corner);
            Vec3::new(p.x, p.y, p.z)
        });
        // Eight corners, never empty
        Self::from_points(corners).unwrap_or(*self)
    }

    /// Conservative clip-space visibility test
    ///
    /// Transforms the corners by `clip_from_object` and rejects the box only
    /// if every corner lies strictly outside the same clip plane
    /// (`x < -w`, `x > w`, and likewise for y and z). Boxes straddling a
    /// corner of the frustum may be accepted although they are invisible.
    pub fn in_clip_volume(&self, clip_from_object: &Mat4) -> bool {
        let mut outside = [true; 6];
        for corner in self.corners() {
            let p = utils::transform_homogeneous(clip_from_object, &corner);
            outside[0] &= p.x < -p.w;
            outside[1] &= p.x > p.w;
            outside[2] &= p.y < -p.w;
            outside[3] &= p.y > p.w;
            outside[4] &= p.z < -p.w;
            outside[5] &= p.z > p.w;
        }
        !outside.iter().any(|&all_outside| all_outside)
    }
}
