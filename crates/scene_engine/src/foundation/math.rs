//! Math utilities and types
//!
//! Provides the fixed-size vector and matrix types used by the scene database
//! and the transform cache. All matrices are column-major `f32`, and the
//! projection helpers follow the OpenGL clip-space convention: right-handed
//! eye space looking down -Z, post-projection depth in [-1, 1].

pub use nalgebra::{
    Vector2, Vector3, Vector4,
    Matrix3, Matrix4,
    Unit,
};

/// 2D vector type
pub type Vec2 = Vector2<f32>;

/// 3D vector type
pub type Vec3 = Vector3<f32>;

/// 4D vector type
pub type Vec4 = Vector4<f32>;

/// 3x3 matrix type
pub type Mat3 = Matrix3<f32>;

/// 4x4 matrix type
pub type Mat4 = Matrix4<f32>;

/// 3D point type
pub type Point3 = nalgebra::Point3<f32>;

/// Math constants
pub mod constants {
    /// Pi constant
    pub const PI: f32 = std::f32::consts::PI;

    /// Degrees to radians conversion factor
    pub const DEG_TO_RAD: f32 = PI / 180.0;

    /// Radians to degrees conversion factor
    pub const RAD_TO_DEG: f32 = 180.0 / PI;
}

/// Math utility functions
pub mod utils {
    use super::{constants, Mat3, Mat4, Vec3, Vec4};

    /// Convert degrees to radians
    pub fn deg_to_rad(degrees: f32) -> f32 {
        degrees * constants::DEG_TO_RAD
    }

    /// Convert radians to degrees
    pub fn rad_to_deg(radians: f32) -> f32 {
        radians * constants::RAD_TO_DEG
    }

    /// Transform a point into homogeneous coordinates (no perspective divide)
    pub fn transform_homogeneous(matrix: &Mat4, point: &Vec3) -> Vec4 {
        matrix * Vec4::new(point.x, point.y, point.z, 1.0)
    }

    /// Inverse-transpose of the upper-left 3x3 block
    ///
    /// Falls back to identity for singular matrices so a degenerate scale
    /// does not poison the normal transform with NaNs.
    pub fn normal_matrix(matrix: &Mat4) -> Mat3 {
        let upper: Mat3 = matrix.fixed_view::<3, 3>(0, 0).into_owned();
        upper
            .try_inverse()
            .map_or_else(Mat3::identity, |inverse| inverse.transpose())
    }

    /// Invert a 4x4 matrix, falling back to identity when it is singular
    pub fn inverse_or_identity(matrix: &Mat4) -> Mat4 {
        matrix.try_inverse().unwrap_or_else(|| {
            log::warn!("Singular matrix encountered, substituting identity for its inverse");
            Mat4::identity()
        })
    }
}

/// Extension trait for Mat4 with additional convenience methods
pub trait Mat4Ext {
    /// Rotation of `angle_degrees` about an arbitrary axis
    fn rotation_axis(axis: &Vec3, angle_degrees: f32) -> Mat4;

    /// OpenGL-style perspective projection
    ///
    /// `fov_y` is in radians; depth maps to [-1, 1].
    fn perspective(fov_y: f32, aspect: f32, near: f32, far: f32) -> Mat4;

    /// OpenGL-style orthographic projection from half-extents
    fn orthographic(x_mag: f32, y_mag: f32, near: f32, far: f32) -> Mat4;

    /// View matrix (eye-from-world) looking from `eye` towards `target`
    fn look_at(eye: &Vec3, target: &Vec3, up: &Vec3) -> Mat4;

    /// Inverse of [`Mat4Ext::look_at`]: places an object at `eye` facing `target`
    fn look_at_inverse(eye: &Vec3, target: &Vec3, up: &Vec3) -> Mat4;
}

impl Mat4Ext for Mat4 {
    fn rotation_axis(axis: &Vec3, angle_degrees: f32) -> Mat4 {
        Unit::try_new(*axis, f32::EPSILON).map_or_else(Mat4::identity, |axis| {
            Mat4::from_axis_angle(&axis, utils::deg_to_rad(angle_degrees))
        })
    }

    fn perspective(fov_y: f32, aspect: f32, near: f32, far: f32) -> Mat4 {
        let f = 1.0 / (fov_y * 0.5).tan();
        let mut result = Mat4::zeros();

        // P = [f/a  0   0            0          ]
        //     [0    f   0            0          ]
        //     [0    0   (f+n)/(n-f)  2fn/(n-f)  ]
        //     [0    0   -1           0          ]
        result[(0, 0)] = f / aspect;
        result[(1, 1)] = f;
        result[(2, 2)] = (far + near) / (near - far);
        result[(2, 3)] = 2.0 * far * near / (near - far);
        result[(3, 2)] = -1.0;

        result
    }

    fn orthographic(x_mag: f32, y_mag: f32, near: f32, far: f32) -> Mat4 {
        let mut result = Mat4::identity();
        result[(0, 0)] = 1.0 / x_mag;
        result[(1, 1)] = 1.0 / y_mag;
        result[(2, 2)] = 2.0 / (near - far);
        result[(2, 3)] = (far + near) / (near - far);
        result
    }

    fn look_at(eye: &Vec3, target: &Vec3, up: &Vec3) -> Mat4 {
        let forward = (target - eye).normalize();
        let side = forward.cross(up).normalize();
        let camera_up = side.cross(&forward);

        Mat4::new(
            side.x, side.y, side.z, -side.dot(eye),
            camera_up.x, camera_up.y, camera_up.z, -camera_up.dot(eye),
            -forward.x, -forward.y, -forward.z, forward.dot(eye),
            0.0, 0.0, 0.0, 1.0,
        )
    }

    fn look_at_inverse(eye: &Vec3, target: &Vec3, up: &Vec3) -> Mat4 {
        let forward = (target - eye).normalize();
        let side = forward.cross(up).normalize();
        let camera_up = side.cross(&forward);

        Mat4::new(
            side.x, camera_up.x, -forward.x, eye.x,
            side.y, camera_up.y, -forward.y, eye.y,
            side.z, camera_up.z, -forward.z, eye.z,
            0.0, 0.0, 0.0, 1.0,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    /// Plain triple-loop product used to cross-check nalgebra's kernels
    fn scalar_product(a: &Mat4, b: &Mat4) -> Mat4 {
        let mut out = Mat4::zeros();
        for row in 0..4 {
            for col in 0..4 {
                let mut sum = 0.0;
                for k in 0..4 {
                    sum += a[(row, k)] * b[(k, col)];
                }
                out[(row, col)] = sum;
            }
        }
        out
    }

    #[test]
    fn test_product_matches_scalar_reference() {
        let a = Mat4::rotation_axis(&Vec3::new(1.0, 2.0, 3.0), 33.0)
            * Mat4::new_translation(&Vec3::new(1.0, -2.0, 0.5));
        let b = Mat4::perspective(1.0, 1.5, 0.1, 50.0)
            * Mat4::new_nonuniform_scaling(&Vec3::new(2.0, 0.5, 1.0));
        assert_relative_eq!(a * b, scalar_product(&a, &b), epsilon = 1e-5);
    }

    #[test]
    fn test_perspective_maps_near_and_far_to_unit_depth() {
        let projection = Mat4::perspective(utils::deg_to_rad(60.0), 1.0, 1.0, 10.0);

        let near = utils::transform_homogeneous(&projection, &Vec3::new(0.0, 0.0, -1.0));
        let far = utils::transform_homogeneous(&projection, &Vec3::new(0.0, 0.0, -10.0));

        assert_relative_eq!(near.z / near.w, -1.0, epsilon = 1e-5);
        assert_relative_eq!(far.z / far.w, 1.0, epsilon = 1e-5);
    }

    #[test]
    fn test_orthographic_maps_extents_to_unit_cube() {
        let projection = Mat4::orthographic(2.0, 4.0, 1.0, 3.0);
        let corner = utils::transform_homogeneous(&projection, &Vec3::new(2.0, -4.0, -3.0));
        assert_relative_eq!(corner, Vec4::new(1.0, -1.0, 1.0, 1.0), epsilon = 1e-6);
    }

    #[test]
    fn test_look_at_inverse_is_inverse() {
        let eye = Vec3::new(3.0, 2.0, 5.0);
        let target = Vec3::new(0.0, 0.5, 0.0);
        let up = Vec3::y();

        let view = Mat4::look_at(&eye, &target, &up);
        let world = Mat4::look_at_inverse(&eye, &target, &up);

        assert_relative_eq!(view * world, Mat4::identity(), epsilon = 1e-5);
        // The eye lands on the origin of eye space
        let origin = utils::transform_homogeneous(&view, &eye);
        assert_relative_eq!(origin, Vec4::new(0.0, 0.0, 0.0, 1.0), epsilon = 1e-5);
    }

    #[test]
    fn test_normal_matrix_of_nonuniform_scale() {
        let scale = Mat4::new_nonuniform_scaling(&Vec3::new(2.0, 4.0, 1.0));
        let normal = utils::normal_matrix(&scale);
        assert_relative_eq!(normal, Mat3::from_diagonal(&Vec3::new(0.5, 0.25, 1.0)), epsilon = 1e-6);
    }

    #[test]
    fn test_degenerate_rotation_axis_is_identity() {
        assert_eq!(Mat4::rotation_axis(&Vec3::zeros(), 45.0), Mat4::identity());
    }
}
