//! Math types consumed by the renderer
//!
//! Only what camera setup and push-constant packing need; everything else is
//! left to the application.

pub use nalgebra::{Matrix4, Point3, Vector3};

/// 3D vector type
pub type Vec3 = Vector3<f32>;

/// 4x4 matrix type
pub type Mat4 = Matrix4<f32>;

/// Right-handed perspective projection for Vulkan clip space
///
/// Depth maps to `[0, 1]` and Y points down, so no extra flip is needed
/// when rendering into a swapchain image.
pub fn perspective(fov_y_radians: f32, aspect: f32, near: f32, far: f32) -> Mat4 {
    let f = 1.0 / (fov_y_radians * 0.5).tan();
    let mut m = Mat4::zeros();
    m[(0, 0)] = f / aspect;
    m[(1, 1)] = -f;
    m[(2, 2)] = far / (near - far);
    m[(2, 3)] = (near * far) / (near - far);
    m[(3, 2)] = -1.0;
    m
}

/// View matrix looking from `eye` towards `target`
pub fn look_at(eye: [f32; 3], target: [f32; 3], up: [f32; 3]) -> Mat4 {
    Mat4::look_at_rh(
        &Point3::from(eye),
        &Point3::from(target),
        &Vec3::from(up),
    )
}

/// Column-major array form, matching GLSL `mat4` memory order
pub fn to_columns(m: &Mat4) -> [[f32; 4]; 4] {
    let mut columns = [[0.0; 4]; 4];
    for (c, column) in columns.iter_mut().enumerate() {
        for (r, value) in column.iter_mut().enumerate() {
            *value = m[(r, c)];
        }
    }
    columns
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_to_columns_is_column_major() {
        let mut m = Mat4::identity();
        m[(0, 3)] = 5.0;
        let cols = to_columns(&m);
        assert_relative_eq!(cols[3][0], 5.0);
        assert_relative_eq!(cols[0][3], 0.0);
    }

    #[test]
    fn test_perspective_maps_near_plane_to_zero_depth() {
        let p = perspective(std::f32::consts::FRAC_PI_2, 1.0, 0.1, 100.0);
        let clip = p * nalgebra::Vector4::new(0.0, 0.0, -0.1, 1.0);
        assert_relative_eq!(clip.z / clip.w, 0.0, epsilon = 1e-5);

        let far = p * nalgebra::Vector4::new(0.0, 0.0, -100.0, 1.0);
        assert_relative_eq!(far.z / far.w, 1.0, epsilon = 1e-5);
    }
}
