//! Camera input.
//!
//! The camera is owned by the scene-construction code; the pipeline reads
//! its matrices once per frame and never mutates it.

use glam::{Mat4, Vec2, Vec3, Vec4};

/// Projection/view description of the camera that produced the scene buffers.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Camera {
    pub projection_matrix: Mat4,
    pub inverse_projection_matrix: Mat4,
    pub view_matrix: Mat4,
    pub near: f32,
    pub far: f32,
}

impl Camera {
    /// Builds a right-handed perspective camera with a `[0, 1]` depth range.
    ///
    /// `fov_y` is in degrees.
    #[must_use]
    pub fn perspective(fov_y: f32, aspect: f32, near: f32, far: f32) -> Self {
        let projection_matrix = Mat4::perspective_rh(fov_y.to_radians(), aspect, near, far);
        Self {
            projection_matrix,
            inverse_projection_matrix: projection_matrix.inverse(),
            view_matrix: Mat4::IDENTITY,
            near,
            far,
        }
    }

    #[must_use]
    pub fn with_view(mut self, view_matrix: Mat4) -> Self {
        self.view_matrix = view_matrix;
        self
    }

    /// Reconstructs the view-space position for a screen UV and NDC depth.
    #[must_use]
    pub fn view_position(&self, uv: Vec2, depth: f32) -> Vec3 {
        let ndc = Vec4::new(uv.x * 2.0 - 1.0, 1.0 - uv.y * 2.0, depth, 1.0);
        let view = self.inverse_projection_matrix * ndc;
        view.truncate() / view.w
    }

    /// Projects a view-space position to `(uv, ndc_depth)`.
    ///
    /// Returns `None` for points on or behind the camera plane.
    #[must_use]
    pub fn project(&self, view_pos: Vec3) -> Option<(Vec2, f32)> {
        let clip = self.projection_matrix * view_pos.extend(1.0);
        if clip.w <= f32::EPSILON {
            return None;
        }
        let ndc = clip.truncate() / clip.w;
        Some((Vec2::new(ndc.x * 0.5 + 0.5, 0.5 - ndc.y * 0.5), ndc.z))
    }

    /// Converts an NDC depth to a positive linear view distance.
    #[must_use]
    pub fn linearize_depth(&self, depth: f32) -> f32 {
        -self.view_position(Vec2::splat(0.5), depth).z
    }

    /// Inverse of [`linearize_depth`](Self::linearize_depth).
    #[must_use]
    pub fn depth_from_linear(&self, distance: f32) -> f32 {
        let clip = self.projection_matrix * Vec4::new(0.0, 0.0, -distance, 1.0);
        clip.z / clip.w
    }
}
