//! Orbit camera around the portal.
//!
//! Position is kept in spherical coordinates about `target` (y up). Orbit
//! input moves azimuth and polar angle; zoom and pan are gated by
//! [`CameraConstraints`].

use std::f32::consts::{PI, TAU};

use glam::{Mat4, Vec3};

const POLAR_EPSILON: f32 = 1e-6;
const ZOOM_BASE: f32 = 0.95;

/// Which optional controls are honoured. Orbiting is always enabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CameraConstraints {
    pub zoom_enabled: bool,
    pub pan_enabled: bool,
}

/// Pointer input already translated out of window events.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CameraInput {
    /// Drag with the rotate button, in physical pixels.
    Orbit { dx: f32, dy: f32 },
    /// Scroll steps; positive moves towards the target.
    Zoom { delta: f32 },
    /// Drag with the pan button, in physical pixels.
    Pan { dx: f32, dy: f32 },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Perspective {
    pub fov_y_degrees: f32,
    pub near: f32,
    pub far: f32,
}

impl Default for Perspective {
    fn default() -> Self {
        Self {
            fov_y_degrees: 75.0,
            near: 0.1,
            far: 1000.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrbitCamera {
    target: Vec3,
    radius: f32,
    azimuth: f32,
    polar: f32,
    aspect: f32,
    perspective: Perspective,
    constraints: CameraConstraints,
}

impl OrbitCamera {
    /// Camera at `eye` looking at `target`.
    pub fn new(
        eye: Vec3,
        target: Vec3,
        perspective: Perspective,
        constraints: CameraConstraints,
    ) -> Self {
        let offset = eye - target;
        let radius = offset.length().max(f32::EPSILON);
        let azimuth = offset.x.atan2(offset.z);
        let polar = (offset.y / radius).clamp(-1.0, 1.0).acos();
        Self {
            target,
            radius,
            azimuth,
            polar: polar.clamp(POLAR_EPSILON, PI - POLAR_EPSILON),
            aspect: 1.0,
            perspective,
            constraints,
        }
    }

    pub fn target(&self) -> Vec3 {
        self.target
    }

    pub fn distance(&self) -> f32 {
        self.radius
    }

    pub fn azimuth(&self) -> f32 {
        self.azimuth
    }

    /// Polar angle measured from +Y, in `(0, π)`.
    pub fn polar(&self) -> f32 {
        self.polar
    }

    pub fn constraints(&self) -> CameraConstraints {
        self.constraints
    }

    pub fn perspective(&self) -> Perspective {
        self.perspective
    }

    pub fn eye(&self) -> Vec3 {
        let sin_polar = self.polar.sin();
        self.target
            + self.radius
                * Vec3::new(
                    sin_polar * self.azimuth.sin(),
                    self.polar.cos(),
                    sin_polar * self.azimuth.cos(),
                )
    }

    pub fn set_viewport(&mut self, width: u32, height: u32) {
        self.aspect = width.max(1) as f32 / height.max(1) as f32;
    }

    pub fn aspect(&self) -> f32 {
        self.aspect
    }

    /// Applies one pointer input. Returns whether the camera moved.
    pub fn handle_input(&mut self, input: CameraInput, viewport_height: u32) -> bool {
        let height = viewport_height.max(1) as f32;
        match input {
            CameraInput::Orbit { dx, dy } => {
                if dx == 0.0 && dy == 0.0 {
                    return false;
                }
                self.azimuth -= TAU * dx / height;
                self.polar = (self.polar - TAU * dy / height)
                    .clamp(POLAR_EPSILON, PI - POLAR_EPSILON);
                true
            }
            CameraInput::Zoom { delta } => {
                if !self.constraints.zoom_enabled || delta == 0.0 {
                    return false;
                }
                self.radius = (self.radius * ZOOM_BASE.powf(delta))
                    .clamp(self.perspective.near, self.perspective.far);
                true
            }
            CameraInput::Pan { dx, dy } => {
                if !self.constraints.pan_enabled || (dx == 0.0 && dy == 0.0) {
                    return false;
                }
                let half_fov = (self.perspective.fov_y_degrees.to_radians() * 0.5).tan();
                let world_per_pixel = 2.0 * self.radius * half_fov / height;
                let forward = (self.target - self.eye()).normalize_or_zero();
                let right = forward.cross(Vec3::Y).normalize_or_zero();
                let up = right.cross(forward);
                self.target += (-dx * right + dy * up) * world_per_pixel;
                true
            }
        }
    }

    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.eye(), self.target, Vec3::Y)
    }

    pub fn projection_matrix(&self) -> Mat4 {
        Mat4::perspective_rh(
            self.perspective.fov_y_degrees.to_radians(),
            self.aspect,
            self.perspective.near,
            self.perspective.far,
        )
    }

    pub fn view_projection(&self) -> Mat4 {
        self.projection_matrix() * self.view_matrix()
    }
}

impl Default for OrbitCamera {
    fn default() -> Self {
        Self::new(
            Vec3::new(0.0, 0.0, 5.0),
            Vec3::ZERO,
            Perspective::default(),
            CameraConstraints::default(),
        )
    }
}
